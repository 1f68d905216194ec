//! Owner and permission tests: null owners, the owner policy, setPerms, custom policies

use super::{create_runtime_with, create_test_runtime, s};
use snapjs::{
    Access, AccessRequest, AuthorizationPolicy, ErrorKind, Interpreter, InterpreterConfig, JsError,
    JsValue, ObjectId, PolicyKind,
};

fn owner_policy_runtime() -> Interpreter {
    create_runtime_with(InterpreterConfig::default().with_policy(PolicyKind::Owner)).0
}

#[allow(clippy::panic)]
fn object(value: Result<JsValue, JsError>) -> ObjectId {
    match value {
        Ok(JsValue::Object(id)) => id,
        other => panic!("expected an object, got {:?}", other),
    }
}

/// `asGuest(source)` evaluates `source` acting as the `guest` owner and
/// returns its value, or the name and message of what it threw
const SANDBOX: &str = r#"
    var locked = {secret: 1};
    var guest = {};
    function bump() { locked.secret++; return locked.secret; }
    function asGuest(source) {
        setPerms(guest);
        try {
            return eval(source);
        } catch (e) {
            return e.name + ': ' + e.message;
        }
    }
"#;

fn sandbox(tail: &str) -> String {
    format!("{}\n{}", SANDBOX, tail)
}

#[test]
fn test_null_owner_is_always_rejected() {
    let mut interp = create_test_runtime();
    let id = object(interp.eval("({a: 1})"));
    let base = JsValue::Object(id);

    let read = interp.get(&base, "a", None);
    assert!(matches!(read, Err(e) if e.kind() == Some(ErrorKind::PermissionError)));
    let write = interp.put(&base, "a", JsValue::from(2), None);
    assert!(matches!(write, Err(e) if e.kind() == Some(ErrorKind::PermissionError)));
    assert!(interp.set_prototype(id, None, None).is_err());
    assert!(interp.own_keys(id, None, false).is_err());
    assert!(interp.delete_property(id, "a", None).is_err());
    assert!(interp.prevent_extensions(id, None).is_err());

    // With an owner the same operations succeed
    let root = Some(interp.root_owner());
    assert!(matches!(interp.get(&base, "a", root), Ok(JsValue::Number(n)) if n == 1.0));
}

#[test]
fn test_no_sequence_of_set_prototype_creates_a_cycle() {
    let mut interp = create_test_runtime();
    let root = Some(interp.root_owner());
    let ids: Vec<_> = (0..6).map(|_| interp.create_object(None, root)).collect();
    for (index, &id) in ids.iter().enumerate() {
        for &proto in &ids {
            // Every attempt either succeeds or is rejected; never a loop
            let _ = interp.set_prototype(id, Some(proto), root);
            let mut seen = 0;
            let mut current = Some(id);
            while let Some(cursor) = current {
                seen += 1;
                assert!(seen <= ids.len(), "cycle after reparenting object {}", index);
                current = interp.get_prototype(cursor, root).ok().flatten();
            }
        }
    }
}

#[test]
fn test_reads_are_open_under_owner_policy() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox("asGuest('locked.secret')"));
    assert!(matches!(result, Ok(JsValue::Number(n)) if n == 1.0));
}

#[test]
fn test_owner_policy_rejects_foreign_writes() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox("asGuest('locked.secret = 2') + ' / ' + locked.secret"));
    assert_eq!(
        result.ok(),
        Some(s("PermissionError: Permission denied: cannot write object / 1"))
    );
}

#[test]
fn test_owner_policy_rejects_foreign_structure_changes() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox(
        r#"[
            asGuest('delete locked.secret'),
            asGuest('Object.setPrototypeOf(locked, null)'),
            asGuest('Object.preventExtensions(locked)'),
            asGuest('Object.setOwnerOf(locked, guest)'),
            asGuest('Object.defineProperty(locked, "extra", {value: 1})')
        ].join('|')"#,
    ));
    let text = match result {
        Ok(JsValue::String(text)) => text.to_string(),
        other => format!("{:?}", other),
    };
    let results: Vec<&str> = text.split('|').collect();
    assert_eq!(results.len(), 5, "unexpected: {}", text);
    for result in results {
        assert!(result.starts_with("PermissionError"), "unexpected: {}", result);
    }
}

#[test]
fn test_objects_created_by_guest_belong_to_guest() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox(
        r#"asGuest('var mine = {}; mine.value = "ok"; [Object.getOwnerOf(mine) === guest, perms() === guest, mine.value].join()')"#,
    ));
    assert_eq!(result.ok(), Some(s("true,true,ok")));
}

#[test]
fn test_functions_run_as_their_owner() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox("asGuest('bump()')"));
    assert!(matches!(result, Ok(JsValue::Number(n)) if n == 2.0));
}

#[test]
fn test_guest_cannot_become_root() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox(
        "var rootToken = perms(); asGuest('setPerms(rootToken); \"escaped\"')",
    ));
    assert_eq!(
        result.ok(),
        Some(s("PermissionError: Permission denied: cannot become object"))
    );
}

#[test]
fn test_open_policy_allows_foreign_writes() {
    let mut interp = create_test_runtime();
    let result = interp.eval(&sandbox("asGuest('locked.secret = 5'); locked.secret"));
    assert!(matches!(result, Ok(JsValue::Number(n)) if n == 5.0));
}

#[test]
fn test_permission_errors_are_catchable_objects() {
    let mut interp = owner_policy_runtime();
    let result = interp.eval(&sandbox(
        r#"
        var caught;
        asGuest('try { locked.secret = 3; } catch (e) { caught = e; }');
        caught instanceof PermissionError && caught instanceof Error
        "#,
    ));
    assert_eq!(result.ok(), Some(JsValue::Boolean(true)));
}

/// Denies every write, nothing else
struct NoWrites;

impl AuthorizationPolicy for NoWrites {
    fn name(&self) -> &'static str {
        "no-writes"
    }

    fn allows(&self, request: &AccessRequest) -> bool {
        request.access != Access::Write
    }
}

#[test]
fn test_custom_policy_is_consulted() {
    let mut interp = create_test_runtime();
    interp.set_policy(Box::new(NoWrites));
    assert_eq!(interp.eval("var o = {a: 1}; o.a").ok(), Some(JsValue::Number(1.0)));
    let result = interp.eval("var p = {a: 1}; p.a = 2");
    assert!(matches!(&result, Err(e) if e.to_string().contains("PermissionError")));
}
