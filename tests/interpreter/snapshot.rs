//! Snapshot tests: round trips mid-execution, sharing, special values, bad input

#![allow(clippy::expect_used, clippy::indexing_slicing)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use super::{create_runtime_with, create_test_runtime, s};
use snapjs::{
    done, native, reenter_call, Interpreter, InterpreterConfig, JsError, JsValue, NativeResult,
    Resolver, RunResult, ThreadOutcome, ThreadStatus, FORMAT_VERSION,
};

/// Snapshot `from` and restore it into a fresh test interpreter
fn round_trip(from: &Interpreter) -> Interpreter {
    let snapshot = from.snapshot().expect("snapshot should encode");
    let mut to = create_test_runtime();
    to.restore(&snapshot).expect("snapshot should restore");
    to
}

fn snapshot_error(result: Result<(), JsError>) -> String {
    match result {
        Err(JsError::Snapshot(message)) => message,
        other => format!("not a snapshot error: {:?}", other),
    }
}

#[test]
fn test_globals_survive_round_trip() {
    let mut interp = create_test_runtime();
    assert!(interp
        .eval("var n = 42; var str = 'text'; var flag = true; var nothing = null; var list = [1, 'two', [3]];")
        .is_ok());
    let mut restored = round_trip(&interp);
    assert_eq!(
        restored.eval("[n, str, flag, nothing, list.length, list[2][0]].join()").ok(),
        Some(s("42,text,true,,3,3"))
    );
}

#[test]
fn test_special_numbers_and_undefined_survive() {
    let mut interp = create_test_runtime();
    assert!(interp
        .eval("var vals = [NaN, -0, Infinity, -Infinity, undefined, 0.1]; var u;")
        .is_ok());
    let mut restored = round_trip(&interp);
    let check = r#"
        [isNaN(vals[0]), 1 / vals[1] === -Infinity, vals[2] === Infinity,
         vals[3] === -Infinity, vals[4] === undefined, 4 in vals, vals[5] === 0.1,
         typeof u].join()
    "#;
    assert_eq!(
        restored.eval(check).ok(),
        Some(s("true,true,true,true,true,true,true,undefined"))
    );
}

#[test]
fn test_cycles_and_sharing_are_preserved() {
    let mut interp = create_test_runtime();
    let source = r#"
        var shared = {tag: 'shared'};
        var holder = {left: shared, right: shared};
        shared.self = shared;
        shared.back = holder;
    "#;
    assert!(interp.eval(source).is_ok());
    let mut restored = round_trip(&interp);
    assert_eq!(
        restored
            .eval("[holder.left === holder.right, shared.self === shared, shared.back.left === shared].join()")
            .ok(),
        Some(s("true,true,true"))
    );
    // Mutating through one path is visible through the other
    assert_eq!(
        restored.eval("holder.left.tag = 'changed'; holder.right.tag").ok(),
        Some(s("changed"))
    );
}

#[test]
fn test_property_attributes_and_prototypes_survive() {
    let mut interp = create_test_runtime();
    let source = r#"
        var base = {kind: 'base'};
        var o = Object.create(base);
        Object.defineProperty(o, 'fixed', {value: 1, enumerable: true});
        Object.defineProperty(o, 'hidden', {value: 2, writable: true});
        Object.preventExtensions(o);
    "#;
    assert!(interp.eval(source).is_ok());
    let mut restored = round_trip(&interp);
    let check = r#"
        var d = Object.getOwnPropertyDescriptor(o, 'fixed');
        [o.kind, Object.getPrototypeOf(o) === base, d.writable, d.configurable,
         Object.keys(o).join('+'), Object.isExtensible(o)].join()
    "#;
    assert_eq!(restored.eval(check).ok(), Some(s("base,true,false,false,fixed,false")));
}

#[test]
fn test_many_flagged_properties_keep_their_attributes() {
    let mut interp = create_test_runtime();
    let source = r#"
        var wide = {};
        for (var i = 0; i < 400; i++) {
            Object.defineProperty(wide, 'p' + i, {
                value: i, writable: i % 2 === 0, enumerable: i % 3 === 0, configurable: i % 5 === 0
            });
        }
    "#;
    assert!(interp.eval(source).is_ok());
    let mut restored = round_trip(&interp);
    let check = r#"
        var counts = [0, 0, 0], names = Object.getOwnPropertyNames(wide);
        for (var j = 0; j < names.length; j++) {
            var d = Object.getOwnPropertyDescriptor(wide, names[j]);
            if (d.writable) counts[0]++;
            if (d.enumerable) counts[1]++;
            if (d.configurable) counts[2]++;
        }
        names.length + ':' + counts.join() + ':' + Object.keys(wide).length
    "#;
    assert_eq!(restored.eval(check).ok(), Some(s("400:200,134,80:134")));
}

#[test]
fn test_closures_keep_their_scope() {
    let mut interp = create_test_runtime();
    let source = r#"
        function makeCounter() {
            var n = 0;
            return function () { n += 1; return n; };
        }
        var counter = makeCounter();
        counter(); counter();
        function Point(x) { this.x = x; }
        Point.prototype.double = function () { return this.x * 2; };
        var bound = function (a, b) { return this.base + a + b; }.bind({base: 100}, 10);
    "#;
    assert!(interp.eval(source).is_ok());
    let mut restored = round_trip(&interp);
    assert_eq!(restored.eval("counter()").ok(), Some(JsValue::Number(3.0)));
    assert_eq!(
        restored.eval("new Point(21).double() + ',' + bound(1)").ok(),
        Some(s("42,111"))
    );
    // The original keeps its own, separate state
    assert_eq!(interp.eval("counter()").ok(), Some(JsValue::Number(3.0)));
}

#[test]
fn test_sleeping_thread_resumes_after_restore() {
    let (mut interp, clock) = create_runtime_with(InterpreterConfig::default());
    let thread = interp
        .spawn("var before = 'set'; suspend(100); before + ' then resumed'")
        .expect("spawn");
    clock.advance(40.0);
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 140.0));

    let mut restored = round_trip(&interp);
    assert_eq!(restored.now(), 40.0);
    assert_eq!(restored.thread_status(thread), Some(ThreadStatus::Sleeping));
    assert!(matches!(restored.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 140.0));
    restored.wait_until(140.0);
    assert!(matches!(restored.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        restored.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("set then resumed")))
    );
}

#[test]
fn test_pending_timers_survive_restore() {
    let mut interp = create_test_runtime();
    let source = r#"
        var log = [];
        setTimeout(function (tag) { log.push(tag); }, 20, 'second');
        setTimeout(function (tag) { log.push(tag); }, 10, 'first');
    "#;
    assert!(interp.eval(source).is_ok());
    let mut restored = round_trip(&interp);
    loop {
        match restored.run_to_quiescence() {
            Ok(RunResult::MoreWorkAt(at)) => restored.wait_until(at),
            other => {
                assert!(matches!(other, Ok(RunResult::Done)));
                break;
            }
        }
    }
    assert_eq!(restored.eval("log.join()").ok(), Some(s("first,second")));
}

type Parked = Rc<RefCell<Vec<Resolver>>>;

fn install_wait_for(interp: &mut Interpreter) -> Parked {
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let sink = parked.clone();
    interp
        .define_global_native(
            "waitFor",
            0,
            native(move |interp, call| {
                sink.borrow_mut().push(interp.block_thread(call.thread));
                Ok(NativeResult::Block)
            }),
        )
        .expect("waitFor should install");
    parked
}

#[test]
fn test_blocked_thread_is_resolved_after_restore() {
    let mut interp = create_test_runtime();
    let _parked = install_wait_for(&mut interp);
    let thread = interp.spawn("waitFor() * 2").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));
    let pending = interp.pending_resolvers();
    assert_eq!(pending.len(), 1);
    let text = interp.snapshot_string().expect("snapshot");

    // The restoring host registers the same natives, then rebuilds its
    // resolver handles from the persisted ids
    let mut restored = create_test_runtime();
    let _ = install_wait_for(&mut restored);
    restored.restore_str(&text).expect("restore");
    assert_eq!(restored.pending_resolvers(), pending);
    assert_eq!(restored.thread_status(thread), Some(ThreadStatus::Blocked));

    let (id, owner) = pending.first().copied().expect("one resolver");
    assert!(restored
        .resolve(Resolver::from_raw(id, owner), JsValue::Number(21.0))
        .is_ok());
    assert!(matches!(restored.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        restored.thread_result(thread),
        Some(&ThreadOutcome::Completed(JsValue::Number(42.0)))
    );
}

fn install_apply_twice(interp: &mut Interpreter) {
    let apply_twice = native(|_interp, call| {
        let func = call.arg(0);
        match call.phase {
            0 => {
                call.phase = 1;
                reenter_call(func, JsValue::Undefined, vec![call.arg(1)])
            }
            1 => {
                call.phase = 2;
                let first = call.take_resumed();
                reenter_call(func, JsValue::Undefined, vec![first])
            }
            _ => done(call.take_resumed()),
        }
    });
    interp
        .define_global_native("applyTwice", 2, apply_twice)
        .expect("install");
}

#[test]
fn test_native_reentry_resumes_after_restore() {
    let mut interp = create_test_runtime();
    install_apply_twice(&mut interp);
    let thread = interp
        .spawn("applyTwice(function (n) { suspend(10); return n * 3; }, 2)")
        .expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(_))));

    let snapshot = interp.snapshot().expect("snapshot");
    let mut restored = create_test_runtime();
    install_apply_twice(&mut restored);
    restored.restore(&snapshot).expect("restore");
    loop {
        match restored.run_to_quiescence() {
            Ok(RunResult::MoreWorkAt(at)) => restored.wait_until(at),
            other => {
                assert!(matches!(other, Ok(RunResult::Done)));
                break;
            }
        }
    }
    assert_eq!(
        restored.thread_result(thread),
        Some(&ThreadOutcome::Completed(JsValue::Number(18.0)))
    );
}

const CONTROL_FLOW_WORKLOAD: &str = r#"
    var out = [];
    function counter() { var n = 0; return function () { return n++; }; }
    var next = counter();
    outer: for (var i = 0; i < 3; i++) {
        try {
            if (i === 2) break outer;
            out.push('f' + next());
        } finally {
            out.push('d' + i);
        }
    }
    var obj = {a: 1, b: 2};
    for (var k in obj) { out.push(k); }
    try { null.x; } catch (e) { out.push(e.name); }
    switch (out.length) { case 0: out.push('none'); default: out.push('n' + out.length); }
    out.join()
"#;

/// Step `thread` to completion, optionally replacing the interpreter with a
/// restored copy after every step. Returns the outcome and the step count.
fn run_stepwise(source: &str, restore_each_step: bool) -> (Option<ThreadOutcome>, usize) {
    let mut interp = create_test_runtime();
    let thread = interp.spawn(source).expect("spawn");
    let mut steps = 0;
    while interp.step_once().expect("step should succeed") {
        steps += 1;
        assert!(steps < 100_000, "thread never finished");
        if restore_each_step {
            interp = round_trip(&interp);
        }
    }
    (interp.thread_result(thread).cloned(), steps)
}

#[test]
fn test_restore_at_every_step_matches_uninterrupted_run() {
    let (direct, steps) = run_stepwise(CONTROL_FLOW_WORKLOAD, false);
    assert_eq!(
        direct,
        Some(ThreadOutcome::Completed(s("f0,d0,f1,d1,d2,a,b,TypeError,n8")))
    );
    assert!(steps > 100, "workload too small to be meaningful: {} steps", steps);

    let (restored, restored_steps) = run_stepwise(CONTROL_FLOW_WORKLOAD, true);
    assert_eq!(restored, direct);
    assert_eq!(restored_steps, steps);
}

#[test]
fn test_restore_at_every_step_preserves_uncaught_throw() {
    let source = "function boom(x) { try { return x.y.z; } finally { x.seen = true; } } boom({})";
    let (direct, _) = run_stepwise(source, false);
    let (restored, _) = run_stepwise(source, true);
    let message = |outcome: &Option<ThreadOutcome>| match outcome {
        Some(ThreadOutcome::Threw(_)) => "threw",
        _ => "other",
    };
    assert_eq!(message(&direct), "threw");
    assert_eq!(message(&restored), "threw");
}

#[test]
fn test_repeated_round_trips_are_stable() {
    let mut interp = create_test_runtime();
    assert!(interp
        .eval("var o = {a: [1, 2, {b: 'c'}]}; o.a.push(o); setTimeout(function () {}, 5);")
        .is_ok());
    let once = round_trip(&interp);
    let twice = round_trip(&once);
    assert_eq!(
        once.snapshot_string().expect("snapshot"),
        twice.snapshot_string().expect("snapshot")
    );
}

#[test]
fn test_snapshot_is_tagged_with_version() {
    let interp = create_test_runtime();
    let snapshot = interp.snapshot().expect("snapshot");
    let root = snapshot.get(0).expect("interpreter record");
    assert_eq!(root.get("type"), Some(&json!("Interpreter")));
    assert_eq!(root.get("version"), Some(&json!(FORMAT_VERSION)));
}

#[test]
fn test_version_mismatch_is_rejected() {
    let interp = create_test_runtime();
    let mut snapshot = interp.snapshot().expect("snapshot");
    if let Some(root) = snapshot.get_mut(0) {
        root["version"] = json!(FORMAT_VERSION + 1);
    }
    let mut target = create_test_runtime();
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("unsupported snapshot version"), "{}", message);
}

#[test]
fn test_unknown_record_type_is_rejected() {
    let interp = create_test_runtime();
    let mut snapshot = interp.snapshot().expect("snapshot");
    if let Some(records) = snapshot.as_array_mut() {
        records.push(json!({"type": "Mystery"}));
    }
    let mut target = create_test_runtime();
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("unknown record type 'Mystery'"), "{}", message);
}

#[test]
fn test_dangling_reference_is_rejected() {
    let interp = create_test_runtime();
    let mut snapshot = interp.snapshot().expect("snapshot");
    if let Some(root) = snapshot.get_mut(0) {
        root["globalScope"] = json!({"#": 999_999});
    }
    let mut target = create_test_runtime();
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("dangling reference"), "{}", message);
}

#[test]
fn test_out_of_range_node_is_rejected() {
    let mut interp = create_test_runtime();
    assert!(interp.eval("function f() { return 1; }").is_ok());
    let mut snapshot = interp.snapshot().expect("snapshot");
    let mut corrupted = 0;
    for record in snapshot.as_array_mut().into_iter().flatten() {
        if record["function"]["kind"] == json!("user") {
            record["function"]["node"] = json!(999_999);
            corrupted += 1;
        }
    }
    assert!(corrupted > 0, "snapshot should contain a closure");
    let mut target = create_test_runtime();
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("node 999999 out of range"), "{}", message);
}

#[test]
fn test_resolver_for_unknown_thread_is_rejected() {
    let interp = create_test_runtime();
    let mut snapshot = interp.snapshot().expect("snapshot");
    if let Some(root) = snapshot.get_mut(0) {
        root["pendingResolvers"] = json!([[1, 999]]);
        root["nextResolverId"] = json!(2);
    }
    let mut target = create_test_runtime();
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("resolver 1 for thread 999 was never issued"), "{}", message);
}

#[test]
fn test_unregistered_native_is_rejected() {
    let mut interp = create_test_runtime();
    assert!(interp
        .define_global_native("hostOnly", 0, native(|_, _| done(1)))
        .is_ok());
    let snapshot = interp.snapshot().expect("snapshot");

    let mut target = create_test_runtime();
    assert!(target.eval("var keep = 'me';").is_ok());
    let message = snapshot_error(target.restore(&snapshot));
    assert!(message.contains("unknown native 'hostOnly'"), "{}", message);
    // A failed restore leaves the interpreter untouched
    assert_eq!(target.eval("keep").ok(), Some(s("me")));
}

#[test]
fn test_malformed_json_is_rejected() {
    let mut target = create_test_runtime();
    assert!(matches!(target.restore_str("{not json"), Err(JsError::Json(_))));
    let message = snapshot_error(target.restore(&json!({"type": "Interpreter"})));
    assert!(message.contains("array of records"), "{}", message);
}
