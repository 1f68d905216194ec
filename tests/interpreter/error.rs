//! Error tests: constructors, toString, stack traces, host-visible errors

use super::{create_test_runtime, eval, eval_result, s};
use snapjs::{done, native, ErrorKind, JsError, JsValue};

#[test]
fn test_error_constructors() {
    assert_eq!(eval("new Error('boom').message"), s("boom"));
    assert_eq!(eval("Error('no new').message"), s("no new"));
    assert_eq!(eval("new TypeError('bad').name"), s("TypeError"));
    assert_eq!(eval("new Error().message"), s(""));
    assert_eq!(eval("new RangeError(42).message"), s("42"));
}

#[test]
fn test_every_kind_inherits_from_error() {
    let source = r#"
        var kinds = [TypeError, RangeError, ReferenceError, SyntaxError, URIError, EvalError, PermissionError];
        var ok = true;
        for (var i = 0; i < kinds.length; i++) {
            var e = new kinds[i]('m');
            ok = ok && e instanceof kinds[i] && e instanceof Error && !(e instanceof Array);
        }
        ok + ',' + (new TypeError('x') instanceof RangeError)
    "#;
    assert_eq!(eval(source), s("true,false"));
}

#[test]
fn test_error_to_string() {
    assert_eq!(eval("new Error('boom').toString()"), s("Error: boom"));
    assert_eq!(eval("new TypeError().toString()"), s("TypeError"));
    assert_eq!(eval("String(new RangeError('r'))"), s("RangeError: r"));
    assert_eq!(
        eval("var e = new Error('m'); e.name = ''; e.toString()"),
        s("m")
    );
}

#[test]
fn test_name_and_message_are_not_enumerable() {
    assert_eq!(eval("Object.keys(new Error('x')).length"), JsValue::Number(0.0));
    assert_eq!(eval("new Error('x').hasOwnProperty('message')"), JsValue::Boolean(true));
    assert_eq!(eval("new Error('x').hasOwnProperty('name')"), JsValue::Boolean(false));
}

#[test]
fn test_stack_lists_calling_functions() {
    let source = r#"
        function inner() { return new Error('deep'); }
        function outer() { return inner(); }
        outer().stack
    "#;
    let stack = match eval(source) {
        JsValue::String(text) => text.to_string(),
        other => format!("{:?}", other),
    };
    assert!(stack.starts_with("Error: deep"), "{}", stack);
    let inner = stack.find("at inner");
    let outer = stack.find("at outer");
    assert!(inner.is_some() && outer.is_some(), "{}", stack);
    assert!(inner < outer, "{}", stack);
}

#[test]
fn test_engine_errors_are_error_objects() {
    let source = r#"
        var r = [];
        try { null.x; } catch (e) { r.push(e instanceof TypeError); }
        try { missing; } catch (e) { r.push(e.name + ': ' + e.message); }
        try { new Array(-1); } catch (e) { r.push(e instanceof RangeError); }
        r.join()
    "#;
    assert_eq!(eval(source), s("true,ReferenceError: missing is not defined,true"));
}

#[test]
fn test_any_value_can_be_thrown() {
    assert_eq!(eval("var r; try { throw {code: 7}; } catch (e) { r = e.code; } r"), JsValue::Number(7.0));
    let result = eval_result("throw 'plain'");
    assert!(matches!(&result, Err(JsError::Thrown { value, message }) if *value == s("plain") && message == "plain"));
}

#[test]
fn test_uncaught_error_reaches_host() {
    let result = eval_result("function f() { throw new TypeError('from f'); } f()");
    assert!(
        matches!(&result, Err(JsError::Thrown { value: JsValue::Object(_), message }) if message == "TypeError: from f"),
        "unexpected result: {:?}",
        result
    );
    let shown = eval_result("throw new Error('shown')").map_err(|e| e.to_string());
    assert_eq!(shown, Err("Uncaught Error: shown".to_string()));
}

#[test]
fn test_syntax_errors_are_reported_before_running() {
    let mut interp = create_test_runtime();
    let result = interp.eval("var ok = 1;\nvar = ;");
    assert!(matches!(&result, Err(JsError::Syntax { location, .. }) if location.line == 2));
    assert_eq!(result.as_ref().err().and_then(JsError::kind), Some(ErrorKind::SyntaxError));
    // Nothing ran
    assert_eq!(interp.global_get("ok"), None);
}

#[test]
fn test_host_fault_is_not_catchable() {
    let mut interp = create_test_runtime();
    let fault = native(|_, _| Err(JsError::host_fault("host broke")));
    assert!(interp.define_global_native("fault", 0, fault).is_ok());
    assert!(interp.define_global_native("fine", 0, native(|_, _| done(1))).is_ok());
    let result = interp.eval("try { fault(); } catch (e) { 'swallowed'; }");
    assert!(matches!(&result, Err(e) if e.is_host_fault()));
    assert_eq!(interp.eval("fine() + 1").ok(), Some(JsValue::Number(2.0)));
}

#[test]
fn test_error_kinds_map_to_constructors() {
    assert_eq!(JsError::type_error("t").kind(), Some(ErrorKind::TypeError));
    assert_eq!(JsError::reference_error("v").to_string(), "ReferenceError: v is not defined");
    assert_eq!(JsError::permission_error("p").kind(), Some(ErrorKind::PermissionError));
    assert!(JsError::host_fault("h").kind().is_none());
    assert!(!JsError::range_error("r").is_host_fault());
}
