//! Control flow tests: loops, switch, labels, try/catch/finally unwinding

use super::{eval, eval_result, s};
use snapjs::JsValue;

const SWITCH_FALLTHROUGH: &str = r#"
function run(i) {
    var out = '';
    switch (i) {
        case 1: out += '1';
        case 2: out += '2';
        default: out += 'D';
        case 3: out += '3';
        case 4: out += '4';
    }
    return out;
}
"#;

#[test]
fn test_switch_default_in_middle_from_no_match() {
    let source = format!("{} run(0)", SWITCH_FALLTHROUGH);
    assert_eq!(eval(&source), s("D34"));
}

#[test]
fn test_switch_default_in_middle_from_first_case() {
    let source = format!("{} run(1)", SWITCH_FALLTHROUGH);
    assert_eq!(eval(&source), s("12D34"));
}

#[test]
fn test_switch_matches_later_case_and_breaks() {
    let source = format!(
        "{} run(3) + '|' + run(4)",
        SWITCH_FALLTHROUGH
    );
    assert_eq!(eval(&source), s("34|4"));
    assert_eq!(
        eval("var r; switch ('b') { case 'a': r = 1; break; case 'b': r = 2; break; case 'c': r = 3; } r"),
        JsValue::Number(2.0)
    );
}

#[test]
fn test_switch_uses_strict_equality() {
    assert_eq!(
        eval("var r = 'none'; switch (1) { case '1': r = 'string'; break; case 1: r = 'number'; } r"),
        s("number")
    );
}

#[test]
fn test_labeled_break_runs_finally_once() {
    let source = r#"
        var a = 10;
        var reached = false;
        foo: {
            try {
                break foo;
            } finally {
                a--;
            }
            reached = true;
        }
        [a, reached].join()
    "#;
    assert_eq!(eval(source), s("9,false"));
}

#[test]
fn test_labeled_continue() {
    let source = r#"
        var pairs = [];
        outer: for (var i = 0; i < 3; i++) {
            for (var j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                pairs.push(i + '' + j);
            }
        }
        pairs.join()
    "#;
    assert_eq!(eval(source), s("00,10,20"));
}

#[test]
fn test_while_and_do_while() {
    assert_eq!(eval("var i = 0; while (i < 5) i++; i"), JsValue::Number(5.0));
    assert_eq!(eval("var i = 10; do { i++; } while (i < 5); i"), JsValue::Number(11.0));
    assert_eq!(
        eval("var n = 0; while (true) { n++; if (n > 3) break; } n"),
        JsValue::Number(4.0)
    );
}

#[test]
fn test_for_loop_with_continue() {
    assert_eq!(
        eval("var sum = 0; for (var i = 0; i < 10; i++) { if (i % 2) continue; sum += i; } sum"),
        JsValue::Number(20.0)
    );
}

#[test]
fn test_for_in_enumerates_in_insertion_order() {
    assert_eq!(
        eval("var keys = ''; var o = {b: 1, a: 2, c: 3}; for (var k in o) keys += k; keys"),
        s("bac")
    );
}

#[test]
fn test_for_in_includes_inherited_and_skips_hidden() {
    let source = r#"
        var proto = {inherited: 1};
        var o = Object.create(proto);
        o.own = 2;
        Object.defineProperty(o, 'hidden', {value: 3, enumerable: false});
        var keys = [];
        for (var k in o) keys.push(k);
        keys.join()
    "#;
    assert_eq!(eval(source), s("own,inherited"));
}

#[test]
fn test_for_in_skips_deleted_keys() {
    let source = r#"
        var o = {a: 1, b: 2, c: 3};
        var seen = [];
        for (var k in o) { seen.push(k); delete o.b; }
        seen.join()
    "#;
    assert_eq!(eval(source), s("a,c"));
}

#[test]
fn test_try_catch() {
    assert_eq!(eval("var r; try { throw 'boom'; } catch (e) { r = e; } r"), s("boom"));
    assert_eq!(
        eval("var r; try { null.x; } catch (e) { r = e instanceof TypeError; } r"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_catch_scope_is_local() {
    assert_eq!(
        eval("var e = 'outer'; try { throw 'inner'; } catch (e) { } e"),
        s("outer")
    );
}

#[test]
fn test_finally_runs_on_return() {
    let source = r#"
        var log = [];
        function f() {
            try {
                log.push('try');
                return 'from try';
            } finally {
                log.push('finally');
            }
        }
        var r = f();
        log.join() + ':' + r
    "#;
    assert_eq!(eval(source), s("try,finally:from try"));
}

#[test]
fn test_finally_completion_supersedes() {
    let source = r#"
        function f() {
            try {
                throw new Error('lost');
            } finally {
                return 'finally wins';
            }
        }
        f()
    "#;
    assert_eq!(eval(source), s("finally wins"));
}

#[test]
fn test_rethrow_from_catch_runs_finally() {
    let source = r#"
        var log = [];
        try {
            try {
                throw 1;
            } catch (e) {
                log.push('catch ' + e);
                throw e + 1;
            } finally {
                log.push('finally');
            }
        } catch (e) {
            log.push('outer ' + e);
        }
        log.join()
    "#;
    assert_eq!(eval(source), s("catch 1,finally,outer 2"));
}

#[test]
fn test_break_out_of_loop_through_finally() {
    let source = r#"
        var count = 0;
        for (var i = 0; i < 5; i++) {
            try {
                if (i === 2) break;
            } finally {
                count++;
            }
        }
        i + ':' + count
    "#;
    assert_eq!(eval(source), s("2:3"));
}

#[test]
fn test_uncaught_throw_reaches_host() {
    let err = eval_result("throw new RangeError('out of range')");
    assert!(matches!(&err, Err(e) if e.to_string().contains("RangeError: out of range")));
}

#[test]
fn test_if_else_chain() {
    assert_eq!(
        eval("var x = 5, r; if (x < 3) r = 'low'; else if (x < 7) r = 'mid'; else r = 'high'; r"),
        s("mid")
    );
}
