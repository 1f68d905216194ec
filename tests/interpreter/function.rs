//! Function tests: calls, closures, this, arguments, constructors, bind/call/apply

use super::{create_runtime_with, eval, s, throws_error};
use snapjs::{InterpreterConfig, JsError, JsValue};

#[test]
fn test_function_declaration_and_call() {
    assert_eq!(eval("function add(a, b) { return a + b; } add(2, 3)"), JsValue::Number(5.0));
    assert_eq!(eval("function noReturn() {} noReturn()"), JsValue::Undefined);
}

#[test]
fn test_function_declarations_are_hoisted() {
    assert_eq!(eval("var r = twice(4); function twice(x) { return x * 2; } r"), JsValue::Number(8.0));
}

#[test]
fn test_hoisted_function_shares_binding_with_var() {
    assert_eq!(eval("var before = typeof f; var f = 1; function f() {} before + ',' + typeof f"), s("function,number"));
    assert_eq!(
        eval("function outer() { var seen = typeof inner; function inner() { return 3; } return seen + inner(); } outer()"),
        s("function3")
    );
}

#[test]
fn test_missing_arguments_are_undefined() {
    assert_eq!(eval("function f(a, b) { return typeof b; } f(1)"), s("undefined"));
}

#[test]
fn test_arguments_object() {
    assert_eq!(
        eval("function f() { return arguments.length + ':' + arguments[1]; } f('a', 'b', 'c')"),
        s("3:b")
    );
}

#[test]
fn test_function_length_and_name() {
    assert_eq!(eval("function f(a, b, c) {} f.length"), JsValue::Number(3.0));
    assert_eq!(eval("function named() {} named.name"), s("named"));
    assert_eq!(eval("Math.max.name"), s("max"));
}

#[test]
fn test_closures_capture_scope() {
    let source = r#"
        function counter() {
            var n = 0;
            return function () { n += 1; return n; };
        }
        var a = counter(), b = counter();
        a(); a();
        a() + ',' + b()
    "#;
    assert_eq!(eval(source), s("3,1"));
}

#[test]
fn test_recursion() {
    assert_eq!(
        eval("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)"),
        JsValue::Number(610.0)
    );
}

#[test]
fn test_named_function_expression_sees_itself() {
    assert_eq!(
        eval("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5)"),
        JsValue::Number(120.0)
    );
    assert_eq!(eval("var f = function inner() {}; typeof inner"), s("undefined"));
}

#[test]
fn test_strict_this_is_undefined_for_plain_calls() {
    assert_eq!(eval("function f() { return this; } f()"), JsValue::Undefined);
    assert_eq!(eval("var o = {f: function () { return this === o; }}; o.f()"), JsValue::Boolean(true));
}

#[test]
fn test_assignment_to_undeclared_is_reference_error() {
    assert!(throws_error("function f() { undeclared = 1; } f()", "ReferenceError"));
    assert!(throws_error("missing + 1", "missing is not defined"));
}

#[test]
fn test_constructor_and_prototype() {
    let source = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        Point.prototype.sum = function () { return this.x + this.y; };
        var p = new Point(3, 4);
        [p.sum(), p instanceof Point, p.constructor === Point].join()
    "#;
    assert_eq!(eval(source), s("7,true,true"));
}

#[test]
fn test_constructor_returning_object_wins() {
    assert_eq!(
        eval("function F() { this.a = 1; return {b: 2}; } var o = new F(); o.a + ':' + o.b"),
        s("undefined:2")
    );
    assert_eq!(eval("function F() { this.a = 1; return 5; } new F().a"), JsValue::Number(1.0));
}

#[test]
fn test_call_and_apply() {
    let source = r#"
        function greet(greeting, mark) { return greeting + ' ' + this.name + mark; }
        var bob = {name: 'Bob'};
        greet.call(bob, 'Hi', '!') + ' / ' + greet.apply(bob, ['Bye', '.'])
    "#;
    assert_eq!(eval(source), s("Hi Bob! / Bye Bob."));
}

#[test]
fn test_bind_fixes_this_and_arguments() {
    let source = r#"
        function add(a, b) { return this.base + a + b; }
        var bound = add.bind({base: 100}, 10);
        [bound(1), bound.length, bound.name].join()
    "#;
    assert_eq!(eval(source), s("111,1,bound add"));
}

#[test]
fn test_new_on_bound_function_ignores_bound_this() {
    let source = r#"
        function P(x) { this.x = x; }
        var B = P.bind({ignored: true}, 7);
        var p = new B();
        [p.x, p instanceof P, p.ignored].join()
    "#;
    assert_eq!(eval(source), s("7,true,"));
}

#[test]
fn test_calling_non_function_is_type_error() {
    assert!(throws_error("var x = 1; x()", "TypeError"));
    assert!(throws_error("var o = {}; o.missing()", "is not a function"));
    assert!(throws_error("new Math.max()", "TypeError"));
}

#[test]
fn test_function_to_string() {
    assert_eq!(
        eval("function f(a) { return a; } f.toString()"),
        s("function f(a) { return a; }")
    );
    assert_eq!(eval("Math.abs.toString()"), s("function abs() { [native code] }"));
}

#[test]
fn test_indirect_eval() {
    assert_eq!(eval("eval('1 + 2')"), JsValue::Number(3.0));
    assert_eq!(eval("eval(42)"), JsValue::Number(42.0));
    // eval runs under the global scope, not the caller's
    assert_eq!(
        eval("var x = 'global'; function f() { var x = 'local'; return eval('x'); } f()"),
        s("global")
    );
    assert_eq!(eval("eval('var declared = 5;'); typeof declared"), s("undefined"));
}

#[test]
fn test_eval_syntax_error_is_catchable() {
    assert_eq!(
        eval("var r; try { eval('1 +'); } catch (e) { r = e instanceof SyntaxError; } r"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_deep_recursion_is_range_error() {
    let config = InterpreterConfig {
        max_stack_depth: 500,
        ..InterpreterConfig::default()
    };
    let (mut interp, _clock) = create_runtime_with(config);
    let result = interp.eval("function down(n) { return down(n + 1); } down(0)");
    assert!(
        matches!(&result, Err(JsError::Thrown { message, .. }) if message.contains("Maximum call stack size exceeded")),
        "unexpected result: {:?}",
        result
    );
}

#[test]
fn test_stack_overflow_is_catchable() {
    let config = InterpreterConfig {
        max_stack_depth: 500,
        ..InterpreterConfig::default()
    };
    let (mut interp, _clock) = create_runtime_with(config);
    let result = interp.eval(
        "function down() { return down(); } var r; try { down(); } catch (e) { r = e instanceof RangeError; } r",
    );
    assert!(matches!(result, Ok(JsValue::Boolean(true))));
}
