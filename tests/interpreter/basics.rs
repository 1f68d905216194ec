//! Basic language feature tests: arithmetic, conversions, operators, variables, builtins

use super::{eval, eval_output, s};
use snapjs::JsValue;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2"), JsValue::Number(3.0));
    assert_eq!(eval("10 - 4"), JsValue::Number(6.0));
    assert_eq!(eval("3 * 4"), JsValue::Number(12.0));
    assert_eq!(eval("15 / 3"), JsValue::Number(5.0));
    assert_eq!(eval("7 % 3"), JsValue::Number(1.0));
    assert_eq!(eval("-7 % 3"), JsValue::Number(-1.0));
}

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3"), JsValue::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3"), JsValue::Number(9.0));
    assert_eq!(eval("1 + 2 < 4 && 3 * 2 === 6"), JsValue::Boolean(true));
}

#[test]
fn test_ieee_edge_cases() {
    assert_eq!(eval("1 / 0"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("-1 / 0"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("1 / -0"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("0 / 0 !== 0 / 0"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN(0 / 0)"), JsValue::Boolean(true));
    assert_eq!(eval("String(0.1 + 0.2)"), s("0.30000000000000004"));
    assert_eq!(eval("String(1e21)"), s("1e+21"));
    assert_eq!(eval("String(-0)"), s("0"));
}

#[test]
fn test_bitwise_and_shifts() {
    assert_eq!(eval("-1 >>> 0"), JsValue::Number(4294967295.0));
    assert_eq!(eval("1 << 31"), JsValue::Number(-2147483648.0));
    assert_eq!(eval("-16 >> 2"), JsValue::Number(-4.0));
    assert_eq!(eval("-16 >>> 28"), JsValue::Number(15.0));
    assert_eq!(eval("5 & 3"), JsValue::Number(1.0));
    assert_eq!(eval("5 | 3"), JsValue::Number(7.0));
    assert_eq!(eval("5 ^ 3"), JsValue::Number(6.0));
    assert_eq!(eval("~5"), JsValue::Number(-6.0));
    assert_eq!(eval("1 << 33"), JsValue::Number(2.0));
}

#[test]
fn test_comparison() {
    assert_eq!(eval("1 < 2"), JsValue::Boolean(true));
    assert_eq!(eval("2 >= 2"), JsValue::Boolean(true));
    assert_eq!(eval("'b' > 'a'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < '9'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < 9"), JsValue::Boolean(false));
    assert_eq!(eval("NaN < 1 || NaN >= 1"), JsValue::Boolean(false));
}

#[test]
fn test_equality() {
    assert_eq!(eval("null == undefined"), JsValue::Boolean(true));
    assert_eq!(eval("null === undefined"), JsValue::Boolean(false));
    assert_eq!(eval("'1' == 1"), JsValue::Boolean(true));
    assert_eq!(eval("true == 1"), JsValue::Boolean(true));
    assert_eq!(eval("NaN == NaN"), JsValue::Boolean(false));
    assert_eq!(eval("0 === -0"), JsValue::Boolean(true));
    assert_eq!(eval("var o = {}; o == o && o !== {}"), JsValue::Boolean(true));
}

#[test]
fn test_string_coercion() {
    assert_eq!(eval("'a' + 1"), s("a1"));
    assert_eq!(eval("1 + '2'"), s("12"));
    assert_eq!(eval("'5' * '2'"), JsValue::Number(10.0));
    assert_eq!(eval("'' + null + undefined + true"), s("nullundefinedtrue"));
    assert_eq!(eval("[1, 2] + ''"), s("1,2"));
    assert_eq!(eval("({}) + ''"), s("[object Object]"));
}

#[test]
fn test_to_number_grammar() {
    assert_eq!(eval("Number('  12  ')"), JsValue::Number(12.0));
    assert_eq!(eval("Number('0x1F')"), JsValue::Number(31.0));
    assert_eq!(eval("Number('')"), JsValue::Number(0.0));
    assert_eq!(eval("Number('-Infinity')"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("isNaN(Number('inf'))"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN(Number('12px'))"), JsValue::Boolean(true));
    assert_eq!(eval("+true"), JsValue::Number(1.0));
    assert_eq!(eval("0xff"), JsValue::Number(255.0));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), s("number"));
    assert_eq!(eval("typeof 'x'"), s("string"));
    assert_eq!(eval("typeof null"), s("object"));
    assert_eq!(eval("typeof undefined"), s("undefined"));
    assert_eq!(eval("typeof notDeclaredAnywhere"), s("undefined"));
    assert_eq!(eval("typeof function () {}"), s("function"));
    assert_eq!(eval("typeof Math.max"), s("function"));
    assert_eq!(eval("void 0"), JsValue::Undefined);
}

#[test]
fn test_variables() {
    assert_eq!(eval("var x = 5; x"), JsValue::Number(5.0));
    assert_eq!(eval("var x = 5; x = 10; x"), JsValue::Number(10.0));
    assert_eq!(eval("var x = 1; x += 2; x *= 3; x"), JsValue::Number(9.0));
    assert_eq!(eval("var a = 1, b = a + 1; a + b"), JsValue::Number(3.0));
    assert_eq!(eval("y; var y = 3;"), JsValue::Undefined);
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval("var i = 1; i++"), JsValue::Number(1.0));
    assert_eq!(eval("var i = 1; ++i"), JsValue::Number(2.0));
    assert_eq!(eval("var i = 1; i--; i"), JsValue::Number(0.0));
    assert_eq!(eval("var o = {n: '4'}; o.n++; o.n"), JsValue::Number(5.0));
}

#[test]
fn test_conditional_and_logical() {
    assert_eq!(eval("true ? 1 : 2"), JsValue::Number(1.0));
    assert_eq!(eval("false ? 1 : 2"), JsValue::Number(2.0));
    assert_eq!(eval("0 || 'fallback'"), s("fallback"));
    assert_eq!(eval("1 && 'second'"), s("second"));
    assert_eq!(eval("(1, 2, 3)"), JsValue::Number(3.0));
}

#[test]
fn test_strings() {
    assert_eq!(eval("'hello'.length"), JsValue::Number(5.0));
    assert_eq!(eval("'hello'[1]"), s("e"));
    assert_eq!(eval("'hello'.charAt(4)"), s("o"));
    assert_eq!(eval("'hello'.charCodeAt(0)"), JsValue::Number(104.0));
    assert_eq!(eval("'hello'.indexOf('l')"), JsValue::Number(2.0));
    assert_eq!(eval("'hello'.slice(-3)"), s("llo"));
    assert_eq!(eval("'hello'.substring(3, 1)"), s("el"));
    assert_eq!(eval("'MiXeD'.toUpperCase() + 'MiXeD'.toLowerCase()"), s("MIXEDmixed"));
    assert_eq!(eval("'a\\tb\\u0041'"), s("a\tbA"));
}

#[test]
fn test_number_methods() {
    assert_eq!(eval("(255).toString(16)"), s("ff"));
    assert_eq!(eval("(3.14159).toFixed(2)"), s("3.14"));
    assert_eq!(eval("(5).valueOf()"), JsValue::Number(5.0));
    assert_eq!(eval("true.toString()"), s("true"));
    assert_eq!(eval("parseInt('42px')"), JsValue::Number(42.0));
    assert_eq!(eval("parseInt('ff', 16)"), JsValue::Number(255.0));
    assert_eq!(eval("parseFloat('3.5e2x')"), JsValue::Number(350.0));
}

#[test]
fn test_math() {
    assert_eq!(eval("Math.abs(-3)"), JsValue::Number(3.0));
    assert_eq!(eval("Math.floor(-1.5)"), JsValue::Number(-2.0));
    assert_eq!(eval("Math.ceil(1.2)"), JsValue::Number(2.0));
    assert_eq!(eval("Math.round(2.5)"), JsValue::Number(3.0));
    assert_eq!(eval("1 / Math.round(-0.4)"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("Math.max(1, 5, 3)"), JsValue::Number(5.0));
    assert_eq!(eval("Math.min()"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("Math.pow(2, 10)"), JsValue::Number(1024.0));
    assert_eq!(eval("Math.sqrt(16)"), JsValue::Number(4.0));
    assert_eq!(eval("var r = Math.random(); r >= 0 && r < 1"), JsValue::Boolean(true));
}

#[test]
fn test_json() {
    assert_eq!(
        eval("JSON.stringify({a: [1, 'x', null], b: true, c: undefined})"),
        s(r#"{"a":[1,"x",null],"b":true}"#)
    );
    assert_eq!(eval("JSON.stringify([1 / 0])"), s("[null]"));
    assert_eq!(eval("JSON.parse('{\"x\": [1, 2]}').x[1]"), JsValue::Number(2.0));
    assert_eq!(eval("JSON.stringify({a: 1}, null, 2)"), s("{\n  \"a\": 1\n}"));
}

#[test]
fn test_console_output() {
    let output = eval_output("console.log('a', 1, [1, 2]); console.warn('careful'); console.error(new TypeError('bad'))");
    assert_eq!(output, vec!["a 1 1,2", "careful", "TypeError: bad"]);
}

#[test]
fn test_global_constants_are_immutable() {
    assert_eq!(eval("typeof undefined"), s("undefined"));
    assert_eq!(eval("Infinity > 1e308"), JsValue::Boolean(true));
    assert!(super::throws_error("undefined = 1", "TypeError"));
}
