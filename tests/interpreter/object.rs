//! Object model tests: properties, prototypes, attributes, arrays, primitives

use super::{eval, s, throws_error};
use snapjs::JsValue;

#[test]
fn test_object_literal_and_member_access() {
    assert_eq!(eval("var o = {a: 1, 'b c': 2}; o.a + o['b c']"), JsValue::Number(3.0));
    assert_eq!(eval("var o = {}; o.x = 5; o['x']"), JsValue::Number(5.0));
    assert_eq!(eval("var o = {}; o.missing"), JsValue::Undefined);
    assert_eq!(eval("var o = {1: 'one'}; o[1] + o['1']"), s("oneone"));
}

#[test]
fn test_reading_from_null_is_type_error() {
    assert!(throws_error("var o = null; o.x", "Cannot read property 'x' of null"));
    assert!(throws_error("var u; u.x = 1", "TypeError"));
}

#[test]
fn test_in_and_delete() {
    assert_eq!(eval("var o = {a: 1}; ('a' in o) + ',' + ('b' in o)"), s("true,false"));
    assert_eq!(eval("var o = {a: 1}; delete o.a; 'a' in o"), JsValue::Boolean(false));
    assert_eq!(eval("var o = {}; delete o.nothing"), JsValue::Boolean(true));
    assert_eq!(eval("'toString' in {}"), JsValue::Boolean(true));
}

#[test]
fn test_prototype_chain() {
    let source = r#"
        var base = {greet: function () { return 'hi ' + this.name; }};
        var child = Object.create(base);
        child.name = 'kid';
        [child.greet(), Object.getPrototypeOf(child) === base, child.hasOwnProperty('greet')].join()
    "#;
    assert_eq!(eval(source), s("hi kid,true,false"));
}

#[test]
fn test_object_create_with_descriptors() {
    let source = r#"
        var o = Object.create(null, {x: {value: 1, enumerable: true}, y: {value: 2}});
        [Object.getPrototypeOf(o), Object.keys(o).join('|'), o.y].join()
    "#;
    assert_eq!(eval(source), s(",x,2"));
}

#[test]
fn test_prototype_cycle_is_rejected() {
    assert!(throws_error(
        "var a = {}; var b = Object.create(a); Object.setPrototypeOf(a, b)",
        "Cyclic __proto__ value"
    ));
    assert!(throws_error("var a = {}; Object.setPrototypeOf(a, a)", "Cyclic"));
}

#[test]
fn test_set_prototype_of() {
    assert_eq!(
        eval("var p = {v: 7}; var o = Object.setPrototypeOf({}, p); o.v"),
        JsValue::Number(7.0)
    );
}

#[test]
fn test_define_property_attributes() {
    let source = r#"
        var o = {};
        Object.defineProperty(o, 'fixed', {value: 1});
        var d = Object.getOwnPropertyDescriptor(o, 'fixed');
        [d.value, d.writable, d.enumerable, d.configurable].join()
    "#;
    assert_eq!(eval(source), s("1,false,false,false"));
}

#[test]
fn test_non_writable_rejects_assignment() {
    assert!(throws_error(
        "var o = {}; Object.defineProperty(o, 'k', {value: 1}); o.k = 2",
        "Cannot assign to read only property 'k'"
    ));
    assert!(throws_error("Math.PI = 3", "read only"));
}

#[test]
fn test_non_configurable_rejects_delete_and_redefine() {
    assert!(throws_error(
        "var o = {}; Object.defineProperty(o, 'k', {value: 1}); delete o.k",
        "TypeError"
    ));
    assert!(throws_error(
        "var o = {}; Object.defineProperty(o, 'k', {value: 1}); Object.defineProperty(o, 'k', {enumerable: true})",
        "Cannot redefine property: k"
    ));
}

#[test]
fn test_prevent_extensions() {
    assert_eq!(
        eval("var o = {a: 1}; Object.preventExtensions(o); o.a = 2; [o.a, Object.isExtensible(o)].join()"),
        s("2,false")
    );
    assert!(throws_error(
        "var o = {}; Object.preventExtensions(o); o.b = 1",
        "object is not extensible"
    ));
}

#[test]
fn test_keys_and_names() {
    assert_eq!(eval("Object.keys({z: 1, a: 2}).join()"), s("z,a"));
    assert_eq!(eval("Object.getOwnPropertyNames([1, 2]).join()"), s("0,1,length"));
    assert_eq!(eval("Object.keys([5, 6]).join()"), s("0,1"));
}

#[test]
fn test_object_to_string_tags() {
    assert_eq!(eval("Object.prototype.toString.call([])"), s("[object Array]"));
    assert_eq!(eval("Object.prototype.toString.call(null)"), s("[object Null]"));
    assert_eq!(eval("String({})"), s("[object Object]"));
}

#[test]
fn test_array_length_semantics() {
    assert_eq!(eval("var a = [1, 2, 3]; a.length"), JsValue::Number(3.0));
    assert_eq!(eval("var a = []; a[5] = 'x'; a.length"), JsValue::Number(6.0));
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; typeof a[2] + a.length"), s("undefined1"));
    assert!(throws_error("var a = []; a.length = -1", "Invalid array length"));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("var a = [1]; a.push(2, 3); a.join('-')"), s("1-2-3"));
    assert_eq!(eval("var a = [1, 2]; a.pop() + a.length"), JsValue::Number(3.0));
    assert_eq!(eval("[1, 2, 3, 2].indexOf(2, 2)"), JsValue::Number(3.0));
    assert_eq!(eval("[1, 2, 3].indexOf('2')"), JsValue::Number(-1.0));
    assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), s("2,3"));
    assert_eq!(eval("[1, null, undefined, 'x'].join()"), s("1,,,x"));
    assert_eq!(eval("Array.isArray([]) && !Array.isArray({})"), JsValue::Boolean(true));
    assert_eq!(eval("new Array(3).length"), JsValue::Number(3.0));
    assert_eq!(eval("Array(1, 2).join()"), s("1,2"));
}

#[test]
fn test_join_calls_interpreted_to_string() {
    assert_eq!(
        eval("var item = {toString: function () { return 'custom'; }}; [1, item].join(' & ')"),
        s("1 & custom")
    );
}

#[test]
fn test_value_of_used_for_arithmetic() {
    assert_eq!(
        eval("var money = {valueOf: function () { return 40; }}; money + 2"),
        JsValue::Number(42.0)
    );
    assert_eq!(
        eval("var named = {toString: function () { return 'N'; }}; 'name: ' + String(named)"),
        s("name: N")
    );
}

#[test]
fn test_primitive_boxes_are_read_only() {
    assert!(throws_error("var str = 'abc'; str.extra = 1", "Cannot assign to property 'extra' of primitive value"));
    assert_eq!(eval("'abc'.missing"), JsValue::Undefined);
    assert_eq!(eval("(5).constructor === Number"), JsValue::Boolean(true));
}

#[test]
fn test_instanceof_walks_prototype_chain() {
    assert_eq!(eval("[] instanceof Array && [] instanceof Object"), JsValue::Boolean(true));
    assert_eq!(eval("({}) instanceof Array"), JsValue::Boolean(false));
    assert_eq!(eval("1 instanceof Number"), JsValue::Boolean(false));
    assert!(throws_error("({}) instanceof 5", "TypeError"));
}
