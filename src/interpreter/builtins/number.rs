//! Number and Boolean built-in methods
//!
//! Both are primitives only: `Number(x)` and `Boolean(x)` convert, and
//! neither can be used with `new`.

use crate::error::JsError;
use crate::interpreter::native::{done, native, NativeCall, NativeResult};
use crate::interpreter::operators::{to_number, Hint};
use crate::interpreter::Interpreter;
use crate::number::{number_to_string_radix, to_fixed, to_integer};
use crate::value::JsValue;

use super::builtin;
use super::internal::primitive_or_reenter;

pub fn init_number(interp: &mut Interpreter) -> Result<(), JsError> {
    let proto = interp.builtin_object("Number.prototype")?;
    interp.register_method(proto, "Number.prototype", "toString", number_to_string, 1)?;
    interp.register_method(proto, "Number.prototype", "toFixed", number_to_fixed, 1)?;
    interp.register_method(proto, "Number.prototype", "valueOf", number_value_of, 0)?;
    let ctor = interp.register_constructor("Number", native(number_function), None, 1)?;
    let constants = [
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("NaN", f64::NAN),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
    ];
    let record = interp.object_mut(ctor)?;
    for (name, value) in constants {
        record.insert(name, crate::value::Property::frozen(JsValue::Number(value)));
    }

    let proto = interp.builtin_object("Boolean.prototype")?;
    interp.register_method(proto, "Boolean.prototype", "toString", boolean_to_string, 0)?;
    interp.register_method(proto, "Boolean.prototype", "valueOf", boolean_value_of, 0)?;
    interp.register_constructor("Boolean", builtin(boolean_function), None, 1)?;
    Ok(())
}

/// `Number(value)`: ToNumber, running `valueOf`/`toString` for objects
fn number_function(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    if call.args.is_empty() {
        return done(0.0);
    }
    let value = call.arg(0);
    match primitive_or_reenter(interp, call, &value, Hint::Number)? {
        Ok(primitive) => done(to_number(&primitive)),
        Err(reenter) => Ok(reenter),
    }
}

fn this_number(call: &NativeCall, method: &str) -> Result<f64, JsError> {
    match call.this {
        JsValue::Number(n) => Ok(n),
        _ => Err(JsError::type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

fn number_to_string(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let n = this_number(call, "toString")?;
    let radix = match call.arg(0) {
        JsValue::Undefined => 10.0,
        other => to_integer(to_number(&other)),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JsError::range_error(
            "toString() radix must be between 2 and 36",
        ));
    }
    Ok(JsValue::from(number_to_string_radix(n, radix as u32)))
}

fn number_to_fixed(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let n = this_number(call, "toFixed")?;
    let digits = to_integer(to_number(&call.arg(0)));
    if !(0.0..=100.0).contains(&digits) {
        return Err(JsError::range_error(
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    Ok(JsValue::from(to_fixed(n, digits as usize)))
}

fn number_value_of(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    this_number(call, "valueOf").map(JsValue::Number)
}

/// `Boolean(value)`: ToBoolean never runs user code
fn boolean_function(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(call.arg(0).to_boolean()))
}

fn this_boolean(call: &NativeCall, method: &str) -> Result<bool, JsError> {
    match call.this {
        JsValue::Boolean(b) => Ok(b),
        _ => Err(JsError::type_error(format!(
            "Boolean.prototype.{} requires that 'this' be a Boolean",
            method
        ))),
    }
}

fn boolean_to_string(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let b = this_boolean(call, "toString")?;
    Ok(JsValue::from(if b { "true" } else { "false" }))
}

fn boolean_value_of(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    this_boolean(call, "valueOf").map(JsValue::Boolean)
}
