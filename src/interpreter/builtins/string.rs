//! String built-in methods
//!
//! Strings are primitives; methods see them through a transient box and
//! index them in UTF-16 code units, as `.length` does.

use crate::error::JsError;
use crate::interpreter::native::{done, native, NativeCall, NativeResult};
use crate::interpreter::operators::{to_js_string, to_number};
use crate::interpreter::Interpreter;
use crate::number::to_integer;
use crate::value::{JsString, JsValue};

use super::internal::string_or_reenter;

pub fn init_string(interp: &mut Interpreter) -> Result<(), JsError> {
    let proto = interp.builtin_object("String.prototype")?;
    interp.register_method(proto, "String.prototype", "charAt", string_char_at, 1)?;
    interp.register_method(proto, "String.prototype", "charCodeAt", string_char_code_at, 1)?;
    interp.register_method(proto, "String.prototype", "indexOf", string_index_of, 1)?;
    interp.register_method(proto, "String.prototype", "slice", string_slice, 2)?;
    interp.register_method(proto, "String.prototype", "substring", string_substring, 2)?;
    interp.register_method(proto, "String.prototype", "toUpperCase", string_to_upper_case, 0)?;
    interp.register_method(proto, "String.prototype", "toLowerCase", string_to_lower_case, 0)?;
    interp.register_method(proto, "String.prototype", "toString", string_to_string, 0)?;
    interp.register_method(proto, "String.prototype", "valueOf", string_to_string, 0)?;
    interp.register_constructor("String", native(string_function), None, 1)?;
    Ok(())
}

/// `String(value)`: ToString, running `toString`/`valueOf` for objects
fn string_function(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    if call.args.is_empty() {
        return done("");
    }
    let value = call.arg(0);
    match string_or_reenter(interp, call, &value)? {
        Ok(text) => done(text),
        Err(reenter) => Ok(reenter),
    }
}

/// The string a method was called on
fn this_string(call: &NativeCall, method: &str) -> Result<JsString, JsError> {
    match &call.this {
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Undefined | JsValue::Null | JsValue::Object(_) => Err(JsError::type_error(format!(
            "String.prototype.{} called on non-string",
            method
        ))),
        other => Ok(to_js_string(other)),
    }
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> JsValue {
    JsValue::from(String::from_utf16_lossy(units))
}

/// Integer position argument; `None` when it falls outside `0..len`
fn position(value: &JsValue, len: usize) -> Option<usize> {
    let n = to_integer(to_number(value));
    if n >= 0.0 && n < len as f64 {
        Some(n as usize)
    } else {
        None
    }
}

fn clamp_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer(to_number(value));
    n.clamp(0.0, len as f64) as usize
}

fn relative_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer(to_number(value));
    let len = len as f64;
    let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    index as usize
}

fn string_char_at(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let units = units(&this_string(call, "charAt")?);
    Ok(match position(&call.arg(0), units.len()).and_then(|i| units.get(i..=i)) {
        Some(unit) => from_units(unit),
        None => JsValue::from(""),
    })
}

fn string_char_code_at(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let units = units(&this_string(call, "charCodeAt")?);
    Ok(match position(&call.arg(0), units.len()).and_then(|i| units.get(i)) {
        Some(unit) => JsValue::from(u32::from(*unit)),
        None => JsValue::Number(f64::NAN),
    })
}

fn string_index_of(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let haystack = units(&this_string(call, "indexOf")?);
    let needle = units(&to_js_string(&call.arg(0)));
    let start = clamp_index(&call.arg(1), haystack.len(), 0);
    if needle.is_empty() {
        return Ok(JsValue::from(start as u32));
    }
    let found = haystack
        .windows(needle.len())
        .enumerate()
        .skip(start)
        .find(|(_, window)| *window == needle.as_slice())
        .map(|(index, _)| index as f64);
    Ok(JsValue::Number(found.unwrap_or(-1.0)))
}

fn string_slice(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let units = units(&this_string(call, "slice")?);
    let start = relative_index(&call.arg(0), units.len(), 0);
    let end = relative_index(&call.arg(1), units.len(), units.len());
    Ok(from_units(units.get(start..end).unwrap_or(&[])))
}

fn string_substring(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let units = units(&this_string(call, "substring")?);
    let a = clamp_index(&call.arg(0), units.len(), 0);
    let b = clamp_index(&call.arg(1), units.len(), units.len());
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(from_units(units.get(start..end).unwrap_or(&[])))
}

fn string_to_upper_case(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::from(this_string(call, "toUpperCase")?.to_uppercase()))
}

fn string_to_lower_case(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::from(this_string(call, "toLowerCase")?.to_lowercase()))
}

fn string_to_string(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    match &call.this {
        JsValue::String(s) => Ok(JsValue::String(s.clone())),
        _ => Err(JsError::type_error(
            "String.prototype.toString requires that 'this' be a String",
        )),
    }
}
