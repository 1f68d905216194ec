//! Array built-in methods

use crate::error::JsError;
use crate::interpreter::native::{done, reenter_call, NativeCall, NativeResult};
use crate::interpreter::operators::{to_js_string, to_number, Hint};
use crate::interpreter::Interpreter;
use crate::number::to_integer;
use crate::value::{JsString, JsValue, ObjectId};

use super::{builtin, this_object};

pub fn init_array(interp: &mut Interpreter) -> Result<(), JsError> {
    let proto = interp.builtin_object("Array.prototype")?;
    interp.register_method(proto, "Array.prototype", "push", array_push, 1)?;
    interp.register_method(proto, "Array.prototype", "pop", array_pop, 0)?;
    interp.register_resumable(proto, "Array.prototype", "join", array_join, 1)?;
    interp.register_method(proto, "Array.prototype", "indexOf", array_index_of, 1)?;
    interp.register_method(proto, "Array.prototype", "slice", array_slice, 2)?;
    interp.register_resumable(proto, "Array.prototype", "toString", array_to_string, 0)?;

    let ctor = interp.register_constructor(
        "Array",
        builtin(array_constructor),
        Some(builtin(array_constructor)),
        1,
    )?;
    interp.register_method(ctor, "Array", "isArray", array_is_array, 1)?;
    Ok(())
}

/// Length of an array-like `this`
fn length_of(interp: &Interpreter, call: &NativeCall, object: ObjectId) -> Result<u32, JsError> {
    let len = interp.get(&JsValue::Object(object), "length", call.owner)?;
    let len = to_integer(to_number(&len));
    Ok(len.clamp(0.0, f64::from(u32::MAX)) as u32)
}

/// Resolve a relative index argument against `len` (ES5 15.4.4.10)
fn relative_index(value: &JsValue, len: u32, default: u32) -> u32 {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer(to_number(value));
    let len = f64::from(len);
    let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    index as u32
}

fn array_constructor(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    if let [JsValue::Number(n)] = call.args.as_slice() {
        let len = *n as u32;
        if f64::from(len) != *n {
            return Err(JsError::range_error("Invalid array length"));
        }
        let array = interp.create_array(Vec::new(), call.owner)?;
        interp.put(&JsValue::Object(array), "length", JsValue::Number(*n), call.owner)?;
        return Ok(JsValue::Object(array));
    }
    let values = call.args.clone();
    Ok(JsValue::Object(interp.create_array(values, call.owner)?))
}

fn array_is_array(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let is_array = match call.arg(0) {
        JsValue::Object(id) => interp.object(id)?.is_array(),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

fn array_push(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let array = this_object(call, "Array.prototype.push")?;
    let base = JsValue::Object(array);
    let mut len = f64::from(length_of(interp, call, array)?);
    for value in call.args.clone() {
        interp.put(&base, &JsString::from(len.to_string()), value, call.owner)?;
        len += 1.0;
    }
    interp.put(&base, "length", JsValue::Number(len), call.owner)?;
    Ok(JsValue::Number(len))
}

fn array_pop(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let array = this_object(call, "Array.prototype.pop")?;
    let base = JsValue::Object(array);
    let len = length_of(interp, call, array)?;
    let Some(last) = len.checked_sub(1) else {
        interp.put(&base, "length", JsValue::from(0), call.owner)?;
        return Ok(JsValue::Undefined);
    };
    let key = last.to_string();
    let value = interp.get(&base, &key, call.owner)?;
    interp.delete_property(array, &key, call.owner)?;
    interp.put(&base, "length", JsValue::from(last), call.owner)?;
    Ok(value)
}

fn array_join(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    let separator = match call.arg(0) {
        JsValue::Undefined => JsString::from(","),
        other => to_js_string(&other),
    };
    join(interp, call, &separator)
}

fn array_to_string(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    join(interp, call, &JsString::from(","))
}

/// Join elements with `separator`. Object elements are converted through
/// ToPrimitive one at a time; `phase` is the next index and `scratch[0]` the
/// text so far.
fn join(interp: &mut Interpreter, call: &mut NativeCall, separator: &str) -> Result<NativeResult, JsError> {
    let array = this_object(call, "Array.prototype.join")?;
    let base = JsValue::Object(array);
    let len = length_of(interp, call, array)?;
    let mut out = match call.scratch.first() {
        Some(JsValue::String(text)) => text.to_string(),
        _ => String::new(),
    };
    if let Some(converted) = call.resumed.take() {
        out.push_str(&to_js_string(&converted));
    }
    while call.phase < len {
        let index = call.phase;
        call.phase += 1;
        if index > 0 {
            out.push_str(separator);
        }
        match interp.get(&base, &index.to_string(), call.owner)? {
            JsValue::Undefined | JsValue::Null => {}
            element @ JsValue::Object(_) => {
                call.scratch = vec![JsValue::from(out)];
                let func = interp
                    .builtin("ToPrimitive")
                    .ok_or_else(|| JsError::host_fault("ToPrimitive is not installed"))?;
                return reenter_call(
                    func,
                    JsValue::Undefined,
                    vec![element, JsValue::from(Hint::String.as_str())],
                );
            }
            element => out.push_str(&to_js_string(&element)),
        }
    }
    done(out)
}

fn array_index_of(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let array = this_object(call, "Array.prototype.indexOf")?;
    let base = JsValue::Object(array);
    let len = length_of(interp, call, array)?;
    let search = call.arg(0);
    let start = relative_index(&call.arg(1), len, 0);
    for index in start..len {
        let key = index.to_string();
        if interp.object(array)?.get_own(&key).is_none() {
            continue;
        }
        if interp.get(&base, &key, call.owner)?.strict_equals(&search) {
            return Ok(JsValue::from(index));
        }
    }
    Ok(JsValue::from(-1))
}

fn array_slice(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let array = this_object(call, "Array.prototype.slice")?;
    let base = JsValue::Object(array);
    let len = length_of(interp, call, array)?;
    let start = relative_index(&call.arg(0), len, 0);
    let end = relative_index(&call.arg(1), len, len);
    let mut values = Vec::new();
    for index in start..end.max(start) {
        values.push(interp.get(&base, &index.to_string(), call.owner)?);
    }
    Ok(JsValue::Object(interp.create_array(values, call.owner)?))
}
