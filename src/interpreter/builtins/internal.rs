//! Internal natives used by the evaluator itself
//!
//! `ToPrimitive` is not reachable from interpreted code by name; the step
//! dispatcher pushes a call to it whenever an operator needs an object
//! converted, so `valueOf`/`toString` run as ordinary interpreted calls.

use crate::error::JsError;
use crate::interpreter::native::{done, native, reenter_call, Continuation, NativeCall, NativeResult};
use crate::interpreter::operators::{to_js_string, Hint};
use crate::interpreter::Interpreter;
use crate::value::{JsString, JsValue};

pub fn init_internal(interp: &mut Interpreter) -> Result<(), JsError> {
    interp.register_native("ToPrimitive", 2, native(to_primitive), None);
    let func = interp.create_native_function("ToPrimitive", "ToPrimitive")?;
    interp.set_builtin("ToPrimitive", JsValue::Object(func));
    Ok(())
}

/// ES5 8.12.8 `[[DefaultValue]]`. Arguments: the value and a hint string.
///
/// `phase` counts the methods tried so far; after each re-entry the result
/// is checked and the next method is tried if it was not a primitive.
pub fn to_primitive(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    let value = call.arg(0);
    if !value.is_object() {
        return done(value);
    }
    if let Some(result) = call.resumed.take() {
        if !result.is_object() {
            return done(result);
        }
    }
    let methods = match Hint::from_value(&call.arg(1)) {
        Hint::String => ["toString", "valueOf"],
        Hint::Number | Hint::Default => ["valueOf", "toString"],
    };
    while let Some(name) = methods.get(call.phase as usize) {
        call.phase += 1;
        let method = interp.get(&value, name, call.owner)?;
        if interp.is_callable(&method) {
            return reenter_call(method, value, Vec::new());
        }
    }
    Err(JsError::type_error("Cannot convert object to primitive value"))
}

/// Convert `value` to a primitive. Objects yield `Err(reenter)`: the
/// caller returns it as its own result and calls again once resumed, when
/// the converted value is taken from `call.resumed`.
pub(crate) fn primitive_or_reenter(
    interp: &Interpreter,
    call: &mut NativeCall,
    value: &JsValue,
    hint: Hint,
) -> Result<Result<JsValue, NativeResult>, JsError> {
    if let Some(resumed) = call.resumed.take() {
        return Ok(Ok(resumed));
    }
    if value.is_object() {
        let func = interp
            .builtin("ToPrimitive")
            .ok_or_else(|| JsError::host_fault("ToPrimitive is not installed"))?;
        return Ok(Err(NativeResult::Reenter(Continuation::Call {
            func,
            this: JsValue::Undefined,
            args: vec![value.clone(), JsValue::from(hint.as_str())],
        })));
    }
    Ok(Ok(value.clone()))
}

/// [`primitive_or_reenter`] followed by ToString
pub(crate) fn string_or_reenter(
    interp: &Interpreter,
    call: &mut NativeCall,
    value: &JsValue,
) -> Result<Result<JsString, NativeResult>, JsError> {
    Ok(primitive_or_reenter(interp, call, value, Hint::String)?.map(|v| to_js_string(&v)))
}
