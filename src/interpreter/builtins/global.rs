//! Global functions and value properties

use crate::error::JsError;
use crate::interpreter::native::{done, native, Continuation, NativeCall, NativeResult};
use crate::interpreter::operators::{to_js_string, to_number};
use crate::interpreter::Interpreter;
use crate::number::{parse_float, parse_int, to_int32};
use crate::value::JsValue;

use super::builtin;

pub fn init_global(interp: &mut Interpreter) -> Result<(), JsError> {
    let global = interp.global_scope();
    interp.declare_immutable(global, "undefined", JsValue::Undefined)?;
    interp.declare_immutable(global, "NaN", JsValue::Number(f64::NAN))?;
    interp.declare_immutable(global, "Infinity", JsValue::Number(f64::INFINITY))?;

    interp.define_global_native("eval", 1, native(global_eval))?;
    interp.define_global_native("parseInt", 2, builtin(global_parse_int))?;
    interp.define_global_native("parseFloat", 1, builtin(global_parse_float))?;
    interp.define_global_native("isNaN", 1, builtin(global_is_nan))?;
    interp.define_global_native("isFinite", 1, builtin(global_is_finite))?;
    Ok(())
}

/// Indirect eval: the source runs in a fresh scope under the global scope
/// and the call returns its completion value. A parse error is thrown as a
/// SyntaxError at the call site.
fn global_eval(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    if let Some(completion) = call.resumed.take() {
        return done(completion);
    }
    let source = match call.arg(0) {
        JsValue::String(source) => source,
        other => return done(other),
    };
    let program = interp.parse(&source)?;
    tracing::debug!(thread = %call.thread, "eval");
    Ok(NativeResult::Reenter(Continuation::Eval { program }))
}

fn global_parse_int(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let input = to_js_string(&call.arg(0));
    let radix = match call.arg(1) {
        JsValue::Undefined => None,
        other => match to_int32(to_number(&other)) {
            0 => None,
            r => Some(u32::try_from(r).unwrap_or(u32::MAX)),
        },
    };
    Ok(JsValue::Number(parse_int(&input, radix)))
}

fn global_parse_float(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let input = to_js_string(&call.arg(0));
    Ok(JsValue::Number(parse_float(&input)))
}

fn global_is_nan(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(to_number(&call.arg(0)).is_nan()))
}

fn global_is_finite(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(to_number(&call.arg(0)).is_finite()))
}
