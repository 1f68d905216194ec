//! Error constructor built-in methods

use crate::error::{ErrorKind, JsError};
use crate::interpreter::native::{native, NativeCall, NativeResult};
use crate::interpreter::operators::to_js_string;
use crate::interpreter::Interpreter;
use crate::value::{JsValue, Property};

use super::this_object;

/// Create `Error` and the derived constructors, each with its own prototype
pub fn init_error(interp: &mut Interpreter) -> Result<(), JsError> {
    let root = Some(interp.root_owner());
    let object_proto = interp.builtin_object("Object.prototype")?;
    let error_proto = interp.create_object(Some(object_proto), root);
    interp.set_builtin(ErrorKind::Error.prototype_key(), JsValue::Object(error_proto));
    interp.register_method(error_proto, "Error.prototype", "toString", error_to_string, 0)?;

    for kind in ErrorKind::ALL {
        let proto = match kind {
            ErrorKind::Error => error_proto,
            _ => {
                let proto = interp.create_object(Some(error_proto), root);
                interp.set_builtin(kind.prototype_key(), JsValue::Object(proto));
                proto
            }
        };
        let record = interp.object_mut(proto)?;
        record.insert("name", Property::hidden(JsValue::from(kind.name())));
        record.insert("message", Property::hidden(JsValue::from("")));

        let ctor = native(move |interp, call| construct_error(interp, call, kind));
        interp.register_constructor(kind.name(), ctor.clone(), Some(ctor), 1)?;
    }
    Ok(())
}

/// `Error(message)` and `new Error(message)` behave the same
fn construct_error(
    interp: &mut Interpreter,
    call: &mut NativeCall,
    kind: ErrorKind,
) -> Result<NativeResult, JsError> {
    let message = match call.arg(0) {
        JsValue::Undefined => String::new(),
        other => to_js_string(&other).to_string(),
    };
    let error = interp.create_error(kind, &message, call.owner, Some(call.thread))?;
    Ok(NativeResult::Value(JsValue::Object(error)))
}

/// ES5 15.11.4.4
fn error_to_string(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    this_object(call, "Error.prototype.toString")?;
    let name = match interp.get(&call.this, "name", call.owner)? {
        JsValue::Undefined => "Error".to_string(),
        other => to_js_string(&other).to_string(),
    };
    let message = match interp.get(&call.this, "message", call.owner)? {
        JsValue::Undefined => String::new(),
        other => to_js_string(&other).to_string(),
    };
    Ok(JsValue::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}
