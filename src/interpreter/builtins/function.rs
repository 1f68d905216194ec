//! Function.prototype built-in methods (call, apply, bind, toString)
//!
//! `call` and `apply` use the re-entrant protocol: they ask the interpreter
//! to run the target and hand back its result, so an interpreted target runs
//! on the thread's own state stack.

use crate::error::JsError;
use crate::interpreter::native::{done, reenter_call, NativeCall, NativeResult};
use crate::interpreter::permission::Access;
use crate::interpreter::Interpreter;
use crate::value::{JsFunction, JsObject, JsValue, ObjectClass, Property};

use super::this_object;

pub fn init_function(interp: &mut Interpreter) -> Result<(), JsError> {
    let proto = interp.builtin_object("Function.prototype")?;
    interp.register_resumable(proto, "Function.prototype", "call", function_call, 1)?;
    interp.register_resumable(proto, "Function.prototype", "apply", function_apply, 2)?;
    interp.register_method(proto, "Function.prototype", "bind", function_bind, 1)?;
    interp.register_method(proto, "Function.prototype", "toString", function_to_string, 0)?;
    Ok(())
}

fn function_call(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    if let Some(result) = call.resumed.take() {
        return done(result);
    }
    let mut args = call.args.iter().cloned();
    let this = args.next().unwrap_or_default();
    reenter_call(call.this.clone(), this, args.collect())
}

fn function_apply(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    if let Some(result) = call.resumed.take() {
        return done(result);
    }
    let args = match call.arg(1) {
        JsValue::Undefined | JsValue::Null => Vec::new(),
        JsValue::Object(list) => {
            interp.authorize(call.owner, list, Access::Read)?;
            let len = interp.object(list)?.length();
            let base = JsValue::Object(list);
            (0..len)
                .map(|index| interp.get(&base, &index.to_string(), call.owner))
                .collect::<Result<Vec<_>, _>>()?
        }
        _ => {
            return Err(JsError::type_error(
                "CreateListFromArrayLike called on non-object",
            ));
        }
    };
    reenter_call(call.this.clone(), call.arg(0), args)
}

fn function_bind(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let target = this_object(call, "Function.prototype.bind")?;
    if !interp.object(target)?.is_callable() {
        return Err(JsError::type_error("Bind must be called on a function"));
    }
    let mut args = call.args.iter().cloned();
    let this = args.next().unwrap_or_default();
    let bound_args: Vec<JsValue> = args.collect();

    let target_record = interp.object(target)?;
    let name = match target_record.get_own_value("name") {
        JsValue::String(name) => format!("bound {}", name),
        _ => "bound ".to_string(),
    };
    let length = match target_record.get_own_value("length") {
        JsValue::Number(n) => (n - bound_args.len() as f64).max(0.0),
        _ => 0.0,
    };

    let proto = interp.builtin_object("Function.prototype")?;
    let mut func = JsObject::new(ObjectClass::Function, Some(proto), call.owner);
    func.function = Some(JsFunction::Bound {
        target,
        this,
        args: bound_args,
    });
    func.insert("length", Property::frozen(JsValue::Number(length)));
    func.insert("name", Property::frozen(JsValue::from(name)));
    Ok(JsValue::Object(interp.alloc(func)))
}

fn function_to_string(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let func = this_object(call, "Function.prototype.toString")?;
    let record = interp.object(func)?;
    let name = match record.get_own_value("name") {
        JsValue::String(name) => name.to_string(),
        _ => String::new(),
    };
    match &record.function {
        Some(JsFunction::Interpreted { func, .. }) => {
            let program = interp.heap.program(func.program)?;
            Ok(JsValue::from(program.text(func.node)))
        }
        Some(_) => Ok(JsValue::from(format!(
            "function {}() {{ [native code] }}",
            name
        ))),
        None => Err(JsError::type_error(
            "Function.prototype.toString requires that 'this' be a Function",
        )),
    }
}
