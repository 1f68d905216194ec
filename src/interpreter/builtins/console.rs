//! Console built-in methods
//!
//! Output goes to the interpreter's `ConsoleProvider`. Arguments are
//! rendered without running interpreted code, joined by spaces.

use crate::error::JsError;
use crate::interpreter::native::NativeCall;
use crate::interpreter::operators::to_js_string;
use crate::interpreter::Interpreter;
use crate::platform::ConsoleLevel;
use crate::value::{JsValue, ObjectClass};

pub fn init_console(interp: &mut Interpreter) -> Result<(), JsError> {
    let console = interp.create_namespace("console")?;
    interp.register_method(console, "console", "log", console_log, 0)?;
    interp.register_method(console, "console", "info", console_info, 0)?;
    interp.register_method(console, "console", "debug", console_debug, 0)?;
    interp.register_method(console, "console", "warn", console_warn, 0)?;
    interp.register_method(console, "console", "error", console_error, 0)?;
    Ok(())
}

fn write(interp: &Interpreter, call: &NativeCall, level: ConsoleLevel) -> Result<JsValue, JsError> {
    let parts: Vec<String> = call.args.iter().map(|arg| render(interp, arg, true)).collect();
    interp.console_write(level, &parts.join(" "));
    Ok(JsValue::Undefined)
}

/// Text for one argument. Arrays show their elements one level deep.
fn render(interp: &Interpreter, value: &JsValue, top: bool) -> String {
    let Some(id) = value.as_object() else {
        return to_js_string(value).to_string();
    };
    let Ok(record) = interp.object(id) else {
        return interp.describe(value);
    };
    match record.class {
        ObjectClass::Error => interp.render_error(value),
        ObjectClass::Array if top => {
            let items: Vec<String> = (0..record.length())
                .map(|index| match record.get_own_value(&index.to_string()) {
                    JsValue::Undefined => String::new(),
                    item => render(interp, &item, false),
                })
                .collect();
            items.join(",")
        }
        _ => interp.describe(value),
    }
}

fn console_log(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    write(interp, call, ConsoleLevel::Log)
}

fn console_info(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    write(interp, call, ConsoleLevel::Info)
}

fn console_debug(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    write(interp, call, ConsoleLevel::Debug)
}

fn console_warn(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    write(interp, call, ConsoleLevel::Warn)
}

fn console_error(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    write(interp, call, ConsoleLevel::Error)
}
