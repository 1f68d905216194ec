//! JSON built-in methods
//!
//! Both directions go through `serde_json::Value`. Only plain data is
//! supported: `toJSON`, replacers and revivers are not, and a cycle is a
//! TypeError.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::JsError;
use crate::interpreter::native::NativeCall;
use crate::interpreter::operators::{to_js_string, to_number};
use crate::interpreter::Interpreter;
use crate::value::{JsValue, ObjectId, Owner};

/// Nesting depth past which stringify gives up
const MAX_DEPTH: usize = 512;

pub fn init_json(interp: &mut Interpreter) -> Result<(), JsError> {
    let json = interp.create_namespace("JSON")?;
    interp.register_method(json, "JSON", "stringify", json_stringify, 3)?;
    interp.register_method(json, "JSON", "parse", json_parse, 2)?;
    Ok(())
}

fn json_stringify(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let mut visiting = Vec::new();
    let Some(json) = to_json(interp, &call.arg(0), call.owner, &mut visiting)? else {
        return Ok(JsValue::Undefined);
    };
    let indent = match call.arg(2) {
        JsValue::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)?
    } else {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        json.serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|e| JsError::host_fault(e.to_string()))?
    };
    Ok(JsValue::from(text))
}

/// Convert a value; `None` for values JSON has no text for (undefined,
/// functions)
fn to_json(
    interp: &Interpreter,
    value: &JsValue,
    actor: Option<Owner>,
    visiting: &mut Vec<ObjectId>,
) -> Result<Option<serde_json::Value>, JsError> {
    let object = match value {
        JsValue::Undefined => return Ok(None),
        JsValue::Null => return Ok(Some(serde_json::Value::Null)),
        JsValue::Boolean(b) => return Ok(Some(serde_json::Value::Bool(*b))),
        JsValue::Number(n) => return Ok(Some(number_to_json(*n))),
        JsValue::String(s) => return Ok(Some(serde_json::Value::String(s.to_string()))),
        JsValue::Object(id) => *id,
    };
    if interp.is_callable(value) {
        return Ok(None);
    }
    if visiting.contains(&object) {
        return Err(JsError::type_error("Converting circular structure to JSON"));
    }
    if visiting.len() >= MAX_DEPTH {
        return Err(JsError::range_error("JSON.stringify nesting too deep"));
    }
    visiting.push(object);

    let json = if interp.object(object)?.is_array() {
        let len = to_number(&interp.get(value, "length", actor)?);
        let len = if len.is_finite() && len > 0.0 { len as u32 } else { 0 };
        let mut items = Vec::new();
        for index in 0..len {
            let item = interp.get(value, &index.to_string(), actor)?;
            items.push(to_json(interp, &item, actor, visiting)?.unwrap_or(serde_json::Value::Null));
        }
        serde_json::Value::Array(items)
    } else {
        let mut map = serde_json::Map::new();
        for key in interp.own_keys(object, actor, false)? {
            let item = interp.get(value, &key, actor)?;
            if let Some(json) = to_json(interp, &item, actor, visiting)? {
                map.insert(key.to_string(), json);
            }
        }
        serde_json::Value::Object(map)
    };

    visiting.pop();
    Ok(Some(json))
}

/// Integral numbers print without a fraction; non-finite ones as `null`
fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn json_parse(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let text = to_js_string(&call.arg(0));
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        JsError::syntax_error(format!("JSON.parse: {}", e), e.line() as u32, e.column() as u32)
    })?;
    from_json(interp, &json, call.owner)
}

fn from_json(
    interp: &mut Interpreter,
    json: &serde_json::Value,
    owner: Option<Owner>,
) -> Result<JsValue, JsError> {
    Ok(match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Boolean(*b),
        serde_json::Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => JsValue::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let values = items
                .iter()
                .map(|item| from_json(interp, item, owner))
                .collect::<Result<Vec<_>, _>>()?;
            JsValue::Object(interp.create_array(values, owner)?)
        }
        serde_json::Value::Object(map) => {
            let object = interp.create_plain_object(owner)?;
            let base = JsValue::Object(object);
            for (key, item) in map {
                let value = from_json(interp, item, owner)?;
                interp.put(&base, key, value, owner)?;
            }
            base
        }
    })
}
