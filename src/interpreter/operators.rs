//! Operator semantics on primitive values
//!
//! Operands reach these functions already converted with ToPrimitive (which
//! may run interpreted `valueOf`/`toString` and therefore lives in the state
//! machine). What remains is pure arithmetic, comparison and coercion of
//! primitives, following ES5 clauses 9 and 11.

use crate::ast::BinaryOp;
use crate::error::JsError;
use crate::number::{number_to_string, string_to_number, to_int32, to_uint32};
use crate::value::{JsString, JsValue};

/// Preferred type for ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

impl Hint {
    pub fn as_str(self) -> &'static str {
        match self {
            Hint::Default => "default",
            Hint::Number => "number",
            Hint::String => "string",
        }
    }

    pub fn from_value(value: &JsValue) -> Self {
        match value.as_str() {
            Some("number") => Hint::Number,
            Some("string") => Hint::String,
            _ => Hint::Default,
        }
    }
}

/// ToString for a primitive. Objects should have been converted already;
/// they render as a generic tag here.
pub fn to_js_string(value: &JsValue) -> JsString {
    match value {
        JsValue::Undefined => JsString::from("undefined"),
        JsValue::Null => JsString::from("null"),
        JsValue::Boolean(true) => JsString::from("true"),
        JsValue::Boolean(false) => JsString::from("false"),
        JsValue::Number(n) => JsString::from(number_to_string(*n)),
        JsValue::String(s) => s.clone(),
        JsValue::Object(_) => JsString::from("[object Object]"),
    }
}

/// ToNumber for a primitive. Objects yield NaN here.
pub fn to_number(value: &JsValue) -> f64 {
    match value {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => f64::from(u8::from(*b)),
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s.as_str()),
        JsValue::Object(_) => f64::NAN,
    }
}

/// Whether `value`, as an operand of `op`, must go through ToPrimitive
/// first, and with which hint. `other` is the opposite operand.
pub fn conversion_hint(op: BinaryOp, value: &JsValue, other: &JsValue, is_left: bool) -> Option<Hint> {
    if !value.is_object() {
        return None;
    }
    match op {
        BinaryOp::StrictEq | BinaryOp::StrictNotEq | BinaryOp::Instanceof => None,
        BinaryOp::In => is_left.then_some(Hint::String),
        BinaryOp::Eq | BinaryOp::NotEq => {
            if other.is_object() || other.is_null_or_undefined() {
                None
            } else {
                Some(Hint::Default)
            }
        }
        BinaryOp::Add => Some(Hint::Default),
        _ => Some(Hint::Number),
    }
}

/// Abstract equality (`==`) once objects compared against primitives have
/// been converted
pub fn loose_equals(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
        (JsValue::Number(_), JsValue::String(_))
        | (JsValue::String(_), JsValue::Number(_))
        | (JsValue::Boolean(_), _)
        | (_, JsValue::Boolean(_)) => {
            if a.is_object() || b.is_object() {
                return false;
            }
            to_number(a) == to_number(b)
        }
        _ => a.strict_equals(b),
    }
}

/// Abstract relational comparison `a < b`. `None` means undefined (a NaN
/// was involved).
pub fn less_than(a: &JsValue, b: &JsValue) -> Option<bool> {
    if let (JsValue::String(x), JsValue::String(y)) = (a, b) {
        return Some(x.as_str().encode_utf16().lt(y.as_str().encode_utf16()));
    }
    let x = to_number(a);
    let y = to_number(b);
    if x.is_nan() || y.is_nan() {
        None
    } else {
        Some(x < y)
    }
}

/// ES5 11.5.3: the result takes the sign of the dividend
fn js_remainder(n: f64, d: f64) -> f64 {
    if n.is_nan() || d.is_nan() || n.is_infinite() || d == 0.0 {
        f64::NAN
    } else if d.is_infinite() || n == 0.0 {
        n
    } else {
        libm::fmod(n, d)
    }
}

/// Apply a binary operator to primitive operands. `in` and `instanceof`
/// need the heap and are handled by the caller.
pub fn apply_binary(op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<JsValue, JsError> {
    let number = |f: fn(f64, f64) -> f64| JsValue::Number(f(to_number(left), to_number(right)));
    Ok(match op {
        BinaryOp::Add => {
            if matches!(left, JsValue::String(_)) || matches!(right, JsValue::String(_)) {
                let mut joined = to_js_string(left).as_str().to_string();
                joined.push_str(to_js_string(right).as_str());
                JsValue::from(joined)
            } else {
                number(|a, b| a + b)
            }
        }
        BinaryOp::Sub => number(|a, b| a - b),
        BinaryOp::Mul => number(|a, b| a * b),
        BinaryOp::Div => number(|a, b| a / b),
        BinaryOp::Mod => number(js_remainder),

        BinaryOp::Eq => JsValue::Boolean(loose_equals(left, right)),
        BinaryOp::NotEq => JsValue::Boolean(!loose_equals(left, right)),
        BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(right)),
        BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(right)),
        BinaryOp::Lt => JsValue::Boolean(less_than(left, right).unwrap_or(false)),
        BinaryOp::Gt => JsValue::Boolean(less_than(right, left).unwrap_or(false)),
        BinaryOp::LtEq => JsValue::Boolean(less_than(right, left).is_some_and(|r| !r)),
        BinaryOp::GtEq => JsValue::Boolean(less_than(left, right).is_some_and(|r| !r)),

        BinaryOp::BitAnd => int32(left, right, |a, b| a & b),
        BinaryOp::BitOr => int32(left, right, |a, b| a | b),
        BinaryOp::BitXor => int32(left, right, |a, b| a ^ b),
        BinaryOp::LShift => {
            let shift = to_uint32(to_number(right)) & 0x1f;
            JsValue::from(to_int32(to_number(left)).wrapping_shl(shift))
        }
        BinaryOp::RShift => {
            let shift = to_uint32(to_number(right)) & 0x1f;
            JsValue::from(to_int32(to_number(left)) >> shift)
        }
        BinaryOp::URShift => {
            let shift = to_uint32(to_number(right)) & 0x1f;
            JsValue::from(to_uint32(to_number(left)) >> shift)
        }

        BinaryOp::In | BinaryOp::Instanceof => {
            return Err(JsError::host_fault(format!(
                "operator {:?} needs heap access",
                op
            )));
        }
    })
}

fn int32(left: &JsValue, right: &JsValue, f: fn(i32, i32) -> i32) -> JsValue {
    JsValue::from(f(to_int32(to_number(left)), to_int32(to_number(right))))
}
