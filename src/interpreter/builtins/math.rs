//! Math built-in methods
//!
//! Arguments are converted with the primitive ToNumber; an object argument
//! yields NaN rather than running its `valueOf`.

use crate::error::JsError;
use crate::interpreter::native::NativeCall;
use crate::interpreter::operators::to_number;
use crate::interpreter::Interpreter;
use crate::value::{JsValue, Property};

type Unary = fn(f64) -> f64;

pub fn init_math(interp: &mut Interpreter) -> Result<(), JsError> {
    let math = interp.create_namespace("Math")?;

    let constants = [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ];
    let record = interp.object_mut(math)?;
    for (name, value) in constants {
        record.insert(name, Property::frozen(JsValue::Number(value)));
    }

    interp.register_method(math, "Math", "abs", math_abs, 1)?;
    interp.register_method(math, "Math", "floor", math_floor, 1)?;
    interp.register_method(math, "Math", "ceil", math_ceil, 1)?;
    interp.register_method(math, "Math", "round", math_round, 1)?;
    interp.register_method(math, "Math", "sqrt", math_sqrt, 1)?;
    interp.register_method(math, "Math", "pow", math_pow, 2)?;
    interp.register_method(math, "Math", "max", math_max, 2)?;
    interp.register_method(math, "Math", "min", math_min, 2)?;
    interp.register_method(math, "Math", "random", math_random, 0)?;
    Ok(())
}

fn unary(call: &NativeCall, f: Unary) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(f(to_number(&call.arg(0)))))
}

fn math_abs(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    unary(call, libm::fabs)
}

fn math_floor(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    unary(call, libm::floor)
}

fn math_ceil(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    unary(call, libm::ceil)
}

/// Halves round toward +Infinity, and -0.5..-0 rounds to -0 (ES5 15.8.2.15)
fn math_round(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    unary(call, |n| {
        if !n.is_finite() || n == 0.0 {
            n
        } else if (-0.5..0.0).contains(&n) {
            -0.0
        } else {
            libm::floor(n + 0.5)
        }
    })
}

fn math_sqrt(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    unary(call, libm::sqrt)
}

fn math_pow(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let base = to_number(&call.arg(0));
    let exponent = to_number(&call.arg(1));
    // pow(1, NaN) is 1 in C but NaN here
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(libm::pow(base, exponent)))
}

fn math_max(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let mut result = f64::NEG_INFINITY;
    for arg in &call.args {
        let n = to_number(arg);
        if n.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        if n > result || (n == 0.0 && result == 0.0 && result.is_sign_negative()) {
            result = n;
        }
    }
    Ok(JsValue::Number(result))
}

fn math_min(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let mut result = f64::INFINITY;
    for arg in &call.args {
        let n = to_number(arg);
        if n.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        if n < result || (n == 0.0 && result == 0.0 && n.is_sign_negative()) {
            result = n;
        }
    }
    Ok(JsValue::Number(result))
}

fn math_random(interp: &mut Interpreter, _call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(interp.random()))
}
