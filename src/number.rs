//! Numeric conversions
//!
//! ToString(Number), ToNumber(String) and the integer conversions used by the
//! bitwise operators. Formatting of finite numbers goes through `ryu-js`,
//! which implements the shortest round-trip algorithm with ECMAScript's
//! exponent rules.

use crate::lexer::{is_line_terminator, is_whitespace};

/// ToString applied to a Number
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        let mut buffer = ryu_js::Buffer::new();
        buffer.format(n).to_string()
    }
}

/// `Number.prototype.toString(radix)` for radix other than 10
pub fn number_to_string_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n == 0.0 {
        return number_to_string(n);
    }

    let negative = n < 0.0;
    let value = n.abs();
    let mut int_part = value.trunc();
    let mut frac_part = value - int_part;

    let mut digits = Vec::new();
    if int_part == 0.0 {
        digits.push('0');
    }
    while int_part >= 1.0 {
        let d = libm::fmod(int_part, f64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int_part = (int_part / f64::from(radix)).trunc();
    }
    digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(digits);

    if frac_part > 0.0 {
        out.push('.');
        // Enough digits to distinguish doubles in base 2
        let mut emitted = 0;
        while frac_part > 0.0 && emitted < 52 {
            frac_part *= f64::from(radix);
            let d = frac_part.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac_part -= f64::from(d);
            emitted += 1;
        }
    }
    out
}

/// ToNumber applied to a String
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| is_whitespace(c) || is_line_terminator(c));
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return f64::NAN;
        }
        let mut value = 0f64;
        for c in hex.chars() {
            match c.to_digit(16) {
                Some(d) => value = value * 16.0 + f64::from(d),
                None => return f64::NAN,
            }
        }
        return value;
    }

    let (sign, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, trimmed.get(1..).unwrap_or("")),
        Some(b'+') => (1.0, trimmed.get(1..).unwrap_or("")),
        _ => (1.0, trimmed),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
}

/// StrUnsignedDecimalLiteral without the `Infinity` case
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut digits = 0;
    while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
        digits += 1;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return false;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

/// ToInteger
pub fn to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc()
    }
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    int.rem_euclid(4_294_967_296.0) as u32
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// Parse the leading integer of a string in `radix`, as `parseInt` does
pub fn parse_int(input: &str, radix: Option<u32>) -> f64 {
    let s = input.trim_start_matches(|c| is_whitespace(c) || is_line_terminator(c));
    let (sign, mut s) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, s.get(1..).unwrap_or("")),
        Some(b'+') => (1.0, s.get(1..).unwrap_or("")),
        _ => (1.0, s),
    };

    let mut radix = radix.unwrap_or(0);
    if radix != 0 && !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if (radix == 0 || radix == 16) && (s.starts_with("0x") || s.starts_with("0X")) {
        s = s.get(2..).unwrap_or("");
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }

    let mut value = 0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * f64::from(radix) + f64::from(d);
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return f64::NAN;
    }
    if radix == 10 {
        // Re-parse the digit run so large decimals round correctly
        let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if let Some(Ok(exact)) = s.get(..end).map(str::parse::<f64>) {
            value = exact;
        }
    }
    sign * value
}

/// Parse the longest decimal prefix, as `parseFloat` does
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start_matches(|c| is_whitespace(c) || is_line_terminator(c));
    let (sign, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, s.get(1..).unwrap_or("")),
        Some(b'+') => (1.0, s.get(1..).unwrap_or("")),
        _ => (1.0, s),
    };
    if unsigned.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }
    let mut best = None;
    for (i, c) in unsigned.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        if let Some(prefix) = unsigned.get(..=i) {
            if is_decimal_literal(prefix) {
                best = Some(prefix);
            }
        }
    }
    best.and_then(|p| p.parse::<f64>().ok())
        .map(|v| sign * v)
        .unwrap_or(f64::NAN)
}

/// `Number.prototype.toFixed`
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let formatted = format!("{:.*}", digits, n);
    // -0.00 prints as 0.00
    if formatted.starts_with('-') && formatted.bytes().all(|b| matches!(b, b'-' | b'0' | b'.')) {
        formatted.trim_start_matches('-').to_string()
    } else {
        formatted
    }
}
