//! String conversion of numbers, vectors, matrices and booleans.
//!
//! Values are written as whitespace separated components; matrices are
//! written column by column. Every `parse_*` function reports malformed input
//! as a [`ParseError`]; the `parse_*_or` variants fall back to a default for
//! callers that prefer a value over an error.

use cgmath::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use log::debug;

use crate::error::ParseError;

pub fn float_to_string(val: f32) -> String {
    val.to_string()
}

/// Fixed number of decimals, right aligned in `width` characters.
pub fn float_to_string_with(val: f32, precision: usize, width: usize) -> String {
    format!("{:>width$.precision$}", val)
}

pub fn bool_to_string(val: bool, yes_no: bool) -> String {
    match (val, yes_no) {
        (true, true) => "yes",
        (true, false) => "true",
        (false, true) => "no",
        (false, false) => "false",
    }
    .to_string()
}

fn join(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn vec2_to_string(val: Vector2<f32>) -> String {
    join(&[val.x, val.y])
}

pub fn vec3_to_string(val: Vector3<f32>) -> String {
    join(&[val.x, val.y, val.z])
}

pub fn vec4_to_string(val: Vector4<f32>) -> String {
    join(&[val.x, val.y, val.z, val.w])
}

pub fn mat3_to_string(val: Matrix3<f32>) -> String {
    let columns: &[f32; 9] = val.as_ref();
    join(columns)
}

pub fn mat4_to_string(val: Matrix4<f32>) -> String {
    let columns: &[f32; 16] = val.as_ref();
    join(columns)
}

/// True if `text` starts with `pattern`. An empty pattern never matches.
pub fn starts_with(text: &str, pattern: &str, ignore_case: bool) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match text.get(..pattern.len()) {
        Some(head) if ignore_case => head.eq_ignore_ascii_case(pattern),
        Some(head) => head == pattern,
        None => false,
    }
}

/// Splits on any of `delims`, dropping empty pieces.
pub fn split<'a>(text: &'a str, delims: &str) -> Vec<&'a str> {
    text.split(|c: char| delims.contains(c))
        .filter(|piece| !piece.is_empty())
        .collect()
}

pub fn parse_float(val: &str) -> Result<f32, ParseError> {
    val.trim()
        .parse::<f32>()
        .map_err(|_| ParseError::Number(val.to_string()))
}

/// Decimal, or hexadecimal with a `0x` prefix.
pub fn parse_int(val: &str) -> Result<i32, ParseError> {
    let trimmed = val.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| ParseError::Number(val.to_string()))?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| ParseError::Number(val.to_string()))
}

/// Accepts anything starting with `true`/`yes`/`1`/`on` or
/// `false`/`no`/`0`/`off`, ignoring ASCII case.
pub fn parse_bool(val: &str) -> Result<bool, ParseError> {
    let val_trimmed = val.trim();
    if ["true", "yes", "1", "on"]
        .iter()
        .any(|p| starts_with(val_trimmed, p, true))
    {
        Ok(true)
    } else if ["false", "no", "0", "off"]
        .iter()
        .any(|p| starts_with(val_trimmed, p, true))
    {
        Ok(false)
    } else {
        Err(ParseError::Bool(val.to_string()))
    }
}

fn parse_components<const N: usize>(val: &str) -> Result<[f32; N], ParseError> {
    let pieces = split(val, " \t\n\r");
    if pieces.len() != N {
        return Err(ParseError::Arity {
            expected: N,
            found: pieces.len(),
        });
    }
    let mut out = [0.0; N];
    for (slot, piece) in out.iter_mut().zip(pieces) {
        *slot = parse_float(piece)?;
    }
    Ok(out)
}

pub fn parse_vec2(val: &str) -> Result<Vector2<f32>, ParseError> {
    parse_components::<2>(val).map(Vector2::from)
}

pub fn parse_vec3(val: &str) -> Result<Vector3<f32>, ParseError> {
    parse_components::<3>(val).map(Vector3::from)
}

pub fn parse_vec4(val: &str) -> Result<Vector4<f32>, ParseError> {
    parse_components::<4>(val).map(Vector4::from)
}

/// Nine components, column by column.
pub fn parse_mat3(val: &str) -> Result<Matrix3<f32>, ParseError> {
    let c = parse_components::<9>(val)?;
    Ok(Matrix3::new(c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8]))
}

/// Sixteen components, column by column.
pub fn parse_mat4(val: &str) -> Result<Matrix4<f32>, ParseError> {
    let c = parse_components::<16>(val)?;
    Ok(Matrix4::new(
        c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8], c[9], c[10], c[11], c[12], c[13],
        c[14], c[15],
    ))
}

fn or_default<T>(parsed: Result<T, ParseError>, default: T) -> T {
    parsed.unwrap_or_else(|e| {
        debug!("{}, using the default", e);
        default
    })
}

pub fn parse_float_or(val: &str, default: f32) -> f32 {
    or_default(parse_float(val), default)
}

pub fn parse_int_or(val: &str, default: i32) -> i32 {
    or_default(parse_int(val), default)
}

pub fn parse_bool_or(val: &str, default: bool) -> bool {
    or_default(parse_bool(val), default)
}

pub fn parse_vec2_or(val: &str, default: Vector2<f32>) -> Vector2<f32> {
    or_default(parse_vec2(val), default)
}

pub fn parse_vec3_or(val: &str, default: Vector3<f32>) -> Vector3<f32> {
    or_default(parse_vec3(val), default)
}

pub fn parse_vec4_or(val: &str, default: Vector4<f32>) -> Vector4<f32> {
    or_default(parse_vec4(val), default)
}

pub fn parse_mat3_or(val: &str, default: Matrix3<f32>) -> Matrix3<f32> {
    or_default(parse_mat3(val), default)
}

pub fn parse_mat4_or(val: &str, default: Matrix4<f32>) -> Matrix4<f32> {
    or_default(parse_mat4(val), default)
}
