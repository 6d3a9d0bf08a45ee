//! Value codec: wire scalars ↔ typed native values.
//!
//! The wire carries JSON scalars.  Native code sees exactly four kinds:
//! UTF-8 string, 64-bit signed integer, boolean and 64-bit float.  Decoding
//! is lazy and per index so that a bad argument only fails the access that
//! touches it.
//!
//! # Exactness
//!
//! JavaScript numbers are IEEE-754 doubles, so an integer is only exact on
//! the wire while `|n| <= 2^53 - 1`.  Conversions that would lose
//! information fail with [`WebUiError::EncodingError`] instead of truncating.
//! Browser form inputs hand their values over as strings, so a string that
//! spells a number or a boolean decodes to that kind when it does so exactly.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, WebUiError};

/// A scalar as represented on the transport boundary.
pub type WireValue = serde_json::Value;

/// Largest integer magnitude a JavaScript number holds exactly.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// The closed set of kinds an argument can be decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    String,
    Int,
    Bool,
    Float,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgKind::String => "string",
            ArgKind::Int => "int",
            ArgKind::Bool => "bool",
            ArgKind::Float => "float",
        };
        f.write_str(name)
    }
}

/// A typed native value: an argument after decoding, or a callback's response.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
}

impl Value {
    /// Returns the kind tag of this value.
    pub fn kind(&self) -> ArgKind {
        match self {
            Value::String(_) => ArgKind::String,
            Value::Int(_) => ArgKind::Int,
            Value::Bool(_) => ArgKind::Bool,
            Value::Float(_) => ArgKind::Float,
        }
    }

    /// Encodes an arbitrary serializable value as a JSON string.
    ///
    /// Objects and arrays are not wire scalars; this is the documented way to
    /// hand one back to JavaScript, which then calls `JSON.parse` on it.
    ///
    /// # Errors
    ///
    /// Returns [`WebUiError::EncodingError`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| WebUiError::EncodingError(e.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

// ── Typed access ──────────────────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for i64 {}
    impl Sealed for bool {}
    impl Sealed for f64 {}
}

/// Native types an argument can be decoded into.
///
/// Sealed: only the four wire kinds implement it.
pub trait FromArg: Sized + sealed::Sealed {
    /// The kind requested from the codec.
    const KIND: ArgKind;

    #[doc(hidden)]
    fn from_value(value: Value) -> Option<Self>;
}

impl FromArg for String {
    const KIND: ArgKind = ArgKind::String;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromArg for i64 {
    const KIND: ArgKind = ArgKind::Int;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl FromArg for bool {
    const KIND: ArgKind = ArgKind::Bool;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromArg for f64 {
    const KIND: ArgKind = ArgKind::Float;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

// ── Argument list ─────────────────────────────────────────────────────────────

/// Read-only, positional view over the wire values attached to an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentList {
    values: Vec<WireValue>,
}

impl ArgumentList {
    pub fn new(values: Vec<WireValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The undecoded wire value at `index`, if any.
    pub fn raw(&self, index: usize) -> Option<&WireValue> {
        self.values.get(index)
    }

    /// Decodes the argument at `index` as `kind`.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(&self, index: usize, kind: ArgKind) -> Result<Value> {
        decode(self, index, kind)
    }

    /// Decodes the argument at `index` into a native type.
    pub fn get<T: FromArg>(&self, index: usize) -> Result<T> {
        let value = decode(self, index, T::KIND)?;
        T::from_value(value)
            .ok_or_else(|| WebUiError::EncodingError(format!("argument {index} is not {}", T::KIND)))
    }
}

impl From<Vec<WireValue>> for ArgumentList {
    fn from(values: Vec<WireValue>) -> Self {
        Self::new(values)
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Decodes argument `index` of `args` as `kind`.
///
/// # Errors
///
/// - [`WebUiError::IndexOutOfRange`] when `index >= args.len()`; checked first.
/// - [`WebUiError::UnsupportedType`] when the wire value is not a scalar.
/// - [`WebUiError::EncodingError`] when the scalar cannot become `kind` exactly.
pub fn decode(args: &ArgumentList, index: usize, kind: ArgKind) -> Result<Value> {
    let raw = args.raw(index).ok_or(WebUiError::IndexOutOfRange {
        index,
        count: args.len(),
    })?;

    match raw {
        WireValue::Null | WireValue::Array(_) | WireValue::Object(_) => {
            return Err(WebUiError::UnsupportedType(format!(
                "argument {index} is {}, not a scalar",
                json_type_name(raw)
            )));
        }
        _ => {}
    }

    match kind {
        ArgKind::String => decode_string(raw).map(Value::String),
        ArgKind::Int => decode_int(raw, index).map(Value::Int),
        ArgKind::Bool => decode_bool(raw, index).map(Value::Bool),
        ArgKind::Float => decode_float(raw, index).map(Value::Float),
    }
}

/// Encodes a native value as a wire scalar.
///
/// # Errors
///
/// Returns [`WebUiError::EncodingError`] for integers beyond
/// [`MAX_SAFE_INTEGER`] and for non-finite floats, neither of which survive
/// the trip into a JavaScript number.
pub fn encode(value: &Value) -> Result<WireValue> {
    match value {
        Value::String(s) => Ok(WireValue::String(s.clone())),
        Value::Bool(b) => Ok(WireValue::Bool(*b)),
        Value::Int(n) => {
            if n.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                return Err(WebUiError::EncodingError(format!(
                    "integer {n} exceeds the exact range of a JavaScript number"
                )));
            }
            Ok(WireValue::from(*n))
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(WireValue::Number)
            .ok_or_else(|| WebUiError::EncodingError(format!("float {f} is not finite"))),
    }
}

/// Converts a wire scalar into a native value of its own kind.
///
/// Integral JSON numbers become [`Value::Int`], other numbers [`Value::Float`].
///
/// # Errors
///
/// Returns [`WebUiError::UnsupportedType`] for null, arrays and objects.
pub fn value_from_wire(raw: &WireValue) -> Result<Value> {
    match raw {
        WireValue::String(s) => Ok(Value::String(s.clone())),
        WireValue::Bool(b) => Ok(Value::Bool(*b)),
        WireValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| WebUiError::EncodingError(format!("number {n} is out of range"))),
        },
        other => Err(WebUiError::UnsupportedType(format!(
            "{} is not a scalar",
            json_type_name(other)
        ))),
    }
}

/// Converts the value a script returned.
///
/// A script that returns nothing (`undefined`, sent as null) yields an empty
/// string; everything else follows [`value_from_wire`].
pub fn script_value_from_wire(raw: &WireValue) -> Result<Value> {
    match raw {
        WireValue::Null => Ok(Value::String(String::new())),
        other => value_from_wire(other),
    }
}

fn decode_string(raw: &WireValue) -> Result<String> {
    Ok(match raw {
        WireValue::String(s) => s.clone(),
        WireValue::Bool(b) => b.to_string(),
        WireValue::Number(n) => n.to_string(),
        other => return Err(WebUiError::UnsupportedType(json_type_name(other).to_string())),
    })
}

fn decode_int(raw: &WireValue, index: usize) -> Result<i64> {
    let inexact =
        || WebUiError::EncodingError(format!("argument {index} ({raw}) is not an exact 64-bit integer"));
    match raw {
        WireValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(inexact())
            } else {
                n.as_f64().and_then(integral_f64).ok_or_else(inexact)
            }
        }
        WireValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                .ok_or_else(inexact)
        }
        _ => Err(inexact()),
    }
}

fn decode_bool(raw: &WireValue, index: usize) -> Result<bool> {
    match raw {
        WireValue::Bool(b) => Ok(*b),
        WireValue::String(s) if s == "true" => Ok(true),
        WireValue::String(s) if s == "false" => Ok(false),
        _ => Err(WebUiError::EncodingError(format!(
            "argument {index} ({raw}) is not a boolean"
        ))),
    }
}

fn decode_float(raw: &WireValue, index: usize) -> Result<f64> {
    let inexact = || WebUiError::EncodingError(format!("argument {index} ({raw}) is not an exact float"));
    match raw {
        WireValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                exact_i64_as_f64(i).ok_or_else(inexact)
            } else if n.is_u64() {
                Err(inexact())
            } else {
                n.as_f64().ok_or_else(inexact)
            }
        }
        WireValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(inexact),
        _ => Err(inexact()),
    }
}

/// `Some(n)` when `f` is an integer that fits `i64` without rounding.
fn integral_f64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; every integral f64 below it fits i64.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

fn exact_i64_as_f64(i: i64) -> Option<f64> {
    (i.unsigned_abs() <= MAX_SAFE_INTEGER as u64 + 1).then_some(i as f64)
}

fn json_type_name(raw: &WireValue) -> &'static str {
    match raw {
        WireValue::Null => "null",
        WireValue::Bool(_) => "boolean",
        WireValue::Number(_) => "number",
        WireValue::String(_) => "string",
        WireValue::Array(_) => "array",
        WireValue::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
