use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Target type a data payload is coerced into before it reaches a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Text,
    /// A choice-list selection. The host sends the selected entry as a
    /// scalar; it is wrapped into a one-element sequence.
    Choice,
    /// A filesystem path. No existence check is performed here.
    Path,
}

/// A coerced data payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Text(String),
    Choice(Vec<String>),
    Path(PathBuf),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Bool(_) => ValueKind::Bool,
            Self::Text(_) => ValueKind::Text,
            Self::Choice(_) => ValueKind::Choice,
            Self::Path(_) => ValueKind::Path,
        }
    }

    /// Widening view of any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(v) => Some(f64::from(*v)),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&[String]> {
        match self {
            Self::Choice(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Path(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoerceError {
    #[error("payload {payload:?} is not numeric")]
    NotNumeric { payload: String },
}

/// Coerce a raw string payload to the requested kind.
///
/// Integer kinds parse as floating point first and truncate, because the
/// host serializes numeric fields as decimal strings ("37.0"). Bool is a
/// permissive mapping: the literal "On" is true, anything else is false.
pub fn coerce(kind: ValueKind, raw: &str) -> Result<TypedValue, CoerceError> {
    match kind {
        ValueKind::Int8 => parse_f64(raw).map(|v| TypedValue::Int8(v.trunc() as i8)),
        ValueKind::Int16 => parse_f64(raw).map(|v| TypedValue::Int16(v.trunc() as i16)),
        ValueKind::Int32 => parse_f64(raw).map(|v| TypedValue::Int32(v.trunc() as i32)),
        ValueKind::Int64 => parse_f64(raw).map(|v| TypedValue::Int64(v.trunc() as i64)),
        ValueKind::Float32 => parse_f64(raw).map(|v| TypedValue::Float32(v as f32)),
        ValueKind::Float64 => parse_f64(raw).map(TypedValue::Float64),
        ValueKind::Bool => Ok(TypedValue::Bool(raw == "On")),
        ValueKind::Text => Ok(TypedValue::Text(raw.to_owned())),
        ValueKind::Choice => Ok(TypedValue::Choice(vec![raw.to_owned()])),
        ValueKind::Path => Ok(TypedValue::Path(PathBuf::from(raw))),
    }
}

fn parse_f64(raw: &str) -> Result<f64, CoerceError> {
    raw.trim().parse::<f64>().map_err(|_| CoerceError::NotNumeric {
        payload: raw.to_owned(),
    })
}
