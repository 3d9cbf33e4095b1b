// src/core/json.rs
//! Tolerant structural lookup into `serde_json::Value`.
//!
//! Every accessor returns `Option`: a missing key, a wrong type and a JSON
//! `null` all read as unknown. Numbers that the source sometimes ships as
//! strings (`"77"`) are accepted either way.

use serde_json::Value;

use crate::error::NormalizationError;

/// One step of a path: an object key or an array index.
#[derive(Clone, Copy, Debug)]
pub enum Seg {
    Key(&'static str),
    Idx(usize),
}

/// `path!["header", "competitions", [0], "date"]`; bracketed segments are indices.
#[macro_export]
macro_rules! path {
    ($($seg:tt),* $(,)?) => {
        &[$($crate::__path_seg!($seg)),*]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __path_seg {
    ([$i:expr]) => { $crate::core::json::Seg::Idx($i) };
    ($k:expr) => { $crate::core::json::Seg::Key($k) };
}

/// Parse a payload that must be a JSON object at the top.
pub fn parse_object(raw: &[u8]) -> Result<Value, NormalizationError> {
    let v: Value = serde_json::from_slice(raw).map_err(|e| NormalizationError::InvalidJson(e.to_string()))?;
    if v.is_object() { Ok(v) } else { Err(NormalizationError::NotAnObject) }
}

pub fn at<'a>(v: &'a Value, path: &[Seg]) -> Option<&'a Value> {
    let mut cur = v;
    for seg in path {
        cur = match seg {
            Seg::Key(k) => cur.as_object()?.get(*k)?,
            Seg::Idx(i) => cur.as_array()?.get(*i)?,
        };
    }
    if cur.is_null() { None } else { Some(cur) }
}

/// First path that resolves, for fields whose location drifted over time.
pub fn first_at<'a>(v: &'a Value, paths: &[&[Seg]]) -> Option<&'a Value> {
    paths.iter().find_map(|p| at(v, p))
}

pub fn str_at(v: &Value, path: &[Seg]) -> Option<String> {
    at(v, path).and_then(as_string)
}

pub fn first_str(v: &Value, paths: &[&[Seg]]) -> Option<String> {
    paths.iter().find_map(|p| str_at(v, p))
}

pub fn i64_at(v: &Value, path: &[Seg]) -> Option<i64> {
    at(v, path).and_then(as_i64)
}

pub fn f64_at(v: &Value, path: &[Seg]) -> Option<f64> {
    at(v, path).and_then(as_f64)
}

pub fn bool_at(v: &Value, path: &[Seg]) -> Option<bool> {
    at(v, path).and_then(as_bool)
}

pub fn array_at<'a>(v: &'a Value, path: &[Seg]) -> Option<&'a Vec<Value>> {
    at(v, path).and_then(Value::as_array)
}

/// Non-empty string, or a number rendered as one.
pub fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() { None } else { Some(s!(t)) }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
