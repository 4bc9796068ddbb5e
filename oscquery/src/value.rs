//! Values carried in the `VALUE` attribute of a node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

/// Widens through the shortest decimal form, so `0.1f32` serves as `0.1`
/// rather than `0.10000000149011612`.
pub(crate) fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

/// One scalar OSC value.
///
/// Serialized as the bare JSON value; a blob becomes an array of bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OscValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
}

impl fmt::Display for OscValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscValue::Nil => write!(f, "nil"),
            OscValue::Bool(v) => write!(f, "{v}"),
            OscValue::Int(v) => write!(f, "{v}"),
            OscValue::Float(v) => write!(f, "{v}"),
            OscValue::String(v) => write!(f, "{v}"),
            OscValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for OscValue {
    fn from(v: bool) -> Self {
        OscValue::Bool(v)
    }
}

impl From<i32> for OscValue {
    fn from(v: i32) -> Self {
        OscValue::Int(i64::from(v))
    }
}

impl From<i64> for OscValue {
    fn from(v: i64) -> Self {
        OscValue::Int(v)
    }
}

impl From<f32> for OscValue {
    fn from(v: f32) -> Self {
        OscValue::Float(widen_f32(v))
    }
}

impl From<f64> for OscValue {
    fn from(v: f64) -> Self {
        OscValue::Float(v)
    }
}

impl From<&str> for OscValue {
    fn from(v: &str) -> Self {
        OscValue::String(v.to_owned())
    }
}

impl From<String> for OscValue {
    fn from(v: String) -> Self {
        OscValue::String(v)
    }
}

impl OscValue {
    /// Parses `input` as a value of the OSC type `tag`.
    pub fn parse(tag: char, input: &str) -> Result<OscValue> {
        let trimmed = input.trim();
        let invalid = || Error::ErrInvalidValue {
            value: input.to_owned(),
            tag,
        };
        let value = match tag {
            'i' => OscValue::Int(i64::from(trimmed.parse::<i32>()?)),
            'u' => OscValue::Int(i64::from(trimmed.parse::<u32>()?)),
            'h' => OscValue::Int(trimmed.parse::<i64>()?),
            'f' => {
                trimmed.parse::<f32>()?;
                OscValue::Float(trimmed.parse::<f64>()?)
            }
            'd' => OscValue::Float(trimmed.parse::<f64>()?),
            's' | 'S' => OscValue::String(input.to_owned()),
            'c' => {
                let mut chars = input.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => OscValue::String(c.to_string()),
                    _ => return Err(invalid()),
                }
            }
            'b' => OscValue::Blob(input.as_bytes().to_vec()),
            'T' | 'F' => OscValue::Bool(parse_bool(trimmed).ok_or_else(invalid)?),
            'N' | 'I' => OscValue::Nil,
            _ => return Err(Error::ErrUnsupportedType(tag.to_string())),
        };
        Ok(value)
    }

    /// Best guess for an untyped literal: bool, integer, float, else string.
    pub fn infer(input: &str) -> OscValue {
        let trimmed = input.trim();
        if let Some(b) = parse_bool(trimmed) {
            OscValue::Bool(b)
        } else if let Ok(i) = trimmed.parse::<i64>() {
            OscValue::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            OscValue::Float(f)
        } else {
            OscValue::String(input.to_owned())
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Type tags of `osc_type` that carry a value, skipping array brackets.
pub(crate) fn value_tags(osc_type: &str) -> Vec<char> {
    osc_type.chars().filter(|c| !matches!(c, '[' | ']')).collect()
}

/// Parses an initial value string against a type tag string.
///
/// A single-tag type takes the whole string, longer ones take one
/// whitespace separated token per tag. A token that does not parse for its
/// tag is inferred as a literal instead. Without a type every token is
/// inferred.
pub fn parse_values(osc_type: Option<&str>, input: &str) -> Result<Vec<OscValue>> {
    let tags = osc_type.map(value_tags).unwrap_or_default();
    for tag in &tags {
        if !is_supported_tag(*tag) {
            return Err(Error::ErrUnsupportedType(tag.to_string()));
        }
    }

    if tags.len() <= 1 {
        let value = match tags.first() {
            Some(tag) => OscValue::parse(*tag, input).unwrap_or_else(|_| OscValue::infer(input)),
            None => OscValue::infer(input),
        };
        return Ok(vec![value]);
    }

    let values = input
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| match tags.get(i) {
            Some(tag) => OscValue::parse(*tag, token).unwrap_or_else(|_| OscValue::infer(token)),
            None => OscValue::infer(token),
        })
        .collect();
    Ok(values)
}

pub(crate) fn is_supported_tag(tag: char) -> bool {
    matches!(
        tag,
        'i' | 'u' | 'h' | 'f' | 'd' | 's' | 'S' | 'c' | 'b' | 'T' | 'F' | 'N' | 'I'
    )
}

/// Pull-based value source, invoked each time its node is serialized.
#[derive(Clone)]
pub struct ValueProvider(Arc<dyn Fn() -> Vec<OscValue> + Send + Sync>);

impl ValueProvider {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Vec<OscValue> + Send + Sync + 'static,
    {
        ValueProvider(Arc::new(f))
    }

    pub fn get(&self) -> Vec<OscValue> {
        (self.0)()
    }
}

impl fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueProvider")
    }
}

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
