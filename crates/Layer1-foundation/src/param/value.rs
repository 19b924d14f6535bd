//! Parameter values
//!
//! A closed tagged union so canonical serialization is total: every value
//! the cache sees has exactly one encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A primitive parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A parameter value: a primitive or a list of primitives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl Scalar {
    /// Append the canonical encoding of this scalar to `out`
    ///
    /// Each encoding carries a type tag so `1`, `1.0`, `"1"` and `true`
    /// never collide.
    pub fn write_canonical(&self, out: &mut String) -> Result<()> {
        match self {
            Scalar::Bool(b) => {
                out.push_str("b:");
                out.push_str(if *b { "true" } else { "false" });
            }
            Scalar::Int(i) => {
                out.push_str("i:");
                out.push_str(&i.to_string());
            }
            Scalar::Float(f) => {
                out.push_str("f:");
                out.push_str(&canonical_float(*f)?);
            }
            Scalar::Str(s) => {
                out.push_str("s:");
                // JSON string escaping keeps separators inside values unambiguous
                out.push_str(&serde_json::to_string(s)?);
            }
        }
        Ok(())
    }

    /// Plain rendering without type tag (for display and comma-joined lists)
    pub fn render(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }

    fn from_json(key: &str, value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Int(i))
                } else if let Some(f) = n.as_f64() {
                    check_finite(key, f)?;
                    Ok(Scalar::Float(f))
                } else {
                    Err(Error::InvalidParameter(format!(
                        "{key}: number {n} does not fit a 64-bit value"
                    )))
                }
            }
            Value::String(s) => Ok(Scalar::Str(s.clone())),
            Value::Null => Err(Error::InvalidParameter(format!("{key}: null is not a value"))),
            Value::Array(_) => Err(Error::InvalidParameter(format!(
                "{key}: nested lists are not supported"
            ))),
            Value::Object(_) => Err(Error::InvalidParameter(format!(
                "{key}: objects are not supported"
            ))),
        }
    }
}

impl ParamValue {
    pub fn write_canonical(&self, out: &mut String) -> Result<()> {
        match self {
            ParamValue::Scalar(s) => s.write_canonical(out),
            ParamValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out)?;
                }
                out.push(']');
                Ok(())
            }
        }
    }

    /// Convert a scripting-layer JSON value
    pub fn from_json(key: &str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| Scalar::from_json(key, item))
                .collect::<Result<Vec<_>>>()
                .map(ParamValue::List),
            other => Scalar::from_json(key, other).map(ParamValue::Scalar),
        }
    }

    /// Numeric value; integers widen to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(Scalar::Float(f)) => Some(*f),
            ParamValue::Scalar(Scalar::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(s) => write!(f, "{}", s.render()),
            ParamValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(Scalar::render).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

fn check_finite(key: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{key}: non-finite float {value} cannot be fingerprinted"
        )))
    }
}

/// Shortest round-trip decimal, always with a fractional part
fn canonical_float(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "non-finite float {value} cannot be fingerprinted"
        )));
    }
    // -0.0 and 0.0 compare equal and must encode equal
    let value = if value == 0.0 { 0.0 } else { value };
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    Ok(text)
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

macro_rules! scalar_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    ParamValue::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_param!(bool, i64, i32, u32, f64, &str, String);

impl From<Scalar> for ParamValue {
    fn from(v: Scalar) -> Self {
        ParamValue::Scalar(v)
    }
}

impl<T: Into<Scalar>> FromIterator<T> for ParamValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ParamValue::List(iter.into_iter().map(Into::into).collect())
    }
}
