use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The value of one attribute of an external server.
///
/// This is structural only. Whether `""` counts as absent, or whether
/// `"389"` is an integer, depends on the attribute and is decided by the
/// codec in `extserver-resource`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum AttributeValue {
    #[default]
    Absent,
    String(String),
    StringSet(BTreeSet<String>),
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAttributeValue {
    #[error("nested objects are not attribute values")]
    Object,
    #[error("set elements must be strings, got {0}")]
    NonStringElement(Value),
    #[error("number {0} is not a 64-bit integer")]
    NonIntegralNumber(serde_json::Number),
}

impl AttributeValue {
    pub fn string<S: Into<String>>(s: S) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn set<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeValue::StringSet(elements.into_iter().map(Into::into).collect())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AttributeValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            AttributeValue::StringSet(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            AttributeValue::Absent => "absent",
            AttributeValue::String(_) => "string",
            AttributeValue::StringSet(_) => "set of strings",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Boolean(_) => "boolean",
        }
    }
}

impl TryFrom<Value> for AttributeValue {
    type Error = InvalidAttributeValue;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(AttributeValue::Absent),
            Value::Bool(b) => Ok(AttributeValue::Boolean(b)),
            Value::Number(n) => n
                .as_i64()
                .map(AttributeValue::Integer)
                .ok_or(InvalidAttributeValue::NonIntegralNumber(n)),
            Value::String(s) => Ok(AttributeValue::String(s)),
            Value::Array(elements) => elements
                .into_iter()
                .map(|e| match e {
                    Value::String(s) => Ok(s),
                    other => Err(InvalidAttributeValue::NonStringElement(other)),
                })
                .collect::<Result<BTreeSet<_>, _>>()
                .map(AttributeValue::StringSet),
            Value::Object(_) => Err(InvalidAttributeValue::Object),
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Absent => Value::Null,
            AttributeValue::String(s) => Value::String(s),
            AttributeValue::StringSet(s) => Value::Array(s.into_iter().map(Value::String).collect()),
            AttributeValue::Integer(i) => Value::from(i),
            AttributeValue::Boolean(b) => Value::Bool(b),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Absent => f.write_str("(absent)"),
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::StringSet(s) => {
                f.write_str("{")?;
                for (i, e) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}", e)?;
                }
                f.write_str("}")
            }
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}
