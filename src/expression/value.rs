//! Runtime values produced by evaluating expression trees.
//!
//! Entities enter the value world through serde: anything `Serialize` becomes a
//! [`Value`], and a [`Value`] can be read back into anything `DeserializeOwned`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::expression::embed::EmbedHandle;
use crate::expression::{ExpressionError, ExpressionResult};

/// Kinds of values an expression can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int64,
    UInt64,
    Float64,
    String,
    List,
    Record,
    Embedded,
}

/// Values flowing through expression evaluation
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Int64(i64),
    /// Integers above `i64::MAX`
    UInt64(u64),
    Float64(f64),
    String(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    /// A specification or selector referenced by an embed marker
    Embedded(EmbedHandle),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int64(_) => Some(DataType::Int64),
            Value::UInt64(_) => Some(DataType::UInt64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::List(_) => Some(DataType::List),
            Value::Record(_) => Some(DataType::Record),
            Value::Embedded(_) => Some(DataType::Embedded),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and comparisons
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(n) => Some(*n as f64),
            Value::UInt64(n) => Some(*n as f64),
            Value::Float64(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert any serializable entity into a value
    pub fn from_serialize<T: Serialize + ?Sized>(item: &T) -> ExpressionResult<Value> {
        let json = serde_json::to_value(item).map_err(|e| ExpressionError::Conversion {
            message: e.to_string(),
        })?;
        Ok(Value::from_json(json))
    }

    /// Read this value back into a typed entity
    pub fn deserialize_into<T: DeserializeOwned>(self) -> ExpressionResult<T> {
        let json = self.into_json()?;
        serde_json::from_value(json).map_err(|e| ExpressionError::Conversion {
            message: e.to_string(),
        })
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int64(i),
                (None, Some(u)) => Value::UInt64(u),
                (None, None) => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Record(
                fields
                    .into_iter()
                    .map(|(name, value)| (name, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn into_json(self) -> ExpressionResult<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Int64(n) => serde_json::Value::from(n),
            Value::UInt64(n) => serde_json::Value::from(n),
            Value::Float64(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(Value::into_json)
                    .collect::<ExpressionResult<_>>()?,
            ),
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(name, value)| Ok((name, value.into_json()?)))
                    .collect::<ExpressionResult<_>>()?,
            ),
            Value::Embedded(handle) => {
                return Err(ExpressionError::Conversion {
                    message: format!("embedded {} has no data representation", handle),
                })
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Embedded(a), Value::Embedded(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(n) => write!(f, "{}", n),
            Value::UInt64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, " }}")
            }
            Value::Embedded(handle) => write!(f, "{}", handle),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
