//! Resolved configuration values

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A fully numeric configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Array(Vec<i64>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Array(_) => "array",
        }
    }

    pub fn as_int(&self, context: &str) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(mismatch(context, "int", other)),
        }
    }

    /// Numeric value as f64 (ints widen)
    pub fn as_real(&self, context: &str) -> Result<f64> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Real(v) => Ok(*v),
            other => Err(mismatch(context, "number", other)),
        }
    }

    pub fn as_bool(&self, context: &str) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch(context, "bool", other)),
        }
    }

    pub fn as_array(&self, context: &str) -> Result<&[i64]> {
        match self {
            Value::Array(v) => Ok(v),
            other => Err(mismatch(context, "array", other)),
        }
    }

    /// Convert a literal JSON leaf
    pub(crate) fn from_json(key: &str, json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n.as_f64().map(Value::Real).ok_or_else(|| ConfigError::InvalidEntry {
                    key: key.to_string(),
                    reason: format!("number {n} is not representable"),
                }),
            },
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_i64().ok_or_else(|| ConfigError::InvalidEntry {
                        key: key.to_string(),
                        reason: format!("array element {item} is not an integer"),
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(ConfigError::InvalidEntry {
                key: key.to_string(),
                reason: format!("unsupported value {other}"),
            }),
        }
    }
}

pub(crate) fn mismatch(context: &str, expected: &'static str, got: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        context: context.to_string(),
        expected,
        got: got.type_name(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Array(v) => write!(f, "{v:?}"),
        }
    }
}
