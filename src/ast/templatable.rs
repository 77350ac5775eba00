//! Templatable scalars
//!
//! Some settings (`max`, `draft`, `footer`, `close-older-issues`) accept a
//! literal or a `${{ … }}` expression evaluated at run time. They are stored
//! as a normalized string.

use std::fmt;

use serde_yaml::Value;

use crate::error::{AwError, Result};
use crate::frontmatter::value_type_name;
use crate::util::is_expression;

/// A literal-or-expression scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templatable(String);

impl Templatable {
    pub fn literal(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Normalize a YAML scalar
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self(s.trim().to_string())),
            Value::Number(n) => Ok(Self(n.to_string())),
            Value::Bool(b) => Ok(Self(b.to_string())),
            other => Err(AwError::schema(
                path,
                format!("expected a scalar or expression, got {}", value_type_name(other)),
            )),
        }
    }

    /// Parse a `max` value: a positive integer or an expression
    pub fn max(value: &Value, path: &str) -> Result<Self> {
        let t = Self::from_value(value, path)?;
        if t.is_expression() {
            return Ok(t);
        }
        match t.as_int() {
            Some(n) if n >= 1 => Ok(t),
            Some(n) => Err(AwError::schema(path, format!("max must be at least 1, got {}", n))),
            None => Err(AwError::schema(
                path,
                format!("max must be an integer or a ${{{{ }}}} expression, got '{}'", t.0),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_expression(&self) -> bool {
        is_expression(&self.0)
    }

    pub fn as_int(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.0.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// JSON form for handler config: numbers and booleans stay typed
    pub fn to_json(&self) -> serde_json::Value {
        if let Some(n) = self.as_int() {
            serde_json::Value::from(n)
        } else if let Some(b) = self.as_bool() {
            serde_json::Value::Bool(b)
        } else {
            serde_json::Value::String(self.0.clone())
        }
    }
}

impl fmt::Display for Templatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
