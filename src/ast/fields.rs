//! Field reader for dynamic YAML mappings
//!
//! Typed records are built by *consuming* keys from a mapping. Whatever is
//! left afterwards is either passed through (safe-output handler extras) or
//! reported as unknown.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use super::Templatable;
use crate::error::{AwError, Result};
use crate::frontmatter::value_type_name;

/// Consumes keys from a mapping while tracking the dotted path for errors
pub(crate) struct Fields {
    map: Mapping,
    path: String,
}

impl Fields {
    pub fn new(map: Mapping, path: impl Into<String>) -> Self {
        Self {
            map,
            path: path.into(),
        }
    }

    /// Accept a mapping or null (→ empty)
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        match value {
            Value::Mapping(m) => Ok(Self::new(m.clone(), path)),
            Value::Null => Ok(Self::new(Mapping::new(), path)),
            other => Err(AwError::schema(
                path,
                format!("expected a mapping, got {}", value_type_name(other)),
            )),
        }
    }

    pub fn key_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    /// Scalar string; numbers and booleans are stringified
    pub fn string(&mut self, key: &str) -> Result<Option<String>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => scalar_string(&v)
                .map(Some)
                .ok_or_else(|| AwError::schema(self.key_path(key), "expected a string")),
        }
    }

    pub fn bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) if s == "true" || s == "false" => Ok(Some(s == "true")),
            Some(other) => Err(AwError::schema(
                self.key_path(key),
                format!("expected a boolean, got {}", value_type_name(&other)),
            )),
        }
    }

    pub fn bool_or(&mut self, key: &str, default: bool) -> Result<bool> {
        Ok(self.bool(key)?.unwrap_or(default))
    }

    /// Signed integer (strings holding digits are accepted)
    pub fn int(&mut self, key: &str) -> Result<Option<i64>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| AwError::schema(self.key_path(key), "expected an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| AwError::schema(self.key_path(key), format!("expected an integer, got '{}'", s))),
            Some(other) => Err(AwError::schema(
                self.key_path(key),
                format!("expected an integer, got {}", value_type_name(&other)),
            )),
        }
    }

    /// List of strings; a single scalar becomes a one-element list
    pub fn strings(&mut self, key: &str) -> Result<Vec<String>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|v| {
                    scalar_string(v).ok_or_else(|| {
                        AwError::schema(self.key_path(key), "list items must be strings")
                    })
                })
                .collect(),
            Some(v) => scalar_string(&v)
                .map(|s| vec![s])
                .ok_or_else(|| AwError::schema(self.key_path(key), "expected a list of strings")),
        }
    }

    pub fn templatable(&mut self, key: &str) -> Result<Option<Templatable>> {
        let path = self.key_path(key);
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Templatable::from_value(&v, &path).map(Some),
        }
    }

    /// String → string map with sorted keys (env blocks, headers)
    pub fn string_map(&mut self, key: &str) -> Result<BTreeMap<String, String>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Mapping(m)) => {
                let mut out = BTreeMap::new();
                for (k, v) in &m {
                    let k = scalar_string(k)
                        .ok_or_else(|| AwError::schema(self.key_path(key), "keys must be strings"))?;
                    let v = scalar_string(v).ok_or_else(|| {
                        AwError::schema(format!("{}.{}", self.key_path(key), k), "expected a scalar")
                    })?;
                    out.insert(k, v);
                }
                Ok(out)
            }
            Some(other) => Err(AwError::schema(
                self.key_path(key),
                format!("expected a mapping, got {}", value_type_name(&other)),
            )),
        }
    }

    pub fn mapping(&mut self, key: &str) -> Result<Option<Mapping>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Mapping(m)) => Ok(Some(m)),
            Some(other) => Err(AwError::schema(
                self.key_path(key),
                format!("expected a mapping, got {}", value_type_name(&other)),
            )),
        }
    }

    pub fn sequence(&mut self, key: &str) -> Result<Vec<Value>> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Sequence(s)) => Ok(s),
            Some(other) => Err(AwError::schema(
                self.key_path(key),
                format!("expected a list, got {}", value_type_name(&other)),
            )),
        }
    }

    /// Keys not consumed so far
    pub fn remaining_keys(&self) -> Vec<String> {
        self.map.keys().filter_map(scalar_string).collect()
    }

    pub fn into_rest(self) -> Mapping {
        self.map
    }
}

/// Stringify a YAML scalar
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
