//! Workflow trigger (`on:`)
//!
//! The value is passed through to the lock file. Only `workflow_call`
//! detection and normalization live here.

use serde_yaml::{Mapping, Value};

/// The `on:` value, order preserved
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub raw: Value,
}

impl Default for Trigger {
    fn default() -> Self {
        let mut map = Mapping::new();
        map.insert("workflow_dispatch".into(), Value::Null);
        Self {
            raw: Value::Mapping(map),
        }
    }
}

impl Trigger {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// True when `event` appears as a scalar, list item or mapping key
    pub fn has_event(&self, event: &str) -> bool {
        match &self.raw {
            Value::String(s) => s == event,
            Value::Sequence(items) => items.iter().any(|v| v.as_str() == Some(event)),
            Value::Mapping(m) => m.contains_key(event),
            _ => false,
        }
    }

    pub fn uses_workflow_call(&self) -> bool {
        self.has_event("workflow_call")
    }

    /// Mapping form; scalar and list triggers become keys with null values
    pub fn to_mapping(&self) -> Mapping {
        match &self.raw {
            Value::Mapping(m) => m.clone(),
            Value::String(s) => {
                let mut m = Mapping::new();
                m.insert(Value::String(s.clone()), Value::Null);
                m
            }
            Value::Sequence(items) => {
                let mut m = Mapping::new();
                for item in items {
                    m.insert(item.clone(), Value::Null);
                }
                m
            }
            _ => Mapping::new(),
        }
    }
}
