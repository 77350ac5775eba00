//! Safe-input tools (`safe-inputs:`)
//!
//! Small custom tools exposed to the agent through a generated MCP server.
//! Each tool is a shell `run:` snippet or a JavaScript `script:` body.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use super::fields::Fields;
use crate::error::{AwError, Result};
use crate::util::OrderedMap;

/// Implementation of a safe-input tool
#[derive(Debug, Clone, PartialEq)]
pub enum SafeInputBody {
    Run(String),
    Script(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafeInputTool {
    pub name: String,
    pub description: String,
    /// Input schema, kept as declared
    pub inputs: Mapping,
    pub body: SafeInputBody,
    pub env: BTreeMap<String, String>,
}

impl SafeInputTool {
    fn from_value(name: &str, value: &Value) -> Result<Self> {
        let path = format!("safe-inputs.{}", name);
        let mut f = Fields::from_value(value, &path)?;
        let description = f.string("description")?.unwrap_or_default();
        let inputs = f.mapping("inputs")?.unwrap_or_default();
        let env = f.string_map("env")?;
        let body = match (f.string("run")?, f.string("script")?) {
            (Some(run), None) => SafeInputBody::Run(run),
            (None, Some(script)) => SafeInputBody::Script(script),
            (Some(_), Some(_)) => {
                return Err(AwError::schema(path, "declare either 'run' or 'script', not both"))
            }
            (None, None) => return Err(AwError::schema(path, "a 'run' or 'script' body is required")),
        };
        Ok(Self {
            name: name.to_string(),
            description,
            inputs,
            body,
            env,
        })
    }

    /// File name of the generated tool implementation
    pub fn file_name(&self) -> String {
        match self.body {
            SafeInputBody::Run(_) => format!("{}.sh", self.name),
            SafeInputBody::Script(_) => format!("{}.cjs", self.name),
        }
    }
}

/// All safe-input tools in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeInputsConfig {
    pub tools: OrderedMap<String, SafeInputTool>,
}

impl SafeInputsConfig {
    pub fn from_mapping(map: &Mapping) -> Result<Self> {
        let mut config = Self::default();
        config.merge_mapping(map)?;
        Ok(config)
    }

    /// Add tools not yet declared
    pub fn merge_mapping(&mut self, map: &Mapping) -> Result<()> {
        for (k, v) in map {
            let name = k
                .as_str()
                .ok_or_else(|| AwError::schema("safe-inputs", "tool names must be strings"))?;
            if self.tools.contains_key(name) {
                continue;
            }
            self.tools
                .insert(name.to_string(), SafeInputTool::from_value(name, v)?);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Secrets referenced by tool env blocks
    pub fn env(&self) -> BTreeMap<String, String> {
        self.tools
            .values()
            .flat_map(|t| t.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}
