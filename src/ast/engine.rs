//! Engine selection (`engine:`)
//!
//! ```yaml
//! engine: claude
//! # or
//! engine:
//!   id: codex
//!   version: 0.46.0
//!   model: gpt-5
//!   env:
//!     DEBUG_MODE: "1"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_yaml::Value;

use super::fields::{scalar_string, Fields};
use crate::error::{AwError, Result};

/// Supported coding agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    #[default]
    Copilot,
    Claude,
    Codex,
    Gemini,
    Custom,
}

impl EngineKind {
    pub const ALL: [EngineKind; 5] = [
        EngineKind::Copilot,
        EngineKind::Claude,
        EngineKind::Codex,
        EngineKind::Gemini,
        EngineKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Copilot => "copilot",
            EngineKind::Claude => "claude",
            EngineKind::Codex => "codex",
            EngineKind::Gemini => "gemini",
            EngineKind::Custom => "custom",
        }
    }

    /// Custom engines run user steps outside the firewall
    pub fn supports_firewall(&self) -> bool {
        !matches!(self, EngineKind::Custom)
    }
}

impl FromStr for EngineKind {
    type Err = AwError;

    fn from_str(s: &str) -> Result<Self> {
        EngineKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                AwError::schema(
                    "engine",
                    format!(
                        "unknown engine '{}' (expected one of: copilot, claude, codex, gemini, custom)",
                        s
                    ),
                )
            })
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed `engine:` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// CLI version override
    pub version: Option<String>,
    pub model: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Extra CLI arguments appended to the invocation
    pub args: Vec<String>,
    pub max_turns: Option<String>,
    /// Steps of a custom engine
    pub steps: Vec<Value>,
}

impl EngineConfig {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Parse the `engine:` value (absent → copilot)
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(id)) => Ok(Self::new(id.trim().parse()?)),
            Some(v @ Value::Mapping(_)) => {
                let mut f = Fields::from_value(v, "engine")?;
                let id = f
                    .string("id")?
                    .ok_or_else(|| AwError::schema("engine.id", "engine id is required"))?;
                let kind: EngineKind = id.trim().parse()?;
                let version = f.string("version")?;
                let model = f.string("model")?;
                let env = f.string_map("env")?;
                let args = f.strings("args")?;
                let max_turns = match f.take("max-turns") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(scalar_string(&v).ok_or_else(|| {
                        AwError::schema("engine.max-turns", "expected an integer or expression")
                    })?),
                };
                let steps = f.sequence("steps")?;
                if kind != EngineKind::Custom && !steps.is_empty() {
                    return Err(AwError::schema(
                        "engine.steps",
                        "custom steps are only allowed with 'id: custom'",
                    ));
                }
                Ok(Self {
                    kind,
                    version,
                    model,
                    env,
                    args,
                    max_turns,
                    steps,
                })
            }
            Some(_) => Err(AwError::schema("engine", "expected a string or a mapping")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<EngineConfig> {
        let v: Value = serde_yaml::from_str(yaml).unwrap();
        EngineConfig::from_value(Some(&v))
    }

    #[test]
    fn default_is_copilot() {
        assert_eq!(EngineConfig::from_value(None).unwrap().kind, EngineKind::Copilot);
    }

    #[test]
    fn string_form() {
        assert_eq!(parse("claude").unwrap().kind, EngineKind::Claude);
        assert!(parse("gpt").is_err());
    }

    #[test]
    fn mapping_form() {
        let e = parse("id: codex\nversion: 0.46.0\nmodel: gpt-5\nenv:\n  B: '2'\n  A: '1'\nmax-turns: 7").unwrap();
        assert_eq!(e.kind, EngineKind::Codex);
        assert_eq!(e.version.as_deref(), Some("0.46.0"));
        assert_eq!(e.model.as_deref(), Some("gpt-5"));
        assert_eq!(e.env.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(e.max_turns.as_deref(), Some("7"));
    }

    #[test]
    fn steps_require_custom_engine() {
        assert!(parse("id: claude\nsteps:\n  - run: echo hi").is_err());
        let custom = parse("id: custom\nsteps:\n  - run: echo hi").unwrap();
        assert_eq!(custom.steps.len(), 1);
    }
}
