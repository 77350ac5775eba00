// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Compiler Error Types with Error Codes
//!
//! Error code ranges:
//! - AW-001-009: Front-matter errors
//! - AW-010-019: Import resolution errors
//! - AW-020-029: Schema / type coercion errors
//! - AW-030-039: Semantic validation errors
//! - AW-040-049: IO / serialization errors
//! - AW-050-059: Internal assembly errors
//!
//! Every variant maps onto an [`ErrorKind`] so callers (and tests) can match on
//! the category without caring about the payload.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AwError>;

/// Format a list of messages for single-line display
fn format_messages(messages: &[String]) -> String {
    match messages.len() {
        0 => "no errors".to_string(),
        1 => messages[0].clone(),
        n => format!("{} errors: {}", n, messages.join("; ")),
    }
}

/// Format schema validation errors for display
fn format_schema_errors(errors: &[crate::frontmatter::schema::SchemaViolation]) -> String {
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            if e.path.is_empty() {
                e.message.clone()
            } else {
                format!("[{}] {}", e.path, e.message)
            }
        })
        .collect();
    format_messages(&messages)
}

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse error category, stable across payload changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FrontmatterMissing,
    FrontmatterMalformed,
    ImportNotFound,
    ImportCycle,
    ImportAgentWithInlined,
    SchemaError,
    ValidationError,
    IoError,
    Internal,
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum AwError {
    // ═══════════════════════════════════════════
    // FRONT-MATTER ERRORS (001-009)
    // ═══════════════════════════════════════════
    #[error("[AW-001] No front-matter found in {path}: expected '---' on the first non-empty line and a closing '---'")]
    #[diagnostic(
        code(gh_aw::frontmatter_missing),
        help("Start the file with a YAML block delimited by '---' lines")
    )]
    FrontmatterMissing { path: String },

    #[error("[AW-002] Malformed front-matter in {path} at line {line}: {details}\n  | {snippet}")]
    #[diagnostic(
        code(gh_aw::frontmatter_malformed),
        help("Check YAML syntax: indentation must be consistent, strings with special chars need quoting")
    )]
    FrontmatterMalformed {
        path: String,
        line: usize,
        snippet: String,
        details: String,
    },

    // ═══════════════════════════════════════════
    // IMPORT ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[AW-010] Import not found: {import} (import chain: {chain})")]
    #[diagnostic(
        code(gh_aw::import_not_found),
        help("Import paths are resolved relative to the importing file")
    )]
    ImportNotFound { import: String, chain: String },

    #[error("[AW-011] Import cycle detected: {chain}")]
    #[diagnostic(code(gh_aw::import_cycle), help("Remove one of the imports forming the cycle"))]
    ImportCycle { chain: String },

    #[error("[AW-012] Cannot import agent file '{path}' with inlined-imports: true (agent files require runtime access)")]
    #[diagnostic(
        code(gh_aw::import_agent_inlined),
        help("Remove 'inlined-imports: true' or drop the .github/agents/ import")
    )]
    ImportAgentWithInlined { path: String },

    // ═══════════════════════════════════════════
    // SCHEMA ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[AW-020] Invalid value at '{path}': {message}")]
    #[diagnostic(code(gh_aw::schema_error), help("Check the field type against the front-matter reference"))]
    SchemaError { path: String, message: String },

    #[error("[AW-021] Front-matter schema validation failed: {}", format_schema_errors(.errors))]
    #[diagnostic(
        code(gh_aw::schema_validation_failed),
        help("Check front-matter keys against schemas/frontmatter.schema.json")
    )]
    SchemaValidationFailed {
        errors: Vec<crate::frontmatter::schema::SchemaViolation>,
    },

    // ═══════════════════════════════════════════
    // VALIDATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[AW-030] Workflow validation failed: {}", format_messages(.messages))]
    #[diagnostic(code(gh_aw::validation_error), help("Fix each reported problem and recompile"))]
    ValidationError { messages: Vec<String> },

    #[error("[AW-031] Strict mode violation: {}", format_messages(.messages))]
    #[diagnostic(code(gh_aw::strict_mode), help("Fix the issues or remove 'strict: true'"))]
    StrictModeViolation { messages: Vec<String> },

    // ═══════════════════════════════════════════
    // IO / SERIALIZATION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[AW-040] IO error on {path}: {source}")]
    #[diagnostic(code(gh_aw::io_error), help("Check the file path exists and is readable/writable"))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[AW-041] YAML error: {0}")]
    #[diagnostic(code(gh_aw::yaml))]
    YamlError(#[from] serde_yaml::Error),

    #[error("[AW-042] JSON error: {0}")]
    #[diagnostic(code(gh_aw::json))]
    JsonError(#[from] serde_json::Error),

    #[error("[AW-043] Config error: {reason}")]
    #[diagnostic(code(gh_aw::config_error))]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // INTERNAL ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[AW-050] Unknown runtime script '{name}'")]
    UnknownScript { name: String },

    #[error("[AW-051] No pin for action '{action}'")]
    UnknownAction { action: String },

    #[error("[AW-052] Invalid job graph: {reason}")]
    JobGraph { reason: String },

    #[error("[AW-053] Failed to render output: {reason}")]
    Emit { reason: String },
}

impl AwError {
    /// Get the error code (e.g., "AW-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::FrontmatterMissing { .. } => "AW-001",
            Self::FrontmatterMalformed { .. } => "AW-002",
            Self::ImportNotFound { .. } => "AW-010",
            Self::ImportCycle { .. } => "AW-011",
            Self::ImportAgentWithInlined { .. } => "AW-012",
            Self::SchemaError { .. } => "AW-020",
            Self::SchemaValidationFailed { .. } => "AW-021",
            Self::ValidationError { .. } => "AW-030",
            Self::StrictModeViolation { .. } => "AW-031",
            Self::IoError { .. } => "AW-040",
            Self::YamlError(_) => "AW-041",
            Self::JsonError(_) => "AW-042",
            Self::ConfigError { .. } => "AW-043",
            Self::UnknownScript { .. } => "AW-050",
            Self::UnknownAction { .. } => "AW-051",
            Self::JobGraph { .. } => "AW-052",
            Self::Emit { .. } => "AW-053",
        }
    }

    /// Category used by callers that only care about the failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FrontmatterMissing { .. } => ErrorKind::FrontmatterMissing,
            Self::FrontmatterMalformed { .. } => ErrorKind::FrontmatterMalformed,
            Self::ImportNotFound { .. } => ErrorKind::ImportNotFound,
            Self::ImportCycle { .. } => ErrorKind::ImportCycle,
            Self::ImportAgentWithInlined { .. } => ErrorKind::ImportAgentWithInlined,
            Self::SchemaError { .. } | Self::SchemaValidationFailed { .. } => {
                ErrorKind::SchemaError
            }
            Self::ValidationError { .. } | Self::StrictModeViolation { .. } => {
                ErrorKind::ValidationError
            }
            Self::IoError { .. } | Self::ConfigError { .. } => ErrorKind::IoError,
            Self::YamlError(_) | Self::JsonError(_) => ErrorKind::SchemaError,
            Self::UnknownScript { .. }
            | Self::UnknownAction { .. }
            | Self::JobGraph { .. }
            | Self::Emit { .. } => ErrorKind::Internal,
        }
    }

    /// Aggregated validation messages, if this is a validation failure
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationError { messages } | Self::StrictModeViolation { messages } => {
                messages.clone()
            }
            other => vec![other.to_string()],
        }
    }

    /// Shorthand for a schema error at a dotted path
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an `std::io::Error` with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl FixSuggestion for AwError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            AwError::FrontmatterMissing { .. } => {
                Some("Add a '---' fenced YAML header at the top of the file")
            }
            AwError::FrontmatterMalformed { .. } => Some("Check YAML syntax: indentation and quoting"),
            AwError::ImportNotFound { .. } => {
                Some("Check the import path; it is relative to the importing file")
            }
            AwError::ImportCycle { .. } => Some("Break the circular import chain"),
            AwError::ImportAgentWithInlined { .. } => {
                Some("Agent files must stay runtime imports; remove 'inlined-imports: true'")
            }
            AwError::SchemaError { .. } => Some("Check the value type for this field"),
            AwError::SchemaValidationFailed { .. } => {
                Some("Remove unknown keys and fix value types in the front-matter")
            }
            AwError::ValidationError { .. } => Some("Fix each listed problem and recompile"),
            AwError::StrictModeViolation { .. } => {
                Some("Route writes through safe-outputs and restrict network access")
            }
            AwError::IoError { .. } => Some("Check file permissions and that the path exists"),
            AwError::YamlError(_) => Some("Check YAML syntax: indentation and quoting"),
            AwError::JsonError(_) => None,
            AwError::ConfigError { .. } => {
                Some("Check ~/.config/gh-aw/config.toml for syntax errors")
            }
            AwError::UnknownScript { .. } | AwError::JobGraph { .. } | AwError::Emit { .. } => None,
            AwError::UnknownAction { .. } => Some("Add the action to [pins] in the config file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ═══════════════════════════════════════════════════════════════════════════
    // FRONT-MATTER ERRORS (001-009)
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_frontmatter_missing_code_and_display() {
        let err = AwError::FrontmatterMissing {
            path: "daily.md".to_string(),
        };
        assert_eq!(err.code(), "AW-001");
        assert_eq!(err.kind(), ErrorKind::FrontmatterMissing);
        let msg = err.to_string();
        assert!(msg.contains("[AW-001]"));
        assert!(msg.contains("daily.md"));
    }

    #[test]
    fn test_frontmatter_malformed_carries_snippet() {
        let err = AwError::FrontmatterMalformed {
            path: "a.md".to_string(),
            line: 4,
            snippet: "engine: [copilot".to_string(),
            details: "did not find expected ',' or ']'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 4"));
        assert!(msg.contains("engine: [copilot"));
        assert!(err.fix_suggestion().unwrap().contains("YAML"));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IMPORT ERRORS (010-019)
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_import_cycle_shows_chain() {
        let err = AwError::ImportCycle {
            chain: "a.md → b.md → a.md".to_string(),
        };
        assert_eq!(err.code(), "AW-011");
        assert_eq!(err.kind(), ErrorKind::ImportCycle);
        assert!(err.to_string().contains("a.md → b.md → a.md"));
    }

    #[test]
    fn test_import_not_found_shows_chain() {
        let err = AwError::ImportNotFound {
            import: "shared/missing.md".to_string(),
            chain: "main.md → shared/a.md".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shared/missing.md"));
        assert!(msg.contains("main.md → shared/a.md"));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS (030-039)
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_validation_error_aggregates_messages() {
        let err = AwError::ValidationError {
            messages: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        let msg = err.to_string();
        assert!(msg.contains("2 errors"));
        assert!(msg.contains("first; second"));
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn test_single_validation_message_not_counted() {
        let err = AwError::ValidationError {
            messages: vec!["only one".to_string()],
        };
        assert!(!err.to_string().contains("errors:"));
        assert!(err.to_string().contains("only one"));
    }

    #[test]
    fn test_strict_mode_is_validation_kind() {
        let err = AwError::StrictModeViolation {
            messages: vec!["write permission".to_string()],
        };
        assert_eq!(err.code(), "AW-031");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IO / SERIALIZATION ERRORS (040-049)
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_io_error_helper_keeps_path() {
        let err = AwError::io(
            "/tmp/x.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(err.to_string().contains("/tmp/x.md"));
    }

    #[test]
    fn test_yaml_error_from_serde() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [b").unwrap_err();
        let err: AwError = yaml_err.into();
        assert_eq!(err.code(), "AW-041");
    }

    #[test]
    fn test_schema_helper() {
        let err = AwError::schema("safe-outputs.create-issue.max", "expected integer");
        assert_eq!(err.kind(), ErrorKind::SchemaError);
        assert!(err.to_string().contains("safe-outputs.create-issue.max"));
    }
}
