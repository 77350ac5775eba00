//! Front-matter Schema Validator
//!
//! Validates the raw workflow header against the embedded JSON Schema before
//! any typing happens, so unknown keys and wrong value shapes are reported
//! together with their JSON pointer.
//!
//! ## Design
//!
//! - Uses embedded schema (compiled at build time)
//! - The YAML mapping is converted to JSON and checked with `jsonschema`
//! - Returns every violation, not just the first

use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;
use serde_yaml::Mapping;

use crate::error::AwError;

/// Embedded schema JSON (compiled at build time)
const SCHEMA_JSON: &str = include_str!("../../schemas/frontmatter.schema.json");

/// Global schema validator instance (lazy initialization)
static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Front-matter schema validator
pub struct FrontmatterSchemaValidator {
    validator: &'static Validator,
}

impl FrontmatterSchemaValidator {
    /// Create a validator backed by the cached global instance
    pub fn new() -> Result<Self, AwError> {
        let validator_result = VALIDATOR.get_or_init(|| {
            let schema: Value = serde_json::from_str(SCHEMA_JSON)
                .map_err(|e| format!("Failed to parse schema JSON: {}", e))?;
            Validator::new(&schema).map_err(|e| format!("Failed to compile schema: {}", e))
        });

        match validator_result {
            Ok(validator) => Ok(Self { validator }),
            Err(e) => Err(AwError::ConfigError { reason: e.clone() }),
        }
    }

    /// Validate a parsed front-matter mapping
    pub fn validate_mapping(&self, frontmatter: &Mapping) -> Result<(), AwError> {
        let value = serde_json::to_value(frontmatter).map_err(|e| AwError::SchemaError {
            path: String::new(),
            message: format!("front-matter cannot be represented as JSON: {}", e),
        })?;
        self.validate_value(&value)
    }

    /// Validate a JSON value against the schema
    pub fn validate_value(&self, value: &Value) -> Result<(), AwError> {
        let errors: Vec<SchemaViolation> = self
            .validator
            .iter_errors(value)
            .map(|e| SchemaViolation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
                kind: classify_error(&e),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AwError::SchemaValidationFailed { errors })
        }
    }
}

/// Schema validation error details
#[derive(Debug, Clone)]
pub struct SchemaViolation {
    /// JSON pointer path to the error (e.g., "/safe-outputs/create-issue/max")
    pub path: String,
    /// Human-readable error message
    pub message: String,
    /// Error classification
    pub kind: SchemaViolationKind,
}

/// Schema error classification
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaViolationKind {
    /// Unknown field (not in schema)
    UnknownField { field: String },
    /// Type mismatch
    TypeMismatch,
    /// Invalid enum value
    InvalidEnum { value: String },
    /// Generic validation error
    Other,
}

/// Classify a JSON Schema error
fn classify_error(error: &jsonschema::ValidationError) -> SchemaViolationKind {
    let kind = format!("{:?}", error.kind);

    if kind.contains("AdditionalProperties") {
        let field = extract_quoted(&error.to_string()).unwrap_or_else(|| "unknown".to_string());
        SchemaViolationKind::UnknownField { field }
    } else if kind.starts_with("Type") {
        SchemaViolationKind::TypeMismatch
    } else if kind.starts_with("Enum") {
        SchemaViolationKind::InvalidEnum {
            value: error.instance.to_string(),
        }
    } else {
        SchemaViolationKind::Other
    }
}

/// Extract the first quoted string from an error message
fn extract_quoted(msg: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if let Some(start) = msg.find(quote) {
            if let Some(end) = msg[start + 1..].find(quote) {
                return Some(msg[start + 1..start + 1 + end].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validator_creation_succeeds() {
        assert!(FrontmatterSchemaValidator::new().is_ok());
    }

    #[test]
    fn minimal_frontmatter_is_valid() {
        let v = FrontmatterSchemaValidator::new().unwrap();
        let value = json!({
            "on": {"workflow_dispatch": null},
            "engine": "copilot",
            "safe-outputs": {"create-issue": {"title-prefix": "[ai] "}}
        });
        assert!(v.validate_value(&value).is_ok());
    }

    #[test]
    fn unknown_top_level_key_is_reported() {
        let v = FrontmatterSchemaValidator::new().unwrap();
        let err = v.validate_value(&json!({"enigne": "copilot"})).unwrap_err();
        match err {
            AwError::SchemaValidationFailed { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(
                    errors[0].kind,
                    SchemaViolationKind::UnknownField { .. }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_type_is_reported_with_path() {
        let v = FrontmatterSchemaValidator::new().unwrap();
        let err = v
            .validate_value(&json!({"imports": "shared.md"}))
            .unwrap_err();
        match err {
            AwError::SchemaValidationFailed { errors } => {
                assert_eq!(errors[0].path, "/imports");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn all_violations_are_collected() {
        let v = FrontmatterSchemaValidator::new().unwrap();
        let err = v
            .validate_value(&json!({"strict": "yes", "inlined-imports": 3}))
            .unwrap_err();
        match err {
            AwError::SchemaValidationFailed { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extract_quoted_finds_field() {
        assert_eq!(
            extract_quoted("Additional properties are not allowed ('enigne' was unexpected)"),
            Some("enigne".to_string())
        );
        assert_eq!(extract_quoted("no quotes"), None);
    }
}
