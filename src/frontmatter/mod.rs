//! Front-matter Module - split a workflow Markdown file into header and body
//!
//! The header is kept as a dynamic `serde_yaml::Mapping`; typing happens later
//! in [`crate::ast`]. Nothing here interprets keys.
//!
//! - `parse`: locate the `---` fences and parse the YAML between them
//! - `schema`: JSON Schema check of the raw header

pub mod schema;

use serde_yaml::{Mapping, Value};

use crate::error::{AwError, Result};

/// Result of splitting a workflow document
#[derive(Debug, Clone)]
pub struct FrontmatterResult {
    /// Parsed header (insertion-ordered)
    pub frontmatter: Mapping,
    /// Markdown after the closing fence
    pub body: String,
    /// Raw YAML text between the fences
    pub raw: String,
    /// 1-based line of the opening `---`
    pub start_line: usize,
    /// 1-based line of the closing `---`
    pub end_line: usize,
}

impl FrontmatterResult {
    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frontmatter.get(key)
    }
}

/// Parse a document. `path` is only used in error messages.
///
/// # Example
///
/// ```
/// let doc = "---\nengine: copilot\n---\n# Triage\n";
/// let parsed = gh_aw::frontmatter::parse(doc, "triage.md").unwrap();
/// assert_eq!(parsed.body.trim(), "# Triage");
/// ```
pub fn parse(text: &str, path: &str) -> Result<FrontmatterResult> {
    let lines: Vec<&str> = text.lines().collect();

    let Some(open_idx) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Err(AwError::FrontmatterMissing {
            path: path.to_string(),
        });
    };
    if lines[open_idx].trim_end() != "---" {
        return Err(AwError::FrontmatterMissing {
            path: path.to_string(),
        });
    }

    let Some(close_rel) = lines[open_idx + 1..]
        .iter()
        .position(|l| l.trim() == "---")
    else {
        return Err(AwError::FrontmatterMissing {
            path: path.to_string(),
        });
    };
    let close_idx = open_idx + 1 + close_rel;

    let raw = lines[open_idx + 1..close_idx].join("\n");
    let body = lines[close_idx + 1..].join("\n");

    let frontmatter = parse_header(&raw, &lines, open_idx, path)?;

    Ok(FrontmatterResult {
        frontmatter,
        body,
        raw,
        start_line: open_idx + 1,
        end_line: close_idx + 1,
    })
}

fn parse_header(raw: &str, lines: &[&str], open_idx: usize, path: &str) -> Result<Mapping> {
    if raw.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let value: Value = serde_yaml::from_str(raw).map_err(|e| {
        // serde_yaml lines are 1-based relative to the header text
        let rel_line = e.location().map(|l| l.line()).unwrap_or(1);
        let doc_line = open_idx + 1 + rel_line;
        AwError::FrontmatterMalformed {
            path: path.to_string(),
            line: doc_line,
            snippet: lines
                .get(doc_line - 1)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            details: e.to_string(),
        }
    })?;

    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(AwError::FrontmatterMalformed {
            path: path.to_string(),
            line: open_idx + 2,
            snippet: lines.get(open_idx + 1).map(|s| s.to_string()).unwrap_or_default(),
            details: format!("front-matter must be a mapping, got {}", value_type_name(&other)),
        }),
    }
}

/// Human-readable YAML type name for diagnostics
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// First `# Heading` of a Markdown body, used as the default workflow name
pub fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("# "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_header_and_body() {
        let doc = "---\non: push\nengine: claude\n---\n\n# Title\nDo things.\n";
        let parsed = parse(doc, "w.md").unwrap();
        assert_eq!(parsed.frontmatter.len(), 2);
        assert_eq!(
            parsed.get("engine").and_then(Value::as_str),
            Some("claude")
        );
        assert!(parsed.body.contains("Do things."));
        assert_eq!(parsed.start_line, 1);
        assert_eq!(parsed.end_line, 4);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let doc = "\n\n---\nname: x\n---\nbody";
        let parsed = parse(doc, "w.md").unwrap();
        assert_eq!(parsed.start_line, 3);
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn crlf_is_tolerated() {
        let doc = "---\r\nname: x\r\n---\r\nbody\r\n";
        let parsed = parse(doc, "w.md").unwrap();
        assert_eq!(parsed.get("name").and_then(Value::as_str), Some("x"));
    }

    #[test]
    fn empty_header_is_empty_mapping() {
        let parsed = parse("---\n---\nprompt", "w.md").unwrap();
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, "prompt");
    }

    #[test]
    fn missing_opening_fence() {
        let err = parse("# Just markdown\n---\n", "w.md").unwrap_err();
        assert_eq!(err.code(), "AW-001");
    }

    #[test]
    fn missing_closing_fence() {
        let err = parse("---\nname: x\nno end", "w.md").unwrap_err();
        assert_eq!(err.code(), "AW-001");
    }

    #[test]
    fn malformed_yaml_reports_document_line() {
        let doc = "---\nname: ok\nengine: [copilot\n---\nbody";
        let err = parse(doc, "w.md").unwrap_err();
        match err {
            AwError::FrontmatterMalformed { line, .. } => {
                assert!(line >= 3, "line was {line}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_mapping_header_is_malformed() {
        let err = parse("---\n- a\n- b\n---\n", "w.md").unwrap_err();
        assert_eq!(err.code(), "AW-002");
        assert!(err.to_string().contains("sequence"));
    }

    #[test]
    fn preserves_key_order() {
        let doc = "---\nzeta: 1\nalpha: 2\nmid: 3\n---\n";
        let parsed = parse(doc, "w.md").unwrap();
        let keys: Vec<_> = parsed
            .frontmatter
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn heading_detection() {
        assert_eq!(
            first_heading("intro\n# Daily Report\n## sub"),
            Some("Daily Report".to_string())
        );
        assert_eq!(first_heading("## Only sub"), None);
    }
}
