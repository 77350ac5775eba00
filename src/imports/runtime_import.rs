//! `{{#runtime-import path}}` macros
//!
//! When a workflow inlines its imports, local runtime-import macros in the
//! prompt are expanded at compile time. URL macros always stay for the
//! runtime; the optional form `{{#runtime-import? path}}` expands to nothing
//! when the file is missing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::resolver::{extract_section, split_section};
use crate::error::{AwError, Result};

/// `{{#runtime-import path}}` / `{{#runtime-import? path}}`
pub static RUNTIME_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{#runtime-import(\?)?\s+([^}\s]+)\s*\}\}").unwrap()
});

/// Render a runtime-import macro line
pub fn runtime_import_macro(path: &str) -> String {
    format!("{{{{#runtime-import {}}}}}", path)
}

fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Expand local runtime-import macros in `text`, relative to `base_dir`.
///
/// `stack` holds the canonical paths currently being expanded; seeing one of
/// them again is an import cycle.
pub fn expand_runtime_imports(
    text: &str,
    base_dir: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in RUNTIME_IMPORT_RE.captures_iter(text) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let optional = caps.get(1).is_some();
        let target = &caps[2];

        out.push_str(&text[last..whole.start]);
        last = whole.end;

        if is_url(target) {
            out.push_str(&text[whole.clone()]);
            continue;
        }

        let (rel, section) = split_section(target);
        let candidate = base_dir.join(rel);
        if !candidate.is_file() {
            if optional {
                continue;
            }
            return Err(AwError::ImportNotFound {
                import: target.to_string(),
                chain: chain_display(stack),
            });
        }

        let canonical = fs::canonicalize(&candidate).map_err(|e| AwError::io(&candidate, e))?;
        if stack.contains(&canonical) {
            let mut chain = chain_display(stack);
            chain.push_str(" → ");
            chain.push_str(target);
            return Err(AwError::ImportCycle { chain });
        }

        let content = fs::read_to_string(&canonical).map_err(|e| AwError::io(&canonical, e))?;
        // Fragments may carry their own header; only the body is spliced in
        let body = match crate::frontmatter::parse(&content, target) {
            Ok(parsed) => parsed.body,
            Err(_) => content,
        };
        let body = match &section {
            Some(name) => extract_section(&body, name),
            None => body,
        };

        let nested_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.to_path_buf());
        stack.push(canonical);
        let expanded = expand_runtime_imports(&body, &nested_dir, stack)?;
        stack.pop();

        out.push_str(expanded.trim_end());
    }

    out.push_str(&text[last..]);
    Ok(out)
}

fn chain_display(stack: &[PathBuf]) -> String {
    stack
        .iter()
        .map(|p| {
            p.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect::<Vec<_>>()
        .join(" → ")
}
