//! Imports Module - recursive resolution of shared workflow fragments
//!
//! - `resolver`: `imports:` traversal with cycle detection and memoization
//! - `runtime_import`: `{{#runtime-import …}}` macro expansion for inlined prompts
//!
//! Imported files contribute both prompt text and mergeable front-matter
//! sections (`tools`, `mcp-servers`, `safe-outputs`, `network.allowed`,
//! `steps`, `permissions`, `safe-inputs`). The main document always wins on
//! key collisions; among imports the first declaration wins.

mod resolver;
mod runtime_import;

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

pub use resolver::ImportResolver;
pub use runtime_import::{expand_runtime_imports, runtime_import_macro, RUNTIME_IMPORT_RE};

/// Marker directory for custom agent files
pub const AGENT_DIR_MARKER: &str = ".github/agents/";

/// One imported file, as seen by the compile
#[derive(Debug, Clone)]
pub struct ImportedFile {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Path relative to the main workflow directory (forward slashes)
    pub display: String,
    /// Optional `#Section` selector from the import entry
    pub section: Option<String>,
    /// xxh3 content hash
    pub hash: String,
    /// Parsed header (empty for plain Markdown fragments)
    pub frontmatter: Mapping,
    /// Markdown body (section-filtered when a selector was given)
    pub body: String,
}

impl ImportedFile {
    /// Agent files live under `.github/agents/` and need runtime access
    pub fn is_agent_file(&self) -> bool {
        is_agent_path(&self.display) || is_agent_path(&self.path.to_string_lossy())
    }

    /// Display path with its `#Section` selector, as written in macros and the manifest
    pub fn label(&self) -> String {
        match &self.section {
            Some(section) => format!("{}#{}", self.display, section),
            None => self.display.clone(),
        }
    }

    /// Agent name passed to engines (`.github/agents/reviewer.agent.md` → `reviewer`)
    pub fn agent_name(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        file.trim_end_matches(".md")
            .trim_end_matches(".agent")
            .to_string()
    }
}

/// True when a path points into `.github/agents/`
pub fn is_agent_path(path: &str) -> bool {
    path.replace('\\', "/").contains(AGENT_DIR_MARKER)
}

/// Front-matter contributions collected from every import
#[derive(Debug, Clone, Default)]
pub struct MergedImports {
    pub tools: Mapping,
    pub mcp_servers: Mapping,
    pub safe_outputs: Mapping,
    pub safe_inputs: Mapping,
    pub network_allowed: Vec<String>,
    pub steps: Vec<Value>,
    /// Permissions each import declares, keyed by display path
    pub permissions: Vec<(String, Mapping)>,
}

/// Outcome of import resolution
#[derive(Debug, Clone, Default)]
pub struct ResolvedImports {
    /// Every imported file in depth-first, left-to-right order (deduplicated)
    pub files: Vec<ImportedFile>,
    /// Merged front-matter sections
    pub merged: MergedImports,
    /// Final prompt text (inlined or carrying runtime-import macros)
    pub prompt: String,
}

impl ResolvedImports {
    /// Imported agent files (at most one is valid)
    pub fn agent_files(&self) -> impl Iterator<Item = &ImportedFile> {
        self.files.iter().filter(|f| f.is_agent_file())
    }

    /// Import labels in traversal order
    pub fn import_paths(&self) -> Vec<String> {
        self.files.iter().map(ImportedFile::label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_path_detection() {
        assert!(is_agent_path(".github/agents/reviewer.agent.md"));
        assert!(is_agent_path("../.github/agents/x.md"));
        assert!(!is_agent_path("shared/agents.md"));
    }

    #[test]
    fn agent_name_strips_suffixes() {
        let file = ImportedFile {
            path: PathBuf::from("/repo/.github/agents/reviewer.agent.md"),
            display: "../agents/reviewer.agent.md".into(),
            section: None,
            hash: String::new(),
            frontmatter: Mapping::new(),
            body: String::new(),
        };
        assert_eq!(file.agent_name(), "reviewer");
        assert!(file.is_agent_file());
        assert_eq!(file.label(), "../agents/reviewer.agent.md");
    }

    #[test]
    fn label_carries_section() {
        let file = ImportedFile {
            path: PathBuf::from("/repo/.github/workflows/shared/guide.md"),
            display: "shared/guide.md".into(),
            section: Some("Usage".into()),
            hash: String::new(),
            frontmatter: Mapping::new(),
            body: String::new(),
        };
        assert_eq!(file.label(), "shared/guide.md#Usage");
    }
}
