//! Import Resolver
//!
//! Walks `imports:` depth-first, left-to-right. Files currently on the walk
//! stack are "gray"; meeting one again is a cycle. Files already finished are
//! "black" and are skipped, so a diamond contributes each file once.
//!
//! Parsed files are memoized by `(canonical path, content hash)`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

use super::{
    expand_runtime_imports, runtime_import_macro, ImportedFile, MergedImports, ResolvedImports,
};
use crate::error::{AwError, Result};
use crate::frontmatter;
use crate::util::content_hash;

/// Memoized parse of one file
#[derive(Debug)]
struct ParsedFile {
    frontmatter: Mapping,
    body: String,
}

/// Resolves the `imports:` graph of one workflow
pub struct ImportResolver {
    /// Directory of the main workflow (display paths are relative to it)
    root_dir: PathBuf,
    cache: FxHashMap<(PathBuf, String), Arc<ParsedFile>>,
    parse_count: usize,
}

/// Walk state for one resolution
struct Walk {
    /// Gray set as an ordered stack: (canonical path, display)
    stack: Vec<(PathBuf, String)>,
    /// Black set, keyed by file and `#Section` selector
    done: FxHashSet<(PathBuf, Option<String>)>,
    files: Vec<ImportedFile>,
}

impl ImportResolver {
    /// Create a resolver for a workflow living at `main_path`
    pub fn new(main_path: &Path) -> Self {
        let root_dir = main_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let root_dir = fs::canonicalize(&root_dir).unwrap_or(root_dir);
        Self {
            root_dir,
            cache: FxHashMap::default(),
            parse_count: 0,
        }
    }

    /// Number of distinct file parses performed (memo misses)
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    /// Resolve every import of the main document and build the prompt.
    #[instrument(skip_all, fields(main = %main_path.display()))]
    pub fn resolve(
        &mut self,
        main_path: &Path,
        main_frontmatter: &Mapping,
        main_body: &str,
        inlined: bool,
    ) -> Result<ResolvedImports> {
        let main_canonical =
            fs::canonicalize(main_path).unwrap_or_else(|_| main_path.to_path_buf());
        let main_display = main_path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| main_path.display().to_string());

        let mut walk = Walk {
            stack: vec![(main_canonical.clone(), main_display)],
            done: FxHashSet::default(),
            files: Vec::new(),
        };

        let root_dir = self.root_dir.clone();
        for spec in import_specs(main_frontmatter) {
            self.visit(&spec, &root_dir, &mut walk)?;
        }

        if inlined {
            if let Some(agent) = walk.files.iter().find(|f| f.is_agent_file()) {
                return Err(AwError::ImportAgentWithInlined {
                    path: agent.display.clone(),
                });
            }
        }

        let merged = merge_imports(&walk.files);
        let prompt = if inlined {
            self.inline_prompt(&walk.files, main_body, &main_canonical)?
        } else {
            macro_prompt(&walk.files, main_body)
        };

        debug!(imports = walk.files.len(), inlined, "imports resolved");
        Ok(ResolvedImports {
            files: walk.files,
            merged,
            prompt,
        })
    }

    fn visit(&mut self, spec: &str, from_dir: &Path, walk: &mut Walk) -> Result<()> {
        let (rel, section) = split_section(spec);
        let candidate = from_dir.join(rel);

        if !candidate.is_file() {
            let mut chain: Vec<&str> = walk.stack.iter().map(|(_, d)| d.as_str()).collect();
            chain.push(spec);
            return Err(AwError::ImportNotFound {
                import: spec.to_string(),
                chain: chain.join(" → "),
            });
        }

        let canonical = fs::canonicalize(&candidate).map_err(|e| AwError::io(&candidate, e))?;
        let shown = self.display_path(&canonical, rel);

        if let Some(pos) = walk.stack.iter().position(|(p, _)| *p == canonical) {
            let mut chain: Vec<&str> = walk.stack[pos..].iter().map(|(_, d)| d.as_str()).collect();
            chain.push(&shown);
            return Err(AwError::ImportCycle {
                chain: chain.join(" → "),
            });
        }
        let key = (canonical.clone(), section.clone());
        if walk.done.contains(&key) {
            debug!(import = %spec, "already imported, skipping");
            return Ok(());
        }
        // Another section of a file already walked adds prompt text only
        let first_visit = !walk.done.iter().any(|(p, _)| *p == canonical);

        let content = fs::read_to_string(&canonical).map_err(|e| AwError::io(&canonical, e))?;
        let hash = content_hash(&content);
        let parsed = self.parse_cached(&canonical, &hash, &content, &shown)?;

        let body = match &section {
            Some(name) => extract_section(&parsed.body, name),
            None => parsed.body.clone(),
        };

        walk.done.insert(key);
        walk.files.push(ImportedFile {
            path: canonical.clone(),
            display: shown.clone(),
            section,
            hash,
            frontmatter: if first_visit {
                parsed.frontmatter.clone()
            } else {
                Mapping::new()
            },
            body,
        });
        if !first_visit {
            return Ok(());
        }

        let nested_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| from_dir.to_path_buf());
        walk.stack.push((canonical, shown));
        for nested in import_specs(&parsed.frontmatter) {
            self.visit(&nested, &nested_dir, walk)?;
        }
        walk.stack.pop();

        Ok(())
    }

    fn parse_cached(
        &mut self,
        canonical: &Path,
        hash: &str,
        content: &str,
        display: &str,
    ) -> Result<Arc<ParsedFile>> {
        let key = (canonical.to_path_buf(), hash.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        self.parse_count += 1;
        let parsed = match frontmatter::parse(content, display) {
            Ok(result) => ParsedFile {
                frontmatter: result.frontmatter,
                body: result.body,
            },
            // Shared fragments may be plain Markdown
            Err(AwError::FrontmatterMissing { .. }) => ParsedFile {
                frontmatter: Mapping::new(),
                body: content.to_string(),
            },
            Err(e) => return Err(e),
        };
        let parsed = Arc::new(parsed);
        self.cache.insert(key, Arc::clone(&parsed));
        Ok(parsed)
    }

    fn display_path(&self, canonical: &Path, fallback: &str) -> String {
        if let Ok(rel) = canonical.strip_prefix(&self.root_dir) {
            return rel.to_string_lossy().replace('\\', "/");
        }
        // Outside the workflow directory (e.g. ../agents): keep the import text
        fallback.replace('\\', "/")
    }

    fn inline_prompt(
        &self,
        files: &[ImportedFile],
        main_body: &str,
        main_canonical: &Path,
    ) -> Result<String> {
        let mut parts = Vec::new();
        for file in files {
            let dir = file.path.parent().unwrap_or(&self.root_dir);
            let mut stack = vec![file.path.clone()];
            let expanded = expand_runtime_imports(&file.body, dir, &mut stack)?;
            let trimmed = expanded.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
        let mut stack = vec![main_canonical.to_path_buf()];
        let main = expand_runtime_imports(main_body, &self.root_dir, &mut stack)?;
        parts.push(main.trim().to_string());
        Ok(format!("{}\n", parts.join("\n\n")))
    }
}

/// Prompt for runtime resolution: one macro line per non-agent import
fn macro_prompt(files: &[ImportedFile], main_body: &str) -> String {
    let mut out = String::new();
    for file in files.iter().filter(|f| !f.is_agent_file()) {
        out.push_str(&runtime_import_macro(&file.label()));
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(main_body.trim());
    out.push('\n');
    out
}

/// `imports:` entries of a header (string or `{path}` form)
pub(crate) fn import_specs(frontmatter: &Mapping) -> Vec<String> {
    let Some(Value::Sequence(items)) = frontmatter.get("imports") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Mapping(m) => m
                .get("path")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// `shared/a.md#Usage` → (`shared/a.md`, Some("Usage"))
pub(crate) fn split_section(spec: &str) -> (&str, Option<String>) {
    match spec.split_once('#') {
        Some((path, section)) if !section.trim().is_empty() => {
            (path, Some(section.trim().to_string()))
        }
        Some((path, _)) => (path, None),
        None => (spec, None),
    }
}

/// Body text under the heading `name`, up to the next heading of the same or
/// higher level. Empty when the heading does not exist.
pub(crate) fn extract_section(body: &str, name: &str) -> String {
    let mut out = Vec::new();
    let mut level = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        let is_heading = hashes > 0 && trimmed[hashes..].starts_with(' ');
        match level {
            None => {
                if is_heading && trimmed[hashes..].trim().eq_ignore_ascii_case(name) {
                    level = Some(hashes);
                    out.push(line);
                }
            }
            Some(l) => {
                if is_heading && hashes <= l {
                    break;
                }
                out.push(line);
            }
        }
    }
    out.join("\n")
}

/// Fold imported headers; first declaration wins
fn merge_imports(files: &[ImportedFile]) -> MergedImports {
    let mut merged = MergedImports::default();
    for file in files {
        let fm = &file.frontmatter;
        merge_first_wins(&mut merged.tools, fm.get("tools"));
        merge_first_wins(&mut merged.mcp_servers, fm.get("mcp-servers"));
        merge_first_wins(&mut merged.safe_outputs, fm.get("safe-outputs"));
        merge_first_wins(&mut merged.safe_inputs, fm.get("safe-inputs"));

        if let Some(Value::Sequence(allowed)) = fm
            .get("network")
            .and_then(|n| n.as_mapping())
            .and_then(|n| n.get("allowed"))
        {
            for domain in allowed.iter().filter_map(Value::as_str) {
                if !merged.network_allowed.iter().any(|d| d == domain) {
                    merged.network_allowed.push(domain.to_string());
                }
            }
        }

        if let Some(Value::Sequence(steps)) = fm.get("steps") {
            merged.steps.extend(steps.iter().cloned());
        }

        if let Some(Value::Mapping(perms)) = fm.get("permissions") {
            merged.permissions.push((file.display.clone(), perms.clone()));
        }
    }
    merged
}

fn merge_first_wins(target: &mut Mapping, source: Option<&Value>) {
    let Some(Value::Mapping(source)) = source else {
        return;
    };
    for (k, v) in source {
        if !target.contains_key(k) {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn header(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn resolves_in_depth_first_order() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "a.md", "---\nimports: [c.md]\n---\nA body");
        write(dir.path(), "b.md", "B body");
        write(dir.path(), "c.md", "C body");

        let mut resolver = ImportResolver::new(&main);
        let resolved = resolver
            .resolve(&main, &header("imports: [a.md, b.md]"), "Main", false)
            .unwrap();
        assert_eq!(resolved.import_paths(), vec!["a.md", "c.md", "b.md"]);
    }

    #[test]
    fn diamond_is_included_once() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "a.md", "---\nimports: [shared.md]\n---\nA");
        write(dir.path(), "b.md", "---\nimports: [shared.md]\n---\nB");
        write(dir.path(), "shared.md", "S");

        let mut resolver = ImportResolver::new(&main);
        let resolved = resolver
            .resolve(&main, &header("imports: [a.md, b.md]"), "Main", false)
            .unwrap();
        assert_eq!(resolved.import_paths(), vec!["a.md", "shared.md", "b.md"]);
        assert_eq!(resolver.parse_count(), 3);
    }

    #[test]
    fn cycle_reports_chain() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "a.md", "---\nimports: [b.md]\n---\nA");
        write(dir.path(), "b.md", "---\nimports: [a.md]\n---\nB");

        let mut resolver = ImportResolver::new(&main);
        let err = resolver
            .resolve(&main, &header("imports: [a.md]"), "Main", false)
            .unwrap_err();
        match err {
            AwError::ImportCycle { chain } => assert_eq!(chain, "a.md → b.md → a.md"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_import_reports_chain() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "a.md", "---\nimports: [missing.md]\n---\nA");

        let mut resolver = ImportResolver::new(&main);
        let err = resolver
            .resolve(&main, &header("imports: [a.md]"), "Main", false)
            .unwrap_err();
        match err {
            AwError::ImportNotFound { import, chain } => {
                assert_eq!(import, "missing.md");
                assert_eq!(chain, "main.md → a.md → missing.md");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn agent_import_with_inlined_is_rejected() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "workflows/main.md", "");
        write(dir.path(), ".github/agents/helper.agent.md", "agent");

        let mut resolver = ImportResolver::new(&main);
        let err = resolver
            .resolve(
                &main,
                &header("imports: [../.github/agents/helper.agent.md]"),
                "Main",
                true,
            )
            .unwrap_err();
        assert_eq!(err.code(), "AW-012");
    }

    #[test]
    fn runtime_macros_when_not_inlined() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "shared/tone.md", "Be nice.");

        let mut resolver = ImportResolver::new(&main);
        let resolved = resolver
            .resolve(&main, &header("imports: [shared/tone.md]"), "Do work.", false)
            .unwrap();
        assert_eq!(
            resolved.prompt,
            "{{#runtime-import shared/tone.md}}\n\nDo work.\n"
        );
    }

    #[test]
    fn inlined_prompt_concatenates_bodies() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(dir.path(), "shared/tone.md", "---\ntools:\n  edit: {}\n---\nBe nice.\n");
        write(dir.path(), "extra.md", "Extra text");

        let mut resolver = ImportResolver::new(&main);
        let resolved = resolver
            .resolve(
                &main,
                &header("imports: [shared/tone.md]"),
                "Do work.\n{{#runtime-import extra.md}}",
                true,
            )
            .unwrap();
        assert_eq!(resolved.prompt, "Be nice.\n\nDo work.\nExtra text\n");
    }

    #[test]
    fn merge_keeps_first_declaration() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.md", "");
        write(
            dir.path(),
            "a.md",
            "---\ntools:\n  bash: [ls]\nnetwork:\n  allowed: [python]\n---\n",
        );
        write(
            dir.path(),
            "b.md",
            "---\ntools:\n  bash: [cat]\n  edit: {}\nnetwork:\n  allowed: [python, node]\npermissions:\n  issues: read\n---\n",
        );

        let mut resolver = ImportResolver::new(&main);
        let resolved = resolver
            .resolve(&main, &header("imports: [a.md, b.md]"), "", false)
            .unwrap();
        let merged = &resolved.merged;
        assert_eq!(merged.tools.len(), 2);
        assert_eq!(
            merged.tools.get("bash"),
            Some(&serde_yaml::from_str::<Value>("[ls]").unwrap())
        );
        assert_eq!(merged.network_allowed, vec!["python", "node"]);
        assert_eq!(merged.permissions.len(), 1);
        assert_eq!(merged.permissions[0].0, "b.md");
    }

    #[test]
    fn section_selector_extracts_heading() {
        let body = "# Top\nintro\n## Usage\nuse it\n### Detail\nmore\n## Other\nno";
        assert_eq!(extract_section(body, "Usage"), "## Usage\nuse it\n### Detail\nmore");
        assert_eq!(extract_section(body, "missing"), "");
        assert_eq!(split_section("a.md#Usage"), ("a.md", Some("Usage".into())));
        assert_eq!(split_section("a.md"), ("a.md", None));
    }

    #[test]
    fn object_form_imports_are_accepted() {
        let specs = import_specs(&header("imports:\n  - a.md\n  - path: b.md\n  - 3"));
        assert_eq!(specs, vec!["a.md", "b.md"]);
    }
}
