//! Workflow validator
//!
//! Runs every check against the built [`WorkflowData`] and aggregates the
//! results instead of stopping at the first problem:
//!
//! - Layer 1: ranges (ports, sizes, retention, timeouts)
//! - Layer 2: tools (guard policy, bash, credentials)
//! - Layer 3: safe outputs (target repositories, credentials)
//! - Layer 4: checkouts and imports
//! - Layer 5: engine capabilities (warnings only)
//! - Layer 6: strict mode
//!
//! Errors fail with `ValidationError`. In strict mode, strict violations and
//! every collected warning fail with `StrictModeViolation`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::ast::{AppConfig, BashTool, FirewallSetting, GitHubTool, GuardRepos, WorkflowData};
use crate::checkout::current_keys;
use crate::engine::EngineRegistry;
use crate::error::{AwError, Result};
use crate::permissions::Scope;
use crate::util::constants::{MAX_REPO_MEMORY_FILE_SIZE, MAX_RETENTION_DAYS, MIN_RETENTION_DAYS};
use crate::util::is_expression;

static TRACKER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,}$").unwrap());

static OWNER_REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap());

static GUARD_PATTERN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]+/[a-z0-9_.-]*\*?$").unwrap());

const MIN_INTEGRITY_LEVELS: &[&str] = &["none", "reader", "writer", "merged"];

/// Problems found in one workflow
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Only reported when the workflow is strict
    pub strict: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.strict.is_empty()
    }

    /// Turn the report into the compile outcome: the warnings, or an error
    pub fn into_result(self, strict: bool) -> Result<Vec<String>> {
        if !self.errors.is_empty() {
            return Err(AwError::ValidationError {
                messages: self.errors,
            });
        }
        if strict && !(self.strict.is_empty() && self.warnings.is_empty()) {
            let mut messages = self.strict;
            messages.extend(self.warnings);
            return Err(AwError::StrictModeViolation { messages });
        }
        Ok(self.warnings)
    }
}

/// Run every check. `extra_warnings` come from later passes (MCP secrets).
#[instrument(skip_all, fields(workflow = %data.workflow_id))]
pub fn check(data: &WorkflowData, engines: &EngineRegistry, extra_warnings: &[String]) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.warnings.extend(data.warnings.iter().cloned());

    check_ranges(data, &mut report);
    check_tools(data, &mut report);
    check_safe_outputs(data, &mut report);
    check_checkouts_and_imports(data, &mut report);
    check_engine(data, engines, &mut report);
    check_strict(data, &mut report);

    report.warnings.extend(extra_warnings.iter().cloned());
    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        strict = report.strict.len(),
        "validation finished"
    );
    report
}

/// [`check`] followed by [`ValidationReport::into_result`]
pub fn validate(data: &WorkflowData, engines: &EngineRegistry, extra_warnings: &[String]) -> Result<Vec<String>> {
    check(data, engines, extra_warnings).into_result(data.strict)
}

// ============================================================================
// LAYER 1: RANGES
// ============================================================================

fn check_retention(field: &str, days: Option<i64>, report: &mut ValidationReport) {
    let Some(days) = days else { return };
    if days < MIN_RETENTION_DAYS as i64 || days > MAX_RETENTION_DAYS as i64 {
        report.error(format!(
            "{} must be between {} and {} (got {})",
            field, MIN_RETENTION_DAYS, MAX_RETENTION_DAYS, days
        ));
    }
}

fn check_mount(mount: &str, report: &mut ValidationReport) {
    let parts: Vec<&str> = mount.split(':').collect();
    let valid = match parts.as_slice() {
        [source, dest, mode] => {
            !source.is_empty() && dest.starts_with('/') && matches!(*mode, "ro" | "rw")
        }
        _ => false,
    };
    if !valid {
        report.error(format!(
            "invalid mount '{}': expected 'source:/absolute/dest:ro' or 'source:/absolute/dest:rw'",
            mount
        ));
    }
}

fn check_ranges(data: &WorkflowData, report: &mut ValidationReport) {
    if let Some(port) = data.sandbox.mcp_port {
        if !(1..=65535).contains(&port) {
            report.error(format!("sandbox.mcp.port must be between 1 and 65535 (got {})", port));
        }
    }
    for mount in &data.sandbox.mounts {
        check_mount(mount, report);
    }

    if let Some(cache) = data.tools.cache_memory() {
        check_retention("tools.cache-memory.retention-days", cache.retention_days, report);
    }
    if let Some(repo) = data.tools.repo_memory() {
        check_retention("tools.repo-memory.retention-days", repo.retention_days, report);
        if let Some(size) = repo.max_file_size {
            if size <= 0 || size as u64 > MAX_REPO_MEMORY_FILE_SIZE {
                report.error(format!(
                    "tools.repo-memory.max-file-size must be between 1 and {} bytes (got {})",
                    MAX_REPO_MEMORY_FILE_SIZE, size
                ));
            }
        }
    }

    if let Some(minutes) = data.timeout_minutes {
        if minutes < 1 {
            report.error(format!("timeout-minutes must be at least 1 (got {})", minutes));
        }
    }
    if let Some(id) = &data.tracker_id {
        if !TRACKER_ID_RE.is_match(id) {
            report.error(format!(
                "tracker-id '{}' must be at least 8 characters of letters, digits, '-' or '_'",
                id
            ));
        }
    }
}

// ============================================================================
// LAYER 2: TOOLS
// ============================================================================

fn check_guard_pattern(pattern: &str, report: &mut ValidationReport) {
    if pattern != pattern.to_lowercase() {
        report.error(format!("repository pattern '{}' must be lowercase", pattern));
        return;
    }
    if let Some(star) = pattern.find('*') {
        if star != pattern.len() - 1 {
            report.error(format!(
                "repository pattern '{}' may only use '*' at the end",
                pattern
            ));
            return;
        }
    }
    if !GUARD_PATTERN_RE.is_match(pattern) || pattern.ends_with('/') {
        report.error(format!(
            "repository pattern '{}' must be 'owner/repo', 'owner/*' or 'owner/prefix*'",
            pattern
        ));
    }
}

fn check_guard_policy(github: &GitHubTool, report: &mut ValidationReport) {
    match &github.repos {
        None | Some(GuardRepos::All) | Some(GuardRepos::Public) => {}
        Some(GuardRepos::Patterns(patterns)) if patterns.is_empty() => {
            report.error("tools.github.repos must not be an empty list");
        }
        Some(GuardRepos::Patterns(patterns)) => {
            for pattern in patterns {
                check_guard_pattern(pattern, report);
            }
        }
        Some(GuardRepos::Invalid(value)) => report.error(format!(
            "tools.github.repos must be 'all', 'public' or a list of repository patterns (got '{}')",
            value
        )),
    }

    if let Some(level) = &github.min_integrity {
        if !MIN_INTEGRITY_LEVELS.contains(&level.as_str()) {
            report.error(format!(
                "tools.github.min-integrity must be one of {} (got '{}')",
                MIN_INTEGRITY_LEVELS.join(", "),
                level
            ));
        }
    }
    match (github.repos.is_some(), github.min_integrity.is_some()) {
        (true, false) => report.error("tools.github.repos requires tools.github.min-integrity"),
        (false, true) => report.error("tools.github.min-integrity requires tools.github.repos"),
        _ => {}
    }
}

fn check_credentials(section: &str, app: Option<&AppConfig>, token: Option<&str>, report: &mut ValidationReport) {
    if app.is_some() && token.is_some() {
        report.error(format!(
            "{}: 'app' and 'github-token' cannot both be set",
            section
        ));
    }
}

fn check_tools(data: &WorkflowData, report: &mut ValidationReport) {
    if let Some(github) = data.tools.github() {
        check_guard_policy(&github, report);
        check_credentials(
            "tools.github",
            github.app.as_ref(),
            github.github_token.as_deref(),
            report,
        );
    }
    if data.tools.bash() == BashTool::Empty {
        report.error(
            "tools.bash with no value is no longer supported: use 'bash: true' for all commands or list them, e.g. 'bash: [\"echo\", \"ls\"]'",
        );
    }
}

// ============================================================================
// LAYER 3: SAFE OUTPUTS
// ============================================================================

fn check_safe_outputs(data: &WorkflowData, report: &mut ValidationReport) {
    let config = &data.safe_outputs;
    check_credentials(
        "safe-outputs",
        config.app.as_ref(),
        config.github_token.as_deref(),
        report,
    );

    for (kind, output) in &config.outputs {
        let spec = kind.spec();
        if let Some(target) = output.base.target_repo.as_deref() {
            if target == "*" && !spec.wildcard_target {
                report.error(format!(
                    "safe-outputs.{}: target-repo '*' is not supported for this type",
                    spec.key
                ));
            } else if target != "*" && !is_expression(target) && !OWNER_REPO_RE.is_match(target) {
                report.error(format!(
                    "safe-outputs.{}: target-repo '{}' must be 'owner/repo'",
                    spec.key, target
                ));
            }
        }
        for repo in &output.base.allowed_repos {
            if !is_expression(repo) && !OWNER_REPO_RE.is_match(repo) {
                report.error(format!(
                    "safe-outputs.{}: allowed-repos entry '{}' must be 'owner/repo'",
                    spec.key, repo
                ));
            }
        }
    }
}

// ============================================================================
// LAYER 4: CHECKOUTS AND IMPORTS
// ============================================================================

fn check_checkouts_and_imports(data: &WorkflowData, report: &mut ValidationReport) {
    let current = current_keys(&data.checkouts);
    if current.len() > 1 {
        let names: Vec<String> = current
            .iter()
            .map(|(repo, path)| match (repo.is_empty(), path.is_empty()) {
                (true, true) => ".".to_string(),
                (false, true) => repo.clone(),
                (true, false) => path.clone(),
                (false, false) => format!("{} at {}", repo, path),
            })
            .collect();
        report.error(format!(
            "only one checkout may set current: true (found {})",
            names.join(", ")
        ));
    }
    for checkout in &data.checkouts {
        if let Some(depth) = checkout.fetch_depth {
            if depth < 0 {
                report.error(format!("checkout fetch-depth must not be negative (got {})", depth));
            }
        }
    }

    let agents: Vec<&str> = data
        .imports
        .iter()
        .filter(|f| f.is_agent_file())
        .map(|f| f.display.as_str())
        .collect();
    if agents.len() > 1 {
        report.error(format!(
            "at most one agent file may be imported (found {})",
            agents.join(", ")
        ));
    }

    for (import, permissions) in &data.imported_permissions {
        for (scope, level) in permissions.iter() {
            if !data.permissions.allows(scope, level) {
                report.warn(format!(
                    "import '{}' expects permission '{}: {}' which the workflow does not grant",
                    import, scope, level
                ));
            }
        }
    }
}

// ============================================================================
// LAYER 5: ENGINE CAPABILITIES
// ============================================================================

fn check_engine(data: &WorkflowData, engines: &EngineRegistry, report: &mut ValidationReport) {
    let engine = engines.get(data.engine.kind);
    let caps = engine.capabilities();
    let name = data.engine.kind.as_str();

    if data.engine.max_turns.is_some() && !caps.max_turns {
        report.warn(format!("engine '{}' does not support max-turns; it will be ignored", name));
    }
    if data.agent_name().is_some() && !caps.custom_agents {
        report.warn(format!(
            "engine '{}' does not support custom agent files; the agent import is only used as prompt",
            name
        ));
    }
    if matches!(data.network.firewall, FirewallSetting::Enabled { .. }) && !caps.firewall {
        report.warn(format!("engine '{}' cannot run behind the firewall", name));
    }
}

// ============================================================================
// LAYER 6: STRICT MODE
// ============================================================================

fn check_strict(data: &WorkflowData, report: &mut ValidationReport) {
    for scope in data.permissions.write_scopes() {
        if scope == Scope::IdToken {
            continue;
        }
        report.strict.push(format!(
            "permission '{}: write' is not allowed in strict mode; use safe-outputs for writes",
            scope
        ));
    }
    if data.network.allowed.iter().any(|d| d == "*") {
        report
            .strict
            .push("network.allowed must not contain '*' in strict mode".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileContext;
    use crate::frontmatter;
    use crate::imports::ResolvedImports;
    use std::path::Path;

    fn data(text: &str) -> WorkflowData {
        let path = "/repo/.github/workflows/w.md";
        let parsed = frontmatter::parse(text, path).unwrap();
        WorkflowData::build(
            Path::new(path),
            &parsed,
            ResolvedImports::default(),
            &CompileContext::for_tests(),
        )
        .unwrap()
    }

    fn report(text: &str) -> ValidationReport {
        check(&data(text), &EngineRegistry::new(), &[])
    }

    #[test]
    fn minimal_workflow_is_clean() {
        assert!(report("---\non: push\n---\nx").is_clean());
    }

    #[test]
    fn guard_pattern_must_be_lowercase() {
        let r = report("---\ntools:\n  github:\n    repos: [\"Owner/Repo\"]\n    min-integrity: reader\n---\nx");
        assert_eq!(r.errors, vec!["repository pattern 'Owner/Repo' must be lowercase"]);
    }

    #[test]
    fn guard_pattern_shapes() {
        let ok = report("---\ntools:\n  github:\n    repos: [\"octo/*\", \"octo/app-*\", \"octo/repo\"]\n    min-integrity: merged\n---\nx");
        assert!(ok.errors.is_empty(), "{:?}", ok.errors);

        let bad = report("---\ntools:\n  github:\n    repos: [\"octo/*-x\", \"octo\"]\n    min-integrity: writer\n---\nx");
        assert_eq!(bad.errors.len(), 2);
        assert!(bad.errors[0].contains("only use '*' at the end"));
    }

    #[test]
    fn guard_policy_fields_come_in_pairs() {
        let r = report("---\ntools:\n  github:\n    repos: all\n---\nx");
        assert_eq!(r.errors, vec!["tools.github.repos requires tools.github.min-integrity"]);
        let r = report("---\ntools:\n  github:\n    repos: public\n    min-integrity: owner\n---\nx");
        assert!(r.errors[0].starts_with("tools.github.min-integrity must be one of"));
    }

    #[test]
    fn anonymous_bash_gets_migration_hint() {
        let r = report("---\ntools:\n  bash:\n---\nx");
        assert!(r.errors[0].contains("bash: true"));
    }

    #[test]
    fn app_and_token_are_exclusive() {
        let r = report(
            "---\nsafe-outputs:\n  github-token: ${{ secrets.T }}\n  app:\n    app-id: ${{ vars.APP }}\n    private-key: ${{ secrets.KEY }}\n  create-issue:\n---\nx",
        );
        assert_eq!(r.errors, vec!["safe-outputs: 'app' and 'github-token' cannot both be set"]);
    }

    #[test]
    fn ranges_are_enforced() {
        let r = report(
            "---\nsandbox:\n  mcp:\n    port: 70000\n  mounts: [\"/src:relative:ro\"]\ntools:\n  cache-memory:\n    retention-days: 91\n  repo-memory:\n    max-file-size: 104857601\ntimeout-minutes: 0\ntracker-id: short\n---\nx",
        );
        assert_eq!(r.errors.len(), 6, "{:?}", r.errors);
        assert!(r.errors[0].contains("70000"));
    }

    #[test]
    fn wildcard_target_repo_follows_type_table() {
        let r = report("---\nsafe-outputs:\n  create-pull-request:\n    target-repo: \"*\"\n---\nx");
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].contains("create-pull-request"));
    }

    #[test]
    fn multiple_current_checkouts_are_rejected() {
        let r = report("---\ncheckout:\n  - repository: a/b\n    path: b\n    current: true\n  - repository: c/d\n    path: d\n    current: true\n---\nx");
        assert!(r.errors[0].starts_with("only one checkout may set current: true"));
    }

    #[test]
    fn strict_mode_escalates_warnings_and_writes() {
        let d = data("---\nstrict: true\npermissions:\n  issues: write\nfeatures:\n  shiny: true\n---\nx");
        let err = validate(&d, &EngineRegistry::new(), &[]).unwrap_err();
        assert_eq!(err.code(), "AW-031");
        let messages = err.messages();
        assert!(messages[0].contains("issues: write"));
        assert!(messages.iter().any(|m| m == "Using experimental feature: shiny"));
    }

    #[test]
    fn warnings_pass_outside_strict_mode() {
        let d = data("---\nfeatures:\n  shiny: true\nengine:\n  id: codex\n  max-turns: 5\n---\nx");
        let warnings = validate(&d, &EngineRegistry::new(), &["extra".to_string()]).unwrap();
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings.last().map(String::as_str), Some("extra"));
    }
}
