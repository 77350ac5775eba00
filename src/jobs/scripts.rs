//! Runtime script registry
//!
//! The emitted workflow runs `.cjs` / `.sh` assets that the setup action
//! copies to [`ACTIONS_DIR`]. The compiler only references them by name; the
//! registry knows which names exist and records which ones a compile used.
//!
//! The registry is owned by the compile context and shared through `Arc`, so
//! independent compilers never see each other's state.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{AwError, Result};
use crate::util::constants::ACTIONS_DIR;

/// Scripts shipped with the setup action
const BUILTIN_SCRIPTS: &[&str] = &[
    "setup_globals.cjs",
    "generate_aw_info.cjs",
    "validate_multi_secret.sh",
    "create_gh_aw_tmp_dir.sh",
    "interpolate_prompt.cjs",
    "collect_ndjson_output.cjs",
    "safe_output_handler_manager.cjs",
    "noop.cjs",
    "report_missing.cjs",
    "handle_agent_failure.cjs",
    "start_mcp_gateway.sh",
    "clone_repo_memory_branch.sh",
];

#[derive(Debug, Default)]
struct Inner {
    known: FxHashSet<String>,
    used: FxHashMap<String, usize>,
}

/// Shared registry of runtime scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ScriptRegistry {
    /// Registry preloaded with the built-in scripts
    pub fn with_builtins() -> Self {
        let registry = Self::default();
        {
            let mut inner = registry.inner.write();
            inner.known.extend(BUILTIN_SCRIPTS.iter().map(|s| s.to_string()));
        }
        registry
    }

    pub fn register(&self, name: impl Into<String>) {
        self.inner.write().known.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().known.contains(name)
    }

    /// Absolute runtime path of a script, marking it used
    pub fn path(&self, name: &str) -> Result<String> {
        let mut inner = self.inner.write();
        if !inner.known.contains(name) {
            return Err(AwError::UnknownScript {
                name: name.to_string(),
            });
        }
        *inner.used.entry(name.to_string()).or_insert(0) += 1;
        Ok(format!("{}/{}", ACTIONS_DIR, name))
    }

    /// `actions/github-script` body that runs a `.cjs` module's `main()`
    pub fn github_script(&self, name: &str) -> Result<String> {
        let globals = self.path("setup_globals.cjs")?;
        let module = self.path(name)?;
        Ok(format!(
            "const {{ setupGlobals }} = require('{}');\nsetupGlobals(core, github, context, exec, io);\nconst {{ main }} = require('{}');\nawait main();",
            globals, module
        ))
    }

    /// `bash <path> <args…>` command line for a shell asset
    pub fn shell(&self, name: &str, args: &[&str]) -> Result<String> {
        let mut cmd = format!("bash {}", self.path(name)?);
        for arg in args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        Ok(cmd)
    }

    /// Scripts referenced so far, sorted
    pub fn used(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().used.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn use_count(&self, name: &str) -> usize {
        self.inner.read().used.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_script_requires_module() {
        let r = ScriptRegistry::with_builtins();
        let body = r.github_script("noop.cjs").unwrap();
        assert!(body.contains("require('/opt/gh-aw/actions/noop.cjs')"));
        assert!(body.ends_with("await main();"));
        assert_eq!(r.used(), vec!["noop.cjs".to_string(), "setup_globals.cjs".to_string()]);
    }

    #[test]
    fn unknown_script_is_internal_error() {
        let err = ScriptRegistry::with_builtins().path("nope.cjs").unwrap_err();
        assert_eq!(err.code(), "AW-050");
    }

    #[test]
    fn clones_share_state() {
        let r = ScriptRegistry::with_builtins();
        let other = r.clone();
        other.register("custom.cjs");
        assert!(r.contains("custom.cjs"));
        r.path("custom.cjs").unwrap();
        assert_eq!(other.use_count("custom.cjs"), 1);
    }

    #[test]
    fn separate_registries_are_isolated() {
        let a = ScriptRegistry::with_builtins();
        let b = ScriptRegistry::with_builtins();
        a.register("only-a.cjs");
        assert!(!b.contains("only-a.cjs"));
    }

    #[test]
    fn shell_command_appends_args() {
        let r = ScriptRegistry::with_builtins();
        assert_eq!(
            r.shell("validate_multi_secret.sh", &["COPILOT_GITHUB_TOKEN"]).unwrap(),
            "bash /opt/gh-aw/actions/validate_multi_secret.sh COPILOT_GITHUB_TOKEN"
        );
    }
}
