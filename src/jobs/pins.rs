//! Action pinning
//!
//! Every `uses:` reference the compiler emits is rewritten to a full commit
//! SHA with the version kept as a trailing comment:
//!
//! ```text
//! actions/checkout@v5  →  actions/checkout@08c6903cd8c0fde910a37f88322edcfb5dd907a8 # v5
//! ```
//!
//! The embedded table covers the compiler's own actions; `pins` in the
//! config file extends or overrides it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{AwError, Result};

pub const CHECKOUT: &str = "actions/checkout@v5";
pub const GITHUB_SCRIPT: &str = "actions/github-script@v8";
pub const UPLOAD_ARTIFACT: &str = "actions/upload-artifact@v5";
pub const DOWNLOAD_ARTIFACT: &str = "actions/download-artifact@v6";
pub const SETUP_NODE: &str = "actions/setup-node@v6";
pub const CACHE_RESTORE: &str = "actions/cache/restore@v4";
pub const CACHE_SAVE: &str = "actions/cache/save@v4";
pub const CREATE_APP_TOKEN: &str = "actions/create-github-app-token@v2";

/// `action@version` → commit SHA
const EMBEDDED_PINS: &[(&str, &str)] = &[
    (CHECKOUT, "08c6903cd8c0fde910a37f88322edcfb5dd907a8"),
    (GITHUB_SCRIPT, "ed597411d8f924073f98dfc5c65a23a2325f34cd"),
    (UPLOAD_ARTIFACT, "330a01c490aca151604b8cf639adc76d48f6c5d4"),
    (DOWNLOAD_ARTIFACT, "018cc2cf5baa6db3ef3c5f8a56943fffe632ef53"),
    (SETUP_NODE, "2028fbc5c25fe9cf00d9f06a71cc4710d4507903"),
    (CACHE_RESTORE, "0057852bfaa89a56745cba8c7296529d2fc39830"),
    (CACHE_SAVE, "0057852bfaa89a56745cba8c7296529d2fc39830"),
    (CREATE_APP_TOKEN, "67018539274d69449ef7c02e8e71183d1719ab42"),
];

static SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// Repository hosting the compiler's own actions (pinned by release tag)
const SELF_ACTIONS_PREFIX: &str = "github/gh-aw/";

/// Resolves `owner/repo@version` to `owner/repo@sha # version`
#[derive(Debug, Clone)]
pub struct ActionPinResolver {
    pins: BTreeMap<String, String>,
}

impl Default for ActionPinResolver {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl ActionPinResolver {
    /// Embedded table plus `extra` (extra wins)
    pub fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut pins: BTreeMap<String, String> = EMBEDDED_PINS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in extra {
            pins.insert(k.clone(), v.clone());
        }
        Self { pins }
    }

    fn passthrough(uses: &str) -> bool {
        if uses.starts_with("./") || uses.starts_with("docker://") || uses.starts_with(SELF_ACTIONS_PREFIX) {
            return true;
        }
        match uses.split_once('@') {
            Some((_, reference)) => SHA_RE.is_match(reference.split_whitespace().next().unwrap_or("")),
            None => false,
        }
    }

    fn pinned(&self, uses: &str) -> Option<String> {
        let sha = self.pins.get(uses)?;
        let (action, version) = uses.split_once('@')?;
        Some(format!("{}@{} # {}", action, sha, version))
    }

    /// Pin an action the compiler emits; unknown actions are an error
    pub fn resolve(&self, uses: &str) -> Result<String> {
        if Self::passthrough(uses) {
            return Ok(uses.to_string());
        }
        self.pinned(uses).ok_or_else(|| AwError::UnknownAction {
            action: uses.to_string(),
        })
    }

    /// Pin a user-provided reference when the table knows it
    pub fn resolve_lenient(&self, uses: &str) -> String {
        if Self::passthrough(uses) {
            return uses.to_string();
        }
        match self.pinned(uses) {
            Some(p) => p,
            None => {
                debug!(action = uses, "no pin for user action, leaving as-is");
                uses.to_string()
            }
        }
    }
}
