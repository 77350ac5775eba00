//! Checkout Module - collect, merge and emit `actions/checkout` steps
//!
//! Requests come from the `checkout:` front-matter key (a mapping, a list of
//! mappings, or `false`). Two requests with the same `(repository, path)`
//! describe one logical checkout and are merged:
//!
//! - `fetch-depth`: the deeper value wins (`0` = full history beats any
//!   positive depth, larger beats smaller, anything beats unset)
//! - `ref`, `github-token`, `submodules`: first seen wins
//! - `lfs`, `current`: logical OR
//! - `sparse-checkout`: patterns unioned in first-seen order
//!
//! The default checkout (empty repository, empty path) always emits
//! `persist-credentials: false`; in trial mode it is replaced wholesale by
//! the trial repository.

use serde_yaml::Value;
use tracing::debug;

use crate::ast::fields::{scalar_string, Fields};
use crate::config::TrialConfig;
use crate::error::{AwError, Result};
use crate::jobs::{pins, Step};

/// One checkout request (normalized after [`merge_checkouts`])
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckoutConfig {
    pub repository: Option<String>,
    pub git_ref: Option<String>,
    pub path: Option<String>,
    pub github_token: Option<String>,
    pub fetch_depth: Option<i64>,
    pub sparse_checkout: Option<String>,
    pub submodules: Option<String>,
    pub lfs: bool,
    pub current: bool,
}

impl CheckoutConfig {
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let mut f = Fields::from_value(value, path)?;
        let submodules = match f.take("submodules") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let s = scalar_string(&v).ok_or_else(|| {
                    AwError::schema(format!("{}.submodules", path), "expected 'recursive', true or false")
                })?;
                if !matches!(s.as_str(), "recursive" | "true" | "false") {
                    return Err(AwError::schema(
                        format!("{}.submodules", path),
                        format!("unknown value '{}' (expected 'recursive', true or false)", s),
                    ));
                }
                Some(s)
            }
        };
        let config = Self {
            repository: f.string("repository")?,
            git_ref: f.string("ref")?,
            path: f.string("path")?,
            github_token: f.string("github-token")?,
            fetch_depth: f.int("fetch-depth")?,
            sparse_checkout: f.string("sparse-checkout")?,
            submodules,
            lfs: f.bool_or("lfs", false)?,
            current: f.bool_or("current", false)?,
        };
        if let Some(unknown) = f.remaining_keys().first() {
            return Err(AwError::schema(
                format!("{}.{}", path, unknown),
                "unknown checkout option",
            ));
        }
        Ok(config)
    }

    /// Identity key: (repository, normalized path)
    pub fn key(&self) -> (String, String) {
        (
            self.repository.clone().unwrap_or_default().trim().to_string(),
            normalize_path(self.path.as_deref().unwrap_or("")),
        )
    }

    pub fn is_default(&self) -> bool {
        let (repo, path) = self.key();
        repo.is_empty() && path.is_empty()
    }

    fn normalized(&self) -> Self {
        let (repo, path) = self.key();
        Self {
            repository: Some(repo).filter(|r| !r.is_empty()),
            path: Some(path).filter(|p| !p.is_empty()),
            sparse_checkout: merge_sparse(None, self.sparse_checkout.as_deref()),
            ..self.clone()
        }
    }

    fn absorb(&mut self, other: &CheckoutConfig) {
        self.fetch_depth = deeper_fetch_depth(self.fetch_depth, other.fetch_depth);
        if self.git_ref.is_none() {
            self.git_ref = other.git_ref.clone();
        }
        if self.github_token.is_none() {
            self.github_token = other.github_token.clone();
        }
        if self.submodules.is_none() {
            self.submodules = other.submodules.clone();
        }
        self.lfs |= other.lfs;
        self.current |= other.current;
        self.sparse_checkout =
            merge_sparse(self.sparse_checkout.as_deref(), other.sparse_checkout.as_deref());
    }
}

/// Parse the `checkout:` value. Returns the requests and whether the
/// default checkout is disabled (`checkout: false`).
pub fn parse_checkouts(value: Option<&Value>) -> Result<(Vec<CheckoutConfig>, bool)> {
    match value {
        None | Some(Value::Null) => Ok((Vec::new(), false)),
        Some(Value::Bool(false)) => Ok((Vec::new(), true)),
        Some(v @ Value::Mapping(_)) => Ok((vec![CheckoutConfig::from_value(v, "checkout")?], false)),
        Some(Value::Sequence(items)) => {
            let configs = items
                .iter()
                .enumerate()
                .map(|(i, item)| CheckoutConfig::from_value(item, &format!("checkout[{}]", i)))
                .collect::<Result<Vec<_>>>()?;
            Ok((configs, false))
        }
        Some(_) => Err(AwError::schema(
            "checkout",
            "expected a mapping, a list of mappings or false",
        )),
    }
}

/// `"."` → `""`, strip leading `./` and trailing `/`
pub fn normalize_path(path: &str) -> String {
    let mut p = path.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    let p = p.trim_end_matches('/');
    if p == "." {
        String::new()
    } else {
        p.to_string()
    }
}

/// Deeper of two fetch depths: `0 > n > m > unset` for `n > m > 0`
pub fn deeper_fetch_depth(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(0), _) | (_, Some(0)) => Some(0),
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Union of newline-separated sparse patterns, first-seen order
fn merge_sparse(a: Option<&str>, b: Option<&str>) -> Option<String> {
    let mut patterns: Vec<&str> = Vec::new();
    for line in a.into_iter().chain(b).flat_map(str::lines) {
        let line = line.trim();
        if !line.is_empty() && !patterns.contains(&line) {
            patterns.push(line);
        }
    }
    if patterns.is_empty() {
        None
    } else {
        Some(patterns.join("\n"))
    }
}

/// Merge requests by identity key, preserving first-seen key order
pub fn merge_checkouts(requests: &[CheckoutConfig]) -> Vec<CheckoutConfig> {
    let mut merged: Vec<CheckoutConfig> = Vec::new();
    for request in requests {
        let normalized = request.normalized();
        let key = normalized.key();
        match merged.iter_mut().find(|m| m.key() == key) {
            Some(existing) => existing.absorb(&normalized),
            None => merged.push(normalized),
        }
    }
    merged
}

/// Distinct `(repository, path)` keys marked `current: true`
pub fn current_keys(requests: &[CheckoutConfig]) -> Vec<(String, String)> {
    let mut keys: Vec<(String, String)> = Vec::new();
    for request in requests.iter().filter(|r| r.current) {
        let key = request.key();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Owns the merged checkouts of one compile
#[derive(Debug, Clone, Default)]
pub struct CheckoutManager {
    merged: Vec<CheckoutConfig>,
    default_disabled: bool,
    trial: Option<TrialConfig>,
}

impl CheckoutManager {
    pub fn new(requests: &[CheckoutConfig], default_disabled: bool, trial: Option<TrialConfig>) -> Self {
        let merged = merge_checkouts(requests);
        debug!(requests = requests.len(), merged = merged.len(), "checkouts merged");
        Self {
            merged,
            default_disabled,
            trial,
        }
    }

    /// The default checkout, if one is emitted
    pub fn default_checkout(&self) -> Option<CheckoutConfig> {
        if let Some(trial) = &self.trial {
            return Some(CheckoutConfig {
                repository: Some(trial.repository.clone()),
                github_token: Some(trial.token_expr().to_string()),
                ..Default::default()
            });
        }
        if self.default_disabled {
            return None;
        }
        Some(
            self.merged
                .iter()
                .find(|c| c.is_default())
                .cloned()
                .unwrap_or_default(),
        )
    }

    pub fn additional_checkouts(&self) -> impl Iterator<Item = &CheckoutConfig> {
        self.merged.iter().filter(|c| !c.is_default())
    }

    /// The checkout marked `current: true`
    pub fn current(&self) -> Option<&CheckoutConfig> {
        self.merged.iter().find(|c| c.current)
    }

    /// `owner/repo` of the current checkout, when it names one
    pub fn current_repository(&self) -> Option<&str> {
        self.current().and_then(|c| c.repository.as_deref())
    }

    /// Workspace-relative path of the current checkout
    pub fn current_path(&self) -> Option<String> {
        self.current().map(|c| c.path.clone().unwrap_or_default())
    }

    /// Whether the agent job has the workflow repository checked out
    pub fn has_default_checkout(&self) -> bool {
        self.default_checkout().is_some()
    }

    /// Checkout steps: the default first, then additional checkouts
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        if let Some(default) = self.default_checkout() {
            steps.push(checkout_step("Checkout repository", &default));
        }
        for extra in self.additional_checkouts() {
            let label = match (&extra.repository, &extra.path) {
                (Some(repo), Some(path)) => format!("Checkout {} into {}", repo, path),
                (Some(repo), None) => format!("Checkout {}", repo),
                (None, Some(path)) => format!("Checkout repository into {}", path),
                (None, None) => "Checkout repository".to_string(),
            };
            steps.push(checkout_step(&label, extra));
        }
        steps
    }
}

fn checkout_step(name: &str, c: &CheckoutConfig) -> Step {
    let mut step = Step::named(name).uses(pins::CHECKOUT);
    if let Some(repo) = &c.repository {
        step = step.with("repository", repo.as_str());
    }
    if let Some(path) = &c.path {
        step = step.with("path", path.as_str());
    }
    if let Some(r) = &c.git_ref {
        step = step.with("ref", r.as_str());
    }
    if let Some(token) = &c.github_token {
        step = step.with("token", token.as_str());
    }
    if let Some(depth) = c.fetch_depth {
        step = step.with("fetch-depth", depth);
    }
    if let Some(sparse) = &c.sparse_checkout {
        step = step.with("sparse-checkout", sparse.as_str());
    }
    if let Some(sub) = &c.submodules {
        step = step.with("submodules", sub.as_str());
    }
    if c.lfs {
        step = step.with("lfs", true);
    }
    step.with("persist-credentials", false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(yaml: &str) -> CheckoutConfig {
        let v: Value = serde_yaml::from_str(yaml).unwrap();
        CheckoutConfig::from_value(&v, "checkout").unwrap()
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("./"), "");
        assert_eq!(normalize_path("./libs/"), "libs");
        assert_eq!(normalize_path("a/b"), "a/b");
    }

    #[test]
    fn dot_and_empty_path_merge_to_full_history() {
        let merged = merge_checkouts(&[req("path: ."), req("path: ''\nfetch-depth: 0")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fetch_depth, Some(0));
        assert!(merged[0].is_default());
    }

    #[test]
    fn fetch_depth_ordering() {
        assert_eq!(deeper_fetch_depth(Some(1), Some(0)), Some(0));
        assert_eq!(deeper_fetch_depth(Some(5), Some(3)), Some(5));
        assert_eq!(deeper_fetch_depth(None, Some(3)), Some(3));
        assert_eq!(deeper_fetch_depth(None, None), None);
    }

    #[test]
    fn first_seen_settings_and_or_flags() {
        let merged = merge_checkouts(&[
            req("repository: o/r\npath: libs\nref: main\nsparse-checkout: |\n  src\n  docs"),
            req("repository: o/r\npath: ./libs/\nref: dev\nlfs: true\nsparse-checkout: \"docs\\n\\ntests\""),
        ]);
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert_eq!(m.git_ref.as_deref(), Some("main"));
        assert!(m.lfs);
        assert_eq!(m.sparse_checkout.as_deref(), Some("src\ndocs\ntests"));
    }

    #[test]
    fn merge_preserves_first_seen_order() {
        let merged = merge_checkouts(&[
            req("repository: o/b"),
            req("path: ."),
            req("repository: o/a"),
            req("repository: o/b\nfetch-depth: 2"),
        ]);
        let repos: Vec<_> = merged.iter().map(|c| c.repository.clone()).collect();
        assert_eq!(repos, vec![Some("o/b".into()), None, Some("o/a".into())]);
        assert_eq!(merged[0].fetch_depth, Some(2));
    }

    #[test]
    fn default_checkout_always_emitted_unless_disabled() {
        let m = CheckoutManager::new(&[req("repository: o/x\npath: x")], false, None);
        let steps = m.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name.as_deref(), Some("Checkout repository"));
        assert_eq!(
            steps[0].with.get("persist-credentials"),
            Some(&Value::Bool(false))
        );

        let disabled = CheckoutManager::new(&[], true, None);
        assert!(disabled.steps().is_empty());
    }

    #[test]
    fn additional_checkout_field_order() {
        let m = CheckoutManager::new(
            &[req("repository: o/x\npath: x\nref: v1\ngithub-token: t\nfetch-depth: 3\nlfs: true")],
            true,
            None,
        );
        let step = &m.steps()[0];
        let keys: Vec<_> = step.with.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["repository", "path", "ref", "token", "fetch-depth", "lfs", "persist-credentials"]
        );
    }

    #[test]
    fn trial_mode_overrides_default() {
        let trial = TrialConfig {
            repository: "me/trial".into(),
            token: None,
        };
        let m = CheckoutManager::new(&[req("fetch-depth: 0\nref: main")], true, Some(trial));
        let default = m.default_checkout().unwrap();
        assert_eq!(default.repository.as_deref(), Some("me/trial"));
        assert_eq!(default.fetch_depth, None);
        assert_eq!(default.git_ref, None);
    }

    #[test]
    fn current_checkout_is_tracked() {
        let requests = [req("repository: o/target\npath: target\ncurrent: true")];
        let m = CheckoutManager::new(&requests, false, None);
        assert_eq!(m.current_repository(), Some("o/target"));
        assert_eq!(m.current_path().as_deref(), Some("target"));
        assert_eq!(current_keys(&requests).len(), 1);
    }

    #[test]
    fn parse_forms() {
        let v: Value = serde_yaml::from_str("- path: a\n- path: b").unwrap();
        assert_eq!(parse_checkouts(Some(&v)).unwrap().0.len(), 2);
        assert!(parse_checkouts(Some(&Value::Bool(false))).unwrap().1);
        assert!(parse_checkouts(Some(&Value::Bool(true))).is_err());
        let bad: Value = serde_yaml::from_str("submodules: maybe").unwrap();
        assert!(CheckoutConfig::from_value(&bad, "checkout").is_err());
    }

    #[test]
    fn merge_is_idempotent_on_example() {
        let once = merge_checkouts(&[req("path: ./a/\nsparse-checkout: x\n x"), req("path: a")]);
        assert_eq!(merge_checkouts(&once), once);
    }
}
