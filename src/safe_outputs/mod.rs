//! Safe Outputs Module - write operations performed on the agent's behalf
//!
//! The agent job runs read-only; every write it wants (issues, comments,
//! pull requests, …) is recorded as a safe output and executed later by the
//! `safe_outputs` job with the minimal permissions for the configured types.
//!
//! - `registry`: static per-type table (permissions, outputs, defaults)
//! - `handler_config`: JSON consumed by the handler manager script
//! - `missing`: shared `missing-tool` / `missing-data` parameters
//! - `job`: synthesis of the `safe_outputs` job
//!
//! # Example YAML
//!
//! ```yaml
//! safe-outputs:
//!   create-issue:
//!     title-prefix: "[triage] "
//!     labels: [automation]
//!   add-comment:
//!     max: 3
//!   github-token: ${{ secrets.BOT_TOKEN }}
//! ```

mod handler_config;
mod job;
pub mod missing;
pub mod registry;

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::ast::fields::Fields;
use crate::ast::{AppConfig, Templatable};
use crate::error::{AwError, Result};
use crate::permissions::Level;

pub use handler_config::handler_config_json;
pub(crate) use job::agent_output_steps;
pub use job::{build_safe_outputs_job, ci_trigger_token, step_github_token, SafeOutputsJobInput};
pub use registry::{all_specs, kind_by_key, spec_of, OutputSource, OutputSpec, SafeOutputSpec};

/// Closed set of safe-output types. Variant order is the type order used for
/// outputs and the table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafeOutputKind {
    CreateIssue,
    CreateDiscussion,
    UpdateDiscussion,
    CloseDiscussion,
    CloseIssue,
    ClosePullRequest,
    AddComment,
    HideComment,
    CreatePullRequest,
    CreatePullRequestReviewComment,
    SubmitPullRequestReview,
    ReplyToPullRequestReviewComment,
    ResolvePullRequestReviewThread,
    PushToPullRequestBranch,
    MarkPullRequestAsReadyForReview,
    UpdateIssue,
    UpdatePullRequest,
    UpdateRelease,
    UploadAsset,
    AddLabels,
    RemoveLabels,
    AddReviewer,
    AssignMilestone,
    AssignToAgent,
    AssignToUser,
    UnassignFromUser,
    LinkSubIssue,
    CreateCodeScanningAlert,
    AutofixCodeScanningAlert,
    CreateAgentSession,
    DispatchWorkflow,
    UpdateProject,
    CreateProjectStatusUpdate,
    MissingTool,
    MissingData,
    Noop,
}

impl SafeOutputKind {
    pub const COUNT: usize = 36;

    pub fn spec(&self) -> &'static SafeOutputSpec {
        spec_of(*self)
    }

    /// Front-matter key (`create-issue`)
    pub fn key(&self) -> &'static str {
        self.spec().key
    }

    /// Handler / output-type key (`create_issue`)
    pub fn snake_key(&self) -> String {
        self.spec().snake_key()
    }
}

/// Settings shared by every type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeOutputBase {
    pub max: Option<Templatable>,
    pub github_token: Option<String>,
    pub target_repo: Option<String>,
    pub allowed_repos: Vec<String>,
    pub staged: Option<bool>,
    /// `triggering`, `*` or an explicit number
    pub target: Option<String>,
    /// Unrecognized keys, passed to the handler as-is (snake-cased)
    pub extra: Mapping,
}

/// Type-specific settings
#[derive(Debug, Clone, PartialEq)]
pub enum SafeOutputOptions {
    None,
    CreateIssue {
        title_prefix: Option<String>,
        labels: Vec<String>,
        assignees: Vec<String>,
        close_older_issues: Option<Templatable>,
    },
    CreateDiscussion {
        title_prefix: Option<String>,
        category: Option<String>,
        labels: Vec<String>,
        close_older_discussions: Option<Templatable>,
    },
    AddComment {
        discussions: bool,
        hide_older_comments: bool,
    },
    HideComment {
        discussions: bool,
        allowed_reasons: Vec<String>,
    },
    CreatePullRequest {
        title_prefix: Option<String>,
        labels: Vec<String>,
        reviewers: Vec<String>,
        draft: Option<Templatable>,
        fallback_as_issue: bool,
        /// `github-token-for-extra-empty-commit`
        ci_trigger_token: Option<String>,
        if_no_changes: Option<String>,
    },
    PushToPullRequestBranch {
        title_prefix: Option<String>,
        labels: Vec<String>,
        if_no_changes: Option<String>,
    },
    Labels {
        allowed: Vec<String>,
    },
    Reviewers {
        reviewers: Vec<String>,
    },
    Close {
        required_labels: Vec<String>,
        required_title_prefix: Option<String>,
    },
    UploadAsset {
        branch: Option<String>,
        max_size_kb: Option<i64>,
        allowed_exts: Vec<String>,
    },
    DispatchWorkflow {
        workflows: Vec<String>,
    },
    Missing {
        create_issue: bool,
        title_prefix: Option<String>,
        labels: Vec<String>,
    },
    Noop {
        report_as_issue: bool,
    },
}

/// One configured safe output
#[derive(Debug, Clone, PartialEq)]
pub struct SafeOutput {
    pub kind: SafeOutputKind,
    pub base: SafeOutputBase,
    pub options: SafeOutputOptions,
}

impl SafeOutput {
    /// Configured `max`, or the type default
    pub fn effective_max(&self) -> Templatable {
        self.base
            .max
            .clone()
            .unwrap_or_else(|| Templatable::literal(self.kind.spec().default_max.to_string()))
    }

    fn from_value(kind: SafeOutputKind, value: &Value) -> Result<Option<Self>> {
        let path = format!("safe-outputs.{}", kind.key());
        let value = match value {
            Value::Bool(false) => return Ok(None),
            Value::Bool(true) => Value::Null,
            other => other.clone(),
        };
        let mut f = Fields::from_value(&value, &path)?;

        let max = match f.take("max") {
            None | Some(Value::Null) => None,
            Some(v) => Some(Templatable::max(&v, &format!("{}.max", path))?),
        };
        let github_token = f.string("github-token")?;
        let target_repo = f.string("target-repo")?;
        let allowed_repos = f.strings("allowed-repos")?;
        let staged = f.bool("staged")?;
        let target = f.string("target")?;

        let options = parse_options(kind, &mut f)?;

        Ok(Some(Self {
            kind,
            base: SafeOutputBase {
                max,
                github_token,
                target_repo,
                allowed_repos,
                staged,
                target,
                extra: f.into_rest(),
            },
            options,
        }))
    }
}

fn parse_options(kind: SafeOutputKind, f: &mut Fields) -> Result<SafeOutputOptions> {
    use SafeOutputKind as K;
    Ok(match kind {
        K::CreateIssue => SafeOutputOptions::CreateIssue {
            title_prefix: f.string("title-prefix")?,
            labels: f.strings("labels")?,
            assignees: f.strings("assignees")?,
            close_older_issues: f.templatable("close-older-issues")?,
        },
        K::CreateDiscussion => SafeOutputOptions::CreateDiscussion {
            title_prefix: f.string("title-prefix")?,
            category: f.string("category")?,
            labels: f.strings("labels")?,
            close_older_discussions: f.templatable("close-older-discussions")?,
        },
        K::AddComment => SafeOutputOptions::AddComment {
            discussions: f.bool_or("discussions", true)?,
            hide_older_comments: f.bool_or("hide-older-comments", false)?,
        },
        K::HideComment => SafeOutputOptions::HideComment {
            discussions: f.bool_or("discussions", true)?,
            allowed_reasons: f.strings("allowed-reasons")?,
        },
        K::CreatePullRequest => SafeOutputOptions::CreatePullRequest {
            title_prefix: f.string("title-prefix")?,
            labels: f.strings("labels")?,
            reviewers: f.strings("reviewers")?,
            draft: f.templatable("draft")?,
            fallback_as_issue: f.bool_or("fallback-as-issue", true)?,
            ci_trigger_token: match f.take("github-token-for-extra-empty-commit") {
                None => None,
                Some(Value::Null) => Some(String::new()),
                Some(v) => Some(crate::ast::fields::scalar_string(&v).ok_or_else(|| {
                    AwError::schema(
                        f.key_path("github-token-for-extra-empty-commit"),
                        "expected a string",
                    )
                })?),
            },
            if_no_changes: f.string("if-no-changes")?,
        },
        K::PushToPullRequestBranch => SafeOutputOptions::PushToPullRequestBranch {
            title_prefix: f.string("title-prefix")?,
            labels: f.strings("labels")?,
            if_no_changes: f.string("if-no-changes")?,
        },
        K::AddLabels | K::RemoveLabels => SafeOutputOptions::Labels {
            allowed: f.strings("allowed")?,
        },
        K::AddReviewer => SafeOutputOptions::Reviewers {
            reviewers: f.strings("reviewers")?,
        },
        K::CloseIssue | K::ClosePullRequest | K::CloseDiscussion => SafeOutputOptions::Close {
            required_labels: f.strings("required-labels")?,
            required_title_prefix: f.string("required-title-prefix")?,
        },
        K::UploadAsset => SafeOutputOptions::UploadAsset {
            branch: f.string("branch")?,
            max_size_kb: f.int("max-size")?,
            allowed_exts: f.strings("allowed-exts")?,
        },
        K::DispatchWorkflow => SafeOutputOptions::DispatchWorkflow {
            workflows: f.strings("workflows")?,
        },
        K::MissingTool | K::MissingData => SafeOutputOptions::Missing {
            create_issue: f.bool_or("create-issue", true)?,
            title_prefix: f.string("title-prefix")?,
            labels: f.strings("labels")?,
        },
        K::Noop => SafeOutputOptions::Noop {
            report_as_issue: f.bool_or("report-as-issue", false)?,
        },
        _ => SafeOutputOptions::None,
    })
}

/// Global keys under `safe-outputs:` that are not types
const GLOBAL_KEYS: &[&str] = &[
    "github-token",
    "app",
    "staged",
    "env",
    "steps",
    "runs-on",
    "id-token",
    "footer",
    "max-patch-size",
    "threat-detection",
];

/// Typed `safe-outputs:` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeOutputsConfig {
    /// Configured types, in type order
    pub outputs: BTreeMap<SafeOutputKind, SafeOutput>,
    pub github_token: Option<String>,
    pub app: Option<AppConfig>,
    pub staged: bool,
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Value>,
    pub runs_on: Option<Value>,
    /// `id-token: write | none`
    pub id_token: Option<Level>,
    pub footer: Option<Templatable>,
    /// KB limit for patches produced by the agent
    pub max_patch_size: Option<i64>,
}

impl SafeOutputsConfig {
    /// Parse the block; non-fatal notes are appended to `warnings`
    pub fn from_mapping(map: &Mapping, warnings: &mut Vec<String>) -> Result<Self> {
        let mut config = Self::default();
        let mut f = Fields::new(map.clone(), "safe-outputs");

        config.github_token = f.string("github-token")?;
        config.app = match f.take("app") {
            None | Some(Value::Null) => None,
            Some(v) => Some(AppConfig::from_value(&v, "safe-outputs.app")?),
        };
        config.staged = f.bool_or("staged", false)?;
        config.env = f.string_map("env")?;
        config.steps = f.sequence("steps")?;
        config.runs_on = f.take("runs-on").filter(|v| !v.is_null());
        config.id_token = match f.string("id-token")?.as_deref() {
            None => None,
            Some("write") => Some(Level::Write),
            Some("none") => Some(Level::None),
            Some(other) => {
                return Err(AwError::schema(
                    "safe-outputs.id-token",
                    format!("expected 'write' or 'none', got '{}'", other),
                ))
            }
        };
        config.footer = f.templatable("footer")?;
        config.max_patch_size = f.int("max-patch-size")?;
        if f.take("threat-detection").is_some() {
            warn!("safe-outputs.threat-detection is accepted but no detection job is generated");
            warnings.push(
                "safe-outputs.threat-detection is ignored: no threat detection job is generated"
                    .to_string(),
            );
        }

        for key in f.remaining_keys() {
            let kind = kind_by_key(&key).ok_or_else(|| {
                AwError::schema(
                    format!("safe-outputs.{}", key),
                    format!("unknown safe-output type '{}'", key),
                )
            })?;
            let value = f.take(&key).unwrap_or(Value::Null);
            if let Some(output) = SafeOutput::from_value(kind, &value)? {
                config.outputs.insert(kind, output);
            }
        }

        Ok(config)
    }

    /// Add imported types and globals not declared locally
    pub fn merge_imported(&mut self, imported: &Mapping, warnings: &mut Vec<String>) -> Result<()> {
        let other = Self::from_mapping(imported, warnings)?;
        for (kind, output) in other.outputs {
            self.outputs.entry(kind).or_insert(output);
        }
        if self.github_token.is_none() {
            self.github_token = other.github_token;
        }
        if self.app.is_none() {
            self.app = other.app;
        }
        for (k, v) in other.env {
            self.env.entry(k).or_insert(v);
        }
        self.steps.extend(other.steps);
        if self.runs_on.is_none() {
            self.runs_on = other.runs_on;
        }
        if self.id_token.is_none() {
            self.id_token = other.id_token;
        }
        if self.footer.is_none() {
            self.footer = other.footer;
        }
        if self.max_patch_size.is_none() {
            self.max_patch_size = other.max_patch_size;
        }
        // Staging from any source stages the whole run
        self.staged |= other.staged;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, kind: SafeOutputKind) -> Option<&SafeOutput> {
        self.outputs.get(&kind)
    }

    pub fn has(&self, kind: SafeOutputKind) -> bool {
        self.outputs.contains_key(&kind)
    }

    /// Configured kinds in type order
    pub fn kinds(&self) -> impl Iterator<Item = SafeOutputKind> + '_ {
        self.outputs.keys().copied()
    }

    /// Named outputs of every configured type, type order, deduplicated
    pub fn named_outputs(&self) -> Vec<OutputSpec> {
        let mut out: Vec<OutputSpec> = Vec::new();
        for kind in self.kinds() {
            for o in kind.spec().outputs {
                if !out.iter().any(|x| x.name == o.name) {
                    out.push(*o);
                }
            }
        }
        out
    }

    /// Named outputs exposed by `job`
    pub fn outputs_of_job(&self, job: &str) -> Vec<OutputSpec> {
        self.named_outputs()
            .into_iter()
            .filter(|o| o.job() == job)
            .collect()
    }

    /// True when every configured type is project-scoped
    pub fn only_project_types(&self) -> bool {
        !self.outputs.is_empty() && self.kinds().all(|k| k.spec().project_scoped)
    }

    pub fn needs_checkout(&self) -> bool {
        self.kinds().any(|k| k.spec().needs_checkout)
    }

    /// Whether safe outputs run in staged (preview) mode
    pub fn is_staged(&self) -> bool {
        self.staged
    }

    pub fn is_known_global_key(key: &str) -> bool {
        GLOBAL_KEYS.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<SafeOutputsConfig> {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        SafeOutputsConfig::from_mapping(&m, &mut Vec::new())
    }

    #[test]
    fn kind_count_matches_enum() {
        assert_eq!(SafeOutputKind::Noop as usize + 1, SafeOutputKind::COUNT);
    }

    #[test]
    fn parses_types_and_globals() {
        let c = parse(
            "create-issue:\n  title-prefix: '[ai] '\n  labels: [bot]\nadd-comment:\n  max: 3\nstaged: true\ngithub-token: ${{ secrets.T }}",
        )
        .unwrap();
        assert_eq!(c.outputs.len(), 2);
        assert!(c.staged);
        let issue = c.get(SafeOutputKind::CreateIssue).unwrap();
        match &issue.options {
            SafeOutputOptions::CreateIssue { title_prefix, labels, .. } => {
                assert_eq!(title_prefix.as_deref(), Some("[ai] "));
                assert_eq!(labels, &vec!["bot".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.get(SafeOutputKind::AddComment).unwrap().effective_max().as_int(), Some(3));
        assert_eq!(issue.effective_max().as_int(), Some(1));
    }

    #[test]
    fn null_and_true_enable_with_defaults() {
        let c = parse("noop:\nmissing-tool: true\nhide-comment: false").unwrap();
        assert!(c.has(SafeOutputKind::Noop));
        assert!(c.has(SafeOutputKind::MissingTool));
        assert!(!c.has(SafeOutputKind::HideComment));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse("create-isue: {}").unwrap_err();
        assert!(err.to_string().contains("create-isue"));
    }

    #[test]
    fn invalid_max_is_schema_error() {
        assert_eq!(parse("create-issue:\n  max: lots").unwrap_err().code(), "AW-020");
    }

    #[test]
    fn outputs_are_type_ordered() {
        let c = parse("missing-data:\nadd-comment:\ncreate-issue:\nmissing-tool:").unwrap();
        let names: Vec<_> = c.named_outputs().iter().map(|o| o.name).collect();
        assert_eq!(
            names,
            vec![
                "created_issue_number",
                "created_issue_url",
                "comment_id",
                "comment_url",
                "missing_tool_count",
                "missing_data_count"
            ]
        );
        let conclusion: Vec<_> = c.outputs_of_job("conclusion").iter().map(|o| o.name).collect();
        assert_eq!(conclusion, vec!["missing_tool_count", "missing_data_count"]);
    }

    #[test]
    fn extras_are_kept() {
        let c = parse("add-labels:\n  allowed: [bug]\n  custom-flag: yes").unwrap();
        let out = c.get(SafeOutputKind::AddLabels).unwrap();
        assert!(out.base.extra.contains_key("custom-flag"));
    }

    #[test]
    fn id_token_values() {
        assert_eq!(parse("id-token: none").unwrap().id_token, Some(Level::None));
        assert_eq!(parse("id-token: write").unwrap().id_token, Some(Level::Write));
        assert!(parse("id-token: read").is_err());
    }

    #[test]
    fn imported_types_do_not_override() {
        let mut c = parse("create-issue:\n  title-prefix: main").unwrap();
        let imported: Mapping =
            serde_yaml::from_str("create-issue:\n  title-prefix: import\nadd-labels:").unwrap();
        c.merge_imported(&imported, &mut Vec::new()).unwrap();
        assert_eq!(c.outputs.len(), 2);
        match &c.get(SafeOutputKind::CreateIssue).unwrap().options {
            SafeOutputOptions::CreateIssue { title_prefix, .. } => {
                assert_eq!(title_prefix.as_deref(), Some("main"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn imported_globals_fill_unset_fields() {
        let mut c = parse("create-issue:\nmax-patch-size: 512").unwrap();
        let imported: Mapping =
            serde_yaml::from_str("staged: true\nfooter: false\nmax-patch-size: 2048").unwrap();
        c.merge_imported(&imported, &mut Vec::new()).unwrap();
        assert!(c.is_staged());
        assert_eq!(c.footer, parse("footer: false").unwrap().footer);
        assert!(c.footer.is_some());
        assert_eq!(c.max_patch_size, Some(512));

        let mut c = parse("create-issue:").unwrap();
        c.merge_imported(&imported, &mut Vec::new()).unwrap();
        assert_eq!(c.max_patch_size, Some(2048));
    }

    #[test]
    fn project_only_detection() {
        assert!(parse("update-project:").unwrap().only_project_types());
        assert!(!parse("update-project:\ncreate-issue:").unwrap().only_project_types());
    }
}
