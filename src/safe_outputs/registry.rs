//! Safe-output type table
//!
//! One row per type: key, default `max`, base permission bundle, named job
//! outputs, whether `target-repo: "*"` is accepted, whether the type is
//! project-scoped (project token precedence) and whether the handler needs
//! the repository checked out.

use super::SafeOutputKind;
use super::SafeOutputKind as K;
use crate::permissions::{Level, Scope};
use crate::util::constants::{CONCLUSION_JOB, PROCESS_SAFE_OUTPUTS_STEP, SAFE_OUTPUTS_JOB};

/// Step that sets a named output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// `process_safe_outputs` in the safe_outputs job, under the output's own name
    SafeOutputs,
    /// A conclusion-job step, under `key`
    Conclusion { step: &'static str, key: &'static str },
}

/// A named job output contributed by a safe-output type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub source: OutputSource,
}

impl OutputSpec {
    /// Job exposing the output
    pub fn job(&self) -> &'static str {
        match self.source {
            OutputSource::SafeOutputs => SAFE_OUTPUTS_JOB,
            OutputSource::Conclusion { .. } => CONCLUSION_JOB,
        }
    }

    /// `${{ steps.<id>.outputs.<key> }}` for the job's `outputs:`
    pub fn step_expr(&self) -> String {
        let (step, key) = match self.source {
            OutputSource::SafeOutputs => (PROCESS_SAFE_OUTPUTS_STEP, self.name),
            OutputSource::Conclusion { step, key } => (step, key),
        };
        format!("${{{{ steps.{}.outputs.{} }}}}", step, key)
    }

    /// `${{ jobs.<job>.outputs.<name> }}` for `workflow_call` outputs
    pub fn job_expr(&self) -> String {
        format!("${{{{ jobs.{}.outputs.{} }}}}", self.job(), self.name)
    }
}

const fn out(name: &'static str, description: &'static str) -> OutputSpec {
    OutputSpec {
        name,
        description,
        source: OutputSource::SafeOutputs,
    }
}

const fn counted(name: &'static str, description: &'static str, step: &'static str) -> OutputSpec {
    OutputSpec {
        name,
        description,
        source: OutputSource::Conclusion {
            step,
            key: "total_count",
        },
    }
}

/// Static description of one safe-output type
#[derive(Debug, Clone, Copy)]
pub struct SafeOutputSpec {
    pub kind: SafeOutputKind,
    pub key: &'static str,
    pub default_max: u32,
    pub permissions: &'static [(Scope, Level)],
    pub outputs: &'static [OutputSpec],
    pub wildcard_target: bool,
    pub project_scoped: bool,
    pub needs_checkout: bool,
}

impl SafeOutputSpec {
    /// `create-issue` → `create_issue`
    pub fn snake_key(&self) -> String {
        crate::util::kebab_to_snake(self.key)
    }
}

const R_CONTENTS: (Scope, Level) = (Scope::Contents, Level::Read);
const W_CONTENTS: (Scope, Level) = (Scope::Contents, Level::Write);
const W_ISSUES: (Scope, Level) = (Scope::Issues, Level::Write);
const W_PRS: (Scope, Level) = (Scope::PullRequests, Level::Write);
const W_DISCUSSIONS: (Scope, Level) = (Scope::Discussions, Level::Write);
const W_SECURITY: (Scope, Level) = (Scope::SecurityEvents, Level::Write);
const R_ACTIONS: (Scope, Level) = (Scope::Actions, Level::Read);
const W_ACTIONS: (Scope, Level) = (Scope::Actions, Level::Write);

const READ_ONLY: &[(Scope, Level)] = &[R_CONTENTS];
const ISSUES: &[(Scope, Level)] = &[R_CONTENTS, W_ISSUES];
const PRS: &[(Scope, Level)] = &[R_CONTENTS, W_PRS];
const DISCUSSIONS: &[(Scope, Level)] = &[R_CONTENTS, W_DISCUSSIONS];
const ISSUES_AND_PRS: &[(Scope, Level)] = &[R_CONTENTS, W_ISSUES, W_PRS];
const CONTENTS_AND_PRS: &[(Scope, Level)] = &[W_CONTENTS, W_PRS];

const NO_OUTPUTS: &[OutputSpec] = &[];

const fn spec(
    kind: SafeOutputKind,
    key: &'static str,
    default_max: u32,
    permissions: &'static [(Scope, Level)],
    outputs: &'static [OutputSpec],
) -> SafeOutputSpec {
    SafeOutputSpec {
        kind,
        key,
        default_max,
        permissions,
        outputs,
        wildcard_target: false,
        project_scoped: false,
        needs_checkout: false,
    }
}

const fn wildcard(mut s: SafeOutputSpec) -> SafeOutputSpec {
    s.wildcard_target = true;
    s
}

const fn project(mut s: SafeOutputSpec) -> SafeOutputSpec {
    s.project_scoped = true;
    s
}

const fn git(mut s: SafeOutputSpec) -> SafeOutputSpec {
    s.needs_checkout = true;
    s
}

/// Indexed by `SafeOutputKind as usize`
static SPECS: [SafeOutputSpec; SafeOutputKind::COUNT] = [
    spec(K::CreateIssue, "create-issue", 1, ISSUES, &[
        out("created_issue_number", "Number of the created issue"),
        out("created_issue_url", "URL of the created issue"),
    ]),
    spec(K::CreateDiscussion, "create-discussion", 1, DISCUSSIONS, &[
        out("discussion_number", "Number of the created discussion"),
        out("discussion_url", "URL of the created discussion"),
    ]),
    spec(K::UpdateDiscussion, "update-discussion", 1, DISCUSSIONS, NO_OUTPUTS),
    spec(K::CloseDiscussion, "close-discussion", 1, DISCUSSIONS, NO_OUTPUTS),
    spec(K::CloseIssue, "close-issue", 1, ISSUES, NO_OUTPUTS),
    spec(K::ClosePullRequest, "close-pull-request", 1, PRS, NO_OUTPUTS),
    spec(K::AddComment, "add-comment", 1, ISSUES_AND_PRS, &[
        out("comment_id", "ID of the created comment"),
        out("comment_url", "URL of the created comment"),
    ]),
    spec(K::HideComment, "hide-comment", 5, ISSUES_AND_PRS, NO_OUTPUTS),
    git(spec(K::CreatePullRequest, "create-pull-request", 1, CONTENTS_AND_PRS, &[
        out("created_pr_number", "Number of the created pull request"),
        out("created_pr_url", "URL of the created pull request"),
    ])),
    spec(K::CreatePullRequestReviewComment, "create-pull-request-review-comment", 10, PRS, NO_OUTPUTS),
    spec(K::SubmitPullRequestReview, "submit-pull-request-review", 1, PRS, NO_OUTPUTS),
    spec(K::ReplyToPullRequestReviewComment, "reply-to-pull-request-review-comment", 10, PRS, NO_OUTPUTS),
    wildcard(spec(K::ResolvePullRequestReviewThread, "resolve-pull-request-review-thread", 10, PRS, NO_OUTPUTS)),
    git(spec(K::PushToPullRequestBranch, "push-to-pull-request-branch", 1, CONTENTS_AND_PRS, &[
        out("push_commit_sha", "SHA of the pushed commit"),
        out("push_commit_url", "URL of the pushed commit"),
    ])),
    spec(K::MarkPullRequestAsReadyForReview, "mark-pull-request-as-ready-for-review", 1, PRS, NO_OUTPUTS),
    spec(K::UpdateIssue, "update-issue", 1, ISSUES, NO_OUTPUTS),
    spec(K::UpdatePullRequest, "update-pull-request", 1, PRS, NO_OUTPUTS),
    spec(K::UpdateRelease, "update-release", 1, &[W_CONTENTS], NO_OUTPUTS),
    spec(K::UploadAsset, "upload-asset", 10, &[W_CONTENTS], &[
        out("published_asset_urls", "URLs of the uploaded assets"),
    ]),
    spec(K::AddLabels, "add-labels", 3, ISSUES_AND_PRS, NO_OUTPUTS),
    spec(K::RemoveLabels, "remove-labels", 3, ISSUES_AND_PRS, NO_OUTPUTS),
    spec(K::AddReviewer, "add-reviewer", 3, PRS, NO_OUTPUTS),
    spec(K::AssignMilestone, "assign-milestone", 1, ISSUES, NO_OUTPUTS),
    spec(K::AssignToAgent, "assign-to-agent", 1, ISSUES, NO_OUTPUTS),
    spec(K::AssignToUser, "assign-to-user", 1, ISSUES, NO_OUTPUTS),
    spec(K::UnassignFromUser, "unassign-from-user", 1, ISSUES, NO_OUTPUTS),
    spec(K::LinkSubIssue, "link-sub-issue", 1, ISSUES, NO_OUTPUTS),
    spec(K::CreateCodeScanningAlert, "create-code-scanning-alert", 40, &[R_CONTENTS, W_SECURITY], NO_OUTPUTS),
    spec(K::AutofixCodeScanningAlert, "autofix-code-scanning-alert", 10, &[R_CONTENTS, W_SECURITY, R_ACTIONS], NO_OUTPUTS),
    spec(K::CreateAgentSession, "create-agent-session", 1, ISSUES, &[
        out("session_number", "Number of the created agent session"),
        out("session_url", "URL of the created agent session"),
    ]),
    spec(K::DispatchWorkflow, "dispatch-workflow", 1, &[R_CONTENTS, W_ACTIONS], NO_OUTPUTS),
    project(spec(K::UpdateProject, "update-project", 10, READ_ONLY, NO_OUTPUTS)),
    project(spec(K::CreateProjectStatusUpdate, "create-project-status-update", 1, READ_ONLY, NO_OUTPUTS)),
    spec(K::MissingTool, "missing-tool", 20, READ_ONLY, &[
        counted("missing_tool_count", "Number of missing tools reported", "missing_tool"),
    ]),
    spec(K::MissingData, "missing-data", 20, READ_ONLY, &[
        counted("missing_data_count", "Number of missing data items reported", "missing_data"),
    ]),
    spec(K::Noop, "noop", 1, READ_ONLY, NO_OUTPUTS),
];

/// Table row of a kind
pub fn spec_of(kind: SafeOutputKind) -> &'static SafeOutputSpec {
    &SPECS[kind as usize]
}

/// Look up a kind by its front-matter key
pub fn kind_by_key(key: &str) -> Option<SafeOutputKind> {
    SPECS.iter().find(|s| s.key == key).map(|s| s.kind)
}

/// Every row, in type order
pub fn all_specs() -> &'static [SafeOutputSpec] {
    &SPECS
}
