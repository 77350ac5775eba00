//! The `conclusion` job
//!
//! Runs after everything else whenever the agent ran. It reports `noop`
//! messages, files missing-tool / missing-data reports and handles agent
//! failures. Its permissions never exceed the notification surface of the
//! safe_outputs job.

use super::{pins, setup_steps, Job, Step};
use crate::ast::WorkflowData;
use crate::compiler::CompileContext;
use crate::error::Result;
use crate::permissions::{Level, Permissions, Scope};
use crate::safe_outputs::missing::{MissingReportSpec, REPORT_SCRIPT};
use crate::safe_outputs::{agent_output_steps, SafeOutputKind, SafeOutputOptions};
use crate::util::constants::{
    ACTIVATION_JOB, AGENT_JOB, CONCLUSION_JOB, DEFAULT_GITHUB_TOKEN_EXPR, SAFE_OUTPUTS_JOB,
    SLIM_RUNNER,
};

/// Scopes the conclusion job may inherit from safe_outputs
const NOTIFICATION_SCOPES: &[Scope] = &[Scope::Issues, Scope::PullRequests, Scope::Discussions];

fn conclusion_permissions(safe_outputs: &Permissions) -> Permissions {
    Permissions::from_pairs(&[(Scope::Contents, Level::Read)])
        .merged(&safe_outputs.restricted_to(NOTIFICATION_SCOPES))
}

/// Build the job; `None` without safe outputs
pub fn build_conclusion_job(
    data: &WorkflowData,
    safe_outputs_permissions: &Permissions,
    ctx: &CompileContext,
) -> Result<Option<Job>> {
    let config = &data.safe_outputs;
    if config.is_empty() {
        return Ok(None);
    }

    let mut job = Job::new(CONCLUSION_JOB, SLIM_RUNNER)
        .needs(ACTIVATION_JOB)
        .needs(AGENT_JOB)
        .needs(SAFE_OUTPUTS_JOB)
        .when(format!("always() && needs.{}.result != 'skipped'", AGENT_JOB))
        .permissions(conclusion_permissions(safe_outputs_permissions));
    job.add_steps(setup_steps(ctx));
    job.add_steps(agent_output_steps());

    let token = config
        .github_token
        .clone()
        .unwrap_or_else(|| DEFAULT_GITHUB_TOKEN_EXPR.to_string());

    if let Some(noop) = config.get(SafeOutputKind::Noop) {
        let report = matches!(noop.options, SafeOutputOptions::Noop { report_as_issue: true });
        job.add_steps([Step::named("Process No-Op Messages")
            .id("noop")
            .uses(pins::GITHUB_SCRIPT)
            .env("GH_AW_NOOP_MAX", noop.effective_max().to_string())
            .env("GH_AW_NOOP_REPORT_AS_ISSUE", report.to_string())
            .env("GH_AW_WORKFLOW_NAME", data.name.as_str())
            .with("github-token", token.as_str())
            .with("script", ctx.scripts.github_script("noop.cjs")?)]);
    }

    for kind in [SafeOutputKind::MissingTool, SafeOutputKind::MissingData] {
        let (Some(output), Some(spec)) = (config.get(kind), MissingReportSpec::for_kind(kind)) else {
            continue;
        };
        job.add_steps([Step::named(spec.step_name())
            .id(spec.step_id())
            .uses(pins::GITHUB_SCRIPT)
            .envs(spec.env(output))
            .env("GH_AW_WORKFLOW_NAME", data.name.as_str())
            .with("github-token", token.as_str())
            .with("script", ctx.scripts.github_script(REPORT_SCRIPT)?)]);
    }
    for output in config.outputs_of_job(CONCLUSION_JOB) {
        job = job.output(output.name, output.step_expr());
    }

    job.add_steps([Step::named("Handle Agent Failure")
        .id("handle_agent_failure")
        .uses(pins::GITHUB_SCRIPT)
        .env("GH_AW_WORKFLOW_NAME", data.name.as_str())
        .env("GH_AW_RUN_URL", "${{ github.server_url }}/${{ github.repository }}/actions/runs/${{ github.run_id }}")
        .env("GH_AW_AGENT_CONCLUSION", format!("${{{{ needs.{}.result }}}}", AGENT_JOB))
        .with("github-token", token.as_str())
        .with("script", ctx.scripts.github_script("handle_agent_failure.cjs")?)]);

    Ok(Some(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter;
    use crate::imports::ResolvedImports;
    use crate::permissions::solve_safe_outputs;
    use std::path::Path;

    fn build(text: &str) -> Option<Job> {
        let path = "/repo/.github/workflows/w.md";
        let parsed = frontmatter::parse(text, path).unwrap();
        let ctx = CompileContext::for_tests();
        let data =
            WorkflowData::build(Path::new(path), &parsed, ResolvedImports::default(), &ctx).unwrap();
        let perms = solve_safe_outputs(&data.safe_outputs);
        build_conclusion_job(&data, &perms, &ctx).unwrap()
    }

    #[test]
    fn absent_without_safe_outputs() {
        assert!(build("---\non: push\n---\nx").is_none());
    }

    #[test]
    fn needs_and_condition() {
        let job = build("---\nsafe-outputs:\n  create-issue:\n---\nx").unwrap();
        assert_eq!(job.needs, vec!["activation", "agent", "safe_outputs"]);
        assert_eq!(
            job.condition.as_deref(),
            Some("always() && needs.agent.result != 'skipped'")
        );
    }

    #[test]
    fn permissions_are_limited_to_notification_scopes() {
        let job = build("---\nsafe-outputs:\n  create-pull-request:\n  upload-asset:\n---\nx").unwrap();
        assert_eq!(job.permissions.level(Scope::Contents), Some(Level::Read));
        assert_eq!(job.permissions.level(Scope::PullRequests), Some(Level::Write));
        assert_eq!(job.permissions.level(Scope::Issues), Some(Level::Write));
        assert!(!job.permissions.write_scopes().contains(&Scope::Contents));
    }

    #[test]
    fn report_steps_follow_configuration() {
        let job = build("---\nsafe-outputs:\n  noop:\n    report-as-issue: true\n  missing-data:\n---\nx")
            .unwrap();
        let noop = &job.steps[job.step_position("noop").unwrap()];
        assert_eq!(noop.env["GH_AW_NOOP_REPORT_AS_ISSUE"], "true");
        assert!(job.step_position("missing_data").is_some());
        assert!(job.step_position("missing_tool").is_none());
        assert_eq!(
            job.steps.last().and_then(|s| s.name.as_deref()),
            Some("Handle Agent Failure")
        );
    }

    #[test]
    fn missing_counts_are_job_outputs() {
        let job = build("---
safe-outputs:
  missing-tool:
  missing-data:
---
x").unwrap();
        let keys: Vec<_> = job.outputs.keys().cloned().collect();
        assert_eq!(keys, vec!["missing_tool_count", "missing_data_count"]);
        assert_eq!(
            job.outputs.get("missing_tool_count").unwrap(),
            "${{ steps.missing_tool.outputs.total_count }}"
        );
        assert_eq!(
            job.outputs.get("missing_data_count").unwrap(),
            "${{ steps.missing_data.outputs.total_count }}"
        );

        let job = build("---
safe-outputs:
  create-issue:
---
x").unwrap();
        assert!(job.outputs.is_empty());
    }
}
