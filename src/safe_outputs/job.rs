//! The `safe_outputs` job
//!
//! One job processes every configured type. It downloads the agent output
//! artifact and hands it to the handler manager, which dispatches each record
//! to the handler of its type.

use std::collections::BTreeMap;

use tracing::debug;

use super::{handler_config_json, SafeOutputKind, SafeOutputOptions, SafeOutputsConfig};
use crate::ast::AppConfig;
use crate::compiler::CompileContext;
use crate::error::Result;
use crate::jobs::{pins, setup_steps, Job, Step};
use crate::permissions::Permissions;
use crate::util::constants::{
    ACTIVATION_JOB, AGENT_JOB, AGENT_OUTPUT_ARTIFACT, APP_TOKEN_STEP, DEFAULT_GITHUB_TOKEN_EXPR,
    PROCESS_SAFE_OUTPUTS_STEP, PROJECT_GITHUB_TOKEN_EXPR, SAFE_OUTPUTS_DOWNLOAD_DIR,
    SAFE_OUTPUTS_JOB, SAFE_OUTPUTS_TIMEOUT_MINUTES, SLIM_RUNNER,
};

const APP_TOKEN_EXPR: &str = "${{ steps.safe-outputs-app-token.outputs.token }}";
const TRIGGERING_NUMBER: &str =
    "(github.event.issue.number || github.event.pull_request.number || github.event.discussion.number)";

/// Inputs of the job builder
#[derive(Debug, Clone)]
pub struct SafeOutputsJobInput<'a> {
    pub config: &'a SafeOutputsConfig,
    /// Solved permissions for the configured types
    pub permissions: Permissions,
    pub engine_id: &'a str,
    pub workflow_id: &'a str,
    pub workflow_name: &'a str,
    /// Repository of the `current: true` checkout
    pub target_repo: Option<&'a str>,
}

/// Token used for `with.github-token` of the processing step
pub fn step_github_token(config: &SafeOutputsConfig) -> String {
    if config.app.is_some() {
        APP_TOKEN_EXPR.to_string()
    } else if let Some(token) = &config.github_token {
        token.clone()
    } else if config.only_project_types() {
        PROJECT_GITHUB_TOKEN_EXPR.to_string()
    } else {
        DEFAULT_GITHUB_TOKEN_EXPR.to_string()
    }
}

/// `GH_AW_CI_TRIGGER_TOKEN` value; only set when pull requests are created
pub fn ci_trigger_token(config: &SafeOutputsConfig) -> Option<String> {
    let output = config.get(SafeOutputKind::CreatePullRequest)?;
    let configured = match &output.options {
        SafeOutputOptions::CreatePullRequest { ci_trigger_token, .. } => ci_trigger_token.as_deref(),
        _ => None,
    };
    Some(match configured.map(str::trim) {
        None | Some("") => "${{ secrets.GH_AW_CI_TRIGGER_TOKEN }}".to_string(),
        Some("app") => format!("${{{{ steps.{}.outputs.token || '' }}}}", APP_TOKEN_STEP),
        Some(other) => other.to_string(),
    })
}

fn is_triggering_target(target: &Option<String>) -> bool {
    matches!(target.as_deref(), None | Some("triggering"))
}

/// `if:` of the job
fn job_condition(config: &SafeOutputsConfig) -> String {
    let clauses: Vec<String> = config
        .outputs
        .values()
        .map(|output| {
            let base = format!(
                "contains(needs.{}.outputs.output_types, '{}')",
                AGENT_JOB,
                output.kind.snake_key()
            );
            let triggering = is_triggering_target(&output.base.target);
            match output.kind {
                SafeOutputKind::AddComment if triggering => {
                    format!("({} && {})", base, TRIGGERING_NUMBER)
                }
                SafeOutputKind::PushToPullRequestBranch if triggering => {
                    format!("({} && github.event.pull_request.number)", base)
                }
                _ => base,
            }
        })
        .collect();
    format!(
        "(!cancelled()) && needs.{}.result != 'skipped' && ({})",
        AGENT_JOB,
        clauses.join(" || ")
    )
}

fn app_token_step(app: &AppConfig) -> Step {
    let owner = app
        .owner
        .clone()
        .unwrap_or_else(|| "${{ github.repository_owner }}".to_string());
    let repositories = if app.repositories.is_empty() {
        "${{ github.event.repository.name }}".to_string()
    } else {
        app.repositories.join("\n")
    };
    Step::named("Generate GitHub App token")
        .id(APP_TOKEN_STEP)
        .uses(pins::CREATE_APP_TOKEN)
        .with("app-id", app.app_id.as_str())
        .with("private-key", app.private_key.as_str())
        .with("owner", owner)
        .with("repositories", repositories)
        .with("github-api-url", "${{ github.api_url }}")
}

fn app_token_revoke_step() -> Step {
    Step::named("Invalidate GitHub App token")
        .when(format!("always() && steps.{}.outputs.token != ''", APP_TOKEN_STEP))
        .env("TOKEN", APP_TOKEN_EXPR)
        .run(
            "echo \"Revoking GitHub App installation token...\"\n\
             curl -L -X DELETE -H \"Accept: application/vnd.github+json\" \
             -H \"Authorization: Bearer $TOKEN\" -H \"X-GitHub-Api-Version: 2022-11-28\" \
             \"${GITHUB_API_URL}/installation/token\"\n\
             echo \"Token invalidated\"",
        )
}

/// Steps that fetch the agent output and export its path
pub(crate) fn agent_output_steps() -> Vec<Step> {
    vec![
        Step::named("Download agent output artifact")
            .continue_on_error()
            .uses(pins::DOWNLOAD_ARTIFACT)
            .with("name", AGENT_OUTPUT_ARTIFACT)
            .with("path", SAFE_OUTPUTS_DOWNLOAD_DIR),
        Step::named("Setup agent output environment variable").run(format!(
            "mkdir -p {dir}\nfind \"{dir}\" -type f -print\necho \"GH_AW_AGENT_OUTPUT={dir}agent_output.json\" >> \"$GITHUB_ENV\"",
            dir = SAFE_OUTPUTS_DOWNLOAD_DIR
        )),
    ]
}

fn git_checkout_steps(token: &str) -> Vec<Step> {
    vec![
        Step::named("Checkout repository")
            .uses(pins::CHECKOUT)
            .with("token", token)
            .with("persist-credentials", false)
            .with("fetch-depth", 1),
        Step::named("Configure Git credentials")
            .env("REPO_NAME", "${{ github.repository }}")
            .env("SERVER_URL", "${{ github.server_url }}")
            .env("GIT_TOKEN", token)
            .run(
                "git config --global user.email \"github-actions[bot]@users.noreply.github.com\"\n\
                 git config --global user.name \"github-actions[bot]\"\n\
                 SERVER_URL_STRIPPED=\"${SERVER_URL#https://}\"\n\
                 git remote set-url origin \"https://x-access-token:${GIT_TOKEN}@${SERVER_URL_STRIPPED}/${REPO_NAME}.git\"\n\
                 echo \"Git configured with standard GitHub Actions identity\"",
            ),
    ]
}

fn job_env(input: &SafeOutputsJobInput<'_>) -> BTreeMap<String, String> {
    let config = input.config;
    let mut env = BTreeMap::new();
    env.insert("GH_AW_ENGINE_ID".to_string(), input.engine_id.to_string());
    env.insert("GH_AW_WORKFLOW_ID".to_string(), input.workflow_id.to_string());
    env.insert("GH_AW_WORKFLOW_NAME".to_string(), input.workflow_name.to_string());
    if config.is_staged() {
        env.insert("GH_AW_SAFE_OUTPUTS_STAGED".to_string(), "true".to_string());
    }
    if let Some(repo) = input.target_repo {
        env.insert("GH_AW_TARGET_REPO_SLUG".to_string(), repo.to_string());
    }
    if let Some(footer) = &config.footer {
        env.insert("GH_AW_FOOTER".to_string(), footer.to_string());
    }
    for (k, v) in &config.env {
        env.insert(k.clone(), v.clone());
    }
    env
}

/// Build the job; `None` when no type is configured
pub fn build_safe_outputs_job(
    input: SafeOutputsJobInput<'_>,
    ctx: &CompileContext,
) -> Result<Option<Job>> {
    let config = input.config;
    if config.is_empty() {
        return Ok(None);
    }
    debug!(types = config.outputs.len(), "building safe_outputs job");

    let runs_on = config
        .runs_on
        .clone()
        .unwrap_or_else(|| SLIM_RUNNER.into());
    let mut job = Job::new(SAFE_OUTPUTS_JOB, runs_on)
        .needs(ACTIVATION_JOB)
        .needs(AGENT_JOB)
        .when(job_condition(config))
        .permissions(input.permissions.clone())
        .timeout(SAFE_OUTPUTS_TIMEOUT_MINUTES);
    job.env = job_env(&input);

    for output in config.outputs_of_job(SAFE_OUTPUTS_JOB) {
        job = job.output(output.name, output.step_expr());
    }

    let token = step_github_token(config);

    job.add_steps(setup_steps(ctx));
    job.add_steps(agent_output_steps());
    if config.needs_checkout() {
        let checkout_token = config
            .github_token
            .clone()
            .unwrap_or_else(|| DEFAULT_GITHUB_TOKEN_EXPR.to_string());
        job.add_steps(git_checkout_steps(&checkout_token));
    }
    if let Some(app) = &config.app {
        job.add_steps([app_token_step(app)]);
    }
    job.add_steps(config.steps.iter().cloned().map(Step::raw));

    let mut process = Step::named("Process Safe Outputs")
        .id(PROCESS_SAFE_OUTPUTS_STEP)
        .uses(pins::GITHUB_SCRIPT)
        .env("GH_AW_SAFE_OUTPUTS_HANDLER_CONFIG", handler_config_json(config)?);
    if let Some(ci) = ci_trigger_token(config) {
        process = process.env("GH_AW_CI_TRIGGER_TOKEN", ci);
    }
    process = process
        .with("github-token", token)
        .with("script", ctx.scripts.github_script("safe_output_handler_manager.cjs")?);
    job.add_steps([process]);

    if config.app.is_some() {
        job.add_steps([app_token_revoke_step()]);
    }

    Ok(Some(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    fn config(yaml: &str) -> SafeOutputsConfig {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        SafeOutputsConfig::from_mapping(&m, &mut Vec::new()).unwrap()
    }

    fn build(yaml: &str) -> Job {
        let c = config(yaml);
        let input = SafeOutputsJobInput {
            config: &c,
            permissions: crate::permissions::solve_safe_outputs(&c),
            engine_id: "copilot",
            workflow_id: "triage",
            workflow_name: "Triage",
            target_repo: None,
        };
        build_safe_outputs_job(input, &CompileContext::for_tests())
            .unwrap()
            .unwrap()
    }

    fn process_step(job: &Job) -> &Step {
        let i = job.step_position(PROCESS_SAFE_OUTPUTS_STEP).unwrap();
        &job.steps[i]
    }

    #[test]
    fn token_precedence() {
        assert_eq!(step_github_token(&config("create-issue:")), DEFAULT_GITHUB_TOKEN_EXPR);
        assert_eq!(step_github_token(&config("update-project:")), PROJECT_GITHUB_TOKEN_EXPR);
        assert_eq!(
            step_github_token(&config("update-project:\ngithub-token: ${{ secrets.X }}")),
            "${{ secrets.X }}"
        );
        assert_eq!(
            step_github_token(&config(
                "create-issue:\napp:\n  app-id: ${{ vars.APP_ID }}\n  private-key: ${{ secrets.KEY }}"
            )),
            APP_TOKEN_EXPR
        );
    }

    #[test]
    fn per_output_token_is_not_the_step_token() {
        let job = build("create-issue:\n  github-token: ${{ secrets.ISSUES }}");
        let step = process_step(&job);
        assert_eq!(
            step.with.get("github-token").and_then(|v| v.as_str()),
            Some(DEFAULT_GITHUB_TOKEN_EXPR)
        );
        assert!(step.env["GH_AW_SAFE_OUTPUTS_HANDLER_CONFIG"].contains("secrets.ISSUES"));
    }

    #[test]
    fn ci_trigger_token_variants() {
        assert_eq!(
            ci_trigger_token(&config("create-pull-request:")).unwrap(),
            "${{ secrets.GH_AW_CI_TRIGGER_TOKEN }}"
        );
        assert_eq!(
            ci_trigger_token(&config("create-pull-request:\n  github-token-for-extra-empty-commit: ''"))
                .unwrap(),
            "${{ secrets.GH_AW_CI_TRIGGER_TOKEN }}"
        );
        assert_eq!(
            ci_trigger_token(&config("create-pull-request:\n  github-token-for-extra-empty-commit: app"))
                .unwrap(),
            "${{ steps.safe-outputs-app-token.outputs.token || '' }}"
        );
        assert_eq!(
            ci_trigger_token(&config(
                "create-pull-request:\n  github-token-for-extra-empty-commit: ${{ secrets.PAT }}"
            ))
            .unwrap(),
            "${{ secrets.PAT }}"
        );
        assert_eq!(ci_trigger_token(&config("create-issue:")), None);
    }

    #[test]
    fn condition_lists_every_type() {
        let job = build("create-issue:\nadd-comment:\n  target: '*'");
        assert_eq!(
            job.condition.as_deref().unwrap(),
            "(!cancelled()) && needs.agent.result != 'skipped' && (contains(needs.agent.outputs.output_types, 'create_issue') || contains(needs.agent.outputs.output_types, 'add_comment'))"
        );
    }

    #[test]
    fn triggering_comment_requires_an_event_number() {
        let job = build("add-comment:");
        assert!(job
            .condition
            .as_deref()
            .unwrap()
            .contains("&& (github.event.issue.number || github.event.pull_request.number || github.event.discussion.number))"));
        let job = build("push-to-pull-request-branch:");
        assert!(job
            .condition
            .as_deref()
            .unwrap()
            .contains("&& github.event.pull_request.number)"));
    }

    #[test]
    fn job_shape() {
        let job = build("create-issue:\nstaged: true\nenv:\n  ZED: z");
        assert_eq!(job.needs, vec!["activation".to_string(), "agent".to_string()]);
        assert_eq!(job.timeout_minutes, Some(15));
        assert_eq!(job.runs_on.as_str(), Some("ubuntu-slim"));
        let keys: Vec<_> = job.env.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["GH_AW_ENGINE_ID", "GH_AW_SAFE_OUTPUTS_STAGED", "GH_AW_WORKFLOW_ID", "GH_AW_WORKFLOW_NAME", "ZED"]
        );
        let outputs: Vec<_> = job.outputs.keys().cloned().collect();
        assert_eq!(outputs, vec!["created_issue_number", "created_issue_url"]);
        assert_eq!(
            job.outputs.get("created_issue_url").unwrap(),
            "${{ steps.process_safe_outputs.outputs.created_issue_url }}"
        );
    }

    #[test]
    fn step_order_with_app_and_git() {
        let job = build(
            "create-pull-request:\napp:\n  app-id: '1'\n  private-key: ${{ secrets.K }}\nsteps:\n  - name: user step\n    run: echo hi",
        );
        let names: Vec<_> = job
            .steps
            .iter()
            .map(|s| {
                s.name
                    .clone()
                    .or_else(|| s.raw.as_ref().and_then(|r| r.get("name")).and_then(|v| v.as_str()).map(String::from))
                    .unwrap()
            })
            .collect();
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(pos("Download agent output artifact") < pos("Checkout repository"));
        assert!(pos("Checkout repository") < pos("Generate GitHub App token"));
        assert!(pos("Generate GitHub App token") < pos("user step"));
        assert!(pos("user step") < pos("Process Safe Outputs"));
        assert_eq!(names.last().unwrap(), "Invalidate GitHub App token");
    }

    #[test]
    fn empty_config_builds_nothing() {
        let c = SafeOutputsConfig::default();
        let input = SafeOutputsJobInput {
            config: &c,
            permissions: Permissions::new(),
            engine_id: "claude",
            workflow_id: "x",
            workflow_name: "X",
            target_repo: None,
        };
        assert!(build_safe_outputs_job(input, &CompileContext::for_tests()).unwrap().is_none());
    }
}
