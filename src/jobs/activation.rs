//! The `activation` job
//!
//! Runs before the agent with read-only permissions. It records run info,
//! checks the engine secret and writes the prompt, then hands both to the
//! agent job through the `activation` artifact.
//!
//! `${{ … }}` expressions in the prompt body are never written into the shell
//! heredoc. Each is replaced by a `__GH_AW_<NAME>__` placeholder and passed
//! through step env; the interpolation script substitutes them at run time.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{pins, setup_steps, Job, Step};
use crate::ast::WorkflowData;
use crate::compiler::CompileContext;
use crate::engine::{domain_lists, firewall, validate_secret_step};
use crate::error::Result;
use crate::imports::RUNTIME_IMPORT_RE;
use crate::permissions::{Level, Permissions, Scope};
use crate::util::constants::{
    ACTIVATION_ARTIFACT, ACTIVATION_JOB, AW_INFO_FILE, CACHE_MEMORY_DIR, PROMPT_FILE,
    SLIM_RUNNER,
};
use crate::util::{content_hash, heredoc_delimiter};

static EXPR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{\{\s*(.*?)\s*\}\}").unwrap());

/// Placeholder names longer than this fall back to a hashed name
const MAX_PLACEHOLDER_LEN: usize = 64;

/// Step id of the run info step
pub const GENERATE_AW_INFO_STEP: &str = "generate_aw_info";

fn placeholder_name(expr: &str) -> String {
    let mut body = String::new();
    for c in expr.chars() {
        if c.is_ascii_alphanumeric() {
            body.push(c.to_ascii_uppercase());
        } else if !body.is_empty() && !body.ends_with('_') {
            body.push('_');
        }
    }
    while body.ends_with('_') {
        body.pop();
    }
    if body.is_empty() || body.len() + "GH_AW_".len() > MAX_PLACEHOLDER_LEN {
        let hash = content_hash(expr).to_ascii_uppercase();
        return format!("GH_AW_EXPR_{}", &hash[..hash.len().min(8)]);
    }
    format!("GH_AW_{}", body)
}

/// Replace `${{ expr }}` with placeholders.
///
/// Returns the rewritten prompt and `(env name, expression)` pairs in first
/// appearance order.
pub fn prompt_placeholders(prompt: &str) -> (String, Vec<(String, String)>) {
    let mut vars: Vec<(String, String)> = Vec::new();
    let rewritten = EXPR_RE.replace_all(prompt, |caps: &regex::Captures<'_>| {
        let expr = caps[1].to_string();
        let name = match vars.iter().find(|(_, e)| *e == expr) {
            Some((name, _)) => name.clone(),
            None => {
                let name = placeholder_name(&expr);
                vars.push((name.clone(), expr));
                name
            }
        };
        format!("__{}__", name)
    });
    (rewritten.into_owned(), vars)
}

/// Instructions appended after the user prompt
fn context_sections(data: &WorkflowData) -> String {
    let mut out = String::new();
    if !data.safe_outputs.is_empty() {
        let tools: Vec<String> = data.safe_outputs.kinds().map(|k| k.snake_key()).collect();
        out.push_str(&format!(
            "\n<safe-outputs>\nYou do not have write access to GitHub. Use the safe-outputs MCP tools to request writes: {}.\nIf there is nothing to do, call `noop` with a short explanation.\n</safe-outputs>\n",
            tools.join(", ")
        ));
    }
    if data.tools.cache_memory().is_some() {
        out.push_str(&format!(
            "\n<cache-memory>\nFiles under {}/ persist across runs of this workflow.\n</cache-memory>\n",
            CACHE_MEMORY_DIR
        ));
    }
    if let Some(repo) = data.tools.repo_memory() {
        out.push_str(&format!(
            "\n<repo-memory>\nFiles under /tmp/gh-aw/repo-memory/ are committed to the '{}' branch after the run.\n</repo-memory>\n",
            repo.branch_name()
        ));
    }
    out
}

fn checkout_github_folder() -> Step {
    Step::named("Checkout .github and .agents folders")
        .uses(pins::CHECKOUT)
        .with("sparse-checkout", ".github\n.agents")
        .with("persist-credentials", false)
        .with("fetch-depth", 1)
}

fn aw_info_step(data: &WorkflowData, ctx: &CompileContext) -> Result<Step> {
    let engine = ctx.engines.get(data.engine.kind);
    let (allowed, _) = domain_lists(engine, data);
    let version = data
        .engine
        .version
        .clone()
        .unwrap_or_else(|| engine.default_version().to_string());
    Ok(Step::named("Generate agentic run info")
        .id(GENERATE_AW_INFO_STEP)
        .uses(pins::GITHUB_SCRIPT)
        .env("GH_AW_INFO_ENGINE_ID", data.engine.kind.as_str())
        .env("GH_AW_INFO_ENGINE_NAME", engine.display_name())
        .env("GH_AW_INFO_MODEL", data.engine.model.clone().unwrap_or_default())
        .env("GH_AW_INFO_VERSION", version)
        .env("GH_AW_INFO_CLI_VERSION", ctx.version.as_str())
        .env("GH_AW_INFO_WORKFLOW_NAME", data.name.as_str())
        .env("GH_AW_INFO_STAGED", data.safe_outputs.is_staged().to_string())
        .env("GH_AW_INFO_ALLOWED_DOMAINS", serde_json::to_string(&allowed)?)
        .env("GH_AW_INFO_FIREWALL_ENABLED", data.firewall_enabled().to_string())
        .env("GH_AW_INFO_AWF_VERSION", firewall::awf_version(data))
        .with("script", ctx.scripts.github_script("generate_aw_info.cjs")?))
}

fn create_prompt_step(prompt: &str) -> Step {
    let mut body = prompt.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    let dir = PROMPT_FILE.rsplit_once('/').map(|(d, _)| d).unwrap_or(PROMPT_FILE);
    let eof = heredoc_delimiter("PROMPT", &body);
    Step::named("Create prompt")
        .env("GH_AW_PROMPT", PROMPT_FILE)
        .run(format!(
            "mkdir -p {dir}\ncat << '{eof}' > \"$GH_AW_PROMPT\"\n{body}{eof}\n",
            dir = dir,
            eof = eof,
            body = body
        ))
}

/// Build the activation job
pub fn build_activation_job(data: &WorkflowData, ctx: &CompileContext) -> Result<Job> {
    let engine = ctx.engines.get(data.engine.kind);

    let mut prompt = data.prompt.trim_end().to_string();
    prompt.push('\n');
    prompt.push_str(&context_sections(data));
    let (prompt, vars) = prompt_placeholders(&prompt);
    debug!(placeholders = vars.len(), "prompt rewritten");

    let mut job = Job::new(ACTIVATION_JOB, SLIM_RUNNER)
        .permissions(Permissions::from_pairs(&[(Scope::Contents, Level::Read)]));
    job.add_steps(setup_steps(ctx));
    job.add_steps([checkout_github_folder(), aw_info_step(data, ctx)?]);
    if let Some(step) = validate_secret_step(engine, ctx)? {
        job.add_steps([step]);
    }
    job.add_steps([create_prompt_step(&prompt)]);

    if !vars.is_empty() || RUNTIME_IMPORT_RE.is_match(&prompt) {
        let mut step = Step::named("Interpolate variables and render templates")
            .uses(pins::GITHUB_SCRIPT)
            .env("GH_AW_PROMPT", PROMPT_FILE);
        for (name, expr) in &vars {
            step = step.env(name.as_str(), format!("${{{{ {} }}}}", expr));
        }
        step = step.with("script", ctx.scripts.github_script("interpolate_prompt.cjs")?);
        job.add_steps([step]);
    }

    job.add_steps([Step::named("Upload activation artifact")
        .uses(pins::UPLOAD_ARTIFACT)
        .with("name", ACTIVATION_ARTIFACT)
        .with("path", format!("{}\n{}", PROMPT_FILE, AW_INFO_FILE))
        .with("retention-days", 1)]);
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter;
    use crate::imports::ResolvedImports;
    use std::path::Path;

    fn build(text: &str) -> Job {
        let path = "/repo/.github/workflows/w.md";
        let parsed = frontmatter::parse(text, path).unwrap();
        let imports = ResolvedImports {
            prompt: parsed.body.clone(),
            ..Default::default()
        };
        let ctx = CompileContext::for_tests();
        let data = WorkflowData::build(Path::new(path), &parsed, imports, &ctx).unwrap();
        build_activation_job(&data, &ctx).unwrap()
    }

    fn names(job: &Job) -> Vec<String> {
        job.steps.iter().filter_map(|s| s.name.clone()).collect()
    }

    #[test]
    fn placeholders_are_stable_and_deduplicated() {
        let (out, vars) = prompt_placeholders(
            "Issue ${{ github.event.issue.number }} in ${{github.repository}}; again ${{ github.event.issue.number }}",
        );
        assert_eq!(
            out,
            "Issue __GH_AW_GITHUB_EVENT_ISSUE_NUMBER__ in __GH_AW_GITHUB_REPOSITORY__; again __GH_AW_GITHUB_EVENT_ISSUE_NUMBER__"
        );
        assert_eq!(
            vars,
            vec![
                ("GH_AW_GITHUB_EVENT_ISSUE_NUMBER".to_string(), "github.event.issue.number".to_string()),
                ("GH_AW_GITHUB_REPOSITORY".to_string(), "github.repository".to_string()),
            ]
        );
    }

    #[test]
    fn operator_expressions_get_sanitized_names() {
        assert_eq!(
            placeholder_name("needs.activation.outputs.text || ''"),
            "GH_AW_NEEDS_ACTIVATION_OUTPUTS_TEXT"
        );
        assert!(placeholder_name("''").starts_with("GH_AW_EXPR_"));
    }

    #[test]
    fn aw_info_precedes_secret_validation() {
        let job = build("---\nengine: copilot\n---\nDo it");
        let info = job.step_position(GENERATE_AW_INFO_STEP).unwrap();
        let secret = job.step_position("validate-secret").unwrap();
        assert!(info < secret);
        assert_eq!(job.runs_on.as_str(), Some("ubuntu-slim"));
    }

    #[test]
    fn custom_engine_skips_secret_check() {
        let job = build("---\nengine:\n  id: custom\n  steps:\n    - run: echo hi\n---\nx");
        assert!(job.step_position("validate-secret").is_none());
    }

    #[test]
    fn prompt_expressions_go_through_env() {
        let job = build("---\non: issues\n---\nTriage #${{ github.event.issue.number }}");
        let create = job.steps.iter().find(|s| s.name.as_deref() == Some("Create prompt")).unwrap();
        let run = create.run.as_deref().unwrap();
        assert!(run.contains("Triage #__GH_AW_GITHUB_EVENT_ISSUE_NUMBER__"));
        assert!(!run.contains("${{"));
        let interp = job
            .steps
            .iter()
            .find(|s| s.name.as_deref() == Some("Interpolate variables and render templates"))
            .unwrap();
        assert_eq!(
            interp.env["GH_AW_GITHUB_EVENT_ISSUE_NUMBER"],
            "${{ github.event.issue.number }}"
        );
    }

    #[test]
    fn prompt_line_cannot_end_the_heredoc() {
        let job = build("---\non: push\n---\nFirst\nGH_AW_PROMPT_EOF\nrm -rf /\n");
        let create = job.steps.iter().find(|s| s.name.as_deref() == Some("Create prompt")).unwrap();
        let run = create.run.as_deref().unwrap();
        let eof = run.lines().last().unwrap();
        assert_ne!(eof, "GH_AW_PROMPT_EOF");
        assert!(eof.starts_with("GH_AW_PROMPT_") && eof.ends_with("_EOF"));
        assert!(run.contains(&format!("cat << '{}'", eof)));
        assert_eq!(run.lines().filter(|l| *l == eof).count(), 1);
        assert!(run.contains("\nGH_AW_PROMPT_EOF\nrm -rf /\n"));
    }

    #[test]
    fn plain_prompt_skips_interpolation() {
        let job = build("---\non: push\n---\nJust text");
        assert!(!names(&job).iter().any(|n| n.starts_with("Interpolate")));
        assert_eq!(names(&job).last().unwrap(), "Upload activation artifact");
    }

    #[test]
    fn safe_outputs_section_is_appended() {
        let job = build("---\nsafe-outputs:\n  create-issue:\n---\nFile a bug");
        let create = job.steps.iter().find(|s| s.name.as_deref() == Some("Create prompt")).unwrap();
        let run = create.run.as_deref().unwrap();
        assert!(run.contains("<safe-outputs>"));
        assert!(run.contains("create_issue"));
    }
}
