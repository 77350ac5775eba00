//! The `agent` job
//!
//! Step order is fixed:
//!
//! ```text
//! setup → checkouts → temp dir → git config → cache-memory restore
//!   → repo-memory clone → user steps → GitHub MCP app token → install
//!   → download activation → safe-outputs config / safe-inputs
//!   → MCP gateway → setup MCPs → execute → collect output
//!   → upload artifacts → cache-memory save → repo-memory upload
//! ```

use serde_json::json;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::{pins, setup_steps, Job, Step};
use crate::ast::{AppConfig, CacheMemoryTool, RepoMemoryTool, SafeInputBody, WorkflowData};
use crate::checkout::CheckoutManager;
use crate::compiler::CompileContext;
use crate::engine::mcp::{McpServers, GITHUB_MCP_APP_TOKEN_STEP};
use crate::engine::{
    domain_lists, execution_steps, install_steps, mcp_setup_step, CodingAgentEngine, EngineRun,
};
use crate::error::Result;
use crate::permissions::{Level, Permissions, Scope};
use crate::safe_outputs::handler_config_json;
use crate::util::constants::{
    ACTIVATION_ARTIFACT, ACTIVATION_JOB, AGENT_ARTIFACTS, AGENT_JOB, AGENT_LOG_FILE,
    AGENT_OUTPUT_ARTIFACT, AW_INFO_FILE, CACHE_MEMORY_DIR, COLLECT_OUTPUT_STEP, DEFAULT_RUNNER,
    DEFAULT_TIMEOUT_MINUTES, FIREWALL_LOG_DIR, MCP_LOG_DIR, PROMPT_FILE,
    SAFE_OUTPUTS_CONFIG_FILE, SAFE_OUTPUTS_DOWNLOAD_DIR, SAFE_OUTPUTS_FILE, TMP_ROOT,
};
use crate::util::heredoc_delimiter;

const SAFE_INPUTS_DIR: &str = "/opt/gh-aw/safe-inputs";
const REPO_MEMORY_DIR: &str = "/tmp/gh-aw/repo-memory";

fn configure_git_step() -> Step {
    Step::named("Configure Git credentials")
        .env("REPO_NAME", "${{ github.repository }}")
        .env("SERVER_URL", "${{ github.server_url }}")
        .env("GIT_TOKEN", "${{ github.token }}")
        .run(
            "git config --global user.email \"github-actions[bot]@users.noreply.github.com\"\n\
             git config --global user.name \"github-actions[bot]\"\n\
             SERVER_URL_STRIPPED=\"${SERVER_URL#https://}\"\n\
             git remote set-url origin \"https://x-access-token:${GIT_TOKEN}@${SERVER_URL_STRIPPED}/${REPO_NAME}.git\"\n\
             echo \"Git configured with standard GitHub Actions identity\"",
        )
}

/// `(key, restore-keys)` of the cache-memory cache
fn cache_keys(cache: &CacheMemoryTool) -> (String, String) {
    let base = cache
        .key
        .clone()
        .unwrap_or_else(|| "memory-${{ github.workflow }}".to_string());
    (format!("{}-${{{{ github.run_id }}}}", base), format!("{}-", base))
}

fn cache_restore_step(cache: &CacheMemoryTool) -> Step {
    let (key, restore) = cache_keys(cache);
    Step::named("Restore cache-memory")
        .uses(pins::CACHE_RESTORE)
        .with("key", key)
        .with("path", CACHE_MEMORY_DIR)
        .with("restore-keys", restore)
}

fn cache_save_step(cache: &CacheMemoryTool) -> Step {
    let (key, _) = cache_keys(cache);
    Step::named("Save cache-memory")
        .when("always()")
        .uses(pins::CACHE_SAVE)
        .with("key", key)
        .with("path", CACHE_MEMORY_DIR)
}

fn repo_memory_clone_step(repo: &RepoMemoryTool, ctx: &CompileContext) -> Result<Step> {
    let mut step = Step::named("Clone repo-memory branch")
        .env("GH_TOKEN", "${{ github.token }}")
        .env("BRANCH_NAME", repo.branch_name())
        .env("MEMORY_DIR", REPO_MEMORY_DIR);
    if let Some(size) = repo.max_file_size {
        step = step.env("MAX_FILE_SIZE", size.to_string());
    }
    Ok(step.run(ctx.scripts.shell("clone_repo_memory_branch.sh", &[])?))
}

fn repo_memory_upload_step(repo: &RepoMemoryTool) -> Step {
    let mut step = Step::named("Upload repo-memory artifact")
        .when("always()")
        .uses(pins::UPLOAD_ARTIFACT)
        .with("name", "repo-memory")
        .with("path", format!("{}/", REPO_MEMORY_DIR))
        .with("if-no-files-found", "ignore");
    if let Some(days) = repo.retention_days {
        step = step.with("retention-days", days);
    }
    step
}

fn github_app_token_step(app: &AppConfig) -> Step {
    let owner = app
        .owner
        .clone()
        .unwrap_or_else(|| "${{ github.repository_owner }}".to_string());
    let mut step = Step::named("Generate GitHub App token for GitHub MCP server")
        .id(GITHUB_MCP_APP_TOKEN_STEP)
        .uses(pins::CREATE_APP_TOKEN)
        .with("app-id", app.app_id.as_str())
        .with("private-key", app.private_key.as_str())
        .with("owner", owner);
    if !app.repositories.is_empty() {
        step = step.with("repositories", app.repositories.join("\n"));
    }
    step
}

fn download_activation_step() -> Step {
    Step::named("Download activation artifact")
        .uses(pins::DOWNLOAD_ARTIFACT)
        .with("name", ACTIVATION_ARTIFACT)
        .with("path", TMP_ROOT)
}

fn safe_outputs_config_step(data: &WorkflowData) -> Result<Step> {
    let config = handler_config_json(&data.safe_outputs)?;
    let dir = SAFE_OUTPUTS_CONFIG_FILE
        .rsplit_once('/')
        .map(|(d, _)| d)
        .unwrap_or(SAFE_OUTPUTS_CONFIG_FILE);
    Ok(Step::named("Write Safe Outputs Config").run(format!(
        "mkdir -p {dir}\ncat > {file} << '{eof}'\n{config}\n{eof}\n",
        dir = dir,
        file = SAFE_OUTPUTS_CONFIG_FILE,
        eof = heredoc_delimiter("SAFE_OUTPUTS_CONFIG", &config),
        config = config
    )))
}

fn safe_inputs_step(data: &WorkflowData) -> Result<Step> {
    let mut tools = Vec::new();
    let mut run = format!("mkdir -p {}\n", SAFE_INPUTS_DIR);
    for tool in data.safe_inputs.tools.values() {
        let file = tool.file_name();
        let input_schema = serde_json::to_value(Value::Mapping(tool.inputs.clone()))?;
        tools.push(json!({
            "name": tool.name,
            "description": tool.description,
            "inputSchema": input_schema,
            "handler": file,
        }));
        let body = match &tool.body {
            SafeInputBody::Run(s) | SafeInputBody::Script(s) => s.trim_end(),
        };
        run.push_str(&format!(
            "cat > {dir}/{file} << '{eof}'\n{body}\n{eof}\n",
            dir = SAFE_INPUTS_DIR,
            file = file,
            eof = heredoc_delimiter("SAFE_INPUTS", body),
            body = body
        ));
    }
    let manifest = serde_json::to_string_pretty(&json!({ "tools": tools }))?;
    run.push_str(&format!(
        "cat > {dir}/tools.json << '{eof}'\n{manifest}\n{eof}\n",
        dir = SAFE_INPUTS_DIR,
        eof = heredoc_delimiter("SAFE_INPUTS", &manifest),
        manifest = manifest
    ));
    Ok(Step::named("Setup Safe Inputs").run(run))
}

fn mcp_gateway_step(port: i64, ctx: &CompileContext) -> Result<Step> {
    Ok(Step::named("Start MCP gateway")
        .env("MCP_GATEWAY_PORT", port.to_string())
        .run(ctx.scripts.shell("start_mcp_gateway.sh", &[])?))
}

fn collect_output_step(
    engine: &dyn CodingAgentEngine,
    data: &WorkflowData,
    ctx: &CompileContext,
) -> Result<Step> {
    let (allowed, _) = domain_lists(engine, data);
    Ok(Step::named("Ingest agent output")
        .id(COLLECT_OUTPUT_STEP)
        .uses(pins::GITHUB_SCRIPT)
        .env("GH_AW_SAFE_OUTPUTS", SAFE_OUTPUTS_FILE)
        .env("GH_AW_ALLOWED_DOMAINS", allowed.join(","))
        .env("GH_AW_AGENT_OUTPUT_DIR", SAFE_OUTPUTS_DOWNLOAD_DIR)
        .with("script", ctx.scripts.github_script("collect_ndjson_output.cjs")?))
}

fn upload_steps(data: &WorkflowData, servers: &McpServers) -> Vec<Step> {
    let mut steps = Vec::new();
    if !data.safe_outputs.is_empty() {
        steps.push(
            Step::named("Upload agent output")
                .when("always()")
                .uses(pins::UPLOAD_ARTIFACT)
                .with("name", AGENT_OUTPUT_ARTIFACT)
                .with("path", format!("{}agent_output.json", SAFE_OUTPUTS_DOWNLOAD_DIR))
                .with("if-no-files-found", "warn"),
        );
    }
    let mut paths = vec![PROMPT_FILE, AW_INFO_FILE, AGENT_LOG_FILE];
    if !servers.is_empty() {
        paths.push(MCP_LOG_DIR);
    }
    if data.firewall_enabled() {
        paths.push(FIREWALL_LOG_DIR);
    }
    steps.push(
        Step::named("Upload agent artifacts")
            .when("always()")
            .continue_on_error()
            .uses(pins::UPLOAD_ARTIFACT)
            .with("name", AGENT_ARTIFACTS)
            .with("path", paths.join("\n"))
            .with("if-no-files-found", "ignore"),
    );
    steps
}

fn concurrency(data: &WorkflowData) -> Value {
    let mut m = Mapping::new();
    m.insert(
        "group".into(),
        format!("gh-aw-{}-${{{{ github.workflow }}}}", data.engine.kind.as_str()).into(),
    );
    Value::Mapping(m)
}

fn permissions(data: &WorkflowData) -> Permissions {
    if data.permissions.is_empty() {
        Permissions::from_pairs(&[(Scope::Contents, Level::Read)])
    } else {
        data.permissions.clone()
    }
}

/// Build the agent job
pub fn build_agent_job(
    data: &WorkflowData,
    servers: &McpServers,
    ctx: &CompileContext,
) -> Result<Job> {
    let engine = ctx.engines.get(data.engine.kind);
    let checkouts = CheckoutManager::new(&data.checkouts, data.checkout_disabled, ctx.trial.clone());
    let has_safe_outputs = !data.safe_outputs.is_empty();
    debug!(
        engine = engine.display_name(),
        servers = servers.servers.len(),
        "building agent job"
    );

    let runs_on = data.runs_on.clone().unwrap_or_else(|| DEFAULT_RUNNER.into());
    let timeout = data
        .timeout_minutes
        .and_then(|t| u32::try_from(t).ok())
        .unwrap_or(DEFAULT_TIMEOUT_MINUTES);
    let mut job = Job::new(AGENT_JOB, runs_on)
        .needs(ACTIVATION_JOB)
        .permissions(permissions(data))
        .timeout(timeout);
    job.concurrency = Some(concurrency(data));

    job.env = data.env.clone();
    if has_safe_outputs {
        job.env.insert("GH_AW_SAFE_OUTPUTS".to_string(), SAFE_OUTPUTS_FILE.to_string());
        job.env.insert(
            "GH_AW_SAFE_OUTPUTS_CONFIG_PATH".to_string(),
            SAFE_OUTPUTS_CONFIG_FILE.to_string(),
        );
        for key in ["output", "output_types", "has_patch"] {
            job = job.output(
                key,
                format!("${{{{ steps.{}.outputs.{} }}}}", COLLECT_OUTPUT_STEP, key),
            );
        }
    }
    if let Some(path) = checkouts.current_path() {
        job.env.insert("GH_AW_CURRENT_CHECKOUT_PATH".to_string(), path);
    }

    job.add_steps(setup_steps(ctx));
    job.add_steps(checkouts.steps());
    job.add_steps([Step::named("Create gh-aw temp directory")
        .run(ctx.scripts.shell("create_gh_aw_tmp_dir.sh", &[])?)]);
    if checkouts.has_default_checkout() {
        job.add_steps([configure_git_step()]);
    }

    let cache = data.tools.cache_memory();
    if let Some(cache) = cache {
        job.add_steps([cache_restore_step(cache)]);
    }
    let repo_memory = data.tools.repo_memory();
    if let Some(repo) = repo_memory {
        job.add_steps([repo_memory_clone_step(repo, ctx)?]);
    }

    job.add_steps(data.steps.iter().cloned().map(Step::raw));

    if let Some(github) = data.tools.github() {
        if let Some(app) = &github.app {
            job.add_steps([github_app_token_step(app)]);
        }
    }

    job.add_steps(install_steps(engine, data)?);
    job.add_steps([download_activation_step()]);
    if has_safe_outputs {
        job.add_steps([safe_outputs_config_step(data)?]);
    }
    if !data.safe_inputs.is_empty() {
        job.add_steps([safe_inputs_step(data)?]);
    }
    if let Some(port) = data.sandbox.mcp_port {
        job.add_steps([mcp_gateway_step(port, ctx)?]);
    }
    if let Some(step) = mcp_setup_step(engine, servers)? {
        job.add_steps([step]);
    }

    job.add_steps(execution_steps(engine, &EngineRun { data, servers }));

    if has_safe_outputs {
        job.add_steps([collect_output_step(engine, data, ctx)?]);
    }
    job.add_steps(upload_steps(data, servers));
    if let Some(cache) = cache {
        job.add_steps([cache_save_step(cache)]);
    }
    if let Some(repo) = repo_memory {
        job.add_steps([repo_memory_upload_step(repo)]);
    }

    Ok(job)
}
