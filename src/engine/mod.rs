//! # Engine Abstraction Layer
//!
//! Trait and implementations for the coding agents a workflow can run.
//!
//! ## Overview
//!
//! Every engine contributes the same pieces to the agent job:
//!
//! - install steps (Node + the engine's npm package, plus the sandbox)
//! - a secret validation step in the activation job
//! - an MCP configuration file in the engine's own format
//! - the `Execute <Engine> CLI` step, wrapped by the firewall when enabled
//!
//! ## Engine Trait
//!
//! ```rust,ignore
//! pub trait CodingAgentEngine: Send + Sync {
//!     fn kind(&self) -> EngineKind;
//!     fn capabilities(&self) -> EngineCapabilities;
//!     fn render_mcp_config(&self, servers: &McpServers) -> Result<String>;
//!     fn command(&self, run: &EngineRun<'_>) -> String;
//! }
//! ```
//!
//! ## Available Engines
//!
//! | Engine | CLI | MCP config |
//! |--------|-----|------------|
//! | `copilot` | `copilot` | JSON, `/home/runner/.copilot/mcp-config.json` |
//! | `claude` | `claude` | JSON, `--mcp-config` |
//! | `codex` | `codex exec` | TOML, `$CODEX_HOME/config.toml` |
//! | `gemini` | `gemini` | JSON, `~/.gemini/settings.json` |
//! | `custom` | user steps | JSON |
//!
//! ## Creating Engines
//!
//! ```rust
//! use gh_aw::ast::EngineKind;
//! use gh_aw::engine::create_engine;
//!
//! let engine = create_engine(EngineKind::Claude);
//! assert_eq!(engine.display_name(), "Claude Code");
//! ```

mod claude;
mod codex;
mod copilot;
mod custom;
pub mod firewall;
mod gemini;
pub mod mcp;

pub use claude::ClaudeEngine;
pub use codex::CodexEngine;
pub use copilot::CopilotEngine;
pub use custom::CustomEngine;
pub use gemini::GeminiEngine;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{EngineKind, SandboxAgent, WorkflowData};
use crate::compiler::CompileContext;
use crate::error::Result;
use crate::jobs::{pins, Step};
use crate::util::constants::{
    AGENT_LOG_FILE, MCP_CONFIG_DIR, NODE_VERSION, PROMPT_FILE, SAFE_OUTPUTS_FILE,
};
use crate::util::{heredoc_delimiter, shell_single_quote};

use firewall::Wrapper;
use mcp::McpServers;

/// Documentation linked from the secret validation failure message
const SECRETS_DOCS_URL: &str = "https://githubnext.github.io/gh-aw/reference/engines/";

/// Step id of the engine invocation
pub const EXECUTION_STEP_ID: &str = "agentic_execution";

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Features an engine may support
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// Built-in web fetch (no MCP server needed)
    pub native_web_fetch: bool,
    /// Honors `engine.max-turns`
    pub max_turns: bool,
    /// Runs custom agents from `.github/agents/`
    pub custom_agents: bool,
    /// Can run behind the firewall
    pub firewall: bool,
}

impl EngineCapabilities {
    pub fn copilot() -> Self {
        Self {
            native_web_fetch: false,
            max_turns: false,
            custom_agents: true,
            firewall: true,
        }
    }

    pub fn claude() -> Self {
        Self {
            native_web_fetch: true,
            max_turns: true,
            custom_agents: false,
            firewall: true,
        }
    }

    pub fn codex() -> Self {
        Self {
            native_web_fetch: false,
            max_turns: false,
            custom_agents: false,
            firewall: true,
        }
    }

    pub fn gemini() -> Self {
        Self::codex()
    }

    pub fn custom() -> Self {
        Self::default()
    }
}

// ============================================================================
// ENGINE TRAIT
// ============================================================================

/// Inputs of an engine invocation
#[derive(Debug, Clone, Copy)]
pub struct EngineRun<'a> {
    pub data: &'a WorkflowData,
    pub servers: &'a McpServers,
}

/// A coding agent the agent job can run
pub trait CodingAgentEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Human-readable name used in step names
    fn display_name(&self) -> &'static str;

    fn capabilities(&self) -> EngineCapabilities;

    /// npm package providing the CLI (`None` for custom)
    fn npm_package(&self) -> Option<&'static str> {
        None
    }

    fn default_version(&self) -> &'static str {
        "latest"
    }

    /// Secrets of which at least one must be set
    fn secrets(&self) -> &'static [&'static str] {
        &[]
    }

    /// Domains the engine itself needs, added to the allow-list
    fn api_domains(&self) -> &'static [&'static str] {
        &[]
    }

    /// Where the MCP config is written
    fn mcp_config_path(&self) -> &'static str;

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String>;

    /// Extra shell run after the config is written
    fn mcp_config_post(&self) -> Option<&'static str> {
        None
    }

    /// Unwrapped command line
    fn command(&self, run: &EngineRun<'_>) -> String;

    /// Engine-specific env of the execution step
    fn env(&self, run: &EngineRun<'_>) -> BTreeMap<String, String>;
}

/// Create the engine for a kind
pub fn create_engine(kind: EngineKind) -> Box<dyn CodingAgentEngine> {
    match kind {
        EngineKind::Copilot => Box::new(CopilotEngine),
        EngineKind::Claude => Box::new(ClaudeEngine),
        EngineKind::Codex => Box::new(CodexEngine),
        EngineKind::Gemini => Box::new(GeminiEngine),
        EngineKind::Custom => Box::new(CustomEngine),
    }
}

/// Engines by kind, shared through the compile context
#[derive(Clone)]
pub struct EngineRegistry {
    /// Indexed by `EngineKind as usize` (same order as `EngineKind::ALL`)
    engines: Arc<Vec<Box<dyn CodingAgentEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let engines = EngineKind::ALL.iter().map(|kind| create_engine(*kind)).collect();
        Self {
            engines: Arc::new(engines),
        }
    }

    pub fn get(&self, kind: EngineKind) -> &dyn CodingAgentEngine {
        self.engines[kind as usize].as_ref()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.engines.iter().map(|e| e.kind().as_str()).collect();
        f.debug_struct("EngineRegistry").field("engines", &kinds).finish()
    }
}

// ============================================================================
// SHARED STEP BUILDERS
// ============================================================================

/// Final domain lists (allowed, blocked) for a workflow
pub fn domain_lists(engine: &dyn CodingAgentEngine, data: &WorkflowData) -> (Vec<String>, Vec<String>) {
    (
        data.network.expand_allowed(engine.api_domains()),
        data.network.expand_blocked(),
    )
}

/// `--model` style flag, shared by the engines that take one
pub(crate) fn model_flag(data: &WorkflowData) -> Option<String> {
    data.engine
        .model
        .as_ref()
        .map(|m| format!("--model {}", shell_single_quote(m)))
}

/// User `engine.args`, quoted
pub(crate) fn extra_args(data: &WorkflowData) -> Vec<String> {
    data.engine.args.iter().map(|a| shell_single_quote(a)).collect()
}

/// `"$(cat <prompt>)"`
pub(crate) fn prompt_arg() -> String {
    format!("\"$(cat {})\"", PROMPT_FILE)
}

/// Node setup + CLI install + sandbox install
pub fn install_steps(engine: &dyn CodingAgentEngine, data: &WorkflowData) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let Some(package) = engine.npm_package() else {
        return Ok(steps);
    };
    steps.push(
        Step::named("Setup Node.js")
            .uses(pins::SETUP_NODE)
            .with("node-version", NODE_VERSION)
            .with("package-manager-cache", false),
    );
    let version = data
        .engine
        .version
        .as_deref()
        .unwrap_or_else(|| engine.default_version());
    steps.push(
        Step::named(format!("Install {} CLI", engine.display_name()))
            .run(format!("npm install -g --silent {}@{}", package, version)),
    );
    match Wrapper::for_workflow(data) {
        Wrapper::Awf => steps.push(firewall::install_awf_step(data)),
        Wrapper::Srt => {
            let (allowed, blocked) = domain_lists(engine, data);
            steps.push(firewall::install_srt_step(&allowed, &blocked)?);
        }
        Wrapper::None => {}
    }
    Ok(steps)
}

/// Secret check run by the activation job (none for custom engines)
pub fn validate_secret_step(engine: &dyn CodingAgentEngine, ctx: &CompileContext) -> Result<Option<Step>> {
    let secrets = engine.secrets();
    if secrets.is_empty() {
        return Ok(None);
    }
    let mut args: Vec<String> = secrets.iter().map(|s| s.to_string()).collect();
    args.push(shell_single_quote(engine.display_name()));
    args.push(SECRETS_DOCS_URL.to_string());
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let run = ctx.scripts.shell("validate_multi_secret.sh", &arg_refs)?;

    let mut step = Step::named(format!("Validate {} secret", secrets.join(" or ")))
        .id("validate-secret")
        .run(run);
    for secret in secrets {
        step = step.env(*secret, format!("${{{{ secrets.{} }}}}", secret));
    }
    Ok(Some(step))
}

/// Writes the engine's MCP config (skipped for an empty server set)
pub fn mcp_setup_step(engine: &dyn CodingAgentEngine, servers: &McpServers) -> Result<Option<Step>> {
    if servers.is_empty() {
        return Ok(None);
    }
    let path = engine.mcp_config_path();
    let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or(MCP_CONFIG_DIR);
    let content = engine.render_mcp_config(servers)?;
    let mut run = format!(
        "mkdir -p {dir}\ncat > {path} << '{eof}'\n{content}\n{eof}\n",
        dir = dir,
        path = path,
        eof = heredoc_delimiter("MCP_CONFIG", &content),
        content = content
    );
    if let Some(post) = engine.mcp_config_post() {
        run.push_str(post);
        run.push('\n');
    }
    Ok(Some(Step::named("Setup MCPs").run(run)))
}

fn base_env(engine: &dyn CodingAgentEngine, run: &EngineRun<'_>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("GH_AW_PROMPT".to_string(), PROMPT_FILE.to_string());
    env.insert("GITHUB_WORKSPACE".to_string(), "${{ github.workspace }}".to_string());
    if !run.servers.is_empty() {
        env.insert("GH_AW_MCP_CONFIG".to_string(), engine.mcp_config_path().to_string());
    }
    if !run.data.safe_outputs.is_empty() {
        env.insert("GH_AW_SAFE_OUTPUTS".to_string(), SAFE_OUTPUTS_FILE.to_string());
    }
    env
}

/// Steps that run the agent
///
/// Custom engines contribute the user's steps verbatim. Every other engine
/// gets one `Execute <Engine> CLI` step teeing output to the agent log.
pub fn execution_steps(engine: &dyn CodingAgentEngine, run: &EngineRun<'_>) -> Vec<Step> {
    let data = run.data;
    if engine.kind() == EngineKind::Custom {
        return data.engine.steps.iter().cloned().map(Step::raw).collect();
    }

    let (allowed, blocked) = domain_lists(engine, data);
    let command = firewall::wrap_command(&engine.command(run), data, &allowed, &blocked);
    let script = format!(
        "set -o pipefail\n{} \\\n  2>&1 | tee {}\n",
        command, AGENT_LOG_FILE
    );

    let mut env = base_env(engine, run);
    env.extend(engine.env(run));
    env.extend(data.engine.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    if data.sandbox.agent == SandboxAgent::Srt {
        env.insert("GH_AW_SANDBOX".to_string(), "srt".to_string());
    }

    vec![Step::named(format!("Execute {} CLI", engine.display_name()))
        .id(EXECUTION_STEP_ID)
        .envs(env)
        .run(script)]
}
