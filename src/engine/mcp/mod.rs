//! MCP server collection
//!
//! Builds the ordered set of MCP servers the agent sees, independent of the
//! engine's config format:
//!
//! 1. `github` (unless `github: false`)
//! 2. `tools.*` in declaration order
//! 3. `mcp-servers.*`
//! 4. tools contributed by imports
//! 5. `safe-outputs`, `safeinputs`, `agentic-workflows`
//!
//! Env vars of user-declared servers pass through a secret filter: a value
//! referencing `${{ secrets.NAME }}` survives only when `NAME` (or the env
//! key) is in the server's `secrets:` list or the built-in allow-list.

mod render;

use std::collections::BTreeMap;

use tracing::warn;

use super::create_engine;
use crate::ast::{
    GitHubMode, GitHubTool, GuardRepos, McpServerConfig, McpTransport, ToolConfig,
    WorkflowData,
};
use crate::util::constants::{
    CACHE_MEMORY_DIR, GITHUB_MCP_SERVER_VERSION, MCP_LOG_DIR, SAFE_OUTPUTS_CONFIG_FILE,
    SAFE_OUTPUTS_FILE,
};
use crate::util::{secret_refs, OrderedMap};

pub use render::{render_json, render_toml, JsonFlavor};

/// Secrets every server may receive
pub const ALWAYS_ALLOWED_SECRETS: &[&str] =
    &["GITHUB_TOKEN", "GH_AW_GITHUB_TOKEN", "GH_AW_GITHUB_MCP_SERVER_TOKEN"];

pub const GITHUB_SERVER: &str = "github";
pub const SAFE_OUTPUTS_SERVER: &str = "safe-outputs";
pub const SAFE_INPUTS_SERVER: &str = "safeinputs";
pub const AGENTIC_WORKFLOWS_SERVER: &str = "agentic-workflows";

const GITHUB_MCP_IMAGE: &str = "ghcr.io/github/github-mcp-server";
const GITHUB_REMOTE_URL: &str = "https://api.githubcopilot.com/mcp/";
const GITHUB_MCP_TOKEN_EXPR: &str =
    "${{ secrets.GH_AW_GITHUB_MCP_SERVER_TOKEN || secrets.GH_AW_GITHUB_TOKEN || secrets.GITHUB_TOKEN }}";
/// Step minting a token for `tools.github.app`
pub const GITHUB_MCP_APP_TOKEN_STEP: &str = "github-mcp-app-token";
const PLAYWRIGHT_IMAGE: &str = "mcr.microsoft.com/playwright/mcp";
const SERENA_IMAGE: &str = "ghcr.io/oraios/serena:latest";

/// How a server is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpLaunch {
    Local { command: String, args: Vec<String> },
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// One server in the final configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerEntry {
    pub name: String,
    pub launch: McpLaunch,
    pub env: BTreeMap<String, String>,
    /// Allowed tools, `["*"]` for all
    pub tools: Vec<String>,
}

impl McpServerEntry {
    fn local(name: &str, command: &str, args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            launch: McpLaunch::Local {
                command: command.to_string(),
                args,
            },
            env: BTreeMap::new(),
            tools: vec!["*".to_string()],
        }
    }

    fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn allows_all_tools(&self) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == "*")
    }

    pub fn is_http(&self) -> bool {
        matches!(self.launch, McpLaunch::Http { .. })
    }
}

/// Ordered server set plus the warnings produced while building it
#[derive(Debug, Clone, Default)]
pub struct McpServers {
    pub servers: OrderedMap<String, McpServerEntry>,
    pub warnings: Vec<String>,
}

impl McpServers {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &McpServerEntry> {
        self.servers.values()
    }

    fn push(&mut self, entry: McpServerEntry) {
        self.servers.insert_if_absent(entry.name.clone(), entry);
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Token expression for the GitHub MCP server
pub fn github_tool_token(tool: &GitHubTool) -> String {
    if tool.app.is_some() {
        format!("${{{{ steps.{}.outputs.token }}}}", GITHUB_MCP_APP_TOKEN_STEP)
    } else {
        tool.github_token
            .clone()
            .unwrap_or_else(|| GITHUB_MCP_TOKEN_EXPR.to_string())
    }
}

fn guard_env(tool: &GitHubTool) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    match &tool.repos {
        Some(GuardRepos::All) => {
            env.insert("GITHUB_GUARD_REPOS".to_string(), "all".to_string());
        }
        Some(GuardRepos::Public) => {
            env.insert("GITHUB_GUARD_REPOS".to_string(), "public".to_string());
        }
        Some(GuardRepos::Patterns(p)) => {
            env.insert("GITHUB_GUARD_REPOS".to_string(), p.join(","));
        }
        Some(GuardRepos::Invalid(_)) | None => {}
    }
    if let Some(level) = &tool.min_integrity {
        env.insert("GITHUB_MIN_INTEGRITY".to_string(), level.clone());
    }
    env
}

fn github_entry(tool: &GitHubTool) -> McpServerEntry {
    let token = github_tool_token(tool);
    let guard = guard_env(tool);
    let tools = if tool.allowed.is_empty() {
        vec!["*".to_string()]
    } else {
        tool.allowed.clone()
    };
    match tool.mode {
        GitHubMode::Local => {
            let mut args = strings(&["run", "-i", "--rm", "-e", "GITHUB_PERSONAL_ACCESS_TOKEN", "-e", "GITHUB_TOOLSETS"]);
            if tool.read_only {
                args.extend(strings(&["-e", "GITHUB_READ_ONLY"]));
            }
            for key in guard.keys() {
                args.push("-e".to_string());
                args.push(key.clone());
            }
            let version = tool.version.as_deref().unwrap_or(GITHUB_MCP_SERVER_VERSION);
            args.push(format!("{}:{}", GITHUB_MCP_IMAGE, version));

            let mut entry = McpServerEntry::local(GITHUB_SERVER, "docker", args)
                .env("GITHUB_PERSONAL_ACCESS_TOKEN", token)
                .env("GITHUB_TOOLSETS", tool.toolsets.join(","));
            if tool.read_only {
                entry = entry.env("GITHUB_READ_ONLY", "1");
            }
            entry.env.extend(guard);
            entry.tools = tools;
            entry
        }
        GitHubMode::Remote => {
            let mut headers = BTreeMap::new();
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            headers.insert("X-MCP-Toolsets".to_string(), tool.toolsets.join(","));
            if tool.read_only {
                headers.insert("X-MCP-Readonly".to_string(), "true".to_string());
            }
            McpServerEntry {
                name: GITHUB_SERVER.to_string(),
                launch: McpLaunch::Http {
                    url: GITHUB_REMOTE_URL.to_string(),
                    headers,
                },
                env: guard,
                tools,
            }
        }
    }
}

/// Drop env vars referencing secrets the server was not granted
pub fn filter_secrets(
    server: &str,
    env: &BTreeMap<String, String>,
    granted: &[String],
    warnings: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let allowed = |name: &str| {
        ALWAYS_ALLOWED_SECRETS.contains(&name) || granted.iter().any(|g| g == name)
    };
    let mut out = BTreeMap::new();
    for (key, value) in env {
        let refs = secret_refs(value);
        if refs.is_empty() || allowed(key) || refs.iter().all(|r| allowed(r)) {
            out.insert(key.clone(), value.clone());
            continue;
        }
        let denied: Vec<&str> = refs.iter().map(String::as_str).filter(|r| !allowed(r)).collect();
        let message = format!(
            "MCP server '{}': dropped env var {} (references secret {} not listed in 'secrets')",
            server,
            key,
            denied.join(", ")
        );
        warn!("{}", message);
        warnings.push(message);
    }
    out
}

fn user_entry(config: &McpServerConfig, warnings: &mut Vec<String>) -> McpServerEntry {
    let env = filter_secrets(&config.name, &config.env, &config.secrets, warnings);
    let launch = match &config.transport {
        McpTransport::Stdio { command, args } => McpLaunch::Local {
            command: command.clone(),
            args: args.clone(),
        },
        McpTransport::Container {
            image,
            version,
            entrypoint_args,
            mounts,
            args: extra,
        } => {
            let mut args = strings(&["run", "--rm", "-i"]);
            for key in env.keys() {
                args.push("-e".to_string());
                args.push(key.clone());
            }
            for mount in mounts {
                args.push("-v".to_string());
                args.push(mount.clone());
            }
            args.extend(extra.iter().cloned());
            match version {
                Some(v) => args.push(format!("{}:{}", image, v)),
                None => args.push(image.clone()),
            }
            args.extend(entrypoint_args.iter().cloned());
            McpLaunch::Local {
                command: "docker".to_string(),
                args,
            }
        }
        McpTransport::Http { url, headers } => McpLaunch::Http {
            url: url.clone(),
            headers: headers.clone(),
        },
    };
    let tools = if config.allowed.is_empty() {
        vec!["*".to_string()]
    } else {
        config.allowed.clone()
    };
    McpServerEntry {
        name: config.name.clone(),
        launch,
        env,
        tools,
    }
}

/// Server for a `tools:` entry; `None` for tools that are not MCP servers
fn tool_entry(
    name: &str,
    tool: &ToolConfig,
    native_web_fetch: bool,
    warnings: &mut Vec<String>,
) -> Option<McpServerEntry> {
    match tool {
        ToolConfig::Playwright(p) => {
            let image = match &p.version {
                Some(v) => format!("{}:{}", PLAYWRIGHT_IMAGE, v),
                None => PLAYWRIGHT_IMAGE.to_string(),
            };
            let mut args = strings(&["run", "-i", "--rm", "--init", "--network", "host"]);
            args.push(image);
            args.push("--output-dir".to_string());
            args.push(format!("{}playwright", MCP_LOG_DIR));
            args.push("--allowed-hosts".to_string());
            args.push(p.allowed_domains.join(","));
            Some(McpServerEntry::local(name, "docker", args))
        }
        ToolConfig::Serena(_) => Some(McpServerEntry::local(
            name,
            "docker",
            strings(&[
                "run",
                "--rm",
                "-i",
                "-v",
                "${GITHUB_WORKSPACE}:${GITHUB_WORKSPACE}",
                SERENA_IMAGE,
                "serena",
                "start-mcp-server",
                "--context",
                "codex",
                "--project",
                "${GITHUB_WORKSPACE}",
            ]),
        )),
        ToolConfig::CacheMemory(_) => Some(McpServerEntry::local(
            name,
            "npx",
            strings(&["-y", "@modelcontextprotocol/server-filesystem", CACHE_MEMORY_DIR]),
        )),
        ToolConfig::WebFetch if !native_web_fetch => Some(McpServerEntry::local(
            name,
            "docker",
            strings(&["run", "-i", "--rm", "mcp/fetch"]),
        )),
        ToolConfig::Mcp(config) => Some(user_entry(config, warnings)),
        _ => None,
    }
}

/// Collect every server for a workflow
pub fn collect_mcp_servers(data: &WorkflowData) -> McpServers {
    let mut out = McpServers::default();
    let native_web_fetch = create_engine(data.engine.kind)
        .capabilities()
        .native_web_fetch;

    if let Some(github) = data.tools.github() {
        out.push(github_entry(&github));
    }

    let mut warnings = Vec::new();
    let (main, imported): (Vec<_>, Vec<_>) = data
        .tools
        .entries()
        .partition(|(name, _)| !data.imported_tools.contains(name));
    for (name, tool) in main {
        if let Some(entry) = tool_entry(name, tool, native_web_fetch, &mut warnings) {
            out.push(entry);
        }
    }
    for config in data.mcp_servers.values() {
        out.push(user_entry(config, &mut warnings));
    }
    for (name, tool) in imported {
        if let Some(entry) = tool_entry(name, tool, native_web_fetch, &mut warnings) {
            out.push(entry);
        }
    }

    if !data.safe_outputs.is_empty() {
        out.push(
            McpServerEntry::local(
                SAFE_OUTPUTS_SERVER,
                "node",
                strings(&["/opt/gh-aw/safeoutputs/mcp-server.cjs"]),
            )
            .env("GH_AW_SAFE_OUTPUTS", SAFE_OUTPUTS_FILE)
            .env("GH_AW_SAFE_OUTPUTS_CONFIG_PATH", SAFE_OUTPUTS_CONFIG_FILE),
        );
    }
    if !data.safe_inputs.is_empty() {
        let mut entry = McpServerEntry::local(
            SAFE_INPUTS_SERVER,
            "node",
            strings(&["/opt/gh-aw/safe-inputs/mcp-server.cjs"]),
        );
        entry.env = data.safe_inputs.env();
        out.push(entry);
    }
    if matches!(data.tools.get(AGENTIC_WORKFLOWS_SERVER), Some(ToolConfig::AgenticWorkflows)) {
        out.push(
            McpServerEntry::local(AGENTIC_WORKFLOWS_SERVER, "gh", strings(&["aw", "mcp-server"]))
                .env("GITHUB_TOKEN", "${{ secrets.GITHUB_TOKEN }}"),
        );
    }

    out.warnings = warnings;
    out
}
