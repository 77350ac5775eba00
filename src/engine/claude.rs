//! Claude Code CLI

use std::collections::{BTreeMap, BTreeSet};

use super::mcp::{render_json, JsonFlavor, McpServers};
use super::{extra_args, model_flag, prompt_arg, CodingAgentEngine, EngineCapabilities, EngineRun};
use crate::ast::{EngineKind, WorkflowData};
use crate::error::Result;
use crate::util::shell_single_quote;

const MCP_CONFIG_PATH: &str = "/tmp/gh-aw/mcp-config/mcp-servers.json";

const API_DOMAINS: &[&str] = &[
    "anthropic.com",
    "api.anthropic.com",
    "host.docker.internal",
    "registry.npmjs.org",
    "sentry.io",
    "statsig.anthropic.com",
];

/// Read-only tools always granted
const READ_TOOLS: &[&str] = &["Glob", "Grep", "LS", "NotebookRead", "Read", "Task", "TodoWrite"];
const EDIT_TOOLS: &[&str] = &["Edit", "MultiEdit", "NotebookEdit", "Write"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeEngine;

/// Sorted `--allowed-tools` entries
pub(crate) fn allowed_tools(data: &WorkflowData, servers: &McpServers) -> Vec<String> {
    let mut tools: BTreeSet<String> = READ_TOOLS.iter().map(|t| t.to_string()).collect();
    match data.tools.bash().commands() {
        None => {
            tools.insert("Bash".to_string());
        }
        Some(cmds) => {
            for cmd in cmds {
                tools.insert(format!("Bash({})", cmd));
            }
        }
    }
    if data.tools.has_edit() {
        tools.extend(EDIT_TOOLS.iter().map(|t| t.to_string()));
    }
    if data.tools.has_web_fetch() {
        tools.insert("WebFetch".to_string());
    }
    if data.tools.has_web_search() {
        tools.insert("WebSearch".to_string());
    }
    for server in servers.iter() {
        if server.allows_all_tools() {
            tools.insert(format!("mcp__{}", server.name));
        } else {
            for tool in &server.tools {
                tools.insert(format!("mcp__{}__{}", server.name, tool));
            }
        }
    }
    tools.into_iter().collect()
}

impl CodingAgentEngine for ClaudeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Claude
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::claude()
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@anthropic-ai/claude-code")
    }

    fn default_version(&self) -> &'static str {
        "2.0.76"
    }

    fn secrets(&self) -> &'static [&'static str] {
        &["CLAUDE_CODE_OAUTH_TOKEN", "ANTHROPIC_API_KEY"]
    }

    fn api_domains(&self) -> &'static [&'static str] {
        API_DOMAINS
    }

    fn mcp_config_path(&self) -> &'static str {
        MCP_CONFIG_PATH
    }

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String> {
        render_json(servers, JsonFlavor::Claude)
    }

    fn command(&self, run: &EngineRun<'_>) -> String {
        let data = run.data;
        let mut parts = vec![
            "claude".to_string(),
            "--print".to_string(),
            "--disable-slash-commands".to_string(),
            "--no-chrome".to_string(),
        ];
        parts.extend(model_flag(data));
        if let Some(turns) = &data.engine.max_turns {
            parts.push(format!("--max-turns {}", turns));
        }
        if !run.servers.is_empty() {
            parts.push(format!("--mcp-config {}", MCP_CONFIG_PATH));
        }
        let tools = allowed_tools(data, run.servers);
        parts.push(format!("--allowed-tools {}", shell_single_quote(&tools.join(","))));
        parts.push("--debug --verbose".to_string());
        parts.push("--permission-mode bypassPermissions".to_string());
        parts.push("--output-format stream-json".to_string());
        parts.extend(extra_args(data));
        parts.push(prompt_arg());
        parts.join(" ")
    }

    fn env(&self, run: &EngineRun<'_>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for secret in self.secrets() {
            env.insert(secret.to_string(), format!("${{{{ secrets.{} }}}}", secret));
        }
        env.insert("BASH_DEFAULT_TIMEOUT_MS".to_string(), "60000".to_string());
        env.insert("DISABLE_BUG_COMMAND".to_string(), "1".to_string());
        env.insert("DISABLE_ERROR_REPORTING".to_string(), "1".to_string());
        env.insert("DISABLE_TELEMETRY".to_string(), "1".to_string());
        env.insert("MCP_TIMEOUT".to_string(), "120000".to_string());
        env.insert("MCP_TOOL_TIMEOUT".to_string(), "60000".to_string());
        if let Some(turns) = &run.data.engine.max_turns {
            env.insert("GH_AW_MAX_TURNS".to_string(), turns.clone());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileContext;
    use crate::engine::mcp::collect_mcp_servers;
    use crate::frontmatter;
    use crate::imports::ResolvedImports;
    use std::path::Path;

    fn build(text: &str) -> (WorkflowData, McpServers) {
        let path = "/repo/.github/workflows/w.md";
        let parsed = frontmatter::parse(text, path).unwrap();
        let data = WorkflowData::build(
            Path::new(path),
            &parsed,
            ResolvedImports::default(),
            &CompileContext::for_tests(),
        )
        .unwrap();
        let servers = collect_mcp_servers(&data);
        (data, servers)
    }

    #[test]
    fn default_bash_commands_are_listed() {
        let (d, s) = build("---\nengine: claude\n---\nx");
        let tools = allowed_tools(&d, &s);
        assert!(tools.contains(&"Bash(ls)".to_string()));
        assert!(!tools.contains(&"Bash".to_string()));
        assert!(tools.contains(&"mcp__github".to_string()));
        assert!(tools.contains(&"Read".to_string()));
    }

    #[test]
    fn unrestricted_bash_and_edit() {
        let (d, s) = build("---\nengine: claude\ntools:\n  bash: true\n  edit:\n  web-fetch:\n---\nx");
        let tools = allowed_tools(&d, &s);
        assert!(tools.contains(&"Bash".to_string()));
        assert!(tools.contains(&"MultiEdit".to_string()));
        assert!(tools.contains(&"WebFetch".to_string()));
        let mut sorted = tools.clone();
        sorted.sort();
        assert_eq!(tools, sorted);
    }

    #[test]
    fn restricted_mcp_tools_use_double_underscore() {
        let (d, s) = build("---\nengine: claude\ntools:\n  github:\n    allowed: [get_issue, list_issues]\n---\nx");
        let tools = allowed_tools(&d, &s);
        assert!(tools.contains(&"mcp__github__get_issue".to_string()));
        assert!(tools.contains(&"mcp__github__list_issues".to_string()));
    }

    #[test]
    fn command_carries_turns_and_model() {
        let (d, s) = build("---\nengine:\n  id: claude\n  model: sonnet\n  max-turns: 5\n---\nx");
        let run = EngineRun { data: &d, servers: &s };
        let cmd = ClaudeEngine.command(&run);
        assert!(cmd.starts_with("claude --print"));
        assert!(cmd.contains("--model 'sonnet'"));
        assert!(cmd.contains("--max-turns 5"));
        assert!(cmd.contains("--mcp-config /tmp/gh-aw/mcp-config/mcp-servers.json"));
        assert_eq!(ClaudeEngine.env(&run)["GH_AW_MAX_TURNS"], "5");
    }
}
