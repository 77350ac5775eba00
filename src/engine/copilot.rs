//! GitHub Copilot CLI

use std::collections::{BTreeMap, BTreeSet};

use super::mcp::{render_json, JsonFlavor, McpServers};
use super::{extra_args, model_flag, prompt_arg, CodingAgentEngine, EngineCapabilities, EngineRun};
use crate::ast::{BashTool, EngineKind, WorkflowData};
use crate::error::Result;
use crate::util::constants::TMP_ROOT;
use crate::util::shell_single_quote;

const MCP_CONFIG_PATH: &str = "/home/runner/.copilot/mcp-config.json";
const LOG_DIR: &str = "/tmp/gh-aw/sandbox/agent/logs/";

const API_DOMAINS: &[&str] = &[
    "api.business.githubcopilot.com",
    "api.enterprise.githubcopilot.com",
    "api.github.com",
    "api.githubcopilot.com",
    "api.individual.githubcopilot.com",
    "github.com",
    "host.docker.internal",
    "raw.githubusercontent.com",
    "registry.npmjs.org",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CopilotEngine;

/// `--allow-tool` flags, or `--allow-all-tools` when bash is unrestricted
fn tool_flags(data: &WorkflowData, servers: &McpServers) -> Vec<String> {
    let bash = data.tools.bash();
    if matches!(bash, BashTool::All) {
        return vec!["--allow-all-tools".to_string()];
    }
    let mut tools = BTreeSet::new();
    for cmd in bash.commands().unwrap_or_default() {
        tools.insert(format!("shell({})", cmd));
    }
    if data.tools.has_edit() {
        tools.insert("write".to_string());
    }
    for server in servers.iter() {
        if server.allows_all_tools() {
            tools.insert(server.name.clone());
        } else {
            for tool in &server.tools {
                tools.insert(format!("{}({})", server.name, tool));
            }
        }
    }
    let mut flags = Vec::new();
    for tool in tools {
        flags.push("--allow-tool".to_string());
        flags.push(shell_single_quote(&tool));
    }
    if data.tools.has_edit() {
        flags.push("--allow-all-paths".to_string());
    }
    flags
}

impl CodingAgentEngine for CopilotEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Copilot
    }

    fn display_name(&self) -> &'static str {
        "GitHub Copilot"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::copilot()
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@github/copilot")
    }

    fn default_version(&self) -> &'static str {
        "0.0.372"
    }

    fn secrets(&self) -> &'static [&'static str] {
        &["COPILOT_GITHUB_TOKEN"]
    }

    fn api_domains(&self) -> &'static [&'static str] {
        API_DOMAINS
    }

    fn mcp_config_path(&self) -> &'static str {
        MCP_CONFIG_PATH
    }

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String> {
        render_json(servers, JsonFlavor::Copilot)
    }

    fn command(&self, run: &EngineRun<'_>) -> String {
        let data = run.data;
        let mut parts = vec![
            "copilot".to_string(),
            format!("--add-dir {}/", TMP_ROOT),
            "--log-level all".to_string(),
            format!("--log-dir {}", LOG_DIR),
            "--add-dir \"${GITHUB_WORKSPACE}\"".to_string(),
            "--disable-builtin-mcps".to_string(),
        ];
        if let Some(agent) = data.agent_name() {
            parts.push(format!("--agent {}", shell_single_quote(&agent)));
        }
        parts.extend(model_flag(data));
        parts.extend(tool_flags(data, run.servers));
        parts.extend(extra_args(data));
        parts.push(format!("--prompt {}", prompt_arg()));
        parts.join(" ")
    }

    fn env(&self, _run: &EngineRun<'_>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            "COPILOT_GITHUB_TOKEN".to_string(),
            "${{ secrets.COPILOT_GITHUB_TOKEN }}".to_string(),
        );
        env.insert("XDG_CONFIG_HOME".to_string(), "/home/runner".to_string());
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

    fn command(text: &str) -> String {
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
        CopilotEngine.command(&EngineRun {
            data: &data,
            servers: &servers,
        })
    }

    #[test]
    fn unrestricted_bash_allows_all_tools() {
        let cmd = command("---\ntools:\n  bash: true\n---\nx");
        assert!(cmd.contains("--allow-all-tools"));
        assert!(!cmd.contains("--allow-tool "));
    }

    #[test]
    fn listed_commands_become_shell_tools() {
        let cmd = command("---\ntools:\n  bash: [ls, 'git status']\n  edit:\n---\nx");
        assert!(cmd.contains("--allow-tool 'shell(git status)'"));
        assert!(cmd.contains("--allow-tool 'shell(ls)'"));
        assert!(cmd.contains("--allow-tool 'write'"));
        assert!(cmd.contains("--allow-tool 'github'"));
    }

    #[test]
    fn restricted_server_tools_are_listed() {
        let cmd = command("---\ntools:\n  github:\n    allowed: [get_issue]\n---\nx");
        assert!(cmd.contains("--allow-tool 'github(get_issue)'"));
    }

    #[test]
    fn model_is_passed_as_flag() {
        let cmd = command("---\nengine:\n  id: copilot\n  model: gpt-5\n---\nx");
        assert!(cmd.contains("--model 'gpt-5'"));
        assert!(cmd.ends_with("--prompt \"$(cat /tmp/gh-aw/aw-prompts/prompt.txt)\""));
    }
}
