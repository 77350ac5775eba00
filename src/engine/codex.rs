//! OpenAI Codex CLI
//!
//! Codex reads `config.toml` from `$CODEX_HOME`, so the MCP config lands in
//! the shared config directory and `CODEX_HOME` points there.

use std::collections::BTreeMap;

use super::mcp::{render_toml, McpServers};
use super::{extra_args, prompt_arg, CodingAgentEngine, EngineCapabilities, EngineRun};
use crate::ast::EngineKind;
use crate::error::Result;
use crate::util::constants::MCP_CONFIG_DIR;
use crate::util::shell_single_quote;

const MCP_CONFIG_PATH: &str = "/tmp/gh-aw/mcp-config/config.toml";

const API_DOMAINS: &[&str] = &[
    "api.openai.com",
    "host.docker.internal",
    "openai.com",
    "registry.npmjs.org",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CodexEngine;

impl CodingAgentEngine for CodexEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Codex
    }

    fn display_name(&self) -> &'static str {
        "Codex"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::codex()
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@openai/codex")
    }

    fn default_version(&self) -> &'static str {
        "0.77.0"
    }

    fn secrets(&self) -> &'static [&'static str] {
        &["CODEX_API_KEY", "OPENAI_API_KEY"]
    }

    fn api_domains(&self) -> &'static [&'static str] {
        API_DOMAINS
    }

    fn mcp_config_path(&self) -> &'static str {
        MCP_CONFIG_PATH
    }

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String> {
        Ok(render_toml(servers))
    }

    fn command(&self, run: &EngineRun<'_>) -> String {
        let data = run.data;
        let mut parts = vec!["mkdir -p \"$CODEX_HOME/logs\" && codex".to_string()];
        if let Some(model) = &data.engine.model {
            parts.push(format!("-c model={}", shell_single_quote(model)));
        }
        parts.push("exec --full-auto --skip-git-repo-check".to_string());
        parts.extend(extra_args(data));
        parts.push(prompt_arg());
        parts.join(" ")
    }

    fn env(&self, _run: &EngineRun<'_>) -> BTreeMap<String, String> {
        let key = "${{ secrets.CODEX_API_KEY || secrets.OPENAI_API_KEY }}".to_string();
        let mut env = BTreeMap::new();
        env.insert("CODEX_API_KEY".to_string(), key.clone());
        env.insert("OPENAI_API_KEY".to_string(), key);
        env.insert("CODEX_HOME".to_string(), MCP_CONFIG_DIR.to_string());
        env.insert("RUST_LOG".to_string(), "info".to_string());
        env
    }
}
