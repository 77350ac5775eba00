//! Google Gemini CLI

use std::collections::BTreeMap;

use super::mcp::{render_json, JsonFlavor, McpServers};
use super::{extra_args, model_flag, prompt_arg, CodingAgentEngine, EngineCapabilities, EngineRun};
use crate::ast::EngineKind;
use crate::error::Result;

const MCP_CONFIG_PATH: &str = "/tmp/gh-aw/mcp-config/settings.json";

const API_DOMAINS: &[&str] = &[
    "generativelanguage.googleapis.com",
    "host.docker.internal",
    "oauth2.googleapis.com",
    "registry.npmjs.org",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiEngine;

impl CodingAgentEngine for GeminiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gemini
    }

    fn display_name(&self) -> &'static str {
        "Gemini"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::gemini()
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@google/gemini-cli")
    }

    fn default_version(&self) -> &'static str {
        "0.22.5"
    }

    fn secrets(&self) -> &'static [&'static str] {
        &["GEMINI_API_KEY"]
    }

    fn api_domains(&self) -> &'static [&'static str] {
        API_DOMAINS
    }

    fn mcp_config_path(&self) -> &'static str {
        MCP_CONFIG_PATH
    }

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String> {
        render_json(servers, JsonFlavor::Gemini)
    }

    fn mcp_config_post(&self) -> Option<&'static str> {
        Some("mkdir -p ~/.gemini && cp /tmp/gh-aw/mcp-config/settings.json ~/.gemini/settings.json")
    }

    fn command(&self, run: &EngineRun<'_>) -> String {
        let data = run.data;
        let mut parts = vec!["gemini".to_string()];
        parts.extend(model_flag(data));
        parts.push("--yolo --output-format stream-json".to_string());
        parts.extend(extra_args(data));
        parts.push(format!("--prompt {}", prompt_arg()));
        parts.join(" ")
    }

    fn env(&self, _run: &EngineRun<'_>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            "GEMINI_API_KEY".to_string(),
            "${{ secrets.GEMINI_API_KEY }}".to_string(),
        );
        env
    }
}
