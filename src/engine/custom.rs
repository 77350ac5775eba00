//! Custom engine: the user's `engine.steps` run the agent

use std::collections::BTreeMap;

use super::mcp::{render_json, JsonFlavor, McpServers};
use super::{CodingAgentEngine, EngineCapabilities, EngineRun};
use crate::ast::EngineKind;
use crate::error::Result;

const MCP_CONFIG_PATH: &str = "/tmp/gh-aw/mcp-config/mcp-servers.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomEngine;

impl CodingAgentEngine for CustomEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Custom
    }

    fn display_name(&self) -> &'static str {
        "Custom"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::custom()
    }

    fn mcp_config_path(&self) -> &'static str {
        MCP_CONFIG_PATH
    }

    fn render_mcp_config(&self, servers: &McpServers) -> Result<String> {
        render_json(servers, JsonFlavor::Claude)
    }

    /// Never invoked; custom steps replace the execution step
    fn command(&self, _run: &EngineRun<'_>) -> String {
        String::new()
    }

    fn env(&self, _run: &EngineRun<'_>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
