//! Engine-specific MCP config rendering
//!
//! - JSON (`mcpServers` object) for Copilot, Claude, Gemini and custom engines
//! - TOML for Codex, with history persistence disabled

use std::fmt::Write as _;

use serde_json::{json, Map, Value as JsonValue};

use super::{McpLaunch, McpServerEntry, McpServers};
use crate::error::{AwError, Result};

/// JSON dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFlavor {
    /// `type: local|http` plus a `tools` list on every server
    Copilot,
    /// Claude Code / generic `mcpServers`
    Claude,
    /// Gemini CLI `settings.json` (`httpUrl` for remote servers)
    Gemini,
}

fn string_map(map: &std::collections::BTreeMap<String, String>) -> JsonValue {
    JsonValue::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect(),
    )
}

fn json_entry(entry: &McpServerEntry, flavor: JsonFlavor) -> JsonValue {
    let mut obj = Map::new();
    match &entry.launch {
        McpLaunch::Local { command, args } => {
            if flavor == JsonFlavor::Copilot {
                obj.insert("type".into(), json!("local"));
            }
            obj.insert("command".into(), json!(command));
            obj.insert("args".into(), json!(args));
        }
        McpLaunch::Http { url, headers } => {
            match flavor {
                JsonFlavor::Gemini => {
                    obj.insert("httpUrl".into(), json!(url));
                }
                JsonFlavor::Copilot | JsonFlavor::Claude => {
                    obj.insert("type".into(), json!("http"));
                    obj.insert("url".into(), json!(url));
                }
            }
            if !headers.is_empty() {
                obj.insert("headers".into(), string_map(headers));
            }
        }
    }
    if !entry.env.is_empty() {
        obj.insert("env".into(), string_map(&entry.env));
    }
    if flavor == JsonFlavor::Copilot {
        obj.insert("tools".into(), json!(entry.tools));
    }
    JsonValue::Object(obj)
}

/// Render `{"mcpServers": {...}}` pretty-printed, servers in collection order
pub fn render_json(servers: &McpServers, flavor: JsonFlavor) -> Result<String> {
    let mut map = Map::new();
    for entry in servers.iter() {
        map.insert(entry.name.clone(), json_entry(entry, flavor));
    }
    let doc = json!({ "mcpServers": JsonValue::Object(map) });
    serde_json::to_string_pretty(&doc).map_err(|e| AwError::Emit {
        reason: format!("MCP config serialization failed: {}", e),
    })
}

fn toml_str(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

fn toml_array(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let mut out = String::from("[\n");
    for item in items {
        let _ = writeln!(out, "  {},", toml_str(item));
    }
    out.push(']');
    out
}

fn toml_table(out: &mut String, header: &str, map: &std::collections::BTreeMap<String, String>) {
    if map.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n[{}]", header);
    for (k, v) in map {
        let _ = writeln!(out, "{} = {}", toml_str(k), toml_str(v));
    }
}

/// Render the Codex `config.toml`
pub fn render_toml(servers: &McpServers) -> String {
    let mut out = String::from("[history]\npersistence = \"none\"\n");
    for entry in servers.iter() {
        let header = format!("mcp_servers.{}", toml_str(&entry.name));
        let _ = writeln!(out, "\n[{}]", header);
        match &entry.launch {
            McpLaunch::Local { command, args } => {
                let _ = writeln!(out, "command = {}", toml_str(command));
                let _ = writeln!(out, "args = {}", toml_array(args));
            }
            McpLaunch::Http { url, .. } => {
                let _ = writeln!(out, "url = {}", toml_str(url));
            }
        }
        if !entry.allows_all_tools() {
            let _ = writeln!(out, "enabled_tools = {}", toml_array(&entry.tools));
        }
        if let McpLaunch::Http { headers, .. } = &entry.launch {
            toml_table(&mut out, &format!("{}.http_headers", header), headers);
        }
        toml_table(&mut out, &format!("{}.env", header), &entry.env);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn servers() -> McpServers {
        let mut s = McpServers::default();
        let mut env = BTreeMap::new();
        env.insert("TOKEN".to_string(), "${{ secrets.GITHUB_TOKEN }}".to_string());
        s.push(McpServerEntry {
            name: "github".into(),
            launch: McpLaunch::Local {
                command: "docker".into(),
                args: vec!["run".into(), "-i".into()],
            },
            env,
            tools: vec!["*".into()],
        });
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer x".to_string());
        s.push(McpServerEntry {
            name: "docs".into(),
            launch: McpLaunch::Http {
                url: "https://docs.example.com/mcp".into(),
                headers,
            },
            env: BTreeMap::new(),
            tools: vec!["search".into()],
        });
        s
    }

    #[test]
    fn copilot_json_has_types_and_tools() {
        let out = render_json(&servers(), JsonFlavor::Copilot).unwrap();
        let v: JsonValue = serde_json::from_str(&out).unwrap();
        assert_eq!(v["mcpServers"]["github"]["type"], "local");
        assert_eq!(v["mcpServers"]["github"]["tools"], json!(["*"]));
        assert_eq!(v["mcpServers"]["docs"]["type"], "http");
        assert_eq!(v["mcpServers"]["docs"]["tools"], json!(["search"]));
        // collection order is preserved
        assert!(out.find("\"github\"").unwrap() < out.find("\"docs\"").unwrap());
    }

    #[test]
    fn claude_json_omits_local_type_and_tools() {
        let v: JsonValue =
            serde_json::from_str(&render_json(&servers(), JsonFlavor::Claude).unwrap()).unwrap();
        assert!(v["mcpServers"]["github"].get("type").is_none());
        assert!(v["mcpServers"]["github"].get("tools").is_none());
        assert_eq!(v["mcpServers"]["docs"]["url"], "https://docs.example.com/mcp");
    }

    #[test]
    fn gemini_uses_http_url() {
        let v: JsonValue =
            serde_json::from_str(&render_json(&servers(), JsonFlavor::Gemini).unwrap()).unwrap();
        assert_eq!(v["mcpServers"]["docs"]["httpUrl"], "https://docs.example.com/mcp");
    }

    #[test]
    fn codex_toml_parses_and_disables_history() {
        let out = render_toml(&servers());
        assert!(out.starts_with("[history]\npersistence = \"none\"\n"));
        assert!(out.contains("[mcp_servers.\"github\"]"));
        let parsed: toml::Value = toml::from_str(&out).unwrap();
        assert_eq!(parsed["mcp_servers"]["github"]["command"].as_str(), Some("docker"));
        assert_eq!(
            parsed["mcp_servers"]["github"]["env"]["TOKEN"].as_str(),
            Some("${{ secrets.GITHUB_TOKEN }}")
        );
        assert_eq!(
            parsed["mcp_servers"]["docs"]["http_headers"]["Authorization"].as_str(),
            Some("Bearer x")
        );
        assert_eq!(
            parsed["mcp_servers"]["docs"]["enabled_tools"].as_array().map(|a| a.len()),
            Some(1)
        );
    }
}
