//! User-declared MCP servers (`mcp-servers.<name>` and custom `tools.<name>`)
//!
//! # Example YAML
//!
//! ```yaml
//! mcp-servers:
//!   notion:
//!     container: mcp/notion
//!     version: latest
//!     env:
//!       NOTION_TOKEN: "${{ secrets.NOTION_TOKEN }}"
//!     secrets: [NOTION_TOKEN]
//!     allowed: [search, fetch]
//!   docs:
//!     url: https://docs.example.com/mcp
//!     headers:
//!       Authorization: "Bearer ${{ secrets.DOCS_KEY }}"
//! ```

use std::collections::BTreeMap;

use serde_yaml::Value;

use super::fields::Fields;
use crate::error::{AwError, Result};

/// How the server is reached
#[derive(Debug, Clone, PartialEq)]
pub enum McpTransport {
    /// Local process
    Stdio { command: String, args: Vec<String> },
    /// Docker image run as a local process
    Container {
        image: String,
        version: Option<String>,
        entrypoint_args: Vec<String>,
        mounts: Vec<String>,
        /// Extra `docker run` arguments
        args: Vec<String>,
    },
    /// Remote HTTP server
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// A custom MCP server declaration
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: McpTransport,
    pub env: BTreeMap<String, String>,
    /// Allowed tool names (`["*"]` = all)
    pub allowed: Vec<String>,
    /// Secret names the server may receive
    pub secrets: Vec<String>,
}

impl McpServerConfig {
    /// True when a mapping looks like an MCP server declaration
    pub fn is_server_declaration(value: &Value) -> bool {
        value.as_mapping().is_some_and(|m| {
            m.contains_key("command") || m.contains_key("container") || m.contains_key("url")
        })
    }

    pub fn from_value(name: &str, value: &Value, section: &str) -> Result<Self> {
        let path = format!("{}.{}", section, name);
        let mut f = Fields::from_value(value, &path)?;

        let declared_type = f.string("type")?;
        let env = f.string_map("env")?;
        let mut allowed = f.strings("allowed")?;
        if allowed.is_empty() {
            allowed = f.strings("tools")?;
        }
        let secrets = f.strings("secrets")?;

        let transport = if let Some(image) = f.string("container")? {
            McpTransport::Container {
                image,
                version: f.string("version")?,
                entrypoint_args: f.strings("entrypointArgs")?,
                mounts: f.strings("mounts")?,
                args: f.strings("args")?,
            }
        } else if let Some(command) = f.string("command")? {
            McpTransport::Stdio {
                command,
                args: f.strings("args")?,
            }
        } else if let Some(url) = f.string("url")? {
            McpTransport::Http {
                url,
                headers: f.string_map("headers")?,
            }
        } else {
            return Err(AwError::schema(
                path,
                "MCP server must declare 'container', 'command' or 'url'",
            ));
        };

        if let Some(t) = declared_type.as_deref() {
            let is_http = matches!(transport, McpTransport::Http { .. });
            let ok = match t {
                "http" => is_http,
                "stdio" | "local" => !is_http,
                _ => false,
            };
            if !ok {
                return Err(AwError::schema(
                    format!("{}.type", path),
                    format!("type '{}' does not match the declared transport", t),
                ));
            }
        }

        Ok(Self {
            name: name.to_string(),
            transport,
            env,
            allowed,
            secrets,
        })
    }

    pub fn is_http(&self) -> bool {
        matches!(self.transport, McpTransport::Http { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<McpServerConfig> {
        let v: Value = serde_yaml::from_str(yaml).unwrap();
        McpServerConfig::from_value("srv", &v, "mcp-servers")
    }

    #[test]
    fn container_server() {
        let s = parse("container: mcp/notion\nversion: '1.2'\nentrypointArgs: [--stdio]\nallowed: [search]").unwrap();
        match &s.transport {
            McpTransport::Container {
                image,
                version,
                entrypoint_args,
                ..
            } => {
                assert_eq!(image, "mcp/notion");
                assert_eq!(version.as_deref(), Some("1.2"));
                assert_eq!(entrypoint_args, &vec!["--stdio".to_string()]);
            }
            other => panic!("unexpected transport {other:?}"),
        }
        assert_eq!(s.allowed, vec!["search"]);
    }

    #[test]
    fn http_server_with_headers() {
        let s = parse("url: https://x.dev/mcp\nheaders:\n  Authorization: Bearer t").unwrap();
        assert!(s.is_http());
    }

    #[test]
    fn tools_is_an_alias_for_allowed() {
        let s = parse("command: node\nargs: [server.js]\ntools: ['*']").unwrap();
        assert_eq!(s.allowed, vec!["*"]);
    }

    #[test]
    fn missing_transport_is_rejected() {
        let err = parse("env:\n  A: b").unwrap_err();
        assert!(err.to_string().contains("mcp-servers.srv"));
    }

    #[test]
    fn mismatched_type_is_rejected() {
        assert!(parse("type: http\ncommand: node").is_err());
        assert!(parse("type: stdio\ncommand: node").is_ok());
    }

    #[test]
    fn declaration_detection() {
        let v: Value = serde_yaml::from_str("url: https://x").unwrap();
        assert!(McpServerConfig::is_server_declaration(&v));
        assert!(!McpServerConfig::is_server_declaration(&Value::Null));
    }
}
