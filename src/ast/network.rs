//! Network access (`network:`) and agent sandbox (`sandbox:`)
//!
//! Allowed entries are domains or ecosystem identifiers (`defaults`,
//! `github`, `node`, `python`, `containers`, `go`, `rust`) that expand to
//! domain lists. The final list always includes the engine's API domains and
//! is sorted and deduplicated.

use serde_yaml::Value;

use super::fields::Fields;
use crate::error::{AwError, Result};
use crate::util::sorted_unique;

const DEFAULTS_DOMAINS: &[&str] = &[
    "api.snapcraft.io",
    "archive.ubuntu.com",
    "crl.geotrust.com",
    "crl.globalsign.com",
    "crl.thawte.com",
    "crl.verisign.com",
    "crl3.digicert.com",
    "crl4.digicert.com",
    "crls.ssl.com",
    "json-schema.org",
    "json.schemastore.org",
    "keyserver.ubuntu.com",
    "ocsp.digicert.com",
    "ocsp.geotrust.com",
    "ocsp.globalsign.com",
    "ocsp.ssl.com",
    "ocsp.thawte.com",
    "ocsp.verisign.com",
    "packagecloud.io",
    "packages.cloud.google.com",
    "packages.microsoft.com",
    "ppa.launchpad.net",
    "security.ubuntu.com",
    "ts-crl.ws.symantec.com",
    "ts-ocsp.ws.symantec.com",
];

const GITHUB_DOMAINS: &[&str] = &[
    "*.githubusercontent.com",
    "api.github.com",
    "codeload.github.com",
    "github.com",
    "github.githubassets.com",
    "lfs.github.com",
    "objects.githubusercontent.com",
    "raw.githubusercontent.com",
    "uploads.github.com",
];

const NODE_DOMAINS: &[&str] = &[
    "bun.sh",
    "deno.land",
    "get.pnpm.io",
    "nodejs.org",
    "npmjs.com",
    "npmjs.org",
    "registry.npmjs.org",
    "registry.yarnpkg.com",
    "repo.yarnpkg.com",
    "yarnpkg.com",
];

const PYTHON_DOMAINS: &[&str] = &[
    "bootstrap.pypa.io",
    "conda.anaconda.org",
    "files.pythonhosted.org",
    "pip.pypa.io",
    "pypi.org",
    "pypi.python.org",
    "repo.anaconda.com",
];

const CONTAINER_DOMAINS: &[&str] = &[
    "*.docker.com",
    "*.docker.io",
    "gcr.io",
    "ghcr.io",
    "mcr.microsoft.com",
    "production.cloudflare.docker.com",
    "quay.io",
    "registry.hub.docker.com",
];

const GO_DOMAINS: &[&str] = &[
    "go.dev",
    "golang.org",
    "proxy.golang.org",
    "storage.googleapis.com",
    "sum.golang.org",
];

const RUST_DOMAINS: &[&str] = &[
    "crates.io",
    "index.crates.io",
    "sh.rustup.rs",
    "static.crates.io",
    "static.rust-lang.org",
];

/// Domains of an ecosystem identifier
pub fn ecosystem_domains(id: &str) -> Option<&'static [&'static str]> {
    match id {
        "defaults" => Some(DEFAULTS_DOMAINS),
        "github" => Some(GITHUB_DOMAINS),
        "node" => Some(NODE_DOMAINS),
        "python" => Some(PYTHON_DOMAINS),
        "containers" => Some(CONTAINER_DOMAINS),
        "go" => Some(GO_DOMAINS),
        "rust" => Some(RUST_DOMAINS),
        _ => None,
    }
}

/// Firewall setting under `network.firewall`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FirewallSetting {
    /// Engine default (on for engines that support it)
    #[default]
    Default,
    Enabled {
        version: Option<String>,
    },
    Disabled,
}

/// Typed `network:` block
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Raw allowed entries (ecosystem ids not yet expanded)
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
    pub firewall: FirewallSetting,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            allowed: vec!["defaults".to_string()],
            blocked: Vec::new(),
            firewall: FirewallSetting::Default,
        }
    }
}

impl NetworkConfig {
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(s)) if s == "defaults" => Ok(Self::default()),
            Some(Value::String(s)) => Err(AwError::schema(
                "network",
                format!("unknown network preset '{}' (expected 'defaults')", s),
            )),
            Some(v @ Value::Mapping(_)) => {
                let mut f = Fields::from_value(v, "network")?;
                let allowed = f.strings("allowed")?;
                let blocked = f.strings("blocked")?;
                let firewall = match f.take("firewall") {
                    None | Some(Value::Null) => FirewallSetting::Default,
                    Some(Value::Bool(true)) => FirewallSetting::Enabled { version: None },
                    Some(Value::Bool(false)) => FirewallSetting::Disabled,
                    Some(Value::String(s)) if s == "disable" => FirewallSetting::Disabled,
                    Some(fw @ Value::Mapping(_)) => {
                        let mut fw = Fields::from_value(&fw, "network.firewall")?;
                        FirewallSetting::Enabled {
                            version: fw.string("version")?,
                        }
                    }
                    Some(_) => {
                        return Err(AwError::schema(
                            "network.firewall",
                            "expected a boolean, 'disable' or a mapping",
                        ))
                    }
                };
                Ok(Self {
                    allowed,
                    blocked,
                    firewall,
                })
            }
            Some(_) => Err(AwError::schema("network", "expected 'defaults' or a mapping")),
        }
    }

    /// Add imported entries after the declared ones
    pub fn extend_allowed(&mut self, extra: &[String]) {
        for domain in extra {
            if !self.allowed.contains(domain) {
                self.allowed.push(domain.clone());
            }
        }
    }

    /// Final domain list: ecosystems expanded, engine domains added, sorted
    pub fn expand_allowed(&self, engine_domains: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.allowed {
            match ecosystem_domains(entry) {
                Some(domains) => out.extend(domains.iter().map(|d| d.to_string())),
                None => out.push(entry.clone()),
            }
        }
        out.extend(engine_domains.iter().map(|d| d.to_string()));
        sorted_unique(out)
    }

    pub fn expand_blocked(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.blocked {
            match ecosystem_domains(entry) {
                Some(domains) => out.extend(domains.iter().map(|d| d.to_string())),
                None => out.push(entry.clone()),
            }
        }
        sorted_unique(out)
    }

    pub fn allows_everything(&self) -> bool {
        self.allowed.iter().any(|d| d == "*")
    }
}

/// Agent sandbox flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxAgent {
    /// Agent Workflow Firewall
    #[default]
    Awf,
    /// Sandbox Runtime
    Srt,
    Disabled,
}

/// Typed `sandbox:` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SandboxConfig {
    pub agent: SandboxAgent,
    /// `source:dest:mode` mount specs
    pub mounts: Vec<String>,
    /// MCP gateway port
    pub mcp_port: Option<i64>,
}

impl SandboxConfig {
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::default());
        };
        let mut f = Fields::from_value(value, "sandbox")?;
        let agent = match f.take("agent") {
            None | Some(Value::Null) => SandboxAgent::Awf,
            Some(Value::Bool(false)) => SandboxAgent::Disabled,
            Some(Value::String(s)) if s == "awf" => SandboxAgent::Awf,
            Some(Value::String(s)) if s == "srt" => SandboxAgent::Srt,
            Some(_) => {
                return Err(AwError::schema(
                    "sandbox.agent",
                    "expected 'awf', 'srt' or false",
                ))
            }
        };
        let mounts = f.strings("mounts")?;
        let mcp_port = match f.mapping("mcp")? {
            Some(mcp) => Fields::new(mcp, "sandbox.mcp").int("port")?,
            None => None,
        };
        Ok(Self {
            agent,
            mounts,
            mcp_port,
        })
    }
}
