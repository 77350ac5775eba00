//! Agent tools (`tools:`)
//!
//! Built-in tools are typed; any other entry that declares a `command`,
//! `container` or `url` is a custom MCP server. Declaration order is kept
//! because it is the MCP server emission order.

use serde_yaml::{Mapping, Value};

use super::fields::{scalar_string, Fields};
use super::mcp::McpServerConfig;
use crate::error::{AwError, Result};
use crate::frontmatter::value_type_name;
use crate::util::OrderedMap;

/// Commands available when `bash:` is not configured
pub const DEFAULT_BASH_COMMANDS: &[&str] = &[
    "cat", "date", "echo", "grep", "head", "ls", "pwd", "sort", "tail", "uniq", "wc", "yq",
];

/// GitHub App credentials used to mint installation tokens
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_id: String,
    pub private_key: String,
    pub owner: Option<String>,
    pub repositories: Vec<String>,
}

impl AppConfig {
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let mut f = Fields::from_value(value, path)?;
        let app_id = f
            .string("app-id")?
            .ok_or_else(|| AwError::schema(format!("{}.app-id", path), "app-id is required"))?;
        let private_key = f.string("private-key")?.ok_or_else(|| {
            AwError::schema(format!("{}.private-key", path), "private-key is required")
        })?;
        Ok(Self {
            app_id,
            private_key,
            owner: f.string("owner")?,
            repositories: f.strings("repositories")?,
        })
    }
}

/// Where the GitHub MCP server runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitHubMode {
    #[default]
    Local,
    Remote,
}

/// Guard policy `repos` value
#[derive(Debug, Clone, PartialEq)]
pub enum GuardRepos {
    All,
    Public,
    Patterns(Vec<String>),
    /// Anything else; rejected by validation
    Invalid(String),
}

/// The `github` tool
#[derive(Debug, Clone, PartialEq)]
pub struct GitHubTool {
    pub mode: GitHubMode,
    pub toolsets: Vec<String>,
    pub allowed: Vec<String>,
    pub read_only: bool,
    pub github_token: Option<String>,
    pub app: Option<AppConfig>,
    pub version: Option<String>,
    pub repos: Option<GuardRepos>,
    pub min_integrity: Option<String>,
}

impl Default for GitHubTool {
    fn default() -> Self {
        Self {
            mode: GitHubMode::Local,
            toolsets: vec!["default".to_string()],
            allowed: Vec::new(),
            read_only: false,
            github_token: None,
            app: None,
            version: None,
            repos: None,
            min_integrity: None,
        }
    }
}

impl GitHubTool {
    fn from_value(value: &Value) -> Result<Self> {
        let mut f = Fields::from_value(value, "tools.github")?;
        let mode = match f.string("mode")?.as_deref() {
            None | Some("local") => GitHubMode::Local,
            Some("remote") => GitHubMode::Remote,
            Some(other) => {
                return Err(AwError::schema(
                    "tools.github.mode",
                    format!("unknown mode '{}' (expected local or remote)", other),
                ))
            }
        };
        let mut toolsets = f.strings("toolsets")?;
        if toolsets.is_empty() {
            toolsets.push("default".to_string());
        }
        let app = match f.take("app") {
            None | Some(Value::Null) => None,
            Some(v) => Some(AppConfig::from_value(&v, "tools.github.app")?),
        };
        let repos = match f.take("repos") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s == "all" => Some(GuardRepos::All),
            Some(Value::String(s)) if s == "public" => Some(GuardRepos::Public),
            Some(Value::Sequence(items)) => Some(GuardRepos::Patterns(
                items.iter().filter_map(scalar_string).collect(),
            )),
            Some(Value::String(s)) => Some(GuardRepos::Invalid(s)),
            Some(other) => Some(GuardRepos::Invalid(value_type_name(&other).to_string())),
        };
        Ok(Self {
            mode,
            toolsets,
            allowed: f.strings("allowed")?,
            read_only: f.bool_or("read-only", false)?,
            github_token: f.string("github-token")?,
            app,
            version: f.string("version")?,
            repos,
            min_integrity: f.string("min-integrity")?,
        })
    }
}

/// The `bash` tool
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BashTool {
    /// Not configured: [`DEFAULT_BASH_COMMANDS`]
    #[default]
    Unset,
    /// `bash: true`, `["*"]` or `[":*"]`
    All,
    Disabled,
    Commands(Vec<String>),
    /// `bash:` with null or an empty mapping
    Empty,
}

impl BashTool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(true) => Ok(BashTool::All),
            Value::Bool(false) => Ok(BashTool::Disabled),
            Value::Null => Ok(BashTool::Empty),
            Value::Mapping(m) if m.is_empty() => Ok(BashTool::Empty),
            Value::Sequence(items) => {
                let cmds: Vec<String> = items.iter().filter_map(scalar_string).collect();
                if cmds.iter().any(|c| c == "*" || c == ":*") {
                    Ok(BashTool::All)
                } else {
                    Ok(BashTool::Commands(cmds))
                }
            }
            other => Err(AwError::schema(
                "tools.bash",
                format!("expected true, false or a list of commands, got {}", value_type_name(other)),
            )),
        }
    }

    /// Allowed commands, `None` meaning unrestricted
    pub fn commands(&self) -> Option<Vec<String>> {
        match self {
            BashTool::All => None,
            BashTool::Disabled | BashTool::Empty => Some(Vec::new()),
            BashTool::Unset => Some(DEFAULT_BASH_COMMANDS.iter().map(|s| s.to_string()).collect()),
            BashTool::Commands(c) => Some(c.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaywrightTool {
    pub version: Option<String>,
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerenaTool {
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheMemoryTool {
    pub key: Option<String>,
    pub retention_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepoMemoryTool {
    pub branch: Option<String>,
    pub max_file_size: Option<i64>,
    pub retention_days: Option<i64>,
}

impl RepoMemoryTool {
    pub fn branch_name(&self) -> &str {
        self.branch.as_deref().unwrap_or("memory/default")
    }
}

/// One `tools:` entry
#[derive(Debug, Clone, PartialEq)]
pub enum ToolConfig {
    GitHub(GitHubTool),
    Bash(BashTool),
    Edit,
    Playwright(PlaywrightTool),
    Serena(SerenaTool),
    CacheMemory(CacheMemoryTool),
    RepoMemory(RepoMemoryTool),
    WebFetch,
    WebSearch,
    AgenticWorkflows,
    Mcp(McpServerConfig),
}

/// Typed `tools:` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolsConfig {
    entries: OrderedMap<String, ToolConfig>,
    /// `github: false`
    github_disabled: bool,
}

impl ToolsConfig {
    pub fn from_mapping(map: &Mapping) -> Result<Self> {
        let mut tools = Self::default();
        tools.merge_mapping(map, false)?;
        Ok(tools)
    }

    /// Add entries from `map`; with `only_new`, existing names win
    pub fn merge_mapping(&mut self, map: &Mapping, only_new: bool) -> Result<()> {
        for (k, v) in map {
            let name = k
                .as_str()
                .ok_or_else(|| AwError::schema("tools", "tool names must be strings"))?;
            if only_new && (self.entries.contains_key(name) || (name == "github" && self.github_disabled)) {
                continue;
            }
            if name == "github" && matches!(v, Value::Bool(false)) {
                self.github_disabled = true;
                self.entries.remove("github");
                continue;
            }
            // Disabled optional tools are simply absent
            if matches!(v, Value::Bool(false)) && name != "bash" {
                continue;
            }
            let tool = parse_tool(name, v)?;
            self.entries.insert(name.to_string(), tool);
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        self.entries.get(name)
    }

    /// The GitHub tool; enabled with defaults unless `github: false`
    pub fn github(&self) -> Option<GitHubTool> {
        if self.github_disabled {
            return None;
        }
        match self.entries.get("github") {
            Some(ToolConfig::GitHub(g)) => Some(g.clone()),
            _ => Some(GitHubTool::default()),
        }
    }

    pub fn bash(&self) -> BashTool {
        match self.entries.get("bash") {
            Some(ToolConfig::Bash(b)) => b.clone(),
            _ => BashTool::Unset,
        }
    }

    pub fn has_edit(&self) -> bool {
        matches!(self.entries.get("edit"), Some(ToolConfig::Edit))
    }

    pub fn has_web_fetch(&self) -> bool {
        matches!(self.entries.get("web-fetch"), Some(ToolConfig::WebFetch))
    }

    pub fn has_web_search(&self) -> bool {
        matches!(self.entries.get("web-search"), Some(ToolConfig::WebSearch))
    }

    pub fn playwright(&self) -> Option<&PlaywrightTool> {
        match self.entries.get("playwright") {
            Some(ToolConfig::Playwright(p)) => Some(p),
            _ => None,
        }
    }

    pub fn cache_memory(&self) -> Option<&CacheMemoryTool> {
        match self.entries.get("cache-memory") {
            Some(ToolConfig::CacheMemory(c)) => Some(c),
            _ => None,
        }
    }

    pub fn repo_memory(&self) -> Option<&RepoMemoryTool> {
        match self.entries.get("repo-memory") {
            Some(ToolConfig::RepoMemory(r)) => Some(r),
            _ => None,
        }
    }
}

fn parse_tool(name: &str, value: &Value) -> Result<ToolConfig> {
    let path = format!("tools.{}", name);
    match name {
        "github" => Ok(ToolConfig::GitHub(GitHubTool::from_value(value)?)),
        "bash" => Ok(ToolConfig::Bash(BashTool::from_value(value)?)),
        "edit" => Ok(ToolConfig::Edit),
        "web-fetch" => Ok(ToolConfig::WebFetch),
        "web-search" => Ok(ToolConfig::WebSearch),
        "agentic-workflows" => Ok(ToolConfig::AgenticWorkflows),
        "playwright" => {
            let mut f = Fields::from_value(value, &path)?;
            let mut allowed_domains = f.strings("allowed_domains")?;
            if allowed_domains.is_empty() {
                allowed_domains = vec!["localhost".to_string(), "127.0.0.1".to_string()];
            }
            Ok(ToolConfig::Playwright(PlaywrightTool {
                version: f.string("version")?,
                allowed_domains,
            }))
        }
        "serena" => {
            let languages = match value {
                Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
                Value::Mapping(m) => match m.get("languages") {
                    Some(Value::Mapping(langs)) => langs.keys().filter_map(scalar_string).collect(),
                    Some(Value::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            Ok(ToolConfig::Serena(SerenaTool { languages }))
        }
        "cache-memory" => {
            if matches!(value, Value::Bool(true)) {
                return Ok(ToolConfig::CacheMemory(CacheMemoryTool::default()));
            }
            let mut f = Fields::from_value(value, &path)?;
            Ok(ToolConfig::CacheMemory(CacheMemoryTool {
                key: f.string("key")?,
                retention_days: f.int("retention-days")?,
            }))
        }
        "repo-memory" => {
            if matches!(value, Value::Bool(true)) {
                return Ok(ToolConfig::RepoMemory(RepoMemoryTool::default()));
            }
            let mut f = Fields::from_value(value, &path)?;
            Ok(ToolConfig::RepoMemory(RepoMemoryTool {
                branch: f.string("branch-name")?,
                max_file_size: f.int("max-file-size")?,
                retention_days: f.int("retention-days")?,
            }))
        }
        _ if McpServerConfig::is_server_declaration(value) => Ok(ToolConfig::Mcp(
            McpServerConfig::from_value(name, value, "tools")?,
        )),
        _ => Err(AwError::schema(
            path,
            format!("unknown tool '{}' (custom MCP servers need 'command', 'container' or 'url')", name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(yaml: &str) -> Result<ToolsConfig> {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        ToolsConfig::from_mapping(&m)
    }

    #[test]
    fn github_enabled_by_default() {
        let t = tools("edit:").unwrap();
        let gh = t.github().unwrap();
        assert_eq!(gh.mode, GitHubMode::Local);
        assert_eq!(gh.toolsets, vec!["default"]);
        assert!(t.has_edit());
    }

    #[test]
    fn github_false_disables() {
        assert!(tools("github: false").unwrap().github().is_none());
    }

    #[test]
    fn github_guard_policy() {
        let t = tools("github:\n  mode: remote\n  repos: [octo/*]\n  min-integrity: reader").unwrap();
        let gh = t.github().unwrap();
        assert_eq!(gh.mode, GitHubMode::Remote);
        assert_eq!(gh.repos, Some(GuardRepos::Patterns(vec!["octo/*".into()])));
        assert_eq!(gh.min_integrity.as_deref(), Some("reader"));
    }

    #[test]
    fn bash_forms() {
        assert_eq!(tools("bash: true").unwrap().bash(), BashTool::All);
        assert_eq!(tools("bash: [':*']").unwrap().bash(), BashTool::All);
        assert_eq!(tools("bash: false").unwrap().bash(), BashTool::Disabled);
        assert_eq!(tools("bash:").unwrap().bash(), BashTool::Empty);
        assert_eq!(tools("bash: {}").unwrap().bash(), BashTool::Empty);
        assert_eq!(
            tools("bash: [git, make]").unwrap().bash(),
            BashTool::Commands(vec!["git".into(), "make".into()])
        );
        assert_eq!(tools("edit:").unwrap().bash().commands().unwrap().len(), DEFAULT_BASH_COMMANDS.len());
    }

    #[test]
    fn custom_server_and_unknown_tool() {
        let t = tools("my-server:\n  command: node\n  args: [x.js]").unwrap();
        assert!(matches!(t.get("my-server"), Some(ToolConfig::Mcp(_))));
        assert!(tools("mystery: {}").is_err());
    }

    #[test]
    fn declaration_order_is_kept() {
        let t = tools("playwright:\nserena: [go]\ncache-memory: true").unwrap();
        let names: Vec<_> = t.entries().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["playwright", "serena", "cache-memory"]);
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let mut t = tools("bash: [ls]").unwrap();
        let extra: Mapping = serde_yaml::from_str("bash: true\nedit:").unwrap();
        t.merge_mapping(&extra, true).unwrap();
        assert_eq!(t.bash(), BashTool::Commands(vec!["ls".into()]));
        assert!(t.has_edit());
    }

    #[test]
    fn app_requires_id_and_key() {
        assert!(tools("github:\n  app:\n    app-id: '1'").is_err());
        let t = tools("github:\n  app:\n    app-id: '1'\n    private-key: ${{ secrets.KEY }}").unwrap();
        assert!(t.github().unwrap().app.is_some());
    }
}
