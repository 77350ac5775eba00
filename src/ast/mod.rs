//! AST Module - typed records built from the dynamic front-matter
//!
//! Contains the semantic model every later pass works on:
//! - `workflow`: `WorkflowData`, the immutable per-compile model
//! - `engine`: `EngineConfig`, `EngineKind`
//! - `tools`: `ToolsConfig` and the built-in tool records
//! - `mcp`: user-declared MCP servers
//! - `network`: `NetworkConfig`, `SandboxConfig`
//! - `safe_inputs`: inline tools exposed through the safe-inputs server
//! - `templatable`: literal-or-expression scalars
//! - `trigger`: the `on:` value
//!
//! These types represent the "what" - static structure parsed from YAML.
//! Job synthesis lives in `jobs`, `safe_outputs` and `engine`.

mod engine;
pub(crate) mod fields;
mod mcp;
mod network;
mod safe_inputs;
mod templatable;
mod tools;
mod trigger;
mod workflow;

pub use engine::{EngineConfig, EngineKind};
pub use mcp::{McpServerConfig, McpTransport};
pub use network::{
    ecosystem_domains, FirewallSetting, NetworkConfig, SandboxAgent, SandboxConfig,
};
pub use safe_inputs::{SafeInputBody, SafeInputTool, SafeInputsConfig};
pub use templatable::Templatable;
pub use tools::{
    AppConfig, BashTool, CacheMemoryTool, GitHubMode, GitHubTool, GuardRepos, PlaywrightTool,
    RepoMemoryTool, SerenaTool, ToolConfig, ToolsConfig, DEFAULT_BASH_COMMANDS,
};
pub use trigger::Trigger;
pub use workflow::WorkflowData;
