//! Centralized constants for the compiler
//!
//! Runtime paths, artifact names and limits in one place so the job builders
//! agree on them.

// ═══════════════════════════════════════════════════════════════
// Runtime paths (inside the emitted workflow)
// ═══════════════════════════════════════════════════════════════

/// Root of the per-run scratch directory
pub const TMP_ROOT: &str = "/tmp/gh-aw";

/// Directory the setup action copies runtime scripts into
pub const ACTIONS_DIR: &str = "/opt/gh-aw/actions";

/// Prompt file written by the activation job
pub const PROMPT_FILE: &str = "/tmp/gh-aw/aw-prompts/prompt.txt";

/// Run-info file written by the activation job
pub const AW_INFO_FILE: &str = "/tmp/gh-aw/aw_info.json";

/// JSONL stream the agent writes safe-output records into
pub const SAFE_OUTPUTS_FILE: &str = "/opt/gh-aw/safeoutputs/outputs.jsonl";

/// Safe-outputs MCP server tool configuration
pub const SAFE_OUTPUTS_CONFIG_FILE: &str = "/opt/gh-aw/safeoutputs/config.json";

/// Directory holding the safe-output artifact in downstream jobs
pub const SAFE_OUTPUTS_DOWNLOAD_DIR: &str = "/tmp/gh-aw/safeoutputs/";

/// Agent stdout/stderr log
pub const AGENT_LOG_FILE: &str = "/tmp/gh-aw/agent-stdio.log";

/// MCP server logs
pub const MCP_LOG_DIR: &str = "/tmp/gh-aw/mcp-logs/";

/// MCP config directory for engines that read from a file path
pub const MCP_CONFIG_DIR: &str = "/tmp/gh-aw/mcp-config";

/// Persistent cache-memory folder
pub const CACHE_MEMORY_DIR: &str = "/tmp/gh-aw/cache-memory";

/// Firewall proxy logs
pub const FIREWALL_LOG_DIR: &str = "/tmp/gh-aw/sandbox/firewall/logs";

// ═══════════════════════════════════════════════════════════════
// Artifacts
// ═══════════════════════════════════════════════════════════════

pub const ACTIVATION_ARTIFACT: &str = "activation";
pub const AGENT_OUTPUT_ARTIFACT: &str = "agent-output";
pub const AGENT_ARTIFACTS: &str = "agent-artifacts";

// ═══════════════════════════════════════════════════════════════
// Job and step identifiers
// ═══════════════════════════════════════════════════════════════

pub const ACTIVATION_JOB: &str = "activation";
pub const AGENT_JOB: &str = "agent";
pub const SAFE_OUTPUTS_JOB: &str = "safe_outputs";
pub const CONCLUSION_JOB: &str = "conclusion";

pub const PROCESS_SAFE_OUTPUTS_STEP: &str = "process_safe_outputs";
pub const APP_TOKEN_STEP: &str = "safe-outputs-app-token";
pub const COLLECT_OUTPUT_STEP: &str = "collect_output";

// ═══════════════════════════════════════════════════════════════
// Limits and defaults
// ═══════════════════════════════════════════════════════════════

/// Upper bound for repo-memory max-file-size (100 MiB)
pub const MAX_REPO_MEMORY_FILE_SIZE: u64 = 104_857_600;

/// Artifact retention bounds enforced by GitHub
pub const MIN_RETENTION_DAYS: u32 = 1;
pub const MAX_RETENTION_DAYS: u32 = 90;

/// Default agent job timeout
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 20;

/// Default safe_outputs job timeout
pub const SAFE_OUTPUTS_TIMEOUT_MINUTES: u32 = 15;

/// Runner used for the light-weight jobs
pub const SLIM_RUNNER: &str = "ubuntu-slim";

/// Runner used for the agent job unless overridden
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";

/// Node version installed before npm-based engines
pub const NODE_VERSION: &str = "24";

/// Agentic workflow firewall release
pub const AWF_VERSION: &str = "v0.13.0";

/// GitHub MCP server image tag
pub const GITHUB_MCP_SERVER_VERSION: &str = "v0.26.3";

/// Magic secret expression used when nothing more specific is configured
pub const DEFAULT_GITHUB_TOKEN_EXPR: &str = "${{ secrets.GH_AW_GITHUB_TOKEN || secrets.GITHUB_TOKEN }}";

/// Token expression for project-scoped safe outputs
pub const PROJECT_GITHUB_TOKEN_EXPR: &str = "${{ secrets.GH_AW_PROJECT_GITHUB_TOKEN }}";

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_bounds_are_ordered() {
        const _: () = {
            assert!(MIN_RETENTION_DAYS < MAX_RETENTION_DAYS);
        };
        assert_eq!(MAX_RETENTION_DAYS, 90);
    }

    #[test]
    fn runtime_paths_live_under_known_roots() {
        for path in [PROMPT_FILE, AW_INFO_FILE, AGENT_LOG_FILE, CACHE_MEMORY_DIR] {
            assert!(path.starts_with(TMP_ROOT), "{path}");
        }
        assert!(SAFE_OUTPUTS_FILE.starts_with("/opt/gh-aw"));
    }

    #[test]
    fn repo_memory_limit_is_100_mib() {
        assert_eq!(MAX_REPO_MEMORY_FILE_SIZE, 100 * 1024 * 1024);
    }
}
