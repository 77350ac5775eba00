//! Agent sandboxing
//!
//! Two wrappers around the engine command line:
//!
//! - **awf** (Agent Workflow Firewall): runs the command in a container whose
//!   egress goes through a domain allow-list proxy. Host toolchains are made
//!   visible through a PATH shim.
//! - **srt** (Sandbox Runtime): experimental process sandbox driven by a JSON
//!   settings file.

use serde_json::json;

use crate::ast::{FirewallSetting, SandboxAgent, WorkflowData};
use crate::error::{AwError, Result};
use crate::jobs::Step;
use crate::util::constants::{AWF_VERSION, FIREWALL_LOG_DIR, TMP_ROOT};
use crate::util::{heredoc_delimiter, shell_single_quote};

/// Prepends every hosted toolcache `bin` directory to PATH inside the
/// container, with `$GOROOT/bin` (when set) in front of them
pub const PATH_SHIM: &str = r#"export PATH="$(find /opt/hostedtoolcache -maxdepth 4 -type d -name bin 2>/dev/null | tr '\n' ':')$PATH"; if [ -n "$GOROOT" ]; then export PATH="$GOROOT/bin:$PATH"; fi"#;

const SRT_PACKAGE: &str = "@anthropic-ai/sandbox-runtime";
const SRT_SETTINGS_FILE: &str = "/tmp/gh-aw/sandbox/srt-settings.json";

/// Which wrapper applies to this workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Awf,
    Srt,
    None,
}

impl Wrapper {
    pub fn for_workflow(data: &WorkflowData) -> Self {
        match data.sandbox.agent {
            SandboxAgent::Srt => Wrapper::Srt,
            SandboxAgent::Awf if data.firewall_enabled() && !data.network.allows_everything() => {
                Wrapper::Awf
            }
            _ => Wrapper::None,
        }
    }
}

pub(crate) fn awf_version(data: &WorkflowData) -> &str {
    match &data.network.firewall {
        FirewallSetting::Enabled { version: Some(v) } => v,
        _ => AWF_VERSION,
    }
}

/// `Install awf binary`
pub fn install_awf_step(data: &WorkflowData) -> Step {
    let version = awf_version(data);
    Step::named("Install awf binary").run(format!(
        "echo \"Installing awf via installer script (requested version: {v})\"\n\
         curl -sSL https://raw.githubusercontent.com/github/gh-aw-firewall/main/install.sh | sudo AWF_VERSION={v} bash\n\
         which awf\n\
         awf --version\n",
        v = version
    ))
}

/// Settings file content for srt
pub fn srt_settings(allowed: &[String], blocked: &[String]) -> Result<String> {
    let settings = json!({
        "network": {
            "allowedDomains": allowed,
            "deniedDomains": blocked,
        },
        "filesystem": {
            "denyRead": [],
            "allowWrite": [".", TMP_ROOT],
            "denyWrite": [],
        },
    });
    serde_json::to_string_pretty(&settings).map_err(|e| AwError::Emit {
        reason: format!("sandbox settings serialization failed: {}", e),
    })
}

/// `Install Sandbox Runtime` (also writes the settings file)
pub fn install_srt_step(allowed: &[String], blocked: &[String]) -> Result<Step> {
    let settings = srt_settings(allowed, blocked)?;
    Ok(Step::named("Install Sandbox Runtime").run(format!(
        "npm install -g --silent {pkg}\n\
         mkdir -p /tmp/gh-aw/sandbox\n\
         cat > {file} << '{eof}'\n{settings}\n{eof}\n",
        pkg = SRT_PACKAGE,
        file = SRT_SETTINGS_FILE,
        eof = heredoc_delimiter("SRT_SETTINGS", &settings),
        settings = settings
    )))
}

fn awf_command(command: &str, data: &WorkflowData, allowed: &[String], blocked: &[String]) -> String {
    let mut parts: Vec<String> = vec![
        "sudo -E awf --env-all".to_string(),
        "--container-workdir \"${GITHUB_WORKSPACE}\"".to_string(),
        "--mount /tmp:/tmp:rw".to_string(),
        "--mount \"${GITHUB_WORKSPACE}:${GITHUB_WORKSPACE}:rw\"".to_string(),
    ];
    for mount in &data.sandbox.mounts {
        parts.push(format!("--mount {}", shell_single_quote(mount)));
    }
    parts.push(format!("--allow-domains {}", allowed.join(",")));
    if !blocked.is_empty() {
        parts.push(format!("--block-domains {}", blocked.join(",")));
    }
    parts.push("--log-level info".to_string());
    parts.push(format!("--proxy-logs-dir {}", FIREWALL_LOG_DIR));
    parts.push("--".to_string());
    parts.push(shell_single_quote(&format!("{} && {}", PATH_SHIM, command)));
    parts.join(" ")
}

fn srt_command(command: &str) -> String {
    format!(
        "srt --settings {} -- {}",
        SRT_SETTINGS_FILE,
        shell_single_quote(command)
    )
}

/// Wrap an engine command line according to the sandbox in use
pub fn wrap_command(
    command: &str,
    data: &WorkflowData,
    allowed: &[String],
    blocked: &[String],
) -> String {
    match Wrapper::for_workflow(data) {
        Wrapper::Awf => awf_command(command, data, allowed, blocked),
        Wrapper::Srt => srt_command(command),
        Wrapper::None => command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileContext;
    use crate::frontmatter;
    use crate::imports::ResolvedImports;
    use std::path::Path;

    fn data(text: &str) -> WorkflowData {
        let path = "/repo/.github/workflows/w.md";
        let parsed = frontmatter::parse(text, path).unwrap();
        WorkflowData::build(
            Path::new(path),
            &parsed,
            ResolvedImports::default(),
            &CompileContext::for_tests(),
        )
        .unwrap()
    }

    #[test]
    fn default_workflow_uses_awf() {
        let d = data("---\nengine: claude\n---\nx");
        assert_eq!(Wrapper::for_workflow(&d), Wrapper::Awf);
        let cmd = wrap_command("claude --print", &d, &["api.anthropic.com".to_string()], &[]);
        assert!(cmd.starts_with("sudo -E awf --env-all"));
        assert!(cmd.contains("--allow-domains api.anthropic.com"));
        assert!(!cmd.contains("--block-domains"));
        assert!(cmd.contains("/opt/hostedtoolcache"));
        assert!(cmd.contains("$GOROOT/bin:$PATH"));
        assert!(cmd.ends_with("&& claude --print'"));
    }

    #[test]
    fn disabled_firewall_runs_bare() {
        let d = data("---\nnetwork:\n  firewall: false\n---\nx");
        assert_eq!(wrap_command("copilot", &d, &[], &[]), "copilot");
        let d = data("---\nengine: custom\n---\nx");
        assert_eq!(Wrapper::for_workflow(&d), Wrapper::None);
    }

    #[test]
    fn blocked_domains_are_passed() {
        let d = data("---\n---\nx");
        let cmd = wrap_command("copilot", &d, &["a.com".to_string()], &["b.com".to_string()]);
        assert!(cmd.contains("--block-domains b.com"));
    }

    #[test]
    fn srt_uses_settings_file() {
        let d = data("---\nsandbox:\n  agent: srt\n---\nx");
        assert_eq!(Wrapper::for_workflow(&d), Wrapper::Srt);
        assert_eq!(
            wrap_command("claude", &d, &[], &[]),
            format!("srt --settings {} -- 'claude'", SRT_SETTINGS_FILE)
        );
        let settings: serde_json::Value =
            serde_json::from_str(&srt_settings(&["x.com".to_string()], &[]).unwrap()).unwrap();
        assert_eq!(settings["network"]["allowedDomains"][0], "x.com");
    }

    #[test]
    fn awf_version_override() {
        let d = data("---\nnetwork:\n  firewall:\n    version: v9.9.9\n---\nx");
        let step = install_awf_step(&d);
        assert!(step.run.unwrap().contains("AWF_VERSION=v9.9.9"));
    }
}
