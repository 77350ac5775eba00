//! WorkflowData - the semantic model of one compile
//!
//! Built once from the main front-matter, the resolved imports and the
//! compile context. Every later pass reads it; nothing mutates it.
//!
//! Import contributions are merged here with "main document wins":
//! - `tools` / `mcp-servers` / `safe-inputs` / `safe-outputs`: names already
//!   declared are kept, new ones are appended
//! - `network.allowed`: union, main entries first
//! - `steps`: main steps, then imported steps
//! - `permissions`: not merged; kept for validation against the main set

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument, warn};

use super::fields::{scalar_string, Fields};
use super::{
    EngineConfig, McpServerConfig, NetworkConfig, SandboxAgent, SandboxConfig, SafeInputsConfig,
    ToolsConfig, Trigger,
};
use crate::checkout::{parse_checkouts, CheckoutConfig};
use crate::compiler::CompileContext;
use crate::config::ActionMode;
use crate::error::{AwError, Result};
use crate::frontmatter::{first_heading, FrontmatterResult};
use crate::imports::{ImportedFile, ResolvedImports};
use crate::permissions::Permissions;
use crate::safe_outputs::SafeOutputsConfig;
use crate::util::{content_hash, OrderedMap};

/// Immutable semantic model of a workflow
#[derive(Debug, Clone)]
pub struct WorkflowData {
    // ─── Identity ───
    pub name: String,
    pub description: Option<String>,
    pub source_path: PathBuf,
    /// File stem, used as `GH_AW_WORKFLOW_ID`
    pub workflow_id: String,
    pub tracker_id: Option<String>,
    pub version: String,
    pub action_mode: ActionMode,
    pub frontmatter_hash: String,

    // ─── Trigger ───
    pub on: Trigger,

    // ─── Agent ───
    pub engine: EngineConfig,
    pub sandbox: SandboxConfig,
    pub tools: ToolsConfig,
    /// Tool names contributed by imports (after the main ones)
    pub imported_tools: Vec<String>,
    pub mcp_servers: OrderedMap<String, McpServerConfig>,
    pub safe_inputs: SafeInputsConfig,
    pub safe_outputs: SafeOutputsConfig,
    pub network: NetworkConfig,

    // ─── Repository access ───
    pub checkouts: Vec<CheckoutConfig>,
    pub checkout_disabled: bool,
    pub permissions: Permissions,
    /// Permissions declared by imports, keyed by display path
    pub imported_permissions: Vec<(String, Permissions)>,

    // ─── Imports and prompt ───
    pub imports: Vec<ImportedFile>,
    pub inlined_imports: bool,
    pub prompt: String,

    // ─── Passthrough ───
    pub runs_on: Option<Value>,
    pub timeout_minutes: Option<i64>,
    pub env: BTreeMap<String, String>,
    pub run_name: Option<String>,
    /// Custom agent-job steps (main first, then imports)
    pub steps: Vec<Value>,
    pub concurrency: Option<Value>,
    pub features: Mapping,
    pub strict: bool,

    /// Non-fatal notes collected while building
    pub warnings: Vec<String>,
}

impl WorkflowData {
    /// Build the model. `imports` must come from resolving this document.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn build(
        path: &Path,
        parsed: &FrontmatterResult,
        imports: ResolvedImports,
        ctx: &CompileContext,
    ) -> Result<Self> {
        let mut warnings = Vec::new();
        let mut f = Fields::new(parsed.frontmatter.clone(), "");

        let workflow_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "workflow".to_string());
        let name = match f.string("name")? {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => first_heading(&parsed.body).unwrap_or_else(|| workflow_id.clone()),
        };
        let description = f.string("description")?;
        let tracker_id = f.string("tracker-id")?;

        let on = match f.take("on") {
            None | Some(Value::Null) => Trigger::default(),
            Some(v) => Trigger::new(v),
        };

        let engine = EngineConfig::from_value(f.take("engine").as_ref())?;
        let sandbox = SandboxConfig::from_value(f.take("sandbox").as_ref())?;
        if sandbox.agent == SandboxAgent::Srt {
            warnings.push("Using experimental feature: sandbox-runtime".to_string());
        }

        // tools: main entries, then imported ones not declared locally
        let mut tools = ToolsConfig::from_mapping(&f.mapping("tools")?.unwrap_or_default())?;
        let main_tool_names: Vec<String> = tools.entries().map(|(k, _)| k.clone()).collect();
        tools.merge_mapping(&imports.merged.tools, true)?;
        let imported_tools: Vec<String> = tools
            .entries()
            .map(|(k, _)| k.clone())
            .filter(|k| !main_tool_names.contains(k))
            .collect();

        let mut mcp_servers = OrderedMap::new();
        let main_servers = f.mapping("mcp-servers")?.unwrap_or_default();
        add_mcp_servers(&mut mcp_servers, &main_servers)?;
        add_mcp_servers(&mut mcp_servers, &imports.merged.mcp_servers)?;

        let mut safe_inputs = SafeInputsConfig::from_mapping(&f.mapping("safe-inputs")?.unwrap_or_default())?;
        safe_inputs.merge_mapping(&imports.merged.safe_inputs)?;

        let mut safe_outputs = match f.mapping("safe-outputs")? {
            Some(m) => SafeOutputsConfig::from_mapping(&m, &mut warnings)?,
            None => SafeOutputsConfig::default(),
        };
        if !imports.merged.safe_outputs.is_empty() {
            safe_outputs.merge_imported(&imports.merged.safe_outputs, &mut warnings)?;
        }

        let mut network = NetworkConfig::from_value(f.take("network").as_ref())?;
        network.extend_allowed(&imports.merged.network_allowed);

        let (checkouts, checkout_disabled) = parse_checkouts(f.take("checkout").as_ref())?;

        let permissions = match f.take("permissions") {
            None => Permissions::new(),
            Some(v) => Permissions::from_value(&v)?,
        };
        let mut imported_permissions = Vec::new();
        for (display, map) in &imports.merged.permissions {
            imported_permissions.push((display.clone(), Permissions::from_mapping(map)?));
        }

        let inlined_imports = f.bool_or("inlined-imports", false)?;
        f.take("imports");
        f.take("source");
        f.take("labels");

        let runs_on = f.take("runs-on").filter(|v| !v.is_null());
        let timeout_minutes = f.int("timeout-minutes")?;
        let env = f.string_map("env")?;
        let run_name = f.string("run-name")?;
        let mut steps = f.sequence("steps")?;
        steps.extend(imports.merged.steps.iter().cloned());
        let concurrency = f.take("concurrency").filter(|v| !v.is_null());

        let features = f.mapping("features")?.unwrap_or_default();
        let action_mode = feature_action_mode(&features)?.unwrap_or(ctx.action_mode);
        for (key, value) in &features {
            let Some(key) = scalar_string(key) else { continue };
            if key == "action-mode" || matches!(value, Value::Bool(false) | Value::Null) {
                continue;
            }
            warn!(feature = %key, "experimental feature enabled");
            warnings.push(format!("Using experimental feature: {}", key));
        }

        let strict = f.bool_or("strict", false)? || ctx.strict;

        for key in f.remaining_keys() {
            debug!(key = %key, "ignoring unrecognized front-matter key");
        }

        let mut hash_input = parsed.raw.clone();
        for file in &imports.files {
            hash_input.push('\n');
            hash_input.push_str(&file.hash);
        }
        let frontmatter_hash = content_hash(&hash_input);

        Ok(Self {
            name,
            description,
            source_path: path.to_path_buf(),
            workflow_id,
            tracker_id,
            version: ctx.version.clone(),
            action_mode,
            frontmatter_hash,
            on,
            engine,
            sandbox,
            tools,
            imported_tools,
            mcp_servers,
            safe_inputs,
            safe_outputs,
            network,
            checkouts,
            checkout_disabled,
            permissions,
            imported_permissions,
            imports: imports.files,
            inlined_imports,
            prompt: imports.prompt,
            runs_on,
            timeout_minutes,
            env,
            run_name,
            steps,
            concurrency,
            features,
            strict,
            warnings,
        })
    }

    pub fn uses_workflow_call(&self) -> bool {
        self.on.uses_workflow_call()
    }

    /// Name of the imported custom agent, if any
    pub fn agent_name(&self) -> Option<String> {
        self.imports
            .iter()
            .find(|f| f.is_agent_file())
            .map(ImportedFile::agent_name)
    }

    /// Display paths of every import, traversal order
    pub fn import_paths(&self) -> Vec<String> {
        self.imports.iter().map(|f| f.display.clone()).collect()
    }

    /// `<stem>.lock.yml` next to the source
    pub fn lock_path(&self) -> PathBuf {
        self.source_path
            .with_file_name(format!("{}.lock.yml", self.workflow_id))
    }

    /// Whether the agent runs behind the firewall
    pub fn firewall_enabled(&self) -> bool {
        use super::FirewallSetting;
        if self.sandbox.agent != SandboxAgent::Awf {
            return false;
        }
        match self.network.firewall {
            FirewallSetting::Disabled => false,
            FirewallSetting::Enabled { .. } => true,
            FirewallSetting::Default => self.engine.kind.supports_firewall(),
        }
    }
}

fn add_mcp_servers(servers: &mut OrderedMap<String, McpServerConfig>, map: &Mapping) -> Result<()> {
    for (k, v) in map {
        let name = k
            .as_str()
            .ok_or_else(|| AwError::schema("mcp-servers", "server names must be strings"))?;
        if servers.contains_key(name) {
            continue;
        }
        servers.insert(name.to_string(), McpServerConfig::from_value(name, v, "mcp-servers")?);
    }
    Ok(())
}

fn feature_action_mode(features: &Mapping) -> Result<Option<ActionMode>> {
    match features.get("action-mode").and_then(Value::as_str) {
        Some(mode) => mode.parse().map(Some),
        None => Ok(None),
    }
}
