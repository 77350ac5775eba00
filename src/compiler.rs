//! Compiler entry points
//!
//! [`CompileContext`] carries everything that is fixed for a compiler run
//! (version, action mode, pins, script registry, engines). [`Compiler`]
//! drives one document through parse → imports → model → validate → jobs →
//! emit. A compile either returns the lock file and its warnings, or an
//! error and nothing else.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::ast::WorkflowData;
use crate::checkout::CheckoutManager;
use crate::config::{ActionMode, CompilerConfig, TrialConfig};
use crate::engine::mcp::collect_mcp_servers;
use crate::engine::EngineRegistry;
use crate::error::{AwError, Result};
use crate::frontmatter::{self, schema::FrontmatterSchemaValidator};
use crate::imports::ImportResolver;
use crate::jobs::{
    build_activation_job, build_agent_job, build_conclusion_job, emit_lock_file, pin_actions,
    ActionPinResolver, Job, JobGraph, ScriptRegistry,
};
use crate::permissions::solve_safe_outputs;
use crate::safe_outputs::{build_safe_outputs_job, SafeOutputsJobInput};
use crate::validate;
use crate::workflow_call::inject_outputs;

/// Per-run compiler settings shared by every pass
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Compiler version stamped into the header and release-mode actions
    pub version: String,
    pub action_mode: ActionMode,
    /// Force strict validation
    pub strict: bool,
    pub trial: Option<TrialConfig>,
    pub scripts: ScriptRegistry,
    pub pins: ActionPinResolver,
    pub engines: EngineRegistry,
}

impl CompileContext {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            action_mode: config.effective_action_mode(),
            strict: config.strict,
            trial: config.trial.clone(),
            scripts: ScriptRegistry::with_builtins(),
            pins: ActionPinResolver::new(&config.pins),
            engines: EngineRegistry::new(),
        }
    }

    pub fn with_action_mode(mut self, mode: ActionMode) -> Self {
        self.action_mode = mode;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(&CompilerConfig::default())
    }
}

/// Result of a successful compile
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    /// `<stem>.lock.yml` next to the source
    pub lock_path: PathBuf,
    pub yaml: String,
    pub warnings: Vec<String>,
}

/// Compiles workflow documents into lock files
pub struct Compiler {
    ctx: CompileContext,
    schema: FrontmatterSchemaValidator,
}

impl Compiler {
    pub fn new(ctx: CompileContext) -> Result<Self> {
        Ok(Self {
            ctx,
            schema: FrontmatterSchemaValidator::new()?,
        })
    }

    pub fn from_config(config: &CompilerConfig) -> Result<Self> {
        Self::new(CompileContext::new(config))
    }

    pub fn context(&self) -> &CompileContext {
        &self.ctx
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| AwError::io(path, e))
    }

    /// Parse, resolve imports, build and validate the model
    fn analyze(&self, path: &Path, text: &str) -> Result<WorkflowData> {
        let parsed = frontmatter::parse(text, &path.display().to_string())?;
        self.schema.validate_mapping(&parsed.frontmatter)?;

        let inlined = matches!(
            parsed.get("inlined-imports"),
            Some(serde_yaml::Value::Bool(true))
        );
        let mut resolver = ImportResolver::new(path);
        let imports = resolver.resolve(path, &parsed.frontmatter, &parsed.body, inlined)?;
        debug!(parses = resolver.parse_count(), "imports parsed");

        WorkflowData::build(path, &parsed, imports, &self.ctx)
    }

    /// Compile a document held in memory. Nothing is written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn compile_source(&self, path: &Path, text: &str) -> Result<CompiledWorkflow> {
        let data = self.analyze(path, text)?;
        let servers = collect_mcp_servers(&data);
        let warnings = validate::validate(&data, &self.ctx.engines, &servers.warnings)?;

        let ctx = self.ctx.clone().with_action_mode(data.action_mode);
        let mut jobs: Vec<Job> = vec![
            build_activation_job(&data, &ctx)?,
            build_agent_job(&data, &servers, &ctx)?,
        ];

        let safe_outputs_permissions = solve_safe_outputs(&data.safe_outputs);
        let checkouts = CheckoutManager::new(&data.checkouts, data.checkout_disabled, ctx.trial.clone());
        let engine_id = data.engine.kind.as_str();
        if let Some(job) = build_safe_outputs_job(
            SafeOutputsJobInput {
                config: &data.safe_outputs,
                permissions: safe_outputs_permissions.clone(),
                engine_id,
                workflow_id: &data.workflow_id,
                workflow_name: &data.name,
                target_repo: checkouts.current_repository(),
            },
            &ctx,
        )? {
            jobs.push(job);
        }
        if let Some(job) = build_conclusion_job(&data, &safe_outputs_permissions, &ctx)? {
            jobs.push(job);
        }

        let order = JobGraph::from_jobs(&jobs)?.topological_order()?;
        jobs.sort_by_key(|job| order.iter().position(|id| *id == job.id));
        pin_actions(&mut jobs, &ctx.pins)?;

        let on = inject_outputs(&data.on, &data.safe_outputs);
        let permissions = data.permissions.clone().merged(&safe_outputs_permissions);
        let yaml = emit_lock_file(&data, on, &permissions, &jobs)?;

        info!(jobs = jobs.len(), warnings = warnings.len(), "compiled");
        Ok(CompiledWorkflow {
            lock_path: data.lock_path(),
            yaml,
            warnings,
        })
    }

    /// Compile a file and write its lock file next to it
    pub fn compile_file(&self, path: &Path) -> Result<CompiledWorkflow> {
        let text = Self::read(path)?;
        let compiled = self.compile_source(path, &text)?;
        fs::write(&compiled.lock_path, &compiled.yaml)
            .map_err(|e| AwError::io(&compiled.lock_path, e))?;
        info!(lock = %compiled.lock_path.display(), "lock file written");
        Ok(compiled)
    }

    /// Run every check without building jobs; returns the warnings
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn validate_file(&self, path: &Path) -> Result<Vec<String>> {
        let text = Self::read(path)?;
        let data = self.analyze(path, &text)?;
        let servers = collect_mcp_servers(&data);
        validate::validate(&data, &self.ctx.engines, &servers.warnings)
    }
}
