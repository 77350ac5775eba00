//! gh-aw - compiler from agentic workflow Markdown to GitHub Actions lock files
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           FRONT END                          │
//! │  frontmatter/  '---' header → serde_yaml::Mapping + schema   │
//! │  imports/      imports: graph, cycles, memoized parses       │
//! │  ast/          Mapping → WorkflowData (typed model)          │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DERIVATION PASSES                      │
//! │  validate/       aggregated invariant checks                 │
//! │  permissions/    scope sets + safe-output solver             │
//! │  checkout/       checkout merging                            │
//! │  safe_outputs/   type table + safe_outputs job               │
//! │  workflow_call   on.workflow_call.outputs injection          │
//! │  engine/         engines, MCP config, firewall               │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           BACK END                           │
//! │  jobs/      activation / agent / conclusion, DAG, emission   │
//! │  compiler   pipeline driver                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`frontmatter`] | Split the document, parse the header, JSON Schema check |
//! | [`imports`] | Resolve `imports:` depth-first, detect cycles, build the prompt |
//! | [`ast`] | Typed `WorkflowData`, built once per compile |
//! | [`validate`] | Ranges, guard policy, credentials, strict mode |
//! | [`permissions`] | `Permissions` and the least-privilege solver |
//! | [`checkout`] | Merge checkout requests, emit checkout steps |
//! | [`safe_outputs`] | Safe-output types and the `safe_outputs` job |
//! | [`engine`] | Copilot / Claude / Codex / Gemini / custom, MCP rendering |
//! | [`jobs`] | Job synthesis, `needs:` graph, lock-file emission |
//! | [`compiler`] | `Compiler` and `CompileContext` |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use gh_aw::{CompilerConfig, Compiler};
//!
//! let config = CompilerConfig::load()?.with_env();
//! let compiler = Compiler::from_config(&config)?;
//! let compiled = compiler.compile_file(Path::new(".github/workflows/triage.md"))?;
//! println!("wrote {}", compiled.lock_path.display());
//! # Ok::<(), gh_aw::AwError>(())
//! ```

// ═══════════════════════════════════════════════════════════════
// FRONT END - Markdown → typed model
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod frontmatter;
pub mod imports;

// ═══════════════════════════════════════════════════════════════
// DERIVATION PASSES
// ═══════════════════════════════════════════════════════════════
pub mod checkout;
pub mod engine;
pub mod permissions;
pub mod safe_outputs;
pub mod validate;
pub mod workflow_call;

// ═══════════════════════════════════════════════════════════════
// BACK END - Jobs and emission
// ═══════════════════════════════════════════════════════════════
pub mod compiler;
pub mod jobs;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration, helpers
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{AwError, ErrorKind, FixSuggestion, Result};

// Config types
pub use config::{ActionMode, CompilerConfig, TrialConfig};

// Compiler
pub use compiler::{CompileContext, CompiledWorkflow, Compiler};

// Model
pub use ast::{EngineKind, WorkflowData};

// Derivation passes
pub use checkout::{CheckoutConfig, CheckoutManager};
pub use permissions::{solve_safe_outputs, Level, Permissions, Scope};
pub use safe_outputs::{SafeOutputKind, SafeOutputsConfig};
pub use validate::ValidationReport;

// Jobs
pub use jobs::{Job, JobGraph, Step};
