//! Jobs Module - job synthesis and lock-file emission
//!
//! - `model`: `Job` / `Step` builders with fixed key order
//! - `activation`: run info, secret check, prompt
//! - `agent`: checkouts, engine install, MCP setup, execution, artifacts
//! - `conclusion`: noop / missing reports / failure handling
//! - `graph`: `needs:` DAG with cycle detection
//! - `emit`: header comment, top-level keys, action pinning
//! - `pins`, `scripts`, `setup`: shared plumbing

mod activation;
mod agent;
mod conclusion;
mod emit;
mod graph;
mod model;
pub mod pins;
mod scripts;
mod setup;

pub use activation::{build_activation_job, prompt_placeholders};
pub use agent::build_agent_job;
pub use conclusion::build_conclusion_job;
pub use emit::{emit_lock_file, header_comment, pin_actions};
pub use graph::JobGraph;
pub use model::{Job, Step};
pub use pins::ActionPinResolver;
pub use scripts::ScriptRegistry;
pub use setup::setup_steps;
