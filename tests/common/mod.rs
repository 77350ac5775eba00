//! Shared helpers for the integration tests
//!
//! Compiles sources through the public API with a fixed version and the
//! default (dev) action mode, so lock files do not depend on the
//! environment the tests run in.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use gh_aw::{CompileContext, CompiledWorkflow, Compiler, CompilerConfig, Result};
use serde_yaml::Value;

/// Version stamped into every test lock file
pub const TEST_VERSION: &str = "0.0.0-test";

/// Workflow path used for in-memory sources
pub const WORKFLOW_PATH: &str = "/repo/.github/workflows/test-workflow.md";

pub fn compiler_with(config: &CompilerConfig) -> Compiler {
    let ctx = CompileContext::new(config).with_version(TEST_VERSION);
    Compiler::new(ctx).expect("embedded schema compiles")
}

pub fn compiler() -> Compiler {
    compiler_with(&CompilerConfig::default())
}

/// Compile an in-memory source
pub fn compile_str(text: &str) -> Result<CompiledWorkflow> {
    compiler().compile_source(Path::new(WORKFLOW_PATH), text)
}

/// Compile and parse the lock file back into YAML
pub fn compile_yaml(text: &str) -> Value {
    let compiled = compile_str(text).expect("workflow compiles");
    parse_lock(&compiled.yaml)
}

pub fn parse_lock(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).expect("lock file is valid YAML")
}

/// Front-matter + body
pub fn workflow(frontmatter: &str, body: &str) -> String {
    format!("---\n{}\n---\n{}\n", frontmatter.trim_end(), body)
}

/// Write `content` at `dir/rel`, creating parent directories
pub fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, content).expect("write file");
    path
}

/// Steps of `job` as a list
pub fn steps<'a>(lock: &'a Value, job: &str) -> &'a Vec<Value> {
    lock["jobs"][job]["steps"]
        .as_sequence()
        .unwrap_or_else(|| panic!("job '{}' has steps", job))
}

/// The step of `job` with this name
pub fn step<'a>(lock: &'a Value, job: &str, name: &str) -> &'a Value {
    steps(lock, job)
        .iter()
        .find(|s| s["name"].as_str() == Some(name))
        .unwrap_or_else(|| panic!("job '{}' has step '{}'", job, name))
}

/// Job ids in emission order
pub fn job_ids(lock: &Value) -> Vec<String> {
    lock["jobs"]
        .as_mapping()
        .map(|m| m.keys().filter_map(|k| k.as_str().map(String::from)).collect())
        .unwrap_or_default()
}
