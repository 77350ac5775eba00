//! Lock-file emission
//!
//! Layout:
//!
//! ```text
//! # header comment (generator, source, imports, frontmatter-hash)
//! name / on / permissions / run-name / env / concurrency
//! jobs: activation, agent, safe_outputs, conclusion
//! ```
//!
//! Every `uses:` reference is pinned before serialization. Compiler-emitted
//! actions must be in the pin table; user steps are pinned when possible.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::{ActionPinResolver, Job};
use crate::ast::WorkflowData;
use crate::error::{AwError, Result};
use crate::permissions::Permissions;

/// A quoted pinned reference: `uses: 'owner/repo@<sha> # v1'`
static QUOTED_PIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(\s*(?:- )?uses: )['"]([^'"\s]+@[0-9a-f]{40}) # ([^'"]+)['"]$"#).unwrap()
});

/// Comment block at the top of every lock file
pub fn header_comment(data: &WorkflowData) -> String {
    let source = data
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| data.workflow_id.clone());

    let mut out = format!(
        "# This file was automatically generated by gh-aw (v{}). DO NOT EDIT.\n\
         #\n\
         # To update this file, edit the corresponding .md file and run:\n\
         #   gh aw compile\n\
         #\n\
         # Source: {}\n",
        data.version, source
    );
    if let Some(description) = &data.description {
        out.push_str("#\n");
        for line in description.lines() {
            if line.trim().is_empty() {
                out.push_str("#\n");
            } else {
                out.push_str(&format!("# {}\n", line.trim_end()));
            }
        }
    }
    let imports = data.import_paths();
    if !imports.is_empty() {
        out.push_str("#\n# Resolved workflow manifest:\n#   Imports:\n");
        for import in imports {
            out.push_str(&format!("#     - {}\n", import));
        }
    }
    out.push_str(&format!("#\n# frontmatter-hash: {}\n\n", data.frontmatter_hash));
    out
}

fn pin_raw_step(raw: &mut Value, pins: &ActionPinResolver) {
    let Some(map) = raw.as_mapping_mut() else {
        return;
    };
    let Some(uses) = map.get("uses").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    map.insert("uses".into(), pins.resolve_lenient(&uses).into());
}

/// Rewrite every `uses:` to its pinned form
pub fn pin_actions(jobs: &mut [Job], pins: &ActionPinResolver) -> Result<()> {
    for job in jobs {
        for step in &mut job.steps {
            if let Some(raw) = &mut step.raw {
                pin_raw_step(raw, pins);
            } else if let Some(uses) = &step.uses {
                step.uses = Some(pins.resolve(uses)?);
            }
        }
    }
    Ok(())
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Mapping(
        map.iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect(),
    )
}

/// Serialize the whole lock file. `jobs` must already be pinned and ordered.
pub fn emit_lock_file(
    data: &WorkflowData,
    on: Value,
    permissions: &Permissions,
    jobs: &[Job],
) -> Result<String> {
    let mut root = Mapping::new();
    root.insert("name".into(), data.name.as_str().into());
    root.insert("on".into(), on);
    root.insert("permissions".into(), permissions.to_yaml());
    if let Some(run_name) = &data.run_name {
        root.insert("run-name".into(), run_name.as_str().into());
    }
    if !data.env.is_empty() {
        root.insert("env".into(), string_map(&data.env));
    }
    if let Some(concurrency) = &data.concurrency {
        root.insert("concurrency".into(), concurrency.clone());
    }

    let mut job_map = Mapping::new();
    for job in jobs {
        if job_map.contains_key(job.id.as_str()) {
            return Err(AwError::Emit {
                reason: format!("job '{}' emitted twice", job.id),
            });
        }
        job_map.insert(job.id.as_str().into(), job.to_yaml());
    }
    root.insert("jobs".into(), Value::Mapping(job_map));

    let body = serde_yaml::to_string(&Value::Mapping(root))?;
    // the version after '#' must stay a YAML comment, not part of the ref
    let body = QUOTED_PIN_RE.replace_all(&body, "$1$2 # $3");
    debug!(bytes = body.len(), jobs = jobs.len(), "lock file rendered");
    Ok(format!("{}{}", header_comment(data), body))
}
