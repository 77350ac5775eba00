//! `workflow_call` output injection
//!
//! A reusable workflow exposes the named outputs of its safe_outputs and
//! conclusion jobs to its caller:
//!
//! ```yaml
//! on:
//!   workflow_call:
//!     outputs:
//!       created_issue_number:
//!         description: Number of the created issue
//!         value: ${{ jobs.safe_outputs.outputs.created_issue_number }}
//! ```
//!
//! User-declared outputs keep their position and win on collisions.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::ast::Trigger;
use crate::safe_outputs::SafeOutputsConfig;

const WORKFLOW_CALL: &str = "workflow_call";

/// The `on:` value to emit. Unchanged unless outputs are injected.
pub fn inject_outputs(trigger: &Trigger, safe_outputs: &SafeOutputsConfig) -> Value {
    let named = safe_outputs.named_outputs();
    if !trigger.uses_workflow_call() || named.is_empty() {
        return trigger.raw.clone();
    }

    let mut on = trigger.to_mapping();
    let mut call = match on.get(WORKFLOW_CALL) {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    };
    let mut outputs = match call.get("outputs") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    };

    for output in named {
        if outputs.contains_key(output.name) {
            debug!(output = output.name, "keeping user-declared workflow_call output");
            continue;
        }
        let mut entry = Mapping::new();
        entry.insert("description".into(), output.description.into());
        entry.insert("value".into(), output.job_expr().into());
        outputs.insert(output.name.into(), Value::Mapping(entry));
    }

    call.insert("outputs".into(), Value::Mapping(outputs));
    on.insert(WORKFLOW_CALL.into(), Value::Mapping(call));
    Value::Mapping(on)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> SafeOutputsConfig {
        let map: Mapping = serde_yaml::from_str(yaml).unwrap();
        SafeOutputsConfig::from_mapping(&map, &mut Vec::new()).unwrap()
    }

    fn trigger(yaml: &str) -> Trigger {
        Trigger::new(serde_yaml::from_str(yaml).unwrap())
    }

    fn output_keys(on: &Value) -> Vec<String> {
        on["workflow_call"]["outputs"]
            .as_mapping()
            .map(|m| m.keys().filter_map(|k| k.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn injects_create_issue_outputs() {
        let on = inject_outputs(&trigger("workflow_call"), &config("create-issue:"));
        assert_eq!(output_keys(&on), vec!["created_issue_number", "created_issue_url"]);
        assert_eq!(
            on["workflow_call"]["outputs"]["created_issue_number"]["value"].as_str(),
            Some("${{ jobs.safe_outputs.outputs.created_issue_number }}")
        );
    }

    #[test]
    fn list_form_is_normalized_only_when_injecting() {
        let t = trigger("[push, workflow_call]");
        let on = inject_outputs(&t, &config("create-issue:"));
        assert!(on.is_mapping());
        assert!(on["push"].is_null());

        let unchanged = inject_outputs(&t, &config("noop:"));
        assert_eq!(unchanged, t.raw);
    }

    #[test]
    fn user_outputs_win_and_keep_position() {
        let t = trigger(
            "workflow_call:\n  outputs:\n    created_issue_url:\n      description: mine\n      value: x\n    other:\n      value: y",
        );
        let on = inject_outputs(&t, &config("create-issue:"));
        assert_eq!(
            output_keys(&on),
            vec!["created_issue_url", "other", "created_issue_number"]
        );
        assert_eq!(
            on["workflow_call"]["outputs"]["created_issue_url"]["value"].as_str(),
            Some("x")
        );
    }

    #[test]
    fn no_workflow_call_means_no_change() {
        let t = trigger("issues:\n  types: [opened]");
        assert_eq!(inject_outputs(&t, &config("create-issue:")), t.raw);
    }

    #[test]
    fn missing_counts_come_from_the_conclusion_job() {
        let on = inject_outputs(&trigger("workflow_call"), &config("missing-tool:\nmissing-data:"));
        assert_eq!(output_keys(&on), vec!["missing_tool_count", "missing_data_count"]);
        assert_eq!(
            on["workflow_call"]["outputs"]["missing_data_count"]["value"].as_str(),
            Some("${{ jobs.conclusion.outputs.missing_data_count }}")
        );
    }
}
