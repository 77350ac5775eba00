//! Handler manager configuration
//!
//! `GH_AW_SAFE_OUTPUTS_HANDLER_CONFIG` is a compact JSON object keyed by the
//! snake-case type name. Keys are sorted at every level so the lock file is
//! stable.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use super::{SafeOutput, SafeOutputOptions, SafeOutputsConfig};
use crate::ast::fields::scalar_string;
use crate::error::Result;
use crate::util::kebab_to_snake;

type Settings = BTreeMap<String, Json>;

fn put_str(out: &mut Settings, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        out.insert(key.to_string(), Json::String(v.clone()));
    }
}

fn put_list(out: &mut Settings, key: &str, values: &[String]) {
    if !values.is_empty() {
        out.insert(
            key.to_string(),
            Json::Array(values.iter().cloned().map(Json::String).collect()),
        );
    }
}

fn options_settings(options: &SafeOutputOptions, max_patch_size: Option<i64>, out: &mut Settings) {
    match options {
        SafeOutputOptions::None => {}
        SafeOutputOptions::CreateIssue {
            title_prefix,
            labels,
            assignees,
            close_older_issues,
        } => {
            put_str(out, "title_prefix", title_prefix);
            put_list(out, "labels", labels);
            put_list(out, "assignees", assignees);
            if let Some(t) = close_older_issues {
                out.insert("close_older_issues".into(), t.to_json());
            }
        }
        SafeOutputOptions::CreateDiscussion {
            title_prefix,
            category,
            labels,
            close_older_discussions,
        } => {
            put_str(out, "title_prefix", title_prefix);
            put_str(out, "category", category);
            put_list(out, "labels", labels);
            if let Some(t) = close_older_discussions {
                out.insert("close_older_discussions".into(), t.to_json());
            }
        }
        SafeOutputOptions::AddComment {
            discussions,
            hide_older_comments,
        } => {
            out.insert("discussions".into(), Json::Bool(*discussions));
            if *hide_older_comments {
                out.insert("hide_older_comments".into(), Json::Bool(true));
            }
        }
        SafeOutputOptions::HideComment {
            discussions,
            allowed_reasons,
        } => {
            out.insert("discussions".into(), Json::Bool(*discussions));
            put_list(out, "allowed_reasons", allowed_reasons);
        }
        SafeOutputOptions::CreatePullRequest {
            title_prefix,
            labels,
            reviewers,
            draft,
            fallback_as_issue,
            if_no_changes,
            ..
        } => {
            put_str(out, "title_prefix", title_prefix);
            put_list(out, "labels", labels);
            put_list(out, "reviewers", reviewers);
            if let Some(d) = draft {
                out.insert("draft".into(), d.to_json());
            }
            out.insert("fallback_as_issue".into(), Json::Bool(*fallback_as_issue));
            put_str(out, "if_no_changes", if_no_changes);
            if let Some(size) = max_patch_size {
                out.insert("max_patch_size".into(), Json::from(size));
            }
        }
        SafeOutputOptions::PushToPullRequestBranch {
            title_prefix,
            labels,
            if_no_changes,
        } => {
            put_str(out, "title_prefix", title_prefix);
            put_list(out, "labels", labels);
            put_str(out, "if_no_changes", if_no_changes);
            if let Some(size) = max_patch_size {
                out.insert("max_patch_size".into(), Json::from(size));
            }
        }
        SafeOutputOptions::Labels { allowed } => put_list(out, "allowed", allowed),
        SafeOutputOptions::Reviewers { reviewers } => put_list(out, "reviewers", reviewers),
        SafeOutputOptions::Close {
            required_labels,
            required_title_prefix,
        } => {
            put_list(out, "required_labels", required_labels);
            put_str(out, "required_title_prefix", required_title_prefix);
        }
        SafeOutputOptions::UploadAsset {
            branch,
            max_size_kb,
            allowed_exts,
        } => {
            put_str(out, "branch", branch);
            if let Some(size) = max_size_kb {
                out.insert("max_size_kb".into(), Json::from(*size));
            }
            put_list(out, "allowed_exts", allowed_exts);
        }
        SafeOutputOptions::DispatchWorkflow { workflows } => put_list(out, "workflows", workflows),
        SafeOutputOptions::Missing {
            create_issue,
            title_prefix,
            labels,
        } => {
            out.insert("create_issue".into(), Json::Bool(*create_issue));
            put_str(out, "title_prefix", title_prefix);
            put_list(out, "labels", labels);
        }
        SafeOutputOptions::Noop { report_as_issue } => {
            out.insert("report_as_issue".into(), Json::Bool(*report_as_issue));
        }
    }
}

fn output_settings(output: &SafeOutput, config: &SafeOutputsConfig) -> Result<Settings> {
    let mut out = Settings::new();
    out.insert("max".into(), output.effective_max().to_json());
    put_str(&mut out, "github-token", &output.base.github_token);
    put_str(&mut out, "target-repo", &output.base.target_repo);
    put_list(&mut out, "allowed-repos", &output.base.allowed_repos);
    put_str(&mut out, "target", &output.base.target);
    if output.base.staged == Some(true) {
        out.insert("staged".into(), Json::Bool(true));
    }
    options_settings(&output.options, config.max_patch_size, &mut out);

    for (k, v) in &output.base.extra {
        if let Some(key) = scalar_string(k) {
            out.entry(kebab_to_snake(&key))
                .or_insert(serde_json::to_value(v)?);
        }
    }
    Ok(out)
}

/// Compact JSON with sorted keys
pub fn handler_config_json(config: &SafeOutputsConfig) -> Result<String> {
    let mut root: BTreeMap<String, Settings> = BTreeMap::new();
    for output in config.outputs.values() {
        root.insert(output.kind.snake_key(), output_settings(output, config)?);
    }
    Ok(serde_json::to_string(&root)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_yaml::Mapping;

    fn json(yaml: &str) -> String {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        let config = SafeOutputsConfig::from_mapping(&m, &mut Vec::new()).unwrap();
        handler_config_json(&config).unwrap()
    }

    #[test]
    fn keys_are_sorted_and_compact() {
        assert_eq!(
            json("noop:\ncreate-issue:\n  title-prefix: '[bot] '\n  labels: [a, b]"),
            r#"{"create_issue":{"labels":["a","b"],"max":1,"title_prefix":"[bot] "},"noop":{"max":1,"report_as_issue":false}}"#
        );
    }

    #[test]
    fn expression_max_stays_a_string() {
        let out = json("add-comment:\n  max: ${{ inputs.max }}\n  discussions: false");
        assert_eq!(
            out,
            r#"{"add_comment":{"discussions":false,"max":"${{ inputs.max }}"}}"#
        );
    }

    #[test]
    fn per_output_token_and_extras() {
        let out = json(
            "add-labels:\n  github-token: ${{ secrets.LABELS }}\n  allowed: [bug]\n  blocked-labels: [wontfix]",
        );
        assert_eq!(
            out,
            r#"{"add_labels":{"allowed":["bug"],"blocked_labels":["wontfix"],"github-token":"${{ secrets.LABELS }}","max":3}}"#
        );
    }

    #[test]
    fn patch_size_goes_to_git_types() {
        let out = json("create-pull-request:\n  draft: true\nmax-patch-size: 2048");
        assert!(out.contains(r#""max_patch_size":2048"#));
        assert!(out.contains(r#""draft":true"#));
        assert!(out.contains(r#""fallback_as_issue":true"#));
    }
}
