//! Least-privilege permissions for the `safe_outputs` job
//!
//! The job gets the union of the bundles of every configured type, plus
//! option-dependent extras. `id-token: write` is added when a user step in
//! `safe-outputs.steps` uses a known OIDC action or when the user asked for
//! it; `id-token: none` always wins.

use serde_yaml::Value;
use tracing::debug;

use super::{Level, Permissions, Scope};
use crate::safe_outputs::{SafeOutputOptions, SafeOutputsConfig};

/// Actions that exchange the workflow OIDC token for cloud credentials
pub const OIDC_ACTIONS: &[&str] = &[
    "aws-actions/configure-aws-credentials",
    "azure/login",
    "google-github-actions/auth",
    "hashicorp/vault-action",
    "cyberark/conjur-action",
    "octo-sts/action",
];

/// True when a `uses:` reference points at a known OIDC action
pub fn uses_oidc_action(uses: &str) -> bool {
    let action = uses.split('@').next().unwrap_or(uses).trim();
    OIDC_ACTIONS.iter().any(|known| action.eq_ignore_ascii_case(known))
}

fn step_uses_oidc(step: &Value) -> bool {
    step.get("uses")
        .and_then(Value::as_str)
        .is_some_and(uses_oidc_action)
}

/// Fold the per-type bundles and apply the `id-token` rule
pub fn solve_safe_outputs(config: &SafeOutputsConfig) -> Permissions {
    let mut perms = Permissions::new();

    for output in config.outputs.values() {
        for (scope, level) in output.kind.spec().permissions {
            perms.grant(*scope, *level);
        }
        match &output.options {
            SafeOutputOptions::AddComment { discussions: true, .. }
            | SafeOutputOptions::HideComment { discussions: true, .. } => {
                perms.grant(Scope::Discussions, Level::Write);
            }
            SafeOutputOptions::CreatePullRequest {
                fallback_as_issue: true,
                ..
            }
            | SafeOutputOptions::Missing {
                create_issue: true, ..
            }
            | SafeOutputOptions::Noop {
                report_as_issue: true,
            } => {
                perms.grant(Scope::Issues, Level::Write);
            }
            _ => {}
        }
    }

    match config.id_token {
        Some(Level::None) => {
            debug!("id-token suppressed by safe-outputs.id-token: none");
            perms.remove(Scope::IdToken);
        }
        Some(_) => perms.grant(Scope::IdToken, Level::Write),
        None => {
            if config.steps.iter().any(step_uses_oidc) {
                debug!("OIDC action detected in safe-outputs.steps, granting id-token: write");
                perms.grant(Scope::IdToken, Level::Write);
            }
        }
    }

    perms
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    fn config(yaml: &str) -> SafeOutputsConfig {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        SafeOutputsConfig::from_mapping(&m, &mut Vec::new()).unwrap()
    }

    #[test]
    fn create_issue_bundle() {
        let p = solve_safe_outputs(&config("create-issue:"));
        assert_eq!(p.level(Scope::Contents), Some(Level::Read));
        assert_eq!(p.level(Scope::Issues), Some(Level::Write));
        assert_eq!(p.iter().count(), 2);
    }

    #[test]
    fn union_keeps_maximum() {
        let p = solve_safe_outputs(&config("create-issue:\ncreate-pull-request:\n  fallback-as-issue: false"));
        assert_eq!(p.level(Scope::Contents), Some(Level::Write));
        assert_eq!(p.level(Scope::PullRequests), Some(Level::Write));
        assert_eq!(p.level(Scope::Issues), Some(Level::Write));
    }

    #[test]
    fn option_extras() {
        let p = solve_safe_outputs(&config("add-comment:"));
        assert_eq!(p.level(Scope::Discussions), Some(Level::Write));
        let p = solve_safe_outputs(&config("add-comment:\n  discussions: false"));
        assert_eq!(p.level(Scope::Discussions), None);

        let p = solve_safe_outputs(&config("create-pull-request:"));
        assert_eq!(p.level(Scope::Issues), Some(Level::Write));
        let p = solve_safe_outputs(&config("create-pull-request:\n  fallback-as-issue: false"));
        assert_eq!(p.level(Scope::Issues), None);

        let p = solve_safe_outputs(&config("missing-tool:\n  create-issue: false"));
        assert_eq!(p.level(Scope::Issues), None);
        let p = solve_safe_outputs(&config("missing-data:"));
        assert_eq!(p.level(Scope::Issues), Some(Level::Write));
    }

    #[test]
    fn oidc_action_adds_id_token() {
        let p = solve_safe_outputs(&config(
            "create-issue:\nsteps:\n  - uses: aws-actions/configure-aws-credentials@v4\n    with:\n      role-to-assume: arn",
        ));
        assert_eq!(p.level(Scope::IdToken), Some(Level::Write));
    }

    #[test]
    fn id_token_none_suppresses_detection() {
        let p = solve_safe_outputs(&config(
            "create-issue:\nid-token: none\nsteps:\n  - uses: azure/login@v2",
        ));
        assert_eq!(p.level(Scope::IdToken), None);
    }

    #[test]
    fn explicit_id_token_write() {
        let p = solve_safe_outputs(&config("noop:\nid-token: write"));
        assert_eq!(p.level(Scope::IdToken), Some(Level::Write));
    }

    #[test]
    fn oidc_matching_ignores_version() {
        assert!(uses_oidc_action("hashicorp/vault-action@v3"));
        assert!(uses_oidc_action("Azure/login@a1b2c3"));
        assert!(!uses_oidc_action("actions/checkout@v5"));
    }
}
