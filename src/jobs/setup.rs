//! Setup steps shared by every generated job
//!
//! The setup action copies runtime scripts to [`ACTIONS_DIR`]. How it is
//! referenced depends on the action mode:
//!
//! | mode | step |
//! |------|------|
//! | dev | checkout `actions/` + `uses: ./actions/setup` |
//! | release | `uses: github/gh-aw/actions/setup@v<version>` |
//! | script | checkout `actions/` + `run: bash ./actions/setup/setup.sh` |

use super::{pins, Step};
use crate::compiler::CompileContext;
use crate::config::ActionMode;
use crate::util::constants::ACTIONS_DIR;

fn checkout_actions_folder() -> Step {
    Step::named("Checkout actions folder")
        .uses(pins::CHECKOUT)
        .with("sparse-checkout", "actions")
        .with("persist-credentials", false)
}

/// Steps that make the runtime scripts available
pub fn setup_steps(ctx: &CompileContext) -> Vec<Step> {
    match ctx.action_mode {
        ActionMode::Dev => vec![
            checkout_actions_folder(),
            Step::named("Setup Scripts")
                .uses("./actions/setup")
                .with("destination", ACTIONS_DIR),
        ],
        ActionMode::Release => vec![Step::named("Setup Scripts")
            .uses(format!("github/gh-aw/actions/setup@v{}", ctx.version))
            .with("destination", ACTIONS_DIR)],
        ActionMode::Script => vec![
            checkout_actions_folder(),
            Step::named("Setup Scripts")
                .env("INPUT_DESTINATION", ACTIONS_DIR)
                .run("bash ./actions/setup/setup.sh"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(mode: ActionMode) -> CompileContext {
        CompileContext::for_tests().with_action_mode(mode)
    }

    #[test]
    fn dev_uses_local_action() {
        let steps = setup_steps(&ctx(ActionMode::Dev));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].uses.as_deref(), Some("./actions/setup"));
    }

    #[test]
    fn release_references_tagged_action() {
        let c = ctx(ActionMode::Release);
        let steps = setup_steps(&c);
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].uses.clone().unwrap(),
            format!("github/gh-aw/actions/setup@v{}", c.version)
        );
    }

    #[test]
    fn script_mode_runs_shell() {
        let steps = setup_steps(&ctx(ActionMode::Script));
        assert!(steps[1].run.as_deref().unwrap().contains("actions/setup/setup.sh"));
        assert!(steps[1].uses.is_none());
    }
}
