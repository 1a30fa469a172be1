//! Lifecycle orchestrator.
//!
//! Each transition is a fixed, ordered list of [`Step`]s. Steps are
//! idempotent: a step either finds its work already done (and is skipped
//! through its `satisfied` precondition) or fully supersedes prior state.
//! The first failing step halts the transition; nothing is rolled back,
//! re-running the transition is the recovery path.
//!
//! ```text
//! UNINITIALIZED --init--> INITIALIZED <--turn_off/turn_on--> OFF
//!                            |   ^
//!                            +---+ update, restore
//! ```

mod transitions;

pub use transitions::{
    InitOptions, RestoreOptions, UpdateOptions, backup, init, load_env_params, restore,
    run_host_checks, turn_off, turn_on, update,
};

use anyhow::Result;
use tracing::{debug, info, instrument};

use nodeops_core::config::{NodePaths, Settings};
use nodeops_core::error::{NodeError, find_node_error};

use crate::guard::NodeState;
use crate::ui;

type Action<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;
type Precondition<'a> = Box<dyn Fn() -> bool + 'a>;

/// One named unit of work in a transition.
pub struct Step<'a> {
    pub name: &'static str,
    action: Action<'a>,
    satisfied: Option<Precondition<'a>>,
}

impl<'a> Step<'a> {
    pub fn new(name: &'static str, action: impl FnOnce() -> Result<()> + 'a) -> Self {
        Self {
            name,
            action: Box::new(action),
            satisfied: None,
        }
    }

    /// Skip the step when `satisfied` returns true at the time it would run.
    pub fn skip_if(mut self, satisfied: impl Fn() -> bool + 'a) -> Self {
        self.satisfied = Some(Box::new(satisfied));
        self
    }
}

/// Everything a transition reads before its first step.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub settings: Settings,
    pub paths: NodePaths,
    /// Read once at entry, never re-derived mid-transition.
    pub state: NodeState,
    pub uid: u32,
}

impl TransitionContext {
    pub fn new(settings: Settings, uid: u32) -> Self {
        let paths = settings.paths();
        let state = NodeState::read(&paths);
        Self {
            settings,
            paths,
            state,
            uid,
        }
    }
}

/// Run `steps` in order, halting on the first failure.
///
/// Uncategorised failures are wrapped in [`NodeError::StepFailed`];
/// failures that already carry a [`NodeError`] keep it so the exit code
/// reflects the real cause.
#[instrument(skip(steps), fields(steps = steps.len()))]
pub fn run_steps(transition: &str, steps: Vec<Step<'_>>) -> Result<()> {
    let total = steps.len();
    let progress = ui::Progress::new(transition, total);
    for (index, step) in steps.into_iter().enumerate() {
        let n = index + 1;
        if step.satisfied.as_ref().is_some_and(|done| done()) {
            debug!(step = step.name, "already satisfied");
            progress.skipped(n, step.name);
            continue;
        }
        progress.running(n, step.name);
        info!(step = step.name, n, total, "running step");
        (step.action)().map_err(|err| categorize(step.name, err))?;
    }
    progress.finished();
    info!("transition complete");
    Ok(())
}

fn categorize(step: &str, err: anyhow::Error) -> anyhow::Error {
    if find_node_error(&err).is_some() {
        err.context(format!("step '{step}' failed"))
    } else {
        NodeError::StepFailed {
            step: step.to_string(),
            detail: format!("{err:#}"),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeops_core::error::{ExitCode, exit_code_for};
    use std::cell::RefCell;

    #[test]
    fn test_steps_run_in_order_and_skip_satisfied() {
        let log = RefCell::new(Vec::new());
        let steps = vec![
            Step::new("first", || {
                log.borrow_mut().push("first");
                Ok(())
            }),
            Step::new("second", || {
                log.borrow_mut().push("second");
                Ok(())
            })
            .skip_if(|| true),
            Step::new("third", || {
                log.borrow_mut().push("third");
                Ok(())
            }),
        ];
        run_steps("test", steps).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "third"]);
    }

    #[test]
    fn test_failure_halts_remaining_steps() {
        let ran = RefCell::new(false);
        let steps = vec![
            Step::new("broken", || anyhow::bail!("disk full")),
            Step::new("after", || {
                *ran.borrow_mut() = true;
                Ok(())
            }),
        ];
        let err = run_steps("test", steps).unwrap_err();
        assert!(!*ran.borrow());
        assert_eq!(exit_code_for(&err), ExitCode::OperationExecutionError);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_categorised_failure_keeps_its_code() {
        let steps = vec![Step::new("guarded", || Err(NodeError::NotInited.into()))];
        let err = run_steps("test", steps).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::NodeStateError);
    }
}
