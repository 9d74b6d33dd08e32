//! Walks the workflow forward one dispatched action at a time.

use serde::Serialize;

use crate::platform::types::CheckState;
use crate::shutdown::StopSignal;
use crate::status::SystemStatusSnapshot;
use crate::workflow::gate;
use crate::workflow::{ActionFailure, ActionOutcome, Dispatcher, WorkflowAction, WorkflowState, WorkflowStep};

/// Upper bound on actions per run; a full branch flow needs about a dozen.
const MAX_ACTIONS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextMove {
    Run(WorkflowAction),
    Blocked { step: WorkflowStep, reason: String },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Finished,
    Blocked { step: WorkflowStep, detail: String },
    Failed(ActionFailure),
    Interrupted,
    ActionLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRun {
    pub outcomes: Vec<ActionOutcome>,
    pub stop: StopReason,
}

/// Choose the action that moves the first incomplete step forward.
///
/// `last` is the previous action in this run; a wait that ended with checks
/// still pending is not repeated.
pub fn next_move(
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
    last: Option<WorkflowAction>,
) -> NextMove {
    let Some(step) = gate::next_incomplete(snapshot, state) else {
        return NextMove::Done;
    };
    let intents = &state.intents;
    let blocked = |reason: &str| NextMove::Blocked {
        step,
        reason: reason.to_string(),
    };

    match step {
        WorkflowStep::CheckStatus if !snapshot.prerequisites_met() => blocked(
            "Resolve the red issues in system status before continuing.",
        ),
        WorkflowStep::CheckStatus => blocked(
            "Local changes detected. Re-run with --acknowledge-dirty to carry them through the branch steps.",
        ),
        WorkflowStep::CreateBranch if intents.branch_name.trim().is_empty() => {
            blocked("Pass --branch to name the feature branch.")
        }
        WorkflowStep::CreateBranch => NextMove::Run(WorkflowAction::CreateBranch),
        WorkflowStep::CaptureChanges => NextMove::Run(WorkflowAction::StageChanges),
        WorkflowStep::CommitChanges if intents.commit_message.trim().is_empty() => {
            blocked("Pass --commit-message to commit the staged changes.")
        }
        WorkflowStep::CommitChanges => NextMove::Run(WorkflowAction::CommitChanges),
        WorkflowStep::PushBranch => NextMove::Run(WorkflowAction::PushBranch),
        WorkflowStep::OpenPr if intents.pr_title.trim().is_empty() => {
            blocked("Pass --pr-title to open the pull request.")
        }
        WorkflowStep::OpenPr => NextMove::Run(WorkflowAction::OpenPullRequest),
        WorkflowStep::MergePr => match state.checks.as_ref().map(|c| c.state) {
            Some(CheckState::Success) => NextMove::Run(WorkflowAction::MergePullRequest),
            Some(CheckState::Failure) => {
                blocked("Checks failed. Fix the pull request, push again and re-run.")
            }
            Some(other) if last == Some(WorkflowAction::WaitForChecks) => NextMove::Blocked {
                step,
                reason: format!("Checks are still {other}. Re-run once they have finished."),
            },
            _ => NextMove::Run(WorkflowAction::WaitForChecks),
        },
        WorkflowStep::DeleteBranch => NextMove::Run(WorkflowAction::DeleteBranch),
        WorkflowStep::SetRelease if !intents.is_new_release => {
            blocked("Update VERSION to match the latest tag, or drop --existing-release.")
        }
        WorkflowStep::SetRelease if intents.new_version.trim().is_empty() => {
            blocked("Pass --version with the new release number.")
        }
        WorkflowStep::SetRelease => NextMove::Run(WorkflowAction::WriteVersion),
        WorkflowStep::CreateTag => NextMove::Run(WorkflowAction::CreateTag),
        WorkflowStep::SyncChangelog => NextMove::Run(WorkflowAction::SyncChangelog),
        WorkflowStep::ReviewFinish => blocked("Run the changelog sync before final review."),
    }
}

/// Drive the workflow until it finishes, blocks, fails or is interrupted.
///
/// `observe` sees every outcome as it lands.
pub async fn drive<F>(dispatcher: &mut Dispatcher, stop: &StopSignal, mut observe: F) -> ReleaseRun
where
    F: FnMut(&ActionOutcome),
{
    let mut outcomes = Vec::new();
    let mut last = None;

    for _ in 0..MAX_ACTIONS {
        if stop.is_requested() {
            tracing::info!("Release run interrupted");
            return ReleaseRun {
                outcomes,
                stop: StopReason::Interrupted,
            };
        }

        let action = match next_move(&dispatcher.snapshot(), dispatcher.state(), last) {
            NextMove::Done => {
                tracing::info!("Release workflow complete");
                return ReleaseRun {
                    outcomes,
                    stop: StopReason::Finished,
                };
            }
            NextMove::Blocked { step, reason } => {
                tracing::info!(step = ?step, reason = %reason, "Release run blocked");
                return ReleaseRun {
                    outcomes,
                    stop: StopReason::Blocked {
                        step,
                        detail: reason,
                    },
                };
            }
            NextMove::Run(action) => action,
        };

        let outcome = dispatcher.execute(action).await;
        observe(&outcome);
        outcomes.push(outcome.clone());
        last = Some(action);

        if let ActionOutcome::Failed(failure) = outcome {
            return ReleaseRun {
                outcomes,
                stop: StopReason::Failed(failure),
            };
        }
    }

    tracing::warn!(limit = MAX_ACTIONS, "Release run hit the action limit");
    ReleaseRun {
        outcomes,
        stop: StopReason::ActionLimit,
    }
}
