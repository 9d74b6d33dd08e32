//! Step gating: completion, selectability and the reasons behind them.
//!
//! Pure functions over a snapshot and the accumulated state. Every consumer
//! (dispatcher, release driver, status report) asks these and nothing else.

use serde::Serialize;

use crate::platform::types::CheckState;
use crate::status::SystemStatusSnapshot;

use super::state::WorkflowState;
use super::types::WorkflowStep;

const RESOLVE_PREREQUISITES: &str = "Resolve the red issues in system status before continuing.";

/// Whether the branch steps have anything to do.
///
/// False without a repository. A dirty tree always needs them; a clean tree
/// needs them only once the branch flow has started.
pub fn needs_branch_steps(snapshot: &SystemStatusSnapshot, state: &WorkflowState) -> bool {
    if snapshot.repo_root.is_none() {
        return false;
    }
    if !snapshot.is_clean {
        return true;
    }
    state.branch_flow_started()
}

pub fn is_completed(
    step: WorkflowStep,
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> bool {
    let optional = !needs_branch_steps(snapshot, state);
    let pr = state.pull_request.is_some();
    let merged = state.pr_merged;
    let deleted = state.branch_deleted;

    match step {
        WorkflowStep::CheckStatus => {
            snapshot.prerequisites_met()
                && (snapshot.is_clean || state.intents.dirty_workspace_acknowledged)
        }
        WorkflowStep::CreateBranch => optional || state.branch_created,
        WorkflowStep::CaptureChanges => {
            optional
                || state.changes_captured
                || state.changes_committed
                || state.branch_pushed
                || pr
                || merged
                || deleted
        }
        WorkflowStep::CommitChanges => {
            optional || state.changes_committed || state.branch_pushed || pr || merged || deleted
        }
        WorkflowStep::PushBranch => optional || state.branch_pushed || pr || merged || deleted,
        WorkflowStep::OpenPr => optional || pr || merged || deleted,
        WorkflowStep::MergePr => optional || merged || deleted,
        WorkflowStep::DeleteBranch => optional || deleted,
        WorkflowStep::SetRelease => {
            if state.intents.is_new_release {
                state.version_written
            } else {
                snapshot.version_matches_tag && !snapshot.version.is_empty()
            }
        }
        WorkflowStep::CreateTag => state.tag_created || snapshot.version_matches_tag,
        WorkflowStep::SyncChangelog | WorkflowStep::ReviewFinish => state.changelog_synced,
    }
}

/// First step whose predecessors are not all complete, if any.
fn first_incomplete_before(
    step: WorkflowStep,
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> Option<WorkflowStep> {
    step.predecessors()
        .iter()
        .copied()
        .find(|s| !is_completed(*s, snapshot, state))
}

pub fn is_selectable(
    step: WorkflowStep,
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> bool {
    snapshot.prerequisites_met() && first_incomplete_before(step, snapshot, state).is_none()
}

/// Why `step` cannot be selected yet; `None` when it can.
pub fn blocked_reason(
    step: WorkflowStep,
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> Option<String> {
    if !snapshot.prerequisites_met() {
        return Some(RESOLVE_PREREQUISITES.to_string());
    }
    let missing = first_incomplete_before(step, snapshot, state)?;
    let reason = match (step, missing) {
        (WorkflowStep::CreateTag, WorkflowStep::SetRelease) => {
            "VERSION must be set before tagging.".to_string()
        }
        (WorkflowStep::SyncChangelog, WorkflowStep::CreateTag) => {
            "Create the release tag first so items map correctly.".to_string()
        }
        (WorkflowStep::ReviewFinish, WorkflowStep::SyncChangelog) => {
            "Run the changelog sync before final review.".to_string()
        }
        _ => format!("Complete \"{missing}\" first."),
    };
    Some(reason)
}

/// What still has to happen for `step` to count as complete; `None` when it is.
pub fn pending_reason(
    step: WorkflowStep,
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> Option<String> {
    if is_completed(step, snapshot, state) {
        return None;
    }
    let reason = match step {
        WorkflowStep::CheckStatus if !snapshot.prerequisites_met() => {
            RESOLVE_PREREQUISITES.to_string()
        }
        WorkflowStep::CheckStatus => {
            "Local changes detected. Acknowledge them to carry them through the branch steps."
                .to_string()
        }
        WorkflowStep::CreateBranch => "Create a feature branch for the local changes.".to_string(),
        WorkflowStep::CaptureChanges => "Stage the local changes.".to_string(),
        WorkflowStep::CommitChanges => "Commit the staged changes.".to_string(),
        WorkflowStep::PushBranch => "Push the branch to origin.".to_string(),
        WorkflowStep::OpenPr => "Open a pull request for the branch.".to_string(),
        WorkflowStep::MergePr => match &state.checks {
            Some(checks) if checks.state == CheckState::Success => {
                "Checks are green. Merge the pull request.".to_string()
            }
            Some(checks) => format!(
                "Checks are {}. Wait for them to pass before merging.",
                checks.state
            ),
            None => "Refresh the pull request checks, then merge.".to_string(),
        },
        WorkflowStep::DeleteBranch => "Delete the merged branch from origin.".to_string(),
        WorkflowStep::SetRelease if state.intents.is_new_release => {
            "Enter a release number and write VERSION.".to_string()
        }
        WorkflowStep::SetRelease => "Update VERSION to match the latest tag.".to_string(),
        WorkflowStep::CreateTag => {
            format!("Create the release tag v{}.", snapshot.version)
        }
        WorkflowStep::SyncChangelog => "Run the changelog sync.".to_string(),
        WorkflowStep::ReviewFinish => "Run the changelog sync before final review.".to_string(),
    };
    Some(reason)
}

/// Lowest-rank step that is not complete.
pub fn next_incomplete(
    snapshot: &SystemStatusSnapshot,
    state: &WorkflowState,
) -> Option<WorkflowStep> {
    WorkflowStep::ALL
        .into_iter()
        .find(|s| !is_completed(*s, snapshot, state))
}

/// Where the workflow stands; the terminal step once everything is done.
pub fn active_step(snapshot: &SystemStatusSnapshot, state: &WorkflowState) -> WorkflowStep {
    next_incomplete(snapshot, state).unwrap_or(WorkflowStep::TERMINAL)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepGate {
    pub step: WorkflowStep,
    pub title: &'static str,
    pub completed: bool,
    pub selectable: bool,
    pub blocked_reason: Option<String>,
    pub pending_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub prerequisites_met: bool,
    pub needs_branch_steps: bool,
    pub next_incomplete: Option<WorkflowStep>,
    pub steps: Vec<StepGate>,
}

pub fn evaluate(snapshot: &SystemStatusSnapshot, state: &WorkflowState) -> GateReport {
    let steps = WorkflowStep::ALL
        .into_iter()
        .map(|step| StepGate {
            step,
            title: step.title(),
            completed: is_completed(step, snapshot, state),
            selectable: is_selectable(step, snapshot, state),
            blocked_reason: blocked_reason(step, snapshot, state),
            pending_reason: pending_reason(step, snapshot, state),
        })
        .collect();

    GateReport {
        prerequisites_met: snapshot.prerequisites_met(),
        needs_branch_steps: needs_branch_steps(snapshot, state),
        next_incomplete: next_incomplete(snapshot, state),
        steps,
    }
}
