use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::{AppError, ErrorKind, Precondition, Result};
use crate::platform::types::{CheckState, CreatePullRequest, RepoSlug};
use crate::status::SystemStatusSnapshot;
use crate::workspace::git::validate_branch_name;
use crate::workspace::version::normalize_version;

use super::action::{Job, WorkflowAction, WorkflowServices};
use super::gate;
use super::state::{Effect, ReleaseIntents, WorkflowState};
use super::types::WorkflowStep;

/// A failed action: what went wrong and what to do about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub action: WorkflowAction,
    pub message: String,
    pub kind: ErrorKind,
    pub fix: &'static str,
}

impl ActionFailure {
    fn new(action: WorkflowAction, error: &AppError) -> Self {
        let kind = error.kind();
        Self {
            action,
            message: error.to_string(),
            kind,
            fix: kind.suggested_fix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded {
        action: WorkflowAction,
        message: String,
    },
    Failed(ActionFailure),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded { .. })
    }
}

type ActionResult = Result<(Effect, SystemStatusSnapshot)>;

/// The action currently running on its own task.
struct InFlight {
    action: WorkflowAction,
    handle: JoinHandle<ActionResult>,
}

/// Sole owner of the workflow state. Runs one action at a time.
pub struct Dispatcher {
    services: Arc<WorkflowServices>,
    state: WorkflowState,
    snapshot: Arc<SystemStatusSnapshot>,
    active_step: WorkflowStep,
    in_flight: Option<InFlight>,
    last_outcome: Option<ActionOutcome>,
}

impl Dispatcher {
    pub fn new(
        services: WorkflowServices,
        intents: ReleaseIntents,
        snapshot: SystemStatusSnapshot,
    ) -> Self {
        let mut state = WorkflowState {
            intents,
            ..WorkflowState::default()
        };
        state.apply(Effect::StatusRefreshed, &snapshot);
        let active_step = gate::active_step(&snapshot, &state);

        Self {
            services: Arc::new(services),
            state,
            snapshot: Arc::new(snapshot),
            active_step,
            in_flight: None,
            last_outcome: None,
        }
    }

    /// Collect status on the blocking pool, then build the dispatcher around the result.
    pub async fn bootstrap(services: WorkflowServices, intents: ReleaseIntents) -> Result<Self> {
        let prober = services.prober.clone();
        let snapshot = tokio::task::spawn_blocking(move || prober.probe())
            .await
            .map_err(|e| AppError::Internal(format!("status probe task panicked: {e}")))?;
        Ok(Self::new(services, intents, snapshot))
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn snapshot(&self) -> Arc<SystemStatusSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn active_step(&self) -> WorkflowStep {
        self.active_step
    }

    pub fn last_outcome(&self) -> Option<&ActionOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Intents may change between actions; gates read them on the next evaluation.
    pub fn intents_mut(&mut self) -> &mut ReleaseIntents {
        &mut self.state.intents
    }

    pub fn acknowledge_dirty_workspace(&mut self, acknowledged: bool) {
        self.state.intents.dirty_workspace_acknowledged = acknowledged;
        self.active_step = gate::active_step(&self.snapshot, &self.state);
    }

    pub fn set_session_token(&self, token: Option<String>) {
        self.services.prober.tokens().set_session_token(token);
    }

    /// Point the workflow at `step` if its gate is open.
    pub fn select_step(&mut self, step: WorkflowStep) -> Result<()> {
        self.ensure_selectable(step)?;
        self.active_step = step;
        Ok(())
    }

    /// The action currently running, if any.
    pub fn in_flight(&self) -> Option<WorkflowAction> {
        self.in_flight.as_ref().map(|f| f.action)
    }

    /// Validate and launch `action` on its own task.
    ///
    /// Fails without side effects when another action is running, the step
    /// gate is closed, or an input precondition does not hold. The task stays
    /// owned by the dispatcher until `wait` collects it.
    pub fn start(&mut self, action: WorkflowAction) -> Result<()> {
        let job = match self.plan(action) {
            Ok(job) => job,
            Err(e) => {
                self.record_failure(action, &e);
                return Err(e);
            }
        };

        tracing::info!(action = %action, step = ?action.step(), "{}", action.progress_message());

        let services = Arc::clone(&self.services);
        let handle = tokio::spawn(async move {
            let effect = job.run(&services).await?;
            let prober = services.prober.clone();
            let snapshot = tokio::task::spawn_blocking(move || prober.probe())
                .await
                .map_err(|e| AppError::Internal(format!("status probe task panicked: {e}")))?;
            Ok::<_, AppError>((effect, snapshot))
        });
        self.in_flight = Some(InFlight { action, handle });
        Ok(())
    }

    /// Wait for the running action and apply its result. `None` when idle.
    ///
    /// Dropping this future before it resolves leaves the task in place, so a
    /// later call still collects it.
    pub async fn wait(&mut self) -> Option<ActionOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let joined = (&mut in_flight.handle).await;
        let action = in_flight.action;
        self.in_flight = None;

        let result = joined
            .unwrap_or_else(|e| Err(AppError::Internal(format!("{action} task failed: {e}"))));
        Some(self.finish(action, result))
    }

    /// Apply a completed action. On failure the workflow state is left as it was.
    fn finish(&mut self, action: WorkflowAction, result: ActionResult) -> ActionOutcome {
        let outcome = match result {
            Ok((effect, snapshot)) => {
                let message = effect.success_message();
                self.state.apply(effect, &snapshot);
                self.snapshot = Arc::new(snapshot);
                self.active_step = gate::active_step(&self.snapshot, &self.state);

                tracing::info!(
                    action = %action,
                    active_step = ?self.active_step,
                    "{message}"
                );
                ActionOutcome::Succeeded { action, message }
            }
            Err(e) => {
                let failure = ActionFailure::new(action, &e);
                tracing::warn!(action = %action, kind = ?failure.kind, error = %e, "Action failed");
                ActionOutcome::Failed(failure)
            }
        };

        self.last_outcome = Some(outcome.clone());
        outcome
    }

    /// Start, wait and finish in one call.
    pub async fn execute(&mut self, action: WorkflowAction) -> ActionOutcome {
        if let Err(e) = self.start(action) {
            return ActionOutcome::Failed(ActionFailure::new(action, &e));
        }
        match self.wait().await {
            Some(outcome) => outcome,
            None => ActionOutcome::Failed(ActionFailure::new(
                action,
                &AppError::Internal(format!("{action} was not running")),
            )),
        }
    }

    fn record_failure(&mut self, action: WorkflowAction, error: &AppError) {
        tracing::warn!(action = %action, error = %error, "Action refused");
        self.last_outcome = Some(ActionOutcome::Failed(ActionFailure::new(action, error)));
    }

    fn ensure_selectable(&self, step: WorkflowStep) -> Result<()> {
        if gate::is_selectable(step, &self.snapshot, &self.state) {
            return Ok(());
        }
        let reason = gate::blocked_reason(step, &self.snapshot, &self.state).unwrap_or_default();
        Err(Precondition::StepUnavailable { step, reason }.into())
    }

    /// Synchronous preconditions: single-flight, the step gate, then inputs.
    fn plan(&self, action: WorkflowAction) -> Result<Job> {
        if self.in_flight.is_some() {
            return Err(Precondition::Busy.into());
        }
        if let Some(step) = action.step() {
            self.ensure_selectable(step)?;
        }

        let intents = &self.state.intents;
        let job = match action {
            WorkflowAction::RefreshStatus => Job::Refresh,

            WorkflowAction::CreateBranch => {
                let branch = required(&intents.branch_name, "Branch name")?;
                validate_branch_name(&branch)?;
                Job::CreateBranch {
                    root: self.repo_root()?,
                    branch,
                }
            }

            WorkflowAction::StageChanges => Job::Stage {
                root: self.repo_root()?,
                include_untracked: intents.include_untracked,
            },

            WorkflowAction::CommitChanges => {
                let root = self.repo_root()?;
                let message = required(&intents.commit_message, "Commit message")?;
                if !self.state.changes_captured {
                    return Err(Precondition::NothingStaged.into());
                }
                Job::Commit { root, message }
            }

            WorkflowAction::PushBranch => {
                let root = self.repo_root()?;
                let branch = required(&intents.branch_name, "Branch name")?;
                if !self.snapshot.has_origin() {
                    return Err(Precondition::OriginMissing.into());
                }
                Job::Push { root, branch }
            }

            WorkflowAction::OpenPullRequest => {
                if let Some(pr) = &self.state.pull_request {
                    return Err(Precondition::PullRequestExists(pr.number).into());
                }
                let repo = self.repo_slug()?;
                let head_branch = required(&intents.branch_name, "Branch name")?;
                let title = required(&intents.pr_title, "PR title")?;
                Job::OpenPullRequest {
                    repo,
                    request: CreatePullRequest {
                        title,
                        body: intents.pr_body.clone(),
                        head_branch,
                        base_branch: self.snapshot.default_base_branch.clone(),
                    },
                }
            }

            WorkflowAction::RefreshChecks | WorkflowAction::WaitForChecks => {
                let pr = self
                    .state
                    .pull_request
                    .as_ref()
                    .ok_or(Precondition::PullRequestMissing)?;
                let repo = self.repo_slug()?;
                let sha = pr.head_sha.clone();
                if action == WorkflowAction::RefreshChecks {
                    Job::RefreshChecks { repo, sha }
                } else {
                    Job::WaitForChecks { repo, sha }
                }
            }

            WorkflowAction::MergePullRequest => {
                let pr = self
                    .state
                    .pull_request
                    .as_ref()
                    .ok_or(Precondition::PullRequestMissing)?;
                let repo = self.repo_slug()?;
                let state = self
                    .state
                    .checks
                    .as_ref()
                    .map_or(CheckState::Unknown, |c| c.state);
                if state != CheckState::Success {
                    return Err(Precondition::ChecksNotGreen(state.to_string()).into());
                }
                Job::Merge {
                    repo,
                    number: pr.number,
                }
            }

            WorkflowAction::DeleteBranch => {
                let root = self.repo_root()?;
                let branch = required(&intents.branch_name, "Branch name")?;
                if !self.snapshot.has_origin() {
                    return Err(Precondition::OriginMissing.into());
                }
                Job::DeleteBranch { root, branch }
            }

            WorkflowAction::WriteVersion => {
                let root = self.repo_root()?;
                let version = normalize_version(&intents.new_version);
                if version.is_empty() {
                    return Err(Precondition::VersionEmpty.into());
                }
                Job::WriteVersion { root, version }
            }

            WorkflowAction::CreateTag => {
                let root = self.repo_root()?;
                if self.snapshot.version.is_empty() {
                    return Err(Precondition::VersionEmpty.into());
                }
                if !self.snapshot.is_clean {
                    return Err(Precondition::WorkspaceDirty.into());
                }
                Job::CreateTag {
                    root,
                    version: self.snapshot.version.clone(),
                }
            }

            WorkflowAction::SyncChangelog => Job::SyncChangelog {
                script: self
                    .snapshot
                    .changelog_script
                    .clone()
                    .ok_or(Precondition::ChangelogScriptMissing)?,
                include_github_data: intents.include_github_data,
                dry_run: intents.dry_run,
            },
        };
        Ok(job)
    }

    fn repo_root(&self) -> Result<std::path::PathBuf> {
        self.snapshot
            .repo_root
            .clone()
            .ok_or_else(|| Precondition::RepoNotFound.into())
    }

    fn repo_slug(&self) -> Result<RepoSlug> {
        RepoSlug::from_origin_url(self.snapshot.origin_url.as_deref().unwrap_or_default())
    }
}

fn required(value: &str, what: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Precondition::EmptyInput(what).into());
    }
    Ok(trimmed.to_string())
}
