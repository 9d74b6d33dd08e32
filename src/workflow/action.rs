use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::changelog::{ChangelogSync, SyncOptions};
use crate::error::{AppError, Precondition, Result};
use crate::platform::poll::{wait_for_checks, PollPolicy};
use crate::platform::types::{CreatePullRequest, MergeMethod, RepoSlug};
use crate::platform::Platform;
use crate::status::StatusProber;
use crate::workspace::version::write_version;
use crate::workspace::GitClient;

use super::state::Effect;
use super::types::WorkflowStep;

/// User-triggered operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    RefreshStatus,
    CreateBranch,
    StageChanges,
    CommitChanges,
    PushBranch,
    OpenPullRequest,
    RefreshChecks,
    WaitForChecks,
    MergePullRequest,
    DeleteBranch,
    WriteVersion,
    CreateTag,
    SyncChangelog,
}

impl WorkflowAction {
    /// The step whose gate must be open; `None` for actions allowed any time.
    pub fn step(self) -> Option<WorkflowStep> {
        match self {
            WorkflowAction::RefreshStatus => None,
            WorkflowAction::CreateBranch => Some(WorkflowStep::CreateBranch),
            WorkflowAction::StageChanges => Some(WorkflowStep::CaptureChanges),
            WorkflowAction::CommitChanges => Some(WorkflowStep::CommitChanges),
            WorkflowAction::PushBranch => Some(WorkflowStep::PushBranch),
            WorkflowAction::OpenPullRequest => Some(WorkflowStep::OpenPr),
            WorkflowAction::RefreshChecks
            | WorkflowAction::WaitForChecks
            | WorkflowAction::MergePullRequest => Some(WorkflowStep::MergePr),
            WorkflowAction::DeleteBranch => Some(WorkflowStep::DeleteBranch),
            WorkflowAction::WriteVersion => Some(WorkflowStep::SetRelease),
            WorkflowAction::CreateTag => Some(WorkflowStep::CreateTag),
            WorkflowAction::SyncChangelog => Some(WorkflowStep::SyncChangelog),
        }
    }

    pub fn progress_message(self) -> &'static str {
        match self {
            WorkflowAction::RefreshStatus => "Refreshing status...",
            WorkflowAction::CreateBranch => "Creating branch...",
            WorkflowAction::StageChanges => "Staging changes...",
            WorkflowAction::CommitChanges => "Committing changes...",
            WorkflowAction::PushBranch => "Pushing branch...",
            WorkflowAction::OpenPullRequest => "Creating pull request...",
            WorkflowAction::RefreshChecks => "Refreshing checks...",
            WorkflowAction::WaitForChecks => "Waiting for checks...",
            WorkflowAction::MergePullRequest => "Merging PR (squash)...",
            WorkflowAction::DeleteBranch => "Deleting branch...",
            WorkflowAction::WriteVersion => "Writing VERSION...",
            WorkflowAction::CreateTag => "Creating tag...",
            WorkflowAction::SyncChangelog => "Running changelog sync...",
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowAction::RefreshStatus => "refresh status",
            WorkflowAction::CreateBranch => "create branch",
            WorkflowAction::StageChanges => "stage changes",
            WorkflowAction::CommitChanges => "commit changes",
            WorkflowAction::PushBranch => "push branch",
            WorkflowAction::OpenPullRequest => "open pull request",
            WorkflowAction::RefreshChecks => "refresh checks",
            WorkflowAction::WaitForChecks => "wait for checks",
            WorkflowAction::MergePullRequest => "merge pull request",
            WorkflowAction::DeleteBranch => "delete branch",
            WorkflowAction::WriteVersion => "write version",
            WorkflowAction::CreateTag => "create tag",
            WorkflowAction::SyncChangelog => "sync changelog",
        };
        f.write_str(name)
    }
}

/// Collaborators an action needs once it leaves the dispatcher.
#[derive(Clone)]
pub struct WorkflowServices {
    pub prober: StatusProber,
    pub platform: Arc<dyn Platform>,
    pub poll: PollPolicy,
}

impl WorkflowServices {
    fn git(&self, root: PathBuf) -> GitClient {
        GitClient::new(self.prober.runner(), self.prober.vcs_program(), &root)
    }
}

/// An action with every input it needs already resolved and owned.
#[derive(Debug, Clone)]
pub(crate) enum Job {
    Refresh,
    CreateBranch { root: PathBuf, branch: String },
    Stage { root: PathBuf, include_untracked: bool },
    Commit { root: PathBuf, message: String },
    Push { root: PathBuf, branch: String },
    OpenPullRequest { repo: RepoSlug, request: CreatePullRequest },
    RefreshChecks { repo: RepoSlug, sha: String },
    WaitForChecks { repo: RepoSlug, sha: String },
    Merge { repo: RepoSlug, number: u64 },
    DeleteBranch { root: PathBuf, branch: String },
    WriteVersion { root: PathBuf, version: String },
    CreateTag { root: PathBuf, version: String },
    SyncChangelog {
        script: PathBuf,
        include_github_data: bool,
        dry_run: bool,
    },
}

/// Run a blocking closure on the blocking pool.
async fn blocking<T, F>(label: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("{label} task panicked: {e}")))?
}

impl Job {
    pub(crate) async fn run(self, services: &WorkflowServices) -> Result<Effect> {
        match self {
            Job::Refresh => Ok(Effect::StatusRefreshed),

            Job::CreateBranch { root, branch } => {
                let git = services.git(root);
                blocking("create branch", move || git.create_branch(&branch)).await?;
                Ok(Effect::BranchCreated)
            }

            Job::Stage {
                root,
                include_untracked,
            } => {
                let git = services.git(root);
                let files = blocking("stage", move || {
                    let status = git.status()?;
                    if status.is_clean() {
                        return Err(Precondition::NoLocalChanges.into());
                    }
                    git.stage(include_untracked)?;
                    Ok(status.total())
                })
                .await?;
                Ok(Effect::ChangesStaged { files })
            }

            Job::Commit { root, message } => {
                let git = services.git(root);
                blocking("commit", move || git.commit(&message)).await?;
                Ok(Effect::ChangesCommitted)
            }

            Job::Push { root, branch } => {
                let git = services.git(root);
                blocking("push", move || git.push(&branch)).await?;
                Ok(Effect::BranchPushed)
            }

            Job::OpenPullRequest { repo, request } => {
                let info = services.platform.create_pull_request(&repo, &request).await?;
                // The PR exists remotely from here on; a checks failure must not lose it.
                let checks = match services.platform.checks_summary(&repo, &info.head_sha).await {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        tracing::warn!(pr = info.number, error = %e, "Could not fetch checks for new pull request");
                        None
                    }
                };
                Ok(Effect::PullRequestOpened { info, checks })
            }

            Job::RefreshChecks { repo, sha } => {
                let summary = services.platform.checks_summary(&repo, &sha).await?;
                Ok(Effect::ChecksRefreshed(summary))
            }

            Job::WaitForChecks { repo, sha } => {
                let summary =
                    wait_for_checks(services.platform.as_ref(), &repo, &sha, &services.poll).await?;
                Ok(Effect::ChecksRefreshed(summary))
            }

            Job::Merge { repo, number } => {
                services
                    .platform
                    .merge_pull_request(&repo, number, MergeMethod::Squash)
                    .await?;
                Ok(Effect::PullRequestMerged)
            }

            Job::DeleteBranch { root, branch } => {
                let git = services.git(root);
                blocking("delete branch", move || git.delete_remote_branch(&branch)).await?;
                Ok(Effect::BranchDeleted)
            }

            Job::WriteVersion { root, version } => {
                let file = services.prober.version_file().to_string();
                let version =
                    blocking("write version", move || write_version(&root, &file, &version)).await?;
                Ok(Effect::VersionWritten { version })
            }

            Job::CreateTag { root, version } => {
                let git = services.git(root);
                let tag = blocking("tag", move || git.create_release_tag(&version)).await?;
                Ok(Effect::TagCreated { tag })
            }

            Job::SyncChangelog {
                script,
                include_github_data,
                dry_run,
            } => {
                let tokens = Arc::clone(services.prober.tokens());
                let sync = ChangelogSync::new(
                    services.prober.runner(),
                    services.prober.script_runner_program(),
                );
                let output = blocking("changelog sync", move || {
                    let token = if include_github_data {
                        tokens.resolve().map(|(token, _)| token)
                    } else {
                        None
                    };
                    sync.run(
                        &script,
                        &SyncOptions {
                            include_github_data,
                            dry_run,
                            token,
                        },
                    )
                })
                .await?;
                Ok(Effect::ChangelogSynced { output })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_but_refresh_is_gated() {
        assert_eq!(WorkflowAction::RefreshStatus.step(), None);
        assert_eq!(
            WorkflowAction::WaitForChecks.step(),
            Some(WorkflowStep::MergePr)
        );
        assert_eq!(
            WorkflowAction::StageChanges.step(),
            Some(WorkflowStep::CaptureChanges)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkflowAction::OpenPullRequest.to_string(), "open pull request");
        assert_eq!(
            WorkflowAction::MergePullRequest.progress_message(),
            "Merging PR (squash)..."
        );
    }
}
