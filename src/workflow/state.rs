use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::platform::types::{ChecksSummary, PullRequestInfo};
use crate::status::SystemStatusSnapshot;
use crate::workspace::version::normalize_version;

/// What the user wants the release to look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseIntents {
    pub branch_name: String,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
    pub new_version: String,
    pub include_untracked: bool,
    pub is_new_release: bool,
    pub include_github_data: bool,
    pub dry_run: bool,
    pub dirty_workspace_acknowledged: bool,
}

impl Default for ReleaseIntents {
    fn default() -> Self {
        Self {
            branch_name: String::new(),
            commit_message: String::new(),
            pr_title: String::new(),
            pr_body: String::new(),
            new_version: String::new(),
            include_untracked: true,
            is_new_release: true,
            include_github_data: true,
            dry_run: false,
            dirty_workspace_acknowledged: false,
        }
    }
}

/// Progress accumulated over one session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    pub branch_created: bool,
    pub changes_captured: bool,
    pub changes_committed: bool,
    pub branch_pushed: bool,
    pub pr_merged: bool,
    pub branch_deleted: bool,
    pub tag_created: bool,
    pub version_written: bool,
    pub changelog_synced: bool,
    pub pull_request: Option<PullRequestInfo>,
    pub checks: Option<ChecksSummary>,
    pub intents: ReleaseIntents,
    pub last_output: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_tag_at: Option<DateTime<Utc>>,
    pub stage_summary: Option<String>,
}

/// The state change a successful action produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StatusRefreshed,
    BranchCreated,
    ChangesStaged { files: usize },
    ChangesCommitted,
    BranchPushed,
    PullRequestOpened {
        info: PullRequestInfo,
        checks: Option<ChecksSummary>,
    },
    ChecksRefreshed(ChecksSummary),
    PullRequestMerged,
    BranchDeleted,
    VersionWritten { version: String },
    TagCreated { tag: String },
    ChangelogSynced { output: String },
}

impl Effect {
    pub fn success_message(&self) -> String {
        match self {
            Effect::StatusRefreshed => "Status refreshed.".to_string(),
            Effect::BranchCreated => "Branch created successfully.".to_string(),
            Effect::ChangesStaged { files } => format!("Staged {files} file(s)."),
            Effect::ChangesCommitted => "Changes committed successfully.".to_string(),
            Effect::BranchPushed => "Branch pushed successfully.".to_string(),
            Effect::PullRequestOpened { info, .. } => {
                format!("Pull request #{} created: {}", info.number, info.url)
            }
            Effect::ChecksRefreshed(summary) => format!("Checks {}. {}", summary.state, summary.description),
            Effect::PullRequestMerged => "Pull request merged successfully.".to_string(),
            Effect::BranchDeleted => "Branch deleted successfully.".to_string(),
            Effect::VersionWritten { version } => format!("VERSION updated to {version}."),
            Effect::TagCreated { tag } => format!("Release tag {tag} created."),
            Effect::ChangelogSynced { .. } => "Changelog sync completed successfully.".to_string(),
        }
    }
}

impl WorkflowState {
    /// Any branch-step flag is set, i.e. the branch flow has been entered.
    pub fn branch_flow_started(&self) -> bool {
        self.branch_created
            || self.changes_captured
            || self.changes_committed
            || self.branch_pushed
            || self.pull_request.is_some()
            || self.pr_merged
            || self.branch_deleted
    }

    /// Apply a successful action's effect against the snapshot taken after it.
    pub fn apply(&mut self, effect: Effect, snapshot: &SystemStatusSnapshot) {
        match effect {
            Effect::StatusRefreshed => self.reconcile(snapshot),
            Effect::BranchCreated => {
                self.branch_created = true;
                self.changes_captured = false;
                self.changes_committed = false;
                self.branch_pushed = false;
                self.pull_request = None;
                self.checks = None;
                self.pr_merged = false;
                self.branch_deleted = false;
                self.stage_summary = None;
            }
            Effect::ChangesStaged { files } => {
                self.changes_captured = true;
                self.changes_committed = false;
                self.stage_summary = Some(format!("Staged {files} file(s)."));
            }
            Effect::ChangesCommitted => {
                self.changes_committed = true;
                self.changes_captured = false;
            }
            Effect::BranchPushed => self.branch_pushed = true,
            Effect::PullRequestOpened { info, checks } => {
                self.pull_request = Some(info);
                self.checks = checks;
            }
            Effect::ChecksRefreshed(summary) => self.checks = Some(summary),
            Effect::PullRequestMerged => self.pr_merged = true,
            Effect::BranchDeleted => self.branch_deleted = true,
            Effect::VersionWritten { version } => {
                self.intents.new_version = version;
                self.version_written = true;
            }
            Effect::TagCreated { .. } => {
                self.tag_created = true;
                self.last_tag_at = Some(Utc::now());
            }
            Effect::ChangelogSynced { output } => {
                self.last_output = Some(output);
                self.last_sync_at = Some(Utc::now());
                self.changelog_synced = true;
            }
        }
    }

    /// Fold a fresh snapshot into the version intent and the dirty acknowledgement.
    fn reconcile(&mut self, snapshot: &SystemStatusSnapshot) {
        if self.intents.new_version.trim().is_empty() {
            self.intents.new_version = snapshot.version.clone();
        }
        if !self.intents.new_version.trim().is_empty() {
            self.version_written = normalize_version(&self.intents.new_version) == snapshot.version;
        }
        if snapshot.is_clean {
            self.intents.dirty_workspace_acknowledged = false;
        }
    }
}
