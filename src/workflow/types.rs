use serde::Serialize;

/// The twelve release stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    CheckStatus,
    CreateBranch,
    CaptureChanges,
    CommitChanges,
    PushBranch,
    OpenPr,
    MergePr,
    DeleteBranch,
    SetRelease,
    CreateTag,
    SyncChangelog,
    ReviewFinish,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 12] = [
        WorkflowStep::CheckStatus,
        WorkflowStep::CreateBranch,
        WorkflowStep::CaptureChanges,
        WorkflowStep::CommitChanges,
        WorkflowStep::PushBranch,
        WorkflowStep::OpenPr,
        WorkflowStep::MergePr,
        WorkflowStep::DeleteBranch,
        WorkflowStep::SetRelease,
        WorkflowStep::CreateTag,
        WorkflowStep::SyncChangelog,
        WorkflowStep::ReviewFinish,
    ];

    pub const TERMINAL: WorkflowStep = WorkflowStep::ReviewFinish;

    pub fn rank(self) -> usize {
        self as usize
    }

    /// Steps that exist only to move local changes through a pull request.
    pub fn is_branch_step(self) -> bool {
        (WorkflowStep::CreateBranch..=WorkflowStep::DeleteBranch).contains(&self)
    }

    /// Steps that come before this one.
    pub fn predecessors(self) -> &'static [WorkflowStep] {
        &Self::ALL[..self.rank()]
    }

    pub fn title(self) -> &'static str {
        match self {
            WorkflowStep::CheckStatus => "Check Status",
            WorkflowStep::CreateBranch => "Create Branch",
            WorkflowStep::CaptureChanges => "Capture Local Changes",
            WorkflowStep::CommitChanges => "Commit Changes",
            WorkflowStep::PushBranch => "Push Branch",
            WorkflowStep::OpenPr => "Open PR",
            WorkflowStep::MergePr => "Merge (Squash)",
            WorkflowStep::DeleteBranch => "Delete Branch",
            WorkflowStep::SetRelease => "Set Release Number",
            WorkflowStep::CreateTag => "Create Tag (Annotated)",
            WorkflowStep::SyncChangelog => "Sync Changelog",
            WorkflowStep::ReviewFinish => "Review & Finish",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            WorkflowStep::CheckStatus => "Confirm the repo is ready and resolve any local changes.",
            WorkflowStep::CreateBranch => "Create and switch to a new feature branch.",
            WorkflowStep::CaptureChanges => "Stage your local changes so they can be committed.",
            WorkflowStep::CommitChanges => "Save your local work with a short message.",
            WorkflowStep::PushBranch => "Upload the branch so GitHub can see it.",
            WorkflowStep::OpenPr => "Create a pull request from your branch to the base branch.",
            WorkflowStep::MergePr => "Merge with squash after checks pass.",
            WorkflowStep::DeleteBranch => "Remove the merged branch from the remote.",
            WorkflowStep::SetRelease => "Write the new release number into the VERSION file.",
            WorkflowStep::CreateTag => "Create the release tag after VERSION is set.",
            WorkflowStep::SyncChangelog => {
                "Rebuild CHANGELOG.md and the archive from new_features.md."
            }
            WorkflowStep::ReviewFinish => "Quick final review of the release artifacts.",
        }
    }

    pub fn typical_time(self) -> &'static str {
        match self {
            WorkflowStep::CaptureChanges | WorkflowStep::SyncChangelog => "1-2 minutes",
            WorkflowStep::CommitChanges | WorkflowStep::OpenPr | WorkflowStep::ReviewFinish => {
                "2 minutes"
            }
            WorkflowStep::MergePr => "1-5 minutes",
            _ => "1 minute",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}
