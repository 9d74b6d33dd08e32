use serde::Serialize;

use crate::workflow::gate::needs_branch_steps;
use crate::workflow::WorkflowState;

use super::snapshot::SystemStatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
            IssueLevel::Info => "info",
        })
    }
}

/// One problem found in a snapshot, with what to do about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusIssue {
    pub level: IssueLevel,
    pub title: &'static str,
    pub detail: String,
    pub fix: String,
}

impl StatusIssue {
    fn new(level: IssueLevel, title: &'static str, detail: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            level,
            title,
            detail: detail.into(),
            fix: fix.into(),
        }
    }
}

pub fn diagnose(snapshot: &SystemStatusSnapshot, state: &WorkflowState) -> Vec<StatusIssue> {
    let mut issues = Vec::new();
    let branch_steps = needs_branch_steps(snapshot, state);

    if snapshot.repo_root.is_none() {
        issues.push(StatusIssue::new(
            IssueLevel::Error,
            "Repository not found",
            "Git could not locate the repo root.",
            "Pass --repo with the full path to the repo, or run from inside the repo folder.",
        ));
    }
    if let Some(repo_override) = snapshot.repo_override.as_ref().filter(|o| !o.valid) {
        let level = if snapshot.repo_root.is_none() {
            IssueLevel::Error
        } else {
            IssueLevel::Warning
        };
        issues.push(StatusIssue::new(
            level,
            "Repo path override invalid",
            repo_override.path.display().to_string(),
            "Check the path and try again.",
        ));
    }
    if snapshot.vcs_version.is_none() {
        issues.push(StatusIssue::new(
            IssueLevel::Error,
            "Git not available",
            "git is missing or not on PATH.",
            "Install Git and make sure it is on PATH.",
        ));
    }
    if snapshot.script_runner_version.is_none() {
        issues.push(StatusIssue::new(
            IssueLevel::Error,
            "Python 3 not available",
            "python3 is missing or not on PATH.",
            "Install Python 3 and make sure it is on PATH.",
        ));
    }
    if snapshot.changelog_script.is_none() {
        issues.push(StatusIssue::new(
            IssueLevel::Error,
            "Sync script not found",
            "scripts/sync_changelog.py was not found.",
            "Use a local repo checkout with the scripts/ folder, or set changelog.script_override.",
        ));
    }
    if snapshot.repo_root.is_some() && !snapshot.is_clean {
        let fix = if branch_steps {
            "Continue to the branch steps to capture and merge these updates before tagging."
        } else {
            "Use the branch steps to capture your local changes into a feature branch."
        };
        issues.push(StatusIssue::new(
            IssueLevel::Warning,
            "Workspace is dirty",
            format!(
                "{} uncommitted and {} untracked change(s) detected.",
                snapshot.uncommitted_count, snapshot.untracked_count
            ),
            fix,
        ));
    }
    if snapshot.version.is_empty() {
        issues.push(StatusIssue::new(
            IssueLevel::Warning,
            "VERSION is empty",
            "No release number is set.",
            "Enter a release number and write VERSION.",
        ));
    }
    if snapshot.latest_tag.is_empty() {
        issues.push(StatusIssue::new(
            IssueLevel::Warning,
            "No release tags found",
            "Git has no vX.Y.Z tags.",
            "Create the first release tag after writing VERSION.",
        ));
    }
    if !snapshot.version.is_empty() && !snapshot.latest_tag.is_empty() && !snapshot.version_matches_tag {
        let (level, fix) = if state.intents.is_new_release {
            (
                IssueLevel::Info,
                format!(
                    "This is expected for a new release. Create the new tag v{}.",
                    snapshot.version
                ),
            )
        } else {
            (
                IssueLevel::Warning,
                "Update VERSION to match the latest tag.".to_string(),
            )
        };
        issues.push(StatusIssue::new(
            level,
            "VERSION does not match latest tag",
            format!("{} vs {}", snapshot.version, snapshot.latest_tag),
            fix,
        ));
    }
    if snapshot.repo_root.is_some() && !snapshot.has_origin() {
        issues.push(StatusIssue::new(
            IssueLevel::Warning,
            "Origin remote missing",
            "No origin remote was found.",
            "Add an origin remote in git before pushing a branch.",
        ));
    }
    if !snapshot.token_present() {
        if state.intents.include_github_data {
            issues.push(StatusIssue::new(
                IssueLevel::Warning,
                "GitHub token missing",
                "Release notes from GitHub will be skipped.",
                "Set GITHUB_TOKEN, pass --token, or run `token save`.",
            ));
        }
        if branch_steps {
            issues.push(StatusIssue::new(
                IssueLevel::Error,
                "GitHub token required for PRs",
                "PR creation and merge require a token.",
                "Pass --token or run `token save` before opening the pull request.",
            ));
        }
    }

    issues
}
