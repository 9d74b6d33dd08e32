use serde::{Deserialize, Serialize};

use crate::error::{Precondition, Result};

/// `owner/repo` of the hosting repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Parse an SSH (`git@github.com:o/r.git`) or HTTPS (`https://github.com/o/r`) origin URL.
    pub fn from_origin_url(origin: &str) -> Result<Self> {
        let trimmed = origin.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Err(Precondition::OriginMissing.into());
        }

        let path = trimmed
            .strip_prefix("git@github.com:")
            .or_else(|| trimmed.strip_prefix("https://github.com/"))
            .unwrap_or(trimmed);
        let path = path.strip_suffix(".git").unwrap_or(path);

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(Precondition::OriginUnparseable(trimmed.to_string()).into());
        }

        Ok(Self {
            owner: parts[0].to_string(),
            name: parts[1].to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
    pub head_sha: String,
    pub state: String,
    pub mergeable: Option<bool>,
    pub mergeable_state: Option<String>,
}

/// Coarse combined state of the checks reported for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Success,
    Pending,
    Failure,
    Unknown,
}

impl CheckState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "success" => CheckState::Success,
            "pending" => CheckState::Pending,
            "failure" | "error" => CheckState::Failure,
            _ => CheckState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Success => "success",
            CheckState::Pending => "pending",
            CheckState::Failure => "failure",
            CheckState::Unknown => "unknown",
        }
    }

    /// No further change is expected without a new push.
    pub fn is_settled(self) -> bool {
        matches!(self, CheckState::Success | CheckState::Failure)
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksSummary {
    pub state: CheckState,
    pub description: String,
}

impl ChecksSummary {
    pub fn new(state: CheckState, contexts: &[String]) -> Self {
        let description = if contexts.is_empty() {
            "No checks reported yet.".to_string()
        } else {
            format!("Checks: {}", contexts.join(", "))
        };
        Self { state, description }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Squash,
}
