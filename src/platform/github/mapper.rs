use serde::Deserialize;

use crate::platform::types::{CheckState, ChecksSummary, PullRequestInfo};

#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub head: Option<HeadRef>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeadRef {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct CombinedStatusResponse {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
}

#[derive(Debug, Deserialize)]
pub struct StatusEntry {
    #[serde(default)]
    pub context: Option<String>,
}

/// Map a pulls API response to our pull request type.
pub fn map_pull_request(pr: PullResponse) -> PullRequestInfo {
    PullRequestInfo {
        number: pr.number,
        url: pr.html_url,
        head_sha: pr.head.map(|h| h.sha).unwrap_or_default(),
        state: pr.state.unwrap_or_default(),
        mergeable: pr.mergeable,
        mergeable_state: pr.mergeable_state,
    }
}

pub fn map_combined_status(status: CombinedStatusResponse) -> ChecksSummary {
    let state = status
        .state
        .as_deref()
        .map(CheckState::from_api)
        .unwrap_or(CheckState::Unknown);
    let contexts: Vec<String> = status
        .statuses
        .into_iter()
        .filter_map(|s| s.context)
        .collect();
    ChecksSummary::new(state, &contexts)
}
