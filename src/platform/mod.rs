pub mod github;
pub mod poll;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Open a pull request from `head_branch` into `base_branch`.
    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        pr: &CreatePullRequest,
    ) -> Result<PullRequestInfo>;

    /// Fetch the combined status of a commit.
    async fn checks_summary(&self, repo: &RepoSlug, sha: &str) -> Result<ChecksSummary>;

    /// Merge a pull request.
    async fn merge_pull_request(
        &self,
        repo: &RepoSlug,
        pr_number: u64,
        method: MergeMethod,
    ) -> Result<()>;
}
