use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::GitHubConfig;
use crate::error::{AppError, Precondition, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::auth::TokenResolver;
use super::mapper;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

pub struct GitHubPlatform {
    client: Client,
    api_base: String,
    tokens: Arc<TokenResolver>,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig, tokens: Arc<TokenResolver>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn repo_path(repo: &RepoSlug) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        )
    }

    /// Send one authenticated request and decode the JSON response.
    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let (token, _) = self.tokens.resolve().ok_or(Precondition::TokenMissing)?;
        let url = format!("{}{}", self.api_base, path);

        tracing::debug!(method = %method, path = %path, "GitHub request");

        let mut request = self
            .client
            .request(method, &url)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let rate_limited = is_rate_limited(status, response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteApi {
                status: status.as_u16(),
                body,
                rate_limited,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Primary limits drain `x-ratelimit-remaining`; secondary limits answer 403
/// or 429 with `retry-after` while quota remains.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let retry_after = headers.contains_key("retry-after");

    status == StatusCode::TOO_MANY_REQUESTS
        || exhausted
        || (status == StatusCode::FORBIDDEN && retry_after)
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        pr: &CreatePullRequest,
    ) -> Result<PullRequestInfo> {
        let payload = json!({
            "title": pr.title,
            "head": pr.head_branch,
            "base": pr.base_branch,
            "body": pr.body,
        });
        let path = format!("{}/pulls", Self::repo_path(repo));

        let created: mapper::PullResponse = self.request(Method::POST, &path, Some(&payload)).await?;
        let info = mapper::map_pull_request(created);

        tracing::info!(
            repo = %repo.full_name(),
            pr = info.number,
            url = %info.url,
            "Opened pull request"
        );
        Ok(info)
    }

    async fn checks_summary(&self, repo: &RepoSlug, sha: &str) -> Result<ChecksSummary> {
        let path = format!(
            "{}/commits/{}/status",
            Self::repo_path(repo),
            urlencoding::encode(sha)
        );
        let status: mapper::CombinedStatusResponse =
            self.request(Method::GET, &path, None::<&()>).await?;
        Ok(mapper::map_combined_status(status))
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoSlug,
        pr_number: u64,
        method: MergeMethod,
    ) -> Result<()> {
        let path = format!("{}/pulls/{pr_number}/merge", Self::repo_path(repo));
        let payload = json!({ "merge_method": method });
        let _: serde_json::Value = self.request(Method::PUT, &path, Some(&payload)).await?;

        tracing::info!(repo = %repo.full_name(), pr = pr_number, "Merged pull request");
        Ok(())
    }
}
