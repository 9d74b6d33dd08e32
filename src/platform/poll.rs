use std::time::Duration;

use crate::config::ChecksConfig;
use crate::error::{AppError, Result};
use crate::platform::types::{ChecksSummary, RepoSlug};
use crate::platform::Platform;

/// How long to keep asking GitHub for a settled check state.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
    pub rate_limit_backoff: Duration,
}

impl From<&ChecksConfig> for PollPolicy {
    fn from(config: &ChecksConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_polls: config.max_polls.max(1),
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
        }
    }
}

/// Poll the combined status until it settles or the poll budget runs out.
///
/// Transient failures (timeouts, 5xx, rate limits) use up a poll and wait;
/// anything else is returned immediately. When the budget runs out the most
/// recent summary is returned, or the last error if none was ever received.
pub async fn wait_for_checks(
    platform: &dyn Platform,
    repo: &RepoSlug,
    sha: &str,
    policy: &PollPolicy,
) -> Result<ChecksSummary> {
    let mut last_summary: Option<ChecksSummary> = None;
    let mut last_error = None;

    for poll in 1..=policy.max_polls {
        let delay = match platform.checks_summary(repo, sha).await {
            Ok(summary) if summary.state.is_settled() => {
                tracing::info!(poll, state = %summary.state, "Checks settled");
                return Ok(summary);
            }
            Ok(summary) => {
                tracing::info!(poll, state = %summary.state, "Checks not settled yet");
                last_summary = Some(summary);
                policy.interval
            }
            Err(e) if e.is_transient() => {
                let delay = if e.is_rate_limited() {
                    policy.rate_limit_backoff
                } else {
                    policy.interval
                };
                tracing::warn!(poll, error = %e, delay_secs = delay.as_secs(), "Transient error polling checks");
                last_error = Some(e);
                delay
            }
            Err(e) => return Err(e),
        };

        if poll < policy.max_polls && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    match (last_summary, last_error) {
        (Some(summary), _) => Ok(summary),
        (None, Some(e)) => Err(e),
        (None, None) => Err(AppError::Internal("checks were never polled".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::CheckState;
    use crate::testing::FakePlatform;

    fn repo() -> RepoSlug {
        RepoSlug {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
        }
    }

    fn policy(max_polls: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_polls,
            rate_limit_backoff: Duration::ZERO,
        }
    }

    fn rate_limited() -> AppError {
        AppError::RemoteApi {
            status: 403,
            body: "rate limit".to_string(),
            rate_limited: true,
        }
    }

    #[tokio::test]
    async fn test_returns_once_settled() {
        let platform = FakePlatform::default();
        platform.push_checks(Ok(ChecksSummary::new(CheckState::Pending, &[])));
        platform.push_checks(Ok(ChecksSummary::new(CheckState::Success, &["ci".to_string()])));

        let summary = wait_for_checks(&platform, &repo(), "abc", &policy(5)).await.unwrap();
        assert_eq!(summary.state, CheckState::Success);
        assert_eq!(platform.checks_calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let platform = FakePlatform::default();
        platform.push_checks(Err(rate_limited()));
        platform.push_checks(Ok(ChecksSummary::new(CheckState::Failure, &[])));

        let summary = wait_for_checks(&platform, &repo(), "abc", &policy(5)).await.unwrap();
        assert_eq!(summary.state, CheckState::Failure);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_polling() {
        let platform = FakePlatform::default();
        platform.push_checks(Err(AppError::RemoteApi {
            status: 404,
            body: "Not Found".to_string(),
            rate_limited: false,
        }));
        platform.push_checks(Ok(ChecksSummary::new(CheckState::Success, &[])));

        let err = wait_for_checks(&platform, &repo(), "abc", &policy(5)).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteApi { status: 404, .. }));
        assert_eq!(platform.checks_calls(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_last_pending() {
        let platform = FakePlatform::default();
        for _ in 0..3 {
            platform.push_checks(Ok(ChecksSummary::new(CheckState::Pending, &[])));
        }

        let summary = wait_for_checks(&platform, &repo(), "abc", &policy(3)).await.unwrap();
        assert_eq!(summary.state, CheckState::Pending);
        assert_eq!(platform.checks_calls(), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted_with_only_errors() {
        let platform = FakePlatform::default();
        platform.push_checks(Err(rate_limited()));
        platform.push_checks(Err(rate_limited()));

        let err = wait_for_checks(&platform, &repo(), "abc", &policy(2)).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
