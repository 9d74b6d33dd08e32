use thiserror::Error;

use crate::workflow::types::WorkflowStep;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command ran and exited non-zero. The message is the command's own output.
    #[error("{output}")]
    Process {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GitHub error {status}: {body}")]
    RemoteApi {
        status: u16,
        body: String,
        rate_limited: bool,
    },

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("Secret store error: {0}")]
    SecretStore(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures detected in memory before any external call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("Another action is already running.")]
    Busy,

    #[error("{step} is not available yet: {reason}")]
    StepUnavailable { step: WorkflowStep, reason: String },

    #[error("Repo root not found. Set the repo path override and refresh.")]
    RepoNotFound,

    #[error("Origin remote not found.")]
    OriginMissing,

    #[error("Could not parse origin URL: {0}")]
    OriginUnparseable(String),

    #[error("GitHub token is missing. Pass --token, save one to the keychain, or set GITHUB_TOKEN.")]
    TokenMissing,

    #[error("{0} is missing or not on PATH.")]
    ToolMissing(String),

    #[error("{0} is empty.")]
    EmptyInput(&'static str),

    #[error("Invalid branch name (starts with '-'): {0}")]
    InvalidBranchName(String),

    #[error("No local changes found to stage.")]
    NoLocalChanges,

    #[error("No staged changes found. Stage local changes first.")]
    NothingStaged,

    #[error("VERSION is empty.")]
    VersionEmpty,

    #[error("Workspace is not clean. Commit or stash changes first.")]
    WorkspaceDirty,

    #[error("PR not found.")]
    PullRequestMissing,

    #[error("Pull request #{0} already exists.")]
    PullRequestExists(u64),

    #[error("Checks not green ({0}). Merge blocked.")]
    ChecksNotGreen(String),

    #[error("Changelog sync script not found.")]
    ChangelogScriptMissing,
}

/// Coarse classification used to pick a suggested fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Busy,
    StepBlocked,
    RepoNotFound,
    OriginRemote,
    Token,
    ToolUnavailable,
    InvalidInput,
    DirtyWorkspace,
    ChecksPending,
    ChangelogScript,
    RateLimited,
    Network,
    Remote,
    Command,
    General,
}

impl ErrorKind {
    pub fn suggested_fix(self) -> &'static str {
        match self {
            ErrorKind::Busy => "Wait for the running action to finish, then retry.",
            ErrorKind::StepBlocked => "Complete the earlier steps first.",
            ErrorKind::RepoNotFound => "Set the repo path override and refresh the status.",
            ErrorKind::OriginRemote => "Add an origin remote in git before retrying.",
            ErrorKind::Token => {
                "Provide a GitHub token with --token, save one to the keychain, or set GITHUB_TOKEN."
            }
            ErrorKind::ToolUnavailable => {
                "Install the missing tool (git or python3), make sure it is on PATH, and refresh."
            }
            ErrorKind::InvalidInput => "Fill in the required fields and retry.",
            ErrorKind::DirtyWorkspace => "Commit or stash local changes, then retry.",
            ErrorKind::ChecksPending => {
                "Wait for the pull request checks to pass, refresh them, then merge."
            }
            ErrorKind::ChangelogScript => "Verify scripts/sync_changelog.py exists and rerun.",
            ErrorKind::RateLimited => "GitHub rate limit reached. Wait a few minutes and retry.",
            ErrorKind::Network => "Check the network connection to GitHub and retry.",
            ErrorKind::Remote => "Check the GitHub response above, fix the cause, and retry.",
            ErrorKind::Command => "Read the command output above, fix the cause, and retry.",
            ErrorKind::General => {
                "Review the error details, fix the underlying issue, and retry the step."
            }
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Precondition(p) => match p {
                Precondition::Busy => ErrorKind::Busy,
                Precondition::StepUnavailable { .. } => ErrorKind::StepBlocked,
                Precondition::RepoNotFound => ErrorKind::RepoNotFound,
                Precondition::OriginMissing | Precondition::OriginUnparseable(_) => {
                    ErrorKind::OriginRemote
                }
                Precondition::TokenMissing => ErrorKind::Token,
                Precondition::ToolMissing(_) => ErrorKind::ToolUnavailable,
                Precondition::EmptyInput(_)
                | Precondition::InvalidBranchName(_)
                | Precondition::NoLocalChanges
                | Precondition::NothingStaged
                | Precondition::VersionEmpty
                | Precondition::PullRequestMissing
                | Precondition::PullRequestExists(_) => ErrorKind::InvalidInput,
                Precondition::WorkspaceDirty => ErrorKind::DirtyWorkspace,
                Precondition::ChecksNotGreen(_) => ErrorKind::ChecksPending,
                Precondition::ChangelogScriptMissing => ErrorKind::ChangelogScript,
            },
            AppError::Spawn { .. } => ErrorKind::ToolUnavailable,
            AppError::Process { .. } => ErrorKind::Command,
            AppError::RemoteApi {
                rate_limited: true, ..
            } => ErrorKind::RateLimited,
            AppError::RemoteApi { status: 401, .. } => ErrorKind::Token,
            AppError::RemoteApi { .. } => ErrorKind::Remote,
            AppError::Http(_) => ErrorKind::Network,
            AppError::SecretStore(_) => ErrorKind::Token,
            AppError::Config(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Internal(_) => ErrorKind::General,
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AppError::RemoteApi {
                status,
                rate_limited,
                ..
            } => *rate_limited || *status >= 500,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            AppError::RemoteApi {
                rate_limited: true,
                ..
            }
        )
    }
}

impl From<keyring::Error> for AppError {
    fn from(e: keyring::Error) -> Self {
        AppError::SecretStore(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_messages() {
        let err = AppError::from(Precondition::VersionEmpty);
        assert_eq!(err.to_string(), "VERSION is empty.");
        let err = AppError::from(Precondition::PullRequestMissing);
        assert_eq!(err.to_string(), "PR not found.");
    }

    #[test]
    fn test_process_failure_displays_output() {
        let err = AppError::Process {
            exit_code: Some(128),
            output: "fatal: not a git repository".to_string(),
        };
        assert_eq!(err.to_string(), "fatal: not a git repository");
        assert_eq!(err.kind(), ErrorKind::Command);
    }

    #[test]
    fn test_kind_is_tag_based() {
        assert_eq!(
            AppError::from(Precondition::TokenMissing).kind(),
            ErrorKind::Token
        );
        assert_eq!(
            AppError::from(Precondition::WorkspaceDirty).kind(),
            ErrorKind::DirtyWorkspace
        );
        // A message that merely mentions a token is not a token error.
        let err = AppError::Process {
            exit_code: Some(1),
            output: "token file corrupt".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Command);
    }

    #[test]
    fn test_remote_classification() {
        let limited = AppError::RemoteApi {
            status: 403,
            body: "API rate limit exceeded".to_string(),
            rate_limited: true,
        };
        assert_eq!(limited.kind(), ErrorKind::RateLimited);
        assert!(limited.is_transient());

        let unauthorized = AppError::RemoteApi {
            status: 401,
            body: "Bad credentials".to_string(),
            rate_limited: false,
        };
        assert_eq!(unauthorized.kind(), ErrorKind::Token);
        assert!(!unauthorized.is_transient());

        let unavailable = AppError::RemoteApi {
            status: 502,
            body: String::new(),
            rate_limited: false,
        };
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_every_kind_has_a_fix() {
        for kind in [
            ErrorKind::Busy,
            ErrorKind::StepBlocked,
            ErrorKind::RepoNotFound,
            ErrorKind::OriginRemote,
            ErrorKind::Token,
            ErrorKind::ToolUnavailable,
            ErrorKind::InvalidInput,
            ErrorKind::DirtyWorkspace,
            ErrorKind::ChecksPending,
            ErrorKind::ChangelogScript,
            ErrorKind::RateLimited,
            ErrorKind::Network,
            ErrorKind::Remote,
            ErrorKind::Command,
            ErrorKind::General,
        ] {
            assert!(!kind.suggested_fix().is_empty());
        }
    }
}
