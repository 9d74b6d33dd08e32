use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub repository: RepositoryConfig,
    pub github: GitHubConfig,
    pub tools: ToolsConfig,
    pub changelog: ChangelogConfig,
    pub checks: ChecksConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Use this checkout instead of discovering one from the working directory.
    pub root_override: Option<PathBuf>,
    pub version_file: String,
}

#[derive(Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    /// Session token; takes priority over the keychain and the environment.
    pub token: Option<String>,
    pub token_env: String,
    pub keychain_service: String,
    pub keychain_account: String,
    pub request_timeout_secs: u64,
}

// Manual Debug impl to avoid leaking the session token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_env", &self.token_env)
            .field("keychain_service", &self.keychain_service)
            .field("keychain_account", &self.keychain_account)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub vcs: String,
    pub script_runner: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChangelogConfig {
    /// Explicit script location; checked before any discovered candidate.
    pub script_override: Option<PathBuf>,
    /// Script location relative to a checkout or install directory.
    pub script_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChecksConfig {
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub rate_limit_backoff_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root_override: None,
            version_file: "VERSION".to_string(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            token_env: "GITHUB_TOKEN".to_string(),
            keychain_service: "release-workflow".to_string(),
            keychain_account: "github_token".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            vcs: "git".to_string(),
            script_runner: "python3".to_string(),
        }
    }
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            script_override: None,
            script_path: PathBuf::from("scripts/sync_changelog.py"),
        }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            max_polls: 30,
            rate_limit_backoff_secs: 60,
        }
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("release-workflow").required(false));
        }

        // Environment variable overrides with RELEASE_WORKFLOW_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("RELEASE_WORKFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.github.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "github.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.tools.vcs.trim().is_empty() || self.tools.script_runner.trim().is_empty() {
            return Err(AppError::Config("tool programs must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective configuration as TOML, with the session token redacted.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.github.token.is_some() {
            shown.github.token = Some("[REDACTED]".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| AppError::Config(e.to_string()))
    }
}
