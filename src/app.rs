use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::platform::github::{GitHubPlatform, KeyringStore, TokenResolver};
use crate::platform::poll::PollPolicy;
use crate::process::SystemRunner;
use crate::status::{ProbeContext, StatusProber};
use crate::workflow::{Dispatcher, ReleaseIntents, WorkflowServices};

/// Facts read from the process environment once, at startup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub cwd: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub env_token: Option<String>,
}

impl Environment {
    pub fn capture(config: &AppConfig) -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from));
        Self {
            cwd: std::env::current_dir().ok(),
            install_dir,
            env_token: std::env::var(&config.github.token_env).ok(),
        }
    }
}

/// Long-lived collaborators shared by every command.
pub struct AppState {
    pub config: AppConfig,
    pub tokens: Arc<TokenResolver>,
    pub services: WorkflowServices,
}

impl AppState {
    pub fn new(config: AppConfig, env: Environment) -> crate::error::Result<Self> {
        let tokens = Arc::new(TokenResolver::new(
            config.github.token.clone(),
            Arc::new(KeyringStore::new(&config.github.keychain_service)),
            &config.github.keychain_account,
            env.env_token,
        ));
        let platform = GitHubPlatform::new(&config.github, Arc::clone(&tokens))?;
        let prober = StatusProber::new(
            Arc::new(SystemRunner),
            &config,
            ProbeContext {
                cwd: env.cwd,
                install_dir: env.install_dir,
            },
            Arc::clone(&tokens),
        );

        tracing::debug!(api_base = %config.github.api_base, "Application state ready");

        Ok(Self {
            services: WorkflowServices {
                prober,
                platform: Arc::new(platform),
                poll: PollPolicy::from(&config.checks),
            },
            tokens,
            config,
        })
    }

    /// Read repository status and build a dispatcher seeded with `intents`.
    pub async fn dispatcher(&self, intents: ReleaseIntents) -> crate::error::Result<Dispatcher> {
        Dispatcher::bootstrap(self.services.clone(), intents).await
    }
}
