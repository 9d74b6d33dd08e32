use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;

/// Where the active GitHub token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenSource {
    Session,
    Keychain,
    Environment,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenSource::Session => "Session",
            TokenSource::Keychain => "Keychain",
            TokenSource::Environment => "Environment",
        })
    }
}

/// Secure token storage keyed by account name.
pub trait SecretStore: Send + Sync {
    fn get(&self, account: &str) -> Result<Option<String>>;
    fn set(&self, account: &str, secret: &str) -> Result<()>;
    fn delete(&self, account: &str) -> Result<()>;
}

/// OS keychain (macOS Keychain, Windows Credential Manager, Linux keyutils).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, account: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(&self.service, account)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, account: &str, secret: &str) -> Result<()> {
        let entry = keyring::Entry::new(&self.service, account)?;
        entry.set_password(secret)?;
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<()> {
        let entry = keyring::Entry::new(&self.service, account)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolves the GitHub token: session value, then keychain, then environment.
///
/// The environment value is captured once at startup and passed in.
pub struct TokenResolver {
    session: RwLock<Option<String>>,
    store: Arc<dyn SecretStore>,
    account: String,
    env_token: Option<String>,
}

impl TokenResolver {
    pub fn new(
        session: Option<String>,
        store: Arc<dyn SecretStore>,
        account: &str,
        env_token: Option<String>,
    ) -> Self {
        Self {
            session: RwLock::new(non_empty(session)),
            store,
            account: account.to_string(),
            env_token: non_empty(env_token),
        }
    }

    pub fn set_session_token(&self, token: Option<String>) {
        *self.session.write() = non_empty(token);
    }

    /// First non-empty token and its source.
    pub fn resolve(&self) -> Option<(String, TokenSource)> {
        if let Some(token) = self.session.read().clone() {
            return Some((token, TokenSource::Session));
        }

        match self.store.get(&self.account) {
            Ok(Some(token)) if !token.trim().is_empty() => {
                return Some((token.trim().to_string(), TokenSource::Keychain));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Keychain lookup failed, falling back to environment");
            }
        }

        self.env_token
            .clone()
            .map(|token| (token, TokenSource::Environment))
    }

    pub fn source(&self) -> Option<TokenSource> {
        self.resolve().map(|(_, source)| source)
    }

    pub fn save_to_store(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(crate::error::Precondition::EmptyInput("Token").into());
        }
        self.store.set(&self.account, token)?;
        tracing::info!(account = %self.account, "Saved GitHub token to keychain");
        Ok(())
    }

    pub fn clear_store(&self) -> Result<()> {
        self.store.delete(&self.account)?;
        tracing::info!(account = %self.account, "Removed GitHub token from keychain");
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
