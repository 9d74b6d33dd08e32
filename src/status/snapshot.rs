use std::path::PathBuf;

use serde::Serialize;

use crate::platform::github::TokenSource;

/// Override path the user asked for, and whether it resolved to a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoOverride {
    pub path: PathBuf,
    pub valid: bool,
}

/// One read of repository, tooling and token state.
///
/// Built wholesale by the prober and shared behind an `Arc`; never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatusSnapshot {
    pub repo_root: Option<PathBuf>,
    pub repo_override: Option<RepoOverride>,
    pub origin_url: Option<String>,
    pub current_branch: Option<String>,
    pub upstream_branch: Option<String>,
    pub default_base_branch: String,
    pub is_clean: bool,
    pub uncommitted_count: usize,
    pub untracked_count: usize,
    pub version: String,
    pub latest_tag: String,
    pub version_matches_tag: bool,
    pub vcs_version: Option<String>,
    pub script_runner_version: Option<String>,
    pub changelog_script: Option<PathBuf>,
    pub token_source: Option<TokenSource>,
    pub last_error: Option<String>,
}

impl Default for SystemStatusSnapshot {
    fn default() -> Self {
        Self {
            repo_root: None,
            repo_override: None,
            origin_url: None,
            current_branch: None,
            upstream_branch: None,
            default_base_branch: "main".to_string(),
            is_clean: false,
            uncommitted_count: 0,
            untracked_count: 0,
            version: String::new(),
            latest_tag: String::new(),
            version_matches_tag: false,
            vcs_version: None,
            script_runner_version: None,
            changelog_script: None,
            token_source: None,
            last_error: None,
        }
    }
}

impl SystemStatusSnapshot {
    /// Repo found, both tools answer, and the changelog script exists.
    pub fn prerequisites_met(&self) -> bool {
        self.repo_root.is_some()
            && self.vcs_version.is_some()
            && self.script_runner_version.is_some()
            && self.changelog_script.is_some()
    }

    pub fn token_present(&self) -> bool {
        self.token_source.is_some()
    }

    pub fn has_origin(&self) -> bool {
        self.origin_url.as_deref().is_some_and(|o| !o.is_empty())
    }
}

/// `-` for absent values, the way the status report shows them.
pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_repo() {
        let snapshot = SystemStatusSnapshot::default();
        assert_eq!(snapshot.default_base_branch, "main");
        assert!(!snapshot.is_clean);
        assert!(!snapshot.version_matches_tag);
        assert!(!snapshot.prerequisites_met());
        assert_eq!(or_dash(snapshot.origin_url.as_deref()), "-");
    }

    #[test]
    fn test_prerequisites() {
        let snapshot = SystemStatusSnapshot {
            repo_root: Some(PathBuf::from("/repo")),
            vcs_version: Some("git version 2.44.0".to_string()),
            script_runner_version: Some("Python 3.12.1".to_string()),
            changelog_script: Some(PathBuf::from("/repo/scripts/sync_changelog.py")),
            ..SystemStatusSnapshot::default()
        };
        assert!(snapshot.prerequisites_met());

        let missing_python = SystemStatusSnapshot {
            script_runner_version: None,
            ..snapshot
        };
        assert!(!missing_python.prerequisites_met());
    }
}
