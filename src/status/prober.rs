use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::changelog::ScriptSearch;
use crate::config::AppConfig;
use crate::error::Precondition;
use crate::platform::github::TokenResolver;
use crate::process::CommandRunner;
use crate::workspace::version::{read_version, version_matches_tag};
use crate::workspace::GitClient;

use super::snapshot::{RepoOverride, SystemStatusSnapshot};

/// Process-edge facts, captured once in `main` and threaded in.
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    pub cwd: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
}

/// Builds `SystemStatusSnapshot`s. Probing never fails; problems land in `last_error`.
#[derive(Clone)]
pub struct StatusProber {
    runner: Arc<dyn CommandRunner>,
    vcs: String,
    script_runner: String,
    version_file: String,
    repo_override: Option<PathBuf>,
    script_search: ScriptSearch,
    script_path: PathBuf,
    cwd: Option<PathBuf>,
    tokens: Arc<TokenResolver>,
}

impl StatusProber {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: &AppConfig,
        context: ProbeContext,
        tokens: Arc<TokenResolver>,
    ) -> Self {
        let repo_override = config.repository.root_override.clone();
        Self {
            runner,
            vcs: config.tools.vcs.clone(),
            script_runner: config.tools.script_runner.clone(),
            version_file: config.repository.version_file.clone(),
            script_search: ScriptSearch {
                explicit: config.changelog.script_override.clone(),
                repo_override: repo_override.clone(),
                cwd: context.cwd.clone(),
                install_dir: context.install_dir,
            },
            repo_override,
            script_path: config.changelog.script_path.clone(),
            cwd: context.cwd,
            tokens,
        }
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn vcs_program(&self) -> &str {
        &self.vcs
    }

    pub fn script_runner_program(&self) -> &str {
        &self.script_runner
    }

    pub fn version_file(&self) -> &str {
        &self.version_file
    }

    pub fn tokens(&self) -> &Arc<TokenResolver> {
        &self.tokens
    }

    /// Blocking; async callers go through `spawn_blocking`.
    pub fn probe(&self) -> SystemStatusSnapshot {
        let mut snapshot = SystemStatusSnapshot::default();

        let (root, repo_override) = self.discover();
        snapshot.repo_override = repo_override;
        match root {
            Ok(root) => {
                self.read_repository(&root, &mut snapshot);
                snapshot.repo_root = Some(root);
            }
            Err(message) => {
                tracing::warn!(error = %message, "Repository root not found");
                snapshot.last_error = Some(message);
            }
        }

        let tool_dir = snapshot.repo_root.as_deref();
        snapshot.vcs_version = self.tool_version(&self.vcs, tool_dir);
        snapshot.script_runner_version = self.tool_version(&self.script_runner, tool_dir);
        snapshot.changelog_script = self.script_search.locate(&self.script_path);
        snapshot.token_source = self.tokens.source();

        tracing::debug!(
            repo = ?snapshot.repo_root,
            clean = snapshot.is_clean,
            version = %snapshot.version,
            latest_tag = %snapshot.latest_tag,
            "Status probed"
        );
        snapshot
    }

    /// Override first, then the working directory.
    fn discover(&self) -> (Result<PathBuf, String>, Option<RepoOverride>) {
        let mut repo_override = None;

        if let Some(path) = &self.repo_override {
            let root = if path.exists() {
                GitClient::discover_root(self.runner.as_ref(), &self.vcs, path).ok()
            } else {
                None
            };
            repo_override = Some(RepoOverride {
                path: path.clone(),
                valid: root.is_some(),
            });
            if let Some(root) = root {
                return (Ok(root), repo_override);
            }
            tracing::warn!(path = %path.display(), "Repo path override is not a git checkout");
        }

        let root = match &self.cwd {
            Some(cwd) => GitClient::discover_root(self.runner.as_ref(), &self.vcs, cwd)
                .map_err(|e| e.to_string()),
            None => Err(Precondition::RepoNotFound.to_string()),
        };
        (root, repo_override)
    }

    fn read_repository(&self, root: &Path, snapshot: &mut SystemStatusSnapshot) {
        let git = GitClient::new(Arc::clone(&self.runner), &self.vcs, root);

        snapshot.current_branch = git.current_branch().ok().filter(|b| !b.is_empty());
        snapshot.upstream_branch = git.upstream_branch().ok().filter(|b| !b.is_empty());

        match git.status() {
            Ok(status) => {
                snapshot.is_clean = status.is_clean();
                snapshot.uncommitted_count = status.uncommitted;
                snapshot.untracked_count = status.untracked;
            }
            Err(e) => {
                tracing::warn!(error = %e, "git status failed");
                snapshot.last_error = Some(e.to_string());
            }
        }

        snapshot.version = read_version(root, &self.version_file);
        snapshot.latest_tag = git.latest_tag();
        snapshot.version_matches_tag = version_matches_tag(&snapshot.version, &snapshot.latest_tag);
        snapshot.origin_url = git.origin_url().ok().filter(|o| !o.is_empty());
        snapshot.default_base_branch = git.default_base_branch();
    }

    fn tool_version(&self, program: &str, cwd: Option<&Path>) -> Option<String> {
        match GitClient::tool_version(self.runner.as_ref(), program, cwd) {
            Ok(out) if !out.trim().is_empty() => Some(out.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(program, error = %e, "Tool not available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::github::TokenSource;
    use crate::testing::{scripted_repo, MemoryStore, ScriptedRunner};

    fn tokens(env: Option<&str>) -> Arc<TokenResolver> {
        Arc::new(TokenResolver::new(
            None,
            Arc::new(MemoryStore::default()),
            "github_token",
            env.map(str::to_string),
        ))
    }

    fn prober(runner: Arc<ScriptedRunner>, config: &AppConfig, cwd: &Path) -> StatusProber {
        StatusProber::new(
            runner,
            config,
            ProbeContext {
                cwd: Some(cwd.to_path_buf()),
                install_dir: None,
            },
            tokens(Some("ghp_env")),
        )
    }

    #[test]
    fn test_no_repo_keeps_defaults_and_skips_git() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .fail("git rev-parse --show-toplevel", "fatal: not a git repository")
                .ok("git --version", "git version 2.44.0")
                .ok("python3 --version", "Python 3.12.1"),
        );
        let tmp = tempfile::tempdir().unwrap();
        let snapshot = prober(runner.clone(), &AppConfig::default(), tmp.path()).probe();

        assert!(snapshot.repo_root.is_none());
        assert_eq!(snapshot.last_error.as_deref(), Some("fatal: not a git repository"));
        assert_eq!(snapshot.default_base_branch, "main");
        assert!(!snapshot.is_clean);
        assert_eq!(snapshot.version, "");
        assert_eq!(snapshot.latest_tag, "");
        assert!(snapshot.origin_url.is_none());
        assert_eq!(snapshot.vcs_version.as_deref(), Some("git version 2.44.0"));
        assert_eq!(snapshot.token_source, Some(TokenSource::Environment));
        assert_eq!(
            runner.command_lines(),
            vec!["git rev-parse --show-toplevel", "git --version", "python3 --version"]
        );
    }

    #[test]
    fn test_snapshot_reads_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("VERSION"), "1.3.0\n").unwrap();
        std::fs::create_dir_all(root.join("scripts")).unwrap();
        std::fs::write(root.join("scripts/sync_changelog.py"), "").unwrap();

        let runner = Arc::new(scripted_repo(root, "?? notes.md\n M src/lib.rs"));
        let snapshot = prober(runner, &AppConfig::default(), root).probe();

        assert_eq!(snapshot.repo_root.as_deref(), Some(root));
        assert_eq!(snapshot.current_branch.as_deref(), Some("main"));
        assert_eq!(snapshot.upstream_branch.as_deref(), Some("origin/main"));
        assert!(!snapshot.is_clean);
        assert_eq!(snapshot.untracked_count, 1);
        assert_eq!(snapshot.uncommitted_count, 1);
        assert_eq!(snapshot.version, "1.3.0");
        assert!(snapshot.version_matches_tag);
        assert_eq!(snapshot.changelog_script, Some(root.join("scripts/sync_changelog.py")));
        assert!(snapshot.prerequisites_met());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_missing_tool_reads_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = scripted_repo(tmp.path(), "").fail("python3 --version", "not found");
        let snapshot = prober(Arc::new(runner), &AppConfig::default(), tmp.path()).probe();
        assert!(snapshot.is_clean);
        assert!(snapshot.script_runner_version.is_none());
        assert!(!snapshot.prerequisites_met());
    }

    #[test]
    fn test_invalid_override_falls_back_to_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.repository.root_override = Some(tmp.path().join("does-not-exist"));

        let runner = Arc::new(scripted_repo(tmp.path(), ""));
        let snapshot = prober(runner, &config, tmp.path()).probe();

        let repo_override = snapshot.repo_override.unwrap();
        assert!(!repo_override.valid);
        assert_eq!(snapshot.repo_root.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn test_valid_override_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.repository.root_override = Some(tmp.path().to_path_buf());

        let runner = Arc::new(scripted_repo(tmp.path(), ""));
        let snapshot = prober(runner.clone(), &config, Path::new("/elsewhere")).probe();

        assert!(snapshot.repo_override.unwrap().valid);
        let discovery = &runner.invocations()[0];
        assert_eq!(discovery.cwd.as_deref(), Some(tmp.path()));
    }
}
