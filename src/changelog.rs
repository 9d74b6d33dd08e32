//! Locating and running the changelog sync script.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Precondition, Result};
use crate::process::{CommandRunner, Invocation};

/// Directories the process was started from; captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct ScriptSearch {
    pub explicit: Option<PathBuf>,
    pub repo_override: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
}

impl ScriptSearch {
    /// Candidate paths in priority order: explicit, repo override, cwd,
    /// then the install directory and its two parents.
    pub fn candidates(&self, relative: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(explicit) = &self.explicit {
            candidates.push(explicit.clone());
        }
        if let Some(repo) = &self.repo_override {
            candidates.push(repo.join(relative));
        }
        if let Some(cwd) = &self.cwd {
            candidates.push(cwd.join(relative));
        }
        if let Some(install) = &self.install_dir {
            candidates.extend(install.ancestors().take(3).map(|dir| dir.join(relative)));
        }
        candidates
    }

    /// First candidate that exists as a file.
    pub fn locate(&self, relative: &Path) -> Option<PathBuf> {
        self.candidates(relative).into_iter().find(|p| p.is_file())
    }
}

/// Options forwarded to the script.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub include_github_data: bool,
    pub dry_run: bool,
    pub token: Option<String>,
}

/// Runs `<runner> <script> [--no-github] [--dry-run]` from the script's directory.
pub struct ChangelogSync {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ChangelogSync {
    pub fn new(runner: Arc<dyn CommandRunner>, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
        }
    }

    pub fn invocation(&self, script: &Path, options: &SyncOptions) -> Invocation {
        let mut args = vec![script.display().to_string()];
        if !options.include_github_data {
            args.push("--no-github".to_string());
        }
        if options.dry_run {
            args.push("--dry-run".to_string());
        }

        let mut invocation = Invocation::new(&self.program, args).current_dir(script.parent());
        if options.include_github_data {
            if let Some(token) = &options.token {
                invocation = invocation.env("GITHUB_TOKEN", token);
            }
        }
        invocation
    }

    /// Run the script and return its output verbatim.
    pub fn run(&self, script: &Path, options: &SyncOptions) -> Result<String> {
        if !script.is_file() {
            return Err(Precondition::ChangelogScriptMissing.into());
        }
        tracing::info!(
            script = %script.display(),
            github = options.include_github_data,
            dry_run = options.dry_run,
            "Running changelog sync"
        );
        self.runner.execute(&self.invocation(script, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const RELATIVE: &str = "scripts/sync_changelog.py";

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "print('ok')\n").unwrap();
    }

    #[test]
    fn test_candidate_order() {
        let search = ScriptSearch {
            explicit: Some(PathBuf::from("/opt/sync.py")),
            repo_override: Some(PathBuf::from("/work/repo")),
            cwd: Some(PathBuf::from("/home/me")),
            install_dir: Some(PathBuf::from("/usr/local/lib/tool/bin")),
        };
        let candidates = search.candidates(Path::new(RELATIVE));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/opt/sync.py"),
                PathBuf::from("/work/repo/scripts/sync_changelog.py"),
                PathBuf::from("/home/me/scripts/sync_changelog.py"),
                PathBuf::from("/usr/local/lib/tool/bin/scripts/sync_changelog.py"),
                PathBuf::from("/usr/local/lib/tool/scripts/sync_changelog.py"),
                PathBuf::from("/usr/local/lib/scripts/sync_changelog.py"),
            ]
        );
    }

    #[test]
    fn test_locate_first_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("cwd");
        let install = tmp.path().join("install/bin");
        std::fs::create_dir_all(&install).unwrap();
        touch(&cwd.join(RELATIVE));
        touch(&tmp.path().join("install").join(RELATIVE));

        let search = ScriptSearch {
            explicit: Some(tmp.path().join("missing.py")),
            repo_override: None,
            cwd: Some(cwd.clone()),
            install_dir: Some(install),
        };
        assert_eq!(search.locate(Path::new(RELATIVE)), Some(cwd.join(RELATIVE)));
    }

    #[test]
    fn test_locate_none() {
        let tmp = tempfile::tempdir().unwrap();
        let search = ScriptSearch {
            cwd: Some(tmp.path().to_path_buf()),
            ..ScriptSearch::default()
        };
        assert_eq!(search.locate(Path::new(RELATIVE)), None);
    }

    #[test]
    fn test_invocation_flags_and_directory() {
        let sync = ChangelogSync::new(Arc::new(ScriptedRunner::new()), "python3");
        let script = Path::new("/repo/scripts/sync_changelog.py");

        let inv = sync.invocation(
            script,
            &SyncOptions {
                include_github_data: false,
                dry_run: true,
                token: Some("ghp_x".to_string()),
            },
        );
        assert_eq!(
            inv.args,
            vec!["/repo/scripts/sync_changelog.py", "--no-github", "--dry-run"]
        );
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("/repo/scripts")));
        assert!(inv.envs.is_empty());

        let inv = sync.invocation(
            script,
            &SyncOptions {
                include_github_data: true,
                dry_run: false,
                token: Some("ghp_x".to_string()),
            },
        );
        assert_eq!(inv.args, vec!["/repo/scripts/sync_changelog.py"]);
        assert_eq!(inv.envs, vec![("GITHUB_TOKEN".to_string(), "ghp_x".to_string())]);
    }

    #[test]
    fn test_run_returns_output() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join(RELATIVE);
        touch(&script);

        let line = format!("python3 {} --no-github", script.display());
        let runner = Arc::new(ScriptedRunner::new().ok(&line, "Updated CHANGELOG.md"));
        let sync = ChangelogSync::new(runner, "python3");
        let out = sync
            .run(
                &script,
                &SyncOptions {
                    include_github_data: false,
                    ..SyncOptions::default()
                },
            )
            .unwrap();
        assert_eq!(out, "Updated CHANGELOG.md");
    }

    #[test]
    fn test_run_missing_script() {
        let sync = ChangelogSync::new(Arc::new(ScriptedRunner::new()), "python3");
        let err = sync
            .run(Path::new("/nope/sync_changelog.py"), &SyncOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Changelog sync script not found.");
    }
}
