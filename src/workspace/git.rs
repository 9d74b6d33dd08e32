use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Precondition, Result};
use crate::process::CommandRunner;

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(Precondition::InvalidBranchName(name.to_string()).into());
    }
    Ok(())
}

/// Working-tree summary parsed from `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkingTreeStatus {
    pub uncommitted: usize,
    pub untracked: usize,
}

impl WorkingTreeStatus {
    pub fn parse(porcelain: &str) -> Self {
        let mut status = Self::default();
        for line in porcelain.lines().filter(|l| !l.trim().is_empty()) {
            if line.starts_with("??") {
                status.untracked += 1;
            } else {
                status.uncommitted += 1;
            }
        }
        status
    }

    pub fn is_clean(&self) -> bool {
        self.uncommitted == 0 && self.untracked == 0
    }

    pub fn total(&self) -> usize {
        self.uncommitted + self.untracked
    }
}

/// Git command-line client bound to one repository root.
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
    program: String,
    root: PathBuf,
}

impl GitClient {
    pub fn new(runner: Arc<dyn CommandRunner>, program: &str, root: &Path) -> Self {
        Self {
            runner,
            program: program.to_string(),
            root: root.to_path_buf(),
        }
    }

    /// Resolve the top-level directory of the checkout containing `dir`.
    pub fn discover_root(runner: &dyn CommandRunner, program: &str, dir: &Path) -> Result<PathBuf> {
        let out = runner.run(program, &["rev-parse", "--show-toplevel"], Some(dir))?;
        let top = out.trim();
        if top.is_empty() {
            return Err(crate::error::AppError::Process {
                exit_code: None,
                output: format!("{} is not inside a git repository", dir.display()),
            });
        }
        Ok(PathBuf::from(top))
    }

    /// `git --version`, run wherever the caller points it.
    pub fn tool_version(runner: &dyn CommandRunner, program: &str, cwd: Option<&Path>) -> Result<String> {
        runner.run(program, &["--version"], cwd)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        self.runner.run(&self.program, args, Some(&self.root))
    }

    pub fn status(&self) -> Result<WorkingTreeStatus> {
        let out = self.git(&["status", "--porcelain"])?;
        Ok(WorkingTreeStatus::parse(&out))
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
    }

    pub fn upstream_branch(&self) -> Result<String> {
        Ok(self
            .git(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])?
            .trim()
            .to_string())
    }

    pub fn origin_url(&self) -> Result<String> {
        Ok(self.git(&["remote", "get-url", "origin"])?.trim().to_string())
    }

    /// Branch `origin/HEAD` points at, falling back to `main`.
    pub fn default_base_branch(&self) -> String {
        match self.git(&["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            Ok(out) => {
                let name = out.trim().trim_start_matches("refs/remotes/origin/");
                if name.is_empty() {
                    "main".to_string()
                } else {
                    name.to_string()
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "origin/HEAD not set, assuming main");
                "main".to_string()
            }
        }
    }

    /// Most recent `v*` tag, or an empty string when there is none.
    pub fn latest_tag(&self) -> String {
        match self.git(&["describe", "--tags", "--abbrev=0", "--match", "v*"]) {
            Ok(out) => out.trim().to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "No release tag found");
                String::new()
            }
        }
    }

    /// Create and checkout a new branch.
    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        validate_branch_name(branch_name)?;
        self.git(&["checkout", "-b", branch_name])?;
        Ok(())
    }

    /// Stage changes; `include_untracked` picks `add -A` over `add -u`.
    pub fn stage(&self, include_untracked: bool) -> Result<()> {
        let mode = if include_untracked { "-A" } else { "-u" };
        self.git(&["add", mode])?;
        Ok(())
    }

    /// Commit with a message.
    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    /// Push the branch to origin and set its upstream.
    pub fn push(&self, branch_name: &str) -> Result<()> {
        validate_branch_name(branch_name)?;
        self.git(&["push", "-u", "origin", branch_name])?;
        Ok(())
    }

    pub fn delete_remote_branch(&self, branch_name: &str) -> Result<()> {
        validate_branch_name(branch_name)?;
        self.git(&["push", "origin", "--delete", branch_name])?;
        Ok(())
    }

    /// Create the annotated release tag `v<version>`.
    ///
    /// The caller is responsible for checking that the working tree is clean.
    pub fn create_release_tag(&self, version: &str) -> Result<String> {
        let tag = format!("v{version}");
        let message = format!("Release {version}");
        self.git(&["tag", "-a", &tag, "-m", &message])?;
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testing::ScriptedRunner;

    fn client(runner: &Arc<ScriptedRunner>) -> GitClient {
        GitClient::new(runner.clone(), "git", Path::new("/repo"))
    }

    #[test]
    fn test_validate_branch_name_rejects_dash_prefix() {
        assert!(validate_branch_name("-evil").is_err());
        assert!(validate_branch_name("--upload-pack").is_err());
    }

    #[test]
    fn test_validate_branch_name_accepts_normal() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("feature/my-branch").is_ok());
        assert!(validate_branch_name("release/1.4.0").is_ok());
    }

    #[test]
    fn test_parse_porcelain_counts() {
        let status = WorkingTreeStatus::parse("?? new.txt\n M src/lib.rs");
        assert_eq!(status.untracked, 1);
        assert_eq!(status.uncommitted, 1);
        assert!(!status.is_clean());
        assert_eq!(status.total(), 2);
    }

    #[test]
    fn test_parse_porcelain_empty_is_clean() {
        let status = WorkingTreeStatus::parse("");
        assert!(status.is_clean());
        assert_eq!(status, WorkingTreeStatus::default());
    }

    #[test]
    fn test_status_runs_in_repo_root() {
        let runner = Arc::new(ScriptedRunner::new().ok("git status --porcelain", "?? a\n?? b\nA  c"));
        let status = client(&runner).status().unwrap();
        assert_eq!(status.untracked, 2);
        assert_eq!(status.uncommitted, 1);

        let calls = runner.invocations();
        assert_eq!(calls[0].cwd.as_deref(), Some(Path::new("/repo")));
    }

    #[test]
    fn test_default_base_branch_strips_prefix() {
        let runner = Arc::new(
            ScriptedRunner::new().ok("git symbolic-ref refs/remotes/origin/HEAD", "refs/remotes/origin/develop"),
        );
        assert_eq!(client(&runner).default_base_branch(), "develop");
    }

    #[test]
    fn test_default_base_branch_falls_back_to_main() {
        let runner = Arc::new(ScriptedRunner::new());
        assert_eq!(client(&runner).default_base_branch(), "main");
    }

    #[test]
    fn test_latest_tag_absent_is_empty() {
        let runner = Arc::new(ScriptedRunner::new().fail(
            "git describe --tags --abbrev=0 --match v*",
            "fatal: No names found, cannot describe anything.",
        ));
        assert_eq!(client(&runner).latest_tag(), "");
    }

    #[test]
    fn test_create_release_tag_arguments() {
        let runner = Arc::new(ScriptedRunner::new().ok("git tag -a v1.4.0 -m Release 1.4.0", ""));
        let tag = client(&runner).create_release_tag("1.4.0").unwrap();
        assert_eq!(tag, "v1.4.0");

        let calls = runner.invocations();
        assert_eq!(calls[0].args, vec!["tag", "-a", "v1.4.0", "-m", "Release 1.4.0"]);
    }

    #[test]
    fn test_stage_modes() {
        let runner = Arc::new(ScriptedRunner::new().ok("git add -A", "").ok("git add -u", ""));
        let git = client(&runner);
        git.stage(true).unwrap();
        git.stage(false).unwrap();
        assert_eq!(runner.command_lines(), vec!["git add -A", "git add -u"]);
    }

    #[test]
    fn test_branch_operations_reject_dash_before_running() {
        let runner = Arc::new(ScriptedRunner::new());
        let git = client(&runner);
        assert!(git.create_branch("-x").is_err());
        assert!(git.push("--force").is_err());
        assert!(git.delete_remote_branch("-d").is_err());
        assert!(runner.command_lines().is_empty());
    }

    #[test]
    fn test_discover_root_propagates_failure() {
        let runner = ScriptedRunner::new().fail(
            "git rev-parse --show-toplevel",
            "fatal: not a git repository",
        );
        let err = GitClient::discover_root(&runner, "git", Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, AppError::Process { .. }));
        assert_eq!(err.to_string(), "fatal: not a git repository");
    }
}
