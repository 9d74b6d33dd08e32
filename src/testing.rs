//! Scripted fakes for the process, platform and secret-store seams.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::platform::github::{SecretStore, TokenResolver};
use crate::platform::poll::PollPolicy;
use crate::platform::types::*;
use crate::platform::Platform;
use crate::process::{CommandRunner, Invocation};
use crate::status::{ProbeContext, StatusProber};
use crate::workflow::{Dispatcher, ReleaseIntents, WorkflowServices};

/// Answers commands by their `command_line()`; unknown commands fail.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, std::result::Result<String, String>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, line: &str, output: &str) -> Self {
        self.set_ok(line, output);
        self
    }

    pub fn fail(self, line: &str, output: &str) -> Self {
        self.set_fail(line, output);
        self
    }

    /// Replace a response after the runner has been shared.
    pub fn set_ok(&self, line: &str, output: &str) {
        self.responses
            .lock()
            .insert(line.to_string(), Ok(output.to_string()));
    }

    pub fn set_fail(&self, line: &str, output: &str) {
        self.responses
            .lock()
            .insert(line.to_string(), Err(output.to_string()));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(Invocation::command_line).collect()
    }

    pub fn ran(&self, line: &str) -> bool {
        self.command_lines().iter().any(|l| l == line)
    }
}

impl CommandRunner for ScriptedRunner {
    fn execute(&self, invocation: &Invocation) -> Result<String> {
        self.calls.lock().push(invocation.clone());
        let line = invocation.command_line();
        match self.responses.lock().get(&line) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(out)) => Err(AppError::Process {
                exit_code: Some(1),
                output: out.clone(),
            }),
            None => Err(AppError::Process {
                exit_code: Some(127),
                output: format!("unscripted command: {line}"),
            }),
        }
    }
}

/// Platform double with queued check responses and call counters.
#[derive(Default)]
pub struct FakePlatform {
    checks: Mutex<VecDeque<Result<ChecksSummary>>>,
    created: Mutex<Option<PullRequestInfo>>,
    merge_error: Mutex<Option<AppError>>,
    checks_calls: AtomicUsize,
    create_calls: AtomicUsize,
    merge_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn push_checks(&self, response: Result<ChecksSummary>) {
        self.checks.lock().push_back(response);
    }

    pub fn set_created(&self, info: PullRequestInfo) {
        *self.created.lock() = Some(info);
    }

    pub fn fail_merge(&self, error: AppError) {
        *self.merge_error.lock() = Some(error);
    }

    pub fn checks_calls(&self) -> usize {
        self.checks_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_pull_request(
        &self,
        _repo: &RepoSlug,
        pr: &CreatePullRequest,
    ) -> Result<PullRequestInfo> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.created.lock().clone().unwrap_or_else(|| PullRequestInfo {
            number: 7,
            url: format!("https://github.com/acme/widgets/pull/7?head={}", pr.head_branch),
            head_sha: "abc123".to_string(),
            state: "open".to_string(),
            mergeable: None,
            mergeable_state: None,
        }))
    }

    async fn checks_summary(&self, _repo: &RepoSlug, _sha: &str) -> Result<ChecksSummary> {
        self.checks_calls.fetch_add(1, Ordering::SeqCst);
        self.checks
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ChecksSummary::new(CheckState::Pending, &[])))
    }

    async fn merge_pull_request(
        &self,
        _repo: &RepoSlug,
        _pr_number: u64,
        _method: MergeMethod,
    ) -> Result<()> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        match self.merge_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// In-memory secret store.
#[derive(Default)]
pub struct MemoryStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemoryStore {
    fn get(&self, account: &str) -> Result<Option<String>> {
        Ok(self.secrets.lock().get(account).cloned())
    }

    fn set(&self, account: &str, secret: &str) -> Result<()> {
        self.secrets
            .lock()
            .insert(account.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<()> {
        self.secrets.lock().remove(account);
        Ok(())
    }
}

/// A temporary checkout with VERSION 1.3.0, tag v1.3.0, an origin remote and
/// the changelog script, wired to a dispatcher over scripted fakes.
pub struct Fixture {
    _tmp: tempfile::TempDir,
    pub root: PathBuf,
    pub runner: Arc<ScriptedRunner>,
    pub platform: Arc<FakePlatform>,
    pub dispatcher: Dispatcher,
}

pub fn scripted_repo(root: &Path, porcelain: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .ok("git rev-parse --show-toplevel", root.to_str().unwrap())
        .ok("git rev-parse --abbrev-ref HEAD", "main")
        .ok("git rev-parse --abbrev-ref --symbolic-full-name @{u}", "origin/main")
        .ok("git status --porcelain", porcelain)
        .ok("git describe --tags --abbrev=0 --match v*", "v1.3.0")
        .ok("git remote get-url origin", "git@github.com:acme/widgets.git")
        .ok("git symbolic-ref refs/remotes/origin/HEAD", "refs/remotes/origin/main")
        .ok("git --version", "git version 2.44.0")
        .ok("python3 --version", "Python 3.12.1")
}

pub fn fixture(porcelain: &str, intents: ReleaseIntents) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    std::fs::write(root.join("VERSION"), "1.3.0\n").unwrap();
    std::fs::create_dir_all(root.join("scripts")).unwrap();
    std::fs::write(root.join("scripts/sync_changelog.py"), "").unwrap();

    let runner = Arc::new(scripted_repo(&root, porcelain));
    let platform = Arc::new(FakePlatform::default());
    let tokens = Arc::new(TokenResolver::new(
        Some("ghp_session".to_string()),
        Arc::new(MemoryStore::default()),
        "github_token",
        None,
    ));
    let prober = StatusProber::new(
        runner.clone(),
        &AppConfig::default(),
        ProbeContext {
            cwd: Some(root.clone()),
            install_dir: None,
        },
        tokens,
    );
    let services = WorkflowServices {
        prober: prober.clone(),
        platform: platform.clone(),
        poll: PollPolicy {
            interval: Duration::ZERO,
            max_polls: 3,
            rate_limit_backoff: Duration::ZERO,
        },
    };
    let dispatcher = Dispatcher::new(services, intents, prober.probe());

    Fixture {
        _tmp: tmp,
        root,
        runner,
        platform,
        dispatcher,
    }
}
