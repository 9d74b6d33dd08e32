//! Plain-text and JSON renderings for the CLI.

use serde::Serialize;

use crate::driver::{ReleaseRun, StopReason};
use crate::error::Result;
use crate::status::snapshot::or_dash;
use crate::status::{diagnose, StatusIssue, SystemStatusSnapshot};
use crate::workflow::gate::{self, GateReport};
use crate::workflow::{ActionOutcome, WorkflowState};

#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub snapshot: &'a SystemStatusSnapshot,
    pub issues: Vec<StatusIssue>,
    pub gates: GateReport,
}

impl<'a> StatusReport<'a> {
    pub fn new(snapshot: &'a SystemStatusSnapshot, state: &WorkflowState) -> Self {
        Self {
            snapshot,
            issues: diagnose(snapshot, state),
            gates: gate::evaluate(snapshot, state),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render(&self) -> String {
        let s = self.snapshot;
        let mut out = String::new();
        let repo = s.repo_root.as_ref().map(|p| p.display().to_string());
        let script = s.changelog_script.as_ref().map(|p| p.display().to_string());
        let token = s.token_source.map(|t| t.to_string());
        let workspace = if s.repo_root.is_none() {
            "-".to_string()
        } else if s.is_clean {
            "clean".to_string()
        } else {
            format!(
                "{} uncommitted, {} untracked",
                s.uncommitted_count, s.untracked_count
            )
        };

        let rows = [
            ("Repository", or_dash(repo.as_deref()).to_string()),
            ("Origin", or_dash(s.origin_url.as_deref()).to_string()),
            ("Branch", or_dash(s.current_branch.as_deref()).to_string()),
            ("Upstream", or_dash(s.upstream_branch.as_deref()).to_string()),
            ("Base branch", s.default_base_branch.clone()),
            ("Workspace", workspace),
            ("VERSION", or_dash(Some(&s.version)).to_string()),
            ("Latest tag", or_dash(Some(&s.latest_tag)).to_string()),
            (
                "Version matches tag",
                if s.version_matches_tag { "yes" } else { "no" }.to_string(),
            ),
            ("git", or_dash(s.vcs_version.as_deref()).to_string()),
            ("Python", or_dash(s.script_runner_version.as_deref()).to_string()),
            ("Changelog script", or_dash(script.as_deref()).to_string()),
            ("GitHub token", or_dash(token.as_deref()).to_string()),
        ];
        for (label, value) in rows {
            out.push_str(&format!("{label:<20} {value}\n"));
        }
        if let Some(error) = &s.last_error {
            out.push_str(&format!("{:<20} {error}\n", "Last error"));
        }

        if !self.issues.is_empty() {
            out.push_str("\nIssues:\n");
            for issue in &self.issues {
                out.push_str(&format!(
                    "  [{}] {}: {}\n      fix: {}\n",
                    issue.level, issue.title, issue.detail, issue.fix
                ));
            }
        }

        out.push_str("\nSteps:\n");
        for (index, step) in self.gates.steps.iter().enumerate() {
            let marker = if step.completed {
                "x"
            } else if self.gates.next_incomplete == Some(step.step) {
                ">"
            } else {
                " "
            };
            let note = if let Some(reason) = step.pending_reason.as_ref().filter(|_| !step.completed) {
                format!(" ({reason})")
            } else if let Some(reason) = step.blocked_reason.as_ref().filter(|_| !step.selectable) {
                format!(" - {reason}")
            } else {
                String::new()
            };
            out.push_str(&format!("  [{marker}] {:>2}. {}{note}\n", index + 1, step.title));
        }
        if let Some(next) = self.gates.next_incomplete {
            out.push_str(&format!(
                "\nNext: {} - {} (typically {})\n",
                next.title(),
                next.instruction(),
                next.typical_time()
            ));
        }
        out
    }
}

/// One line per outcome as the release run progresses.
pub fn outcome_line(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Succeeded { action, message } => format!("ok    {action}: {message}"),
        ActionOutcome::Failed(failure) => {
            format!("fail  {}: {}\n      fix: {}", failure.action, failure.message, failure.fix)
        }
    }
}

pub fn run_summary(run: &ReleaseRun) -> String {
    match &run.stop {
        StopReason::Finished => {
            "Release workflow complete. Review the changelog and finish.".to_string()
        }
        StopReason::Blocked { step, detail } => format!("Stopped at \"{step}\": {detail}"),
        StopReason::Failed(failure) => {
            format!("Stopped after \"{}\" failed.", failure.action)
        }
        StopReason::Interrupted => "Interrupted. Re-run to continue from the next step.".to_string(),
        StopReason::ActionLimit => {
            "Stopped after too many actions in one run. Re-run to continue.".to_string()
        }
    }
}
