pub mod diagnostics;
pub mod prober;
pub mod snapshot;

pub use diagnostics::{diagnose, IssueLevel, StatusIssue};
pub use prober::{ProbeContext, StatusProber};
pub use snapshot::{RepoOverride, SystemStatusSnapshot};
