pub mod git;
pub mod version;

pub use git::{GitClient, WorkingTreeStatus};
