pub mod action;
pub mod dispatcher;
pub mod gate;
pub mod state;
pub mod types;

pub use action::{WorkflowAction, WorkflowServices};
pub use dispatcher::{ActionFailure, ActionOutcome, Dispatcher};
pub use state::{Effect, ReleaseIntents, WorkflowState};
pub use types::WorkflowStep;
