pub mod session;
pub mod state;

pub use session::Session;
pub use state::{
    FailureNotice, GeneratedResult, GenerationRequest, Step, Workflow, WorkflowEvent,
    WorkflowState,
};
