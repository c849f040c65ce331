//! The fixed linear signup workflow: step library plus the state machine
//! that sequences it.

pub mod machine;
pub mod steps;

pub use machine::{
    FailureKind, SignupStage, SignupWorkflow, WorkflowError, WorkflowOutcome, WorkflowTuning,
};
pub use steps::SignupPage;
