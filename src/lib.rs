// account-wrangler library - resilient multi-session signup automation
// This exposes the core components for testing and integration

pub mod account;
pub mod browser;
pub mod config;
pub mod mailbox;
pub mod motion;
pub mod orchestrator;
pub mod proxy;
pub mod records;
pub mod retry;
pub mod shutdown;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use account::Account;
pub use browser::{
    DelayBand, DriveError, ElementBox, ElementHandle, HumanInput, PageDriver, SessionFactory,
    SessionRequest, TypingSpeed,
};
pub use config::{config, AccountWranglerConfig};
pub use mailbox::{CodeFetcher, PollingVerifier, VerificationPoller};
pub use motion::{MotionConfig, MotionSynthesizer, Point};
pub use orchestrator::{CompletionSet, Orchestrator, OrchestratorConfig, RunSummary};
pub use proxy::{ProxyEndpoint, ProxyRotation};
pub use records::ResultsLog;
pub use retry::{retry, RetryPolicy};
pub use shutdown::ShutdownFlag;
pub use telemetry::init_telemetry;
pub use workflow::{
    FailureKind, SignupPage, SignupStage, SignupWorkflow, WorkflowError, WorkflowOutcome,
    WorkflowTuning,
};
