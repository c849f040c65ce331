//! The account signup state machine.
//!
//! Strictly ordered stages with no backward transitions; the only loop is
//! the embedded code-wait/resend sub-protocol inside `AwaitCode`. An
//! instance is one-shot: it runs a single account to `Success` or
//! `Failure` and is then discarded.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::steps::SignupPage;
use crate::account::Account;
use crate::browser::DriveError;
use crate::mailbox::VerificationPoller;

/// Failure taxonomy surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error("verification code must be 6 digits, got {code:?}")]
    InvalidCode { code: String },

    #[error("birthdate must be MM/DD/YYYY, got {value:?}")]
    InvalidBirthdate { value: String },

    #[error("no verification code received after {attempts} attempts")]
    CodeTimeout { attempts: u32 },

    #[error("account creation not verified; ended at {final_url}")]
    Unverified { final_url: String },
}

/// Structured failure classification; renders kebab-case in verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Proxy,
    Selector,
    Validation,
    CodeTimeout,
    Unverified,
    Browser,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Proxy => "proxy",
            FailureKind::Selector => "selector",
            FailureKind::Validation => "input-validation",
            FailureKind::CodeTimeout => "code-timeout",
            FailureKind::Unverified => "unverified-completion",
            FailureKind::Browser => "browser",
        };
        f.write_str(label)
    }
}

/// Result of one workflow instance, driving orchestrator decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Success,
    /// Worth restarting with a fresh proxy endpoint.
    RetryableFailure { kind: FailureKind, detail: String },
    /// The account attempt stops here for this run.
    FatalFailure { kind: FailureKind, detail: String },
}

impl WorkflowOutcome {
    pub fn from_error(error: &WorkflowError) -> Self {
        match error {
            WorkflowError::Drive(drive) if drive.is_proxy_related() => {
                WorkflowOutcome::RetryableFailure {
                    kind: FailureKind::Proxy,
                    detail: drive.to_string(),
                }
            }
            WorkflowError::Drive(
                DriveError::ElementNotFound { .. } | DriveError::Timeout { .. },
            ) => WorkflowOutcome::FatalFailure {
                kind: FailureKind::Selector,
                detail: error.to_string(),
            },
            WorkflowError::Drive(_) => WorkflowOutcome::FatalFailure {
                kind: FailureKind::Browser,
                detail: error.to_string(),
            },
            WorkflowError::InvalidCode { .. } | WorkflowError::InvalidBirthdate { .. } => {
                WorkflowOutcome::FatalFailure {
                    kind: FailureKind::Validation,
                    detail: error.to_string(),
                }
            }
            WorkflowError::CodeTimeout { .. } => WorkflowOutcome::FatalFailure {
                kind: FailureKind::CodeTimeout,
                detail: error.to_string(),
            },
            WorkflowError::Unverified { final_url } => WorkflowOutcome::FatalFailure {
                kind: FailureKind::Unverified,
                detail: final_url.clone(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Success)
    }

    /// Whether the orchestrator should swap proxies and try again.
    pub fn wants_proxy_retry(&self) -> bool {
        matches!(
            self,
            WorkflowOutcome::RetryableFailure {
                kind: FailureKind::Proxy,
                ..
            }
        )
    }
}

/// The fixed stage order. No backward transitions; `AwaitCode` contains
/// the only internal loop (resend-and-poll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStage {
    Navigate,
    EnterEmail,
    SubmitEmail,
    AwaitCode,
    EnterCode,
    SubmitCode,
    EnterBirthdate,
    SubmitBirthdate,
    EnterUsername,
    SubmitUsername,
    EnterPassword,
    SubmitPassword,
    AcceptTerms,
    VerifyCreated,
}

impl SignupStage {
    pub fn next(self) -> Option<SignupStage> {
        use SignupStage::*;
        Some(match self {
            Navigate => EnterEmail,
            EnterEmail => SubmitEmail,
            SubmitEmail => AwaitCode,
            AwaitCode => EnterCode,
            EnterCode => SubmitCode,
            SubmitCode => EnterBirthdate,
            EnterBirthdate => SubmitBirthdate,
            SubmitBirthdate => EnterUsername,
            EnterUsername => SubmitUsername,
            SubmitUsername => EnterPassword,
            EnterPassword => SubmitPassword,
            SubmitPassword => AcceptTerms,
            AcceptTerms => VerifyCreated,
            VerifyCreated => return None,
        })
    }

    /// Coarse 1..=8 progress step for operator-facing logs.
    pub fn progress_step(self) -> u8 {
        use SignupStage::*;
        match self {
            Navigate => 1,
            EnterEmail | SubmitEmail => 2,
            AwaitCode => 3,
            EnterCode | SubmitCode => 4,
            EnterBirthdate | SubmitBirthdate => 5,
            EnterUsername | SubmitUsername => 6,
            EnterPassword | SubmitPassword => 7,
            AcceptTerms | VerifyCreated => 8,
        }
    }
}

impl std::fmt::Display for SignupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SignupStage::Navigate => "navigate",
            SignupStage::EnterEmail => "enter-email",
            SignupStage::SubmitEmail => "submit-email",
            SignupStage::AwaitCode => "await-code",
            SignupStage::EnterCode => "enter-code",
            SignupStage::SubmitCode => "submit-code",
            SignupStage::EnterBirthdate => "enter-birthdate",
            SignupStage::SubmitBirthdate => "submit-birthdate",
            SignupStage::EnterUsername => "enter-username",
            SignupStage::SubmitUsername => "submit-username",
            SignupStage::EnterPassword => "enter-password",
            SignupStage::SubmitPassword => "submit-password",
            SignupStage::AcceptTerms => "accept-terms",
            SignupStage::VerifyCreated => "verify-created",
        };
        f.write_str(label)
    }
}

/// Workflow-level tuning, independent of per-action retry policy.
#[derive(Debug, Clone)]
pub struct WorkflowTuning {
    /// Resend attempts after the first code wait.
    pub max_otp_retries: u32,
    /// How long one code wait lasts before a resend is considered.
    pub otp_wait: Duration,
    /// Settle period before the final location check, allowing redirects.
    pub settle: Duration,
    /// Substring the final location must contain to count as verified.
    pub expected_domain: String,
}

impl Default for WorkflowTuning {
    fn default() -> Self {
        Self {
            max_otp_retries: 3,
            otp_wait: Duration::from_secs(20),
            settle: Duration::from_secs(10),
            expected_domain: "account.riotgames.com".to_string(),
        }
    }
}

/// One account's run through the signup protocol. One-shot.
pub struct SignupWorkflow<'a> {
    page: SignupPage,
    poller: &'a dyn VerificationPoller,
    tuning: WorkflowTuning,
    stage: SignupStage,
    baseline: HashSet<String>,
    code: Option<String>,
}

impl<'a> SignupWorkflow<'a> {
    pub fn new(page: SignupPage, poller: &'a dyn VerificationPoller, tuning: WorkflowTuning) -> Self {
        Self {
            page,
            poller,
            tuning,
            stage: SignupStage::Navigate,
            baseline: HashSet::new(),
            code: None,
        }
    }

    /// Drive the machine to a terminal outcome. Any failure captures a
    /// best-effort screenshot keyed by the account before surfacing.
    pub async fn run(mut self, account: &Account) -> WorkflowOutcome {
        let attempt_id = Uuid::new_v4();
        info!(
            attempt.id = %attempt_id,
            email = %account.email,
            username = %account.username,
            "starting signup workflow"
        );

        match self.execute(account).await {
            Ok(()) => {
                info!(attempt.id = %attempt_id, email = %account.email, "account created and verified");
                WorkflowOutcome::Success
            }
            Err(workflow_error) => {
                let outcome = WorkflowOutcome::from_error(&workflow_error);
                error!(
                    attempt.id = %attempt_id,
                    stage = %self.stage,
                    error = %workflow_error,
                    "signup workflow failed"
                );
                self.page.capture_failure_screenshot(&account.username).await;
                outcome
            }
        }
    }

    async fn execute(&mut self, account: &Account) -> Result<(), WorkflowError> {
        loop {
            info!(
                step = self.stage.progress_step(),
                total = 8u8,
                stage = %self.stage,
                "running stage"
            );
            match self.stage {
                SignupStage::Navigate => self.page.navigate_to_signup().await?,
                SignupStage::EnterEmail => {
                    self.page.enter_email(&account.email).await?;
                    self.page.uncheck_marketing_boxes().await;
                }
                SignupStage::SubmitEmail => {
                    // Snapshot the codes already present so a stale code
                    // from an earlier attempt is never mistaken for the
                    // new one. The baseline stays fixed across resends.
                    self.baseline = self.poller.baseline_codes(&account.email).await;
                    info!(existing = self.baseline.len(), "captured baseline codes");
                    self.page.submit_signup().await?;
                }
                SignupStage::AwaitCode => {
                    let code = self.await_code(&account.email).await?;
                    self.code = Some(code);
                }
                SignupStage::EnterCode => {
                    let code = self.code.clone().unwrap_or_default();
                    self.page.enter_otp(&code).await?;
                }
                SignupStage::SubmitCode => self.page.submit_otp().await?,
                SignupStage::EnterBirthdate => {
                    self.page.enter_birthdate(&account.birthdate).await?
                }
                SignupStage::SubmitBirthdate => self.page.submit_signup().await?,
                SignupStage::EnterUsername => self.page.enter_username(&account.username).await?,
                SignupStage::SubmitUsername => self.page.submit_signup().await?,
                SignupStage::EnterPassword => self.page.enter_password(&account.password).await?,
                SignupStage::SubmitPassword => self.page.submit_signup().await?,
                SignupStage::AcceptTerms => self.page.accept_terms().await?,
                SignupStage::VerifyCreated => self.verify().await?,
            }
            match self.stage.next() {
                Some(next) => self.stage = next,
                None => return Ok(()),
            }
        }
    }

    /// Code wait with bounded resend: poll for a code outside the
    /// baseline; on timeout, trigger a resend and try again.
    async fn await_code(&self, email: &str) -> Result<String, WorkflowError> {
        let attempts = self.tuning.max_otp_retries + 1;
        for attempt in 0..attempts {
            if attempt > 0 {
                info!(attempt = attempt + 1, attempts, "resending verification code");
                self.page.click_resend_otp().await?;
            }
            if let Some(code) = self
                .poller
                .poll_new_code(email, &self.baseline, self.tuning.otp_wait)
                .await
            {
                info!("received verification code");
                return Ok(code);
            }
            warn!(attempt = attempt + 1, attempts, "no verification code received");
        }
        Err(WorkflowError::CodeTimeout { attempts })
    }

    async fn verify(&self) -> Result<(), WorkflowError> {
        info!(
            settle_secs = self.tuning.settle.as_secs(),
            "waiting for post-signup redirects"
        );
        tokio::time::sleep(self.tuning.settle).await;
        let final_url = self.page.driver().current_url().await?;
        if final_url.contains(&self.tuning.expected_domain) {
            Ok(())
        } else {
            Err(WorkflowError::Unverified { final_url })
        }
    }
}
