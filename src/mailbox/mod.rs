//! Verification-code delivery: the poller interface the workflow consumes
//! and a generic polling implementation over any code source.
//!
//! The workflow never sees mailbox mechanics; it asks for "codes already
//! present" (the baseline) and "a new code since that baseline, within a
//! timeout".

pub mod gmail;

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Login Code[:\s]*(\d{6})").expect("static pattern compiles"));

/// Pull the 6-digit login code out of a verification email subject.
pub fn extract_login_code(subject: &str) -> Option<String> {
    CODE_PATTERN
        .captures(subject)
        .map(|captures| captures[1].to_string())
}

/// External collaborator interface consumed by the workflow state
/// machine.
#[async_trait]
pub trait VerificationPoller: Send + Sync {
    /// Codes already present for `address` before the workflow begins.
    async fn baseline_codes(&self, address: &str) -> HashSet<String>;

    /// Wait up to `timeout` for a code not in `baseline`. `None` on
    /// timeout; the caller decides whether to resend.
    async fn poll_new_code(
        &self,
        address: &str,
        baseline: &HashSet<String>,
        timeout: Duration,
    ) -> Option<String>;
}

/// Source of recently delivered codes for an address, newest first.
/// Implemented by the mailbox glue; mocked in tests.
#[async_trait]
pub trait CodeFetcher: Send + Sync {
    async fn recent_codes(&self, address: &str, limit: usize) -> Vec<String>;
}

const BASELINE_FETCH_LIMIT: usize = 10;
const POLL_FETCH_LIMIT: usize = 5;

/// Interval-polling [`VerificationPoller`] over any [`CodeFetcher`].
pub struct PollingVerifier<F> {
    fetcher: F,
    poll_interval: Duration,
}

impl<F: CodeFetcher> PollingVerifier<F> {
    pub fn new(fetcher: F, poll_interval: Duration) -> Self {
        Self {
            fetcher,
            poll_interval,
        }
    }
}

#[async_trait]
impl<F: CodeFetcher> VerificationPoller for PollingVerifier<F> {
    async fn baseline_codes(&self, address: &str) -> HashSet<String> {
        self.fetcher
            .recent_codes(address, BASELINE_FETCH_LIMIT)
            .await
            .into_iter()
            .collect()
    }

    async fn poll_new_code(
        &self,
        address: &str,
        baseline: &HashSet<String>,
        timeout: Duration,
    ) -> Option<String> {
        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            tokio::time::sleep(self.poll_interval).await;
            elapsed += self.poll_interval;
            for code in self.fetcher.recent_codes(address, POLL_FETCH_LIMIT).await {
                if !baseline.contains(&code) {
                    return Some(code);
                }
            }
            debug!(address, elapsed_secs = elapsed.as_secs(), "no new code yet");
        }
        None
    }
}
