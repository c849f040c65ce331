//! Concurrency orchestration: a bounded pool of workflow instances,
//! round-robin proxy assignment with quarantine, and idempotent
//! completion tracking safe across restarts.

pub mod completion;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::account::Account;
use crate::browser::{SessionFactory, SessionRequest};
use crate::mailbox::VerificationPoller;
use crate::motion::MotionConfig;
use crate::proxy::{ProxyEndpoint, ProxyRotation};
use crate::records::ResultsLog;
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownFlag;
use crate::workflow::{SignupPage, SignupWorkflow, WorkflowError, WorkflowOutcome, WorkflowTuning};

pub use completion::CompletionSet;

/// Orchestrator-level knobs plus everything a workflow attempt needs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrent workflow instances.
    pub pool_size: usize,
    /// First-wave start stagger per slot index.
    pub stagger: Duration,
    /// Pause between proxy-swap retries.
    pub proxy_swap_pause: Duration,
    /// Rotating-IP pools self-heal, so endpoints are not quarantined on
    /// transient failures; static pools are.
    pub rotating_pool: bool,
    pub headless: bool,
    pub speed: f64,
    pub debug_cursor: bool,
    pub motion: MotionConfig,
    pub retry_policy: RetryPolicy,
    pub tuning: WorkflowTuning,
}

/// Final counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum SlotResult {
    Succeeded,
    Failed,
    Skipped,
}

/// Owns the pool, the proxy rotation, the completion set, and the result
/// log; workflow instances only ever see these through handles.
pub struct Orchestrator {
    config: OrchestratorConfig,
    factory: Arc<dyn SessionFactory>,
    poller: Arc<dyn VerificationPoller>,
    rotation: Arc<ProxyRotation>,
    completions: Arc<CompletionSet>,
    results: Arc<ResultsLog>,
    shutdown: ShutdownFlag,
    pool: Arc<Semaphore>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        factory: Arc<dyn SessionFactory>,
        poller: Arc<dyn VerificationPoller>,
        rotation: Arc<ProxyRotation>,
        completions: Arc<CompletionSet>,
        results: Arc<ResultsLog>,
        shutdown: ShutdownFlag,
    ) -> Arc<Self> {
        let pool = Arc::new(Semaphore::new(config.pool_size.max(1)));
        Arc::new(Self {
            config,
            factory,
            poller,
            rotation,
            completions,
            results,
            shutdown,
            pool,
        })
    }

    /// Run every pending account through the pool and report the final
    /// counts. Accounts sharing an identity are scheduled once.
    pub async fn run(self: Arc<Self>, accounts: Vec<Account>) -> RunSummary {
        let mut seen = HashSet::new();
        let accounts: Vec<Account> = accounts
            .into_iter()
            .filter(|account| seen.insert(account.dedup_key()))
            .collect();
        let total = accounts.len();

        let mut tasks = JoinSet::new();
        for (index, account) in accounts.into_iter().enumerate() {
            let orchestrator = self.clone();
            tasks.spawn(async move { orchestrator.run_slot(account, index, total).await });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(SlotResult::Succeeded) => summary.succeeded += 1,
                Ok(SlotResult::Failed) => summary.failed += 1,
                Ok(SlotResult::Skipped) => summary.skipped += 1,
                Err(join_error) => {
                    error!(%join_error, "workflow task aborted");
                    summary.failed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "run complete"
        );
        summary
    }

    async fn run_slot(&self, account: Account, index: usize, total: usize) -> SlotResult {
        // Shutdown and idempotence are checked before waiting on a slot,
        // and shutdown again right after acquiring one.
        if self.shutdown.is_requested() || self.completions.is_completed(&account.email).await {
            return SlotResult::Skipped;
        }

        // Stagger the first wave so browsers and proxy binds do not all
        // land at once.
        if index < self.config.pool_size {
            tokio::time::sleep(self.config.stagger * index as u32).await;
        }

        let Ok(_permit) = self.pool.acquire().await else {
            return SlotResult::Skipped;
        };
        if self.shutdown.is_requested() {
            return SlotResult::Skipped;
        }

        info!(
            task = index + 1,
            total,
            email = %account.email,
            username = %account.username,
            "scheduling account"
        );
        self.process_with_proxy_retry(&account, index).await
    }

    /// Proxy-swap retry loop: unbounded across the rotation, bounded only
    /// by pool exhaustion or shutdown. Non-proxy failures stop the
    /// account for this run.
    async fn process_with_proxy_retry(&self, account: &Account, index: usize) -> SlotResult {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if self.shutdown.is_requested() {
                return SlotResult::Skipped;
            }

            let proxy = if self.rotation.is_empty() {
                None
            } else {
                match self.rotation.next_working().await {
                    Some(endpoint) => Some(endpoint),
                    None => {
                        warn!(email = %account.email, "all proxies exhausted");
                        return SlotResult::Failed;
                    }
                }
            };
            let proxy_display = proxy
                .as_ref()
                .map(|endpoint| endpoint.display_host())
                .unwrap_or_else(|| "direct".to_string());

            info!(
                attempt,
                proxy = %proxy_display,
                email = %account.email,
                "starting workflow attempt"
            );
            let outcome = self
                .run_attempt(account, proxy.as_ref().map(|p| (**p).clone()), index)
                .await;

            match outcome {
                WorkflowOutcome::Success => {
                    if let Err(persist_error) = self.results.append(account).await {
                        error!(%persist_error, email = %account.email, "failed to persist result");
                    }
                    self.completions.mark_completed(&account.email).await;
                    info!(email = %account.email, "account completed");
                    return SlotResult::Succeeded;
                }
                outcome if outcome.wants_proxy_retry() => {
                    if let (Some(endpoint), false) = (&proxy, self.config.rotating_pool) {
                        self.rotation.quarantine(endpoint).await;
                    }
                    warn!(
                        attempt,
                        proxy = %proxy_display,
                        email = %account.email,
                        "proxy-class failure, retrying with a fresh endpoint"
                    );
                    tokio::time::sleep(self.config.proxy_swap_pause).await;
                }
                WorkflowOutcome::RetryableFailure { kind, detail }
                | WorkflowOutcome::FatalFailure { kind, detail } => {
                    warn!(
                        email = %account.email,
                        reason = %kind,
                        detail = %detail,
                        "account attempt failed"
                    );
                    return SlotResult::Failed;
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        account: &Account,
        proxy: Option<ProxyEndpoint>,
        index: usize,
    ) -> WorkflowOutcome {
        let request = SessionRequest {
            headless: self.config.headless,
            proxy,
            window_index: index % self.config.pool_size.max(1),
        };
        let driver = match self.factory.open(request).await {
            Ok(driver) => driver,
            Err(open_error) => {
                return WorkflowOutcome::from_error(&WorkflowError::Drive(open_error))
            }
        };

        let page = SignupPage::new(
            driver.clone(),
            self.config.motion.clone(),
            self.config.speed,
            self.config.retry_policy.clone(),
            self.config.debug_cursor,
        );
        let workflow = SignupWorkflow::new(page, self.poller.as_ref(), self.config.tuning.clone());
        let outcome = workflow.run(account).await;

        driver.close().await;
        outcome
    }
}
