//! Orchestrator tests: pool scheduling, idempotent completion, proxy
//! rotation with quarantine, durable result rows.

mod fixtures;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use account_wrangler::account::Account;
use account_wrangler::motion::MotionConfig;
use account_wrangler::orchestrator::{CompletionSet, Orchestrator, OrchestratorConfig, RunSummary};
use account_wrangler::proxy::{ProxyEndpoint, ProxyRotation};
use account_wrangler::records::{load_completed_emails, ResultsLog};
use account_wrangler::retry::RetryPolicy;
use account_wrangler::shutdown::ShutdownFlag;
use account_wrangler::workflow::WorkflowTuning;
use fixtures::{ImmediatePoller, ScriptedFactory, ScriptedPage};
use tempfile::TempDir;

fn account() -> Account {
    Account {
        email: "a@b.com".to_string(),
        username: "ab1234".to_string(),
        password: "Xx1!aaaa".to_string(),
        birthdate: "01/25/1998".to_string(),
    }
}

fn endpoint(host: &str) -> ProxyEndpoint {
    ProxyEndpoint {
        host: host.to_string(),
        port: 8080,
        username: "user".to_string(),
        password: "pass".to_string(),
    }
}

fn orchestrator_config(pool_size: usize, rotating_pool: bool) -> OrchestratorConfig {
    OrchestratorConfig {
        pool_size,
        stagger: Duration::from_secs(3),
        proxy_swap_pause: Duration::from_secs(1),
        rotating_pool,
        headless: true,
        speed: 2.0,
        debug_cursor: false,
        motion: MotionConfig::default(),
        retry_policy: RetryPolicy::default(),
        tuning: WorkflowTuning {
            max_otp_retries: 1,
            otp_wait: Duration::from_secs(20),
            settle: Duration::from_secs(10),
            expected_domain: "account.riotgames.com".to_string(),
        },
    }
}

struct Harness {
    _dir: TempDir,
    results: Arc<ResultsLog>,
    completions: Arc<CompletionSet>,
    rotation: Arc<ProxyRotation>,
    factory: Arc<ScriptedFactory>,
}

impl Harness {
    fn new(
        pages: Vec<Arc<ScriptedPage>>,
        proxies: Vec<ProxyEndpoint>,
        completed: HashSet<String>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self {
            results: Arc::new(ResultsLog::new(dir.path().join("results.csv"))),
            _dir: dir,
            completions: Arc::new(CompletionSet::new(completed)),
            rotation: Arc::new(ProxyRotation::new(proxies)),
            factory: ScriptedFactory::new(pages),
        }
    }

    fn orchestrator(
        &self,
        config: OrchestratorConfig,
        poller: Arc<fixtures::ImmediatePoller>,
        shutdown: ShutdownFlag,
    ) -> Arc<Orchestrator> {
        Orchestrator::new(
            config,
            self.factory.clone(),
            poller,
            self.rotation.clone(),
            self.completions.clone(),
            self.results.clone(),
            shutdown,
        )
    }
}

#[tokio::test(start_paused = true)]
async fn successful_run_appends_exactly_one_result_row() {
    let harness = Harness::new(Vec::new(), Vec::new(), HashSet::new());
    let orchestrator = harness.orchestrator(
        orchestrator_config(2, true),
        ImmediatePoller::delivering("123456"),
        ShutdownFlag::new(),
    );

    let summary = orchestrator.run(vec![account()]).await;
    assert_eq!(
        summary,
        RunSummary {
            succeeded: 1,
            failed: 0,
            skipped: 0
        }
    );

    let contents = std::fs::read_to_string(harness.results.path()).expect("results written");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "header plus exactly one row");
    assert_eq!(lines[0], "timestamp,email,username,password");
    assert!(lines[1].ends_with("a@b.com,ab1234,Xx1!aaaa"));

    assert!(harness.completions.is_completed("a@b.com").await);
    let reloaded = load_completed_emails(harness.results.path()).unwrap();
    assert!(reloaded.contains("a@b.com"));
}

#[tokio::test(start_paused = true)]
async fn same_identity_scheduled_twice_runs_once() {
    let harness = Harness::new(Vec::new(), Vec::new(), HashSet::new());
    let orchestrator = harness.orchestrator(
        orchestrator_config(2, true),
        ImmediatePoller::delivering("123456"),
        ShutdownFlag::new(),
    );

    let mut duplicate = account();
    duplicate.email = "A@B.com".to_string();
    let summary = orchestrator.run(vec![account(), duplicate]).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.factory.opens.load(Ordering::SeqCst), 1);

    let contents = std::fs::read_to_string(harness.results.path()).unwrap();
    assert_eq!(contents.lines().count(), 2, "header plus exactly one row");
}

#[tokio::test(start_paused = true)]
async fn preloaded_completed_accounts_are_never_scheduled() {
    let completed: HashSet<String> = ["a@b.com".to_string()].into_iter().collect();
    let harness = Harness::new(Vec::new(), Vec::new(), completed);
    let orchestrator = harness.orchestrator(
        orchestrator_config(1, true),
        ImmediatePoller::delivering("123456"),
        ShutdownFlag::new(),
    );

    let summary = orchestrator.run(vec![account()]).await;
    assert_eq!(
        summary,
        RunSummary {
            succeeded: 0,
            failed: 0,
            skipped: 1
        }
    );
    assert_eq!(harness.factory.opens.load(Ordering::SeqCst), 0);
    assert!(!harness.results.path().exists());
}

#[tokio::test(start_paused = true)]
async fn code_timeout_writes_no_result_and_leaves_completions_unchanged() {
    let harness = Harness::new(Vec::new(), Vec::new(), HashSet::new());
    let orchestrator = harness.orchestrator(
        orchestrator_config(1, true),
        ImmediatePoller::silent(),
        ShutdownFlag::new(),
    );

    let summary = orchestrator.run(vec![account()]).await;
    assert_eq!(
        summary,
        RunSummary {
            succeeded: 0,
            failed: 1,
            skipped: 0
        }
    );
    assert!(!harness.results.path().exists());
    assert!(!harness.completions.is_completed("a@b.com").await);
}

#[tokio::test(start_paused = true)]
async fn proxy_failure_swaps_endpoint_and_quarantines_static_pools() {
    let harness = Harness::new(
        vec![ScriptedPage::with_broken_proxy(), ScriptedPage::succeeding()],
        vec![endpoint("proxy-a"), endpoint("proxy-b")],
        HashSet::new(),
    );
    let orchestrator = harness.orchestrator(
        orchestrator_config(1, false),
        ImmediatePoller::delivering("123456"),
        ShutdownFlag::new(),
    );

    let summary = orchestrator.run(vec![account()]).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.factory.opens.load(Ordering::SeqCst), 2);
    assert_eq!(harness.rotation.quarantined_count().await, 1);

    let proxies_used = harness.factory.proxies_used.lock().unwrap().clone();
    assert_eq!(
        proxies_used,
        vec![
            Some("proxy-a:8080".to_string()),
            Some("proxy-b:8080".to_string())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausting_every_proxy_fails_the_account() {
    let harness = Harness::new(
        vec![
            ScriptedPage::with_broken_proxy(),
            ScriptedPage::with_broken_proxy(),
        ],
        vec![endpoint("proxy-a"), endpoint("proxy-b")],
        HashSet::new(),
    );
    let orchestrator = harness.orchestrator(
        orchestrator_config(1, false),
        ImmediatePoller::delivering("123456"),
        ShutdownFlag::new(),
    );

    let summary = orchestrator.run(vec![account()]).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(harness.factory.opens.load(Ordering::SeqCst), 2);
    assert_eq!(harness.rotation.quarantined_count().await, 2);
    assert!(!harness.results.path().exists());
}

#[tokio::test(start_paused = true)]
async fn shutdown_request_skips_pending_accounts() {
    let harness = Harness::new(Vec::new(), Vec::new(), HashSet::new());
    let shutdown = ShutdownFlag::new();
    shutdown.request();
    let orchestrator = harness.orchestrator(
        orchestrator_config(2, true),
        ImmediatePoller::delivering("123456"),
        shutdown,
    );

    let mut other = account();
    other.email = "c@d.com".to_string();
    let summary = orchestrator.run(vec![account(), other]).await;
    assert_eq!(
        summary,
        RunSummary {
            succeeded: 0,
            failed: 0,
            skipped: 2
        }
    );
    assert_eq!(harness.factory.opens.load(Ordering::SeqCst), 0);
}
