use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use account_wrangler::account::generate_account;
use account_wrangler::browser::cdp::CdpSessionFactory;
use account_wrangler::config::AccountWranglerConfig;
use account_wrangler::mailbox::gmail::GmailCodeFetcher;
use account_wrangler::mailbox::PollingVerifier;
use account_wrangler::orchestrator::{CompletionSet, Orchestrator, OrchestratorConfig};
use account_wrangler::proxy::{load_proxies, ProxyRotation};
use account_wrangler::records::{self, ResultsLog};
use account_wrangler::shutdown::ShutdownFlag;
use account_wrangler::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "account-wrangler")]
#[command(about = "Unattended multi-session account signup automation")]
#[command(long_about = "account-wrangler drives the fixed signup workflow across many \
                       concurrent browser sessions with humanlike input pacing, proxy \
                       rotation, and restart-safe completion tracking.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run signup workflows for all pending accounts
    Run {
        /// Number of parallel browser sessions
        #[arg(default_value = "3", help = "Concurrent browser sessions (pool size)")]
        parallel: usize,
        /// Run browsers without visible windows
        #[arg(long, help = "Override the configured headless setting")]
        headless: bool,
    },
    /// Generate accounts into the accounts file
    Generate {
        /// Catchall email domain (e.g., example.com)
        catchall: String,
        /// Number of accounts to generate
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
        /// Output file path
        #[arg(short, long, default_value = "accounts.csv")]
        output: String,
        /// Append to existing file instead of overwriting
        #[arg(short, long)]
        append: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = AccountWranglerConfig::load_env_file();
    let config = account_wrangler::config::config()?;
    init_telemetry(&config.observability)?;

    match cli.command {
        Some(Commands::Generate {
            catchall,
            count,
            output,
            append,
        }) => generate(&catchall, count, &output, append),
        Some(Commands::Run { parallel, headless }) => {
            run(config, parallel, headless || config.browser.headless).await
        }
        None => run(config, config.pool.max_concurrent, config.browser.headless).await,
    }
}

fn generate(catchall: &str, count: usize, output: &str, append: bool) -> Result<()> {
    let accounts: Vec<_> = (0..count).map(|_| generate_account(catchall)).collect();
    records::write_accounts(Path::new(output), &accounts, append)?;

    println!("Generated {count} account(s) to {output}");
    for account in &accounts {
        println!("  {} / {}", account.email, account.username);
    }
    Ok(())
}

async fn run(config: &AccountWranglerConfig, parallel: usize, headless: bool) -> Result<()> {
    let (Some(gmail_email), Some(gmail_app_password)) = (
        config.gmail.email.clone(),
        config.gmail.app_password.clone(),
    ) else {
        bail!(
            "Missing GMAIL_EMAIL or GMAIL_APP_PASSWORD.\n\
             Create a .env file with:\n\
               GMAIL_EMAIL=your-gmail@gmail.com\n\
               GMAIL_APP_PASSWORD=xxxx-xxxx-xxxx-xxxx"
        );
    };

    let accounts_path = Path::new(&config.paths.accounts);
    if !accounts_path.exists() {
        bail!(
            "{} not found.\n\
             Create it with columns: email,username,password,birthdate\n\
             Example:\n\
               email,username,password,birthdate\n\
               user@example.com,myusername,SecurePass123!,01/25/1998\n\
             (or run: account-wrangler generate <catchall-domain>)",
            config.paths.accounts
        );
    }

    let all_accounts = records::load_accounts(accounts_path)?;
    if all_accounts.is_empty() {
        bail!("No accounts found in {}", config.paths.accounts);
    }

    let results_path = Path::new(&config.paths.results);
    let completed = records::load_completed_emails(results_path)?;
    let pending: Vec<_> = all_accounts
        .iter()
        .filter(|account| !completed.contains(&account.dedup_key()))
        .cloned()
        .collect();
    if pending.is_empty() {
        println!("All accounts already completed.");
        return Ok(());
    }

    let proxies = load_proxies(Path::new(&config.paths.proxies))?;
    let skipped = all_accounts.len() - pending.len();
    info!(
        accounts = pending.len(),
        skipped,
        proxies = proxies.len(),
        pool = parallel,
        "starting run"
    );

    let shutdown = ShutdownFlag::new();
    shutdown.install_ctrl_c_handler();

    let fetcher = GmailCodeFetcher::new(gmail_email, gmail_app_password, config.gmail.max_connections);
    let poller = Arc::new(PollingVerifier::new(
        fetcher,
        Duration::from_secs(config.gmail.poll_interval_secs),
    ));
    let factory = Arc::new(CdpSessionFactory::new(Duration::from_secs(
        config.browser.element_timeout_secs,
    )));

    let orchestrator_config = OrchestratorConfig {
        pool_size: parallel.max(1),
        stagger: Duration::from_secs(config.pool.stagger_secs),
        proxy_swap_pause: Duration::from_secs(config.pool.proxy_swap_pause_secs),
        rotating_pool: config.pool.rotating_proxies,
        headless,
        speed: config.browser.speed,
        debug_cursor: config.browser.debug_cursor,
        motion: config.motion_config(),
        retry_policy: config.retry_policy(),
        tuning: config.workflow_tuning(),
    };

    let orchestrator = Orchestrator::new(
        orchestrator_config,
        factory,
        poller,
        Arc::new(ProxyRotation::new(proxies)),
        Arc::new(CompletionSet::new(completed)),
        Arc::new(ResultsLog::new(results_path.to_path_buf())),
        shutdown,
    );

    let summary = orchestrator.run(pending).await;
    println!(
        "Done. {} succeeded, {} failed, {} skipped.",
        summary.succeeded, summary.failed, summary.skipped
    );
    println!("Results: {}", config.paths.results);
    Ok(())
}
