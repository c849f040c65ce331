use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::motion::MotionConfig;
use crate::retry::RetryPolicy;
use crate::workflow::WorkflowTuning;

/// Main configuration structure for account-wrangler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountWranglerConfig {
    /// Mailbox credentials for verification-code polling
    pub gmail: GmailConfig,
    /// Browser session settings
    pub browser: BrowserConfig,
    /// Input/output file locations
    pub paths: PathsConfig,
    /// Workflow-level tuning
    pub workflow: WorkflowConfig,
    /// Concurrency pool and proxy handling
    pub pool: PoolConfig,
    /// Per-action retry policy
    pub retry: RetryConfig,
    /// Cursor motion synthesis tuning
    pub motion: MotionSettings,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GmailConfig {
    /// Mailbox address (usually set via GMAIL_EMAIL)
    pub email: Option<String>,
    /// App password (usually set via GMAIL_APP_PASSWORD)
    pub app_password: Option<String>,
    /// Concurrent IMAP connections
    pub max_connections: usize,
    /// Mailbox poll interval in seconds
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    /// Run browsers without a visible window
    pub headless: bool,
    /// Global speed divisor for humanlike pacing; larger is faster
    pub speed: f64,
    /// Overlay a visible dot tracking the synthetic cursor
    pub debug_cursor: bool,
    /// Element location timeout in seconds
    pub element_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub accounts: String,
    pub results: String,
    pub proxies: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Code resend attempts after the first wait
    pub max_otp_retries: u32,
    /// One code wait, in seconds, before a resend is considered
    pub otp_wait_secs: u64,
    /// Settle period before the final location check
    pub settle_secs: u64,
    /// Substring the final location must contain to count as verified
    pub expected_domain: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Concurrent workflow instances
    pub max_concurrent: usize,
    /// First-wave stagger per slot index, in seconds
    pub stagger_secs: u64,
    /// Pause between proxy-swap retries, in seconds
    pub proxy_swap_pause_secs: u64,
    /// Rotating-IP pool: transient failures self-heal, skip quarantine
    pub rotating_proxies: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionSettings {
    pub speed_factor: f64,
    pub zigzag_probability: f64,
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub variance_factor: f64,
    pub max_variance: f64,
    pub samples_per_path: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of the human format
    pub json_logs: bool,
}

impl Default for AccountWranglerConfig {
    fn default() -> Self {
        Self {
            gmail: GmailConfig {
                email: None, // Read from env at load time
                app_password: None,
                max_connections: 3,
                poll_interval_secs: 5,
            },
            browser: BrowserConfig {
                headless: false,
                speed: 2.0,
                debug_cursor: true,
                element_timeout_secs: 10,
            },
            paths: PathsConfig {
                accounts: "accounts.csv".to_string(),
                results: "results.csv".to_string(),
                proxies: "proxies.txt".to_string(),
            },
            workflow: WorkflowConfig {
                max_otp_retries: 1,
                otp_wait_secs: 20,
                settle_secs: 10,
                expected_domain: "account.riotgames.com".to_string(),
            },
            pool: PoolConfig {
                max_concurrent: 3,
                stagger_secs: 3,
                proxy_swap_pause_secs: 1,
                rotating_proxies: true,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1000,
                max_delay_ms: 10_000,
                exponential: true,
            },
            motion: MotionSettings {
                speed_factor: 0.5,
                zigzag_probability: 0.75,
                min_nodes: 2,
                max_nodes: 15,
                variance_factor: 0.15,
                max_variance: 100.0,
                samples_per_path: 100,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl AccountWranglerConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. account-wrangler.toml
    /// 3. Environment variables (prefixed with ACCOUNT_WRANGLER__)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&AccountWranglerConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("account-wrangler.toml").exists() {
            builder = builder.add_source(File::with_name("account-wrangler"));
        }

        builder = builder.add_source(
            Environment::with_prefix("ACCOUNT_WRANGLER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut loaded: AccountWranglerConfig = config.try_deserialize()?;

        // Mailbox credentials are usually provided bare in .env, the way
        // operators already have them.
        if loaded.gmail.email.is_none() {
            if let Ok(email) = std::env::var("GMAIL_EMAIL") {
                loaded.gmail.email = Some(email);
            }
        }
        if loaded.gmail.app_password.is_none() {
            if let Ok(app_password) = std::env::var("GMAIL_APP_PASSWORD") {
                loaded.gmail.app_password = Some(app_password);
            }
        }

        Ok(loaded)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            exponential: self.retry.exponential,
        }
    }

    pub fn motion_config(&self) -> MotionConfig {
        MotionConfig {
            speed_factor: self.motion.speed_factor,
            zigzag_probability: self.motion.zigzag_probability,
            min_nodes: self.motion.min_nodes,
            max_nodes: self.motion.max_nodes,
            variance_factor: self.motion.variance_factor,
            max_variance: self.motion.max_variance,
            samples_per_path: self.motion.samples_per_path,
        }
    }

    pub fn workflow_tuning(&self) -> WorkflowTuning {
        WorkflowTuning {
            max_otp_retries: self.workflow.max_otp_retries,
            otp_wait: Duration::from_secs(self.workflow.otp_wait_secs),
            settle: Duration::from_secs(self.workflow.settle_secs),
            expected_domain: self.workflow.expected_domain.clone(),
        }
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<AccountWranglerConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = AccountWranglerConfig::load_env_file();
        AccountWranglerConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static AccountWranglerConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_tuned_profile() {
        let config = AccountWranglerConfig::default();
        assert_eq!(config.pool.max_concurrent, 3);
        assert_eq!(config.workflow.max_otp_retries, 1);
        assert_eq!(config.motion.samples_per_path, 100);
        assert!(config.pool.rotating_proxies);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));

        let tuning = config.workflow_tuning();
        assert_eq!(tuning.expected_domain, "account.riotgames.com");
        assert_eq!(tuning.otp_wait, Duration::from_secs(20));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = AccountWranglerConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: AccountWranglerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.paths.accounts, config.paths.accounts);
        assert_eq!(parsed.motion.max_nodes, config.motion.max_nodes);
    }
}
