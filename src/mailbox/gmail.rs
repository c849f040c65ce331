//! Gmail IMAP code source. Mailbox glue, not core: a blocking IMAP
//! session driven through `spawn_blocking`, bounded by a small
//! connection semaphore, surfacing only "recent codes for an address".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mailparse::MailHeaderMap;
use tokio::sync::Semaphore;
use tracing::warn;

use super::{extract_login_code, CodeFetcher};

const IMAP_HOST: &str = "imap.gmail.com";
const IMAP_PORT: u16 = 993;
/// Quoted for IMAP: the mailbox name contains a space.
const ALL_MAIL_MAILBOX: &str = "\"[Gmail]/All Mail\"";
const VERIFICATION_SENDER: &str = "noreply@umail.accounts.riotgames.com";

/// Fetches verification codes from a Gmail account over IMAP.
pub struct GmailCodeFetcher {
    email: String,
    app_password: String,
    connections: Arc<Semaphore>,
    fetch_timeout: Duration,
}

impl GmailCodeFetcher {
    pub fn new(email: String, app_password: String, max_connections: usize) -> Self {
        Self {
            email,
            app_password,
            connections: Arc::new(Semaphore::new(max_connections.max(1))),
            fetch_timeout: Duration::from_secs(30),
        }
    }

    fn fetch_blocking(
        email: &str,
        app_password: &str,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .context("building TLS connector")?;
        let client = imap::connect((IMAP_HOST, IMAP_PORT), IMAP_HOST, &tls)
            .context("connecting to IMAP server")?;
        let mut session = client
            .login(email, app_password)
            .map_err(|(error, _)| error)
            .context("IMAP login")?;

        let result = Self::scan_mailbox(&mut session, address, limit);
        let _ = session.logout();
        result
    }

    fn scan_mailbox(
        session: &mut imap::Session<native_tls::TlsStream<std::net::TcpStream>>,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        session
            .select(ALL_MAIL_MAILBOX)
            .context("selecting mailbox")?;

        let query = format!("(FROM \"{VERIFICATION_SENDER}\" TO \"{address}\")");
        let sequence_numbers = session.search(&query).context("searching mailbox")?;
        if sequence_numbers.is_empty() {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<u32> = sequence_numbers.into_iter().collect();
        ordered.sort_unstable();
        let recent: Vec<u32> = ordered.into_iter().rev().take(limit).collect();
        let sequence_set = recent
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let fetches = session
            .fetch(sequence_set, "RFC822.HEADER")
            .context("fetching message headers")?;

        // Fetch order is server-defined; sort newest first before
        // deduplicating so the latest code wins.
        let mut found: Vec<(u32, String)> = Vec::new();
        for fetch in fetches.iter() {
            let Some(header) = fetch.header() else {
                continue;
            };
            let Ok((headers, _)) = mailparse::parse_headers(header) else {
                continue;
            };
            let subject = headers.get_first_value("Subject").unwrap_or_default();
            if let Some(code) = extract_login_code(&subject) {
                found.push((fetch.message, code));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));

        let mut codes: Vec<String> = Vec::new();
        for (_, code) in found {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        Ok(codes)
    }
}

#[async_trait]
impl CodeFetcher for GmailCodeFetcher {
    async fn recent_codes(&self, address: &str, limit: usize) -> Vec<String> {
        let Ok(_permit) = self.connections.acquire().await else {
            return Vec::new();
        };

        let email = self.email.clone();
        let app_password = self.app_password.clone();
        let address = address.to_string();
        let task = tokio::task::spawn_blocking(move || {
            Self::fetch_blocking(&email, &app_password, &address, limit)
        });

        match tokio::time::timeout(self.fetch_timeout, task).await {
            Ok(Ok(Ok(codes))) => codes,
            Ok(Ok(Err(error))) => {
                warn!(%error, "IMAP fetch failed");
                Vec::new()
            }
            Ok(Err(join_error)) => {
                warn!(%join_error, "IMAP fetch task failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.fetch_timeout.as_secs(),
                    "IMAP fetch timed out"
                );
                Vec::new()
            }
        }
    }
}
