//! Durable account/result records.
//!
//! Simple comma-delimited files with a single header row: the accounts
//! input, and the append-only results log that seeds the completion set
//! on restart. The fixed four-column format has no quoting; generated
//! values never contain commas.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::account::Account;

pub const ACCOUNTS_HEADER: &str = "email,username,password,birthdate";
const RESULTS_HEADER: &str = "timestamp,email,username,password";

fn column_index(columns: &[&str], name: &str, path: &Path) -> Result<usize> {
    columns
        .iter()
        .position(|column| *column == name)
        .with_context(|| format!("{} is missing the '{}' column", path.display(), name))
}

/// Load the accounts input file. Malformed rows are startup errors, not
/// skipped work.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading accounts file {}", path.display()))?;
    let mut lines = contents.lines();
    let header = lines
        .next()
        .with_context(|| format!("accounts file {} is empty", path.display()))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let email_idx = column_index(&columns, "email", path)?;
    let username_idx = column_index(&columns, "username", path)?;
    let password_idx = column_index(&columns, "password", path)?;
    let birthdate_idx = column_index(&columns, "birthdate", path)?;

    let mut accounts = Vec::new();
    for (line_number, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            bail!(
                "{} line {}: expected {} fields, found {}",
                path.display(),
                line_number + 2,
                columns.len(),
                fields.len()
            );
        }
        accounts.push(Account {
            email: fields[email_idx].to_string(),
            username: fields[username_idx].to_string(),
            password: fields[password_idx].to_string(),
            birthdate: fields[birthdate_idx].to_string(),
        });
    }
    Ok(accounts)
}

/// Write accounts to the input file, with a header row written once.
pub fn write_accounts(path: &Path, accounts: &[Account], append: bool) -> Result<()> {
    let exists = path.exists();
    let mut contents = String::new();
    if !append || !exists {
        contents.push_str(ACCOUNTS_HEADER);
        contents.push('\n');
    }
    for account in accounts {
        contents.push_str(&format!(
            "{},{},{},{}\n",
            account.email, account.username, account.password, account.birthdate
        ));
    }
    if append && exists {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("opening {} for append", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("appending to {}", path.display()))?;
    } else {
        std::fs::write(path, contents)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Lowercased emails already recorded in the results log. A missing log
/// means a fresh run.
pub fn load_completed_emails(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading results file {}", path.display()))?;
    let mut lines = contents.lines();
    let Some(header) = lines.next() else {
        return Ok(HashSet::new());
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let email_idx = column_index(&columns, "email", path)?;

    let mut completed = HashSet::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if let Some(email) = fields.get(email_idx) {
            completed.insert(email.trim().to_lowercase());
        }
    }
    Ok(completed)
}

/// Append-only results log. All writes go through one lock; the header
/// is written exactly once, on first creation.
pub struct ResultsLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultsLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one successful account: `(timestamp, email, username,
    /// password)`.
    pub async fn append(&self, account: &Account) -> Result<()> {
        let _guard = self.lock.lock().await;
        let needs_header = !self.path.exists();

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening results file {}", self.path.display()))?;

        let mut row = String::new();
        if needs_header {
            row.push_str(RESULTS_HEADER);
            row.push('\n');
        }
        row.push_str(&format!(
            "{},{},{},{}\n",
            Local::now().to_rfc3339(),
            account.email,
            account.username,
            account.password
        ));
        file.write_all(row.as_bytes())
            .await
            .with_context(|| format!("appending to results file {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_account() -> Account {
        Account {
            email: "a@b.com".to_string(),
            username: "ab1234".to_string(),
            password: "Xx1!aaaa".to_string(),
            birthdate: "01/25/1998".to_string(),
        }
    }

    #[test]
    fn loads_accounts_by_header_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        std::fs::write(
            &path,
            "username,email,birthdate,password\nab1234,a@b.com,01/25/1998,Xx1!aaaa\n",
        )
        .unwrap();

        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts, vec![sample_account()]);
    }

    #[test]
    fn malformed_account_rows_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        std::fs::write(&path, "email,username,password,birthdate\na@b.com,ab1234\n").unwrap();
        assert!(load_accounts(&path).is_err());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        write_accounts(&path, &[sample_account()], false).unwrap();
        write_accounts(&path, &[sample_account()], true).unwrap();

        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().filter(|l| *l == ACCOUNTS_HEADER).count(),
            1
        );
    }

    #[tokio::test]
    async fn results_header_is_written_exactly_once() {
        let dir = tempdir().unwrap();
        let log = ResultsLog::new(dir.path().join("results.csv"));

        log.append(&sample_account()).await.unwrap();
        log.append(&sample_account()).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,email,username,password");
        assert!(lines[1].ends_with("a@b.com,ab1234,Xx1!aaaa"));
    }

    #[tokio::test]
    async fn completed_emails_are_lowercased() {
        let dir = tempdir().unwrap();
        let log = ResultsLog::new(dir.path().join("results.csv"));
        let mut account = sample_account();
        account.email = "Mixed@Case.COM".to_string();
        log.append(&account).await.unwrap();

        let completed = load_completed_emails(log.path()).unwrap();
        assert!(completed.contains("mixed@case.com"));
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn missing_results_file_is_empty_set() {
        let dir = tempdir().unwrap();
        let completed = load_completed_emails(&dir.path().join("nope.csv")).unwrap();
        assert!(completed.is_empty());
    }
}
