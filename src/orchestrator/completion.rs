use std::collections::HashSet;

use tokio::sync::Mutex;

/// Process-wide set of lowercased emails considered done.
///
/// Seeded from the persisted results at startup, then grown under a
/// single writer lock as workflows succeed. An email in this set is
/// never scheduled again within the run.
pub struct CompletionSet {
    inner: Mutex<HashSet<String>>,
}

impl CompletionSet {
    pub fn new(seed: HashSet<String>) -> Self {
        Self {
            inner: Mutex::new(seed),
        }
    }

    pub async fn is_completed(&self, email: &str) -> bool {
        self.inner.lock().await.contains(&email.to_lowercase())
    }

    /// Returns false if the email was already marked.
    pub async fn mark_completed(&self, email: &str) -> bool {
        self.inner.lock().await.insert(email.to_lowercase())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preloaded_emails_are_completed() {
        let seed: HashSet<String> = ["done@example.com".to_string()].into_iter().collect();
        let set = CompletionSet::new(seed);
        assert!(set.is_completed("done@example.com").await);
        assert!(set.is_completed("Done@Example.COM").await);
        assert!(!set.is_completed("new@example.com").await);
    }

    #[tokio::test]
    async fn marking_is_case_insensitive_and_idempotent() {
        let set = CompletionSet::new(HashSet::new());
        assert!(set.mark_completed("A@B.com").await);
        assert!(!set.mark_completed("a@b.COM").await);
        assert_eq!(set.len().await, 1);
        assert!(set.is_completed("a@b.com").await);
    }
}
