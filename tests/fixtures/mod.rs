//! Shared test doubles for the page-interaction capability and the
//! verification poller. The core never touches a real browser or
//! mailbox in tests.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use account_wrangler::browser::{
    DriveError, ElementBox, ElementHandle, PageDriver, SessionFactory, SessionRequest,
};
use account_wrangler::mailbox::VerificationPoller;

/// A page where every lookup succeeds and every interaction is recorded.
pub struct ScriptedPage {
    /// `(selector, text)` pairs in the order they were typed.
    pub typed: Mutex<Vec<(String, String)>>,
    /// Selectors clicked, in order.
    pub clicks: Mutex<Vec<String>>,
    pub screenshots: AtomicUsize,
    /// URL reported after the workflow settles.
    pub final_url: String,
    /// When set, `navigate` fails with a proxy-class error.
    pub fail_navigation: AtomicBool,
}

impl ScriptedPage {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::unwrapped_default())
    }

    pub fn with_final_url(url: &str) -> Arc<Self> {
        Arc::new(Self {
            final_url: url.to_string(),
            ..Self::unwrapped_default()
        })
    }

    pub fn with_broken_proxy() -> Arc<Self> {
        let page = Self::unwrapped_default();
        page.fail_navigation.store(true, Ordering::SeqCst);
        Arc::new(page)
    }

    fn unwrapped_default() -> Self {
        Self {
            typed: Mutex::new(Vec::new()),
            clicks: Mutex::new(Vec::new()),
            screenshots: AtomicUsize::new(0),
            final_url: "https://account.riotgames.com/en-us".to_string(),
            fail_navigation: AtomicBool::new(false),
        }
    }

    pub fn typed_into(&self, selector_fragment: &str) -> String {
        self.typed
            .lock()
            .unwrap()
            .iter()
            .filter(|(selector, _)| selector.contains(selector_fragment))
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn clicks_on(&self, selector_fragment: &str) -> usize {
        self.clicks
            .lock()
            .unwrap()
            .iter()
            .filter(|selector| selector.contains(selector_fragment))
            .count()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&self, _url: &str) -> Result<(), DriveError> {
        if self.fail_navigation.load(Ordering::SeqCst) {
            return Err(DriveError::ProxyConnectivity {
                detail: "net::ERR_TUNNEL_CONNECTION_FAILED".to_string(),
            });
        }
        Ok(())
    }

    async fn select(&self, selector: &str) -> Result<ElementHandle, DriveError> {
        Ok(ElementHandle {
            id: 0,
            query: selector.to_string(),
        })
    }

    async fn find_text(&self, query: &str) -> Result<ElementHandle, DriveError> {
        Ok(ElementHandle {
            id: 0,
            query: format!("text:{query}"),
        })
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriveError> {
        self.clicks.lock().unwrap().push(element.query.clone());
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), DriveError> {
        self.typed
            .lock()
            .unwrap()
            .push((element.query.clone(), text.to_string()));
        Ok(())
    }

    async fn geometry(&self, _element: &ElementHandle) -> Result<ElementBox, DriveError> {
        Ok(ElementBox {
            x: 200.0,
            y: 300.0,
            width: 120.0,
            height: 36.0,
        })
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriveError> {
        // Marketing checkboxes probe as unchecked; everything else is
        // fire and forget.
        Ok(serde_json::Value::Bool(false))
    }

    async fn current_url(&self) -> Result<String, DriveError> {
        Ok(self.final_url.clone())
    }

    async fn screenshot(&self, _path: &Path) -> Result<(), DriveError> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispatch_move_event(&self, _x: f64, _y: f64) -> Result<(), DriveError> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Factory handing out scripted pages in order; once the script runs
/// out, every further session succeeds.
pub struct ScriptedFactory {
    pages: Mutex<Vec<Arc<ScriptedPage>>>,
    pub opens: AtomicUsize,
    pub proxies_used: Mutex<Vec<Option<String>>>,
}

impl ScriptedFactory {
    pub fn new(pages: Vec<Arc<ScriptedPage>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages),
            opens: AtomicUsize::new(0),
            proxies_used: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, request: SessionRequest) -> Result<Arc<dyn PageDriver>, DriveError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.proxies_used
            .lock()
            .unwrap()
            .push(request.proxy.as_ref().map(|proxy| proxy.display_host()));
        let mut pages = self.pages.lock().unwrap();
        let page = if pages.is_empty() {
            ScriptedPage::succeeding()
        } else {
            pages.remove(0)
        };
        Ok(page)
    }
}

/// Poller with a fixed answer: `Some(code)` arrives on every poll, or
/// `None` models a mailbox where the code never shows up.
pub struct ImmediatePoller {
    pub code: Option<String>,
    pub polls: AtomicUsize,
}

impl ImmediatePoller {
    pub fn delivering(code: &str) -> Arc<Self> {
        Arc::new(Self {
            code: Some(code.to_string()),
            polls: AtomicUsize::new(0),
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            code: None,
            polls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VerificationPoller for ImmediatePoller {
    async fn baseline_codes(&self, _address: &str) -> HashSet<String> {
        HashSet::new()
    }

    async fn poll_new_code(
        &self,
        _address: &str,
        _baseline: &HashSet<String>,
        _timeout: Duration,
    ) -> Option<String> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.code.clone()
    }
}
