//! Chromium DevTools Protocol adapter for the page-interaction
//! capability.
//!
//! Thin glue: launches one Chromium per session (optionally behind a
//! proxy), resolves elements, and forwards the narrow [`PageDriver`]
//! surface. All engineering-hard behavior (pacing, retries, workflow
//! logic) lives above this layer.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, NavigateParams,
};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::driver::{ElementBox, ElementHandle, PageDriver, SessionFactory, SessionRequest};
use super::errors::DriveError;
use crate::retry::{retry, RetryPolicy};

const NAVIGATION_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const FIND_MARKER_ATTR: &str = "data-wrangler-find";

/// Opens CDP-backed browser sessions.
pub struct CdpSessionFactory {
    element_timeout: Duration,
    launch_policy: RetryPolicy,
}

impl CdpSessionFactory {
    pub fn new(element_timeout: Duration) -> Self {
        Self {
            element_timeout,
            // Browser startup gets a short fixed-backoff retry of its own.
            launch_policy: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(2),
                exponential: false,
            },
        }
    }

    async fn launch(&self, request: &SessionRequest) -> Result<CdpPage, DriveError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 720)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!(
                "--window-position={},{}",
                60 * request.window_index,
                40 * request.window_index
            ));
        if !request.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &request.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server_addr()));
        }
        let config = builder
            .build()
            .map_err(|detail| DriveError::Session { detail })?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|error| {
            DriveError::Session {
                detail: format!("browser launch failed: {error}"),
            }
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(error) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(DriveError::Session {
                    detail: format!("failed to open page: {error}"),
                });
            }
        };

        Ok(CdpPage {
            browser: Mutex::new(browser),
            page,
            handler_task,
            next_element_id: AtomicU64::new(1),
            proxied: request.proxy.is_some(),
            element_timeout: self.element_timeout,
        })
    }
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn open(&self, request: SessionRequest) -> Result<Arc<dyn PageDriver>, DriveError> {
        let session = retry(&self.launch_policy, "browser start", || {
            self.launch(&request)
        })
        .await?;
        Ok(Arc::new(session))
    }
}

/// One live Chromium page.
///
/// Handles carry the CSS selector they were located with and are
/// re-resolved per interaction, so they survive page transitions and
/// DOM churn between locate and use.
pub struct CdpPage {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    next_element_id: AtomicU64,
    proxied: bool,
    element_timeout: Duration,
}

impl CdpPage {
    fn transport_error(&self, detail: impl std::fmt::Display) -> DriveError {
        // With a proxy bound to the session, transport breakage is
        // attributed to the endpoint so the orchestrator rotates it.
        if self.proxied {
            DriveError::ProxyConnectivity {
                detail: detail.to_string(),
            }
        } else {
            DriveError::Transport {
                detail: detail.to_string(),
            }
        }
    }

    fn handle_for(&self, query: String) -> ElementHandle {
        let id = self.next_element_id.fetch_add(1, Ordering::Relaxed);
        ElementHandle { id, query }
    }

    async fn resolve(&self, handle: &ElementHandle) -> Result<Element, DriveError> {
        self.page
            .find_element(handle.query.as_str())
            .await
            .map_err(|_| DriveError::ElementNotFound {
                query: handle.query.clone(),
            })
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&self, url: &str) -> Result<(), DriveError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|detail| DriveError::Transport { detail })?;
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|error| self.transport_error(error))?;

        // CDP reports navigation failures (net::ERR_*) in a dedicated
        // field rather than an error; that is the structured signal for
        // proxy-class trouble.
        if let Some(error_text) = response.error_text.clone().filter(|text| !text.is_empty()) {
            return Err(if self.proxied {
                DriveError::ProxyConnectivity { detail: error_text }
            } else {
                DriveError::Transport { detail: error_text }
            });
        }

        if tokio::time::timeout(NAVIGATION_SETTLE_TIMEOUT, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            debug!(url, "navigation settle wait timed out; continuing");
        }
        Ok(())
    }

    async fn select(&self, selector: &str) -> Result<ElementHandle, DriveError> {
        let found = tokio::time::timeout(self.element_timeout, self.page.find_element(selector))
            .await
            .map_err(|_| DriveError::Timeout {
                operation: format!("select '{selector}'"),
                duration_ms: self.element_timeout.as_millis() as u64,
            })?;
        match found {
            Ok(_) => Ok(self.handle_for(selector.to_string())),
            Err(error) => {
                debug!(selector, %error, "element lookup failed");
                Err(DriveError::ElementNotFound {
                    query: selector.to_string(),
                })
            }
        }
    }

    async fn find_text(&self, query: &str) -> Result<ElementHandle, DriveError> {
        let marker = uuid::Uuid::new_v4().simple().to_string();
        let script = format!(
            r#"(function() {{
                const query = {query};
                const nodes = document.querySelectorAll('a, button, [role="button"], input[type="submit"], span, div');
                let best = null;
                for (const el of nodes) {{
                    const text = (el.innerText || el.textContent || '').trim();
                    if (!text) continue;
                    if (text === query) {{ best = el; break; }}
                    if (!best && text.includes(query)) best = el;
                }}
                if (!best) return false;
                best.setAttribute('{attr}', '{marker}');
                return true;
            }})()"#,
            query = Value::String(query.to_string()),
            attr = FIND_MARKER_ATTR,
            marker = marker,
        );

        let tagged = self
            .evaluate(&script)
            .await?
            .as_bool()
            .unwrap_or(false);
        if !tagged {
            return Err(DriveError::ElementNotFound {
                query: query.to_string(),
            });
        }
        let selector = format!("[{FIND_MARKER_ATTR}=\"{marker}\"]");
        self.page
            .find_element(selector.as_str())
            .await
            .map_err(|_| DriveError::ElementNotFound {
                query: query.to_string(),
            })?;
        Ok(self.handle_for(selector))
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriveError> {
        let element = self.resolve(handle).await?;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|error| self.transport_error(error))
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), DriveError> {
        let element = self.resolve(handle).await?;
        element
            .type_str(text)
            .await
            .map(|_| ())
            .map_err(|error| self.transport_error(error))
    }

    async fn geometry(&self, handle: &ElementHandle) -> Result<ElementBox, DriveError> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({query});
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                return {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }};
            }})()"#,
            query = Value::String(handle.query.clone()),
        );
        let value = self.evaluate(&script).await?;
        if value.is_null() {
            return Err(DriveError::ElementNotFound {
                query: handle.query.clone(),
            });
        }
        let field = |name: &str| value.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(ElementBox {
            x: field("x"),
            y: field("y"),
            width: field("width"),
            height: field("height"),
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriveError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(|error| DriveError::Evaluation {
                detail: error.to_string(),
            })?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn current_url(&self) -> Result<String, DriveError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|error| self.transport_error(error))?;
        Ok(url.unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriveError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|error| self.transport_error(error))?;
        let data_b64: &str = response.data.as_ref();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data_b64.as_bytes())
            .map_err(|error| DriveError::Transport {
                detail: format!("screenshot decode failed: {error}"),
            })?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|error| DriveError::Transport {
                detail: format!("screenshot write failed: {error}"),
            })
    }

    async fn dispatch_move_event(&self, x: f64, y: f64) -> Result<(), DriveError> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(|detail| DriveError::Transport { detail })?;
        self.page
            .execute(params)
            .await
            .map(|_| ())
            .map_err(|error| self.transport_error(error))
    }

    async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(error) = browser.close().await {
            warn!(%error, "browser close failed");
        }
        self.handler_task.abort();
    }
}
