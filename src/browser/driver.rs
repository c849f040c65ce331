//! Narrow capability interface over a browser page.
//!
//! The workflow engine only ever talks to these traits; concrete
//! transports (the CDP adapter, test mocks) live behind them.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::DriveError;
use crate::proxy::ProxyEndpoint;

/// Opaque handle to a located element.
///
/// `query` is the CSS selector the element can be re-resolved with; it
/// doubles as the diagnostic label in errors.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    pub id: u64,
    pub query: String,
}

/// Page-coordinate geometry of an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Parameters for opening one browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub headless: bool,
    pub proxy: Option<ProxyEndpoint>,
    /// Pool slot index, used to place windows side by side.
    pub window_index: usize,
}

/// One live browser page. Implementations must be safe to share across
/// tasks; all per-page mutability is internal.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriveError>;

    /// Locate an element by CSS selector.
    async fn select(&self, selector: &str) -> Result<ElementHandle, DriveError>;

    /// Locate a clickable element by visible text.
    async fn find_text(&self, query: &str) -> Result<ElementHandle, DriveError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), DriveError>;

    /// Send text to an element as keystrokes.
    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), DriveError>;

    async fn geometry(&self, element: &ElementHandle) -> Result<ElementBox, DriveError>;

    async fn evaluate(&self, script: &str) -> Result<Value, DriveError>;

    async fn current_url(&self) -> Result<String, DriveError>;

    async fn screenshot(&self, path: &Path) -> Result<(), DriveError>;

    /// Dispatch a raw cursor-move input event at page coordinates.
    async fn dispatch_move_event(&self, x: f64, y: f64) -> Result<(), DriveError>;

    /// Tear the session down. Best-effort; never fails.
    async fn close(&self);
}

/// Opens browser sessions. One session per workflow attempt, bound to one
/// proxy endpoint.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, request: SessionRequest) -> Result<Arc<dyn PageDriver>, DriveError>;
}
