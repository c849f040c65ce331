use thiserror::Error;

/// Structured failure taxonomy for the page-interaction capability.
///
/// Classification happens where the concrete transport error is converted
/// into this type; downstream layers match on kinds, never on message
/// text.
#[derive(Debug, Clone, Error)]
pub enum DriveError {
    /// Element not present or not yet interactable. Retried at action
    /// granularity.
    #[error("element not found: {query}")]
    ElementNotFound { query: String },

    /// An operation exceeded its explicit timeout. Recoverable; triggers
    /// retry or resend, never silently ignored.
    #[error("operation '{operation}' timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Connectivity failure attributed to the assigned proxy endpoint.
    /// Retried at workflow granularity via proxy swap.
    #[error("proxy connectivity failure: {detail}")]
    ProxyConnectivity { detail: String },

    /// Browser transport breakage of unclear origin. Treated as
    /// proxy-class at the workflow grain: connectivity-shaped failures
    /// get a fresh endpoint.
    #[error("browser transport failure: {detail}")]
    Transport { detail: String },

    /// In-page script evaluation failed.
    #[error("script evaluation failed: {detail}")]
    Evaluation { detail: String },

    /// The browser session could not be started or has died.
    #[error("browser session failure: {detail}")]
    Session { detail: String },
}

impl DriveError {
    /// Whether the orchestrator should swap proxies and restart the
    /// workflow for this failure.
    pub fn is_proxy_related(&self) -> bool {
        matches!(
            self,
            DriveError::ProxyConnectivity { .. } | DriveError::Transport { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_classification_is_kind_based() {
        assert!(DriveError::ProxyConnectivity {
            detail: "net::ERR_TUNNEL_CONNECTION_FAILED".to_string()
        }
        .is_proxy_related());
        assert!(DriveError::Transport {
            detail: "websocket closed".to_string()
        }
        .is_proxy_related());
        assert!(!DriveError::ElementNotFound {
            query: "#missing".to_string()
        }
        .is_proxy_related());
        assert!(!DriveError::Evaluation {
            detail: "ReferenceError".to_string()
        }
        .is_proxy_related());
    }
}
