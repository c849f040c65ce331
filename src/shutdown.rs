use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Cooperative shutdown flag shared across the orchestrator and its
/// workflow tasks.
///
/// Polled at scheduling decision points, never preemptive: an in-flight
/// workflow runs its current stage to completion before honoring the
/// request, so no browser session is abandoned mid-action.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Install the Ctrl-C handler: the first signal requests cooperative
    /// shutdown, a second one force-exits.
    pub fn install_ctrl_c_handler(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("shutdown requested, finishing in-flight workflows");
            flag.request();

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("force quitting");
                std::process::exit(1);
            }
        });
    }
}
