use std::sync::Arc;
use std::time::Duration;

use warden_core::hub::PermissionHub;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<PermissionHub>,
}

impl AppState {
    /// Wrap `hub` and start sweeping abandoned requests every
    /// `sweep_interval`. The sweeper exits once the hub is dropped.
    pub fn new(hub: Arc<PermissionHub>, sweep_interval: Duration) -> Self {
        // Guard: only spawn if inside a Tokio runtime (skipped in sync unit tests).
        if tokio::runtime::Handle::try_current().is_ok() && !sweep_interval.is_zero() {
            let weak = Arc::downgrade(&hub);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(sweep_interval).await;
                    let Some(hub) = weak.upgrade() else {
                        break;
                    };
                    let swept = hub.sweep();
                    if swept > 0 {
                        tracing::info!(swept, "dropped abandoned permission requests");
                    }
                }
            });
        }
        Self { hub }
    }
}
