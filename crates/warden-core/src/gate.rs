//! Blocking permission check for side-effecting actions.
//!
//! [`ActionGate::request`] resolves through the skip set and override window
//! when it can, otherwise queues the action in the hub and polls for a human
//! decision until the timeout, which resolves to `stop`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::GateConfig;
use crate::error::Result;
use crate::hub::{Admission, PermissionHub};
use crate::types::{Decision, NewAction};

#[derive(Clone)]
pub struct ActionGate {
    hub: Arc<PermissionHub>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ActionGate {
    pub fn new(hub: Arc<PermissionHub>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            hub,
            poll_interval,
            timeout,
        }
    }

    pub fn from_config(hub: Arc<PermissionHub>, cfg: &GateConfig) -> Self {
        Self::new(
            hub,
            Duration::from_millis(cfg.poll_interval_ms),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn hub(&self) -> &Arc<PermissionHub> {
        &self.hub
    }

    /// Ask for permission to perform `action`.
    ///
    /// Only fails if `action` itself is malformed. An `allow_all` verdict is
    /// returned as `allow`; the override window it opens covers later calls.
    pub async fn request(&self, action: NewAction) -> Result<Decision> {
        let id = match self.hub.admit(action, None)? {
            Admission::AutoSkip => return Ok(Decision::Skip),
            Admission::AutoAllow => return Ok(Decision::Allow),
            Admission::Queued(id) => id,
        };
        Ok(self.wait_for(&id).await)
    }

    async fn wait_for(&self, id: &str) -> Decision {
        let deadline = Instant::now() + self.timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if let Some(decision) = self.hub.take_decision(id) {
                tracing::info!(id = %id, decision = %decision, "permission resolved");
                return flatten_allow_all(decision);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        // Anything recorded during the last sleep is still honoured here.

        match self.hub.finish(id) {
            Some(decision) => {
                tracing::info!(id = %id, decision = %decision, "decision arrived at timeout");
                flatten_allow_all(decision)
            }
            None => {
                tracing::warn!(id = %id, timeout_secs = self.timeout.as_secs(), "permission timed out; stopping");
                Decision::Stop
            }
        }
    }
}

fn flatten_allow_all(decision: Decision) -> Decision {
    match decision {
        Decision::AllowAll => Decision::Allow,
        other => other,
    }
}
