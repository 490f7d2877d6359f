//! Shared handle over the correlation store and the auto-resolution policy.
//!
//! The action gate (in-process) and the remote bridge (HTTP handlers) both
//! hold an `Arc<PermissionHub>`. Each critical section is a short, non-async
//! lock on one of two `std::sync::Mutex`es; nothing awaits while holding one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};

use crate::config::GateConfig;
use crate::correlation::{CorrelationStore, Lookup, RecordOutcome};
use crate::error::Result;
use crate::policy::{AutoResolution, Policy, SkipSet, WindowStatus};
use crate::types::{new_action_id, ActionRequest, ActionType, Decision, NewAction};

/// What happened to a newly submitted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Action type is in the skip set; nothing was stored.
    AutoSkip,
    /// Override window is open; nothing was stored.
    AutoAllow,
    /// Stored as pending under this id.
    Queued(String),
}

impl Admission {
    pub fn status(&self) -> &'static str {
        match self {
            Admission::AutoSkip => "auto_skipped",
            Admission::AutoAllow => "auto_allowed",
            Admission::Queued(_) => "queued",
        }
    }
}

pub struct PermissionHub {
    store: Mutex<CorrelationStore>,
    policy: Mutex<Policy>,
    retention: Duration,
    allow_all_minutes: u64,
}

impl PermissionHub {
    pub fn new(skip: SkipSet, retention: Duration, allow_all_minutes: u64) -> Self {
        Self {
            store: Mutex::new(CorrelationStore::new()),
            policy: Mutex::new(Policy::new(skip)),
            retention,
            allow_all_minutes,
        }
    }

    pub fn from_config(cfg: &GateConfig) -> Self {
        let retention = Duration::seconds(i64::try_from(cfg.retention_secs).unwrap_or(i64::MAX));
        Self::new(
            cfg.skip_types.iter().copied().collect(),
            retention,
            cfg.allow_all_minutes,
        )
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Resolve `action` against the policy, queueing it if a human must decide.
    ///
    /// `id` is used as given when present; otherwise a fresh one is minted.
    pub fn admit(&self, action: NewAction, id: Option<String>) -> Result<Admission> {
        action.validate()?;
        let now = Utc::now();

        match lock(&self.policy).resolve(action.action_type, now) {
            AutoResolution::Skip => {
                tracing::info!(action_type = %action.action_type, "action type skip-listed; auto-skipping");
                return Ok(Admission::AutoSkip);
            }
            AutoResolution::Allow => {
                tracing::info!(action_type = %action.action_type, "override window open; auto-allowing");
                return Ok(Admission::AutoAllow);
            }
            AutoResolution::Escalate => {}
        }

        let id = id.filter(|s| !s.trim().is_empty()).unwrap_or_else(new_action_id);
        let request = ActionRequest::new(id.clone(), action, now);
        let mut store = lock(&self.store);
        let swept = store.sweep(now, self.retention);
        if swept > 0 {
            tracing::debug!(swept, "dropped expired permission requests");
        }
        store.insert(request)?;
        tracing::info!(id = %id, "permission request queued");
        Ok(Admission::Queued(id))
    }

    pub fn list_pending(&self) -> Vec<ActionRequest> {
        lock(&self.store).list_pending()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.store).pending_count()
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Store `decision` for `id`; a second decision for the same id is a
    /// no-op. A freshly recorded `allow_all` opens the override window.
    pub fn record(&self, id: &str, decision: Decision) -> Result<RecordOutcome> {
        let opens_window = decision == Decision::AllowAll;
        let outcome = lock(&self.store).record(id, decision)?;
        match &outcome {
            RecordOutcome::Recorded => {
                tracing::info!(id = %id, "decision recorded");
                if opens_window {
                    self.set_allow_all(self.allow_all_minutes);
                }
            }
            RecordOutcome::AlreadyDecided(existing) => {
                tracing::debug!(id = %id, existing = %existing, "duplicate decision ignored");
            }
        }
        Ok(outcome)
    }

    pub fn lookup(&self, id: &str) -> Lookup {
        lock(&self.store).lookup(id)
    }

    /// Consume a recorded decision, removing the entry.
    pub fn take_decision(&self, id: &str) -> Option<Decision> {
        lock(&self.store).take_decision(id)
    }

    /// Remove `id`, returning any decision that landed before removal.
    pub fn finish(&self, id: &str) -> Option<Decision> {
        lock(&self.store).finish(id)
    }

    /// Drop entries older than the retention period.
    pub fn sweep(&self) -> usize {
        lock(&self.store).sweep(Utc::now(), self.retention)
    }

    // -----------------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------------

    pub fn allow_all_minutes(&self) -> u64 {
        self.allow_all_minutes
    }

    /// Open the override window for `duration_minutes`; zero revokes.
    pub fn set_allow_all(&self, duration_minutes: u64) -> WindowStatus {
        let now = Utc::now();
        let mut policy = lock(&self.policy);
        match policy.window.set(duration_minutes, now) {
            Some(expires_at) => {
                tracing::info!(duration_minutes, %expires_at, "override window opened")
            }
            None => tracing::info!("override window revoked"),
        }
        policy.window.status_at(now)
    }

    pub fn allow_all_status(&self) -> WindowStatus {
        lock(&self.policy).window.status_at(Utc::now())
    }

    pub fn skip_types(&self) -> Vec<ActionType> {
        lock(&self.policy).skip.to_vec()
    }

    pub fn set_skip(&self, action_type: ActionType, skip: bool) -> bool {
        let changed = lock(&self.policy).skip.set(action_type, skip);
        if changed {
            tracing::info!(action_type = %action_type, skip, "skip set updated");
        }
        changed
    }
}

impl Default for PermissionHub {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
