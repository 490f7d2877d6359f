//! Which model tier is resident in the inference runtime, if any.
//!
//! The tracker is owned by the scheduler and only mutated through it. It
//! never holds more than one tier: `mark_loaded` refuses to overwrite a
//! different resident tier, so callers must `clear` (evict) first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tier::ModelTier;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Residency {
    pub tier: String,
    pub model: String,
    pub loaded_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ResidencyTracker {
    loaded: Option<Residency>,
}

impl ResidencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Residency> {
        self.loaded.as_ref()
    }

    pub fn is_resident(&self, tier: &str) -> bool {
        self.loaded.as_ref().is_some_and(|r| r.tier == tier)
    }

    /// Drop the record once its keep-alive has passed. Returns the expired
    /// residency so the caller can still send an unload.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Residency> {
        if self.loaded.as_ref().is_some_and(|r| now >= r.expires_at) {
            self.loaded.take()
        } else {
            None
        }
    }

    /// Record that `tier` is now loaded.
    ///
    /// Returns `false` (and changes nothing) if a different tier is still
    /// recorded as resident.
    pub fn mark_loaded(&mut self, tier: &ModelTier, now: DateTime<Utc>) -> bool {
        if self.loaded.as_ref().is_some_and(|r| r.tier != tier.name) {
            return false;
        }
        let loaded_at = self
            .loaded
            .as_ref()
            .map(|r| r.loaded_at)
            .unwrap_or(now);
        self.loaded = Some(Residency {
            tier: tier.name.clone(),
            model: tier.model.clone(),
            loaded_at,
            last_used: now,
            expires_at: now + keep_alive_delta(tier),
        });
        true
    }

    /// Refresh the idle deadline after a use of the resident tier.
    pub fn touch(&mut self, now: DateTime<Utc>, tier: &ModelTier) {
        if let Some(r) = self.loaded.as_mut().filter(|r| r.tier == tier.name) {
            r.last_used = now;
            r.expires_at = now + keep_alive_delta(tier);
        }
    }

    pub fn clear(&mut self) -> Option<Residency> {
        self.loaded.take()
    }
}

/// Longer keep-alives are clamped so deadline arithmetic cannot overflow.
const MAX_KEEP_ALIVE_SECS: u64 = 10 * 365 * 24 * 3600;

fn keep_alive_delta(tier: &ModelTier) -> chrono::Duration {
    chrono::Duration::seconds(tier.keep_alive_secs.min(MAX_KEEP_ALIVE_SECS) as i64)
}
