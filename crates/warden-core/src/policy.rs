//! Auto-resolution policy: the override window and the skip set.
//!
//! Every time comparison against the window's deadline happens here; callers
//! pass `now` in and never look at `expires_at` themselves.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::ActionType;

// ---------------------------------------------------------------------------
// OverrideWindow
// ---------------------------------------------------------------------------

/// A single, process-wide auto-approve window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideWindow {
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    pub active: bool,
    pub time_remaining_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OverrideWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the window for `duration_minutes` from `now`. Zero revokes.
    ///
    /// Durations past the representable range open the window until
    /// `DateTime::<Utc>::MAX_UTC`. Returns the new deadline, or `None` when
    /// revoked.
    pub fn set(&mut self, duration_minutes: u64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if duration_minutes == 0 {
            self.revoke();
            return None;
        }
        let deadline = i64::try_from(duration_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at = Some(deadline);
        self.expires_at
    }

    pub fn revoke(&mut self) {
        self.expires_at = None;
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| now < t)
    }

    /// Whole seconds left, zero once expired or revoked.
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        match self.expires_at {
            Some(t) if now < t => (t - now).num_seconds(),
            _ => 0,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> WindowStatus {
        let active = self.is_active_at(now);
        WindowStatus {
            active,
            time_remaining_seconds: self.time_remaining_at(now),
            expires_at: self.expires_at.filter(|_| active),
        }
    }
}

// ---------------------------------------------------------------------------
// SkipSet
// ---------------------------------------------------------------------------

/// Action types that resolve to `skip` without asking anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    types: BTreeSet<ActionType>,
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, action_type: ActionType) -> bool {
        self.types.contains(&action_type)
    }

    /// Add or remove `action_type`. Returns whether the set changed.
    pub fn set(&mut self, action_type: ActionType, skip: bool) -> bool {
        if skip {
            self.types.insert(action_type)
        } else {
            self.types.remove(&action_type)
        }
    }

    pub fn to_vec(&self) -> Vec<ActionType> {
        self.types.iter().copied().collect()
    }
}

impl FromIterator<ActionType> for SkipSet {
    fn from_iter<I: IntoIterator<Item = ActionType>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How a new action resolves before anyone is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoResolution {
    Skip,
    Allow,
    Escalate,
}

#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub window: OverrideWindow,
    pub skip: SkipSet,
}

impl Policy {
    pub fn new(skip: SkipSet) -> Self {
        Self {
            window: OverrideWindow::new(),
            skip,
        }
    }

    /// Skip set first, then the override window.
    pub fn resolve(&self, action_type: ActionType, now: DateTime<Utc>) -> AutoResolution {
        if self.skip.contains(action_type) {
            AutoResolution::Skip
        } else if self.window.is_active_at(now) {
            AutoResolution::Allow
        } else {
            AutoResolution::Escalate
        }
    }
}
