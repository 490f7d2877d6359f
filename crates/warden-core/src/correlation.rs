//! Pending action requests and the decisions recorded against them.
//!
//! Plain data; [`crate::hub::PermissionHub`] owns the only instance behind a
//! mutex. The first decision recorded for an id is final.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, WardenError};
use crate::types::{ActionRequest, Decision};

#[derive(Debug, Clone)]
struct Entry {
    request: ActionRequest,
    decision: Option<Decision>,
}

/// Result of recording a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded,
    /// An earlier decision stands; the new one was dropped.
    AlreadyDecided(Decision),
}

/// Non-consuming view of one id.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Pending,
    Decided(Decision),
    NotFound,
}

#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: HashMap<String, Entry>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, request: ActionRequest) -> Result<()> {
        if self.entries.contains_key(&request.id) {
            return Err(WardenError::DuplicateActionId(request.id));
        }
        self.entries.insert(
            request.id.clone(),
            Entry {
                request,
                decision: None,
            },
        );
        Ok(())
    }

    /// Undecided requests, oldest first.
    pub fn list_pending(&self) -> Vec<ActionRequest> {
        let mut pending: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.decision.is_none())
            .map(|e| e.request.clone())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.decision.is_none()).count()
    }

    /// Record `decision` for `id` unless one is already stored.
    ///
    /// Edit payloads are checked against the stored request's action type; a
    /// mismatch leaves the entry pending.
    pub fn record(&mut self, id: &str, decision: Decision) -> Result<RecordOutcome> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| WardenError::UnknownActionId(id.to_string()))?;
        if let Some(existing) = &entry.decision {
            return Ok(RecordOutcome::AlreadyDecided(existing.clone()));
        }
        if let Decision::Edit(payload) = &decision {
            payload.validate_for(entry.request.action_type)?;
        }
        entry.decision = Some(decision);
        Ok(RecordOutcome::Recorded)
    }

    pub fn lookup(&self, id: &str) -> Lookup {
        match self.entries.get(id) {
            None => Lookup::NotFound,
            Some(Entry { decision: None, .. }) => Lookup::Pending,
            Some(Entry {
                decision: Some(d), ..
            }) => Lookup::Decided(d.clone()),
        }
    }

    /// Remove and return the decision for `id` if one has been recorded.
    pub fn take_decision(&mut self, id: &str) -> Option<Decision> {
        if self.entries.get(id)?.decision.is_none() {
            return None;
        }
        self.entries.remove(id).and_then(|e| e.decision)
    }

    /// Remove `id` unconditionally, returning whatever decision it held.
    pub fn finish(&mut self, id: &str) -> Option<Decision> {
        self.entries.remove(id).and_then(|e| e.decision)
    }

    /// Drop entries created more than `retention` before `now`.
    pub fn sweep(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.signed_duration_since(e.request.created_at) < retention);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionParams, ActionType, NewAction};

    fn req(id: &str, at: DateTime<Utc>) -> ActionRequest {
        ActionRequest::new(id, NewAction::new(ActionType::Click, "Click Apply", 0.9), at)
    }

    #[test]
    fn first_decision_wins() {
        let mut s = CorrelationStore::new();
        s.insert(req("perm-1", Utc::now())).unwrap();
        assert_eq!(s.record("perm-1", Decision::Allow).unwrap(), RecordOutcome::Recorded);
        assert_eq!(
            s.record("perm-1", Decision::Stop).unwrap(),
            RecordOutcome::AlreadyDecided(Decision::Allow)
        );
        assert_eq!(s.take_decision("perm-1"), Some(Decision::Allow));
        assert!(s.is_empty());
    }

    #[test]
    fn unknown_id_is_reported() {
        let mut s = CorrelationStore::new();
        assert!(matches!(
            s.record("ghost", Decision::Allow),
            Err(WardenError::UnknownActionId(_))
        ));
        assert_eq!(s.lookup("ghost"), Lookup::NotFound);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut s = CorrelationStore::new();
        s.insert(req("perm-1", Utc::now())).unwrap();
        assert!(matches!(
            s.insert(req("perm-1", Utc::now())),
            Err(WardenError::DuplicateActionId(_))
        ));
    }

    #[test]
    fn pending_is_oldest_first_and_excludes_decided() {
        let t0 = Utc::now();
        let mut s = CorrelationStore::new();
        s.insert(req("b", t0 + Duration::seconds(2))).unwrap();
        s.insert(req("a", t0)).unwrap();
        s.insert(req("c", t0 + Duration::seconds(1))).unwrap();
        s.record("c", Decision::Skip).unwrap();

        let ids: Vec<_> = s.list_pending().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(s.pending_count(), 2);
    }

    #[test]
    fn mismatched_edit_leaves_entry_pending() {
        let mut s = CorrelationStore::new();
        s.insert(req("perm-1", Utc::now())).unwrap();
        let bad = Decision::Edit(ActionParams::Type { text: "x".into() });
        assert!(matches!(
            s.record("perm-1", bad),
            Err(WardenError::InvalidEditPayload(_))
        ));
        assert_eq!(s.lookup("perm-1"), Lookup::Pending);
    }

    #[test]
    fn take_decision_leaves_pending_entry_in_place() {
        let mut s = CorrelationStore::new();
        s.insert(req("perm-1", Utc::now())).unwrap();
        assert_eq!(s.take_decision("perm-1"), None);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn sweep_drops_old_entries() {
        let t0 = Utc::now();
        let mut s = CorrelationStore::new();
        s.insert(req("old", t0 - Duration::minutes(20))).unwrap();
        s.insert(req("new", t0)).unwrap();
        assert_eq!(s.sweep(t0, Duration::minutes(15)), 1);
        assert_eq!(s.lookup("old"), Lookup::NotFound);
        assert_eq!(s.lookup("new"), Lookup::Pending);
    }
}
