//! Plain in-memory backing: two insertion-ordered vectors behind one
//! coarse lock each, so append and iterate never tear (spec's "use one
//! coarse lock" for the in-memory fallback).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sentinel_model::{Action, Id, Threat};

#[derive(Default)]
pub struct MemoryStore {
    threats: Mutex<Vec<Threat>>,
    actions: Mutex<Vec<Action>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn add_threat(&self, threat: Threat) {
        let mut threats = self.threats.lock();
        if let Some(existing) = threats.iter_mut().find(|t| t.id == threat.id) {
            *existing = threat;
        } else {
            threats.push(threat);
        }
    }

    pub fn add_action(&self, action: Action) {
        let mut actions = self.actions.lock();
        if let Some(existing) = actions.iter_mut().find(|a| a.id == action.id) {
            *existing = action;
        } else {
            actions.push(action);
        }
    }

    pub fn list_threats(&self) -> Vec<Threat> {
        self.threats.lock().clone()
    }

    pub fn list_actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn find_threat(&self, id: Id) -> Option<Threat> {
        self.threats.lock().iter().find(|t| t.id == id).cloned()
    }

    pub fn find_action(&self, id: Id) -> Option<Action> {
        self.actions.lock().iter().find(|a| a.id == id).cloned()
    }

    pub fn mark_resolved(&self, id: Id, at: DateTime<Utc>) {
        if let Some(t) = self.threats.lock().iter_mut().find(|t| t.id == id) {
            t.resolved = true;
            t.resolved_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_model::{Id, Severity, ThreatSource, ThreatType};
    use serde_json::Value as Json;

    fn sample_threat() -> Threat {
        Threat {
            id: Id::new(),
            detected_at: Utc::now(),
            severity: Severity::High,
            threat_type: ThreatType::ReverseShell,
            source: ThreatSource::default(),
            description: "test".into(),
            detector_output: "test".into(),
            detector_rule: None,
            detector_priority: None,
            ml_score: None,
            confidence: 0.7,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }

    #[test]
    fn added_threat_is_listed() {
        let store = MemoryStore::new();
        let threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat);
        assert!(store.list_threats().iter().any(|t| t.id == id));
        assert!(store.find_threat(id).is_some());
    }

    #[test]
    fn add_threat_is_idempotent_on_identity() {
        let store = MemoryStore::new();
        let mut threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat.clone());
        threat.resolved = true;
        store.add_threat(threat);
        assert_eq!(store.list_threats().iter().filter(|t| t.id == id).count(), 1);
        assert!(store.find_threat(id).unwrap().resolved);
    }

    #[test]
    fn mark_resolved_sets_resolved_and_resolved_at() {
        let store = MemoryStore::new();
        let threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat);
        let at = Utc::now();
        store.mark_resolved(id, at);
        let found = store.find_threat(id).unwrap();
        assert!(found.resolved);
        assert_eq!(found.resolved_at, Some(at));
    }

    #[test]
    fn mark_resolved_on_absent_id_is_a_no_op() {
        let store = MemoryStore::new();
        store.mark_resolved(Id::new(), Utc::now());
    }

    #[test]
    fn find_action_returns_none_when_absent() {
        let store = MemoryStore::new();
        assert!(store.find_action(Id::new()).is_none());
    }
}
