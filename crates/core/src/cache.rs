//! In-memory estimate memoization. Identical inputs must return
//! identical outputs within one process lifetime, so the key covers the
//! normalized description, the estimation-relevant ticket fields, and
//! the phase plan. No eviction; entries live as long as the process.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::estimate::Estimate;
use crate::domain::request::EstimationRequest;

#[derive(Default)]
pub struct EstimateCache {
    entries: RwLock<HashMap<String, Estimate>>,
}

impl EstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(request: &EstimationRequest) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize(&request.description).as_bytes());
        hasher.update(b"\x1f");

        if let Some(ticket) = &request.ticket {
            hasher.update(normalize(&ticket.issue_type).as_bytes());
            hasher.update(b"\x1f");
            hasher.update(normalize(&ticket.priority).as_bytes());
            hasher.update(b"\x1f");
            hasher.update(normalize(&ticket.summary).as_bytes());
            hasher.update(b"\x1f");
            hasher.update(normalize(&ticket.description).as_bytes());
            hasher.update(b"\x1f");
            hasher.update(&[ticket.uses_ai_tools as u8]);
            hasher.update(b"\x1f");
        }

        // Two requests differing only in phase selection must not collide.
        let plan = serde_json::to_string(&request.phase_plan).unwrap_or_default();
        hasher.update(plan.as_bytes());

        hasher.finalize().to_hex().to_string()
    }

    pub fn get(&self, key: &str) -> Option<Estimate> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(key).cloned()
    }

    pub fn store(&self, key: String, estimate: Estimate) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key, estimate);
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Exists for test isolation; production code never
    /// evicts.
    pub fn clear(&self) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.clear();
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
