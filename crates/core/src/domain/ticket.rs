use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixVersion {
    pub name: String,
    pub released: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIssue {
    pub key: String,
    pub link_type: String,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
    pub changed_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTracking {
    pub original_estimate_seconds: u64,
    pub time_spent_seconds: u64,
}

/// A point-in-time view of an issue-tracker ticket. Immutable once
/// received; the estimation pipeline never writes back to the tracker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub key: Option<TicketId>,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub fix_versions: Vec<FixVersion>,
    #[serde(default)]
    pub linked_issues: Vec<LinkedIssue>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    /// Hours accumulated per workflow status, derived from the changelog.
    #[serde(default)]
    pub time_in_status: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub time_tracking: Option<TimeTracking>,
    /// Whether the team works this ticket with AI-assisted tooling.
    #[serde(default)]
    pub uses_ai_tools: bool,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl TicketSnapshot {
    /// Summary and description joined for keyword scans. Both fields feed
    /// the same cap and baseline matching rules.
    pub fn text(&self) -> String {
        let mut text = self.summary.clone();
        if !self.description.is_empty() {
            if !text.is_empty() {
                text.push_str(". ");
            }
            text.push_str(&self.description);
        }
        text
    }

    pub fn status_transition_count(&self) -> usize {
        self.status_history.len()
    }
}
