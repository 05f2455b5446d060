//! HTTP client for a Jira-compatible issue tracker.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use hourcast_core::config::TrackerConfig;
use hourcast_core::domain::ticket::{
    Comment, FixVersion, LinkedIssue, StatusChange, TicketId, TicketSnapshot, TimeTracking,
};

use crate::{TicketFetcher, TrackerError};

/// Labels that mark a ticket as worked with AI-assisted tooling.
const AI_TOOL_LABELS: [&str; 2] = ["ai-assisted", "ai-tools"];

pub struct HttpTrackerClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: SecretString,
    timeout_secs: u64,
}

impl HttpTrackerClient {
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let (Some(base_url), Some(email), Some(api_token)) =
            (&config.base_url, &config.email, &config.api_token)
        else {
            return Err(TrackerError::NotConfigured);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TrackerError::Connection(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.clone(),
            api_token: api_token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> TrackerError {
        if error.is_timeout() {
            TrackerError::Timeout { timeout_secs: self.timeout_secs }
        } else {
            TrackerError::Connection(error.to_string())
        }
    }
}

#[async_trait]
impl TicketFetcher for HttpTrackerClient {
    async fn fetch(&self, key: &str) -> Result<TicketSnapshot, TrackerError> {
        let url = format!("{}/rest/api/2/issue/{key}?expand=changelog", self.base_url);
        debug!(event_name = "tracker.fetch", ticket = key, "fetching ticket snapshot");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .send()
            .await
            .map_err(|error| self.classify_transport_error(error))?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(TrackerError::NotFound(key.to_string())),
            401 => return Err(TrackerError::AuthFailed),
            403 => return Err(TrackerError::PermissionDenied(key.to_string())),
            400 => return Err(TrackerError::MalformedIdentifier(key.to_string())),
            status => return Err(TrackerError::ServerError { status }),
        }

        let issue: RawIssue = response
            .json()
            .await
            .map_err(|error| TrackerError::Decode(error.to_string()))?;
        Ok(snapshot_from_issue(issue))
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
    #[serde(default)]
    changelog: Option<RawChangelog>,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    summary: String,
    #[serde(default)]
    description: Option<String>,
    issuetype: RawNamed,
    #[serde(default)]
    priority: Option<RawNamed>,
    status: RawNamed,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    comment: Option<RawCommentContainer>,
    #[serde(default, rename = "issuelinks")]
    issue_links: Vec<RawIssueLink>,
    #[serde(default, rename = "fixVersions")]
    fix_versions: Vec<RawFixVersion>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
    #[serde(default, rename = "timetracking")]
    time_tracking: Option<RawTimeTracking>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawCommentContainer {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    author: RawAuthor,
    body: String,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssueLink {
    #[serde(rename = "type")]
    link_type: RawLinkType,
    #[serde(default, rename = "outwardIssue")]
    outward_issue: Option<RawLinkedIssue>,
    #[serde(default, rename = "inwardIssue")]
    inward_issue: Option<RawLinkedIssue>,
}

#[derive(Debug, Deserialize)]
struct RawLinkType {
    #[serde(default)]
    outward: String,
    #[serde(default)]
    inward: String,
}

#[derive(Debug, Deserialize)]
struct RawLinkedIssue {
    key: String,
    fields: RawLinkedIssueFields,
}

#[derive(Debug, Deserialize)]
struct RawLinkedIssueFields {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct RawFixVersion {
    name: String,
    #[serde(default)]
    released: bool,
}

#[derive(Debug, Deserialize)]
struct RawTimeTracking {
    #[serde(default, rename = "originalEstimateSeconds")]
    original_estimate_seconds: u64,
    #[serde(default, rename = "timeSpentSeconds")]
    time_spent_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawChangelog {
    #[serde(default)]
    histories: Vec<RawHistory>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    items: Vec<RawHistoryItem>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryItem {
    field: String,
    #[serde(default, rename = "fromString")]
    from_status: Option<String>,
    #[serde(default, rename = "toString")]
    to_status: Option<String>,
}

fn snapshot_from_issue(issue: RawIssue) -> TicketSnapshot {
    let fields = issue.fields;

    let comments = fields
        .comment
        .map(|container| {
            container
                .comments
                .into_iter()
                .map(|comment| Comment {
                    author: comment.author.display_name,
                    body: comment.body,
                    created: comment.created,
                })
                .collect()
        })
        .unwrap_or_default();

    let mut linked_issues = Vec::new();
    for link in fields.issue_links {
        if let Some(outward) = link.outward_issue {
            linked_issues.push(LinkedIssue {
                key: outward.key,
                link_type: link.link_type.outward.clone(),
                summary: outward.fields.summary,
            });
        }
        if let Some(inward) = link.inward_issue {
            linked_issues.push(LinkedIssue {
                key: inward.key,
                link_type: link.link_type.inward.clone(),
                summary: inward.fields.summary,
            });
        }
    }

    let fix_versions = fields
        .fix_versions
        .into_iter()
        .map(|version| FixVersion { name: version.name, released: version.released })
        .collect();

    let status_history = issue
        .changelog
        .as_ref()
        .map(|changelog| status_changes(&changelog.histories))
        .unwrap_or_default();
    let time_in_status = time_per_status(&status_history, fields.created);

    let uses_ai_tools = fields
        .labels
        .iter()
        .any(|label| AI_TOOL_LABELS.contains(&label.to_lowercase().as_str()));

    TicketSnapshot {
        key: Some(TicketId(issue.key)),
        summary: fields.summary,
        description: fields.description.unwrap_or_default(),
        issue_type: fields.issuetype.name,
        priority: fields.priority.map(|priority| priority.name).unwrap_or_else(|| {
            "Medium".to_string()
        }),
        status: fields.status.name,
        labels: fields.labels.into_iter().collect(),
        fix_versions,
        linked_issues,
        comments,
        status_history,
        time_in_status,
        time_tracking: fields.time_tracking.map(|tracking| TimeTracking {
            original_estimate_seconds: tracking.original_estimate_seconds,
            time_spent_seconds: tracking.time_spent_seconds,
        }),
        uses_ai_tools,
        created: fields.created,
        updated: fields.updated,
    }
}

fn status_changes(histories: &[RawHistory]) -> Vec<StatusChange> {
    let mut changes: Vec<StatusChange> = histories
        .iter()
        .flat_map(|history| {
            history.items.iter().filter(|item| item.field == "status").map(move |item| {
                StatusChange {
                    from: item.from_status.clone().unwrap_or_default(),
                    to: item.to_status.clone().unwrap_or_default(),
                    changed_at: history.created,
                    author: history.author.as_ref().map(|author| author.display_name.clone()),
                }
            })
        })
        .collect();
    changes.sort_by_key(|change| change.changed_at);
    changes
}

/// Hours spent in each status, derived from consecutive transition
/// timestamps. The window before the first transition is attributed to
/// the status it moved out of.
fn time_per_status(
    changes: &[StatusChange],
    created: Option<DateTime<Utc>>,
) -> BTreeMap<String, Decimal> {
    let mut buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut previous_at = created;

    for change in changes {
        let (Some(start), Some(end)) = (previous_at, change.changed_at) else {
            previous_at = change.changed_at;
            continue;
        };
        let hours = duration_hours(start, end);
        if hours > Decimal::ZERO && !change.from.is_empty() {
            *buckets.entry(change.from.clone()).or_insert(Decimal::ZERO) += hours;
        }
        previous_at = change.changed_at;
    }

    buckets
}

fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}
