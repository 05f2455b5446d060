//! Prompt assembly for the model gateway. The estimation rules block
//! carries the calibrated hour ranges the product relies on; do not edit
//! the numbers without revisiting the policy caps that assume them.

use std::fmt::Write;

use crate::domain::ticket::TicketSnapshot;

const ROLE_FRAMING: &str = "You are a senior software architect and project manager with 15+ \
years of experience estimating development tasks. Be realistic about time requirements and err \
on the higher side for risky work.";

const ESTIMATION_RULES: &str = r#"**CRITICAL ESTIMATION RULES:**

**Framework Version Upgrades (ALWAYS HIGH COMPLEXITY):**
- Minor version upgrade: 120-200 hours
- Major version upgrade: 200-400 hours
- Breaking changes analysis: 40-80 hours
- Third-party library compatibility fixes: 60-150 hours
- Native module updates: 80-200 hours
- Testing across devices/platforms: 100-200 hours

**Native Mobile Work:**
- Objective-C to Swift migration: 80-200 hours per major module
- Native dependency updates: 60-150 hours
- Platform-specific breaking changes: 40-100 hours

**Combined Upgrade + Native Migration:**
- If the description mentions BOTH a framework upgrade AND a native language
  migration: MINIMUM 250 hours, always HIGH complexity.

**Enterprise Integrations (IIB, SAP, mainframe):**
- 80-120 hours base for cross-system or multi-system work.

**Security Tickets (BlackDuck, CVE, dependency updates):**
- Hard cap at 32 hours total.

**Confidence Banding:**
- Report 90-95 for well-understood work, lower only for genuinely
  ambiguous scope."#;

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object matching exactly this schema:
{
    "total_hours": <number>,
    "complexity": "<Low|Medium|High>",
    "confidence": <0-100>,
    "reasoning": "<detailed explanation of why this estimate>",
    "risk_factors": ["<factor1>", "<factor2>"],
    "phases": {
        "requirements": <hours>,
        "design": <hours>,
        "development": <hours>,
        "testing": <hours>,
        "deployment": <hours>
    }
}
No markdown fences, no text outside the JSON object."#;

const COMMENT_TRUNCATE_CHARS: usize = 150;
const COMMENT_TAIL_COUNT: usize = 2;

#[derive(Clone, Debug, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, description: &str, ticket: Option<&TicketSnapshot>) -> String {
        let mut prompt = String::new();
        prompt.push_str(ROLE_FRAMING);
        prompt.push_str("\n\n**Task Description:**\n");
        prompt.push_str(description);

        if let Some(ticket) = ticket {
            prompt.push_str("\n\n");
            prompt.push_str(&ticket_block(ticket));
        }

        prompt.push_str("\n\n");
        prompt.push_str(ESTIMATION_RULES);
        prompt.push_str("\n\n");
        prompt.push_str(RESPONSE_FORMAT);
        prompt
    }
}

fn ticket_block(ticket: &TicketSnapshot) -> String {
    let mut block = String::from("**Ticket Details:**\n");
    let _ = writeln!(block, "- Issue Type: {}", non_empty(&ticket.issue_type));
    let _ = writeln!(block, "- Priority: {}", non_empty(&ticket.priority));
    let _ = writeln!(block, "- Status: {}", non_empty(&ticket.status));
    let _ = writeln!(block, "- Summary: {}", ticket.summary);

    if !ticket.labels.is_empty() {
        let labels: Vec<&str> = ticket.labels.iter().map(String::as_str).collect();
        let _ = writeln!(block, "- Labels: {}", labels.join(", "));
    }

    if !ticket.fix_versions.is_empty() {
        let versions: Vec<String> = ticket
            .fix_versions
            .iter()
            .map(|version| {
                let state = if version.released { "released" } else { "unreleased" };
                format!("{} ({state})", version.name)
            })
            .collect();
        let _ = writeln!(block, "- Fix Versions: {}", versions.join(", "));
    }

    if !ticket.linked_issues.is_empty() {
        let links: Vec<String> = ticket
            .linked_issues
            .iter()
            .map(|link| format!("{} ({})", link.key, link.link_type))
            .collect();
        let _ = writeln!(block, "- Linked Issues: {}", links.join(", "));
    }

    let recent: Vec<&crate::domain::ticket::Comment> =
        ticket.comments.iter().rev().take(COMMENT_TAIL_COUNT).collect();
    if !recent.is_empty() {
        block.push_str("- Recent Comments:\n");
        for comment in recent.into_iter().rev() {
            let _ = writeln!(
                block,
                "  * {}: {}",
                comment.author,
                truncate_chars(&comment.body, COMMENT_TRUNCATE_CHARS)
            );
        }
    }

    block.trim_end().to_string()
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() {
        "Unknown"
    } else {
        value
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}
