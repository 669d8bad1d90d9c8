//! Fixed-shape sales notification built from a qualified session.
//!
//! Every field is populated (strings default to `"Unknown"`, lists to empty)
//! so renderers never deal with missing values.

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::evaluator::QualificationGates;
use crate::scoring::{
    AUTHORITY_POINTS, MAX_BUDGET_POINTS, MAX_NEED_POINTS, MAX_TIMELINE_POINTS, MAX_TOTAL_SCORE,
};
use crate::types::{is_present, ConversationState, MessageRole, Tier};

pub const UNKNOWN: &str = "Unknown";
const MAX_HIGHLIGHTS: usize = 5;
const MAX_HIGHLIGHT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Hot | Tier::Warm => Priority::High,
            Tier::Qualified | Tier::Viable => Priority::Medium,
            Tier::Nurture | Tier::Disqualified => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHeader {
    pub subject: String,
    pub headline: String,
    pub priority: Priority,
    pub tier: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub name: String,
    pub industry: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub challenges: Vec<String>,
    pub budget: String,
    pub timeline: String,
    pub intent_type: String,
    pub opportunity_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetails {
    pub contact: ContactDetails,
    pub company: CompanyDetails,
    pub requirements: Requirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BantFactor {
    pub label: String,
    pub score: u32,
    pub max: u32,
}

impl BantFactor {
    fn new(label: &str, score: u32, max: u32) -> Self {
        Self {
            label: label.to_string(),
            score,
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BantBreakdown {
    pub budget: BantFactor,
    pub authority: BantFactor,
    pub need: BantFactor,
    pub timeline: BantFactor,
    pub total_score: u32,
    pub max_score: u32,
}

impl BantBreakdown {
    pub fn factors(&self) -> [&BantFactor; 4] {
        [&self.budget, &self.authority, &self.need, &self.timeline]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub label: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    pub session_id: String,
    pub message_count: usize,
    pub conversation_duration_secs: i64,
    pub generated_at: String,
    pub is_qualified: bool,
    pub qualification_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotificationSchema {
    pub header: NotificationHeader,
    pub lead: LeadDetails,
    pub bant: BantBreakdown,
    pub checklist: Vec<ChecklistItem>,
    pub highlights: Vec<String>,
    pub action_items: Vec<String>,
    pub metadata: NotificationMetadata,
}

impl Default for EmailNotificationSchema {
    /// Placeholder schema. The BANT maxima here are the documented 30/25/25/20
    /// split, which differs from the point table a real qualification uses.
    fn default() -> Self {
        Self {
            header: NotificationHeader {
                subject: "New lead".to_string(),
                headline: "Lead from chat assistant".to_string(),
                priority: Priority::Low,
                tier: Tier::Disqualified.as_str().to_string(),
                recipient: UNKNOWN.to_string(),
            },
            lead: LeadDetails {
                contact: ContactDetails {
                    name: UNKNOWN.to_string(),
                    email: UNKNOWN.to_string(),
                    phone: UNKNOWN.to_string(),
                    role: UNKNOWN.to_string(),
                },
                company: CompanyDetails {
                    name: UNKNOWN.to_string(),
                    industry: UNKNOWN.to_string(),
                    size: UNKNOWN.to_string(),
                },
                requirements: Requirements {
                    challenges: Vec::new(),
                    budget: UNKNOWN.to_string(),
                    timeline: UNKNOWN.to_string(),
                    intent_type: UNKNOWN.to_string(),
                    opportunity_summary: UNKNOWN.to_string(),
                },
            },
            bant: BantBreakdown {
                budget: BantFactor::new("Budget", 0, 30),
                authority: BantFactor::new("Authority", 0, 25),
                need: BantFactor::new("Need", 0, 25),
                timeline: BantFactor::new("Timeline", 0, 20),
                total_score: 0,
                max_score: 100,
            },
            checklist: Vec::new(),
            highlights: Vec::new(),
            action_items: Vec::new(),
            metadata: NotificationMetadata {
                session_id: UNKNOWN.to_string(),
                message_count: 0,
                conversation_duration_secs: 0,
                generated_at: UNKNOWN.to_string(),
                is_qualified: false,
                qualification_reasons: Vec::new(),
            },
        }
    }
}

/// Builds the notification for a session. `None` until the session has a
/// qualification.
pub fn build_notification(
    state: &ConversationState,
    generated_at: DateTime<Utc>,
    recipient: &str,
) -> Option<EmailNotificationSchema> {
    let qualification = state.qualification.as_ref()?;
    let info = &state.customer_info;
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());

    let display_name = info
        .company
        .as_deref()
        .or(info.name.as_deref())
        .unwrap_or("Unknown lead");
    let subject = if qualification.is_qualified {
        format!(
            "[{}] New qualified lead: {display_name}",
            qualification.tier.as_str().to_ascii_uppercase()
        )
    } else {
        format!(
            "[{}] Lead for review: {display_name}",
            qualification.tier.as_str().to_ascii_uppercase()
        )
    };

    let gates = QualificationGates::from_fields(&info.to_fields());
    let checklist = vec![
        checklist_item("Contact information (email or phone)", gates.has_contact),
        checklist_item("Company or industry", gates.has_business_context),
        checklist_item("Specific challenges", gates.has_specific_challenges),
        checklist_item("Budget range", gates.has_budget),
        checklist_item("Timeline", gates.has_timeline),
        checklist_item("Decision-making role", is_present(&info.role)),
    ];

    Some(EmailNotificationSchema {
        header: NotificationHeader {
            subject,
            headline: info
                .opportunity_summary
                .clone()
                .unwrap_or_else(|| "Lead from chat assistant".to_string()),
            priority: Priority::for_tier(qualification.tier),
            tier: qualification.tier.as_str().to_string(),
            recipient: recipient.to_string(),
        },
        lead: LeadDetails {
            contact: ContactDetails {
                name: text(&info.name),
                email: text(&info.email),
                phone: text(&info.phone),
                role: text(&info.role),
            },
            company: CompanyDetails {
                name: text(&info.company),
                industry: text(&info.industry),
                size: text(&info.company_size),
            },
            requirements: Requirements {
                challenges: info.current_challenges.clone(),
                budget: text(&info.budget),
                timeline: text(&info.timeline),
                intent_type: text(&info.intent_type),
                opportunity_summary: text(&info.opportunity_summary),
            },
        },
        bant: BantBreakdown {
            budget: BantFactor::new("Budget", qualification.budget_score, MAX_BUDGET_POINTS),
            authority: BantFactor::new(
                "Authority",
                qualification.authority_score,
                AUTHORITY_POINTS,
            ),
            need: BantFactor::new("Need", qualification.need_score, MAX_NEED_POINTS),
            timeline: BantFactor::new(
                "Timeline",
                qualification.timeline_score,
                MAX_TIMELINE_POINTS,
            ),
            total_score: qualification.total_score,
            max_score: MAX_TOTAL_SCORE,
        },
        checklist,
        highlights: conversation_highlights(state),
        action_items: action_items(state),
        metadata: NotificationMetadata {
            session_id: state.session_id.clone(),
            message_count: state.messages.len(),
            conversation_duration_secs: state.analytics.conversation_duration,
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            is_qualified: qualification.is_qualified,
            qualification_reasons: qualification.reasons.clone(),
        },
    })
}

fn checklist_item(label: &str, completed: bool) -> ChecklistItem {
    ChecklistItem {
        label: label.to_string(),
        completed,
    }
}

fn highlight_regex() -> Option<&'static Regex> {
    static HIGHLIGHT: OnceLock<Option<Regex>> = OnceLock::new();
    HIGHLIGHT
        .get_or_init(|| {
            Regex::new(
                r"(?i)(\$\s*\d|\d|\b(budget|spend|cost|timeline|deadline|asap|urgent|weeks?|months?|quarters?|years?)\b)",
            )
            .ok()
        })
        .as_ref()
}

/// Customer messages that mention budget or timing figures.
pub fn conversation_highlights(state: &ConversationState) -> Vec<String> {
    let Some(pattern) = highlight_regex() else {
        return Vec::new();
    };
    state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Human)
        .map(|m| m.content.trim())
        .filter(|content| !content.is_empty() && pattern.is_match(content))
        .take(MAX_HIGHLIGHTS)
        .map(|content| {
            if content.chars().count() > MAX_HIGHLIGHT_CHARS {
                let cut: String = content.chars().take(MAX_HIGHLIGHT_CHARS).collect();
                format!("{cut}…")
            } else {
                content.to_string()
            }
        })
        .collect()
}

fn action_items(state: &ConversationState) -> Vec<String> {
    let Some(qualification) = state.qualification.as_ref() else {
        return Vec::new();
    };
    let info = &state.customer_info;
    let who = info.name.as_deref().unwrap_or("the lead");
    let company = info.company.as_deref().unwrap_or("their team");

    let mut items = match qualification.tier {
        Tier::Hot | Tier::Warm => vec![
            format!("Call {who} within 24 hours"),
            format!("Prepare a tailored demo for {company}"),
        ],
        Tier::Qualified | Tier::Viable => vec![format!(
            "Send {who} a follow-up email with relevant case studies within 2 business days"
        )],
        Tier::Nurture | Tier::Disqualified => {
            vec!["Add to the nurture campaign".to_string()]
        }
    };
    if info.phone.is_none() {
        items.push("Confirm a phone number".to_string());
    }
    if info.role.is_none() {
        items.push("Confirm decision-making authority".to_string());
    }
    if info.budget.is_none() {
        items.push("Qualify budget on the first call".to_string());
    }
    if info.timeline.is_none() {
        items.push("Confirm the implementation timeline".to_string());
    }
    items
}
