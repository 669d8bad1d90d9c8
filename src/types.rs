use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_GREETING: &str =
    "Hi! I'm here to help you explore how we can support your claims team. \
     Could you tell me a little about your company and what you're looking to improve?";

/// Placeholder values models like to emit instead of leaving a field empty.
const PLACEHOLDER_VALUES: [&str; 8] = [
    "unknown",
    "n/a",
    "na",
    "none",
    "null",
    "not provided",
    "not specified",
    "-",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub role: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    #[serde(default)]
    pub current_challenges: Vec<String>,
    pub intent_type: Option<String>,
    pub opportunity_summary: Option<String>,
}

impl CustomerInfo {
    /// The merged record in the shape the gates and scoring read.
    pub fn to_fields(&self) -> ExtractedFields {
        ExtractedFields {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            industry: self.industry.clone(),
            company_size: self.company_size.clone(),
            role: self.role.clone(),
            challenges: self.current_challenges.clone(),
            budget: self.budget.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Gathering,
    Completed,
    HumanRequested,
    Abandoned,
}

impl ConversationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConversationStatus::Gathering)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Gathering => "gathering",
            ConversationStatus::Completed => "completed",
            ConversationStatus::HumanRequested => "human_requested",
            ConversationStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Qualified,
    Viable,
    Nurture,
    Disqualified,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Qualified => "qualified",
            Tier::Viable => "viable",
            Tier::Nurture => "nurture",
            Tier::Disqualified => "disqualified",
        }
    }

    /// Tiers a sales rep should act on, provided the lead is minimally viable.
    pub fn is_actionable(self) -> bool {
        matches!(self, Tier::Hot | Tier::Warm | Tier::Qualified | Tier::Viable)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points awarded per scoring component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub contact: u32,
    pub company: u32,
    pub challenges: u32,
    pub name: u32,
    pub budget: u32,
    pub timeline: u32,
    pub authority: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.contact
            + self.company
            + self.challenges
            + self.name
            + self.budget
            + self.timeline
            + self.authority
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    pub budget_score: u32,
    pub authority_score: u32,
    pub need_score: u32,
    pub timeline_score: u32,
    pub total_score: u32,
    pub breakdown: ScoreBreakdown,
    pub tier: Tier,
    pub is_qualified: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub message_count: usize,
    /// Seconds between session creation and the latest turn.
    pub conversation_duration: i64,
    pub conversion_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub customer_info: CustomerInfo,
    pub qualification: Option<Qualification>,
    pub conversation_status: ConversationStatus,
    pub analytics: Analytics,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            customer_info: CustomerInfo::default(),
            qualification: None,
            conversation_status: ConversationStatus::Gathering,
            analytics: Analytics::default(),
        }
    }

    pub fn push_message(&mut self, role: MessageRole, content: &str, now: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            role,
            content: content.to_string(),
            created_at: now,
        });
        self.updated_at = now;
        self.analytics.message_count = self.messages.len();
        self.analytics.conversation_duration = (now - self.created_at).num_seconds().max(0);
    }

    /// Number of non-blank human turns so far.
    pub fn human_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Human && !m.content.trim().is_empty())
            .count()
    }

    pub fn last_human_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Human)
            .map(|m| m.content.as_str())
    }

    /// Hands the session to a person. Only a gathering session can move.
    pub fn request_human(&mut self) -> bool {
        self.leave_gathering(ConversationStatus::HumanRequested)
    }

    pub fn abandon(&mut self) -> bool {
        self.leave_gathering(ConversationStatus::Abandoned)
    }

    fn leave_gathering(&mut self, next: ConversationStatus) -> bool {
        if self.conversation_status.is_terminal() {
            return false;
        }
        self.conversation_status = next;
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorStatus {
    #[default]
    Gathering,
    ReadyToQualify,
    Qualified,
}

impl ExtractorStatus {
    pub fn requests_qualification(self) -> bool {
        matches!(self, ExtractorStatus::ReadyToQualify | ExtractorStatus::Qualified)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    Continue,
    Qualify,
    ScheduleCall,
    Handoff,
}

/// Best-effort field guesses returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedFields {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub industry: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub company_size: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub role: Option<String>,
    #[serde(alias = "currentChallenges", deserialize_with = "lenient_list")]
    pub challenges: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub budget: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub timeline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Objectives {
    #[serde(deserialize_with = "lenient")]
    pub has_contact_info: bool,
    #[serde(deserialize_with = "lenient")]
    pub has_company_info: bool,
    #[serde(deserialize_with = "lenient")]
    pub has_challenges: bool,
    #[serde(deserialize_with = "lenient")]
    pub has_budget: bool,
    #[serde(deserialize_with = "lenient")]
    pub has_timeline: bool,
    #[serde(deserialize_with = "lenient")]
    pub has_authority: bool,
}

/// The model's own opinion on readiness. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmQualification {
    #[serde(deserialize_with = "lenient")]
    pub should_qualify: bool,
    #[serde(deserialize_with = "lenient")]
    pub score: u32,
    #[serde(deserialize_with = "lenient")]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractorResponse {
    #[serde(deserialize_with = "lenient")]
    pub message: String,
    #[serde(deserialize_with = "lenient")]
    pub extracted: ExtractedFields,
    #[serde(deserialize_with = "lenient")]
    pub objectives: Objectives,
    #[serde(deserialize_with = "lenient")]
    pub qualification: LlmQualification,
    #[serde(deserialize_with = "lenient_text")]
    pub intent_type: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub opportunity_summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: ExtractorStatus,
    #[serde(deserialize_with = "lenient")]
    pub next_action: NextAction,
    #[serde(deserialize_with = "lenient_list")]
    pub missing_info: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub conversation_depth: u32,
}

impl Default for ExtractorResponse {
    fn default() -> Self {
        Self {
            message: DEFAULT_GREETING.to_string(),
            extracted: ExtractedFields::default(),
            objectives: Objectives::default(),
            qualification: LlmQualification::default(),
            intent_type: None,
            opportunity_summary: None,
            status: ExtractorStatus::Gathering,
            next_action: NextAction::Continue,
            missing_info: Vec::new(),
            conversation_depth: 0,
        }
    }
}

/// Trims a value and drops it when blank or a placeholder such as "unknown".
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if PLACEHOLDER_VALUES.contains(&lower.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn is_present(value: &Option<String>) -> bool {
    value.as_deref().and_then(normalize_text).is_some()
}

/// Any value that fails to deserialize as `T` becomes `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => normalize_text(&text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize_text)
            .collect(),
        Value::String(text) => normalize_text(&text).into_iter().collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extractor_response_tolerates_nulls_and_wrong_types() {
        let parsed: ExtractorResponse = serde_json::from_value(json!({
            "message": "Thanks! What's your budget?",
            "extracted": {
                "name": "Dana",
                "email": null,
                "company": "  Acme Mutual ",
                "budget": 250000,
                "timeline": "unknown",
                "challenges": ["slow FNOL intake", "", 42]
            },
            "objectives": "not an object",
            "status": "ready_to_qualify",
            "nextAction": "something_new",
            "missingInfo": "budget",
            "conversationDepth": "four"
        }))
        .unwrap();

        assert_eq!(parsed.message, "Thanks! What's your budget?");
        assert_eq!(parsed.extracted.name.as_deref(), Some("Dana"));
        assert_eq!(parsed.extracted.email, None);
        assert_eq!(parsed.extracted.company.as_deref(), Some("Acme Mutual"));
        assert_eq!(parsed.extracted.budget.as_deref(), Some("250000"));
        assert_eq!(parsed.extracted.timeline, None);
        assert_eq!(parsed.extracted.challenges, vec!["slow FNOL intake".to_string()]);
        assert_eq!(parsed.objectives, Objectives::default());
        assert_eq!(parsed.status, ExtractorStatus::ReadyToQualify);
        assert_eq!(parsed.next_action, NextAction::Continue);
        assert_eq!(parsed.missing_info, vec!["budget".to_string()]);
        assert_eq!(parsed.conversation_depth, 0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: ExtractorResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, ExtractorResponse::default());
        assert_eq!(parsed.message, DEFAULT_GREETING);
    }

    #[test]
    fn terminal_sessions_do_not_change_status() {
        let mut state = ConversationState::new("s1", Utc::now());
        assert!(state.request_human());
        assert_eq!(state.conversation_status, ConversationStatus::HumanRequested);
        assert!(!state.abandon());
        assert_eq!(state.conversation_status, ConversationStatus::HumanRequested);
    }

    #[test]
    fn human_turns_skip_blank_and_ai_messages() {
        let now = Utc::now();
        let mut state = ConversationState::new("s1", now);
        state.push_message(MessageRole::Human, "hello", now);
        state.push_message(MessageRole::Ai, "hi there", now);
        state.push_message(MessageRole::Human, "   ", now);
        assert_eq!(state.human_turns(), 1);
        assert_eq!(state.analytics.message_count, 3);
        assert_eq!(state.last_human_message(), Some("   "));
    }
}
