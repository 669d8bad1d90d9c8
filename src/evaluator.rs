//! Deterministic qualification gate.
//!
//! The extractor's `status` and `qualification.shouldQualify` are opinions.
//! This module decides whether a session may close, computes the score the
//! first time it does, and merges the extracted fields into the session.

use tracing::{debug, info};

use crate::scoring::{self, MAX_TOTAL_SCORE};
use crate::types::{
    is_present, normalize_text, ConversationState, ConversationStatus, CustomerInfo,
    ExtractedFields, ExtractorResponse, ExtractorStatus, NextAction,
};

pub const MIN_QUALIFYING_DEPTH: u32 = 6;
pub const CLOSING_DEPTH: u32 = 8;

const CLOSING_PHRASES: [&str; 4] = ["thanks", "thank you", "goodbye", "bye"];

/// Entries with this word and fewer than [`GENERIC_CHALLENGE_MAX_WORDS`] words
/// are throwaway mentions, not pain points.
const GENERIC_CHALLENGE_TERM: &str = "automation";
const GENERIC_CHALLENGE_MAX_WORDS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualificationGates {
    pub has_contact: bool,
    pub has_specific_challenges: bool,
    pub has_business_context: bool,
    pub has_timeline: bool,
    pub has_budget: bool,
}

impl QualificationGates {
    pub fn from_fields(fields: &ExtractedFields) -> Self {
        Self {
            has_contact: scoring::has_contact(fields),
            has_specific_challenges: has_specific_challenges(&fields.challenges),
            has_business_context: scoring::has_company_context(fields),
            has_timeline: is_present(&fields.timeline),
            has_budget: is_present(&fields.budget),
        }
    }

    pub fn all_met(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn satisfied(&self) -> usize {
        5 - self.missing().len()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.has_contact, "contact"),
            (self.has_specific_challenges, "specific_challenges"),
            (self.has_business_context, "business_context"),
            (self.has_timeline, "timeline"),
            (self.has_budget, "budget"),
        ]
        .into_iter()
        .filter(|(met, _)| !met)
        .map(|(_, name)| name)
        .collect()
    }
}

pub fn is_generic_challenge(challenge: &str) -> bool {
    challenge.to_lowercase().contains(GENERIC_CHALLENGE_TERM)
        && challenge.split_whitespace().count() < GENERIC_CHALLENGE_MAX_WORDS
}

pub fn has_specific_challenges(challenges: &[String]) -> bool {
    !challenges.is_empty() && !challenges.iter().all(|c| is_generic_challenge(c))
}

pub fn user_is_ending_conversation(text: &str) -> bool {
    let lower = text.to_lowercase();
    CLOSING_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Result of evaluating one extractor response against a session.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The session after this turn's fields and status were applied.
    pub state: ConversationState,
    /// The extractor response with `status`/`nextAction` overridden when the
    /// gate refused to close.
    pub response: ExtractorResponse,
    pub gates: QualificationGates,
    pub depth: u32,
    pub user_ending_conversation: bool,
    /// True only on the turn that first attached a qualification.
    pub newly_qualified: bool,
}

impl Evaluation {
    pub fn ready_to_close(&self) -> bool {
        self.response.status.requests_qualification()
    }
}

pub fn evaluate(state: &ConversationState, mut response: ExtractorResponse) -> Evaluation {
    let mut next = state.clone();
    let gates = QualificationGates::from_fields(&response.extracted);
    // The model's depth may lower the count but never raise it past real turns.
    let human_turns = u32::try_from(state.human_turns()).unwrap_or(u32::MAX);
    let depth = match response.conversation_depth {
        0 => human_turns,
        reported => reported.min(human_turns),
    };
    let user_ending_conversation = state
        .last_human_message()
        .map(user_is_ending_conversation)
        .unwrap_or(false);

    let requested = response.status.requests_qualification();
    let fully_gathered = gates.all_met() && depth >= MIN_QUALIFYING_DEPTH;
    let closing = depth >= CLOSING_DEPTH && user_ending_conversation;
    let ready = requested && (fully_gathered || closing);

    if !ready {
        if requested {
            debug!(
                session_id = %state.session_id,
                depth,
                missing = ?gates.missing(),
                "overriding extractor request to qualify"
            );
        }
        response.status = ExtractorStatus::Gathering;
        response.next_action = NextAction::Continue;
    }

    merge_customer_info(&mut next.customer_info, &response);

    let mut newly_qualified = false;
    if ready && next.conversation_status == ConversationStatus::Gathering {
        next.conversation_status = ConversationStatus::Completed;
        if next.qualification.is_none() {
            let qualification = scoring::score_lead(&response.extracted);
            info!(
                session_id = %state.session_id,
                total_score = qualification.total_score,
                tier = %qualification.tier,
                is_qualified = qualification.is_qualified,
                "lead qualified"
            );
            next.qualification = Some(qualification);
            newly_qualified = true;
        }
    }

    next.analytics.message_count = next.messages.len();
    next.analytics.conversion_probability = match &next.qualification {
        Some(q) => f64::from(q.total_score) / f64::from(MAX_TOTAL_SCORE),
        None => gates.satisfied() as f64 / 5.0 * 0.5,
    };

    Evaluation {
        state: next,
        response,
        gates,
        depth,
        user_ending_conversation,
        newly_qualified,
    }
}

/// Last-non-empty-wins merge. A field, once set, is never cleared.
pub fn merge_customer_info(info: &mut CustomerInfo, response: &ExtractorResponse) {
    let fields = &response.extracted;
    merge_field(&mut info.name, &fields.name);
    merge_field(&mut info.email, &fields.email);
    merge_field(&mut info.phone, &fields.phone);
    merge_field(&mut info.company, &fields.company);
    merge_field(&mut info.industry, &fields.industry);
    merge_field(&mut info.company_size, &fields.company_size);
    merge_field(&mut info.role, &fields.role);
    merge_field(&mut info.budget, &fields.budget);
    merge_field(&mut info.timeline, &fields.timeline);
    merge_field(&mut info.intent_type, &response.intent_type);
    merge_field(&mut info.opportunity_summary, &response.opportunity_summary);

    let challenges: Vec<String> = fields
        .challenges
        .iter()
        .filter_map(|c| normalize_text(c))
        .collect();
    if !challenges.is_empty() {
        info.current_challenges = challenges;
    }
}

fn merge_field(target: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming.as_deref().and_then(normalize_text) {
        *target = Some(value);
    }
}
