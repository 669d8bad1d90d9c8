use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::error::ApiError;
use crate::evaluator::{evaluate, Evaluation};
use crate::extractor::Extractor;
use crate::types::{
    ConversationState, ConversationStatus, CustomerInfo, MessageRole, NextAction, Qualification,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("session was abandoned")]
    Abandoned,
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::EmptyMessage => ApiError::BadRequest("empty_message"),
            TurnError::Abandoned => ApiError::Conflict("session_abandoned"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub status: ConversationStatus,
    pub next_action: NextAction,
    pub missing_info: Vec<String>,
    pub missing_gates: Vec<&'static str>,
    pub customer_info: CustomerInfo,
    pub qualification: Option<Qualification>,
    pub newly_qualified: bool,
    pub handover_requested: bool,
}

fn handover_regex() -> Option<&'static Regex> {
    static HANDOVER: OnceLock<Option<Regex>> = OnceLock::new();
    HANDOVER
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(human|real person|representative|live agent|sales rep|talk to someone|speak to someone|call me back|give me a call)\b",
            )
            .ok()
        })
        .as_ref()
}

pub fn has_handover_intent(text: &str) -> bool {
    handover_regex().is_some_and(|re| re.is_match(text))
}

/// Runs one chat turn: append the user message, extract, evaluate, reply.
///
/// Callers must serialise turns for the same session.
pub async fn process_turn(
    state: &mut ConversationState,
    user_text: &str,
    extractor: &Extractor,
    now: DateTime<Utc>,
) -> Result<TurnOutcome, TurnError> {
    let text = user_text.trim();
    if text.is_empty() {
        return Err(TurnError::EmptyMessage);
    }
    if state.conversation_status == ConversationStatus::Abandoned {
        return Err(TurnError::Abandoned);
    }

    state.push_message(MessageRole::Human, text, now);
    let response = extractor.extract(state).await;

    let Evaluation {
        state: next,
        response,
        gates,
        depth,
        newly_qualified,
        ..
    } = evaluate(state, response);
    *state = next;
    state.push_message(MessageRole::Ai, &response.message, now);

    info!(
        session_id = %state.session_id,
        depth,
        gates_met = gates.satisfied(),
        status = state.conversation_status.as_str(),
        "turn processed"
    );

    Ok(TurnOutcome {
        session_id: state.session_id.clone(),
        reply: response.message,
        status: state.conversation_status,
        next_action: response.next_action,
        missing_info: response.missing_info,
        missing_gates: gates.missing(),
        customer_info: state.customer_info.clone(),
        qualification: state.qualification.clone(),
        newly_qualified,
        handover_requested: has_handover_intent(text),
    })
}
