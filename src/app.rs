use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::agent::{process_turn, TurnOutcome};
use crate::config::AppConfig;
use crate::email::{render_notification_html, render_notification_text};
use crate::error::ApiError;
use crate::extractor::Extractor;
use crate::notification::build_notification;
use crate::types::ConversationState;

/// Sessions are locked individually so turns for one session run in order
/// while other sessions proceed.
pub struct AppState {
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
    extractor: Extractor,
    sales_team_email: String,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            extractor: Extractor::new(config.llm.clone()),
            sales_team_email: config.sales_team_email.clone(),
        }
    }

    async fn insert(&self, session: ConversationState) {
        let id = session.session_id.clone();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
    }

    async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    async fn session(&self, session_id: &str) -> Result<Arc<Mutex<ConversationState>>, ApiError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageBody {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationQuery {
    format: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn post_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = ConversationState::new(Uuid::new_v4().to_string(), Utc::now());
    let body = json!({ "id": session.session_id, "state": session });
    info!(session_id = %session.session_id, "session created");
    state.insert(session).await;
    (StatusCode::CREATED, Json(body))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    let session = state.session(&session_id).await?;
    let snapshot = session.lock().await.clone();
    Ok(Json(snapshot))
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let session = state.session(&session_id).await?;
    let mut guard = session.lock().await;
    let outcome = process_turn(&mut guard, &body.text, &state.extractor, Utc::now()).await?;
    Ok(Json(outcome))
}

async fn post_handover(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    let session = state.session(&session_id).await?;
    let mut guard = session.lock().await;
    if !guard.request_human() {
        return Err(ApiError::Conflict("session_not_gathering"));
    }
    info!(session_id = %session_id, "human handover requested");
    Ok(Json(guard.clone()))
}

async fn post_abandon(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    let session = state.session(&session_id).await?;
    let snapshot = {
        let mut guard = session.lock().await;
        if !guard.abandon() {
            return Err(ApiError::Conflict("session_not_gathering"));
        }
        guard.clone()
    };
    state.remove(&session_id).await;
    info!(session_id = %session_id, "session abandoned and evicted");
    Ok(Json(snapshot))
}

async fn get_notification(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<NotificationQuery>,
) -> Result<Response, ApiError> {
    let session = state.session(&session_id).await?;
    let guard = session.lock().await;
    let schema = build_notification(&guard, Utc::now(), &state.sales_team_email)
        .ok_or(ApiError::Conflict("not_qualified"))?;

    if query.format.as_deref() == Some("text") {
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            render_notification_text(&schema),
        )
            .into_response());
    }
    Ok(Html(render_notification_html(&schema)).into_response())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", post(post_session))
        .route("/api/session/{session_id}", get(get_session))
        .route("/api/session/{session_id}/message", post(post_message))
        .route("/api/session/{session_id}/handover", post(post_handover))
        .route("/api/session/{session_id}/abandon", post(post_abandon))
        .route("/api/session/{session_id}/notification", get(get_notification))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run() {
    let config = AppConfig::load();
    if !config.llm.is_configured() {
        tracing::warn!("LLM_ENDPOINT/LLM_API_KEY not set; every turn will use the default reply");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(&config));
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind TCP listener");

    info!("lead qualifier running at http://localhost:{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failure");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::scoring::score_lead;
    use crate::types::{ConversationStatus, CustomerInfo, ExtractedFields, MessageRole};
    use serde_json::Value;

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            sales_team_email: "sales@example.com".to_string(),
            llm: LlmConfig::default(),
        }
    }

    async fn spawn_app() -> (String, Arc<AppState>) {
        let state = Arc::new(AppState::new(&test_config()));
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), state)
    }

    async fn create_session(client: &reqwest::Client, base: &str) -> String {
        let response = client
            .post(format!("{base}/api/session"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn message_round_trip_uses_default_reply_when_unconfigured() {
        let (base, _) = spawn_app().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let response = client
            .post(format!("{base}/api/session/{id}/message"))
            .json(&json!({ "text": "Hi, I'm Dana from Acme Mutual" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let outcome: Value = response.json().await.unwrap();
        assert_eq!(outcome["status"], "gathering");
        assert_eq!(outcome["nextAction"], "continue");
        assert_eq!(outcome["handoverRequested"], false);

        let state: Value = client
            .get(format!("{base}/api/session/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["messages"].as_array().unwrap().len(), 2);
        assert_eq!(state["messages"][0]["role"], "human");
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let (base, _) = spawn_app().await;
        let client = reqwest::Client::new();

        let missing = client
            .get(format!("{base}/api/session/nope"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "session_not_found");

        let id = create_session(&client, &base).await;
        let blank = client
            .post(format!("{base}/api/session/{id}/message"))
            .json(&json!({ "text": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(blank.status(), reqwest::StatusCode::BAD_REQUEST);

        let not_ready = client
            .get(format!("{base}/api/session/{id}/notification"))
            .send()
            .await
            .unwrap();
        assert_eq!(not_ready.status(), reqwest::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn handover_then_abandon_conflicts() {
        let (base, _) = spawn_app().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let handover = client
            .post(format!("{base}/api/session/{id}/handover"))
            .send()
            .await
            .unwrap();
        assert!(handover.status().is_success());
        let state: Value = handover.json().await.unwrap();
        assert_eq!(state["conversationStatus"], "human_requested");

        let abandon = client
            .post(format!("{base}/api/session/{id}/abandon"))
            .send()
            .await
            .unwrap();
        assert_eq!(abandon.status(), reqwest::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn abandoned_session_is_evicted() {
        let (base, state) = spawn_app().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let abandon = client
            .post(format!("{base}/api/session/{id}/abandon"))
            .send()
            .await
            .unwrap();
        assert!(abandon.status().is_success());
        let body: Value = abandon.json().await.unwrap();
        assert_eq!(body["conversationStatus"], "abandoned");
        assert!(state.sessions.read().await.get(&id).is_none());

        let message = client
            .post(format!("{base}/api/session/{id}/message"))
            .json(&json!({ "text": "hello again" }))
            .send()
            .await
            .unwrap();
        assert_eq!(message.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn qualified_session_serves_notification() {
        let (base, state) = spawn_app().await;
        let now = Utc::now();
        let mut session = ConversationState::new("qualified-1", now);
        session.push_message(MessageRole::Human, "Budget is $500k, go-live in 2 months", now);
        let fields = ExtractedFields {
            name: Some("Dana Ruiz".to_string()),
            email: Some("dana@acmemutual.com".to_string()),
            company: Some("Acme Mutual".to_string()),
            challenges: vec!["FNOL reports are re-keyed by hand".to_string()],
            budget: Some("$500k".to_string()),
            timeline: Some("2 months".to_string()),
            ..ExtractedFields::default()
        };
        session.customer_info = CustomerInfo {
            name: fields.name.clone(),
            email: fields.email.clone(),
            company: fields.company.clone(),
            ..CustomerInfo::default()
        };
        session.qualification = Some(score_lead(&fields));
        session.conversation_status = ConversationStatus::Completed;
        state.insert(session).await;

        let client = reqwest::Client::new();
        let html = client
            .get(format!("{base}/api/session/qualified-1/notification"))
            .send()
            .await
            .unwrap();
        assert!(html.status().is_success());
        let content_type = html.headers()[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/html"));
        let body = html.text().await.unwrap();
        assert!(body.contains("New qualified lead: Acme Mutual"));

        let text = client
            .get(format!("{base}/api/session/qualified-1/notification?format=text"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(text.contains("Email: dana@acmemutual.com"));
    }
}
