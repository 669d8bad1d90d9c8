//! A scripted stand-in for a chat-completions endpoint.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ScriptedReply {
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
}

impl ScriptedReply {
    pub fn ok(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Wraps `content` in a chat-completions response envelope.
pub fn completion_body(content: &str) -> String {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub api_key: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

pub struct CompletionServer {
    pub url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CompletionServer {
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().await.clone()
    }
}

struct MockState {
    replies: Mutex<VecDeque<ScriptedReply>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub async fn spawn_completion_server(replies: Vec<ScriptedReply>) -> CompletionServer {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::new(MockState {
        replies: Mutex::new(replies.into()),
        recorded: recorded.clone(),
    });
    let app = Router::new()
        .route("/chat/completions", post(handle_completion))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    CompletionServer {
        url: format!("http://{addr}/chat/completions"),
        recorded,
    }
}

async fn handle_completion(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state.recorded.lock().await.push(RecordedRequest {
        api_key: header_text("api-key"),
        authorization: header_text("authorization"),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });

    let Some(reply) = state.replies.lock().await.pop_front() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no scripted reply left").into_response();
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (
        reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response()
}
