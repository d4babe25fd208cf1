//! REST and SSE handlers.
//!
//! Endpoints:
//!
//! - `GET    /api/status`                 : Service status (public)
//! - `POST   /api/sessions`               : Create a chat session
//! - `GET    /api/sessions`               : List the caller's sessions
//! - `GET    /api/sessions/{id}/messages` : Messages of one session
//! - `DELETE /api/sessions/{id}`          : Delete a session
//! - `POST   /api/chat/stream`            : Ask a question, receive an SSE stream
//! - `GET    /api/usage`                  : Token usage and estimated cost

use crate::SharedState;
use crate::error::{ApiError, ApiResult};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use chrono::Utc;
use repairkit_agent::{PipelineEvent, PipelineState, TokenCounter, estimate_cost};
use repairkit_core::auth::Caller;
use repairkit_core::message::{Message, Role};
use repairkit_core::store::{Session, SessionStore, StoredMessage, UsageRecord, UsageTotals};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Existing session (omit to start a new one).
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub session_id: String,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub totals: UsageTotals,
    pub model: String,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub model: String,
    pub store: String,
    pub tokenizer: String,
    pub uptime_secs: i64,
}

// ── Status ────────────────────────────────────────────────────────────────

pub async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        environment: state.config.environment.clone(),
        model: state.pipeline.model().to_string(),
        store: state.store.name().to_string(),
        tokenizer: if state.budget.counter().is_exact() {
            "exact".into()
        } else {
            "estimate".into()
        },
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}

// ── Sessions ──────────────────────────────────────────────────────────────

pub async fn create_session_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.store.create_session(&caller.user_id).await?;
    info!(session_id = %session.id, user_id = %caller.user_id, "Session created");
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state.store.list_sessions(&caller.user_id).await?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn owned_session(state: &SharedState, session_id: &str, caller: &Caller) -> ApiResult<Session> {
    state
        .store
        .get_session(session_id, &caller.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))
}

pub async fn list_messages_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<MessagesResponse>> {
    owned_session(&state, &session_id, &caller).await?;
    let messages = state.store.list_messages(&session_id).await?;
    Ok(Json(MessagesResponse {
        session_id,
        messages,
    }))
}

pub async fn delete_session_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_session(&session_id, &caller.user_id).await? {
        info!(session_id = %session_id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {session_id}")))
    }
}

// ── Usage ─────────────────────────────────────────────────────────────────

pub async fn usage_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UsageResponse>> {
    let totals = state.store.usage_totals(&caller.user_id).await?;
    let model = state.pipeline.model().to_string();
    let estimated_cost_usd = estimate_cost(totals.total_tokens, &model);
    Ok(Json(UsageResponse {
        user_id: caller.user_id,
        totals,
        model,
        estimated_cost_usd,
    }))
}

// ── Chat (SSE) ────────────────────────────────────────────────────────────

fn to_message(stored: StoredMessage) -> Message {
    match stored.role {
        Role::User => Message::user(stored.content),
        Role::Assistant => Message::assistant(stored.content),
        Role::System => Message::system(stored.content),
    }
}

fn to_sse(event: &PipelineEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

/// What the forwarder needs to persist a finished exchange.
struct Exchange {
    store: Arc<dyn SessionStore>,
    counter: TokenCounter,
    user_id: String,
    session_id: String,
    input_tokens: u32,
}

impl Exchange {
    async fn persist_answer(&self, answer: &str) {
        if let Err(e) = self
            .store
            .append_message(&self.session_id, Role::Assistant, answer)
            .await
        {
            warn!(session_id = %self.session_id, error = %e, "Failed to save answer");
            return;
        }

        let record = UsageRecord {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            input_tokens: self.input_tokens,
            output_tokens: u32::try_from(self.counter.count(answer)).unwrap_or(u32::MAX),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.record_usage(record).await {
            warn!(session_id = %self.session_id, error = %e, "Failed to record usage");
        }
    }
}

/// `POST /api/chat/stream`
///
/// The first SSE event is `session` with the session id, followed by the
/// pipeline's `status`* → `answer` | `error` → `done`.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let session = match &payload.session_id {
        Some(id) => owned_session(&state, id, &caller).await?,
        None => state.store.create_session(&caller.user_id).await?,
    };

    let previous = state.store.list_messages(&session.id).await?;
    state
        .store
        .append_message(&session.id, Role::User, &message)
        .await?;

    if previous.is_empty() && session.title.is_none() {
        let title = state.pipeline.generate_title(&message).await;
        if let Err(e) = state.store.set_title(&session.id, &title).await {
            warn!(session_id = %session.id, error = %e, "Failed to set session title");
        }
    }

    let history = state
        .budget
        .manage(&previous.into_iter().map(to_message).collect::<Vec<_>>());

    let counter = state.budget.counter().clone();
    let mut prompt = history.clone();
    prompt.push(Message::user(message.as_str()));
    let input_tokens = u32::try_from(counter.count_messages(&prompt)).unwrap_or(u32::MAX);

    info!(
        session_id = %session.id,
        user_id = %caller.user_id,
        history = history.len(),
        input_tokens,
        "Chat request"
    );

    let run = PipelineState::new(message, history).with_caller(&caller.user_id, &session.id);
    let mut events = state.pipeline.run_stream(run);

    let exchange = Exchange {
        store: state.store.clone(),
        counter,
        user_id: caller.user_id,
        session_id: session.id,
        input_tokens,
    };

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let opening = SseEvent::default()
            .event("session")
            .data(serde_json::json!({ "session_id": exchange.session_id }).to_string());
        if tx.send(Ok(opening)).await.is_err() {
            return;
        }

        while let Some(event) = events.recv().await {
            if let PipelineEvent::Answer { text } = &event {
                exchange.persist_answer(text).await;
            }
            if tx.send(Ok(to_sse(&event))).await.is_err() {
                info!(session_id = %exchange.session_id, "Client disconnected from stream");
                break;
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
