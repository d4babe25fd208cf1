//! HTTP API gateway for RepairKit.
//!
//! Serves the repair pipeline over REST with Server-Sent Events for chat,
//! plus session history and usage accounting. Every `/api` route except
//! `/api/status` requires a bearer token.
//!
//! Built on Axum.

pub mod api;
pub mod auth;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    middleware,
    response::Json,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use repairkit_agent::{ContextBudget, RepairPipeline, TokenCounter};
use repairkit_config::AppConfig;
use repairkit_core::auth::TokenVerifier;
use repairkit_core::store::SessionStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Request bodies above this size are rejected.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: RepairPipeline,
    pub store: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub budget: ContextBudget,
    pub start_time: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: AppConfig,
        pipeline: RepairPipeline,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let counter = TokenCounter::from_optional_path(config.context.tokenizer_path.as_deref());
        let budget = ContextBudget::from_config(&config.context).with_counter(counter);
        Self {
            config,
            pipeline,
            store,
            verifier,
            budget,
            start_time: Utc::now(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Bearer token authentication on the protected `/api` routes
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route(
            "/api/sessions",
            post(api::create_session_handler).get(api::list_sessions_handler),
        )
        .route("/api/sessions/{id}", delete(api::delete_session_handler))
        .route("/api/sessions/{id}/messages", get(api::list_messages_handler))
        .route("/api/chat/stream", post(api::chat_stream_handler))
        .route("/api/usage", get(api::usage_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(api::status_handler))
        .merge(protected)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds the provider chain, knowledge sources, store and verifier once
/// and shares them across requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let providers = repairkit_providers::router::build_from_config(&config);
    let provider = providers
        .primary()
        .ok_or("no default provider configured; set an API key")?;
    let catalog = repairkit_sources::build_catalog(&config);
    let searchers = repairkit_sources::build_searchers(&config);
    let pipeline = RepairPipeline::from_config(&config, provider, catalog, searchers);

    let store = repairkit_store::open(&config.store).await?;
    let verifier = auth::build_verifier(&config);

    let state = Arc::new(AppState::new(config, pipeline, store, verifier));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MessagesResponse, SessionListResponse, StatusResponse, UsageResponse};
    use crate::auth::StaticTokenVerifier;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use repairkit_core::catalog::{DeviceCatalog, DeviceHit, GuideDetail, GuideSummary};
    use repairkit_core::error::{CatalogError, ProviderError};
    use repairkit_core::message::{Message, Role};
    use repairkit_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use repairkit_core::store::Session;
    use repairkit_store::InMemoryStore;
    use std::collections::HashMap;
    use tower::ServiceExt;

    /// Answers every request with the same text.
    struct FixedProvider(&'static str);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.0),
                usage: None,
                model: request.model,
            })
        }
    }

    struct EmptyCatalog;

    #[async_trait]
    impl DeviceCatalog for EmptyCatalog {
        fn name(&self) -> &str {
            "empty"
        }

        async fn search_devices(&self, _query: &str) -> Result<Vec<DeviceHit>, CatalogError> {
            Ok(vec![])
        }

        async fn list_guides(&self, _device_title: &str) -> Result<Vec<GuideSummary>, CatalogError> {
            Ok(vec![])
        }

        async fn search_guides(&self, _query: &str) -> Result<Vec<GuideSummary>, CatalogError> {
            Ok(vec![])
        }

        async fn fetch_guide(&self, guide_id: u64) -> Result<GuideDetail, CatalogError> {
            Err(CatalogError::NotFound(format!("guide {guide_id}")))
        }
    }

    fn test_state() -> SharedState {
        let pipeline = RepairPipeline::new(
            Arc::new(FixedProvider("Hello! I can help you fix things.")),
            "gemini-2.5-flash",
            Arc::new(EmptyCatalog),
        );
        let verifier = StaticTokenVerifier::new(HashMap::from([
            ("tok-alice".to_string(), "alice".to_string()),
            ("tok-bob".to_string(), "bob".to_string()),
        ]));
        Arc::new(AppState::new(
            AppConfig::default(),
            pipeline,
            Arc::new(InMemoryStore::new()),
            Arc::new(verifier),
        ))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());
        let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_is_public() {
        let app = build_router(test_state());
        let response = app.oneshot(request("GET", "/api/status", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let status: StatusResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(status.status, "healthy");
        assert_eq!(status.model, "gemini-2.5-flash");
        assert_eq!(status.store, "memory");
    }

    #[tokio::test]
    async fn sessions_require_a_token() {
        let app = build_router(test_state());
        let response = app
            .clone()
            .oneshot(request("GET", "/api/sessions", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request("GET", "/api/sessions", Some("tok-mallory"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_and_list_sessions() {
        let app = build_router(test_state());
        let response = app
            .clone()
            .oneshot(request("POST", "/api/sessions", Some("tok-alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Session = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(created.user_id, "alice");

        let response = app
            .oneshot(request("GET", "/api/sessions", Some("tok-alice"), None))
            .await
            .unwrap();
        let list: SessionListResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(list.sessions.len(), 1);
        assert_eq!(list.sessions[0].id, created.id);
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_owner() {
        let state = test_state();
        let session = state.store.create_session("alice").await.unwrap();
        let app = build_router(state);

        let uri = format!("/api/sessions/{}/messages", session.id);
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some("tok-bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let uri = format!("/api/sessions/{}", session.id);
        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some("tok-bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("DELETE", &uri, Some("tok-alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn chat_stream_runs_pipeline_and_persists() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/chat/stream",
                Some("tok-alice"),
                Some(serde_json::json!({ "message": "hi" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        assert!(content_type.contains("text/event-stream"));

        let body = String::from_utf8(body_bytes(response).await).unwrap();
        let session_pos = body.find("event: session").unwrap();
        let status_pos = body.find("event: status").unwrap();
        let answer_pos = body.find("event: answer").unwrap();
        let done_pos = body.find("event: done").unwrap();
        assert!(session_pos < status_pos && status_pos < answer_pos && answer_pos < done_pos);

        let sessions = state.store.list_sessions("alice").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].title.is_some());

        let messages = state.store.list_messages(&sessions[0].id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].content.contains("Hello!"));

        let response = app
            .clone()
            .oneshot(request("GET", "/api/usage", Some("tok-alice"), None))
            .await
            .unwrap();
        let usage: UsageResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(usage.totals.records, 1);
        assert!(usage.totals.input_tokens > 0);
        assert!(usage.totals.output_tokens > 0);

        let uri = format!("/api/sessions/{}/messages", sessions[0].id);
        let response = app
            .oneshot(request("GET", &uri, Some("tok-alice"), None))
            .await
            .unwrap();
        let history: MessagesResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(history.messages.len(), 2);
    }

    #[tokio::test]
    async fn chat_stream_continues_an_existing_session() {
        let state = test_state();
        let session = state.store.create_session("alice").await.unwrap();
        state.store.set_title(&session.id, "Earlier chat").await.unwrap();
        state
            .store
            .append_message(&session.id, Role::User, "hello")
            .await
            .unwrap();
        let app = build_router(state.clone());

        let response = app
            .oneshot(request(
                "POST",
                "/api/chat/stream",
                Some("tok-alice"),
                Some(serde_json::json!({ "message": "thanks!", "session_id": session.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains(&session.id));

        let stored = state.store.get_session(&session.id, "alice").await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Earlier chat"));
        assert_eq!(state.store.list_messages(&session.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn chat_stream_rejects_foreign_session_and_empty_message() {
        let state = test_state();
        let session = state.store.create_session("bob").await.unwrap();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/chat/stream",
                Some("tok-alice"),
                Some(serde_json::json!({ "message": "hi", "session_id": session.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(
                "POST",
                "/api/chat/stream",
                Some("tok-alice"),
                Some(serde_json::json!({ "message": "   " })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
