//! HTTP surface: webhook receivers for both platforms, the subscription
//! handshake, the reservation boundary, and a health probe.

use crate::channels::ChannelAdapter;
use crate::errors::ConciergeError;
use crate::orchestrator::{NEW_CONVERSATION_TAG, NewConversationRequest, Orchestrator};
use crate::reservations::{ReservationEngine, api};
use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub whatsapp: Arc<dyn ChannelAdapter>,
    pub telegram: Arc<dyn ChannelAdapter>,
    pub reservations: Arc<ReservationEngine>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/webhook/whatsapp",
            get(whatsapp_challenge_handler).post(whatsapp_webhook_handler),
        )
        .route("/webhook/telegram", post(telegram_webhook_handler))
        .route("/api/reservations", post(reservations_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let router = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("gateway listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

/// GET /webhook/whatsapp — platform verification handshake.
async fn whatsapp_challenge_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match state.whatsapp.handle_subscription_challenge(&params) {
        Some(challenge) => (StatusCode::OK, challenge),
        None => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
    }
}

async fn whatsapp_webhook_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    handle_delivery(&state.orchestrator, state.whatsapp.as_ref(), &payload).await
}

async fn telegram_webhook_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    handle_delivery(&state.orchestrator, state.telegram.as_ref(), &payload).await
}

/// Route one webhook delivery: the new-conversation directive bypasses
/// platform parsing, everything else is normalized and processed in payload
/// order.
async fn handle_delivery(
    orchestrator: &Orchestrator,
    adapter: &dyn ChannelAdapter,
    payload: &Value,
) -> (StatusCode, String) {
    if payload.get("object").and_then(Value::as_str) == Some(NEW_CONVERSATION_TAG) {
        let request: NewConversationRequest = match serde_json::from_value(payload.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!("bad new-conversation request: {}", err);
                return (StatusCode::BAD_REQUEST, "Bad request".to_string());
            }
        };
        return match orchestrator.start_conversation(&request, adapter).await {
            Ok(()) => (
                StatusCode::OK,
                "Conversation started with contact".to_string(),
            ),
            Err(err) => {
                error!("new conversation failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
    }

    let updates = match adapter.parse_webhook(payload).await {
        Ok(updates) => updates,
        Err(ConciergeError::MalformedPayload(detail)) => {
            warn!("{} webhook rejected: {}", adapter.name(), detail);
            return (StatusCode::BAD_REQUEST, "Bad request".to_string());
        }
        Err(ConciergeError::UnsupportedMessage(detail)) => {
            // Accept so the platform does not retry, but do nothing.
            warn!("{} webhook skipped: {}", adapter.name(), detail);
            return (StatusCode::OK, "Accepted".to_string());
        }
        Err(err) => {
            error!("{} webhook parsing failed: {}", adapter.name(), err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            );
        }
    };

    let mut failed = false;
    for update in &updates {
        match orchestrator.handle_update(update, adapter).await {
            Ok(()) => {}
            Err(err) if err.is_user_facing() => {
                // The user already got the apology; this is just the record.
                warn!("{} turn rejected: {}", adapter.name(), err);
            }
            Err(err) => {
                error!("{} turn failed: {}", adapter.name(), err);
                failed = true;
            }
        }
    }

    if failed {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        )
    } else {
        (StatusCode::OK, "Replied to the contact".to_string())
    }
}

/// POST /api/reservations — the availability/booking boundary the generative
/// flow calls.
async fn reservations_handler(
    State(state): State<AppState>,
    Json(request): Json<api::ReservationRequest>,
) -> impl IntoResponse {
    match api::handle(&state.reservations, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            error!("reservation boundary failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
