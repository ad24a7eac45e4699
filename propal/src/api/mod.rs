//! HTTP API for the proposal assistant
//!
//! `POST /chat` streams one assistant turn as server-sent events; the client
//! executes editor tool calls and resubmits.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub mod chat;

use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat::stream_chat))
        .route("/tools", get(chat::list_tools))
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "propal",
            "version": env!("CARGO_PKG_VERSION"),
            "model": state.app_state.model_id(),
        })),
    )
}

// ============================================================================
// Error responses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    InvalidInput,
}

impl ApiErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidInput => "INVALID_INPUT",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    code: String,
    message: String,
}

pub(crate) fn api_error(code: ApiErrorCode, message: impl Into<String>) -> axum::response::Response {
    let status = code.status_code();
    let body = Json(ApiErrorResponse {
        error: ApiErrorDetail {
            code: code.as_str().to_string(),
            message: message.into(),
        },
    });
    (status, body).into_response()
}
