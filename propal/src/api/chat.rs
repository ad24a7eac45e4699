//! Streaming chat endpoint

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream};
use propal_types::{ChatRequest, StreamEvent};
use tokio::sync::mpsc;

use super::{api_error, ApiErrorCode, ApiState};
use crate::agent::TurnRequest;
use crate::tools::{catalog, ToolDefinition};

const EVENT_BUFFER: usize = 64;

/// POST /chat - run one assistant turn and stream it back
pub async fn stream_chat(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            return api_error(ApiErrorCode::InvalidInput, rejection.body_text());
        }
    };
    if request.messages.is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "messages must not be empty");
    }

    let app_state = state.app_state.clone();
    let session = app_state.begin_turn(request.session_id.as_deref()).await;
    tracing::info!(
        session_id = %session.session_id,
        turn = session.turns,
        messages = request.messages.len(),
        has_document = request.document_content.is_some(),
        "Chat turn started"
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let runner = app_state.turn_runner();
    let turn = TurnRequest {
        session_id: session.session_id,
        messages: request.messages,
        document_content: request.document_content,
    };
    tokio::spawn(async move {
        runner.run(turn, tx).await;
    });

    Sse::new(event_stream(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

/// One `data:` line per event until the turn's sender is dropped
fn event_stream(rx: mpsc::Receiver<StreamEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            let event = rx.recv().await?;
            match serde_json::to_string(&event) {
                Ok(json) => return Some((Ok(Event::default().data(json)), rx)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize stream event");
                }
            }
        }
    })
}

/// GET /tools - definitions advertised to the model
pub async fn list_tools() -> impl IntoResponse {
    Json::<Vec<ToolDefinition>>(catalog())
}
