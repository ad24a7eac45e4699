//! Conversation stream controller
//!
//! Client side of the chat stream: submits the conversation with the live
//! document, folds the response into the assistant message, hands ready tool
//! calls to the bridge, and resubmits on its own while the model is still
//! working through tool calls.

use std::sync::Arc;

use futures_util::StreamExt;
use propal_types::{ChatRequest, FinishReason, Role, StreamEvent, UiMessage};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::message::{apply_event, tool_calls_settled};
use super::transport::{ChatTransport, TransportError};
use crate::actors::DocumentHandle;
use crate::bridge::{CallResult, ToolCallBridge};
use crate::document::to_html;
use crate::tools::ToolRegistry;

/// Matches the server's default step cap
pub const DEFAULT_MAX_AUTO_CONTINUATIONS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Submitted,
    Streaming,
    Error(String),
}

impl ChatStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("A response is already in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Stream failed: {0}")]
    Stream(String),
}

/// What happened during one `send`, continuations included
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub finish_reason: Option<FinishReason>,
    pub continuations: usize,
    pub cancelled: bool,
    pub tool_calls: Vec<CallResult>,
}

/// What observers read while a turn is running
struct Transcript {
    messages: Vec<UiMessage>,
    session_id: Option<String>,
}

pub struct ConversationController {
    transport: Arc<dyn ChatTransport>,
    document: Arc<dyn DocumentHandle>,
    status: watch::Sender<ChatStatus>,
    /// Locked only while a single event is folded in
    transcript: Mutex<Transcript>,
    /// Held for the whole turn; the busy status admits one turn at a time
    bridge: Mutex<ToolCallBridge>,
    max_auto_continuations: usize,
}

impl ConversationController {
    pub fn new(transport: Arc<dyn ChatTransport>, document: Arc<dyn DocumentHandle>) -> Self {
        let bridge = ToolCallBridge::new(ToolRegistry::for_editor(document.clone()));
        let (status, _) = watch::channel(ChatStatus::Idle);
        Self {
            transport,
            document,
            status,
            transcript: Mutex::new(Transcript {
                messages: Vec::new(),
                session_id: None,
            }),
            bridge: Mutex::new(bridge),
            max_auto_continuations: DEFAULT_MAX_AUTO_CONTINUATIONS,
        }
    }

    pub fn with_max_auto_continuations(mut self, max: usize) -> Self {
        self.max_auto_continuations = max;
        self
    }

    pub fn status(&self) -> ChatStatus {
        self.status.borrow().clone()
    }

    /// Follow status changes, e.g. to render a spinner
    pub fn subscribe(&self) -> watch::Receiver<ChatStatus> {
        self.status.subscribe()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.transcript.lock().await.session_id.clone()
    }

    /// Current messages, including the parts streamed so far
    pub async fn messages(&self) -> Vec<UiMessage> {
        self.transcript.lock().await.messages.clone()
    }

    pub async fn send(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        self.send_with_cancel(text, CancellationToken::new()).await
    }

    /// Submit a user message. Rejected while a response is in progress;
    /// cancelling `cancel` stops the stream but keeps applied mutations.
    pub async fn send_with_cancel(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let accepted = self.status.send_if_modified(|status| {
            if status.is_busy() {
                false
            } else {
                *status = ChatStatus::Submitted;
                true
            }
        });
        if !accepted {
            return Err(ChatError::Busy);
        }

        self.transcript
            .lock()
            .await
            .messages
            .push(UiMessage::user(ulid::Ulid::new().to_string(), text));

        let mut bridge = self.bridge.lock().await;
        let result = self.run(&mut bridge, &cancel).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    finish_reason = ?outcome.finish_reason,
                    continuations = outcome.continuations,
                    tool_calls = outcome.tool_calls.len(),
                    cancelled = outcome.cancelled,
                    "Turn complete"
                );
                self.status.send_replace(ChatStatus::Idle);
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                self.status.send_replace(ChatStatus::Error(e.to_string()));
            }
        }
        result
    }

    async fn run(
        &self,
        bridge: &mut ToolCallBridge,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let mut outcome = TurnOutcome::default();

        loop {
            self.status.send_replace(ChatStatus::Submitted);
            let request = self.build_request().await;

            let mut events = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    return Ok(outcome);
                }
                events = self.transport.send(request) => events?,
            };

            open_assistant_message(&mut self.transcript.lock().await.messages);

            let finish = loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Stream cancelled by user");
                        outcome.cancelled = true;
                        return Ok(outcome);
                    }
                    next = events.next() => next,
                };
                let Some(event) = next else {
                    return Err(ChatError::Stream(
                        "Stream ended before the turn finished".to_string(),
                    ));
                };
                let event = event.map_err(|e| ChatError::Stream(e.to_string()))?;

                self.status.send_if_modified(|status| {
                    if *status == ChatStatus::Submitted {
                        *status = ChatStatus::Streaming;
                        true
                    } else {
                        false
                    }
                });

                let mut transcript = self.transcript.lock().await;
                match &event {
                    StreamEvent::Session { session_id: id } => {
                        if transcript.session_id.as_deref() != Some(id.as_str()) {
                            tracing::debug!(session_id = %id, "Session established");
                            transcript.session_id = Some(id.clone());
                        }
                    }
                    StreamEvent::Error { error_text } => {
                        return Err(ChatError::Stream(error_text.clone()));
                    }
                    StreamEvent::Finish { finish_reason } => break *finish_reason,
                    StreamEvent::ToolInputAvailable { .. } => {
                        bridge.track(&event);
                        let message = open_assistant_message(&mut transcript.messages);
                        apply_event(message, &event);
                        outcome.tool_calls.extend(bridge.process(message).await);
                    }
                    _ => {
                        bridge.track(&event);
                        apply_event(open_assistant_message(&mut transcript.messages), &event);
                    }
                }
            };

            outcome.finish_reason = Some(finish);
            let settled = {
                let mut transcript = self.transcript.lock().await;
                tool_calls_settled(open_assistant_message(&mut transcript.messages))
            };
            if finish != FinishReason::ToolCalls || !settled {
                break;
            }
            if outcome.continuations >= self.max_auto_continuations {
                tracing::warn!(
                    continuations = outcome.continuations,
                    "Auto-continuation limit reached"
                );
                break;
            }
            outcome.continuations += 1;
            tracing::debug!(continuation = outcome.continuations, "Resubmitting with tool results");
        }

        Ok(outcome)
    }

    async fn build_request(&self) -> ChatRequest {
        let document_content = match self.document.snapshot().await {
            Ok(snapshot) => snapshot.map(|snapshot| to_html(&snapshot.document)),
            Err(e) => {
                tracing::warn!(error = %e, "Sending request without document context");
                None
            }
        };
        let transcript = self.transcript.lock().await;
        ChatRequest {
            messages: transcript.messages.clone(),
            session_id: transcript.session_id.clone(),
            document_content,
        }
    }
}

/// The assistant message the next stream writes into: the last message when
/// it is a continued assistant turn, a fresh one otherwise.
fn open_assistant_message(messages: &mut Vec<UiMessage>) -> &mut UiMessage {
    if messages.last().map(|m| m.role) != Some(Role::Assistant) {
        messages.push(UiMessage::new(ulid::Ulid::new().to_string(), Role::Assistant));
    }
    let last = messages.len() - 1;
    &mut messages[last]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(ChatStatus::Submitted.is_busy());
        assert!(ChatStatus::Streaming.is_busy());
        assert!(!ChatStatus::Idle.is_busy());
        assert!(!ChatStatus::Error("x".into()).is_busy());
    }

    #[test]
    fn test_continuation_reuses_assistant_message() {
        let mut messages = vec![UiMessage::user("u1", "hi")];
        open_assistant_message(&mut messages).id = "a1".into();
        assert_eq!(messages.len(), 2);
        assert_eq!(open_assistant_message(&mut messages).id, "a1");
        assert_eq!(messages.len(), 2);
    }
}
