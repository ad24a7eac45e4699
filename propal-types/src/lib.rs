//! Chat wire types shared between the proposal editor and the assistant backend
//!
//! These types are used by both:
//! - the assistant server (turn runner, SSE encoder)
//! - the editor client (conversation controller, tool-call bridge)
//!
//! Serializable with serde for JSON over HTTP/SSE. TypeScript bindings are
//! exported with ts-rs so the browser editor speaks the same contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

// ============================================================================
// Messages
// ============================================================================

/// Author of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of the conversation as rendered by the chat panel.
///
/// Assistant messages are built incrementally from [`StreamEvent`]s; their
/// tool parts carry the lifecycle state of every tool call issued in the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub struct UiMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut message = Self::new(id, Role::User);
        message.parts.push(MessagePart::Text { text: text.into() });
        message
    }

    /// Concatenated text parts, reasoning excluded.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_parts(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::Tool(call) => Some(call),
            _ => None,
        })
    }

    pub fn tool_part_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolCallPart> {
        self.parts.iter_mut().find_map(|part| match part {
            MessagePart::Tool(call) if call.tool_call_id == tool_call_id => Some(call),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
        state: PartState,
    },
    /// Boundary between two model steps of the same turn
    StepStart,
    Tool(ToolCallPart),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum PartState {
    Streaming,
    Done,
}

// ============================================================================
// Tool calls
// ============================================================================

/// Lifecycle of a single tool call, keyed by its call identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum ToolCallState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolCallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::OutputAvailable | Self::OutputError)
    }
}

/// Class of a tool failure: rejected before dispatch, or failed while running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum ToolErrorKind {
    InputValidation,
    Execution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolCallState,
    /// Raw argument text accumulated while the input is streaming
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input_text: String,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolCallPart {
    pub fn streaming(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: ToolCallState::InputStreaming,
            input_text: String::new(),
            input: Value::Null,
            output: None,
            error_text: None,
            error_kind: None,
        }
    }
}

// ============================================================================
// Streaming protocol
// ============================================================================

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub session_id: Option<String>,
    /// HTML snapshot of the live document, sent as model context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub document_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

/// One server-sent event of an assistant turn.
///
/// The first event of every stream is [`StreamEvent::Session`]; it is
/// transient metadata and never becomes a message part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "../../web/src/types/chat.generated.ts")]
pub enum StreamEvent {
    #[serde(rename = "data-session", rename_all = "camelCase")]
    Session { session_id: String },
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    FinishStep,
    TextDelta { delta: String },
    ReasoningDelta { delta: String },
    ReasoningEnd,
    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        #[ts(type = "unknown")]
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        #[ts(type = "unknown")]
        output: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        kind: ToolErrorKind,
    },
    #[serde(rename_all = "camelCase")]
    Finish { finish_reason: FinishReason },
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl StreamEvent {
    /// Whether the stream ends after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}
