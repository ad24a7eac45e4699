//! Language model access
//!
//! The turn runner only sees [`LanguageModel`]: a request with history and
//! tool definitions in, a stream of [`ModelEvent`]s out. Providers live in
//! submodules.

pub mod openai;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tools::ToolDefinition;

pub use openai::OpenAiCompatibleModel;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),

    #[error("Model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model stream read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed model chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A tool call as recorded in the model history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument text
    pub arguments: String,
}

/// A message in the model's conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ModelToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFinish {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

/// Incremental output of one model step
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    /// Arguments are complete
    ToolCallEnd(ModelToolCall),
    Finish(ModelFinish),
}

pub type ModelStream = BoxStream<'static, Result<ModelEvent, ModelError>>;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Stream one step. The stream ends after `ModelEvent::Finish`.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError>;
}
