//! OpenAI-compatible `/chat/completions` streaming client.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    LanguageModel, ModelError, ModelEvent, ModelFinish, ModelMessage, ModelRequest, ModelStream,
    ModelToolCall,
};
use crate::sse;

pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleModel {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Read the key from `api_key_env`.
    pub fn from_env(base_url: &str, model: &str, api_key_env: &str) -> Result<Self, ModelError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(base_url, model, api_key))
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

fn wire_message(message: &ModelMessage) -> Value {
    match message {
        ModelMessage::System { content } => json!({"role": "system", "content": content}),
        ModelMessage::User { content } => json!({"role": "user", "content": content}),
        ModelMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut wire = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                wire["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {"name": call.name, "arguments": call.arguments},
                        })
                    })
                    .collect();
            }
            wire
        }
        ModelMessage::Tool {
            tool_call_id,
            content,
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Starting model step"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_stream(sse::response_payloads(response)))
    }
}

// ============================================================================
// Chunk decoding
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    started: bool,
}

/// Turns provider chunks into model events; tool calls are keyed by their
/// `index` because only the first delta carries the id and name.
#[derive(Debug, Default)]
struct ChunkDecoder {
    calls: BTreeMap<u32, PartialCall>,
    finished: bool,
}

impl ChunkDecoder {
    fn decode(&mut self, chunk: CompletionChunk) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                if !reasoning.is_empty() {
                    events.push(ModelEvent::ReasoningDelta(reasoning));
                }
            }
            if let Some(content) = delta.content {
                if !content.is_empty() {
                    events.push(ModelEvent::TextDelta(content));
                }
            }
            for call in delta.tool_calls {
                self.decode_call(call, &mut events);
            }
            if let Some(reason) = choice.finish_reason {
                events.extend(self.finish(Some(&reason)));
            }
        }
        events
    }

    fn decode_call(&mut self, delta: ToolCallDelta, events: &mut Vec<ModelEvent>) {
        let partial = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            partial.id.get_or_insert(id);
        }
        let mut arguments = String::new();
        if let Some(function) = delta.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                partial.name.get_or_insert(name);
            }
            arguments = function.arguments.unwrap_or_default();
        }
        partial.arguments.push_str(&arguments);

        match (&partial.id, &partial.name) {
            (Some(id), Some(name)) if !partial.started => {
                partial.started = true;
                events.push(ModelEvent::ToolCallStart {
                    id: id.clone(),
                    name: name.clone(),
                });
                if !partial.arguments.is_empty() {
                    events.push(ModelEvent::ToolCallDelta {
                        id: id.clone(),
                        arguments: partial.arguments.clone(),
                    });
                }
            }
            (Some(id), Some(_)) if !arguments.is_empty() => {
                events.push(ModelEvent::ToolCallDelta {
                    id: id.clone(),
                    arguments,
                });
            }
            _ => {}
        }
    }

    /// Close open tool calls and emit the finish event, once.
    fn finish(&mut self, reason: Option<&str>) -> Vec<ModelEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        let calls = std::mem::take(&mut self.calls);
        let had_calls = !calls.is_empty();
        for (index, call) in calls {
            match (call.id, call.name) {
                (Some(id), Some(name)) => events.push(ModelEvent::ToolCallEnd(ModelToolCall {
                    id,
                    name,
                    arguments: call.arguments,
                })),
                _ => tracing::warn!(index, "Dropping tool call without id or name"),
            }
        }

        let finish = match reason {
            Some("length") => ModelFinish::Length,
            Some("content_filter") => ModelFinish::ContentFilter,
            Some("tool_calls") | Some("function_call") => ModelFinish::ToolCalls,
            _ if had_calls => ModelFinish::ToolCalls,
            _ => ModelFinish::Stop,
        };
        events.push(ModelEvent::Finish(finish));
        events
    }
}

fn decode_stream(payloads: BoxStream<'static, Result<String, std::io::Error>>) -> ModelStream {
    stream::unfold(
        (payloads, ChunkDecoder::default(), VecDeque::new()),
        |(mut payloads, mut decoder, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((Ok(event), (payloads, decoder, pending)));
                }
                if decoder.finished {
                    return None;
                }
                match payloads.next().await {
                    Some(Ok(payload)) => match serde_json::from_str::<CompletionChunk>(&payload) {
                        Ok(chunk) => pending.extend(decoder.decode(chunk)),
                        Err(e) => {
                            decoder.finished = true;
                            return Some((Err(ModelError::Decode(e)), (payloads, decoder, pending)));
                        }
                    },
                    Some(Err(e)) => {
                        decoder.finished = true;
                        return Some((Err(ModelError::Io(e)), (payloads, decoder, pending)));
                    }
                    None => pending.extend(decoder.finish(None)),
                }
            }
        },
    )
    .boxed()
}
