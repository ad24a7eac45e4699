//! Server side of an assistant turn.
//!
//! Drives model steps and turns them into [`StreamEvent`]s. Server-side tool
//! calls run here and the loop continues; as soon as a step issues a
//! client-side call the response finishes with `tool-calls` and the client
//! resubmits once it has results.

use std::sync::Arc;

use futures_util::StreamExt;
use propal_types::{FinishReason, StreamEvent, ToolErrorKind, UiMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use super::history::to_model_messages;
use super::prompt::system_prompt;
use crate::llm::{LanguageModel, ModelEvent, ModelFinish, ModelMessage, ModelRequest, ModelToolCall};
use crate::tools::{catalog, ToolDefinition, ToolName, ToolRegistry};

pub const DEFAULT_MAX_STEPS: usize = 25;

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub messages: Vec<UiMessage>,
    pub document_content: Option<String>,
}

/// The receiving side hung up
#[derive(Debug)]
struct Disconnected;

struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
}

impl Emitter {
    async fn emit(&self, event: StreamEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }
}

enum StepEnd {
    Finished(ModelFinish),
    Failed(String),
}

pub struct TurnRunner {
    model: Arc<dyn LanguageModel>,
    server_tools: Arc<ToolRegistry>,
    tools: Vec<ToolDefinition>,
    max_steps: usize,
}

impl TurnRunner {
    pub fn new(model: Arc<dyn LanguageModel>, server_tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            server_tools,
            tools: catalog(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Run the turn, sending every event to `tx`. Returns early if the
    /// receiver is dropped.
    pub async fn run(&self, request: TurnRequest, tx: mpsc::Sender<StreamEvent>) {
        let session_id = request.session_id.clone();
        let out = Emitter { tx };
        match self.drive(request, &out).await {
            Ok(reason) => {
                tracing::info!(session_id = %session_id, finish_reason = ?reason, "Turn finished");
            }
            Err(Disconnected) => {
                tracing::info!(session_id = %session_id, "Client disconnected mid-turn");
            }
        }
    }

    async fn drive(&self, request: TurnRequest, out: &Emitter) -> Result<FinishReason, Disconnected> {
        out.emit(StreamEvent::Session {
            session_id: request.session_id.clone(),
        })
        .await?;
        out.emit(StreamEvent::Start {
            message_id: ulid::Ulid::new().to_string(),
        })
        .await?;

        let mut history = vec![ModelMessage::System {
            content: system_prompt(request.document_content.as_deref()),
        }];
        history.extend(to_model_messages(&request.messages));

        for step in 0..self.max_steps {
            out.emit(StreamEvent::StartStep).await?;
            let (text, calls, end) = self.step(&history, out).await?;
            out.emit(StreamEvent::FinishStep).await?;

            let finish = match end {
                StepEnd::Finished(finish) => finish,
                StepEnd::Failed(message) => {
                    tracing::error!(step, error = %message, "Model step failed");
                    out.emit(StreamEvent::Error {
                        error_text: message,
                    })
                    .await?;
                    return Ok(FinishReason::Error);
                }
            };

            history.push(ModelMessage::Assistant {
                content: (!text.is_empty()).then_some(text),
                tool_calls: calls.clone(),
            });

            if calls.is_empty() {
                let reason = match finish {
                    ModelFinish::Length => FinishReason::Length,
                    _ => FinishReason::Stop,
                };
                return self.finish(out, reason).await;
            }

            let mut client_side = false;
            for call in &calls {
                match call.name.parse::<ToolName>() {
                    Ok(name) if !name.is_client_side() => {
                        let content = self.run_server_tool(call, out).await?;
                        history.push(ModelMessage::Tool {
                            tool_call_id: call.id.clone(),
                            content,
                        });
                    }
                    _ => client_side = true,
                }
            }
            if client_side {
                return self.finish(out, FinishReason::ToolCalls).await;
            }
            tracing::debug!(step, "Continuing after server-side tool calls");
        }

        tracing::warn!(max_steps = self.max_steps, "Step limit reached");
        self.finish(out, FinishReason::Length).await
    }

    async fn finish(&self, out: &Emitter, reason: FinishReason) -> Result<FinishReason, Disconnected> {
        out.emit(StreamEvent::Finish {
            finish_reason: reason,
        })
        .await?;
        Ok(reason)
    }

    /// Stream one model step, forwarding its events.
    async fn step(
        &self,
        history: &[ModelMessage],
        out: &Emitter,
    ) -> Result<(String, Vec<ModelToolCall>, StepEnd), Disconnected> {
        let request = ModelRequest {
            messages: history.to_vec(),
            tools: self.tools.clone(),
        };
        let mut events = match self.model.stream(request).await {
            Ok(events) => events,
            Err(e) => return Ok((String::new(), Vec::new(), StepEnd::Failed(e.to_string()))),
        };

        let mut text = String::new();
        let mut calls = Vec::new();
        let mut reasoning_open = false;
        let mut end = StepEnd::Failed("Model stream ended without finishing".to_string());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    end = StepEnd::Failed(e.to_string());
                    break;
                }
            };
            if reasoning_open && !matches!(event, ModelEvent::ReasoningDelta(_)) {
                reasoning_open = false;
                out.emit(StreamEvent::ReasoningEnd).await?;
            }
            match event {
                ModelEvent::ReasoningDelta(delta) => {
                    reasoning_open = true;
                    out.emit(StreamEvent::ReasoningDelta { delta }).await?;
                }
                ModelEvent::TextDelta(delta) => {
                    text.push_str(&delta);
                    out.emit(StreamEvent::TextDelta { delta }).await?;
                }
                ModelEvent::ToolCallStart { id, name } => {
                    out.emit(StreamEvent::ToolInputStart {
                        tool_call_id: id,
                        tool_name: name,
                    })
                    .await?;
                }
                ModelEvent::ToolCallDelta { id, arguments } => {
                    out.emit(StreamEvent::ToolInputDelta {
                        tool_call_id: id,
                        input_text_delta: arguments,
                    })
                    .await?;
                }
                ModelEvent::ToolCallEnd(call) => {
                    out.emit(StreamEvent::ToolInputAvailable {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        input: parse_arguments(&call.arguments),
                    })
                    .await?;
                    calls.push(call);
                }
                ModelEvent::Finish(finish) => {
                    end = StepEnd::Finished(finish);
                    break;
                }
            }
        }
        if reasoning_open {
            out.emit(StreamEvent::ReasoningEnd).await?;
        }
        Ok((text, calls, end))
    }

    async fn run_server_tool(&self, call: &ModelToolCall, out: &Emitter) -> Result<String, Disconnected> {
        let input = parse_arguments(&call.arguments);
        tracing::info!(tool_call_id = %call.id, tool_name = %call.name, "Executing server-side tool");
        match self.server_tools.execute(&call.name, input).await {
            Ok(output) => {
                let output = output.into_value();
                let content = serde_json::to_string(&output).unwrap_or_else(|_| "null".to_string());
                out.emit(StreamEvent::ToolOutputAvailable {
                    tool_call_id: call.id.clone(),
                    output,
                })
                .await?;
                Ok(content)
            }
            Err(e) => {
                tracing::warn!(tool_call_id = %call.id, error = %e, "Server-side tool failed");
                let kind: ToolErrorKind = e.kind();
                out.emit(StreamEvent::ToolOutputError {
                    tool_call_id: call.id.clone(),
                    error_text: e.to_string(),
                    kind,
                })
                .await?;
                Ok(format!("Error: {e}"))
            }
        }
    }
}

/// Malformed argument text is passed through as a string so the executor
/// rejects it as invalid input.
fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}
