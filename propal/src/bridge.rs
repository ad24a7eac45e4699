//! Tool-call bridge
//!
//! Executes the client-side tool calls of an assistant turn against the live
//! document and writes each result back into the message's tool part.
//!
//! Every call id runs at most once. The transport may re-deliver
//! `tool-input-available` and the message may be rescanned any number of
//! times; the processed set is what makes that safe.

use std::collections::{HashMap, HashSet};

use propal_types::{StreamEvent, ToolCallState, ToolErrorKind, UiMessage};
use serde_json::Value;

use crate::tools::{ToolError, ToolName, ToolRegistry};

/// Where a tool call is in its lifecycle, as seen by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    InputStreaming,
    InputAvailable,
    Executing,
    OutputAvailable,
    OutputError,
}

impl CallPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallPhase::OutputAvailable | CallPhase::OutputError)
    }
}

/// Result of one executed call
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: Result<Value, ToolError>,
}

pub struct ToolCallBridge {
    registry: ToolRegistry,
    processed: HashSet<String>,
    phases: HashMap<String, CallPhase>,
}

impl ToolCallBridge {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            processed: HashSet::new(),
            phases: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn phase(&self, tool_call_id: &str) -> Option<CallPhase> {
        self.phases.get(tool_call_id).copied()
    }

    pub fn is_processed(&self, tool_call_id: &str) -> bool {
        self.processed.contains(tool_call_id)
    }

    /// Follow lifecycle events, including those of server-side tools.
    /// Phases never move backwards.
    pub fn track(&mut self, event: &StreamEvent) {
        let (id, phase) = match event {
            StreamEvent::ToolInputStart { tool_call_id, .. }
            | StreamEvent::ToolInputDelta { tool_call_id, .. } => {
                (tool_call_id, CallPhase::InputStreaming)
            }
            StreamEvent::ToolInputAvailable { tool_call_id, .. } => {
                (tool_call_id, CallPhase::InputAvailable)
            }
            StreamEvent::ToolOutputAvailable { tool_call_id, .. } => {
                (tool_call_id, CallPhase::OutputAvailable)
            }
            StreamEvent::ToolOutputError { tool_call_id, .. } => {
                (tool_call_id, CallPhase::OutputError)
            }
            _ => return,
        };
        self.advance(id, phase);
    }

    fn advance(&mut self, tool_call_id: &str, phase: CallPhase) {
        let current = self.phases.get(tool_call_id).copied();
        let regress = match current {
            Some(current) => current.is_terminal() || phase_rank(current) > phase_rank(phase),
            None => false,
        };
        if !regress {
            self.phases.insert(tool_call_id.to_string(), phase);
        }
    }

    /// Execute every client-side call of `message` whose input is available
    /// and which has not run yet, in the order the parts appear.
    pub async fn process(&mut self, message: &mut UiMessage) -> Vec<CallResult> {
        let ready: Vec<(String, String, Value)> = message
            .tool_parts()
            .filter(|part| part.state == ToolCallState::InputAvailable)
            .filter(|part| !self.processed.contains(&part.tool_call_id))
            .filter(|part| is_client_side(&part.tool_name))
            .map(|part| {
                (
                    part.tool_call_id.clone(),
                    part.tool_name.clone(),
                    part.input.clone(),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(ready.len());
        for (tool_call_id, tool_name, input) in ready {
            let Some(result) = self.execute(&tool_call_id, &tool_name, input).await else {
                continue;
            };
            if let Some(part) = message.tool_part_mut(&tool_call_id) {
                match &result.result {
                    Ok(output) => {
                        part.state = ToolCallState::OutputAvailable;
                        part.output = Some(output.clone());
                    }
                    Err(e) => {
                        part.state = ToolCallState::OutputError;
                        part.error_text = Some(e.to_string());
                        part.error_kind = Some(e.kind());
                    }
                }
            }
            results.push(result);
        }
        results
    }

    /// Run one call unless its id has been seen before.
    pub async fn execute(
        &mut self,
        tool_call_id: &str,
        tool_name: &str,
        input: Value,
    ) -> Option<CallResult> {
        if !self.processed.insert(tool_call_id.to_string()) {
            tracing::debug!(tool_call_id, tool_name, "Skipping already processed tool call");
            return None;
        }
        self.advance(tool_call_id, CallPhase::Executing);

        tracing::info!(tool_call_id, tool_name, "Executing tool call");
        let result = self
            .registry
            .execute(tool_name, input)
            .await
            .map(|output| output.into_value());

        match &result {
            Ok(_) => self.advance(tool_call_id, CallPhase::OutputAvailable),
            Err(e) => {
                match e.kind() {
                    ToolErrorKind::InputValidation => {
                        tracing::warn!(tool_call_id, tool_name, error = %e, "Rejected tool input")
                    }
                    ToolErrorKind::Execution => {
                        tracing::warn!(tool_call_id, tool_name, error = %e, "Tool call failed")
                    }
                }
                self.advance(tool_call_id, CallPhase::OutputError);
            }
        }

        Some(CallResult {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            result,
        })
    }
}

fn phase_rank(phase: CallPhase) -> u8 {
    match phase {
        CallPhase::InputStreaming => 0,
        CallPhase::InputAvailable => 1,
        CallPhase::Executing => 2,
        CallPhase::OutputAvailable | CallPhase::OutputError => 3,
    }
}

/// Unknown names stay with the bridge so they end in an input-validation
/// error instead of hanging the turn.
fn is_client_side(tool_name: &str) -> bool {
    tool_name
        .parse::<ToolName>()
        .map(ToolName::is_client_side)
        .unwrap_or(true)
}
