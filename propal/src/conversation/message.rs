//! Folding stream events into the assistant message.

use propal_types::{MessagePart, PartState, StreamEvent, ToolCallPart, ToolCallState, UiMessage};

/// Apply one event to the message being streamed. Re-delivered lifecycle
/// events never move a tool part backwards.
pub fn apply_event(message: &mut UiMessage, event: &StreamEvent) {
    match event {
        StreamEvent::Start { message_id } => {
            if message.parts.is_empty() {
                message.id = message_id.clone();
            }
        }
        StreamEvent::StartStep => message.parts.push(MessagePart::StepStart),
        StreamEvent::TextDelta { delta } => match message.parts.last_mut() {
            Some(MessagePart::Text { text }) => text.push_str(delta),
            _ => message.parts.push(MessagePart::Text {
                text: delta.clone(),
            }),
        },
        StreamEvent::ReasoningDelta { delta } => match message.parts.last_mut() {
            Some(MessagePart::Reasoning {
                text,
                state: PartState::Streaming,
            }) => text.push_str(delta),
            _ => message.parts.push(MessagePart::Reasoning {
                text: delta.clone(),
                state: PartState::Streaming,
            }),
        },
        StreamEvent::ReasoningEnd => {
            let streaming = message.parts.iter_mut().rev().find_map(|part| match part {
                MessagePart::Reasoning { state, .. } if *state == PartState::Streaming => {
                    Some(state)
                }
                _ => None,
            });
            if let Some(state) = streaming {
                *state = PartState::Done;
            }
        }
        StreamEvent::ToolInputStart {
            tool_call_id,
            tool_name,
        } => {
            if message.tool_part_mut(tool_call_id).is_none() {
                message
                    .parts
                    .push(MessagePart::Tool(ToolCallPart::streaming(tool_call_id, tool_name)));
            }
        }
        StreamEvent::ToolInputDelta {
            tool_call_id,
            input_text_delta,
        } => {
            if let Some(part) = message.tool_part_mut(tool_call_id) {
                if part.state == ToolCallState::InputStreaming {
                    part.input_text.push_str(input_text_delta);
                }
            }
        }
        StreamEvent::ToolInputAvailable {
            tool_call_id,
            tool_name,
            input,
        } => {
            if message.tool_part_mut(tool_call_id).is_none() {
                message
                    .parts
                    .push(MessagePart::Tool(ToolCallPart::streaming(tool_call_id, tool_name)));
            }
            if let Some(part) = message.tool_part_mut(tool_call_id) {
                if !part.state.is_terminal() {
                    part.state = ToolCallState::InputAvailable;
                    part.input = input.clone();
                }
            }
        }
        StreamEvent::ToolOutputAvailable {
            tool_call_id,
            output,
        } => {
            if let Some(part) = message.tool_part_mut(tool_call_id) {
                part.state = ToolCallState::OutputAvailable;
                part.output = Some(output.clone());
            }
        }
        StreamEvent::ToolOutputError {
            tool_call_id,
            error_text,
            kind,
        } => {
            if let Some(part) = message.tool_part_mut(tool_call_id) {
                part.state = ToolCallState::OutputError;
                part.error_text = Some(error_text.clone());
                part.error_kind = Some(*kind);
            }
        }
        StreamEvent::Session { .. }
        | StreamEvent::FinishStep
        | StreamEvent::Finish { .. }
        | StreamEvent::Error { .. } => {}
    }
}

/// Whether every tool call of the message has a result
pub fn tool_calls_settled(message: &UiMessage) -> bool {
    message.tool_parts().all(|part| part.state.is_terminal())
}
