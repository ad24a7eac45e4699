//! Conversion from UI messages to model history.

use propal_types::{MessagePart, Role, ToolCallPart, ToolCallState, UiMessage};

use crate::llm::{ModelMessage, ModelToolCall};

/// One assistant step: the text and tool calls between two step boundaries
#[derive(Default)]
struct Step<'a> {
    text: String,
    calls: Vec<&'a ToolCallPart>,
}

/// User text becomes user messages. Each assistant step becomes an
/// assistant message followed by one tool message per result. Calls
/// without a result are left out, since providers reject unanswered calls.
pub fn to_model_messages(messages: &[UiMessage]) -> Vec<ModelMessage> {
    let mut history = Vec::new();
    for message in messages {
        match message.role {
            Role::User => {
                let text = message.text();
                if !text.trim().is_empty() {
                    history.push(ModelMessage::User { content: text });
                }
            }
            Role::System => history.push(ModelMessage::System {
                content: message.text(),
            }),
            Role::Assistant => {
                for step in steps(message) {
                    push_step(&mut history, step);
                }
            }
        }
    }
    history
}

fn steps(message: &UiMessage) -> Vec<Step<'_>> {
    let mut steps = vec![Step::default()];
    for part in &message.parts {
        match part {
            MessagePart::StepStart => steps.push(Step::default()),
            MessagePart::Text { text } => {
                if let Some(step) = steps.last_mut() {
                    step.text.push_str(text);
                }
            }
            MessagePart::Tool(call) if call.state.is_terminal() => {
                if let Some(step) = steps.last_mut() {
                    step.calls.push(call);
                }
            }
            _ => {}
        }
    }
    steps
}

fn push_step(history: &mut Vec<ModelMessage>, step: Step<'_>) {
    if step.text.is_empty() && step.calls.is_empty() {
        return;
    }
    history.push(ModelMessage::Assistant {
        content: (!step.text.is_empty()).then_some(step.text),
        tool_calls: step
            .calls
            .iter()
            .map(|call| ModelToolCall {
                id: call.tool_call_id.clone(),
                name: call.tool_name.clone(),
                arguments: arguments_text(call),
            })
            .collect(),
    });
    for call in step.calls {
        history.push(ModelMessage::Tool {
            tool_call_id: call.tool_call_id.clone(),
            content: result_text(call),
        });
    }
}

fn arguments_text(call: &ToolCallPart) -> String {
    if call.input.is_null() {
        return "{}".to_string();
    }
    serde_json::to_string(&call.input).unwrap_or_else(|_| "{}".to_string())
}

fn result_text(call: &ToolCallPart) -> String {
    match call.state {
        ToolCallState::OutputError => format!(
            "Error: {}",
            call.error_text.as_deref().unwrap_or("tool call failed")
        ),
        _ => call
            .output
            .as_ref()
            .and_then(|output| serde_json::to_string(output).ok())
            .unwrap_or_else(|| "null".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finished_call(id: &str, name: &str, output: serde_json::Value) -> MessagePart {
        let mut part = ToolCallPart::streaming(id, name);
        part.state = ToolCallState::OutputAvailable;
        part.input = json!({});
        part.output = Some(output);
        MessagePart::Tool(part)
    }

    #[test]
    fn test_steps_become_assistant_and_tool_messages() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant.parts = vec![
            MessagePart::StepStart,
            MessagePart::Text {
                text: "Reading.".into(),
            },
            finished_call("c1", "getAllBlocks", json!([])),
            MessagePart::StepStart,
            MessagePart::Text {
                text: "Done.".into(),
            },
        ];
        let history = to_model_messages(&[UiMessage::user("u1", "Add pricing"), assistant]);

        assert_eq!(
            history,
            vec![
                ModelMessage::User {
                    content: "Add pricing".into()
                },
                ModelMessage::Assistant {
                    content: Some("Reading.".into()),
                    tool_calls: vec![ModelToolCall {
                        id: "c1".into(),
                        name: "getAllBlocks".into(),
                        arguments: "{}".into()
                    }],
                },
                ModelMessage::Tool {
                    tool_call_id: "c1".into(),
                    content: "[]".into()
                },
                ModelMessage::Assistant {
                    content: Some("Done.".into()),
                    tool_calls: vec![]
                },
            ]
        );
    }

    #[test]
    fn test_pending_calls_are_left_out() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        let mut pending = ToolCallPart::streaming("c1", "deleteText");
        pending.state = ToolCallState::InputAvailable;
        assistant.parts.push(MessagePart::Tool(pending));
        assert!(to_model_messages(&[assistant]).is_empty());
    }

    #[test]
    fn test_errors_and_void_results() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant.parts.push(finished_call("c1", "deleteText", json!(null)));
        let mut failed = ToolCallPart::streaming("c2", "updateBlock");
        failed.state = ToolCallState::OutputError;
        failed.error_text = Some("bad attrs".into());
        assistant.parts.push(MessagePart::Tool(failed));

        let history = to_model_messages(&[assistant]);
        assert_eq!(
            history[1],
            ModelMessage::Tool {
                tool_call_id: "c1".into(),
                content: "null".into()
            }
        );
        assert_eq!(
            history[2],
            ModelMessage::Tool {
                tool_call_id: "c2".into(),
                content: "Error: bad attrs".into()
            }
        );
    }
}
