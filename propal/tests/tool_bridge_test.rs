//! Tool-call bridge against a live document actor

use std::sync::Arc;

use ractor::Actor;
use serde_json::{json, Value};

use propal::actors::{DocumentActor, DocumentArguments, DocumentHandle};
use propal::bridge::{CallPhase, ToolCallBridge};
use propal::document::{parse_document, Document, NodeType};
use propal::tools::ToolRegistry;
use propal_types::{
    MessagePart, Role, StreamEvent, ToolCallPart, ToolCallState, ToolErrorKind, UiMessage,
};

async fn setup(document: Document) -> (ToolCallBridge, Arc<dyn DocumentHandle>) {
    let (actor, _handle) = Actor::spawn(None, DocumentActor, DocumentArguments::mounted(document))
        .await
        .expect("spawn document actor");
    let handle: Arc<dyn DocumentHandle> = Arc::new(actor);
    (
        ToolCallBridge::new(ToolRegistry::for_editor(handle.clone())),
        handle,
    )
}

async fn setup_html(html: &str) -> (ToolCallBridge, Arc<dyn DocumentHandle>) {
    setup(parse_document(html).expect("parse document")).await
}

fn ready_call(id: &str, name: &str, input: Value) -> MessagePart {
    let mut part = ToolCallPart::streaming(id, name);
    part.state = ToolCallState::InputAvailable;
    part.input = input;
    MessagePart::Tool(part)
}

fn assistant(parts: Vec<MessagePart>) -> UiMessage {
    let mut message = UiMessage::new("a1", Role::Assistant);
    message.parts = parts;
    message
}

async fn text(handle: &Arc<dyn DocumentHandle>) -> String {
    handle.plain_text().await.unwrap().unwrap()
}

async fn revision(handle: &Arc<dyn DocumentHandle>) -> u64 {
    handle.snapshot().await.unwrap().unwrap().revision
}

fn part<'a>(message: &'a UiMessage, id: &str) -> &'a ToolCallPart {
    message
        .tool_parts()
        .find(|part| part.tool_call_id == id)
        .expect("tool part")
}

// ============================================================================
// At-most-once and ordering
// ============================================================================

#[tokio::test]
async fn test_redelivered_call_is_applied_once() {
    let (mut bridge, handle) = setup(Document::empty()).await;
    let mut message = assistant(vec![ready_call(
        "call-1",
        "insertPricingCard",
        json!({"title": "Pro"}),
    )]);

    let first = bridge.process(&mut message).await;
    assert_eq!(first.len(), 1);
    assert_eq!(part(&message, "call-1").state, ToolCallState::OutputAvailable);
    assert_eq!(part(&message, "call-1").output, Some(Value::Null));

    // The transport delivers the same input again and the part is reset
    let event = StreamEvent::ToolInputAvailable {
        tool_call_id: "call-1".to_string(),
        tool_name: "insertPricingCard".to_string(),
        input: json!({"title": "Pro"}),
    };
    bridge.track(&event);
    if let Some(part) = message.tool_part_mut("call-1") {
        part.state = ToolCallState::InputAvailable;
    }
    assert!(bridge.process(&mut message).await.is_empty());
    assert!(bridge
        .execute("call-1", "insertPricingCard", json!({"title": "Pro"}))
        .await
        .is_none());

    let snapshot = handle.snapshot().await.unwrap().unwrap();
    assert_eq!(
        snapshot
            .document
            .get_all_blocks(Some(NodeType::PricingCard))
            .len(),
        1
    );
    assert_eq!(snapshot.revision, 1);
    assert_eq!(bridge.phase("call-1"), Some(CallPhase::OutputAvailable));
}

#[tokio::test]
async fn test_calls_run_in_arrival_order() {
    let (mut bridge, handle) = setup_html("<p>Draft</p>").await;
    let mut message = assistant(vec![
        ready_call(
            "c1",
            "insertAtPosition",
            json!({"position": "end", "content": "<p>Price: 100</p>"}),
        ),
        ready_call(
            "c2",
            "findAndReplace",
            json!({"searchText": "100", "replaceWith": "120"}),
        ),
        ready_call("c3", "deleteText", json!({"textToDelete": "Draft"})),
    ]);

    let results = bridge.process(&mut message).await;
    let order: Vec<&str> = results
        .iter()
        .map(|result| result.tool_call_id.as_str())
        .collect();
    assert_eq!(order, vec!["c1", "c2", "c3"]);
    assert!(results.iter().all(|result| result.result.is_ok()));
    assert_eq!(text(&handle).await, "Price: 120");
    assert_eq!(revision(&handle).await, 3);
}

#[tokio::test]
async fn test_server_side_call_is_tracked_not_executed() {
    let (mut bridge, _handle) = setup(Document::empty()).await;
    let mut message = assistant(vec![ready_call(
        "k1",
        "askKnowledge",
        json!({"query": "client"}),
    )]);
    bridge.track(&StreamEvent::ToolInputAvailable {
        tool_call_id: "k1".to_string(),
        tool_name: "askKnowledge".to_string(),
        input: json!({"query": "client"}),
    });

    assert!(bridge.process(&mut message).await.is_empty());
    assert!(!bridge.is_processed("k1"));
    assert_eq!(bridge.phase("k1"), Some(CallPhase::InputAvailable));

    bridge.track(&StreamEvent::ToolOutputAvailable {
        tool_call_id: "k1".to_string(),
        output: json!([]),
    });
    assert_eq!(bridge.phase("k1"), Some(CallPhase::OutputAvailable));
}

// ============================================================================
// Error classes
// ============================================================================

#[tokio::test]
async fn test_stale_expected_type_fails_and_leaves_document() {
    let (mut bridge, handle) = setup_html("<p>A</p><div data-feature-list></div>").await;
    let before = handle.snapshot().await.unwrap().unwrap();

    // A paragraph was inserted at the top since the index was read
    let mut message = assistant(vec![
        ready_call(
            "c1",
            "insertAtPosition",
            json!({"position": "start", "content": "<p>New first</p>"}),
        ),
        ready_call(
            "c2",
            "updateBlock",
            json!({"nodeIndex": 1, "attrs": {"title": "Renamed"}, "expectedType": "featureList"}),
        ),
    ]);
    bridge.process(&mut message).await;

    let failed = part(&message, "c2");
    assert_eq!(failed.state, ToolCallState::OutputError);
    assert_eq!(failed.error_kind, Some(ToolErrorKind::Execution));
    assert!(failed.error_text.as_deref().unwrap().contains("featureList"));

    let after = handle.snapshot().await.unwrap().unwrap();
    assert_eq!(after.revision, before.revision + 1);
    let list = &after.document.get_all_blocks(Some(NodeType::FeatureList))[0];
    assert_eq!(list.attrs["title"], "Features");
}

#[tokio::test]
async fn test_error_classes_are_distinguished() {
    let (mut bridge, _handle) = setup_html("<div data-feature-list></div>").await;
    let mut message = assistant(vec![
        ready_call(
            "c1",
            "updateBlock",
            json!({"nodeIndex": 0, "attrs": {"features": "not a list"}}),
        ),
        ready_call("c2", "deleteText", json!({"text": "missing field"})),
        ready_call("c3", "rewriteEverything", json!({})),
    ]);
    bridge.process(&mut message).await;

    assert_eq!(part(&message, "c1").error_kind, Some(ToolErrorKind::Execution));
    assert_eq!(
        part(&message, "c2").error_kind,
        Some(ToolErrorKind::InputValidation)
    );
    assert_eq!(
        part(&message, "c3").error_kind,
        Some(ToolErrorKind::InputValidation)
    );
    assert!(message
        .tool_parts()
        .all(|part| part.state == ToolCallState::OutputError));
}

// ============================================================================
// Editing scenarios through the tool surface
// ============================================================================

#[tokio::test]
async fn test_find_and_replace_scenario() {
    let (mut bridge, handle) = setup_html("<p>Hello world</p>").await;
    let mut message = assistant(vec![ready_call(
        "c1",
        "findAndReplace",
        json!({"searchText": "world", "replaceWith": "proposal", "replaceAll": false}),
    )]);
    bridge.process(&mut message).await;
    assert_eq!(text(&handle).await, "Hello proposal");
}

#[tokio::test]
async fn test_call_to_action_defaults_scenario() {
    let (mut bridge, handle) = setup(Document::empty()).await;
    let mut message = assistant(vec![ready_call("c1", "insertCallToAction", json!({}))]);
    bridge.process(&mut message).await;

    let snapshot = handle.snapshot().await.unwrap().unwrap();
    let ctas = snapshot
        .document
        .get_all_blocks(Some(NodeType::CallToAction));
    assert_eq!(ctas.len(), 1);
    assert_eq!(
        Value::Object(ctas[0].attrs.clone()),
        json!({
            "title": "Ready to get started?",
            "description": "Join thousands of satisfied customers today.",
            "buttonText": "Get Started",
            "buttonLink": "#",
        })
    );
}

#[tokio::test]
async fn test_blocks_reindex_after_delete_scenario() {
    let (mut bridge, _handle) = setup_html("<p>A</p><p>B</p><p>C</p>").await;

    let listed = bridge
        .execute("c1", "getAllBlocks", json!({}))
        .await
        .unwrap()
        .result
        .unwrap();
    let indices: Vec<u64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|block| block["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .all(|block| block["type"] == "paragraph"));

    bridge
        .execute("c2", "deleteBlock", json!({"nodeIndex": 1}))
        .await
        .unwrap()
        .result
        .unwrap();

    let listed = bridge
        .execute("c3", "getAllBlocks", json!({}))
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(
        listed,
        json!([
            {"index": 0, "type": "paragraph", "attrs": {}, "text": "A"},
            {"index": 1, "type": "paragraph", "attrs": {}, "text": "C"},
        ])
    );
}

#[tokio::test]
async fn test_delete_all_keeps_separators_scenario() {
    let (mut bridge, handle) = setup_html("<p>foo bar foo baz foo</p>").await;
    let mut message = assistant(vec![
        ready_call(
            "c1",
            "deleteText",
            json!({"textToDelete": "foo", "deleteAll": true}),
        ),
        ready_call(
            "c2",
            "deleteText",
            json!({"textToDelete": "foo", "deleteAll": true}),
        ),
    ]);
    bridge.process(&mut message).await;

    assert_eq!(text(&handle).await, " bar  baz ");
    // The second call finds nothing and is a silent success
    assert_eq!(part(&message, "c2").state, ToolCallState::OutputAvailable);
    assert_eq!(revision(&handle).await, 1);
}
