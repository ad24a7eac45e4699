//! Editor tools
//!
//! Thin typed wrappers from the model-facing tool inputs to document
//! mutations and queries. Each mutation awaits the document's commit before
//! returning, so a following call in the same turn sees its effect.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolDefinition, ToolError, ToolName, ToolOutput, ToolRegistry, TypedTool};
use crate::actors::{DocumentHandle, DocumentHandleError};
use crate::document::{Attrs, InsertPosition, Mutation, MutationOutcome, NodeType};

const INDEX_HINT: &str = "Use getAllBlocks to find the index.";

fn handle_error(e: DocumentHandleError) -> ToolError {
    ToolError::execution(e.to_string())
}

async fn commit(document: &dyn DocumentHandle, mutation: Mutation) -> Result<ToolOutput, ToolError> {
    let name = mutation.name();
    let commit = document.apply(mutation).await.map_err(handle_error)?;
    match commit.outcome {
        MutationOutcome::Applied => {
            tracing::debug!(primitive = name, revision = commit.revision, "Mutation applied");
        }
        MutationOutcome::NoOp { reason } => {
            tracing::debug!(primitive = name, ?reason, "Mutation left the document unchanged");
        }
        MutationOutcome::Detached => {
            tracing::debug!(primitive = name, "No editor mounted; mutation ignored");
        }
    }
    Ok(ToolOutput::Void)
}

fn to_attrs<T: Serialize>(value: &T) -> Result<Attrs, ToolError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Attrs::new()),
        Err(e) => Err(ToolError::execution(format!("Failed to encode attributes: {e}"))),
    }
}

// ============================================================================
// Text tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindAndReplaceInput {
    /// The exact text to search for (a word, a sentence or a paragraph)
    pub search_text: String,
    /// The new HTML content that replaces the matched text
    pub replace_with: String,
    /// Replace every occurrence instead of only the first
    #[serde(default)]
    pub replace_all: bool,
}

pub struct FindAndReplaceTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for FindAndReplaceTool {
    type Input = FindAndReplaceInput;

    const NAME: ToolName = ToolName::FindAndReplace;
    const DESCRIPTION: &'static str = "Find and replace text in the document. Searches for the exact text and replaces it with the new content. Use this to edit specific parts of the existing document.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::FindAndReplace {
                search_text: input.search_text,
                replace_with: input.replace_with,
                replace_all: input.replace_all,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertAtPositionInput {
    /// 'start' or 'end' of the document, or 'after'/'before' the anchor text
    pub position: InsertPosition,
    /// The HTML content to insert
    pub content: String,
    /// Reference text for 'after' or 'before'; required for those positions
    #[serde(default)]
    pub anchor_text: Option<String>,
}

pub struct InsertAtPositionTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for InsertAtPositionTool {
    type Input = InsertAtPositionInput;

    const NAME: ToolName = ToolName::InsertAtPosition;
    const DESCRIPTION: &'static str = "Insert content at a specific position in the document. Use this to add content after a specific text or at the start or end of the document.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::InsertAtPosition {
                position: input.position,
                content: input.content,
                anchor_text: input.anchor_text,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceSectionInput {
    /// Text marking the start of the section to replace
    pub start_text: String,
    /// Text marking the end of the section; the section runs to the end of the document when omitted
    #[serde(default)]
    pub end_text: Option<String>,
    /// The new HTML content for the section
    pub new_content: String,
}

pub struct ReplaceSectionTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for ReplaceSectionTool {
    type Input = ReplaceSectionInput;

    const NAME: ToolName = ToolName::ReplaceSection;
    const DESCRIPTION: &'static str = "Replace a whole section of the document, located by its start text and end text. Use this to rewrite complete sections.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::ReplaceSection {
                start_text: input.start_text,
                end_text: input.end_text,
                new_content: input.new_content,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetDocumentContentInput {
    /// The complete new HTML content of the document
    pub content: String,
}

pub struct SetDocumentContentTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for SetDocumentContentTool {
    type Input = SetDocumentContentInput;

    const NAME: ToolName = ToolName::SetDocumentContent;
    const DESCRIPTION: &'static str = "Replace the entire content of the document. Only use this when you want to replace the whole document.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::SetDocumentContent {
                content: input.content,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTextInput {
    /// The exact text to delete
    pub text_to_delete: String,
    /// Delete every occurrence instead of only the first
    #[serde(default)]
    pub delete_all: bool,
}

pub struct DeleteTextTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for DeleteTextTool {
    type Input = DeleteTextInput;

    const NAME: ToolName = ToolName::DeleteText;
    const DESCRIPTION: &'static str = "Delete text from the document. Searches for the exact text and removes it.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::DeleteText {
                text_to_delete: input.text_to_delete,
                delete_all: input.delete_all,
            },
        )
        .await
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentContentInput {
    /// Document id; the current document is used when omitted
    #[serde(default)]
    pub document_id: Option<String>,
}

pub struct GetDocumentContentTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for GetDocumentContentTool {
    type Input = GetDocumentContentInput;

    const NAME: ToolName = ToolName::GetDocumentContent;
    const DESCRIPTION: &'static str = "Read the current document as editor JSON. Use this to read the document before editing it.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if let Some(id) = input.document_id {
            tracing::debug!(document_id = %id, "Ignoring document id; reading the bound document");
        }
        let snapshot = self.document.snapshot().await.map_err(handle_error)?;
        Ok(ToolOutput::Value(
            snapshot
                .map(|snapshot| snapshot.document.to_json())
                .unwrap_or(Value::Null),
        ))
    }
}

// ============================================================================
// Custom blocks
// ============================================================================

/// Where a new block goes
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Insert position in the document
    #[serde(default)]
    pub position: InsertPosition,
    /// Reference text for 'after' or 'before'; required for those positions
    #[serde(default)]
    pub anchor_text: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingCardAttrs {
    /// Plan title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Price, e.g. '99' or '€99'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Billing period, e.g. 'month' or 'year'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Included features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    /// Highlight the card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureListAttrs {
    /// Section title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Features to list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallToActionAttrs {
    /// Call-to-action title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Call-to-action description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Button label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    /// Button target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_link: Option<String>,
}

/// Input of the three custom-block insert tools
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct InsertBlockInput<A> {
    #[serde(flatten)]
    pub attrs: A,
    #[serde(flatten)]
    pub placement: Placement,
}

/// Inserts one kind of custom block; the three insert tools differ only in
/// their attribute struct.
pub struct InsertBlockTool<A> {
    document: Arc<dyn DocumentHandle>,
    _attrs: std::marker::PhantomData<fn() -> A>,
}

impl<A> InsertBlockTool<A> {
    pub fn new(document: Arc<dyn DocumentHandle>) -> Self {
        Self {
            document,
            _attrs: std::marker::PhantomData,
        }
    }
}

async fn insert_block<A: Serialize>(
    document: &dyn DocumentHandle,
    kind: NodeType,
    input: InsertBlockInput<A>,
) -> Result<ToolOutput, ToolError> {
    let attrs = to_attrs(&input.attrs)?;
    commit(
        document,
        Mutation::InsertBlock {
            kind,
            attrs,
            position: input.placement.position,
            anchor_text: input.placement.anchor_text,
        },
    )
    .await
}

#[async_trait]
impl TypedTool for InsertBlockTool<PricingCardAttrs> {
    type Input = InsertBlockInput<PricingCardAttrs>;

    const NAME: ToolName = ToolName::InsertPricingCard;
    const DESCRIPTION: &'static str = "Insert a Pricing Card block. A Pricing Card shows a pricing plan with a title, price, period and list of features.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        insert_block(self.document.as_ref(), NodeType::PricingCard, input).await
    }
}

#[async_trait]
impl TypedTool for InsertBlockTool<FeatureListAttrs> {
    type Input = InsertBlockInput<FeatureListAttrs>;

    const NAME: ToolName = ToolName::InsertFeatureList;
    const DESCRIPTION: &'static str = "Insert a Feature List block. A Feature List shows a titled list of features.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        insert_block(self.document.as_ref(), NodeType::FeatureList, input).await
    }
}

#[async_trait]
impl TypedTool for InsertBlockTool<CallToActionAttrs> {
    type Input = InsertBlockInput<CallToActionAttrs>;

    const NAME: ToolName = ToolName::InsertCallToAction;
    const DESCRIPTION: &'static str = "Insert a Call to Action block. A Call to Action shows a title, a description and an action button.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        insert_block(self.document.as_ref(), NodeType::CallToAction, input).await
    }
}

pub type InsertPricingCardTool = InsertBlockTool<PricingCardAttrs>;
pub type InsertFeatureListTool = InsertBlockTool<FeatureListAttrs>;
pub type InsertCallToActionTool = InsertBlockTool<CallToActionAttrs>;

// ============================================================================
// Block CRUD
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlockInput {
    /// Index of the node to update (from getAllBlocks)
    pub node_index: usize,
    /// New attributes, merged into the existing ones; the shape depends on the block type
    pub attrs: Attrs,
    /// Type the node is expected to have; the call fails if the index now points elsewhere
    #[serde(default)]
    pub expected_type: Option<NodeType>,
}

pub struct UpdateBlockTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for UpdateBlockTool {
    type Input = UpdateBlockInput;

    const NAME: ToolName = ToolName::UpdateBlock;
    const DESCRIPTION: &'static str = "Update an existing block in the document. Use getAllBlocks to find the index of the block to update.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::UpdateBlock {
                node_index: input.node_index,
                attrs: input.attrs,
                expected_type: input.expected_type,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBlockInput {
    /// Index of the node to delete (from getAllBlocks)
    pub node_index: usize,
    /// Type the node is expected to have; the call fails if the index now points elsewhere
    #[serde(default)]
    pub expected_type: Option<NodeType>,
}

pub struct DeleteBlockTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for DeleteBlockTool {
    type Input = DeleteBlockInput;

    const NAME: ToolName = ToolName::DeleteBlock;
    const DESCRIPTION: &'static str = "Delete a block from the document. Use getAllBlocks to find the index of the block to delete.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        commit(
            self.document.as_ref(),
            Mutation::DeleteBlock {
                node_index: input.node_index,
                expected_type: input.expected_type,
            },
        )
        .await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetBlockInput {
    /// Index of the node to read (from getAllBlocks)
    pub node_index: usize,
    /// Type the node is expected to have; the call fails if the index now points elsewhere
    #[serde(default)]
    pub expected_type: Option<NodeType>,
}

pub struct GetBlockTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for GetBlockTool {
    type Input = GetBlockInput;

    const NAME: ToolName = ToolName::GetBlock;
    const DESCRIPTION: &'static str = "Read one block of the document by its index. Use getAllBlocks to find the index.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        let snapshot = self.document.snapshot().await.map_err(handle_error)?;
        let detail = snapshot
            .map(|snapshot| snapshot.document.get_block(input.node_index))
            .unwrap_or_else(crate::document::BlockDetail::unknown);

        if let Some(expected) = input.expected_type {
            if !detail.is_unknown() && detail.kind != expected.to_string() {
                return Err(ToolError::execution(format!(
                    "Stale block index {}: expected {}, found {}. {}",
                    input.node_index, expected, detail.kind, INDEX_HINT
                )));
            }
        }
        ToolOutput::json(&detail)
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetAllBlocksInput {
    /// Only return blocks of this type (e.g. 'pricingCard', 'featureList', 'callToAction')
    #[serde(default)]
    pub block_type: Option<String>,
}

pub struct GetAllBlocksTool {
    document: Arc<dyn DocumentHandle>,
}

#[async_trait]
impl TypedTool for GetAllBlocksTool {
    type Input = GetAllBlocksInput;

    const NAME: ToolName = ToolName::GetAllBlocks;
    const DESCRIPTION: &'static str = "List every block of the document with its index, type and attributes, optionally filtered by type. Use it to find the index of a block before updating or deleting it.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        let filter = match input.block_type.as_deref().filter(|t| !t.is_empty()) {
            None => None,
            Some(name) => match name.parse::<NodeType>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    tracing::debug!(block_type = %name, "Unknown block type filter");
                    return Ok(ToolOutput::Value(Value::Array(Vec::new())));
                }
            },
        };
        let snapshot = self.document.snapshot().await.map_err(handle_error)?;
        let blocks = snapshot
            .map(|snapshot| snapshot.document.get_all_blocks(filter))
            .unwrap_or_default();
        ToolOutput::json(&blocks)
    }
}

// ============================================================================
// Registration
// ============================================================================

macro_rules! document_tools {
    ($($tool:ident),* $(,)?) => {
        $(
            impl $tool {
                pub fn new(document: Arc<dyn DocumentHandle>) -> Self {
                    Self { document }
                }
            }
        )*
    };
}

document_tools!(
    FindAndReplaceTool,
    InsertAtPositionTool,
    ReplaceSectionTool,
    SetDocumentContentTool,
    DeleteTextTool,
    GetDocumentContentTool,
    UpdateBlockTool,
    DeleteBlockTool,
    GetBlockTool,
    GetAllBlocksTool,
);

pub fn register(registry: &mut ToolRegistry, document: Arc<dyn DocumentHandle>) {
    registry.register(FindAndReplaceTool::new(document.clone()));
    registry.register(InsertAtPositionTool::new(document.clone()));
    registry.register(ReplaceSectionTool::new(document.clone()));
    registry.register(SetDocumentContentTool::new(document.clone()));
    registry.register(DeleteTextTool::new(document.clone()));
    registry.register(GetDocumentContentTool::new(document.clone()));
    registry.register(InsertPricingCardTool::new(document.clone()));
    registry.register(InsertFeatureListTool::new(document.clone()));
    registry.register(InsertCallToActionTool::new(document.clone()));
    registry.register(UpdateBlockTool::new(document.clone()));
    registry.register(DeleteBlockTool::new(document.clone()));
    registry.register(GetBlockTool::new(document.clone()));
    registry.register(GetAllBlocksTool::new(document));
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::of::<FindAndReplaceTool>(),
        ToolDefinition::of::<InsertAtPositionTool>(),
        ToolDefinition::of::<ReplaceSectionTool>(),
        ToolDefinition::of::<SetDocumentContentTool>(),
        ToolDefinition::of::<DeleteTextTool>(),
        ToolDefinition::of::<GetDocumentContentTool>(),
        ToolDefinition::of::<InsertPricingCardTool>(),
        ToolDefinition::of::<InsertFeatureListTool>(),
        ToolDefinition::of::<InsertCallToActionTool>(),
        ToolDefinition::of::<UpdateBlockTool>(),
        ToolDefinition::of::<DeleteBlockTool>(),
        ToolDefinition::of::<GetBlockTool>(),
        ToolDefinition::of::<GetAllBlocksTool>(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{DocumentActor, DocumentArguments};
    use crate::document::parse_document;
    use ractor::Actor;
    use serde_json::json;

    async fn registry(html: &str) -> (ToolRegistry, Arc<dyn DocumentHandle>) {
        let document = parse_document(html).unwrap();
        let (actor, _handle) = Actor::spawn(None, DocumentActor, DocumentArguments::mounted(document))
            .await
            .unwrap();
        let handle: Arc<dyn DocumentHandle> = Arc::new(actor);
        (ToolRegistry::for_editor(handle.clone()), handle)
    }

    async fn text(handle: &Arc<dyn DocumentHandle>) -> String {
        handle.plain_text().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_find_and_replace_returns_void() {
        let (registry, handle) = registry("<p>Hello world</p>").await;
        let output = registry
            .execute(
                "findAndReplace",
                json!({"searchText": "world", "replaceWith": "proposal"}),
            )
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Void);
        assert_eq!(text(&handle).await, "Hello proposal");
    }

    #[tokio::test]
    async fn test_insert_call_to_action_uses_defaults() {
        let (registry, handle) = registry("<p></p>").await;
        registry
            .execute("insertCallToAction", json!({}))
            .await
            .unwrap();

        let blocks = registry
            .execute("getAllBlocks", json!({"blockType": "callToAction"}))
            .await
            .unwrap()
            .into_value();
        let blocks = blocks.as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["attrs"]["title"], "Ready to get started?");
        assert_eq!(
            blocks[0]["attrs"]["description"],
            "Join thousands of satisfied customers today."
        );
        assert_eq!(blocks[0]["attrs"]["buttonText"], "Get Started");
        assert_eq!(blocks[0]["attrs"]["buttonLink"], "#");
        assert_eq!(text(&handle).await, "");
    }

    #[tokio::test]
    async fn test_insert_pricing_card_after_anchor() {
        let (registry, _handle) = registry("<p>Intro</p><p>Outro</p>").await;
        registry
            .execute(
                "insertPricingCard",
                json!({"title": "Pro", "position": "after", "anchorText": "Intro"}),
            )
            .await
            .unwrap();

        let blocks = registry
            .execute("getAllBlocks", json!({}))
            .await
            .unwrap()
            .into_value();
        let kinds: Vec<&str> = blocks
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["paragraph", "pricingCard", "paragraph"]);
        assert_eq!(blocks[1]["attrs"]["title"], "Pro");
        assert_eq!(blocks[1]["attrs"]["price"], "$49");
    }

    #[tokio::test]
    async fn test_malformed_input_is_a_validation_error() {
        let (registry, _handle) = registry("<p>x</p>").await;
        let err = registry
            .execute("deleteBlock", json!({"nodeIndex": "first"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_malformed_attrs_are_an_execution_error() {
        let (registry, _handle) = registry("<p>x</p>").await;
        registry
            .execute("insertFeatureList", json!({"position": "start"}))
            .await
            .unwrap();
        let err = registry
            .execute(
                "updateBlock",
                json!({"nodeIndex": 0, "attrs": {"features": "not a list"}}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_get_block_unknown_and_stale() {
        let (registry, _handle) = registry("<p>A</p>").await;
        let missing = registry
            .execute("getBlock", json!({"nodeIndex": 9}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(missing, json!({"type": "unknown"}));

        let err = registry
            .execute(
                "getBlock",
                json!({"nodeIndex": 0, "expectedType": "pricingCard"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Stale block index 0"));
    }

    #[tokio::test]
    async fn test_unknown_block_type_filter_is_empty() {
        let (registry, _handle) = registry("<p>A</p>").await;
        let blocks = registry
            .execute("getAllBlocks", json!({"blockType": "table"}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(blocks, json!([]));
    }

    #[tokio::test]
    async fn test_get_document_content_returns_editor_json() {
        let (registry, _handle) = registry("<p>Hi</p>").await;
        let content = registry
            .execute("getDocumentContent", Value::Null)
            .await
            .unwrap()
            .into_value();
        assert_eq!(content["type"], "doc");
        assert_eq!(content["content"][0]["content"][0]["text"], "Hi");
    }
}
