//! Tool registry for the proposal assistant
//!
//! Every tool the model may call is a [`TypedTool`] with a serde + schemars
//! input type. The registry erases them to [`Tool`] and dispatches on the
//! tool name, so no handler ever sees untyped arguments.

pub mod editor;
pub mod knowledge;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use propal_types::ToolErrorKind;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

use crate::actors::DocumentHandle;
use knowledge::{AskKnowledgeTool, KnowledgeBase};

/// Every tool name on the wire
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ToolName {
    FindAndReplace,
    InsertAtPosition,
    ReplaceSection,
    SetDocumentContent,
    DeleteText,
    GetDocumentContent,
    InsertPricingCard,
    InsertFeatureList,
    InsertCallToAction,
    UpdateBlock,
    DeleteBlock,
    GetBlock,
    GetAllBlocks,
    AskKnowledge,
}

/// Where a tool call is fulfilled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSide {
    /// By the tool-call bridge against the live document
    Client,
    /// By the turn runner while the stream is open
    Server,
}

impl ToolName {
    pub fn side(self) -> ToolSide {
        match self {
            ToolName::AskKnowledge => ToolSide::Server,
            _ => ToolSide::Client,
        }
    }

    pub fn is_client_side(self) -> bool {
        self.side() == ToolSide::Client
    }
}

/// Output from tool execution
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Side-effecting tools report nothing
    Void,
    Value(Value),
}

impl ToolOutput {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(ToolOutput::Value)
            .map_err(|e| ToolError::Execution {
                message: format!("Failed to encode output: {e}"),
            })
    }

    /// Wire form; void becomes `null`.
    pub fn into_value(self) -> Value {
        match self {
            ToolOutput::Void => Value::Null,
            ToolOutput::Value(value) => value,
        }
    }
}

/// Tool execution error
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    Execution { message: String },
}

impl ToolError {
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
        }
    }

    /// Rejected before dispatch, or failed while running
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::UnknownTool(_) | ToolError::InvalidInput { .. } => {
                ToolErrorKind::InputValidation
            }
            ToolError::Execution { .. } => ToolErrorKind::Execution,
        }
    }
}

/// Trait for tools as stored in the registry
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// Human-readable description for the model
    fn description(&self) -> &str;

    /// JSON Schema for tool parameters
    fn parameters_schema(&self) -> Value;

    /// Decode arguments and execute
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// A tool with a strongly-typed input
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Input: DeserializeOwned + JsonSchema + Send;

    const NAME: ToolName;
    const DESCRIPTION: &'static str;

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError>;
}

fn input_schema<I: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(I)).unwrap_or(Value::Null);
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

#[async_trait]
impl<T: TypedTool> Tool for T {
    fn name(&self) -> ToolName {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<T::Input>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        // Models send `{}` or nothing at all for argument-less calls
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        let input: T::Input = serde_json::from_value(args).map_err(|e| ToolError::InvalidInput {
            message: e.to_string(),
        })?;
        self.run(input).await
    }
}

/// What the model is told about a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub side: ToolSide,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn of<T: TypedTool>() -> Self {
        Self {
            name: T::NAME,
            side: T::NAME.side(),
            description: T::DESCRIPTION.to_string(),
            parameters: input_schema::<T::Input>(),
        }
    }
}

/// Definitions of every tool, in wire order. Needs no live document, so the
/// server can advertise client-side tools it never executes.
pub fn catalog() -> Vec<ToolDefinition> {
    let mut definitions = editor::definitions();
    definitions.push(ToolDefinition::of::<AskKnowledgeTool>());
    definitions.sort_by_key(|definition| {
        ToolName::iter()
            .position(|name| name == definition.name)
            .unwrap_or(usize::MAX)
    });
    definitions
}

/// Tool registry containing the tools this side of the stream executes
pub struct ToolRegistry {
    tools: HashMap<ToolName, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// All thirteen editor tools bound to `document`
    pub fn for_editor(document: Arc<dyn DocumentHandle>) -> Self {
        let mut registry = Self::new();
        editor::register(&mut registry, document);
        registry
    }

    /// Server-executed tools
    pub fn for_server(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        let mut registry = Self::new();
        registry.register(AskKnowledgeTool::new(knowledge));
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn get(&self, name: ToolName) -> Option<&dyn Tool> {
        self.tools.get(&name).map(|tool| tool.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        name.parse::<ToolName>()
            .map(|name| self.tools.contains_key(&name))
            .unwrap_or(false)
    }

    /// Execute a tool by wire name with raw arguments
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = name
            .parse::<ToolName>()
            .ok()
            .and_then(|name| self.tools.get(&name))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::iter()
            .filter_map(|name| self.tools.get(&name))
            .map(|tool| ToolDefinition {
                name: tool.name(),
                side: tool.name().side(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Get list of available tool names
    pub fn available_tools(&self) -> Vec<ToolName> {
        ToolName::iter()
            .filter(|name| self.tools.contains_key(name))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_camel_case() {
        assert_eq!(ToolName::FindAndReplace.to_string(), "findAndReplace");
        assert_eq!(
            "insertCallToAction".parse::<ToolName>().unwrap(),
            ToolName::InsertCallToAction
        );
        assert!("bash".parse::<ToolName>().is_err());
    }

    #[test]
    fn test_catalog_lists_every_tool_once() {
        let catalog = catalog();
        assert_eq!(catalog.len(), ToolName::iter().count());
        assert_eq!(catalog[0].name, ToolName::FindAndReplace);
        assert_eq!(catalog.last().unwrap().name, ToolName::AskKnowledge);
        assert_eq!(catalog.last().unwrap().side, ToolSide::Server);
        assert!(catalog.iter().all(|d| d.parameters["type"] == "object"));
    }

    #[test]
    fn test_schema_uses_wire_field_names() {
        let find = catalog()
            .into_iter()
            .find(|d| d.name == ToolName::FindAndReplace)
            .unwrap();
        let properties = find.parameters["properties"].as_object().unwrap();
        assert!(properties.contains_key("searchText"));
        assert!(properties.contains_key("replaceAll"));
        let required = find.parameters["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "searchText"));
        assert!(!required.iter().any(|r| r == "replaceAll"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ToolError::UnknownTool("x".into()).kind(),
            ToolErrorKind::InputValidation
        );
        assert_eq!(
            ToolError::execution("boom").kind(),
            ToolErrorKind::Execution
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("bash", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("bash".to_string()));
    }
}
