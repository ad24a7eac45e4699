//! Knowledge retrieval (`askKnowledge`)
//!
//! Executed by the turn runner while the stream is open; the client only
//! sees its lifecycle events.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{ToolError, ToolName, ToolOutput, TypedTool};

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid knowledge file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Knowledge backend failed: {0}")]
    Backend(String),
}

/// One ranked retrieval result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeHit {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Hits ranked by descending score, at most `limit` of them.
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<KnowledgeHit>, KnowledgeError>;
}

/// Entry of a knowledge file
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Term-overlap retrieval over a fixed set of entries
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    entries: Vec<(KnowledgeEntry, HashSet<String>)>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

impl InMemoryKnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| {
                    let terms = terms(&entry.text);
                    (entry, terms)
                })
                .collect(),
        }
    }

    /// Load a JSON array of `{id, text, payload?}`
    pub async fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.display(), entries = entries.len(), "Loaded knowledge base");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        let query = terms(text);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KnowledgeHit> = self
            .entries
            .iter()
            .filter_map(|(entry, entry_terms)| {
                let overlap = query.intersection(entry_terms).count();
                (overlap > 0).then(|| KnowledgeHit {
                    id: entry.id.clone(),
                    score: overlap as f32 / query.len() as f32,
                    payload: entry.payload.clone().unwrap_or_else(|| Value::String(entry.text.clone())),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskKnowledgeInput {
    /// What to look up about the company, its offers or past proposals
    pub query: String,
    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub struct AskKnowledgeTool {
    knowledge: Arc<dyn KnowledgeBase>,
}

impl AskKnowledgeTool {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl TypedTool for AskKnowledgeTool {
    type Input = AskKnowledgeInput;

    const NAME: ToolName = ToolName::AskKnowledge;
    const DESCRIPTION: &'static str = "Search the company knowledge base (offers, pricing, references, past proposals). Consult it before writing a proposal.";

    async fn run(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        let hits = self
            .knowledge
            .query(&input.query, input.limit)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;
        tracing::debug!(query = %input.query, hits = hits.len(), "Knowledge query");
        ToolOutput::json(&hits)
    }
}
