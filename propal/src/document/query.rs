//! Read-only lookups over the block index.

use serde::Serialize;

use super::node::{Attrs, Document, Node, NodeType, WalkControl};

/// Entry returned by `getAllBlocks`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub attrs: Attrs,
    /// Text content of the block, when it has any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Result of `getBlock`; `type` is `"unknown"` when nothing sits at the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDetail {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Node>>,
}

impl BlockDetail {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self {
            kind: Self::UNKNOWN.to_string(),
            attrs: None,
            content: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == Self::UNKNOWN
    }
}

fn non_empty_text(node: &Node) -> Option<String> {
    let text = node.text_content();
    (!text.is_empty()).then_some(text)
}

impl Document {
    pub fn get_block(&self, index: usize) -> BlockDetail {
        let Some(location) = self.locate_block(index) else {
            return BlockDetail::unknown();
        };
        match self.node_at(&location.path) {
            Some(node) => BlockDetail {
                kind: node.kind.to_string(),
                attrs: Some(node.attrs.clone()),
                content: Some(node.content.clone()),
            },
            None => BlockDetail::unknown(),
        }
    }

    /// Every indexed node in document order, optionally of a single type.
    /// Indices are global, so filtered results keep their gaps.
    pub fn get_all_blocks(&self, filter: Option<NodeType>) -> Vec<BlockSummary> {
        let mut blocks = Vec::new();
        self.walk(|visit| {
            if let Some(index) = visit.block_index {
                if filter.map(|kind| kind == visit.node.kind).unwrap_or(true) {
                    blocks.push(BlockSummary {
                        index,
                        kind: visit.node.kind,
                        attrs: visit.node.attrs.clone(),
                        text: non_empty_text(visit.node),
                    });
                }
            }
            WalkControl::Continue
        });
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_json(json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "Intro"}]},
            {"type": "featureList", "attrs": {"title": "Why", "features": ["a"]}},
            {"type": "paragraph"}
        ]}))
        .unwrap()
    }

    #[test]
    fn test_get_block_found_and_unknown() {
        let d = doc();
        let block = d.get_block(1);
        assert_eq!(block.kind, "featureList");
        assert_eq!(block.attrs.unwrap()["title"], "Why");

        let missing = d.get_block(9);
        assert!(missing.is_unknown());
        assert_eq!(serde_json::to_value(&missing).unwrap(), json!({"type": "unknown"}));
    }

    #[test]
    fn test_get_all_blocks_filter_keeps_global_indices() {
        let d = doc();
        let all = d.get_all_blocks(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text.as_deref(), Some("Intro"));
        assert!(all[2].text.is_none());

        let lists = d.get_all_blocks(Some(NodeType::FeatureList));
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].index, 1);
    }
}
