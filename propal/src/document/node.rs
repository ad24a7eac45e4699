//! Node tree of a proposal document.
//!
//! The JSON shape is the editor's native document JSON
//! (`{type, attrs?, content?, text?, marks?}`), so snapshots load directly in
//! the browser editor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::DocumentError;

pub type Attrs = Map<String, Value>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum NodeType {
    Doc,
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    Blockquote,
    CodeBlock,
    HorizontalRule,
    HardBreak,
    Image,
    PricingCard,
    FeatureList,
    CallToAction,
    Text,
}

impl NodeType {
    /// Atomic nodes occupy a single structural unit and have no content.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::HorizontalRule
                | Self::HardBreak
                | Self::Image
                | Self::PricingCard
                | Self::FeatureList
                | Self::CallToAction
        )
    }

    pub fn is_textblock(self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading | Self::CodeBlock)
    }

    pub fn is_inline(self) -> bool {
        matches!(self, Self::Text | Self::HardBreak)
    }

    pub fn is_custom_block(self) -> bool {
        matches!(self, Self::PricingCard | Self::FeatureList | Self::CallToAction)
    }

    /// Wrapper nodes that are meaningless once their content is gone.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::BulletList | Self::OrderedList | Self::ListItem | Self::Blockquote
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Highlight,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkType,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: MarkType) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("href".to_string(), Value::String(href.into()));
        Self {
            kind: MarkType::Link,
            attrs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Node {
    pub fn element(kind: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        Self {
            kind,
            attrs,
            content,
            text: None,
            marks: Vec::new(),
        }
    }

    pub fn leaf(kind: NodeType, attrs: Attrs) -> Self {
        Self::element(kind, attrs, Vec::new())
    }

    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            kind: NodeType::Text,
            attrs: Attrs::new(),
            content: Vec::new(),
            text: Some(text.into()),
            marks,
        }
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Self::element(NodeType::Paragraph, Attrs::new(), content)
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeType::Text
    }

    pub fn text_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Number of structural units this node occupies.
    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.text_str().chars().count()
        } else if self.kind.is_leaf() {
            1
        } else {
            2 + self.content_size()
        }
    }

    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Concatenated text of all descendant text nodes, no separators.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if self.is_text() {
            out.push_str(self.text_str());
            return;
        }
        for child in &self.content {
            child.collect_text(out);
        }
    }

    /// Number of descendants that carry a block index.
    pub fn indexed_descendants(&self) -> usize {
        self.content
            .iter()
            .filter(|child| !child.is_text())
            .map(|child| 1 + child.indexed_descendants())
            .sum()
    }

    pub fn child_at_path(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.content.get(index))
    }

    pub fn child_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, &index| node.content.get_mut(index))
    }
}

// ============================================================================
// Document
// ============================================================================

/// Visitor decision after seeing a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    SkipChildren,
    Stop,
}

/// What a visitor sees for one node, computed fresh on every walk.
#[derive(Debug)]
pub struct NodeVisit<'a> {
    pub node: &'a Node,
    /// Structural position directly before the node
    pub pos: usize,
    pub depth: usize,
    /// Child indices from the root to this node
    pub path: &'a [usize],
    /// Pre-order ordinal; text nodes are addressed by text offset instead
    pub block_index: Option<usize>,
}

/// Location of the node carrying a given block index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub index: usize,
    pub pos: usize,
    pub path: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    root: Node,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document holding one empty paragraph, like a freshly mounted editor.
    pub fn empty() -> Self {
        Self {
            root: Node::element(NodeType::Doc, Attrs::new(), vec![Node::paragraph(Vec::new())]),
        }
    }

    pub fn from_blocks(blocks: Vec<Node>) -> Self {
        let mut doc = Self {
            root: Node::element(NodeType::Doc, Attrs::new(), blocks),
        };
        doc.ensure_not_empty();
        doc
    }

    pub fn from_node(root: Node) -> Result<Self, DocumentError> {
        if root.kind != NodeType::Doc {
            return Err(DocumentError::InvalidJson(format!(
                "root node must be 'doc', got '{}'",
                root.kind
            )));
        }
        let mut doc = Self { root };
        doc.ensure_not_empty();
        Ok(doc)
    }

    pub fn from_json(value: Value) -> Result<Self, DocumentError> {
        let root: Node =
            serde_json::from_value(value).map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        Self::from_node(root)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.root).unwrap_or(Value::Null)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn plain_text(&self) -> String {
        self.root.text_content()
    }

    /// Size of the top-level content; the last valid position.
    pub fn content_size(&self) -> usize {
        self.root.content_size()
    }

    pub(crate) fn ensure_not_empty(&mut self) {
        if self.root.content.is_empty() {
            self.root.content.push(Node::paragraph(Vec::new()));
        }
    }

    /// Pre-order walk over every node below the root, halted early on
    /// [`WalkControl::Stop`]. Block indices stay consistent when subtrees
    /// are skipped.
    pub fn walk<F>(&self, mut visitor: F)
    where
        F: FnMut(&NodeVisit<'_>) -> WalkControl,
    {
        let mut path = Vec::new();
        let mut counter = 0;
        walk_children(&self.root, 0, 0, &mut path, &mut counter, &mut visitor);
    }

    pub fn locate_block(&self, index: usize) -> Option<BlockLocation> {
        let mut found = None;
        self.walk(|visit| match visit.block_index {
            Some(block_index) if block_index == index => {
                found = Some(BlockLocation {
                    index,
                    pos: visit.pos,
                    path: visit.path.to_vec(),
                });
                WalkControl::Stop
            }
            _ => WalkControl::Continue,
        });
        found
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        self.root.child_at_path(path)
    }

    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        self.root.child_at_path_mut(path)
    }
}

fn walk_children<F>(
    parent: &Node,
    content_start: usize,
    depth: usize,
    path: &mut Vec<usize>,
    counter: &mut usize,
    visitor: &mut F,
) -> bool
where
    F: FnMut(&NodeVisit<'_>) -> WalkControl,
{
    let mut pos = content_start;
    for (i, child) in parent.content.iter().enumerate() {
        path.push(i);
        let block_index = if child.is_text() {
            None
        } else {
            let index = *counter;
            *counter += 1;
            Some(index)
        };

        let control = visitor(&NodeVisit {
            node: child,
            pos,
            depth,
            path: path.as_slice(),
            block_index,
        });

        match control {
            WalkControl::Stop => {
                path.pop();
                return false;
            }
            WalkControl::SkipChildren => *counter += child.indexed_descendants(),
            WalkControl::Continue => {
                if !walk_children(child, pos + 1, depth + 1, path, counter, visitor) {
                    path.pop();
                    return false;
                }
            }
        }

        path.pop();
        pos += child.node_size();
    }
    true
}
