//! Proposal document model.
//!
//! - `node`: the addressable tree, structural positions, block-index walk
//! - `blocks`: attribute schemas and custom block defaults
//! - `position`: plain-text offset to structural position mapping
//! - `html`: content parsing and HTML serialization
//! - `mutation`: the mutation primitives
//! - `query`: block lookups

pub mod blocks;
mod edit;
pub mod html;
pub mod mutation;
pub mod node;
pub mod position;
pub mod query;

pub use html::{parse_content, parse_document, to_html, Fragment};
pub use mutation::{InsertPosition, Mutation, MutationOutcome, NoOpReason};
pub use node::{Attrs, BlockLocation, Document, Mark, MarkType, Node, NodeType, NodeVisit, WalkControl};
pub use position::{TextMatch, TextPositionIndex};
pub use query::{BlockDetail, BlockSummary};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Invalid document JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid attribute '{attr}' for {node_type}: {reason}")]
    InvalidAttribute {
        node_type: NodeType,
        attr: String,
        reason: String,
    },

    #[error("Stale block index {index}: expected {expected}, found {actual}")]
    StaleBlockIndex {
        index: usize,
        expected: NodeType,
        actual: NodeType,
    },

    #[error("Cannot insert {0} as a block")]
    UnsupportedBlock(NodeType),

    #[error("Position {0} is outside the document")]
    PositionOutOfRange(usize),

    #[error("No node at path {0:?}")]
    InvalidPath(Vec<usize>),

    #[error("Snapshot I/O failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for DocumentError {
    fn from(e: std::io::Error) -> Self {
        DocumentError::Io(e.to_string())
    }
}
