//! Structural edits addressed by position: range deletion, inline splices,
//! and block placement. Callers resolve text offsets through
//! [`super::position::TextPositionIndex`] first.

use std::mem;

use super::node::{Document, Mark, Node, NodeType};
use super::DocumentError;

/// A position resolved to the node whose content contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedPos {
    /// Path of the containing node; empty for the root
    pub parent: Vec<usize>,
    /// Offset inside the parent's content
    pub offset: usize,
}

pub(crate) fn resolve(doc: &Document, pos: usize) -> Result<ResolvedPos, DocumentError> {
    if pos > doc.content_size() {
        return Err(DocumentError::PositionOutOfRange(pos));
    }

    let mut node = doc.root();
    let mut path = Vec::new();
    let mut content_start = 0;
    loop {
        if node.kind.is_textblock() {
            break;
        }
        let mut start = content_start;
        let mut next = None;
        for (i, child) in node.content.iter().enumerate() {
            let end = start + child.node_size();
            if pos <= start {
                break;
            }
            if pos < end && !child.is_text() && !child.kind.is_leaf() {
                next = Some((i, child, start + 1));
                break;
            }
            start = end;
        }
        match next {
            Some((i, child, child_start)) => {
                path.push(i);
                node = child;
                content_start = child_start;
            }
            None => break,
        }
    }

    Ok(ResolvedPos {
        parent: path,
        offset: pos - content_start,
    })
}

/// Structural position directly before the node at `path`.
fn node_pos(doc: &Document, path: &[usize]) -> usize {
    let mut node = doc.root();
    let mut pos = 0;
    for (depth, &index) in path.iter().enumerate() {
        if depth > 0 {
            pos += 1;
        }
        pos += node.content.iter().take(index).map(Node::node_size).sum::<usize>();
        match node.content.get(index) {
            Some(child) => node = child,
            None => break,
        }
    }
    pos
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, DocumentError> {
    doc.node_at_mut(path)
        .ok_or_else(|| DocumentError::InvalidPath(path.to_vec()))
}

// ============================================================================
// Inline content helpers
// ============================================================================

fn split_text(node: &Node, cut: usize) -> (Node, Node) {
    let text = node.text_str();
    let byte = text
        .char_indices()
        .nth(cut)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len());
    (
        Node::text(&text[..byte], node.marks.clone()),
        Node::text(&text[byte..], node.marks.clone()),
    )
}

/// Split a content sequence at `offset`; text nodes straddling it are cut.
pub(crate) fn split_content(content: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut pos = 0;
    for node in content {
        let size = node.node_size();
        if pos + size <= offset {
            left.push(node.clone());
        } else if pos >= offset || !node.is_text() {
            right.push(node.clone());
        } else {
            let (head, tail) = split_text(node, offset - pos);
            left.push(head);
            right.push(tail);
        }
        pos += size;
    }
    (left, right)
}

/// Drop empty text nodes and merge neighbours carrying the same marks.
pub(crate) fn normalize_inline(content: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(content.len());
    for node in content {
        if node.is_text() && node.text_str().is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.is_text() && node.is_text() && last.marks == node.marks {
                let mut merged = last.text_str().to_string();
                merged.push_str(node.text_str());
                last.text = Some(merged);
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// Marks of the character at `offset`, or of the text that ends there.
fn marks_at(content: &[Node], offset: usize) -> Vec<Mark> {
    let mut pos = 0;
    let mut before = Vec::new();
    for node in content {
        let size = node.node_size();
        if node.is_text() {
            if offset >= pos && offset < pos + size {
                return node.marks.clone();
            }
            if pos + size == offset {
                before = node.marks.clone();
            }
        }
        pos += size;
    }
    before
}

fn child_index_at(parent: &Node, offset: usize) -> usize {
    let mut pos = 0;
    for (i, child) in parent.content.iter().enumerate() {
        if pos >= offset {
            return i;
        }
        pos += child.node_size();
    }
    parent.content.len()
}

// ============================================================================
// Edits
// ============================================================================

/// Delete the structural range `[from, to)`.
///
/// When the range spans textblocks, the remainder of the last textblock is
/// joined onto the first and everything in between is removed. Containers
/// emptied by the deletion are removed too.
pub(crate) fn delete_range(doc: &mut Document, from: usize, to: usize) -> Result<(), DocumentError> {
    if from >= to {
        return Ok(());
    }
    let start = resolve(doc, from)?;
    let end = resolve(doc, to)?;

    if start.parent == end.parent {
        let parent = node_mut(doc, &start.parent)?;
        let (left, _) = split_content(&parent.content, start.offset);
        let (_, right) = split_content(&parent.content, end.offset);
        let mut content = left;
        content.extend(right);
        parent.content = normalize_inline(content);
        prune_empty_containers(doc, &start.parent);
        doc.ensure_not_empty();
        return Ok(());
    }

    let start_in_text = is_textblock_at(doc, &start.parent);
    let end_in_text = is_textblock_at(doc, &end.parent);

    let lo = if start_in_text {
        let head = doc
            .node_at(&start.parent)
            .ok_or_else(|| DocumentError::InvalidPath(start.parent.clone()))?;
        node_pos(doc, &start.parent) + head.node_size()
    } else {
        from
    };

    let mut tail = Vec::new();
    let hi = if end_in_text {
        let last_pos = node_pos(doc, &end.parent);
        let last = node_mut(doc, &end.parent)?;
        let (_, rest) = split_content(&last.content, end.offset);
        if start_in_text {
            tail = rest;
            last_pos + last.node_size()
        } else {
            last.content = normalize_inline(rest);
            last_pos
        }
    } else {
        to
    };

    remove_within(doc.root_mut(), 0, lo, hi);

    if start_in_text {
        let head = node_mut(doc, &start.parent)?;
        let (mut content, _) = split_content(&head.content, start.offset);
        content.extend(tail);
        head.content = normalize_inline(content);
    }

    doc.ensure_not_empty();
    Ok(())
}

fn is_textblock_at(doc: &Document, path: &[usize]) -> bool {
    !path.is_empty()
        && doc
            .node_at(path)
            .map(|node| node.kind.is_textblock())
            .unwrap_or(false)
}

/// Remove every node lying entirely inside `[lo, hi]`. Returns whether
/// anything under `node` changed.
fn remove_within(node: &mut Node, content_start: usize, lo: usize, hi: usize) -> bool {
    let mut pos = content_start;
    let mut changed = false;
    let mut kept = Vec::with_capacity(node.content.len());
    for mut child in mem::take(&mut node.content) {
        let size = child.node_size();
        let (start, end) = (pos, pos + size);
        pos = end;

        if start >= lo && end <= hi {
            changed = true;
            continue;
        }
        if start < hi
            && end > lo
            && !child.is_text()
            && !child.kind.is_leaf()
            && remove_within(&mut child, start + 1, lo, hi)
        {
            changed = true;
            if child.content.is_empty() && child.kind.is_container() {
                continue;
            }
        }
        kept.push(child);
    }
    node.content = kept;
    changed
}

/// Walk up from `path`, removing containers that no longer hold anything.
fn prune_empty_containers(doc: &mut Document, path: &[usize]) {
    let mut path = path.to_vec();
    while let Some(index) = path.pop() {
        let Some(parent) = doc.node_at_mut(&path) else {
            return;
        };
        let empty = parent
            .content
            .get(index)
            .map(|node| node.kind.is_container() && node.content.is_empty())
            .unwrap_or(false);
        if !empty {
            return;
        }
        parent.content.remove(index);
    }
}

/// Replace `[from, to)` with literal text carrying the marks of the first
/// replaced character.
pub(crate) fn replace_text(
    doc: &mut Document,
    from: usize,
    to: usize,
    text: &str,
) -> Result<(), DocumentError> {
    let start = resolve(doc, from)?;
    let marks = doc
        .node_at(&start.parent)
        .map(|parent| marks_at(&parent.content, start.offset))
        .unwrap_or_default();

    delete_range(doc, from, to)?;
    if !text.is_empty() {
        insert_inline(doc, from, vec![Node::text(text, marks)])?;
    }
    Ok(())
}

/// Splice inline nodes at `pos`. Outside a textblock they are wrapped in a
/// new paragraph.
pub(crate) fn insert_inline(
    doc: &mut Document,
    pos: usize,
    nodes: Vec<Node>,
) -> Result<(), DocumentError> {
    let at = resolve(doc, pos)?;
    let parent = node_mut(doc, &at.parent)?;
    if parent.kind.is_textblock() {
        let (mut content, right) = split_content(&parent.content, at.offset);
        content.extend(nodes);
        content.extend(right);
        parent.content = normalize_inline(content);
    } else {
        let index = child_index_at(parent, at.offset);
        parent
            .content
            .insert(index, Node::paragraph(normalize_inline(nodes)));
    }
    Ok(())
}

/// Place block nodes at `pos`. Inside a textblock the block is split around
/// the insertion point and empty halves are dropped.
pub(crate) fn insert_blocks(
    doc: &mut Document,
    pos: usize,
    blocks: Vec<Node>,
) -> Result<(), DocumentError> {
    if blocks.is_empty() {
        return Ok(());
    }
    let at = resolve(doc, pos)?;

    if !is_textblock_at(doc, &at.parent) {
        let parent = node_mut(doc, &at.parent)?;
        let index = child_index_at(parent, at.offset);
        parent.content.splice(index..index, blocks);
        return Ok(());
    }

    let Some((&index, grand_path)) = at.parent.split_last() else {
        return Err(DocumentError::InvalidPath(at.parent.clone()));
    };
    let textblock = doc
        .node_at(&at.parent)
        .cloned()
        .ok_or_else(|| DocumentError::InvalidPath(at.parent.clone()))?;
    let (left, right) = split_content(&textblock.content, at.offset);

    let grand = node_mut(doc, grand_path)?;
    let keep_head = grand.kind == NodeType::ListItem && index == 0;

    let mut replacement = Vec::with_capacity(blocks.len() + 2);
    if !left.is_empty() || keep_head {
        replacement.push(Node {
            content: normalize_inline(left),
            ..textblock.clone()
        });
    }
    replacement.extend(blocks);
    if !right.is_empty() {
        replacement.push(Node {
            content: normalize_inline(right),
            ..textblock
        });
    }
    grand.content.splice(index..=index, replacement);
    Ok(())
}

/// Insert blocks among the top-level children, `index` clamped to the end.
pub(crate) fn insert_top_level(doc: &mut Document, index: usize, blocks: Vec<Node>) {
    let root = doc.root_mut();
    let index = index.min(root.content.len());
    root.content.splice(index..index, blocks);
}

/// Remove the node at `path` with its whole subtree.
pub(crate) fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, DocumentError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(DocumentError::InvalidPath(path.to_vec()));
    };
    let parent = node_mut(doc, parent_path)?;
    if index >= parent.content.len() {
        return Err(DocumentError::InvalidPath(path.to_vec()));
    }
    let removed = parent.content.remove(index);
    if parent.kind.is_textblock() {
        parent.content = normalize_inline(mem::take(&mut parent.content));
    }
    prune_empty_containers(doc, parent_path);
    doc.ensure_not_empty();
    Ok(removed)
}
