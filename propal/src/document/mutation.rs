//! Mutation primitives.
//!
//! Every primitive runs against a working copy and is committed only when it
//! applied, so a miss or an error leaves the document untouched.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::blocks::{create_attrs, merge_attrs};
use super::edit;
use super::html::{looks_like_html, parse_content, parse_document, parse_html, Fragment};
use super::node::{Attrs, Document, Node, NodeType};
use super::position::TextPositionIndex;
use super::DocumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Start,
    #[default]
    End,
    After,
    Before,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    FindAndReplace {
        search_text: String,
        replace_with: String,
        replace_all: bool,
    },
    InsertAtPosition {
        position: InsertPosition,
        content: String,
        anchor_text: Option<String>,
    },
    ReplaceSection {
        start_text: String,
        end_text: Option<String>,
        new_content: String,
    },
    DeleteText {
        text_to_delete: String,
        delete_all: bool,
    },
    SetDocumentContent {
        content: String,
    },
    /// Create a pricing card, feature list, or call-to-action
    InsertBlock {
        kind: NodeType,
        attrs: Attrs,
        position: InsertPosition,
        anchor_text: Option<String>,
    },
    UpdateBlock {
        node_index: usize,
        attrs: Attrs,
        expected_type: Option<NodeType>,
    },
    DeleteBlock {
        node_index: usize,
        expected_type: Option<NodeType>,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::FindAndReplace { .. } => "findAndReplace",
            Mutation::InsertAtPosition { .. } => "insertAtPosition",
            Mutation::ReplaceSection { .. } => "replaceSection",
            Mutation::DeleteText { .. } => "deleteText",
            Mutation::SetDocumentContent { .. } => "setDocumentContent",
            Mutation::InsertBlock { .. } => "insertBlock",
            Mutation::UpdateBlock { .. } => "updateBlock",
            Mutation::DeleteBlock { .. } => "deleteBlock",
        }
    }
}

/// Why a primitive left the document unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoOpReason {
    TextNotFound,
    AnchorRequired,
    AnchorNotFound,
    IndexOutOfRange,
    EmptyContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MutationOutcome {
    Applied,
    NoOp { reason: NoOpReason },
    /// No editor view was mounted; the mutation was ignored
    Detached,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        self == MutationOutcome::Applied
    }

    fn miss(reason: NoOpReason) -> Result<Self, DocumentError> {
        Ok(MutationOutcome::NoOp { reason })
    }
}

impl Document {
    pub fn apply(&mut self, mutation: &Mutation) -> Result<MutationOutcome, DocumentError> {
        let mut working = self.clone();
        let outcome = working.apply_in_place(mutation)?;
        if outcome.is_applied() {
            working.ensure_not_empty();
            *self = working;
        }
        Ok(outcome)
    }

    fn apply_in_place(&mut self, mutation: &Mutation) -> Result<MutationOutcome, DocumentError> {
        match mutation {
            Mutation::FindAndReplace {
                search_text,
                replace_with,
                replace_all,
            } => self.replace_matches(search_text, replace_with, *replace_all),
            Mutation::DeleteText {
                text_to_delete,
                delete_all,
            } => self.replace_matches(text_to_delete, "", *delete_all),
            Mutation::InsertAtPosition {
                position,
                content,
                anchor_text,
            } => self.place(*position, anchor_text.as_deref(), || parse_content(content)),
            Mutation::ReplaceSection {
                start_text,
                end_text,
                new_content,
            } => self.replace_section(start_text, end_text.as_deref(), new_content),
            Mutation::SetDocumentContent { content } => {
                *self = parse_document(content)?;
                Ok(MutationOutcome::Applied)
            }
            Mutation::InsertBlock {
                kind,
                attrs,
                position,
                anchor_text,
            } => {
                if !kind.is_custom_block() {
                    return Err(DocumentError::UnsupportedBlock(*kind));
                }
                let node = Node::leaf(*kind, create_attrs(*kind, attrs)?);
                self.place(*position, anchor_text.as_deref(), || {
                    Ok(Fragment {
                        nodes: vec![node],
                        inline_only: false,
                    })
                })
            }
            Mutation::UpdateBlock {
                node_index,
                attrs,
                expected_type,
            } => {
                let Some(path) = self.checked_block_path(*node_index, *expected_type)? else {
                    return MutationOutcome::miss(NoOpReason::IndexOutOfRange);
                };
                let node = self
                    .node_at_mut(&path)
                    .ok_or_else(|| DocumentError::InvalidPath(path.clone()))?;
                node.attrs = merge_attrs(node.kind, &node.attrs, attrs)?;
                Ok(MutationOutcome::Applied)
            }
            Mutation::DeleteBlock {
                node_index,
                expected_type,
            } => {
                let Some(path) = self.checked_block_path(*node_index, *expected_type)? else {
                    return MutationOutcome::miss(NoOpReason::IndexOutOfRange);
                };
                edit::remove_node(self, &path)?;
                Ok(MutationOutcome::Applied)
            }
        }
    }

    /// Path of the node at `index`, failing loudly if it is not of the
    /// expected type.
    fn checked_block_path(
        &self,
        index: usize,
        expected: Option<NodeType>,
    ) -> Result<Option<Vec<usize>>, DocumentError> {
        let Some(location) = self.locate_block(index) else {
            return Ok(None);
        };
        if let Some(expected) = expected {
            let actual = self
                .node_at(&location.path)
                .map(|node| node.kind)
                .ok_or_else(|| DocumentError::InvalidPath(location.path.clone()))?;
            if actual != expected {
                return Err(DocumentError::StaleBlockIndex {
                    index,
                    expected,
                    actual,
                });
            }
        }
        Ok(Some(location.path))
    }

    fn replace_matches(
        &mut self,
        needle: &str,
        replacement: &str,
        all: bool,
    ) -> Result<MutationOutcome, DocumentError> {
        let index = TextPositionIndex::build(self);
        let mut matches = index.find_all(needle);
        if matches.is_empty() {
            return MutationOutcome::miss(NoOpReason::TextNotFound);
        }
        if !all {
            matches.truncate(1);
        }
        let markup = if looks_like_html(replacement) {
            Some(parse_html(replacement)?)
        } else {
            None
        };

        // Descending order keeps earlier ranges valid
        for found in matches.iter().rev() {
            match &markup {
                Some(fragment) => {
                    edit::delete_range(self, found.from, found.to)?;
                    if !fragment.is_empty() {
                        self.insert_fragment(found.from, fragment.clone())?;
                    }
                }
                None => edit::replace_text(self, found.from, found.to, replacement)?,
            }
        }
        Ok(MutationOutcome::Applied)
    }

    fn place<F>(
        &mut self,
        position: InsertPosition,
        anchor: Option<&str>,
        fragment: F,
    ) -> Result<MutationOutcome, DocumentError>
    where
        F: FnOnce() -> Result<Fragment, DocumentError>,
    {
        let target = match position {
            InsertPosition::Start | InsertPosition::End => None,
            InsertPosition::After | InsertPosition::Before => {
                let Some(anchor) = anchor.filter(|anchor| !anchor.is_empty()) else {
                    return MutationOutcome::miss(NoOpReason::AnchorRequired);
                };
                let Some(found) = TextPositionIndex::build(self).find_first(anchor) else {
                    return MutationOutcome::miss(NoOpReason::AnchorNotFound);
                };
                Some(if position == InsertPosition::After {
                    found.to
                } else {
                    found.from
                })
            }
        };

        let fragment = fragment()?;
        if fragment.is_empty() {
            return MutationOutcome::miss(NoOpReason::EmptyContent);
        }

        match (position, target) {
            (InsertPosition::Start, _) => edit::insert_top_level(self, 0, fragment.into_blocks()),
            (InsertPosition::End, _) | (_, None) => {
                edit::insert_top_level(self, usize::MAX, fragment.into_blocks())
            }
            (_, Some(pos)) => self.insert_fragment(pos, fragment)?,
        }
        Ok(MutationOutcome::Applied)
    }

    fn insert_fragment(&mut self, pos: usize, fragment: Fragment) -> Result<(), DocumentError> {
        if fragment.inline_only {
            edit::insert_inline(self, pos, fragment.nodes)
        } else {
            edit::insert_blocks(self, pos, fragment.nodes)
        }
    }

    fn replace_section(
        &mut self,
        start_text: &str,
        end_text: Option<&str>,
        new_content: &str,
    ) -> Result<MutationOutcome, DocumentError> {
        let index = TextPositionIndex::build(self);
        let Some(start) = index.find_first(start_text) else {
            return MutationOutcome::miss(NoOpReason::TextNotFound);
        };
        let to = end_text
            .filter(|end| !end.is_empty())
            .and_then(|end| index.find_first_after(end, start.end))
            .map(|found| found.to)
            .unwrap_or_else(|| self.content_size());

        let fragment = parse_content(new_content)?;
        edit::delete_range(self, start.from, to)?;
        if !fragment.is_empty() {
            self.insert_fragment(start.from, fragment)?;
        }
        Ok(MutationOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::html::to_html;
    use serde_json::json;

    fn html(content: &str) -> Document {
        parse_document(content).unwrap()
    }

    fn find_replace(search: &str, replace: &str, all: bool) -> Mutation {
        Mutation::FindAndReplace {
            search_text: search.to_string(),
            replace_with: replace.to_string(),
            replace_all: all,
        }
    }

    fn delete_text(text: &str, all: bool) -> Mutation {
        Mutation::DeleteText {
            text_to_delete: text.to_string(),
            delete_all: all,
        }
    }

    fn insert_block(kind: NodeType, attrs: serde_json::Value) -> Mutation {
        Mutation::InsertBlock {
            kind,
            attrs: attrs.as_object().cloned().unwrap_or_default(),
            position: InsertPosition::End,
            anchor_text: None,
        }
    }

    #[test]
    fn test_find_and_replace_first_occurrence() {
        let mut doc = html("<p>Hello world</p>");
        let outcome = doc.apply(&find_replace("world", "proposal", false)).unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(doc.plain_text(), "Hello proposal");
    }

    #[test]
    fn test_find_and_replace_all_across_paragraphs() {
        let mut doc = html("<p>cat and cat</p><p>one cat</p>");
        doc.apply(&find_replace("cat", "dog", true)).unwrap();
        assert_eq!(doc.plain_text(), "dog and dogone dog");
        assert_eq!(doc.root().content.len(), 2);
    }

    #[test]
    fn test_find_and_replace_with_markup() {
        let mut doc = html("<p>Total: 100</p>");
        doc.apply(&find_replace("100", "<strong>120</strong>", false))
            .unwrap();
        assert_eq!(to_html(&doc), "<p>Total: <strong>120</strong></p>");
    }

    #[test]
    fn test_find_and_replace_only_first_when_not_all() {
        let mut doc = html("<p>a-a-a</p>");
        doc.apply(&find_replace("a", "b", false)).unwrap();
        assert_eq!(doc.plain_text(), "b-a-a");
    }

    #[test]
    fn test_delete_text_all_occurrences_exact_whitespace() {
        let mut doc = html("<p>foo bar foo baz foo</p>");
        doc.apply(&delete_text("foo", true)).unwrap();
        assert_eq!(doc.plain_text(), " bar  baz ");

        let second = doc.apply(&delete_text("foo", true)).unwrap();
        assert_eq!(
            second,
            MutationOutcome::NoOp {
                reason: NoOpReason::TextNotFound
            }
        );
        assert_eq!(doc.plain_text(), " bar  baz ");
    }

    #[test]
    fn test_delete_text_removes_every_occurrence_for_any_count() {
        for n in 0..=5 {
            let mut source = String::from("start");
            for i in 0..n {
                source.push_str(&format!(" X{i} target"));
            }
            let mut doc = html(&format!("<p>{source}</p><p>target end</p>"));
            let expected = doc.plain_text().replace("target", "");
            doc.apply(&delete_text("target", true)).unwrap();
            assert_eq!(doc.plain_text(), expected, "n = {n}");
        }
    }

    #[test]
    fn test_misses_leave_snapshot_identical() {
        let mut doc = html("<p>Alpha <strong>beta</strong></p><ul><li><p>gamma</p></li></ul>");
        let before = serde_json::to_string(&doc).unwrap();

        for mutation in [
            find_replace("X", "Y", false),
            delete_text("X", false),
            Mutation::InsertAtPosition {
                position: InsertPosition::After,
                content: "<p>new</p>".to_string(),
                anchor_text: Some("X".to_string()),
            },
        ] {
            let outcome = doc.apply(&mutation).unwrap();
            assert!(!outcome.is_applied());
            assert_eq!(serde_json::to_string(&doc).unwrap(), before);
        }
    }

    #[test]
    fn test_insert_after_anchor_inline() {
        let mut doc = html("<p>Hello world</p>");
        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::After,
            content: ", dear".to_string(),
            anchor_text: Some("Hello".to_string()),
        })
        .unwrap();
        assert_eq!(doc.plain_text(), "Hello, dear world");
    }

    #[test]
    fn test_insert_before_anchor_block() {
        let mut doc = html("<p>Intro</p><p>Closing words</p>");
        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::Before,
            content: "<h2>Pricing</h2>".to_string(),
            anchor_text: Some("Closing".to_string()),
        })
        .unwrap();
        assert_eq!(to_html(&doc), "<p>Intro</p><h2>Pricing</h2><p>Closing words</p>");
    }

    #[test]
    fn test_insert_requires_anchor() {
        let mut doc = html("<p>x</p>");
        let outcome = doc
            .apply(&Mutation::InsertAtPosition {
                position: InsertPosition::Before,
                content: "y".to_string(),
                anchor_text: None,
            })
            .unwrap();
        assert_eq!(
            outcome,
            MutationOutcome::NoOp {
                reason: NoOpReason::AnchorRequired
            }
        );
    }

    #[test]
    fn test_insert_at_start_and_end() {
        let mut doc = html("<p>middle</p>");
        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::Start,
            content: "first".to_string(),
            anchor_text: None,
        })
        .unwrap();
        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::End,
            content: "<p>last</p>".to_string(),
            anchor_text: None,
        })
        .unwrap();
        assert_eq!(to_html(&doc), "<p>first</p><p>middle</p><p>last</p>");
    }

    #[test]
    fn test_replace_section_between_markers() {
        let mut doc = html("<h2>Offer</h2><p>old text</p><p>more old</p><h2>Contact</h2><p>mail</p>");
        doc.apply(&Mutation::ReplaceSection {
            start_text: "old text".to_string(),
            end_text: Some("more old".to_string()),
            new_content: "<p>new text</p>".to_string(),
        })
        .unwrap();
        assert_eq!(
            to_html(&doc),
            "<h2>Offer</h2><p>new text</p><h2>Contact</h2><p>mail</p>"
        );
    }

    #[test]
    fn test_replace_section_to_document_end() {
        let mut doc = html("<p>Keep</p><h2>Terms</h2><p>a</p><div data-call-to-action></div>");
        doc.apply(&Mutation::ReplaceSection {
            start_text: "Terms".to_string(),
            end_text: Some("missing".to_string()),
            new_content: "<h2>New terms</h2>".to_string(),
        })
        .unwrap();
        assert_eq!(to_html(&doc), "<p>Keep</p><h2>New terms</h2>");
    }

    #[test]
    fn test_replace_section_missing_start_is_noop() {
        let mut doc = html("<p>Keep</p>");
        let outcome = doc
            .apply(&Mutation::ReplaceSection {
                start_text: "nope".to_string(),
                end_text: None,
                new_content: "x".to_string(),
            })
            .unwrap();
        assert!(!outcome.is_applied());
    }

    #[test]
    fn test_set_document_content_replaces_everything() {
        let mut doc = html("<p>old</p>");
        doc.apply(&Mutation::SetDocumentContent {
            content: "<h1>Proposal</h1><p>Body</p>".to_string(),
        })
        .unwrap();
        assert_eq!(doc.plain_text(), "ProposalBody");
    }

    #[test]
    fn test_insert_call_to_action_into_empty_document() {
        let mut doc = Document::empty();
        doc.apply(&insert_block(NodeType::CallToAction, json!({}))).unwrap();
        let ctas = doc.get_all_blocks(Some(NodeType::CallToAction));
        assert_eq!(ctas.len(), 1);
        let attrs = &ctas[0].attrs;
        assert_eq!(attrs["title"], "Ready to get started?");
        assert_eq!(attrs["description"], "Join thousands of satisfied customers today.");
        assert_eq!(attrs["buttonText"], "Get Started");
        assert_eq!(attrs["buttonLink"], "#");
    }

    #[test]
    fn test_insert_pricing_card_merges_defaults() {
        let mut doc = Document::empty();
        doc.apply(&insert_block(NodeType::PricingCard, json!({"title": "Pro"})))
            .unwrap();
        let card = &doc.get_all_blocks(Some(NodeType::PricingCard))[0].attrs;
        assert_eq!(card["title"], "Pro");
        assert_eq!(card["price"], "$49");
        assert_eq!(card["period"], "month");
        assert_eq!(card["features"], json!(["Feature 1", "Feature 2", "Feature 3"]));
        assert_eq!(card["highlighted"], false);
    }

    #[test]
    fn test_insert_block_rejects_non_custom_type() {
        let mut doc = Document::empty();
        let err = doc
            .apply(&insert_block(NodeType::Paragraph, json!({})))
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedBlock(NodeType::Paragraph)));
    }

    #[test]
    fn test_get_all_blocks_then_delete_reindexes() {
        let mut doc = html("<p>A</p><p>B</p><p>C</p>");
        let blocks = doc.get_all_blocks(None);
        assert_eq!(
            blocks.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(blocks.iter().all(|b| b.kind == NodeType::Paragraph));

        doc.apply(&Mutation::DeleteBlock {
            node_index: 1,
            expected_type: None,
        })
        .unwrap();
        let blocks = doc.get_all_blocks(None);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].text.as_deref(), Some("A"));
        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].text.as_deref(), Some("C"));
    }

    #[test]
    fn test_stale_index_addresses_wrong_node() {
        let mut doc = html("<p>A</p><div data-feature-list></div><p>C</p>");
        let feature_index = doc.get_all_blocks(Some(NodeType::FeatureList))[0].index;
        assert_eq!(feature_index, 1);

        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::Start,
            content: "<p>New first</p>".to_string(),
            anchor_text: None,
        })
        .unwrap();

        // Unguarded update lands on the paragraph that now holds index 1
        doc.apply(&Mutation::UpdateBlock {
            node_index: feature_index,
            attrs: json!({"title": "Renamed"}).as_object().cloned().unwrap(),
            expected_type: None,
        })
        .unwrap();
        let list = &doc.get_all_blocks(Some(NodeType::FeatureList))[0];
        assert_eq!(list.attrs["title"], "Features");
        assert_eq!(doc.get_block(1).kind, "paragraph");
    }

    #[test]
    fn test_expected_type_guards_stale_index() {
        let mut doc = html("<p>A</p><div data-feature-list></div>");
        doc.apply(&Mutation::InsertAtPosition {
            position: InsertPosition::Start,
            content: "<p>New first</p>".to_string(),
            anchor_text: None,
        })
        .unwrap();
        let before = serde_json::to_string(&doc).unwrap();

        let err = doc
            .apply(&Mutation::UpdateBlock {
                node_index: 1,
                attrs: json!({"title": "Renamed"}).as_object().cloned().unwrap(),
                expected_type: Some(NodeType::FeatureList),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::StaleBlockIndex {
                index: 1,
                expected: NodeType::FeatureList,
                actual: NodeType::Paragraph
            }
        ));
        assert_eq!(serde_json::to_string(&doc).unwrap(), before);
    }

    #[test]
    fn test_update_block_merges_and_validates() {
        let mut doc = Document::empty();
        doc.apply(&insert_block(NodeType::PricingCard, json!({"title": "Pro"})))
            .unwrap();
        let index = doc.get_all_blocks(Some(NodeType::PricingCard))[0].index;

        doc.apply(&Mutation::UpdateBlock {
            node_index: index,
            attrs: json!({"price": "$99"}).as_object().cloned().unwrap(),
            expected_type: Some(NodeType::PricingCard),
        })
        .unwrap();
        let card = doc.get_block(index).attrs.unwrap();
        assert_eq!(card["title"], "Pro");
        assert_eq!(card["price"], "$99");

        let err = doc
            .apply(&Mutation::UpdateBlock {
                node_index: index,
                attrs: json!({"highlighted": "yes"}).as_object().cloned().unwrap(),
                expected_type: None,
            })
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_out_of_range_index_is_noop() {
        let mut doc = html("<p>A</p>");
        for mutation in [
            Mutation::UpdateBlock {
                node_index: 7,
                attrs: Attrs::new(),
                expected_type: None,
            },
            Mutation::DeleteBlock {
                node_index: 7,
                expected_type: None,
            },
        ] {
            assert_eq!(
                doc.apply(&mutation).unwrap(),
                MutationOutcome::NoOp {
                    reason: NoOpReason::IndexOutOfRange
                }
            );
        }
    }
}
