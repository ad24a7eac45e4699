//! Mapping between plain-text character offsets and structural positions.

use super::node::{Document, WalkControl};

/// One literal occurrence of a needle in the plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    /// Character offsets into the plain text, end exclusive
    pub start: usize,
    pub end: usize,
    /// Structural range covering the matched characters
    pub from: usize,
    pub to: usize,
}

/// Plain text of a document plus the structural position of every character.
///
/// Built from scratch for each call; never reuse one across mutations.
#[derive(Debug, Clone)]
pub struct TextPositionIndex {
    text: String,
    positions: Vec<usize>,
}

impl TextPositionIndex {
    pub fn build(doc: &Document) -> Self {
        let mut text = String::new();
        let mut positions = Vec::new();
        doc.walk(|visit| {
            if visit.node.is_text() {
                for (offset, ch) in visit.node.text_str().chars().enumerate() {
                    text.push(ch);
                    positions.push(visit.pos + offset);
                }
            }
            WalkControl::Continue
        });
        Self { text, positions }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Structural position of the character at `offset`.
    pub fn position_of(&self, offset: usize) -> Option<usize> {
        self.positions.get(offset).copied()
    }

    /// Non-overlapping literal matches, scanning left to right.
    pub fn find_all(&self, needle: &str) -> Vec<TextMatch> {
        self.find_from(needle, 0, usize::MAX)
    }

    pub fn find_first(&self, needle: &str) -> Option<TextMatch> {
        self.find_from(needle, 0, 1).into_iter().next()
    }

    /// First match starting at or after character offset `start`.
    pub fn find_first_after(&self, needle: &str, start: usize) -> Option<TextMatch> {
        self.find_from(needle, start, 1).into_iter().next()
    }

    fn find_from(&self, needle: &str, start_char: usize, limit: usize) -> Vec<TextMatch> {
        if needle.is_empty() || start_char >= self.positions.len() {
            return Vec::new();
        }

        let start_byte = self
            .text
            .char_indices()
            .nth(start_char)
            .map(|(byte, _)| byte)
            .unwrap_or(self.text.len());
        let haystack = &self.text[start_byte..];
        let needle_chars = needle.chars().count();

        let mut matches = Vec::new();
        let mut last_byte = 0;
        let mut last_char = start_char;
        for (byte, _) in haystack.match_indices(needle).take(limit) {
            last_char += haystack[last_byte..byte].chars().count();
            last_byte = byte;

            let start = last_char;
            let end = start + needle_chars;
            matches.push(TextMatch {
                start,
                end,
                from: self.positions[start],
                to: self.positions[end - 1] + 1,
            });
        }
        matches
    }
}
