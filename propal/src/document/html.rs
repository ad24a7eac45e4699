//! HTML content: parsing model-issued fragments into nodes and serializing a
//! document back to HTML for model context.
//!
//! Custom blocks travel as `div[data-pricing-card]`, `div[data-feature-list]`
//! and `div[data-call-to-action]` carrying their attributes as `data-*`.
//! Multi-line content without any markup is read as Markdown.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, Attribute, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use pulldown_cmark::{html as md_html, Options, Parser};
use serde_json::Value;

use super::blocks::{create_attrs, default_attrs};
use super::edit::normalize_inline;
use super::node::{Attrs, Document, Mark, MarkType, Node, NodeType};
use super::DocumentError;

/// Parsed content ready to be placed in a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub nodes: Vec<Node>,
    /// True when the content holds no block-level element
    pub inline_only: bool,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Block form of the fragment; inline runs are wrapped in a paragraph.
    pub fn into_blocks(self) -> Vec<Node> {
        if self.inline_only {
            if self.nodes.is_empty() {
                Vec::new()
            } else {
                vec![Node::paragraph(self.nodes)]
            }
        } else {
            self.nodes
        }
    }
}

/// Parse instruction content (HTML, Markdown, or plain text).
pub fn parse_content(content: &str) -> Result<Fragment, DocumentError> {
    if content.trim().is_empty() {
        return Ok(Fragment::default());
    }
    if !looks_like_html(content) {
        if !content.contains('\n') {
            return Ok(Fragment {
                nodes: vec![Node::text(content, Vec::new())],
                inline_only: true,
            });
        }
        return parse_html(&markdown_to_html(content));
    }
    parse_html(content)
}

/// Replace the whole document from HTML, Markdown, or editor JSON.
pub fn parse_document(content: &str) -> Result<Document, DocumentError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        return Document::from_json(value);
    }
    Ok(Document::from_blocks(parse_content(content)?.into_blocks()))
}

pub(crate) fn looks_like_html(content: &str) -> bool {
    let bytes = content.as_bytes();
    bytes.windows(2).any(|pair| {
        pair[0] == b'<' && (pair[1].is_ascii_alphabetic() || pair[1] == b'/' || pair[1] == b'!')
    })
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

pub fn parse_html(html: &str) -> Result<Fragment, DocumentError> {
    let dom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        vec![],
    )
    .one(html);

    // Fragment parsing yields a single <html> element holding the nodes
    let document_children = dom.document.children.borrow();
    let Some(root) = document_children.first() else {
        return Ok(Fragment::default());
    };

    let mut builder = BlockBuilder::default();
    builder.children(root, &[]);
    Ok(builder.finish())
}

// ============================================================================
// DOM to nodes
// ============================================================================

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Node>,
    pending: Vec<Node>,
    saw_block: bool,
}

impl BlockBuilder {
    fn finish(mut self) -> Fragment {
        if !self.saw_block {
            let nodes = collapse_whitespace(normalize_inline(self.pending), false);
            return Fragment {
                inline_only: true,
                nodes,
            };
        }
        self.flush();
        Fragment {
            nodes: self.blocks,
            inline_only: false,
        }
    }

    fn flush(&mut self) {
        let inline = collapse_whitespace(normalize_inline(std::mem::take(&mut self.pending)), true);
        if !inline.is_empty() {
            self.blocks.push(Node::paragraph(inline));
        }
    }

    fn push_block(&mut self, block: Node) {
        self.saw_block = true;
        self.flush();
        self.blocks.push(block);
    }

    fn children(&mut self, handle: &Handle, marks: &[Mark]) {
        for child in handle.children.borrow().iter() {
            self.node(child, marks);
        }
    }

    fn node(&mut self, handle: &Handle, marks: &[Mark]) {
        match &handle.data {
            NodeData::Text { contents } => {
                self.pending
                    .push(Node::text(contents.borrow().to_string(), marks.to_vec()));
            }
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.to_ascii_lowercase();
                let attrs = attrs.borrow();
                if let Some(block) = block_element(&tag, handle, &attrs) {
                    self.push_block(block);
                } else if is_block_wrapper(&tag) {
                    self.saw_block = true;
                    self.flush();
                    self.children(handle, marks);
                    self.flush();
                } else {
                    self.pending.extend(inline_element(&tag, handle, &attrs, marks));
                }
            }
            _ => {}
        }
    }
}

fn is_block_wrapper(tag: &str) -> bool {
    matches!(
        tag,
        "div" | "section" | "article" | "header" | "footer" | "main" | "aside" | "nav" | "body"
    )
}

fn attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| &*attr.value)
}

fn block_element(tag: &str, handle: &Handle, attrs: &[Attribute]) -> Option<Node> {
    let node = match tag {
        "p" => Node::paragraph(textblock_content(handle)),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<u64>().unwrap_or(1).min(3);
            let mut node_attrs = Attrs::new();
            node_attrs.insert("level".to_string(), Value::from(level));
            Node::element(NodeType::Heading, node_attrs, textblock_content(handle))
        }
        "ul" => Node::element(NodeType::BulletList, Attrs::new(), list_items(handle)),
        "ol" => {
            let start = attr(attrs, "start")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1);
            let mut node_attrs = Attrs::new();
            node_attrs.insert("start".to_string(), Value::from(start));
            Node::element(NodeType::OrderedList, node_attrs, list_items(handle))
        }
        "li" => list_item(handle),
        "blockquote" => {
            let mut content = nested_blocks(handle);
            if content.is_empty() {
                content.push(Node::paragraph(Vec::new()));
            }
            Node::element(NodeType::Blockquote, Attrs::new(), content)
        }
        "pre" => code_block(handle),
        "hr" => Node::leaf(NodeType::HorizontalRule, Attrs::new()),
        "img" => {
            let mut node_attrs = Attrs::new();
            for name in ["src", "alt", "title"] {
                let value = attr(attrs, name).map(Value::from).unwrap_or(Value::Null);
                node_attrs.insert(name.to_string(), value);
            }
            Node::leaf(NodeType::Image, node_attrs)
        }
        "div" => custom_block(attrs)?,
        _ => return None,
    };
    Some(node)
}

fn custom_block(attrs: &[Attribute]) -> Option<Node> {
    let (kind, fields): (NodeType, &[&str]) = if attr(attrs, "data-pricing-card").is_some() {
        (
            NodeType::PricingCard,
            &["title", "price", "period", "features", "highlighted"],
        )
    } else if attr(attrs, "data-feature-list").is_some() {
        (NodeType::FeatureList, &["title", "features"])
    } else if attr(attrs, "data-call-to-action").is_some() {
        (
            NodeType::CallToAction,
            &["title", "description", "buttonText", "buttonLink"],
        )
    } else {
        return None;
    };

    let mut supplied = Attrs::new();
    for field in fields {
        let Some(raw) = attr(attrs, &data_attr_name(field)) else {
            continue;
        };
        let value = match *field {
            "features" => serde_json::from_str::<Vec<String>>(raw)
                .map(Value::from)
                .unwrap_or(Value::Null),
            "highlighted" => Value::Bool(raw == "true"),
            _ => Value::from(raw),
        };
        supplied.insert(field.to_string(), value);
    }

    // Malformed data-* values fall back to defaults rather than failing the parse
    let attrs = create_attrs(kind, &supplied).unwrap_or_else(|_| default_attrs(kind));
    Some(Node::leaf(kind, attrs))
}

/// `buttonText` travels as `data-button-text`.
fn data_attr_name(field: &str) -> String {
    let mut name = String::from("data-");
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            name.push('-');
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push(ch);
        }
    }
    name
}

fn textblock_content(handle: &Handle) -> Vec<Node> {
    let mut inline = Vec::new();
    for child in handle.children.borrow().iter() {
        collect_inline(child, &[], &mut inline);
    }
    collapse_whitespace(normalize_inline(inline), true)
}

fn nested_blocks(handle: &Handle) -> Vec<Node> {
    let mut builder = BlockBuilder {
        saw_block: true,
        ..Default::default()
    };
    builder.children(handle, &[]);
    builder.finish().nodes
}

fn list_items(handle: &Handle) -> Vec<Node> {
    let mut items = Vec::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { name, .. } = &child.data {
            if &*name.local == "li" {
                items.push(list_item(child));
            }
        }
    }
    if items.is_empty() {
        items.push(Node::element(
            NodeType::ListItem,
            Attrs::new(),
            vec![Node::paragraph(Vec::new())],
        ));
    }
    items
}

fn list_item(handle: &Handle) -> Node {
    let mut content = nested_blocks(handle);
    if content.first().map(|node| node.kind) != Some(NodeType::Paragraph) {
        content.insert(0, Node::paragraph(Vec::new()));
    }
    Node::element(NodeType::ListItem, Attrs::new(), content)
}

fn code_block(handle: &Handle) -> Node {
    let mut text = String::new();
    let mut language = Value::Null;
    collect_raw_text(handle, &mut text, &mut language);
    let text = text.strip_suffix('\n').unwrap_or(&text).to_string();

    let mut attrs = Attrs::new();
    attrs.insert("language".to_string(), language);
    let content = if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text, Vec::new())]
    };
    Node::element(NodeType::CodeBlock, attrs, content)
}

fn collect_raw_text(handle: &Handle, out: &mut String, language: &mut Value) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { name, attrs, .. } => {
                if &*name.local == "code" && language.is_null() {
                    if let Some(lang) = attr(&attrs.borrow(), "class")
                        .and_then(|class| class.split_whitespace().find_map(|c| c.strip_prefix("language-")))
                    {
                        *language = Value::from(lang);
                    }
                }
                collect_raw_text(child, out, language);
            }
            _ => {}
        }
    }
}

fn inline_element(tag: &str, handle: &Handle, attrs: &[Attribute], marks: &[Mark]) -> Vec<Node> {
    if tag == "br" {
        return vec![Node::leaf(NodeType::HardBreak, Attrs::new())];
    }

    let mark = match tag {
        "strong" | "b" => Some(Mark::new(MarkType::Bold)),
        "em" | "i" => Some(Mark::new(MarkType::Italic)),
        "u" => Some(Mark::new(MarkType::Underline)),
        "s" | "del" | "strike" => Some(Mark::new(MarkType::Strike)),
        "code" => Some(Mark::new(MarkType::Code)),
        "mark" => Some(Mark::new(MarkType::Highlight)),
        "a" => attr(attrs, "href").map(Mark::link),
        _ => None,
    };

    let mut nested = marks.to_vec();
    if let Some(mark) = mark {
        if !nested.iter().any(|m| m.kind == mark.kind) {
            nested.push(mark);
        }
    }

    let mut out = Vec::new();
    for child in handle.children.borrow().iter() {
        collect_inline(child, &nested, &mut out);
    }
    out
}

fn collect_inline(handle: &Handle, marks: &[Mark], out: &mut Vec<Node>) {
    match &handle.data {
        NodeData::Text { contents } => {
            out.push(Node::text(contents.borrow().to_string(), marks.to_vec()));
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_ascii_lowercase();
            out.extend(inline_element(&tag, handle, &attrs.borrow(), marks));
        }
        _ => {}
    }
}

/// Collapse whitespace runs to single spaces; `trim` strips the ends of the
/// run as a textblock does.
fn collapse_whitespace(content: Vec<Node>, trim: bool) -> Vec<Node> {
    let mut out = Vec::with_capacity(content.len());
    let mut prev_space = trim;
    for mut node in content {
        if node.is_text() {
            let mut collapsed = String::with_capacity(node.text_str().len());
            for ch in node.text_str().chars() {
                if ch.is_whitespace() {
                    if !prev_space {
                        collapsed.push(' ');
                    }
                    prev_space = true;
                } else {
                    collapsed.push(ch);
                    prev_space = false;
                }
            }
            node.text = Some(collapsed);
        } else {
            prev_space = node.kind == NodeType::HardBreak;
        }
        out.push(node);
    }

    if trim {
        if let Some(last) = out.iter_mut().rev().find(|node| node.is_text()) {
            let trimmed = last.text_str().trim_end().to_string();
            last.text = Some(trimmed);
        }
    }
    normalize_inline(out)
}

// ============================================================================
// Nodes to HTML
// ============================================================================

pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.root().content {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node.kind {
        NodeType::Doc => node.content.iter().for_each(|child| write_node(child, out)),
        NodeType::Text => write_text(node, out),
        NodeType::Paragraph => wrap(out, "p", "", &node.content),
        NodeType::Heading => {
            let level = node
                .attrs
                .get("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 3);
            wrap(out, &format!("h{level}"), "", &node.content);
        }
        NodeType::BulletList => wrap(out, "ul", "", &node.content),
        NodeType::OrderedList => {
            let start = node.attrs.get("start").and_then(Value::as_u64).unwrap_or(1);
            let extra = if start == 1 {
                String::new()
            } else {
                format!(" start=\"{start}\"")
            };
            wrap(out, "ol", &extra, &node.content);
        }
        NodeType::ListItem => wrap(out, "li", "", &node.content),
        NodeType::Blockquote => wrap(out, "blockquote", "", &node.content),
        NodeType::CodeBlock => {
            out.push_str("<pre><code");
            if let Some(lang) = node.attrs.get("language").and_then(Value::as_str) {
                out.push_str(&format!(" class=\"language-{}\"", escape_attr(lang)));
            }
            out.push('>');
            out.push_str(&escape_text(&node.text_content()));
            out.push_str("</code></pre>");
        }
        NodeType::HorizontalRule => out.push_str("<hr>"),
        NodeType::HardBreak => out.push_str("<br>"),
        NodeType::Image => {
            out.push_str("<img");
            for name in ["src", "alt", "title"] {
                if let Some(value) = node.attrs.get(name).and_then(Value::as_str) {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
            }
            out.push('>');
        }
        NodeType::PricingCard => write_custom_block(node, "data-pricing-card", out),
        NodeType::FeatureList => write_custom_block(node, "data-feature-list", out),
        NodeType::CallToAction => write_custom_block(node, "data-call-to-action", out),
    }
}

fn wrap(out: &mut String, tag: &str, extra: &str, content: &[Node]) {
    out.push('<');
    out.push_str(tag);
    out.push_str(extra);
    out.push('>');
    for child in content {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn mark_tags(mark: &Mark) -> (String, &'static str) {
    match mark.kind {
        MarkType::Bold => ("<strong>".to_string(), "</strong>"),
        MarkType::Italic => ("<em>".to_string(), "</em>"),
        MarkType::Underline => ("<u>".to_string(), "</u>"),
        MarkType::Strike => ("<s>".to_string(), "</s>"),
        MarkType::Code => ("<code>".to_string(), "</code>"),
        MarkType::Highlight => ("<mark>".to_string(), "</mark>"),
        MarkType::Link => {
            let href = mark.attrs.get("href").and_then(Value::as_str).unwrap_or("");
            (format!("<a href=\"{}\">", escape_attr(href)), "</a>")
        }
    }
}

fn write_text(node: &Node, out: &mut String) {
    let tags: Vec<_> = node.marks.iter().map(mark_tags).collect();
    for (open, _) in &tags {
        out.push_str(open);
    }
    out.push_str(&escape_text(node.text_str()));
    for (_, close) in tags.iter().rev() {
        out.push_str(close);
    }
}

fn write_custom_block(node: &Node, marker: &str, out: &mut String) {
    out.push_str("<div ");
    out.push_str(marker);
    out.push_str("=\"\"");
    for (name, value) in &node.attrs {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) | Value::Null => continue,
            other => other.to_string(),
        };
        out.push_str(&format!(
            " {}=\"{}\"",
            data_attr_name(name),
            escape_attr(&rendered)
        ));
    }
    out.push_str("></div>");
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paragraphs() {
        let doc = parse_document("<p>A</p><p>B</p><p>C</p>").unwrap();
        assert_eq!(doc.root().content.len(), 3);
        assert_eq!(doc.plain_text(), "ABC");
    }

    #[test]
    fn test_inline_fragment_keeps_edge_space() {
        let fragment = parse_content("<strong>Important</strong> note").unwrap();
        assert!(fragment.inline_only);
        assert_eq!(fragment.nodes.len(), 2);
        assert_eq!(fragment.nodes[0].marks[0].kind, MarkType::Bold);
        assert_eq!(fragment.nodes[1].text_str(), " note");
    }

    #[test]
    fn test_plain_single_line_is_verbatim_text() {
        let fragment = parse_content(" and more").unwrap();
        assert!(fragment.inline_only);
        assert_eq!(fragment.nodes[0].text_str(), " and more");
    }

    #[test]
    fn test_markdown_fallback() {
        let fragment = parse_content("# Title\n\n- one\n- two").unwrap();
        assert!(!fragment.inline_only);
        let kinds: Vec<_> = fragment.nodes.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NodeType::Heading, NodeType::BulletList]);
    }

    #[test]
    fn test_custom_blocks_from_data_attributes() {
        let fragment = parse_content(
            r#"<div data-pricing-card="" data-title="Pro" data-features='["A","B"]' data-highlighted="true"></div>
               <div data-call-to-action data-button-text="Buy"></div>"#,
        )
        .unwrap();
        assert_eq!(fragment.nodes.len(), 2);
        let card = &fragment.nodes[0];
        assert_eq!(card.kind, NodeType::PricingCard);
        assert_eq!(card.attrs["title"], "Pro");
        assert_eq!(card.attrs["price"], "$49");
        assert_eq!(card.attrs["features"], serde_json::json!(["A", "B"]));
        assert_eq!(card.attrs["highlighted"], true);
        let cta = &fragment.nodes[1];
        assert_eq!(cta.attrs["buttonText"], "Buy");
        assert_eq!(cta.attrs["buttonLink"], "#");
    }

    #[test]
    fn test_whitespace_collapses_inside_blocks() {
        let doc = parse_document("<p>  Hello \n  world  </p>").unwrap();
        assert_eq!(doc.plain_text(), "Hello world");
    }

    #[test]
    fn test_list_items_get_paragraphs() {
        let doc = parse_document("<ul><li>one</li><li><p>two</p></li></ul>").unwrap();
        let list = &doc.root().content[0];
        assert_eq!(list.kind, NodeType::BulletList);
        assert_eq!(list.content.len(), 2);
        for item in &list.content {
            assert_eq!(item.content[0].kind, NodeType::Paragraph);
        }
        assert_eq!(doc.plain_text(), "onetwo");
    }

    #[test]
    fn test_html_roundtrip() {
        let html = concat!(
            "<h2>Offer</h2>",
            "<p>Plain <strong>bold</strong> &amp; <a href=\"https://x.io\">link</a></p>",
            "<ul><li><p>one</p></li></ul>",
            "<div data-feature-list=\"\" data-features=\"[&quot;A&quot;]\" data-title=\"Why us\"></div>"
        );
        let doc = parse_document(html).unwrap();
        assert_eq!(to_html(&doc), html);
    }

    #[test]
    fn test_parse_document_accepts_editor_json() {
        let doc = parse_document(
            r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"x"}]}]}"#,
        )
        .unwrap();
        assert_eq!(doc.plain_text(), "x");
    }
}
