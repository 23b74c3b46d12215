//! Markdown front end: text → [`Node`] tree → text.
//!
//! Parsing uses pulldown-cmark's offset iterator so every node carries the
//! byte span it came from. Rendering does not regenerate markdown; it copies
//! the original source and splices the `value` of each converted node over
//! the span of the `image` it replaced. Everything the resolver did not touch
//! comes out byte-for-byte identical.

use crate::ast::{kind, Node, Point, Position};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde_json::Value;
use std::collections::HashSet;
use std::ops::Range;

/// A markdown file parsed into a tree, with its source kept for rendering.
#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    source: String,
    root: Node,
    image_spans: HashSet<Range<usize>>,
}

impl MarkdownDocument {
    /// Parse markdown text (CommonMark + tables, strikethrough, footnotes,
    /// task lists).
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let (root, image_spans) = build_tree(&source);
        Self {
            source,
            root,
            image_spans,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Write the document back out, replacing each converted image with its
    /// HTML fragment.
    pub fn render(&self) -> String {
        let mut replacements: Vec<(Range<usize>, &str)> = self
            .root
            .select_all(kind::HTML)
            .into_iter()
            .filter_map(|node| {
                let span = node.position?.span()?;
                if !self.image_spans.contains(&span) {
                    return None;
                }
                Some((span, node.value.as_deref()?))
            })
            .collect();
        replacements.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (span, html) in replacements {
            if span.start < cursor || span.end > self.source.len() {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(html);
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
}

fn build_tree(source: &str) -> (Node, HashSet<Range<usize>>) {
    let lines = LineIndex::new(source);
    let mut root = Node::root(Vec::new());
    root.position = Some(lines.position(0..source.len()));

    let mut stack: Vec<Node> = vec![root];
    let mut image_spans = HashSet::new();

    for (event, range) in Parser::new_ext(source, options()).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                let mut node = node_for_tag(tag);
                node.position = Some(lines.position(range));
                stack.push(node);
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    close_top(&mut stack, &mut image_spans);
                }
            }
            Event::Text(text) => {
                if append_to_open_literal(&mut stack, &text) {
                    continue;
                }
                push_leaf(&mut stack, kind::TEXT, text.into_string(), &lines, range);
            }
            Event::Code(text) => {
                if append_to_open_literal(&mut stack, &text) {
                    continue;
                }
                push_leaf(&mut stack, kind::INLINE_CODE, text.into_string(), &lines, range);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                push_leaf(&mut stack, kind::HTML, html.into_string(), &lines, range);
            }
            Event::SoftBreak => {
                if append_to_open_literal(&mut stack, " ") {
                    continue;
                }
                push_leaf(&mut stack, kind::TEXT, "\n".to_string(), &lines, range);
            }
            Event::HardBreak => {
                let mut node = Node::new(kind::BREAK);
                node.position = Some(lines.position(range));
                attach(&mut stack, node);
            }
            Event::Rule => {
                let mut node = Node::new(kind::THEMATIC_BREAK);
                node.position = Some(lines.position(range));
                attach(&mut stack, node);
            }
            _ => {}
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack, &mut image_spans);
    }
    let root = stack.pop().unwrap_or_else(|| Node::root(Vec::new()));
    (root, image_spans)
}

fn node_for_tag(tag: Tag<'_>) -> Node {
    match tag {
        Tag::Paragraph => Node::parent(kind::PARAGRAPH),
        Tag::Heading { level, .. } => {
            let mut node = Node::parent(kind::HEADING);
            node.data.insert("depth".into(), Value::from(level as u32));
            node
        }
        Tag::BlockQuote(_) => Node::parent(kind::BLOCKQUOTE),
        Tag::CodeBlock(block) => {
            let mut node = Node::new(kind::CODE);
            if let CodeBlockKind::Fenced(info) = block {
                if let Some(lang) = info.split_whitespace().next() {
                    node.data.insert("lang".into(), Value::from(lang));
                }
            }
            node
        }
        Tag::List(start) => {
            let mut node = Node::parent(kind::LIST);
            node.data
                .insert("ordered".into(), Value::from(start.is_some()));
            if let Some(start) = start {
                node.data.insert("start".into(), Value::from(start));
            }
            node
        }
        Tag::Item => Node::parent(kind::LIST_ITEM),
        Tag::FootnoteDefinition(label) => {
            let mut node = Node::parent(kind::FOOTNOTE_DEFINITION);
            node.data
                .insert("label".into(), Value::from(label.into_string()));
            node
        }
        Tag::Table(_) => Node::parent(kind::TABLE),
        Tag::TableHead | Tag::TableRow => Node::parent(kind::TABLE_ROW),
        Tag::TableCell => Node::parent(kind::TABLE_CELL),
        Tag::Emphasis => Node::parent(kind::EMPHASIS),
        Tag::Strong => Node::parent(kind::STRONG),
        Tag::Strikethrough => Node::parent(kind::DELETE),
        Tag::Link {
            dest_url, title, ..
        } => {
            let mut node = Node::parent(kind::LINK);
            node.url = Some(dest_url.into_string());
            node.title = non_empty(title.into_string());
            node
        }
        Tag::Image {
            dest_url, title, ..
        } => {
            let mut node = Node::image(dest_url.into_string());
            node.title = non_empty(title.into_string());
            node
        }
        _ => Node::parent(kind::UNKNOWN),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Image alt text and code-block contents are stored on the open node
/// itself rather than as child nodes.
fn append_to_open_literal(stack: &mut [Node], text: &str) -> bool {
    let Some(top) = stack.last_mut() else {
        return false;
    };
    let slot = if top.is(kind::IMAGE) {
        &mut top.alt
    } else if top.is(kind::CODE) {
        &mut top.value
    } else {
        return false;
    };
    slot.get_or_insert_with(String::new).push_str(text);
    true
}

fn push_leaf(
    stack: &mut [Node],
    node_kind: &str,
    value: String,
    lines: &LineIndex,
    range: Range<usize>,
) {
    let mut node = Node::new(node_kind);
    node.value = Some(value);
    node.position = Some(lines.position(range));
    attach(stack, node);
}

fn attach(stack: &mut [Node], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children_mut().push(node);
    }
}

fn close_top(stack: &mut Vec<Node>, image_spans: &mut HashSet<Range<usize>>) {
    let Some(node) = stack.pop() else {
        return;
    };
    if node.is(kind::IMAGE) {
        if let Some(span) = node.position.and_then(|p| p.span()) {
            image_spans.insert(span);
        }
    }
    attach(stack, node);
}

/// Maps byte offsets to 1-indexed line/column pairs.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    fn point(&self, offset: usize) -> Point {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        Point {
            line,
            column: offset - line_start + 1,
            offset: Some(offset),
        }
    }

    fn position(&self, range: Range<usize>) -> Position {
        Position {
            start: self.point(range.start),
            end: self.point(range.end),
        }
    }
}
