//! A minimal mdast-shaped document tree.
//!
//! [`Node`] mirrors the JSON shape used by the unified/remark ecosystem
//! (`{"type": "image", "url": "...", "children": [...], "position": {...}}`)
//! so trees produced elsewhere can be deserialised, processed and written
//! back without loss: fields this crate does not model are kept in
//! [`Node::data`] and serialised again untouched.
//!
//! Trees built from markdown text by [`crate::markdown`] carry byte offsets
//! in every [`Position`], which is what the source-preserving renderer uses
//! to splice converted nodes back into the original text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;

/// Node `type` discriminators used by this crate.
pub mod kind {
    pub const ROOT: &str = "root";
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const BLOCKQUOTE: &str = "blockquote";
    pub const LIST: &str = "list";
    pub const LIST_ITEM: &str = "listItem";
    pub const CODE: &str = "code";
    pub const INLINE_CODE: &str = "inlineCode";
    pub const EMPHASIS: &str = "emphasis";
    pub const STRONG: &str = "strong";
    pub const DELETE: &str = "delete";
    pub const LINK: &str = "link";
    pub const IMAGE: &str = "image";
    pub const HTML: &str = "html";
    pub const TEXT: &str = "text";
    pub const BREAK: &str = "break";
    pub const THEMATIC_BREAK: &str = "thematicBreak";
    pub const TABLE: &str = "table";
    pub const TABLE_ROW: &str = "tableRow";
    pub const TABLE_CELL: &str = "tableCell";
    pub const FOOTNOTE_DEFINITION: &str = "footnoteDefinition";
    pub const UNKNOWN: &str = "unknown";
}

/// One place in the source file. `line` and `column` are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub line: usize,
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// Source span of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: Point,
    pub end: Point,
}

impl Position {
    /// Byte range in the source, when both offsets are known.
    pub fn span(&self) -> Option<Range<usize>> {
        Some(self.start.offset?..self.end.offset?)
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    /// Tag discriminator (`"image"`, `"html"`, ...). See [`kind`].
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Literal content of `text`, `html` and `code` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// `Some` for parent nodes, even when empty; literals and voids have
    /// `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,

    /// Any other fields (`depth`, `ordered`, `lang`, ...), preserved verbatim.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// A node of `kind` that holds an (initially empty) child list.
    pub fn parent(kind: impl Into<String>) -> Self {
        Self {
            children: Some(Vec::new()),
            ..Self::new(kind)
        }
    }

    pub fn root(children: Vec<Node>) -> Self {
        Self::new(kind::ROOT).with_children(children)
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(kind::IMAGE)
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(kind::TEXT)
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or_default()
    }

    /// The child list, creating an empty one if this node had none.
    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        self.children.get_or_insert_with(Vec::new)
    }

    /// Turn this node into a raw `html` node in place, keeping its
    /// position.
    ///
    /// Every other field is reset, including `alt`, `title` and
    /// [`Node::data`]: an `html` node carries only its `value`.
    pub fn replace_with_html(&mut self, html: String) {
        let position = self.position.take();
        *self = Self {
            value: Some(html),
            position,
            ..Self::new(kind::HTML)
        };
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// All nodes of the given kind, depth-first in document order.
    pub fn select_all(&self, kind: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        collect(self, kind, &mut out);
        out
    }

    /// Mutable variant of [`Node::select_all`].
    ///
    /// The children of a matching node are not searched; `image` nodes are
    /// leaves, so this never hides a match for the kinds the resolver asks
    /// for.
    pub fn select_all_mut(&mut self, kind: &str) -> Vec<&mut Node> {
        let mut out = Vec::new();
        collect_mut(self, kind, &mut out);
        out
    }
}

fn collect<'a>(node: &'a Node, kind: &str, out: &mut Vec<&'a Node>) {
    if node.kind == kind {
        out.push(node);
    }
    for child in node.children() {
        collect(child, kind, out);
    }
}

fn collect_mut<'a>(node: &'a mut Node, kind: &str, out: &mut Vec<&'a mut Node>) {
    if node.kind == kind {
        out.push(node);
        return;
    }
    if let Some(children) = node.children.as_mut() {
        for child in children.iter_mut() {
            collect_mut(child, kind, out);
        }
    }
}
