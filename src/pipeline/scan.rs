//! Reference scanner: every image-style node of a document.

use crate::ast::{kind, Node};

/// All `image` nodes under `root`, depth-first in document order.
///
/// No filtering happens here; nodes that are not local videos are dropped
/// by [`super::filter`].
pub fn select_images(root: &mut Node) -> Vec<&mut Node> {
    root.select_all_mut(kind::IMAGE)
}
