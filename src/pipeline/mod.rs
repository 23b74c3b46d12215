//! Pipeline stages for turning video references into embeds.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ filter ──▶ locate ──▶ transcode ──▶ html
//! (tree)   (url)      (inventory) (variants)   (fragment)
//! ```
//!
//! 1. [`scan`]      collect every `image` node of the tree
//! 2. [`filter`]    keep relative references to `avi`/`mp4`/`mov`/`mkv`
//! 3. [`locate`]    join with the document directory and find the file
//! 4. [`transcode`] the [`transcode::Transcoder`] seam; produces variants
//! 5. [`html`]      build the single-line `<div><video>` fragment

pub mod filter;
pub mod html;
pub mod locate;
pub mod scan;
pub mod transcode;
