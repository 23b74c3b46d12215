//! # mdvideo
//!
//! Turn local video references in markdown into HTML `<video>` embeds.
//!
//! Authors write `![](clip.mov)` next to their posts. This crate finds those
//! image-style references, checks that they point at a video file the host
//! knows about, transcodes each one into web-friendly variants (VP9/WebM
//! and H.264/MP4 by default) and replaces the reference with a single-line,
//! autoplaying, muted, looping `<video>` block.
//!
//! ## Pipeline Overview
//!
//! ```text
//! markdown / mdast
//!  │
//!  ├─ 1. Scan       collect `image` nodes in document order
//!  ├─ 2. Filter     relative URL with an avi/mp4/mov/mkv extension
//!  ├─ 3. Locate     join with the document's directory, match the inventory
//!  ├─ 4. Transcode  ffmpeg per pipeline profile, N videos in parallel
//!  ├─ 5. Render     <div><video …><source …>…</video></div>
//!  └─ 6. Rewrite    converted nodes become `html` nodes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdvideo::{embed_markdown_file, EmbedConfig, FileInventory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let files = FileInventory::scan_dir("content")?;
//!     let config = EmbedConfig::builder().output_dir("public/static").build()?;
//!     let output = embed_markdown_file("content/posts/demo.md", &files, &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} videos embedded", output.report.stats.converted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdvideo` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdvideo = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ast;
pub mod config;
pub mod embed;
pub mod error;
pub mod ffmpeg;
pub mod inventory;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ast::Node;
pub use config::{
    EmbedConfig, EmbedConfigBuilder, FileConfig, OutputFormat, PipelineProfile, PipelineSpec,
    VideoCodec,
};
pub use embed::{
    embed_ast_json, embed_markdown, embed_markdown_file, embed_markdown_to_file, embed_videos,
    embed_videos_sync, write_output,
};
pub use error::{MdVideoError, TranscodeError};
pub use ffmpeg::FfmpegTranscoder;
pub use inventory::{FileInventory, FileRecord, ParentNode};
pub use markdown::MarkdownDocument;
pub use output::{EmbedReport, EmbedStats, MarkdownOutput, NodeOutcome, NodeReport, SkipReason};
pub use pipeline::transcode::{TranscodeRequest, TranscodeResult, Transcoder, Variant};
pub use progress::{NoopReporter, ProgressReporter, Reporter, TracingReporter};
pub use stream::{embed_stream, EmbedJob, EmbedResult, EmbedStream};
