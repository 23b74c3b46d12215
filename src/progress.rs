//! Diagnostics handle for per-video progress events.
//!
//! Inject an [`Arc<dyn Reporter>`] via
//! [`crate::config::EmbedConfigBuilder::reporter`] to receive events as the
//! resolver works through a document. The same handle is passed to the
//! [`crate::pipeline::transcode::Transcoder`], which reports per-profile
//! progress through it.
//!
//! # Example
//!
//! ```rust
//! use mdvideo::{EmbedConfig, Reporter};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl Reporter for Counter {
//!     fn on_video_complete(&self, url: &str, variants: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{url}: {variants} variants");
//!     }
//! }
//!
//! let config = EmbedConfig::builder()
//!     .reporter(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{EmbedStats, SkipReason};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives progress events from the resolver and the transcoder.
///
/// Implementations must be `Send + Sync`: videos are transcoded
/// concurrently, so `on_video_*` and `on_variant_*` may interleave across
/// videos. All methods default to no-ops.
pub trait Reporter: Send + Sync {
    /// Called once, after scanning, with the number of videos that resolved
    /// to a known file and will be transcoded.
    fn on_embed_start(&self, videos: usize) {
        let _ = videos;
    }

    /// A reference was left untouched.
    fn on_video_skipped(&self, url: &str, reason: SkipReason) {
        let _ = (url, reason);
    }

    /// Transcoding of one video is about to start.
    fn on_video_start(&self, url: &str, path: &str) {
        let _ = (url, path);
    }

    /// The transcoder produced one variant.
    fn on_variant_complete(&self, path: &str, profile: &str, src: &str) {
        let _ = (path, profile, src);
    }

    /// The transcoder gave up on one profile; other profiles may still
    /// succeed.
    fn on_variant_error(&self, path: &str, profile: &str, error: &str) {
        let _ = (path, profile, error);
    }

    /// A video was converted into an embed.
    fn on_video_complete(&self, url: &str, variants: usize) {
        let _ = (url, variants);
    }

    /// Transcoding a video failed; its node keeps its original form.
    fn on_video_error(&self, url: &str, error: &str) {
        let _ = (url, error);
    }

    /// Called once after every reference has been handled.
    fn on_embed_complete(&self, stats: &EmbedStats) {
        let _ = stats;
    }
}

/// A reporter that ignores every event.
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// A reporter that forwards events to `tracing`.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_embed_start(&self, videos: usize) {
        info!("Transcoding {} videos", videos);
    }

    fn on_video_skipped(&self, url: &str, reason: SkipReason) {
        debug!("Skipping '{}': {}", url, reason);
    }

    fn on_video_start(&self, url: &str, path: &str) {
        debug!("Transcoding '{}' ({})", url, path);
    }

    fn on_variant_complete(&self, path: &str, profile: &str, src: &str) {
        debug!("{}: [{}] → {}", path, profile, src);
    }

    fn on_variant_error(&self, path: &str, profile: &str, error: &str) {
        warn!("{}: [{}] failed: {}", path, profile, error);
    }

    fn on_video_complete(&self, url: &str, variants: usize) {
        info!("Embedded '{}' ({} variants)", url, variants);
    }

    fn on_video_error(&self, url: &str, error: &str) {
        warn!("Failed to embed '{}': {}", url, error);
    }

    fn on_embed_complete(&self, stats: &EmbedStats) {
        info!(
            "Embedding complete: {} converted, {} skipped, {} failed",
            stats.converted, stats.skipped, stats.failed
        );
    }
}

/// Convenience alias matching the type stored in [`crate::config::EmbedConfig`].
pub type ProgressReporter = Arc<dyn Reporter>;
