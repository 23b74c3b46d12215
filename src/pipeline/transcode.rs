//! The transcoder seam.
//!
//! The resolver never encodes anything itself: it hands each resolved file
//! to a [`Transcoder`] and renders whatever variants come back. The default
//! implementation is [`crate::ffmpeg::FfmpegTranscoder`]; tests and hosts
//! with their own media pipeline plug in their own.

use crate::config::{OutputFormat, PipelineProfile};
use crate::error::TranscodeError;
use crate::inventory::FileRecord;
use crate::progress::Reporter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One encoded rendition of a source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Public URL of the encoded file.
    pub src: String,
    pub format: OutputFormat,
}

impl Variant {
    pub fn new(src: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            src: src.into(),
            format,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Output of one successful transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeResult {
    /// Presentation size shared by every variant.
    pub width: u32,
    pub height: u32,
    /// In pipeline order; becomes the order of `<source>` tags.
    pub variants: Vec<Variant>,
}

/// Everything a transcoder gets for one video.
pub struct TranscodeRequest<'a> {
    pub file: &'a FileRecord,
    pub pipelines: &'a [PipelineProfile],
    pub reporter: &'a dyn Reporter,
}

/// Turns one source file into web-playable variants.
///
/// Called concurrently for different files; implementations must be
/// `Send + Sync`. Returning `Ok` with no variants is treated as a failure.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        request: TranscodeRequest<'_>,
    ) -> Result<TranscodeResult, TranscodeError>;
}
