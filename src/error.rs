//! Error types for the mdvideo library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MdVideoError`]: **Fatal**: the run cannot proceed at all (unreadable
//!   input, invalid configuration, ffmpeg not installed). Returned as
//!   `Err(MdVideoError)` from the top-level `embed*` functions.
//!
//! * [`TranscodeError`]: **Non-fatal**: transcoding a single video failed
//!   but every other reference in the document is fine. Stored inside
//!   [`crate::output::NodeOutcome::Failed`]; the node is left untouched.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdvideo library.
///
/// Per-video failures use [`TranscodeError`] and are reported in
/// [`crate::output::EmbedReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum MdVideoError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a valid mdast JSON tree.
    #[error("Invalid markdown AST JSON: {0}")]
    InvalidAst(#[from] serde_json::Error),

    /// Walking the content directory for video files failed.
    #[error("Failed to scan content directory '{root}': {detail}")]
    InventoryScanFailed { root: PathBuf, detail: String },

    // ── Transcoder errors ─────────────────────────────────────────────────
    /// The default transcoder could not be set up (ffmpeg/ffprobe missing).
    #[error("Transcoder '{tool}' is not available.\n{hint}")]
    TranscoderNotConfigured { tool: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some videos were embedded but at least one failed.
    ///
    /// Returned by [`crate::output::EmbedReport::into_result`] when the
    /// caller wants to treat any transcode failure as an error.
    #[error("{failed}/{total} videos failed to transcode\nFirst error: {first_error}")]
    PartialFailure {
        failed: usize,
        total: usize,
        first_error: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A TOML configuration file could not be parsed.
    #[error("Invalid configuration file '{path}': {detail}")]
    InvalidConfigFile { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single video reference.
///
/// The node whose transcode failed keeps its original `image` form.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TranscodeError {
    /// The source video's dimensions could not be determined.
    #[error("{path}: probing failed: {detail}")]
    ProbeFailed { path: String, detail: String },

    /// An external tool exited unsuccessfully or could not be spawned.
    #[error("{tool}: {detail}")]
    ToolFailed { tool: String, detail: String },

    /// An external tool ran longer than the configured timeout.
    #[error("{tool}: timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Reading the source or writing an encoded output failed.
    #[error("{path}: I/O error: {detail}")]
    Io { path: String, detail: String },

    /// Every configured pipeline profile failed; nothing to embed.
    #[error("{path}: no variants produced ({profiles} profiles attempted)")]
    NoVariants { path: String, profiles: usize },

    /// Error raised by a custom [`crate::pipeline::transcode::Transcoder`].
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcoder_not_configured_display() {
        let e = MdVideoError::TranscoderNotConfigured {
            tool: "ffmpeg".into(),
            hint: "install ffmpeg".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("ffmpeg"), "got: {msg}");
        assert!(msg.contains("install ffmpeg"));
    }

    #[test]
    fn timeout_display() {
        let e = TranscodeError::Timeout {
            tool: "ffmpeg".into(),
            secs: 600,
        };
        assert_eq!(e.to_string(), "ffmpeg: timed out after 600s");
    }

    #[test]
    fn no_variants_display() {
        let e = TranscodeError::NoVariants {
            path: "/site/clip.mp4".into(),
            profiles: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("/site/clip.mp4"));
        assert!(msg.contains("2 profiles"));
    }

    #[test]
    fn invalid_ast_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: MdVideoError = err.into();
        assert!(e.to_string().starts_with("Invalid markdown AST JSON"));
    }
}
