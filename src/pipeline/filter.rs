//! Eligibility filter: relative references to supported video files.

use crate::output::SkipReason;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// `scheme:` prefix of an absolute URL (`https:`, `data:`, `mailto:`, `C:`).
static RE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z\d+\-.]*:").unwrap());

/// Source video types the resolver will transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoExtension {
    Avi,
    Mp4,
    Mov,
    Mkv,
}

impl VideoExtension {
    pub const ALL: [VideoExtension; 4] = [
        VideoExtension::Avi,
        VideoExtension::Mp4,
        VideoExtension::Mov,
        VideoExtension::Mkv,
    ];

    /// Exact, case-sensitive match against the allow-list.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoExtension::Avi => "avi",
            VideoExtension::Mp4 => "mp4",
            VideoExtension::Mov => "mov",
            VideoExtension::Mkv => "mkv",
        }
    }
}

impl fmt::Display for VideoExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True unless `url` has a scheme, is protocol-relative or is rooted.
pub fn is_relative_url(url: &str) -> bool {
    !url.is_empty() && !RE_SCHEME.is_match(url) && !url.starts_with(['/', '\\'])
}

/// Text after the last `.`; the whole URL when it has no dot.
pub fn extension(url: &str) -> &str {
    url.rsplit_once('.').map_or(url, |(_, ext)| ext)
}

/// Decide whether a reference qualifies for embedding.
pub fn check(url: &str) -> Result<VideoExtension, SkipReason> {
    if !is_relative_url(url) {
        return Err(SkipReason::NotRelative);
    }
    VideoExtension::from_extension(extension(url)).ok_or(SkipReason::UnsupportedExtension)
}
