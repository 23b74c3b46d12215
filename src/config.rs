//! Configuration types for video embedding.
//!
//! All behaviour is controlled through [`EmbedConfig`], built via its
//! [`EmbedConfigBuilder`]. Every field has its own default; `build()`
//! validates the combination once so the pipeline never has to.
//!
//! Pipeline profiles can be given whole ([`EmbedConfigBuilder::pipelines`])
//! or as partial [`PipelineSpec`] overrides that are merged field by field
//! over the built-in `vp9` and `h264` profiles
//! ([`EmbedConfigBuilder::pipeline_overrides`]). A TOML [`FileConfig`] maps
//! onto the same builder.

use crate::error::MdVideoError;
use crate::pipeline::transcode::Transcoder;
use crate::progress::{NoopReporter, ProgressReporter, Reporter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Default bounding box for encoded videos.
pub const DEFAULT_MAX_WIDTH: u32 = 900;
pub const DEFAULT_MAX_HEIGHT: u32 = 480;

/// Configuration for a video-embedding run.
///
/// # Example
/// ```rust
/// use mdvideo::EmbedConfig;
///
/// let config = EmbedConfig::builder()
///     .concurrency(2)
///     .public_path("/media")
///     .build()
///     .unwrap();
/// assert_eq!(config.pipelines.len(), 2);
/// ```
#[derive(Clone)]
pub struct EmbedConfig {
    /// Ordered transcode profiles; one `<source>` per successful profile.
    /// Default: [`PipelineProfile::defaults`].
    pub pipelines: Vec<PipelineProfile>,

    /// Maximum number of videos transcoded at once. Default: logical CPU count.
    pub concurrency: usize,

    /// `class` attribute of the wrapper `<div>`. Default: `video-aspect-ratio`.
    pub wrapper_class: String,

    /// Directory the default transcoder writes encoded files into.
    /// Default: `public/static`.
    pub output_dir: PathBuf,

    /// URL prefix under which `output_dir` is served. Default: `/static`.
    pub public_path: String,

    /// Explicit `ffmpeg` executable. If None, searched on `PATH`.
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit `ffprobe` executable. If None, searched on `PATH`.
    pub ffprobe_path: Option<PathBuf>,

    /// Per-invocation timeout for ffmpeg/ffprobe in seconds. Default: 600.
    pub tool_timeout_secs: u64,

    /// Pre-constructed transcoder. Takes precedence over the ffmpeg settings.
    pub transcoder: Option<Arc<dyn Transcoder>>,

    /// Diagnostics handle forwarded to the transcoder and notified of
    /// per-video progress.
    pub reporter: Option<ProgressReporter>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            pipelines: PipelineProfile::defaults(),
            concurrency: num_cpus::get().max(1),
            wrapper_class: "video-aspect-ratio".to_string(),
            output_dir: PathBuf::from("public/static"),
            public_path: "/static".to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
            tool_timeout_secs: 600,
            transcoder: None,
            reporter: None,
        }
    }
}

impl fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("pipelines", &self.pipelines)
            .field("concurrency", &self.concurrency)
            .field("wrapper_class", &self.wrapper_class)
            .field("output_dir", &self.output_dir)
            .field("public_path", &self.public_path)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field(
                "transcoder",
                &self.transcoder.as_ref().map(|_| "<dyn Transcoder>"),
            )
            .field("reporter", &self.reporter.as_ref().map(|_| "<dyn Reporter>"))
            .finish()
    }
}

impl EmbedConfig {
    /// Create a new builder for `EmbedConfig`.
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder {
            config: Self::default(),
            overrides: None,
        }
    }

    /// The configured reporter, or a no-op one.
    pub fn progress(&self) -> &dyn Reporter {
        self.reporter.as_deref().unwrap_or(&NoopReporter)
    }
}

/// Builder for [`EmbedConfig`].
#[derive(Debug)]
pub struct EmbedConfigBuilder {
    config: EmbedConfig,
    overrides: Option<Vec<PipelineSpec>>,
}

impl EmbedConfigBuilder {
    /// Replace the pipeline list wholesale.
    pub fn pipelines(mut self, pipelines: Vec<PipelineProfile>) -> Self {
        self.config.pipelines = pipelines;
        self
    }

    /// Partial profiles merged over the current pipeline list at `build()`.
    ///
    /// Entry `i` fills its unset fields from profile `i`; entries past the
    /// end of the list fall back to the defaults of their codec. The result
    /// has exactly as many profiles as there are overrides.
    pub fn pipeline_overrides(mut self, specs: Vec<PipelineSpec>) -> Self {
        self.overrides = Some(specs);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn wrapper_class(mut self, class: impl Into<String>) -> Self {
        self.config.wrapper_class = class.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn public_path(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_path = prefix.into();
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = Some(path.into());
        self
    }

    pub fn ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffprobe_path = Some(path.into());
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs.max(1);
        self
    }

    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.config.transcoder = Some(transcoder);
        self
    }

    pub fn reporter(mut self, reporter: ProgressReporter) -> Self {
        self.config.reporter = Some(reporter);
        self
    }

    /// Build the configuration, merging overrides and validating constraints.
    pub fn build(mut self) -> Result<EmbedConfig, MdVideoError> {
        if let Some(specs) = self.overrides.take() {
            let base = std::mem::take(&mut self.config.pipelines);
            self.config.pipelines = specs
                .into_iter()
                .enumerate()
                .map(|(i, spec)| spec.resolve(base.get(i), i))
                .collect::<Result<_, _>>()?;
        }

        let c = &mut self.config;
        c.public_path = c.public_path.trim_end_matches('/').to_string();

        if c.pipelines.is_empty() {
            return Err(MdVideoError::InvalidConfig(
                "At least one pipeline profile is required".into(),
            ));
        }
        let mut names = HashSet::new();
        for p in &c.pipelines {
            p.validate()?;
            if !names.insert(p.name.as_str()) {
                return Err(MdVideoError::InvalidConfig(format!(
                    "Duplicate pipeline name '{}'",
                    p.name
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(MdVideoError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.wrapper_class.trim().is_empty()
            || c.wrapper_class.contains(['"', '<', '>', '&'])
        {
            return Err(MdVideoError::InvalidConfig(format!(
                "Invalid wrapper class '{}'",
                c.wrapper_class
            )));
        }
        Ok(self.config)
    }
}

// ── Pipeline profiles ────────────────────────────────────────────────────

/// Video encoder used by a pipeline profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// VP9 via libvpx-vp9, constant quality (`-crf 20 -b:v 0`).
    Vp9,
    /// H.264 via libx264 with encoder defaults, 8-bit 4:2:0.
    H264,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "vp9",
            VideoCodec::H264 => "h264",
        }
    }

    /// ffmpeg arguments selecting and tuning the encoder.
    pub fn encoder_args(&self) -> &'static [&'static str] {
        match self {
            VideoCodec::Vp9 => &[
                "-c:v",
                "libvpx-vp9",
                "-crf",
                "20",
                "-b:v",
                "0",
                "-pix_fmt",
                "yuv420p",
            ],
            VideoCodec::H264 => &["-c:v", "libx264", "-pix_fmt", "yuv420p"],
        }
    }

    pub fn default_format(&self) -> OutputFormat {
        match self {
            VideoCodec::Vp9 => OutputFormat::Webm,
            VideoCodec::H264 => OutputFormat::Mp4,
        }
    }

    /// Containers this codec may be written into.
    pub fn supports(&self, format: OutputFormat) -> bool {
        matches!(
            (self, format),
            (VideoCodec::Vp9, OutputFormat::Webm | OutputFormat::Mp4)
                | (VideoCodec::H264, OutputFormat::Mp4 | OutputFormat::Mov)
        )
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output container. Maps a file extension to its `video/*` MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webm,
    Mp4,
    Mov,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
        }
    }

    /// Value of the `type` attribute on a `<source>` tag.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "video/webm",
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Mov => "video/quicktime",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MdVideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webm" => Ok(OutputFormat::Webm),
            "mp4" => Ok(OutputFormat::Mp4),
            "mov" => Ok(OutputFormat::Mov),
            other => Err(MdVideoError::InvalidConfig(format!(
                "Unsupported output extension '{other}' (expected webm, mp4 or mov)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A named transcode configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProfile {
    pub name: String,
    pub codec: VideoCodec,
    pub max_width: u32,
    pub max_height: u32,
    pub format: OutputFormat,
    /// Extra ffmpeg output options appended after the encoder arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_options: Vec<String>,
}

impl PipelineProfile {
    /// Default profile for `codec`, named after it.
    pub fn for_codec(codec: VideoCodec) -> Self {
        Self {
            name: codec.as_str().to_string(),
            codec,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            format: codec.default_format(),
            output_options: Vec::new(),
        }
    }

    pub fn vp9() -> Self {
        Self::for_codec(VideoCodec::Vp9)
    }

    pub fn h264() -> Self {
        Self::for_codec(VideoCodec::H264)
    }

    /// The two built-in profiles: VP9/WebM first, then H.264/MP4.
    pub fn defaults() -> Vec<Self> {
        vec![Self::vp9(), Self::h264()]
    }

    /// Full ffmpeg output arguments: encoder, no audio, extra options.
    pub fn encoder_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .codec
            .encoder_args()
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push("-an".to_string());
        args.extend(self.output_options.iter().cloned());
        args
    }

    /// Stable text identifying everything that affects the encoded bytes.
    pub fn descriptor(&self) -> String {
        format!(
            "{}|{}x{}|{}|{}",
            self.codec,
            self.max_width,
            self.max_height,
            self.format,
            self.output_options.join(" ")
        )
    }

    fn validate(&self) -> Result<(), MdVideoError> {
        if self.name.trim().is_empty() {
            return Err(MdVideoError::InvalidConfig(
                "Pipeline name must not be empty".into(),
            ));
        }
        if self.max_width < 2 || self.max_height < 2 {
            return Err(MdVideoError::InvalidConfig(format!(
                "Pipeline '{}': max size must be at least 2×2, got {}×{}",
                self.name, self.max_width, self.max_height
            )));
        }
        if !self.codec.supports(self.format) {
            return Err(MdVideoError::InvalidConfig(format!(
                "Pipeline '{}': codec {} cannot be written to .{}",
                self.name, self.codec, self.format
            )));
        }
        Ok(())
    }
}

/// A partial [`PipelineProfile`]; unset fields come from a base profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub codec: Option<VideoCodec>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
    #[serde(default, alias = "file_extension")]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub output_options: Option<Vec<String>>,
}

impl PipelineSpec {
    /// Merge over `base`. When the override switches codec, codec-specific
    /// fields (format, options, name) come from that codec's defaults
    /// instead of `base`; the size bounds still come from `base`.
    pub fn resolve(
        self,
        base: Option<&PipelineProfile>,
        position: usize,
    ) -> Result<PipelineProfile, MdVideoError> {
        let codec = self.codec.or(base.map(|b| b.codec)).ok_or_else(|| {
            MdVideoError::InvalidConfig(format!(
                "Pipeline #{}: `codec` is required for profiles beyond the defaults",
                position + 1
            ))
        })?;

        let codec_base = match base {
            Some(b) if b.codec == codec => b.clone(),
            _ => PipelineProfile::for_codec(codec),
        };
        let size_base = base.unwrap_or(&codec_base);

        Ok(PipelineProfile {
            name: self.name.unwrap_or(codec_base.name.clone()),
            codec,
            max_width: self.max_width.unwrap_or(size_base.max_width),
            max_height: self.max_height.unwrap_or(size_base.max_height),
            format: self.format.unwrap_or(codec_base.format),
            output_options: self.output_options.unwrap_or(codec_base.output_options),
        })
    }
}

// ── File configuration ───────────────────────────────────────────────────

/// Settings loadable from a TOML file.
///
/// ```toml
/// concurrency = 2
/// public_path = "/media"
///
/// [[pipelines]]
/// max_height = 720
///
/// [[pipelines]]
/// codec = "h264"
/// output_options = ["-preset", "slow"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub concurrency: Option<usize>,
    pub wrapper_class: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub public_path: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub tool_timeout_secs: Option<u64>,
    pub pipelines: Option<Vec<PipelineSpec>>,
}

impl FileConfig {
    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MdVideoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MdVideoError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| MdVideoError::InvalidConfigFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Apply every set field to `builder`.
    pub fn apply(self, mut builder: EmbedConfigBuilder) -> EmbedConfigBuilder {
        if let Some(n) = self.concurrency {
            builder = builder.concurrency(n);
        }
        if let Some(c) = self.wrapper_class {
            builder = builder.wrapper_class(c);
        }
        if let Some(d) = self.output_dir {
            builder = builder.output_dir(d);
        }
        if let Some(p) = self.public_path {
            builder = builder.public_path(p);
        }
        if let Some(p) = self.ffmpeg_path {
            builder = builder.ffmpeg_path(p);
        }
        if let Some(p) = self.ffprobe_path {
            builder = builder.ffprobe_path(p);
        }
        if let Some(s) = self.tool_timeout_secs {
            builder = builder.tool_timeout_secs(s);
        }
        if let Some(specs) = self.pipelines {
            builder = builder.pipeline_overrides(specs);
        }
        builder
    }
}
