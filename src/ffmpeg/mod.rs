//! Default [`Transcoder`] backed by the `ffmpeg` and `ffprobe` CLIs.
//!
//! For each source file the transcoder probes its size once, then runs one
//! ffmpeg encode per pipeline profile. Outputs land in the configured
//! output directory under a content-derived name, so re-running over an
//! unchanged file reuses the earlier encode instead of redoing it.
//!
//! ```text
//!   clip.mov ──ffprobe──▶ 1920×1080
//!            ──ffmpeg (vp9,  ≤900×480)──▶ clip-3fa1c0d2e9b84a77.webm
//!            ──ffmpeg (h264, ≤900×480)──▶ clip-91b2d7c0aa4e5f13.mp4
//! ```

pub mod command;
pub mod probe;

use crate::config::{EmbedConfig, OutputFormat, PipelineProfile};
use crate::error::{MdVideoError, TranscodeError};
use crate::inventory::FileRecord;
use crate::pipeline::transcode::{TranscodeRequest, TranscodeResult, Transcoder, Variant};
use async_trait::async_trait;
use command::ToolCommand;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info};

/// Transcodes with the system's ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    output_dir: PathBuf,
    public_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        public_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            output_dir: output_dir.into(),
            public_path: public_path.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Locate both tools and take output settings from `config`.
    ///
    /// An explicitly configured path must exist; otherwise the tool is
    /// searched on `PATH`.
    pub fn from_config(config: &EmbedConfig) -> Result<Self, MdVideoError> {
        let ffmpeg = locate_tool("ffmpeg", config.ffmpeg_path.as_deref())?;
        let ffprobe = locate_tool("ffprobe", config.ffprobe_path.as_deref())?;
        info!("Using {} and {}", ffmpeg.display(), ffprobe.display());
        Ok(Self::new(
            ffmpeg,
            ffprobe,
            config.output_dir.clone(),
            config.public_path.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        ))
    }

    fn public_src(&self, name: &str) -> String {
        if self.public_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.public_path, name)
        }
    }

    /// Encode `file` with one profile into `output_dir`, reusing an
    /// existing output of the same name.
    async fn encode(
        &self,
        file: &FileRecord,
        fingerprint: &str,
        profile: &PipelineProfile,
        size: (u32, u32),
    ) -> Result<Variant, TranscodeError> {
        let name = output_name(file, fingerprint, profile);
        let target = self.output_dir.join(&name);
        let src = self.public_src(&name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("Reusing {}", target.display());
            return Ok(Variant::new(src, profile.format));
        }

        let io_err = |e: std::io::Error| TranscodeError::Io {
            path: target.display().to_string(),
            detail: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_err)?;
        let tmp = tempfile::Builder::new()
            .prefix(".mdvideo-")
            .suffix(&format!(".{}", profile.format.extension()))
            .tempfile_in(&self.output_dir)
            .map_err(io_err)?;

        let (w, h) = size;
        let mut cmd = ToolCommand::new(&self.ffmpeg, self.timeout);
        cmd.args(["-y", "-v", "error", "-i"]);
        cmd.arg(file.absolute_path.as_str());
        cmd.args(["-vf".to_string(), format!("scale={w}:{h}")]);
        cmd.args(profile.encoder_args());
        if matches!(profile.format, OutputFormat::Mp4 | OutputFormat::Mov) {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg(tmp.path().to_string_lossy().into_owned());
        cmd.execute().await?;

        tmp.persist(&target).map_err(|e| io_err(e.error))?;
        Ok(Variant::new(src, profile.format))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        request: TranscodeRequest<'_>,
    ) -> Result<TranscodeResult, TranscodeError> {
        let file = request.file;
        let path = file.absolute_path.as_str();

        let (src_w, src_h) = probe::probe_dimensions(&self.ffprobe, path, self.timeout).await?;
        let fingerprint = fingerprint(file.path()).await?;
        debug!("{}: source {}x{}", path, src_w, src_h);

        let mut dims = None;
        let mut variants = Vec::with_capacity(request.pipelines.len());
        for profile in request.pipelines {
            let size = fit_within(src_w, src_h, profile.max_width, profile.max_height);
            match self.encode(file, &fingerprint, profile, size).await {
                Ok(variant) => {
                    request
                        .reporter
                        .on_variant_complete(path, &profile.name, &variant.src);
                    dims.get_or_insert(size);
                    variants.push(variant);
                }
                Err(e) => {
                    request
                        .reporter
                        .on_variant_error(path, &profile.name, &e.to_string());
                }
            }
        }

        match dims {
            Some((width, height)) => Ok(TranscodeResult {
                width,
                height,
                variants,
            }),
            None => Err(TranscodeError::NoVariants {
                path: path.to_string(),
                profiles: request.pipelines.len(),
            }),
        }
    }
}

fn locate_tool(name: &str, explicit: Option<&Path>) -> Result<PathBuf, MdVideoError> {
    match explicit {
        Some(p) if p.exists() => Ok(p.to_path_buf()),
        Some(p) => Err(MdVideoError::TranscoderNotConfigured {
            tool: name.to_string(),
            hint: format!("Configured path '{}' does not exist.", p.display()),
        }),
        None => which::which(name).map_err(|_| MdVideoError::TranscoderNotConfigured {
            tool: name.to_string(),
            hint: format!(
                "Install {name} and make sure it is on PATH, or set its path explicitly."
            ),
        }),
    }
}

/// Largest size inside `max_w × max_h` with the source's aspect ratio.
///
/// Never upscales. Both sides are rounded down to even numbers (yuv420p
/// needs them) and are at least 2.
pub fn fit_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let (w, h) = if src_w <= max_w && src_h <= max_h {
        (src_w, src_h)
    } else if u64::from(src_w) * u64::from(max_h) > u64::from(src_h) * u64::from(max_w) {
        let h = u64::from(src_h) * u64::from(max_w) / u64::from(src_w);
        (max_w, h as u32)
    } else {
        let w = u64::from(src_w) * u64::from(max_h) / u64::from(src_h);
        (w as u32, max_h)
    };
    (even(w), even(h))
}

fn even(n: u32) -> u32 {
    (n & !1).max(2)
}

/// Hash of the source's identity: path, size and modification time.
async fn fingerprint(path: &Path) -> Result<String, TranscodeError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| TranscodeError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    Ok(format!("{}|{}|{}", path.display(), meta.len(), mtime))
}

/// `{stem}-{hash}.{ext}` where the hash covers the source fingerprint and
/// every profile setting that changes the output.
pub fn output_name(file: &FileRecord, fingerprint: &str, profile: &PipelineProfile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hasher.update(b"\0");
    hasher.update(profile.descriptor().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "{}-{}.{}",
        sanitize_stem(file.stem()),
        &digest[..16],
        profile.format.extension()
    )
}

fn sanitize_stem(stem: &str) -> String {
    let s: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let s = s.trim_matches('-');
    if s.is_empty() {
        "video".to_string()
    } else {
        s.to_string()
    }
}
