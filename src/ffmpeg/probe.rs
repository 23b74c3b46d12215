//! Source dimensions via `ffprobe`.

use super::command::ToolCommand;
use crate::error::TranscodeError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Rotation in degrees, normalised to `0..360`. The display matrix wins
    /// over the legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .map(|r| r.round() as i64)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<i64>().ok())
            })
            .unwrap_or(0);
        degrees.rem_euclid(360)
    }
}

/// Display width and height of the first video stream of `path`.
///
/// ffmpeg auto-rotates on decode, so a stream stored sideways reports its
/// sides swapped.
pub async fn probe_dimensions(
    ffprobe: &Path,
    path: &str,
    timeout: Duration,
) -> Result<(u32, u32), TranscodeError> {
    let mut cmd = ToolCommand::new(ffprobe, timeout);
    cmd.args([
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height:stream_tags=rotate:stream_side_data=rotation",
        "-of",
        "json",
    ]);
    cmd.arg(path);

    let output = cmd.execute().await?;
    parse_dimensions(&output.stdout).map_err(|detail| TranscodeError::ProbeFailed {
        path: path.to_string(),
        detail,
    })
}

/// Parse ffprobe's JSON stream listing.
pub fn parse_dimensions(json: &str) -> Result<(u32, u32), String> {
    let out: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("ffprobe JSON parse error: {e}"))?;
    let stream = out
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;
    let quarter_turn = matches!(stream.rotation(), 90 | 270);
    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 && quarter_turn => Ok((h, w)),
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        (w, h) => Err(format!("invalid video size {w:?}x{h:?}")),
    }
}
