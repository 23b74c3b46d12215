//! Streaming embed API: emit per-reference results as they complete.
//!
//! [`crate::embed::embed_videos`] waits for every transcode and then rewrites
//! the tree. [`embed_stream`] exposes the step underneath: it classifies the
//! references up front, yields every skipped one immediately, then yields
//! transcode results in completion order with at most
//! [`EmbedConfig::concurrency`] transcodes in flight. Sort by
//! `report.index` if document order matters.

use crate::config::EmbedConfig;
use crate::error::{MdVideoError, TranscodeError};
use crate::ffmpeg::FfmpegTranscoder;
use crate::inventory::{FileInventory, FileRecord, ParentNode};
use crate::output::{NodeOutcome, NodeReport, SkipReason};
use crate::pipeline::filter;
use crate::pipeline::html::render_embed;
use crate::pipeline::locate::{self, Resolution};
use crate::pipeline::transcode::{TranscodeRequest, Transcoder};
use futures::stream::{self, BoxStream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::debug;

/// One image reference to consider, identified by its document position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedJob {
    /// Index among the document's image nodes.
    pub index: usize,
    pub url: String,
}

/// The outcome for one [`EmbedJob`].
#[derive(Debug, Clone)]
pub struct EmbedResult {
    pub report: NodeReport,
    /// Replacement markup; set only when the reference was converted.
    pub html: Option<String>,
}

/// A boxed stream of per-reference results.
pub type EmbedStream<'a> = Pin<Box<dyn Stream<Item = EmbedResult> + Send + 'a>>;

/// Resolve and transcode `jobs`, streaming results as they are ready.
///
/// The transcoder is only set up when at least one reference resolves to a
/// known file, so a document without local videos never needs ffmpeg.
///
/// # Returns
/// - `Ok(EmbedStream)`: skipped references first, then transcodes in
///   completion order
/// - `Err(MdVideoError)`: the transcoder could not be set up
pub fn embed_stream<'a>(
    jobs: Vec<EmbedJob>,
    files: &'a FileInventory,
    parent: Option<&ParentNode>,
    config: &'a EmbedConfig,
) -> Result<EmbedStream<'a>, MdVideoError> {
    let reporter = config.progress();

    let mut skipped = Vec::new();
    let mut pending = Vec::new();
    for job in jobs {
        match classify(&job.url, parent, files) {
            Ok(file) => pending.push((job, file)),
            Err((reason, path)) => {
                debug!("Skipping '{}': {}", job.url, reason);
                reporter.on_video_skipped(&job.url, reason);
                skipped.push(EmbedResult {
                    report: NodeReport {
                        index: job.index,
                        url: job.url,
                        path,
                        outcome: NodeOutcome::Skipped { reason },
                        duration_ms: 0,
                    },
                    html: None,
                });
            }
        }
    }

    reporter.on_embed_start(pending.len());

    let transcoded: BoxStream<'a, EmbedResult> = if pending.is_empty() {
        stream::empty().boxed()
    } else {
        let transcoder = resolve_transcoder(config)?;
        stream::iter(pending.into_iter().map(move |(job, file)| {
            let transcoder = Arc::clone(&transcoder);
            async move { transcode_one(transcoder.as_ref(), job, file, config).await }
        }))
        .buffer_unordered(config.concurrency)
        .boxed()
    };

    Ok(Box::pin(stream::iter(skipped).chain(transcoded)))
}

/// Filter then locate one reference.
fn classify<'f>(
    url: &str,
    parent: Option<&ParentNode>,
    files: &'f FileInventory,
) -> Result<&'f FileRecord, (SkipReason, Option<String>)> {
    filter::check(url).map_err(|reason| (reason, None))?;
    match locate::resolve(url, parent, files) {
        Resolution::Found(file) => Ok(file),
        Resolution::NoContext => Err((SkipReason::NoParentDirectory, None)),
        Resolution::NoMatch { path } => Err((SkipReason::NoMatchingFile, Some(path))),
    }
}

async fn transcode_one(
    transcoder: &dyn Transcoder,
    job: EmbedJob,
    file: &FileRecord,
    config: &EmbedConfig,
) -> EmbedResult {
    let reporter = config.progress();
    reporter.on_video_start(&job.url, &file.absolute_path);

    let start = Instant::now();
    let result = transcoder
        .transcode(TranscodeRequest {
            file,
            pipelines: &config.pipelines,
            reporter,
        })
        .await
        .and_then(|r| {
            if r.variants.is_empty() {
                Err(TranscodeError::NoVariants {
                    path: file.absolute_path.clone(),
                    profiles: config.pipelines.len(),
                })
            } else {
                Ok(r)
            }
        });
    let duration_ms = start.elapsed().as_millis() as u64;

    let (outcome, html) = match result {
        Ok(r) => {
            reporter.on_video_complete(&job.url, r.variants.len());
            let html = render_embed(&r, &config.wrapper_class);
            let outcome = NodeOutcome::Converted {
                variants: r.variants.len(),
                width: r.width,
                height: r.height,
            };
            (outcome, Some(html))
        }
        Err(error) => {
            reporter.on_video_error(&job.url, &error.to_string());
            (NodeOutcome::Failed { error }, None)
        }
    };

    EmbedResult {
        report: NodeReport {
            index: job.index,
            url: job.url,
            path: Some(file.absolute_path.clone()),
            outcome,
            duration_ms,
        },
        html,
    }
}

/// Use the injected transcoder, or set up ffmpeg from the config.
fn resolve_transcoder(config: &EmbedConfig) -> Result<Arc<dyn Transcoder>, MdVideoError> {
    if let Some(ref transcoder) = config.transcoder {
        return Ok(Arc::clone(transcoder));
    }
    Ok(Arc::new(FfmpegTranscoder::from_config(config)?))
}
