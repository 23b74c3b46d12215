//! Eager (whole-document) embedding entry points.
//!
//! Every function here runs the same pass: collect the document's image
//! nodes, resolve and transcode them through [`crate::stream::embed_stream`],
//! wait for all of them, then rewrite the converted nodes in one go. Nodes
//! are only touched after every transcode has finished, so a fatal error
//! leaves the tree exactly as it was.

use crate::ast::Node;
use crate::config::EmbedConfig;
use crate::error::MdVideoError;
use crate::inventory::{FileInventory, ParentNode};
use crate::markdown::MarkdownDocument;
use crate::output::{EmbedReport, EmbedStats, MarkdownOutput};
use crate::pipeline::scan;
use crate::stream::{embed_stream, EmbedJob, EmbedResult};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Replace every local video reference under `root` with an HTML embed.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(EmbedReport)` even if some videos failed to transcode (check
/// `report.stats.failed`, or call [`EmbedReport::into_result`]). Failed
/// and skipped nodes are left untouched.
///
/// # Errors
/// Only fatal errors: the transcoder could not be set up.
pub async fn embed_videos(
    root: &mut Node,
    files: &FileInventory,
    parent: Option<&ParentNode>,
    config: &EmbedConfig,
) -> Result<EmbedReport, MdVideoError> {
    let start = Instant::now();

    let jobs: Vec<EmbedJob> = scan::select_images(root)
        .into_iter()
        .enumerate()
        .map(|(index, node)| EmbedJob {
            index,
            url: node.url.clone().unwrap_or_default(),
        })
        .collect();
    debug!("Found {} image references", jobs.len());

    let mut results: Vec<EmbedResult> = embed_stream(jobs, files, parent, config)?
        .collect()
        .await;
    results.sort_by_key(|r| r.report.index);

    let mut images = scan::select_images(root);
    let mut nodes = Vec::with_capacity(results.len());
    for result in results {
        if let Some(html) = result.html {
            if let Some(node) = images.get_mut(result.report.index) {
                node.replace_with_html(html);
            }
        }
        nodes.push(result.report);
    }

    let stats = EmbedStats::from_nodes(&nodes, start.elapsed().as_millis() as u64);
    info!(
        "Embedding complete: {}/{} images converted, {}ms total",
        stats.converted, stats.images, stats.total_duration_ms
    );
    config.progress().on_embed_complete(&stats);

    Ok(EmbedReport { nodes, stats })
}

/// Embed videos into markdown text.
///
/// `parent` is the directory relative references are resolved against,
/// normally the directory holding the markdown file.
pub async fn embed_markdown(
    markdown: &str,
    files: &FileInventory,
    parent: Option<&ParentNode>,
    config: &EmbedConfig,
) -> Result<MarkdownOutput, MdVideoError> {
    let mut doc = MarkdownDocument::parse(markdown);
    let report = embed_videos(doc.root_mut(), files, parent, config).await?;
    Ok(MarkdownOutput {
        markdown: doc.render(),
        report,
    })
}

/// Read a markdown file and embed its videos, resolving references against
/// the file's own directory.
pub async fn embed_markdown_file(
    path: impl AsRef<Path>,
    files: &FileInventory,
    config: &EmbedConfig,
) -> Result<MarkdownOutput, MdVideoError> {
    let path = path.as_ref();
    let markdown = read_input(path).await?;
    let parent = ParentNode::for_file(path);
    embed_markdown(&markdown, files, Some(&parent), config).await
}

/// Embed videos in a markdown file and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn embed_markdown_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    files: &FileInventory,
    config: &EmbedConfig,
) -> Result<EmbedReport, MdVideoError> {
    let output = embed_markdown_file(input_path, files, config).await?;
    write_output(output_path, &output.markdown).await?;
    Ok(output.report)
}

/// Write `contents` to `path` through a `<name>.tmp` sibling and a rename,
/// creating parent directories as needed.
pub async fn write_output(path: impl AsRef<Path>, contents: &str) -> Result<(), MdVideoError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| MdVideoError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;
    Ok(())
}

/// Embed videos into a serialised mdast tree, returning the rewritten tree
/// as JSON.
pub async fn embed_ast_json(
    json: &str,
    files: &FileInventory,
    parent: Option<&ParentNode>,
    config: &EmbedConfig,
) -> Result<(String, EmbedReport), MdVideoError> {
    let mut root: Node = serde_json::from_str(json)?;
    let report = embed_videos(&mut root, files, parent, config).await?;
    Ok((serde_json::to_string(&root)?, report))
}

/// Synchronous wrapper around [`embed_videos`].
///
/// Creates a temporary tokio runtime internally.
pub fn embed_videos_sync(
    root: &mut Node,
    files: &FileInventory,
    parent: Option<&ParentNode>,
    config: &EmbedConfig,
) -> Result<EmbedReport, MdVideoError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MdVideoError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(embed_videos(root, files, parent, config))
}

async fn read_input(path: &Path) -> Result<String, MdVideoError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MdVideoError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(MdVideoError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::kind;
    use crate::config::OutputFormat;
    use crate::error::TranscodeError;
    use crate::inventory::FileRecord;
    use crate::pipeline::transcode::{TranscodeRequest, TranscodeResult, Transcoder, Variant};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Converts everything except files whose stem is `broken`.
    struct Picky;

    #[async_trait]
    impl Transcoder for Picky {
        async fn transcode(
            &self,
            request: TranscodeRequest<'_>,
        ) -> Result<TranscodeResult, TranscodeError> {
            if request.file.stem() == "broken" {
                return Err(TranscodeError::Other("corrupt input".into()));
            }
            Ok(TranscodeResult {
                width: 480,
                height: 270,
                variants: vec![Variant::new(
                    format!("/static/{}.webm", request.file.stem()),
                    OutputFormat::Webm,
                )],
            })
        }
    }

    fn config() -> EmbedConfig {
        EmbedConfig::builder()
            .transcoder(Arc::new(Picky))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn failed_node_keeps_image_form() {
        let files = FileInventory::from_records(vec![
            FileRecord::new("/site/a.mp4"),
            FileRecord::new("/site/broken.mp4"),
        ]);
        let parent = ParentNode::from_dir("/site");
        let mut root = Node::root(vec![Node::image("a.mp4"), Node::image("broken.mp4")]);

        let report = embed_videos(&mut root, &files, Some(&parent), &config())
            .await
            .unwrap();

        assert!(root.children()[0].is(kind::HTML));
        assert!(root.children()[1].is(kind::IMAGE));
        assert_eq!(root.children()[1].url.as_deref(), Some("broken.mp4"));
        assert_eq!(report.stats.converted, 1);
        assert_eq!(report.stats.failed, 1);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn markdown_file_resolves_against_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let post = dir.path().join("post.md");
        std::fs::write(&post, "# Demo\n\n![](clip.mp4)\n").unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        let files = FileInventory::scan_dir(dir.path()).unwrap();

        let out_path = dir.path().join("out/post.md");
        let report = embed_markdown_to_file(&post, &out_path, &files, &config())
            .await
            .unwrap();
        assert_eq!(report.stats.converted, 1);

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.starts_with("# Demo\n\n<div class=\"video-aspect-ratio\""));
        assert!(written.ends_with("</video></div>\n"));
        assert!(!dir.path().join("out/post.md.tmp").exists());
    }

    #[tokio::test]
    async fn write_output_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/report.json");
        write_output(&target, "first").await.unwrap();
        write_output(&target, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        assert!(!dir.path().join("nested/report.json.tmp").exists());
        assert!(!dir.path().join("nested/report.tmp").exists());
    }

    #[tokio::test]
    async fn missing_input_is_file_not_found() {
        let err = embed_markdown_file("/no/such/post.md", &FileInventory::default(), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, MdVideoError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_ast_json_is_rejected() {
        let err = embed_ast_json("{not json", &FileInventory::default(), None, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, MdVideoError::InvalidAst(_)));
    }

    #[test]
    fn sync_wrapper_runs_outside_runtime() {
        let files = FileInventory::from_records(vec![FileRecord::new("/site/a.mp4")]);
        let parent = ParentNode::from_dir("/site");
        let mut root = Node::root(vec![Node::image("a.mp4")]);
        let report = embed_videos_sync(&mut root, &files, Some(&parent), &config()).unwrap();
        assert_eq!(report.stats.converted, 1);
    }
}
