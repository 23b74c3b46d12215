//! Integration tests for the video reference resolver.
//!
//! Every test injects a stub transcoder, so nothing here needs ffmpeg.

use async_trait::async_trait;
use mdvideo::ast::kind;
use mdvideo::{
    embed_ast_json, embed_markdown, embed_videos, EmbedConfig, EmbedStats, FileInventory,
    FileRecord, MarkdownDocument, Node, NodeOutcome, OutputFormat, ParentNode, Reporter,
    SkipReason, TranscodeError, TranscodeRequest, TranscodeResult, Transcoder, Variant,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Returns a fixed 480×270 webm + mp4 pair, failing for one chosen stem.
#[derive(Default)]
struct StubTranscoder {
    fail_stem: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubTranscoder {
    fn failing(stem: &str) -> Self {
        Self {
            fail_stem: Some(stem.to_string()),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(
        &self,
        request: TranscodeRequest<'_>,
    ) -> Result<TranscodeResult, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let stem = request.file.stem();
        if self.fail_stem.as_deref() == Some(stem) {
            return Err(TranscodeError::Other(format!("{stem}: stub failure")));
        }
        Ok(TranscodeResult {
            width: 480,
            height: 270,
            variants: vec![
                Variant::new(format!("{stem}.webm"), OutputFormat::Webm),
                Variant::new(format!("{stem}.mp4"), OutputFormat::Mp4),
            ],
        })
    }
}

fn config_with(transcoder: Arc<StubTranscoder>) -> EmbedConfig {
    EmbedConfig::builder()
        .transcoder(transcoder)
        .build()
        .expect("valid config")
}

fn site() -> (FileInventory, ParentNode) {
    let files = FileInventory::from_records(vec![
        FileRecord::new("/a/b/c/vid.mp4"),
        FileRecord::new("/a/b/clip.mov"),
        FileRecord::new("/a/shared.mkv"),
        FileRecord::new("/a/b/old.avi"),
    ]);
    (files, ParentNode::from_dir("/a/b"))
}

fn images(urls: &[&str]) -> Node {
    Node::root(vec![Node::new(kind::PARAGRAPH)
        .with_children(urls.iter().map(|u| Node::image(*u)).collect())])
}

// ── Identity properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn absolute_and_external_references_are_untouched() {
    let (files, parent) = site();
    let stub = Arc::new(StubTranscoder::default());
    let mut root = images(&[
        "https://example.com/vid.mp4",
        "//cdn.example.com/vid.mp4",
        "/a/b/c/vid.mp4",
        "data:video/mp4;base64,AAAA",
    ]);
    let before = root.clone();

    let report = embed_videos(&mut root, &files, Some(&parent), &config_with(stub.clone()))
        .await
        .unwrap();

    assert_eq!(root, before);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    assert!(report
        .nodes
        .iter()
        .all(|n| n.outcome.skip_reason() == Some(SkipReason::NotRelative)));
}

#[tokio::test]
async fn unsupported_extensions_are_untouched() {
    let (files, parent) = site();
    let stub = Arc::new(StubTranscoder::default());
    let mut root = images(&["diagram.png", "c/vid.MP4", "c/vid.webm", "c/vid"]);
    let before = root.clone();

    let report = embed_videos(&mut root, &files, Some(&parent), &config_with(stub.clone()))
        .await
        .unwrap();

    assert_eq!(root, before);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.stats.skipped, 4);
}

#[tokio::test]
async fn unknown_file_is_untouched_without_error() {
    let (files, parent) = site();
    let stub = Arc::new(StubTranscoder::default());
    let mut root = images(&["c/missing.mp4"]);
    let before = root.clone();

    let report = embed_videos(&mut root, &files, Some(&parent), &config_with(stub))
        .await
        .unwrap();

    assert_eq!(root, before);
    assert_eq!(
        report.nodes[0].outcome.skip_reason(),
        Some(SkipReason::NoMatchingFile)
    );
    assert_eq!(report.nodes[0].path.as_deref(), Some("/a/b/c/missing.mp4"));
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolved_reference_becomes_single_line_embed() {
    let (files, parent) = site();
    let mut root = images(&["c/vid.mp4"]);

    let report = embed_videos(
        &mut root,
        &files,
        Some(&parent),
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();

    let node = &root.children()[0].children()[0];
    assert!(node.is(kind::HTML));
    let html = node.value.as_deref().unwrap();
    assert!(!html.contains('\n'));
    assert_eq!(html, html.trim());
    assert_eq!(html.matches("<source ").count(), 2);

    let webm = html
        .find(r#"<source src="vid.webm" type="video/webm">"#)
        .unwrap();
    let mp4 = html.find(r#"<source src="vid.mp4" type="video/mp4">"#).unwrap();
    assert!(webm < mp4);

    let (wrapper, video) = html.split_once("<video").unwrap();
    assert!(wrapper.contains("max-height: 270px"));
    assert!(video.contains("max-height: 270px"));
    assert!(video.starts_with(" autoplay loop muted preload playsinline"));

    match &report.nodes[0].outcome {
        NodeOutcome::Converted {
            variants,
            width,
            height,
        } => assert_eq!((*variants, *width, *height), (2, 480, 270)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn dot_segments_resolve_against_parent() {
    let (files, parent) = site();
    let mut root = images(&["./clip.mov", "../shared.mkv", "c/../old.avi"]);

    let report = embed_videos(
        &mut root,
        &files,
        Some(&parent),
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();

    assert_eq!(report.stats.converted, 3);
    assert!(root
        .select_all(kind::HTML)
        .iter()
        .all(|n| n.value.as_deref().is_some_and(|v| !v.is_empty())));
}

#[tokio::test]
async fn no_parent_directory_is_a_skip() {
    let (files, _) = site();
    let mut root = images(&["c/vid.mp4"]);
    let before = root.clone();

    let report = embed_videos(
        &mut root,
        &files,
        None,
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();

    assert_eq!(root, before);
    assert_eq!(
        report.nodes[0].outcome.skip_reason(),
        Some(SkipReason::NoParentDirectory)
    );
}

#[tokio::test]
async fn rerun_is_a_no_op() {
    let (files, parent) = site();
    let stub = Arc::new(StubTranscoder::default());
    let config = config_with(stub.clone());
    let mut root = images(&["c/vid.mp4", "clip.mov"]);

    embed_videos(&mut root, &files, Some(&parent), &config)
        .await
        .unwrap();
    let converted = root.clone();
    let report = embed_videos(&mut root, &files, Some(&parent), &config)
        .await
        .unwrap();

    assert_eq!(root, converted);
    assert_eq!(report.stats.images, 0);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failure_leaves_all_others_converted() {
    let stems = ["v0", "v1", "v2", "v3", "v4"];
    let files = FileInventory::from_records(
        stems
            .iter()
            .map(|s| FileRecord::new(format!("/site/{s}.mp4"))),
    );
    let parent = ParentNode::from_dir("/site");
    let urls: Vec<String> = stems.iter().map(|s| format!("{s}.mp4")).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    for (k, failing) in stems.iter().enumerate() {
        let mut root = images(&url_refs);
        let config = config_with(Arc::new(StubTranscoder::failing(failing)));

        let report = embed_videos(&mut root, &files, Some(&parent), &config)
            .await
            .unwrap();

        assert_eq!(report.stats.converted, stems.len() - 1, "k = {k}");
        assert_eq!(report.stats.failed, 1, "k = {k}");
        for (i, node) in root.children()[0].children().iter().enumerate() {
            if i == k {
                assert!(node.is(kind::IMAGE), "k = {k}");
                assert_eq!(node.url.as_deref(), Some(urls[i].as_str()));
            } else {
                assert!(node.is(kind::HTML), "k = {k}, i = {i}");
            }
        }
        assert!(report.nodes[k].outcome.is_failed());
    }
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrency_is_bounded() {
    let files = FileInventory::from_records(
        (0..8).map(|i| FileRecord::new(format!("/site/v{i}.mp4"))),
    );
    let parent = ParentNode::from_dir("/site");
    let urls: Vec<String> = (0..8).map(|i| format!("v{i}.mp4")).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let mut root = images(&url_refs);

    let stub = Arc::new(StubTranscoder::slow(Duration::from_millis(30)));
    let config = EmbedConfig::builder()
        .transcoder(stub.clone())
        .concurrency(2)
        .build()
        .unwrap();

    let report = embed_videos(&mut root, &files, Some(&parent), &config)
        .await
        .unwrap();

    assert_eq!(report.stats.converted, 8);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 8);
    let peak = stub.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight transcodes: {peak}");
    assert!(peak >= 1);
}

#[tokio::test]
async fn report_is_in_document_order() {
    let files = FileInventory::from_records(
        (0..6).map(|i| FileRecord::new(format!("/site/v{i}.mp4"))),
    );
    let parent = ParentNode::from_dir("/site");
    let mut root = images(&["v0.mp4", "x.png", "v1.mp4", "v2.mp4", "https://e/v.mp4", "v5.mp4"]);

    let report = embed_videos(
        &mut root,
        &files,
        Some(&parent),
        &config_with(Arc::new(StubTranscoder::slow(Duration::from_millis(5)))),
    )
    .await
    .unwrap();

    let order: Vec<usize> = report.nodes.iter().map(|n| n.index).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(
        report.stats,
        EmbedStats {
            images: 6,
            converted: 4,
            skipped: 2,
            failed: 0,
            total_duration_ms: report.stats.total_duration_ms,
        }
    );
}

// ── Reporter ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Reporter for Recorder {
    fn on_embed_start(&self, videos: usize) {
        self.events.lock().unwrap().push(format!("start {videos}"));
    }
    fn on_video_skipped(&self, url: &str, reason: SkipReason) {
        self.events.lock().unwrap().push(format!("skip {url} {reason:?}"));
    }
    fn on_video_complete(&self, url: &str, variants: usize) {
        self.events.lock().unwrap().push(format!("done {url} {variants}"));
    }
    fn on_video_error(&self, url: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("error {url}"));
    }
    fn on_embed_complete(&self, stats: &EmbedStats) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {}/{}", stats.converted, stats.images));
    }
}

#[tokio::test]
async fn reporter_sees_every_reference() {
    let (files, parent) = site();
    let recorder = Arc::new(Recorder::default());
    let config = EmbedConfig::builder()
        .transcoder(Arc::new(StubTranscoder::failing("clip")))
        .reporter(recorder.clone())
        .build()
        .unwrap();
    let mut root = images(&["c/vid.mp4", "clip.mov", "logo.svg"]);

    embed_videos(&mut root, &files, Some(&parent), &config)
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("skip logo.svg UnsupportedExtension"));
    assert!(events.contains(&"start 2".to_string()));
    assert!(events.contains(&"done c/vid.mp4 2".to_string()));
    assert!(events.contains(&"error clip.mov".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("complete 1/3"));
}

// ── Markdown and mdast front ends ────────────────────────────────────────────

#[tokio::test]
async fn markdown_rewrites_only_converted_references() {
    let (files, parent) = site();
    let source = "\
# Release notes

Here is the demo:

![demo](c/vid.mp4)

```md
![not parsed](c/vid.mp4)
```

![remote](https://example.com/x.mp4) and ![missing](nope.mp4)
";
    let output = embed_markdown(
        source,
        &files,
        Some(&parent),
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();

    assert_eq!(output.report.stats.converted, 1);
    assert_eq!(output.report.stats.skipped, 2);

    let md = &output.markdown;
    assert!(md.starts_with("# Release notes\n\nHere is the demo:\n\n<div class=\"video-aspect-ratio\""));
    assert!(md.contains("```md\n![not parsed](c/vid.mp4)\n```"));
    assert!(md.ends_with("![remote](https://example.com/x.mp4) and ![missing](nope.mp4)\n"));
    assert_eq!(md.matches("<video").count(), 1);
}

#[tokio::test]
async fn markdown_without_videos_round_trips_exactly() {
    let source = "Intro *text* with ![img](a.png).\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
    let doc = MarkdownDocument::parse(source);
    assert_eq!(doc.render(), source);

    let output = embed_markdown(
        source,
        &FileInventory::default(),
        None,
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();
    assert_eq!(output.markdown, source);
}

#[tokio::test]
async fn ast_json_nodes_are_rewritten() {
    let (files, parent) = site();
    let json = r#"{
        "type": "root",
        "children": [
            {"type": "paragraph", "children": [
                {"type": "image", "url": "c/vid.mp4", "alt": "demo"},
                {"type": "text", "value": " caption"}
            ]},
            {"type": "image", "url": "https://example.com/a.mp4"}
        ]
    }"#;

    let (out, report) = embed_ast_json(
        json,
        &files,
        Some(&parent),
        &config_with(Arc::new(StubTranscoder::default())),
    )
    .await
    .unwrap();
    assert_eq!(report.stats.converted, 1);

    let tree: serde_json::Value = serde_json::from_str(&out).unwrap();
    let converted = &tree["children"][0]["children"][0];
    assert_eq!(converted["type"], "html");
    assert!(converted["value"].as_str().unwrap().starts_with("<div"));
    assert!(converted.get("url").is_none());
    assert_eq!(tree["children"][0]["children"][1]["value"], " caption");
    assert_eq!(tree["children"][1]["type"], "image");
}
