//! CLI binary for mdvideo.
//!
//! A thin shim over the library crate that maps CLI flags to `EmbedConfig`,
//! builds the file inventory and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdvideo::{
    embed_ast_json, embed_markdown, EmbedConfig, EmbedReport, EmbedStats, FileConfig,
    FileInventory, ParentNode, ProgressReporter, Reporter, SkipReason, write_output,
};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI reporter using indicatif ─────────────────────────────────────────────

/// Start instants of in-flight videos. A URL referenced several times has
/// one entry per reference, consumed oldest first.
#[derive(Default)]
struct StartTimes(Mutex<HashMap<String, VecDeque<Instant>>>);

impl StartTimes {
    fn start(&self, url: &str) {
        if let Ok(mut m) = self.0.lock() {
            m.entry(url.to_string()).or_default().push_back(Instant::now());
        }
    }

    fn finish(&self, url: &str) -> Option<Duration> {
        let mut m = self.0.lock().ok()?;
        let queue = m.get_mut(url)?;
        let started = queue.pop_front()?;
        if queue.is_empty() {
            m.remove(url);
        }
        Some(started.elapsed())
    }
}

/// Terminal reporter: a live progress bar plus one log line per video.
struct CliReporter {
    bar: ProgressBar,
    start_times: StartTimes,
    errors: AtomicUsize,
}

impl CliReporter {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Looking for video references…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: StartTimes::default(),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} videos  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcoding");
        self.bar.reset_eta();
    }

    fn elapsed(&self, url: &str) -> String {
        let ms = self
            .start_times
            .finish(url)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

impl Reporter for CliReporter {
    fn on_embed_start(&self, videos: usize) {
        self.activate_bar(videos);
        if videos > 0 {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Transcoding {videos} videos…"))
            ));
        }
    }

    fn on_video_skipped(&self, url: &str, reason: SkipReason) {
        // Remote and non-video images are the normal case; only mention
        // references that look like local videos but went nowhere.
        if matches!(
            reason,
            SkipReason::NoMatchingFile | SkipReason::NoParentDirectory
        ) {
            self.bar
                .println(format!("  {} {}  {}", dim("-"), url, dim(&reason.to_string())));
        }
    }

    fn on_video_start(&self, url: &str, _path: &str) {
        self.start_times.start(url);
        self.bar.set_message(url.to_string());
    }

    fn on_video_complete(&self, url: &str, variants: usize) {
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            url,
            dim(&format!("{variants} variants")),
            dim(&self.elapsed(url)),
        ));
        self.bar.inc(1);
    }

    fn on_video_error(&self, url: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = match error.char_indices().nth(80) {
            Some((i, _)) => format!("{}\u{2026}", &error[..i]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            url,
            red(&msg),
            dim(&self.elapsed(url)),
        ));
        self.bar.inc(1);
    }

    fn on_embed_complete(&self, stats: &EmbedStats) {
        self.bar.finish_and_clear();
        let attempted = stats.converted + stats.failed;
        if attempted == 0 {
            return;
        }
        if stats.failed == 0 {
            eprintln!(
                "{} {} videos embedded",
                green("✔"),
                bold(&stats.converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} videos embedded  ({} failed)",
                if stats.converted == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&stats.converted.to_string()),
                attempted,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rewrite a post, print the result
  mdvideo content/posts/demo.md

  # Write to a file, index the whole content tree
  mdvideo content/posts/demo.md --root content -o build/demo.md

  # Serve encodes from a CDN prefix
  mdvideo demo.md --output-dir dist/media --public-path https://cdn.example.com/media

  # Work on an mdast JSON tree instead of markdown
  mdvideo --ast tree.json --parent-dir content/posts --root content

  # Per-video report as JSON; fail if any video failed
  mdvideo demo.md --json --strict > report.json

CONFIG FILE (--config mdvideo.toml):
  concurrency = 4
  output_dir = "public/static"
  public_path = "/static"

  [[pipelines]]           # overrides the vp9 profile
  max_height = 720

  [[pipelines]]           # overrides the h264 profile
  output_options = ["-preset", "slow", "-crf", "23"]

ENVIRONMENT VARIABLES:
  MDVIDEO_FFMPEG   Path to ffmpeg (default: search PATH)
  MDVIDEO_FFPROBE  Path to ffprobe (default: search PATH)
  RUST_LOG         Log filter, e.g. mdvideo=debug
"#;

/// Replace local video references in markdown with HTML video embeds.
#[derive(Parser, Debug)]
#[command(
    name = "mdvideo",
    version,
    about = "Replace local video references in markdown with HTML video embeds",
    long_about = "Finds image-style references to local videos (avi, mp4, mov, mkv) in a \
markdown document, transcodes each one with ffmpeg into web-friendly variants and replaces \
the reference with an autoplaying, muted, looping <video> block.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file (or mdast JSON with --ast).
    input: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "MDVIDEO_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory whose files may be embedded. Default: the input's directory.
    #[arg(long, env = "MDVIDEO_ROOT")]
    root: Option<PathBuf>,

    /// Directory encoded videos are written to.
    #[arg(long, env = "MDVIDEO_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// URL prefix under which --output-dir is served.
    #[arg(long, env = "MDVIDEO_PUBLIC_PATH")]
    public_path: Option<String>,

    /// Number of videos transcoded at once. Default: CPU count.
    #[arg(short, long, env = "MDVIDEO_CONCURRENCY")]
    concurrency: Option<usize>,

    /// TOML configuration file; command-line flags take precedence.
    #[arg(long, env = "MDVIDEO_CONFIG")]
    config: Option<PathBuf>,

    /// Treat the input as an mdast JSON tree and print the rewritten tree.
    #[arg(long)]
    ast: bool,

    /// Directory relative references resolve against. Default: the input's
    /// directory.
    #[arg(long, env = "MDVIDEO_PARENT_DIR")]
    parent_dir: Option<PathBuf>,

    /// `class` attribute of the wrapper <div>.
    #[arg(long, env = "MDVIDEO_WRAPPER_CLASS")]
    wrapper_class: Option<String>,

    /// Path to the ffmpeg executable.
    #[arg(long, env = "MDVIDEO_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable.
    #[arg(long, env = "MDVIDEO_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// Per-invocation ffmpeg/ffprobe timeout in seconds.
    #[arg(long, env = "MDVIDEO_TOOL_TIMEOUT")]
    tool_timeout: Option<u64>,

    /// Print the per-video report as JSON instead of the document.
    #[arg(long, env = "MDVIDEO_JSON")]
    json: bool,

    /// Exit with an error if any video failed to transcode.
    #[arg(long, env = "MDVIDEO_STRICT")]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "MDVIDEO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDVIDEO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDVIDEO_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let reporter: Option<ProgressReporter> = if show_progress {
        Some(CliReporter::new() as Arc<dyn Reporter>)
    } else {
        None
    };
    let config = build_config(&cli, reporter)?;

    // ── Inventory and parent directory ───────────────────────────────────
    let input_dir = input_dir(&cli.input)?;
    let root = cli.root.clone().unwrap_or_else(|| input_dir.clone());
    let files = FileInventory::scan_dir(&root)
        .with_context(|| format!("Failed to index {}", root.display()))?;
    let parent_dir = cli.parent_dir.clone().unwrap_or(input_dir);
    let parent = match std::fs::canonicalize(&parent_dir) {
        Ok(dir) => ParentNode::from_dir(dir),
        Err(_) => ParentNode::default(),
    };

    let input = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    // ── Run ──────────────────────────────────────────────────────────────
    let (document, report) = if cli.ast {
        embed_ast_json(&input, &files, Some(&parent), &config)
            .await
            .context("Embedding failed")?
    } else {
        let output = embed_markdown(&input, &files, Some(&parent), &config)
            .await
            .context("Embedding failed")?;
        (output.markdown, output.report)
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
        if let Some(ref output_path) = cli.output {
            write_output(output_path, &document).await?;
        }
    } else if let Some(ref output_path) = cli.output {
        write_output(output_path, &document).await?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} images embedded  {}ms  →  {}",
                if report.stats.failed == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                report.stats.converted,
                report.stats.images,
                report.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(document.as_bytes())
            .context("Failed to write to stdout")?;
        if !document.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        print_summary(&report);
    }

    if cli.strict {
        report.into_result().context("Some videos failed")?;
    }

    Ok(())
}

/// Map the config file, then CLI args, onto `EmbedConfig`.
fn build_config(cli: &Cli, reporter: Option<ProgressReporter>) -> Result<EmbedConfig> {
    let mut builder = EmbedConfig::builder();

    if let Some(ref path) = cli.config {
        let file = FileConfig::load(path).context("Failed to load configuration file")?;
        builder = file.apply(builder);
    }

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref d) = cli.output_dir {
        builder = builder.output_dir(d);
    }
    if let Some(ref p) = cli.public_path {
        builder = builder.public_path(p);
    }
    if let Some(ref c) = cli.wrapper_class {
        builder = builder.wrapper_class(c);
    }
    if let Some(ref p) = cli.ffmpeg {
        builder = builder.ffmpeg_path(p);
    }
    if let Some(ref p) = cli.ffprobe {
        builder = builder.ffprobe_path(p);
    }
    if let Some(s) = cli.tool_timeout {
        builder = builder.tool_timeout_secs(s);
    }
    if let Some(r) = reporter {
        builder = builder.reporter(r);
    }

    builder.build().context("Invalid configuration")
}

/// Directory holding `input`, made absolute.
fn input_dir(input: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(input)
        .with_context(|| format!("Input file not found: {}", input.display()))?;
    Ok(canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(canonical))
}

/// Write via a temp file + rename so readers never see a partial file.
fn print_summary(report: &EmbedReport) {
    let s = &report.stats;
    eprintln!(
        "Embedded {}/{} images in {}ms ({} skipped)",
        s.converted, s.images, s.total_duration_ms, s.skipped
    );
    if s.failed > 0 {
        eprintln!("  {} videos failed", s.failed);
    }
}
