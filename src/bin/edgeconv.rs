//! CLI binary for edgequake-convert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, runs one request through a `PipelineController`
//! and saves the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_convert::pipeline::input::load_source;
use edgequake_convert::{
    download, ConversionConfig, ConversionRequest, FormatKey, PipelineController,
    PipelineObserver, Preview, ProgressObserver, RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── Busy indicator using indicatif ───────────────────────────────────────────

/// Terminal spinner shown while the pipeline is Running.
///
/// Conversions report no intermediate progress, so this is a spinner with an
/// elapsed clock rather than a bar.
struct CliSpinner {
    bar: ProgressBar,
}

impl CliSpinner {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliSpinner {
    fn on_conversion_start(&self, format: &str, source: &str) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("{source} ({format})"));
        self.bar.reset_elapsed();
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_conversion_complete(&self, format: FormatKey, bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} finished  {}",
            green("✔"),
            bold(format.label()),
            dim(&format!("{bytes} bytes")),
        );
    }

    fn on_conversion_error(&self, message: &str) {
        self.bar.finish_and_clear();
        let first = message.lines().next().unwrap_or(message);
        eprintln!("{} {}", red("✘"), red(first));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # PDF pages to a ZIP of JPG images (saved as ./converted-file.zip)
  edgeconv slides.pdf

  # Extract the text of a PDF into a Word-compatible file
  edgeconv --to pdf2word report.pdf -o out/

  # Lay out a .docx as an A4 PDF with 20 mm margins
  edgeconv --to word2pdf --margin 20 letter.docx

  # Pull the audio track out of a video
  edgeconv --to mp4tomp3 talk.mp4

  # Convert from URL, write an HTML preview and a JSON summary
  edgeconv --to pdf2jpg https://example.com/paper.pdf --preview-html preview.html --json

FORMATS:
  Key        Conversion     Output MIME            Saved as
  ─────────  ─────────────  ─────────────────────  ───────────────────
  pdf2jpg    PDF → JPG      application/zip        converted-file.zip
  pdf2word   PDF → Word     application/msword     converted-file.doc
  word2pdf   Word → PDF     application/pdf        converted-file.pdf
  mp4tomp3   MP4 → MP3      audio/mpeg             converted-file.mp3

ENVIRONMENT VARIABLES:
  EDGECONV_TO             Default conversion key
  EDGECONV_FFMPEG         Path to the ffmpeg executable (default: ffmpeg on PATH)
  PDFIUM_LIB_PATH         Path to an existing libpdfium (default: system library)
  RUST_LOG                Override log filtering (e.g. edgequake_convert=debug)

SETUP:
  PDF → JPG and PDF → Word need the PDFium shared library.
  MP4 → MP3 needs an ffmpeg binary. Word → PDF has no external dependency.
"#;

/// Convert PDF, Word and MP4 files between formats.
#[derive(Parser, Debug)]
#[command(
    name = "edgeconv",
    version,
    about = "Convert PDF, Word and MP4 files between formats",
    long_about = "Convert a local file or URL with one of four conversions: PDF to a ZIP of JPG \
page images, PDF to Word-compatible text, Word (.docx) to PDF, or MP4 to MP3. The result is \
saved as converted-file.<ext> in the output directory.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_formats")]
    input: Option<String>,

    /// Conversion key: pdf2jpg, pdf2word, word2pdf, mp4tomp3.
    #[arg(short, long, env = "EDGECONV_TO", default_value = "pdf2jpg")]
    to: String,

    /// Directory to save converted-file.<ext> into.
    #[arg(short, long, env = "EDGECONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also write the HTML preview snippet to this file.
    #[arg(long, env = "EDGECONV_PREVIEW_HTML")]
    preview_html: Option<PathBuf>,

    /// Print a JSON run summary to stdout.
    #[arg(long, env = "EDGECONV_JSON")]
    json: bool,

    /// Page magnification for pdf2jpg (0.1–8.0).
    #[arg(long, env = "EDGECONV_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality for pdf2jpg (1–100).
    #[arg(long, env = "EDGECONV_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page margin in millimetres for word2pdf.
    #[arg(long, env = "EDGECONV_MARGIN", default_value_t = 15.0)]
    margin: f32,

    /// ffmpeg -q:a value for mp4tomp3 (0 best, 9 worst).
    #[arg(long, env = "EDGECONV_AUDIO_QUALITY", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    audio_quality: u8,

    /// ffmpeg executable.
    #[arg(long, env = "EDGECONV_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// PDFium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Word → PDF layout timeout in seconds.
    #[arg(long, env = "EDGECONV_LAYOUT_TIMEOUT", default_value_t = 60)]
    layout_timeout: u64,

    /// ffmpeg timeout in seconds.
    #[arg(long, env = "EDGECONV_TRANSCODE_TIMEOUT", default_value_t = 300)]
    transcode_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EDGECONV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the busy spinner.
    #[arg(long, env = "EDGECONV_NO_PROGRESS")]
    no_progress: bool,

    /// List the supported conversions and exit.
    #[arg(long)]
    list_formats: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EDGECONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EDGECONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback a normal run needs, so library logs
    // stay at ERROR unless the spinner is off or -v is given.
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

    // ── List formats ─────────────────────────────────────────────────────
    if cli.list_formats {
        for key in FormatKey::ALL {
            println!(
                "{:<10} {:<14} {:<22} {}",
                key.as_str(),
                key.label(),
                key.output_mime(),
                edgequake_convert::download_file_name(key)
            );
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input file or URL is required")?;

    // ── Build config and pipeline ────────────────────────────────────────
    let observer: Option<ProgressObserver> = if show_progress {
        Some(CliSpinner::new() as Arc<dyn PipelineObserver>)
    } else {
        None
    };
    let config = build_config(&cli, observer)?;
    let pipeline = PipelineController::from_config(&config).context("Failed to set up engines")?;

    // ── Load input ───────────────────────────────────────────────────────
    let source = load_source(&input, config.download_timeout_secs)
        .await
        .context("Failed to load input")?;
    let source_name = source.name.clone();
    let input_bytes = source.len();

    // ── Run conversion ───────────────────────────────────────────────────
    let started = Instant::now();
    let artifact = pipeline
        .submit(ConversionRequest::new(Some(source), cli.to.clone()))
        .await
        .context("Conversion failed")?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let preview = Preview::current(&pipeline).context("Pipeline finished without a result")?;
    let saved = download(&pipeline, &cli.output_dir)
        .await
        .context("Failed to save result")?;

    if let Some(ref html_path) = cli.preview_html {
        tokio::fs::write(html_path, preview.to_html())
            .await
            .with_context(|| format!("Failed to write preview to {:?}", html_path))?;
    }

    let summary = RunSummary {
        format: preview.format,
        source: source_name,
        input_bytes,
        mime: artifact.mime().to_string(),
        output_bytes: artifact.len(),
        duration_ms,
        output_path: saved,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!("{}  {}", cyan("◆"), preview);
        if let Some(ref path) = summary.output_path {
            eprintln!(
                "{}  {}ms  →  {}",
                green("✔"),
                summary.duration_ms,
                bold(&path.display().to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, observer: Option<ProgressObserver>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .render_scale(cli.scale)
        .jpeg_quality(cli.quality)
        .page_margin_mm(cli.margin)
        .audio_quality(cli.audio_quality)
        .layout_timeout_secs(cli.layout_timeout)
        .transcode_timeout_secs(cli.transcode_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.ffmpeg {
        builder = builder.ffmpeg_path(path);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}
