//! # edgequake-convert
//!
//! Convert files between formats: PDF → JPG, PDF → Word, Word → PDF and
//! MP4 → MP3.
//!
//! The heavy lifting happens in external engines (PDFium for PDF pages, a
//! text-flow layout over `lopdf` for generated PDFs, ffmpeg for audio). This
//! crate sequences them: it validates the request, picks the adapter for the
//! format key, tracks the pipeline state and delivers the result as a preview
//! and a downloadable file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! path / URL
//!  │
//!  ├─ 1. Input     read local file or download from URL
//!  ├─ 2. Submit    controller validates, rejects while busy, enters Running
//!  ├─ 3. Dispatch  format key → adapter (unknown keys fail here)
//!  ├─ 4. Convert   adapter drives its engine (spawn_blocking / ffmpeg)
//!  └─ 5. Present   preview + download as converted-file.<ext>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{
//!     download, ConversionConfig, ConversionRequest, PipelineController, Preview, SourceFile,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let pipeline = PipelineController::from_config(&config)?;
//!
//!     let source = SourceFile::new("report.docx", std::fs::read("report.docx")?);
//!     pipeline
//!         .submit(ConversionRequest::new(Some(source), "word2pdf"))
//!         .await?;
//!
//!     if let Some(preview) = Preview::current(&pipeline) {
//!         println!("{preview}");
//!     }
//!     let saved = download(&pipeline, "out").await?;
//!     println!("saved to {:?}", saved);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edgeconv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-convert = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Engines
//!
//! | Format     | Engine | Located via |
//! |------------|--------|-------------|
//! | `pdf2jpg`, `pdf2word` | PDFium | `PDFIUM_LIB_PATH` or system library |
//! | `word2pdf` | built-in text-flow layout | nothing to locate |
//! | `mp4tomp3` | ffmpeg | `EDGECONV_FFMPEG` or `PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapters;
pub mod config;
pub mod controller;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapters::{ConversionAdapter, DocumentToPdf, MediaAudioExtract, PdfToImage, PdfToText};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use controller::{PipelineController, PipelineState};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_dir};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::{ConvertError, EngineError};
pub use format::{extension_for_key, ConversionRequest, FormatKey, SourceFile, FALLBACK_EXTENSION};
pub use output::{ConversionArtifact, ConversionOutput, RunSummary};
pub use present::{download, download_file_name, Preview, PreviewKind, DOWNLOAD_STEM};
pub use progress::{NoopObserver, PipelineObserver, ProgressObserver};
