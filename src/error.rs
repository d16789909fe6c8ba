//! Error types for the edgequake-convert library.
//!
//! Two error types reflect two layers:
//!
//! * [`ConvertError`]: what callers of the pipeline see. Every failure the
//!   user can hit (no file, unknown format, busy pipeline, a conversion that
//!   went wrong) is one variant, and its `Display` text is the message shown
//!   to the user.
//!
//! * [`EngineError`]: what the external engines (PDFium, the DOCX reader,
//!   the PDF layout, ffmpeg) report. Adapters fold every engine error into
//!   [`ConvertError::ConversionFailed`] so callers never match on engine
//!   internals.

use crate::format::FormatKey;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-convert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request carried no source file.
    #[error("Please select a file first!")]
    NoInputSelected,

    /// The format key is not one of the supported conversions.
    #[error("Invalid conversion format '{key}'\nSupported: pdf2jpg, pdf2word, word2pdf, mp4tomp3")]
    UnsupportedFormat { key: String },

    /// The selected engine failed; no artifact was produced.
    #[error("{format} conversion failed: {reason}")]
    ConversionFailed { format: FormatKey, reason: String },

    /// Another conversion is still running on this pipeline.
    #[error("A conversion is already running; wait for it to finish and try again")]
    PipelineBusy,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the downloaded artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Wrap an engine failure for the given conversion.
    pub fn failed(format: FormatKey, err: impl std::fmt::Display) -> Self {
        ConvertError::ConversionFailed {
            format,
            reason: err.to_string(),
        }
    }
}

/// Failures reported by an external conversion engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine library or binary could not be loaded.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The input could not be opened by the engine (corrupt, wrong type).
    #[error("could not open input: {0}")]
    Load(String),

    /// A single page failed to render or extract.
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// Encoding the output (JPEG, ZIP, PDF) failed.
    #[error("encoding failed: {0}")]
    Encode(String),

    /// The engine did not finish in time.
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// An external process exited unsuccessfully.
    #[error("process exited with status {status}: {stderr}")]
    Process { status: String, stderr: String },

    /// A sandbox file name was rejected.
    #[error("invalid sandbox file name '{0}'")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_input_message_matches_ui_text() {
        assert_eq!(
            ConvertError::NoInputSelected.to_string(),
            "Please select a file first!"
        );
    }

    #[test]
    fn unsupported_format_display() {
        let e = ConvertError::UnsupportedFormat {
            key: "gif2png".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gif2png"), "got: {msg}");
        assert!(msg.contains("word2pdf"), "got: {msg}");
    }

    #[test]
    fn conversion_failed_wraps_engine_error() {
        let e = ConvertError::failed(
            FormatKey::PdfToJpg,
            EngineError::Page {
                page: 3,
                detail: "bad xref".into(),
            },
        );
        let msg = e.to_string();
        assert!(msg.starts_with("pdf2jpg conversion failed"), "got: {msg}");
        assert!(msg.contains("page 3: bad xref"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = EngineError::Timeout { elapsed_ms: 60_000 };
        assert_eq!(e.to_string(), "timed out after 60000ms");
    }

    #[test]
    fn process_display() {
        let e = EngineError::Process {
            status: "exit status: 1".into(),
            stderr: "Output file #0 does not contain any stream".into(),
        };
        assert!(e.to_string().contains("does not contain any stream"));
    }
}
