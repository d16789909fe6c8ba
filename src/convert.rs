//! One-shot conversion entry points.
//!
//! Each call builds a fresh [`PipelineController`] over the production
//! adapters, runs a single request through it and returns the result. Use
//! the controller directly when you need to keep state between requests,
//! show previews or share loaded engines.

use crate::config::ConversionConfig;
use crate::controller::PipelineController;
use crate::error::ConvertError;
use crate::format::{ConversionRequest, FormatKey, SourceFile};
use crate::output::{ConversionOutput, RunSummary};
use crate::pipeline::input;
use crate::present;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Convert a file or URL to `format`.
///
/// # Arguments
/// * `input_str`: Local file path or HTTP/HTTPS URL
/// * `format`: Format key: `pdf2jpg`, `pdf2word`, `word2pdf` or `mp4tomp3`
/// * `config`: Conversion configuration
///
/// # Example
/// ```rust,no_run
/// use edgequake_convert::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = convert("slides.pdf", "pdf2jpg", &ConversionConfig::default()).await?;
/// println!("{} bytes of {}", output.artifact.len(), output.artifact.mime());
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input_str: impl AsRef<str>,
    format: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let source = input::load_source(input_str.as_ref(), config.download_timeout_secs).await?;
    let controller = PipelineController::from_config(config)?;
    run(&controller, source, format).await
}

/// Convert an in-memory file. `name` is used for the MIME guess and logs.
pub async fn convert_from_bytes(
    name: &str,
    bytes: Vec<u8>,
    format: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let controller = PipelineController::from_config(config)?;
    run(&controller, SourceFile::new(name, bytes), format).await
}

/// Convert and save the result as `dir/converted-file.<ext>`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    format: &str,
    dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<RunSummary, ConvertError> {
    let source = input::load_source(input_str.as_ref(), config.download_timeout_secs).await?;
    let controller = PipelineController::from_config(config)?;
    let mut output = run(&controller, source, format).await?;
    output.summary.output_path = present::download(&controller, dir).await?;
    Ok(output.summary)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    format: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, format, config))
}

/// Submit one request to `controller` and summarise the run.
pub async fn run(
    controller: &PipelineController,
    source: SourceFile,
    format: &str,
) -> Result<ConversionOutput, ConvertError> {
    let name = source.name.clone();
    let input_bytes = source.len();
    let started = Instant::now();

    let artifact = controller
        .submit(ConversionRequest::new(Some(source), format))
        .await?;

    // The controller only succeeds for keys that parse.
    let format: FormatKey = format.parse()?;

    let summary = RunSummary {
        format,
        source: name,
        input_bytes,
        mime: artifact.mime().to_string(),
        output_bytes: artifact.len(),
        duration_ms: started.elapsed().as_millis() as u64,
        output_path: None,
    };
    info!(
        "Converted {} → {} ({} bytes) in {}ms",
        summary.source, summary.format, summary.output_bytes, summary.duration_ms
    );
    Ok(ConversionOutput { artifact, summary })
}
