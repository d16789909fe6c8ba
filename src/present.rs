//! Result presentation: previews and downloads of the current artifact.
//!
//! A [`Preview`] picks one of four surfaces from the format that produced the
//! artifact. It renders either as a terminal summary ([`std::fmt::Display`])
//! or as an HTML snippet with the artifact inlined as a `data:` URL.

use crate::controller::PipelineController;
use crate::error::ConvertError;
use crate::format::FormatKey;
use crate::output::ConversionArtifact;
use crate::pipeline::archive::entry_count;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Stem of every downloaded file name.
pub const DOWNLOAD_STEM: &str = "converted-file";

/// Which preview surface suits an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    /// Summary text for ZIP archives of page images.
    ArchiveSummary,
    /// Audio player.
    AudioPlayer,
    /// Embedded PDF viewer.
    PdfViewer,
    /// Generic frame for text documents.
    DocumentFrame,
}

impl PreviewKind {
    pub fn for_format(format: FormatKey) -> Self {
        match format {
            FormatKey::PdfToJpg => PreviewKind::ArchiveSummary,
            FormatKey::Mp4ToMp3 => PreviewKind::AudioPlayer,
            FormatKey::WordToPdf => PreviewKind::PdfViewer,
            FormatKey::PdfToWord => PreviewKind::DocumentFrame,
        }
    }
}

/// A preview of one conversion result.
#[derive(Debug, Clone)]
pub struct Preview {
    pub kind: PreviewKind,
    pub format: FormatKey,
    artifact: Arc<ConversionArtifact>,
}

impl Preview {
    pub fn for_result(format: FormatKey, artifact: Arc<ConversionArtifact>) -> Self {
        Self {
            kind: PreviewKind::for_format(format),
            format,
            artifact,
        }
    }

    /// Preview of the controller's current result, if there is one.
    pub fn current(controller: &PipelineController) -> Option<Self> {
        controller
            .current_result()
            .map(|(format, artifact)| Self::for_result(format, artifact))
    }

    pub fn artifact(&self) -> &ConversionArtifact {
        &self.artifact
    }

    fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.artifact.mime(),
            STANDARD.encode(self.artifact.bytes())
        )
    }

    /// HTML snippet for the preview area.
    pub fn to_html(&self) -> String {
        match self.kind {
            PreviewKind::ArchiveSummary => "<p>ZIP containing JPG images</p>".to_string(),
            PreviewKind::AudioPlayer => format!(
                "<audio controls class=\"preview-item\">\n  <source src=\"{}\" type=\"audio/mpeg\">\n  Your browser does not support audio preview.\n</audio>",
                self.data_url()
            ),
            PreviewKind::PdfViewer => format!(
                "<embed class=\"preview-item\" src=\"{}\" type=\"application/pdf\" width=\"100%\" height=\"400px\">",
                self.data_url()
            ),
            PreviewKind::DocumentFrame => format!(
                "<iframe class=\"preview-item\" src=\"{}\" style=\"width:100%; height:400px\"></iframe>",
                self.data_url()
            ),
        }
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = human_size(self.artifact.len());
        match self.kind {
            PreviewKind::ArchiveSummary => {
                write!(f, "ZIP containing JPG images")?;
                if let Some(n) = entry_count(self.artifact.bytes()) {
                    write!(f, " ({} {})", n, if n == 1 { "page" } else { "pages" })?;
                }
                write!(f, ", {}", size)
            }
            PreviewKind::AudioPlayer => write!(f, "MP3 audio, {}", size),
            PreviewKind::PdfViewer => write!(f, "PDF document, {}", size),
            PreviewKind::DocumentFrame => {
                let text = String::from_utf8_lossy(self.artifact.bytes());
                let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                write!(f, "Text document, {}", size)?;
                if !first.is_empty() {
                    write!(f, ": \"{}\"", truncate(first.trim(), 60))?;
                }
                Ok(())
            }
        }
    }
}

fn human_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}

/// `converted-file.<ext>` for a format.
pub fn download_file_name(format: FormatKey) -> String {
    format!("{}.{}", DOWNLOAD_STEM, format.extension())
}

/// Write the current artifact to `dir/converted-file.<ext>`.
///
/// Returns `Ok(None)` without touching the file system when the controller
/// holds no successful result.
///
/// The bytes go to a uniquely named temp file in `dir` that is then renamed
/// over the target, so readers never see a partial file and concurrent
/// downloads into one directory do not share a temp path.
pub async fn download(
    controller: &PipelineController,
    dir: impl AsRef<Path>,
) -> Result<Option<PathBuf>, ConvertError> {
    let Some((format, artifact)) = controller.current_result() else {
        debug!("Download requested with no result; ignoring");
        return Ok(None);
    };

    let dir = dir.as_ref();
    let path = dir.join(download_file_name(format));
    let write_err = |e: std::io::Error| ConvertError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let tmp_dir = dir.to_path_buf();
    let target = path.clone();
    let data = Arc::clone(&artifact);
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        // Dropping an unpersisted temp file deletes it.
        let mut tmp = tempfile::NamedTempFile::new_in(&tmp_dir)?;
        tmp.write_all(data.bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| write_err(std::io::Error::other(e)))?
    .map_err(write_err)?;

    info!("Saved {} ({} bytes)", path.display(), artifact.len());
    Ok(Some(path))
}
