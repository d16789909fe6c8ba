//! Output types: the conversion artifact and a serialisable run summary.

use crate::format::FormatKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The binary output of one successful conversion, tagged with a MIME type.
///
/// An adapter either returns a complete artifact or an error; there is no
/// partially-filled artifact.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionArtifact {
    bytes: Vec<u8>,
    mime: String,
}

impl ConversionArtifact {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for ConversionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionArtifact")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Summary of one pipeline run, suitable for `--json` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Conversion that ran.
    pub format: FormatKey,
    /// Source file name.
    pub source: String,
    /// Source size in bytes.
    pub input_bytes: usize,
    /// Artifact MIME type.
    pub mime: String,
    /// Artifact size in bytes.
    pub output_bytes: usize,
    /// Wall-clock time of the conversion.
    pub duration_ms: u64,
    /// Where the artifact was written, if it was downloaded.
    pub output_path: Option<PathBuf>,
}

/// Result of a one-shot conversion: the artifact plus its run summary.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub artifact: Arc<ConversionArtifact>,
    pub summary: RunSummary,
}
