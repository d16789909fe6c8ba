//! Format keys and the request types that carry them.
//!
//! A [`FormatKey`] names one of the four supported conversions. Each key owns
//! its wire name (`pdf2jpg`, …), the MIME type of the artifact it produces and
//! the file extension used when that artifact is downloaded. Keeping the three
//! tables on the enum means they cannot drift apart.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Extension used for downloads when the format key is not recognised.
pub const FALLBACK_EXTENSION: &str = "file";

/// The fixed set of supported conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKey {
    /// PDF → ZIP of JPEG page images.
    #[serde(rename = "pdf2jpg")]
    PdfToJpg,
    /// PDF → plain text tagged as a Word document.
    #[serde(rename = "pdf2word")]
    PdfToWord,
    /// DOCX → PDF.
    #[serde(rename = "word2pdf")]
    WordToPdf,
    /// MP4 → MP3 audio track.
    #[serde(rename = "mp4tomp3")]
    Mp4ToMp3,
}

impl FormatKey {
    /// Every supported key, in menu order.
    pub const ALL: [FormatKey; 4] = [
        FormatKey::PdfToJpg,
        FormatKey::PdfToWord,
        FormatKey::WordToPdf,
        FormatKey::Mp4ToMp3,
    ];

    /// Short wire name, as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            FormatKey::PdfToJpg => "pdf2jpg",
            FormatKey::PdfToWord => "pdf2word",
            FormatKey::WordToPdf => "word2pdf",
            FormatKey::Mp4ToMp3 => "mp4tomp3",
        }
    }

    /// MIME type of the artifact this conversion produces.
    pub fn output_mime(self) -> &'static str {
        match self {
            FormatKey::PdfToJpg => "application/zip",
            // Plain text payload; the tag is what Word-aware viewers expect.
            FormatKey::PdfToWord => "application/msword",
            FormatKey::WordToPdf => "application/pdf",
            FormatKey::Mp4ToMp3 => "audio/mpeg",
        }
    }

    /// File extension for the downloaded artifact.
    pub fn extension(self) -> &'static str {
        match self {
            FormatKey::PdfToJpg => "zip",
            FormatKey::PdfToWord => "doc",
            FormatKey::WordToPdf => "pdf",
            FormatKey::Mp4ToMp3 => "mp3",
        }
    }

    /// Human-readable label, e.g. for `--list-formats`.
    pub fn label(self) -> &'static str {
        match self {
            FormatKey::PdfToJpg => "PDF to JPG (zip of page images)",
            FormatKey::PdfToWord => "PDF to Word (extracted text)",
            FormatKey::WordToPdf => "Word (.docx) to PDF",
            FormatKey::Mp4ToMp3 => "MP4 to MP3 (audio track)",
        }
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKey {
    type Err = ConvertError;

    /// Accepts the wire names (`pdf2jpg`) and the variant names (`PdfToJpg`),
    /// case-insensitively. Anything else is [`ConvertError::UnsupportedFormat`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FormatKey::ALL
            .into_iter()
            .find(|k| {
                k.as_str() == needle || format!("{k:?}").to_ascii_lowercase() == needle
            })
            .ok_or_else(|| ConvertError::UnsupportedFormat { key: s.to_string() })
    }
}

/// Look up the download extension for a raw key.
///
/// Unknown keys fall back to [`FALLBACK_EXTENSION`]; the pipeline rejects them
/// long before a download can happen, so the fallback only matters to callers
/// that build file names themselves.
pub fn extension_for_key(key: &str) -> &'static str {
    key.parse::<FormatKey>()
        .map(FormatKey::extension)
        .unwrap_or(FALLBACK_EXTENSION)
}

/// A user-selected input file held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original file name (no directory part).
    pub name: String,
    /// MIME type guessed from the name, if known.
    pub mime: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Build a source file, guessing the MIME type from `name`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = guess_mime(&name).map(str::to_string);
        Self { name, mime, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One conversion request: an optional source file and a raw format key.
///
/// `source == None` models "no file selected". The key is kept as a string so
/// that unknown keys reach the dispatcher and fail there, loudly.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: Option<SourceFile>,
    pub format: String,
}

impl ConversionRequest {
    pub fn new(source: Option<SourceFile>, format: impl Into<String>) -> Self {
        Self {
            source,
            format: format.into(),
        }
    }
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "doc" => Some("application/msword"),
        "mp4" | "m4v" => Some("video/mp4"),
        "mp3" => Some("audio/mpeg"),
        "zip" => Some("application/zip"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_and_variant_names() {
        assert_eq!("pdf2jpg".parse::<FormatKey>().unwrap(), FormatKey::PdfToJpg);
        assert_eq!("PDF2WORD".parse::<FormatKey>().unwrap(), FormatKey::PdfToWord);
        assert_eq!("WordToPdf".parse::<FormatKey>().unwrap(), FormatKey::WordToPdf);
        assert_eq!(" mp4tomp3 ".parse::<FormatKey>().unwrap(), FormatKey::Mp4ToMp3);
    }

    #[test]
    fn unknown_key_is_unsupported() {
        let err = "png2gif".parse::<FormatKey>().unwrap_err();
        match err {
            ConvertError::UnsupportedFormat { key } => assert_eq!(key, "png2gif"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mime_and_extension_tables() {
        let table: Vec<_> = FormatKey::ALL
            .iter()
            .map(|k| (k.as_str(), k.output_mime(), k.extension()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("pdf2jpg", "application/zip", "zip"),
                ("pdf2word", "application/msword", "doc"),
                ("word2pdf", "application/pdf", "pdf"),
                ("mp4tomp3", "audio/mpeg", "mp3"),
            ]
        );
    }

    #[test]
    fn extension_lookup_falls_back() {
        assert_eq!(extension_for_key("word2pdf"), "pdf");
        assert_eq!(extension_for_key("tiff2bmp"), FALLBACK_EXTENSION);
        assert_eq!(extension_for_key(""), "file");
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&FormatKey::Mp4ToMp3).unwrap();
        assert_eq!(json, "\"mp4tomp3\"");
        let back: FormatKey = serde_json::from_str("\"pdf2word\"").unwrap();
        assert_eq!(back, FormatKey::PdfToWord);
    }

    #[test]
    fn source_file_guesses_mime() {
        let f = SourceFile::new("Report.PDF", vec![1, 2, 3]);
        assert_eq!(f.mime.as_deref(), Some("application/pdf"));
        assert_eq!(f.len(), 3);
        assert!(SourceFile::new("notes", vec![]).mime.is_none());
    }
}
