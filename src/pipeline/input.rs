//! Input resolution: load a user-supplied path or URL into a [`SourceFile`].
//!
//! Every engine works from an in-memory buffer, so both local files and URL
//! downloads end up as bytes plus the original file name. The name carries
//! the MIME guess and is shown in previews and logs.

use crate::error::ConvertError;
use crate::format::SourceFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input string into memory.
///
/// If the input is a URL, download it. If the input is a local file, validate
/// it exists and is readable, then read it.
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<SourceFile, ConvertError> {
    if input.trim().is_empty() {
        return Err(ConvertError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
async fn load_local(path_str: &str) -> Result<SourceFile, ConvertError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ConvertError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => return Err(ConvertError::FileNotFound { path }),
    };

    let name = file_name_of(&path);
    debug!("Loaded local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, ConvertError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let name = file_name_from_url(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(SourceFile::new(name, bytes.to_vec()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

/// Extract a reasonable file name from the URL path.
pub fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("https://example.com/a/clip.mp4"), "clip.mp4");
        assert_eq!(file_name_from_url("https://example.com/a/"), "download");
        assert_eq!(file_name_from_url("https://example.com/report"), "download");
    }

    #[tokio::test]
    async fn loads_local_file_with_mime_guess() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.docx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let src = load_source(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(src.name, "letter.docx");
        assert_eq!(src.bytes, b"PK\x03\x04");
        assert!(src.mime.unwrap().contains("wordprocessingml"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_source("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = load_source("  ", 5).await.unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput { .. }), "got {err:?}");
    }
}
