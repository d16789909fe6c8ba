//! Configuration types for file conversion.
//!
//! Every fixed per-format parameter (render scale, JPEG quality, page margin,
//! audio quality) and every engine timeout lives in [`ConversionConfig`],
//! built via [`ConversionConfigBuilder`]. The defaults are exported as named
//! constants so tests and callers can refer to them directly.

use crate::error::ConvertError;
use crate::progress::ProgressObserver;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Magnification applied when rasterising PDF pages (PDF → JPG).
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// JPEG quality (1–100) for rasterised pages. 90 corresponds to 0.9.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Margin on all four sides of generated PDF pages, in millimetres.
pub const DEFAULT_PAGE_MARGIN_MM: f32 = 15.0;

/// ffmpeg `-q:a` value for MP3 extraction. 0 is the best VBR quality.
pub const DEFAULT_AUDIO_QUALITY: u8 = 0;

/// Upper bound for the Word → PDF layout step.
pub const DEFAULT_LAYOUT_TIMEOUT_SECS: u64 = 60;

/// Upper bound for a single ffmpeg transcode.
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 300;

/// Upper bound for downloading a URL input.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_convert::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .render_scale(3.0)
///     .jpeg_quality(80)
///     .build()
///     .unwrap();
/// assert_eq!(config.jpeg_quality, 80);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Page magnification for PDF → JPG. Range: 0.1–8.0. Default: 2.0.
    ///
    /// At 2× an A4 page renders to roughly 1190 × 1684 px, readable on screen
    /// without producing multi-megabyte JPEGs.
    pub render_scale: f32,

    /// JPEG quality for PDF → JPG. Range: 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Margin in millimetres on each side of Word → PDF pages. Range: 0–100. Default: 15.
    pub page_margin_mm: f32,

    /// ffmpeg `-q:a` for MP4 → MP3. Range: 0–9 (lower is better). Default: 0.
    pub audio_quality: u8,

    /// Word → PDF layout timeout in seconds. Default: 60.
    ///
    /// A layout that never completes surfaces as a failed conversion rather
    /// than a pipeline stuck in Running.
    pub layout_timeout_secs: u64,

    /// ffmpeg timeout in seconds. Default: 300.
    pub transcode_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// ffmpeg executable. If None, `ffmpeg` is looked up on `PATH`.
    pub ffmpeg_path: Option<PathBuf>,

    /// PDFium shared library. If None, the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional observer notified as the pipeline starts and finishes runs.
    pub observer: Option<ProgressObserver>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            page_margin_mm: DEFAULT_PAGE_MARGIN_MM,
            audio_quality: DEFAULT_AUDIO_QUALITY,
            layout_timeout_secs: DEFAULT_LAYOUT_TIMEOUT_SECS,
            transcode_timeout_secs: DEFAULT_TRANSCODE_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            ffmpeg_path: None,
            pdfium_lib_path: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("render_scale", &self.render_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("page_margin_mm", &self.page_margin_mm)
            .field("audio_quality", &self.audio_quality)
            .field("layout_timeout_secs", &self.layout_timeout_secs)
            .field("transcode_timeout_secs", &self.transcode_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn layout_timeout(&self) -> Duration {
        Duration::from_secs(self.layout_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn page_margin_mm(mut self, mm: f32) -> Self {
        self.config.page_margin_mm = mm;
        self
    }

    pub fn audio_quality(mut self, q: u8) -> Self {
        self.config.audio_quality = q;
        self
    }

    pub fn layout_timeout_secs(mut self, secs: u64) -> Self {
        self.config.layout_timeout_secs = secs;
        self
    }

    pub fn transcode_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transcode_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn observer(mut self, observer: ProgressObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !(0.1..=8.0).contains(&c.render_scale) {
            return Err(ConvertError::InvalidConfig(format!(
                "Render scale must be 0.1–8.0, got {}",
                c.render_scale
            )));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ConvertError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if !(0.0..=100.0).contains(&c.page_margin_mm) {
            return Err(ConvertError::InvalidConfig(format!(
                "Page margin must be 0–100 mm, got {}",
                c.page_margin_mm
            )));
        }
        if c.audio_quality > 9 {
            return Err(ConvertError::InvalidConfig(format!(
                "Audio quality must be 0–9, got {}",
                c.audio_quality
            )));
        }
        if c.layout_timeout_secs == 0 || c.transcode_timeout_secs == 0 || c.download_timeout_secs == 0
        {
            return Err(ConvertError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let c = ConversionConfig::default();
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.jpeg_quality, 90);
        assert_eq!(c.page_margin_mm, 15.0);
        assert_eq!(c.audio_quality, 0);
        assert_eq!(c.layout_timeout(), Duration::from_secs(60));
        assert_eq!(c.transcode_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn builder_accepts_valid_values() {
        let c = ConversionConfig::builder()
            .render_scale(1.5)
            .jpeg_quality(75)
            .page_margin_mm(20.0)
            .audio_quality(2)
            .ffmpeg_path("/opt/ffmpeg/bin/ffmpeg")
            .build()
            .unwrap();
        assert_eq!(c.render_scale, 1.5);
        assert_eq!(c.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
    }

    #[test]
    fn builder_rejects_out_of_range() {
        assert!(ConversionConfig::builder().render_scale(0.0).build().is_err());
        assert!(ConversionConfig::builder().jpeg_quality(0).build().is_err());
        assert!(ConversionConfig::builder().jpeg_quality(101).build().is_err());
        assert!(ConversionConfig::builder().page_margin_mm(-1.0).build().is_err());
        assert!(ConversionConfig::builder().audio_quality(10).build().is_err());
        assert!(ConversionConfig::builder().layout_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_observer() {
        let c = ConversionConfig::builder()
            .observer(std::sync::Arc::new(crate::progress::NoopObserver))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn PipelineObserver>"));
    }
}
