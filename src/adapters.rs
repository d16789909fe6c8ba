//! Conversion adapters: one per [`FormatKey`], each wrapping an engine.
//!
//! An adapter takes the raw bytes of the source file and returns either a
//! complete [`ConversionArtifact`] or a [`ConvertError::ConversionFailed`]
//! naming its format. Engine errors never leak past this layer.
//!
//! | Adapter               | Engine                   | Artifact                 |
//! |-----------------------|--------------------------|--------------------------|
//! | [`PdfToImage`]        | [`PdfEngine`] + JPEG/ZIP | `application/zip`        |
//! | [`PdfToText`]         | [`PdfEngine`]            | `application/msword`     |
//! | [`DocumentToPdf`]     | DOCX reader + layout     | `application/pdf`        |
//! | [`MediaAudioExtract`] | [`MediaTranscoder`]      | `audio/mpeg`             |

use crate::config::{
    DEFAULT_AUDIO_QUALITY, DEFAULT_JPEG_QUALITY, DEFAULT_LAYOUT_TIMEOUT_SECS,
    DEFAULT_PAGE_MARGIN_MM, DEFAULT_RENDER_SCALE,
};
use crate::error::{ConvertError, EngineError};
use crate::format::FormatKey;
use crate::output::ConversionArtifact;
use crate::pipeline::archive::PageArchive;
use crate::pipeline::docx::parse_docx;
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::layout::{PdfLayoutEngine, TextFlowLayout};
use crate::pipeline::render::PdfEngine;
use crate::pipeline::transcode::MediaTranscoder;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Sandbox file names used for MP4 → MP3.
const MEDIA_INPUT_NAME: &str = "input.mp4";
const MEDIA_OUTPUT_NAME: &str = "output.mp3";

/// One conversion from source bytes to an artifact.
#[async_trait]
pub trait ConversionAdapter: Send + Sync {
    /// The format key this adapter serves.
    fn format(&self) -> FormatKey;

    /// Load whatever the engine needs before the first conversion.
    ///
    /// Adapters whose engine is always available keep the default.
    async fn ensure_ready(&self) -> Result<(), ConvertError> {
        Ok(())
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError>;
}

fn join_error(e: tokio::task::JoinError) -> ConvertError {
    ConvertError::Internal(format!("Conversion task panicked: {}", e))
}

// ── PDF → JPG ────────────────────────────────────────────────────────────

/// Rasterises every page and bundles the JPEGs into a ZIP.
pub struct PdfToImage {
    engine: Arc<dyn PdfEngine>,
    scale: f32,
    quality: u8,
}

impl PdfToImage {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            engine,
            scale: DEFAULT_RENDER_SCALE,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

#[async_trait]
impl ConversionAdapter for PdfToImage {
    fn format(&self) -> FormatKey {
        FormatKey::PdfToJpg
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        let engine = Arc::clone(&self.engine);
        let pdf = input.to_vec();
        let (scale, quality) = (self.scale, self.quality);

        let zip = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, EngineError> {
            let mut archive = PageArchive::new();
            let pages = engine.render_pages(&pdf, scale, &mut |page_num, image| {
                let jpeg = encode_jpeg(&image, quality)?;
                archive.add_page(page_num, &jpeg)
            })?;
            debug!("Archived {} pages", pages);
            archive.finish()
        })
        .await
        .map_err(join_error)?
        .map_err(|e| ConvertError::failed(FormatKey::PdfToJpg, e))?;

        Ok(ConversionArtifact::new(zip, FormatKey::PdfToJpg.output_mime()))
    }
}

// ── PDF → Word ───────────────────────────────────────────────────────────

/// Extracts text: runs joined by a space, pages by a blank line.
///
/// The artifact is plain text tagged `application/msword`; it carries no
/// Word structure.
pub struct PdfToText {
    engine: Arc<dyn PdfEngine>,
}

impl PdfToText {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self { engine }
    }
}

/// Join extracted text runs into the document body.
pub fn join_page_text(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .map(|runs| runs.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ConversionAdapter for PdfToText {
    fn format(&self) -> FormatKey {
        FormatKey::PdfToWord
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        let engine = Arc::clone(&self.engine);
        let pdf = input.to_vec();

        let pages = tokio::task::spawn_blocking(move || engine.page_text_runs(&pdf))
            .await
            .map_err(join_error)?
            .map_err(|e| ConvertError::failed(FormatKey::PdfToWord, e))?;

        let text = join_page_text(&pages);
        debug!("Extracted {} chars from {} pages", text.len(), pages.len());
        Ok(ConversionArtifact::new(
            text.into_bytes(),
            FormatKey::PdfToWord.output_mime(),
        ))
    }
}

// ── Word → PDF ───────────────────────────────────────────────────────────

/// Reads a DOCX and lays it out as PDF, bounded by a timeout.
pub struct DocumentToPdf {
    layout: Arc<dyn PdfLayoutEngine>,
    timeout: Duration,
}

impl DocumentToPdf {
    /// Text-flow layout with `margin_mm` on every side.
    pub fn new(margin_mm: f32) -> Self {
        Self {
            layout: Arc::new(TextFlowLayout::new(margin_mm)),
            timeout: Duration::from_secs(DEFAULT_LAYOUT_TIMEOUT_SECS),
        }
    }

    pub fn with_layout(mut self, layout: Arc<dyn PdfLayoutEngine>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DocumentToPdf {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_MARGIN_MM)
    }
}

#[async_trait]
impl ConversionAdapter for DocumentToPdf {
    fn format(&self) -> FormatKey {
        FormatKey::WordToPdf
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        let layout = Arc::clone(&self.layout);
        let docx = input.to_vec();
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let doc = parse_docx(&docx)?;
            layout.layout(&doc)
        });

        // On timeout the blocking task is detached; its result is discarded.
        let pdf = match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined
                .map_err(join_error)?
                .map_err(|e| ConvertError::failed(FormatKey::WordToPdf, e))?,
            Err(_) => {
                warn!("Word → PDF layout exceeded {:?}", self.timeout);
                return Err(ConvertError::failed(
                    FormatKey::WordToPdf,
                    EngineError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                ));
            }
        };

        Ok(ConversionArtifact::new(pdf, FormatKey::WordToPdf.output_mime()))
    }
}

// ── MP4 → MP3 ────────────────────────────────────────────────────────────

/// Extracts the audio track with a sandboxed transcoder.
///
/// The transcoder is loaded once, on first use; concurrent first callers
/// share that single load. Conversions are serialised because they share
/// the sandbox file names.
pub struct MediaAudioExtract {
    transcoder: Arc<dyn MediaTranscoder>,
    ready: OnceCell<()>,
    lock: Arc<Mutex<()>>,
    audio_quality: u8,
}

impl MediaAudioExtract {
    pub fn new(transcoder: Arc<dyn MediaTranscoder>) -> Self {
        Self {
            transcoder,
            ready: OnceCell::new(),
            lock: Arc::new(Mutex::new(())),
            audio_quality: DEFAULT_AUDIO_QUALITY,
        }
    }

    pub fn with_audio_quality(mut self, q: u8) -> Self {
        self.audio_quality = q;
        self
    }

    /// Whether the transcoder has been loaded.
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// ffmpeg arguments: keep only the audio streams, VBR quality `-q:a`.
    pub fn transcode_args(&self) -> Vec<String> {
        vec![
            "-i".into(),
            MEDIA_INPUT_NAME.into(),
            "-q:a".into(),
            self.audio_quality.to_string(),
            "-map".into(),
            "a".into(),
            MEDIA_OUTPUT_NAME.into(),
        ]
    }

    async fn transcode(&self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.transcoder.write_file(MEDIA_INPUT_NAME, input).await?;
        self.transcoder.run(&self.transcode_args()).await?;
        self.transcoder.read_file(MEDIA_OUTPUT_NAME).await
    }
}

#[async_trait]
impl ConversionAdapter for MediaAudioExtract {
    fn format(&self) -> FormatKey {
        FormatKey::Mp4ToMp3
    }

    async fn ensure_ready(&self) -> Result<(), ConvertError> {
        self.ready
            .get_or_try_init(|| async {
                info!("Loading media transcoder");
                self.transcoder.load().await
            })
            .await
            .map(|_| ())
            .map_err(|e| ConvertError::failed(FormatKey::Mp4ToMp3, e))
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        self.ensure_ready().await?;
        let lease = SandboxLease {
            transcoder: Arc::clone(&self.transcoder),
            guard: Some(Arc::clone(&self.lock).lock_owned().await),
        };

        let result = self.transcode(input).await;
        lease.release().await;

        let audio = result.map_err(|e| ConvertError::failed(FormatKey::Mp4ToMp3, e))?;
        if audio.is_empty() {
            return Err(ConvertError::failed(
                FormatKey::Mp4ToMp3,
                "transcoder produced an empty file",
            ));
        }
        Ok(ConversionArtifact::new(audio, FormatKey::Mp4ToMp3.output_mime()))
    }
}

/// Exclusive use of the transcoder sandbox for one conversion.
///
/// Releasing the lease removes the sandbox files before the lock is given
/// up. A lease dropped mid-run (the conversion future was cancelled) hands
/// the lock to a spawned task that does the same cleanup.
struct SandboxLease {
    transcoder: Arc<dyn MediaTranscoder>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SandboxLease {
    async fn release(mut self) {
        clear_sandbox(self.transcoder.as_ref()).await;
        self.guard.take();
    }
}

impl Drop for SandboxLease {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let transcoder = Arc::clone(&self.transcoder);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Media conversion cancelled; clearing sandbox in background");
                handle.spawn(async move {
                    clear_sandbox(transcoder.as_ref()).await;
                    drop(guard);
                });
            }
            Err(_) => warn!("Media conversion cancelled outside a runtime; sandbox not cleared"),
        }
    }
}

async fn clear_sandbox(transcoder: &dyn MediaTranscoder) {
    for name in [MEDIA_INPUT_NAME, MEDIA_OUTPUT_NAME] {
        if let Err(e) = transcoder.remove_file(name).await {
            warn!("Failed to clean up sandbox file {}: {}", name, e);
        }
    }
}
