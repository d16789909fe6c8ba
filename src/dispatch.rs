//! Format dispatch: maps each [`FormatKey`] to exactly one adapter.
//!
//! The registry is fixed once built. [`DispatcherBuilder::build`] refuses a
//! registry that misses a key or registers one twice, so every dispatch of a
//! supported key reaches exactly one adapter.

use crate::adapters::{
    ConversionAdapter, DocumentToPdf, MediaAudioExtract, PdfToImage, PdfToText,
};
use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::format::FormatKey;
use crate::output::ConversionArtifact;
use crate::pipeline::render::{PdfEngine, PdfiumEngine};
use crate::pipeline::transcode::FfmpegSandbox;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Routes a format key to its adapter.
#[derive(Clone)]
pub struct Dispatcher {
    adapters: HashMap<FormatKey, Arc<dyn ConversionAdapter>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.adapters.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        f.debug_struct("Dispatcher").field("formats", &keys).finish()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The production registry: PDFium, the DOCX layout and ffmpeg,
    /// configured from `config`.
    pub fn with_defaults(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let pdf: Arc<dyn PdfEngine> = match &config.pdfium_lib_path {
            Some(path) => Arc::new(PdfiumEngine::with_library(path)),
            None => Arc::new(PdfiumEngine::new()),
        };
        let sandbox = FfmpegSandbox::new(config.ffmpeg_path.clone(), config.transcode_timeout())
            .map_err(|e| ConvertError::Internal(format!("media sandbox: {e}")))?;

        Self::builder()
            .register(Arc::new(
                PdfToImage::new(Arc::clone(&pdf))
                    .with_scale(config.render_scale)
                    .with_quality(config.jpeg_quality),
            ))
            .register(Arc::new(PdfToText::new(pdf)))
            .register(Arc::new(
                DocumentToPdf::new(config.page_margin_mm).with_timeout(config.layout_timeout()),
            ))
            .register(Arc::new(
                MediaAudioExtract::new(Arc::new(sandbox)).with_audio_quality(config.audio_quality),
            ))
            .build()
    }

    /// The adapter registered for `key`.
    pub fn resolve(&self, key: FormatKey) -> Result<&Arc<dyn ConversionAdapter>, ConvertError> {
        self.adapters
            .get(&key)
            .ok_or_else(|| ConvertError::UnsupportedFormat {
                key: key.as_str().to_string(),
            })
    }

    /// Convert `input` with the adapter for the raw key `key`.
    ///
    /// Unknown keys fail with [`ConvertError::UnsupportedFormat`] before any
    /// adapter runs.
    pub async fn dispatch(
        &self,
        key: &str,
        input: &[u8],
    ) -> Result<ConversionArtifact, ConvertError> {
        let format: FormatKey = key.parse()?;
        self.dispatch_format(format, input).await
    }

    pub async fn dispatch_format(
        &self,
        format: FormatKey,
        input: &[u8],
    ) -> Result<ConversionArtifact, ConvertError> {
        let adapter = self.resolve(format)?;
        debug!("Dispatching {} ({} bytes)", format, input.len());
        adapter.convert(input).await
    }

    /// Load the engine behind `format`, if it needs loading.
    pub async fn ensure_ready(&self, format: FormatKey) -> Result<(), ConvertError> {
        self.resolve(format)?.ensure_ready().await
    }

    /// Load every engine up front.
    pub async fn prepare_all(&self) -> Result<(), ConvertError> {
        futures::future::try_join_all(self.adapters.values().map(|a| a.ensure_ready())).await?;
        Ok(())
    }

    /// Registered formats, in menu order.
    pub fn formats(&self) -> Vec<FormatKey> {
        FormatKey::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    adapters: Vec<Arc<dyn ConversionAdapter>>,
}

impl DispatcherBuilder {
    pub fn register(mut self, adapter: Arc<dyn ConversionAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Build the registry. Every [`FormatKey`] must be registered exactly once.
    pub fn build(self) -> Result<Dispatcher, ConvertError> {
        let mut adapters = HashMap::with_capacity(FormatKey::ALL.len());
        for adapter in self.adapters {
            let key = adapter.format();
            if adapters.insert(key, adapter).is_some() {
                return Err(ConvertError::InvalidConfig(format!(
                    "Format '{}' is registered more than once",
                    key
                )));
            }
        }

        let missing: Vec<&str> = FormatKey::ALL
            .iter()
            .filter(|k| !adapters.contains_key(*k))
            .map(|k| k.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ConvertError::InvalidConfig(format!(
                "No adapter registered for: {}",
                missing.join(", ")
            )));
        }

        Ok(Dispatcher { adapters })
    }
}
