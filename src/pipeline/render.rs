//! PDF engine seam: page rasterisation and text-run extraction.
//!
//! [`PdfEngine`] is the narrow interface the PDF adapters need from a PDF
//! library. [`PdfiumEngine`] implements it with `pdfium-render`.
//!
//! ## Why synchronous?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Adapters call the engine from `tokio::task::spawn_blocking` so Tokio worker
//! threads never stall during CPU-heavy rendering.

use crate::error::EngineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Receives each rasterised page as `(page_number_1based, image)`, in order.
pub type PageSink<'a> = dyn FnMut(usize, DynamicImage) -> Result<(), EngineError> + 'a;

/// The subset of a PDF library used by the PDF adapters.
pub trait PdfEngine: Send + Sync {
    /// Rasterise every page at `scale` × its natural size, in document order.
    fn render_pages(&self, pdf: &[u8], scale: f32, sink: &mut PageSink<'_>)
        -> Result<usize, EngineError>;

    /// Text runs of every page, in document order.
    fn page_text_runs(&self, pdf: &[u8]) -> Result<Vec<Vec<String>>, EngineError>;
}

/// [`PdfEngine`] backed by the PDFium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Bind to the system PDFium library on each call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the PDFium shared library at `path`.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            EngineError::Unavailable(format!(
                "failed to bind to pdfium ({e:?}); set PDFIUM_LIB_PATH=/path/to/libpdfium"
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

fn open_error(e: PdfiumError) -> EngineError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        EngineError::Load("PDF is encrypted and requires a password".into())
    } else {
        EngineError::Load(detail)
    }
}

impl PdfEngine for PdfiumEngine {
    fn render_pages(
        &self,
        pdf: &[u8],
        scale: f32,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(open_error)?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} pages", total);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| EngineError::Page {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            sink(page_num, image)?;
        }

        Ok(total)
    }

    fn page_text_runs(&self, pdf: &[u8]) -> Result<Vec<Vec<String>>, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(open_error)?;

        let runs = document
            .pages()
            .iter()
            .map(|page| {
                page.objects()
                    .iter()
                    .filter_map(|object| object.as_text_object().map(|t| t.text()))
                    .collect::<Vec<String>>()
            })
            .collect::<Vec<_>>();

        debug!("Extracted text runs from {} pages", runs.len());
        Ok(runs)
    }
}
