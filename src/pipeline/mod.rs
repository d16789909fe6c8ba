//! Conversion engines and the stages that feed them.
//!
//! Each submodule implements exactly one step. Adapters in
//! [`crate::adapters`] compose them into the four conversions.
//!
//! ## Data Flow
//!
//! ```text
//! pdf2jpg   input ──▶ render ──▶ encode ──▶ archive
//!                     (pdfium)   (jpeg)     (zip)
//! pdf2word  input ──▶ render (text runs)
//! word2pdf  input ──▶ docx ──▶ layout
//!                     (xml)    (lopdf)
//! mp4tomp3  input ──▶ transcode
//!                     (ffmpeg)
//! ```
//!
//! 1. [`input`]: load the user-supplied path or URL into memory
//! 2. [`render`]: rasterise pages / extract text runs; synchronous because
//!    pdfium is not async-safe, so callers use `spawn_blocking`
//! 3. [`encode`]: JPEG-encode each rendered page
//! 4. [`archive`]: bundle page images into a ZIP
//! 5. [`docx`]: read paragraphs and run formatting from a DOCX
//! 6. [`layout`]: flow a parsed document onto PDF pages
//! 7. [`transcode`]: run ffmpeg inside a scratch directory

pub mod archive;
pub mod docx;
pub mod encode;
pub mod input;
pub mod layout;
pub mod render;
pub mod transcode;
