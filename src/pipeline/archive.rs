//! ZIP bundling for rasterised pages.
//!
//! Pages are added in document order and named `page-{n}.jpg` with `n`
//! starting at 1, so the archive listing matches the page numbers a reader
//! sees in the original PDF.

use crate::error::EngineError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive entry name for a 1-based page number.
pub fn page_entry_name(page_num: usize) -> String {
    format!("page-{page_num}.jpg")
}

/// An in-memory ZIP of page images.
pub struct PageArchive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    pages: usize,
}

impl PageArchive {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            pages: 0,
        }
    }

    /// Append the next page. Pages must arrive in order starting at 1.
    pub fn add_page(&mut self, page_num: usize, jpeg: &[u8]) -> Result<(), EngineError> {
        if page_num != self.pages + 1 {
            return Err(EngineError::Encode(format!(
                "page {page_num} added out of order (expected {})",
                self.pages + 1
            )));
        }
        // JPEG data is already compressed; deflating it again only costs time.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer
            .start_file(page_entry_name(page_num), options)
            .map_err(|e| EngineError::Encode(format!("zip: {e}")))?;
        self.writer.write_all(jpeg)?;
        self.pages += 1;
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Finish the archive and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>, EngineError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| EngineError::Encode(format!("zip: {e}")))?;
        Ok(cursor.into_inner())
    }
}

impl Default for PageArchive {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry names of a ZIP held in memory, or `None` if it is not a readable ZIP.
pub fn entry_names(bytes: &[u8]) -> Option<Vec<String>> {
    let archive = ZipArchive::new(Cursor::new(bytes)).ok()?;
    Some(archive.file_names().map(str::to_string).collect())
}

/// Number of entries in a ZIP held in memory.
pub fn entry_count(bytes: &[u8]) -> Option<usize> {
    ZipArchive::new(Cursor::new(bytes)).ok().map(|a| a.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_named_in_order() {
        let mut archive = PageArchive::new();
        archive.add_page(1, b"one").unwrap();
        archive.add_page(2, b"two").unwrap();
        archive.add_page(3, b"three").unwrap();
        assert_eq!(archive.page_count(), 3);
        let bytes = archive.finish().unwrap();

        let mut names = entry_names(&bytes).unwrap();
        names.sort();
        assert_eq!(names, vec!["page-1.jpg", "page-2.jpg", "page-3.jpg"]);
        assert_eq!(entry_count(&bytes), Some(3));
    }

    #[test]
    fn out_of_order_page_is_rejected() {
        let mut archive = PageArchive::new();
        archive.add_page(1, b"one").unwrap();
        let err = archive.add_page(3, b"three").unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn empty_archive_is_valid_zip() {
        let bytes = PageArchive::new().finish().unwrap();
        assert_eq!(entry_count(&bytes), Some(0));
    }

    #[test]
    fn garbage_is_not_a_zip() {
        assert_eq!(entry_count(b"not a zip at all"), None);
        assert!(entry_names(b"").is_none());
    }

    #[test]
    fn entry_contents_round_trip() {
        use std::io::Read;
        let mut archive = PageArchive::new();
        archive.add_page(1, &[0xFF, 0xD8, 0xFF]).unwrap();
        let bytes = archive.finish().unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut data = Vec::new();
        zip.by_name("page-1.jpg").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, vec![0xFF, 0xD8, 0xFF]);
    }
}
