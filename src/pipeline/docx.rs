//! DOCX reader: extracts paragraphs, headings, list items and run formatting
//! from `word/document.xml`.
//!
//! Only the structure that survives into the generated PDF is kept. Tables
//! flatten into their cell paragraphs; images, fields and section properties
//! are skipped.

use crate::error::EngineError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;

const DOCUMENT_PART: &str = "word/document.xml";

/// A run of text sharing one formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level, 1 (largest) to 9.
    Heading(u8),
    ListItem,
}

/// One paragraph-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub runs: Vec<TextRun>,
}

impl Block {
    fn new() -> Self {
        Self {
            kind: BlockKind::Paragraph,
            runs: Vec::new(),
        }
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn push_text(&mut self, text: &str, bold: bool, italic: bool) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(text),
            _ => self.runs.push(TextRun {
                text: text.to_string(),
                bold,
                italic,
            }),
        }
    }
}

/// The document body as a flat list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichDocument {
    pub blocks: Vec<Block>,
}

impl RichDocument {
    /// Block texts joined by newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read a DOCX file held in memory.
pub fn parse_docx(bytes: &[u8]) -> Result<RichDocument, EngineError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| EngineError::Load(format!("not a DOCX file: {e}")))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| EngineError::Load(format!("not a DOCX file: missing {DOCUMENT_PART}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| EngineError::Load(format!("{DOCUMENT_PART}: {e}")))?;

    let doc = parse_document_xml(&xml)?;
    debug!("Parsed DOCX: {} blocks", doc.blocks.len());
    Ok(doc)
}

/// Parse the WordprocessingML body of `word/document.xml`.
pub fn parse_document_xml(xml: &str) -> Result<RichDocument, EngineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut body = BodyParser::default();
    let mut buf = Vec::new();
    let mut fallback_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            EngineError::Load(format!(
                "malformed {DOCUMENT_PART} at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        // `mc:Fallback` repeats the content of its `mc:Choice` sibling.
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"Fallback" => fallback_depth += 1,
            Event::End(e) if e.local_name().as_ref() == b"Fallback" => {
                fallback_depth = fallback_depth.saturating_sub(1)
            }
            _ if fallback_depth > 0 => {}
            Event::Start(e) => body.open(&e),
            Event::Empty(e) => {
                body.open(&e);
                body.close(e.local_name().as_ref());
            }
            Event::End(e) => body.close(e.local_name().as_ref()),
            Event::Text(e) if body.in_text => {
                let text = e.unescape().map_err(|err| {
                    EngineError::Load(format!("bad text in {DOCUMENT_PART}: {err}"))
                })?;
                body.text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(body.doc)
}

/// Run-level state, saved while a nested paragraph (text box) is open.
#[derive(Debug, Clone, Copy, Default)]
struct RunState {
    in_ppr: bool,
    in_run: bool,
    in_rpr: bool,
    in_text: bool,
    bold: bool,
    italic: bool,
}

#[derive(Default)]
struct BodyParser {
    doc: RichDocument,
    /// Open paragraphs, innermost last. Text boxes nest a `w:p` inside a run.
    open_blocks: Vec<(Block, RunState)>,
    in_ppr: bool,
    in_run: bool,
    in_rpr: bool,
    in_text: bool,
    bold: bool,
    italic: bool,
}

impl BodyParser {
    fn run_state(&self) -> RunState {
        RunState {
            in_ppr: self.in_ppr,
            in_run: self.in_run,
            in_rpr: self.in_rpr,
            in_text: self.in_text,
            bold: self.bold,
            italic: self.italic,
        }
    }

    fn restore(&mut self, state: RunState) {
        self.in_ppr = state.in_ppr;
        self.in_run = state.in_run;
        self.in_rpr = state.in_rpr;
        self.in_text = state.in_text;
        self.bold = state.bold;
        self.italic = state.italic;
    }

    fn block(&mut self) -> Option<&mut Block> {
        self.open_blocks.last_mut().map(|(block, _)| block)
    }

    fn open(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"p" => {
                let saved = self.run_state();
                self.restore(RunState::default());
                self.open_blocks.push((Block::new(), saved));
            }
            b"pPr" => self.in_ppr = true,
            b"pStyle" if self.in_ppr => {
                let level = attr_val(e).and_then(|v| heading_level(&v));
                if let (Some(level), Some(block)) = (level, self.block()) {
                    block.kind = BlockKind::Heading(level);
                }
            }
            b"numPr" if self.in_ppr => {
                if let Some(block) = self.block() {
                    if block.kind == BlockKind::Paragraph {
                        block.kind = BlockKind::ListItem;
                    }
                }
            }
            b"r" => {
                self.in_run = true;
                self.bold = false;
                self.italic = false;
            }
            b"rPr" if self.in_run => self.in_rpr = true,
            b"b" if self.in_rpr => self.bold = toggle_on(e),
            b"i" if self.in_rpr => self.italic = toggle_on(e),
            b"t" if self.in_run => self.in_text = true,
            b"tab" if self.in_run => self.text(" "),
            b"br" | b"cr" if self.in_run => self.text("\n"),
            _ => {}
        }
    }

    fn close(&mut self, local_name: &[u8]) {
        match local_name {
            b"p" => {
                if let Some((block, saved)) = self.open_blocks.pop() {
                    self.doc.blocks.push(block);
                    self.restore(saved);
                }
            }
            b"pPr" => self.in_ppr = false,
            b"r" => {
                self.in_run = false;
                self.in_rpr = false;
                self.in_text = false;
            }
            b"rPr" => self.in_rpr = false,
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let (bold, italic) = (self.bold, self.italic);
        if let Some(block) = self.block() {
            block.push_text(text, bold, italic);
        }
    }
}

/// Value of the `w:val` attribute, if present.
fn attr_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `<w:b/>` is on; `<w:b w:val="0"/>` and `w:val="false"` are off.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(attr_val(e).as_deref(), Some("0" | "false" | "off"))
}

/// Map a paragraph style id to a heading level.
fn heading_level(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let level: u8 = lower.strip_prefix("heading")?.trim().parse().ok()?;
    (1..=9).contains(&level).then_some(level)
}
