//! PDF layout for Word → PDF: flows a [`RichDocument`] onto A4 pages.
//!
//! The layout uses the 14 standard PDF fonts (Helvetica family), so the
//! output embeds no font data. Lines are broken greedily on whitespace using
//! the Helvetica advance widths, and a word wider than a line is cut by
//! character. Text outside the WinAnsi character set is
//! replaced with `?`.

use crate::error::EngineError;
use crate::pipeline::docx::{BlockKind, RichDocument, TextRun};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

/// A4 in PDF points.
pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;

const BODY_SIZE: f32 = 11.0;
const LINE_SPACING: f32 = 1.3;
const LIST_INDENT_PT: f32 = 14.0;

/// Millimetres to PDF points.
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

/// Turns a parsed document into PDF bytes.
pub trait PdfLayoutEngine: Send + Sync {
    fn layout(&self, doc: &RichDocument) -> Result<Vec<u8>, EngineError>;
}

/// Greedy text-flow layout with uniform margins.
#[derive(Debug, Clone)]
pub struct TextFlowLayout {
    margin_pt: f32,
}

impl TextFlowLayout {
    pub fn new(margin_mm: f32) -> Self {
        Self {
            margin_pt: mm_to_pt(margin_mm),
        }
    }

    pub fn margin_pt(&self) -> f32 {
        self.margin_pt
    }

    fn usable_width(&self) -> f32 {
        PAGE_WIDTH_PT - 2.0 * self.margin_pt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl Font {
    const ALL: [Font; 4] = [Font::Regular, Font::Bold, Font::Italic, Font::BoldItalic];

    fn of(run: &TextRun, force_bold: bool) -> Self {
        match (run.bold || force_bold, run.italic) {
            (false, false) => Font::Regular,
            (true, false) => Font::Bold,
            (false, true) => Font::Italic,
            (true, true) => Font::BoldItalic,
        }
    }

    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
            Font::BoldItalic => "F4",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
            Font::BoldItalic => "Helvetica-BoldOblique",
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, Font::Bold | Font::BoldItalic)
    }
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

fn char_width(c: char, font: Font, size: f32) -> f32 {
    let code = c as u32;
    let units = if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize] as f32
    } else {
        556.0
    };
    // Bold faces run about 5% wider.
    let units = if font.is_bold() { units * 1.05 } else { units };
    units * size / 1000.0
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, font, size)).sum()
}

/// Encode text as WinAnsi bytes. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\t' => b' ',
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 20.0,
        2 => 16.0,
        3 => 14.0,
        _ => 12.0,
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    font: Font,
}

/// A word made of one or more differently-formatted fragments.
type Word = Vec<Fragment>;

enum Token {
    Word(Word),
    Break,
}

fn tokenize(runs: &[TextRun], force_bold: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word: Word = Vec::new();

    fn flush(word: &mut Word, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    for run in runs {
        let font = Font::of(run, force_bold);
        for c in run.text.chars() {
            if c == '\n' {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Break);
            } else if c.is_whitespace() {
                flush(&mut word, &mut tokens);
            } else {
                match word.last_mut() {
                    Some(frag) if frag.font == font => frag.text.push(c),
                    _ => word.push(Fragment {
                        text: c.to_string(),
                        font,
                    }),
                }
            }
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct Line {
    fragments: Vec<Fragment>,
    indent: f32,
    size: f32,
}

fn wrap_block(tokens: Vec<Token>, size: f32, max_width: f32, indent: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Vec<Fragment> = Vec::new();
    let mut width = 0.0f32;

    let finish = |current: &mut Vec<Fragment>, width: &mut f32, lines: &mut Vec<Line>| {
        lines.push(Line {
            fragments: std::mem::take(current),
            indent,
            size,
        });
        *width = 0.0;
    };

    for token in tokens {
        let word = match token {
            Token::Break => {
                finish(&mut current, &mut width, &mut lines);
                continue;
            }
            Token::Word(word) => word,
        };

        let word_width: f32 = word.iter().map(|f| text_width(&f.text, f.font, size)).sum();
        if word_width > max_width {
            if !current.is_empty() {
                finish(&mut current, &mut width, &mut lines);
            }
            let mut pieces = split_word(word, size, max_width);
            let tail = pieces.pop().unwrap_or_default();
            for piece in pieces {
                current = piece;
                finish(&mut current, &mut width, &mut lines);
            }
            width = tail.iter().map(|f| text_width(&f.text, f.font, size)).sum();
            current = tail;
            continue;
        }

        let space_font = word[0].font;
        let space = if current.is_empty() {
            0.0
        } else {
            char_width(' ', space_font, size)
        };

        if !current.is_empty() && width + space + word_width > max_width {
            finish(&mut current, &mut width, &mut lines);
        }

        let mut first = true;
        for frag in word {
            let text = if first && !current.is_empty() {
                format!(" {}", frag.text)
            } else {
                frag.text
            };
            first = false;
            width += text_width(&text, frag.font, size);
            match current.last_mut() {
                Some(last) if last.font == frag.font => last.text.push_str(&text),
                _ => current.push(Fragment {
                    text,
                    font: frag.font,
                }),
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        finish(&mut current, &mut width, &mut lines);
    }
    lines
}

/// Cuts a word wider than `max_width` into pieces that each fit on a line.
/// Every piece holds at least one character.
fn split_word(word: Vec<Fragment>, size: f32, max_width: f32) -> Vec<Vec<Fragment>> {
    let mut pieces = Vec::new();
    let mut piece: Vec<Fragment> = Vec::new();
    let mut width = 0.0f32;

    for frag in word {
        for c in frag.text.chars() {
            let w = char_width(c, frag.font, size);
            if !piece.is_empty() && width + w > max_width {
                pieces.push(std::mem::take(&mut piece));
                width = 0.0;
            }
            width += w;
            match piece.last_mut() {
                Some(last) if last.font == frag.font => last.text.push(c),
                _ => piece.push(Fragment {
                    text: c.to_string(),
                    font: frag.font,
                }),
            }
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Accumulates page content streams while the cursor moves down the page.
struct PageWriter {
    margin: f32,
    cursor: f32,
    pages: Vec<Vec<Operation>>,
}

impl PageWriter {
    fn new(margin: f32) -> Self {
        Self {
            margin,
            cursor: PAGE_HEIGHT_PT - margin,
            pages: vec![Vec::new()],
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = PAGE_HEIGHT_PT - self.margin;
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().map_or(true, Vec::is_empty)
    }

    fn write_line(&mut self, line: &Line) {
        let line_height = line.size * LINE_SPACING;
        if self.cursor - line_height < self.margin {
            // Blank lines never start a page of their own; a page with
            // nothing drawn on it just rewinds to the top.
            if self.current_is_empty() {
                self.cursor = PAGE_HEIGHT_PT - self.margin;
            } else {
                self.new_page();
            }
        }
        let baseline = self.cursor - line.size;
        self.cursor -= line_height;

        if line.fragments.is_empty() {
            return;
        }

        let ops = match self.pages.last_mut() {
            Some(ops) => ops,
            None => return,
        };
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Td",
            vec![
                Object::Real(self.margin + line.indent),
                Object::Real(baseline),
            ],
        ));
        for frag in &line.fragments {
            ops.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(frag.font.resource_name().as_bytes().to_vec()),
                    Object::Real(line.size),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(&frag.text),
                    StringFormat::Hexadecimal,
                )],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
    }

    fn skip(&mut self, pt: f32) {
        self.cursor -= pt;
    }
}

impl PdfLayoutEngine for TextFlowLayout {
    fn layout(&self, doc: &RichDocument) -> Result<Vec<u8>, EngineError> {
        let mut writer = PageWriter::new(self.margin_pt);

        for block in &doc.blocks {
            let (size, bold, indent) = match block.kind {
                BlockKind::Paragraph => (BODY_SIZE, false, 0.0),
                BlockKind::Heading(level) => (heading_size(level), true, 0.0),
                BlockKind::ListItem => (BODY_SIZE, false, LIST_INDENT_PT),
            };

            let mut tokens = tokenize(&block.runs, bold);
            if block.kind == BlockKind::ListItem {
                tokens.insert(
                    0,
                    Token::Word(vec![Fragment {
                        text: "•".into(),
                        font: Font::Regular,
                    }]),
                );
            }

            for line in wrap_block(tokens, size, self.usable_width() - indent, indent) {
                writer.write_line(&line);
            }
            writer.skip(size * 0.5);
        }

        let page_count = writer.pages.len();
        let bytes = write_document(writer.pages)?;
        debug!("Laid out {} blocks on {} pages", doc.blocks.len(), page_count);
        Ok(bytes)
    }
}

fn write_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, EngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(font.base_font().as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        fonts.set(font.resource_name(), Object::Reference(font_id));
    }
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(fonts),
    )]));

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| EngineError::Encode(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(PAGE_WIDTH_PT),
                    Object::Real(PAGE_HEIGHT_PT),
                ]),
            ),
            ("Resources", Object::Reference(resources_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        page_ids.push(page_id);
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EngineError::Encode(format!("PDF write: {e}")))?;
    Ok(buffer)
}
