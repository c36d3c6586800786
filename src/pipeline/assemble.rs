//! Document reassembly: lay page texts out as positioned lines on A4.
//!
//! This module is pure. It produces a [`DocumentLayout`] in millimetres
//! measured from the top-left corner; [`crate::pipeline::pdf::PdfEngine`]
//! turns that into PDF objects. Splitting the two keeps the wrapping rules
//! testable without a pdfium library.
//!
//! Text is restricted to Latin-1 (the standard Helvetica encoding): anything
//! outside it becomes `?`. Line widths are measured with the Adobe AFM
//! metrics of Helvetica and Helvetica-Bold.

use serde::{Deserialize, Serialize};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 10.0;
/// Distance from the bottom edge at which a new page is started.
pub const BOTTOM_BREAK_MM: f32 = 15.0;
/// Maximum width of a body line.
pub const WRAP_WIDTH_MM: f32 = 180.0;

pub const TITLE: &str = "DOCUMENTO OPTIMIZADO - EXTRACTO DE TEXTO";
const TITLE_SIZE: f32 = 14.0;
const HEADER_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const TITLE_HEIGHT_MM: f32 = 10.0;
const HEADER_HEIGHT_MM: f32 = 10.0;
const HEADER_GAP_MM: f32 = 5.0;
const BODY_LINE_MM: f32 = 6.0;
const PAGE_GAP_MM: f32 = 5.0;

const MM_PER_PT: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// One line of text at a fixed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub text: String,
    pub style: FontStyle,
    pub size_pt: f32,
    /// Left edge, from the left side of the page.
    pub x_mm: f32,
    /// Baseline, from the top of the page.
    pub baseline_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutPage {
    pub lines: Vec<LayoutLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub pages: Vec<LayoutPage>,
}

impl DocumentLayout {
    pub fn line_count(&self) -> usize {
        self.pages.iter().map(|p| p.lines.len()).sum()
    }
}

// ── Latin-1 ──────────────────────────────────────────────────────────────────

/// Restrict `text` to Latin-1: tabs become spaces, other control characters
/// and anything above U+00FF become `?`.
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if (c as u32) < 0x20 || (0x7F..0xA0).contains(&(c as u32)) => '?',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

// ── Metrics ──────────────────────────────────────────────────────────────────

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for U+0020..=U+007E, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// ASCII letter whose width an accented Latin-1 letter shares.
fn latin1_base(c: char) -> Option<char> {
    Some(match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    })
}

fn glyph_units(c: char, style: FontStyle) -> u16 {
    let table = match style {
        FontStyle::Regular => &HELVETICA,
        FontStyle::Bold => &HELVETICA_BOLD,
    };
    let lookup = |c: char| table[(c as usize) - 0x20];
    match c {
        ' '..='~' => lookup(c),
        // Accented i is drawn with a dotless stem that is wider than 'i'.
        'Ì'..='Ï' | 'ì'..='ï' => 278,
        '¡' => 333,
        '¿' => lookup('?'),
        'º' | 'ª' => 370,
        '°' => 400,
        _ => latin1_base(c).map(lookup).unwrap_or(556),
    }
}

/// Rendered width of `text` in millimetres.
pub fn text_width_mm(text: &str, style: FontStyle, size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_units(c, style) as u32).sum();
    units as f32 * size_pt / 1000.0 * MM_PER_PT
}

// ── Wrapping ─────────────────────────────────────────────────────────────────

/// Greedy word wrap to `max_mm`. Words wider than a full line are split
/// at character boundaries.
///
/// A line that already fits is returned verbatim, keeping indentation and
/// space runs (OCR'd tables rely on them for column alignment).
pub fn wrap_line(line: &str, style: FontStyle, size_pt: f32, max_mm: f32) -> Vec<String> {
    let fits = |s: &str| text_width_mm(s, style, size_pt) <= max_mm;
    if fits(line) {
        return vec![line.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();

    for word in line.split(' ').filter(|w| !w.is_empty()) {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current = word.to_string();
        } else {
            let mut chunk = String::new();
            for c in word.chars() {
                chunk.push(c);
                if !fits(&chunk) && chunk.chars().count() > 1 {
                    chunk.pop();
                    out.push(std::mem::take(&mut chunk));
                    chunk.push(c);
                }
            }
            current = chunk;
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

// ── Layout ───────────────────────────────────────────────────────────────────

struct Cursor {
    pages: Vec<LayoutPage>,
    y_mm: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![LayoutPage::default()],
            y_mm: MARGIN_MM,
        }
    }

    /// Place a line in a cell of `height_mm`, breaking to a new page first
    /// when the cell would cross the bottom break.
    fn cell(&mut self, text: String, style: FontStyle, size_pt: f32, x_mm: f32, height_mm: f32) {
        if self.y_mm + height_mm > PAGE_HEIGHT_MM - BOTTOM_BREAK_MM {
            self.pages.push(LayoutPage::default());
            self.y_mm = MARGIN_MM;
        }
        let baseline_mm = self.y_mm + 0.5 * height_mm + 0.3 * size_pt * MM_PER_PT;
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(LayoutLine {
                text,
                style,
                size_pt,
                x_mm,
                baseline_mm,
            });
        }
        self.y_mm += height_mm;
    }

    fn space(&mut self, mm: f32) {
        self.y_mm += mm;
    }
}

/// Lay out page texts.
///
/// `translated` suppresses the title block. A `--- Página N ---` header
/// precedes each text only when there is more than one.
pub fn layout_document(texts: &[String], translated: bool) -> DocumentLayout {
    let mut cursor = Cursor::new();

    if !translated {
        let title = to_latin1(TITLE);
        let w = text_width_mm(&title, FontStyle::Bold, TITLE_SIZE);
        let x = ((PAGE_WIDTH_MM - w) / 2.0).max(MARGIN_MM);
        cursor.cell(title, FontStyle::Bold, TITLE_SIZE, x, TITLE_HEIGHT_MM);
        cursor.space(10.0);
    }

    let with_headers = texts.len() > 1;
    for (i, text) in texts.iter().enumerate() {
        if with_headers {
            let header = to_latin1(&format!("--- Página {} ---", i + 1));
            cursor.cell(header, FontStyle::Bold, HEADER_SIZE, MARGIN_MM, HEADER_HEIGHT_MM);
            cursor.space(HEADER_GAP_MM);
        }

        for raw in text.lines() {
            let line = to_latin1(raw);
            if line.trim().is_empty() {
                continue;
            }
            for piece in wrap_line(&line, FontStyle::Regular, BODY_SIZE, WRAP_WIDTH_MM) {
                cursor.cell(piece, FontStyle::Regular, BODY_SIZE, MARGIN_MM, BODY_LINE_MM);
            }
        }

        cursor.space(PAGE_GAP_MM);
    }

    DocumentLayout {
        width_mm: PAGE_WIDTH_MM,
        height_mm: PAGE_HEIGHT_MM,
        pages: cursor.pages,
    }
}
