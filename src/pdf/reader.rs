//! Span extraction from PDF content streams using lopdf
//!
//! A simplified text-rendering state machine: it tracks the text and line
//! matrices, the graphics CTM (`q`/`Q`/`cm`) and the current font, and emits
//! one [`Span`] per shown string. Strings are decoded through the font's
//! encoding or ToUnicode map, and advances use the font's `/Widths` when it
//! has them, falling back to a fixed fraction of the font size.

use super::{BBox, PageSpans, PdfReader, Span};
use crate::error::{PdfragError, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Encoding, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Approximate glyph advance as a fraction of the font size
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// TJ adjustments wider than this fraction of a glyph become a space
const TJ_SPACE_THRESHOLD: f32 = 0.3;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// PDF reader backed by lopdf
#[derive(Debug, Clone, Default)]
pub struct LopdfReader;

impl LopdfReader {
    pub fn new() -> Self {
        Self
    }

    /// Extract spans for every page of an already loaded document.
    pub fn read_loaded(&self, doc: &Document) -> Result<Vec<PageSpans>> {
        let mut pages = Vec::new();
        for (number, page_id) in doc.get_pages() {
            let (width, height) = page_size(doc, page_id);
            let spans = match page_spans(doc, page_id, height) {
                Ok(spans) => spans,
                Err(e) => {
                    // A broken content stream only costs that page.
                    log::warn!("Skipping unreadable content on page {}: {}", number, e);
                    Vec::new()
                }
            };
            pages.push(PageSpans {
                number,
                width,
                height,
                spans,
            });
        }
        Ok(pages)
    }
}

impl PdfReader for LopdfReader {
    fn read_document(&self, path: &Path) -> Result<Vec<PageSpans>> {
        if !path.exists() {
            return Err(PdfragError::Pdf(format!("PDF file not found: {}", path.display())));
        }
        let doc = Document::load(path)
            .map_err(|e| PdfragError::Pdf(format!("Failed to load {}: {}", path.display(), e)))?;
        let pages = self.read_loaded(&doc)?;
        log::debug!("Read {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

/// What the interpreter needs from one font resource
struct PageFont<'a> {
    base_font: String,
    encoding: Option<Encoding<'a>>,
    first_char: i64,
    /// Glyph widths in thousandths of the font size, from `FirstChar` on
    widths: Vec<f32>,
    /// Composite fonts address glyphs with two-byte codes
    two_byte: bool,
}

impl<'a> PageFont<'a> {
    fn from_dict(doc: &'a Document, font: &'a Dictionary, key: &[u8]) -> Self {
        let base_font = font
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(key).into_owned());
        let two_byte = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");

        // Without a ToUnicode map a composite font's codes are glyph ids.
        let has_mapping = font.has(b"ToUnicode") || (!two_byte && font.has(b"Encoding"));
        let encoding = if has_mapping {
            match font.get_font_encoding(doc) {
                Ok(encoding) => Some(encoding),
                Err(e) => {
                    log::debug!("Unusable encoding on font {}: {}", base_font, e);
                    None
                }
            }
        } else {
            None
        };

        let first_char = font.get(b"FirstChar").and_then(Object::as_i64).unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|w| doc.dereference(w).ok())
            .and_then(|(_, w)| w.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| number(w).unwrap_or(APPROX_CHAR_WIDTH_RATIO * 1000.0))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            base_font,
            encoding,
            first_char,
            widths,
            two_byte,
        }
    }

    fn named(key: &[u8]) -> Self {
        Self {
            base_font: String::from_utf8_lossy(key).into_owned(),
            encoding: None,
            first_char: 0,
            widths: Vec::new(),
            two_byte: false,
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let Some(encoding) = &self.encoding else {
            return decode_pdf_string(bytes);
        };
        match Document::decode_text(encoding, bytes) {
            Ok(text) => text.chars().filter(|c| *c >= ' ' || *c == '\t').collect(),
            Err(e) => {
                log::debug!("Falling back to raw bytes for {}: {}", self.base_font, e);
                decode_pdf_string(bytes)
            }
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |code, b| (code << 8) | u32::from(*b)))
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// Advance of `code` per unit of font size.
    fn width(&self, code: u32) -> f32 {
        usize::try_from(i64::from(code) - self.first_char)
            .ok()
            .and_then(|i| self.widths.get(i))
            .map_or(APPROX_CHAR_WIDTH_RATIO, |w| w / 1000.0)
    }
}

/// Mutable state while walking one page's operators
#[derive(Debug, Clone)]
struct TextState {
    ctm: [f32; 6],
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    font_name: String,
    font_size: f32,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font_name: String::new(),
            font_size: 0.0,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    /// Text matrix in device space.
    fn rendering_matrix(&self) -> [f32; 6] {
        multiply(&self.text_matrix, &self.ctm)
    }

    fn effective_font_size(&self) -> f32 {
        let m = self.rendering_matrix();
        (self.font_size * (m[1].powi(2) + m[3].powi(2)).sqrt()).abs()
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = &self.line_matrix;
        let new_x = m[0] * tx + m[2] * ty + m[4];
        let new_y = m[1] * tx + m[3] * ty + m[5];
        self.line_matrix[4] = new_x;
        self.line_matrix[5] = new_y;
        self.text_matrix = self.line_matrix;
    }

    /// Move past the glyphs of one string operand.
    fn advance(&mut self, bytes: &[u8], font: Option<&PageFont<'_>>) {
        let (codes, two_byte) = match font {
            Some(font) => (font.codes(bytes), font.two_byte),
            None => (bytes.iter().map(|b| u32::from(*b)).collect(), false),
        };
        let mut dx = 0.0;
        for code in codes {
            let width = font.map_or(APPROX_CHAR_WIDTH_RATIO, |f| f.width(code));
            dx += width * self.font_size + self.char_spacing;
            // Word spacing applies to the single-byte code 32 only.
            if code == 32 && !two_byte {
                dx += self.word_spacing;
            }
        }
        self.advance_by(dx * self.horiz_scale);
    }

    fn advance_by(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }
}

/// `a × b` for 2x3 affine matrices stored as `[a b c d e f]`.
fn multiply(a: &[f32; 6], b: &[f32; 6]) -> [f32; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object], n: usize) -> Option<Vec<f32>> {
    let vals: Vec<f32> = operands.iter().take(n).filter_map(number).collect();
    (vals.len() == n).then_some(vals)
}

fn to_matrix(vals: &[f32]) -> [f32; 6] {
    [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]]
}

/// Decode a PDF string operand: UTF-16BE when BOM-prefixed, otherwise byte-wise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .filter(|b| **b >= 0x20 || **b == b'\t')
        .map(|b| *b as char)
        .collect()
}

/// Look up a key on the page, walking up the page tree for inherited attributes.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = current.get(b"Parent").ok()?;
        let (_, parent) = doc.dereference(parent).ok()?;
        current = parent.as_dict().ok()?;
    }
    None
}

fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| {
            let vals: Vec<f32> = arr.iter().filter_map(number).collect();
            (vals.len() == 4).then(|| ((vals[2] - vals[0]).abs(), (vals[3] - vals[1]).abs()))
        });
    media_box.unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Fonts of a page keyed by resource name (`F1`).
fn page_fonts<'a>(doc: &'a Document, page_id: ObjectId) -> HashMap<Vec<u8>, PageFont<'a>> {
    let mut fonts = HashMap::new();
    let resources: Option<&Dictionary> = inherited(doc, page_id, b"Resources")
        .and_then(|res| res.as_dict().ok())
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|f| doc.dereference(f).ok())
        .and_then(|(_, f)| f.as_dict().ok());

    if let Some(resources) = resources {
        for (key, value) in resources.iter() {
            let font = match doc.dereference(value).ok().and_then(|(_, f)| f.as_dict().ok()) {
                Some(dict) => PageFont::from_dict(doc, dict, key),
                None => PageFont::named(key),
            };
            fonts.insert(key.clone(), font);
        }
    }
    fonts
}

fn page_spans(doc: &Document, page_id: ObjectId, page_height: f32) -> Result<Vec<Span>> {
    let raw = doc.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    let fonts = page_fonts(doc, page_id);

    let mut state = TextState::default();
    let mut font: Option<&PageFont<'_>> = None;
    let mut saved: Vec<[f32; 6]> = Vec::new();
    let mut spans = Vec::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(vals) = numbers(operands, 6) {
                    state.ctm = multiply(&to_matrix(&vals), &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let (Some(Object::Name(key)), Some(size)) =
                    (operands.first(), operands.get(1).and_then(number))
                {
                    font = fonts.get(key);
                    state.font_name = font.map_or_else(
                        || String::from_utf8_lossy(key).into_owned(),
                        |f| f.base_font.clone(),
                    );
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(vals) = numbers(operands, 6) {
                    state.text_matrix = to_matrix(&vals);
                    state.line_matrix = state.text_matrix;
                }
            }
            "Td" => {
                if let Some(vals) = numbers(operands, 2) {
                    state.translate_line(vals[0], vals[1]);
                }
            }
            "TD" => {
                if let Some(vals) = numbers(operands, 2) {
                    state.leading = -vals[1];
                    state.translate_line(vals[0], vals[1]);
                }
            }
            "T*" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
            }
            "TL" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.rise = v;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show(bytes, font, &mut state, page_height, &mut spans);
                }
            }
            "'" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show(bytes, font, &mut state, page_height, &mut spans);
                }
            }
            "\"" => {
                if let Some(vals) = numbers(operands, 2) {
                    state.word_spacing = vals[0];
                    state.char_spacing = vals[1];
                }
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    show(bytes, font, &mut state, page_height, &mut spans);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    show_array(items, font, &mut state, page_height, &mut spans);
                }
            }
            _ => {}
        }
    }

    Ok(spans)
}

/// Emit a span from `origin` to the current pen position.
fn push_span(text: &str, origin: [f32; 6], state: &TextState, page_height: f32, spans: &mut Vec<Span>) {
    if text.trim().is_empty() {
        return;
    }
    let size = state.effective_font_size();
    let x = origin[4];
    let width = (state.rendering_matrix()[4] - x).max(0.0);
    let baseline = origin[5] + state.rise;
    let top = page_height - baseline - size;
    spans.push(Span::new(
        text,
        state.font_name.clone(),
        size,
        BBox::new(x, top, x + width, top + size),
    ));
}

fn show(
    bytes: &[u8],
    font: Option<&PageFont<'_>>,
    state: &mut TextState,
    page_height: f32,
    spans: &mut Vec<Span>,
) {
    let origin = state.rendering_matrix();
    let text = font.map_or_else(|| decode_pdf_string(bytes), |f| f.decode(bytes));
    state.advance(bytes, font);
    push_span(&text, origin, state, page_height, spans);
}

fn show_array(
    items: &[Object],
    font: Option<&PageFont<'_>>,
    state: &mut TextState,
    page_height: f32,
    spans: &mut Vec<Span>,
) {
    let origin = state.rendering_matrix();
    let mut buf = String::new();
    for item in items {
        match item {
            Object::String(bytes, _) => {
                let fragment = font.map_or_else(|| decode_pdf_string(bytes), |f| f.decode(bytes));
                buf.push_str(&fragment);
                state.advance(bytes, font);
            }
            other => {
                if let Some(adjust) = number(other) {
                    let dx = -adjust / 1000.0 * state.font_size * state.horiz_scale;
                    let glyph = state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale;
                    if dx > glyph * TJ_SPACE_THRESHOLD && !buf.is_empty() && !buf.ends_with(' ') {
                        buf.push(' ');
                    }
                    state.advance_by(dx);
                }
            }
        }
    }
    push_span(buf.trim_end(), origin, state, page_height, spans);
}
