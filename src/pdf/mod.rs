//! PDF reading seam
//!
//! The structuring engine never touches PDF internals directly. It consumes
//! [`PageSpans`] from any [`PdfReader`]; [`LopdfReader`] is the bundled
//! implementation.
//!
//! Coordinates use a top-left origin with `y` growing downwards, so sorting
//! by `(top, left)` yields reading order for single-column text.

pub mod reader;

pub use reader::LopdfReader;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Axis-aligned bounding box in page points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// A run of text with a uniform font, as produced by the PDF reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    /// Base font name, used for bold detection
    pub font: String,
    /// Rendered font size in points; 0.0 when unknown
    pub size: f32,
    pub bold: bool,
    pub bbox: BBox,
}

impl Span {
    /// Build a span, inferring boldness from the font name.
    pub fn new(text: impl Into<String>, font: impl Into<String>, size: f32, bbox: BBox) -> Self {
        let font = font.into();
        let bold = is_bold_font(&font);
        Self {
            text: text.into(),
            font,
            size,
            bold,
            bbox,
        }
    }
}

/// All spans of one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSpans {
    /// 1-based page number used for citations
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<Span>,
}

/// Source of positioned text spans for a document
pub trait PdfReader: Sync {
    /// Read every page of the document, in page order.
    fn read_document(&self, path: &Path) -> Result<Vec<PageSpans>>;
}

/// Heuristic bold detection from a base-font name such as `ABCDEF+Helvetica-Bold`.
pub fn is_bold_font(font: &str) -> bool {
    let lower = font.to_lowercase();
    ["bold", "demi", "black", "heavy"]
        .iter()
        .any(|marker| lower.contains(marker))
}
