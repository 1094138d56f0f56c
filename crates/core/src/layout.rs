//! Positional text layout shared by the extractor, the oracle framing and the
//! geometry resolver.
//!
//! Coordinates are layout units: PDF points measured from the top-left corner
//! of the page's MediaBox, with `y` growing downward.

use serde::{Deserialize, Serialize};

/// Span style bit: superscript.
pub const SPAN_SUPERSCRIPT: u32 = 1;
/// Span style bit: italic or oblique.
pub const SPAN_ITALIC: u32 = 1 << 1;
/// Span style bit: serifed face.
pub const SPAN_SERIFED: u32 = 1 << 2;
/// Span style bit: monospaced face.
pub const SPAN_MONOSPACED: u32 = 1 << 3;
/// Span style bit: bold.
pub const SPAN_BOLD: u32 = 1 << 4;

/// Axis-aligned rectangle `(x0, y0, x1, y1)`, serialized as a 4-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
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

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow the box by `pad` units on every side.
    pub fn padded(&self, pad: f32) -> BBox {
        BBox {
            x0: self.x0 - pad,
            y0: self.y0 - pad,
            x1: self.x1 + pad,
            y1: self.y1 + pad,
        }
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// One contiguous run of text sharing font, size and flags within a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// 0-based page index.
    pub page: u32,
    pub text: String,
    pub bbox: BBox,
    /// Base font name as reported by the document (subset prefix included).
    pub font: String,
    pub size: f32,
    pub flags: u32,
    /// Horizontal position of every character boundary, `text.chars().count() + 1`
    /// entries from `bbox.x0` to `bbox.x1`. Empty means evenly spaced.
    #[serde(skip)]
    pub char_edges: Vec<f32>,
}

impl TextSpan {
    pub fn new(
        page: u32,
        text: impl Into<String>,
        bbox: BBox,
        font: impl Into<String>,
        size: f32,
        flags: u32,
    ) -> Self {
        Self {
            page,
            text: text.into(),
            bbox,
            font: font.into(),
            size,
            flags,
            char_edges: Vec::new(),
        }
    }

    pub fn with_char_edges(mut self, edges: Vec<f32>) -> Self {
        self.char_edges = edges;
        self
    }

    /// X coordinate of the boundary before character `index`.
    ///
    /// `index == char count` yields the right edge of the span.
    pub fn edge(&self, index: usize) -> f32 {
        let count = self.text.chars().count();
        if self.char_edges.len() == count + 1 {
            return self.char_edges[index.min(count)];
        }
        if count == 0 {
            return self.bbox.x0;
        }
        let step = self.bbox.width() / count as f32;
        self.bbox.x0 + step * index.min(count) as f32
    }

    pub fn is_bold(&self) -> bool {
        self.flags & SPAN_BOLD != 0
    }

    pub fn is_italic(&self) -> bool {
        self.flags & SPAN_ITALIC != 0
    }
}
