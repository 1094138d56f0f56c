//! Positional text extraction.
//!
//! Walks a page's content stream through a simplified text-rendering state
//! machine and produces [`TextSpan`]s in content-stream order. Every span
//! carries its box in layout units (top-left origin of the MediaBox, `y`
//! down) and the horizontal position of each character boundary, which the
//! geometry resolver uses to box a substring.
//!
//! ```text
//! content ops  ->  glyph runs  ->  TextSpan[]
//!   (per page)     Tj/TJ/'/"       trim, box, style flags
//! ```

use invoicer_core::layout::{
    BBox, TextSpan, SPAN_BOLD, SPAN_ITALIC, SPAN_MONOSPACED, SPAN_SERIFED, SPAN_SUPERSCRIPT,
};

use super::backend::{
    get_number_from_value, BackendFontInfo, PageFrame, PageId, PdfBackend, PdfValue,
};
use super::metrics::{
    FontMetrics, DESCRIPTOR_FIXED_PITCH, DESCRIPTOR_FORCE_BOLD, DESCRIPTOR_ITALIC, DESCRIPTOR_SERIF,
};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fraction of an em a negative `TJ` adjustment must exceed before it is
/// read as a word gap.
const KERNING_GAP_RATIO: f32 = 0.15;

/// The identity matrix: [a, b, c, d, e, f].
const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

type Matrix = [f32; 6];

/// `m1` then `m2`, in PDF row-vector convention.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn transform_point(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn matrix_operands(operands: &[PdfValue]) -> Option<Matrix> {
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    (vals.len() == 6).then(|| [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]])
}

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key, not the full name).
    font_key: Vec<u8>,
    /// Resolved base-font name for the current font.
    font_name: String,
    /// Current font size in text-space units.
    font_size: f32,
    /// Elements [a, b, c, d, tx, ty] of the current text matrix.
    text_matrix: Matrix,
    /// Text line matrix -- set by BT and updated by Td/TD/T*/Tm.
    line_matrix: Matrix,
    /// Horizontal scaling factor (percent / 100).  Default 1.0.
    horiz_scale: f32,
    /// Character spacing (Tc).
    char_spacing: f32,
    /// Word spacing (Tw).
    word_spacing: f32,
    /// Text rise (Ts).
    text_rise: f32,
    /// Leading (TL).
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Current glyph origin in user space (before the CTM), rise included.
    fn origin(&self) -> (f32, f32) {
        let m = &self.text_matrix;
        (
            m[4] + self.text_rise * m[2],
            m[5] + self.text_rise * m[3],
        )
    }

    /// Rendered font size under the text matrix and the CTM.
    ///
    /// The vertical scale of the combined matrix is `sqrt(b^2 + d^2)`.
    fn effective_font_size(&self, ctm: &Matrix) -> f32 {
        let m = multiply(&self.text_matrix, ctm);
        let scale = (m[1].powi(2) + m[3].powi(2)).sqrt();
        (self.font_size * scale).abs()
    }

    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (used by Td / TD).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn set_font(&mut self, key: Vec<u8>, base_font: &str, size: f32) {
        self.font_key = key;
        self.font_size = size;
        self.font_name = base_font.to_string();
    }
}

/// Style flags from the font name and descriptor flags.
fn span_flags(font_name: &str, metrics: &FontMetrics, rise: f32) -> u32 {
    let upper = font_name.to_uppercase();
    let described = |bit: u32| metrics.descriptor_flags & bit != 0;
    let mut flags = 0;

    if rise > 0.0 {
        flags |= SPAN_SUPERSCRIPT;
    }
    if upper.contains("ITALIC") || upper.contains("OBLIQUE") || described(DESCRIPTOR_ITALIC) {
        flags |= SPAN_ITALIC;
    }
    if described(DESCRIPTOR_SERIF)
        || upper.contains("TIMES")
        || (upper.contains("SERIF") && !upper.contains("SANS"))
    {
        flags |= SPAN_SERIFED;
    }
    if described(DESCRIPTOR_FIXED_PITCH) || upper.contains("COURIER") || upper.contains("MONO") {
        flags |= SPAN_MONOSPACED;
    }
    if upper.contains("BOLD")
        || upper.contains("BLACK")
        || upper.contains("HEAVY")
        || described(DESCRIPTOR_FORCE_BOLD)
    {
        flags |= SPAN_BOLD;
    }
    flags
}

// ---------------------------------------------------------------------------
// Internal: glyph runs
// ---------------------------------------------------------------------------

/// One placed character, horizontal extent in layout units.
#[derive(Debug, Clone, Copy)]
struct PlacedChar {
    ch: char,
    x0: f32,
    x1: f32,
}

/// Characters shown by one text-showing operator, waiting to become a span.
#[derive(Debug, Default)]
struct Run {
    chars: Vec<PlacedChar>,
    /// Vertical extent `(top, bottom)` in layout units, fixed at the first glyph.
    extent: Option<(f32, f32)>,
}

impl Run {
    /// Place `text` evenly across `[x0, x1]`.
    fn push_text(&mut self, text: &str, x0: f32, x1: f32) {
        let count = text.chars().count();
        if count == 0 {
            return;
        }
        let step = (x1 - x0) / count as f32;
        for (i, ch) in text.chars().enumerate() {
            let start = x0 + step * i as f32;
            self.chars.push(PlacedChar {
                ch,
                x0: start,
                x1: start + step,
            });
        }
    }
}

/// Walks one page and accumulates its spans.
struct PageWalker<'a> {
    fonts: &'a [BackendFontInfo],
    frame: PageFrame,
    page: u32,
    state: TextState,
    ctm: Matrix,
    /// Saved `(CTM, text state)` pairs for `q`/`Q`.
    stack: Vec<(Matrix, TextState)>,
    spans: Vec<TextSpan>,
}

impl<'a> PageWalker<'a> {
    fn new(fonts: &'a [BackendFontInfo], frame: PageFrame, page: u32) -> Self {
        Self {
            fonts,
            frame,
            page,
            state: TextState::default(),
            ctm: IDENTITY_MATRIX,
            stack: Vec::new(),
            spans: Vec::new(),
        }
    }

    fn current_font(&self) -> Option<&'a BackendFontInfo> {
        resolve_font(&self.state.font_key, self.fonts)
    }

    /// Current pen position in layout units.
    fn pen(&self) -> (f32, f32) {
        let (ux, uy) = self.state.origin();
        let (dx, dy) = transform_point(&self.ctm, ux, uy);
        self.frame.to_layout(dx, dy)
    }

    fn save(&mut self) {
        self.stack.push((self.ctm, self.state.clone()));
    }

    fn restore(&mut self) {
        if let Some((ctm, saved)) = self.stack.pop() {
            let matrices = (self.state.text_matrix, self.state.line_matrix);
            self.ctm = ctm;
            self.state = saved;
            self.state.text_matrix = matrices.0;
            self.state.line_matrix = matrices.1;
        }
    }

    /// Show one string: place each glyph and advance the text matrix.
    fn show_string(&mut self, operand: &PdfValue, run: &mut Run) {
        let PdfValue::Str(bytes) = operand else {
            return;
        };
        let default_metrics = FontMetrics::default();
        let metrics = self.current_font().map_or(&default_metrics, |f| &f.metrics);

        if run.extent.is_none() {
            let size = self.state.effective_font_size(&self.ctm);
            let (_, baseline) = self.pen();
            run.extent = Some((
                baseline - metrics.ascent_em() * size,
                baseline - metrics.descent_em() * size,
            ));
        }

        for glyph in metrics.glyphs(bytes) {
            let mut advance = glyph.width / 1000.0 * self.state.font_size + self.state.char_spacing;
            if !metrics.composite && glyph.code == 32 {
                advance += self.state.word_spacing;
            }
            advance *= self.state.horiz_scale;

            let (x0, _) = self.pen();
            self.state.advance_x(advance);
            let (x1, _) = self.pen();
            run.push_text(&glyph.text, x0.min(x1), x0.max(x1));
        }
    }

    /// Apply a `TJ` adjustment (thousandths of text space, positive moves left).
    fn kern(&mut self, adjustment: f32, run: &mut Run) {
        let dx = -adjustment / 1000.0 * self.state.font_size * self.state.horiz_scale;
        let gap_threshold = self.state.font_size * KERNING_GAP_RATIO * self.state.horiz_scale;

        let (x0, _) = self.pen();
        self.state.advance_x(dx);
        let (x1, _) = self.pen();

        let ends_with_space = run.chars.last().is_some_and(|c| c.ch.is_whitespace());
        if dx > gap_threshold && !run.chars.is_empty() && !ends_with_space {
            run.push_text(" ", x0, x1);
        }
    }

    /// Turn a finished run into a span; whitespace-only runs are dropped.
    fn flush(&mut self, run: Run) {
        let Some((top, bottom)) = run.extent else {
            return;
        };
        let chars: Vec<PlacedChar> = {
            let start = run.chars.iter().position(|c| !c.ch.is_whitespace());
            let end = run.chars.iter().rposition(|c| !c.ch.is_whitespace());
            match (start, end) {
                (Some(s), Some(e)) => run.chars[s..=e].to_vec(),
                _ => return,
            }
        };

        let text: String = chars.iter().map(|c| c.ch).collect();
        let mut edges: Vec<f32> = chars.iter().map(|c| c.x0).collect();
        edges.extend(chars.last().map(|c| c.x1));

        let x0 = edges.iter().copied().fold(f32::INFINITY, f32::min);
        let x1 = edges.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let default_metrics = FontMetrics::default();
        let metrics = self.current_font().map_or(&default_metrics, |f| &f.metrics);
        let flags = span_flags(&self.state.font_name, metrics, self.state.text_rise);

        self.spans.push(
            TextSpan::new(
                self.page,
                text,
                BBox::new(x0, top.min(bottom), x1, top.max(bottom)),
                self.state.font_name.clone(),
                self.state.effective_font_size(&self.ctm),
                flags,
            )
            .with_char_edges(edges),
        );
    }

    fn show_single(&mut self, operand: &PdfValue) {
        let mut run = Run::default();
        self.show_string(operand, &mut run);
        self.flush(run);
    }

    /// Process a `TJ` array: strings to render and numeric kerning
    /// adjustments. The whole array becomes one span.
    fn show_array(&mut self, arr: &[PdfValue]) {
        let mut run = Run::default();
        for elem in arr {
            match elem {
                PdfValue::Str(_) => self.show_string(elem, &mut run),
                val => {
                    if let Some(adj) = get_number_from_value(val) {
                        self.kern(adj, &mut run);
                    }
                }
            }
        }
        self.flush(run);
    }
}

/// Resolve a font resource name to its [`BackendFontInfo`].
///
/// The `BackendFontInfo.name` field holds the resource key (e.g. `b"F1"`).
fn resolve_font<'a>(key: &[u8], fonts: &'a [BackendFontInfo]) -> Option<&'a BackendFontInfo> {
    fonts.iter().find(|info| info.name == key)
}

// ---------------------------------------------------------------------------
// Public API: span extraction
// ---------------------------------------------------------------------------

/// Walk a single page's content stream and produce its [`TextSpan`]s.
///
/// `page` is the 0-based page index stamped on every span. Handled
/// operators:
///
/// | Operator | Action |
/// |----------|--------|
/// | `q` / `Q` | Save / restore the CTM and text parameters |
/// | `cm`     | Concatenate to the CTM |
/// | `BT`     | Begin text object -- reset matrices |
/// | `Tf`     | Set font and size |
/// | `Tm`     | Set text matrix directly |
/// | `Td`     | Translate text position |
/// | `TD`     | Translate and set leading |
/// | `T*`     | Move to start of next line |
/// | `TL`, `Tc`, `Tw`, `Tz`, `Ts` | Text parameters |
/// | `Tj`     | Show a string |
/// | `TJ`     | Show strings with kerning adjustments |
/// | `'`      | Move to next line and show string |
/// | `"`      | Set spacing, move to next line and show string |
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page: u32,
    page_id: PageId,
) -> Result<Vec<TextSpan>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();
    let frame = backend.page_frame(page_id)?;

    let mut walker = PageWalker::new(&fonts, frame, page);

    for op in &ops {
        let operands = &op.operands;
        let number = |i: usize| operands.get(i).and_then(get_number_from_value);

        match op.operator.as_str() {
            // -- Graphics state -----------------------------------------
            "q" => walker.save(),
            "Q" => walker.restore(),
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    walker.ctm = multiply(&m, &walker.ctm);
                }
            }

            // -- Text object delimiters --------------------------------
            "BT" => {
                walker.state.text_matrix = IDENTITY_MATRIX;
                walker.state.line_matrix = IDENTITY_MATRIX;
            }

            // -- Font ---------------------------------------------------
            "Tf" => handle_tf(operands, &fonts, &mut walker.state),

            // -- Text matrix / position ---------------------------------
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    walker.state.text_matrix = m;
                    walker.state.line_matrix = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    walker.state.translate_line(tx, ty);
                }
            }
            "TD" => {
                // TD is equivalent to: -ty TL ; tx ty Td
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    walker.state.leading = -ty;
                    walker.state.translate_line(tx, ty);
                }
            }
            "T*" => {
                let leading = walker.state.leading;
                walker.state.translate_line(0.0, -leading);
            }
            "TL" => {
                if let Some(v) = number(0) {
                    walker.state.leading = v;
                }
            }

            // -- Spacing / scaling --------------------------------------
            "Tc" => {
                if let Some(v) = number(0) {
                    walker.state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = number(0) {
                    walker.state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = number(0) {
                    walker.state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = number(0) {
                    walker.state.text_rise = v;
                }
            }

            // -- Show text ----------------------------------------------
            "Tj" => {
                if let Some(first) = operands.first() {
                    walker.show_single(first);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = operands.first() {
                    walker.show_array(arr);
                }
            }
            "'" => {
                let leading = walker.state.leading;
                walker.state.translate_line(0.0, -leading);
                if let Some(first) = operands.first() {
                    walker.show_single(first);
                }
            }
            "\"" => {
                // " aw ac string  =>  set Tw, Tc, T*, Tj
                if operands.len() >= 3 {
                    if let Some(aw) = number(0) {
                        walker.state.word_spacing = aw;
                    }
                    if let Some(ac) = number(1) {
                        walker.state.char_spacing = ac;
                    }
                    let leading = walker.state.leading;
                    walker.state.translate_line(0.0, -leading);
                    walker.show_single(&operands[2]);
                }
            }

            _ => { /* Paths, images and marked content never produce spans */ }
        }
    }

    log::debug!("page {}: {} spans", page, walker.spans.len());
    Ok(walker.spans)
}

/// Handle the `Tf` (set font) operator.
fn handle_tf(operands: &[PdfValue], fonts: &[BackendFontInfo], state: &mut TextState) {
    if operands.len() < 2 {
        return;
    }
    let key = match &operands[0] {
        PdfValue::Name(n) => n.clone(),
        PdfValue::Str(s) => s.clone(),
        _ => return,
    };
    let size = get_number_from_value(&operands[1]).unwrap_or(0.0);
    match resolve_font(&key, fonts).and_then(|info| info.base_font.clone()) {
        Some(base) => state.set_font(key, &base, size),
        None => {
            // Font not in resource dict -- keep the key anyway.
            let name = String::from_utf8_lossy(&key).to_string();
            state.set_font(key, &name, size);
        }
    }
}

// ---------------------------------------------------------------------------
// Public API: multi-page extraction
// ---------------------------------------------------------------------------

/// Extract text spans from every page in the document, pages in page-tree
/// order, spans in content-stream order.
pub fn extract_all_pages(backend: &dyn PdfBackend) -> Result<Vec<TextSpan>, PdfError> {
    let mut spans = Vec::new();
    for (&page_num, &page_id) in &backend.pages() {
        spans.extend(extract_page_spans(backend, page_num.saturating_sub(1), page_id)?);
    }
    Ok(spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
