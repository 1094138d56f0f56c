//! Exact re-localization of a field value on a page.
//!
//! Oracle boxes are estimates, so before anything is painted over the value
//! is searched again in the page's own text. Spans are grouped into visual
//! lines, the line text is searched for the literal value, and the match is
//! boxed from the per-character edges. A match may cross span boundaries.

use invoicer_core::layout::{BBox, TextSpan};

/// Minimum gap (in layout units) between adjacent spans before a space is
/// inserted into the line text.
const MIN_WORD_GAP: f32 = 1.5;

/// One character of a line with its box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineChar {
    pub ch: char,
    pub bbox: BBox,
}

/// A visual line: characters of one or more spans sharing a baseline,
/// left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub chars: Vec<LineChar>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }

    /// Box the first occurrence of `needle` in this line.
    pub fn find(&self, needle: &str) -> Option<BBox> {
        let text = self.text();
        let byte_idx = text.find(needle)?;
        let start = text[..byte_idx].chars().count();
        let len = needle.chars().count();

        self.chars[start..start + len]
            .iter()
            .map(|c| c.bbox)
            .reduce(|acc, b| acc.union(&b))
    }
}

/// Returns `true` if `c` belongs to a script that does not use inter-word
/// spaces (CJK, kana, Hangul, Thai and similar).
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0xF900..=0xFAFF
            | 0x3040..=0x30FF
            | 0x31F0..=0x31FF
            | 0xAC00..=0xD7AF
            | 0x1100..=0x11FF
            | 0x3130..=0x318F
            | 0x3000..=0x303F
            | 0xFF00..=0xFFEF
            | 0x0E00..=0x0EFF
            | 0x1000..=0x109F
            | 0x1780..=0x17FF
    )
}

fn center_y(bbox: &BBox) -> f32 {
    (bbox.y0 + bbox.y1) / 2.0
}

/// Group the spans of `page` into lines, top to bottom.
///
/// A span joins the current line when its vertical center falls inside the
/// line's band, so runs of different sizes on one baseline stay together.
pub fn page_lines(spans: &[TextSpan], page: u32) -> Vec<TextLine> {
    let mut on_page: Vec<&TextSpan> = spans
        .iter()
        .filter(|s| s.page == page && !s.text.is_empty())
        .collect();
    on_page.sort_by(|a, b| {
        center_y(&a.bbox)
            .total_cmp(&center_y(&b.bbox))
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<(BBox, Vec<&TextSpan>)> = Vec::new();
    for span in on_page {
        let center = center_y(&span.bbox);
        match groups.last_mut() {
            Some((band, members)) if center >= band.y0 && center <= band.y1 => {
                *band = band.union(&span.bbox);
                members.push(span);
            }
            _ => groups.push((span.bbox, vec![span])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| assemble_line(members))
        .collect()
}

/// Lay the spans of one line out left to right, inserting a space where
/// they are visibly apart and both sides use spaced scripts.
fn assemble_line(mut spans: Vec<&TextSpan>) -> TextLine {
    spans.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

    let mut line = TextLine::default();
    let mut prev: Option<&TextSpan> = None;

    for span in spans {
        if let Some(p) = prev {
            let gap = span.bbox.x0 - p.bbox.x1;
            let spaceless = match (p.text.chars().next_back(), span.text.chars().next()) {
                (Some(l), Some(f)) => is_spaceless_script_char(l) && is_spaceless_script_char(f),
                _ => false,
            };
            if gap > MIN_WORD_GAP && !spaceless {
                line.chars.push(LineChar {
                    ch: ' ',
                    bbox: BBox::new(
                        p.bbox.x1,
                        p.bbox.y0.min(span.bbox.y0),
                        span.bbox.x0,
                        p.bbox.y1.max(span.bbox.y1),
                    ),
                });
            }
        }

        for (i, ch) in span.text.chars().enumerate() {
            line.chars.push(LineChar {
                ch,
                bbox: BBox::new(span.edge(i), span.bbox.y0, span.edge(i + 1), span.bbox.y1),
            });
        }
        prev = Some(span);
    }

    line
}

/// Box the first exact (case-sensitive) occurrence of `needle` on `page`.
///
/// Surrounding whitespace in `needle` is ignored; a blank needle never
/// matches.
pub fn find_text_bbox(spans: &[TextSpan], page: u32, needle: &str) -> Option<BBox> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    page_lines(spans, page)
        .iter()
        .find_map(|line| line.find(needle))
}
