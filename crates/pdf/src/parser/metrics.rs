//! Per-font metrics needed to place glyphs: advance widths, vertical extent
//! and the code-to-Unicode mapping.
//!
//! Everything here works on plain data so the layout state machine can be
//! tested without a real document.

use std::collections::HashMap;

use super::backend::{decode_text_simple, get_number_from_value, PdfValue};

/// Ascent used when the font descriptor does not declare one (em fraction).
pub const DEFAULT_ASCENT: f32 = 0.8;
/// Descent used when the font descriptor does not declare one (em fraction).
pub const DEFAULT_DESCENT: f32 = -0.2;
/// Advance used for codes without a declared width (thousandths of an em).
pub const FALLBACK_WIDTH: f32 = 500.0;

/// Font descriptor flag: all glyphs have the same width.
pub const DESCRIPTOR_FIXED_PITCH: u32 = 1;
/// Font descriptor flag: glyphs have serifs.
pub const DESCRIPTOR_SERIF: u32 = 1 << 1;
/// Font descriptor flag: glyphs are slanted.
pub const DESCRIPTOR_ITALIC: u32 = 1 << 6;
/// Font descriptor flag: bold glyphs are painted with extra pixels.
pub const DESCRIPTOR_FORCE_BOLD: u32 = 1 << 18;

/// One shown glyph: the text it stands for and its advance in thousandths of
/// an em (before size, spacing and scaling are applied).
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    pub text: String,
    pub width: f32,
}

/// Metrics for one font resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontMetrics {
    /// Type0 font: codes are two bytes wide.
    pub composite: bool,
    /// Simple font declares `/Encoding /WinAnsiEncoding`.
    pub win_ansi: bool,
    pub first_char: u32,
    /// Simple-font `/Widths`, indexed from `first_char`.
    pub widths: Vec<f32>,
    /// Type0 `/W` entries, CID to width.
    pub cid_widths: HashMap<u32, f32>,
    /// `/DW` for Type0 fonts, `/MissingWidth` for simple fonts.
    pub default_width: Option<f32>,
    /// Descriptor ascent and descent, thousandths of an em.
    pub ascent: Option<f32>,
    pub descent: Option<f32>,
    pub descriptor_flags: u32,
    pub to_unicode: HashMap<u32, String>,
}

impl FontMetrics {
    /// Split shown bytes into glyphs.
    ///
    /// Text comes from the ToUnicode map when it has an entry. Composite
    /// fonts without one read the code as a Unicode scalar. Simple fonts
    /// decode WinAnsi per byte, or fall back to the byte heuristics of
    /// [`decode_text_simple`]; when those change the character count the
    /// whole run becomes one glyph.
    pub fn glyphs(&self, bytes: &[u8]) -> Vec<Glyph> {
        let codes = self.char_codes(bytes);
        let mapped = !self.to_unicode.is_empty() || self.composite || self.win_ansi;

        if mapped {
            return codes
                .into_iter()
                .map(|code| Glyph {
                    code,
                    text: self.code_text(code),
                    width: self.glyph_width(code),
                })
                .collect();
        }

        let decoded = decode_text_simple(bytes);
        if decoded.chars().count() == codes.len() {
            return decoded
                .chars()
                .zip(codes)
                .map(|(ch, code)| Glyph {
                    code,
                    text: ch.to_string(),
                    width: self.glyph_width(code),
                })
                .collect();
        }

        let width = codes.iter().map(|&c| self.glyph_width(c)).sum();
        vec![Glyph {
            code: 0,
            text: decoded,
            width,
        }]
    }

    /// Character codes in a shown string: two-byte big-endian for composite
    /// fonts (a trailing odd byte is dropped), one byte otherwise.
    pub fn char_codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite {
            bytes
                .chunks_exact(2)
                .map(|c| u32::from(u16::from_be_bytes([c[0], c[1]])))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Advance width of `code` in thousandths of an em.
    pub fn glyph_width(&self, code: u32) -> f32 {
        let declared = if self.composite {
            self.cid_widths.get(&code).copied()
        } else {
            code.checked_sub(self.first_char)
                .and_then(|i| self.widths.get(i as usize))
                .copied()
        };
        declared
            .or(self.default_width)
            .filter(|w| *w > 0.0)
            .unwrap_or(FALLBACK_WIDTH)
    }

    /// Ascent as a fraction of the font size.
    pub fn ascent_em(&self) -> f32 {
        self.ascent
            .filter(|a| *a > 0.0)
            .map(|a| a / 1000.0)
            .unwrap_or(DEFAULT_ASCENT)
    }

    /// Descent as a (negative) fraction of the font size.
    pub fn descent_em(&self) -> f32 {
        self.descent
            .filter(|d| *d < 0.0)
            .map(|d| d / 1000.0)
            .unwrap_or(DEFAULT_DESCENT)
    }

    fn code_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.composite {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string();
        }
        let byte = u8::try_from(code).unwrap_or(b'?');
        if self.win_ansi {
            winansi_to_char(byte).to_string()
        } else {
            char::from(byte).to_string()
        }
    }
}

/// Widest CID run one `/W` entry may describe. Identity-H codes are two
/// bytes.
const MAX_CID_RUN: u32 = 0xFFFF;

/// Parse a `/W` array into CID widths.
///
/// Both forms are accepted: `c [w1 w2 ...]` and `c_first c_last w`. Runs are
/// capped at [`MAX_CID_RUN`] CIDs past their first.
pub fn parse_cid_widths(entries: &[PdfValue]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;

    while i < entries.len() {
        let Some(first) = get_number_from_value(&entries[i]).map(|f| f as u32) else {
            i += 1;
            continue;
        };
        match entries.get(i + 1) {
            Some(PdfValue::Array(list)) => {
                let cids = first..=first.saturating_add(MAX_CID_RUN);
                for (cid, w) in cids.zip(list.iter().filter_map(get_number_from_value)) {
                    widths.insert(cid, w);
                }
                i += 2;
            }
            Some(last) => {
                let last = get_number_from_value(last).map(|f| f as u32);
                let w = entries.get(i + 2).and_then(get_number_from_value);
                if let (Some(last), Some(w)) = (last, w) {
                    for cid in first..=last.min(first.saturating_add(MAX_CID_RUN)) {
                        widths.insert(cid, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}

/// Parse a ToUnicode CMap stream into a code to text map.
///
/// Targets are UTF-16BE; entries that are not valid UTF-16 are skipped.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let cmap = match adobe_cmap_parser::get_unicode_map(data) {
        Ok(cmap) => cmap,
        Err(_) => {
            log::warn!("unparseable ToUnicode CMap, falling back to byte decoding");
            return HashMap::new();
        }
    };

    cmap.into_iter()
        .filter_map(|(code, bytes)| {
            if bytes.len() % 2 != 0 {
                log::debug!("odd-length ToUnicode target for code {code}, skipping");
                return None;
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).ok().map(|text| (code, text))
        })
        .collect()
}

/// Map a WinAnsi (Windows-1252) byte to its Unicode character.
pub fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => char::from(byte),
    }
}

/// Map a character to its WinAnsi byte, if the encoding has one.
pub fn char_to_winansi(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(c as u32).ok(),
        _ => (0x80..=0x9F)
            .filter(|b| !matches!(b, 0x81 | 0x8D | 0x8F | 0x90 | 0x9D))
            .find(|&b| winansi_to_char(b) == c),
    }
}
