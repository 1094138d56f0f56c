//! Font embedding for inserted text.
//!
//! A resolved font file is embedded whole as a Type0 font (Identity-H,
//! CID = glyph id) with a ToUnicode CMap, so values in any script the file
//! covers render and stay extractable. Without a file, or when the file
//! cannot be used, the standard Helvetica with WinAnsi encoding is used.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::Face;

use crate::parser::metrics::char_to_winansi;
use crate::PdfError;

/// Standard font used when no font file is available.
pub const BASE_FONT: &str = "Helvetica";

/// Font descriptor flag for non-symbolic fonts.
const NON_SYMBOLIC: i64 = 32;

/// Nominal slant reported for italic faces.
const ITALIC_ANGLE: i64 = -12;

/// ToUnicode `bfchar` blocks hold at most this many entries.
const BFCHAR_BLOCK: usize = 100;

/// How text is turned into string operands for a font.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEncoding {
    /// Two-byte glyph ids, looked up from the font's cmap.
    Identity(Arc<HashMap<char, u16>>),
    /// One WinAnsi byte per character.
    WinAnsi,
}

/// A font object in the output document and how to encode text for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFont {
    pub id: ObjectId,
    pub base_font: String,
    pub encoding: TextEncoding,
}

impl EmbeddedFont {
    /// Encode `text` as a `Tj` operand.
    ///
    /// Characters the font cannot show become glyph 0 (Identity) or `?`
    /// (WinAnsi).
    pub fn encode(&self, text: &str) -> Object {
        match &self.encoding {
            TextEncoding::Identity(glyphs) => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let gid = glyphs.get(&ch).copied().unwrap_or_else(|| {
                        log::debug!("'{}' has no glyph in {}", ch, self.base_font);
                        0
                    });
                    bytes.extend_from_slice(&gid.to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
            TextEncoding::WinAnsi => {
                let bytes = text
                    .chars()
                    .map(|ch| char_to_winansi(ch).unwrap_or(b'?'))
                    .collect();
                Object::String(bytes, StringFormat::Literal)
            }
        }
    }
}

/// Something that can add font objects to an output document.
pub trait FontEmbedder {
    /// Embed the font file at `path`.
    fn embed_file(&mut self, path: &Path) -> Result<EmbeddedFont, PdfError>;

    /// Add the built-in base font.
    fn embed_base(&mut self) -> EmbeddedFont;
}

impl FontEmbedder for Document {
    fn embed_file(&mut self, path: &Path) -> Result<EmbeddedFont, PdfError> {
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Embedded");
        embed_truetype(self, name, data)
    }

    fn embed_base(&mut self) -> EmbeddedFont {
        let id = self.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => BASE_FONT,
            "Encoding" => "WinAnsiEncoding",
        });
        EmbeddedFont {
            id,
            base_font: BASE_FONT.to_string(),
            encoding: TextEncoding::WinAnsi,
        }
    }
}

/// Per-document memo of embedded fonts.
///
/// Each font file is handed to the embedder at most once; the base font is
/// added at most once. A file that fails to embed is remembered as the base
/// font.
#[derive(Debug, Default)]
pub struct FontCache {
    files: HashMap<PathBuf, EmbeddedFont>,
    base: Option<EmbeddedFont>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The font for `file`, embedding it on first use.
    pub fn font_for<E: FontEmbedder + ?Sized>(
        &mut self,
        embedder: &mut E,
        file: Option<&Path>,
    ) -> EmbeddedFont {
        let Some(path) = file else {
            return self.base(embedder);
        };
        if let Some(font) = self.files.get(path) {
            return font.clone();
        }

        let font = match embedder.embed_file(path) {
            Ok(font) => {
                log::debug!("embedded {} as {}", path.display(), font.base_font);
                font
            }
            Err(e) => {
                log::warn!(
                    "cannot embed {}: {}, using {}",
                    path.display(),
                    e,
                    BASE_FONT
                );
                self.base(embedder)
            }
        };
        self.files.insert(path.to_path_buf(), font.clone());
        font
    }

    fn base<E: FontEmbedder + ?Sized>(&mut self, embedder: &mut E) -> EmbeddedFont {
        self.base.get_or_insert_with(|| embedder.embed_base()).clone()
    }

    /// Number of distinct font files seen.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Embed a TrueType or OpenType font file as a Type0 font.
fn embed_truetype(
    doc: &mut Document,
    name: &str,
    data: Vec<u8>,
) -> Result<EmbeddedFont, PdfError> {
    let face = Face::parse(&data, 0)
        .map_err(|e| PdfError::Font(format!("{}: {}", name, e)))?;

    let units = f32::from(face.units_per_em().max(1));
    let scale = |v: f32| (v / units * 1000.0).round() as i64;
    let ps_name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let is_cff = face.tables().cff.is_some();

    // Unicode coverage: first codepoint wins for each glyph.
    let mut char_to_gid: HashMap<char, u16> = HashMap::new();
    let mut gid_to_char: BTreeMap<u16, char> = BTreeMap::new();
    if let Some(cmap) = face.tables().cmap {
        for subtable in cmap.subtables {
            if !subtable.is_unicode() {
                continue;
            }
            subtable.codepoints(|cp| {
                let Some(ch) = char::from_u32(cp) else {
                    return;
                };
                if let Some(gid) = subtable.glyph_index(cp) {
                    char_to_gid.entry(ch).or_insert(gid.0);
                    gid_to_char.entry(gid.0).or_insert(ch);
                }
            });
        }
    }
    if char_to_gid.is_empty() {
        return Err(PdfError::Font(format!("{}: no Unicode cmap", name)));
    }

    let widths: Vec<Object> = (0..face.number_of_glyphs())
        .map(|gid| {
            let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0);
            Object::Integer(scale(f32::from(advance)))
        })
        .collect();

    let bbox = face.global_bounding_box();
    let font_bbox: Vec<Object> = [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max]
        .into_iter()
        .map(|v| Object::Integer(scale(f32::from(v))))
        .collect();
    let ascent = scale(f32::from(face.ascender()));
    let descent = scale(f32::from(face.descender()));
    let cap_height = face
        .capital_height()
        .map(|h| scale(f32::from(h)))
        .unwrap_or(ascent);
    let italic_angle = if face.is_italic() { ITALIC_ANGLE } else { 0 };

    // Every read of `face` happens above; `data` moves into the file stream.

    let data_len = data.len() as i64;
    let (file_key, file_stream) = if is_cff {
        (
            "FontFile3",
            Stream::new(dictionary! { "Subtype" => "OpenType" }, data),
        )
    } else {
        (
            "FontFile2",
            Stream::new(dictionary! { "Length1" => data_len }, data),
        )
    };
    let file_id = doc.add_object(file_stream);

    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(ps_name.clone().into_bytes()),
        "Flags" => NON_SYMBOLIC,
        "FontBBox" => font_bbox,
        "ItalicAngle" => italic_angle,
        "Ascent" => ascent,
        "Descent" => descent,
        "CapHeight" => cap_height,
        "StemV" => 80,
    };
    descriptor.set(file_key, file_id);
    let descriptor_id = doc.add_object(descriptor);

    let mut cid_font = dictionary! {
        "Type" => "Font",
        "Subtype" => if is_cff { "CIDFontType0" } else { "CIDFontType2" },
        "BaseFont" => Object::Name(ps_name.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 0,
        "W" => vec![Object::Integer(0), Object::Array(widths)],
    };
    if !is_cff {
        cid_font.set("CIDToGIDMap", "Identity");
    }
    let cid_font_id = doc.add_object(cid_font);

    let to_unicode_id = doc.add_object(Stream::new(
        dictionary! {},
        to_unicode_cmap(&ps_name, &gid_to_char).into_bytes(),
    ));

    let id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(ps_name.clone().into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    });

    Ok(EmbeddedFont {
        id,
        base_font: ps_name,
        encoding: TextEncoding::Identity(Arc::new(char_to_gid)),
    })
}

/// Build a ToUnicode CMap mapping each glyph id to its character.
fn to_unicode_cmap(name: &str, gid_to_char: &BTreeMap<u16, char>) -> String {
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(out, "/CMapName /{}-UCS def\n/CMapType 2 def", name);
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(&u16, &char)> = gid_to_char.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        let _ = writeln!(out, "{} beginbfchar", block.len());
        for (gid, ch) in block {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(out, "<{:04X}> <{}>", gid, hex);
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}
