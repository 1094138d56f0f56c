use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use super::metrics::{parse_cid_widths, parse_to_unicode, FontMetrics};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// Upper bound on reference chains followed when resolving an object.
const MAX_INDIRECTION: usize = 8;

/// Parent-chain depth limit when looking up inherited page attributes.
const MAX_PARENT_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name from the font dictionary, if present.
    pub base_font: Option<String>,
    /// Font subtype (e.g. `Type1`, `TrueType`, `Type0`).
    pub subtype: Option<String>,
    /// Encoding entry from the font dictionary, if present.
    pub encoding: Option<String>,
    /// Widths, vertical extent and Unicode mapping.
    pub metrics: FontMetrics,
}

/// The page's MediaBox in PDF user space.
///
/// Layout coordinates are measured from its top-left corner with `y`
/// growing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageFrame {
    /// US Letter, used by tests and as the layout of a bare page.
    pub const LETTER: PageFrame = PageFrame {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// PDF user space to layout units.
    pub fn to_layout(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.llx, self.ury - y)
    }

    /// Layout units to PDF user space.
    pub fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.llx, self.ury - y)
    }
}

/// A simplified, lopdf-independent representation of a PDF value.
///
/// This enum decouples higher-level logic from the concrete `lopdf::Object`
/// type so that the functional core can work with pure data.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// References are preserved as `PdfValue::Reference`.  Stream dictionaries
/// are converted but the raw stream bytes are discarded (they must be
/// obtained through [`PdfBackend::page_content`]).
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(convert_entries(dict)),
        lopdf::Object::Stream(stream) => PdfValue::Dict(convert_entries(&stream.dict)),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

fn convert_entries(dict: &lopdf::Dictionary) -> Vec<(Vec<u8>, PdfValue)> {
    dict.iter()
        .map(|(k, v)| (k.clone(), convert_object(v)))
        .collect()
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// Handles three cases in order:
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix) -- strips BOM and decodes.
/// 2. Valid UTF-8 -- returned as-is.
/// 3. Fallback to Latin-1 (ISO 8859-1) -- each byte mapped to its Unicode
///    code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// The layout state machine only talks to this trait so it can be tested
/// against mock pages without building real documents.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the page's MediaBox.
    fn page_frame(&self, page: PageId) -> Result<PageFrame, PdfError>;

    /// Return font information for every font referenced by the given page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError>;

    /// Return the raw (decompressed, concatenated) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Wrap an already parsed document.
    pub fn from_document(doc: lopdf::Document) -> Result<Self, PdfError> {
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }
        Ok(Self { doc })
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &lopdf::Document {
        &self.doc
    }

    /// Mutable access for the editor.
    pub fn raw_doc_mut(&mut self) -> &mut lopdf::Document {
        &mut self.doc
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        let mut current = obj;
        for _ in 0..MAX_INDIRECTION {
            match current {
                lopdf::Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(target) => current = target,
                    Err(_) => break,
                },
                _ => break,
            }
        }
        current
    }

    /// Resolve `dict[key]` to a direct object.
    pub fn lookup<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        dict.get(key).ok().map(|obj| self.resolve(obj))
    }

    /// The page dictionary behind `page`.
    pub fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .and_then(|obj| obj.as_dict())
            .map_err(|e| PdfError::Parse(format!("cannot get page dictionary: {}", e)))
    }

    /// The `/Resources` in effect for a page: its own, or the nearest one
    /// inherited through `/Parent`. Inline and indirect dictionaries both
    /// count.
    pub fn page_resources<'a>(
        &'a self,
        page: &'a lopdf::Dictionary,
    ) -> Option<&'a lopdf::Dictionary> {
        let mut dict = page;
        for _ in 0..MAX_PARENT_DEPTH {
            if let Some(resources) = self.lookup(dict, b"Resources") {
                return resources.as_dict().ok();
            }
            dict = self.lookup(dict, b"Parent")?.as_dict().ok()?;
        }
        None
    }

    fn lookup_number(&self, dict: &lopdf::Dictionary, key: &[u8]) -> Option<f32> {
        match self.lookup(dict, key)? {
            lopdf::Object::Integer(i) => Some(*i as f32),
            lopdf::Object::Real(f) => Some(*f),
            _ => None,
        }
    }

    fn lookup_name(&self, dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
        self.lookup(dict, key)?
            .as_name()
            .ok()
            .map(|n| String::from_utf8_lossy(n).into_owned())
    }

    // -- private helpers ----------------------------------------------------

    /// Walk up the page tree to find the MediaBox array.
    fn find_media_box(&self, dict: &lopdf::Dictionary) -> Option<Vec<lopdf::Object>> {
        if let Some(lopdf::Object::Array(arr)) = self.lookup(dict, b"MediaBox") {
            return Some(arr.clone());
        }

        let parent = self.lookup(dict, b"Parent")?.as_dict().ok()?;
        self.find_media_box(parent)
    }

    /// Convert a vector of lopdf objects to `f32` values.
    fn array_to_f32s(&self, objects: &[lopdf::Object]) -> Result<Vec<f32>, PdfError> {
        objects
            .iter()
            .map(|obj| match self.resolve(obj) {
                lopdf::Object::Integer(i) => Ok(*i as f32),
                lopdf::Object::Real(f) => Ok(*f),
                other => Err(PdfError::Parse(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }

    /// Gather the widths, descriptor and ToUnicode data of a font dictionary.
    fn font_metrics(&self, font: &lopdf::Dictionary) -> FontMetrics {
        let composite = self.lookup_name(font, b"Subtype").as_deref() == Some("Type0");
        let mut metrics = FontMetrics {
            composite,
            win_ansi: self.lookup_name(font, b"Encoding").as_deref() == Some("WinAnsiEncoding"),
            ..Default::default()
        };

        if let Some(lopdf::Object::Stream(stream)) = self.lookup(font, b"ToUnicode") {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            metrics.to_unicode = parse_to_unicode(&data);
        }

        let descendant = if composite {
            self.lookup(font, b"DescendantFonts")
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| self.resolve(o).as_dict().ok())
        } else {
            None
        };
        let width_source = descendant.unwrap_or(font);

        if composite {
            if let Some(lopdf::Object::Array(w)) = self.lookup(width_source, b"W") {
                let entries: Vec<_> = w.iter().map(|o| convert_object(self.resolve(o))).collect();
                metrics.cid_widths = parse_cid_widths(&entries);
            }
            metrics.default_width = Some(self.lookup_number(width_source, b"DW").unwrap_or(1000.0));
        } else {
            metrics.first_char = self.lookup_number(font, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(lopdf::Object::Array(w)) = self.lookup(font, b"Widths") {
                metrics.widths = self.array_to_f32s(w).unwrap_or_default();
            }
        }

        if let Some(descriptor) = self
            .lookup(width_source, b"FontDescriptor")
            .and_then(|o| o.as_dict().ok())
        {
            metrics.ascent = self.lookup_number(descriptor, b"Ascent");
            metrics.descent = self.lookup_number(descriptor, b"Descent");
            metrics.descriptor_flags =
                self.lookup_number(descriptor, b"Flags").unwrap_or(0.0) as u32;
            if !composite {
                metrics.default_width = self.lookup_number(descriptor, b"MissingWidth");
            }
        }

        metrics
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_frame(&self, page: PageId) -> Result<PageFrame, PdfError> {
        let page_dict = self.page_dict(page)?;

        let media_box = self
            .find_media_box(page_dict)
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;

        let nums = self.array_to_f32s(&media_box)?;
        if nums.len() < 4 {
            return Err(PdfError::Parse(format!(
                "MediaBox has {} elements, expected 4",
                nums.len()
            )));
        }

        Ok(PageFrame {
            llx: nums[0].min(nums[2]),
            lly: nums[1].min(nums[3]),
            urx: nums[0].max(nums[2]),
            ury: nums[1].max(nums[3]),
        })
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
        let page_dict = self.page_dict(page)?;
        let Some(fonts) = self
            .page_resources(page_dict)
            .and_then(|resources| self.lookup(resources, b"Font"))
            .and_then(|fonts| fonts.as_dict().ok())
        else {
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(fonts.len());
        for (name, obj) in fonts.iter() {
            let Ok(dict) = self.resolve(obj).as_dict() else {
                log::debug!(
                    "font /{} on page {:?} is not a dictionary",
                    String::from_utf8_lossy(name),
                    page
                );
                continue;
            };
            result.push(BackendFontInfo {
                name: name.clone(),
                base_font: self.lookup_name(dict, b"BaseFont"),
                subtype: self.lookup_name(dict, b"Subtype"),
                encoding: self.lookup_name(dict, b"Encoding"),
                metrics: self.font_metrics(dict),
            });
        }

        Ok(result)
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        let ops = content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect();

        Ok(ops)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// One-page document whose page inherits its MediaBox from the page tree
    /// and uses an indirect font with widths and a descriptor.
    fn sample_document() -> (lopdf::Document, PageId) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "ABCDEF+Roboto-Bold",
            "Ascent" => 900,
            "Descent" => -250,
            "Flags" => 32,
        });
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Roboto-Bold",
            "Encoding" => "WinAnsiEncoding",
            "FirstChar" => 48,
            "Widths" => vec![Object::Integer(550), Object::Integer(560)],
            "FontDescriptor" => descriptor_id,
        });
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 72 700 Td (01) Tj ET".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn page_frame_inherits_media_box() {
        let (doc, page_id) = sample_document();
        let backend = LopdfBackend::from_document(doc).unwrap();
        let frame = backend.page_frame(page_id).unwrap();
        assert_eq!(frame.width(), 595.0);
        assert_eq!(frame.height(), 842.0);
    }

    #[test]
    fn page_fonts_collects_metrics() {
        let (doc, page_id) = sample_document();
        let backend = LopdfBackend::from_document(doc).unwrap();
        let fonts = backend.page_fonts(page_id).unwrap();
        assert_eq!(fonts.len(), 1);

        let font = &fonts[0];
        assert_eq!(font.name, b"F1");
        assert_eq!(font.base_font.as_deref(), Some("ABCDEF+Roboto-Bold"));
        assert!(font.metrics.win_ansi);
        assert!(!font.metrics.composite);
        assert_eq!(font.metrics.glyph_width(48), 550.0);
        assert_eq!(font.metrics.glyph_width(49), 560.0);
        assert_eq!(font.metrics.ascent, Some(900.0));
        assert_eq!(font.metrics.descent, Some(-250.0));
    }

    #[test]
    fn page_fonts_inherits_inline_resources() {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => dictionary! {
                            "Type" => "Font",
                            "Subtype" => "Type1",
                            "BaseFont" => "Helvetica",
                        },
                    },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let backend = LopdfBackend::from_document(doc).unwrap();
        let fonts = backend.page_fonts(page_id).unwrap();
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[0].name, b"F1");
        assert_eq!(fonts[0].base_font.as_deref(), Some("Helvetica"));
    }

    #[test]
    fn page_resources_prefers_the_page_own() {
        let (doc, page_id) = sample_document();
        let backend = LopdfBackend::from_document(doc).unwrap();
        let page = backend.page_dict(page_id).unwrap();
        let resources = backend.page_resources(page).unwrap();
        assert!(resources.has(b"Font"));
    }

    #[test]
    fn page_content_decodes_operations() {
        let (doc, page_id) = sample_document();
        let backend = LopdfBackend::from_document(doc).unwrap();
        let raw = backend.page_content(page_id).unwrap();
        let ops = backend.decode_content(&raw).unwrap();
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["BT", "Tf", "Td", "Tj", "ET"]);
    }

    #[test]
    fn load_bytes_rejects_garbage() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn page_frame_coordinate_conversion() {
        let frame = PageFrame {
            llx: 10.0,
            lly: 20.0,
            urx: 622.0,
            ury: 812.0,
        };
        assert_eq!(frame.to_layout(110.0, 712.0), (100.0, 100.0));
        assert_eq!(frame.to_user(100.0, 100.0), (110.0, 712.0));
    }

    // -- decode_text_simple -------------------------------------------------

    #[test]
    fn decode_text_simple_utf8() {
        assert_eq!(decode_text_simple("caf\u{00E9}".as_bytes()), "caf\u{00E9}");
    }

    #[test]
    fn decode_text_simple_latin1() {
        let input: &[u8] = &[0x63, 0x61, 0x66, 0xE9];
        assert_eq!(decode_text_simple(input), "caf\u{00E9}");
    }

    #[test]
    fn decode_text_simple_utf16be() {
        let input: &[u8] = &[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9, 0x00];
        assert_eq!(decode_text_simple(input), "A\u{00E9}");
    }

    #[test]
    fn decode_text_simple_empty() {
        assert_eq!(decode_text_simple(&[]), "");
    }

    // -- get_number_from_value / convert_object -------------------------------

    #[test]
    fn get_number_accepts_integer_and_real_only() {
        assert_eq!(get_number_from_value(&PdfValue::Integer(-10)), Some(-10.0));
        assert_eq!(get_number_from_value(&PdfValue::Real(2.5)), Some(2.5));
        assert_eq!(get_number_from_value(&PdfValue::Name(b"W".to_vec())), None);
        assert_eq!(get_number_from_value(&PdfValue::Reference((1, 0))), None);
    }

    #[test]
    fn convert_string_keeps_bytes() {
        assert_eq!(
            convert_object(&lopdf::Object::String(
                vec![0x00, 0x41],
                lopdf::StringFormat::Hexadecimal,
            )),
            PdfValue::Str(vec![0x00, 0x41]),
        );
    }

    #[test]
    fn convert_tj_array() {
        let arr = lopdf::Object::Array(vec![
            lopdf::Object::string_literal("IN"),
            lopdf::Object::Integer(-120),
            lopdf::Object::string_literal("V"),
        ]);
        assert_eq!(
            convert_object(&arr),
            PdfValue::Array(vec![
                PdfValue::Str(b"IN".to_vec()),
                PdfValue::Integer(-120),
                PdfValue::Str(b"V".to_vec()),
            ]),
        );
    }

    #[test]
    fn convert_stream_uses_dict() {
        let stream = lopdf::Stream::new(dictionary! { "Length" => 0 }, vec![]);
        match convert_object(&lopdf::Object::Stream(stream)) {
            PdfValue::Dict(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0, b"Length");
            }
            other => panic!("expected Dict for stream, got {:?}", other),
        }
    }
}
