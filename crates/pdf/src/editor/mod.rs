//! In-place document editing.
//!
//! [`DocumentEditor`] owns one parsed document for the duration of a
//! replacement pass. Overlays are collected per page and written on
//! [`DocumentEditor::save`]: the page's existing content is wrapped in
//! `q ... Q` and the overlay is appended after it, so inserted text starts
//! from the default graphics state whatever the template left on the stack.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use invoicer_core::layout::TextSpan;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream};

use crate::parser::backend::{LopdfBackend, PageFrame, PageId, PdfBackend};
use crate::parser::layout::extract_all_pages;
use crate::PdfError;

pub mod fonts;
pub mod redact;

use fonts::{EmbeddedFont, FontCache};

/// Prefix of the resource names given to inserted fonts.
const FONT_RESOURCE_PREFIX: &str = "FInv";

pub struct DocumentEditor {
    backend: LopdfBackend,
    fonts: FontCache,
    /// Resource name of each font already added to a page.
    registered: HashMap<(PageId, ObjectId), Vec<u8>>,
    overlays: BTreeMap<PageId, Vec<Operation>>,
}

impl DocumentEditor {
    pub fn load_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self::new(LopdfBackend::load_bytes(bytes)?))
    }

    pub fn new(backend: LopdfBackend) -> Self {
        Self {
            backend,
            fonts: FontCache::new(),
            registered: HashMap::new(),
            overlays: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &LopdfBackend {
        &self.backend
    }

    /// Object id of the 0-based `page`, if the document has it.
    pub fn page_id(&self, page: u32) -> Option<PageId> {
        let number = page.checked_add(1)?;
        self.backend.pages().get(&number).copied()
    }

    pub fn page_frame(&self, page_id: PageId) -> Result<PageFrame, PdfError> {
        self.backend.page_frame(page_id)
    }

    /// Text spans of every page, as the document currently reads.
    pub fn spans(&self) -> Result<Vec<TextSpan>, PdfError> {
        extract_all_pages(&self.backend)
    }

    /// The embedded font for `file` (or the base font), embedding it into
    /// this document on first use.
    pub fn font(&mut self, file: Option<&Path>) -> EmbeddedFont {
        self.fonts.font_for(self.backend.raw_doc_mut(), file)
    }

    /// Make `font` available to `page_id` and return its resource name.
    ///
    /// The page gets its own copy of its effective resources (inherited ones
    /// included) so sibling pages sharing a resource dictionary are left
    /// untouched.
    pub fn register_font(
        &mut self,
        page_id: PageId,
        font: &EmbeddedFont,
    ) -> Result<Vec<u8>, PdfError> {
        if let Some(name) = self.registered.get(&(page_id, font.id)) {
            return Ok(name.clone());
        }

        let mut resources = self.effective_resources(page_id)?;
        let mut font_dict = match resources.get(b"Font") {
            Ok(obj) => match self.backend.resolve(obj) {
                Object::Dictionary(dict) => dict.clone(),
                _ => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };

        let mut n = self.registered.len() + 1;
        let name = loop {
            let candidate = format!("{}{}", FONT_RESOURCE_PREFIX, n).into_bytes();
            if !font_dict.has(&candidate) {
                break candidate;
            }
            n += 1;
        };

        font_dict.set(name.clone(), Object::Reference(font.id));
        resources.set("Font", Object::Dictionary(font_dict));
        self.page_dict_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));

        log::debug!(
            "registered {} as /{} on page {:?}",
            font.base_font,
            String::from_utf8_lossy(&name),
            page_id
        );
        self.registered.insert((page_id, font.id), name.clone());
        Ok(name)
    }

    /// Queue operations to draw on top of `page_id`'s content.
    pub fn push_overlay(&mut self, page_id: PageId, ops: Vec<Operation>) {
        self.overlays.entry(page_id).or_default().extend(ops);
    }

    /// Write queued overlays into their pages and serialize the document.
    pub fn save(mut self) -> Result<Vec<u8>, PdfError> {
        let overlays = std::mem::take(&mut self.overlays);
        for (page_id, ops) in overlays {
            self.wrap_page_content(page_id, ops)?;
        }

        let doc = self.backend.raw_doc_mut();
        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| PdfError::Parse(format!("cannot write document: {}", e)))?;
        Ok(out)
    }

    fn wrap_page_content(&mut self, page_id: PageId, ops: Vec<Operation>) -> Result<(), PdfError> {
        let mut suffix = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
        suffix.extend(ops);
        suffix.push(Operation::new("Q", vec![]));

        // Readers join the streams byte for byte; the template's last stream
        // may end mid-line.
        let prefix = encode_ops(vec![Operation::new("q", vec![])])?;
        let mut suffix_data = vec![b'\n'];
        suffix_data.extend(encode_ops(suffix)?);

        let existing = self.existing_contents(page_id)?;
        let doc = self.backend.raw_doc_mut();
        let prefix_id = doc.add_object(Stream::new(Dictionary::new(), prefix));
        let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix_data));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(prefix_id));
        contents.extend(existing);
        contents.push(Object::Reference(suffix_id));

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// The page's content streams as a flat list of objects.
    fn existing_contents(&self, page_id: PageId) -> Result<Vec<Object>, PdfError> {
        let page = self.page_dict(page_id)?;
        let Ok(contents) = page.get(b"Contents") else {
            return Ok(Vec::new());
        };

        Ok(match contents {
            Object::Array(items) => items.clone(),
            Object::Reference(id) => match self.backend.resolve(contents) {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            other => {
                return Err(PdfError::Parse(format!(
                    "page {:?} has unexpected /Contents {:?}",
                    page_id, other
                )))
            }
        })
    }

    /// A detached copy of the resources in effect for `page_id`.
    fn effective_resources(&self, page_id: PageId) -> Result<Dictionary, PdfError> {
        let page = self.page_dict(page_id)?;
        Ok(self
            .backend
            .page_resources(page)
            .map_or_else(Dictionary::new, Clone::clone))
    }

    fn page_dict(&self, page_id: PageId) -> Result<&Dictionary, PdfError> {
        self.backend.page_dict(page_id)
    }

    fn page_dict_mut(&mut self, page_id: PageId) -> Result<&mut Dictionary, PdfError> {
        self.backend
            .raw_doc_mut()
            .get_dictionary_mut(page_id)
            .map_err(|e| PdfError::Parse(format!("cannot get page dictionary: {}", e)))
    }
}

/// Encode operations as a content stream ending in a newline.
fn encode_ops(operations: Vec<Operation>) -> Result<Vec<u8>, PdfError> {
    let mut data = Content { operations }
        .encode()
        .map_err(|e| PdfError::Parse(format!("content stream encode error: {}", e)))?;
    if data.last() != Some(&b'\n') {
        data.push(b'\n');
    }
    Ok(data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Document};

    /// One Letter page with a Helvetica font under `/F1` showing `text` at
    /// (72, 700), with the page tree carrying the resources.
    pub(crate) fn single_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_page_id_is_zero_based() {
        let editor = DocumentEditor::load_bytes(&single_page_pdf("Hi")).unwrap();
        assert!(editor.page_id(0).is_some());
        assert!(editor.page_id(1).is_none());
        assert!(editor.page_id(u32::MAX).is_none());
    }

    #[test]
    fn test_register_font_copies_inherited_resources() {
        let mut editor = DocumentEditor::load_bytes(&single_page_pdf("Hi")).unwrap();
        let page_id = editor.page_id(0).unwrap();
        let font = editor.font(None);

        let name = editor.register_font(page_id, &font).unwrap();
        assert_eq!(name, b"FInv1".to_vec());

        let names: Vec<Vec<u8>> = editor
            .backend()
            .page_fonts(page_id)
            .unwrap()
            .into_iter()
            .map(|font| font.name)
            .collect();
        assert!(names.contains(&b"F1".to_vec()));
        assert!(names.contains(&b"FInv1".to_vec()));
    }

    #[test]
    fn test_register_font_is_memoized() {
        let mut editor = DocumentEditor::load_bytes(&single_page_pdf("Hi")).unwrap();
        let page_id = editor.page_id(0).unwrap();
        let font = editor.font(None);
        let again = editor.font(None);
        assert_eq!(font.id, again.id);

        let first = editor.register_font(page_id, &font).unwrap();
        let second = editor.register_font(page_id, &font).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_wraps_existing_content() {
        let mut editor = DocumentEditor::load_bytes(&single_page_pdf("Hi")).unwrap();
        let page_id = editor.page_id(0).unwrap();
        editor.push_overlay(
            page_id,
            vec![Operation::new("re", vec![0.into(), 0.into(), 10.into(), 10.into()])],
        );
        let bytes = editor.save().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let operators: Vec<&str> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();

        assert_eq!(
            operators,
            vec!["q", "BT", "Tf", "Td", "Tj", "ET", "Q", "q", "re", "Q"]
        );
    }

    #[test]
    fn test_saved_overlay_is_extractable() {
        let mut editor = DocumentEditor::load_bytes(&single_page_pdf("INV-001")).unwrap();
        let page_id = editor.page_id(0).unwrap();
        let font = editor.font(None);
        let name = editor.register_font(page_id, &font).unwrap();
        editor.push_overlay(
            page_id,
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(name), 10.into()]),
                Operation::new("Td", vec![72.into(), 600.into()]),
                Operation::new("Tj", vec![font.encode("INV-002")]),
                Operation::new("ET", vec![]),
            ],
        );
        let bytes = editor.save().unwrap();

        let spans = DocumentEditor::load_bytes(&bytes).unwrap().spans().unwrap();
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["INV-001", "INV-002"]);
        assert!(spans.iter().all(|s| s.font == "Helvetica"));
    }

    #[test]
    fn test_save_without_overlays_keeps_text() {
        let editor = DocumentEditor::load_bytes(&single_page_pdf("INV-001")).unwrap();
        let bytes = editor.save().unwrap();
        let reloaded = DocumentEditor::load_bytes(&bytes).unwrap();
        let spans = reloaded.spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "INV-001");
    }
}
