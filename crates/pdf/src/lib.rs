//! Document I/O for invoicer: positional text extraction, exact value
//! re-localization, font embedding and redact-and-reinsert editing, all on
//! top of `lopdf`.

use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};

pub mod editor;
pub mod parser;
pub mod search;

pub use editor::redact::{apply_replacements, AppliedReplacements, InsertionStyle};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Font error: {0}")]
    Font(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extract the positioned text spans of every page.
pub fn extract_spans(bytes: &[u8]) -> Result<Vec<invoicer_core::layout::TextSpan>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    parser::layout::extract_all_pages(&backend)
}

/// Distinct normalized base-font names used by the document's pages.
pub fn list_fonts(bytes: &[u8]) -> Result<Vec<String>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    let mut names = Vec::new();
    for (_, page_id) in backend.pages() {
        for font in backend.page_fonts(page_id)? {
            if let Some(base) = font.base_font {
                names.push(base);
            }
        }
    }
    Ok(invoicer_core::fonts::distinct_font_names(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::tests::single_page_pdf;

    #[test]
    fn test_extract_spans() {
        let spans = extract_spans(&single_page_pdf("Invoice")).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Invoice");
        assert_eq!(spans[0].font, "Helvetica");
        assert!((spans[0].size - 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_extract_spans_rejects_garbage() {
        assert!(matches!(extract_spans(b"not a pdf"), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_list_fonts() {
        assert_eq!(
            list_fonts(&single_page_pdf("x")).unwrap(),
            vec!["Helvetica".to_string()]
        );
    }

    #[test]
    fn test_list_fonts_includes_inserted_fonts() {
        let mut editor = editor::DocumentEditor::load_bytes(&single_page_pdf("x")).unwrap();
        let page_id = editor.page_id(0).unwrap();
        let font = editor.font(None);
        editor.register_font(page_id, &font).unwrap();
        let bytes = editor.save().unwrap();

        // Both resources name Helvetica, so it is listed once.
        assert_eq!(list_fonts(&bytes).unwrap(), vec!["Helvetica".to_string()]);
    }
}
