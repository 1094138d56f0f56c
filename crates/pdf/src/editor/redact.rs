//! Redact-and-reinsert text surgery.
//!
//! Each planned field is handled on its own: its box is re-located in the
//! page text (falling back to the oracle box), painted over with an opaque
//! white rectangle, and the new value is drawn as a single left-aligned line
//! in the resolved font at the original size. Nothing is wrapped or fitted.

use std::collections::BTreeMap;

use invoicer_core::fields::ReplacementPlan;
use invoicer_core::fonts::{FontMap, DEFAULT_FONT_KEY};
use invoicer_core::layout::BBox;
use lopdf::content::Operation;
use lopdf::Object;

use super::DocumentEditor;
use crate::parser::backend::PageFrame;
use crate::search::find_text_bbox;
use crate::PdfError;

/// Geometry tunables for the cover rectangle and the inserted baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionStyle {
    /// Grow the cover rectangle by this much on every side.
    pub padding: f32,
    /// Distance from the bottom of the box up to the new baseline.
    pub baseline_offset: f32,
}

impl Default for InsertionStyle {
    fn default() -> Self {
        Self {
            padding: 1.0,
            baseline_offset: 2.0,
        }
    }
}

/// What a replacement pass actually wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedReplacements {
    pub changed_count: usize,
    pub fields_changed: BTreeMap<String, String>,
}

/// Apply `plan` to the document in `bytes` and return the rewritten bytes.
///
/// Entries with an empty new value, an unknown page, or no locatable box are
/// skipped with a warning. A font file that cannot be embedded falls back to
/// Helvetica.
pub fn apply_replacements(
    bytes: &[u8],
    plan: &ReplacementPlan,
    fonts: &FontMap,
    style: InsertionStyle,
) -> Result<(Vec<u8>, AppliedReplacements), PdfError> {
    let mut editor = DocumentEditor::load_bytes(bytes)?;
    let spans = editor.spans()?;
    let mut applied = AppliedReplacements::default();

    for entry in plan {
        if entry.new.is_empty() {
            log::warn!("'{}': empty replacement value, skipping", entry.field);
            continue;
        }
        let Some(page_id) = editor.page_id(entry.page) else {
            log::warn!("'{}': page {} does not exist, skipping", entry.field, entry.page);
            continue;
        };
        let Some(bbox) = find_text_bbox(&spans, entry.page, &entry.old).or(entry.bbox) else {
            log::warn!(
                "'{}': {:?} not found on page {} and no box reported, skipping",
                entry.field,
                entry.old,
                entry.page
            );
            continue;
        };

        let file = match &entry.font {
            Some(name) => fonts.resolve(name),
            None => fonts.get(DEFAULT_FONT_KEY),
        };
        let font = editor.font(file);
        let resource = editor.register_font(page_id, &font)?;
        let frame = editor.page_frame(page_id)?;

        let ops = overlay_ops(
            &frame,
            &bbox,
            style,
            &resource,
            entry.size,
            font.encode(&entry.new),
        );
        editor.push_overlay(page_id, ops);

        log::debug!(
            "'{}': {:?} -> {:?} at {:?} in {}",
            entry.field,
            entry.old,
            entry.new,
            bbox,
            font.base_font
        );
        applied.changed_count += 1;
        applied
            .fields_changed
            .insert(entry.field.clone(), entry.new.clone());
    }

    let out = editor.save()?;
    log::info!("applied {} of {} replacements", applied.changed_count, plan.len());
    Ok((out, applied))
}

/// Operations painting over `bbox` and drawing `text` in its place.
///
/// `bbox` is in layout coordinates; the operations are in the page's user
/// space.
pub fn overlay_ops(
    frame: &PageFrame,
    bbox: &BBox,
    style: InsertionStyle,
    font_resource: &[u8],
    size: f32,
    text: Object,
) -> Vec<Operation> {
    let cover = bbox.padded(style.padding);
    let (rx, ry) = frame.to_user(cover.x0, cover.y1);
    let (tx, ty) = frame.to_user(bbox.x0, bbox.y1 - style.baseline_offset);

    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![1.into(), 1.into(), 1.into()]),
        Operation::new(
            "re",
            vec![rx.into(), ry.into(), cover.width().into(), cover.height().into()],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_resource.to_vec()), size.into()],
        ),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), tx.into(), ty.into()],
        ),
        Operation::new("Tj", vec![text]),
        Operation::new("ET", vec![]),
    ]
}
