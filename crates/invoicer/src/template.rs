//! The template pipeline: layout -> oracle -> editable fields, and
//! editable fields + changes -> rewritten document.
//!
//! Document work is synchronous and runs on the blocking pool; every value
//! here is owned by one call.

use std::path::{Path, PathBuf};

use invoicer_core::fields::{
    fields_found, plan_replacements, project_editable_fields, Changes, EditableField, FieldMap,
    ReplacementResult,
};
use invoicer_core::fonts::FontMap;
use invoicer_core::layout::TextSpan;
use pdf::InsertionStyle;

use crate::classifier::FieldClassifier;
use crate::error::Error;

/// Everything learned about a template before any edit.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub spans: Vec<TextSpan>,
    pub fonts: Vec<String>,
    pub fields: FieldMap,
    pub editable: Vec<EditableField>,
}

/// Where the side artifacts of a template land.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub fonts: PathBuf,
    pub fields: PathBuf,
}

impl ArtifactPaths {
    /// `<out_dir>/<stem>_extracted_fonts.txt` and
    /// `<out_dir>/<stem>_parsed_fields.json` for the template at `input`.
    pub fn new(input: &Path, out_dir: &Path) -> Self {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template");
        Self {
            fonts: out_dir.join(format!("{}_extracted_fonts.txt", stem)),
            fields: out_dir.join(format!("{}_parsed_fields.json", stem)),
        }
    }
}

/// Directory artifacts go to when none is given: next to the input.
pub fn default_out_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, pdf::PdfError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Generic(format!("document task failed: {}", e)))?
        .map_err(Error::from)
}

/// Read the positioned spans and the font names of the template at `input`.
pub async fn read_layout(input: &Path) -> Result<(Vec<TextSpan>, Vec<String>), Error> {
    let bytes = tokio::fs::read(input).await?;
    blocking(move || Ok((pdf::extract_spans(&bytes)?, pdf::list_fonts(&bytes)?))).await
}

/// Extract spans and fonts, classify, and project the editable fields.
///
/// The fonts and the raw field map are written as artifacts into `out_dir`.
pub async fn analyze<C: FieldClassifier>(
    input: &Path,
    out_dir: &Path,
    classifier: &C,
) -> Result<Analysis, Error> {
    let (spans, fonts) = read_layout(input).await?;
    log::info!(
        "{}: {} spans, {} fonts",
        input.display(),
        spans.len(),
        fonts.len()
    );

    let artifacts = ArtifactPaths::new(input, out_dir);
    tokio::fs::create_dir_all(out_dir).await?;
    tokio::fs::write(&artifacts.fonts, fonts_artifact(&fonts)).await?;

    let fields = classifier.classify(&spans).await?;
    tokio::fs::write(&artifacts.fields, serde_json::to_string_pretty(&fields)?).await?;

    let editable = project_editable_fields(&fields);
    log::info!("{} editable fields", editable.len());

    Ok(Analysis {
        spans,
        fonts,
        fields,
        editable,
    })
}

fn fonts_artifact(fonts: &[String]) -> String {
    fonts.iter().map(|f| format!("{}\n", f)).collect()
}

/// Load a field map saved by a previous [`analyze`] run.
pub async fn load_fields(path: &Path) -> Result<FieldMap, Error> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Load caller changes from a JSON object file.
pub async fn load_changes(path: &Path) -> Result<Changes, Error> {
    let text = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Config(format!("Invalid changes '{}': {}", path.display(), e)))
}

/// Apply `changes` to the template at `input` and write the result to
/// `output`.
///
/// When nothing needs to change the input is copied byte for byte.
pub async fn replace(
    input: &Path,
    output: &Path,
    editable: &[EditableField],
    changes: &Changes,
    fonts: &FontMap,
    style: InsertionStyle,
) -> Result<ReplacementResult, Error> {
    let found = fields_found(editable);
    let plan = plan_replacements(editable, changes);
    let bytes = tokio::fs::read(input).await?;

    if plan.is_empty() {
        log::info!("nothing to change, copying {}", input.display());
        tokio::fs::write(output, &bytes).await?;
        return Ok(ReplacementResult {
            changed_count: 0,
            fields_found: found,
            fields_changed: Default::default(),
        });
    }

    log::info!("applying {} planned replacements", plan.len());
    let fonts = fonts.clone();
    let (out, applied) =
        blocking(move || pdf::apply_replacements(&bytes, &plan, &fonts, style)).await?;
    tokio::fs::write(output, out).await?;

    Ok(ReplacementResult {
        changed_count: applied.changed_count,
        fields_found: found,
        fields_changed: applied.fields_changed,
    })
}
