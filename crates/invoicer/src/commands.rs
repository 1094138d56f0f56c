use std::path::PathBuf;

use colored::Colorize;
use invoicer_core::fields::project_editable_fields;

use crate::prelude::{eprintln, println, *};
use crate::template;

#[derive(Debug, clap::Parser)]
pub struct SpansOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Print JSON instead of a table
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, clap::Parser)]
pub struct FontsOptions {
    /// Path to the PDF file
    pub path: PathBuf,
}

#[derive(Debug, clap::Parser)]
pub struct FieldsOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Where to write the fonts and parsed-fields artifacts (defaults to the
    /// PDF's directory)
    #[clap(long)]
    pub out_dir: Option<PathBuf>,

    /// Print JSON instead of a table
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, clap::Parser)]
pub struct ReplaceOptions {
    /// Path to the template PDF
    pub path: PathBuf,

    /// Where to write the rewritten PDF
    #[clap(short, long)]
    pub output: PathBuf,

    /// JSON object mapping display names to new values
    #[clap(long)]
    pub changes: PathBuf,

    /// Reuse a `<name>_parsed_fields.json` instead of asking the oracle
    #[clap(long)]
    pub fields: Option<PathBuf>,

    /// Where to write the fonts and parsed-fields artifacts (defaults to the
    /// PDF's directory)
    #[clap(long)]
    pub out_dir: Option<PathBuf>,
}

pub async fn spans(options: SpansOptions, _global: crate::Global) -> Result<()> {
    let (spans, _) = template::read_layout(&options.path).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&spans)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Page", "Text", "BBox", "Font", "Size"]);
    for span in &spans {
        table.add_row(prettytable::row![
            span.page,
            &span.text,
            f!(
                "{:.1} {:.1} {:.1} {:.1}",
                span.bbox.x0,
                span.bbox.y0,
                span.bbox.x1,
                span.bbox.y1
            ),
            &span.font,
            f!("{:.1}", span.size)
        ]);
    }
    table.printstd();
    Ok(())
}

pub async fn fonts(options: FontsOptions, _global: crate::Global) -> Result<()> {
    let (_, fonts) = template::read_layout(&options.path).await?;
    for font in fonts {
        println!("{}", font);
    }
    Ok(())
}

pub async fn fields(options: FieldsOptions, global: crate::Global) -> Result<()> {
    let out_dir = options
        .out_dir
        .unwrap_or_else(|| template::default_out_dir(&options.path));

    if global.verbose {
        eprintln!("Ollama URL: {}", global.ollama_url);
        eprintln!("Model: {}", global.model);
        eprintln!("Artifacts: {}", out_dir.display());
    }

    let analysis = template::analyze(&options.path, &out_dir, &global.classifier()).await?;

    if global.verbose {
        eprintln!(
            "{} spans, fonts: {}",
            analysis.spans.len(),
            analysis.fonts.join(", ")
        );
        eprintln!("Oracle fields: {}", analysis.fields.len());
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&analysis.editable)?);
        return Ok(());
    }

    if analysis.editable.is_empty() {
        println!("No editable fields found.");
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Field", "Value", "Page", "Font", "Size"]);
    for field in &analysis.editable {
        let value = &field.value;
        table.add_row(prettytable::row![
            &field.name,
            value.text().unwrap_or_default(),
            value.page.map(|p| p.to_string()).unwrap_or_default(),
            value.font.as_deref().unwrap_or_default(),
            value.size.map(|s| f!("{:.1}", s)).unwrap_or_default()
        ]);
    }
    table.printstd();
    Ok(())
}

pub async fn replace(options: ReplaceOptions, global: crate::Global) -> Result<()> {
    let out_dir = options
        .out_dir
        .unwrap_or_else(|| template::default_out_dir(&options.path));
    let font_map =
        crate::fonts::load_font_map(global.fonts.as_deref(), global.font_dir.as_deref()).await?;
    let changes = template::load_changes(&options.changes).await?;

    if global.verbose {
        eprintln!("Template: {}", options.path.display());
        eprintln!("Output: {}", options.output.display());
        eprintln!("Fonts mapped: {}", font_map.len());
        eprintln!("Changes requested: {}", changes.len());
    }

    let editable = match &options.fields {
        Some(saved) => {
            let fields = template::load_fields(saved)
                .await
                .wrap_err_with(|| f!("Failed to load fields from '{}'", saved.display()))?;
            project_editable_fields(&fields)
        }
        None => {
            template::analyze(&options.path, &out_dir, &global.classifier())
                .await?
                .editable
        }
    };

    let result = template::replace(
        &options.path,
        &options.output,
        &editable,
        &changes,
        &font_map,
        global.insertion_style(),
    )
    .await?;

    let summary = f!(
        "Changed {} of {} field(s) -> {}",
        result.changed_count,
        result.fields_found.len(),
        options.output.display()
    );
    if result.changed_count > 0 {
        eprintln!("{}", summary.green());
    } else {
        eprintln!("{}", summary.yellow());
    }
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
