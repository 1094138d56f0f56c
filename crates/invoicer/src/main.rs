#![allow(unused)]

use std::path::PathBuf;
use std::time::Duration;

use crate::prelude::*;
use clap::Parser;

mod classifier;
mod commands;
mod error;
mod fonts;
mod prelude;
mod template;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Find the editable fields of invoice template PDFs and rewrite them in place"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Ollama base URL
    #[clap(long, env = "OLLAMA_URL", global = true, default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Model name for field classification
    #[clap(long, env = "INVOICER_MODEL", global = true, default_value = "llama3.1")]
    model: String,

    /// Seconds to wait for one oracle answer
    #[clap(long, env = "INVOICER_ORACLE_TIMEOUT", global = true, default_value = "120")]
    oracle_timeout: u64,

    /// Extra oracle attempts after a failure
    #[clap(long, env = "INVOICER_ORACLE_RETRIES", global = true, default_value = "2")]
    oracle_retries: u32,

    /// JSON object mapping font names to font files
    #[clap(long, global = true, conflicts_with = "font_dir")]
    fonts: Option<PathBuf>,

    /// Directory of .ttf/.otf files, keyed by file stem
    #[clap(long, global = true)]
    font_dir: Option<PathBuf>,

    /// Extra margin around the painted-over box
    #[clap(long, global = true, default_value = "1.0")]
    padding: f32,

    /// Distance from the bottom of the box up to the new baseline
    #[clap(long, global = true, default_value = "2.0")]
    baseline_offset: f32,

    /// Whether to display additional information.
    #[clap(long, env = "INVOICER_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    pub fn classifier(&self) -> crate::classifier::OllamaClassifier {
        crate::classifier::OllamaClassifier {
            ollama_url: self.ollama_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.oracle_timeout),
            retries: self.oracle_retries,
        }
    }

    pub fn insertion_style(&self) -> pdf::InsertionStyle {
        pdf::InsertionStyle {
            padding: self.padding,
            baseline_offset: self.baseline_offset,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Print the positioned text spans of a PDF
    Spans(crate::commands::SpansOptions),

    /// List the fonts a PDF uses
    Fonts(crate::commands::FontsOptions),

    /// Classify a PDF and print its editable fields
    Fields(crate::commands::FieldsOptions),

    /// Rewrite the given fields of a PDF
    Replace(crate::commands::ReplaceOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Spans(options) => crate::commands::spans(options, app.global).await,
        SubCommands::Fonts(options) => crate::commands::fonts(options, app.global).await,
        SubCommands::Fields(options) => crate::commands::fields(options, app.global).await,
        SubCommands::Replace(options) => crate::commands::replace(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
