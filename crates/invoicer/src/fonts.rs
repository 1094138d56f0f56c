use std::path::Path;

use invoicer_core::fonts::FontMap;

use crate::error::Error;

/// Build the font map from `--fonts` (a JSON object of name to path) or
/// `--font-dir` (every `.ttf`/`.otf` in the directory). With neither, the
/// map is empty and inserted text falls back to Helvetica.
pub async fn load_font_map(
    fonts: Option<&Path>,
    font_dir: Option<&Path>,
) -> Result<FontMap, Error> {
    match (fonts, font_dir) {
        (Some(file), _) => from_json_file(file).await,
        (None, Some(dir)) => from_dir(dir).await,
        (None, None) => Ok(FontMap::new()),
    }
}

async fn from_json_file(path: &Path) -> Result<FontMap, Error> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| {
            Error::Config(format!(
                "Failed to read font map '{}': {}",
                path.display(),
                e
            ))
        })?;
    let map: FontMap = serde_json::from_str(&text)
        .map_err(|e| Error::Config(format!("Invalid font map '{}': {}", path.display(), e)))?;
    Ok(map.with_default_fallback())
}

async fn from_dir(dir: &Path) -> Result<FontMap, Error> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Config(format!("Failed to read font dir '{}': {}", dir.display(), e)))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();

    let map = FontMap::from_font_files(paths);
    log::info!("loaded {} fonts from {}", map.len(), dir.display());
    Ok(map)
}
