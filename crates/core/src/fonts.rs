//! Font-map resolution: from a document font name to an embeddable font file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reserved font-map key used when nothing else matches.
pub const DEFAULT_FONT_KEY: &str = "default";

/// Font file extensions accepted by [`FontMap::from_font_files`].
const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Strip a PDF subset prefix (`ABCDEF+Helvetica` -> `Helvetica`).
pub fn normalize_font_name(name: &str) -> &str {
    name.rsplit('+').next().unwrap_or(name)
}

/// Distinct normalized font names, sorted.
pub fn distinct_font_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| normalize_font_name(n.as_ref()).to_string())
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Logical font name to font file, owned by one document owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontMap(BTreeMap<String, PathBuf>);

impl FontMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from font files: each `.ttf`/`.otf` is keyed by its file
    /// stem, other files are ignored. A `default` entry is added when missing.
    pub fn from_font_files<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut map = FontMap::new();
        for path in paths {
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if !is_font {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                map.insert(stem.to_string(), path.clone());
            }
        }
        map.with_default_fallback()
    }

    /// Ensure a `default` entry exists, using the first font in key order.
    pub fn with_default_fallback(mut self) -> Self {
        if !self.0.contains_key(DEFAULT_FONT_KEY) {
            if let Some(first) = self.0.values().next().cloned() {
                self.0.insert(DEFAULT_FONT_KEY.to_string(), first);
            }
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.0.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.0.get(name).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a document font name to a font file.
    ///
    /// Tries an exact key match (raw, then normalized), then the first key
    /// contained case-insensitively in the normalized name, then `default`.
    /// `None` means the caller should use a built-in base font.
    pub fn resolve(&self, font_name: &str) -> Option<&Path> {
        let normalized = normalize_font_name(font_name);
        if let Some(path) = self.get(font_name).or_else(|| self.get(normalized)) {
            return Some(path);
        }

        let lowered = normalized.to_lowercase();
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != DEFAULT_FONT_KEY && !key.is_empty())
            .find(|(key, _)| lowered.contains(&key.to_lowercase()))
            .map(|(_, path)| path.as_path())
            .or_else(|| self.get(DEFAULT_FONT_KEY))
    }
}
