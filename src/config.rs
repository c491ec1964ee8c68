//! Book configuration, read from `book.toml`.
//!
//! Every field has a default, so a missing file or an empty `[book]` table
//! builds the conventional layout: chapters under `contents/`, summary in
//! `SUMMARY.md`, bibliography in `literature.bib`, output in `_book/`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    book: BookConfig,
}

/// Build-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Book title, shown by the page template.
    pub title: String,
    /// Directory holding one subdirectory per chapter.
    pub content_dir: PathBuf,
    /// Summary listing that defines the table of contents.
    pub summary: PathBuf,
    /// Root document rendered to the site index.
    pub index: PathBuf,
    /// BibTeX database for citation resolution.
    pub bibliography: PathBuf,
    /// Output directory; recreated on every build.
    pub output_dir: PathBuf,
    /// Stylesheet directory copied verbatim into the output.
    pub styles_dir: PathBuf,
    /// Syntax-highlighting theme name.
    pub theme: String,
    /// Page template path; the embedded default is used when absent.
    pub template: Option<PathBuf>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            title: "Book".to_string(),
            content_dir: PathBuf::from("contents"),
            summary: PathBuf::from("SUMMARY.md"),
            index: PathBuf::from("README.md"),
            bibliography: PathBuf::from("literature.bib"),
            output_dir: PathBuf::from("_book"),
            styles_dir: PathBuf::from("styles"),
            theme: "InspiredGitHub".to_string(),
            template: None,
        }
    }
}

impl BookConfig {
    /// Load configuration from `path`. A missing file yields the defaults;
    /// an unreadable or invalid file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| Error::MissingInput {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text)?;
        Ok(file.book)
    }
}
