//! Error types for the bookforge library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
///
/// Two conditions are deliberately *not* errors: a chapter whose output path
/// is absent from the summary listing (the renderer returns `Ok(None)` and
/// the build moves on), and a citation key missing from the bibliography
/// (the marker is rendered visibly flagged). Everything else aborts the
/// build.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    #[error("Snippet error: {0}")]
    Snippet(#[from] SnippetError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Cannot read {}: {}", .path.display(), .source)]
    MissingInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chapter directory {} contains no markdown file", .0.display())]
    MissingChapterSource(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing the summary listing.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Malformed summary entry at line {line}: {text:?}")]
    MalformedEntry { line: usize, text: String },

    #[error("Summary entry at line {line} jumps to nesting level {level} from {previous}")]
    IndentJump {
        line: usize,
        level: usize,
        previous: usize,
    },

    #[error("Duplicate output path in summary: {0}")]
    DuplicatePath(String),
}

/// Errors raised while importing code snippets.
#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("Missing snippet file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid snippet line range {spec:?} for a {lines}-line file")]
    InvalidRange { spec: String, lines: usize },
}

/// Errors raised while rendering a page.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Highlighting error: {0}")]
    Highlight(#[from] syntect::Error),

    #[error("Unknown highlight theme: {0}")]
    UnknownTheme(String),
}
