//! Table-of-contents indexing from the book's summary listing.
//!
//! The summary is a nested list, one chapter per line:
//!
//! ```text
//! # Summary
//!
//! * [Introduction](contents/intro/README.md)
//!     * [Details](contents/intro/details.md)
//! * [Sorting](contents/sorting/README.md)
//! ```
//!
//! The first two lines and the trailing line are header/footer and are not
//! parsed. Indent is measured in spaces, four per nesting level.

use crate::error::{Result, SummaryError};
use serde::Serialize;
use std::collections::HashMap;

/// Spaces per nesting level in the summary listing.
const INDENT_UNIT: usize = 4;

/// One chapter entry, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub title: String,
    /// Site-rooted output path, e.g. `/contents/intro/index.html`.
    pub output_path: String,
    /// Nesting depth, root entries at 0.
    pub level: usize,
}

/// Ordered chapter listing with exact-path index lookup.
///
/// Built once per build run and shared read-only with every chapter render.
#[derive(Debug, Clone, Default)]
pub struct TocIndex {
    entries: Vec<TocEntry>,
    by_path: HashMap<String, usize>,
}

impl TocIndex {
    /// Parse the summary listing.
    ///
    /// Every body line must have the shape `<indent>* [Title](path)`.
    /// Nesting may deepen by at most one level per entry, and output paths
    /// must be unique.
    pub fn parse(summary: &str) -> Result<Self> {
        let lines: Vec<&str> = summary.split('\n').collect();
        let mut index = TocIndex::default();

        if lines.len() < 4 {
            return Ok(index);
        }

        let mut previous_level: Option<usize> = None;
        for (offset, raw) in lines[2..lines.len() - 1].iter().enumerate() {
            let line = offset + 3;
            let (title, link, level) =
                parse_entry_line(raw).ok_or_else(|| SummaryError::MalformedEntry {
                    line,
                    text: (*raw).to_string(),
                })?;

            let deepest_allowed = previous_level.map_or(0, |p| p + 1);
            if level > deepest_allowed {
                return Err(SummaryError::IndentJump {
                    line,
                    level,
                    previous: previous_level.unwrap_or(0),
                }
                .into());
            }
            previous_level = Some(level);

            let output_path = normalize_output_path(link);
            let position = index.entries.len();
            if index.by_path.insert(output_path.clone(), position).is_some() {
                return Err(SummaryError::DuplicatePath(output_path).into());
            }
            index.entries.push(TocEntry {
                title: title.to_string(),
                output_path,
                level,
            });
        }

        Ok(index)
    }

    /// Chapter index of an output path, or `None` when the chapter is not
    /// listed. `None` means "do not render", never an error.
    pub fn lookup(&self, output_path: &str) -> Option<usize> {
        self.by_path.get(output_path).copied()
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TocEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split one body line into `(title, link, level)`.
fn parse_entry_line(raw: &str) -> Option<(&str, &str, usize)> {
    let indent = raw.len() - raw.trim_start_matches(' ').len();
    let rest = &raw[indent..];

    let rest = rest.strip_prefix("* ")?;
    let rest = rest.strip_prefix('[')?;
    let (title, rest) = rest.split_once("](")?;
    let link = rest.trim_end().strip_suffix(')')?;
    if title.is_empty() || link.is_empty() {
        return None;
    }

    Some((title, link, indent / INDENT_UNIT))
}

/// Normalize a summary link into the site-rooted output path: `.md` becomes
/// `.html`, the `README` root document becomes `index`, and the path gains a
/// leading `/`.
pub fn normalize_output_path(link: &str) -> String {
    let mut path = link.trim().trim_start_matches('/').to_string();
    if let Some(stem) = path.strip_suffix(".md") {
        path = format!("{stem}.html");
    }
    if path == "README.html" {
        path = "index.html".to_string();
    } else if let Some(dir) = path.strip_suffix("/README.html") {
        path = format!("{dir}/index.html");
    }
    format!("/{path}")
}
