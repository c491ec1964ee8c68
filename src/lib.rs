//! # bookforge
//!
//! Build a static, cross-linked HTML book from a tree of academic Markdown
//! chapters: math, citations, and imported code snippets.
//!
//! ## Book Layout
//!
//! A book source directory looks like:
//!
//! ```text
//! book.toml          optional configuration
//! SUMMARY.md         table of contents listing
//! README.md          root document, becomes index.html
//! literature.bib     BibTeX bibliography
//! styles/            copied verbatim into the output
//! contents/
//!     intro/
//!         README.md  chapter source
//!         res/       chapter assets, copied verbatim
//!         code/      snippet sources for import directives
//! ```
//!
//! ## Features
//!
//! - **Math**: inline `$...$` and display `$$...$$`, passed through intact
//!   for client-side MathJax rendering
//! - **Citations**: `[@key]` markers resolved against the bibliography,
//!   with a generated references section per chapter
//! - **Snippet imports**: `[import:3-5, lang:"rust"](code/file.rs)` inlines
//!   highlighted code from the chapter directory
//! - **Inline extras**: `==mark==`, `^sup^`, `~sub~` beyond base markdown
//! - **Server-side highlighting**: fenced code rendered through syntect,
//!   styled by one generated stylesheet
//! - **Navigation**: every page receives the numbered table of contents
//!   derived from `SUMMARY.md`
//!
//! ## Quick Start
//!
//! ```no_run
//! use bookforge::build;
//!
//! let summary = build(".")?;
//! println!("{} chapters rendered", summary.rendered);
//! # Ok::<(), bookforge::Error>(())
//! ```
//!
//! ## Pipeline
//!
//! Each chapter runs through a fixed sequence of text transforms, declared
//! in [`pipeline::Pipeline::standard`]: fence normalization, markdown
//! conversion, math protection, inline extras, citation resolution,
//! snippet import, and math restoration. Ordering matters: math spans are
//! shielded behind placeholder tokens while the later stages run, and the
//! literal content only returns once nothing can disturb it.

pub mod bibtex;
pub mod book;
pub mod config;
pub mod error;
pub mod highlight;
pub mod pipeline;
pub mod render;
pub mod toc;

// Convenience re-exports
pub use bibtex::{BibEntry, Bibliography};
pub use book::{BookBuilder, BuildSummary};
pub use config::BookConfig;
pub use error::{Error, RenderError, Result, SnippetError, SummaryError};
pub use highlight::Highlighter;
pub use pipeline::{Pipeline, StageContext};
pub use render::ChapterRenderer;
pub use toc::{TocEntry, TocIndex};

use std::path::Path;

/// Build the book rooted at `root`, reading `book.toml` from it when
/// present.
///
/// This is the library entry point the CLI wraps: load configuration,
/// then run a [`BookBuilder`].
pub fn build(root: impl AsRef<Path>) -> Result<BuildSummary> {
    let root = root.as_ref();
    let config = BookConfig::load(&root.join("book.toml"))?;
    BookBuilder::new(config, root).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter_dir_with_code() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("code")).unwrap();
        std::fs::write(
            dir.path().join("code/demo.rs"),
            "fn demo() {}\nfn more() {}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn full_pipeline_renders_every_feature() {
        let bib = Bibliography::parse(
            "@article{knuth1984, author = {Donald E. Knuth}, title = {Literate Programming}, year = {1984}}",
        );
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let dir = chapter_dir_with_code();

        let source = "\
# Title

Math $E = mc^2$ and ==marked== text with [@knuth1984].

```py
print('hi')
```

[import:1-1](code/demo.rs)
";
        let mut pipeline = Pipeline::standard();
        let mut ctx = StageContext::new(dir.path(), &bib, &highlighter);
        let html = pipeline.run(source.to_string(), &mut ctx).unwrap();

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains(r"\(E = mc^2\)"));
        assert!(html.contains("<mark>marked</mark>"));
        assert!(html.contains("Knuth, 1984"));
        assert!(html.contains("class=\"references\""));
        assert!(html.contains("language-python"));
        assert!(html.contains("demo"));
        assert!(!html.contains("more"));
    }

    #[test]
    fn math_survives_markdown_mangling_end_to_end() {
        let bib = Bibliography::default();
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let source = "Indices $x_1 + x_2$ and comparisons $a < b$ hold.\n";
        let mut pipeline = Pipeline::standard();
        let mut ctx = StageContext::new(dir.path(), &bib, &highlighter);
        let html = pipeline.run(source.to_string(), &mut ctx).unwrap();

        assert!(html.contains(r"\(x_1 + x_2\)"));
        assert!(html.contains(r"\(a &lt; b\)"));
    }

    #[test]
    fn stages_do_not_interfere_with_each_other() {
        let bib = Bibliography::default();
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let dir = tempfile::tempdir().unwrap();

        // Dollars, citation markers, and creative markers inside a fence
        // belong to the code, not to the later stages.
        let source = "```text\necho $HOME ==x== [@nope]\n```\n";
        let mut pipeline = Pipeline::standard();
        let mut ctx = StageContext::new(dir.path(), &bib, &highlighter);
        let html = pipeline.run(source.to_string(), &mut ctx).unwrap();

        assert!(html.contains("$HOME"));
        assert!(html.contains("==x=="));
        assert!(html.contains("[@nope]"));
        assert!(!html.contains("<mark>"));
        assert!(!html.contains("unresolved"));
    }
}
