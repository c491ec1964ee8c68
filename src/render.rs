//! Chapter rendering: pipeline orchestration and page templating.
//!
//! The renderer owns nothing mutable: the table of contents, bibliography,
//! and highlighter are shared read-only, and a fresh stage pipeline is
//! built per chapter.

use crate::bibtex::Bibliography;
use crate::error::{RenderError, Result};
use crate::highlight::Highlighter;
use crate::pipeline::{Pipeline, StageContext};
use crate::toc::TocIndex;
use minijinja::{context, Environment};
use std::path::Path;

/// Default page template, compiled in. A `book.toml` may point at a custom
/// one with the same slots: `content`, `toc`, `index`, `title`, `book`.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/page.html");

pub struct ChapterRenderer<'a> {
    toc: &'a TocIndex,
    bibliography: &'a Bibliography,
    highlighter: &'a Highlighter,
    book_title: &'a str,
    env: Environment<'static>,
}

impl<'a> ChapterRenderer<'a> {
    pub fn new(
        toc: &'a TocIndex,
        bibliography: &'a Bibliography,
        highlighter: &'a Highlighter,
        book_title: &'a str,
        template: Option<String>,
    ) -> Result<Self> {
        let mut env = Environment::new();
        match template {
            Some(source) => env
                .add_template_owned("page".to_string(), source)
                .map_err(RenderError::Template)?,
            None => env
                .add_template("page", DEFAULT_TEMPLATE)
                .map_err(RenderError::Template)?,
        }
        Ok(Self {
            toc,
            bibliography,
            highlighter,
            book_title,
            env,
        })
    }

    /// Render one chapter document.
    ///
    /// Returns `Ok(None)` when `output_path` is not listed in the table of
    /// contents: the chapter is skipped, producing no output and no error.
    pub fn render(
        &self,
        source: &str,
        chapter_dir: &Path,
        output_path: &str,
    ) -> Result<Option<String>> {
        let Some(index) = self.toc.lookup(output_path) else {
            log::warn!("{output_path} is not in the table of contents, skipping");
            return Ok(None);
        };
        self.render_at_index(source, chapter_dir, index).map(Some)
    }

    /// Render with an explicit chapter index. Used for the root index page,
    /// which renders even when the summary does not list it.
    pub fn render_at_index(
        &self,
        source: &str,
        chapter_dir: &Path,
        index: usize,
    ) -> Result<String> {
        let mut pipeline = Pipeline::standard();
        let mut ctx = StageContext::new(chapter_dir, self.bibliography, self.highlighter);
        let body = pipeline.run(source.to_string(), &mut ctx)?;

        let title = self
            .toc
            .get(index)
            .map_or(self.book_title, |entry| entry.title.as_str());

        let template = self.env.get_template("page").map_err(RenderError::Template)?;
        let html = template
            .render(context! {
                content => body,
                toc => self.toc.entries(),
                index => index,
                title => title,
                book => self.book_title,
            })
            .map_err(RenderError::Template)?;
        Ok(html)
    }
}
