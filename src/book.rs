//! Whole-book build driver.
//!
//! Walks the chapter tree, renders every listed chapter, and assembles the
//! static output: HTML pages, the generated highlight stylesheet, the
//! copied styles directory, and each chapter's `res/` and `code/` assets.

use crate::bibtex::Bibliography;
use crate::config::BookConfig;
use crate::error::{Error, Result};
use crate::highlight::Highlighter;
use crate::render::ChapterRenderer;
use crate::toc::{normalize_output_path, TocIndex};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a build did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Chapters rendered to HTML.
    pub rendered: usize,
    /// Chapters skipped because the summary does not list them.
    pub skipped: usize,
}

pub struct BookBuilder {
    config: BookConfig,
    /// Book source root; every configured path resolves against it.
    root: PathBuf,
}

impl BookBuilder {
    pub fn new(config: BookConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    /// Build the whole book. Fails fast on unreadable inputs, malformed
    /// summary entries, unknown themes, and broken snippet imports;
    /// chapters missing from the summary are skipped, not failed.
    pub fn build(&self) -> Result<BuildSummary> {
        let summary_text = read_input(&self.root.join(&self.config.summary))?;
        let toc = TocIndex::parse(&summary_text)?;
        log::info!("table of contents: {} entries", toc.len());

        let bibliography = Bibliography::parse(&read_input(
            &self.root.join(&self.config.bibliography),
        )?);
        log::info!("bibliography: {} entries", bibliography.len());

        let highlighter = Highlighter::new(&self.config.theme)?;

        let template = match &self.config.template {
            Some(path) => Some(read_input(&self.root.join(path))?),
            None => None,
        };
        let renderer = ChapterRenderer::new(
            &toc,
            &bibliography,
            &highlighter,
            &self.config.title,
            template,
        )?;

        let out_dir = self.root.join(&self.config.output_dir);
        if out_dir.exists() {
            fs::remove_dir_all(&out_dir)?;
        }
        fs::create_dir_all(out_dir.join(&self.config.content_dir))?;

        fs::write(out_dir.join("highlight.css"), highlighter.theme_css()?)?;

        let styles_dir = self.root.join(&self.config.styles_dir);
        if styles_dir.is_dir() {
            copy_tree(&styles_dir, &out_dir.join(&self.config.styles_dir))?;
        }

        let mut summary = BuildSummary::default();
        for chapter_dir in self.discover_chapters()? {
            if self.render_chapter(&chapter_dir, &renderer, &out_dir)? {
                summary.rendered += 1;
            } else {
                summary.skipped += 1;
            }
        }

        self.render_root_index(&toc, &renderer, &out_dir)?;

        log::info!(
            "build finished: {} chapters rendered, {} skipped",
            summary.rendered,
            summary.skipped
        );
        Ok(summary)
    }

    /// Chapter directories under the content root, sorted by name. Only
    /// plain `[A-Za-z0-9_]+` names count; anything else is not a chapter.
    fn discover_chapters(&self) -> Result<Vec<PathBuf>> {
        let content_dir = self.root.join(&self.config.content_dir);
        let entries = fs::read_dir(&content_dir).map_err(|source| Error::MissingInput {
            path: content_dir.clone(),
            source,
        })?;

        let mut chapters = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                chapters.push(entry.path());
            }
        }
        chapters.sort();
        Ok(chapters)
    }

    /// Render one chapter directory. Returns `Ok(false)` when the chapter
    /// is not in the table of contents.
    fn render_chapter(
        &self,
        chapter_dir: &Path,
        renderer: &ChapterRenderer<'_>,
        out_dir: &Path,
    ) -> Result<bool> {
        let md_file = find_markdown_file(chapter_dir)?;
        let source = read_input(&md_file)?;

        let chapter_name = chapter_dir.file_name().unwrap_or_default().to_string_lossy();
        let file_name = md_file.file_name().unwrap_or_default().to_string_lossy();
        let output_path = normalize_output_path(&format!(
            "{}/{}/{}",
            self.config.content_dir.display(),
            chapter_name,
            file_name
        ));

        log::info!("rendering {output_path}");
        let Some(html) = renderer.render(&source, chapter_dir, &output_path)? else {
            return Ok(false);
        };

        let out_file = out_dir.join(output_path.trim_start_matches('/'));
        let chapter_out = out_file.parent().unwrap_or(out_dir);
        fs::create_dir_all(chapter_out)?;
        fs::write(&out_file, html)?;

        // Per-chapter assets travel with the page
        for assets in ["res", "code"] {
            let src = chapter_dir.join(assets);
            if src.is_dir() {
                copy_tree(&src, &chapter_out.join(assets))?;
            }
        }

        Ok(true)
    }

    /// The root document becomes the site index, rendered even when the
    /// summary does not list it (chapter index 0 in that case).
    fn render_root_index(
        &self,
        toc: &TocIndex,
        renderer: &ChapterRenderer<'_>,
        out_dir: &Path,
    ) -> Result<()> {
        let source = read_input(&self.root.join(&self.config.index))?;
        let index = toc.lookup("/index.html").unwrap_or(0);
        let html = renderer.render_at_index(&source, &self.root, index)?;
        fs::write(out_dir.join("index.html"), html)?;
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::MissingInput {
        path: path.to_path_buf(),
        source,
    })
}

/// The chapter's single markdown source file.
fn find_markdown_file(chapter_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(chapter_dir)
        .map_err(|source| Error::MissingInput {
            path: chapter_dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::MissingChapterSource(chapter_dir.to_path_buf()))
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn sample_book() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            &root.join("SUMMARY.md"),
            "# Summary\n\n* [Intro](contents/intro/README.md)\n",
        );
        write(
            &root.join("literature.bib"),
            "@article{cite1, author = {Ada Alpha}, title = {First}, year = {2001}}\n",
        );
        write(&root.join("README.md"), "# The Book\n\nWelcome.\n");
        write(
            &root.join("contents/intro/README.md"),
            "# Hi [@cite1]\n\nSome $x_i$ math.\n",
        );
        write(&root.join("contents/intro/res/diagram.txt"), "art\n");
        write(&root.join("styles/main.css"), "body { margin: 0 }\n");
        dir
    }

    fn build(root: &Path) -> Result<BuildSummary> {
        BookBuilder::new(BookConfig::default(), root).build()
    }

    #[test]
    fn builds_a_complete_book() {
        let dir = sample_book();
        let summary = build(dir.path()).unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                rendered: 1,
                skipped: 0,
            }
        );

        let out = dir.path().join("_book");
        let chapter = fs::read_to_string(out.join("contents/intro/index.html")).unwrap();
        assert!(chapter.contains("Hi"));
        assert!(chapter.contains("ref-cite1"));
        assert!(chapter.contains("Alpha, 2001"));
        assert!(chapter.contains(r"\(x_i\)"));

        assert!(out.join("index.html").is_file());
        assert!(out.join("highlight.css").is_file());
        assert!(out.join("styles/main.css").is_file());
        assert!(out.join("contents/intro/res/diagram.txt").is_file());
    }

    #[test]
    fn unlisted_chapter_produces_no_output_and_no_error() {
        let dir = sample_book();
        write(
            &dir.path().join("contents/orphan/README.md"),
            "# Orphan chapter\n",
        );

        let summary = build(dir.path()).unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                rendered: 1,
                skipped: 1,
            }
        );
        assert!(!dir.path().join("_book/contents/orphan").exists());
    }

    #[test]
    fn missing_summary_is_fatal_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let err = build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingInput { .. }));
    }

    #[test]
    fn missing_bibliography_is_fatal_at_startup() {
        let dir = sample_book();
        fs::remove_file(dir.path().join("literature.bib")).unwrap();
        let err = build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingInput { .. }));
    }

    #[test]
    fn chapter_without_markdown_is_fatal() {
        let dir = sample_book();
        fs::create_dir_all(dir.path().join("contents/empty")).unwrap();
        let err = build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingChapterSource(_)));
    }

    #[test]
    fn snippet_import_failures_abort_the_build() {
        let dir = sample_book();
        write(
            &dir.path().join("contents/intro/README.md"),
            "# Hi\n\n[import](code/absent.rs)\n",
        );
        let err = build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Snippet(_)));
    }
}
