//! The chapter rendering pipeline.
//!
//! A chapter is transformed by a fixed sequence of text-to-text stages. The
//! ordering is load-bearing (math protection must follow markdown
//! conversion, citation markers must survive markdown untouched, restore
//! runs last) so it is declared in one place, [`Pipeline::standard`], rather
//! than encoded implicitly in call sequence.

pub mod citations;
pub mod code_blocks;
pub mod creative;
pub mod markdown;
pub mod math;
pub mod snippets;

pub use citations::CitationResolver;
pub use code_blocks::CodeBlockPreprocessor;
pub use creative::CreativeFormatter;
pub use markdown::MarkdownStage;
pub use math::{MathProtector, MathSpan};
pub use snippets::SnippetImporter;

use crate::bibtex::Bibliography;
use crate::error::Result;
use crate::highlight::Highlighter;
use std::path::Path;

/// Per-render state threaded through the stages.
pub struct StageContext<'a> {
    /// Chapter source directory; snippet paths and chapter-local
    /// bibliographies resolve against it.
    pub chapter_dir: &'a Path,
    pub bibliography: &'a Bibliography,
    pub highlighter: &'a Highlighter,
    /// Math spans captured by the protect stage, spliced back by restore.
    pub math_spans: Vec<MathSpan>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        chapter_dir: &'a Path,
        bibliography: &'a Bibliography,
        highlighter: &'a Highlighter,
    ) -> Self {
        Self {
            chapter_dir,
            bibliography,
            highlighter,
            math_spans: Vec::new(),
        }
    }
}

/// One named text-to-text transform.
///
/// Stages must be idempotent with respect to markup they do not understand:
/// content owned by another stage (code regions, math placeholders) passes
/// through byte-for-byte.
pub trait Stage {
    fn name(&self) -> &'static str;
    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String>;
}

/// An ordered list of stages. Stage structs are built fresh per chapter, so
/// no state can leak across renders.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// The canonical chapter pipeline, in its required order.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Box::new(CodeBlockPreprocessor),
                Box::new(MarkdownStage::new()),
                Box::new(math::ProtectMath),
                Box::new(CreativeFormatter),
                Box::new(CitationResolver),
                Box::new(SnippetImporter),
                Box::new(math::RestoreMath),
            ],
        }
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `source`.
    pub fn run(&mut self, source: String, ctx: &mut StageContext<'_>) -> Result<String> {
        let mut text = source;
        for stage in &mut self.stages {
            log::debug!("running stage {}", stage.name());
            text = stage.apply(text, ctx)?;
        }
        Ok(text)
    }
}

/// A piece of an HTML document: a code region (`<pre>`/`<code>`, tags
/// included) or everything else.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(&'a str),
    Code(&'a str),
}

/// Split HTML into code and non-code segments so the HTML-pass stages can
/// honor the non-interference invariant. An unterminated region counts as
/// code to the end of input.
pub(crate) fn split_code_regions(html: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let Some((start, close_tag)) = find_code_open(html, pos) else {
            segments.push(Segment::Text(&html[pos..]));
            break;
        };
        if start > pos {
            segments.push(Segment::Text(&html[pos..start]));
        }
        let end = match html[start..].find(close_tag) {
            Some(rel) => start + rel + close_tag.len(),
            None => html.len(),
        };
        segments.push(Segment::Code(&html[start..end]));
        pos = end;
    }

    segments
}

/// Apply `f` to every non-code segment, passing code regions through intact.
pub(crate) fn map_text_segments(html: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    for segment in split_code_regions(html) {
        match segment {
            Segment::Text(text) => out.push_str(&f(text)),
            Segment::Code(code) => out.push_str(code),
        }
    }
    out
}

fn find_code_open(html: &str, from: usize) -> Option<(usize, &'static str)> {
    let hay = &html[from..];
    let pre = find_tag(hay, "<pre");
    let code = find_tag(hay, "<code");
    match (pre, code) {
        (None, None) => None,
        (Some(p), None) => Some((from + p, "</pre>")),
        (None, Some(c)) => Some((from + c, "</code>")),
        (Some(p), Some(c)) if p <= c => Some((from + p, "</pre>")),
        (_, Some(c)) => Some((from + c, "</code>")),
    }
}

/// Find `tag` as a real tag opening, not a prefix of a longer tag name.
fn find_tag(hay: &str, tag: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(rel) = hay[offset..].find(tag) {
        let at = offset + rel;
        match hay.as_bytes().get(at + tag.len()) {
            Some(b'>') | Some(b' ') | Some(b'\n') | Some(b'\t') | None => return Some(at),
            _ => offset = at + tag.len(),
        }
    }
    None
}
