//! Markdown to HTML conversion.
//!
//! Extension set: tables, fenced code rendered through the shared
//! highlighter, and shortcut-link resolution: an undefined reference link
//! like `[Big O Notation]` becomes a link to `Big_O_Notation.html`.
//! References beginning with `@` are citation markers owned by a later
//! stage and are left as literal text.
//!
//! The stage holds only an immutable options value and builds a fresh
//! parser per call: nothing carries over between chapters.

use super::{Stage, StageContext};
use crate::error::Result;
use crate::highlight::Highlighter;
use pulldown_cmark::{
    html, BrokenLink, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd,
};

pub struct MarkdownStage {
    options: Options,
}

impl MarkdownStage {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        Self { options }
    }

    /// Convert markdown to HTML.
    pub fn convert(&self, text: &str, highlighter: &Highlighter) -> Result<String> {
        let shortcut = |link: BrokenLink<'_>| resolve_shortcut(&link.reference);
        let mut parser = Parser::new_with_broken_link_callback(text, self.options, Some(shortcut));

        let mut events: Vec<Event> = Vec::new();
        while let Some(event) = parser.next() {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = fence_language(&kind);
                    let mut code = String::new();
                    for inner in parser.by_ref() {
                        match inner {
                            Event::Text(t) => code.push_str(&t),
                            Event::End(TagEnd::CodeBlock) => break,
                            _ => {}
                        }
                    }
                    let rendered = highlighter.highlight(&code, &lang)?;
                    events.push(Event::Html(rendered.into()));
                }
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        Ok(out)
    }
}

impl Default for MarkdownStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String> {
        self.convert(&input, ctx.highlighter)
    }
}

/// Resolve an undefined reference link to `Reference_Name.html`.
fn resolve_shortcut<'a>(reference: &str) -> Option<(CowStr<'a>, CowStr<'a>)> {
    if reference.starts_with('@') {
        // Citation marker, not a shortcut link
        return None;
    }
    let href = format!("{}.html", reference.trim().replace(' ', "_"));
    Some((href.into(), CowStr::Borrowed("")))
}

fn fence_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string(),
        CodeBlockKind::Indented => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> String {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        MarkdownStage::new().convert(text, &highlighter).unwrap()
    }

    #[test]
    fn converts_headings_and_emphasis() {
        let html = convert("# Hello\n\n**Bold** and *italic* text.");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<strong>Bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn plain_text_converts_to_a_single_paragraph() {
        assert_eq!(convert("just some words"), "<p>just some words</p>\n");
    }

    #[test]
    fn renders_tables() {
        let html = convert("| A | B |\n| - | - |\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>A</th>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn fenced_code_is_highlighted() {
        let html = convert("```rust\nfn main() {}\n```\n");
        assert!(html.contains("<pre class=\"highlight language-rust\">"));
        assert!(html.contains("<span"));
    }

    #[test]
    fn shortcut_links_resolve_to_pages() {
        let html = convert("See [Big O Notation] for details.");
        assert!(html.contains("<a href=\"Big_O_Notation.html\">Big O Notation</a>"));
    }

    #[test]
    fn citation_markers_pass_through_untouched() {
        let html = convert("As shown in [@knuth1984].");
        assert_eq!(html, "<p>As shown in [@knuth1984].</p>\n");
    }

    #[test]
    fn conversion_is_stateless_across_calls() {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let stage = MarkdownStage::new();
        let first = stage.convert("# Same {#input}", &highlighter).unwrap();
        let second = stage.convert("# Same {#input}", &highlighter).unwrap();
        assert_eq!(first, second);
    }
}
