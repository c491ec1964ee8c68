//! External code snippet import.
//!
//! Chapters pull code in from their own directory instead of pasting it:
//!
//! ```text
//! [import](code/bubble_sort.rs)
//! [import:3-5](code/bubble_sort.rs)
//! [import:3-5, lang:"rust"](code/bubble_sort.rs)
//! ```
//!
//! By the time this stage runs, markdown has turned the directive into a
//! plain anchor, so the scan looks for `<a href="...">import...</a>`. The
//! referenced file is read relative to the chapter directory and rendered
//! through the same highlighter as fenced code. A missing file or an
//! invalid line range stops the build; a broken import is an authoring
//! error the author must fix, not something to paper over.

use super::{Stage, StageContext};
use crate::error::{Result, SnippetError};
use crate::highlight::Highlighter;
use std::path::Path;

pub struct SnippetImporter;

struct Directive {
    /// Byte offset of `<a`.
    start: usize,
    /// Byte offset just past `</a>`.
    end: usize,
    href: String,
    range: Option<String>,
    lang: Option<String>,
}

impl SnippetImporter {
    pub fn import(
        &self,
        html: &str,
        chapter_dir: &Path,
        highlighter: &Highlighter,
    ) -> Result<String> {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;

        while let Some(directive) = find_directive(rest) {
            let mut lead = &rest[..directive.start];
            let mut end = directive.end;

            // A directive alone in a paragraph takes its <p> wrapper with it
            if lead.ends_with("<p>") && rest[end..].starts_with("</p>") {
                lead = &lead[..lead.len() - 3];
                end += 4;
                if rest[end..].starts_with('\n') {
                    end += 1;
                }
            }

            out.push_str(lead);
            out.push_str(&render_snippet(&directive, chapter_dir, highlighter)?);
            rest = &rest[end..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl Stage for SnippetImporter {
    fn name(&self) -> &'static str {
        "snippets"
    }

    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String> {
        self.import(&input, ctx.chapter_dir, ctx.highlighter)
    }
}

fn find_directive(html: &str) -> Option<Directive> {
    let mut offset = 0;

    while let Some(rel) = html[offset..].find("<a href=\"") {
        let start = offset + rel;
        let href_start = start + "<a href=\"".len();
        let href_len = html[href_start..].find('"')?;
        let href_end = href_start + href_len;
        let tag_close = href_end + html[href_end..].find('>')?;
        let text_start = tag_close + 1;
        let text_len = html[text_start..].find("</a>")?;
        let text_end = text_start + text_len;

        let text = html_escape::decode_html_entities(&html[text_start..text_end]).into_owned();
        if let Some((range, lang)) = parse_directive_text(&text) {
            let href = html_escape::decode_html_entities(&html[href_start..href_end]).into_owned();
            return Some(Directive {
                start,
                end: text_end + "</a>".len(),
                href,
                range,
                lang,
            });
        }
        offset = text_end + "</a>".len();
    }

    None
}

/// Parse an anchor's text as an import directive:
/// `import[:RANGE][, lang:"LANG"]`. Anything else is an ordinary link.
fn parse_directive_text(text: &str) -> Option<(Option<String>, Option<String>)> {
    let mut rest = text.strip_prefix("import")?;

    let mut range = None;
    if let Some(r) = rest.strip_prefix(':') {
        let end = r.find(',').unwrap_or(r.len());
        range = Some(r[..end].trim().to_string());
        rest = &r[end..];
    }

    let rest = rest.trim_start();
    let mut lang = None;
    if !rest.is_empty() {
        let r = rest.strip_prefix(',')?.trim_start();
        let r = r.strip_prefix("lang:")?;
        let r = r.strip_prefix('"')?;
        let (value, tail) = r.split_once('"')?;
        if !tail.trim().is_empty() {
            return None;
        }
        lang = Some(value.to_string());
    }

    Some((range, lang))
}

fn render_snippet(
    directive: &Directive,
    chapter_dir: &Path,
    highlighter: &Highlighter,
) -> Result<String> {
    let path = chapter_dir.join(&directive.href);
    let code = std::fs::read_to_string(&path)
        .map_err(|_| SnippetError::MissingFile(path.clone()))?;

    let selected = match &directive.range {
        None => code.clone(),
        Some(spec) => {
            let lines: Vec<&str> = code.lines().collect();
            let (start, end) = parse_range(spec).ok_or_else(|| SnippetError::InvalidRange {
                spec: spec.clone(),
                lines: lines.len(),
            })?;
            if start == 0 || start > end || end > lines.len() {
                return Err(SnippetError::InvalidRange {
                    spec: spec.clone(),
                    lines: lines.len(),
                }
                .into());
            }
            let mut selected = lines[start - 1..end].join("\n");
            selected.push('\n');
            selected
        }
    };

    let extension = Path::new(&directive.href)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let lang = directive.lang.as_deref().unwrap_or(extension);

    Ok(highlighter.highlight(&selected, lang)?)
}

fn parse_range(spec: &str) -> Option<(usize, usize)> {
    let (a, b) = match spec.split_once('-') {
        Some((a, b)) => (a, b),
        None => (spec, spec),
    };
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;

    fn chapter_with_code() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("code")).unwrap();
        let body: String = (1..=10).map(|n| format!("let line{n} = {n};\n")).collect();
        fs::write(dir.path().join("code/sample.rs"), body).unwrap();
        dir
    }

    fn import(html: &str, dir: &Path) -> Result<String> {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        SnippetImporter.import(html, dir, &highlighter)
    }

    #[test]
    fn imports_a_line_range_exactly() {
        let dir = chapter_with_code();
        let html = "<p><a href=\"code/sample.rs\">import:3-5</a></p>\n";
        let out = import(html, dir.path()).unwrap();

        assert!(out.starts_with("<pre class=\"highlight language-rust\">"));
        for n in 3..=5 {
            assert!(out.contains(&format!("line{n}")), "line {n} missing");
        }
        for n in [1, 2, 6, 10] {
            assert!(!out.contains(&format!("line{n}")), "line {n} leaked");
        }
    }

    #[test]
    fn imports_the_whole_file_without_a_range() {
        let dir = chapter_with_code();
        let html = "<p><a href=\"code/sample.rs\">import</a></p>\n";
        let out = import(html, dir.path()).unwrap();
        assert!(out.contains("line1"));
        assert!(out.contains("line10"));
    }

    #[test]
    fn explicit_lang_overrides_the_extension() {
        let dir = chapter_with_code();
        let html = "<p><a href=\"code/sample.rs\">import:1-2, lang:&quot;text&quot;</a></p>\n";
        let out = import(html, dir.path()).unwrap();
        assert!(out.starts_with("<pre class=\"highlight language-text\">"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = chapter_with_code();
        let html = "<p><a href=\"code/absent.rs\">import</a></p>\n";
        let err = import(html, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Snippet(SnippetError::MissingFile(_))));
    }

    #[test]
    fn invalid_ranges_are_fatal() {
        let dir = chapter_with_code();
        for spec in ["0-2", "5-3", "3-99", ""] {
            let html = format!("<p><a href=\"code/sample.rs\">import:{spec}</a></p>\n");
            let err = import(&html, dir.path()).unwrap_err();
            assert!(
                matches!(err, Error::Snippet(SnippetError::InvalidRange { .. })),
                "range {spec:?} should be invalid"
            );
        }
    }

    #[test]
    fn ordinary_links_are_untouched() {
        let dir = chapter_with_code();
        let html = "<p><a href=\"other.html\">important reading</a></p>\n";
        assert_eq!(import(html, dir.path()).unwrap(), html);
    }
}
