//! Citation resolution against the bibliography database.
//!
//! Markers use the `[@key]` form, with `[@a; @b]` for grouped citations and
//! an optional locator (`[@knuth1984, p. 42]`). A key present in the
//! database becomes an author-year link into the references section
//! appended to the page. A key that is missing stays in the text, visibly
//! flagged: an authoring error should be seen, not silently swallowed, and
//! it never stops the build.

use super::{map_text_segments, Stage, StageContext};
use crate::bibtex::Bibliography;
use crate::error::Result;
use std::collections::HashSet;

pub struct CitationResolver;

impl CitationResolver {
    /// Rewrite citation markers in `html`; returns the rewritten document
    /// and the references fragment (empty when nothing was resolved).
    pub fn resolve(&self, html: &str, bibliography: &Bibliography) -> (String, String) {
        let mut cited: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let out = map_text_segments(html, |text| {
            resolve_text(text, bibliography, &mut cited, &mut seen)
        });
        let fragment = references_fragment(&cited, bibliography);
        (out, fragment)
    }
}

impl Stage for CitationResolver {
    fn name(&self) -> &'static str {
        "citations"
    }

    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String> {
        // A chapter-local literature.bib shadows the global database.
        let local_path = ctx.chapter_dir.join("literature.bib");
        let merged;
        let bibliography = if local_path.is_file() {
            match std::fs::read_to_string(&local_path) {
                Ok(text) => {
                    merged = ctx.bibliography.merged(&Bibliography::parse(&text));
                    &merged
                }
                Err(err) => {
                    log::warn!("ignoring unreadable {}: {err}", local_path.display());
                    ctx.bibliography
                }
            }
        } else {
            ctx.bibliography
        };

        let (out, fragment) = self.resolve(&input, bibliography);
        if fragment.is_empty() {
            Ok(out)
        } else {
            Ok(format!("{out}\n{fragment}"))
        }
    }
}

fn resolve_text(
    text: &str,
    bibliography: &Bibliography,
    cited: &mut Vec<String>,
    seen: &mut HashSet<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("[@") {
        let after = &rest[start..];
        let marker = after
            .find(']')
            .map(|close| &after[1..close])
            .filter(|inner| !inner.contains('\n') && !inner.contains('['))
            .and_then(|inner| format_group(inner, bibliography, cited, seen));

        match marker {
            Some((replacement, consumed)) => {
                out.push_str(&rest[..start]);
                out.push_str(&replacement);
                rest = &after[consumed..];
            }
            None => {
                out.push_str(&rest[..start + 1]);
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Format the inside of one `[...]` group. Returns the replacement and the
/// number of bytes consumed (brackets included), or `None` when the group is
/// not a citation marker after all.
fn format_group(
    inner: &str,
    bibliography: &Bibliography,
    cited: &mut Vec<String>,
    seen: &mut HashSet<String>,
) -> Option<(String, usize)> {
    // Parse every item first, so a group that turns out not to be a
    // citation marker leaves no trace in the citation order.
    let mut items: Vec<(String, String)> = Vec::new();
    for item in inner.split(';') {
        let item = item.trim();
        let body = item.strip_prefix('@')?;
        let key: String = body.chars().take_while(|c| is_key_char(*c)).collect();
        if key.is_empty() {
            return None;
        }
        let locator = body[key.len()..].trim_start_matches(',').trim().to_string();
        items.push((key, locator));
    }

    let mut parts: Vec<String> = Vec::new();
    for (key, locator) in items {
        match bibliography.get(&key) {
            Some(entry) => {
                if seen.insert(key.clone()) {
                    cited.push(key.clone());
                }
                let mut label = entry.inline_label();
                if !locator.is_empty() {
                    label.push_str(", ");
                    label.push_str(&locator);
                }
                parts.push(format!(
                    r##"<a class="citation" href="#ref-{}">{}</a>"##,
                    html_escape::encode_double_quoted_attribute(&key),
                    html_escape::encode_text(&label),
                ));
            }
            None => {
                parts.push(format!(
                    r#"<span class="citation unresolved">@{}?</span>"#,
                    html_escape::encode_text(&key),
                ));
            }
        }
    }

    Some((format!("({})", parts.join("; ")), inner.len() + 2))
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

/// References section for every distinct resolved key, in first-citation
/// order.
fn references_fragment(cited: &[String], bibliography: &Bibliography) -> String {
    if cited.is_empty() {
        return String::new();
    }

    let mut out = String::from("<section class=\"references\">\n<h2>References</h2>\n<ol>\n");
    for key in cited {
        if let Some(entry) = bibliography.get(key) {
            out.push_str(&format!(
                "<li id=\"ref-{}\">{}</li>\n",
                html_escape::encode_double_quoted_attribute(key),
                html_escape::encode_text(&entry.reference_line()),
            ));
        }
    }
    out.push_str("</ol>\n</section>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_bibliography() -> Bibliography {
        Bibliography::parse(
            r#"
@article{alpha, author = {Ada Alpha}, title = {First}, year = {2001}}
@article{gamma, author = {Grace Gamma}, title = {Third}, year = {2003}}
"#,
        )
    }

    #[test]
    fn missing_key_is_flagged_and_excluded_from_references() {
        let bib = sample_bibliography();
        let html = "<p>[@alpha] then [@beta] then [@alpha] then [@gamma]</p>";
        let (out, fragment) = CitationResolver.resolve(html, &bib);

        assert!(out.contains(r##"<a class="citation" href="#ref-alpha">Alpha, 2001</a>"##));
        assert!(out.contains(r#"<span class="citation unresolved">@beta?</span>"#));

        // First-citation order, deduplicated, missing key absent
        let alpha_pos = fragment.find("ref-alpha").unwrap();
        let gamma_pos = fragment.find("ref-gamma").unwrap();
        assert!(alpha_pos < gamma_pos);
        assert!(!fragment.contains("ref-beta"));
        assert_eq!(fragment.matches("ref-alpha").count(), 1);
    }

    #[test]
    fn grouped_citation_shares_one_paren_pair() {
        let bib = sample_bibliography();
        let (out, _) = CitationResolver.resolve("<p>[@alpha; @gamma]</p>", &bib);
        assert!(out.contains("(<a"));
        assert!(out.contains("</a>; <a"));
        assert!(out.ends_with("</a>)</p>"));
    }

    #[test]
    fn locator_is_appended_to_the_label() {
        let bib = sample_bibliography();
        let (out, _) = CitationResolver.resolve("<p>[@alpha, p. 42]</p>", &bib);
        assert!(out.contains(">Alpha, 2001, p. 42</a>"));
    }

    #[test]
    fn non_citation_brackets_are_untouched() {
        let bib = sample_bibliography();
        for html in ["<p>[plain]</p>", "<p>array[@]</p>", "<p>[@ spaced]</p>"] {
            let (out, fragment) = CitationResolver.resolve(html, &bib);
            assert_eq!(out, html);
            assert!(fragment.is_empty());
        }
    }

    #[test]
    fn half_citation_group_leaves_no_trace() {
        let bib = sample_bibliography();
        let html = "<p>[@alpha; not a marker]</p>";
        let (out, fragment) = CitationResolver.resolve(html, &bib);
        assert_eq!(out, html);
        assert!(fragment.is_empty());
    }

    #[test]
    fn code_regions_are_untouched() {
        let bib = sample_bibliography();
        let html = "<p><code>[@alpha]</code></p>";
        let (out, fragment) = CitationResolver.resolve(html, &bib);
        assert_eq!(out, html);
        assert!(fragment.is_empty());
    }

    #[test]
    fn no_citations_means_no_fragment() {
        let bib = sample_bibliography();
        let (out, fragment) = CitationResolver.resolve("<p>nothing here</p>", &bib);
        assert_eq!(out, "<p>nothing here</p>");
        assert!(fragment.is_empty());
    }
}
