//! Math span protection and restoration.
//!
//! Math is written as `$...$` (inline) and `$$...$$` (display) and rendered
//! client-side by MathJax, so its content must reach the final page
//! literally. The markdown stage has already run by the time we see the
//! text, which means two kinds of damage must be undone: HTML entity
//! escaping (`a < b` became `a &lt; b`) and emphasis pairs minted from
//! asterisks inside math.
//!
//! Protection replaces each span with an opaque `@@math:N@@` token that the
//! creative, citation, and snippet stages are guaranteed to ignore;
//! restoration, the final pipeline stage, swaps the tokens for
//! MathJax-ready markup.

use super::{map_text_segments, Stage, StageContext};
use crate::error::Result;

/// One captured math span: the literal source content, exactly as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    pub content: String,
    pub display: bool,
}

/// Placeholder-based protection for math notation.
pub struct MathProtector;

impl MathProtector {
    /// Replace math spans with placeholder tokens, capturing their literal
    /// content. Code regions are never scanned; a `$` without a partner is
    /// left alone.
    pub fn protect(html: &str) -> (String, Vec<MathSpan>) {
        let mut spans = Vec::new();
        let out = map_text_segments(html, |text| protect_text(text, &mut spans));
        (out, spans)
    }

    /// Replace each placeholder with its span, wrapped for MathJax and
    /// HTML-escaped exactly once.
    pub fn restore(html: &str, spans: &[MathSpan]) -> String {
        map_text_segments(html, |text| restore_text(text, spans))
    }
}

fn protect_text(text: &str, spans: &mut Vec<MathSpan>) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < text.len() {
        // Bulk-copy up to the next dollar sign
        match text[i..].find('$') {
            None => {
                out.push_str(&text[i..]);
                break;
            }
            Some(rel) => {
                out.push_str(&text[i..i + rel]);
                i += rel;
            }
        }

        let display = bytes.get(i + 1) == Some(&b'$');
        let delim = if display { 2 } else { 1 };
        let rest = &text[i + delim..];
        let close = if display {
            rest.find("$$")
        } else {
            rest.find('$')
        };

        let accepted = close.and_then(|off| {
            let raw = &rest[..off];
            if raw.is_empty() {
                return None;
            }
            if !display && !inline_span_ok(raw, rest.as_bytes().get(off + 1)) {
                return None;
            }
            Some(off)
        });

        match accepted {
            Some(off) => {
                spans.push(MathSpan {
                    content: unmangle(&rest[..off]),
                    display,
                });
                out.push_str(&format!("@@math:{}@@", spans.len() - 1));
                i += delim + off + delim;
            }
            None => {
                out.push('$');
                i += 1;
            }
        }
    }

    out
}

/// Inline `$...$` only counts when the content hugs its delimiters and the
/// closing `$` is not a currency amount (`$5 and $10`).
fn inline_span_ok(raw: &str, after_close: Option<&u8>) -> bool {
    let starts_clean = raw.chars().next().is_some_and(|c| !c.is_whitespace());
    let ends_clean = raw.chars().last().is_some_and(|c| !c.is_whitespace());
    let no_amount = !after_close.is_some_and(|b| b.is_ascii_digit());
    starts_clean && ends_clean && no_amount
}

/// Undo markdown's damage inside a math span: emphasis tags minted from
/// asterisk pairs, then entity escaping.
fn unmangle(raw: &str) -> String {
    let restored = raw
        .replace("<em>", "*")
        .replace("</em>", "*")
        .replace("<strong>", "**")
        .replace("</strong>", "**");
    html_escape::decode_html_entities(&restored).into_owned()
}

fn restore_text(text: &str, spans: &[MathSpan]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("@@math:") {
        let after = &rest[start + "@@math:".len()..];
        let Some((digits, _)) = after.split_once("@@") else {
            break;
        };
        let Ok(index) = digits.parse::<usize>() else {
            out.push_str(&rest[..start + "@@math:".len()]);
            rest = after;
            continue;
        };
        out.push_str(&rest[..start]);
        if let Some(span) = spans.get(index) {
            out.push_str(&render_span(span));
        }
        rest = &after[digits.len() + 2..];
    }
    out.push_str(rest);
    out
}

fn render_span(span: &MathSpan) -> String {
    let escaped = html_escape::encode_text(&span.content);
    if span.display {
        format!(r#"<div class="math display">\[{escaped}\]</div>"#)
    } else {
        format!(r#"<span class="math inline">\({escaped}\)</span>"#)
    }
}

/// Stage wrapper: capture spans into the context.
pub struct ProtectMath;

impl Stage for ProtectMath {
    fn name(&self) -> &'static str {
        "protect-math"
    }

    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String> {
        let (out, spans) = MathProtector::protect(&input);
        ctx.math_spans = spans;
        Ok(out)
    }
}

/// Stage wrapper: splice captured spans back in.
pub struct RestoreMath;

impl Stage for RestoreMath {
    fn name(&self) -> &'static str {
        "restore-math"
    }

    fn apply(&mut self, input: String, ctx: &mut StageContext<'_>) -> Result<String> {
        Ok(MathProtector::restore(&input, &ctx.math_spans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn captures_literal_content_byte_for_byte() {
        let (protected, spans) = MathProtector::protect("<p>inline $x_i + y$ end</p>");
        assert_eq!(protected, "<p>inline @@math:0@@ end</p>");
        assert_eq!(
            spans,
            vec![MathSpan {
                content: "x_i + y".to_string(),
                display: false,
            }]
        );

        let restored = MathProtector::restore(&protected, &spans);
        assert_eq!(
            restored,
            r#"<p>inline <span class="math inline">\(x_i + y\)</span> end</p>"#
        );
    }

    #[test]
    fn display_math_becomes_a_block() {
        let (protected, spans) = MathProtector::protect("<p>$$\\int_0^1 x dx$$</p>");
        assert_eq!(spans[0].content, "\\int_0^1 x dx");
        assert!(spans[0].display);
        let restored = MathProtector::restore(&protected, &spans);
        assert!(restored.contains(r#"<div class="math display">\[\int_0^1 x dx\]</div>"#));
    }

    #[test]
    fn recovers_entity_escaping_artifacts() {
        let (_, spans) = MathProtector::protect("<p>$a &lt; b$</p>");
        assert_eq!(spans[0].content, "a < b");
        let restored = MathProtector::restore("@@math:0@@", &spans);
        assert!(restored.contains(r"\(a &lt; b\)"));
    }

    #[test]
    fn recovers_emphasis_minted_from_asterisks() {
        let (protected, spans) = MathProtector::protect("<p>$a<em>b$ and $c</em>d$</p>");
        assert_eq!(protected, "<p>@@math:0@@ and @@math:1@@</p>");
        assert_eq!(spans[0].content, "a*b");
        assert_eq!(spans[1].content, "c*d");
    }

    #[test]
    fn dollars_inside_code_are_not_math() {
        let html = "<p>run <code>echo $PATH</code> then <code>$HOME</code></p>";
        let (protected, spans) = MathProtector::protect(html);
        assert_eq!(protected, html);
        assert!(spans.is_empty());
    }

    #[test]
    fn currency_and_unpaired_dollars_are_left_alone() {
        for text in ["<p>costs $5 total</p>", "<p>$5 and $10</p>"] {
            let (protected, spans) = MathProtector::protect(text);
            assert_eq!(protected, text);
            assert!(spans.is_empty(), "no spans for {text:?}");
        }
    }

    #[test]
    fn surrounding_text_is_unaffected() {
        let html = "<p>before $x$ between $$y$$ after</p>";
        let (protected, spans) = MathProtector::protect(html);
        let restored = MathProtector::restore(&protected, &spans);
        assert!(restored.starts_with("<p>before "));
        assert!(restored.contains(" between "));
        assert!(restored.ends_with(" after</p>"));
    }
}
