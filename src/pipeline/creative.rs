//! Secondary inline formatting beyond standard markdown.
//!
//! Three markers, applied over the converted HTML: `==text==` highlights,
//! `^text^` raises, `~text~` lowers. Superscript and subscript content must
//! be whitespace-free, which keeps prose like `2^10 vs 2^20` and `x ~ y`
//! intact. Code regions and math placeholders are never rewritten.

use super::{map_text_segments, Stage, StageContext};
use crate::error::Result;

pub struct CreativeFormatter;

impl CreativeFormatter {
    pub fn format(&self, html: &str) -> String {
        map_text_segments(html, |text| {
            let text = replace_paired(text, "==", "mark", true);
            let text = replace_paired(&text, "^", "sup", false);
            replace_paired(&text, "~", "sub", false)
        })
    }
}

impl Stage for CreativeFormatter {
    fn name(&self) -> &'static str {
        "creative"
    }

    fn apply(&mut self, input: String, _ctx: &mut StageContext<'_>) -> Result<String> {
        Ok(self.format(&input))
    }
}

/// Rewrite `delim content delim` into `<tag>content</tag>`.
///
/// Content must be non-empty, stay on one line, not cross an HTML tag, and
/// not lead or trail with whitespace; a marker without a valid partner is
/// left untouched.
fn replace_paired(text: &str, delim: &str, tag: &str, allow_spaces: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(delim) {
        let after = &rest[start + delim.len()..];
        let accepted = after.find(delim).filter(|&off| {
            let content = &after[..off];
            if content.is_empty() || content.contains('\n') || content.contains('<') {
                return false;
            }
            if content.starts_with(char::is_whitespace) || content.ends_with(char::is_whitespace) {
                return false;
            }
            allow_spaces || !content.contains(char::is_whitespace)
        });

        match accepted {
            Some(off) => {
                out.push_str(&rest[..start]);
                out.push_str(&format!("<{tag}>{}</{tag}>", &after[..off]));
                rest = &after[off + delim.len()..];
            }
            None => {
                out.push_str(&rest[..start + delim.len()]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
