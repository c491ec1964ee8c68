//! Fenced code block normalization, the first pipeline stage.
//!
//! Chapters tag fences with a zoo of language spellings (`C++`, `py`,
//! `rust,editable`). This stage rewrites each opening fence to a single
//! canonical token the highlighter understands, and nothing else: every
//! non-fence line passes through byte-for-byte.
//!
//! Fences are tracked with open/close state rather than pattern matching,
//! so fence-like text inside an open block (a ``` in a string literal, say)
//! is content, not a delimiter.

use super::{Stage, StageContext};
use crate::error::Result;

pub struct CodeBlockPreprocessor;

struct OpenFence {
    marker: char,
    length: usize,
}

impl CodeBlockPreprocessor {
    pub fn process(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut open: Option<OpenFence> = None;

        for line in text.split('\n') {
            match &open {
                None => {
                    if let Some((indent, marker, length, info)) = fence_open(line) {
                        let lang = normalize_language(info);
                        let fence: String = std::iter::repeat(marker).take(length).collect();
                        out.push(format!("{}{}{}", " ".repeat(indent), fence, lang));
                        open = Some(OpenFence { marker, length });
                    } else {
                        out.push(line.to_string());
                    }
                }
                Some(fence) => {
                    if fence_closes(line, fence) {
                        open = None;
                    }
                    out.push(line.to_string());
                }
            }
        }

        out.join("\n")
    }
}

impl Stage for CodeBlockPreprocessor {
    fn name(&self) -> &'static str {
        "code-blocks"
    }

    fn apply(&mut self, input: String, _ctx: &mut StageContext<'_>) -> Result<String> {
        Ok(self.process(&input))
    }
}

/// Recognize an opening fence: up to three spaces of indent, then a run of
/// three or more backticks or tildes, then the info string.
fn fence_open(line: &str) -> Option<(usize, char, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = rest.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let length = rest.chars().take_while(|&c| c == marker).count();
    if length < 3 {
        return None;
    }
    let info = &rest[length..];
    // Backtick fences cannot carry backticks in the info string
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((indent, marker, length, info))
}

/// A closing fence uses the opening marker, at least as long, nothing else
/// on the line.
fn fence_closes(line: &str, open: &OpenFence) -> bool {
    let trimmed = line.trim();
    let length = trimmed.chars().take_while(|&c| c == open.marker).count();
    length >= open.length && trimmed.chars().all(|c| c == open.marker)
}

/// Canonical language token for an info string: first token, lowercased,
/// known aliases folded.
fn normalize_language(info: &str) -> String {
    let token = info
        .trim()
        .split([' ', '\t', ','])
        .next()
        .unwrap_or("")
        .to_lowercase();

    let canonical = match token.as_str() {
        "c++" | "cxx" => "cpp",
        "c#" | "cs" => "csharp",
        "js" | "node" => "javascript",
        "ts" => "typescript",
        "py" | "python3" => "python",
        "rs" => "rust",
        "hs" => "haskell",
        "sh" | "shell" | "zsh" => "bash",
        "yml" => "yaml",
        "pseudo" | "pseudocode" | "plaintext" => "text",
        other => other,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process(text: &str) -> String {
        CodeBlockPreprocessor.process(text)
    }

    #[test]
    fn normalizes_language_aliases() {
        let input = "```C++\nint x;\n```\n";
        assert_eq!(process(input), "```cpp\nint x;\n```\n");
    }

    #[test]
    fn strips_fence_attributes() {
        let input = "```rust,editable\nfn main() {}\n```\n";
        assert_eq!(process(input), "```rust\nfn main() {}\n```\n");
    }

    #[test]
    fn non_fence_text_is_byte_identical() {
        let input = "# Title\n\nSome *prose* with `inline code` and $math$.\n\n> quote\n";
        assert_eq!(process(input), input);
    }

    #[test]
    fn fence_like_text_inside_open_fence_is_content() {
        let input = "~~~python\nprint('``` not a fence')\n```\nstill code\n~~~\nafter\n";
        // The backtick lines stay inside the tilde fence untouched; only the
        // tilde line closes it, and `after` ends up outside.
        assert_eq!(process(input), input);
    }

    #[test]
    fn shorter_closing_run_does_not_close() {
        let input = "`````\n```\ncode\n`````\n";
        assert_eq!(process(input), input);
    }

    #[test]
    fn unclosed_fence_consumes_rest_of_document() {
        let input = "```rust\nfn main() {}\n# not a heading\n";
        assert_eq!(process(input), input);
    }

    #[test]
    fn plain_fence_is_kept_plain() {
        let input = "```\nanything\n```\n";
        assert_eq!(process(input), input);
    }
}
