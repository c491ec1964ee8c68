//! Shared syntax highlighting for fenced code blocks and imported snippets.
//!
//! Highlighting emits class-annotated HTML; the matching stylesheet is
//! generated once per build from the configured theme, so every code block
//! on every page is styled by a single CSS file.

use crate::error::{RenderError, Result};
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

/// Process-wide highlighter: syntax definitions, theme set, and the chosen
/// theme name. Read-only after construction.
pub struct Highlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
    theme: String,
}

impl Highlighter {
    /// Build a highlighter for `theme`. Unknown theme names fail here, before
    /// any chapter renders.
    pub fn new(theme: &str) -> Result<Self> {
        let themes = ThemeSet::load_defaults();
        if !themes.themes.contains_key(theme) {
            return Err(RenderError::UnknownTheme(theme.to_string()).into());
        }
        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes,
            theme: theme.to_string(),
        })
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Highlight `code` as `lang`, producing a classed `<pre><code>` block.
    ///
    /// `lang` may be a syntax name, a common token (`rust`, `py`), or a file
    /// extension; anything unrecognized (or empty) renders as plain text.
    pub fn highlight(&self, code: &str, lang: &str) -> Result<String> {
        let syntax = self.resolve(lang);
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(RenderError::Highlight)?;
        }
        let body = generator.finalize();

        let class = if lang.is_empty() {
            "highlight".to_string()
        } else {
            format!("highlight language-{lang}")
        };
        Ok(format!("<pre class=\"{class}\"><code>{body}</code></pre>\n"))
    }

    /// Stylesheet matching the classed HTML this highlighter emits.
    pub fn theme_css(&self) -> Result<String> {
        let theme = &self.themes.themes[&self.theme];
        Ok(css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(RenderError::Highlight)?)
    }

    fn resolve(&self, lang: &str) -> &SyntaxReference {
        if lang.is_empty() {
            return self.syntaxes.find_syntax_plain_text();
        }
        self.syntaxes
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }
}
