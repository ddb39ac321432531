//! Syntax highlighting for fenced code.

use std::sync::LazyLock;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("language not supported: {0}")]
    Unsupported(String),
    #[error("highlighting {language} failed: {source}")]
    Syntect {
        language: String,
        #[source]
        source: syntect::Error,
    },
}

/// Turns code into highlighted markup. Output goes inside `<code>` and must
/// already be HTML-escaped.
pub trait Highlighter {
    fn is_language_supported(&self, language: &str) -> bool;
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;
}

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

/// Class prefix keeps highlighter classes apart from page styles.
pub const CLASS_PREFIX: &str = "hl-";

fn class_style() -> ClassStyle {
    ClassStyle::SpacedPrefixed {
        prefix: CLASS_PREFIX,
    }
}

/// Info-string names that syntect knows under another token.
fn syntect_token(language: &str) -> &str {
    match language {
        "shell" | "console" | "zsh" => "sh",
        "c++" => "cpp",
        "golang" => "go",
        "yml" => "yaml",
        "md" => "markdown",
        other => other,
    }
}

/// [`Highlighter`] over syntect's bundled syntaxes, emitting `hl-` classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntectHighlighter;

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self
    }

    fn syntax(&self, language: &str) -> Option<&'static SyntaxReference> {
        let ss: &'static SyntaxSet = &SYNTAX_SET;
        ss.find_syntax_by_token(syntect_token(&language.to_ascii_lowercase()))
    }
}

impl Highlighter for SyntectHighlighter {
    fn is_language_supported(&self, language: &str) -> bool {
        !language.is_empty() && self.syntax(language).is_some()
    }

    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        let syntax = self
            .syntax(language)
            .ok_or_else(|| HighlightError::Unsupported(language.to_string()))?;

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, class_style());
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|source| HighlightError::Syntect {
                    language: language.to_string(),
                    source,
                })?;
        }
        Ok(generator.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rust")]
    #[case("Rust")]
    #[case("rs")]
    #[case("python")]
    #[case("js")]
    #[case("shell")]
    fn supported_languages(#[case] lang: &str) {
        assert!(SyntectHighlighter::new().is_language_supported(lang));
    }

    #[rstest]
    #[case("")]
    #[case("foo")]
    #[case("mermaid")]
    fn unsupported_languages(#[case] lang: &str) {
        assert!(!SyntectHighlighter::new().is_language_supported(lang));
    }

    #[test]
    fn highlight_emits_prefixed_classes() {
        let html = SyntectHighlighter::new()
            .highlight("fn main() {}\n", "rust")
            .unwrap();
        assert!(html.contains("class=\"hl-"), "{html}");
        assert!(html.contains("main"));
    }

    #[test]
    fn highlight_escapes_markup() {
        let html = SyntectHighlighter::new()
            .highlight("let x = \"<b>\";\n", "rust")
            .unwrap();
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn highlight_unsupported_is_an_error() {
        let err = SyntectHighlighter::new().highlight("x", "foo").unwrap_err();
        assert!(matches!(err, HighlightError::Unsupported(lang) if lang == "foo"));
    }
}
