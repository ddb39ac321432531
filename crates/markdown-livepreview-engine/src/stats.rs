//! Word, character and line counts, and a document title for file names.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentStats {
    pub words: usize,
    pub chars: usize,
    pub lines: usize,
}

impl DocumentStats {
    /// Counts straight from the raw text: whitespace-separated words, Unicode
    /// scalar values, and `\n`-separated lines (an empty text is one line).
    pub fn from_text(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
            lines: text.split('\n').count(),
        }
    }
}

impl fmt::Display for DocumentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} words | {} chars | {} lines",
            self.words, self.chars, self.lines
        )
    }
}

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid title regex"));

pub const DEFAULT_TITLE: &str = "document";

/// Text of the first level-one heading, safe to use in a file name.
pub fn document_title(source: &str) -> String {
    let Some(heading) = TITLE_LINE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return DEFAULT_TITLE.to_string();
    };

    let title: String = heading
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect();
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}
