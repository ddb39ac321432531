//! Table of contents for `[TOC]` / `[[toc]]` markers.
//!
//! Entries come straight from the ATX heading lines of the source, not from
//! the converted HTML. Anchors are derived per heading and are NOT
//! deduplicated: two headings with the same text produce two entries with the
//! same anchor, while the converter's own heading ids get numeric suffixes.

use crate::extract::zones::CodeFence;
use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// 1..=6
    pub level: u8,
    pub text: String,
    pub anchor_id: String,
}

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));

/// Lowercase, turn each whitespace run into a single `-`, and drop everything
/// else but word characters and `-`. A dropped character does not end a
/// whitespace run, and a trailing run still leaves its `-`.
pub fn anchor_id(text: &str) -> String {
    let mut id = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('-');
                in_space = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            id.push(c);
            in_space = false;
        }
    }
    id
}

/// Heading lines in document order, skipping fenced code.
pub fn collect(source: &str) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut fence = None;

    for line in source.lines() {
        if let Some(open) = fence {
            if CodeFence::closes(open, line) {
                fence = None;
            }
            continue;
        }
        if let Some(sig) = CodeFence::sig(line) {
            fence = Some(sig);
            continue;
        }

        let Some(caps) = HEADING_LINE.captures(line) else {
            continue;
        };
        let text = caps[2].trim();
        if text.is_empty() {
            continue;
        }
        entries.push(TocEntry {
            level: caps[1].len() as u8,
            text: text.to_string(),
            anchor_id: anchor_id(text),
        });
    }
    entries
}

/// Nested navigation list. Empty string when there are no entries.
pub fn render(entries: &[TocEntry]) -> String {
    let Some(base) = entries.iter().map(|e| e.level).min() else {
        return String::new();
    };

    let mut html = String::from("<nav class=\"table-of-contents\"><h4>Table of Contents</h4><ul>");
    let mut depth: Option<u8> = None;

    for entry in entries {
        let level = entry.level;
        match depth {
            None => {
                for _ in base..level {
                    html.push_str("<li><ul>");
                }
            }
            Some(current) if level > current => {
                html.push_str("<ul>");
                for _ in current + 1..level {
                    html.push_str("<li><ul>");
                }
            }
            Some(current) => {
                html.push_str("</li>");
                for _ in level..current {
                    html.push_str("</ul></li>");
                }
            }
        }

        let _ = write!(
            html,
            "<li class=\"toc-level-{}\"><a href=\"#{}\">{}</a>",
            entry.level,
            encode_double_quoted_attribute(&entry.anchor_id),
            encode_text(&entry.text)
        );
        depth = Some(level);
    }

    if let Some(current) = depth {
        html.push_str("</li>");
        for _ in base..current {
            html.push_str("</ul></li>");
        }
    }
    html.push_str("</ul></nav>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Hello World", "hello-world")]
    #[case("What's  New?", "whats-new")]
    #[case("snake_case-x", "snake_case-x")]
    #[case("C++ & Rust", "c-rust")]
    #[case("Three ###", "three-")]
    #[case("A / B", "a-b")]
    fn anchors(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(anchor_id(text), expected);
    }

    #[test]
    fn collect_in_document_order() {
        let src = "# One\ntext\n## Two\n```\n# not a heading\n```\n### Three ###\n#NoSpace\n";
        let entries = collect(src);
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.level, e.text.as_str(), e.anchor_id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "One", "one"),
                (2, "Two", "two"),
                (3, "Three ###", "three-"),
            ]
        );
    }

    #[test]
    fn duplicate_headings_share_an_anchor() {
        let entries = collect("# Same\n\n# Same\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].anchor_id, entries[1].anchor_id);
    }

    #[test]
    fn render_empty() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn render_nested_levels() {
        let entries = collect("# A\n## B\n### C\n## D\n# E\n");
        assert_snapshot!(
            render(&entries),
            @r##"<nav class="table-of-contents"><h4>Table of Contents</h4><ul><li class="toc-level-1"><a href="#a">A</a><ul><li class="toc-level-2"><a href="#b">B</a><ul><li class="toc-level-3"><a href="#c">C</a></li></ul></li><li class="toc-level-2"><a href="#d">D</a></li></ul></li><li class="toc-level-1"><a href="#e">E</a></li></ul></nav>"##
        );
    }

    #[test]
    fn render_skipped_level_and_deeper_start() {
        let entries = collect("## A\n#### B\n## C\n");
        assert_snapshot!(
            render(&entries),
            @r##"<nav class="table-of-contents"><h4>Table of Contents</h4><ul><li class="toc-level-2"><a href="#a">A</a><ul><li><ul><li class="toc-level-4"><a href="#b">B</a></li></ul></li></ul></li><li class="toc-level-2"><a href="#c">C</a></li></ul></nav>"##
        );
    }

    #[test]
    fn render_starts_below_base() {
        let entries = collect("### Deep\n# Top\n");
        assert_snapshot!(
            render(&entries),
            @r##"<nav class="table-of-contents"><h4>Table of Contents</h4><ul><li><ul><li><ul><li class="toc-level-3"><a href="#deep">Deep</a></li></ul></li></ul></li><li class="toc-level-1"><a href="#top">Top</a></li></ul></nav>"##
        );
    }

    #[test]
    fn render_escapes_text() {
        let entries = collect("# <b>bold</b> & co\n");
        let html = render(&entries);
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; co"));
        assert!(html.contains("href=\"#bboldb-co\""));
    }
}
