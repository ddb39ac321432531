//! Raw zones: code regions of the source where nothing is ever protected.
//!
//! A `$` inside a fenced code block or a code span is code, not math, and a
//! `[TOC]` there is literal text. Zones are found before any protected region.

use super::Span;
use super::cursor::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Backticks,
    Tildes,
}

/// An opening or closing fence line: its character and run length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceSig {
    pub kind: FenceKind,
    pub len: usize,
}

pub struct CodeFence;

impl CodeFence {
    pub const BACKTICK: u8 = b'`';
    pub const TILDE: u8 = b'~';
    const MAX_INDENT: usize = 3;
    const MIN_LEN: usize = 3;

    /// Detects a fence at the start of `line` (at most three spaces of indent).
    pub fn sig(line: &str) -> Option<FenceSig> {
        let line = line.trim_end_matches(['\r', '\n']);
        let body = line.trim_start_matches(' ');
        if line.len() - body.len() > Self::MAX_INDENT {
            return None;
        }
        let first = *body.as_bytes().first()?;
        let kind = match first {
            Self::BACKTICK => FenceKind::Backticks,
            Self::TILDE => FenceKind::Tildes,
            _ => return None,
        };
        let len = body.bytes().take_while(|&b| b == first).count();
        if len < Self::MIN_LEN {
            return None;
        }
        // backtick info strings may not contain backticks
        if kind == FenceKind::Backticks && body[len..].contains('`') {
            return None;
        }
        Some(FenceSig { kind, len })
    }

    /// True if `line` closes a block opened with `open`.
    pub fn closes(open: FenceSig, line: &str) -> bool {
        match Self::sig(line) {
            Some(sig) => {
                sig.kind == open.kind && sig.len >= open.len && line.trim().len() == sig.len
            }
            None => false,
        }
    }
}

/// Finds fenced code blocks, from the opening fence line through the closing
/// fence line. An unclosed fence runs to the end of the text.
pub fn fenced_blocks(source: &str) -> Vec<Span> {
    let mut zones = Vec::new();
    let mut open: Option<(FenceSig, usize)> = None;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let end = offset + line.len();
        match open {
            None => {
                if let Some(sig) = CodeFence::sig(line) {
                    open = Some((sig, offset));
                }
            }
            Some((sig, start)) => {
                if CodeFence::closes(sig, line) {
                    zones.push(Span { start, end });
                    open = None;
                }
            }
        }
        offset = end;
    }

    if let Some((_, start)) = open {
        zones.push(Span {
            start,
            end: source.len(),
        });
    }
    zones
}

/// Finds code spans outside `fences`. A run of N backticks opens a span that
/// closes at the next run of exactly N backticks in the same paragraph;
/// unmatched runs are literal.
pub fn code_spans(source: &str, fences: &[Span]) -> Vec<Span> {
    let mut zones = Vec::new();
    let mut cur = Cursor::at(source, 0);

    while !cur.eof() {
        if let Some(fence) = zone_at(fences, cur.pos()) {
            cur.jump_to(fence.end);
            continue;
        }
        if cur.peek() == Some(b'\\') {
            cur.bump_n(2);
            continue;
        }
        if cur.peek() != Some(CodeFence::BACKTICK) {
            cur.bump();
            continue;
        }

        let start = cur.pos();
        let run = tick_run(&cur);
        cur.bump_n(run);
        let limit = fences
            .iter()
            .find(|f| f.start >= cur.pos())
            .map_or(source.len(), |f| f.start)
            .min(paragraph_end(source, cur.pos()));

        if let Some(close) = find_closing_run(source, cur.pos(), limit, run) {
            zones.push(Span {
                start,
                end: close + run,
            });
            cur.jump_to(close + run);
        }
    }
    zones
}

/// Fenced blocks and code spans merged, sorted by start offset.
pub fn raw_zones(source: &str) -> Vec<Span> {
    let fences = fenced_blocks(source);
    let mut zones = code_spans(source, &fences);
    zones.extend(fences);
    zones.sort();
    zones
}

/// Returns the zone containing byte `pos`, if any. `zones` must be sorted.
pub fn zone_at(zones: &[Span], pos: usize) -> Option<Span> {
    let idx = zones.partition_point(|z| z.end <= pos);
    zones.get(idx).copied().filter(|z| z.start <= pos)
}

fn tick_run(cur: &Cursor<'_>) -> usize {
    cur.s.as_bytes()[cur.pos()..]
        .iter()
        .take_while(|&&b| b == CodeFence::BACKTICK)
        .count()
}

/// Start of the first blank line after `from`, or the end of the text.
fn paragraph_end(source: &str, from: usize) -> usize {
    let Some(newline) = source[from..].find('\n') else {
        return source.len();
    };
    let mut offset = from + newline + 1;
    for line in source[offset..].split_inclusive('\n') {
        if line.trim().is_empty() {
            return offset;
        }
        offset += line.len();
    }
    source.len()
}

fn find_closing_run(source: &str, from: usize, limit: usize, run: usize) -> Option<usize> {
    let mut cur = Cursor::at(source, from);
    while cur.pos() < limit {
        if cur.peek() == Some(CodeFence::BACKTICK) {
            let len = tick_run(&cur);
            if len == run && cur.pos() + len <= limit {
                return Some(cur.pos());
            }
            cur.bump_n(len);
        } else {
            cur.bump();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_backtick_fence() {
        assert_eq!(
            CodeFence::sig("```rust\n"),
            Some(FenceSig {
                kind: FenceKind::Backticks,
                len: 3
            })
        );
    }

    #[test]
    fn detect_tilde_fence() {
        assert_eq!(
            CodeFence::sig("~~~~"),
            Some(FenceSig {
                kind: FenceKind::Tildes,
                len: 4
            })
        );
    }

    #[test]
    fn no_fence() {
        assert_eq!(CodeFence::sig("hello"), None);
        assert_eq!(CodeFence::sig("``"), None);
        assert_eq!(CodeFence::sig("    ```"), None);
    }

    #[test]
    fn closes_matching_fence_only() {
        let open = CodeFence::sig("````").unwrap();
        assert!(CodeFence::closes(open, "````\n"));
        assert!(CodeFence::closes(open, "`````"));
        assert!(!CodeFence::closes(open, "```"));
        assert!(!CodeFence::closes(open, "~~~~"));
        assert!(!CodeFence::closes(open, "```` rust"));
    }

    #[test]
    fn fenced_block_spans_whole_lines() {
        let src = "a\n```\n$x$\n```\nb";
        let zones = fenced_blocks(src);
        assert_eq!(zones, vec![Span { start: 2, end: 14 }]);
        assert_eq!(&src[2..14], "```\n$x$\n```\n");
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let src = "a\n~~~\n$x$";
        assert_eq!(fenced_blocks(src), vec![Span { start: 2, end: 9 }]);
    }

    #[test]
    fn code_span_with_matching_run() {
        let src = "a `$x$` b ``c ` d`` e";
        let zones = code_spans(src, &[]);
        assert_eq!(zones.len(), 2);
        assert_eq!(&src[zones[0].start..zones[0].end], "`$x$`");
        assert_eq!(&src[zones[1].start..zones[1].end], "``c ` d``");
    }

    #[test]
    fn unmatched_backtick_is_literal() {
        assert!(code_spans("price `5 and $x$", &[]).is_empty());
    }

    #[test]
    fn code_span_may_wrap_lines() {
        let src = "a `one\ntwo` b";
        let zones = code_spans(src, &[]);
        assert_eq!(zones.len(), 1);
        assert_eq!(&src[zones[0].start..zones[0].end], "`one\ntwo`");
    }

    #[test]
    fn code_span_does_not_cross_blank_line() {
        // Given stray backticks in two different paragraphs
        let src = "Press the ` key.\n\nEnergy is $E$.\n  \nAnother ` here.\n";

        // When scanning for code spans
        let zones = code_spans(src, &[]);

        // Then neither backtick opens a span
        assert!(zones.is_empty(), "{zones:?}");
    }

    #[test]
    fn escaped_backtick_does_not_open_span() {
        assert!(code_spans(r"\`$x$`", &[]).len() <= 1);
        let zones = code_spans(r"\`a` `b`", &[]);
        assert_eq!(zones.len(), 1);
    }

    #[test]
    fn zone_lookup() {
        let zones = vec![Span { start: 2, end: 5 }, Span { start: 8, end: 9 }];
        assert_eq!(zone_at(&zones, 1), None);
        assert_eq!(zone_at(&zones, 2), Some(zones[0]));
        assert_eq!(zone_at(&zones, 4), Some(zones[0]));
        assert_eq!(zone_at(&zones, 5), None);
        assert_eq!(zone_at(&zones, 8), Some(zones[1]));
    }
}
