//! Protected-region extraction.
//!
//! Math and TOC markers are not markdown: handed to the markdown engine as-is,
//! `$a_1 * b_2$` would come back with emphasis tags in it. Before conversion
//! each protected region is swapped for an opaque placeholder token; after
//! conversion the tokens are looked up in a side table and resolved.
//!
//! Extraction is a two-pass tokenizer over the source. Code regions (fenced
//! blocks and code spans) are found first and are never protected. The first
//! pass finds block math (`$$…$$`), the second pass finds inline math (`$…$`)
//! and TOC markers in the gaps the first pass left.

pub mod cursor;
pub mod zones;

use cursor::Cursor;
use zones::{raw_zones, zone_at};

/// A byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    MathBlock,
    MathInline,
    TocMarker,
}

/// A region of the source that bypasses markdown conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedFragment {
    pub kind: FragmentKind,
    /// The region exactly as written, delimiters included.
    pub original_text: String,
    pub placeholder_token: String,
}

/// TeX source of a math fragment with its delimiters removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MathFragment<'a> {
    pub tex: &'a str,
    pub display: bool,
}

impl ProtectedFragment {
    pub fn math(&self) -> Option<MathFragment<'_>> {
        let (delim, display) = match self.kind {
            FragmentKind::MathBlock => ("$$", true),
            FragmentKind::MathInline => ("$", false),
            FragmentKind::TocMarker => return None,
        };
        let tex = self
            .original_text
            .strip_prefix(delim)
            .and_then(|s| s.strip_suffix(delim))?;
        Some(MathFragment { tex, display })
    }
}

/// Where a token sat in the converted HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The token was the whole content of a paragraph; the `<p>` wrapper has
    /// been removed and the replacement may be block-level markup.
    Standalone,
    /// The token sits among other inline content.
    Inline,
}

/// Source text with protected regions replaced by placeholder tokens.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub fragments: Vec<ProtectedFragment>,
    open: char,
    close: char,
}

/// Private-use code points the sentinel pairs are drawn from.
const SENTINEL_RANGE: std::ops::Range<u32> = 0xE000..0xF8FF;

/// Pick a sentinel pair not present in `source`.
fn choose_sentinels(source: &str) -> Option<(char, char)> {
    SENTINEL_RANGE.step_by(2).find_map(|cp| {
        let open = char::from_u32(cp)?;
        let close = char::from_u32(cp + 1)?;
        (!source.contains(open) && !source.contains(close)).then_some((open, close))
    })
}

/// Replace every protected region in `source` with a placeholder token.
pub fn extract(source: &str) -> Extracted {
    let Some((open, close)) = choose_sentinels(source) else {
        log::warn!("no free placeholder sentinels, protected regions left in place");
        return Extracted {
            text: source.to_string(),
            fragments: Vec::new(),
            open: '\u{E000}',
            close: '\u{E001}',
        };
    };

    let zones = raw_zones(source);
    let blocks = find_block_math(source, &zones);
    let mut regions: Vec<(Span, FragmentKind)> = blocks
        .iter()
        .map(|&span| (span, FragmentKind::MathBlock))
        .collect();
    regions.extend(find_inline_regions(source, &zones, &blocks));
    regions.sort_by_key(|(span, _)| span.start);

    let mut text = String::with_capacity(source.len());
    let mut fragments = Vec::with_capacity(regions.len());
    let mut last = 0;
    for (idx, (span, kind)) in regions.into_iter().enumerate() {
        let placeholder_token = format!("{open}{idx}{close}");
        text.push_str(&source[last..span.start]);
        text.push_str(&placeholder_token);
        fragments.push(ProtectedFragment {
            kind,
            original_text: source[span.start..span.end].to_string(),
            placeholder_token,
        });
        last = span.end;
    }
    text.push_str(&source[last..]);

    Extracted {
        text,
        fragments,
        open,
        close,
    }
}

fn is_escaped(cur: &Cursor<'_>) -> bool {
    cur.prev() == Some(b'\\')
}

/// Pass 1: `$$…$$`, minimal match, at least one byte between the delimiters.
fn find_block_math(source: &str, zones: &[Span]) -> Vec<Span> {
    let mut found = Vec::new();
    let mut cur = Cursor::at(source, 0);

    while !cur.eof() {
        if let Some(zone) = zone_at(zones, cur.pos()) {
            cur.jump_to(zone.end);
            continue;
        }
        if !cur.starts_with(b"$$") || is_escaped(&cur) {
            cur.bump();
            continue;
        }

        let start = cur.pos();
        match find_block_close(source, zones, start + 3) {
            Some(close) => {
                found.push(Span::new(start, close + 2));
                cur.jump_to(close + 2);
            }
            // no closing pair anywhere later; the rest stays literal
            None => break,
        }
    }
    found
}

fn find_block_close(source: &str, zones: &[Span], from: usize) -> Option<usize> {
    let mut cur = Cursor::at(source, from);
    while !cur.eof() {
        if let Some(zone) = zone_at(zones, cur.pos()) {
            cur.jump_to(zone.end);
            continue;
        }
        if cur.starts_with(b"$$") && !is_escaped(&cur) {
            return Some(cur.pos());
        }
        cur.bump();
    }
    None
}

/// Pass 2: `$…$` on a single line, and TOC markers.
fn find_inline_regions(
    source: &str,
    zones: &[Span],
    blocks: &[Span],
) -> Vec<(Span, FragmentKind)> {
    let occupied = |pos: usize| zone_at(zones, pos).or_else(|| zone_at(blocks, pos));
    let mut found = Vec::new();
    let mut cur = Cursor::at(source, 0);

    while !cur.eof() {
        if let Some(span) = occupied(cur.pos()) {
            cur.jump_to(span.end);
            continue;
        }

        if cur.peek() == Some(b'[') {
            let marker_len = if cur.starts_with_ignore_case(b"[[toc]]") {
                7
            } else if cur.starts_with_ignore_case(b"[toc]") {
                5
            } else {
                0
            };
            if marker_len > 0 {
                let start = cur.pos();
                found.push((Span::new(start, start + marker_len), FragmentKind::TocMarker));
                cur.bump_n(marker_len);
                continue;
            }
        }

        if cur.peek() == Some(b'$') && !is_escaped(&cur) {
            let start = cur.pos();
            if let Some(end) = find_inline_close(source, start + 1, &occupied) {
                found.push((Span::new(start, end), FragmentKind::MathInline));
                cur.jump_to(end);
                continue;
            }
        }
        cur.bump();
    }
    found
}

/// Returns the end of an inline math span whose body starts at `from`.
fn find_inline_close(
    source: &str,
    from: usize,
    occupied: &impl Fn(usize) -> Option<Span>,
) -> Option<usize> {
    let mut cur = Cursor::at(source, from);
    while let Some(b) = cur.peek() {
        if b == b'\n' || occupied(cur.pos()).is_some() {
            return None;
        }
        if b == b'$' && !is_escaped(&cur) {
            return (cur.pos() > from).then_some(cur.pos() + 1);
        }
        cur.bump();
    }
    None
}

/// One placeholder token found in converted text.
struct TokenHit {
    start: usize,
    end: usize,
    index: usize,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn has_toc(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| f.kind == FragmentKind::TocMarker)
    }

    /// The sentinel characters bracketing every token of this pass.
    pub fn sentinels(&self) -> (char, char) {
        (self.open, self.close)
    }

    fn next_token(&self, text: &str, from: usize) -> Option<TokenHit> {
        let mut search = from;
        loop {
            let start = search + text.get(search..)?.find(self.open)?;
            let body = start + self.open.len_utf8();
            let digits = text[body..]
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let after = body + digits;
            if digits > 0 && text[after..].starts_with(self.close) {
                if let Ok(index) = text[body..after].parse::<usize>() {
                    if index < self.fragments.len() {
                        return Some(TokenHit {
                            start,
                            end: after + self.close.len_utf8(),
                            index,
                        });
                    }
                }
            }
            search = body;
        }
    }

    /// Replace tokens in `text` with the original source of their fragment.
    pub fn reveal(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        while let Some(hit) = self.next_token(text, last) {
            out.push_str(&text[last..hit.start]);
            out.push_str(&self.fragments[hit.index].original_text);
            last = hit.end;
        }
        out.push_str(&text[last..]);
        out
    }

    /// Replace tokens in converted HTML with whatever `resolve` produces.
    pub fn restore<F>(&self, html: &str, mut resolve: F) -> String
    where
        F: FnMut(&ProtectedFragment, Placement) -> String,
    {
        const OPEN_P: &str = "<p>";
        const CLOSE_P: &str = "</p>";

        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        while let Some(hit) = self.next_token(html, last) {
            out.push_str(&html[last..hit.start]);
            let fragment = &self.fragments[hit.index];
            let block_kind = matches!(
                fragment.kind,
                FragmentKind::MathBlock | FragmentKind::TocMarker
            );
            let standalone =
                block_kind && out.ends_with(OPEN_P) && html[hit.end..].starts_with(CLOSE_P);

            if standalone {
                out.truncate(out.len() - OPEN_P.len());
                out.push_str(&resolve(fragment, Placement::Standalone));
                last = hit.end + CLOSE_P.len();
            } else {
                out.push_str(&resolve(fragment, Placement::Inline));
                last = hit.end;
            }
        }
        out.push_str(&html[last..]);
        out
    }
}
