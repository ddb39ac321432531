/// A byte cursor over the source text used by the region scanners.
///
/// Only ASCII delimiters (`$`, `` ` ``, `[`, `\`) are ever matched, so moving
/// byte-by-byte never splits a delimiter; slicing is done at delimiter
/// positions only.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// The text being scanned.
    pub s: &'a str,
    /// Current byte index into `s`.
    pub i: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at byte `i` of `s`.
    pub fn at(s: &'a str, i: usize) -> Self {
        Self { s, i }
    }

    /// Returns the current byte position.
    pub fn pos(&self) -> usize {
        self.i
    }

    /// Returns true if at end of string.
    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    /// Peeks at the current byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.s.as_bytes().get(self.i).copied()
    }

    /// Peeks at the byte before the current position.
    pub fn prev(&self) -> Option<u8> {
        self.i
            .checked_sub(1)
            .and_then(|p| self.s.as_bytes().get(p).copied())
    }

    /// Checks if the remaining input starts with the given byte pattern.
    pub fn starts_with(&self, pat: &[u8]) -> bool {
        self.s.as_bytes().get(self.i..).is_some_and(|rest| rest.starts_with(pat))
    }

    /// Like [`Cursor::starts_with`] but ignoring ASCII case.
    pub fn starts_with_ignore_case(&self, pat: &[u8]) -> bool {
        self.s
            .as_bytes()
            .get(self.i..self.i + pat.len())
            .is_some_and(|rest| rest.eq_ignore_ascii_case(pat))
    }

    /// Advances by one byte, returning the consumed byte.
    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.i += 1;
        Some(b)
    }

    /// Advances by `n` bytes.
    pub fn bump_n(&mut self, n: usize) {
        self.i += n;
    }

    /// Moves the cursor to an absolute byte position.
    pub fn jump_to(&mut self, i: usize) {
        self.i = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_basics() {
        let mut cur = Cursor::at("$x$", 0);
        assert_eq!(cur.pos(), 0);
        assert!(!cur.eof());
        assert_eq!(cur.peek(), Some(b'$'));
        assert_eq!(cur.prev(), None);
        assert_eq!(cur.bump(), Some(b'$'));
        assert_eq!(cur.prev(), Some(b'$'));
        assert_eq!(cur.pos(), 1);
    }

    #[test]
    fn starts_with_ignore_case_matches_toc_marker() {
        let cur = Cursor::at("see [toc] here", 4);
        assert!(cur.starts_with_ignore_case(b"[TOC]"));
        assert!(!cur.starts_with(b"[TOC]"));
    }

    #[test]
    fn starts_with_pattern_longer_than_remaining() {
        let cur = Cursor::at("$$", 1);
        assert!(!cur.starts_with(b"$$"));
        assert!(!cur.starts_with_ignore_case(b"[toc]"));
        assert!(cur.starts_with(b"$"));
    }

    #[test]
    fn bump_at_eof_returns_none() {
        let mut cur = Cursor::at("x", 0);
        assert_eq!(cur.bump(), Some(b'x'));
        assert!(cur.eof());
        assert_eq!(cur.bump(), None);
    }

    #[test]
    fn jump_to_repositions() {
        let mut cur = Cursor::at("hello", 0);
        cur.jump_to(4);
        assert_eq!(cur.peek(), Some(b'o'));
        cur.bump_n(1);
        assert!(cur.eof());
    }
}
