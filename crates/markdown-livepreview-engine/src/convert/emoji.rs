//! `:name:` shortcodes.

use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

const TABLE: &[(&str, &str)] = &[
    ("smile", "\u{1F604}"),
    ("laughing", "\u{1F606}"),
    ("blush", "\u{1F60A}"),
    ("heart_eyes", "\u{1F60D}"),
    ("sunglasses", "\u{1F60E}"),
    ("thinking", "\u{1F914}"),
    ("thumbsup", "\u{1F44D}"),
    ("thumbsdown", "\u{1F44E}"),
    ("clap", "\u{1F44F}"),
    ("fire", "\u{1F525}"),
    ("rocket", "\u{1F680}"),
    ("star", "\u{2B50}"),
    ("heart", "\u{2764}\u{FE0F}"),
    ("check", "\u{2705}"),
    ("heavy_check_mark", "\u{2705}"),
    ("x", "\u{274C}"),
    ("warning", "\u{26A0}\u{FE0F}"),
    ("bulb", "\u{1F4A1}"),
    ("book", "\u{1F4D6}"),
    ("link", "\u{1F517}"),
    ("sparkles", "\u{2728}"),
    ("zap", "\u{26A1}"),
    ("bug", "\u{1F41B}"),
    ("wrench", "\u{1F527}"),
    ("gear", "\u{2699}\u{FE0F}"),
    ("lock", "\u{1F512}"),
    ("key", "\u{1F511}"),
    ("megaphone", "\u{1F4E3}"),
    ("bell", "\u{1F514}"),
    ("gift", "\u{1F381}"),
    ("calendar", "\u{1F4C5}"),
    ("clock", "\u{1F552}"),
    ("email", "\u{1F4E7}"),
    ("phone", "\u{1F4DE}"),
    ("computer", "\u{1F4BB}"),
    ("folder", "\u{1F4C1}"),
    ("file_folder", "\u{1F4C1}"),
    ("file", "\u{1F4C4}"),
    ("pencil", "\u{270F}\u{FE0F}"),
    ("memo", "\u{1F4DD}"),
    ("clipboard", "\u{1F4CB}"),
    ("chart", "\u{1F4CA}"),
    ("bar_chart", "\u{1F4CA}"),
    ("search", "\u{1F50D}"),
    ("eyes", "\u{1F440}"),
    ("wave", "\u{1F44B}"),
    ("pray", "\u{1F64F}"),
    ("muscle", "\u{1F4AA}"),
    ("tada", "\u{1F389}"),
    ("party", "\u{1F389}"),
    ("balloon", "\u{1F388}"),
    ("crown", "\u{1F451}"),
    ("trophy", "\u{1F3C6}"),
    ("medal", "\u{1F3C5}"),
    ("100", "\u{1F4AF}"),
    ("plus1", "\u{1F44D}"),
    ("+1", "\u{1F44D}"),
    ("minus1", "\u{1F44E}"),
    ("-1", "\u{1F44E}"),
    ("question", "\u{2753}"),
    ("exclamation", "\u{2757}"),
    ("info", "\u{2139}\u{FE0F}"),
    ("arrow_up", "\u{2B06}\u{FE0F}"),
    ("arrow_down", "\u{2B07}\u{FE0F}"),
    ("arrow_left", "\u{2B05}\u{FE0F}"),
    ("arrow_right", "\u{27A1}\u{FE0F}"),
    ("coffee", "\u{2615}"),
    ("pizza", "\u{1F355}"),
    ("beer", "\u{1F37A}"),
    ("cake", "\u{1F370}"),
    ("sun", "\u{2600}\u{FE0F}"),
    ("moon", "\u{1F319}"),
    ("cloud", "\u{2601}\u{FE0F}"),
    ("rain", "\u{1F327}\u{FE0F}"),
    ("snow", "\u{2744}\u{FE0F}"),
    ("dog", "\u{1F436}"),
    ("cat", "\u{1F431}"),
    ("bird", "\u{1F426}"),
    ("tree", "\u{1F333}"),
    ("flower", "\u{1F33B}"),
    ("earth", "\u{1F30D}"),
    ("airplane", "\u{2708}\u{FE0F}"),
    ("car", "\u{1F697}"),
    ("house", "\u{1F3E0}"),
    ("building", "\u{1F3E2}"),
    ("keyboard", "\u{2328}\u{FE0F}"),
    ("bookmark", "\u{1F516}"),
    ("art", "\u{1F3A8}"),
    ("abacus", "\u{1F9EE}"),
];

static EMOJI: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| TABLE.iter().copied().collect());

static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_+\-]+):").expect("valid shortcode regex"));

pub fn lookup(name: &str) -> Option<&'static str> {
    EMOJI.get(name).copied()
}

/// Replace known shortcodes in `text`; unknown ones are left as written.
///
/// After an unknown name the scan resumes at its closing colon, so
/// `:nope:smile:` still finds `:smile:`.
pub fn expand(text: &str) -> Cow<'_, str> {
    if !text.contains(':') {
        return Cow::Borrowed(text);
    }

    let mut out = String::new();
    let mut last = 0;
    let mut at = 0;
    while let Some(caps) = SHORTCODE.captures_at(text, at) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = caps.get(1).map_or("", |m| m.as_str());
        match lookup(name) {
            Some(glyph) => {
                out.push_str(&text[last..whole.start]);
                out.push_str(glyph);
                last = whole.end;
                at = whole.end;
            }
            None => at = whole.end - 1,
        }
    }

    if last == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn table_has_unique_names() {
        assert_eq!(EMOJI.len(), TABLE.len());
    }

    #[rstest]
    #[case("hello :smile:", "hello \u{1F604}")]
    #[case(":rocket::fire:", "\u{1F680}\u{1F525}")]
    #[case(":100: done", "\u{1F4AF} done")]
    #[case(":+1:", "\u{1F44D}")]
    #[case(":nope: stays", ":nope: stays")]
    #[case(":nope:smile:", ":nope\u{1F604}")]
    #[case("a: b: c", "a: b: c")]
    #[case("10:30:45", "10:30:45")]
    fn expands_known_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input), expected);
    }

    #[test]
    fn borrowed_when_nothing_changes() {
        assert!(matches!(expand("no codes here"), Cow::Borrowed(_)));
        assert!(matches!(expand(":unknown:"), Cow::Borrowed(_)));
    }
}
