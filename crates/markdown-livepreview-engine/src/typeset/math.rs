//! Math typesetting.
//!
//! With the default `katex` feature, [`KatexMath`] renders to HTML on the
//! spot. [`MarkupMath`] is what remains without it: it checks the TeX for
//! structural errors and emits markup a client-side typesetter picks up
//! (`\(…\)` and `\[…\]` inside `math` spans).

use crate::extract::{MathFragment, Placement};
use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("empty math expression")]
    Empty,
    #[error("unbalanced braces")]
    UnbalancedBraces,
    #[error("expected \\end{{{expected}}}, found \\end{{{found}}}")]
    MismatchedEnvironment { expected: String, found: String },
    #[error("\\begin{{{0}}} is never closed")]
    UnclosedEnvironment(String),
    #[error("\\end{{{0}}} without matching \\begin")]
    UnexpectedEnd(String),
    #[error("unbalanced \\left and \\right")]
    UnbalancedDelimiters,
    #[error("{0}")]
    Engine(String),
}

/// Turns TeX into markup. `display` selects display mode over inline mode.
pub trait MathTypesetter {
    fn typeset(&self, tex: &str, display: bool) -> Result<String, MathError>;
}

static ENVIRONMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(begin|end)\s*\{([^}]*)\}").expect("valid environment regex")
});

static SIZED_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(left|right)([^a-zA-Z]|$)").expect("valid delimiter regex"));

/// Structural checks shared by the typesetters.
pub fn validate(tex: &str) -> Result<(), MathError> {
    if tex.trim().is_empty() {
        return Err(MathError::Empty);
    }

    let mut depth: usize = 0;
    let mut chars = tex.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1).ok_or(MathError::UnbalancedBraces)?,
            _ => {}
        }
    }
    if depth != 0 {
        return Err(MathError::UnbalancedBraces);
    }

    let mut open: Vec<&str> = Vec::new();
    for caps in ENVIRONMENT.captures_iter(tex) {
        let name = caps.get(2).map_or("", |m| m.as_str().trim());
        if &caps[1] == "begin" {
            open.push(name);
            continue;
        }
        match open.pop() {
            Some(expected) if expected == name => {}
            Some(expected) => {
                return Err(MathError::MismatchedEnvironment {
                    expected: expected.to_string(),
                    found: name.to_string(),
                });
            }
            None => return Err(MathError::UnexpectedEnd(name.to_string())),
        }
    }
    if let Some(name) = open.pop() {
        return Err(MathError::UnclosedEnvironment(name.to_string()));
    }

    let mut sized: usize = 0;
    for caps in SIZED_DELIMITER.captures_iter(tex) {
        if &caps[1] == "left" {
            sized += 1;
        } else {
            sized = sized
                .checked_sub(1)
                .ok_or(MathError::UnbalancedDelimiters)?;
        }
    }
    if sized != 0 {
        return Err(MathError::UnbalancedDelimiters);
    }
    Ok(())
}

/// Emits escaped TeX in `math-inline` / `math-display` spans for a
/// client-side typesetter.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupMath;

impl MathTypesetter for MarkupMath {
    fn typeset(&self, tex: &str, display: bool) -> Result<String, MathError> {
        validate(tex)?;
        let escaped = encode_text(tex);
        Ok(if display {
            format!(r#"<span class="math math-display">\[{escaped}\]</span>"#)
        } else {
            format!(r#"<span class="math math-inline">\({escaped}\)</span>"#)
        })
    }
}

/// Server-side rendering through KaTeX.
#[cfg(feature = "katex")]
#[derive(Debug, Default, Clone, Copy)]
pub struct KatexMath;

#[cfg(feature = "katex")]
impl MathTypesetter for KatexMath {
    fn typeset(&self, tex: &str, display: bool) -> Result<String, MathError> {
        if tex.trim().is_empty() {
            return Err(MathError::Empty);
        }
        let opts = katex::Opts::builder()
            .display_mode(display)
            .output_type(katex::OutputType::Html)
            .throw_on_error(true)
            .build()
            .map_err(|e| MathError::Engine(e.to_string()))?;
        katex::render_with_opts(tex, &opts).map_err(|e| MathError::Engine(e.to_string()))
    }
}

/// Visible error marker carrying the escaped source.
pub fn render_error(source: &str, err: &MathError) -> String {
    format!(
        r#"<span class="math-error" title="{}">{}</span>"#,
        encode_double_quoted_attribute(&err.to_string()),
        encode_text(source)
    )
}

/// Typeset one restored fragment. Never fails: errors become
/// [`render_error`] markers around `original` (the fragment with delimiters).
pub fn render_fragment(
    typesetter: &dyn MathTypesetter,
    math: MathFragment<'_>,
    original: &str,
    placement: Placement,
) -> String {
    match typesetter.typeset(math.tex.trim(), math.display) {
        Ok(markup) if math.display && placement == Placement::Standalone => {
            format!("<div class=\"math-block\">{markup}</div>")
        }
        Ok(markup) => markup,
        Err(err) => {
            log::debug!("math error in {original:?}: {err}");
            let marker = render_error(original, &err);
            if placement == Placement::Standalone {
                format!("<p>{marker}</p>")
            } else {
                marker
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("x^2")]
    #[case(r"\frac{a}{b}")]
    #[case(r"\{ x \}")]
    #[case(r"a \\ {b}")]
    #[case(r"\begin{matrix} a & b \end{matrix}")]
    #[case(r"\begin{cases} \begin{array}{c} 1 \end{array} \end{cases}")]
    #[case(r"\left( \frac{1}{2} \right)")]
    #[case(r"\left. x \right|")]
    #[case(r"\leftarrow \rightarrow")]
    fn valid_tex(#[case] tex: &str) {
        assert_eq!(validate(tex), Ok(()));
    }

    #[rstest]
    #[case("", MathError::Empty)]
    #[case("   ", MathError::Empty)]
    #[case(r"\frac{a}{b", MathError::UnbalancedBraces)]
    #[case("a}{", MathError::UnbalancedBraces)]
    #[case(r"\begin{matrix} a", MathError::UnclosedEnvironment("matrix".into()))]
    #[case(r"a \end{matrix}", MathError::UnexpectedEnd("matrix".into()))]
    #[case(
        r"\begin{matrix} a \end{array}",
        MathError::MismatchedEnvironment { expected: "matrix".into(), found: "array".into() }
    )]
    #[case(r"\left( x", MathError::UnbalancedDelimiters)]
    #[case(r"x \right)", MathError::UnbalancedDelimiters)]
    fn invalid_tex(#[case] tex: &str, #[case] expected: MathError) {
        assert_eq!(validate(tex), Err(expected));
    }

    #[test]
    fn inline_markup() {
        assert_snapshot!(
            MarkupMath.typeset("a<b", false).unwrap(),
            @r#"<span class="math math-inline">\(a&lt;b\)</span>"#
        );
    }

    #[test]
    fn display_markup() {
        assert_snapshot!(
            MarkupMath.typeset("x^2", true).unwrap(),
            @r#"<span class="math math-display">\[x^2\]</span>"#
        );
    }

    #[test]
    fn error_marker_escapes_source_and_message() {
        let err = MathError::MismatchedEnvironment {
            expected: "a".into(),
            found: "b".into(),
        };
        assert_snapshot!(
            render_error("$<x>$", &err),
            @r#"<span class="math-error" title="expected \end{a}, found \end{b}">$&lt;x&gt;$</span>"#
        );
    }

    #[test]
    fn standalone_display_is_wrapped_in_block() {
        let math = MathFragment {
            tex: " x^2 ",
            display: true,
        };
        let out = render_fragment(&MarkupMath, math, "$$ x^2 $$", Placement::Standalone);
        assert_eq!(
            out,
            "<div class=\"math-block\"><span class=\"math math-display\">\\[x^2\\]</span></div>"
        );
    }

    #[test]
    fn inline_placement_of_display_math_is_not_wrapped() {
        let math = MathFragment {
            tex: "x",
            display: true,
        };
        let out = render_fragment(&MarkupMath, math, "$$x$$", Placement::Inline);
        assert_eq!(out, r#"<span class="math math-display">\[x\]</span>"#);
    }

    #[test]
    fn failed_fragment_renders_marker() {
        let math = MathFragment {
            tex: r"\frac{a",
            display: false,
        };
        let out = render_fragment(&MarkupMath, math, r"$\frac{a$", Placement::Inline);
        assert!(out.starts_with(r#"<span class="math-error" title="unbalanced braces">"#));
        assert!(out.contains(r"$\frac{a$"));
    }

    #[cfg(feature = "katex")]
    #[test]
    fn katex_renders_and_rejects() {
        assert!(KatexMath.typeset("x^2", false).unwrap().contains("katex"));
        assert!(matches!(
            KatexMath.typeset(r"\frac{", false),
            Err(MathError::Engine(_))
        ));
    }
}
