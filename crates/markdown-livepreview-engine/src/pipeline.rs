//! The synchronous render pass.
//!
//! ```text
//! source ─ extract ─ convert ─ restore + typeset math ─ sanitize ─▶ html
//! ```
//!
//! Everything a pass needs comes in through [`RenderContext`]; there is no
//! ambient state, so the same source and context always give the same pass.

use crate::convert::Converter;
use crate::convert::fence::FenceRegistry;
use crate::extract::extract;
use crate::sanitize::{Sanitizer, SanitizerOptions};
use crate::toc::{self, TocEntry};
use crate::typeset::math::render_fragment;
use crate::typeset::{DiagramIds, DiagramNode, MathTypesetter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub dark_mode: bool,
    /// Fenced block language rendered as a diagram instead of code.
    pub diagram_language: String,
    pub diagram_ids: DiagramIds,
    pub sanitizer: SanitizerOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dark_mode: false,
            diagram_language: "mermaid".to_string(),
            diagram_ids: DiagramIds::default(),
            sanitizer: SanitizerOptions::default(),
        }
    }
}

/// Options plus the collaborators a pass calls out to.
pub struct RenderContext {
    pub options: RenderOptions,
    fences: FenceRegistry,
    math: Box<dyn MathTypesetter>,
    sanitizer: Sanitizer,
}

#[cfg(feature = "katex")]
fn default_math() -> Box<dyn MathTypesetter> {
    Box::new(crate::typeset::KatexMath)
}

#[cfg(not(feature = "katex"))]
fn default_math() -> Box<dyn MathTypesetter> {
    Box::new(crate::typeset::MarkupMath)
}

impl RenderContext {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            fences: FenceRegistry::standard(&options.diagram_language),
            math: default_math(),
            sanitizer: Sanitizer::new(options.sanitizer.clone()),
            options,
        }
    }

    pub fn with_math(mut self, math: impl MathTypesetter + 'static) -> Self {
        self.math = Box::new(math);
        self
    }

    pub fn with_fences(mut self, fences: FenceRegistry) -> Self {
        self.fences = fences;
        self
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("options", &self.options)
            .field("fences", &self.fences)
            .finish_non_exhaustive()
    }
}

/// Where a pass is. The pipeline itself moves through the synchronous states;
/// `Committed` and `TypesettingDiagrams` belong to the previewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Extracting,
    Converting,
    Typesetting,
    Sanitizing,
    Committed,
    TypesettingDiagrams,
}

/// Sanitized output of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    pub html: String,
    /// Diagram blocks found during conversion, in document order.
    pub diagrams: Vec<DiagramNode>,
    /// Only collected when the source holds a TOC marker.
    pub toc: Vec<TocEntry>,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    cx: RenderContext,
    state: PassState,
}

impl Pipeline {
    pub fn new(cx: RenderContext) -> Self {
        Self {
            cx,
            state: PassState::Idle,
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.cx
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn enter(&mut self, next: PassState) {
        log::trace!("pass state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one synchronous pass over `source`. Never fails: broken constructs
    /// degrade to literal text or local error markers.
    pub fn render(&mut self, source: &str) -> RenderedDocument {
        self.enter(PassState::Extracting);
        let extracted = extract(source);

        self.enter(PassState::Converting);
        let converted =
            Converter::new(&self.cx.fences, self.cx.options.diagram_ids).convert(&extracted);

        self.enter(PassState::Typesetting);
        let toc = if extracted.has_toc() {
            toc::collect(source)
        } else {
            Vec::new()
        };
        let restored = if extracted.is_empty() {
            converted.html
        } else {
            let toc_html = toc::render(&toc);
            let math = self.cx.math.as_ref();
            extracted.restore(&converted.html, |fragment, placement| {
                match fragment.math() {
                    Some(tex) => render_fragment(math, tex, &fragment.original_text, placement),
                    None => toc_html.clone(),
                }
            })
        };

        self.enter(PassState::Sanitizing);
        let html = self.cx.sanitizer.clean(&restored);

        self.enter(PassState::Idle);
        RenderedDocument {
            html,
            diagrams: converted.diagrams,
            toc,
        }
    }
}

/// One-shot render with default options.
pub fn render(source: &str) -> RenderedDocument {
    Pipeline::default().render(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeset::MarkupMath;
    use pretty_assertions::assert_eq;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            RenderContext::new(RenderOptions {
                diagram_ids: DiagramIds::Sequential,
                ..RenderOptions::default()
            })
            .with_math(MarkupMath),
        )
    }

    #[test]
    fn state_returns_to_idle() {
        let mut p = pipeline();
        p.render("# hi");
        assert_eq!(p.state(), PassState::Idle);
    }

    #[test]
    fn display_math_alone() {
        let doc = pipeline().render("$$x^2$$");
        assert_eq!(
            doc.html,
            "<div class=\"math-block\"><span class=\"math math-display\">\\[x^2\\]</span></div>\n"
        );
    }

    #[test]
    fn two_inline_math_spans() {
        let doc = pipeline().render("$a$ $b$");
        assert_eq!(
            doc.html,
            "<p><span class=\"math math-inline\">\\(a\\)</span> <span class=\"math math-inline\">\\(b\\)</span></p>\n"
        );
    }

    #[test]
    fn math_is_not_mangled_by_markdown() {
        let doc = pipeline().render("$a_1 * b_2 * c_3$");
        assert!(doc.html.contains("\\(a_1 * b_2 * c_3\\)"), "{}", doc.html);
        assert!(!doc.html.contains("<em>"));
    }

    #[test]
    fn invalid_math_is_a_local_error() {
        let doc = pipeline().render("ok $\\frac{a$ fine");
        assert!(doc.html.contains("<span class=\"math-error\" title=\"unbalanced braces\">"));
        assert!(doc.html.starts_with("<p>ok "));
        assert!(doc.html.ends_with(" fine</p>\n"));
    }

    #[test]
    fn toc_marker_becomes_navigation() {
        let doc = pipeline().render("[TOC]\n\n# A\n\n## B\n");
        assert_eq!(doc.toc.len(), 2);
        assert!(
            doc.html.starts_with(
                "<nav class=\"table-of-contents\"><h4>Table of Contents</h4><ul><li class=\"toc-level-1\"><a href=\"#a\""
            ),
            "{}",
            doc.html
        );
        assert!(doc.html.contains("<h1 id=\"a\">A</h1>"));
    }

    #[test]
    fn no_toc_without_marker() {
        let doc = pipeline().render("# A\n");
        assert!(doc.toc.is_empty());
        assert!(!doc.html.contains("table-of-contents"));
    }

    #[test]
    fn diagram_placeholder_survives_sanitizer() {
        let doc = pipeline().render("```mermaid\ngraph TD\n```\n");
        assert_eq!(
            doc.html,
            "<div class=\"mermaid\" id=\"mermaid-1\">graph TD\n</div>\n"
        );
        assert_eq!(doc.diagrams.len(), 1);
    }

    #[test]
    fn raw_script_is_stripped() {
        let doc = pipeline().render("<script>alert(1)</script>\n\n<img src=x onerror=alert(1)>");
        assert!(!doc.html.contains("alert"));
        assert!(!doc.html.contains("onerror"));
    }

    #[test]
    fn stray_backticks_in_separate_paragraphs_do_not_hide_math() {
        let doc = pipeline().render(
            "Press the ` key.\n\nEnergy is $E=mc^2$.\n\n[TOC]\n\n# H\n\nAnother ` here.\n",
        );
        assert!(doc.html.contains("math math-inline"), "{}", doc.html);
        assert!(doc.html.contains("table-of-contents"), "{}", doc.html);
        assert_eq!(doc.toc.len(), 1);
    }

    #[test]
    fn one_shot_render_uses_defaults() {
        let doc = render("*hi*");
        assert_eq!(doc.html, "<p><em>hi</em></p>\n");
    }

    #[cfg(feature = "katex")]
    mod katex_default {
        use super::*;
        use pretty_assertions::assert_eq;
        use rstest::rstest;

        #[test]
        fn inline_math_is_typeset_by_default() {
            let doc = render("$a$ $b$");
            assert_eq!(doc.html.matches("class=\"katex\"").count(), 2, "{}", doc.html);
            assert!(!doc.html.contains("\\(a\\)"));
        }

        #[test]
        fn radical_glyph_survives_sanitizer() {
            let doc = render("$$\\sqrt{b^2 - 4ac}$$");
            assert!(doc.html.starts_with("<div class=\"math-block\">"), "{}", doc.html);
            assert!(doc.html.contains("<svg"), "{}", doc.html);
            assert!(doc.html.contains("<path d="), "{}", doc.html);
        }

        #[rstest]
        #[case("$x^$")]
        #[case("$\\notacommand$")]
        fn engine_errors_are_local(#[case] source: &str) {
            let doc = render(&format!("before {source} after"));
            assert!(doc.html.contains("class=\"math-error\""), "{}", doc.html);
            assert!(doc.html.starts_with("<p>before "), "{}", doc.html);
        }
    }
}
