//! Fenced code block dispatch.
//!
//! Every fenced block goes through a [`FenceRegistry`]: a handler registered
//! for the block's language tag if there is one, otherwise the default.

use super::highlight::{Highlighter, SyntectHighlighter};
use crate::typeset::{DiagramIdGenerator, DiagramIds, DiagramNode};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::collections::HashMap;
use std::rc::Rc;

/// A fenced code block as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// The full info string after the opening fence.
    pub info: String,
    pub code: String,
}

impl FencedBlock {
    /// First word of the info string, if any.
    pub fn language(&self) -> Option<&str> {
        self.info.split_whitespace().next()
    }
}

/// Per-pass state shared by fence handlers.
#[derive(Debug)]
pub struct FenceContext {
    pub ids: DiagramIdGenerator,
    pub diagrams: Vec<DiagramNode>,
}

impl FenceContext {
    pub fn new(ids: DiagramIds) -> Self {
        Self {
            ids: DiagramIdGenerator::new(ids),
            diagrams: Vec::new(),
        }
    }
}

/// Renders one fenced block to HTML. Must not fail: degrade to escaped text.
pub trait FenceHandler {
    fn render(&self, block: &FencedBlock, cx: &mut FenceContext) -> String;
}

#[derive(Clone)]
pub struct FenceRegistry {
    handlers: HashMap<String, Rc<dyn FenceHandler>>,
    default: Rc<dyn FenceHandler>,
}

impl FenceRegistry {
    pub fn new(default: impl FenceHandler + 'static) -> Self {
        Self {
            handlers: HashMap::new(),
            default: Rc::new(default),
        }
    }

    /// Highlighting by default, diagram placeholders for `diagram_language`.
    pub fn standard(diagram_language: &str) -> Self {
        Self::new(HighlightFence::default()).with_handler(&[diagram_language], DiagramFence)
    }

    /// Register a handler for one or more language tags (case-insensitive).
    pub fn with_handler(mut self, languages: &[&str], handler: impl FenceHandler + 'static) -> Self {
        let handler: Rc<dyn FenceHandler> = Rc::new(handler);
        for language in languages {
            self.handlers
                .insert(language.to_ascii_lowercase(), handler.clone());
        }
        self
    }

    pub fn handles(&self, language: &str) -> bool {
        self.handlers.contains_key(&language.to_ascii_lowercase())
    }

    pub fn render(&self, block: &FencedBlock, cx: &mut FenceContext) -> String {
        let handler = block
            .language()
            .and_then(|lang| self.handlers.get(&lang.to_ascii_lowercase()))
            .unwrap_or(&self.default);
        handler.render(block, cx)
    }
}

impl std::fmt::Debug for FenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.handlers.keys().collect();
        languages.sort();
        f.debug_struct("FenceRegistry")
            .field("languages", &languages)
            .finish_non_exhaustive()
    }
}

/// `<pre><code class="hljs language-LANG">` with highlighted content when the
/// highlighter knows the language, escaped plain text otherwise.
pub struct HighlightFence {
    highlighter: Box<dyn Highlighter>,
}

impl Default for HighlightFence {
    fn default() -> Self {
        Self::new(SyntectHighlighter::new())
    }
}

impl HighlightFence {
    pub fn new(highlighter: impl Highlighter + 'static) -> Self {
        Self {
            highlighter: Box::new(highlighter),
        }
    }
}

impl FenceHandler for HighlightFence {
    fn render(&self, block: &FencedBlock, _cx: &mut FenceContext) -> String {
        let Some(lang) = block.language() else {
            return format!(
                "<pre><code class=\"hljs\">{}</code></pre>\n",
                encode_text(&block.code)
            );
        };

        let body = if self.highlighter.is_language_supported(lang) {
            match self.highlighter.highlight(&block.code, lang) {
                Ok(html) => html,
                Err(e) => {
                    log::warn!("{e}; rendering {lang} block as plain text");
                    encode_text(&block.code).into_owned()
                }
            }
        } else {
            encode_text(&block.code).into_owned()
        };
        format!(
            "<pre><code class=\"hljs language-{}\">{body}</code></pre>\n",
            encode_double_quoted_attribute(lang)
        )
    }
}

/// Emits a diagram placeholder and records the diagram for later typesetting.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagramFence;

impl FenceHandler for DiagramFence {
    fn render(&self, block: &FencedBlock, cx: &mut FenceContext) -> String {
        let id = cx.ids.next_id();
        let html = format!(
            "<div class=\"mermaid\" id=\"{}\">{}</div>\n",
            encode_double_quoted_attribute(&id),
            encode_text(&block.code)
        );
        cx.diagrams.push(DiagramNode {
            id,
            source_text: block.code.clone(),
        });
        html
    }
}
