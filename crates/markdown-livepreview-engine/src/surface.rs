//! The display surface: the committed document plus the state of every
//! diagram placeholder in it.
//!
//! A commit replaces everything. Diagram completions arrive later and are
//! applied only if they belong to the generation currently on the surface and
//! their placeholder is still waiting; anything else is dropped.

use html_escape::{decode_html_entities, encode_text};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::typeset::{DiagramError, DiagramNode};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="mermaid" id="([^"]*)">([^<]*)</div>"#)
        .expect("valid placeholder regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramSlot {
    Pending { source: String },
    Rendered(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The completion no longer matches anything on the surface.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Markup(String),
    Diagram(String),
}

#[derive(Debug, Default)]
pub struct Surface {
    generation: u64,
    segments: Vec<Segment>,
    slots: HashMap<String, DiagramSlot>,
}

/// Error block shown in place of a diagram that failed to render.
pub fn diagram_error_block(message: &str) -> String {
    format!(
        "<pre class=\"mermaid-error\">Mermaid error: {}</pre>",
        encode_text(message)
    )
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the surface content with sanitized `html` from pass `generation`.
    pub fn commit(&mut self, generation: u64, html: &str) {
        self.generation = generation;
        self.segments.clear();
        self.slots.clear();

        let mut seen = HashSet::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(html) {
            let (Some(whole), Some(id), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let id = id.as_str();
            if id.is_empty() || !seen.insert(id.to_string()) {
                // duplicate ids stay plain markup
                continue;
            }
            if whole.start() > last {
                self.segments
                    .push(Segment::Markup(html[last..whole.start()].to_string()));
            }
            self.segments.push(Segment::Diagram(id.to_string()));
            self.slots.insert(
                id.to_string(),
                DiagramSlot::Pending {
                    source: decode_html_entities(body.as_str()).into_owned(),
                },
            );
            last = whole.end();
        }
        if last < html.len() {
            self.segments.push(Segment::Markup(html[last..].to_string()));
        }
    }

    /// Apply a diagram completion issued under `generation`.
    pub fn resolve(
        &mut self,
        generation: u64,
        id: &str,
        outcome: Result<String, DiagramError>,
    ) -> Resolution {
        if generation != self.generation {
            return Resolution::Stale;
        }
        let Some(slot) = self.slots.get_mut(id) else {
            return Resolution::Stale;
        };
        if !matches!(slot, DiagramSlot::Pending { .. }) {
            return Resolution::Stale;
        }
        *slot = match outcome {
            Ok(svg) => DiagramSlot::Rendered(svg),
            Err(err) => DiagramSlot::Failed(err.to_string()),
        };
        Resolution::Applied
    }

    pub fn slot(&self, id: &str) -> Option<&DiagramSlot> {
        self.slots.get(id)
    }

    /// Diagrams still waiting for their typesetter, in document order.
    pub fn pending_diagrams(&self) -> Vec<DiagramNode> {
        self.diagram_ids()
            .filter_map(|id| match self.slots.get(id) {
                Some(DiagramSlot::Pending { source }) => Some(DiagramNode {
                    id: id.to_string(),
                    source_text: source.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.slots
            .values()
            .any(|slot| matches!(slot, DiagramSlot::Pending { .. }))
    }

    /// Ids of all diagram placeholders, in document order.
    pub fn diagram_ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Diagram(id) => Some(id.as_str()),
            Segment::Markup(_) => None,
        })
    }

    /// Current content with every diagram slot in its present state.
    pub fn html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(markup) => out.push_str(markup),
                Segment::Diagram(id) => {
                    let id_attr = html_escape::encode_double_quoted_attribute(id);
                    match self.slots.get(id) {
                        Some(DiagramSlot::Pending { source }) => {
                            out.push_str(&format!(
                                "<div class=\"mermaid\" id=\"{id_attr}\">{}</div>",
                                encode_text(source)
                            ));
                        }
                        Some(DiagramSlot::Rendered(svg)) => {
                            out.push_str(&format!(
                                "<div class=\"mermaid\" id=\"{id_attr}\" data-processed=\"true\">{svg}</div>"
                            ));
                        }
                        Some(DiagramSlot::Failed(message)) => {
                            out.push_str(&format!(
                                "<div class=\"mermaid\" id=\"{id_attr}\" data-processed=\"true\">{}</div>",
                                diagram_error_block(message)
                            ));
                        }
                        None => {}
                    }
                }
            }
        }
        out
    }
}
