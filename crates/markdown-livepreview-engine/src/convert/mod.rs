//! Markdown to raw (unsanitized) HTML.
//!
//! pulldown-cmark does the CommonMark/GFM parsing. Its event stream is run
//! through [`EventProcessor`], which adds what the engine does not do on its
//! own (heading ids, task-list classes, footnote layout, emoji, fenced block
//! dispatch) before a single `push_html` call.

pub mod emoji;
pub mod fence;
pub mod highlight;
pub mod slug;

use crate::extract::Extracted;
use crate::typeset::{DiagramIds, DiagramNode};
use fence::{FenceContext, FenceRegistry, FencedBlock};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use slug::Slugger;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

pub use fence::{DiagramFence, FenceHandler, HighlightFence};
pub use highlight::{HighlightError, Highlighter, SyntectHighlighter};

pub fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// Output of one conversion.
#[derive(Debug, Clone, Default)]
pub struct Converted {
    pub html: String,
    /// Diagram blocks in document order.
    pub diagrams: Vec<DiagramNode>,
}

/// Converts extractor output to HTML.
#[derive(Debug)]
pub struct Converter<'r> {
    fences: &'r FenceRegistry,
    ids: DiagramIds,
}

impl<'r> Converter<'r> {
    pub fn new(fences: &'r FenceRegistry, ids: DiagramIds) -> Self {
        Self { fences, ids }
    }

    /// Convert placeholder-substituted text. Placeholder tokens survive as
    /// text in the output, except where they cannot be resolved later
    /// (attributes, code) and are revealed to their original source instead.
    pub fn convert(&self, extracted: &Extracted) -> Converted {
        let events: Vec<Event<'_>> =
            TextMergeStream::new(Parser::new_ext(&extracted.text, markdown_options())).collect();

        let defined = events
            .iter()
            .filter_map(|e| match e {
                Event::Start(Tag::FootnoteDefinition(label)) => Some(label.to_lowercase()),
                _ => None,
            })
            .collect();

        let mut processor = EventProcessor::new(extracted, self.fences, self.ids, defined);
        for event in events {
            processor.process_event(event);
        }
        processor.finalize()
    }
}

/// Fenced block being accumulated.
struct OpenCode {
    info: String,
    code: String,
}

/// Heading being accumulated: where its start event sits and its plain text.
struct OpenHeading {
    index: usize,
    text: String,
}

/// Rewrites the pulldown-cmark event stream.
///
/// Footnote definitions are diverted out of the main stream while they are
/// read and laid out again at the end, in order of first reference. Anything
/// else is rewritten in place into `out`.
struct EventProcessor<'a, 'r> {
    extracted: &'a Extracted,
    fences: &'r FenceRegistry,
    fence_cx: FenceContext,

    out: Vec<Event<'a>>,
    /// Definition currently being read: normalized label and its events.
    footnote: Option<(String, Vec<Event<'a>>)>,
    /// Every definition label present in the document, lowercased.
    defined: HashSet<String>,
    definitions: HashMap<String, Vec<Event<'a>>>,
    /// Footnote number per label, assigned on first reference.
    numbers: HashMap<String, usize>,
    /// Labels in order of first reference.
    referenced: Vec<String>,
    reference_counts: HashMap<String, usize>,

    slugger: Slugger,
    heading: Option<OpenHeading>,
    code: Option<OpenCode>,
    image_depth: usize,
}

impl<'a, 'r> EventProcessor<'a, 'r> {
    fn new(
        extracted: &'a Extracted,
        fences: &'r FenceRegistry,
        ids: DiagramIds,
        defined: HashSet<String>,
    ) -> Self {
        Self {
            extracted,
            fences,
            fence_cx: FenceContext::new(ids),
            out: Vec::new(),
            footnote: None,
            defined,
            definitions: HashMap::new(),
            numbers: HashMap::new(),
            referenced: Vec::new(),
            reference_counts: HashMap::new(),
            slugger: Slugger::new(),
            heading: None,
            code: None,
            image_depth: 0,
        }
    }

    fn sink(&mut self) -> &mut Vec<Event<'a>> {
        match &mut self.footnote {
            Some((_, events)) => events,
            None => &mut self.out,
        }
    }

    fn push(&mut self, event: Event<'a>) {
        self.sink().push(event);
    }

    fn reveal(&self, text: &str) -> CowStr<'a> {
        if self.extracted.is_empty() {
            CowStr::from(text.to_string())
        } else {
            CowStr::from(self.extracted.reveal(text))
        }
    }

    fn process_event(&mut self, event: Event<'a>) {
        if let Some(code) = &mut self.code {
            match event {
                Event::Text(text) => code.code.push_str(&text),
                Event::End(TagEnd::CodeBlock) => self.close_code_block(),
                other => log::trace!("ignoring {other:?} inside code block"),
            }
            return;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(OpenCode {
                    info,
                    code: String::new(),
                });
            }

            Event::Start(Tag::Heading { .. }) => {
                let index = self.sink().len();
                self.push(event);
                self.heading = Some(OpenHeading {
                    index,
                    text: String::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                self.close_heading();
                self.push(event);
            }

            Event::Start(Tag::FootnoteDefinition(label)) => {
                self.footnote = Some((label.to_lowercase(), Vec::new()));
            }
            Event::End(TagEnd::FootnoteDefinition) => {
                if let Some((label, events)) = self.footnote.take() {
                    if self.definitions.contains_key(&label) {
                        log::debug!("duplicate footnote definition [^{label}] ignored");
                    } else {
                        self.definitions.insert(label, events);
                    }
                }
            }
            Event::FootnoteReference(label) => self.footnote_reference(&label),

            Event::TaskListMarker(_) => {
                let sink = self.sink();
                if let Some(pos) = sink
                    .iter()
                    .rposition(|e| matches!(e, Event::Start(Tag::Item)))
                {
                    sink[pos] = Event::Html(CowStr::Borrowed("<li class=\"task-list-item\">"));
                }
                self.push(event);
            }

            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                self.image_depth += 1;
                let (dest_url, title) = (self.reveal(&dest_url), self.reveal(&title));
                self.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::End(TagEnd::Image) => {
                self.image_depth = self.image_depth.saturating_sub(1);
                self.push(event);
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let (dest_url, title) = (self.reveal(&dest_url), self.reveal(&title));
                self.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }

            Event::Text(text) => {
                if let Some(heading) = &mut self.heading {
                    heading.text.push_str(&self.extracted.reveal(&text));
                }
                let text = if self.image_depth > 0 {
                    self.reveal(&text)
                } else {
                    text
                };
                let expanded = match emoji::expand(&text) {
                    Cow::Owned(s) => Some(s),
                    Cow::Borrowed(_) => None,
                };
                self.push(Event::Text(expanded.map_or(text, CowStr::from)));
            }
            Event::Code(code) => {
                let code = self.reveal(&code);
                if let Some(heading) = &mut self.heading {
                    heading.text.push_str(&code);
                }
                self.push(Event::Code(code));
            }

            other => self.push(other),
        }
    }

    fn close_heading(&mut self) {
        let Some(heading) = self.heading.take() else {
            return;
        };
        let Some(slug) = self.slugger.slug(&heading.text) else {
            return;
        };
        if let Some(Event::Start(Tag::Heading { id, .. })) = self.sink().get_mut(heading.index) {
            *id = Some(CowStr::from(slug));
        }
    }

    fn close_code_block(&mut self) {
        let Some(open) = self.code.take() else {
            return;
        };
        let block = FencedBlock {
            info: open.info,
            code: self.extracted.reveal(&open.code),
        };
        let html = self.fences.render(&block, &mut self.fence_cx);
        self.push(Event::Html(CowStr::from(html)));
    }

    fn footnote_reference(&mut self, label: &str) {
        let key = label.to_lowercase();
        if !self.defined.contains(&key) {
            self.push(Event::Text(CowStr::from(format!("[^{label}]"))));
            return;
        }

        let next = self.numbers.len() + 1;
        let number = *self.numbers.entry(key.clone()).or_insert_with(|| {
            self.referenced.push(key.clone());
            next
        });
        let count = self.reference_counts.entry(key).or_insert(0);
        *count += 1;
        let ref_id = if *count == 1 {
            format!("fnref-{number}")
        } else {
            format!("fnref-{number}-{count}")
        };
        self.push(Event::InlineHtml(CowStr::from(format!(
            "<sup class=\"footnote-ref\"><a href=\"#fn-{number}\" id=\"{ref_id}\">{number}</a></sup>"
        ))));
    }

    /// Emit the footnote section after the document body.
    fn push_footnotes(&mut self) {
        for (label, _) in self
            .definitions
            .iter()
            .filter(|(label, _)| !self.numbers.contains_key(*label))
        {
            log::debug!("footnote [^{label}] is never referenced, dropping it");
        }
        if self.referenced.is_empty() {
            return;
        }

        self.out.push(Event::Html(CowStr::Borrowed(
            "<section class=\"footnotes\">\n<ol>\n",
        )));
        for label in std::mem::take(&mut self.referenced) {
            let number = self.numbers.get(&label).copied().unwrap_or_default();
            let mut body = self.definitions.remove(&label).unwrap_or_default();
            let backref = Event::InlineHtml(CowStr::from(format!(
                " <a href=\"#fnref-{number}\" class=\"footnote-backref\">\u{21A9}</a>"
            )));
            match body
                .iter()
                .rposition(|e| matches!(e, Event::End(TagEnd::Paragraph)))
            {
                Some(pos) => body.insert(pos, backref),
                None => body.push(backref),
            }

            self.out.push(Event::Html(CowStr::from(format!(
                "<li id=\"fn-{number}\">\n"
            ))));
            self.out.extend(body);
            self.out.push(Event::Html(CowStr::Borrowed("</li>\n")));
        }
        self.out
            .push(Event::Html(CowStr::Borrowed("</ol>\n</section>\n")));
    }

    fn finalize(mut self) -> Converted {
        // a definition left open by a malformed stream still gets kept
        if let Some((label, events)) = self.footnote.take() {
            self.definitions.entry(label).or_insert(events);
        }
        self.push_footnotes();

        let mut html = String::with_capacity(self.out.len() * 16);
        pulldown_cmark::html::push_html(&mut html, self.out.into_iter());
        Converted {
            html,
            diagrams: self.fence_cx.diagrams,
        }
    }
}
