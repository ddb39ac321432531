//! The sanitization boundary.
//!
//! Every pass goes through [`Sanitizer::clean`]; there is no way to skip it.
//! The allow-list is ammonia's default plus what the pipeline itself emits
//! (task-list checkboxes, footnote sections, math spans and the SVG subset
//! KaTeX uses, class and id attributes) and embedded iframes with their
//! embedding controls.
//! [`SanitizerOptions`] can widen it, but never to script-capable tags or
//! event-handler attributes.

use ammonia::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tags no configuration may allow.
pub const FORBIDDEN_TAGS: &[&str] = &[
    "script", "style", "object", "embed", "base", "meta", "link", "noscript", "template", "frame",
    "frameset", "applet",
];

/// Attributes no configuration may allow, besides every `on*` handler.
pub const FORBIDDEN_ATTRIBUTES: &[&str] = &["srcdoc", "formaction"];

const EXTRA_TAGS: &[&str] = &["input", "section", "iframe", "nav", "svg", "path", "line"];
const GENERIC_ATTRIBUTES: &[&str] = &["class", "id"];
const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("input", &["type", "checked", "disabled"]),
    (
        "iframe",
        &[
            "src",
            "width",
            "height",
            "allow",
            "allowfullscreen",
            "frameborder",
            "scrolling",
            "title",
        ],
    ),
    ("span", &["style", "aria-hidden"]),
    // KaTeX draws radicals and stretchy glyphs with inline SVG
    (
        "svg",
        &[
            "xmlns",
            "width",
            "height",
            "viewBox",
            "viewbox",
            "preserveAspectRatio",
            "preserveaspectratio",
            "style",
        ],
    ),
    ("path", &["d"]),
    ("line", &["x1", "y1", "x2", "y2", "stroke-width"]),
];

/// Extra allow-list entries on top of the built-in list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerOptions {
    pub extra_tags: Vec<String>,
    /// Attributes per tag; the key `*` allows an attribute on every tag.
    pub extra_attributes: BTreeMap<String, Vec<String>>,
}

fn is_forbidden_tag(tag: &str) -> bool {
    FORBIDDEN_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_forbidden_attribute(attr: &str) -> bool {
    let attr = attr.to_ascii_lowercase();
    attr.starts_with("on") || FORBIDDEN_ATTRIBUTES.contains(&attr.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    options: SanitizerOptions,
}

impl Sanitizer {
    /// Drops (with a warning) any requested tag or attribute that could run
    /// script.
    pub fn new(options: SanitizerOptions) -> Self {
        let extra_tags = options
            .extra_tags
            .into_iter()
            .filter(|tag| {
                let forbidden = is_forbidden_tag(tag);
                if forbidden {
                    log::warn!("refusing to allow <{tag}> through the sanitizer");
                }
                !forbidden
            })
            .collect();

        let extra_attributes = options
            .extra_attributes
            .into_iter()
            .filter_map(|(tag, attrs)| {
                if tag != "*" && is_forbidden_tag(&tag) {
                    log::warn!("refusing attributes for forbidden tag <{tag}>");
                    return None;
                }
                let attrs: Vec<String> = attrs
                    .into_iter()
                    .filter(|attr| {
                        let forbidden = is_forbidden_attribute(attr);
                        if forbidden {
                            log::warn!("refusing to allow attribute {attr} on <{tag}>");
                        }
                        !forbidden
                    })
                    .collect();
                (!attrs.is_empty()).then_some((tag, attrs))
            })
            .collect();

        Self {
            options: SanitizerOptions {
                extra_tags,
                extra_attributes,
            },
        }
    }

    /// The options in effect after forbidden entries were removed.
    pub fn options(&self) -> &SanitizerOptions {
        &self.options
    }

    fn builder(&self) -> Builder<'_> {
        let mut builder = Builder::default();
        builder
            .add_tags(EXTRA_TAGS)
            .add_generic_attributes(GENERIC_ATTRIBUTES);
        for (tag, attrs) in TAG_ATTRIBUTES {
            builder.add_tag_attributes(tag, attrs.iter());
        }

        builder.add_tags(self.options.extra_tags.iter().map(String::as_str));
        for (tag, attrs) in &self.options.extra_attributes {
            let attrs = attrs.iter().map(String::as_str);
            if tag == "*" {
                builder.add_generic_attributes(attrs);
            } else {
                builder.add_tag_attributes(tag.as_str(), attrs);
            }
        }
        builder
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder().clean(html).to_string()
    }
}
