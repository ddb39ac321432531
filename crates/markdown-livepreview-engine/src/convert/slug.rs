//! Heading anchor ids.

use std::collections::HashMap;

/// Lowercase `text`, keep letters, digits, `_` and `-`, turn whitespace into
/// `-` and drop everything else.
pub fn slugify(text: &str) -> String {
    text.trim()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                Some(c)
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Hands out unique heading ids for one document: a repeated slug gets `-1`,
/// `-2`, … appended.
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique id for a heading, or `None` if the text has no sluggable characters.
    pub fn slug(&mut self, text: &str) -> Option<String> {
        let base = slugify(text);
        if base.is_empty() {
            return None;
        }

        let mut candidate = base.clone();
        let mut count = self.seen.get(&base).copied().unwrap_or(0);
        while self.seen.contains_key(&candidate) {
            count += 1;
            candidate = format!("{base}-{count}");
        }
        self.seen.insert(base.clone(), count);
        if candidate != base {
            self.seen.insert(candidate.clone(), 0);
        }
        Some(candidate)
    }
}
