//! One logical resource key with its per-culture values and comments.

use std::collections::BTreeMap;

use crate::culture::CultureKey;

/// Token in a comment that marks an entry (neutral comment) or one culture
/// (specific comment) as intentionally untranslated.
pub const INVARIANT_MARKER: &str = "@Invariant";

/// A key of a [`ResourceEntity`](crate::ResourceEntity) with the data of
/// every loaded culture.
///
/// Values and comments are only present for cultures whose file contains the
/// key; a specific culture without a value falls back to the neutral one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTableEntry {
    key: String,
    values: BTreeMap<CultureKey, String>,
    // Raw comment text, invariant marker included.
    comments: BTreeMap<CultureKey, String>,
}

impl ResourceTableEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: BTreeMap::new(),
            comments: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: &str) {
        self.key = key.to_string();
    }

    /// The value stored for `culture`, `None` if its file lacks the key.
    pub fn value(&self, culture: &CultureKey) -> Option<&str> {
        self.values.get(culture).map(String::as_str)
    }

    pub fn neutral_value(&self) -> &str {
        self.value(&CultureKey::neutral()).unwrap_or_default()
    }

    /// The value shown for `culture`: its own if non-empty, else the neutral one.
    pub fn display_value(&self, culture: &CultureKey) -> &str {
        match self.value(culture) {
            Some(value) if !value.is_empty() => value,
            _ => self.neutral_value(),
        }
    }

    /// Cultures that carry a value, neutral first.
    pub fn cultures(&self) -> impl Iterator<Item = &CultureKey> {
        self.values.keys()
    }

    /// The comment for `culture` without the invariant marker.
    pub fn comment(&self, culture: &CultureKey) -> Option<String> {
        self.comments
            .get(culture)
            .map(|raw| strip_invariant_marker(raw).0)
            .filter(|comment| !comment.is_empty())
    }

    /// The comment exactly as stored in the file.
    pub fn raw_comment(&self, culture: &CultureKey) -> Option<&str> {
        self.comments.get(culture).map(String::as_str)
    }

    /// True if the neutral comment marks the whole entry invariant.
    pub fn is_invariant(&self) -> bool {
        self.is_marked(&CultureKey::neutral())
    }

    /// True if the entry or this culture carries the invariant marker.
    pub fn is_explicitly_invariant(&self, culture: &CultureKey) -> bool {
        self.is_invariant() || self.is_marked(culture)
    }

    /// Explicitly invariant, or nothing to translate: the neutral value is
    /// empty and the culture does not override it.
    pub fn is_invariant_for(&self, culture: &CultureKey) -> bool {
        self.is_explicitly_invariant(culture)
            || (self.neutral_value().is_empty() && self.value(culture).is_none_or(str::is_empty))
    }

    /// A translatable entry whose culture value is still missing.
    pub fn has_missing_translation(&self, culture: &CultureKey) -> bool {
        !culture.is_neutral()
            && !self.is_invariant_for(culture)
            && self.value(culture).is_none_or(str::is_empty)
    }

    /// An invariant entry that nevertheless carries a culture value
    /// different from the neutral one.
    pub fn has_invariant_mismatch(&self, culture: &CultureKey) -> bool {
        !culture.is_neutral()
            && self.is_explicitly_invariant(culture)
            && self
                .value(culture)
                .is_some_and(|value| !value.is_empty() && value != self.neutral_value())
    }

    fn is_marked(&self, culture: &CultureKey) -> bool {
        self.comments
            .get(culture)
            .is_some_and(|raw| strip_invariant_marker(raw).1)
    }

    pub(crate) fn set_value(&mut self, culture: &CultureKey, value: Option<&str>) {
        match value {
            Some(value) => {
                self.values.insert(culture.clone(), value.to_string());
            }
            None => {
                self.values.remove(culture);
            }
        }
    }

    pub(crate) fn set_raw_comment(&mut self, culture: &CultureKey, comment: Option<&str>) {
        match comment.filter(|c| !c.is_empty()) {
            Some(comment) => {
                self.comments.insert(culture.clone(), comment.to_string());
            }
            None => {
                self.comments.remove(culture);
            }
        }
    }

    pub(crate) fn remove_culture(&mut self, culture: &CultureKey) {
        self.values.remove(culture);
        self.comments.remove(culture);
    }
}

/// Splits a raw comment into its text and whether it carried the marker.
pub fn strip_invariant_marker(raw: &str) -> (String, bool) {
    if !raw.contains(INVARIANT_MARKER) {
        return (raw.to_string(), false);
    }
    let text = raw
        .replace(INVARIANT_MARKER, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (text, true)
}

/// Builds the raw comment stored in the file from text and marker state.
/// Unmarked text is stored as given.
pub fn apply_invariant_marker(text: &str, invariant: bool) -> String {
    if !invariant {
        return text.to_string();
    }
    let text = text.trim();
    if text.is_empty() {
        INVARIANT_MARKER.to_string()
    } else {
        format!("{} {}", text, INVARIANT_MARKER)
    }
}
