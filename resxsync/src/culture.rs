//! Culture identity for the neutral slot and specific cultures.
//!
//! A [`CultureKey`] wraps an optional culture name; `None` is the neutral
//! culture. Keys compare case-insensitively on their canonical dotted form
//! (`""` for neutral, `".de-DE"` otherwise), so the neutral key sorts first.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unic_langid::LanguageIdentifier;

use crate::error::Error;

lazy_static! {
    // Legacy and pseudo cultures (`zh-CHS`, `qps-ploc`, `en-US-x-test`) that BCP 47 parsing rejects.
    static ref PSEUDO_LOCALE_REGEX: Regex =
        Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{1,8})+$").unwrap();
}

/// Canonical identity of "a culture or the neutral slot".
#[derive(Debug, Clone, Default)]
pub struct CultureKey {
    culture: Option<Arc<str>>,
}

impl CultureKey {
    /// The neutral culture.
    pub const fn neutral() -> Self {
        CultureKey { culture: None }
    }

    /// Parses a culture name, or its dotted form as produced by [`Display`].
    ///
    /// An empty string (or a lone `.`) is the neutral culture.
    ///
    /// # Example
    /// ```rust
    /// use resxsync::CultureKey;
    /// let key = CultureKey::parse(".de-de").unwrap();
    /// assert_eq!(key.name(), Some("de-DE"));
    /// assert_eq!(key.to_string(), ".de-DE");
    /// assert!(CultureKey::parse("").unwrap().is_neutral());
    /// assert!(CultureKey::parse("Designer").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, Error> {
        let trimmed = value.trim();
        let name = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if name.is_empty() {
            return Ok(CultureKey::neutral());
        }

        canonical_culture_name(name)
            .map(|canonical| CultureKey {
                culture: Some(Arc::from(canonical)),
            })
            .ok_or_else(|| Error::invalid_input(format!("`{}` is not a culture name", value)))
    }

    /// Returns true if `value` is a culture name accepted by [`CultureKey::parse`].
    pub fn is_culture_name(value: &str) -> bool {
        !value.is_empty() && canonical_culture_name(value).is_some()
    }

    pub fn is_neutral(&self) -> bool {
        self.culture.is_none()
    }

    /// The culture name, `None` for neutral.
    pub fn name(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    pub fn language_identifier(&self) -> Option<LanguageIdentifier> {
        self.culture.as_deref().and_then(|name| name.parse().ok())
    }

    /// The dotted canonical form, or `neutral` for the neutral culture.
    pub fn to_string_or(&self, neutral: &str) -> String {
        match &self.culture {
            Some(name) => format!(".{}", name),
            None => neutral.to_string(),
        }
    }

    fn sort_key(&self) -> String {
        self.to_string_or("").to_ascii_lowercase()
    }
}

fn canonical_culture_name(name: &str) -> Option<String> {
    if let Ok(language) = name.parse::<LanguageIdentifier>() {
        let primary = language.language.as_str();
        if (2..=3).contains(&primary.len()) && primary != "und" {
            return Some(language.to_string());
        }
        return None;
    }

    if PSEUDO_LOCALE_REGEX.is_match(name) {
        return Some(name.to_string());
    }

    None
}

impl PartialEq for CultureKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.culture, &other.culture) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl Eq for CultureKey {}

impl Hash for CultureKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for CultureKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CultureKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Writes the dotted canonical form: `""` for neutral, `".de-DE"` otherwise.
impl Display for CultureKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.culture {
            Some(name) => write!(f, ".{}", name),
            None => Ok(()),
        }
    }
}

impl FromStr for CultureKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CultureKey::parse(s)
    }
}

impl TryFrom<&str> for CultureKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        CultureKey::parse(value)
    }
}

impl From<&LanguageIdentifier> for CultureKey {
    fn from(value: &LanguageIdentifier) -> Self {
        CultureKey {
            culture: Some(Arc::from(value.to_string())),
        }
    }
}

impl From<LanguageIdentifier> for CultureKey {
    fn from(value: LanguageIdentifier) -> Self {
        CultureKey::from(&value)
    }
}

impl From<Option<LanguageIdentifier>> for CultureKey {
    fn from(value: Option<LanguageIdentifier>) -> Self {
        value.map(CultureKey::from).unwrap_or_default()
    }
}

impl Serialize for CultureKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name().unwrap_or(""))
    }
}

impl<'de> Deserialize<'de> for CultureKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        CultureKey::parse(&value).map_err(serde::de::Error::custom)
    }
}
