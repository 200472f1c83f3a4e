//! Project configuration, read from `resxsync.json`.
//!
//! ```json
//! {
//!   "duplicateKeyHandling": "rename",
//!   "keyComparison": "ignoreCase",
//!   "neutralResourcesLanguage": "en-US",
//!   "fileFilter": "Tests?/",
//!   "pruneOrphans": false
//! }
//! ```

use std::{fs, path::Path};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{culture::CultureKey, error::Error, formats::FormatType};

/// Name of the configuration file looked up by [`Configuration::discover`].
pub const CONFIG_FILE_NAME: &str = "resxsync.json";

/// What to do when the neutral file contains the same key twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateKeyHandling {
    /// Reject the whole entity.
    #[default]
    Fail,
    /// Rename later occurrences to `<key>_Duplicate[<n>]`.
    Rename,
}

/// Comparison under which two keys are considered the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyComparison {
    #[default]
    Ordinal,
    IgnoreCase,
}

impl KeyComparison {
    /// The normalized form of `key` under this comparison.
    pub fn normalize(&self, key: &str) -> String {
        match self {
            KeyComparison::Ordinal => key.to_string(),
            KeyComparison::IgnoreCase => key.to_lowercase(),
        }
    }

    pub fn same_key(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub duplicate_key_handling: DuplicateKeyHandling,
    pub key_comparison: KeyComparison,
    pub neutral_resources_language: String,
    pub file_filter: Option<String>,
    pub prune_orphans: bool,
    pub import_interchange_targets: bool,
    pub interchange_extension: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            duplicate_key_handling: DuplicateKeyHandling::Fail,
            key_comparison: KeyComparison::Ordinal,
            neutral_resources_language: "en".to_string(),
            file_filter: None,
            prune_orphans: false,
            import_interchange_targets: true,
            interchange_extension: "xlf".to_string(),
        }
    }
}

impl Configuration {
    /// Reads a configuration file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Configuration = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reads `<root>/resxsync.json` if present, otherwise returns defaults.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let path = root.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks the values serde cannot: the filter regex and the culture name.
    pub fn validate(&self) -> Result<(), Error> {
        self.file_filter_regex()?;
        self.neutral_culture()?;
        let file_name = format!("Resources.{}", self.interchange_extension());
        if FormatType::from_path(&file_name) != Some(FormatType::Xliff) {
            return Err(Error::invalid_input(format!(
                "interchange extension `{}` is not an {} extension",
                self.interchange_extension,
                FormatType::Xliff
            )));
        }
        Ok(())
    }

    /// The compiled `fileFilter`, if any.
    pub fn file_filter_regex(&self) -> Result<Option<Regex>, Error> {
        self.file_filter
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    Error::invalid_input(format!("invalid file filter `{}`: {}", pattern, e))
                })
            })
            .transpose()
    }

    /// The culture of the neutral files, used as interchange source language.
    pub fn neutral_culture(&self) -> Result<CultureKey, Error> {
        CultureKey::parse(&self.neutral_resources_language)
    }

    /// The interchange extension without a leading dot.
    pub fn interchange_extension(&self) -> &str {
        self.interchange_extension.trim_start_matches('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.duplicate_key_handling, DuplicateKeyHandling::Fail);
        assert_eq!(config.key_comparison, KeyComparison::Ordinal);
        assert!(config.import_interchange_targets);
        assert!(!config.prune_orphans);
        assert_eq!(config.interchange_extension(), "xlf");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Configuration =
            serde_json::from_str(r#"{"duplicateKeyHandling":"rename","keyComparison":"ignoreCase"}"#)
                .unwrap();
        assert_eq!(config.duplicate_key_handling, DuplicateKeyHandling::Rename);
        assert_eq!(config.key_comparison, KeyComparison::IgnoreCase);
        assert_eq!(config.neutral_resources_language, "en");
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = Configuration {
            file_filter: Some("(".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_interchange_extension_must_be_xliff() {
        for extension in ["csv", "resx", ".", ""] {
            let config = Configuration {
                interchange_extension: extension.to_string(),
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(Error::InvalidInput(_))), "{}", extension);
        }
        let config = Configuration {
            interchange_extension: ".XLIFF".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_comparison() {
        assert!(KeyComparison::IgnoreCase.same_key("Hello", "HELLO"));
        assert!(!KeyComparison::Ordinal.same_key("Hello", "HELLO"));
    }

    #[test]
    fn test_discover_reads_file_from_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Configuration::discover(dir.path()).unwrap(),
            Configuration::default()
        );

        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"pruneOrphans": true, "interchangeExtension": ".xliff"}"#,
        )
        .unwrap();
        let config = Configuration::discover(dir.path()).unwrap();
        assert!(config.prune_orphans);
        assert_eq!(config.interchange_extension(), "xliff");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Configuration::load(&path), Err(Error::Config(_))));
    }
}
