//! All error types for the resxsync crate.
//!
//! These are returned from all fallible operations (loading native files,
//! editing entities, parsing interchange documents, synchronizing, etc.).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate key `{key}` in {}", .path.display())]
    DuplicateKey { key: String, path: PathBuf },

    #[error("language `{0}` already exists")]
    DuplicateCulture(String),

    #[error("target file is read-only: {}", .0.display())]
    ReadOnlyTarget(PathBuf),

    #[error("no language `{0}` in entity")]
    UnknownCulture(String),

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("entity `{0}` has no neutral language")]
    NoNeutralLanguage(String),

    #[error("operation canceled")]
    Canceled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::MalformedDocument(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Error::MalformedDocument(value.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for Error {
    fn from(value: quick_xml::escape::EscapeError) -> Self {
        Error::MalformedDocument(value.to_string())
    }
}

impl Error {
    /// Creates a new malformed document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedDocument(message.into())
    }

    /// Creates a new invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}
