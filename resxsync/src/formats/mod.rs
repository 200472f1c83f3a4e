//! File formats understood by resxsync.
//!
//! - [`resx`]: the native per-culture resource files (`.resx` / `.resw`).
//! - [`xliff`]: the XLIFF 1.2 interchange documents.
//! - [`csv`]: the tabular export/import layout.

pub mod csv;
pub mod resx;
pub mod xliff;

use std::{
    fmt::{Display, Formatter},
    path::Path,
};

pub use csv::{Format as TableFormat, TableRecord};
pub use resx::{ResxEntry, ResxFile};
pub use xliff::{
    NoteOrigin, TranslationState, TranslationUnit, TranslationUnitMut, XLIFF_NAMESPACE,
    XliffDocument,
};

/// The file kinds handled by the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// Native resource file.
    Resx,
    /// XLIFF interchange document.
    Xliff,
    /// CSV table.
    Csv,
}

impl FormatType {
    /// Extensions (lowercase, without the dot) recognized for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FormatType::Resx => &["resx", "resw"],
            FormatType::Xliff => &["xlf", "xliff"],
            FormatType::Csv => &["csv"],
        }
    }

    /// Infers the format from a path's extension.
    ///
    /// # Example
    /// ```rust
    /// use resxsync::formats::FormatType;
    /// assert_eq!(FormatType::from_path("a/Resources.de.resw"), Some(FormatType::Resx));
    /// assert_eq!(FormatType::from_path("a/Resources.de.xlf"), Some(FormatType::Xliff));
    /// assert_eq!(FormatType::from_path("a/readme.md"), None);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        [FormatType::Resx, FormatType::Xliff, FormatType::Csv]
            .into_iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
    }
}

impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Resx => write!(f, "resx"),
            FormatType::Xliff => write!(f, "xliff"),
            FormatType::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_an_extension() {
        for format in [FormatType::Resx, FormatType::Xliff, FormatType::Csv] {
            let name = format!("Resources.{}", format);
            assert_eq!(FormatType::from_path(name), Some(format));
        }
    }

    #[test]
    fn test_from_path_is_case_insensitive() {
        assert_eq!(FormatType::from_path("Strings.RESX"), Some(FormatType::Resx));
        assert_eq!(FormatType::from_path("noext"), None);
    }
}
