//! Traits for XML-backed resource files.

use std::{
    fs,
    io::{BufRead, Read, Write},
    path::Path,
};

use crate::{error::Error, xml::Document};

/// A trait for parsing and writing one XML-backed file (native resource or
/// interchange document).
///
/// Implementors only describe how to wrap a parsed [`Document`]; reading with
/// BOM detection and atomic writes come for free.
///
/// # Example
///
/// ```rust,no_run
/// use resxsync::{formats::ResxFile, traits::Parser};
/// let file = ResxFile::read_from("Resources.resx")?;
/// file.write_to("Resources.copy.resx")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser: Sized {
    /// Wraps a parsed document, validating its shape.
    fn from_document(document: Document) -> Result<Self, Error>;

    /// The document backing this file.
    fn document(&self) -> &Document;

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error> {
        Self::from_document(Document::parse(s)?)
    }

    /// Parse from bytes, honoring a UTF-8/UTF-16 byte order mark.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (text, bom) = decode(bytes);
        let mut document = Document::parse(&text)?;
        if bom {
            document.set_bom(true);
        }
        Self::from_document(document)
    }

    /// Parse from any reader.
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        self.document().write_to(writer)
    }

    /// Serialize to a string.
    fn to_xml_string(&self) -> Result<String, Error> {
        self.document().to_xml_string()
    }

    /// Write to file path. The file is replaced in one step.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut content = Vec::new();
        self.to_writer(&mut content)?;
        write_atomic(path.as_ref(), &content)
    }
}

/// Decodes file bytes to UTF-8, reporting whether a BOM was present.
pub(crate) fn decode(bytes: &[u8]) -> (String, bool) {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((encoding, bom_length)) => {
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
            (text.into_owned(), true)
        }
        None => {
            let (text, _) = encoding_rs::UTF_8.decode_without_bom_handling(bytes);
            (text.into_owned(), false)
        }
    }
}

/// Writes `content` to a temporary sibling and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let result = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&temp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result.map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_without_bom() {
        let (text, bom) = decode("<a>é</a>".as_bytes());
        assert_eq!(text, "<a>é</a>");
        assert!(!bom);
    }

    #[test]
    fn test_decode_utf16_le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, bom) = decode(&bytes);
        assert_eq!(text, "<a/>");
        assert!(bom);
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
