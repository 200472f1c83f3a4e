//! The per-culture view of one physical native file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::KeyComparison,
    culture::CultureKey,
    error::Error,
    formats::{ResxEntry, ResxFile},
    traits::Parser,
};

/// One native file bound to one culture of a [`ResourceEntity`](crate::ResourceEntity).
///
/// Edits go through the owning entity; the language only tracks whether the
/// in-memory document differs from the file.
#[derive(Debug, Clone)]
pub struct ResourceLanguage {
    culture: CultureKey,
    path: PathBuf,
    file: ResxFile,
    dirty: bool,
}

impl ResourceLanguage {
    /// Reads the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P, culture: CultureKey) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!("loading {}", path.display());
        let file = ResxFile::read_from(path).map_err(|e| match e {
            Error::MalformedDocument(message) => {
                Error::MalformedDocument(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        Ok(Self::from_file(path, culture, file))
    }

    /// Wraps an in-memory document that is not yet on disk.
    pub fn from_file<P: AsRef<Path>>(path: P, culture: CultureKey, file: ResxFile) -> Self {
        Self {
            culture,
            path: path.as_ref().to_path_buf(),
            file,
            dirty: false,
        }
    }

    /// Writes `template` to `path` and binds a new language to it. An
    /// existing file is loaded instead of being overwritten.
    pub fn create<P: AsRef<Path>>(
        path: P,
        culture: CultureKey,
        template: &ResxFile,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path, culture);
        }
        template.write_to(path)?;
        tracing::info!("created {}", path.display());
        Ok(Self::from_file(path, culture, template.clone()))
    }

    pub fn culture(&self) -> &CultureKey {
        &self.culture
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &ResxFile {
        &self.file
    }

    /// The string entries in file order.
    pub fn entries(&self) -> Vec<ResxEntry> {
        self.file.entries()
    }

    /// The key as spelled in this file, matched under `comparison`.
    /// An exact match wins over one that differs only in case.
    pub fn stored_key(&self, key: &str, comparison: KeyComparison) -> Option<String> {
        if self.file.contains_key(key) {
            return Some(key.to_string());
        }
        self.file
            .entries()
            .into_iter()
            .map(|entry| entry.key)
            .find(|stored| comparison.same_key(stored, key))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// False if the backing file exists and is marked read-only.
    pub fn is_writable(&self) -> bool {
        fs::metadata(&self.path)
            .map(|metadata| !metadata.permissions().readonly())
            .unwrap_or(true)
    }

    /// Clears the read-only flag of the backing file.
    pub fn make_writable(&self) -> Result<(), Error> {
        let mut permissions = fs::metadata(&self.path)?.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            fs::set_permissions(&self.path, permissions)?;
            tracing::debug!("made {} writable", self.path.display());
        }
        Ok(())
    }

    pub(crate) fn set_value(&mut self, key: &str, value: &str) -> bool {
        self.track(|file| file.set_value(key, value))
    }

    pub(crate) fn set_comment(&mut self, key: &str, comment: Option<&str>) -> bool {
        self.track(|file| file.set_comment(key, comment))
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.track(|file| file.remove(key))
    }

    pub(crate) fn rename(&mut self, key: &str, new_key: &str) -> bool {
        self.track(|file| file.rename(key, new_key))
    }

    pub(crate) fn rename_at(&mut self, ordinal: usize, new_key: &str) -> bool {
        self.track(|file| file.rename_at(ordinal, new_key))
    }

    fn track(&mut self, edit: impl FnOnce(&mut ResxFile) -> bool) -> bool {
        let changed = edit(&mut self.file);
        self.dirty |= changed;
        changed
    }

    /// Writes the file if it has unsaved changes. Returns true if written.
    pub fn save(&mut self) -> Result<bool, Error> {
        if !self.dirty {
            return Ok(false);
        }
        if !self.is_writable() {
            return Err(Error::ReadOnlyTarget(self.path.clone()));
        }
        self.file.write_to(&self.path)?;
        self.dirty = false;
        tracing::debug!("saved {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEUTRAL: &str = "<root>\n  <data name=\"Hello\" xml:space=\"preserve\">\n    <value>Hello</value>\n  </data>\n</root>\n";

    #[test]
    fn test_load_edit_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Resources.resx");
        fs::write(&path, NEUTRAL).unwrap();

        let mut language = ResourceLanguage::load(&path, CultureKey::neutral()).unwrap();
        assert!(!language.is_dirty());
        assert!(!language.set_value("Hello", "Hello"));
        assert!(!language.save().unwrap());

        assert!(language.set_value("Hello", "Hi"));
        assert!(language.is_dirty());
        assert!(language.save().unwrap());
        assert!(!language.is_dirty());
        assert!(fs::read_to_string(&path).unwrap().contains("<value>Hi</value>"));
    }

    #[test]
    fn test_stored_key_follows_comparison() {
        let text = NEUTRAL.replace("</root>", "  <data name=\"HELLO\"><value>Loud</value></data>\n</root>");
        let language = ResourceLanguage::from_file(
            "Resources.resx",
            CultureKey::neutral(),
            ResxFile::from_str(&text).unwrap(),
        );
        assert_eq!(language.stored_key("hello", KeyComparison::Ordinal), None);
        assert_eq!(
            language.stored_key("hello", KeyComparison::IgnoreCase).as_deref(),
            Some("Hello")
        );
        assert_eq!(
            language.stored_key("HELLO", KeyComparison::IgnoreCase).as_deref(),
            Some("HELLO")
        );
    }

    #[test]
    fn test_create_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let neutral = ResxFile::from_str(NEUTRAL).unwrap();
        let path = dir.path().join("Resources.de.resx");
        let culture = CultureKey::parse("de").unwrap();

        let language = ResourceLanguage::create(&path, culture.clone(), &neutral.template()).unwrap();
        assert!(path.exists());
        assert!(language.entries().is_empty());
        assert_eq!(language.culture(), &culture);
    }

    #[test]
    fn test_read_only_file_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Resources.resx");
        fs::write(&path, NEUTRAL).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        let mut language = ResourceLanguage::load(&path, CultureKey::neutral()).unwrap();
        assert!(!language.is_writable());
        language.set_value("Hello", "Hi");
        assert!(matches!(language.save(), Err(Error::ReadOnlyTarget(_))));

        language.make_writable().unwrap();
        assert!(language.is_writable());
        assert!(language.save().unwrap());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.resx");
        fs::write(&path, "<root><data>").unwrap();
        match ResourceLanguage::load(&path, CultureKey::neutral()) {
            Err(Error::MalformedDocument(message)) => assert!(message.contains("Broken.resx")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
