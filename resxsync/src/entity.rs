//! The aggregate of one neutral language plus its culture-specific siblings.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::{
    config::{Configuration, DuplicateKeyHandling, KeyComparison},
    culture::CultureKey,
    discovery::FileGroup,
    entry::{ResourceTableEntry, apply_invariant_marker, strip_invariant_marker},
    error::Error,
    language::ResourceLanguage,
};

/// A change made to an entity. Returned by every mutation that changed
/// something and forwarded to [`ResourceManager`](crate::ResourceManager)
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    ValueChanged {
        entity: String,
        key: String,
        culture: CultureKey,
        old: Option<String>,
        new: String,
    },
    CommentChanged {
        entity: String,
        key: String,
        culture: CultureKey,
        old: Option<String>,
        new: Option<String>,
    },
    EntryAdded {
        entity: String,
        key: String,
    },
    EntryRemoved {
        entity: String,
        key: String,
    },
    EntryRenamed {
        entity: String,
        old_key: String,
        new_key: String,
    },
    LanguageAdded {
        entity: String,
        culture: CultureKey,
    },
    LanguageRemoved {
        entity: String,
        culture: CultureKey,
    },
}

impl ResourceChange {
    /// Unique name of the entity the change belongs to.
    pub fn entity(&self) -> &str {
        match self {
            ResourceChange::ValueChanged { entity, .. }
            | ResourceChange::CommentChanged { entity, .. }
            | ResourceChange::EntryAdded { entity, .. }
            | ResourceChange::EntryRemoved { entity, .. }
            | ResourceChange::EntryRenamed { entity, .. }
            | ResourceChange::LanguageAdded { entity, .. }
            | ResourceChange::LanguageRemoved { entity, .. } => entity,
        }
    }
}

/// Result of saving all dirty languages of an entity.
#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Error)>,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn merge(&mut self, other: SaveOutcome) {
        self.written.extend(other.written);
        self.failed.extend(other.failed);
    }
}

/// One logical resource: a neutral file plus zero or more culture files
/// sharing its key set.
///
/// The neutral file is authoritative for keys and their order. Specific
/// files may hold a subset; keys they carry that the neutral file lacks are
/// ignored.
#[derive(Debug, Clone)]
pub struct ResourceEntity {
    project: String,
    base_name: String,
    directory: PathBuf,
    relative_directory: PathBuf,
    extension: String,
    languages: BTreeMap<CultureKey, ResourceLanguage>,
    entries: Vec<ResourceTableEntry>,
    index: HashMap<String, usize>,
    key_comparison: KeyComparison,
}

impl ResourceEntity {
    /// Loads every file of a discovered group.
    ///
    /// Fails as a whole if the neutral file is missing, any file is
    /// malformed, or the neutral file has duplicate keys under
    /// [`DuplicateKeyHandling::Fail`].
    pub fn load(group: &FileGroup, config: &Configuration) -> Result<Self, Error> {
        let unique_name = group.unique_name();
        if group.neutral_file().is_none() {
            return Err(Error::NoNeutralLanguage(unique_name));
        }

        let mut languages = Vec::with_capacity(group.files.len());
        for file in &group.files {
            languages.push(ResourceLanguage::load(&file.path, file.culture.clone())?);
        }

        let directory = group
            .files
            .first()
            .and_then(|file| file.path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self::from_languages(
            &group.project,
            &group.directory,
            &directory,
            &group.base_name,
            &group.extension,
            languages,
            config,
        )
    }

    /// Builds an entity from already loaded languages.
    ///
    /// `relative_directory` names the entity, `directory` is where new
    /// language files are created.
    pub fn from_languages(
        project: &str,
        relative_directory: &Path,
        directory: &Path,
        base_name: &str,
        extension: &str,
        languages: Vec<ResourceLanguage>,
        config: &Configuration,
    ) -> Result<Self, Error> {
        let mut entity = ResourceEntity {
            project: project.to_string(),
            base_name: base_name.to_string(),
            directory: directory.to_path_buf(),
            relative_directory: relative_directory.to_path_buf(),
            extension: extension.to_string(),
            languages: BTreeMap::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            key_comparison: config.key_comparison,
        };

        for language in languages {
            let culture = language.culture().clone();
            if entity.languages.insert(culture.clone(), language).is_some() {
                return Err(Error::DuplicateCulture(culture.to_string_or("neutral")));
            }
        }

        let unique_name = entity.unique_name();
        let neutral = entity
            .languages
            .get_mut(&CultureKey::neutral())
            .ok_or(Error::NoNeutralLanguage(unique_name))?;
        resolve_duplicates(neutral, config)?;

        for entry in neutral.entries() {
            let mut table_entry = ResourceTableEntry::new(entry.key.as_str());
            table_entry.set_value(&CultureKey::neutral(), Some(&entry.value));
            table_entry.set_raw_comment(&CultureKey::neutral(), entry.comment.as_deref());
            entity
                .index
                .insert(config.key_comparison.normalize(&entry.key), entity.entries.len());
            entity.entries.push(table_entry);
        }

        let specific: Vec<CultureKey> = entity
            .languages
            .keys()
            .filter(|culture| !culture.is_neutral())
            .cloned()
            .collect();
        for culture in specific {
            entity.merge_language(&culture);
        }

        tracing::debug!(
            "loaded {} with {} keys in {} languages",
            entity.unique_name(),
            entity.entries.len(),
            entity.languages.len()
        );
        Ok(entity)
    }

    // Copies the values of one specific language into the table.
    fn merge_language(&mut self, culture: &CultureKey) {
        let Some(language) = self.languages.get(culture) else {
            return;
        };
        let mut seen = HashSet::new();
        for entry in language.entries() {
            let normalized = self.key_comparison.normalize(&entry.key);
            if !seen.insert(normalized.clone()) {
                tracing::warn!(
                    "duplicate key `{}` in {}, using the first occurrence",
                    entry.key,
                    language.path().display()
                );
                continue;
            }
            match self.index.get(&normalized) {
                Some(&position) => {
                    let table_entry = &mut self.entries[position];
                    table_entry.set_value(culture, Some(&entry.value));
                    table_entry.set_raw_comment(culture, entry.comment.as_deref());
                }
                None => tracing::warn!(
                    "key `{}` in {} has no neutral entry",
                    entry.key,
                    language.path().display()
                ),
            }
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Directory that holds the entity's files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `relative/dir/Base`, unique within a manager.
    pub fn unique_name(&self) -> String {
        let mut parts: Vec<String> = self
            .relative_directory
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.push(self.base_name.clone());
        parts.join("/")
    }

    /// Interchange id of a key: `<project>.<key>`.
    pub fn logical_id(&self, key: &str) -> String {
        format!("{}.{}", self.project, key)
    }

    /// Path of the file for `culture`: `<dir>/<base>[.<culture>].<ext>`.
    pub fn path_for(&self, culture: &CultureKey) -> PathBuf {
        self.file_path_with_extension(culture, &self.extension)
    }

    /// Like [`ResourceEntity::path_for`] with a different extension, used
    /// for interchange files.
    pub fn file_path_with_extension(&self, culture: &CultureKey, extension: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}.{}", self.base_name, culture, extension))
    }

    pub fn languages(&self) -> impl Iterator<Item = &ResourceLanguage> {
        self.languages.values()
    }

    /// Loaded cultures, neutral first.
    pub fn cultures(&self) -> Vec<CultureKey> {
        self.languages.keys().cloned().collect()
    }

    pub fn language(&self, culture: &CultureKey) -> Option<&ResourceLanguage> {
        self.languages.get(culture)
    }

    pub fn neutral_language(&self) -> Result<&ResourceLanguage, Error> {
        self.languages
            .get(&CultureKey::neutral())
            .ok_or_else(|| Error::NoNeutralLanguage(self.unique_name()))
    }

    /// Entries in neutral file order.
    pub fn entries(&self) -> &[ResourceTableEntry] {
        &self.entries
    }

    pub fn entry(&self, key: &str) -> Option<&ResourceTableEntry> {
        self.position(key).map(|position| &self.entries[position])
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().to_string()).collect()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(&self.key_comparison.normalize(key)).copied()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (self.key_comparison.normalize(entry.key()), position))
            .collect();
    }

    /// Entries still lacking a translation for `culture`.
    pub fn missing_translations(&self, culture: &CultureKey) -> Vec<&ResourceTableEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.has_missing_translation(culture))
            .collect()
    }

    /// Invariant entries that carry a diverging `culture` value.
    pub fn invariant_mismatches(&self, culture: &CultureKey) -> Vec<&ResourceTableEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.has_invariant_mismatch(culture))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.languages.values().any(ResourceLanguage::is_dirty)
    }

    pub fn is_writable(&self, culture: &CultureKey) -> bool {
        self.languages
            .get(culture)
            .is_some_and(ResourceLanguage::is_writable)
    }

    pub fn make_writable(&self, culture: &CultureKey) -> Result<(), Error> {
        self.languages
            .get(culture)
            .ok_or_else(|| Error::UnknownCulture(culture.to_string_or("neutral")))?
            .make_writable()
    }

    /// Adds a loaded language and merges its values.
    pub fn add_language(&mut self, language: ResourceLanguage) -> Result<ResourceChange, Error> {
        let culture = language.culture().clone();
        if self.languages.contains_key(&culture) {
            return Err(Error::DuplicateCulture(culture.to_string_or("neutral")));
        }
        if culture.is_neutral() {
            return Err(Error::invalid_input("the neutral language cannot be added"));
        }
        self.languages.insert(culture.clone(), language);
        self.merge_language(&culture);
        Ok(ResourceChange::LanguageAdded {
            entity: self.unique_name(),
            culture,
        })
    }

    /// Detaches a specific language. The file itself is left on disk.
    pub fn remove_language(&mut self, culture: &CultureKey) -> Result<Option<ResourceChange>, Error> {
        if culture.is_neutral() {
            return Err(Error::invalid_input("the neutral language cannot be removed"));
        }
        if self.languages.remove(culture).is_none() {
            return Ok(None);
        }
        for entry in &mut self.entries {
            entry.remove_culture(culture);
        }
        Ok(Some(ResourceChange::LanguageRemoved {
            entity: self.unique_name(),
            culture: culture.clone(),
        }))
    }

    /// Creates `<base>.<culture>.<ext>` from the neutral file's template and
    /// adds it.
    pub fn create_language(&mut self, culture: &CultureKey) -> Result<ResourceChange, Error> {
        if culture.is_neutral() {
            return Err(Error::invalid_input("the neutral language cannot be created"));
        }
        if self.languages.contains_key(culture) {
            return Err(Error::DuplicateCulture(culture.to_string_or("neutral")));
        }
        let template = self.neutral_language()?.file().template();
        let language = ResourceLanguage::create(self.path_for(culture), culture.clone(), &template)?;
        self.add_language(language)
    }

    // The language for an edit: must exist and be writable.
    fn editable_language(&mut self, culture: &CultureKey) -> Result<&mut ResourceLanguage, Error> {
        let language = self
            .languages
            .get_mut(culture)
            .ok_or_else(|| Error::UnknownCulture(culture.to_string_or("neutral")))?;
        if !language.is_writable() {
            return Err(Error::ReadOnlyTarget(language.path().to_path_buf()));
        }
        Ok(language)
    }

    fn known_position(&self, key: &str) -> Result<usize, Error> {
        self.position(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    /// Sets the value of `key` for `culture`.
    ///
    /// In a specific culture, clearing both value and comment removes the
    /// key from that file.
    pub fn set_value(
        &mut self,
        key: &str,
        culture: &CultureKey,
        value: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        let position = self.known_position(key)?;
        let entry = &self.entries[position];
        let key = entry.key().to_string();
        let old = entry.value(culture).map(str::to_string);
        let has_comment = entry.raw_comment(culture).is_some();
        if old.as_deref().unwrap_or_default() == value {
            return Ok(None);
        }

        let comparison = self.key_comparison;
        let language = self.editable_language(culture)?;
        let stored = language.stored_key(&key, comparison).unwrap_or_else(|| key.clone());
        if !culture.is_neutral() && value.is_empty() && !has_comment {
            language.remove(&stored);
            self.entries[position].set_value(culture, None);
        } else {
            language.set_value(&stored, value);
            self.entries[position].set_value(culture, Some(value));
        }

        Ok(Some(ResourceChange::ValueChanged {
            entity: self.unique_name(),
            key,
            culture: culture.clone(),
            old,
            new: value.to_string(),
        }))
    }

    /// Sets the comment of `key` for `culture`, keeping its invariant marker.
    pub fn set_comment(
        &mut self,
        key: &str,
        culture: &CultureKey,
        comment: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        let position = self.known_position(key)?;
        let current = self.entries[position]
            .raw_comment(culture)
            .unwrap_or_default()
            .to_string();
        let (text, invariant) = strip_invariant_marker(&current);
        let raw = apply_invariant_marker(comment, invariant);
        // Marked comments are stored with collapsed whitespace.
        if raw == current || (invariant && strip_invariant_marker(&raw).0 == text) {
            return Ok(None);
        }
        self.write_comment(position, culture, &raw)
    }

    /// Adds or removes the invariant marker of `key` for `culture`.
    pub fn set_invariant(
        &mut self,
        key: &str,
        culture: &CultureKey,
        invariant: bool,
    ) -> Result<Option<ResourceChange>, Error> {
        let position = self.known_position(key)?;
        let (text, marked) = self.entries[position]
            .raw_comment(culture)
            .map(strip_invariant_marker)
            .unwrap_or_default();
        if marked == invariant {
            return Ok(None);
        }
        self.write_comment(position, culture, &apply_invariant_marker(&text, invariant))
    }

    fn write_comment(
        &mut self,
        position: usize,
        culture: &CultureKey,
        raw: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        let entry = &self.entries[position];
        let key = entry.key().to_string();
        let old = entry.comment(culture);
        let value_is_empty = entry.value(culture).is_none_or(str::is_empty);

        let comparison = self.key_comparison;
        let language = self.editable_language(culture)?;
        let stored = language.stored_key(&key, comparison).unwrap_or_else(|| key.clone());
        if !culture.is_neutral() && raw.is_empty() && value_is_empty {
            language.remove(&stored);
            self.entries[position].remove_culture(culture);
        } else {
            language.set_comment(&stored, Some(raw));
            self.entries[position].set_raw_comment(culture, Some(raw));
            if self.entries[position].value(culture).is_none() {
                self.entries[position].set_value(culture, Some(""));
            }
        }

        Ok(Some(ResourceChange::CommentChanged {
            entity: self.unique_name(),
            key,
            culture: culture.clone(),
            old,
            new: self.entries[position].comment(culture),
        }))
    }

    /// Appends a new key to the neutral file.
    pub fn add_entry(&mut self, key: &str, neutral_value: &str) -> Result<ResourceChange, Error> {
        if key.trim().is_empty() {
            return Err(Error::invalid_input("resource keys must not be empty"));
        }
        if self.position(key).is_some() {
            return Err(Error::DuplicateKey {
                key: key.to_string(),
                path: self.path_for(&CultureKey::neutral()),
            });
        }

        self.editable_language(&CultureKey::neutral())?
            .set_value(key, neutral_value);

        let mut entry = ResourceTableEntry::new(key);
        entry.set_value(&CultureKey::neutral(), Some(neutral_value));
        self.index
            .insert(self.key_comparison.normalize(key), self.entries.len());
        self.entries.push(entry);

        Ok(ResourceChange::EntryAdded {
            entity: self.unique_name(),
            key: key.to_string(),
        })
    }

    /// Removes a key from every language.
    pub fn remove_entry(&mut self, key: &str) -> Result<Option<ResourceChange>, Error> {
        let Some(position) = self.position(key) else {
            return Ok(None);
        };
        let key = self.entries[position].key().to_string();
        self.check_writable_containing(&key)?;

        let comparison = self.key_comparison;
        for language in self.languages.values_mut() {
            if let Some(stored) = language.stored_key(&key, comparison) {
                language.remove(&stored);
            }
        }
        self.entries.remove(position);
        self.rebuild_index();

        Ok(Some(ResourceChange::EntryRemoved {
            entity: self.unique_name(),
            key,
        }))
    }

    /// Renames a key in every language.
    pub fn rename_entry(&mut self, key: &str, new_key: &str) -> Result<Option<ResourceChange>, Error> {
        if new_key.trim().is_empty() {
            return Err(Error::invalid_input("resource keys must not be empty"));
        }
        let position = self.known_position(key)?;
        let old_key = self.entries[position].key().to_string();
        if old_key == new_key {
            return Ok(None);
        }
        if self
            .position(new_key)
            .is_some_and(|existing| existing != position)
        {
            return Err(Error::DuplicateKey {
                key: new_key.to_string(),
                path: self.path_for(&CultureKey::neutral()),
            });
        }
        self.check_writable_containing(&old_key)?;

        let comparison = self.key_comparison;
        for language in self.languages.values_mut() {
            if let Some(stored) = language.stored_key(&old_key, comparison) {
                language.rename(&stored, new_key);
            }
        }
        self.entries[position].set_key(new_key);
        self.rebuild_index();

        Ok(Some(ResourceChange::EntryRenamed {
            entity: self.unique_name(),
            old_key,
            new_key: new_key.to_string(),
        }))
    }

    fn check_writable_containing(&self, key: &str) -> Result<(), Error> {
        match self
            .languages
            .values()
            .find(|language| {
                language.stored_key(key, self.key_comparison).is_some() && !language.is_writable()
            })
        {
            Some(language) => Err(Error::ReadOnlyTarget(language.path().to_path_buf())),
            None => Ok(()),
        }
    }

    /// Saves every dirty language. A failing file does not stop its siblings.
    pub fn save(&mut self) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();
        for language in self.languages.values_mut() {
            match language.save() {
                Ok(true) => outcome.written.push(language.path().to_path_buf()),
                Ok(false) => {}
                Err(e) => outcome.failed.push((language.path().to_path_buf(), e)),
            }
        }
        outcome
    }
}

// Applies the duplicate-key policy to the neutral file.
fn resolve_duplicates(neutral: &mut ResourceLanguage, config: &Configuration) -> Result<(), Error> {
    let entries = neutral.entries();
    let mut seen: HashSet<String> = entries
        .iter()
        .map(|entry| config.key_comparison.normalize(&entry.key))
        .collect();
    let mut first: HashSet<String> = HashSet::new();

    for (ordinal, entry) in entries.iter().enumerate() {
        if first.insert(config.key_comparison.normalize(&entry.key)) {
            continue;
        }
        match config.duplicate_key_handling {
            DuplicateKeyHandling::Fail => {
                return Err(Error::DuplicateKey {
                    key: entry.key.clone(),
                    path: neutral.path().to_path_buf(),
                });
            }
            DuplicateKeyHandling::Rename => {
                let mut n = 1;
                let new_key = loop {
                    let candidate = format!("{}_Duplicate[{}]", entry.key, n);
                    if !seen.contains(&config.key_comparison.normalize(&candidate)) {
                        break candidate;
                    }
                    n += 1;
                };
                tracing::warn!(
                    "renaming duplicate key `{}` to `{}` in {}",
                    entry.key,
                    new_key,
                    neutral.path().display()
                );
                seen.insert(config.key_comparison.normalize(&new_key));
                first.insert(config.key_comparison.normalize(&new_key));
                neutral.rename_at(ordinal, &new_key);
            }
        }
    }
    Ok(())
}
