//! The aggregate root: all entities of a project tree.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    config::Configuration,
    culture::CultureKey,
    discovery::{ProjectFile, discover_files, group_files},
    entity::{ResourceChange, ResourceEntity, SaveOutcome},
    error::Error,
    host::{AllowAll, CancellationToken, LogTracer, ResourceHost, Tracer},
    sync::{SyncOptions, SyncReport, Synchronizer},
};

type Listener = Box<dyn Fn(&ResourceChange) + Send + Sync>;

/// A key used by more than one entity of the same project. Such keys
/// collide on the interchange id `<project>.<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub project: String,
    pub key: String,
    pub entities: Vec<String>,
}

/// Owns the entities of one root folder and coordinates load, edits, save
/// and synchronization.
///
/// Every edit made through the manager is forwarded to the subscribed
/// listeners. Edits that need a missing language file, or a read-only one,
/// are gated by [`ResourceHost::begin_editing`].
pub struct ResourceManager {
    config: Configuration,
    root: Option<PathBuf>,
    entities: Vec<ResourceEntity>,
    host: Arc<dyn ResourceHost>,
    tracer: Arc<dyn Tracer>,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("root", &self.root)
            .field("entities", &self.entities.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl ResourceManager {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            root: None,
            entities: Vec::new(),
            host: Arc::new(AllowAll),
            tracer: Arc::new(LogTracer),
            listeners: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn ResourceHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Registers a callback invoked for every change made through the manager.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&ResourceChange) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&self, change: &ResourceChange) {
        for listener in &self.listeners {
            listener(change);
        }
    }

    fn notify_all(&self, changes: &[ResourceChange]) {
        for change in changes {
            self.notify(change);
        }
    }

    /// Discovers and loads every entity below `root`.
    ///
    /// Returns `Ok(false)` without touching the current state if there are
    /// unsaved changes and the host vetoes the reload.
    pub fn load<P: AsRef<Path>>(&mut self, root: P, cancel: &CancellationToken) -> Result<bool, Error> {
        let root = root.as_ref();
        if !self.confirm_reload() {
            return Ok(false);
        }
        let files = discover_files(root, &self.config, cancel)?;
        self.replace_entities(root, files);
        Ok(true)
    }

    /// Loads entities from files discovered elsewhere, e.g. on a worker thread.
    pub fn load_files<P: AsRef<Path>>(&mut self, root: P, files: Vec<ProjectFile>) -> Result<bool, Error> {
        if !self.confirm_reload() {
            return Ok(false);
        }
        self.replace_entities(root.as_ref(), files);
        Ok(true)
    }

    /// Loads the last root again.
    pub fn reload(&mut self, cancel: &CancellationToken) -> Result<bool, Error> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| Error::invalid_input("nothing loaded yet"))?;
        self.load(root, cancel)
    }

    fn confirm_reload(&self) -> bool {
        if self.has_changes() && !self.host.reloading() {
            self.tracer
                .trace_warning("reload canceled: unsaved changes were kept");
            return false;
        }
        true
    }

    // Entities that fail to load are reported and left out.
    fn replace_entities(&mut self, root: &Path, files: Vec<ProjectFile>) {
        let mut entities = Vec::new();
        for group in group_files(files) {
            match ResourceEntity::load(&group, &self.config) {
                Ok(entity) => entities.push(entity),
                Err(e) => self
                    .tracer
                    .trace_error(&format!("{}: {}", group.unique_name(), e)),
            }
        }
        self.tracer.write_line(&format!(
            "loaded {} entities from {}",
            entities.len(),
            root.display()
        ));
        self.entities = entities;
        self.root = Some(root.to_path_buf());
    }

    /// Adds an entity built elsewhere. Its unique name must be new.
    pub fn add_entity(&mut self, entity: ResourceEntity) -> Result<(), Error> {
        if self.entity(&entity.unique_name()).is_some() {
            return Err(Error::invalid_input(format!(
                "entity `{}` already exists",
                entity.unique_name()
            )));
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn entities(&self) -> &[ResourceEntity] {
        &self.entities
    }

    pub fn entity(&self, unique_name: &str) -> Option<&ResourceEntity> {
        self.entities.iter().find(|e| e.unique_name() == unique_name)
    }

    fn entity_index(&self, unique_name: &str) -> Result<usize, Error> {
        self.entities
            .iter()
            .position(|e| e.unique_name() == unique_name)
            .ok_or_else(|| Error::invalid_input(format!("unknown entity `{}`", unique_name)))
    }

    /// Every culture loaded by at least one entity, neutral first.
    pub fn cultures(&self) -> Vec<CultureKey> {
        let mut cultures: Vec<CultureKey> = self
            .entities
            .iter()
            .flat_map(ResourceEntity::cultures)
            .collect();
        cultures.sort();
        cultures.dedup();
        cultures
    }

    pub fn has_changes(&self) -> bool {
        self.entities.iter().any(ResourceEntity::has_changes)
    }

    // Makes sure `culture` can be edited, asking the host before a language
    // file is created or a read-only one is unlocked.
    fn ensure_editable(&mut self, index: usize, culture: &CultureKey) -> Result<(), Error> {
        let entity = &self.entities[index];
        match entity.language(culture) {
            None => {
                if !self.host.begin_editing(entity, culture) {
                    return Err(Error::UnknownCulture(culture.to_string_or("neutral")));
                }
                let change = self.entities[index].create_language(culture)?;
                self.notify(&change);
            }
            Some(language) if !language.is_writable() => {
                if !self.host.begin_editing(entity, culture) {
                    return Err(Error::ReadOnlyTarget(language.path().to_path_buf()));
                }
                entity.make_writable(culture)?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn edit<F>(&mut self, entity: &str, culture: &CultureKey, edit: F) -> Result<Option<ResourceChange>, Error>
    where
        F: FnOnce(&mut ResourceEntity) -> Result<Option<ResourceChange>, Error>,
    {
        let index = self.entity_index(entity)?;
        self.ensure_editable(index, culture)?;
        let change = edit(&mut self.entities[index])?;
        if let Some(change) = &change {
            self.notify(change);
        }
        Ok(change)
    }

    pub fn set_value(
        &mut self,
        entity: &str,
        key: &str,
        culture: &CultureKey,
        value: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        // Clearing a value never needs a new file.
        if value.is_empty() && self.entities[self.entity_index(entity)?].language(culture).is_none() {
            return Ok(None);
        }
        self.edit(entity, culture, |e| e.set_value(key, culture, value))
    }

    pub fn set_comment(
        &mut self,
        entity: &str,
        key: &str,
        culture: &CultureKey,
        comment: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        if comment.is_empty() && self.entities[self.entity_index(entity)?].language(culture).is_none() {
            return Ok(None);
        }
        self.edit(entity, culture, |e| e.set_comment(key, culture, comment))
    }

    pub fn set_invariant(
        &mut self,
        entity: &str,
        key: &str,
        culture: &CultureKey,
        invariant: bool,
    ) -> Result<Option<ResourceChange>, Error> {
        self.edit(entity, culture, |e| e.set_invariant(key, culture, invariant))
    }

    pub fn add_entry(&mut self, entity: &str, key: &str, neutral_value: &str) -> Result<ResourceChange, Error> {
        let neutral = CultureKey::neutral();
        self.edit(entity, &neutral, |e| e.add_entry(key, neutral_value).map(Some))?
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    pub fn remove_entry(&mut self, entity: &str, key: &str) -> Result<Option<ResourceChange>, Error> {
        let index = self.entity_index(entity)?;
        let change = self.entities[index].remove_entry(key)?;
        if let Some(change) = &change {
            self.notify(change);
        }
        Ok(change)
    }

    pub fn rename_entry(
        &mut self,
        entity: &str,
        key: &str,
        new_key: &str,
    ) -> Result<Option<ResourceChange>, Error> {
        let index = self.entity_index(entity)?;
        let change = self.entities[index].rename_entry(key, new_key)?;
        if let Some(change) = &change {
            self.notify(change);
        }
        Ok(change)
    }

    /// Creates a language file for `culture`, gated by the host.
    pub fn create_language(&mut self, entity: &str, culture: &CultureKey) -> Result<ResourceChange, Error> {
        let index = self.entity_index(entity)?;
        if self.entities[index].language(culture).is_some() {
            return Err(Error::DuplicateCulture(culture.to_string_or("neutral")));
        }
        if !self.host.begin_editing(&self.entities[index], culture) {
            return Err(Error::UnknownCulture(culture.to_string_or("neutral")));
        }
        let change = self.entities[index].create_language(culture)?;
        self.notify(&change);
        Ok(change)
    }

    pub fn remove_language(&mut self, entity: &str, culture: &CultureKey) -> Result<Option<ResourceChange>, Error> {
        let index = self.entity_index(entity)?;
        let change = self.entities[index].remove_language(culture)?;
        if let Some(change) = &change {
            self.notify(change);
        }
        Ok(change)
    }

    /// Saves every dirty file. Failures are traced; the other files are
    /// still saved.
    pub fn save(&mut self) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();
        for entity in &mut self.entities {
            outcome.merge(entity.save());
        }
        for (path, error) in &outcome.failed {
            self.tracer
                .trace_error(&format!("failed to save {}: {}", path.display(), error));
        }
        if !outcome.written.is_empty() {
            self.tracer
                .write_line(&format!("saved {} files", outcome.written.len()));
        }
        outcome
    }

    /// Keys that appear in more than one entity of the same project.
    pub fn duplicate_keys(&self) -> Vec<DuplicateKey> {
        let mut seen: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for entity in &self.entities {
            for entry in entity.entries() {
                seen.entry((entity.project().to_string(), entry.key().to_string()))
                    .or_default()
                    .push(entity.unique_name());
            }
        }
        seen.into_iter()
            .filter(|(_, entities)| entities.len() > 1)
            .map(|((project, key), entities)| DuplicateKey {
                project,
                key,
                entities,
            })
            .collect()
    }

    /// Synchronizes every entity with `<dir>/<base>.<culture>.<ext>`.
    ///
    /// Entities that fail are traced and skipped; the others still run.
    pub fn synchronize(&mut self, culture: &CultureKey, options: SyncOptions) -> Result<Vec<SyncReport>, Error> {
        if culture.is_neutral() {
            return Err(Error::invalid_input(
                "interchange synchronization needs a specific culture",
            ));
        }
        let source_language = self.config.neutral_culture()?;
        let extension = self.config.interchange_extension().to_string();
        let synchronizer = Synchronizer::new(options);

        let mut reports = Vec::new();
        let mut changes = Vec::new();
        let mut failures = Vec::new();
        for entity in &mut self.entities {
            let path = entity.file_path_with_extension(culture, &extension);
            match synchronizer.sync_file(entity, &path, culture, &source_language) {
                Ok((report, entity_changes)) => {
                    reports.push(report);
                    changes.extend(entity_changes);
                }
                Err(e) => failures.push(format!("{}: {}", entity.unique_name(), e)),
            }
        }

        for failure in &failures {
            self.tracer.trace_error(failure);
        }
        self.notify_all(&changes);
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DenyAll, MemoryTracer, TraceLevel};
    use std::{
        fs,
        sync::{Arc, Mutex},
    };

    const NEUTRAL: &str = "<root>\n  <data name=\"Hello\" xml:space=\"preserve\">\n    <value>Hello</value>\n  </data>\n</root>\n";

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("App.csproj"), "").unwrap();
        fs::write(dir.path().join("Resources.resx"), NEUTRAL).unwrap();
        dir
    }

    fn loaded(dir: &tempfile::TempDir) -> ResourceManager {
        let mut manager = ResourceManager::default();
        assert!(manager.load(dir.path(), &CancellationToken::new()).unwrap());
        manager
    }

    #[test]
    fn test_set_value_creates_language_on_demand() {
        let dir = project();
        let mut manager = loaded(&dir);
        let de = CultureKey::parse("de").unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        manager.subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        manager.set_value("Resources", "Hello", &de, "Hallo").unwrap();
        assert!(dir.path().join("Resources.de.resx").exists());
        assert!(manager.has_changes());

        let changes = changes.lock().unwrap();
        assert!(matches!(changes[0], ResourceChange::LanguageAdded { .. }));
        assert!(matches!(changes[1], ResourceChange::ValueChanged { .. }));
    }

    #[test]
    fn test_denied_edit_creates_nothing() {
        let dir = project();
        let mut manager = loaded(&dir).with_host(Arc::new(DenyAll));
        let de = CultureKey::parse("de").unwrap();
        assert!(matches!(
            manager.set_value("Resources", "Hello", &de, "Hallo"),
            Err(Error::UnknownCulture(_))
        ));
        assert!(!dir.path().join("Resources.de.resx").exists());
        assert!(!manager.has_changes());
    }

    #[test]
    fn test_reload_veto_keeps_changes() {
        let dir = project();
        let mut manager = loaded(&dir);
        manager
            .set_value("Resources", "Hello", &CultureKey::neutral(), "Hi")
            .unwrap();

        let mut manager = manager.with_host(Arc::new(DenyAll));
        assert!(!manager.reload(&CancellationToken::new()).unwrap());
        assert!(manager.has_changes());

        let mut manager = manager.with_host(Arc::new(AllowAll));
        assert!(manager.reload(&CancellationToken::new()).unwrap());
        assert!(!manager.has_changes());
    }

    #[test]
    fn test_save_clears_changes() {
        let dir = project();
        let mut manager = loaded(&dir);
        manager
            .set_value("Resources", "Hello", &CultureKey::neutral(), "Hi")
            .unwrap();
        let outcome = manager.save();
        assert!(outcome.is_success());
        assert_eq!(outcome.written.len(), 1);
        assert!(!manager.has_changes());
        assert!(fs::read_to_string(dir.path().join("Resources.resx"))
            .unwrap()
            .contains("<value>Hi</value>"));
    }

    #[test]
    fn test_broken_entity_is_traced_and_skipped() {
        let dir = project();
        fs::write(dir.path().join("Broken.resx"), "<root>").unwrap();
        let tracer = Arc::new(MemoryTracer::new());
        let mut manager = ResourceManager::default().with_tracer(tracer.clone());
        manager.load(dir.path(), &CancellationToken::new()).unwrap();

        assert_eq!(manager.entities().len(), 1);
        let errors = tracer.messages_at(TraceLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Broken"));
    }

    #[test]
    fn test_duplicate_keys_across_entities() {
        let dir = project();
        fs::write(dir.path().join("Other.resx"), NEUTRAL).unwrap();
        let manager = loaded(&dir);
        let duplicates = manager.duplicate_keys();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].key, "Hello");
        assert_eq!(duplicates[0].entities, vec!["Other", "Resources"]);
    }

    fn set_read_only(path: &Path, read_only: bool) {
        let mut permissions = fs::metadata(path).unwrap().permissions();
        permissions.set_readonly(read_only);
        fs::set_permissions(path, permissions).unwrap();
    }

    #[test]
    fn test_malformed_interchange_file_is_left_alone() {
        let dir = project();
        fs::write(dir.path().join("Other.resx"), NEUTRAL).unwrap();
        let broken = dir.path().join("Resources.de.xlf");
        let garbage = "<xliff version=\"1.2\"><file>";
        fs::write(&broken, garbage).unwrap();

        let tracer = Arc::new(MemoryTracer::new());
        let mut manager = ResourceManager::default().with_tracer(tracer.clone());
        manager.load(dir.path(), &CancellationToken::new()).unwrap();
        let de = CultureKey::parse("de").unwrap();
        let reports = manager.synchronize(&de, SyncOptions::default()).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].entity, "Other");
        assert!(reports[0].written);
        assert!(dir.path().join("Other.de.xlf").is_file());
        assert_eq!(fs::read_to_string(&broken).unwrap(), garbage);
        assert!(!manager.has_changes());

        let errors = tracer.messages_at(TraceLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Resources: "), "{}", errors[0]);
    }

    #[test]
    fn test_read_only_file_needs_host_approval() {
        let dir = project();
        let german = dir.path().join("Resources.de.resx");
        fs::write(&german, NEUTRAL.replace("<value>Hello</value>", "<value>Hallo</value>")).unwrap();
        set_read_only(&german, true);
        let de = CultureKey::parse("de").unwrap();

        let mut manager = loaded(&dir).with_host(Arc::new(DenyAll));
        assert!(matches!(
            manager.set_value("Resources", "Hello", &de, "Servus"),
            Err(Error::ReadOnlyTarget(path)) if path.ends_with("Resources.de.resx")
        ));
        assert!(matches!(
            manager.set_comment("Resources", "Hello", &de, "Greeting"),
            Err(Error::ReadOnlyTarget(_))
        ));
        assert!(!manager.has_changes());
        assert!(fs::metadata(&german).unwrap().permissions().readonly());

        let mut manager = manager.with_host(Arc::new(AllowAll));
        manager.set_value("Resources", "Hello", &de, "Servus").unwrap();
        assert!(manager.entity("Resources").unwrap().is_writable(&de));
        assert!(manager.save().is_success());
        assert!(fs::read_to_string(&german).unwrap().contains("<value>Servus</value>"));
    }
}
