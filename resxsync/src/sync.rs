//! Two-way reconciliation between a [`ResourceEntity`] and an XLIFF
//! interchange document for one target culture.
//!
//! For every entry, in neutral file order:
//!
//! 1. A missing unit is appended at the end of the document.
//! 2. A unit whose source differs from the neutral value gets the new
//!    source and falls back to state `new`.
//! 3. Targets are reconciled. A non-empty entity value overwrites the unit
//!    target (state `translated`); a non-empty unit target fills an empty
//!    entity value unless the unit is in state `new`. Clearing a native
//!    value therefore does not stick while the unit still carries a
//!    translated target: the next pass imports it again. Clear the target
//!    too, or disable imports, to remove a translation.
//! 4. The neutral and specific comments are mirrored into notes; an empty
//!    comment removes its note.
//!
//! Units without an entry are kept unless pruning is requested. Running the
//! synchronizer again on unchanged inputs changes nothing, and the file is
//! only written when its content differs.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    culture::CultureKey,
    entity::{ResourceChange, ResourceEntity},
    error::Error,
    formats::{NoteOrigin, TranslationState, XliffDocument},
    traits::Parser,
};

/// Knobs for one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete units that no longer have an entry.
    pub prune_orphans: bool,
    /// Copy non-empty translated unit targets into empty entity values.
    pub import_targets: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prune_orphans: false,
            import_targets: true,
        }
    }
}

/// What a pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub entity: String,
    pub culture: String,
    pub path: Option<PathBuf>,
    pub total: usize,
    pub added: usize,
    pub sources_updated: usize,
    pub targets_exported: usize,
    pub targets_imported: usize,
    pub notes_updated: usize,
    pub orphans: usize,
    pub pruned: usize,
    /// Imports skipped because the language is missing or read-only, or
    /// because the unit target is not translated.
    pub skipped: usize,
    pub written: bool,
}

impl SyncReport {
    /// True if the pass changed neither the document nor the entity.
    pub fn is_noop(&self) -> bool {
        self.added == 0
            && self.sources_updated == 0
            && self.targets_exported == 0
            && self.targets_imported == 0
            && self.notes_updated == 0
            && self.pruned == 0
            && !self.written
    }
}

/// The merge engine.
///
/// With imports enabled, an entity value cleared by hand comes back on the
/// next pass if its unit still holds a translated target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronizer {
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Reconciles `entity` with the interchange file at `path`, creating the
    /// file if needed. The file is written only if its content changed.
    ///
    /// A malformed file aborts before anything is modified.
    pub fn sync_file(
        &self,
        entity: &mut ResourceEntity,
        path: &Path,
        culture: &CultureKey,
        source_language: &CultureKey,
    ) -> Result<(SyncReport, Vec<ResourceChange>), Error> {
        let mut document = if path.exists() {
            XliffDocument::read_from(path).map_err(|e| match e {
                Error::MalformedDocument(message) => {
                    Error::MalformedDocument(format!("{}: {}", path.display(), message))
                }
                other => other,
            })?
        } else {
            let neutral = entity.neutral_language()?;
            let original = neutral
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| entity.unique_name());
            XliffDocument::new(
                source_language.name().unwrap_or_default(),
                culture.name().unwrap_or_default(),
                &original,
            )?
        };

        let (mut report, changes) = self.sync(entity, &mut document, culture)?;
        report.path = Some(path.to_path_buf());
        report.written = document.save_if_changed(path)?;
        tracing::info!(
            "synchronized {} with {}: {} added, {} sources, {} exported, {} imported{}",
            report.entity,
            path.display(),
            report.added,
            report.sources_updated,
            report.targets_exported,
            report.targets_imported,
            if report.written { "" } else { " (unchanged)" }
        );
        Ok((report, changes))
    }

    /// Reconciles `entity` with an in-memory document. Returns the report
    /// and the entity changes caused by imported targets.
    pub fn sync(
        &self,
        entity: &mut ResourceEntity,
        document: &mut XliffDocument,
        culture: &CultureKey,
    ) -> Result<(SyncReport, Vec<ResourceChange>), Error> {
        if culture.is_neutral() {
            return Err(Error::invalid_input(
                "interchange synchronization needs a specific culture",
            ));
        }
        entity.neutral_language()?;
        if let Some(target) = document.target_language() {
            let matches = CultureKey::parse(target).is_ok_and(|target| &target == culture);
            if !matches {
                return Err(Error::invalid_input(format!(
                    "document targets `{}`, not `{}`",
                    target,
                    culture.name().unwrap_or_default()
                )));
            }
        }

        let mut report = SyncReport {
            entity: entity.unique_name(),
            culture: culture.name().unwrap_or_default().to_string(),
            total: entity.entries().len(),
            ..Default::default()
        };
        let mut changes = Vec::new();
        let mut visited = std::collections::HashSet::new();

        for key in entity.keys() {
            let id = entity.logical_id(&key);
            visited.insert(id.clone());
            if let Some(change) = self.sync_entry(entity, document, culture, &key, &id, &mut report)? {
                changes.push(change);
            }
        }

        for id in document.ids() {
            if visited.contains(&id) {
                continue;
            }
            if self.options.prune_orphans {
                document.remove_unit(&id);
                report.pruned += 1;
            } else {
                report.orphans += 1;
            }
        }

        Ok((report, changes))
    }

    fn sync_entry(
        &self,
        entity: &mut ResourceEntity,
        document: &mut XliffDocument,
        culture: &CultureKey,
        key: &str,
        id: &str,
        report: &mut SyncReport,
    ) -> Result<Option<ResourceChange>, Error> {
        let Some(entry) = entity.entry(key) else {
            return Ok(None);
        };
        let source = entry.neutral_value().to_string();
        let specific = entry.value(culture).unwrap_or_default().to_string();
        let neutral_comment = entry.comment(&CultureKey::neutral());
        let specific_comment = entry.comment(culture);
        let invariant = entry.is_explicitly_invariant(culture);

        let mut import = None;
        if document.unit(id).is_none() {
            let mut unit = document.add_unit(id)?;
            unit.set_source(&source);
            unit.set_target(&specific);
            unit.set_state(if specific.is_empty() {
                TranslationState::New
            } else {
                TranslationState::Translated
            });
            unit.set_note(NoteOrigin::NeutralComment, neutral_comment.as_deref());
            unit.set_note(NoteOrigin::SpecificComment, specific_comment.as_deref());
            unit.set_translatable(!invariant);
            report.added += 1;
            if !specific.is_empty() {
                report.targets_exported += 1;
            }
        } else if let Some(mut unit) = document.unit_mut(id) {
            let drifted = unit.as_unit().source() != source;
            if drifted {
                unit.set_source(&source);
                unit.set_state(TranslationState::New);
                report.sources_updated += 1;
            }

            let target = unit.as_unit().target().unwrap_or_default();
            if target != specific {
                if !specific.is_empty() {
                    unit.set_target(&specific);
                    unit.set_state(TranslationState::Translated);
                    report.targets_exported += 1;
                } else if self.options.import_targets {
                    // A target translated from an older source is not imported.
                    if drifted || unit.as_unit().state() == Some(TranslationState::New) {
                        tracing::debug!("not importing `{}`: target is not translated", key);
                        report.skipped += 1;
                    } else {
                        import = Some(target);
                    }
                }
            }

            let notes = [
                unit.set_note(NoteOrigin::NeutralComment, neutral_comment.as_deref()),
                unit.set_note(NoteOrigin::SpecificComment, specific_comment.as_deref()),
            ];
            report.notes_updated += notes.iter().filter(|changed| **changed).count();
            unit.set_translatable(!invariant);
        }

        let Some(target) = import else {
            return Ok(None);
        };
        if entity.language(culture).is_none() || !entity.is_writable(culture) {
            tracing::debug!(
                "not importing `{}` into {}: language missing or read-only",
                key,
                entity.unique_name()
            );
            report.skipped += 1;
            return Ok(None);
        }
        let change = entity.set_value(key, culture, &target)?;
        report.targets_imported += 1;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Configuration, formats::ResxFile, language::ResourceLanguage};
    use indoc::indoc;

    const NEUTRAL: &str = indoc! {r#"
        <root>
          <data name="A" xml:space="preserve">
            <value>Hello</value>
          </data>
          <data name="B" xml:space="preserve">
            <value>Bye</value>
          </data>
        </root>
    "#};

    const GERMAN: &str = "<root>\n</root>\n";

    fn de() -> CultureKey {
        CultureKey::parse("de").unwrap()
    }

    fn entity() -> ResourceEntity {
        let languages = vec![
            ResourceLanguage::from_file(
                "Resources.resx",
                CultureKey::neutral(),
                ResxFile::from_str(NEUTRAL).unwrap(),
            ),
            ResourceLanguage::from_file("Resources.de.resx", de(), ResxFile::from_str(GERMAN).unwrap()),
        ];
        ResourceEntity::from_languages(
            "App",
            Path::new(""),
            Path::new(""),
            "Resources",
            "resx",
            languages,
            &Configuration::default(),
        )
        .unwrap()
    }

    fn document() -> XliffDocument {
        XliffDocument::new("en", "de", "Resources.resx").unwrap()
    }

    #[test]
    fn test_units_are_appended_in_entry_order() {
        let mut entity = entity();
        let mut doc = document();
        let (report, changes) = Synchronizer::default().sync(&mut entity, &mut doc, &de()).unwrap();

        assert_eq!(report.added, 2);
        assert!(changes.is_empty());
        assert_eq!(doc.ids(), vec!["App.A", "App.B"]);
        for unit in doc.units() {
            assert_eq!(unit.state(), Some(TranslationState::New));
            assert_eq!(unit.target().as_deref(), Some(""));
        }
    }

    #[test]
    fn test_second_pass_is_noop() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        let first = doc.to_xml_string().unwrap();

        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert!(report.is_noop());
        assert_eq!(doc.to_xml_string().unwrap(), first);
    }

    #[test]
    fn test_entity_value_is_exported() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        let unit_a = doc.unit("App.A").unwrap().source();

        entity.set_value("B", &de(), "Tschüss").unwrap();
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_exported, 1);

        let b = doc.unit("App.B").unwrap();
        assert_eq!(b.target().as_deref(), Some("Tschüss"));
        assert_eq!(b.state(), Some(TranslationState::Translated));
        let a = doc.unit("App.A").unwrap();
        assert_eq!(a.source(), unit_a);
        assert_eq!(a.state(), Some(TranslationState::New));
    }

    #[test]
    fn test_source_drift_resets_state() {
        let mut entity = entity();
        entity.set_value("A", &de(), "Hallo").unwrap();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(doc.unit("App.A").unwrap().state(), Some(TranslationState::Translated));

        entity.set_value("A", &CultureKey::neutral(), "Hello!").unwrap();
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.sources_updated, 1);
        let a = doc.unit("App.A").unwrap();
        assert_eq!(a.source(), "Hello!");
        assert_eq!(a.target().as_deref(), Some("Hallo"));
        assert_eq!(a.state(), Some(TranslationState::New));
    }

    #[test]
    fn test_unit_target_is_imported() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        let mut unit = doc.unit_mut("App.A").unwrap();
        unit.set_target("Hallo");
        unit.set_state(TranslationState::Translated);

        let (report, changes) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 1);
        assert_eq!(changes.len(), 1);
        assert_eq!(entity.entry("A").unwrap().value(&de()), Some("Hallo"));

        let no_import = Synchronizer::new(SyncOptions {
            import_targets: false,
            ..Default::default()
        });
        let mut unit = doc.unit_mut("App.B").unwrap();
        unit.set_target("Tschüss");
        unit.set_state(TranslationState::Translated);
        let (report, _) = no_import.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 0);
        assert_eq!(entity.entry("B").unwrap().value(&de()), None);
    }

    #[test]
    fn test_untranslated_targets_are_not_imported() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();

        // Filled in by hand but still marked `new`.
        doc.unit_mut("App.B").unwrap().set_target("Tschüss");
        let (report, changes) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 0);
        assert_eq!(report.skipped, 1);
        assert!(changes.is_empty());
        assert_eq!(entity.entry("B").unwrap().value(&de()), None);
    }

    #[test]
    fn test_target_of_drifted_source_is_not_imported() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        let mut unit = doc.unit_mut("App.A").unwrap();
        unit.set_target("Hallo");
        unit.set_state(TranslationState::Translated);

        entity.set_value("A", &CultureKey::neutral(), "Good morning").unwrap();
        let (report, changes) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.sources_updated, 1);
        assert_eq!(report.targets_imported, 0);
        assert_eq!(report.skipped, 1);
        assert!(changes.is_empty());
        assert_eq!(entity.entry("A").unwrap().value(&de()), None);
        let a = doc.unit("App.A").unwrap();
        assert_eq!(a.target().as_deref(), Some("Hallo"));
        assert_eq!(a.state(), Some(TranslationState::New));

        // Still stale on the next pass.
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 0);
        assert_eq!(entity.entry("A").unwrap().value(&de()), None);
    }

    #[test]
    fn test_cleared_value_is_imported_again() {
        let mut entity = entity();
        entity.set_value("A", &de(), "Hallo").unwrap();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();

        entity.set_value("A", &de(), "").unwrap();
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 1);
        assert_eq!(entity.entry("A").unwrap().value(&de()), Some("Hallo"));

        // Clearing the target as well makes it stick.
        entity.set_value("A", &de(), "").unwrap();
        doc.unit_mut("App.A").unwrap().set_target("");
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.targets_imported, 0);
        assert_eq!(entity.entry("A").unwrap().value(&de()), None);
    }

    #[test]
    fn test_notes_follow_comments() {
        let mut entity = entity();
        entity.set_comment("A", &CultureKey::neutral(), "Greeting").unwrap();
        let mut doc = document();
        let sync = Synchronizer::default();
        sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(
            doc.unit("App.A").unwrap().note(NoteOrigin::NeutralComment).as_deref(),
            Some("Greeting")
        );

        entity.set_comment("A", &CultureKey::neutral(), "").unwrap();
        let (report, _) = sync.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.notes_updated, 1);
        assert!(!doc.to_xml_string().unwrap().contains("<note"));
    }

    #[test]
    fn test_invariant_units_are_not_translatable() {
        let mut entity = entity();
        entity.set_invariant("B", &CultureKey::neutral(), true).unwrap();
        let mut doc = document();
        Synchronizer::default().sync(&mut entity, &mut doc, &de()).unwrap();
        assert!(doc.unit("App.A").unwrap().is_translatable());
        assert!(!doc.unit("App.B").unwrap().is_translatable());
    }

    #[test]
    fn test_orphans_are_kept_unless_pruned() {
        let mut entity = entity();
        let mut doc = document();
        doc.add_unit("App.Gone").unwrap().set_source("Gone");

        let (report, _) = Synchronizer::default().sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.orphans, 1);
        assert!(doc.unit("App.Gone").is_some());

        let prune = Synchronizer::new(SyncOptions {
            prune_orphans: true,
            ..Default::default()
        });
        let (report, _) = prune.sync(&mut entity, &mut doc, &de()).unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(doc.ids(), vec!["App.A", "App.B"]);
    }

    #[test]
    fn test_culture_checks() {
        let mut entity = entity();
        let mut doc = document();
        let sync = Synchronizer::default();
        assert!(matches!(
            sync.sync(&mut entity, &mut doc, &CultureKey::neutral()),
            Err(Error::InvalidInput(_))
        ));
        let fr = CultureKey::parse("fr").unwrap();
        assert!(matches!(
            sync.sync(&mut entity, &mut doc, &fr),
            Err(Error::InvalidInput(_))
        ));
    }
}
