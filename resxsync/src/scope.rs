//! Tabular export and import of a selection of entries.

use std::io::{Read, Write};

use serde::Serialize;

use crate::{
    culture::CultureKey,
    error::Error,
    formats::{TableFormat, TableRecord},
    manager::ResourceManager,
};

/// One entry of a scope, addressed by entity unique name and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedEntry {
    pub entity: String,
    pub key: String,
}

/// The entries, value cultures and comment cultures an export covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceScope {
    pub entries: Vec<ScopedEntry>,
    pub languages: Vec<CultureKey>,
    pub comments: Vec<CultureKey>,
}

impl ResourceScope {
    /// Every entry of every entity, with values and comments of every
    /// loaded culture.
    pub fn all(manager: &ResourceManager) -> Self {
        let entries = manager
            .entities()
            .iter()
            .flat_map(|entity| {
                entity.entries().iter().map(|entry| ScopedEntry {
                    entity: entity.unique_name(),
                    key: entry.key().to_string(),
                })
            })
            .collect();
        let cultures = manager.cultures();
        Self {
            entries,
            languages: cultures.clone(),
            comments: cultures,
        }
    }

    /// Restricts value and comment columns to the neutral culture plus `cultures`.
    pub fn with_languages(mut self, cultures: &[CultureKey]) -> Self {
        let keep = |culture: &CultureKey| culture.is_neutral() || cultures.contains(culture);
        self.languages.retain(keep);
        self.comments.retain(keep);
        for culture in cultures {
            if !self.languages.contains(culture) {
                self.languages.push(culture.clone());
            }
        }
        self.languages.sort();
        self
    }
}

/// Counts of an [`import_csv`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows that changed at least one value or comment.
    pub applied: usize,
    /// Rows that matched the current state.
    pub unchanged: usize,
    /// Rows whose entity or key does not exist.
    pub unknown: usize,
    /// Rows rejected by the edit gate or a read-only file.
    pub failed: usize,
}

/// Writes the scoped entries as a table. Cells of cultures an entity has no
/// file for are empty. Comments are written without the invariant marker.
pub fn export_csv<W: Write>(
    manager: &ResourceManager,
    scope: &ResourceScope,
    writer: W,
) -> Result<(), Error> {
    let mut table = TableFormat::new(scope.languages.clone(), scope.comments.clone());
    for scoped in &scope.entries {
        let Some(entity) = manager.entity(&scoped.entity) else {
            tracing::warn!("skipping unknown entity `{}`", scoped.entity);
            continue;
        };
        let Some(entry) = entity.entry(&scoped.key) else {
            tracing::warn!("skipping unknown key `{}` in {}", scoped.key, scoped.entity);
            continue;
        };

        let mut record = TableRecord::new(entity.project(), &scoped.entity, entry.key());
        for culture in &scope.languages {
            if let Some(value) = entry.value(culture) {
                record.values.insert(culture.clone(), value.to_string());
            }
        }
        for culture in &scope.comments {
            if let Some(comment) = entry.comment(culture) {
                record.comments.insert(culture.clone(), comment);
            }
        }
        table.add_record(record);
    }

    tracing::info!("exported {} rows", table.records.len());
    table.to_writer(writer)
}

/// Applies a table written by [`export_csv`] through the manager's gated
/// edit path.
///
/// Rows are matched by `File` (the entity unique name) and `Key`. A cell
/// missing from a short row leaves that culture untouched.
pub fn import_csv<R: Read>(manager: &mut ResourceManager, reader: R) -> Result<ImportReport, Error> {
    let table = TableFormat::from_reader(reader)?;
    let mut report = ImportReport::default();

    for record in &table.records {
        let known = manager
            .entity(&record.file)
            .filter(|entity| record.project.is_empty() || entity.project() == record.project)
            .is_some_and(|entity| entity.entry(&record.key).is_some());
        if !known {
            tracing::warn!("no entry `{}` in {}", record.key, record.file);
            report.unknown += 1;
            continue;
        }

        match apply_record(manager, record) {
            Ok(true) => report.applied += 1,
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                tracing::warn!("{} `{}`: {}", record.file, record.key, e);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "imported {} rows ({} unchanged, {} unknown, {} failed)",
        report.applied,
        report.unchanged,
        report.unknown,
        report.failed
    );
    Ok(report)
}

fn apply_record(manager: &mut ResourceManager, record: &TableRecord) -> Result<bool, Error> {
    let mut changed = false;
    for (culture, value) in &record.values {
        changed |= manager
            .set_value(&record.file, &record.key, culture, value)?
            .is_some();
    }
    for (culture, comment) in &record.comments {
        changed |= manager
            .set_comment(&record.file, &record.key, culture, comment)?
            .is_some();
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CancellationToken;
    use std::fs;

    const NEUTRAL: &str = concat!(
        "<root>\n",
        "  <data name=\"Hello\" xml:space=\"preserve\">\n",
        "    <value>Hello</value>\n",
        "    <comment>Greeting</comment>\n",
        "  </data>\n",
        "  <data name=\"Bye\" xml:space=\"preserve\">\n",
        "    <value>Bye</value>\n",
        "  </data>\n",
        "</root>\n"
    );

    const GERMAN: &str = concat!(
        "<root>\n",
        "  <data name=\"Hello\" xml:space=\"preserve\">\n",
        "    <value>Hallo</value>\n",
        "  </data>\n",
        "</root>\n"
    );

    fn manager() -> (tempfile::TempDir, ResourceManager) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("App.csproj"), "").unwrap();
        fs::write(dir.path().join("Resources.resx"), NEUTRAL).unwrap();
        fs::write(dir.path().join("Resources.de.resx"), GERMAN).unwrap();
        let mut manager = ResourceManager::default();
        manager.load(dir.path(), &CancellationToken::new()).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_export_all() {
        let (_dir, manager) = manager();
        let mut buffer = Vec::new();
        export_csv(&manager, &ResourceScope::all(&manager), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Project,File,Key,Value,Value.de,Comment,Comment.de");
        assert_eq!(lines[1], "App,Resources,Hello,Hello,Hallo,Greeting,");
        assert_eq!(lines[2], "App,Resources,Bye,Bye,,,");
    }

    #[test]
    fn test_import_applies_changes() {
        let (dir, mut manager) = manager();
        let table = concat!(
            "Project,File,Key,Value.de,Comment\n",
            "App,Resources,Hello,Hallo,Greeting\n",
            "App,Resources,Bye,Tschüss,Farewell\n",
            "App,Resources,Missing,x,\n",
            "App,Other,Hello,x,\n"
        );
        let report = import_csv(&mut manager, table.as_bytes()).unwrap();
        assert_eq!(
            report,
            ImportReport {
                applied: 1,
                unchanged: 1,
                unknown: 2,
                failed: 0
            }
        );

        let de = CultureKey::parse("de").unwrap();
        let entry = manager.entity("Resources").unwrap().entry("Bye").unwrap();
        assert_eq!(entry.value(&de), Some("Tschüss"));
        assert_eq!(entry.comment(&CultureKey::neutral()).as_deref(), Some("Farewell"));

        assert!(manager.save().is_success());
        let german = fs::read_to_string(dir.path().join("Resources.de.resx")).unwrap();
        assert!(german.contains("<value>Tschüss</value>"));
    }

    #[test]
    fn test_with_languages_keeps_neutral() {
        let (_dir, manager) = manager();
        let fr = CultureKey::parse("fr").unwrap();
        let scope = ResourceScope::all(&manager).with_languages(&[fr.clone()]);
        assert_eq!(scope.languages, vec![CultureKey::neutral(), fr]);
        assert_eq!(scope.comments, vec![CultureKey::neutral()]);
    }
}
