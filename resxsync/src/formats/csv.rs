//! Support for the tabular CSV layout used to export and import resources.
//!
//! The first three columns are `Project`, `File` and `Key`. They are followed
//! by one `Value[.culture]` column per language and one `Comment[.culture]`
//! column per comment culture, where the neutral culture has no suffix.
use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use crate::{culture::CultureKey, error::Error};

const PROJECT: &str = "Project";
const FILE: &str = "File";
const KEY: &str = "Key";
const VALUE: &str = "Value";
const COMMENT: &str = "Comment";

/// One row of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRecord {
    pub project: String,
    pub file: String,
    pub key: String,
    pub values: BTreeMap<CultureKey, String>,
    pub comments: BTreeMap<CultureKey, String>,
}

impl TableRecord {
    pub fn new(project: &str, file: &str, key: &str) -> Self {
        Self {
            project: project.to_string(),
            file: file.to_string(),
            key: key.to_string(),
            ..Default::default()
        }
    }
}

/// The whole table: column layout plus rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Format {
    pub languages: Vec<CultureKey>,
    pub comment_languages: Vec<CultureKey>,
    pub records: Vec<TableRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Value(CultureKey),
    Comment(CultureKey),
    Ignored,
}

impl Format {
    pub fn new(languages: Vec<CultureKey>, comment_languages: Vec<CultureKey>) -> Self {
        Self {
            languages,
            comment_languages,
            records: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: TableRecord) {
        self.records.push(record);
    }

    /// The header row for the current layout.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec![PROJECT.to_string(), FILE.to_string(), KEY.to_string()];
        header.extend(self.languages.iter().map(|c| format!("{}{}", VALUE, c)));
        header.extend(self.comment_languages.iter().map(|c| format!("{}{}", COMMENT, c)));
        header
    }

    /// Parse from any reader. The first row must be a header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let fixed: Vec<&str> = headers.iter().take(3).collect();
        let expected = [PROJECT, FILE, KEY];
        if fixed.len() != 3
            || !fixed
                .iter()
                .zip(expected)
                .all(|(actual, wanted)| actual.trim().eq_ignore_ascii_case(wanted))
        {
            return Err(Error::invalid_input(format!(
                "table must start with the columns {}",
                expected.join(",")
            )));
        }

        let columns: Vec<Column> = headers.iter().skip(3).map(parse_column).collect();
        let mut format = Format::default();
        for column in &columns {
            match column {
                Column::Value(culture) => format.languages.push(culture.clone()),
                Column::Comment(culture) => format.comment_languages.push(culture.clone()),
                Column::Ignored => {}
            }
        }

        for row in rdr.records() {
            let row = row?;
            let field = |index: usize| row.get(index).unwrap_or_default();
            let mut record = TableRecord::new(field(0), field(1), field(2));
            if record.key.is_empty() {
                continue;
            }
            for (offset, column) in columns.iter().enumerate() {
                let Some(text) = row.get(offset + 3) else {
                    break;
                };
                match column {
                    Column::Value(culture) => {
                        record.values.insert(culture.clone(), text.to_string());
                    }
                    Column::Comment(culture) => {
                        record.comments.insert(culture.clone(), text.to_string());
                    }
                    Column::Ignored => {}
                }
            }
            format.records.push(record);
        }

        Ok(format)
    }

    /// Write to any writer (file, memory, etc.).
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(self.header())?;

        for record in &self.records {
            let mut row = vec![
                record.project.as_str(),
                record.file.as_str(),
                record.key.as_str(),
            ];
            for culture in &self.languages {
                row.push(record.values.get(culture).map_or("", String::as_str));
            }
            for culture in &self.comment_languages {
                row.push(record.comments.get(culture).map_or("", String::as_str));
            }
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

fn parse_column(name: &str) -> Column {
    let name = name.trim();
    let culture = |rest: &str| CultureKey::parse(rest).ok();
    if let Some(rest) = name.strip_prefix(VALUE) {
        if rest.is_empty() || rest.starts_with('.') {
            if let Some(culture) = culture(rest) {
                return Column::Value(culture);
            }
        }
    } else if let Some(rest) = name.strip_prefix(COMMENT) {
        if rest.is_empty() || rest.starts_with('.') {
            if let Some(culture) = culture(rest) {
                return Column::Comment(culture);
            }
        }
    }
    tracing::warn!("ignoring unknown column `{}`", name);
    Column::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn culture(name: &str) -> CultureKey {
        CultureKey::parse(name).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let format = Format::new(vec![culture(""), culture("de")], vec![culture("")]);
        assert_eq!(
            format.header(),
            vec!["Project", "File", "Key", "Value", "Value.de", "Comment"]
        );
    }

    #[test]
    fn test_write_multi_language_table() {
        let mut format = Format::new(vec![culture(""), culture("de")], vec![culture("de")]);
        let mut record = TableRecord::new("App", "Resources", "Hello");
        record.values.insert(culture(""), "Hello".to_string());
        record.values.insert(culture("de"), "Hallo, Welt".to_string());
        format.add_record(record);

        let mut out = Vec::new();
        format.to_writer(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Project,File,Key,Value,Value.de,Comment.de\nApp,Resources,Hello,Hello,\"Hallo, Welt\",\n"
        );
    }

    #[test]
    fn test_parse_multi_language_table() {
        let content = "Project,File,Key,Value,Value.de,Comment.de,Notes\n\
                       App,Resources,Hello,Hello,Hallo,informal,x\n\
                       App,Resources,Bye,Bye\n";
        let format = Format::from_reader(Cursor::new(content)).unwrap();
        assert_eq!(format.languages, vec![culture(""), culture("de")]);
        assert_eq!(format.comment_languages, vec![culture("de")]);
        assert_eq!(format.records.len(), 2);

        let hello = &format.records[0];
        assert_eq!(hello.values.get(&culture("de")).map(String::as_str), Some("Hallo"));
        assert_eq!(hello.comments.get(&culture("de")).map(String::as_str), Some("informal"));

        // Short rows leave the missing cells untouched rather than empty.
        let bye = &format.records[1];
        assert_eq!(bye.values.len(), 1);
        assert!(bye.comments.is_empty());
    }

    #[test]
    fn test_rows_without_key_are_skipped() {
        let content = "Project,File,Key,Value\nApp,Resources,,orphan\n";
        let format = Format::from_reader(Cursor::new(content)).unwrap();
        assert!(format.records.is_empty());
    }

    #[test]
    fn test_missing_fixed_columns_fail() {
        let content = "Key,Value\nHello,Hello\n";
        assert!(matches!(
            Format::from_reader(Cursor::new(content)),
            Err(Error::InvalidInput(_))
        ));
    }
}
