//! Support for the XLIFF 1.2 interchange format.
//!
//! Translation units are located anywhere below `xliff/file/body`, including
//! nested `group` elements. Unknown elements, attributes and notes of other
//! origins are preserved; new units are always appended to the end of the
//! first file's body.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    fs,
    path::Path,
    str::FromStr,
};

use indoc::formatdoc;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    traits::{Parser, decode},
    xml::{Document, Element, INDENT, canonicalize, escape_attribute},
};

pub const XLIFF_NAMESPACE: &str = "urn:oasis:names:tc:xliff:document:1.2";

const XLIFF: &str = "xliff";
const FILE: &str = "file";
const BODY: &str = "body";
const GROUP: &str = "group";
const TRANS_UNIT: &str = "trans-unit";
const SOURCE: &str = "source";
const TARGET: &str = "target";
const NOTE: &str = "note";

/// Translation state of a unit's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationState {
    New,
    Translated,
    Final,
}

impl TranslationState {
    pub fn as_str(self) -> &'static str {
        match self {
            TranslationState::New => "new",
            TranslationState::Translated => "translated",
            TranslationState::Final => "final",
        }
    }
}

impl Display for TranslationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the three native states plus the XLIFF 1.2 `needs-*` and
/// `signed-off` values, folded onto the closest native state.
impl FromStr for TranslationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "needs-translation" | "needs-adaptation" | "needs-l10n" => {
                Ok(TranslationState::New)
            }
            "translated"
            | "needs-review-translation"
            | "needs-review-adaptation"
            | "needs-review-l10n" => Ok(TranslationState::Translated),
            "final" | "signed-off" => Ok(TranslationState::Final),
            other => Err(Error::invalid_input(format!(
                "unknown translation state `{}`",
                other
            ))),
        }
    }
}

/// Origin discriminator of the notes this crate writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteOrigin {
    /// The neutral resource comment.
    NeutralComment,
    /// The culture-specific resource comment.
    SpecificComment,
}

impl NoteOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteOrigin::NeutralComment => "resx-neutral-comment",
            NoteOrigin::SpecificComment => "resx-specific-comment",
        }
    }
}

/// A parsed XLIFF document with an index of its translation units.
#[derive(Debug, Clone)]
pub struct XliffDocument {
    document: Document,
    // Element paths (child indices below the root) of every unit, in document order.
    units: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
}

impl Parser for XliffDocument {
    fn from_document(document: Document) -> Result<Self, Error> {
        let root = document
            .root()
            .ok_or_else(|| Error::malformed("xliff document has no root element"))?;
        if root.local_name() != XLIFF {
            return Err(Error::malformed(format!(
                "expected <{}> as root element, found <{}>",
                XLIFF,
                root.name()
            )));
        }
        if root.child(FILE).is_none() {
            return Err(Error::malformed("xliff document has no <file> element"));
        }

        let mut xliff = XliffDocument {
            document,
            units: Vec::new(),
            index: HashMap::new(),
        };
        xliff.rebuild_index();
        Ok(xliff)
    }

    fn document(&self) -> &Document {
        &self.document
    }
}

impl XliffDocument {
    /// Creates an empty document for one source/target language pair.
    pub fn new(source_language: &str, target_language: &str, original: &str) -> Result<Self, Error> {
        let text = formatdoc! {r#"
            <?xml version="1.0" encoding="utf-8"?>
            <xliff version="1.2" xmlns="{namespace}">
              <file datatype="xml" source-language="{source}" target-language="{target}" original="{original}">
                <body>
                </body>
              </file>
            </xliff>
            "#,
            namespace = XLIFF_NAMESPACE,
            source = escape_attribute(source_language),
            target = escape_attribute(target_language),
            original = escape_attribute(original),
        };
        Self::from_str(&text)
    }

    fn file(&self) -> Option<&Element> {
        self.document.root().and_then(|root| root.child(FILE))
    }

    pub fn source_language(&self) -> Option<&str> {
        self.file().and_then(|file| file.attribute("source-language"))
    }

    pub fn target_language(&self) -> Option<&str> {
        self.file().and_then(|file| file.attribute("target-language"))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit ids in document order.
    pub fn ids(&self) -> Vec<String> {
        self.units().map(|unit| unit.id().to_string()).collect()
    }

    pub fn units(&self) -> impl Iterator<Item = TranslationUnit<'_>> {
        self.units
            .iter()
            .filter_map(|path| self.document.element_at(path))
            .map(|element| TranslationUnit { element })
    }

    pub fn unit(&self, id: &str) -> Option<TranslationUnit<'_>> {
        let position = *self.index.get(id)?;
        self.document
            .element_at(&self.units[position])
            .map(|element| TranslationUnit { element })
    }

    pub fn unit_mut(&mut self, id: &str) -> Option<TranslationUnitMut<'_>> {
        let position = *self.index.get(id)?;
        self.unit_mut_at(position)
    }

    /// Appends a new, empty unit at the end of the document.
    pub fn add_unit(&mut self, id: &str) -> Result<TranslationUnitMut<'_>, Error> {
        if self.index.contains_key(id) {
            return Err(Error::invalid_input(format!(
                "translation unit `{}` already exists",
                id
            )));
        }

        let body_path = self.ensure_body()?;
        let body_indent = self.indent_at(&body_path);
        let body = self
            .document
            .element_at_mut(&body_path)
            .ok_or_else(|| Error::malformed("xliff body disappeared"))?;
        let unit = Element::new(TRANS_UNIT)
            .with_attribute("id", id)
            .with_attribute("xml:space", "preserve");
        let index = body.append_element(unit, &body_indent);

        let mut path = body_path;
        path.push(index);
        self.units.push(path);
        let position = self.units.len() - 1;
        self.index.insert(id.to_string(), position);

        self.unit_mut_at(position)
            .ok_or_else(|| Error::malformed("new translation unit not found"))
    }

    /// Removes the unit with the given id. Returns true if it existed.
    pub fn remove_unit(&mut self, id: &str) -> bool {
        let Some(&position) = self.index.get(id) else {
            return false;
        };
        let path = self.units[position].clone();
        let Some((&last, parent_path)) = path.split_last() else {
            return false;
        };
        let removed = self
            .document
            .element_at_mut(parent_path)
            .and_then(|parent| parent.remove_child(last))
            .is_some();
        self.rebuild_index();
        removed
    }

    /// Writes the document unless `path` already holds the same content,
    /// ignoring BOM, line endings and trailing whitespace. Returns true if
    /// the file was written.
    pub fn save_if_changed<P: AsRef<Path>>(&self, path: P) -> Result<bool, Error> {
        let path = path.as_ref();
        let text = self.to_xml_string()?;
        if let Ok(bytes) = fs::read(path) {
            let (existing, _) = decode(&bytes);
            if canonicalize(&existing) == canonicalize(&text) {
                tracing::debug!("{} is up to date", path.display());
                return Ok(false);
            }
        }
        self.write_to(path)?;
        tracing::debug!("wrote {}", path.display());
        Ok(true)
    }

    fn unit_mut_at(&mut self, position: usize) -> Option<TranslationUnitMut<'_>> {
        let path = self.units.get(position)?.clone();
        let indent = self.indent_at(&path);
        let element = self.document.element_at_mut(&path)?;
        Some(TranslationUnitMut { element, indent })
    }

    // Indentation of the element at `path`, read from its parent's whitespace.
    fn indent_at(&self, path: &[usize]) -> String {
        path.split_last()
            .and_then(|(&last, parent_path)| {
                self.document
                    .element_at(parent_path)
                    .and_then(|parent| parent.indent_of(last))
            })
            .map(str::to_string)
            .unwrap_or_else(|| INDENT.repeat(path.len()))
    }

    fn ensure_body(&mut self) -> Result<Vec<usize>, Error> {
        let root = self
            .document
            .root()
            .ok_or_else(|| Error::malformed("xliff document has no root element"))?;
        let file_index = root
            .child_index(FILE)
            .ok_or_else(|| Error::malformed("xliff document has no <file> element"))?;
        let file_path = vec![file_index];

        let existing = self
            .document
            .element_at(&file_path)
            .and_then(|file| file.child_index(BODY));
        if let Some(body_index) = existing {
            return Ok(vec![file_index, body_index]);
        }

        let file_indent = self.indent_at(&file_path);
        let file = self
            .document
            .element_at_mut(&file_path)
            .ok_or_else(|| Error::malformed("xliff document has no <file> element"))?;
        let body_index = file.append_element(Element::new(BODY), &file_indent);
        Ok(vec![file_index, body_index])
    }

    fn rebuild_index(&mut self) {
        let mut units = Vec::new();
        if let Some(root) = self.document.root() {
            collect_units(root, &mut Vec::new(), &mut units);
        }

        let mut index = HashMap::new();
        for (position, path) in units.iter().enumerate() {
            if let Some(id) = self
                .document
                .element_at(path)
                .and_then(|element| element.attribute("id"))
            {
                index.entry(id.to_string()).or_insert(position);
            }
        }

        self.units = units;
        self.index = index;
    }
}

fn collect_units(element: &Element, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (index, child) in element.elements() {
        path.push(index);
        match child.local_name() {
            TRANS_UNIT => out.push(path.clone()),
            FILE | BODY | GROUP => collect_units(child, path, out),
            _ => {}
        }
        path.pop();
    }
}

/// Read-only view of one `<trans-unit>`.
#[derive(Debug, Clone, Copy)]
pub struct TranslationUnit<'a> {
    element: &'a Element,
}

impl<'a> TranslationUnit<'a> {
    pub fn id(&self) -> &'a str {
        self.element.attribute("id").unwrap_or_default()
    }

    pub fn source(&self) -> String {
        self.element.child(SOURCE).map(Element::text).unwrap_or_default()
    }

    /// The target text, `None` if the unit has no `<target>` element.
    pub fn target(&self) -> Option<String> {
        self.element.child(TARGET).map(Element::text)
    }

    /// The target state; unknown or missing states read as `None`.
    pub fn state(&self) -> Option<TranslationState> {
        self.element
            .child(TARGET)
            .and_then(|target| target.attribute("state"))
            .and_then(|state| state.parse().ok())
    }

    pub fn is_translatable(&self) -> bool {
        self.element.attribute("translate") != Some("no")
    }

    pub fn note(&self, origin: NoteOrigin) -> Option<String> {
        find_note(self.element, origin)
            .and_then(|index| self.element.children[index].as_element())
            .map(Element::text)
    }

    /// All notes as `(from, text)` pairs, including foreign ones.
    pub fn notes(&self) -> Vec<(Option<&'a str>, String)> {
        self.element
            .elements()
            .filter(|(_, element)| element.local_name() == NOTE)
            .map(|(_, element)| (element.attribute("from"), element.text()))
            .collect()
    }
}

/// Mutable view of one `<trans-unit>`. Every setter returns true if the
/// document changed.
#[derive(Debug)]
pub struct TranslationUnitMut<'a> {
    element: &'a mut Element,
    indent: String,
}

impl TranslationUnitMut<'_> {
    pub fn as_unit(&self) -> TranslationUnit<'_> {
        TranslationUnit {
            element: &*self.element,
        }
    }

    pub fn set_source(&mut self, value: &str) -> bool {
        match self.element.child_mut(SOURCE) {
            Some(source) => source.set_text(value),
            None => {
                let source = Element::new(SOURCE).with_text(value);
                self.element.insert_element_after(None, source, &self.indent);
                true
            }
        }
    }

    pub fn set_target(&mut self, value: &str) -> bool {
        match self.element.child_mut(TARGET) {
            Some(target) => target.set_text(value),
            None => {
                self.insert_target(value);
                true
            }
        }
    }

    /// Sets the target state, creating an empty `<target>` if needed. An
    /// existing state attribute that already reads as `state` is kept as is.
    pub fn set_state(&mut self, state: TranslationState) -> bool {
        if self.as_unit().state() == Some(state) {
            return false;
        }
        if self.element.child(TARGET).is_none() {
            self.insert_target("");
        }
        self.element
            .child_mut(TARGET)
            .is_some_and(|target| target.set_attribute("state", state.as_str()))
    }

    /// Sets the note of the given origin. An empty or absent value removes
    /// the note element entirely.
    pub fn set_note(&mut self, origin: NoteOrigin, value: Option<&str>) -> bool {
        let value = value.filter(|v| !v.is_empty());
        match (find_note(self.element, origin), value) {
            (Some(index), Some(value)) => self.element.children[index]
                .as_element_mut()
                .is_some_and(|note| note.set_text(value)),
            (Some(index), None) => self.element.remove_child(index).is_some(),
            (None, Some(value)) => {
                let note = Element::new(NOTE)
                    .with_attribute("from", origin.as_str())
                    .with_text(value);
                self.element.append_element(note, &self.indent);
                true
            }
            (None, None) => false,
        }
    }

    pub fn set_translatable(&mut self, translatable: bool) -> bool {
        if translatable {
            self.element.attribute("translate") == Some("no")
                && self.element.remove_attribute("translate")
        } else {
            self.element.set_attribute("translate", "no")
        }
    }

    fn insert_target(&mut self, value: &str) {
        let anchor = self.element.child_index(SOURCE);
        let target = Element::new(TARGET).with_text(value);
        self.element.insert_element_after(anchor, target, &self.indent);
    }
}

fn find_note(unit: &Element, origin: NoteOrigin) -> Option<usize> {
    unit.elements()
        .find(|(_, element)| {
            element.local_name() == NOTE && element.attribute("from") == Some(origin.as_str())
        })
        .map(|(index, _)| index)
}
