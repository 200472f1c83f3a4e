//! Support for the `.resx` / `.resw` native resource format.
//!
//! Only string `<data>` nodes are exposed; binary and file resources (nodes
//! with a non-string `type` or a `mimetype`) and every other node of the file
//! are carried through untouched.

use indoc::indoc;
use lazy_static::lazy_static;

use crate::{
    error::Error,
    traits::Parser,
    xml::{Document, Element, INDENT, Node},
};

const ROOT: &str = "root";
const DATA: &str = "data";
const VALUE: &str = "value";
const COMMENT: &str = "comment";

/// Header written for files created from scratch.
const EMPTY_RESX: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <root>
      <resheader name="resmimetype">
        <value>text/microsoft-resx</value>
      </resheader>
      <resheader name="version">
        <value>2.0</value>
      </resheader>
      <resheader name="reader">
        <value>System.Resources.ResXResourceReader, System.Windows.Forms, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089</value>
      </resheader>
      <resheader name="writer">
        <value>System.Resources.ResXResourceWriter, System.Windows.Forms, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089</value>
      </resheader>
    </root>
"#};

lazy_static! {
    static ref EMPTY_DOCUMENT: Document =
        Document::parse(EMPTY_RESX).expect("built-in resx template is well-formed");
}

/// One string resource as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResxEntry {
    pub key: String,
    pub value: String,
    pub comment: Option<String>,
}

/// A parsed `.resx` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResxFile {
    document: Document,
}

impl Parser for ResxFile {
    fn from_document(document: Document) -> Result<Self, Error> {
        match document.root() {
            Some(root) if root.local_name() == ROOT => Ok(ResxFile { document }),
            Some(root) => Err(Error::malformed(format!(
                "expected <{}> as resx root element, found <{}>",
                ROOT,
                root.name()
            ))),
            None => Err(Error::malformed("resx file has no root element")),
        }
    }

    fn document(&self) -> &Document {
        &self.document
    }
}

impl Default for ResxFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ResxFile {
    /// Creates an empty resource file with the standard headers.
    pub fn new() -> Self {
        ResxFile {
            document: EMPTY_DOCUMENT.clone(),
        }
    }

    /// A copy of this file with every `<data>` node removed, used as the
    /// starting point for a new culture.
    pub fn template(&self) -> ResxFile {
        let mut template = self.clone();
        if let Some(root) = template.document.root_mut() {
            let data_nodes: Vec<usize> = root
                .elements()
                .filter(|(_, element)| element.local_name() == DATA)
                .map(|(index, _)| index)
                .collect();
            for index in data_nodes.into_iter().rev() {
                root.remove_child(index);
            }
        }
        template
    }

    /// All string entries in file order, duplicates included.
    pub fn entries(&self) -> Vec<ResxEntry> {
        self.root()
            .map(|root| {
                root.elements()
                    .filter_map(|(_, element)| to_entry(element))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The first entry with the given key.
    pub fn get(&self, key: &str) -> Option<ResxEntry> {
        let index = self.position(key)?;
        self.root()
            .and_then(|root| root.children.get(index))
            .and_then(Node::as_element)
            .and_then(to_entry)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Sets the value of `key`, appending a new `<data>` node if needed.
    /// Returns true if the file changed.
    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        let Some(index) = self.position(key).or_else(|| self.insert_data(key)) else {
            return false;
        };
        let Some(root) = self.document.root_mut() else {
            return false;
        };
        let own_indent = root.indent_of(index).unwrap_or(INDENT).to_string();
        let Some(data) = root.children.get_mut(index).and_then(Node::as_element_mut) else {
            return false;
        };

        match data.child_mut(VALUE) {
            Some(element) => element.set_text(value),
            None => {
                data.append_element(Element::new(VALUE).with_text(value), &own_indent);
                true
            }
        }
    }

    /// Sets or removes the comment of an existing key.
    /// An empty or absent comment removes the `<comment>` element.
    pub fn set_comment(&mut self, key: &str, comment: Option<&str>) -> bool {
        let comment = comment.filter(|c| !c.is_empty());
        let Some(index) = self.position(key) else {
            return match comment {
                Some(comment) => {
                    self.set_value(key, "");
                    self.set_comment(key, Some(comment))
                }
                None => false,
            };
        };
        let Some(root) = self.document.root_mut() else {
            return false;
        };
        let own_indent = root.indent_of(index).unwrap_or(INDENT).to_string();
        let Some(data) = root.children.get_mut(index).and_then(Node::as_element_mut) else {
            return false;
        };

        match (data.child_index(COMMENT), comment) {
            (Some(at), Some(comment)) => data.children[at]
                .as_element_mut()
                .is_some_and(|element| element.set_text(comment)),
            (Some(at), None) => data.remove_child(at).is_some(),
            (None, Some(comment)) => {
                let anchor = data.child_index(VALUE);
                data.insert_element_after(
                    anchor,
                    Element::new(COMMENT).with_text(comment),
                    &own_indent,
                );
                true
            }
            (None, None) => false,
        }
    }

    /// Removes the first `<data>` node with the given key.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.document
            .root_mut()
            .and_then(|root| root.remove_child(index))
            .is_some()
    }

    /// Renames the first entry called `key`.
    pub fn rename(&mut self, key: &str, new_key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.rename_node(index, new_key)
    }

    /// Renames the entry at `ordinal` (its position in [`ResxFile::entries`]).
    pub fn rename_at(&mut self, ordinal: usize, new_key: &str) -> bool {
        match self.string_data_indices().get(ordinal) {
            Some(&index) => self.rename_node(index, new_key),
            None => false,
        }
    }

    fn rename_node(&mut self, index: usize, new_key: &str) -> bool {
        self.document
            .root_mut()
            .and_then(|root| root.children.get_mut(index))
            .and_then(Node::as_element_mut)
            .is_some_and(|data| data.set_attribute("name", new_key))
    }

    fn root(&self) -> Option<&Element> {
        self.document.root()
    }

    fn string_data_indices(&self) -> Vec<usize> {
        self.root()
            .map(|root| {
                root.elements()
                    .filter(|(_, element)| is_string_data(element))
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.root().and_then(|root| {
            root.elements()
                .find(|(_, element)| is_string_data(element) && element.attribute("name") == Some(key))
                .map(|(index, _)| index)
        })
    }

    fn insert_data(&mut self, key: &str) -> Option<usize> {
        let data = Element::new(DATA)
            .with_attribute("name", key)
            .with_attribute("xml:space", "preserve");
        Some(self.document.root_mut()?.append_element(data, ""))
    }
}

fn is_string_data(element: &Element) -> bool {
    element.local_name() == DATA
        && element.attribute("name").is_some()
        && element.attribute("mimetype").is_none()
        && element
            .attribute("type")
            .is_none_or(|ty| ty.starts_with("System.String"))
}

fn to_entry(element: &Element) -> Option<ResxEntry> {
    if !is_string_data(element) {
        return None;
    }
    Some(ResxEntry {
        key: element.attribute("name")?.to_string(),
        value: element.child(VALUE).map(Element::text).unwrap_or_default(),
        comment: element
            .child(COMMENT)
            .map(Element::text)
            .filter(|c| !c.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <root>
          <!-- designer header -->
          <resheader name="resmimetype">
            <value>text/microsoft-resx</value>
          </resheader>
          <data name="Hello" xml:space="preserve">
            <value>Hello</value>
            <comment>Greeting</comment>
          </data>
          <data name="Logo" type="System.Resources.ResXFileRef, System.Windows.Forms">
            <value>logo.png;System.Drawing.Bitmap</value>
          </data>
          <data name="Bye" xml:space="preserve">
            <value>Bye</value>
          </data>
        </root>
    "#};

    #[test]
    fn test_parse_string_entries_only() {
        let file = ResxFile::from_str(SAMPLE).unwrap();
        let entries = file.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "Hello");
        assert_eq!(entries[0].value, "Hello");
        assert_eq!(entries[0].comment.as_deref(), Some("Greeting"));
        assert_eq!(entries[1].key, "Bye");
        assert_eq!(entries[1].comment, None);
    }

    #[test]
    fn test_untouched_file_round_trips() {
        let file = ResxFile::from_str(SAMPLE).unwrap();
        assert_eq!(file.to_xml_string().unwrap(), SAMPLE);
    }

    #[test]
    fn test_set_value_updates_in_place() {
        let mut file = ResxFile::from_str(SAMPLE).unwrap();
        assert!(file.set_value("Bye", "Goodbye"));
        assert!(!file.set_value("Bye", "Goodbye"));
        let out = file.to_xml_string().unwrap();
        assert_eq!(out, SAMPLE.replace("<value>Bye</value>", "<value>Goodbye</value>"));
    }

    #[test]
    fn test_set_value_appends_new_data_node() {
        let mut file = ResxFile::from_str(SAMPLE).unwrap();
        assert!(file.set_value("New", "a < b"));
        let out = file.to_xml_string().unwrap();
        assert!(out.ends_with(indoc! {r#"
              <data name="New" xml:space="preserve">
                <value>a &lt; b</value>
              </data>
            </root>
        "#}));
        assert_eq!(file.get("New").unwrap().value, "a < b");
    }

    #[test]
    fn test_set_comment_adds_and_removes_element() {
        let mut file = ResxFile::from_str(SAMPLE).unwrap();
        assert!(file.set_comment("Bye", Some("Farewell")));
        assert!(file.to_xml_string().unwrap().contains(
            "<value>Bye</value>\n    <comment>Farewell</comment>\n  </data>"
        ));

        assert!(file.set_comment("Bye", Some("")));
        assert_eq!(file.to_xml_string().unwrap(), SAMPLE);
        assert!(!file.set_comment("Bye", None));
    }

    #[test]
    fn test_remove_and_rename() {
        let mut file = ResxFile::from_str(SAMPLE).unwrap();
        assert!(file.rename("Hello", "Hi"));
        assert!(file.contains_key("Hi"));
        assert!(!file.contains_key("Hello"));
        assert!(file.remove("Hi"));
        assert_eq!(file.entries().len(), 1);
        assert!(!file.remove("Hi"));
    }

    #[test]
    fn test_rename_at_targets_duplicate() {
        let xml = indoc! {r#"
            <root>
              <data name="A"><value>1</value></data>
              <data name="A"><value>2</value></data>
            </root>
        "#};
        let mut file = ResxFile::from_str(xml).unwrap();
        assert!(file.rename_at(1, "A_Duplicate[1]"));
        let keys: Vec<String> = file.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["A", "A_Duplicate[1]"]);
        assert_eq!(file.get("A_Duplicate[1]").unwrap().value, "2");
    }

    #[test]
    fn test_template_strips_data_nodes() {
        let file = ResxFile::from_str(SAMPLE).unwrap();
        let template = file.template();
        assert!(template.entries().is_empty());
        let out = template.to_xml_string().unwrap();
        assert!(out.contains("<!-- designer header -->"));
        assert!(out.contains("text/microsoft-resx"));
        assert!(!out.contains("Logo"));
    }

    #[test]
    fn test_new_file_has_headers() {
        let file = ResxFile::new();
        assert!(file.entries().is_empty());
        assert!(file.to_xml_string().unwrap().contains("text/microsoft-resx"));
    }

    #[test]
    fn test_wrong_root_is_malformed() {
        let result = ResxFile::from_str("<xliff/>");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }
}
