//! A small, format-preserving XML tree on top of `quick-xml`.
//!
//! Untouched nodes are written back exactly as they were read: start tags keep
//! their raw attribute text, text nodes keep their original escaping, and all
//! whitespace, comments and processing instructions survive a round trip.
//! Only elements that were edited are re-rendered.

use std::io::Write;

use quick_xml::{
    Reader, Writer,
    escape::{escape, partial_escape, unescape},
    events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event},
};

use crate::error::Error;

/// One indentation level used for elements this crate creates.
pub const INDENT: &str = "  ";

const UTF8_BOM: &str = "\u{feff}";

/// A node in the tree. Text-like variants hold their raw (escaped) content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Decl(String),
    PI(String),
    DocType(String),
}

impl Node {
    fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(raw) if raw.chars().all(char::is_whitespace))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    // Raw start tag content as read; dropped as soon as an attribute changes.
    raw_start: Option<String>,
    self_closing: bool,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            raw_start: None,
            self_closing: false,
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, value: &str) -> Self {
        self.set_text(value);
        self
    }

    fn from_start(start: &BytesStart, self_closing: bool) -> Result<Self, Error> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Element {
            name,
            attributes,
            raw_start: Some(String::from_utf8_lossy(start).into_owned()),
            self_closing,
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an attribute, keeping its position if it already exists.
    /// Returns true if the element changed.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) if current == value => false,
            Some((_, current)) => {
                *current = value.to_string();
                self.raw_start = None;
                true
            }
            None => {
                self.attributes.push((name.to_string(), value.to_string()));
                self.raw_start = None;
                true
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        if self.attributes.len() == before {
            return false;
        }
        self.raw_start = None;
        true
    }

    /// Iterates child elements with their index in `children`.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.as_element().map(|element| (index, element)))
    }

    /// First child element with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.elements()
            .map(|(_, element)| element)
            .find(|element| element.local_name() == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|element| element.local_name() == local_name)
    }

    pub fn child_index(&self, local_name: &str) -> Option<usize> {
        self.elements()
            .find(|(_, element)| element.local_name() == local_name)
            .map(|(index, _)| index)
    }

    /// Concatenated, unescaped text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(raw) => match unescape(raw) {
                    Ok(value) => text.push_str(&value),
                    Err(_) => text.push_str(raw),
                },
                Node::CData(raw) => text.push_str(raw),
                _ => {}
            }
        }
        text
    }

    /// Replaces the content with `value`. Returns true if the text changed.
    pub fn set_text(&mut self, value: &str) -> bool {
        if self.text() == value && self.elements().next().is_none() {
            return false;
        }
        self.children.clear();
        if !value.is_empty() {
            self.children.push(Node::Text(partial_escape(value).into_owned()));
            self.open();
        }
        true
    }

    /// Appends `child` as the last element, indented like its siblings.
    ///
    /// `own_indent` is this element's indentation, used when it has no
    /// children to infer the layout from.
    pub fn append_element(&mut self, child: Element, own_indent: &str) -> usize {
        let anchor = self.elements().last().map(|(index, _)| index);
        self.insert_element_after(anchor, child, own_indent)
    }

    /// Inserts `child` right after the node at `anchor` (or at the end when
    /// `anchor` is `None`). Returns the index of the inserted element.
    pub fn insert_element_after(
        &mut self,
        anchor: Option<usize>,
        child: Element,
        own_indent: &str,
    ) -> usize {
        let newline = self.newline();
        let inner_indent = self.inner_indent(own_indent);
        self.open();

        match anchor {
            Some(anchor) if anchor + 1 < self.children.len() => {
                let at = anchor + 1;
                self.children.insert(at, Node::Element(child));
                self.children
                    .insert(at, Node::Text(format!("{}{}", newline, inner_indent)));
                at + 1
            }
            _ => {
                let closing = match self.children.last() {
                    Some(node) if node.is_whitespace() => self.children.pop(),
                    _ => None,
                };
                self.children
                    .push(Node::Text(format!("{}{}", newline, inner_indent)));
                self.children.push(Node::Element(child));
                let index = self.children.len() - 1;
                self.children.push(
                    closing.unwrap_or_else(|| Node::Text(format!("{}{}", newline, own_indent))),
                );
                index
            }
        }
    }

    /// Removes the child at `index` together with the whitespace leading up to it.
    pub fn remove_child(&mut self, index: usize) -> Option<Node> {
        if index >= self.children.len() {
            return None;
        }
        let node = self.children.remove(index);
        if index > 0 && self.children[index - 1].is_whitespace() {
            self.children.remove(index - 1);
        }
        if matches!(node, Node::Element(_)) && self.children.iter().all(Node::is_whitespace) {
            self.children.clear();
        }
        Some(node)
    }

    // `<b />` becomes `<b>...</b>` once it gets content.
    fn open(&mut self) {
        if !self.self_closing {
            return;
        }
        self.self_closing = false;
        if let Some(raw) = &mut self.raw_start {
            let trimmed = raw.trim_end().len();
            raw.truncate(trimmed);
        }
    }

    /// Indentation of the child at `index`, read from the whitespace before it.
    pub fn indent_of(&self, index: usize) -> Option<&str> {
        match self.children.get(index.checked_sub(1)?)? {
            Node::Text(raw) if raw.contains('\n') => raw.rsplit('\n').next(),
            _ => None,
        }
    }

    fn newline(&self) -> &'static str {
        let crlf = self
            .children
            .iter()
            .any(|node| matches!(node, Node::Text(raw) if raw.contains("\r\n")));
        if crlf { "\r\n" } else { "\n" }
    }

    fn inner_indent(&self, own_indent: &str) -> String {
        self.elements()
            .last()
            .and_then(|(index, _)| self.indent_of(index))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", own_indent, INDENT))
    }

    fn start_tag(&self) -> BytesStart<'_> {
        if let Some(raw) = &self.raw_start {
            return BytesStart::from_content(raw.as_str(), self.name.len());
        }
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        start
    }
}

/// A parsed XML file: prolog, root element and epilog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    bom: bool,
    pub nodes: Vec<Node>,
}

impl Document {
    /// Parses a document, keeping every node.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let (bom, text) = match text.strip_prefix(UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start, false)?);
                    continue;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::malformed("unexpected closing tag"))?;
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(Element::from_start(&start, true)?),
                Event::Text(text) => {
                    // Validate entities now so that reads never fail later.
                    text.unescape()?;
                    Node::Text(String::from_utf8_lossy(&text).into_owned())
                }
                Event::CData(data) => Node::CData(String::from_utf8_lossy(&data).into_owned()),
                Event::Comment(comment) => {
                    Node::Comment(String::from_utf8_lossy(&comment).into_owned())
                }
                Event::Decl(decl) => Node::Decl(String::from_utf8_lossy(&decl).into_owned()),
                Event::PI(pi) => Node::PI(String::from_utf8_lossy(&pi).into_owned()),
                Event::DocType(doctype) => {
                    Node::DocType(String::from_utf8_lossy(&doctype).into_owned())
                }
                Event::Eof => break,
                #[allow(unreachable_patterns)]
                _ => continue,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::malformed(format!(
                "unclosed element `{}`",
                open.name()
            )));
        }

        let roots = nodes.iter().filter(|node| node.as_element().is_some()).count();
        if roots != 1 {
            return Err(Error::malformed(format!(
                "expected exactly one root element, found {}",
                roots
            )));
        }

        Ok(Document { bom, nodes })
    }

    pub fn has_bom(&self) -> bool {
        self.bom
    }

    pub fn set_bom(&mut self, bom: bool) {
        self.bom = bom;
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(Node::as_element)
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(Node::as_element_mut)
    }

    /// Resolves a path of child indices starting at the root element.
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut element = self.root()?;
        for &index in path {
            element = element.children.get(index)?.as_element()?;
        }
        Some(element)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut element = self.root_mut()?;
        for &index in path {
            element = element.children.get_mut(index)?.as_element_mut()?;
        }
        Some(element)
    }

    /// Writes the document to any writer (file, memory, etc.).
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        if self.bom {
            writer.write_all(UTF8_BOM.as_bytes())?;
        }
        let mut xml_writer = Writer::new(writer);
        for node in &self.nodes {
            write_node(&mut xml_writer, node)?;
        }
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String, Error> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        String::from_utf8(out).map_err(|e| Error::malformed(e.to_string()))
    }
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<(), Error> {
    match node {
        Node::Element(element) => {
            let start = element.start_tag();
            if element.self_closing && element.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            for child in &element.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
        }
        Node::Text(raw) => writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?,
        Node::CData(raw) => writer.write_event(Event::CData(BytesCData::new(raw.as_str())))?,
        Node::Comment(raw) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?
        }
        Node::Decl(raw) => writer.write_event(Event::Decl(BytesDecl::from_start(
            BytesStart::from_content(raw.as_str(), 3),
        )))?,
        Node::PI(raw) => writer.write_event(Event::PI(BytesPI::new(raw.as_str())))?,
        Node::DocType(raw) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(raw.as_str())))?
        }
    }
    Ok(())
}

/// Escapes a value for use inside a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
    escape(value).into_owned()
}

/// Normalizes serialized XML for "did anything change" comparisons:
/// BOM, line endings and trailing whitespace are not significant.
pub fn canonicalize(text: &str) -> String {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut normalized = text.replace("\r\n", "\n");
    let trimmed = normalized.trim_end().len();
    normalized.truncate(trimmed);
    normalized
}
