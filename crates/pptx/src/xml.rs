//! In-memory XML tree for OOXML parts.
//!
//! Parts are read with `quick-xml` into a small element tree that keeps
//! qualified names exactly as written, so namespace prefixes (`a:`, `p:`,
//! `r:`) survive a load/save cycle untouched. Every element also carries
//! its resolved namespace URI, and lookups go through `(namespace, local
//! name)` pairs rather than raw prefixes.

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use restyle_core::{Error, Result};
use std::fs;
use std::path::Path;

/// DrawingML main namespace (`a:`).
pub const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// PresentationML main namespace (`p:`).
pub const PRESENTATIONML_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// Office document relationships namespace (`r:`).
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// The implicitly bound `xml:` namespace.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefixes registered for the parts this crate edits.
pub const REGISTERED_PREFIXES: [(&str, &str); 3] = [
    ("a", DRAWINGML_NS),
    ("p", PRESENTATIONML_NS),
    ("r", RELATIONSHIPS_NS),
];

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its qualified name, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an element with no namespace binding.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element in `namespace`, written with `prefix`
    /// (an empty prefix writes the bare local name).
    pub fn new_ns(prefix: &str, local: &str, namespace: &str) -> Self {
        let name = if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{}", prefix, local)
        };
        Self {
            name,
            namespace: Some(namespace.to_string()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element sharing this element's prefix and namespace.
    pub fn sibling_kind(&self, local: &str) -> Self {
        let mut el = Self::new_ns(self.prefix(), local, "");
        el.namespace = self.namespace.clone();
        el
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Qualified name as written, e.g. `a:rPr`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn prefix(&self) -> &str {
        self.name.split_once(':').map(|(p, _)| p).unwrap_or("")
    }

    /// Resolved namespace URI, if the prefix was bound.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether this element is `{namespace}local`.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local_name() == local && self.namespace.as_deref() == Some(namespace)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == key)
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// First child element named `{namespace}local`.
    pub fn find(&self, namespace: &str, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(namespace, local))
    }

    pub fn find_mut(&mut self, namespace: &str, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(namespace, local))
    }

    /// All child elements named `{namespace}local`.
    pub fn find_all<'a>(
        &'a self,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.is(namespace, local))
    }

    /// Follow a path of `(namespace, local)` steps through child elements.
    pub fn find_path(&self, path: &[(&str, &str)]) -> Option<&XmlElement> {
        path.iter()
            .try_fold(self, |el, (ns, local)| el.find(ns, local))
    }

    pub fn find_path_mut(&mut self, path: &[(&str, &str)]) -> Option<&mut XmlElement> {
        let mut current = self;
        for (ns, local) in path {
            current = current.find_mut(ns, local)?;
        }
        Some(current)
    }

    /// Indices (into [`XmlElement::children`]) of child elements named
    /// `{namespace}local`.
    pub fn child_indices(&self, namespace: &str, local: &str) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, node)| node.as_element().is_some_and(|e| e.is(namespace, local)))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn element_at(&self, idx: usize) -> Option<&XmlElement> {
        self.children.get(idx).and_then(XmlNode::as_element)
    }

    pub fn element_at_mut(&mut self, idx: usize) -> Option<&mut XmlElement> {
        self.children.get_mut(idx).and_then(XmlNode::as_element_mut)
    }

    /// Descendant elements named `{namespace}local`, in document order.
    /// Matches are not searched further.
    pub fn descendants(&self, namespace: &str, local: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        collect_descendants(self, namespace, local, &mut found);
        found
    }

    /// Visit descendant elements named `{namespace}local` in document order.
    /// Matches are not searched further, so `visit` may freely restructure
    /// the element it is given.
    pub fn for_each_descendant_mut<F>(&mut self, namespace: &str, local: &str, visit: &mut F)
    where
        F: FnMut(&mut XmlElement),
    {
        for child in self.elements_mut() {
            if child.is(namespace, local) {
                visit(child);
            } else {
                child.for_each_descendant_mut(namespace, local, visit);
            }
        }
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn insert_child(&mut self, idx: usize, child: XmlElement) {
        let idx = idx.min(self.children.len());
        self.children.insert(idx, XmlNode::Element(child));
    }

    /// Insert `child` at its schema position.
    ///
    /// `order` lists sibling local names in the order the schema requires;
    /// the child goes right before the first existing sibling that must
    /// follow it, or at the end. Returns the index it was inserted at.
    pub fn insert_ordered(&mut self, child: XmlElement, order: &[&str]) -> usize {
        let rank = order.iter().position(|n| *n == child.local_name());
        let idx = rank
            .and_then(|rank| {
                self.children.iter().position(|node| {
                    node.as_element()
                        .and_then(|e| order.iter().position(|n| *n == e.local_name()))
                        .is_some_and(|r| r > rank)
                })
            })
            .unwrap_or(self.children.len());
        self.children.insert(idx, XmlNode::Element(child));
        idx
    }

    /// The child element with local name `local` in this element's
    /// namespace, created at its schema position when missing.
    pub fn child_or_insert(&mut self, local: &str, order: &[&str]) -> &mut XmlElement {
        let existing = self.children.iter().position(|node| {
            node.as_element()
                .is_some_and(|e| e.local_name() == local && e.namespace == self.namespace)
        });
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let child = self.sibling_kind(local);
                self.insert_ordered(child, order)
            }
        };
        match &mut self.children[idx] {
            XmlNode::Element(el) => el,
            // both branches above yield the index of an element node
            _ => unreachable!("child {} is not an element", idx),
        }
    }

    /// Remove every child element named `{namespace}local`; returns how
    /// many were removed.
    pub fn remove_children(&mut self, namespace: &str, local: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !node.as_element().is_some_and(|e| e.is(namespace, local)));
        before - self.children.len()
    }

    /// Concatenated character data of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

/// XML declaration fields.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDeclaration {
    pub version: String,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            standalone: Some("yes".to_string()),
        }
    }
}

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    declaration: XmlDeclaration,
    prolog: Vec<XmlNode>,
    root: XmlElement,
    epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// Wrap a root element in a new document.
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: XmlDeclaration::default(),
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Read and parse the XML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content, &path.display().to_string())
    }

    /// Parse XML text; `part_name` only labels errors.
    pub fn parse_str(xml: &str, part_name: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut open: Vec<XmlElement> = Vec::new();
        let mut scopes: Vec<Vec<(String, String)>> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::parse(
                    part_name,
                    format!("at byte {}: {}", reader.buffer_position(), e),
                )
            })?;

            let node = match event {
                Event::Start(ref e) => {
                    let el = open_element(e, &mut scopes).map_err(|m| Error::parse(part_name, m))?;
                    open.push(el);
                    continue;
                }
                Event::Empty(ref e) => {
                    let el = open_element(e, &mut scopes).map_err(|m| Error::parse(part_name, m))?;
                    scopes.pop();
                    XmlNode::Element(el)
                }
                Event::End(_) => {
                    scopes.pop();
                    match open.pop() {
                        Some(el) => XmlNode::Element(el),
                        None => return Err(Error::parse(part_name, "unexpected closing tag")),
                    }
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|err| Error::parse(part_name, err))?;
                    XmlNode::Text(text.into_owned())
                }
                Event::CData(e) => {
                    XmlNode::CData(String::from_utf8_lossy(&e.into_inner()).into_owned())
                }
                Event::Comment(ref e) => XmlNode::Comment(String::from_utf8_lossy(e).into_owned()),
                Event::PI(ref e) => {
                    XmlNode::ProcessingInstruction(String::from_utf8_lossy(e).into_owned())
                }
                Event::Decl(ref e) => {
                    declaration = Some(read_declaration(e));
                    continue;
                }
                Event::DocType(_) => {
                    log::debug!("Dropping DOCTYPE from {}", part_name);
                    continue;
                }
                Event::Eof => break,
            };

            if let Some(parent) = open.last_mut() {
                parent.children.push(node);
                continue;
            }

            match node {
                XmlNode::Element(el) => {
                    if root.is_some() {
                        return Err(Error::parse(part_name, "more than one root element"));
                    }
                    root = Some(el);
                }
                XmlNode::Text(ref t) if !t.trim().is_empty() => {
                    return Err(Error::parse(part_name, "text outside the root element"));
                }
                other => {
                    if root.is_some() {
                        epilog.push(other);
                    } else {
                        prolog.push(other);
                    }
                }
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(Error::parse(
                part_name,
                format!("unclosed element <{}>", unclosed.name),
            ));
        }
        let root = root.ok_or_else(|| Error::parse(part_name, "no root element"))?;

        Ok(Self {
            declaration: declaration.unwrap_or_default(),
            prolog,
            root,
            epilog,
        })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    /// All `<a:r>` text runs in document order.
    pub fn find_text_runs(&self) -> Vec<&XmlElement> {
        self.root.descendants(DRAWINGML_NS, "r")
    }

    /// Serialize with an XML declaration in UTF-8.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let xml_err = |e: quick_xml::Error| Error::XmlError(e.to_string());

        writer
            .write_event(Event::Decl(BytesDecl::new(
                &self.declaration.version,
                Some("UTF-8"),
                self.declaration.standalone.as_deref(),
            )))
            .map_err(xml_err)?;
        for node in &self.prolog {
            write_node(&mut writer, node).map_err(xml_err)?;
        }
        write_element(&mut writer, &self.root).map_err(xml_err)?;
        for node in &self.epilog {
            write_node(&mut writer, node).map_err(xml_err)?;
        }

        Ok(writer.into_inner())
    }

    /// Serialize to `path`, replacing its contents.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| Error::save(path, e))
    }
}

/// Strip the prefix from a qualified name.
pub fn local_name(name: &str) -> &str {
    name.split_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn open_element(
    start: &BytesStart,
    scopes: &mut Vec<Vec<(String, String)>>,
) -> std::result::Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    let mut declared = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute on <{}>: {}", name, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value on <{}>: {}", name, e))?
            .into_owned();

        if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
        attributes.push((key, value));
    }
    scopes.push(declared);

    let prefix = name.split_once(':').map(|(p, _)| p).unwrap_or("");
    let namespace = resolve_prefix(scopes, prefix);

    Ok(XmlElement {
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn resolve_prefix(scopes: &[Vec<(String, String)>], prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NS.to_string());
    }
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

fn read_declaration(decl: &BytesDecl) -> XmlDeclaration {
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_else(|_| "1.0".to_string());
    let standalone = decl
        .standalone()
        .and_then(|s| s.ok())
        .map(|s| String::from_utf8_lossy(&s).into_owned());
    XmlDeclaration {
        version,
        standalone,
    }
}

fn collect_descendants<'a>(
    el: &'a XmlElement,
    namespace: &str,
    local: &str,
    found: &mut Vec<&'a XmlElement>,
) {
    for child in el.elements() {
        if child.is(namespace, local) {
            found.push(child);
        } else {
            collect_descendants(child, namespace, local, found);
        }
    }
}

fn collect_text(el: &XmlElement, out: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(child) => collect_text(child, out),
            _ => {}
        }
    }
}

fn write_node<W: std::io::Write>(
    writer: &mut Writer<W>,
    node: &XmlNode,
) -> quick_xml::Result<()> {
    match node {
        XmlNode::Element(el) => write_element(writer, el),
        XmlNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::from_escaped(escape_text(text))))
        }
        XmlNode::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str()))),
        XmlNode::Comment(comment) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
        }
        XmlNode::ProcessingInstruction(pi) => {
            writer.write_event(Event::PI(BytesText::from_escaped(pi.as_str())))
        }
    }
}

/// Escape character data. A raw `\r` would be read back as `\n`.
fn escape_text(text: &str) -> String {
    escape(text).replace('\r', "&#13;")
}

/// Escape an attribute value. Readers normalize raw whitespace in
/// attributes to spaces, so tab, newline and carriage return are written
/// as character references.
fn escape_attr(value: &str) -> String {
    escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    el: &XmlElement,
) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: escape_attr(value).into_bytes().into(),
        });
    }

    if el.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))
}
