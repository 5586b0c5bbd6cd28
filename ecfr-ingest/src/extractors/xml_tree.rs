//! Typed element tree for regulatory XML
//!
//! Documents are parsed with quick-xml into an owned tree that keeps, for each
//! element, its leading text and the trailing ("tail") text that follows its
//! end tag inside the parent. Hierarchy elements are classified by tag into
//! [`NodeKind`] so the extractors never probe for attributes that may or may
//! not exist.

use crate::error::{IngestError, IngestResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Header element of a hierarchy node
pub const HEADER_TAG: &str = "HEAD";
/// Paragraph element
pub const PARAGRAPH_TAG: &str = "P";
/// Citation trailer element
pub const CITATION_TAG: &str = "CITA";

/// Kind of node in the regulatory hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `DIV1`
    Title,
    /// `DIV3`
    Chapter,
    /// `DIV4`
    Subchapter,
    /// `DIV5`
    Part,
    /// `DIV6` (true subpart only when `TYPE="SUBPART"`)
    Subpart,
    /// `DIV8`
    Section,
    /// Everything else (text markup, subject groups, appendices, ...)
    Other,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "DIV1" => NodeKind::Title,
            "DIV3" => NodeKind::Chapter,
            "DIV4" => NodeKind::Subchapter,
            "DIV5" => NodeKind::Part,
            "DIV6" => NodeKind::Subpart,
            "DIV8" => NodeKind::Section,
            _ => NodeKind::Other,
        }
    }
}

/// One element of a parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    /// Text between the start tag and the first child
    pub text: String,
    /// Text between this element's end tag and the next sibling
    pub tail: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_tag(&self.name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Declared identifier (`N` attribute), trimmed, `None` when blank
    pub fn identifier(&self) -> Option<&str> {
        self.attribute("N").map(str::trim).filter(|s| !s.is_empty())
    }

    /// Declared node type (`TYPE` attribute)
    pub fn type_tag(&self) -> Option<&str> {
        self.attribute("TYPE")
    }

    /// A `DIV6` only groups sections as a subpart when typed `SUBPART`
    pub fn is_true_subpart(&self) -> bool {
        self.kind() == NodeKind::Subpart
            && self
                .type_tag()
                .map(|t| t.trim().eq_ignore_ascii_case("SUBPART"))
                .unwrap_or(false)
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First `HEAD` child
    pub fn header(&self) -> Option<&XmlElement> {
        self.find_child(HEADER_TAG)
    }

    /// All descendants in document order (excluding `self`)
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    pub fn descendants_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |d| d.name == name)
    }

    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().find(|d| d.name == name)
    }

    /// `self` if it has the kind, else the first descendant that does
    pub fn first_of_kind(&self, kind: NodeKind) -> Option<&XmlElement> {
        if self.kind() == kind {
            return Some(self);
        }
        self.descendants().find(|d| d.kind() == kind)
    }

    /// Fully flattened text content
    ///
    /// Leading text, then for each child its flattened text followed by the
    /// child's tail. Whitespace runs collapse to one space; result trimmed.
    pub fn flattened_text(&self) -> String {
        let mut pieces = Vec::new();
        self.collect_text(&mut pieces);
        join_normalized(pieces)
    }

    fn collect_text<'a>(&'a self, pieces: &mut Vec<&'a str>) {
        pieces.push(&self.text);
        for child in &self.children {
            child.collect_text(pieces);
            pieces.push(&child.tail);
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => self.text.push_str(text),
        }
    }
}

/// Pre-order iterator over an element's descendants
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Join text pieces with single spaces, collapsing all whitespace runs
pub fn join_normalized<'a, I>(pieces: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    pieces
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse whitespace runs and trim
pub fn normalize_whitespace(text: &str) -> String {
    join_normalized([text])
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a complete document into its root element
///
/// Fails with [`IngestError::MalformedDocument`] on syntax errors, mismatched
/// or unclosed tags, multiple roots, text outside the root, or an empty
/// document. No partial tree is ever returned.
pub fn parse_document(bytes: &[u8]) -> IngestResult<XmlElement> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            malformed(format!(
                "XML error at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without matching open tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| malformed(format!("bad text escape: {}", e)))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| malformed("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> IngestResult<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());

    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(format!("bad attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(format!("bad attribute value: {}", e)))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> IngestResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> IngestResult<()> {
    match stack.last_mut() {
        Some(current) => current.push_text(text),
        None if text.trim().is_empty() => {}
        None => return Err(malformed("text outside the root element")),
    }
    Ok(())
}

fn malformed(message: impl Into<String>) -> IngestError {
    IngestError::MalformedDocument(message.into())
}
