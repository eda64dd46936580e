//! Raw PubMed records.
//!
//! An efetch response is read into a small element tree, keeping every element,
//! attribute and text run in document order. Nothing is interpreted here; the
//! [`crate::flatten`] module decides which fields matter and which are required.

use crate::error::{PubmedError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One node of the element tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and content in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub content: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First child element called `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// All child elements called `name`, in document order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// All child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Follow a `/`-separated path of child names, taking the first match at each step
    pub fn path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |element, name| element.child(name))
    }

    /// Text of this element and all its descendants, concatenated, with any
    /// nested tags dropped
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.content {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Content of this element with nested tags written back out.
    ///
    /// Titles and abstracts carry inline markup (`<i>`, `<sup>`, `<sub>`) that is
    /// part of the text, so `H<sub>2</sub>O` stays `H<sub>2</sub>O`.
    /// Entities are left decoded.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        self.collect_markup(&mut out);
        out
    }

    fn collect_markup(&self, out: &mut String) {
        for node in &self.content {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => {
                    out.push('<');
                    out.push_str(&e.name);
                    for (key, value) in &e.attributes {
                        out.push_str(&format!(" {}=\"{}\"", key, value));
                    }
                    if e.content.is_empty() {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        e.collect_markup(out);
                        out.push_str(&format!("</{}>", e.name));
                    }
                }
            }
        }
    }
}

/// The full nested record for one article, as returned by efetch.
///
/// The wrapped element is the `PubmedArticle`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    root: Element,
}

impl RawRecord {
    /// Take the first `PubmedArticle` out of an efetch XML response
    pub fn from_efetch_xml(xml: &str) -> Result<Self> {
        let document = parse_document(xml)?;
        let root = document
            .child("PubmedArticleSet")
            .and_then(|set| set.child("PubmedArticle"))
            .cloned()
            .ok_or_else(|| {
                PubmedError::Parse("efetch response contains no PubmedArticle".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// PMID of the record, when present
    pub fn pmid(&self) -> Option<String> {
        self.root.path("MedlineCitation/PMID").map(Element::text)
    }
}

/// Parse an XML document into an element tree.
///
/// The returned element is a synthetic `#document` node whose children are the
/// document's top-level elements.
pub fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::new("#document")];

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let element = start_element(&e)?;
                push_node(&mut stack, Node::Element(element))?;
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(PubmedError::Parse("unexpected closing tag".to_string()));
                }
                if let Some(element) = stack.pop() {
                    push_node(&mut stack, Node::Element(element))?;
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                push_node(&mut stack, Node::Text(text.into_owned()))?;
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                push_node(&mut stack, Node::Text(text))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(PubmedError::Parse("unclosed element at end of document".to_string()));
    }
    stack
        .pop()
        .ok_or_else(|| PubmedError::Parse("empty document".to_string()))
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn push_node(stack: &mut [Element], node: Node) -> Result<()> {
    stack
        .last_mut()
        .map(|parent| parent.content.push(node))
        .ok_or_else(|| PubmedError::Parse("node outside of document".to_string()))
}
