//! Minimal namespace-aware XML tree with exclusive canonicalization.
//!
//! The envelope format never carries processing instructions, comments, or
//! DTDs, so the tree models elements, attributes, and text only. One
//! serializer is used both for document output and for digest/signature
//! input: the canonical form follows Exclusive XML Canonicalization
//! (namespace declarations rendered where visibly utilized and not already
//! in the output ancestry, attributes sorted, character references for
//! control characters, never a self-closing tag). Because the document
//! serializer and the canonicalizer are the same code path,
//! serialize → parse → canonicalize is byte-stable, which is what the
//! signature engine relies on.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::EnvelopeError;

/// The XML digital signature namespace.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// An attribute with its resolved namespace, if any.
///
/// Unprefixed attributes are never in a namespace, per the XML namespaces
/// recommendation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// An element node: resolved namespace, prefix as written, local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Create an empty element in the given namespace.
    pub fn new(name: &str, namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            prefix: None,
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append an unqualified attribute (builder style).
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            prefix: None,
            namespace: None,
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Append a child element (builder style).
    pub fn child(mut self, element: Element) -> Self {
        self.children.push(Node::Element(element));
        self
    }

    /// Append a text node (builder style). The value is stored raw and
    /// escaped at serialization time.
    pub fn text(mut self, value: &str) -> Self {
        self.children.push(Node::Text(value.to_string()));
        self
    }

    /// Concatenated direct text content of this element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// First direct child element with the given local name, any namespace.
    pub fn child_element(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Depth-first search for a descendant with an exact namespace + local
    /// name match (`None` matches elements that are in no namespace).
    pub fn find_descendant(&self, namespace: Option<&str>, name: &str) -> Option<&Element> {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.name == name && el.namespace.as_deref() == namespace {
                    return Some(el);
                }
                if let Some(found) = el.find_descendant(namespace, name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Depth-first search by local name alone.
    pub fn find_descendant_local(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.name == name {
                    return Some(el);
                }
                if let Some(found) = el.find_descendant_local(name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Remove and return the first descendant matching namespace + local
    /// name, searching depth-first.
    pub fn remove_descendant(&mut self, namespace: Option<&str>, name: &str) -> Option<Element> {
        let mut index = None;
        for (i, child) in self.children.iter().enumerate() {
            if let Node::Element(el) = child {
                if el.name == name && el.namespace.as_deref() == namespace {
                    index = Some(i);
                    break;
                }
            }
        }
        if let Some(i) = index {
            if let Node::Element(el) = self.children.remove(i) {
                return Some(el);
            }
        }
        for child in &mut self.children {
            if let Node::Element(el) = child {
                if let Some(removed) = el.remove_descendant(namespace, name) {
                    return Some(removed);
                }
            }
        }
        None
    }
}

fn malformed(err: impl std::fmt::Display) -> EnvelopeError {
    EnvelopeError::MalformedEnvelope(err.to_string())
}

/// Parse a document into an element tree.
///
/// Comments, processing instructions, and the XML declaration are dropped;
/// all text (including inter-element whitespace) is preserved, since it
/// participates in canonicalization.
pub fn parse(input: impl BufRead) -> Result<Element, EnvelopeError> {
    let mut reader = NsReader::from_reader(input);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(malformed)?;
        match event {
            Event::Start(ref start) => {
                let element = element_from_start(&reader, start)?;
                stack.push(element);
            }
            Event::Empty(ref start) => {
                let element = element_from_start(&reader, start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => return Ok(element),
                }
            }
            Event::Text(ref text) => {
                let value = text.unescape().map_err(malformed)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(value.into_owned()));
                }
            }
            Event::CData(ref cdata) => {
                let value = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(value));
                }
            }
            Event::Eof => {
                return Err(malformed("document has no root element"));
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
}

/// Parse a document held in memory.
pub fn parse_bytes(bytes: &[u8]) -> Result<Element, EnvelopeError> {
    parse(bytes)
}

fn element_from_start<R: BufRead>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
) -> Result<Element, EnvelopeError> {
    let qname = start.name();
    let (resolved, local) = reader.resolve_element(qname);
    let namespace = bound_namespace(&resolved);
    let prefix = qname
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let name = String::from_utf8_lossy(local.as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = attribute.key;
        // Namespace declarations are not attributes in the tree; they are
        // reconstructed from resolved namespaces at serialization time.
        if key.as_ref() == b"xmlns" || key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let (attr_resolved, attr_local) = reader.resolve_attribute(key);
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        attributes.push(Attribute {
            prefix: key
                .prefix()
                .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
            namespace: bound_namespace(&attr_resolved),
            name: String::from_utf8_lossy(attr_local.as_ref()).into_owned(),
            value,
        });
    }

    Ok(Element {
        namespace,
        prefix,
        name,
        attributes,
        children: Vec::new(),
    })
}

fn bound_namespace(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

/// Serialize an element subtree to its exclusive canonical form.
pub fn canonical_bytes(element: &Element) -> Vec<u8> {
    let mut out = Vec::new();
    write_element(&mut out, element, &[]);
    out
}

/// Serialize a full document: XML declaration plus the canonical form of
/// the root element.
pub fn to_document_bytes(root: &Element) -> Vec<u8> {
    let mut out = Vec::from(&b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"[..]);
    write_element(&mut out, root, &[]);
    out
}

/// Recursively write one element.
///
/// `rendered` holds the (prefix, uri) declarations already emitted by
/// ancestors in the canonical output; the empty prefix stands for the
/// default namespace.
fn write_element(out: &mut Vec<u8>, element: &Element, rendered: &[(String, String)]) {
    let mut declarations: Vec<(String, String)> = Vec::new();

    let own_prefix = element.prefix.clone().unwrap_or_default();
    let own_uri = element.namespace.clone().unwrap_or_default();
    consider_declaration(&mut declarations, rendered, own_prefix, own_uri);
    for attribute in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attribute.prefix, &attribute.namespace) {
            consider_declaration(&mut declarations, rendered, prefix.clone(), uri.clone());
        }
    }
    declarations.sort();

    let qname = match &element.prefix {
        Some(prefix) => format!("{prefix}:{}", element.name),
        None => element.name.clone(),
    };

    out.push(b'<');
    out.extend_from_slice(qname.as_bytes());
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        escape_attribute(out, uri);
        out.push(b'"');
    }

    let mut attributes: Vec<&Attribute> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_key = (a.namespace.as_deref().unwrap_or(""), a.name.as_str());
        let b_key = (b.namespace.as_deref().unwrap_or(""), b.name.as_str());
        a_key.cmp(&b_key)
    });
    for attribute in attributes {
        out.push(b' ');
        if let Some(prefix) = &attribute.prefix {
            out.extend_from_slice(prefix.as_bytes());
            out.push(b':');
        }
        out.extend_from_slice(attribute.name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape_attribute(out, &attribute.value);
        out.push(b'"');
    }
    out.push(b'>');

    let mut scope = rendered.to_vec();
    scope.extend(declarations);
    for child in &element.children {
        match child {
            Node::Element(el) => write_element(out, el, &scope),
            Node::Text(text) => escape_text(out, text),
        }
    }

    out.extend_from_slice(b"</");
    out.extend_from_slice(qname.as_bytes());
    out.push(b'>');
}

fn consider_declaration(
    declarations: &mut Vec<(String, String)>,
    rendered: &[(String, String)],
    prefix: String,
    uri: String,
) {
    // A prefixed name cannot be unbound; only the default namespace may be
    // re-declared as empty.
    if uri.is_empty() && !prefix.is_empty() {
        return;
    }
    let in_scope = rendered
        .iter()
        .rev()
        .find(|(p, _)| *p == prefix)
        .map(|(_, u)| u.as_str())
        .unwrap_or("");
    if in_scope != uri && !declarations.iter().any(|(p, _)| *p == prefix) {
        declarations.push((prefix, uri));
    }
}

fn escape_text(out: &mut Vec<u8>, value: &str) {
    for b in value.bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'\r' => out.extend_from_slice(b"&#xD;"),
            other => out.push(other),
        }
    }
}

fn escape_attribute(out: &mut Vec<u8>, value: &str) {
    for b in value.bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            b'\t' => out.extend_from_slice(b"&#x9;"),
            b'\n' => out.extend_from_slice(b"&#xA;"),
            b'\r' => out.extend_from_slice(b"&#xD;"),
            other => out.push(other),
        }
    }
}
