//! Generic XML element tree built on quick-xml.
//!
//! Element and attribute names are stored by local name, so `tei:div` and
//! `div` look the same to the rest of the crate. Text is kept verbatim
//! (no trimming) and entity references are resolved.

use crate::error::{ConvertError, ConvertResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// Deepest element nesting accepted by [`parse_xml`] (libxml2's default).
/// Everything downstream walks the tree recursively.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Direct child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |child| child.name == name)
    }

    pub fn first_child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|child| child.name == name)
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// First descendant with the given name, in document order.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().into_iter().find(|el| el.name == name)
    }

    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|el| el.name == name)
            .collect()
    }

    /// First descendant with the given name whose attribute `key` equals `value`.
    pub fn find_with_attr(&self, name: &str, key: &str, value: &str) -> Option<&XmlElement> {
        self.descendants()
            .into_iter()
            .find(|el| el.name == name && el.attr(key) == Some(value))
    }

    /// Concatenation of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn stripped_text(&self) -> String {
        self.text().trim().to_string()
    }
}

fn collect_descendants<'a>(element: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in element.child_elements() {
        out.push(child);
        collect_descendants(child, out);
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(text) => out.push_str(text),
            XmlNode::Element(inner) => collect_text(inner, out),
        }
    }
}

/// Parse a complete XML document into its root element.
///
/// Content outside the root (prolog, comments, processing instructions) is
/// ignored. Mismatched end tags, unclosed elements and more than one root are
/// errors, and so is nesting deeper than [`MAX_DEPTH`].
pub fn parse_xml(xml: &str) -> ConvertResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                check_depth(stack.len())?;
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                check_depth(stack.len())?;
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape()?;
                    push_text(parent, &text);
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let bytes = cdata.into_inner();
                    push_text(parent, &String::from_utf8_lossy(&bytes));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConvertError::Malformed(format!(
            "element <{}> is never closed",
            open.name
        )));
    }
    root.ok_or(ConvertError::EmptyDocument)
}

fn check_depth(open_elements: usize) -> ConvertResult<()> {
    if open_elements >= MAX_DEPTH {
        return Err(ConvertError::Malformed(format!(
            "nesting deeper than {} elements",
            MAX_DEPTH
        )));
    }
    Ok(())
}

fn element_from_start(start: &BytesStart<'_>) -> ConvertResult<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> ConvertResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ConvertError::Malformed(format!(
                "second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

fn push_text(parent: &mut XmlElement, text: &str) {
    if text.is_empty() {
        return;
    }
    // Line ends are normalized to \n as an XML processor must.
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    // Adjacent text and CDATA runs are merged into one node.
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(&text);
    } else {
        parent.children.push(XmlNode::Text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_structure_and_whitespace() {
        let root = parse_xml(r#"<?xml version="1.0"?><a x="1"><b> hi </b>tail<c/></a>"#).unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.child_elements().count(), 2);
        assert_eq!(root.text(), " hi tail");
        assert_eq!(root.first_child("b").unwrap().stripped_text(), "hi");
        assert!(root.first_child("c").unwrap().children.is_empty());
    }

    #[test]
    fn test_namespaces_are_reduced_to_local_names() {
        let xml = r#"<tei:TEI xmlns:tei="http://www.tei-c.org/ns/1.0" xmlns:xml="http://www.w3.org/XML/1998/namespace">
            <tei:div xml:id="d1" type="analytic"/></tei:TEI>"#;
        let root = parse_xml(xml).unwrap();
        assert_eq!(root.name, "TEI");
        let div = root.find("div").unwrap();
        assert_eq!(div.attr("id"), Some("d1"));
        assert_eq!(div.attr("type"), Some("analytic"));
    }

    #[test]
    fn test_entities_and_cdata_become_text() {
        let root = parse_xml("<p>A &amp; B <![CDATA[<raw>]]></p>").unwrap();
        assert_eq!(root.text(), "A & B <raw>");
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_find_is_document_order_depth_first() {
        let root = parse_xml("<r><x><t>first</t></x><t>second</t></r>").unwrap();
        assert_eq!(root.find("t").unwrap().text(), "first");
        let all: Vec<String> = root.find_all("t").iter().map(|t| t.text()).collect();
        assert_eq!(all, vec!["first", "second"]);
    }

    #[test]
    fn test_find_with_attr() {
        let root = parse_xml(r#"<r><idno type="MD5">x</idno><idno type="DOI">10.1/y</idno></r>"#)
            .unwrap();
        assert_eq!(root.find_with_attr("idno", "type", "DOI").unwrap().text(), "10.1/y");
        assert!(root.find_with_attr("idno", "type", "doi").is_none());
    }

    #[test]
    fn test_line_ends_are_normalized() {
        let root = parse_xml("<p>one\r\ntwo\rthree\nfour</p>").unwrap();
        assert_eq!(root.text(), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn test_first_child_skips_text_and_other_names() {
        let root = parse_xml("<div>lead<p>x</p><head>H</head><head>G</head></div>").unwrap();
        let name = String::from("head");
        assert_eq!(root.first_child(&name).unwrap().text(), "H");
        assert!(root.first_child("figure").is_none());
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
        assert!(parse_xml(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(
            parse_xml(&nested(MAX_DEPTH + 1)),
            Err(ConvertError::Malformed(_))
        ));

        let empty_leaf = format!("{}<br/>{}", "<div>".repeat(MAX_DEPTH), "</div>".repeat(MAX_DEPTH));
        assert!(parse_xml(&empty_leaf).is_err());

        let huge = nested(200_000);
        assert!(matches!(parse_xml(&huge), Err(ConvertError::Malformed(_))));
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        assert!(matches!(parse_xml(""), Err(ConvertError::EmptyDocument)));
        assert!(matches!(parse_xml("   "), Err(ConvertError::EmptyDocument)));
        assert!(parse_xml("<a><b></a>").is_err());
        assert!(parse_xml("<a><b>").is_err());
        assert!(matches!(parse_xml("<a/><b/>"), Err(ConvertError::Malformed(_))));
    }
}
