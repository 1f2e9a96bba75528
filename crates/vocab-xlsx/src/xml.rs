//! Owned XML tree for editing package parts.
//!
//! Names are kept exactly as written (`sheet`, `x:sheet`, `r:id`) and
//! `xmlns` declarations stay in the attribute list, so a parsed part
//! serializes back with the prefixes its producer chose. Lookups that care
//! about namespaces go through [`NamespaceScope`], which resolves prefixes to
//! URIs the way a namespace-aware reader would.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::XlsxError;

/// URI permanently bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data. Whitespace-only runs are kept.
    Text(String),
    CData(String),
    /// Comment body as it appeared in the source.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, including any prefix.
    pub name: String,
    /// Attributes in document order; values are unescaped.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Append a text node. Empty text is skipped so the element can still be
    /// written in its short `<t/>` form.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Look up an attribute by its qualified name as written.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Direct children named `{ns}local`, resolved against `scope` (the scope
    /// in effect at `self`).
    pub fn children_in<'a>(
        &'a self,
        scope: &'a NamespaceScope,
        ns: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child_elements()
            .filter(move |child| scope.matches(child, ns, local))
    }

    pub fn first_child_in_mut(
        &mut self,
        scope: &NamespaceScope,
        ns: &str,
        local: &str,
    ) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(el) if scope.matches(el, ns, local) => Some(el),
            _ => None,
        })
    }

    /// Concatenated text and CDATA of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }

    /// Namespace declarations made on this element, as `(prefix, uri)`.
    /// `None` is the default namespace.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.attrs.iter().filter_map(|(key, value)| {
            if key == "xmlns" {
                Some((None, value.as_str()))
            } else {
                key.strip_prefix("xmlns:")
                    .map(|prefix| (Some(prefix), value.as_str()))
            }
        })
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// In-scope prefix bindings at some element.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    bindings: Vec<(Option<String>, String)>,
}

impl NamespaceScope {
    /// Scope in effect at a document's root element.
    pub fn root(root: &XmlElement) -> Self {
        Self::default().enter(root)
    }

    /// Scope in effect at `el`, given that `self` is the scope of its parent.
    pub fn enter(&self, el: &XmlElement) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.extend(
            el.namespace_declarations()
                .map(|(prefix, uri)| (prefix.map(str::to_string), uri.to_string())),
        );
        Self { bindings }
    }

    /// URI bound to `prefix`. `xmlns=""` undeclares the default namespace.
    pub fn uri(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// A non-default prefix currently bound to `uri`, if any.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter_map(|(p, u)| p.as_deref().filter(|_| u == uri))
            // A later declaration may have rebound the same prefix.
            .find(|prefix| self.uri(Some(*prefix)) == Some(uri))
    }

    /// Whether `el` (a child of the element this scope belongs to) is `{ns}local`.
    pub fn matches(&self, el: &XmlElement, ns: &str, local: &str) -> bool {
        if el.local_name() != local {
            return false;
        }
        let scope = self.enter(el);
        scope.uri(el.prefix()) == Some(ns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse a part into a tree. `part_name` is only used in error messages.
    ///
    /// The XML declaration, processing instructions and anything outside the
    /// root element are dropped; [`XmlDocument::to_bytes`] writes a fresh
    /// declaration.
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let el = element_from_start(&start)?;
                    attach(part_name, &mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack.pop().ok_or_else(|| {
                        XlsxError::Invalid(format!("{part_name}: unexpected closing tag"))
                    })?;
                    attach(part_name, &mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::Text(text.unescape()?.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8(data.into_inner().into_owned())?;
                        parent.children.push(XmlNode::CData(data));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let comment = String::from_utf8(comment.into_inner().into_owned())?;
                        parent.children.push(XmlNode::Comment(comment));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XlsxError::Invalid(format!(
                "{part_name}: unclosed <{}> element",
                open.name
            )));
        }
        let root =
            root.ok_or_else(|| XlsxError::Invalid(format!("{part_name}: no root element")))?;
        Ok(Self { root })
    }

    pub fn scope(&self) -> NamespaceScope {
        NamespaceScope::root(&self.root)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.get_mut().push(b'\n');
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XlsxError> {
    let name = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut el = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value()?.into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

fn attach(
    part_name: &str,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> Result<(), XlsxError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
        return Ok(());
    }
    if root.is_some() {
        return Err(XlsxError::Invalid(format!(
            "{part_name}: more than one root element"
        )));
    }
    *root = Some(el);
    Ok(())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    el: &XmlElement,
) -> Result<(), XlsxError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(data) => {
                writer.write_event(Event::CData(BytesCData::new(data.as_str())))?
            }
            XmlNode::Comment(comment) => writer.write_event(Event::Comment(
                BytesText::from_escaped(comment.as_str()),
            ))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    #[test]
    fn parse_keeps_prefixes_and_declarations() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><x:sheets><x:sheet name="Verbs" sheetId="1" r:id="rId1"/></x:sheets></x:workbook>"#;

        let doc = XmlDocument::parse("xl/workbook.xml", xml).expect("parse");
        assert_eq!(doc.root.name, "x:workbook");

        let scope = doc.scope();
        let sheets: Vec<_> = doc.root.children_in(&scope, MAIN_NS, "sheets").collect();
        assert_eq!(sheets.len(), 1);
        let sheet_scope = scope.enter(sheets[0]);
        let sheet = sheets[0]
            .children_in(&sheet_scope, MAIN_NS, "sheet")
            .next()
            .expect("sheet");
        assert_eq!(sheet.attr("r:id"), Some("rId1"));
        assert_eq!(scope.prefix_for(REL_NS), Some("r"));
    }

    #[test]
    fn serialize_round_trips_through_parse() {
        let xml = br#"<root xmlns="urn:a" xmlns:b="urn:b"><b:item key="a &amp; b">  spaced &lt;text&gt;  </b:item><!-- note --><![CDATA[raw <data>]]></root>"#;
        let doc = XmlDocument::parse("part.xml", xml).expect("parse");
        let bytes = doc.to_bytes().expect("serialize");
        let reparsed = XmlDocument::parse("part.xml", &bytes).expect("reparse");
        assert_eq!(reparsed, doc);

        let item = doc.root.child_elements().next().expect("item");
        assert_eq!(item.attr("key"), Some("a & b"));
        assert_eq!(item.text(), "  spaced <text>  ");
    }

    #[test]
    fn serialize_escapes_text_and_attributes() {
        let doc = XmlDocument::new(
            XmlElement::new("t")
                .with_attr("name", "\"quoted\" <tag>")
                .with_text("fish & chips < 5"),
        );
        let text = String::from_utf8(doc.to_bytes().expect("serialize")).expect("utf-8");
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(!text.contains("fish & chips"), "{text}");

        let parsed = roxmltree::Document::parse(&text).expect("well-formed");
        assert_eq!(parsed.root_element().attribute("name"), Some("\"quoted\" <tag>"));
        assert_eq!(parsed.root_element().text(), Some("fish & chips < 5"));
    }

    #[test]
    fn default_namespace_matches_unprefixed_children() {
        let xml = br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/xl/workbook.xml"/><Other xmlns="urn:other"><Override/></Other></Types>"#;
        let doc = XmlDocument::parse("[Content_Types].xml", xml).expect("parse");
        let scope = doc.scope();
        let ct_ns = "http://schemas.openxmlformats.org/package/2006/content-types";

        assert_eq!(doc.root.children_in(&scope, ct_ns, "Override").count(), 1);
        let other = doc.root.child_elements().nth(1).expect("Other");
        assert!(!scope.matches(other, ct_ns, "Other"));
        let other_scope = scope.enter(other);
        assert_eq!(other.children_in(&other_scope, ct_ns, "Override").count(), 0);
    }

    #[test]
    fn xml_prefix_is_always_bound() {
        let scope = NamespaceScope::default();
        assert_eq!(scope.uri(Some("xml")), Some(XML_NS));
        assert_eq!(scope.uri(None), None);
    }

    #[test]
    fn rebound_prefix_is_not_reported_for_old_uri() {
        let outer = XmlElement::new("a").with_attr("xmlns:r", REL_NS);
        let inner = XmlElement::new("b").with_attr("xmlns:r", "urn:other");
        let scope = NamespaceScope::root(&outer).enter(&inner);
        assert_eq!(scope.prefix_for(REL_NS), None);
        assert_eq!(scope.prefix_for("urn:other"), Some("r"));
    }

    #[test]
    fn parse_rejects_multiple_roots_and_unclosed_elements() {
        assert!(matches!(
            XmlDocument::parse("bad.xml", b"<a/><b/>"),
            Err(XlsxError::Invalid(_))
        ));
        assert!(XmlDocument::parse("bad.xml", b"<a><b></b>").is_err());
        assert!(matches!(
            XmlDocument::parse("empty.xml", b""),
            Err(XlsxError::Invalid(_))
        ));
    }
}
