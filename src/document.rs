//! Owned element tree for finding aid markup.
//!
//! Documents are parsed once with roxmltree and copied into an owned tree so
//! rules can hold on to nodes without borrowing the input buffer. Namespaces
//! are dropped: EAD files come with and without the EAD namespace, and with
//! `xlink:` attributes that rules address by their local name.

use roxmltree::{Document, ParsingOptions};

use crate::error::Result;

/// Tag of the synthetic element wrapping a parsed fragment
pub const FRAGMENT_TAG: &str = "fragment";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// An element with its attributes (local names, unique, in document order) and mixed content
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

/// Parse a complete document into its root element
pub fn parse(markup: &str) -> Result<Element> {
    let doc = Document::parse_with_options(
        markup,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )?;
    Ok(Element::from_roxml(doc.root_element()))
}

/// Parse a markup fragment (any mix of text and elements, e.g. the output of
/// [`Element::inner_markup()`]). The result is a distinct tree rooted at a
/// synthetic [`FRAGMENT_TAG`] element.
pub fn parse_fragment(markup: &str) -> Result<Element> {
    parse(&format!("<{}>{}</{}>", FRAGMENT_TAG, markup, FRAGMENT_TAG))
}

impl Element {
    pub fn new(
        tag: impl Into<String>,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            children,
        }
    }

    fn from_roxml(node: roxmltree::Node) -> Self {
        let mut attributes: Vec<(String, String)> = Vec::new();
        for attribute in node.attributes() {
            if !attributes.iter().any(|(key, _)| key == attribute.name()) {
                attributes.push((attribute.name().to_string(), attribute.value().to_string()));
            }
        }
        let mut children: Vec<Node> = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Node::Element(Self::from_roxml(child)));
            } else if let Some(text) = child.text().filter(|_| child.is_text()) {
                // roxmltree may split text around CDATA sections, we keep runs whole
                if let Some(Node::Text(previous)) = children.last_mut() {
                    previous.push_str(text);
                } else {
                    children.push(Node::Text(text.to_string()));
                }
            }
        }
        Self {
            tag: node.tag_name().name().to_string(),
            attributes,
            children,
        }
    }

    pub fn tag(&self) -> &str {
        self.tag.as_str()
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

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements only, in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given tag
    pub fn element(&self, tag: &str) -> Option<&Element> {
        self.elements().find(|element| element.tag == tag)
    }

    pub fn into_parts(self) -> (String, Vec<(String, String)>, Vec<Node>) {
        (self.tag, self.attributes, self.children)
    }

    /// Serialized child content
    pub fn inner_markup(&self) -> String {
        self.inner_markup_without(&[])
    }

    /// Serialized child content, leaving out direct child elements with any of the given tags
    pub fn inner_markup_without(&self, excluded: &[&str]) -> String {
        let mut out = String::new();
        for child in self.children.iter() {
            match child {
                Node::Element(element) if excluded.contains(&element.tag()) => continue,
                Node::Element(element) => element.write_markup(&mut out),
                Node::Text(text) => out += &html_escape::encode_text(text),
            }
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in self.attributes.iter() {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for child in self.children.iter() {
                match child {
                    Node::Element(element) => element.write_markup(out),
                    Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
                }
            }
            out.push_str("</");
            out.push_str(&self.tag);
            out.push('>');
        }
    }

    /// Recursive text without any elements
    pub fn inner_text(&self) -> String {
        let mut s = String::new();
        for child in self.children.iter() {
            match child {
                Node::Text(text) => s += text,
                Node::Element(element) => s += &element.inner_text(),
            }
        }
        s
    }

    /// Text of the direct text children only
    pub fn own_text(&self) -> String {
        self.children.iter().filter_map(Node::as_text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EADSMALLEXAMPLE: &'static str = r#"<!DOCTYPE ead>
<ead xmlns="urn:isbn:1-931666-22-9" xmlns:xlink="http://www.w3.org/1999/xlink">
<archdesc level="collection"><did><unittitle>Papers &amp; letters, <unitdate normal="1920/1925">1920-1925</unitdate></unittitle>
<dao xlink:href="http://example.org/1" xlink:title="Scan"/></did></archdesc></ead>"#;

    #[test]
    fn test_parse_local_names() -> std::result::Result<(), String> {
        let root = parse(EADSMALLEXAMPLE).map_err(|e| e.to_string())?;
        assert_eq!(root.tag(), "ead");
        let did = root
            .element("archdesc")
            .and_then(|archdesc| archdesc.element("did"))
            .ok_or("did not found")?;
        let dao = did.element("dao").ok_or("dao not found")?;
        assert_eq!(dao.attribute("href"), Some("http://example.org/1"));
        assert_eq!(dao.attribute("title"), Some("Scan"));
        Ok(())
    }

    #[test]
    fn test_inner_text() -> std::result::Result<(), String> {
        let root = parse(EADSMALLEXAMPLE).map_err(|e| e.to_string())?;
        let unittitle = root
            .element("archdesc")
            .and_then(|a| a.element("did"))
            .and_then(|d| d.element("unittitle"))
            .ok_or("unittitle not found")?;
        assert_eq!(unittitle.inner_text(), "Papers & letters, 1920-1925");
        assert_eq!(unittitle.own_text(), "Papers & letters, ");
        Ok(())
    }

    #[test]
    fn test_inner_markup_escapes_and_reparses() -> std::result::Result<(), String> {
        let root = parse(EADSMALLEXAMPLE).map_err(|e| e.to_string())?;
        let did = root
            .element("archdesc")
            .and_then(|a| a.element("did"))
            .ok_or("did not found")?;
        let markup = did.inner_markup();
        assert!(markup.starts_with(
            "<unittitle>Papers &amp; letters, <unitdate normal=\"1920/1925\">1920-1925</unitdate></unittitle>"
        ));
        assert!(markup.contains("<dao href=\"http://example.org/1\" title=\"Scan\"/>"));
        let fragment = parse_fragment(&markup).map_err(|e| e.to_string())?;
        assert_eq!(fragment.tag(), FRAGMENT_TAG);
        assert_eq!(fragment.children(), did.children());
        Ok(())
    }

    #[test]
    fn test_inner_markup_without() -> std::result::Result<(), String> {
        let note = parse("<scopecontent><head>Scope</head><p>One</p><p>Two</p></scopecontent>")
            .map_err(|e| e.to_string())?;
        assert_eq!(note.inner_markup_without(&["head"]), "<p>One</p><p>Two</p>");
        Ok(())
    }

    #[test]
    fn test_fragment_with_text_runs() -> std::result::Result<(), String> {
        let fragment = parse_fragment("Smith, John <term type=\"topical\">Diaries</term>")
            .map_err(|e| e.to_string())?;
        assert_eq!(fragment.children().len(), 2);
        assert_eq!(fragment.own_text(), "Smith, John ");
        assert_eq!(
            fragment.element("term").map(|t| t.inner_text()),
            Some("Diaries".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_malformed() {
        assert!(parse("<ead><archdesc></ead>").is_err());
        assert!(parse("").is_err());
    }
}
