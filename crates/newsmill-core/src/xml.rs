//! Minimal owned XML tree built from `quick-xml` events.
//!
//! Feed extraction selects nodes by qualified tag name (`content:encoded`,
//! `media:thumbnail`) and attribute, so the tree keeps names exactly as they
//! appear in the document. Namespace URIs are not resolved.

use crate::error::{AppError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .with_checks(false)
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();
        Self {
            name,
            attributes,
            ..Default::default()
        }
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Direct text and CDATA content, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Attribute value, if present and non-blank.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child called `name` that has any. The result borrows
    /// from `self` only.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .filter(|c| c.name == name)
            .map(XmlElement::text)
            .find(|t| !t.is_empty())
    }

    /// All descendants called `name`, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// True when this element or any descendant has the given local name.
    pub fn contains_local(&self, local: &str) -> bool {
        self.local_name() == local || self.children.iter().any(|c| c.contains_local(local))
    }
}

/// Parse a whole document and return its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(XmlElement::from_start(&e)),
            Ok(Event::Empty(e)) => attach(&mut stack, &mut root, XmlElement::from_start(&e)),
            Ok(Event::End(_)) => {
                let Some(element) = stack.pop() else {
                    return Err(AppError::MalformedXml("unexpected closing tag".into()));
                };
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::MalformedXml(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(AppError::MalformedXml(format!(
            "unclosed element <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| AppError::MalformedXml("document has no root element".into()))
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tree_with_attributes_and_text() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Feed &amp; Co</title>
    <item>
      <media:thumbnail url="https://img.example.com/a.jpg"/>
      <description><![CDATA[<p>Hello</p>]]></description>
    </item>
  </channel>
</rss>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "rss");
        assert_eq!(doc.attr("version"), Some("2.0"));
        let channel = doc.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Feed & Co"));

        let item = channel.child("item").unwrap();
        let thumb = item.child("media:thumbnail").unwrap();
        assert_eq!(thumb.local_name(), "thumbnail");
        assert_eq!(thumb.attr("url"), Some("https://img.example.com/a.jpg"));
        assert_eq!(item.child_text("description"), Some("<p>Hello</p>"));
    }

    #[test]
    fn child_text_outlives_owned_name() {
        let doc = parse_document("<item><title></title><title>Second</title></item>").unwrap();
        let text = {
            let name = String::from("title");
            doc.child_text(&name)
        };
        assert_eq!(text, Some("Second"));
    }

    #[test]
    fn descendants_in_document_order() {
        let doc = parse_document("<a><b id=\"1\"/><c><b id=\"2\"/></c><b id=\"3\"/></a>").unwrap();
        let ids: Vec<_> = doc
            .descendants_named("b")
            .iter()
            .filter_map(|b| b.attr("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn blank_attribute_is_none() {
        let doc = parse_document(r#"<a href="  "/>"#).unwrap();
        assert_eq!(doc.attr("href"), None);
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let err = parse_document("<rss><channel></rss>").unwrap_err();
        assert!(matches!(err, AppError::MalformedXml(_)));
    }

    #[test]
    fn unclosed_document_is_malformed() {
        let err = parse_document("<rss><channel><item><title>Unclosed").unwrap_err();
        assert!(matches!(err, AppError::MalformedXml(_)));
    }

    #[test]
    fn empty_document_is_malformed() {
        assert!(matches!(parse_document("   "), Err(AppError::MalformedXml(_))));
    }

    #[test]
    fn contains_local_finds_nested_marker() {
        let doc = parse_document("<html><body><parsererror>bad</parsererror></body></html>").unwrap();
        assert!(doc.contains_local("parsererror"));
        assert!(!doc.contains_local("item"));
    }
}
