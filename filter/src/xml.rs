// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! A small owned element tree built from quick-xml events.
//!
//! Elements and attributes are matched by local name; namespace prefixes are
//! dropped.

use std::borrow::Cow;

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};

use crate::error::FilterError;

/// An element with its attributes, children and text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name.
    pub name: String,
    /// Attributes by local name, unescaped.
    pub attrs: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Concatenated text content.
    pub text: String,
}

impl Element {
    /// Value of the attribute with local name `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with local name `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Parses a document into its root element.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Xml`] if the document is not well-formed or has
    /// no root element.
    pub fn parse(xml: &str) -> Result<Self, FilterError> {
        // Text is trimmed per element once closed: trimming each text event
        // would eat the spaces around entity references.
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => stack.push(open(e)?),
                Event::Empty(ref e) => {
                    let element = open(e)?;
                    close(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(FilterError::Xml("unbalanced end tag".to_string()));
                    };
                    close(&mut stack, &mut root, element);
                }
                Event::Text(ref text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.decode().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::CData(ref data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(data));
                    }
                }
                Event::GeneralRef(ref r) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&resolve_ref(r)?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(FilterError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| FilterError::Xml("document has no root element".to_string()))
    }
}

fn open(e: &BytesStart<'_>) -> Result<Element, FilterError> {
    let name = utf8(e.name().local_name().into_inner())?.to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.local_name().into_inner())?.to_string();
        let raw = utf8(&attr.value)?;
        let value = unescape(raw).map_err(|e| FilterError::Xml(e.to_string()))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn close(stack: &mut [Element], root: &mut Option<Element>, mut element: Element) {
    let trimmed = element.text.trim();
    if trimmed.len() != element.text.len() {
        element.text = trimmed.to_string();
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn resolve_ref(r: &quick_xml::events::BytesRef<'_>) -> Result<Cow<'static, str>, FilterError> {
    if let Some(ch) = r
        .resolve_char_ref()
        .map_err(|e| FilterError::Xml(e.to_string()))?
    {
        return Ok(Cow::Owned(ch.to_string()));
    }
    let name = r.decode().map_err(|e| FilterError::Xml(e.to_string()))?;
    resolve_predefined_entity(&name)
        .map(Cow::Borrowed)
        .ok_or_else(|| FilterError::Xml(format!("unknown entity &{name};")))
}

fn utf8(bytes: &[u8]) -> Result<&str, FilterError> {
    std::str::from_utf8(bytes).map_err(|e| FilterError::Xml(format!("UTF-8 error: {e}")))
}
