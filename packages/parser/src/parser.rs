//! SCL text → [`Document`] using quick-xml's pull reader.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::ast::{Attribute, Document, NodeId, NodeKind};
use crate::error::{ParseError, ParseResult};

/// Parse an XML document.
///
/// Whitespace-only text is dropped, comments inside the root element are
/// kept, processing instructions and doctype declarations are skipped.
pub fn parse(source: &str) -> ParseResult<Document> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);

    let mut doc = Document::new();
    let mut open: Vec<(NodeId, String)> = Vec::new();

    loop {
        let pos = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|err| ParseError::malformed(pos, err))?;

        match event {
            Event::Decl(decl) => {
                let version = decl
                    .version()
                    .map_err(|err| ParseError::malformed(pos, err))?;
                let mut content = format!("version=\"{}\"", String::from_utf8_lossy(&version));
                if let Some(encoding) = decl.encoding() {
                    let encoding = encoding.map_err(|err| ParseError::malformed(pos, err))?;
                    content.push_str(&format!(
                        " encoding=\"{}\"",
                        String::from_utf8_lossy(&encoding)
                    ));
                }
                doc.declaration = Some(content);
            }
            Event::Start(start) => {
                let (id, tag) = open_element(&mut doc, &open, &start, pos)?;
                open.push((id, tag));
            }
            Event::Empty(start) => {
                open_element(&mut doc, &open, &start, pos)?;
            }
            Event::End(end) => {
                let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                match open.pop() {
                    Some((_, expected)) if expected == found => {}
                    Some((_, expected)) => {
                        return Err(ParseError::mismatched_tag(pos, expected, found))
                    }
                    None => {
                        return Err(ParseError::malformed(
                            pos,
                            format!("closing tag </{found}> without an open element"),
                        ))
                    }
                }
            }
            Event::Text(text) => {
                if let Some((parent, _)) = open.last() {
                    let text = text
                        .unescape()
                        .map_err(|err| ParseError::malformed(pos, err))?;
                    push_text(&mut doc, *parent, text);
                }
            }
            Event::CData(data) => {
                if let Some((parent, _)) = open.last() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    push_text(&mut doc, *parent, Cow::Owned(text));
                }
            }
            Event::Comment(comment) => {
                if let Some((parent, _)) = open.last() {
                    let text = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                    doc.push_node(NodeKind::Comment { text }, Some(*parent));
                }
            }
            Event::Eof => break,
            Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some((_, tag)) = open.pop() {
        return Err(ParseError::unexpected_eof(source.len(), tag));
    }
    if doc.root().is_none() {
        return Err(ParseError::NoRootElement);
    }
    Ok(doc)
}

fn open_element(
    doc: &mut Document,
    open: &[(NodeId, String)],
    start: &BytesStart<'_>,
    pos: usize,
) -> ParseResult<(NodeId, String)> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(pos, err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::malformed(pos, err))?;
        attributes.push(Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: value.into_owned(),
        });
    }

    let parent = open.last().map(|(id, _)| *id);
    if parent.is_none() && doc.root().is_some() {
        return Err(ParseError::MultipleRoots { pos });
    }

    let id = doc.push_node(
        NodeKind::Element {
            tag: tag.clone(),
            attributes,
        },
        parent,
    );
    if parent.is_none() {
        doc.set_root(id);
    }
    Ok((id, tag))
}

fn push_text(doc: &mut Document, parent: NodeId, text: Cow<'_, str>) {
    if text.trim().is_empty() {
        return;
    }
    doc.push_node(
        NodeKind::Text {
            text: text.into_owned(),
        },
        Some(parent),
    );
}
