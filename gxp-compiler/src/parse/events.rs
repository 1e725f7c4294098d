//! Flat event stream produced from an XML document.
//!
//! The tree builder in the parent module never touches `roxmltree` directly; it consumes
//! these events, which keeps namespace dispatch testable without writing XML.

use crate::alert::SourcePosition;

/// An attribute as it appeared on a start tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub position: SourcePosition,
    pub namespace_uri: Option<String>,
    pub local_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    StartElement {
        position: SourcePosition,
        namespace_uri: Option<String>,
        local_name: String,
        qualified_name: String,
        attributes: Vec<RawAttribute>,
    },
    EndElement,
    Characters {
        position: SourcePosition,
        text: String,
    },
}

/// Flattens `doc` into events in document order. Comments and processing instructions are
/// dropped.
pub fn document_events(source: &str, doc: &roxmltree::Document<'_>) -> Vec<ParseEvent> {
    let mut events = Vec::new();
    for child in doc.root().children() {
        push_node(source, doc, child, &mut events);
    }
    events
}

fn position_at(source: &str, doc: &roxmltree::Document<'_>, offset: usize) -> SourcePosition {
    let pos = doc.text_pos_at(offset);
    SourcePosition::new(source, pos.row, pos.col)
}

fn push_node(
    source: &str,
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
    events: &mut Vec<ParseEvent>,
) {
    if node.is_text() {
        if let Some(text) = node.text() {
            events.push(ParseEvent::Characters {
                position: position_at(source, doc, node.range().start),
                text: text.to_string(),
            });
        }
        return;
    }
    if !node.is_element() {
        return;
    }

    let tag = node.tag_name();
    let namespace_uri = tag.namespace().map(str::to_string);
    let qualified_name = match tag.namespace().and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", tag.name()),
        _ => tag.name().to_string(),
    };
    let attributes = node
        .attributes()
        .map(|attr| RawAttribute {
            position: position_at(source, doc, attr.position()),
            namespace_uri: attr.namespace().map(str::to_string),
            local_name: attr.name().to_string(),
            value: attr.value().to_string(),
        })
        .collect();

    events.push(ParseEvent::StartElement {
        position: position_at(source, doc, node.range().start),
        namespace_uri,
        local_name: tag.name().to_string(),
        qualified_name,
        attributes,
    });
    for child in node.children() {
        push_node(source, doc, child, events);
    }
    events.push(ParseEvent::EndElement);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_in_document_order() {
        let text = r#"<a xmlns="urn:a" xmlns:b="urn:b" b:x="1"><!-- c --><b:c>hi</b:c></a>"#;
        let doc = roxmltree::Document::parse(text).unwrap();
        let events = document_events("t.xml", &doc);
        assert_eq!(events.len(), 5);
        match &events[0] {
            ParseEvent::StartElement {
                position,
                namespace_uri,
                qualified_name,
                attributes,
                ..
            } => {
                assert_eq!(position.to_string(), "t.xml:1:1");
                assert_eq!(namespace_uri.as_deref(), Some("urn:a"));
                assert_eq!(qualified_name, "a");
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].namespace_uri.as_deref(), Some("urn:b"));
                assert_eq!(attributes[0].local_name, "x");
                assert_eq!(attributes[0].position.to_string(), "t.xml:1:34");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &events[1] {
            ParseEvent::StartElement { qualified_name, .. } => assert_eq!(qualified_name, "b:c"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&events[2], ParseEvent::Characters { text, .. } if text == "hi"));
        assert_eq!(events[3], ParseEvent::EndElement);
        assert_eq!(events[4], ParseEvent::EndElement);
    }
}
