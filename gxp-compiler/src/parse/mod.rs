//! Source parsing and namespace dispatch
//!
//!     Turns template source text into a forest of [`ParsedElement`]s. Parsing happens in
//!     three steps:
//!
//!     1. HTML named entities are rewritten to numeric references (see [`entities`]).
//!     2. `roxmltree` parses the document, which is flattened into [`ParseEvent`]s.
//!     3. A stack builder folds the events back into a tree. Each element is classified by
//!        its namespace when its end event arrives, so an element's children are already
//!        classified by the time the element itself is.
//!
//!     Nothing here fails: malformed XML yields an `xml-syntax` alert and an empty forest, and
//!     an element nobody understands becomes a [`NullElement`] whose children are dropped.

pub mod element;
pub mod entities;
pub mod events;
pub mod namespace;

pub use element::{
    CallElement, ElementData, GxpElement, GxpKind, NativeElement, NativeKind, NullElement,
    OutputElementNode, ParsedAttribute, ParsedElement, TextElement,
};
pub use events::{ParseEvent, RawAttribute};
pub use namespace::Namespace;

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink, SourcePosition};
use crate::lang::NativeLanguage;
use crate::schema::SchemaFactory;
use crate::tree::Forest;

/// The parse phase's output.
pub type ParseTree = Forest<ParsedElement>;

pub struct Parser<'a> {
    schemas: &'a dyn SchemaFactory,
}

impl<'a> Parser<'a> {
    pub fn new(schemas: &'a dyn SchemaFactory) -> Self {
        Parser { schemas }
    }

    pub fn parse(&self, source_name: &str, text: &str) -> ParseTree {
        let position = SourcePosition::whole_file(source_name);
        let mut alerts = AlertSetBuilder::new();
        let text = entities::expand_named_entities(text);
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let events = match roxmltree::Document::parse_with_options(&text, options) {
            Ok(doc) => events::document_events(source_name, &doc),
            Err(err) => {
                let pos = err.pos();
                alerts.add(Alert::new(
                    AlertKind::XmlSyntax,
                    SourcePosition::new(source_name, pos.row, pos.col),
                    err.to_string(),
                ));
                return Forest::empty(position, alerts.build());
            }
        };
        tracing::debug!(source = source_name, events = events.len(), "parsed xml");
        let roots = self.build(events, &mut alerts);
        Forest::new(position, alerts.build(), roots)
    }

    /// Folds an event stream into a forest of classified elements.
    pub fn build(&self, events: Vec<ParseEvent>, sink: &mut dyn AlertSink) -> Vec<ParsedElement> {
        let mut roots = Vec::new();
        let mut stack: Vec<OpenElement> = Vec::new();
        for event in events {
            match event {
                ParseEvent::StartElement {
                    position,
                    namespace_uri,
                    local_name,
                    qualified_name,
                    attributes,
                } => stack.push(OpenElement {
                    position,
                    namespace_uri,
                    local_name,
                    qualified_name,
                    attributes,
                    children: Vec::new(),
                }),
                ParseEvent::Characters { position, text } => {
                    // Text outside the document element can only be whitespace.
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(ParsedElement::Text(TextElement { position, text }));
                    }
                }
                ParseEvent::EndElement => {
                    let Some(open) = stack.pop() else {
                        continue;
                    };
                    let element = self.classify(open, sink);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => roots.push(element),
                    }
                }
            }
        }
        roots
    }

    fn classify(&self, open: OpenElement, sink: &mut dyn AlertSink) -> ParsedElement {
        let null = |open: &OpenElement| {
            ParsedElement::Null(NullElement {
                position: open.position.clone(),
                qualified_name: open.qualified_name.clone(),
            })
        };

        let Some(uri) = open.namespace_uri.clone() else {
            sink.add(Alert::new(
                AlertKind::NoNamespace,
                open.position.clone(),
                format!("<{}> has no namespace", open.qualified_name),
            ));
            return null(&open);
        };
        let Some(namespace) = Namespace::resolve(&uri, self.schemas) else {
            sink.add(Alert::new(
                AlertKind::UnknownNamespace,
                open.position.clone(),
                format!("unknown namespace '{uri}' on <{}>", open.qualified_name),
            ));
            return null(&open);
        };

        let unknown = |open: &OpenElement, sink: &mut dyn AlertSink| {
            sink.add(Alert::new(
                AlertKind::UnknownElement,
                open.position.clone(),
                format!("unknown element <{}> ({uri})", open.qualified_name),
            ));
            null(open)
        };

        match namespace {
            Namespace::Gxp => match GxpKind::from_local_name(&open.local_name) {
                Some(kind) => ParsedElement::Gxp(GxpElement {
                    kind,
                    data: self.element_data(open, sink),
                }),
                None => unknown(&open, sink),
            },
            Namespace::Call { package } => {
                let callee = open.local_name.clone();
                ParsedElement::Call(CallElement {
                    callee,
                    package,
                    data: self.element_data(open, sink),
                })
            }
            Namespace::Native(NativeLanguage::Cpp) if open.local_name == "include" => {
                ParsedElement::Native(NativeElement {
                    language: NativeLanguage::Cpp,
                    kind: NativeKind::Include,
                    data: self.element_data(open, sink),
                })
            }
            Namespace::Native(NativeLanguage::Java) if open.local_name == "annotate" => {
                ParsedElement::Native(NativeElement {
                    language: NativeLanguage::Java,
                    kind: NativeKind::Annotate,
                    data: self.element_data(open, sink),
                })
            }
            Namespace::Output(schema) => {
                let validator = schema.element_validator(&open.local_name).cloned();
                match validator {
                    Some(validator) => {
                        let local_name = open.local_name.clone();
                        ParsedElement::Output(OutputElementNode {
                            schema,
                            validator,
                            local_name,
                            data: self.element_data(open, sink),
                        })
                    }
                    None => unknown(&open, sink),
                }
            }
            Namespace::Native(_) | Namespace::Expr | Namespace::Msg | Namespace::NoMsg => {
                unknown(&open, sink)
            }
        }
    }

    fn element_data(&self, open: OpenElement, sink: &mut dyn AlertSink) -> ElementData {
        let mut attributes = Vec::with_capacity(open.attributes.len());
        for raw in open.attributes {
            let namespace = match raw.namespace_uri.as_deref() {
                None => None,
                Some(uri) => match Namespace::resolve(uri, self.schemas) {
                    Some(ns) => Some(ns),
                    None => {
                        sink.add(Alert::new(
                            AlertKind::UnknownNamespace,
                            raw.position.clone(),
                            format!("unknown namespace '{uri}' on attribute '{}'", raw.local_name),
                        ));
                        continue;
                    }
                },
            };
            attributes.push(ParsedAttribute {
                position: raw.position,
                namespace,
                name: raw.local_name,
                value: raw.value,
            });
        }
        ElementData {
            position: open.position,
            qualified_name: open.qualified_name,
            attributes,
            children: open.children,
        }
    }
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    position: SourcePosition,
    namespace_uri: Option<String>,
    local_name: String,
    qualified_name: String,
    attributes: Vec<RawAttribute>,
    children: Vec<ParsedElement>,
}
