//! Message extraction.
//!
//! Each `<gxp:msg>` becomes an [`ExtractedMessage`]: a [`Message`] for translators plus the
//! dynamic values its placeholders refer to as `%1`..`%9`. Text that is not in a message
//! stays as it is; placeholders found outside messages are reported and unwrapped.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink, SourcePosition};
use crate::ast::{
    Expression, ExtractedMessage, Message, MessagePart, Placeholder, Root, SemanticTree,
    UnextractedMessage,
};
use crate::error::{Error, Result};
use crate::tree::{Forest, Node};
use std::sync::Arc;

/// `%1`..`%9` is all a message format can refer to.
const MAX_DYNAMIC_PLACEHOLDERS: usize = 9;

/// The last tree of the pipeline, with the messages of the unit in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageExtractedTree {
    pub tree: Forest<Root>,
    pub messages: Vec<Arc<Message>>,
}

pub fn extract(tree: SemanticTree) -> Result<MessageExtractedTree> {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    let mut extractor = Extractor {
        sink: &mut sink,
        messages: Vec::new(),
    };
    let roots = roots
        .into_iter()
        .map(|root| root.try_map_content(|content, _| extractor.outside(content, None)))
        .collect::<Result<Vec<_>>>()?;
    let messages = extractor.messages;
    Ok(MessageExtractedTree {
        tree: Forest::new(position, sink.build(), roots),
        messages,
    })
}

struct Extractor<'a> {
    sink: &'a mut dyn AlertSink,
    messages: Vec<Arc<Message>>,
}

impl Extractor<'_> {
    fn misplaced(&mut self, node: &dyn Node, container: Option<&str>) {
        let message = match container {
            Some(container) => format!("{} may not appear inside {container}", node.display_name()),
            None => format!("{} may only appear inside <gxp:msg>", node.display_name()),
        };
        self.sink.add(Alert::new(
            AlertKind::BadNodePlacement,
            node.position().clone(),
            message,
        ));
    }

    /// Visits content outside any message; `nomsg` is set inside `<gxp:nomsg>`.
    fn outside(&mut self, expr: Expression, nomsg: Option<&str>) -> Result<Expression> {
        match expr {
            Expression::Message(_) | Expression::NoMessage(_) | Expression::Placeholder(_)
                if nomsg.is_some() =>
            {
                self.misplaced(&expr, nomsg);
                self.unwrap_outside(expr, nomsg)
            }
            Expression::Placeholder(_) => {
                self.misplaced(&expr, None);
                self.unwrap_outside(expr, None)
            }
            Expression::Message(message) => self.extract_message(message),
            Expression::NoMessage(inner) => self.outside(*inner.content, Some("<gxp:nomsg>")),
            unexpected @ (Expression::PlaceholderStart(_)
            | Expression::PlaceholderEnd(_)
            | Expression::OutputElement(_)
            | Expression::Collapse(_)) => {
                Err(Error::unexpected("extract messages", unexpected.display_name()))
            }
            other => other.try_map_children(&mut |child| self.outside(child, nomsg)),
        }
    }

    /// Extracts a message, or drops a misplaced `<gxp:nomsg>` or placeholder around its content.
    fn unwrap_outside(&mut self, expr: Expression, nomsg: Option<&str>) -> Result<Expression> {
        match expr {
            Expression::Message(message) => self.extract_message(message),
            Expression::NoMessage(inner) => self.outside(*inner.content, nomsg),
            Expression::Placeholder(ph) => self.outside(*ph.content, nomsg),
            other => self.outside(other, nomsg),
        }
    }

    fn extract_message(&mut self, message: UnextractedMessage) -> Result<Expression> {
        let position = message.position.clone();
        let mut builder = MessageBuilder::default();
        self.inside(*message.content, &mut builder)?;
        let MessageBuilder { parts, parameters } = builder;
        if let Some(problem) = validate_parts(&parts) {
            self.sink.add(Alert::new(
                AlertKind::InvalidMessage,
                position.clone(),
                format!("invalid message: {problem}"),
            ));
            return Ok(Expression::empty(position, message.schema));
        }

        let presentation = parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => text.as_str(),
                MessagePart::Placeholder { presentation, .. } => presentation.as_str(),
            })
            .collect::<String>();
        let extracted = Arc::new(Message {
            id: Message::fingerprint(&presentation, message.meaning.as_deref()),
            presentation,
            meaning: message.meaning,
            description: message.comment,
            hidden: message.hidden,
            source: source_reference(&position),
            parts,
        });
        tracing::trace!(id = %extracted.id, "extracted message");
        self.messages.push(extracted.clone());
        Ok(Expression::ExtractedMessage(ExtractedMessage {
            position,
            schema: message.schema,
            message: extracted,
            parameters,
        }))
    }

    fn inside(&mut self, expr: Expression, builder: &mut MessageBuilder) -> Result<()> {
        match expr {
            Expression::StringConstant(text) => builder.text(&text.value.replace('%', "%%")),
            Expression::Concatenation(concat) => {
                for value in concat.values {
                    self.inside(value, builder)?;
                }
            }
            Expression::Escape(escape) => self.inside(*escape.inner, builder)?,
            Expression::Placeholder(ph) => self.placeholder(ph, builder)?,
            unexpected @ (Expression::OutputElement(_)
            | Expression::Collapse(_)
            | Expression::ExtractedMessage(_)
            | Expression::PlaceholderStart(_)
            | Expression::PlaceholderEnd(_)) => {
                return Err(Error::unexpected("extract messages", unexpected.display_name()));
            }
            other => self.misplaced(&other, Some("<gxp:msg> outside of a placeholder")),
        }
        Ok(())
    }

    fn placeholder(&mut self, ph: Placeholder, builder: &mut MessageBuilder) -> Result<()> {
        let values = match *ph.content {
            Expression::Concatenation(concat) => concat.values,
            other => vec![other],
        };
        let mut presentation = String::new();
        for value in values {
            let value = self.outside(value, None)?;
            if let Some(text) = value.static_string() {
                presentation.push_str(&text.replace('%', "%%"));
                continue;
            }
            let index = match builder.parameters.iter().position(|p| p.equivalent(&value)) {
                Some(index) => index,
                None if builder.parameters.len() < MAX_DYNAMIC_PLACEHOLDERS => {
                    builder.parameters.push(value);
                    builder.parameters.len() - 1
                }
                None => {
                    self.sink.add(Alert::new(
                        AlertKind::TooManyDynamicPlaceholders,
                        value.position().clone(),
                        format!(
                            "a message may have at most {MAX_DYNAMIC_PLACEHOLDERS} dynamic placeholders"
                        ),
                    ));
                    continue;
                }
            };
            presentation.push_str(&format!("%{}", index + 1));
        }
        builder.parts.push(MessagePart::Placeholder {
            name: ph.name.to_uppercase(),
            example: ph.example,
            presentation,
        });
        Ok(())
    }
}

#[derive(Default)]
struct MessageBuilder {
    parts: Vec<MessagePart>,
    parameters: Vec<Expression>,
}

impl MessageBuilder {
    fn text(&mut self, text: &str) {
        if let Some(MessagePart::Text { text: last }) = self.parts.last_mut() {
            last.push_str(text);
        } else if !text.is_empty() {
            self.parts.push(MessagePart::Text {
                text: text.to_string(),
            });
        }
    }
}

/// A message needs some content, and a placeholder name may only stand for one thing.
fn validate_parts(parts: &[MessagePart]) -> Option<String> {
    let blank = parts.iter().all(|part| match part {
        MessagePart::Text { text } => text.trim().is_empty(),
        MessagePart::Placeholder { .. } => false,
    });
    if blank {
        return Some("message has no content".to_string());
    }
    let mut seen: Vec<(&str, &str)> = Vec::new();
    for part in parts {
        let MessagePart::Placeholder {
            name, presentation, ..
        } = part
        else {
            continue;
        };
        if !name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            return Some(format!("'{name}' is not a valid placeholder name"));
        }
        match seen.iter().find(|(seen_name, _)| *seen_name == name.as_str()) {
            Some((_, other)) if *other != presentation.as_str() => {
                return Some(format!("placeholder '{name}' is used for different content"));
            }
            Some(_) => {}
            None => seen.push((name.as_str(), presentation.as_str())),
        }
    }
    None
}

/// `file: Lline, Ccolumn` with a zero-based column, as translation tools expect.
fn source_reference(position: &SourcePosition) -> String {
    format!(
        "{}: L{}, C{}",
        position.source(),
        position.line(),
        position.column().saturating_sub(1)
    )
}
