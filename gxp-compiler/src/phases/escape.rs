//! Escaping.
//!
//! Every piece of content is brought into the schema of the context it is written to. Static
//! text is escaped right away for the context's content family and tagged with its schema.
//! Dynamic values (native code, booleans, foreign content) are wrapped in an [`Escape`] node
//! that the generated code evaluates at runtime.
//!
//! Content whose schema the context does not accept, such as markup produced by a call in a
//! plain text template, raises a `type-error` and is replaced by an empty string.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink};
use crate::ast::{
    Abbr, Attribute, Call, Callee, Clause, Concatenation, Conditional, Escape, Expression,
    Loop, NoMessage, OutputElement, PlaceholderEnd, PlaceholderStart, Root, SemanticTree,
    StringConstant, Type, UnextractedMessage,
};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::tree::{Forest, Node};
use std::sync::Arc;

pub fn escape(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    let mut escaper = Escaper { sink: &mut sink };
    let roots = roots
        .into_iter()
        .map(|root| escaper.root(root))
        .collect::<Result<Vec<_>>>()?;
    Ok(Forest::new(position, sink.build(), roots))
}

struct Escaper<'a> {
    sink: &'a mut dyn AlertSink,
}

impl Escaper<'_> {
    fn root(&mut self, root: Root) -> Result<Root> {
        let Root::Template(mut template) = root else {
            return Ok(root);
        };
        for param in &mut template.parameters {
            let Some(schema) = param.ty.content_schema().cloned() else {
                continue;
            };
            if let Some(default) = param.default.take() {
                param.default = Some(self.visit(default, &schema)?);
            }
        }
        Root::Template(template).try_map_content(|content, schema| self.visit(content, schema))
    }

    fn visit(&mut self, expr: Expression, schema: &Arc<Schema>) -> Result<Expression> {
        let result = match expr {
            Expression::StringConstant(text) => Expression::StringConstant(StringConstant {
                value: schema.content_family().escape_static(&text.value),
                schema: Some(schema.clone()),
                position: text.position,
            }),
            value @ (Expression::BooleanConstant(_)
            | Expression::Native(_)
            | Expression::Constructed(_)
            | Expression::Escape(_)) => wrap(value, schema),
            Expression::IsXml(position) => Expression::IsXml(position),
            Expression::Concatenation(concat) => {
                let values = concat
                    .values
                    .into_iter()
                    .map(|value| self.visit(value, schema))
                    .collect::<Result<Vec<_>>>()?;
                Concatenation::create(concat.position, Some(schema.clone()), values)
            }
            Expression::Conditional(cond) => {
                let mut clauses = Vec::with_capacity(cond.clauses.len());
                for clause in cond.clauses {
                    clauses.push(Clause {
                        body: self.visit(clause.body, schema)?,
                        ..clause
                    });
                }
                Expression::Conditional(Conditional {
                    schema: Some(schema.clone()),
                    clauses,
                    otherwise: Box::new(self.visit(*cond.otherwise, schema)?),
                    position: cond.position,
                })
            }
            Expression::Loop(lp) => Expression::Loop(Loop {
                body: Box::new(self.visit(*lp.body, schema)?),
                delimiter: Box::new(self.visit(*lp.delimiter, schema)?),
                ..lp
            }),
            Expression::Abbr(abbr) => {
                let value = match abbr.ty.content_schema() {
                    Some(value_schema) => {
                        let value_schema = value_schema.clone();
                        self.visit(*abbr.value, &value_schema)?
                    }
                    None => *abbr.value,
                };
                Expression::Abbr(Abbr {
                    value: Box::new(value),
                    body: Box::new(self.visit(*abbr.body, schema)?),
                    ..abbr
                })
            }
            Expression::Call(call) => self.call(call)?,
            Expression::OutputElement(element) => self.output_element(element, schema)?,
            Expression::Message(message) => {
                let message_schema = message.schema.clone().unwrap_or_else(|| schema.clone());
                let content = self.visit(*message.content, &message_schema)?;
                let result = Expression::Message(UnextractedMessage {
                    schema: Some(message_schema.clone()),
                    content: Box::new(content),
                    ..message
                });
                if message_schema == *schema {
                    result
                } else {
                    wrap(result, schema)
                }
            }
            Expression::NoMessage(nomsg) => Expression::NoMessage(NoMessage {
                content: Box::new(self.visit(*nomsg.content, schema)?),
                ..nomsg
            }),
            Expression::PlaceholderStart(ph) => Expression::PlaceholderStart(PlaceholderStart {
                schema: Some(schema.clone()),
                ..ph
            }),
            Expression::PlaceholderEnd(eph) => Expression::PlaceholderEnd(PlaceholderEnd {
                schema: Some(schema.clone()),
                ..eph
            }),
            unexpected @ (Expression::Collapse(_)
            | Expression::Placeholder(_)
            | Expression::ExtractedMessage(_)) => {
                return Err(Error::unexpected("escape", unexpected.display_name()));
            }
        };
        Ok(self.check(result, schema))
    }

    /// Rejects content the context cannot hold.
    fn check(&mut self, result: Expression, schema: &Arc<Schema>) -> Expression {
        match result.schema() {
            Some(produced) if !schema.allows(&produced) => {
                self.sink.add(Alert::new(
                    AlertKind::TypeError,
                    result.position().clone(),
                    format!(
                        "{} produces {} content, which is not allowed in {} content",
                        result.display_name(),
                        produced.content_type,
                        schema.content_type
                    ),
                ));
                Expression::empty(result.position().clone(), Some(schema.clone()))
            }
            _ => result,
        }
    }

    fn call(&mut self, call: Call) -> Result<Expression> {
        let Callee::Bound(callable) = &call.callee else {
            return Err(Error::unexpected("escape", format!("unbound {}", call.callee.name())));
        };
        let callable = callable.clone();
        let mut arguments = call.arguments;
        for (name, argument) in arguments.iter_mut() {
            let Some(Type::Content(param_schema)) = callable.parameter(name).map(|p| &p.ty) else {
                continue;
            };
            let value = std::mem::replace(
                &mut argument.value,
                Expression::empty(argument.position.clone(), None),
            );
            argument.value = self.visit(value, param_schema)?;
        }
        Ok(Expression::Call(Call { arguments, ..call }))
    }

    fn output_element(&mut self, element: OutputElement, schema: &Arc<Schema>) -> Result<Expression> {
        let content_schema = element.content_schema().clone();
        let attributes = element
            .attributes
            .into_iter()
            .map(|attr| self.attribute(attr, schema))
            .collect::<Result<Vec<_>>>()?;
        let content = self.visit(*element.content, &content_schema)?;
        Ok(Expression::OutputElement(OutputElement {
            attributes,
            content: Box::new(content),
            ..element
        }))
    }

    /// Attribute values are escaped for their own schema first (script in `onclick`), then
    /// for the markup they are written into.
    fn attribute(&mut self, attr: Attribute, schema: &Arc<Schema>) -> Result<Attribute> {
        let value = match &attr.inner_schema {
            Some(inner) => {
                let inner = inner.clone();
                let value = self.visit(attr.value, &inner)?;
                reescape(value, schema)
            }
            None => self.visit(attr.value, schema)?,
        };
        Ok(Attribute { value, ..attr })
    }
}

fn wrap(inner: Expression, schema: &Arc<Schema>) -> Expression {
    Expression::Escape(Escape {
        position: inner.position().clone(),
        schema: schema.clone(),
        inner: Box::new(inner),
    })
}

/// Escapes content already escaped for another schema once more for `schema`.
fn reescape(expr: Expression, schema: &Arc<Schema>) -> Expression {
    match expr {
        Expression::StringConstant(text) => Expression::StringConstant(StringConstant {
            value: schema.content_family().escape_static(&text.value),
            schema: Some(schema.clone()),
            position: text.position,
        }),
        Expression::Concatenation(concat) => {
            let values = concat
                .values
                .into_iter()
                .map(|value| reescape(value, schema))
                .collect();
            Concatenation::create(concat.position, Some(schema.clone()), values)
        }
        other => wrap(other, schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{all_text, escaped, template_content};

    fn first<'a>(expr: &'a Expression, pick: &dyn Fn(&Expression) -> bool) -> Option<&'a Expression> {
        if pick(expr) {
            return Some(expr);
        }
        expr.children().into_iter().find_map(|child| first(child, pick))
    }

    #[test]
    fn test_static_text_is_escaped() {
        let tree = escaped("a &lt; b &amp; \"c\"");
        assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
        assert_eq!(
            all_text(template_content(&tree)),
            "a &lt; b &amp; &quot;c&quot;"
        );
    }

    #[test]
    fn test_every_string_carries_a_schema() {
        let tree = escaped(r#"<div title="t">x<gxp:if cond="c">y</gxp:if></div>"#);
        template_content(&tree).walk(&mut |e| {
            if let Expression::StringConstant(s) = e {
                assert!(s.schema.is_some(), "unescaped {:?}", s.value);
            }
        });
    }

    #[test]
    fn test_eval_is_wrapped() {
        let tree = escaped(r#"<gxp:eval expr="name"/>"#);
        match template_content(&tree) {
            Expression::Escape(escape) => {
                assert_eq!(escape.schema.content_type, "text/html");
                assert!(matches!(*escape.inner, Expression::Native(_)));
            }
            other => panic!("expected escape, got {other:?}"),
        }
    }

    #[test]
    fn test_script_attribute_is_escaped_twice() {
        let tree = escaped(r#"<div onclick="a &amp;&amp; b" expr:onmouseover="f()" xmlns:expr="http://google.com/2001/gxp/expressions"/>"#);
        let div = first(template_content(&tree), &|e| matches!(e, Expression::OutputElement(_)));
        let Some(Expression::OutputElement(div)) = div else {
            panic!("no element");
        };
        let value = |name: &str| {
            let attr = div.attributes.iter().find(|a| a.name == name);
            &attr.unwrap_or_else(|| panic!("no {name}")).value
        };
        assert_eq!(value("onclick").static_string(), Some("a &amp;&amp; b"));
        match value("onmouseover") {
            Expression::Escape(outer) => {
                assert_eq!(outer.schema.content_type, "text/html");
                assert!(matches!(&*outer.inner, Expression::Escape(inner)
                    if inner.schema.content_type == "text/javascript"));
            }
            other => panic!("expected nested escape, got {other:?}"),
        }
    }

    #[test]
    fn test_script_content_is_not_html_escaped() {
        let tree = escaped("<script>if (a &lt; b) {}</script>");
        assert!(all_text(template_content(&tree)).contains("if (a < b) {}"));
    }

    #[test]
    fn test_markup_in_plain_text_message_is_a_type_error() {
        let tree = escaped(r#"<gxp:msg content-type="text/plain"><b>x</b></gxp:msg>"#);
        assert!(tree.alerts().has_kind(AlertKind::TypeError));
    }

    #[test]
    fn test_plain_text_message_in_html_is_escaped() {
        let tree = escaped(r#"<gxp:msg content-type="text/plain">x</gxp:msg>"#);
        assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
        assert!(matches!(template_content(&tree), Expression::Escape(_)));
    }
}
