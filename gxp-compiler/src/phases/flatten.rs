//! Content flattening.
//!
//! Output elements are spelled out as the text of their tags. What differs between XML and
//! SGML syntax (doctype, `xmlns`, boolean attributes, the ` /` of empty tags) becomes a
//! conditional on [`Expression::IsXml`], decided by the generated code at runtime.

use crate::alert::SourcePosition;
use crate::ast::{
    Attribute, Clause, Concatenation, Conditional, Expression, OutputElement, SemanticTree,
};
use crate::error::{Error, Result};
use crate::schema::{AttributeFlag, ContentFamily, DocType, ElementFlag, Schema};
use crate::tree::{Forest, Node};
use std::sync::Arc;

pub fn flatten(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let roots = roots
        .into_iter()
        .map(|root| root.try_map_content(|content, _| visit(content)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Forest::new(position, alerts, roots))
}

fn visit(expr: Expression) -> Result<Expression> {
    match expr {
        Expression::OutputElement(element) => flatten_element(element),
        unexpected @ (Expression::Collapse(_) | Expression::ExtractedMessage(_)) => {
            Err(Error::unexpected("flatten", unexpected.display_name()))
        }
        other => other.try_map_children(&mut visit),
    }
}

/// Builds text nodes tagged with one schema.
struct Text<'a> {
    schema: &'a Arc<Schema>,
}

impl Text<'_> {
    fn at(&self, position: &SourcePosition, value: impl Into<String>) -> Expression {
        Expression::string(position.clone(), Some(self.schema.clone()), value)
    }

    /// `xml` in XML syntax, `sgml` otherwise.
    fn by_syntax(&self, position: &SourcePosition, xml: Expression, sgml: Expression) -> Expression {
        Expression::Conditional(Conditional {
            position: position.clone(),
            schema: Some(self.schema.clone()),
            clauses: vec![Clause {
                position: position.clone(),
                predicate: Expression::IsXml(position.clone()),
                body: xml,
            }],
            otherwise: Box::new(sgml),
        })
    }

    fn when(&self, position: &SourcePosition, predicate: Expression, body: Expression) -> Expression {
        Expression::Conditional(Conditional {
            position: position.clone(),
            schema: Some(self.schema.clone()),
            clauses: vec![Clause {
                position: position.clone(),
                predicate,
                body,
            }],
            otherwise: Box::new(self.at(position, "")),
        })
    }
}

fn flatten_element(element: OutputElement) -> Result<Expression> {
    let OutputElement {
        position,
        schema,
        local_name,
        validator,
        doctype,
        attributes,
        content,
        ..
    } = element;
    let text = Text { schema: &schema };
    let tag = match &schema.tag_prefix {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.clone(),
    };

    let mut values = Vec::new();
    if let Some(doctype) = &doctype {
        values.push(flatten_doctype(&text, &position, doctype, &local_name));
    }
    values.push(text.at(&position, format!("<{tag}")));
    if doctype.is_some() {
        values.push(flatten_xmlns(&text, &position));
    }
    for attr in attributes {
        let boolean = validator
            .attribute_validator(&attr.name)
            .is_some_and(|v| v.is_flag_set(AttributeFlag::Boolean));
        values.push(if boolean {
            flatten_boolean_attribute(&text, attr)?
        } else {
            flatten_attribute(&text, attr)?
        });
    }
    let no_end_tag = validator.is_flag_set(ElementFlag::NoEndTag);
    if no_end_tag {
        values.push(text.by_syntax(&position, text.at(&position, " /"), text.at(&position, "")));
    }
    values.push(text.at(&position, ">"));
    values.push(visit(*content)?);
    if !no_end_tag {
        values.push(text.at(&position, format!("</{tag}>")));
    }
    Ok(Concatenation::create(position, Some(schema.clone()), values))
}

fn flatten_doctype(
    text: &Text<'_>,
    position: &SourcePosition,
    doctype: &DocType,
    root: &str,
) -> Expression {
    let xml = doctype.to_xml(root);
    // a doctype without SGML ids is written the XML way in both syntaxes
    let sgml = doctype.to_sgml(root).unwrap_or_else(|| xml.clone());
    text.by_syntax(position, text.at(position, xml), text.at(position, sgml))
}

fn flatten_xmlns(text: &Text<'_>, position: &SourcePosition) -> Expression {
    let schema = text.schema;
    let name = match &schema.tag_prefix {
        Some(prefix) => format!("xmlns:{prefix}"),
        None => "xmlns".to_string(),
    };
    let uri = ContentFamily::Markup.escape_static(&schema.namespace_uri);
    text.by_syntax(
        position,
        text.at(position, format!(" {name}=\"{uri}\"")),
        text.at(position, ""),
    )
}

fn flatten_attribute(text: &Text<'_>, attr: Attribute) -> Result<Expression> {
    let position = attr.position.clone();
    let value = visit(attr.value)?;
    let flattened = Concatenation::create(
        position.clone(),
        Some(text.schema.clone()),
        vec![
            text.at(&position, format!(" {}=\"", attr.name)),
            value,
            text.at(&position, "\""),
        ],
    );
    Ok(match attr.condition {
        Some(condition) => text.when(&position, condition, flattened),
        None => flattened,
    })
}

/// `checked="checked"` in XML syntax, a bare `checked` otherwise. A dynamic value decides at
/// runtime whether the attribute is written at all.
fn flatten_boolean_attribute(text: &Text<'_>, attr: Attribute) -> Result<Expression> {
    let position = attr.position.clone();
    let spelled = Concatenation::create(
        position.clone(),
        Some(text.schema.clone()),
        vec![
            text.at(&position, format!(" {}", attr.name)),
            text.by_syntax(
                &position,
                text.at(&position, format!("=\"{}\"", attr.name)),
                text.at(&position, ""),
            ),
        ],
    );
    let value = visit(attr.value)?;
    let written = if value.static_string().is_some() {
        spelled
    } else {
        let predicate = match value {
            Expression::Escape(escape) => *escape.inner,
            other => other,
        };
        text.when(&position, predicate, spelled)
    };
    Ok(match attr.condition {
        Some(condition) => text.when(&position, condition, written),
        None => written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{all_text, escaped, template_content};
    use crate::phases::validate::validate;

    fn flattened(body: &str) -> SemanticTree {
        flatten(validate(escaped(body)).unwrap()).unwrap()
    }

    /// Text as written in XML syntax, picking the first clause of every conditional.
    fn as_xml(expr: &Expression) -> String {
        match expr {
            Expression::StringConstant(s) => s.value.clone(),
            Expression::Concatenation(c) => c.values.iter().map(as_xml).collect(),
            Expression::Conditional(c) => as_xml(&c.clauses[0].body),
            other => format!("{{{}}}", other.display_name()),
        }
    }

    fn as_sgml(expr: &Expression) -> String {
        match expr {
            Expression::StringConstant(s) => s.value.clone(),
            Expression::Concatenation(c) => c.values.iter().map(as_sgml).collect(),
            Expression::Conditional(c) if matches!(c.clauses[0].predicate, Expression::IsXml(_)) => {
                as_sgml(&c.otherwise)
            }
            Expression::Conditional(c) => as_sgml(&c.clauses[0].body),
            other => format!("{{{}}}", other.display_name()),
        }
    }

    #[test]
    fn test_no_output_elements_remain() {
        let tree = flattened(r#"<div><b>x</b><br/></div>"#);
        template_content(&tree).walk(&mut |e| {
            assert!(!matches!(e, Expression::OutputElement(_)));
        });
        assert_eq!(all_text(template_content(&tree)), "<div><b>x</b><br /></div>");
    }

    #[test]
    fn test_empty_tags_by_syntax() {
        let tree = flattened(r#"<br/>"#);
        assert_eq!(as_xml(template_content(&tree)), "<br />");
        assert_eq!(as_sgml(template_content(&tree)), "<br>");
    }

    #[test]
    fn test_attributes() {
        let tree = flattened(r#"<a href="/x?a=1&amp;b=2" title="t">x</a>"#);
        assert_eq!(
            as_xml(template_content(&tree)),
            r#"<a href="/x?a=1&amp;b=2" title="t">x</a>"#
        );
    }

    #[test]
    fn test_boolean_attribute() {
        let tree = flattened(r#"<input checked="checked"/>"#);
        assert_eq!(as_xml(template_content(&tree)), r#"<input checked="checked" />"#);
        assert_eq!(as_sgml(template_content(&tree)), "<input checked>");
    }

    #[test]
    fn test_dynamic_boolean_attribute_uses_raw_predicate() {
        let tree = flattened(
            r#"<input expr:checked="on" xmlns:expr="http://google.com/2001/gxp/expressions"/>"#,
        );
        let mut predicates = Vec::new();
        template_content(&tree).walk(&mut |e| {
            if let Expression::Conditional(c) = e {
                predicates.push(c.clauses[0].predicate.clone());
            }
        });
        assert!(predicates.iter().any(|p| matches!(p, Expression::Native(_))));
        assert!(!predicates.iter().any(|p| matches!(p, Expression::Escape(_))));
    }

    #[test]
    fn test_doctype_and_xmlns() {
        let tree = flattened(r#"<html gxp:doctype="strict"><body/></html>"#);
        let xml = as_xml(template_content(&tree));
        assert!(xml.contains("<!DOCTYPE html PUBLIC"), "{xml}");
        assert!(xml.contains(r#"<html xmlns="http://www.w3.org/1999/xhtml">"#), "{xml}");
        let sgml = as_sgml(template_content(&tree));
        assert!(sgml.contains("<html><body></body></html>"), "{sgml}");
    }
}
