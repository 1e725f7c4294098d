//! Placeholder pivoting.
//!
//! A `<gxp:ph/>` ... `<gxp:eph/>` pair is a pair of sibling markers in some concatenation.
//! Pivoting moves everything between them under a single [`Placeholder`] node, which is what
//! message extraction and the translation console see.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink};
use crate::ast::{
    Concatenation, Expression, Placeholder, PlaceholderEnd, PlaceholderStart, SemanticTree,
};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::tree::{Forest, Node};
use std::sync::Arc;

pub fn pivot(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    let mut pivoter = Pivoter { sink: &mut sink };
    let roots = roots
        .into_iter()
        .map(|root| root.try_map_content(|content, _| pivoter.visit(content)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Forest::new(position, sink.build(), roots))
}

struct Pivoter<'a> {
    sink: &'a mut dyn AlertSink,
}

impl Pivoter<'_> {
    fn visit(&mut self, expr: Expression) -> Result<Expression> {
        match expr {
            Expression::Concatenation(concat) => {
                let values = self.pivot_values(concat.values, &concat.schema)?;
                Ok(Concatenation::create(concat.position, concat.schema, values))
            }
            Expression::PlaceholderStart(start) => {
                self.sink.add(Alert::new(
                    AlertKind::BadNodePlacement,
                    start.position.clone(),
                    format!("<gxp:ph name='{}'> must be followed by a <gxp:eph>", start.name),
                ));
                Ok(Expression::empty(start.position, start.schema))
            }
            Expression::PlaceholderEnd(end) => {
                self.eph_missing_ph(&end);
                Ok(Expression::empty(end.position, end.schema))
            }
            Expression::Collapse(_) | Expression::OutputElement(_) => {
                Err(Error::unexpected("pivot", expr.display_name()))
            }
            other => other.try_map_children(&mut |child| self.visit(child)),
        }
    }

    fn pivot_values(
        &mut self,
        values: Vec<Expression>,
        schema: &Option<Arc<Schema>>,
    ) -> Result<Vec<Expression>> {
        let mut result = Vec::with_capacity(values.len());
        let mut open: Option<(PlaceholderStart, Vec<Expression>)> = None;
        for value in values {
            match value {
                Expression::PlaceholderStart(start) => match &open {
                    None => open = Some((start, Vec::new())),
                    Some((outer, _)) => self.sink.add(Alert::new(
                        AlertKind::BadNodePlacement,
                        start.position.clone(),
                        format!(
                            "<gxp:ph name='{}'> cannot be nested in <gxp:ph name='{}'>",
                            start.name, outer.name
                        ),
                    )),
                },
                Expression::PlaceholderEnd(end) => match open.take() {
                    None => self.eph_missing_ph(&end),
                    Some((start, children)) => {
                        let content =
                            Concatenation::create(start.position.clone(), schema.clone(), children);
                        if content.static_string() == Some("") {
                            self.sink.add(Alert::new(
                                AlertKind::EmptyPlaceholder,
                                start.position.clone(),
                                format!("placeholder '{}' is empty", start.name),
                            ));
                        } else {
                            let example = start
                                .example
                                .clone()
                                .or_else(|| example_of(&content))
                                .unwrap_or_else(|| format!("<var>{}</var>", start.name));
                            result.push(Expression::Placeholder(Placeholder {
                                position: start.position,
                                name: start.name,
                                example,
                                content: Box::new(content),
                            }));
                        }
                    }
                },
                other => {
                    let other = self.visit(other)?;
                    match &mut open {
                        Some((_, children)) => children.push(other),
                        None => result.push(other),
                    }
                }
            }
        }
        if let Some((start, _)) = open {
            self.sink.add(Alert::new(
                AlertKind::PhMissingEph,
                start.position.clone(),
                format!("<gxp:ph name='{}'> has no matching <gxp:eph>", start.name),
            ));
        }
        Ok(result)
    }

    fn eph_missing_ph(&mut self, end: &PlaceholderEnd) {
        self.sink.add(Alert::new(
            AlertKind::EphMissingPh,
            end.position.clone(),
            "<gxp:eph> has no matching <gxp:ph>",
        ));
    }
}

/// What a translator sees for the placeholder's content, if it can be known statically.
fn example_of(expr: &Expression) -> Option<String> {
    match expr {
        Expression::StringConstant(text) => Some(text.value.clone()),
        Expression::Escape(escape) => example_of(&escape.inner),
        Expression::Native(native) => native.example.clone(),
        Expression::NoMessage(nomsg) => example_of(&nomsg.content),
        Expression::Concatenation(concat) => concat.values.iter().map(example_of).collect(),
        Expression::Conditional(cond)
            if cond.clauses.len() == 1
                && matches!(cond.clauses[0].predicate, Expression::IsXml(_)) =>
        {
            example_of(&cond.otherwise)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::flatten::flatten;
    use crate::phases::testing::{escaped, template_content};
    use crate::phases::validate::validate;

    fn pivoted(body: &str) -> SemanticTree {
        pivot(flatten(validate(escaped(body)).unwrap()).unwrap()).unwrap()
    }

    fn placeholders(tree: &SemanticTree) -> Vec<(String, String)> {
        let mut found = Vec::new();
        template_content(tree).walk(&mut |e| {
            if let Expression::Placeholder(ph) = e {
                found.push((ph.name.clone(), ph.example.clone()));
            }
        });
        found
    }

    #[test]
    fn test_pair_becomes_placeholder() {
        let tree = pivoted(
            r#"<gxp:msg>Hello <gxp:ph name="user" example="Bob"/><gxp:eval expr="u"/><gxp:eph/>!</gxp:msg>"#,
        );
        assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
        assert_eq!(placeholders(&tree), vec![("user".to_string(), "Bob".to_string())]);
        template_content(&tree).walk(&mut |e| {
            assert!(!matches!(
                e,
                Expression::PlaceholderStart(_) | Expression::PlaceholderEnd(_)
            ));
        });
    }

    #[test]
    fn test_example_from_static_markup() {
        let tree = pivoted(r#"<gxp:msg>a<br gxp:ph="break"/>b</gxp:msg>"#);
        assert_eq!(
            placeholders(&tree),
            vec![("break".to_string(), "<br>".to_string())]
        );
    }

    #[test]
    fn test_dynamic_content_without_example() {
        let tree = pivoted(r#"<gxp:msg>Hi <gxp:eval expr="u" gxp:ph="user"/></gxp:msg>"#);
        assert_eq!(
            placeholders(&tree),
            vec![("user".to_string(), "<var>user</var>".to_string())]
        );
    }

    #[test]
    fn test_unmatched_markers() {
        let tree = pivoted(r#"<gxp:msg>a<gxp:ph name="x"/>b</gxp:msg>"#);
        assert!(tree.alerts().has_kind(AlertKind::PhMissingEph));
        let tree = pivoted(r#"<gxp:msg>a<gxp:eph/>b</gxp:msg>"#);
        assert!(tree.alerts().has_kind(AlertKind::EphMissingPh));
    }

    #[test]
    fn test_nested_start() {
        let tree = pivoted(r#"<gxp:msg><gxp:ph name="a"/>x<gxp:ph name="b"/>y<gxp:eph/></gxp:msg>"#);
        assert!(tree.alerts().has_kind(AlertKind::BadNodePlacement));
        assert_eq!(placeholders(&tree).len(), 1);
    }

    #[test]
    fn test_empty_placeholder() {
        let tree = pivoted(r#"<gxp:msg>a<gxp:ph name="x"/><gxp:eph/>b</gxp:msg>"#);
        assert!(tree.alerts().has_kind(AlertKind::EmptyPlaceholder));
        assert!(placeholders(&tree).is_empty());
    }
}
