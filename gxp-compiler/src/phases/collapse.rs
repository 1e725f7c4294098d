//! Whitespace collapsing.
//!
//! Every [`Collapse`] region is resolved against the operators of its enclosing region and
//! then applied to the text directly inside it: whitespace at the very start and end of the
//! region goes through the exterior operator, every other run of whitespace through the
//! interior operator. Text nested in other constructs (a clause body, an element's content)
//! belongs to the region that construct opens, if any, and is left alone otherwise.
//!
//! Defaults by context: template content collapses interior runs and removes the exterior,
//! `preservespaces` elements preserve both, output element attributes and messages
//! normalize the interior and remove the exterior. Call arguments inherit from the caller.

use crate::alert::SourcePosition;
use crate::ast::space::is_space;
use crate::ast::{
    Attribute, Collapse, Concatenation, Expression, NoMessage, OutputElement, SemanticTree,
    SpaceOperator, SpaceOperators, StringConstant, UnextractedMessage,
};
use crate::error::{Error, Result};
use crate::schema::{ElementFlag, Schema};
use crate::tree::{Forest, Node};
use std::sync::Arc;

pub fn collapse(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let collapser = Collapser {
        space: SpaceOperators::TEMPLATE,
    };
    let roots = roots
        .into_iter()
        .map(|root| root.try_map_content(|content, _| collapser.visit(content)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Forest::new(position, alerts, roots))
}

#[derive(Debug, Clone, Copy)]
struct Collapser {
    /// Operators of the innermost enclosing region.
    space: SpaceOperators,
}

impl Collapser {
    fn with(self, space: SpaceOperators) -> Self {
        Collapser { space }
    }

    fn visit(self, expr: Expression) -> Result<Expression> {
        match expr {
            Expression::Collapse(Collapse { space, body, .. }) => {
                let space = space.inherit_from(&self.space);
                let body = self.with(space).visit(*body)?;
                Ok(collapse_region(body, space))
            }
            Expression::Message(message) => {
                let content = self.with(SpaceOperators::MESSAGE).visit(*message.content)?;
                Ok(Expression::Message(UnextractedMessage {
                    content: Box::new(content),
                    ..message
                }))
            }
            Expression::NoMessage(nomsg) => {
                let content = self.with(SpaceOperators::MESSAGE).visit(*nomsg.content)?;
                Ok(Expression::NoMessage(NoMessage {
                    content: Box::new(content),
                    ..nomsg
                }))
            }
            Expression::OutputElement(element) => {
                let attributes = element
                    .attributes
                    .into_iter()
                    .map(|attr| self.visit_output_attribute(attr))
                    .collect::<Result<Vec<_>>>()?;
                let preserving = element.validator.is_flag_set(ElementFlag::PreserveSpaces);
                let content_collapser = if preserving {
                    self.with(SpaceOperators::PRESERVING)
                } else {
                    self
                };
                let content = content_collapser.visit(*element.content)?;
                Ok(Expression::OutputElement(OutputElement {
                    attributes,
                    content: Box::new(content),
                    ..element
                }))
            }
            Expression::ExtractedMessage(_) => {
                Err(Error::unexpected("collapse", expr.display_name()))
            }
            other => other.try_map_children(&mut |child| self.visit(child)),
        }
    }

    fn visit_output_attribute(self, attr: Attribute) -> Result<Attribute> {
        let value = self.with(SpaceOperators::ATTRIBUTE).visit(attr.value)?;
        let condition = attr.condition.map(|c| self.visit(c)).transpose()?;
        Ok(Attribute {
            value,
            condition,
            ..attr
        })
    }
}

fn collapse_region(body: Expression, space: SpaceOperators) -> Expression {
    match body {
        Expression::StringConstant(text) => {
            let position = text.position.clone();
            let schema = text.schema.clone();
            let values = vec![Expression::StringConstant(text)];
            let values = collapse_values(&position, schema.clone(), values, space);
            Concatenation::create(position, schema, values)
        }
        Expression::Concatenation(concat) => {
            let values =
                collapse_values(&concat.position, concat.schema.clone(), concat.values, space);
            Concatenation::create(concat.position, concat.schema, values)
        }
        other => other,
    }
}

/// A run of adjacent text between two non-text values.
#[derive(Default)]
struct Segment {
    text: String,
    position: Option<SourcePosition>,
}

fn collapse_values(
    region: &SourcePosition,
    schema: Option<Arc<Schema>>,
    values: Vec<Expression>,
    space: SpaceOperators,
) -> Vec<Expression> {
    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut others = Vec::new();
    for value in values {
        match value {
            Expression::StringConstant(StringConstant {
                position, value, ..
            }) => {
                current.text.push_str(&value);
                current.position.get_or_insert(position);
            }
            other => {
                segments.push(std::mem::take(&mut current));
                others.push(other);
            }
        }
    }
    segments.push(current);

    let interior = space.interior_or_preserve();
    let exterior = space.exterior_or_preserve();
    let last = segments.len() - 1;

    let leading = split_leading(&mut segments[0].text);
    let trailing = split_trailing(&mut segments[last].text);
    for segment in &mut segments {
        segment.text = replace_runs(&segment.text, interior);
    }
    if let Some(run) = leading {
        segments[0].text.insert_str(0, &exterior.apply(&run));
    }
    if let Some(run) = trailing {
        segments[last].text.push_str(&exterior.apply(&run));
    }

    let mut result = Vec::with_capacity(segments.len() + others.len());
    let mut others = others.into_iter();
    for segment in segments {
        if !segment.text.is_empty() {
            result.push(Expression::StringConstant(StringConstant {
                position: segment.position.unwrap_or_else(|| region.clone()),
                schema: schema.clone(),
                value: segment.text,
            }));
        }
        result.extend(others.next());
    }
    result
}

fn split_leading(text: &mut String) -> Option<String> {
    let rest = text.trim_start_matches(is_space).len();
    let cut = text.len() - rest;
    if cut == 0 {
        return None;
    }
    let run = text[..cut].to_string();
    text.drain(..cut);
    Some(run)
}

fn split_trailing(text: &mut String) -> Option<String> {
    let keep = text.trim_end_matches(is_space).len();
    if keep == text.len() {
        return None;
    }
    Some(text.split_off(keep))
}

fn replace_runs(text: &str, operator: SpaceOperator) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    for c in text.chars() {
        if is_space(c) {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            out.push_str(&operator.apply(&run));
            run.clear();
        }
        out.push(c);
    }
    if !run.is_empty() {
        out.push_str(&operator.apply(&run));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MultiLanguageValue;
    use crate::phases::testing::{all_text, collapsed, template_content};
    use proptest::prelude::*;

    fn pos() -> SourcePosition {
        SourcePosition::new("t.gxp", 1, 1)
    }

    fn text(value: &str) -> Expression {
        Expression::string(pos(), None, value)
    }

    fn collapse_str(value: &str, space: SpaceOperators) -> String {
        all_text(&collapse_region(text(value), space))
    }

    #[test]
    fn test_template_defaults() {
        let tree = collapsed("\n  <b>  a \n  b  </b>\n");
        let mut names = Vec::new();
        template_content(&tree).walk(&mut |e| {
            if let Expression::StringConstant(s) = e {
                names.push(s.value.clone());
            }
        });
        assert_eq!(names, vec!["a\nb"]);
    }

    #[test]
    fn test_pre_preserves() {
        let tree = collapsed("<pre>  a \n  b  </pre>");
        let mut found = Vec::new();
        template_content(&tree).walk(&mut |e| {
            if let Expression::StringConstant(s) = e {
                found.push(s.value.clone());
            }
        });
        assert_eq!(found, vec!["  a \n  b  "]);
    }

    #[test]
    fn test_explicit_operators() {
        let tree = collapsed(r#"<div gxp:ispace="normalize" gxp:espace="preserve"> a  b </div>"#);
        let mut found = Vec::new();
        template_content(&tree).walk(&mut |e| {
            if let Expression::StringConstant(s) = e {
                found.push(s.value.clone());
            }
        });
        assert_eq!(found, vec![" a b "]);
    }

    #[test]
    fn test_runs_around_dynamic_values() {
        let space = SpaceOperators::both(SpaceOperator::Normalize, SpaceOperator::Remove);
        let body = Concatenation::create(
            pos(),
            None,
            vec![
                text("  x  "),
                Expression::native(pos(), MultiLanguageValue::from_default("v")),
                text("\n\n y "),
            ],
        );
        match collapse_region(body, space) {
            Expression::Concatenation(concat) => {
                assert_eq!(concat.values[0].static_string(), Some("x "));
                assert!(matches!(concat.values[1], Expression::Native(_)));
                assert_eq!(concat.values[2].static_string(), Some(" y"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_whitespace_only_region() {
        let space = SpaceOperators::both(SpaceOperator::Collapse, SpaceOperator::Collapse);
        assert_eq!(collapse_str(" \n ", space), "\n");
        assert_eq!(collapse_str(" \n ", SpaceOperators::TEMPLATE), "");
    }

    #[test]
    fn test_nbsp_is_text() {
        assert_eq!(
            collapse_str("\u{a0} a \u{a0}", SpaceOperators::TEMPLATE),
            "\u{a0} a \u{a0}"
        );
    }

    fn operator() -> impl Strategy<Value = SpaceOperator> {
        prop_oneof![
            Just(SpaceOperator::Preserve),
            Just(SpaceOperator::Remove),
            Just(SpaceOperator::Normalize),
            Just(SpaceOperator::Collapse),
        ]
    }

    proptest! {
        #[test]
        fn prop_collapse_is_idempotent(
            value in "[ a\t\nb\u{a0}]{0,24}",
            interior in operator(),
            exterior in operator(),
        ) {
            let space = SpaceOperators::both(interior, exterior);
            let once = collapse_str(&value, space);
            prop_assert_eq!(collapse_str(&once, space), once);
        }

        #[test]
        fn prop_text_is_kept(
            value in "[ a\t\nb\u{a0}]{0,24}",
            interior in operator(),
            exterior in operator(),
        ) {
            let space = SpaceOperators::both(interior, exterior);
            let strip = |s: &str| s.chars().filter(|c| !is_space(*c)).collect::<String>();
            prop_assert_eq!(strip(&collapse_str(&value, space)), strip(&value));
        }

        #[test]
        fn prop_preserve_is_identity(value in "[ a\t\nb]{0,24}") {
            prop_assert_eq!(collapse_str(&value, SpaceOperators::PRESERVING), value);
        }
    }
}
