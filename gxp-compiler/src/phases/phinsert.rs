//! Placeholder insertion for `gxp:ph` shorthands.
//!
//! `<gxp:eval expr="x" gxp:ph="name"/>` is shorthand for wrapping the value in a
//! `<gxp:ph name="name"/>` ... `<gxp:eph/>` pair. On an output element the pair surrounds
//! the whole element when its content is blank; otherwise the start and end tags become two
//! placeholders, `name_start` and `name_end`, and the content stays translatable text.

use crate::alert::SourcePosition;
use crate::ast::{
    Concatenation, Expression, NativeExpression, OutputElement, PlaceholderEnd, PlaceholderStart,
    SemanticTree,
};
use crate::error::Result;
use crate::schema::Schema;
use crate::tree::Forest;
use std::sync::Arc;

pub fn insert_placeholders(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let roots = roots
        .into_iter()
        .map(|root| root.map_content(|content, _| insert(content)))
        .collect();
    Ok(Forest::new(position, alerts, roots))
}

fn insert(expr: Expression) -> Expression {
    match expr {
        Expression::Native(native) if native.ph_name.is_some() => {
            let position = native.position.clone();
            let name = native.ph_name.clone().unwrap_or_default();
            Concatenation::create(
                position.clone(),
                None,
                vec![
                    start(&position, None, name),
                    Expression::Native(NativeExpression {
                        ph_name: None,
                        ..native
                    }),
                    end(&position, None),
                ],
            )
        }
        Expression::OutputElement(element) if element.ph_name.is_some() => wrap_element(element),
        other => other.map_children(insert),
    }
}

fn wrap_element(element: OutputElement) -> Expression {
    let position = element.position.clone();
    let schema = Some(element.schema.clone());
    let name = element.ph_name.clone().unwrap_or_default();
    if element.content.is_whitespace_only() {
        return Concatenation::create(
            position.clone(),
            schema.clone(),
            vec![
                start(&position, schema.clone(), name),
                Expression::OutputElement(element),
                end(&position, schema),
            ],
        );
    }

    let element = match insert(Expression::OutputElement(OutputElement {
        ph_name: None,
        ..element
    })) {
        Expression::OutputElement(element) => element,
        other => return other,
    };
    let content = Concatenation::create(
        position.clone(),
        None,
        vec![
            end(&position, schema.clone()),
            *element.content,
            start(&position, schema.clone(), format!("{name}_end")),
        ],
    );
    Concatenation::create(
        position.clone(),
        schema.clone(),
        vec![
            start(&position, schema.clone(), format!("{name}_start")),
            Expression::OutputElement(OutputElement {
                content: Box::new(content),
                ..element
            }),
            end(&position, schema),
        ],
    )
}

fn start(position: &SourcePosition, schema: Option<Arc<Schema>>, name: String) -> Expression {
    Expression::PlaceholderStart(PlaceholderStart {
        position: position.clone(),
        schema,
        name,
        example: None,
    })
}

fn end(position: &SourcePosition, schema: Option<Arc<Schema>>) -> Expression {
    Expression::PlaceholderEnd(PlaceholderEnd {
        position: position.clone(),
        schema,
    })
}
