//! Shared fixtures for phase tests.

use super::bind::{bind, CallableResolver};
use super::collapse::collapse;
use super::escape::escape;
use super::ifexpand;
use super::phinsert::insert_placeholders;
use super::reparent::Reparenter;
use crate::ast::{Callable, Expression, Root, SemanticTree, TemplateName};
use crate::parse::Parser;
use crate::schema::BuiltinSchemaFactory;
use std::sync::Arc;

pub const GXP_NS: &str =
    r#"xmlns:gxp="http://google.com/2001/gxp" xmlns="http://www.w3.org/1999/xhtml""#;

pub fn reparent(name: &str, source: &str) -> SemanticTree {
    let schemas = BuiltinSchemaFactory::new().unwrap();
    let file = format!("{}.gxp", name.replace('.', "/"));
    let parsed = ifexpand::expand(Parser::new(&schemas).parse(&file, source));
    let expected = TemplateName::parse(name).unwrap();
    Reparenter::new(&schemas, expected).reparent(parsed).unwrap()
}

/// Wraps `body` in a `com.example.T` template with the gxp, xhtml and call namespaces.
pub fn template_source(body: &str) -> String {
    format!(
        r#"<gxp:template name="com.example.T" {GXP_NS} xmlns:call="http://google.com/2001/gxp/call">{body}</gxp:template>"#
    )
}

pub fn nothing_callable() -> impl CallableResolver {
    |_: &TemplateName| -> Option<Arc<Callable>> { None }
}

pub fn bound(body: &str) -> SemanticTree {
    bind(reparent("com.example.T", &template_source(body)), &nothing_callable())
        .unwrap()
        .tree
}

pub fn collapsed(body: &str) -> SemanticTree {
    collapse(bound(body)).unwrap()
}

pub fn escaped(body: &str) -> SemanticTree {
    escape(insert_placeholders(collapsed(body)).unwrap()).unwrap()
}

pub fn template_content(tree: &SemanticTree) -> &Expression {
    match tree.root() {
        Some(Root::Template(template)) => &template.content,
        other => panic!("expected a template, got {other:?}"),
    }
}

/// Concatenated text of every string constant under `expr`, in order.
pub fn all_text(expr: &Expression) -> String {
    let mut text = String::new();
    expr.walk(&mut |e| {
        if let Some(s) = e.static_string() {
            text.push_str(s);
        }
    });
    text
}
