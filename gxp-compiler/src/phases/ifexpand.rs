//! Rewrites `gxp:if` / `gxp:elif` / `gxp:else` into `gxp:cond` / `gxp:clause`.
//!
//! `elif` and `else` are markers: everything after one, up to the next marker or the end of
//! the `if`, becomes the body of a new clause. The `if`'s own attributes (its `cond`) go to
//! the first clause; an `elif` carries the `cond` of the clause it opens and an `else` opens
//! a clause without one, which the reparenter turns into the fallback branch.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink};
use crate::parse::{ElementData, GxpElement, GxpKind, NullElement, ParseTree, ParsedElement};
use crate::tree::{Forest, Node};

pub fn expand(tree: ParseTree) -> ParseTree {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    let roots = roots
        .into_iter()
        .map(|root| expand_element(root, &mut sink))
        .collect();
    Forest::new(position, sink.build(), roots)
}

fn expand_element(element: ParsedElement, sink: &mut dyn AlertSink) -> ParsedElement {
    match element {
        ParsedElement::Gxp(GxpElement {
            kind: GxpKind::If,
            data,
        }) => expand_if(data, sink),
        ParsedElement::Gxp(GxpElement {
            kind: kind @ (GxpKind::Elif | GxpKind::Else),
            data,
        }) => {
            sink.add(Alert::new(
                AlertKind::BadNodePlacement,
                data.position.clone(),
                format!("<{}> is only allowed inside <{}>", kind, GxpKind::If),
            ));
            ParsedElement::Null(NullElement {
                position: data.position,
                qualified_name: data.qualified_name,
            })
        }
        mut other => {
            if let Some(data) = other.data_mut() {
                expand_children(data, sink);
            }
            other
        }
    }
}

fn expand_children(data: &mut ElementData, sink: &mut dyn AlertSink) {
    let children = std::mem::take(&mut data.children);
    data.children = children
        .into_iter()
        .map(|child| expand_element(child, sink))
        .collect();
}

/// `gxp:if` becomes `gxp:clause`, keeping the prefix the source used.
fn sibling_name(qualified_name: &str, local: GxpKind) -> String {
    match qualified_name.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{}", local.local_name()),
        None => local.local_name().to_string(),
    }
}

fn expand_if(mut data: ElementData, sink: &mut dyn AlertSink) -> ParsedElement {
    let clause_name = sibling_name(&data.qualified_name, GxpKind::Clause);

    let mut clauses = Vec::new();
    let mut current = ElementData {
        position: data.position.clone(),
        qualified_name: clause_name.clone(),
        attributes: std::mem::take(&mut data.attributes),
        children: Vec::new(),
    };
    let mut seen_else = false;

    for child in std::mem::take(&mut data.children) {
        let marker = match child {
            ParsedElement::Gxp(GxpElement {
                kind: kind @ (GxpKind::Elif | GxpKind::Else),
                data,
            }) => (kind, data),
            other => {
                current.children.push(expand_element(other, sink));
                continue;
            }
        };
        let (kind, marker) = marker;
        for misplaced in &marker.children {
            sink.add(Alert::new(
                AlertKind::BadNodePlacement,
                misplaced.position().clone(),
                format!(
                    "{} is not allowed inside <{kind}>; it is a marker and has no body",
                    misplaced.display_name()
                ),
            ));
        }
        if seen_else {
            let (alert_kind, message) = match kind {
                GxpKind::Elif => (AlertKind::ElifAfterElse, "<gxp:elif> follows <gxp:else>"),
                _ => (AlertKind::DoubleElse, "<gxp:if> has more than one <gxp:else>"),
            };
            sink.add(Alert::new(alert_kind, marker.position, message));
            continue;
        }
        seen_else = kind == GxpKind::Else;
        let attributes = match kind {
            GxpKind::Elif => marker.attributes,
            _ => {
                for attr in &marker.attributes {
                    sink.add(Alert::new(
                        AlertKind::UnknownAttribute,
                        attr.position.clone(),
                        format!("{} is not a valid attribute of <{kind}>", attr.display_name()),
                    ));
                }
                Vec::new()
            }
        };
        let next = ElementData {
            position: marker.position,
            qualified_name: clause_name.clone(),
            attributes,
            children: Vec::new(),
        };
        clauses.push(clause(std::mem::replace(&mut current, next)));
    }
    clauses.push(clause(current));

    ParsedElement::Gxp(GxpElement {
        kind: GxpKind::Cond,
        data: ElementData {
            position: data.position,
            qualified_name: sibling_name(&data.qualified_name, GxpKind::Cond),
            attributes: Vec::new(),
            children: clauses,
        },
    })
}

fn clause(data: ElementData) -> ParsedElement {
    ParsedElement::Gxp(GxpElement {
        kind: GxpKind::Clause,
        data,
    })
}
