//! Internationalization check.
//!
//! Visible text in markup that is not inside a `<gxp:msg>` cannot be translated. The check
//! runs over the whitespace-collapsed tree, where text is still unescaped, and adds its
//! warnings to the pivoted tree.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink};
use crate::ast::{Callee, Expression, Root, SemanticTree, Type};
use crate::schema::{AttributeFlag, ContentFamily, ElementFlag};
use crate::tree::{Forest, Node};

pub fn check(collapsed: &SemanticTree, pivoted: SemanticTree) -> SemanticTree {
    let (position, alerts, roots) = pivoted.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    for root in collapsed.roots() {
        if let Root::Template(template) = root {
            let mut checker = Checker {
                sink: &mut sink,
                enabled: true,
                inside_nomsg: false,
            };
            for param in &template.parameters {
                if let Some(default) = &param.default {
                    checker.enabled = translatable(&param.ty);
                    checker.visit(default);
                }
            }
            checker.enabled = template.schema.content_family() == ContentFamily::Markup;
            checker.visit(&template.content);
        }
    }
    Forest::new(position, sink.build(), roots)
}

/// Whether text of this type is shown to users: anything but non-markup content.
fn translatable(ty: &Type) -> bool {
    match ty.content_schema() {
        Some(schema) => schema.content_family() == ContentFamily::Markup,
        None => true,
    }
}

fn is_locale_independent(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{a0}')
}

struct Checker<'a> {
    sink: &'a mut dyn AlertSink,
    enabled: bool,
    inside_nomsg: bool,
}

impl Checker<'_> {
    /// Runs `f` with `enabled` set, restoring the previous value afterwards.
    fn with_enabled(&mut self, enabled: bool, f: impl FnOnce(&mut Self)) {
        let saved = self.enabled;
        self.enabled = enabled;
        f(self);
        self.enabled = saved;
    }

    fn visit(&mut self, expr: &Expression) {
        match expr {
            Expression::StringConstant(text) => {
                if self.enabled && !is_locale_independent(&text.value) {
                    self.sink.add(Alert::new(
                        AlertKind::UnextractableContent,
                        text.position.clone(),
                        format!("{} is not inside a <gxp:msg> and cannot be translated", expr.display_name()),
                    ));
                }
            }
            Expression::Abbr(abbr) => {
                let enabled = self.enabled && translatable(&abbr.ty);
                self.with_enabled(enabled, |c| c.visit(&abbr.value));
                self.visit(&abbr.body);
            }
            Expression::Call(call) => {
                let callable = match &call.callee {
                    Callee::Bound(callable) => Some(callable.clone()),
                    Callee::Unbound(_) => None,
                };
                for (name, argument) in &call.arguments {
                    let shown = callable
                        .as_ref()
                        .and_then(|c| c.parameter(name))
                        .map_or(true, |param| translatable(&param.ty));
                    let enabled = !self.inside_nomsg && shown;
                    self.with_enabled(enabled, |c| {
                        c.visit(&argument.value);
                        if let Some(condition) = &argument.condition {
                            c.visit(condition);
                        }
                    });
                }
            }
            Expression::OutputElement(element) => {
                for attr in &element.attributes {
                    let visible = element
                        .validator
                        .attribute_validator(&attr.name)
                        .is_some_and(|v| v.is_flag_set(AttributeFlag::VisibleText));
                    self.with_enabled(!self.inside_nomsg && visible, |c| c.visit(&attr.value));
                }
                let enabled =
                    self.enabled && !element.validator.is_flag_set(ElementFlag::InvisibleBody);
                self.with_enabled(enabled, |c| c.visit(&element.content));
            }
            Expression::Message(message) => {
                self.with_enabled(false, |c| c.visit(&message.content));
            }
            Expression::NoMessage(nomsg) => {
                let saved = self.inside_nomsg;
                self.inside_nomsg = true;
                self.with_enabled(false, |c| c.visit(&nomsg.content));
                self.inside_nomsg = saved;
            }
            // text between a placeholder's markers is not part of the translated message
            Expression::PlaceholderStart(_) => self.enabled = true,
            Expression::PlaceholderEnd(_) => self.enabled = false,
            other => {
                for child in other.children() {
                    self.visit(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::flatten::flatten;
    use crate::phases::pivot::pivot;
    use crate::phases::testing::collapsed;
    use crate::phases::validate::validate;
    use crate::phases::{escape::escape, phinsert::insert_placeholders};

    fn checked(body: &str) -> SemanticTree {
        let collapsed = collapsed(body);
        let escaped = escape(insert_placeholders(collapsed.clone()).unwrap()).unwrap();
        let pivoted = pivot(flatten(validate(escaped).unwrap()).unwrap()).unwrap();
        check(&collapsed, pivoted)
    }

    fn unextractable(body: &str) -> usize {
        checked(body)
            .alerts()
            .of_kind(AlertKind::UnextractableContent)
            .count()
    }

    #[test]
    fn test_text_outside_message() {
        assert_eq!(unextractable("<b>Hello</b>"), 1);
        assert_eq!(unextractable("<gxp:msg><b>Hello</b></gxp:msg>"), 0);
        assert_eq!(unextractable("<gxp:nomsg>Hello</gxp:nomsg>"), 0);
    }

    #[test]
    fn test_whitespace_and_nbsp_are_fine() {
        assert_eq!(unextractable("<b> \u{a0} </b>"), 0);
        assert_eq!(unextractable("<b>&#160;</b>"), 0);
    }

    #[test]
    fn test_attributes() {
        assert_eq!(unextractable(r#"<img src="a.png" alt="A picture"/>"#), 1);
        assert_eq!(unextractable(r#"<div class="box" dir="ltr"/>"#), 0);
    }

    #[test]
    fn test_invisible_body() {
        assert_eq!(unextractable("<script>var x = 'Hello';</script>"), 0);
    }

    #[test]
    fn test_warning_is_added_to_pivoted_alerts() {
        let tree = checked("Hello");
        let alert = tree
            .alerts()
            .of_kind(AlertKind::UnextractableContent)
            .next()
            .unwrap();
        assert_eq!(alert.severity(), crate::alert::Severity::Warning);
    }
}
