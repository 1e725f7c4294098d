//! Merging of language specific attribute variants.
//!
//! `java:title="a"` and `cpp:title="b"` on one element describe a single attribute whose
//! value is native code that differs per target language. An untagged `title` of the same
//! local name either joins them as the default (when it is a plain literal) or wins outright
//! (when it is already dynamic, e.g. `expr:title`), in which case every variant conflicts.

use crate::alert::{Alert, AlertKind, AlertSink};
use crate::ast::{AttrNamespace, Attribute, Expression, MultiLanguageValue};
use crate::tree::Node;
use indexmap::IndexMap;

#[derive(Default)]
struct Group {
    untagged: Option<Attribute>,
    variants: Vec<Attribute>,
}

/// Collapses language variants into untagged attributes. Attributes in other namespaces and
/// names without variants pass through unchanged. Output order follows first appearance.
pub fn merge_language_variants(attrs: Vec<Attribute>, sink: &mut dyn AlertSink) -> Vec<Attribute> {
    let mut out_of_scope = Vec::new();
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    // Slots keep other namespaces interleaved with merged groups in source order.
    let mut order: Vec<Slot> = Vec::new();

    for attr in attrs {
        match attr.namespace {
            AttrNamespace::Null | AttrNamespace::Native(_) => {
                if !groups.contains_key(&attr.name) {
                    order.push(Slot::Group(groups.len()));
                }
                let group = groups.entry(attr.name.clone()).or_default();
                if attr.namespace == AttrNamespace::Null {
                    group.untagged = Some(attr);
                } else {
                    group.variants.push(attr);
                }
            }
            _ => {
                order.push(Slot::Other(out_of_scope.len()));
                out_of_scope.push(Some(attr));
            }
        }
    }

    let mut groups: Vec<Option<(String, Group)>> = groups.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(order.len());
    for slot in order {
        match slot {
            Slot::Other(index) => merged.extend(out_of_scope[index].take()),
            Slot::Group(index) => {
                if let Some((name, group)) = groups[index].take() {
                    merged.extend(merge_group(name, group, sink));
                }
            }
        }
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Group(usize),
    Other(usize),
}

fn merge_group(name: String, group: Group, sink: &mut dyn AlertSink) -> Option<Attribute> {
    let Group { untagged, variants } = group;
    if variants.is_empty() {
        return untagged;
    }

    if let Some(untagged) = untagged.as_ref() {
        if untagged.value.static_string().is_none() {
            for variant in &variants {
                sink.add(Alert::new(
                    AlertKind::ConflictingAttributes,
                    variant.position.clone(),
                    format!(
                        "{} conflicts with dynamic {}",
                        variant.display_name(),
                        untagged.display_name()
                    ),
                ));
            }
            return Some(untagged.clone());
        }
    }

    let mut code = MultiLanguageValue::default();
    let mut position = None;
    if let Some(untagged) = &untagged {
        code.default = untagged.value.static_string().map(str::to_string);
        position = Some(untagged.position.clone());
    }
    for variant in variants {
        let AttrNamespace::Native(lang) = variant.namespace else {
            continue;
        };
        let position = position.get_or_insert_with(|| variant.position.clone());
        match variant.value.static_string() {
            Some(value) => {
                code.per_language.insert(lang, value.to_string());
            }
            None => sink.add(Alert::new(
                AlertKind::RequiresStaticContent,
                position.clone(),
                format!("{} must be a literal", variant.display_name()),
            )),
        }
    }
    let position = position?;
    Some(Attribute::new(
        position.clone(),
        AttrNamespace::Null,
        name,
        Expression::native(position, code),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertSetBuilder, SourcePosition};
    use crate::lang::NativeLanguage;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn attr(ns: AttrNamespace, name: &str, value: Expression) -> Attribute {
        Attribute::new(SourcePosition::new("t.gxp", 1, 1), ns, name, value)
    }

    fn text(value: &str) -> Expression {
        Expression::string(SourcePosition::new("t.gxp", 1, 1), None, value)
    }

    #[test]
    fn test_variants_merge_with_literal_default() {
        let mut sink = AlertSetBuilder::new();
        let merged = merge_language_variants(
            vec![
                attr(AttrNamespace::Null, "title", text("t")),
                attr(AttrNamespace::Native(NativeLanguage::Java), "title", text("jt")),
                attr(AttrNamespace::Null, "id", text("x")),
            ],
            &mut sink,
        );
        assert!(sink.is_empty());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "title");
        match &merged[0].value {
            Expression::Native(native) => {
                assert_eq!(native.code.get(NativeLanguage::Java), Some("jt"));
                assert_eq!(native.code.get(NativeLanguage::Cpp), Some("t"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(merged[1].value.static_string(), Some("x"));
    }

    #[test]
    fn test_dynamic_untagged_wins_with_conflicts() {
        let mut sink = AlertSetBuilder::new();
        let dynamic = Expression::native(
            SourcePosition::new("t.gxp", 1, 1),
            MultiLanguageValue::from_default("x"),
        );
        let merged = merge_language_variants(
            vec![
                attr(AttrNamespace::Native(NativeLanguage::Cpp), "href", text("a")),
                attr(AttrNamespace::Null, "href", dynamic.clone()),
                attr(AttrNamespace::Native(NativeLanguage::Java), "href", text("b")),
            ],
            &mut sink,
        );
        let alerts = sink.build();
        assert_eq!(alerts.of_kind(AlertKind::ConflictingAttributes).count(), 2);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, dynamic);
    }

    #[test]
    fn test_variant_without_default() {
        let mut sink = AlertSetBuilder::new();
        let merged = merge_language_variants(
            vec![attr(AttrNamespace::Native(NativeLanguage::JavaScript), "size", text("n"))],
            &mut sink,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].namespace, AttrNamespace::Null);
        assert_eq!(merged[0].name, "size");
    }

    fn namespace() -> impl Strategy<Value = AttrNamespace> {
        prop_oneof![
            Just(AttrNamespace::Null),
            Just(AttrNamespace::Gxp),
            Just(AttrNamespace::Native(NativeLanguage::Java)),
            Just(AttrNamespace::Native(NativeLanguage::Cpp)),
            Just(AttrNamespace::Native(NativeLanguage::JavaScript)),
        ]
    }

    proptest! {
        #[test]
        fn prop_no_variant_survives(
            specs in prop::collection::vec((namespace(), "[abc]", "[xy]{0,2}"), 0..12)
        ) {
            let mut seen = BTreeSet::new();
            let attrs: Vec<Attribute> = specs
                .into_iter()
                .filter(|(ns, name, _)| seen.insert((ns.clone(), name.clone())))
                .map(|(ns, name, value)| attr(ns, &name, text(&value)))
                .collect();
            let names_in: BTreeSet<String> = attrs.iter().map(|a| a.name.clone()).collect();
            let mut sink = AlertSetBuilder::new();
            let merged = merge_language_variants(attrs, &mut sink);

            prop_assert!(sink.is_empty());
            prop_assert!(merged
                .iter()
                .all(|a| !matches!(a.namespace, AttrNamespace::Native(_))));
            let names_out: BTreeSet<String> = merged.iter().map(|a| a.name.clone()).collect();
            prop_assert_eq!(names_in, names_out);
            let mut keys = BTreeSet::new();
            for a in &merged {
                prop_assert!(keys.insert((a.namespace.clone(), a.name.clone())));
            }
        }
    }
}
