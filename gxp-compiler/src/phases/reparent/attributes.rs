//! Attribute lookup with usage tracking.
//!
//! Every read marks the attribute as used. Whatever is never read is reported as unknown
//! once the element has been built, so element builders do not need a list of the
//! attributes they accept.

use super::merge::merge_language_variants;
use crate::alert::{Alert, AlertKind, AlertSink, SourcePosition};
use crate::ast::{
    AttrNamespace, Attribute, Expression, MultiLanguageValue, SpaceOperator, SpaceOperators,
};
use crate::lang::NativeLanguage;
use crate::tree::Node;
use indexmap::IndexMap;

type Key = (AttrNamespace, String);

struct Entry {
    attribute: Attribute,
    used: bool,
}

pub struct AttributeMap {
    position: SourcePosition,
    element: String,
    entries: IndexMap<Key, Entry>,
}

impl AttributeMap {
    pub fn new(position: SourcePosition, element: impl Into<String>) -> Self {
        AttributeMap {
            position,
            element: element.into(),
            entries: IndexMap::new(),
        }
    }

    /// Adds `attribute`. The first of several attributes with the same name wins.
    pub fn add(&mut self, attribute: Attribute, sink: &mut dyn AlertSink) {
        let key = (attribute.namespace.clone(), attribute.name.clone());
        if self.entries.contains_key(&key) {
            sink.add(Alert::new(
                AlertKind::MultiValueAttribute,
                attribute.position.clone(),
                format!(
                    "{} is specified more than once on {}",
                    attribute.display_name(),
                    self.element
                ),
            ));
            return;
        }
        self.entries.insert(
            key,
            Entry {
                attribute,
                used: false,
            },
        );
    }

    /// The attribute itself, marking it used.
    pub fn attribute(&mut self, namespace: &AttrNamespace, name: &str) -> Option<Attribute> {
        let entry = self
            .entries
            .get_mut(&(namespace.clone(), name.to_string()))?;
        entry.used = true;
        Some(entry.attribute.clone())
    }

    pub fn value(&mut self, namespace: &AttrNamespace, name: &str) -> Option<Expression> {
        self.attribute(namespace, name).map(|attr| attr.value)
    }

    /// A required, static, unprefixed attribute.
    pub fn get(&mut self, name: &str, sink: &mut dyn AlertSink) -> Option<String> {
        self.get_in(&AttrNamespace::Null, name, true, sink)
    }

    pub fn get_optional(&mut self, name: &str, sink: &mut dyn AlertSink) -> Option<String> {
        self.get_in(&AttrNamespace::Null, name, false, sink)
    }

    pub fn get_in(
        &mut self,
        namespace: &AttrNamespace,
        name: &str,
        required: bool,
        sink: &mut dyn AlertSink,
    ) -> Option<String> {
        match self.attribute(namespace, name) {
            Some(attr) => static_value(&attr, sink),
            None => {
                if required {
                    self.missing(&format!("{namespace}{name}"), sink);
                }
                None
            }
        }
    }

    /// Native code from `name`, `expr:name` or the per-language `java:name` style variants.
    pub fn expr_value(&mut self, name: &str, sink: &mut dyn AlertSink) -> Option<Expression> {
        self.code_value(name, true, sink)
    }

    pub fn optional_expr_value(
        &mut self,
        name: &str,
        sink: &mut dyn AlertSink,
    ) -> Option<Expression> {
        self.code_value(name, false, sink)
    }

    fn code_value(
        &mut self,
        name: &str,
        required: bool,
        sink: &mut dyn AlertSink,
    ) -> Option<Expression> {
        let untagged = self.attribute(&AttrNamespace::Null, name);
        let variants: Vec<(NativeLanguage, Attribute)> = NativeLanguage::ALL
            .into_iter()
            .filter_map(|lang| {
                self.attribute(&AttrNamespace::Native(lang), name)
                    .map(|attr| (lang, attr))
            })
            .collect();

        if let Some(untagged) = &untagged {
            if untagged.value.static_string().is_none() {
                for (_, variant) in &variants {
                    sink.add(Alert::new(
                        AlertKind::ConflictingAttributes,
                        variant.position.clone(),
                        format!(
                            "{} conflicts with {} on {}",
                            variant.display_name(),
                            untagged.display_name(),
                            self.element
                        ),
                    ));
                }
                return Some(untagged.value.clone());
            }
        }

        let mut code = MultiLanguageValue::default();
        let mut position = None;
        if let Some(untagged) = &untagged {
            code.default = untagged.value.static_string().map(str::to_string);
            position = Some(untagged.position.clone());
        }
        for (lang, variant) in &variants {
            position.get_or_insert_with(|| variant.position.clone());
            if let Some(value) = static_value(variant, sink) {
                code.per_language.insert(*lang, value);
            }
        }
        match position {
            Some(position) if !code.is_empty() => Some(Expression::native(position, code)),
            _ => {
                if required {
                    self.missing(name, sink);
                }
                None
            }
        }
    }

    /// Per-language literals of `name`, as used by `type` attributes.
    pub fn multi_language_value(
        &mut self,
        name: &str,
        sink: &mut dyn AlertSink,
    ) -> MultiLanguageValue {
        let mut value = MultiLanguageValue::default();
        if let Some(untagged) = self.attribute(&AttrNamespace::Null, name) {
            value.default = static_value(&untagged, sink);
        }
        for lang in NativeLanguage::ALL {
            if let Some(variant) = self.attribute(&AttrNamespace::Native(lang), name) {
                if let Some(code) = static_value(&variant, sink) {
                    value.per_language.insert(lang, code);
                }
            }
        }
        value
    }

    /// `"true"` or `"false"`; absent means false.
    pub fn boolean_value(&mut self, name: &str, sink: &mut dyn AlertSink) -> bool {
        let Some(attr) = self.attribute(&AttrNamespace::Null, name) else {
            return false;
        };
        match static_value(&attr, sink).as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                sink.add(Alert::new(
                    AlertKind::InvalidAttributeValue,
                    attr.position.clone(),
                    format!(
                        "'{other}' is not a valid value for {}; use true or false",
                        attr.display_name()
                    ),
                ));
                false
            }
        }
    }

    /// `gxp:ispace` and `gxp:espace`.
    pub fn space_operators(&mut self, sink: &mut dyn AlertSink) -> SpaceOperators {
        let mut operator = |name: &str| {
            let attr = self.attribute(&AttrNamespace::Gxp, name)?;
            let text = static_value(&attr, sink)?;
            match text.parse::<SpaceOperator>() {
                Ok(op) => Some(op),
                Err(message) => {
                    sink.add(Alert::new(
                        AlertKind::InvalidAttributeValue,
                        attr.position.clone(),
                        message,
                    ));
                    None
                }
            }
        };
        let interior = operator("ispace");
        let exterior = operator("espace");
        SpaceOperators { interior, exterior }
    }

    /// Every attribute nobody has read yet, with language variants merged. All of them are
    /// marked used.
    pub fn unused_attributes(&mut self, sink: &mut dyn AlertSink) -> Vec<Attribute> {
        let unused: Vec<Attribute> = self
            .entries
            .values_mut()
            .filter(|entry| !entry.used)
            .map(|entry| {
                entry.used = true;
                entry.attribute.clone()
            })
            .collect();
        merge_language_variants(unused, sink)
    }

    pub fn report_unused(&self, sink: &mut dyn AlertSink) {
        for entry in self.entries.values().filter(|entry| !entry.used) {
            sink.add(Alert::new(
                AlertKind::UnknownAttribute,
                entry.attribute.position.clone(),
                format!(
                    "{} is not a valid attribute of {}",
                    entry.attribute.display_name(),
                    self.element
                ),
            ));
        }
    }

    fn missing(&self, name: &str, sink: &mut dyn AlertSink) {
        sink.add(Alert::new(
            AlertKind::MissingAttribute,
            self.position.clone(),
            format!("{} is missing required attribute '{name}'", self.element),
        ));
    }
}

/// The literal text of an attribute, or a `requires-static-content` alert.
fn static_value(attr: &Attribute, sink: &mut dyn AlertSink) -> Option<String> {
    match attr.value.static_string() {
        Some(text) => Some(text.to_string()),
        None => {
            sink.add(Alert::new(
                AlertKind::RequiresStaticContent,
                attr.position.clone(),
                format!("{} must have a literal value", attr.display_name()),
            ));
            None
        }
    }
}
