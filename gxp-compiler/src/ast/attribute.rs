//! Attributes of semantic nodes and multi-language code values.

use super::expr::Expression;
use crate::alert::SourcePosition;
use crate::lang::NativeLanguage;
use crate::schema::Schema;
use crate::tree::Node;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Where an attribute name lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrNamespace {
    /// Unprefixed, or an `expr:`/`msg:`/`nomsg:` attribute whose value has been converted.
    Null,
    Gxp,
    /// Only meaningful when compiling to this language.
    Native(NativeLanguage),
    /// Any other namespace, kept so it can be reported as unknown.
    Foreign(String),
}

impl fmt::Display for AttrNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrNamespace::Null => Ok(()),
            AttrNamespace::Gxp => f.write_str("gxp:"),
            AttrNamespace::Native(lang) => write!(f, "{lang}:"),
            AttrNamespace::Foreign(uri) => write!(f, "{{{uri}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub position: SourcePosition,
    pub namespace: AttrNamespace,
    pub name: String,
    pub value: Expression,
    /// Emitted only when this predicate holds.
    pub condition: Option<Expression>,
    /// Schema of the value when it differs from the element's, e.g. script in `onclick`.
    pub inner_schema: Option<Arc<Schema>>,
}

impl Attribute {
    pub fn new(
        position: SourcePosition,
        namespace: AttrNamespace,
        name: impl Into<String>,
        value: Expression,
    ) -> Self {
        Attribute {
            position,
            namespace,
            name: name.into(),
            value,
            condition: None,
            inner_schema: None,
        }
    }

    pub fn with_value(self, value: Expression) -> Self {
        Attribute { value, ..self }
    }

    pub fn map_value(self, f: impl FnOnce(Expression) -> Expression) -> Self {
        let value = f(self.value.clone());
        self.with_value(value)
    }
}

impl Node for Attribute {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        format!("'{}{}' attribute", self.namespace, self.name)
    }
}

/// Native code with optional per-language overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MultiLanguageValue {
    pub default: Option<String>,
    pub per_language: BTreeMap<NativeLanguage, String>,
}

impl MultiLanguageValue {
    pub fn from_default(code: impl Into<String>) -> Self {
        MultiLanguageValue {
            default: Some(code.into()),
            per_language: BTreeMap::new(),
        }
    }

    /// The code for `lang`, falling back to the default.
    pub fn get(&self, lang: NativeLanguage) -> Option<&str> {
        self.per_language
            .get(&lang)
            .or(self.default.as_ref())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.per_language.is_empty()
    }
}

impl fmt::Display for MultiLanguageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.default, self.per_language.is_empty()) {
            (Some(code), true) => f.write_str(code),
            _ => {
                let mut parts: Vec<String> = self
                    .per_language
                    .iter()
                    .map(|(lang, code)| format!("{lang}: {code}"))
                    .collect();
                if let Some(code) = &self.default {
                    parts.push(format!("default: {code}"));
                }
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_language_fallback() {
        let mut value = MultiLanguageValue::from_default("x.size()");
        value
            .per_language
            .insert(NativeLanguage::JavaScript, "x.length".into());
        assert_eq!(value.get(NativeLanguage::Java), Some("x.size()"));
        assert_eq!(value.get(NativeLanguage::JavaScript), Some("x.length"));

        let mut only_cpp = MultiLanguageValue::default();
        assert!(only_cpp.is_empty());
        only_cpp.per_language.insert(NativeLanguage::Cpp, "n".into());
        assert!(!only_cpp.is_empty());
        assert_eq!(only_cpp.get(NativeLanguage::Java), None);
    }
}
