//! Output format schemas
//!
//!     A [`Schema`] describes one output content type: which elements exist, which attributes
//!     each element accepts, which doctypes it may declare, and the native type names used when
//!     emitting code for each target language. Schemas are loaded once from declarative
//!     definition files (see [`parser`]) and then shared read-only through `Arc`.
//!
//!     The [`ContentFamily`] of a schema is the seam with the code generators: it decides how
//!     literal text is escaped and which runtime escaping a dynamic value goes through.

pub mod factory;
pub mod parser;

pub use factory::{BuiltinSchemaFactory, FileSchemaFactory, SchemaFactory};

use crate::lang::NativeLanguage;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Escaping category of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFamily {
    Markup,
    Script,
    Style,
    PlainText,
}

impl ContentFamily {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "text/javascript" => ContentFamily::Script,
            "text/css" => ContentFamily::Style,
            "text/plain" => ContentFamily::PlainText,
            _ => ContentFamily::Markup,
        }
    }

    /// Escapes literal template text for this family.
    pub fn escape_static(self, text: &str) -> String {
        match self {
            ContentFamily::Markup => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    match c {
                        '&' => out.push_str("&amp;"),
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        '"' => out.push_str("&quot;"),
                        other => out.push(other),
                    }
                }
                out
            }
            ContentFamily::Script | ContentFamily::Style | ContentFamily::PlainText => {
                text.to_string()
            }
        }
    }
}

/// Structural flags of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementFlag {
    Childless,
    EvilCdata,
    NoEndTag,
    OptionalEndTag,
    Deprecated,
    LooseDtd,
    FramesetDtd,
    InvisibleBody,
    PreserveSpaces,
    NonStandard,
}

impl FromStr for ElementFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "childless" => ElementFlag::Childless,
            "evilcdata" => ElementFlag::EvilCdata,
            "noendtag" => ElementFlag::NoEndTag,
            "optionalendtag" => ElementFlag::OptionalEndTag,
            "deprecated" => ElementFlag::Deprecated,
            "loosedtd" => ElementFlag::LooseDtd,
            "framesetdtd" => ElementFlag::FramesetDtd,
            "invisiblebody" => ElementFlag::InvisibleBody,
            "preservespaces" => ElementFlag::PreserveSpaces,
            "nonstandard" => ElementFlag::NonStandard,
            other => return Err(format!("unknown element flag '{other}'")),
        })
    }
}

/// Flags of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeFlag {
    Boolean,
    Deprecated,
    FramesetDtd,
    LooseDtd,
    Required,
    VisibleText,
    NonStandard,
    InternalOnly,
}

impl FromStr for AttributeFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "boolean" => AttributeFlag::Boolean,
            "deprecated" => AttributeFlag::Deprecated,
            "framesetdtd" => AttributeFlag::FramesetDtd,
            "loosedtd" => AttributeFlag::LooseDtd,
            "required" => AttributeFlag::Required,
            "visibletext" => AttributeFlag::VisibleText,
            "nonstandard" => AttributeFlag::NonStandard,
            "internal_only" => AttributeFlag::InternalOnly,
            other => return Err(format!("unknown attribute flag '{other}'")),
        })
    }
}

/// A document type declaration an element may carry via `gxp:doctype`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: String,
    pub sgml_public_id: Option<String>,
    pub sgml_system_id: Option<String>,
}

impl DocType {
    const XML_DECLARATION: &'static str = "<?xml version=\"1.0\" ?>\n";

    pub fn is_sgml_compatible(&self) -> bool {
        self.sgml_system_id.is_some()
    }

    pub fn to_xml(&self, root_element: &str) -> String {
        format!(
            "{}{}",
            Self::XML_DECLARATION,
            markup(root_element, self.public_id.as_deref(), &self.system_id)
        )
    }

    /// SGML form, if this doctype has one.
    pub fn to_sgml(&self, root_element: &str) -> Option<String> {
        let system_id = self.sgml_system_id.as_deref()?;
        Some(markup(
            &root_element.to_ascii_uppercase(),
            self.sgml_public_id.as_deref(),
            system_id,
        ))
    }
}

fn markup(root: &str, public_id: Option<&str>, system_id: &str) -> String {
    match public_id {
        Some(public_id) => format!("<!DOCTYPE {root} PUBLIC \"{public_id}\" \"{system_id}\">"),
        None => format!("<!DOCTYPE {root} SYSTEM \"{system_id}\">"),
    }
}

/// What an attribute of some element may contain.
#[derive(Debug, Clone)]
pub struct AttributeValidator {
    pub name: String,
    pub content_type: Option<String>,
    pub pattern: Option<Regex>,
    pub flags: BTreeSet<AttributeFlag>,
    pub default_value: Option<String>,
    pub example: Option<String>,
}

impl AttributeValidator {
    pub fn is_flag_set(&self, flag: AttributeFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// True if `value` matches the pattern, or if there is no pattern.
    pub fn is_valid_value(&self, value: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(value))
    }
}

/// What a single output element may contain.
#[derive(Debug, Clone)]
pub struct ElementValidator {
    pub tag_name: String,
    pub flags: BTreeSet<ElementFlag>,
    pub inner_content_type: Option<String>,
    pub doctypes: IndexMap<String, DocType>,
    pub attributes: IndexMap<String, AttributeValidator>,
}

impl ElementValidator {
    pub fn is_flag_set(&self, flag: ElementFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn attribute_validator(&self, name: &str) -> Option<&AttributeValidator> {
        self.attributes.get(name)
    }

    pub fn doctype(&self, name: &str) -> Option<&DocType> {
        self.doctypes.get(name)
    }

    pub fn required_attributes(&self) -> impl Iterator<Item = &AttributeValidator> {
        self.attributes
            .values()
            .filter(|attr| attr.is_flag_set(AttributeFlag::Required))
    }
}

impl PartialEq for ElementValidator {
    fn eq(&self, other: &Self) -> bool {
        self.tag_name == other.tag_name && self.flags == other.flags
    }
}

/// Native type information for one target language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeTypeInfo {
    pub type_name: String,
    pub appender: Option<String>,
    pub imports: Vec<String>,
}

/// A loaded output format.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub namespace_uri: String,
    pub content_type: String,
    pub sgml_content_type: Option<String>,
    pub defaults_to_sgml: bool,
    pub tag_prefix: Option<String>,
    pub native_types: BTreeMap<NativeLanguage, NativeTypeInfo>,
    pub allowed_content_types: Vec<String>,
    pub elements: IndexMap<String, Arc<ElementValidator>>,
}

impl Schema {
    pub fn content_family(&self) -> ContentFamily {
        ContentFamily::from_content_type(&self.content_type)
    }

    pub fn element_validator(&self, tag_name: &str) -> Option<&Arc<ElementValidator>> {
        self.elements.get(tag_name)
    }

    pub fn native_type(&self, lang: NativeLanguage) -> Option<&NativeTypeInfo> {
        self.native_types.get(&lang)
    }

    /// Whether content of schema `other` may appear where this schema is expected.
    pub fn allows(&self, other: &Schema) -> bool {
        self == other
            || self.allowed_content_types.iter().any(|allowed| {
                *allowed == other.content_type
                    || other.sgml_content_type.as_deref() == Some(allowed.as_str())
            })
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.content_type == other.content_type
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.content_type)
    }
}
