//! Schema definition loader
//!
//! A definition is a small XML document:
//!
//! ```text
//! <schema name="xhtml" namespace="http://www.w3.org/1999/xhtml" content-type="text/html"
//!         java-type="..." java-appender="..." java-imports="..." cpp-type="..." ...>
//!   <doctype name="strict" public-id="..." system-id="..."/>
//!   <pattern name="Number" regex="[0-9]+"/>
//!   <element name="br" flags="noendtag childless"/>
//!   <attribute name="width" elements="img table" pattern="Number"/>
//! </schema>
//! ```
//!
//! Every `<element>` must precede the first `<attribute>`, since attributes are attached to the
//! elements they name (or, with `except-elements`, to every element declared so far but the
//! excluded ones). Lists are whitespace separated.

use super::{
    AttributeFlag, AttributeValidator, DocType, ElementFlag, ElementValidator, NativeTypeInfo,
    Schema,
};
use crate::error::SchemaError;
use crate::lang::NativeLanguage;
use indexmap::IndexMap;
use regex::Regex;
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Parses one schema definition. `source_name` is only used in error messages.
pub fn parse_schema(source_name: &str, text: &str) -> Result<Schema, SchemaError> {
    let doc = Document::parse(text).map_err(|e| SchemaError::Syntax {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;
    let reader = DefinitionReader {
        source_name,
        doc: &doc,
    };
    reader.read(doc.root_element())
}

struct DefinitionReader<'a, 'input> {
    source_name: &'a str,
    doc: &'a Document<'input>,
}

/// Attributes of one definition element, consumed as they are read.
struct Attrs<'n> {
    element: String,
    line: u32,
    values: HashMap<&'n str, &'n str>,
}

impl<'n> Attrs<'n> {
    fn take(&mut self, name: &str) -> Option<String> {
        self.values.remove(name).map(str::to_string)
    }

    fn take_list(&mut self, name: &str) -> Vec<String> {
        self.take(name)
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl DefinitionReader<'_, '_> {
    fn read(&self, root: Node) -> Result<Schema, SchemaError> {
        if root.tag_name().name() != "schema" {
            let found = root.tag_name().name();
            return Err(self.invalid(root, format!("expected <schema>, found <{found}>")));
        }
        let mut attrs = self.attrs(root);
        let name = self.require(&mut attrs, "name")?;
        let content_type = self.require(&mut attrs, "content-type")?;
        let namespace_uri = self.require(&mut attrs, "namespace")?;
        let tag_prefix = attrs.take("tag-prefix");
        let mut native_types = BTreeMap::new();
        for lang in NativeLanguage::ALL {
            let prefix = lang.name();
            let type_name = attrs.take(&format!("{prefix}-type"));
            let appender = attrs.take(&format!("{prefix}-appender"));
            let imports = attrs.take_list(&format!("{prefix}-imports"));
            if let Some(type_name) = type_name {
                native_types.insert(
                    lang,
                    NativeTypeInfo {
                        type_name,
                        appender,
                        imports,
                    },
                );
            }
        }
        let defaults_to_sgml = attrs.take("default-to-sgml").as_deref() == Some("true");
        let sgml_content_type = attrs.take("sgml-content-type");
        let allowed_content_types = attrs.take_list("allowed-content-types");
        self.no_more(attrs)?;

        let mut doctypes: HashMap<String, DocType> = HashMap::new();
        let mut patterns: HashMap<String, String> = HashMap::new();
        let mut elements: IndexMap<String, ElementValidator> = IndexMap::new();
        let mut saw_attributes = false;

        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "doctype" => {
                    let doctype = self.doctype(child)?;
                    doctypes.insert(doctype.name.clone(), doctype);
                }
                "pattern" => {
                    let mut attrs = self.attrs(child);
                    let pattern_name = self.require(&mut attrs, "name")?;
                    let regex = self.require(&mut attrs, "regex")?;
                    self.no_more(attrs)?;
                    patterns.insert(pattern_name, regex);
                }
                "element" => {
                    if saw_attributes {
                        return Err(self.invalid(child, "<element> cannot appear after <attribute>"));
                    }
                    let element = self.element(child, &doctypes)?;
                    elements.insert(element.tag_name.clone(), element);
                }
                "attribute" => {
                    saw_attributes = true;
                    self.attribute(child, &patterns, &mut elements)?;
                }
                other => {
                    return Err(self.invalid(child, format!("unrecognized tag <{other}>")));
                }
            }
        }

        Ok(Schema {
            name,
            namespace_uri,
            content_type,
            sgml_content_type,
            defaults_to_sgml,
            tag_prefix,
            native_types,
            allowed_content_types,
            elements: elements
                .into_iter()
                .map(|(name, element)| (name, Arc::new(element)))
                .collect(),
        })
    }

    fn doctype(&self, node: Node) -> Result<DocType, SchemaError> {
        let mut attrs = self.attrs(node);
        let name = self.require(&mut attrs, "name")?;
        let public_id = attrs.take("public-id");
        let system_id = self.require(&mut attrs, "system-id")?;
        let sgml_public_id = attrs.take("sgml-public-id");
        let sgml_system_id = attrs.take("sgml-system-id");
        self.no_more(attrs)?;
        if sgml_public_id.is_some() && sgml_system_id.is_none() {
            return Err(self.invalid(node, "sgml-public-id requires sgml-system-id"));
        }
        Ok(DocType {
            name,
            public_id,
            system_id,
            sgml_public_id,
            sgml_system_id,
        })
    }

    fn element(
        &self,
        node: Node,
        doctypes: &HashMap<String, DocType>,
    ) -> Result<ElementValidator, SchemaError> {
        let mut attrs = self.attrs(node);
        let tag_name = self.require(&mut attrs, "name")?;
        let flags = attrs
            .take_list("flags")
            .iter()
            .map(|flag| flag.parse::<ElementFlag>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|message| self.invalid(node, message))?;
        let inner_content_type = attrs.take("content");
        let mut element_doctypes = IndexMap::new();
        for doctype_name in attrs.take_list("doctypes") {
            let doctype = doctypes.get(&doctype_name).ok_or_else(|| {
                self.invalid(
                    node,
                    format!("can't find definition for doctype named \"{doctype_name}\""),
                )
            })?;
            element_doctypes.insert(doctype_name, doctype.clone());
        }
        self.no_more(attrs)?;
        Ok(ElementValidator {
            tag_name,
            flags,
            inner_content_type,
            doctypes: element_doctypes,
            attributes: IndexMap::new(),
        })
    }

    fn attribute(
        &self,
        node: Node,
        patterns: &HashMap<String, String>,
        elements: &mut IndexMap<String, ElementValidator>,
    ) -> Result<(), SchemaError> {
        let mut attrs = self.attrs(node);
        let name = self.require(&mut attrs, "name")?;
        let element_names = attrs.take_list("elements");
        let except_names = attrs.take_list("except-elements");
        let content_type = attrs.take("content");
        let pattern_name = attrs.take("pattern");
        let regex = attrs.take("regex");
        let flags = attrs
            .take_list("flags")
            .iter()
            .map(|flag| flag.parse::<AttributeFlag>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|message| self.invalid(node, message))?;
        let default_value = attrs.take("default");
        let example = attrs.take("example");
        self.no_more(attrs)?;

        let regex = match (pattern_name, regex) {
            (Some(_), Some(_)) => {
                return Err(self.invalid(node, "can't specify both pattern and regex"));
            }
            (Some(pattern_name), None) => Some(patterns.get(&pattern_name).cloned().ok_or_else(
                || self.invalid(node, format!("unknown pattern \"{pattern_name}\"")),
            )?),
            (None, regex) => regex,
        };
        // Values must match the whole pattern.
        let pattern = regex
            .map(|regex| Regex::new(&format!("^(?:{regex})$")))
            .transpose()
            .map_err(|e| self.invalid(node, e.to_string()))?;

        let validator = AttributeValidator {
            name: name.clone(),
            content_type,
            pattern,
            flags,
            default_value,
            example,
        };

        if !element_names.is_empty() && !except_names.is_empty() {
            return Err(self.invalid(node, "can't specify both elements and except-elements"));
        }
        if element_names.is_empty() {
            for (element_name, element) in elements.iter_mut() {
                if !except_names.contains(element_name) {
                    element.attributes.insert(name.clone(), validator.clone());
                }
            }
        } else {
            for element_name in element_names {
                let element = elements.get_mut(&element_name).ok_or_else(|| {
                    self.invalid(node, format!("attribute refers to undeclared element <{element_name}>"))
                })?;
                element.attributes.insert(name.clone(), validator.clone());
            }
        }
        Ok(())
    }

    fn attrs<'n>(&self, node: Node<'n, '_>) -> Attrs<'n> {
        Attrs {
            element: node.tag_name().name().to_string(),
            line: self.line(node),
            values: node
                .attributes()
                .map(|attr| (attr.name(), attr.value()))
                .collect(),
        }
    }

    fn require(&self, attrs: &mut Attrs, name: &str) -> Result<String, SchemaError> {
        attrs.take(name).ok_or_else(|| SchemaError::MissingAttribute {
            source_name: self.source_name.to_string(),
            line: attrs.line,
            element: attrs.element.clone(),
            attribute: name.to_string(),
        })
    }

    fn no_more(&self, attrs: Attrs) -> Result<(), SchemaError> {
        let mut leftover: Vec<_> = attrs.values.keys().copied().collect();
        if leftover.is_empty() {
            return Ok(());
        }
        leftover.sort_unstable();
        Err(SchemaError::Invalid {
            source_name: self.source_name.to_string(),
            line: attrs.line,
            message: format!(
                "<{}> has unknown attribute(s): {}",
                attrs.element,
                leftover.join(", ")
            ),
        })
    }

    fn invalid(&self, node: Node, message: impl Into<String>) -> SchemaError {
        SchemaError::Invalid {
            source_name: self.source_name.to_string(),
            line: self.line(node),
            message: message.into(),
        }
    }

    fn line(&self, node: Node) -> u32 {
        self.doc.text_pos_at(node.range().start).row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ContentFamily;

    const SMALL: &str = r#"<schema name="tiny" namespace="urn:tiny" content-type="text/html"
        java-type="TinyClosure" java-imports="a.B c.D" allowed-content-types="text/plain">
      <doctype name="basic" public-id="-//T//DTD Tiny//EN" system-id="tiny.dtd"/>
      <pattern name="Number" regex="[0-9]+"/>
      <element name="box" doctypes="basic"/>
      <element name="br" flags="noendtag childless"/>
      <element name="pre" flags="preservespaces"/>
      <attribute name="width" elements="box" pattern="Number" example="10"/>
      <attribute name="id" except-elements="br"/>
      <attribute name="hidden" elements="box" flags="boolean"/>
    </schema>"#;

    #[test]
    fn test_parses_schema_attributes() {
        let schema = parse_schema("tiny.xml", SMALL).unwrap();
        assert_eq!(schema.name, "tiny");
        assert_eq!(schema.namespace_uri, "urn:tiny");
        assert_eq!(schema.content_family(), ContentFamily::Markup);
        let java = schema.native_type(NativeLanguage::Java).unwrap();
        assert_eq!(java.type_name, "TinyClosure");
        assert_eq!(java.imports, vec!["a.B", "c.D"]);
        assert!(schema.native_type(NativeLanguage::Cpp).is_none());
        assert_eq!(schema.allowed_content_types, vec!["text/plain"]);
    }

    #[test]
    fn test_attributes_attach_to_named_and_excepted_elements() {
        let schema = parse_schema("tiny.xml", SMALL).unwrap();
        let box_el = schema.element_validator("box").unwrap();
        let br = schema.element_validator("br").unwrap();
        let pre = schema.element_validator("pre").unwrap();

        assert!(box_el.attribute_validator("width").is_some());
        assert!(box_el.attribute_validator("id").is_some());
        assert!(pre.attribute_validator("id").is_some());
        assert!(br.attribute_validator("id").is_none());
        assert!(br.is_flag_set(ElementFlag::NoEndTag));
        assert!(box_el.doctype("basic").is_some());
    }

    #[test]
    fn test_pattern_matches_whole_value() {
        let schema = parse_schema("tiny.xml", SMALL).unwrap();
        let width = schema
            .element_validator("box")
            .and_then(|el| el.attribute_validator("width"))
            .unwrap();
        assert!(width.is_valid_value("120"));
        assert!(!width.is_valid_value("120px"));
        assert_eq!(width.example.as_deref(), Some("10"));
    }

    #[test]
    fn test_element_after_attribute_is_rejected() {
        let text = r#"<schema name="x" namespace="urn:x" content-type="text/html">
          <element name="a"/>
          <attribute name="b"/>
          <element name="c"/>
        </schema>"#;
        let err = parse_schema("x.xml", text).unwrap_err();
        assert!(err.to_string().contains("cannot appear after <attribute>"));
    }

    #[test]
    fn test_missing_required_attribute() {
        let err = parse_schema("x.xml", r#"<schema name="x" content-type="text/html"/>"#)
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingAttribute {
                source_name: "x.xml".into(),
                line: 1,
                element: "schema".into(),
                attribute: "namespace".into(),
            }
        );
    }

    #[test]
    fn test_unknown_definition_attribute() {
        let text = r#"<schema name="x" namespace="urn:x" content-type="text/html" colour="red"/>"#;
        let err = parse_schema("x.xml", text).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }
}
