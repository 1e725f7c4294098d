//! Schema lookup
//!
//! Templates reach schemas in two ways: an element's namespace URI selects the schema that
//! validates it, and a `content-type` attribute selects the schema a template, message or
//! parameter produces. Both lookups go through [`SchemaFactory`].

use super::parser::parse_schema;
use super::Schema;
use crate::error::{Error, Result, SchemaError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("xhtml.xml", include_str!("../../schemas/xhtml.xml")),
    ("text.xml", include_str!("../../schemas/text.xml")),
    ("css.xml", include_str!("../../schemas/css.xml")),
    ("javascript.xml", include_str!("../../schemas/javascript.xml")),
];

/// Read-only access to loaded schemas.
pub trait SchemaFactory: Send + Sync {
    fn from_namespace(&self, namespace_uri: &str) -> Option<Arc<Schema>>;

    fn from_content_type(&self, content_type: &str) -> Option<Arc<Schema>>;
}

#[derive(Debug, Default)]
struct SchemaIndex {
    by_namespace: HashMap<String, Arc<Schema>>,
    by_content_type: HashMap<String, Arc<Schema>>,
}

impl SchemaIndex {
    fn insert(&mut self, schema: Schema) {
        let schema = Arc::new(schema);
        self.by_namespace
            .insert(schema.namespace_uri.clone(), schema.clone());
        if let Some(sgml) = &schema.sgml_content_type {
            self.by_content_type
                .entry(sgml.clone())
                .or_insert_with(|| schema.clone());
        }
        self.by_content_type
            .insert(schema.content_type.clone(), schema);
    }
}

/// The schemas compiled into the library: XHTML, plain text, CSS and JavaScript.
#[derive(Debug)]
pub struct BuiltinSchemaFactory {
    index: SchemaIndex,
}

impl BuiltinSchemaFactory {
    pub fn new() -> std::result::Result<Self, SchemaError> {
        let mut index = SchemaIndex::default();
        for (name, text) in BUILTIN_DEFINITIONS {
            index.insert(parse_schema(name, text)?);
        }
        Ok(BuiltinSchemaFactory { index })
    }
}

impl SchemaFactory for BuiltinSchemaFactory {
    fn from_namespace(&self, namespace_uri: &str) -> Option<Arc<Schema>> {
        self.index.by_namespace.get(namespace_uri).cloned()
    }

    fn from_content_type(&self, content_type: &str) -> Option<Arc<Schema>> {
        self.index.by_content_type.get(content_type).cloned()
    }
}

/// Schemas loaded from definition files, consulted before a fallback factory.
pub struct FileSchemaFactory {
    index: SchemaIndex,
    fallback: Box<dyn SchemaFactory>,
}

impl FileSchemaFactory {
    pub fn load<P: AsRef<Path>>(paths: &[P], fallback: Box<dyn SchemaFactory>) -> Result<Self> {
        let mut index = SchemaIndex::default();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, &e))?;
            let schema = parse_schema(&path.display().to_string(), &text)?;
            tracing::debug!(schema = %schema.name, path = %path.display(), "loaded schema definition");
            index.insert(schema);
        }
        Ok(FileSchemaFactory { index, fallback })
    }
}

impl SchemaFactory for FileSchemaFactory {
    fn from_namespace(&self, namespace_uri: &str) -> Option<Arc<Schema>> {
        self.index
            .by_namespace
            .get(namespace_uri)
            .cloned()
            .or_else(|| self.fallback.from_namespace(namespace_uri))
    }

    fn from_content_type(&self, content_type: &str) -> Option<Arc<Schema>> {
        self.index
            .by_content_type
            .get(content_type)
            .cloned()
            .or_else(|| self.fallback.from_content_type(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlag, ContentFamily, ElementFlag};
    use std::fs;

    #[test]
    fn test_builtin_schemas_load() {
        let factory = BuiltinSchemaFactory::new().unwrap();
        let html = factory.from_content_type("text/html").unwrap();
        assert_eq!(html.name, "xhtml");
        assert_eq!(
            factory
                .from_namespace("http://www.w3.org/1999/xhtml")
                .unwrap()
                .name,
            "xhtml"
        );
        for content_type in ["text/plain", "text/css", "text/javascript"] {
            assert!(factory.from_content_type(content_type).is_some(), "{content_type}");
        }
        assert!(factory.from_content_type("application/pdf").is_none());
    }

    #[test]
    fn test_builtin_xhtml_shape() {
        let factory = BuiltinSchemaFactory::new().unwrap();
        let html = factory.from_content_type("text/html").unwrap();
        let img = html.element_validator("img").unwrap();
        assert!(img.is_flag_set(ElementFlag::NoEndTag));
        assert!(img
            .attribute_validator("alt")
            .unwrap()
            .is_flag_set(AttributeFlag::Required));
        let script = html.element_validator("script").unwrap();
        assert_eq!(script.inner_content_type.as_deref(), Some("text/javascript"));
        assert!(html
            .element_validator("html")
            .unwrap()
            .doctype("strict")
            .is_some());

        let text = factory.from_content_type("text/plain").unwrap();
        assert!(html.allows(&text));
        assert!(!text.allows(&html));
        assert_eq!(text.content_family(), ContentFamily::PlainText);
    }

    #[test]
    fn test_file_factory_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svg.xml");
        fs::write(
            &path,
            r#"<schema name="svg" namespace="http://www.w3.org/2000/svg" content-type="image/svg+xml">
                 <element name="svg"/>
               </schema>"#,
        )
        .unwrap();

        let fallback = Box::new(BuiltinSchemaFactory::new().unwrap());
        let factory = FileSchemaFactory::load(&[&path], fallback).unwrap();
        assert_eq!(factory.from_content_type("image/svg+xml").unwrap().name, "svg");
        assert_eq!(factory.from_content_type("text/html").unwrap().name, "xhtml");
    }

    #[test]
    fn test_file_factory_reports_missing_file() {
        let fallback = Box::new(BuiltinSchemaFactory::new().unwrap());
        let result = FileSchemaFactory::load(&["/definitely/not/here.xml"], fallback);
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
