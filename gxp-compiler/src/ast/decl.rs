//! Roots, parameters and the other declarations of a template.

use super::attribute::MultiLanguageValue;
use super::expr::Expression;
use super::name::TemplateName;
use super::space::SpaceOperators;
use crate::alert::SourcePosition;
use crate::lang::NativeLanguage;
use crate::schema::Schema;
use crate::tree::Node;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The type of a parameter, loop variable or abbreviation.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// A type written in the target language.
    Native(MultiLanguageValue),
    /// Markup (or other content) of a schema.
    Content(Arc<Schema>),
    Boolean,
}

impl Type {
    pub fn content_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Type::Content(schema) => Some(schema),
            _ => None,
        }
    }

    /// Native types may carry a constructor and a regex; other types may not.
    pub fn is_native(&self) -> bool {
        matches!(self, Type::Native(_))
    }

    pub fn native_name(&self, lang: NativeLanguage) -> Option<String> {
        match self {
            Type::Native(value) => value.get(lang).map(str::to_string),
            Type::Content(schema) => schema.native_type(lang).map(|t| t.type_name.clone()),
            Type::Boolean => Some(
                match lang {
                    NativeLanguage::Java => "boolean",
                    NativeLanguage::Cpp => "bool",
                    NativeLanguage::JavaScript => "boolean",
                }
                .to_string(),
            ),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Native(value) => write!(f, "native {value}"),
            Type::Content(schema) => f.write_str(&schema.content_type),
            Type::Boolean => f.write_str("boolean"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub position: SourcePosition,
    pub name: String,
    /// `content="*"`: receives the body of a call.
    pub consumes_content: bool,
    pub ty: Type,
    pub default: Option<Expression>,
    /// `has-default="true"` on an interface parameter.
    pub has_default_flag: bool,
    pub regex: Option<String>,
    pub constructor: Option<Expression>,
    pub has_constructor_flag: bool,
    pub space: SpaceOperators,
    pub comment: Option<String>,
    pub annotations: Vec<JavaAnnotation>,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.has_default_flag
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some() || self.has_constructor_flag
    }

    pub fn signature(&self) -> ParameterSignature {
        ParameterSignature {
            name: self.name.clone(),
            ty: self.ty.to_string(),
            has_default: self.has_default(),
            has_constructor: self.has_constructor(),
            consumes_content: self.consumes_content,
        }
    }
}

impl Node for Parameter {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        "<gxp:param>".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormalTypeParameter {
    pub position: SourcePosition,
    pub name: String,
    pub extends: Option<String>,
}

impl Node for FormalTypeParameter {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        "<gxp:typeparam>".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub position: SourcePosition,
    pub annotations: Vec<JavaAnnotation>,
    pub parameters: Vec<Parameter>,
}

impl Node for Constructor {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        "<gxp:constructor>".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Import {
    Class {
        position: SourcePosition,
        name: TemplateName,
    },
    Package {
        position: SourcePosition,
        name: String,
    },
    CppLibrary {
        position: SourcePosition,
        library: String,
    },
    CppFile {
        position: SourcePosition,
        file: String,
    },
}

impl Import {
    /// Identity used to detect duplicate imports.
    pub fn key(&self) -> String {
        match self {
            Import::Class { name, .. } => format!("class {name}"),
            Import::Package { name, .. } => format!("package {name}"),
            Import::CppLibrary { library, .. } => format!("library {library}"),
            Import::CppFile { file, .. } => format!("file {file}"),
        }
    }
}

impl Node for Import {
    fn position(&self) -> &SourcePosition {
        match self {
            Import::Class { position, .. }
            | Import::Package { position, .. }
            | Import::CppLibrary { position, .. }
            | Import::CppFile { position, .. } => position,
        }
    }

    fn display_name(&self) -> String {
        match self {
            Import::Class { .. } | Import::Package { .. } => "<gxp:import>".to_string(),
            Import::CppLibrary { .. } | Import::CppFile { .. } => "<cpp:include>".to_string(),
        }
    }
}

/// The Java declaration a `<java:annotate>` is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationTarget {
    Class,
    Constructor,
    Instance,
    Interface,
    Param,
}

impl AnnotationTarget {
    const ALL: [AnnotationTarget; 5] = [
        AnnotationTarget::Class,
        AnnotationTarget::Constructor,
        AnnotationTarget::Instance,
        AnnotationTarget::Interface,
        AnnotationTarget::Param,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AnnotationTarget::Class => "class",
            AnnotationTarget::Constructor => "constructor",
            AnnotationTarget::Instance => "instance",
            AnnotationTarget::Interface => "interface",
            AnnotationTarget::Param => "param",
        }
    }

    /// Case-insensitive, as written in the `element` attribute.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|target| target.name().eq_ignore_ascii_case(name))
    }
}

/// A Java annotation copied verbatim into the generated source.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaAnnotation {
    pub position: SourcePosition,
    /// `None` until the owning declaration assigns its default target.
    pub target: Option<AnnotationTarget>,
    pub with: String,
}

impl Node for JavaAnnotation {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        "<java:annotate>".to_string()
    }
}

/// An interface a template declares it implements.
#[derive(Debug, Clone, PartialEq)]
pub enum Implements {
    /// `<gxp:implements interface="...">`, checked against the named gxp interface.
    Template {
        position: SourcePosition,
        name: TemplateName,
    },
    /// `<gxp:implements java:interface="...">`, taken on trust.
    Native { position: SourcePosition, ty: String },
}

impl Implements {
    /// The interface's name as a Java type.
    pub fn java_type(&self) -> String {
        match self {
            Implements::Template { name, .. } => name.to_string(),
            Implements::Native { ty, .. } => ty.clone(),
        }
    }
}

impl Node for Implements {
    fn position(&self) -> &SourcePosition {
        match self {
            Implements::Template { position, .. } | Implements::Native { position, .. } => position,
        }
    }

    fn display_name(&self) -> String {
        "<gxp:implements>".to_string()
    }
}

/// `<gxp:throws exception="..."/>`: an extra checked exception of `write`.
#[derive(Debug, Clone, PartialEq)]
pub struct Throws {
    pub position: SourcePosition,
    pub exception: String,
}

impl Node for Throws {
    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn display_name(&self) -> String {
        "<gxp:throws>".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub position: SourcePosition,
    pub name: TemplateName,
    pub schema: Arc<Schema>,
    pub constructor: Option<Constructor>,
    pub annotations: Vec<JavaAnnotation>,
    pub implements: Vec<Implements>,
    pub throws: Vec<Throws>,
    pub imports: Vec<Import>,
    pub parameters: Vec<Parameter>,
    pub type_parameters: Vec<FormalTypeParameter>,
    pub content: Expression,
}

impl Template {
    /// Annotations for one generated declaration.
    pub fn annotations_for(&self, target: AnnotationTarget) -> impl Iterator<Item = &str> {
        annotations_for(&self.annotations, target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub position: SourcePosition,
    pub name: TemplateName,
    pub schema: Arc<Schema>,
    pub annotations: Vec<JavaAnnotation>,
    pub throws: Vec<Throws>,
    pub imports: Vec<Import>,
    pub parameters: Vec<Parameter>,
    pub type_parameters: Vec<FormalTypeParameter>,
}

pub fn annotations_for(
    annotations: &[JavaAnnotation],
    target: AnnotationTarget,
) -> impl Iterator<Item = &str> {
    annotations
        .iter()
        .filter(move |annotation| annotation.target == Some(target))
        .map(|annotation| annotation.with.as_str())
}

/// Stands in for a root that could not be built. Already reported.
#[derive(Debug, Clone, PartialEq)]
pub struct NullRoot {
    pub position: SourcePosition,
    pub name: TemplateName,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Root {
    Template(Template),
    Interface(Interface),
    Null(NullRoot),
}

impl Root {
    pub fn name(&self) -> &TemplateName {
        match self {
            Root::Template(t) => &t.name,
            Root::Interface(i) => &i.name,
            Root::Null(n) => &n.name,
        }
    }

    pub fn imports(&self) -> &[Import] {
        match self {
            Root::Template(t) => &t.imports,
            Root::Interface(i) => &i.imports,
            Root::Null(_) => &[],
        }
    }

    /// The callable this root exposes to other templates.
    pub fn callable(&self) -> Option<Callable> {
        match self {
            Root::Template(t) => Some(Callable {
                name: t.name.clone(),
                kind: CallableKind::Template,
                schema: Some(t.schema.clone()),
                parameters: t.parameters.clone(),
            }),
            Root::Interface(i) => Some(Callable {
                name: i.name.clone(),
                kind: CallableKind::Interface,
                schema: Some(i.schema.clone()),
                parameters: i.parameters.clone(),
            }),
            Root::Null(_) => None,
        }
    }

    /// Rewrites the template body. Other roots have none and are returned unchanged.
    pub fn try_map_content<E>(
        self,
        f: impl FnOnce(Expression, &Arc<Schema>) -> Result<Expression, E>,
    ) -> Result<Root, E> {
        match self {
            Root::Template(mut template) => {
                let content = std::mem::replace(
                    &mut template.content,
                    Expression::empty(template.position.clone(), None),
                );
                template.content = f(content, &template.schema)?;
                Ok(Root::Template(template))
            }
            other => Ok(other),
        }
    }

    pub fn map_content(self, f: impl FnOnce(Expression, &Arc<Schema>) -> Expression) -> Root {
        let result: Result<Root, std::convert::Infallible> =
            self.try_map_content(|content, schema| Ok(f(content, schema)));
        match result {
            Ok(root) => root,
            Err(never) => match never {},
        }
    }

    pub fn content(&self) -> Option<&Expression> {
        match self {
            Root::Template(t) => Some(&t.content),
            _ => None,
        }
    }
}

impl Node for Root {
    fn position(&self) -> &SourcePosition {
        match self {
            Root::Template(t) => &t.position,
            Root::Interface(i) => &i.position,
            Root::Null(n) => &n.position,
        }
    }

    fn display_name(&self) -> String {
        match self {
            Root::Template(_) => "<gxp:template>".to_string(),
            Root::Interface(_) => "<gxp:interface>".to_string(),
            Root::Null(_) => "invalid root".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    Template,
    Interface,
}

/// What a caller can see of a template or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub name: TemplateName,
    pub kind: CallableKind,
    pub schema: Option<Arc<Schema>>,
    pub parameters: Vec<Parameter>,
}

impl Callable {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn content_parameter(&self) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.consumes_content)
    }

    pub fn signature(&self) -> CallableSignature {
        CallableSignature {
            name: self.name.clone(),
            kind: self.kind,
            content_type: self.schema.as_ref().map(|s| s.content_type.clone()),
            parameters: self.parameters.iter().map(Parameter::signature).collect(),
        }
    }
}

/// The comparable shape of a callable, persisted in the dependency cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallableSignature {
    pub name: TemplateName,
    pub kind: CallableKind,
    pub content_type: Option<String>,
    pub parameters: Vec<ParameterSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterSignature {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub has_default: bool,
    #[serde(default)]
    pub has_constructor: bool,
    pub consumes_content: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: Type) -> Parameter {
        Parameter {
            position: SourcePosition::new("t.gxp", 1, 1),
            name: name.into(),
            consumes_content: false,
            ty,
            default: None,
            has_default_flag: false,
            regex: None,
            constructor: None,
            has_constructor_flag: false,
            space: SpaceOperators::default(),
            comment: None,
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_signature_tracks_parameter_shape() {
        let mut callable = Callable {
            name: TemplateName::parse("a.B").unwrap(),
            kind: CallableKind::Template,
            schema: None,
            parameters: vec![param(
                "x",
                Type::Native(MultiLanguageValue::from_default("int")),
            )],
        };
        let before = callable.signature();
        callable.parameters[0].has_default_flag = true;
        assert_ne!(before, callable.signature());

        let json = serde_json::to_string(&before).unwrap();
        let back: CallableSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, before);
        assert!(json.contains("\"type\":\"native int\""));
    }

    #[test]
    fn test_boolean_native_names() {
        assert_eq!(
            Type::Boolean.native_name(NativeLanguage::Cpp).as_deref(),
            Some("bool")
        );
        let ty = Type::Native(MultiLanguageValue::from_default("String"));
        assert_eq!(ty.native_name(NativeLanguage::Java).as_deref(), Some("String"));
        assert!(ty.is_native());
    }

    #[test]
    fn test_annotation_targets_ignore_case() {
        assert_eq!(AnnotationTarget::parse("INSTANCE"), Some(AnnotationTarget::Instance));
        assert_eq!(AnnotationTarget::parse("param"), Some(AnnotationTarget::Param));
        assert_eq!(AnnotationTarget::parse("method"), None);
    }
}
