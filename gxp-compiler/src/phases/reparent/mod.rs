//! Reparenting: parse tree to semantic tree
//!
//!     The parse tree mirrors the XML. The semantic tree mirrors what the template means: a
//!     `<gxp:param>` child is a parameter of its template, a `<gxp:attr>` child is an
//!     attribute of its parent element, text and output elements are content.
//!
//!     Elements are built bottom-up. For each element the reparenter first converts its
//!     attributes into an [`AttributeMap`] and builds all its children into a
//!     [`PartsBuilder`], then freezes the builder and lets the element's own builder take the
//!     attributes and buckets it understands. Whatever is left over is reported:
//!
//!         unread attribute        unknown-attribute
//!         untaken child           bad-node-placement (whitespace text is ignored)
//!
//!     Attribute namespaces are resolved while converting: `expr:x` becomes native code,
//!     `msg:x` a message and `nomsg:x` a no-message region, all in the null namespace, so
//!     element builders only ever look up plain names.

mod attributes;
mod merge;
mod parts;

pub use attributes::AttributeMap;
pub use merge::merge_language_variants;
pub use parts::{Parts, PartsBuilder};

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink, SourcePosition};
use crate::ast::{
    is_valid_variable_name, Abbr, AnnotationTarget, AttrNamespace, Attribute, BooleanConstant,
    Call, Callee, Clause, Collapse, Conditional, Constructor, Expression, FormalTypeParameter,
    Implements, Import, Interface, JavaAnnotation, Loop, LoopSource, MultiLanguageValue,
    NoMessage, NullRoot, OutputElement, Parameter, PlaceholderEnd, PlaceholderStart, Root,
    SemanticTree, SpaceOperators, Template, TemplateName, Throws, Type, UnextractedMessage,
};
use crate::error::{Error, Result};
use crate::lang::NativeLanguage;
use crate::parse::{
    CallElement, ElementData, GxpElement, GxpKind, Namespace, NativeElement, NativeKind,
    OutputElementNode, ParseTree, ParsedAttribute, ParsedElement,
};
use crate::schema::{AttributeFlag, ElementFlag, ElementValidator, Schema, SchemaFactory};
use crate::tree::{first_root, Forest, Node};
use indexmap::IndexMap;
use std::sync::Arc;

/// Content type of templates that do not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

pub struct Reparenter<'a> {
    schemas: &'a dyn SchemaFactory,
    expected_name: TemplateName,
    /// Schema of the root template; the default type of content parameters.
    root_schema: Option<Arc<Schema>>,
}

impl<'a> Reparenter<'a> {
    /// `expected_name` is the template name implied by the source path.
    pub fn new(schemas: &'a dyn SchemaFactory, expected_name: TemplateName) -> Self {
        Reparenter {
            schemas,
            expected_name,
            root_schema: None,
        }
    }

    pub fn reparent(mut self, tree: ParseTree) -> Result<SemanticTree> {
        let (position, alerts, roots) = tree.into_parts();
        let mut sink = AlertSetBuilder::seeded(&alerts);
        let mut root = None;

        if let Some(element) = first_root(roots, &mut sink) {
            let is_root = element.gxp_kind().is_some_and(GxpKind::is_root);
            if is_root {
                self.root_schema = self.declared_schema(&element);
                let mut document = PartsBuilder::new(position.clone(), "the document");
                self.visit(element, &mut document, &mut sink)?;
                let mut parts = document.finish();
                root = parts.take_roots().into_iter().next();
                parts.report_unused(&mut sink);
            } else if !matches!(element, ParsedElement::Null(_)) {
                sink.add(Alert::new(
                    AlertKind::InvalidRoot,
                    element.position().clone(),
                    format!(
                        "{} cannot be the root element; use <gxp:template> or <gxp:interface>",
                        element.display_name()
                    ),
                ));
            }
        }

        let root = root.unwrap_or_else(|| {
            Root::Null(NullRoot {
                position: position.clone(),
                name: self.expected_name.clone(),
            })
        });
        tracing::debug!(template = %self.expected_name, "reparented");
        Ok(Forest::new(position, sink.build(), vec![root]))
    }

    fn declared_schema(&self, root: &ParsedElement) -> Option<Arc<Schema>> {
        let declared = root.data().and_then(|data| {
            data.attributes
                .iter()
                .find(|attr| attr.namespace.is_none() && attr.name == "content-type")
                .map(|attr| attr.value.as_str())
        });
        declared
            .and_then(|content_type| self.schemas.from_content_type(content_type))
            .or_else(|| self.schemas.from_content_type(DEFAULT_CONTENT_TYPE))
    }

    fn visit(
        &self,
        element: ParsedElement,
        parent: &mut PartsBuilder,
        sink: &mut dyn AlertSink,
    ) -> Result<()> {
        match element {
            ParsedElement::Text(text) => {
                parent.add_value(Expression::string(text.position, None, text.text));
            }
            ParsedElement::Null(_) => {}
            ParsedElement::Gxp(GxpElement { kind, data }) => {
                let mut parts = self.group_parts(data, sink)?;
                self.build_gxp(kind, &mut parts, parent, sink)?;
                parts.report_unused(sink);
            }
            ParsedElement::Call(CallElement {
                callee,
                package,
                data,
            }) => {
                let mut parts = self.group_parts(data, sink)?;
                self.build_call(&callee, package.as_deref(), &mut parts, parent, sink);
                parts.report_unused(sink);
            }
            ParsedElement::Native(NativeElement {
                kind: NativeKind::Include,
                data,
                ..
            }) => {
                let mut parts = self.group_parts(data, sink)?;
                self.build_include(&mut parts, parent, sink);
                parts.report_unused(sink);
            }
            ParsedElement::Native(NativeElement {
                kind: NativeKind::Annotate,
                data,
                ..
            }) => {
                let mut parts = self.group_parts(data, sink)?;
                self.build_annotate(&mut parts, parent, sink);
                parts.report_unused(sink);
            }
            ParsedElement::Output(OutputElementNode {
                schema,
                validator,
                local_name,
                data,
            }) => {
                let mut parts = self.group_parts(data, sink)?;
                self.build_output(schema, validator, local_name, &mut parts, parent, sink);
                parts.report_unused(sink);
            }
        }
        Ok(())
    }

    fn group_parts(&self, data: ElementData, sink: &mut dyn AlertSink) -> Result<Parts> {
        let ElementData {
            position,
            qualified_name,
            attributes,
            children,
        } = data;
        let mut builder = PartsBuilder::new(position, format!("<{qualified_name}>"));
        for attr in attributes {
            builder.attributes.add(convert_attribute(attr), sink);
        }
        for child in children {
            self.visit(child, &mut builder, sink)?;
        }
        Ok(builder.finish())
    }

    fn build_gxp(
        &self,
        kind: GxpKind,
        parts: &mut Parts,
        parent: &mut PartsBuilder,
        sink: &mut dyn AlertSink,
    ) -> Result<()> {
        match kind {
            GxpKind::Template => self.build_template(parts, parent, sink),
            GxpKind::Interface => self.build_interface(parts, parent, sink),
            GxpKind::Param => self.build_param(parts, parent, sink),
            GxpKind::Constructor => parent.add_constructor(Constructor {
                position: parts.position().clone(),
                annotations: self.java_annotations(
                    parts,
                    AnnotationTarget::Constructor,
                    &[],
                    sink,
                ),
                parameters: parts.take_parameters(),
            }),
            GxpKind::Implements => self.build_implements(parts, parent, sink),
            GxpKind::Throws => {
                let position = parts.position().clone();
                let exception = parts.attributes.get("exception", sink);
                if let Some(exception) = exception {
                    if TemplateName::parse_or_alert(&exception, &position, sink).is_some() {
                        parent.add_throws(Throws {
                            position,
                            exception,
                        });
                    }
                }
            }
            GxpKind::Import => self.build_import(parts, parent, sink),
            GxpKind::TypeParam => {
                let name = parts.attributes.get("name", sink);
                let extends = parts.attributes.get_optional("extends", sink);
                if let Some(name) = name {
                    parent.add_type_parameter(FormalTypeParameter {
                        position: parts.position().clone(),
                        name,
                        extends,
                    });
                }
            }
            GxpKind::Abbr => self.build_abbr(parts, parent, sink),
            GxpKind::Loop => self.build_loop(parts, parent, sink),
            GxpKind::Cond => self.build_cond(parts, parent, sink),
            GxpKind::Clause => {
                let position = parts.position().clone();
                let predicate = parts
                    .attributes
                    .optional_expr_value("cond", sink)
                    .unwrap_or_else(|| Expression::boolean(position.clone(), true));
                parent.add_clause(Clause {
                    position,
                    predicate,
                    body: parts.take_content(),
                });
            }
            GxpKind::Attr => {
                let name = parts.attributes.get("name", sink);
                let condition = parts.attributes.optional_expr_value("cond", sink);
                let space = parts.attributes.space_operators(sink);
                let value = collapse(parts.take_content(), space);
                if let Some(name) = name {
                    let mut attr = Attribute::new(
                        parts.position().clone(),
                        AttrNamespace::Null,
                        name,
                        value,
                    );
                    attr.condition = condition;
                    parent.attributes.add(attr, sink);
                }
            }
            GxpKind::Eval => {
                let expr = parts.attributes.expr_value("expr", sink);
                let example = parts.attributes.get_optional("example", sink);
                let ph_name = parts
                    .attributes
                    .get_in(&AttrNamespace::Gxp, "ph", false, sink);
                match expr {
                    Some(Expression::Native(mut native)) => {
                        native.example = example;
                        native.ph_name = ph_name;
                        parent.add_value(Expression::Native(native));
                    }
                    Some(other) => parent.add_value(other),
                    None => {}
                }
            }
            GxpKind::Msg => {
                let meaning = parts.attributes.get_optional("meaning", sink);
                let comment = parts.attributes.get_optional("comment", sink);
                let hidden = parts.attributes.boolean_value("hidden", sink);
                let schema = parts
                    .attributes
                    .get_optional("content-type", sink)
                    .and_then(|ct| self.schema_for(&ct, parts.position(), sink));
                let space = parts.attributes.space_operators(sink);
                parent.add_value(Expression::Message(UnextractedMessage {
                    position: parts.position().clone(),
                    schema,
                    meaning,
                    comment,
                    hidden,
                    content: Box::new(collapse(parts.take_content(), space)),
                }));
            }
            GxpKind::NoMsg => {
                let space = parts.attributes.space_operators(sink);
                parent.add_value(Expression::NoMessage(NoMessage {
                    position: parts.position().clone(),
                    content: Box::new(collapse(parts.take_content(), space)),
                }));
            }
            GxpKind::Ph => {
                let name = parts.attributes.get("name", sink);
                let example = parts.attributes.attribute(&AttrNamespace::Null, "example");
                if let Some(name) = name {
                    let example = example.and_then(|attr| match attr.value.static_string() {
                        Some(text) if !text.trim().is_empty() => Some(text.to_string()),
                        _ => {
                            sink.add(Alert::new(
                                AlertKind::InvalidAttributeValue,
                                attr.position.clone(),
                                format!("example of placeholder '{name}' must be non-blank text"),
                            ));
                            Some(format!("<var>{name}</var>"))
                        }
                    });
                    parent.add_value(Expression::PlaceholderStart(PlaceholderStart {
                        position: parts.position().clone(),
                        schema: None,
                        name,
                        example,
                    }));
                }
            }
            GxpKind::Eph => parent.add_value(Expression::PlaceholderEnd(PlaceholderEnd {
                position: parts.position().clone(),
                schema: None,
            })),
            GxpKind::If | GxpKind::Elif | GxpKind::Else => {
                return Err(Error::unexpected("reparent", format!("<{kind}>")));
            }
        }
        Ok(())
    }

    fn build_template(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let name = self.root_name(parts, sink);
        let Some(schema) = self.declared_content_type(parts, sink) else {
            return;
        };
        let mut constructors = parts.take_constructors().into_iter();
        let constructor = constructors.next();
        for extra in constructors {
            sink.add(Alert::new(
                AlertKind::MoreThanOneConstructor,
                extra.position.clone(),
                format!("{} has more than one <gxp:constructor>", parts.element()),
            ));
        }
        let space = parts.attributes.space_operators(sink);
        let annotations = self.java_annotations(
            parts,
            AnnotationTarget::Class,
            &[AnnotationTarget::Instance],
            sink,
        );
        parent.add_root(Root::Template(Template {
            position: parts.position().clone(),
            name,
            schema,
            constructor,
            annotations,
            implements: parts.take_implements(),
            throws: parts.take_throws(),
            imports: parts.take_imports(),
            parameters: parts.take_parameters(),
            type_parameters: parts.take_type_parameters(),
            content: collapse(parts.take_content(), space),
        }));
    }

    fn build_interface(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let name = self.root_name(parts, sink);
        let Some(schema) = self.declared_content_type(parts, sink) else {
            return;
        };
        let annotations = self.java_annotations(parts, AnnotationTarget::Interface, &[], sink);
        parent.add_root(Root::Interface(Interface {
            position: parts.position().clone(),
            name,
            schema,
            annotations,
            throws: parts.take_throws(),
            imports: parts.take_imports(),
            parameters: parts.take_parameters(),
            type_parameters: parts.take_type_parameters(),
        }));
    }

    fn root_name(&self, parts: &mut Parts, sink: &mut dyn AlertSink) -> TemplateName {
        if let Some(declared) = parts.attributes.get("name", sink) {
            if declared != self.expected_name.to_string() {
                sink.add(Alert::new(
                    AlertKind::MismatchedTemplateName,
                    parts.position().clone(),
                    format!(
                        "template is named '{declared}' but its source path names it '{}'",
                        self.expected_name
                    ),
                ));
            }
        }
        self.expected_name.clone()
    }

    fn declared_content_type(&self, parts: &mut Parts, sink: &mut dyn AlertSink) -> Option<Arc<Schema>> {
        let declared = parts.attributes.get_optional("content-type", sink);
        let content_type = declared.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        self.schema_for(content_type, parts.position(), sink)
    }

    fn schema_for(
        &self,
        content_type: &str,
        position: &SourcePosition,
        sink: &mut dyn AlertSink,
    ) -> Option<Arc<Schema>> {
        let schema = self.schemas.from_content_type(content_type);
        if schema.is_none() {
            sink.add(Alert::new(
                AlertKind::UnknownContentType,
                position.clone(),
                format!("unknown content type '{content_type}'"),
            ));
        }
        schema
    }

    fn variable_name(&self, parts: &mut Parts, attr: &str, sink: &mut dyn AlertSink) -> Option<String> {
        let name = parts.attributes.get(attr, sink)?;
        if !is_valid_variable_name(&name) {
            sink.add(Alert::new(
                AlertKind::IllegalVariableName,
                parts.position().clone(),
                format!("'{name}' is not a valid variable name"),
            ));
            return None;
        }
        Some(name)
    }

    /// One of `gxp:type`, `content-type` or the (possibly per-language) native `type`.
    fn build_type(&self, parts: &mut Parts, default: Option<Type>, sink: &mut dyn AlertSink) -> Option<Type> {
        let gxp_type = parts
            .attributes
            .get_in(&AttrNamespace::Gxp, "type", false, sink);
        let content_type = parts.attributes.get_optional("content-type", sink);
        let native = parts.attributes.multi_language_value("type", sink);

        let given = [gxp_type.is_some(), content_type.is_some(), !native.is_empty()]
            .into_iter()
            .filter(|given| *given)
            .count();
        if given > 1 {
            sink.add(Alert::new(
                AlertKind::ConflictingAttributes,
                parts.position().clone(),
                format!(
                    "{} may specify only one of 'gxp:type', 'content-type' and 'type'",
                    parts.element()
                ),
            ));
        }

        if let Some(gxp_type) = gxp_type {
            if gxp_type == "boolean" {
                return Some(Type::Boolean);
            }
            sink.add(Alert::new(
                AlertKind::InvalidAttributeValue,
                parts.position().clone(),
                format!("'{gxp_type}' is not a valid value for 'gxp:type'"),
            ));
            return None;
        }
        if let Some(content_type) = content_type {
            return self
                .schema_for(&content_type, parts.position(), sink)
                .map(Type::Content);
        }
        if !native.is_empty() {
            return Some(Type::Native(native));
        }
        if default.is_none() {
            sink.add(Alert::new(
                AlertKind::MissingAttribute,
                parts.position().clone(),
                format!("{} is missing required attribute 'type'", parts.element()),
            ));
        }
        default
    }

    fn build_param(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let name = self.variable_name(parts, "name", sink);
        let consumes_content = match parts.attributes.get_optional("content", sink).as_deref() {
            None => false,
            Some("*") => true,
            Some(other) => {
                sink.add(Alert::new(
                    AlertKind::InvalidAttributeValue,
                    parts.position().clone(),
                    format!("'{other}' is not a valid value for 'content'; only '*' is allowed"),
                ));
                false
            }
        };
        let default_type = if consumes_content {
            self.root_schema.clone().map(Type::Content)
        } else {
            None
        };
        let ty = self.build_type(parts, default_type, sink);
        let default = parts.attributes.optional_expr_value("default", sink);
        let has_default_flag = parts.attributes.boolean_value("has-default", sink);
        let native = ty.as_ref().is_some_and(Type::is_native);
        let (regex, constructor, has_constructor_flag) = if native {
            (
                parts.attributes.get_optional("regex", sink),
                parts.attributes.optional_expr_value("constructor", sink),
                parts.attributes.boolean_value("has-constructor", sink),
            )
        } else {
            (None, None, false)
        };
        let space = parts.attributes.space_operators(sink);
        let annotations = self.java_annotations(parts, AnnotationTarget::Param, &[], sink);

        let body = parts.take_content();
        let comment = match body.static_string() {
            Some(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
            None => {
                sink.add(Alert::new(
                    AlertKind::RequiresStaticContent,
                    body.position().clone(),
                    "the body of <gxp:param> is its comment and must be plain text",
                ));
                None
            }
        };

        if let (Some(name), Some(ty)) = (name, ty) {
            parent.add_parameter(Parameter {
                position: parts.position().clone(),
                name,
                consumes_content,
                ty,
                default,
                has_default_flag,
                regex,
                constructor,
                has_constructor_flag,
                space,
                comment,
                annotations,
            });
        }
    }

    fn build_import(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let position = parts.position().clone();
        let class = parts.attributes.get_optional("class", sink);
        let package = parts.attributes.get_optional("package", sink);
        let import = match (class, package) {
            (Some(class), None) => TemplateName::parse_or_alert(&class, &position, sink)
                .map(|name| Import::Class { position, name }),
            (None, Some(package)) => TemplateName::parse_or_alert(&package, &position, sink)
                .map(|_| Import::Package {
                    position,
                    name: package,
                }),
            (None, None) => {
                sink.add(Alert::new(
                    AlertKind::MissingAttributes,
                    position,
                    "<gxp:import> requires one of 'class' or 'package'",
                ));
                None
            }
            (Some(_), Some(_)) => {
                sink.add(Alert::new(
                    AlertKind::ConflictingAttributes,
                    position,
                    "<gxp:import> may not have both 'class' and 'package'",
                ));
                None
            }
        };
        if let Some(import) = import {
            parent.add_import(import, sink);
        }
    }

    fn build_include(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let position = parts.position().clone();
        let library = parts.attributes.get_optional("library", sink);
        let file = parts.attributes.get_optional("file", sink);
        let import = match (library, file) {
            (Some(library), None) => Some(Import::CppLibrary { position, library }),
            (None, Some(file)) => Some(Import::CppFile { position, file }),
            (None, None) => {
                sink.add(Alert::new(
                    AlertKind::MissingAttributes,
                    position,
                    "<cpp:include> requires one of 'library' or 'file'",
                ));
                None
            }
            (Some(_), Some(_)) => {
                sink.add(Alert::new(
                    AlertKind::ConflictingAttributes,
                    position,
                    "<cpp:include> may not have both 'library' and 'file'",
                ));
                None
            }
        };
        if let Some(import) = import {
            parent.add_import(import, sink);
        }
    }

    /// Annotations of the declaration being built, children first, then its `java:annotate`
    /// attribute. Untargeted ones get `default`; any target outside `default` and `others` is
    /// reported and dropped.
    fn java_annotations(
        &self,
        parts: &mut Parts,
        default: AnnotationTarget,
        others: &[AnnotationTarget],
        sink: &mut dyn AlertSink,
    ) -> Vec<JavaAnnotation> {
        let mut result = Vec::new();
        for mut annotation in parts.take_annotations() {
            match annotation.target {
                None => {
                    annotation.target = Some(default);
                    result.push(annotation);
                }
                Some(target) if target == default || others.contains(&target) => {
                    result.push(annotation);
                }
                Some(target) => sink.add(Alert::new(
                    AlertKind::MisplacedJavaAnnotation,
                    annotation.position.clone(),
                    format!(
                        "annotation for element '{}' is not allowed inside {}",
                        target.name(),
                        parts.element()
                    ),
                )),
            }
        }
        let java = AttrNamespace::Native(NativeLanguage::Java);
        if let Some(attribute) = parts.attributes.attribute(&java, "annotate") {
            let with = attribute.value.static_string().map(str::to_string);
            match with {
                Some(with) => result.push(JavaAnnotation {
                    position: attribute.position,
                    target: Some(default),
                    with,
                }),
                None => sink.add(Alert::new(
                    AlertKind::RequiresStaticContent,
                    attribute.position,
                    format!("'java:annotate' on {} must be plain text", parts.element()),
                )),
            }
        }
        result
    }

    fn build_annotate(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let with = parts.attributes.get("with", sink);
        let mut target = None;
        if let Some(element) = parts.attributes.get_optional("element", sink) {
            target = AnnotationTarget::parse(&element);
            if target.is_none() {
                sink.add(Alert::new(
                    AlertKind::InvalidAttributeValue,
                    parts.position().clone(),
                    format!("'{element}' is not a valid value for 'element'"),
                ));
                return;
            }
        }
        if let Some(with) = with {
            parent.add_annotation(JavaAnnotation {
                position: parts.position().clone(),
                target,
                with,
            });
        }
    }

    fn build_implements(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let position = parts.position().clone();
        let native = parts.attributes.get_in(
            &AttrNamespace::Native(NativeLanguage::Java),
            "interface",
            false,
            sink,
        );
        let named = parts.attributes.get_optional("interface", sink);
        let implements = match (named, native) {
            (Some(named), None) => TemplateName::parse_or_alert(&named, &position, sink)
                .map(|name| Implements::Template { position, name }),
            (None, Some(ty)) => Some(Implements::Native { position, ty }),
            (None, None) => {
                sink.add(Alert::new(
                    AlertKind::MissingAttributes,
                    position,
                    "<gxp:implements> requires one of 'interface' or 'java:interface'",
                ));
                None
            }
            (Some(_), Some(_)) => {
                sink.add(Alert::new(
                    AlertKind::ConflictingAttributes,
                    position,
                    "<gxp:implements> may not have both 'interface' and 'java:interface'",
                ));
                None
            }
        };
        if let Some(implements) = implements {
            parent.add_implements(implements);
        }
    }

    fn build_abbr(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let ty = self.build_type(parts, None, sink);
        let name = self.variable_name(parts, "name", sink);
        let value = parts.attributes.expr_value("expr", sink);
        let body = parts.take_content();
        match (ty, name, value) {
            (Some(ty), Some(name), Some(value)) => parent.add_value(Expression::Abbr(Abbr {
                position: parts.position().clone(),
                ty,
                name,
                value: Box::new(value),
                body: Box::new(body),
            })),
            _ => parent.add_value(body),
        }
    }

    fn build_loop(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let position = parts.position().clone();
        let ty = self.build_type(parts, None, sink);
        let var = self.variable_name(parts, "var", sink);
        let iterable = parts.attributes.optional_expr_value("iterable", sink);
        let iterator = parts.attributes.optional_expr_value("iterator", sink);
        let source = match (iterable, iterator) {
            (Some(iterable), None) => Some(LoopSource::Iterable(Box::new(iterable))),
            (None, Some(iterator)) => Some(LoopSource::Iterator(Box::new(iterator))),
            (None, None) => {
                sink.add(Alert::new(
                    AlertKind::MissingAttributes,
                    position.clone(),
                    "<gxp:loop> requires one of 'iterable' or 'iterator'",
                ));
                None
            }
            (Some(_), Some(_)) => {
                sink.add(Alert::new(
                    AlertKind::ConflictingAttributes,
                    position.clone(),
                    "<gxp:loop> may not have both 'iterable' and 'iterator'",
                ));
                None
            }
        };
        let delimiter = parts
            .attributes
            .value(&AttrNamespace::Null, "delimiter")
            .unwrap_or_else(|| Expression::string(position.clone(), None, " "));
        let body = parts.take_content();
        if let (Some(ty), Some(var), Some(source)) = (ty, var, source) {
            parent.add_value(Expression::Loop(Loop {
                position,
                ty,
                var,
                source,
                body: Box::new(body),
                delimiter: Box::new(delimiter),
            }));
        }
    }

    fn build_cond(&self, parts: &mut Parts, parent: &mut PartsBuilder, sink: &mut dyn AlertSink) {
        let position = parts.position().clone();
        let mut clauses = parts.take_clauses();
        if clauses.is_empty() {
            sink.add(Alert::new(
                AlertKind::NoClausesInCond,
                position,
                "<gxp:cond> has no <gxp:clause>",
            ));
            return;
        }
        let unconditional = |clause: &Clause| {
            matches!(
                clause.predicate,
                Expression::BooleanConstant(BooleanConstant { value: true, .. })
            )
        };
        // A trailing unconditional clause is the fallback; anywhere else it needs a cond.
        let otherwise = match clauses.last() {
            Some(last) if clauses.len() > 1 && unconditional(last) => {
                clauses.pop().map(|clause| clause.body)
            }
            _ => None,
        };
        for clause in clauses.iter().filter(|clause| unconditional(clause)) {
            sink.add(Alert::new(
                AlertKind::MissingAttribute,
                clause.position.clone(),
                "<gxp:clause> is missing required attribute 'cond'",
            ));
        }
        parent.add_value(Expression::Conditional(Conditional {
            otherwise: Box::new(
                otherwise.unwrap_or_else(|| Expression::empty(position.clone(), None)),
            ),
            position,
            schema: None,
            clauses,
        }));
    }

    fn build_call(
        &self,
        callee: &str,
        package: Option<&str>,
        parts: &mut Parts,
        parent: &mut PartsBuilder,
        sink: &mut dyn AlertSink,
    ) {
        let position = parts.position().clone();
        let space = parts.attributes.space_operators(sink);
        let dotted = match package {
            Some(package) => format!("{package}.{callee}"),
            None => callee.to_string(),
        };
        let name = TemplateName::parse_or_alert(&dotted, &position, sink);
        let mut arguments = IndexMap::new();
        for attr in parts.attributes.unused_attributes(sink) {
            if attr.namespace == AttrNamespace::Null {
                arguments.insert(attr.name.clone(), attr);
            } else {
                sink.add(Alert::new(
                    AlertKind::UnknownAttribute,
                    attr.position.clone(),
                    format!("{} is not a valid attribute of {}", attr.display_name(), parts.element()),
                ));
            }
        }
        let content = collapse(parts.take_content(), space);
        if let Some(name) = name {
            parent.add_value(Expression::Call(Call {
                position,
                callee: Callee::Unbound(name),
                arguments,
                content: Box::new(content),
            }));
        }
    }

    fn build_output(
        &self,
        schema: Arc<Schema>,
        validator: Arc<ElementValidator>,
        local_name: String,
        parts: &mut Parts,
        parent: &mut PartsBuilder,
        sink: &mut dyn AlertSink,
    ) {
        let position = parts.position().clone();
        let space = parts.attributes.space_operators(sink);
        let doctype = parts
            .attributes
            .get_in(&AttrNamespace::Gxp, "doctype", false, sink)
            .and_then(|name| match validator.doctype(&name) {
                Some(doctype) => Some(doctype.clone()),
                None => {
                    sink.add(Alert::new(
                        AlertKind::InvalidDoctype,
                        position.clone(),
                        format!("'{name}' is not a valid doctype for <{local_name}>"),
                    ));
                    None
                }
            });
        let ph_name = parts
            .attributes
            .get_in(&AttrNamespace::Gxp, "ph", false, sink);
        if validator.is_flag_set(ElementFlag::Deprecated) {
            sink.add(Alert::new(
                AlertKind::DeprecatedElement,
                position.clone(),
                format!("<{local_name}> is deprecated"),
            ));
        }
        let unused = parts.attributes.unused_attributes(sink);
        let attributes = self.check_attributes(&validator, parts.element(), unused, sink);
        let inner_schema = validator
            .inner_content_type
            .as_deref()
            .and_then(|content_type| self.schema_for(content_type, &position, sink));
        let content = if validator.is_flag_set(ElementFlag::NoEndTag) {
            Expression::empty(position.clone(), None)
        } else {
            collapse(parts.take_content(), space)
        };
        parent.add_value(Expression::OutputElement(OutputElement {
            position,
            schema,
            inner_schema,
            local_name,
            validator,
            doctype,
            attributes,
            ph_name,
            content: Box::new(content),
        }));
    }

    fn check_attributes(
        &self,
        validator: &ElementValidator,
        element: &str,
        attributes: Vec<Attribute>,
        sink: &mut dyn AlertSink,
    ) -> Vec<Attribute> {
        let mut checked = Vec::with_capacity(attributes.len());
        for mut attr in attributes {
            let attr_validator = match attr.namespace {
                AttrNamespace::Null => validator.attribute_validator(&attr.name),
                _ => None,
            };
            let Some(attr_validator) = attr_validator else {
                sink.add(Alert::new(
                    AlertKind::UnknownAttribute,
                    attr.position.clone(),
                    format!("{} is not a valid attribute of {element}", attr.display_name()),
                ));
                continue;
            };
            if let Some(text) = attr.value.static_string() {
                if !attr_validator.is_valid_value(text) {
                    sink.add(Alert::new(
                        AlertKind::InvalidAttributeValue,
                        attr.position.clone(),
                        format!("'{text}' is not a valid value for {}", attr.display_name()),
                    ));
                }
            }
            if attr_validator.is_flag_set(AttributeFlag::Deprecated) {
                sink.add(Alert::new(
                    AlertKind::DeprecatedAttribute,
                    attr.position.clone(),
                    format!("{} of {element} is deprecated", attr.display_name()),
                ));
            }
            if let Some(content_type) = &attr_validator.content_type {
                attr.inner_schema = self.schema_for(content_type, &attr.position, sink);
            }
            checked.push(attr);
        }
        checked
    }
}

fn convert_attribute(attr: ParsedAttribute) -> Attribute {
    let ParsedAttribute {
        position,
        namespace,
        name,
        value,
    } = attr;
    let literal = Expression::string(position.clone(), None, value.clone());
    let (namespace, value) = match namespace {
        None => (AttrNamespace::Null, literal),
        Some(Namespace::Gxp) => (AttrNamespace::Gxp, literal),
        Some(Namespace::Native(lang)) => (AttrNamespace::Native(lang), literal),
        Some(Namespace::Expr) => (
            AttrNamespace::Null,
            Expression::native(position.clone(), MultiLanguageValue::from_default(value)),
        ),
        Some(Namespace::Msg) => (
            AttrNamespace::Null,
            Expression::Message(UnextractedMessage {
                position: position.clone(),
                schema: None,
                meaning: None,
                comment: None,
                hidden: false,
                content: Box::new(literal),
            }),
        ),
        Some(Namespace::NoMsg) => (
            AttrNamespace::Null,
            Expression::NoMessage(NoMessage {
                position: position.clone(),
                content: Box::new(literal),
            }),
        ),
        Some(other) => (AttrNamespace::Foreign(other.uri()), literal),
    };
    Attribute::new(position, namespace, name, value)
}

fn collapse(body: Expression, space: SpaceOperators) -> Expression {
    Expression::Collapse(Collapse {
        position: body.position().clone(),
        space,
        body: Box::new(body),
    })
}

#[cfg(test)]
mod tests;
