//! Binding of calls to the templates and interfaces they name.
//!
//! A call written as `<call:Widget>` is looked up by its explicit name when it is qualified.
//! An unqualified name is tried against the class imports first, then against the calling
//! template's own package, then against every package import in order. The callee's
//! parameters then decide what each argument means:
//!
//! - a literal argument for a content parameter stays text,
//! - for a boolean parameter it must read `true` or `false`,
//! - for a native parameter it becomes a target language literal, checked against the
//!   parameter's `regex` if it has one.
//!
//! The call body becomes the argument of the callee's content parameter.
//!
//! A template's `<gxp:implements>` names are resolved the same way and must name an interface
//! with the template's content type and the same parameters, in order.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink, SourcePosition};
use crate::ast::{
    AttrNamespace, Attribute, Call, Callable, CallableKind, CallableSignature, Callee,
    ConstructedConstant, Expression, Implements, Import, MultiLanguageValue, Parameter, Root,
    SemanticTree, Template, TemplateName, Type,
};
use crate::error::Result;
use crate::tree::{Forest, Node};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Finds callables by fully qualified name.
pub trait CallableResolver {
    fn resolve(&self, name: &TemplateName) -> Option<Arc<Callable>>;
}

impl<F> CallableResolver for F
where
    F: Fn(&TemplateName) -> Option<Arc<Callable>>,
{
    fn resolve(&self, name: &TemplateName) -> Option<Arc<Callable>> {
        self(name)
    }
}

/// The bind phase's output: the tree plus the signature of every callee it used.
#[derive(Debug, Clone)]
pub struct BoundTree {
    pub tree: SemanticTree,
    pub requirements: BTreeSet<CallableSignature>,
}

pub fn bind(tree: SemanticTree, resolver: &dyn CallableResolver) -> Result<BoundTree> {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    let mut requirements = BTreeSet::new();
    let roots = roots
        .into_iter()
        .map(|root| {
            let scope = Scope::of(&root, resolver);
            let root = match root {
                Root::Template(mut template) => {
                    bind_implements(&mut template, &scope, &mut requirements, &mut sink);
                    Root::Template(template)
                }
                other => other,
            };
            root.map_content(|content, _| {
                let mut binder = Binder {
                    scope: &scope,
                    requirements: &mut requirements,
                    sink: &mut sink,
                };
                binder.bind(content)
            })
        })
        .collect();
    Ok(BoundTree {
        tree: Forest::new(position, sink.build(), roots),
        requirements,
    })
}

/// Name resolution context of one root.
struct Scope<'a> {
    resolver: &'a dyn CallableResolver,
    package: Option<String>,
    classes: Vec<TemplateName>,
    packages: Vec<String>,
}

impl<'a> Scope<'a> {
    fn of(root: &Root, resolver: &'a dyn CallableResolver) -> Self {
        let mut classes = Vec::new();
        let mut packages = Vec::new();
        for import in root.imports() {
            match import {
                Import::Class { name, .. } => classes.push(name.clone()),
                Import::Package { name, .. } => packages.push(name.clone()),
                Import::CppLibrary { .. } | Import::CppFile { .. } => {}
            }
        }
        Scope {
            resolver,
            package: root.name().package(),
            classes,
            packages,
        }
    }

    fn lookup(&self, name: &TemplateName) -> Option<Arc<Callable>> {
        if name.is_qualified() {
            return self.resolver.resolve(name);
        }
        let by_class = self
            .classes
            .iter()
            .filter(|class| class.base_name() == name.base_name())
            .find_map(|class| self.resolver.resolve(class));
        if by_class.is_some() {
            return by_class;
        }
        let own = match &self.package {
            Some(package) => TemplateName::qualified(package, name),
            None => Some(name.clone()),
        };
        if let Some(found) = own.and_then(|own| self.resolver.resolve(&own)) {
            return Some(found);
        }
        self.packages
            .iter()
            .filter_map(|package| TemplateName::qualified(package, name))
            .find_map(|candidate| self.resolver.resolve(&candidate))
    }
}

struct Binder<'s> {
    scope: &'s Scope<'s>,
    requirements: &'s mut BTreeSet<CallableSignature>,
    sink: &'s mut dyn AlertSink,
}

impl Binder<'_> {
    fn bind(&mut self, expr: Expression) -> Expression {
        let expr = expr.map_children(|child| self.bind(child));
        match expr {
            Expression::Call(call) => self.bind_call(call),
            other => other,
        }
    }

    fn bind_call(&mut self, call: Call) -> Expression {
        let Callee::Unbound(name) = &call.callee else {
            return Expression::Call(call);
        };
        let position = call.position.clone();
        let Some(callable) = self.scope.lookup(name) else {
            self.sink.add(Alert::new(
                AlertKind::CalleeNotFound,
                call.position.clone(),
                format!("no template or interface named '{name}' is visible here"),
            ));
            return Expression::empty(position, None);
        };
        self.requirements.insert(callable.signature());

        let display = format!("<call:{}>", callable.name);
        let mut arguments = IndexMap::with_capacity(call.arguments.len());
        for (arg_name, argument) in call.arguments {
            let Some(param) = callable.parameter(&arg_name) else {
                self.sink.add(Alert::new(
                    AlertKind::BadParameter,
                    argument.position.clone(),
                    format!("{display} has no parameter named '{arg_name}'"),
                ));
                continue;
            };
            let value = self.argument_value(argument.value.clone(), param, &callable.name, &display);
            arguments.insert(arg_name, argument.with_value(value));
        }

        let content = *call.content;
        match callable.content_parameter() {
            Some(param) if arguments.contains_key(&param.name) => {
                if !content.is_whitespace_only() {
                    self.sink.add(Alert::new(
                        AlertKind::BadParameter,
                        content.position().clone(),
                        format!(
                            "{display} gets '{}' both as an attribute and as its body",
                            param.name
                        ),
                    ));
                }
            }
            Some(param) if !content.is_whitespace_only() || !param.has_default() => {
                let argument = Attribute::new(
                    content.position().clone(),
                    AttrNamespace::Null,
                    param.name.clone(),
                    inherit_space(content, param),
                );
                arguments.insert(param.name.clone(), argument);
            }
            Some(_) => {}
            None => {
                if !content.is_whitespace_only() {
                    self.sink.add(Alert::new(
                        AlertKind::BadParameter,
                        content.position().clone(),
                        format!("{display} has no content parameter but is given a body"),
                    ));
                }
            }
        }

        Expression::Call(Call {
            content: Box::new(Expression::empty(position.clone(), None)),
            position,
            callee: Callee::Bound(callable),
            arguments,
        })
    }

    fn argument_value(
        &mut self,
        value: Expression,
        param: &Parameter,
        callee: &TemplateName,
        display: &str,
    ) -> Expression {
        let Expression::StringConstant(literal) = value else {
            return inherit_space(value, param);
        };
        match &param.ty {
            Type::Content(_) => Expression::StringConstant(literal),
            Type::Boolean => match literal.value.as_str() {
                "true" => Expression::boolean(literal.position, true),
                "false" => Expression::boolean(literal.position, false),
                other => {
                    self.sink.add(Alert::new(
                        AlertKind::InvalidAttributeValue,
                        literal.position.clone(),
                        format!(
                            "'{other}' is not a valid value for boolean parameter '{}' of {display}",
                            param.name
                        ),
                    ));
                    Expression::boolean(literal.position, false)
                }
            },
            Type::Native(_) => {
                if let Some(pattern) = &param.regex {
                    self.check_regex(pattern, &literal.value, param, &literal.position);
                }
                if param.has_constructor() {
                    return Expression::Constructed(ConstructedConstant {
                        position: literal.position,
                        value: literal.value,
                        callee: callee.clone(),
                        param: param.name.clone(),
                    });
                }
                Expression::native(
                    literal.position,
                    MultiLanguageValue::from_default(native_literal(&literal.value)),
                )
            }
        }
    }

    fn check_regex(
        &mut self,
        pattern: &str,
        value: &str,
        param: &Parameter,
        position: &SourcePosition,
    ) {
        let matches = Regex::new(&format!("^(?:{pattern})$"))
            .map(|regex| regex.is_match(value))
            .unwrap_or(false);
        if !matches {
            self.sink.add(Alert::new(
                AlertKind::InvalidAttributeValue,
                position.clone(),
                format!(
                    "'{value}' does not match the pattern '{pattern}' of parameter '{}'",
                    param.name
                ),
            ));
        }
    }
}

/// Argument regions take the parameter's space operators where they set none themselves.
fn bind_implements(
    template: &mut Template,
    scope: &Scope<'_>,
    requirements: &mut BTreeSet<CallableSignature>,
    sink: &mut dyn AlertSink,
) {
    let declared = std::mem::take(&mut template.implements);
    for implements in declared {
        let Implements::Template { position, name } = implements else {
            template.implements.push(implements);
            continue;
        };
        let interface = scope
            .lookup(&name)
            .filter(|callable| callable.kind == CallableKind::Interface);
        let Some(interface) = interface else {
            sink.add(Alert::new(
                AlertKind::ImplementableNotFound,
                position,
                format!("no interface named '{name}' is visible here"),
            ));
            continue;
        };
        requirements.insert(interface.signature());
        check_implements(template, &interface, &position, sink);
        template.implements.push(Implements::Template {
            position,
            name: interface.name.clone(),
        });
    }
}

fn check_implements(
    template: &Template,
    interface: &Callable,
    position: &SourcePosition,
    sink: &mut dyn AlertSink,
) {
    let mut mismatch = |message: String| {
        sink.add(Alert::new(AlertKind::ImplementsMismatch, position.clone(), message));
    };
    let iface = &interface.name;
    let expected = interface.schema.as_ref().map(|schema| schema.content_type.as_str());
    if expected != Some(template.schema.content_type.as_str()) {
        mismatch(format!(
            "{iface} expects content type '{}' but the template has '{}'",
            expected.unwrap_or("none"),
            template.schema.content_type
        ));
    }
    if interface.parameters.len() != template.parameters.len() {
        mismatch(format!(
            "{iface} has {} parameters but the template has {}",
            interface.parameters.len(),
            template.parameters.len()
        ));
        return;
    }
    for (wanted, actual) in interface.parameters.iter().zip(&template.parameters) {
        if wanted.name != actual.name {
            mismatch(format!(
                "{iface} expects parameter '{}' where the template has '{}'",
                wanted.name, actual.name
            ));
            continue;
        }
        if wanted.ty.to_string() != actual.ty.to_string() {
            mismatch(format!(
                "parameter '{}' is {} in {iface} but {} in the template",
                actual.name, wanted.ty, actual.ty
            ));
            continue;
        }
        if wanted.has_default() && actual.default.is_none() {
            mismatch(format!(
                "parameter '{}' needs a default to implement {iface}",
                actual.name
            ));
        }
        if wanted.has_constructor() && actual.constructor.is_none() {
            mismatch(format!(
                "parameter '{}' needs a constructor to implement {iface}",
                actual.name
            ));
        }
    }
}

fn inherit_space(value: Expression, param: &Parameter) -> Expression {
    match value {
        Expression::Collapse(mut region) => {
            region.space = region.space.inherit_from(&param.space);
            Expression::Collapse(region)
        }
        other => other,
    }
}

static DECIMAL_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?$")
        .unwrap_or_else(|e| panic!("decimal regex: {e}"))
});

/// Decimal numbers pass through as written; anything else becomes a quoted string literal,
/// which reads the same in every target language.
fn native_literal(value: &str) -> String {
    if DECIMAL_LITERAL.is_match(value) {
        value.to_string()
    } else {
        serde_json::Value::String(value.to_string()).to_string()
    }
}
