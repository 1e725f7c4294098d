//! Declaration and call-site checks that need a fully bound tree.
//!
//! Nothing is rewritten here; the phase only adds alerts.

use crate::alert::{Alert, AlertKind, AlertSetBuilder, AlertSink};
use crate::ast::{Call, Callee, Expression, OutputElement, Parameter, Root, SemanticTree};
use crate::error::{Error, Result};
use crate::schema::AttributeFlag;
use crate::tree::{Forest, Node};
use std::collections::HashSet;

pub fn validate(tree: SemanticTree) -> Result<SemanticTree> {
    let (position, alerts, roots) = tree.into_parts();
    let mut sink = AlertSetBuilder::seeded(&alerts);
    for root in &roots {
        Validator {
            sink: &mut sink,
            var_names: Vec::new(),
        }
        .root(root)?;
    }
    Ok(Forest::new(position, sink.build(), roots))
}

struct Validator<'a> {
    sink: &'a mut dyn AlertSink,
    /// Names in scope: template parameters, then enclosing abbreviations.
    var_names: Vec<String>,
}

impl Validator<'_> {
    fn root(&mut self, root: &Root) -> Result<()> {
        match root {
            Root::Template(template) => {
                let params: Vec<&Parameter> = template
                    .constructor
                    .iter()
                    .flat_map(|c| c.parameters.iter())
                    .chain(&template.parameters)
                    .collect();
                self.check_parameters(&params);
                for param in params {
                    if param.has_default_flag {
                        self.misplaced_flag(param, "has-default");
                    }
                    if param.has_constructor_flag {
                        self.misplaced_flag(param, "has-constructor");
                    }
                    self.var_names.push(param.name.clone());
                }
                self.expression(&template.content)
            }
            Root::Interface(iface) => {
                let params: Vec<&Parameter> = iface.parameters.iter().collect();
                self.check_parameters(&params);
                for param in params {
                    if param.default.is_some() {
                        self.bad_interface_param(param, "a default value");
                    }
                    if param.constructor.is_some() {
                        self.bad_interface_param(param, "a constructor");
                    }
                }
                Ok(())
            }
            Root::Null(_) => Ok(()),
        }
    }

    fn check_parameters(&mut self, params: &[&Parameter]) {
        let mut names = HashSet::new();
        let mut found_content = false;
        for param in params {
            if !names.insert(param.name.as_str()) {
                self.sink.add(Alert::new(
                    AlertKind::DuplicateParameter,
                    param.position.clone(),
                    format!("duplicate parameter name '{}'", param.name),
                ));
            }
            if param.consumes_content {
                if found_content {
                    self.sink.add(Alert::new(
                        AlertKind::TooManyContentParameters,
                        param.position.clone(),
                        format!("'{}' is a second content parameter", param.name),
                    ));
                }
                found_content = true;
            }
        }
    }

    fn misplaced_flag(&mut self, param: &Parameter, flag: &str) {
        self.sink.add(Alert::new(
            AlertKind::InvalidAttributeValue,
            param.position.clone(),
            format!("'{flag}' is only allowed on interface parameters, not on '{}'", param.name),
        ));
    }

    fn bad_interface_param(&mut self, param: &Parameter, what: &str) {
        self.sink.add(Alert::new(
            AlertKind::BadParameter,
            param.position.clone(),
            format!("interface parameter '{}' may not have {what}", param.name),
        ));
    }

    fn expression(&mut self, expr: &Expression) -> Result<()> {
        match expr {
            Expression::Abbr(abbr) => {
                if self.var_names.contains(&abbr.name) {
                    self.sink.add(Alert::new(
                        AlertKind::ConflictingVarName,
                        abbr.position.clone(),
                        format!("'{}' is already defined in this scope", abbr.name),
                    ));
                }
                self.expression(&abbr.value)?;
                self.var_names.push(abbr.name.clone());
                let result = self.expression(&abbr.body);
                self.var_names.pop();
                return result;
            }
            Expression::OutputElement(element) => self.output_element(element),
            Expression::Call(call) => self.call(call)?,
            Expression::ExtractedMessage(_) => {
                return Err(Error::unexpected("validate", expr.display_name()));
            }
            _ => {}
        }
        for child in expr.children() {
            self.expression(child)?;
        }
        Ok(())
    }

    fn output_element(&mut self, element: &OutputElement) {
        let display = expr_name(element);
        for attr in &element.attributes {
            let required = element
                .validator
                .attribute_validator(&attr.name)
                .is_some_and(|v| v.is_flag_set(AttributeFlag::Required));
            if required && attr.condition.is_some() {
                self.sink.add(Alert::new(
                    AlertKind::RequiredAttributeHasCond,
                    attr.position.clone(),
                    format!("required attribute '{}' of {display} may not be conditional", attr.name),
                ));
            }
        }
        for required in element.validator.required_attributes() {
            if !element.attributes.iter().any(|attr| attr.name == required.name) {
                self.sink.add(Alert::new(
                    AlertKind::MissingAttribute,
                    element.position.clone(),
                    format!("{display} is missing required attribute '{}'", required.name),
                ));
            }
        }
    }

    fn call(&mut self, call: &Call) -> Result<()> {
        let Callee::Bound(callable) = &call.callee else {
            return Err(Error::unexpected("validate", format!("unbound <call:{}>", call.callee.name())));
        };
        for param in &callable.parameters {
            if param.has_default() {
                continue;
            }
            match call.arguments.get(&param.name) {
                None => self.sink.add(Alert::new(
                    AlertKind::MissingAttribute,
                    call.position.clone(),
                    format!("<call:{}> is missing required parameter '{}'", callable.name, param.name),
                )),
                Some(argument) if argument.condition.is_some() => self.sink.add(Alert::new(
                    AlertKind::RequiredAttributeHasCond,
                    argument.position.clone(),
                    format!("required parameter '{}' may not be conditional", param.name),
                )),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn expr_name(element: &OutputElement) -> String {
    match &element.schema.tag_prefix {
        Some(prefix) => format!("<{prefix}:{}>", element.local_name),
        None => format!("<{}>", element.local_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::phases::testing::{escaped, reparent, GXP_NS};

    fn validated(body: &str) -> SemanticTree {
        validate(escaped(body)).unwrap()
    }

    #[test]
    fn test_clean_template() {
        let tree = validated(r#"<gxp:param name="x" type="int"/><b><gxp:eval expr="x"/></b>"#);
        assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    }

    #[test]
    fn test_duplicate_and_content_parameters() {
        let tree = validated(
            r#"<gxp:param name="x" type="int"/>
               <gxp:param name="x" type="int"/>
               <gxp:param name="a" content="*"/>
               <gxp:param name="b" content="*"/>"#,
        );
        assert_eq!(tree.alerts().of_kind(AlertKind::DuplicateParameter).count(), 1);
        assert_eq!(tree.alerts().of_kind(AlertKind::TooManyContentParameters).count(), 1);
    }

    #[test]
    fn test_has_default_on_template_parameter() {
        let tree = validated(r#"<gxp:param name="x" type="int" has-default="true"/>"#);
        assert!(tree.alerts().has_kind(AlertKind::InvalidAttributeValue));
    }

    #[test]
    fn test_interface_parameter_with_default() {
        let source = format!(
            r#"<gxp:interface name="com.example.I" {GXP_NS}>
                 <gxp:param name="x" type="int" default="1"/>
               </gxp:interface>"#
        );
        let tree = validate(reparent("com.example.I", &source)).unwrap();
        assert!(tree.alerts().has_kind(AlertKind::BadParameter));
    }

    #[test]
    fn test_abbr_shadowing_parameter() {
        let tree = validated(
            r#"<gxp:param name="x" type="int"/>
               <gxp:abbr name="x" type="int" expr="2"><gxp:eval expr="x"/></gxp:abbr>"#,
        );
        assert!(tree.alerts().has_kind(AlertKind::ConflictingVarName));
    }

    #[test]
    fn test_missing_required_output_attribute() {
        let tree = validated(r#"<img src="a.png"/>"#);
        let missing: Vec<_> = tree.alerts().of_kind(AlertKind::MissingAttribute).collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message().contains("'alt'"));
    }

    #[test]
    fn test_required_attribute_with_condition() {
        let tree = validated(
            r#"<img src="a.png"><gxp:attr name="alt" cond="c">x</gxp:attr></img>"#,
        );
        assert!(tree.alerts().has_kind(AlertKind::RequiredAttributeHasCond));
        assert!(!tree.alerts().has_kind(AlertKind::MissingAttribute));
    }
}
