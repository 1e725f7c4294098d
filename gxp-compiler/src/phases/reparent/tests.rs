use super::*;
use crate::alert::AlertSet;
use crate::phases::ifexpand;
use crate::parse::Parser;
use crate::schema::BuiltinSchemaFactory;

const GXP_NS: &str = r#"xmlns:gxp="http://google.com/2001/gxp" xmlns="http://www.w3.org/1999/xhtml""#;

fn reparented(source: &str) -> SemanticTree {
    let schemas = BuiltinSchemaFactory::new().unwrap();
    let parsed = ifexpand::expand(Parser::new(&schemas).parse("com/example/T.gxp", source));
    let expected = TemplateName::parse("com.example.T").unwrap();
    Reparenter::new(&schemas, expected).reparent(parsed).unwrap()
}

fn template(body: &str) -> SemanticTree {
    reparented(&format!(
        r#"<gxp:template name="com.example.T" {GXP_NS}>{body}</gxp:template>"#
    ))
}

fn template_of(tree: &SemanticTree) -> &Template {
    match tree.root() {
        Some(Root::Template(template)) => template,
        other => panic!("expected a template, got {other:?}"),
    }
}

/// The template content with its outer collapse stripped.
fn content(tree: &SemanticTree) -> &Expression {
    match &template_of(tree).content {
        Expression::Collapse(collapse) => &collapse.body,
        other => panic!("expected collapse, got {other:?}"),
    }
}

fn kinds(alerts: &AlertSet) -> Vec<AlertKind> {
    alerts.iter().map(|alert| alert.kind()).collect()
}

#[test]
fn test_minimal_template() {
    let tree = template("hello");
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    let template = template_of(&tree);
    assert_eq!(template.name.to_string(), "com.example.T");
    assert_eq!(template.schema.content_type, "text/html");
    assert_eq!(content(&tree).static_string(), Some("hello"));
}

#[test]
fn test_params_and_imports() {
    let tree = template(
        r#"<gxp:import class="com.other.Widget"/>
           <gxp:param name="user" type="String"/>
           <gxp:param name="body" content="*"/>
           <gxp:param name="flag" gxp:type="boolean" default="false"/>"#,
    );
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    let template = template_of(&tree);
    assert_eq!(template.imports.len(), 1);
    let names: Vec<&str> = template.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["user", "body", "flag"]);
    assert!(template.parameters[0].ty.is_native());
    assert!(template.parameters[1].consumes_content);
    assert_eq!(
        template.parameters[1].ty.content_schema().map(|s| s.content_type.as_str()),
        Some("text/html")
    );
    assert_eq!(template.parameters[2].ty, Type::Boolean);
    assert!(template.parameters[2].has_default());
}

#[test]
fn test_param_comment_is_body_text() {
    let tree = template(r#"<gxp:param name="n" type="int">  the count </gxp:param>"#);
    assert_eq!(
        template_of(&tree).parameters[0].comment.as_deref(),
        Some("the count")
    );
}

#[test]
fn test_param_conflicting_types() {
    let tree = template(r#"<gxp:param name="n" type="int" content-type="text/plain"/>"#);
    assert!(tree.alerts().has_kind(AlertKind::ConflictingAttributes));
}

#[test]
fn test_param_bad_name_and_content_value() {
    let tree = template(r#"<gxp:param name="this" type="int" content="all"/>"#);
    let kinds = kinds(tree.alerts());
    assert!(kinds.contains(&AlertKind::IllegalVariableName));
    assert!(kinds.contains(&AlertKind::InvalidAttributeValue));
    assert!(template_of(&tree).parameters.is_empty());
}

#[test]
fn test_illegal_variable_names_declare_nothing() {
    let tree = template(r#"<gxp:loop var="this" type="int" iterable="xs">a</gxp:loop>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::IllegalVariableName]);
    assert!(!matches!(content(&tree), Expression::Loop(_)));

    let tree = template(r#"<gxp:abbr name="1x" type="int" expr="2">a</gxp:abbr>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::IllegalVariableName]);
    assert_eq!(content(&tree).static_string(), Some("a"));
}

#[test]
fn test_mismatched_name_keeps_expected() {
    let tree = reparented(&format!(
        r#"<gxp:template name="com.example.Other" {GXP_NS}/>"#
    ));
    assert!(tree.alerts().has_kind(AlertKind::MismatchedTemplateName));
    assert_eq!(template_of(&tree).name.to_string(), "com.example.T");
}

#[test]
fn test_unknown_content_type() {
    let tree = reparented(&format!(
        r#"<gxp:template name="com.example.T" content-type="text/bogus" {GXP_NS}/>"#
    ));
    assert!(tree.alerts().has_kind(AlertKind::UnknownContentType));
    assert!(matches!(tree.root(), Some(Root::Null(_))));
}

#[test]
fn test_output_element_as_root_is_invalid() {
    let tree = reparented(r#"<div xmlns="http://www.w3.org/1999/xhtml"/>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::InvalidRoot]);
    assert!(matches!(tree.root(), Some(Root::Null(_))));
}

#[test]
fn test_interface() {
    let tree = reparented(&format!(
        r#"<gxp:interface name="com.example.T" {GXP_NS}><gxp:param name="x" type="int"/></gxp:interface>"#
    ));
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    match tree.root() {
        Some(Root::Interface(interface)) => assert_eq!(interface.parameters.len(), 1),
        other => panic!("expected interface, got {other:?}"),
    }
}

#[test]
fn test_second_constructor() {
    let tree = template("<gxp:constructor/><gxp:constructor/>");
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::MoreThanOneConstructor]);
    assert!(template_of(&tree).constructor.is_some());
}

#[test]
fn test_unknown_attribute_on_param() {
    let tree = template(r#"<gxp:param name="n" type="int" bogus="1"/>"#);
    let alerts: Vec<_> = tree.alerts().of_kind(AlertKind::UnknownAttribute).collect();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].message().contains("<gxp:param>"));
}

#[test]
fn test_misplaced_param_inside_output_element() {
    let tree = template(r#"<div><gxp:param name="n" type="int"/></div>"#);
    assert!(tree.alerts().has_kind(AlertKind::BadNodePlacement));
}

#[test]
fn test_if_else_becomes_conditional() {
    let tree = template(r#"<gxp:if cond="x">a<gxp:else/>b</gxp:if>"#);
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    match content(&tree) {
        Expression::Conditional(cond) => {
            assert_eq!(cond.clauses.len(), 1);
            assert!(matches!(cond.clauses[0].predicate, Expression::Native(_)));
            assert_eq!(cond.otherwise.static_string(), Some("b"));
        }
        other => panic!("expected conditional, got {other:?}"),
    }
}

#[test]
fn test_if_without_cond() {
    let tree = template("<gxp:if>a</gxp:if>");
    assert!(tree.alerts().has_kind(AlertKind::MissingAttribute));
}

#[test]
fn test_empty_cond() {
    let tree = template("<gxp:cond/>");
    assert!(tree.alerts().has_kind(AlertKind::NoClausesInCond));
}

#[test]
fn test_gxp_attr_becomes_output_attribute() {
    let tree = template(r#"<div><gxp:attr name="title" cond="c">hi</gxp:attr></div>"#);
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    match content(&tree) {
        Expression::OutputElement(div) => {
            assert_eq!(div.attributes.len(), 1);
            assert_eq!(div.attributes[0].name, "title");
            assert!(div.attributes[0].condition.is_some());
        }
        other => panic!("expected element, got {other:?}"),
    }
}

#[test]
fn test_expr_attribute_is_native() {
    let tree = template(r#"<a expr:href="url" xmlns:expr="http://google.com/2001/gxp/expressions"/>"#);
    match content(&tree) {
        Expression::OutputElement(a) => {
            assert!(matches!(a.attributes[0].value, Expression::Native(_)));
        }
        other => panic!("expected element, got {other:?}"),
    }
}

#[test]
fn test_script_attribute_gets_inner_schema() {
    let tree = template(r#"<div onclick="go()"/>"#);
    match content(&tree) {
        Expression::OutputElement(div) => {
            let inner = div.attributes[0].inner_schema.as_ref().unwrap();
            assert_eq!(inner.content_type, "text/javascript");
        }
        other => panic!("expected element, got {other:?}"),
    }
}

#[test]
fn test_invalid_output_attributes() {
    let tree = template(r#"<img alt="x" bogus="1" dir="sideways"/>"#);
    let kinds = kinds(tree.alerts());
    assert!(kinds.contains(&AlertKind::UnknownAttribute));
    assert!(kinds.contains(&AlertKind::InvalidAttributeValue));
}

#[test]
fn test_invalid_doctype() {
    let tree = template(r#"<html gxp:doctype="nonsense"/>"#);
    assert!(tree.alerts().has_kind(AlertKind::InvalidDoctype));
}

#[test]
fn test_call_arguments() {
    let tree = template(
        r#"<call:Widget xmlns:call="http://google.com/2001/gxp/call/com/other" size="3">
             <gxp:attr name="label">L</gxp:attr>body</call:Widget>"#,
    );
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    match content(&tree) {
        Expression::Call(call) => {
            assert_eq!(call.callee.name().to_string(), "com.other.Widget");
            let args: Vec<&str> = call.arguments.keys().map(String::as_str).collect();
            assert_eq!(args, vec!["size", "label"]);
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn test_loop_requires_source() {
    let tree = template(r#"<gxp:loop var="x" type="int">a</gxp:loop>"#);
    assert!(tree.alerts().has_kind(AlertKind::MissingAttributes));
    let tree = template(r#"<gxp:loop var="x" type="int" iterable="xs" iterator="it">a</gxp:loop>"#);
    assert!(tree.alerts().has_kind(AlertKind::ConflictingAttributes));
}

#[test]
fn test_loop_default_delimiter() {
    let tree = template(r#"<gxp:loop var="x" type="int" iterable="xs">a</gxp:loop>"#);
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    match content(&tree) {
        Expression::Loop(lp) => assert_eq!(lp.delimiter.static_string(), Some(" ")),
        other => panic!("expected loop, got {other:?}"),
    }
}

#[test]
fn test_blank_ph_example() {
    let tree = template(r#"<gxp:msg><gxp:ph name="x" example=" "/>y<gxp:eph/></gxp:msg>"#);
    assert!(tree.alerts().has_kind(AlertKind::InvalidAttributeValue));
}

#[test]
fn test_import_needs_exactly_one_target() {
    let tree = template("<gxp:import/>");
    assert!(tree.alerts().has_kind(AlertKind::MissingAttributes));
    let tree = template(r#"<gxp:import class="a.B" package="a"/>"#);
    assert!(tree.alerts().has_kind(AlertKind::ConflictingAttributes));
}

const JAVA_NS: &str = r#"xmlns:java="http://google.com/2001/gxp/code/java""#;

fn java_template(attrs: &str, body: &str) -> SemanticTree {
    reparented(&format!(
        r#"<gxp:template name="com.example.T" {attrs} {GXP_NS} {JAVA_NS}>{body}</gxp:template>"#
    ))
}

#[test]
fn test_java_annotations_get_targets() {
    let tree = java_template(
        r#"java:annotate="@Generated""#,
        r#"<java:annotate with="@Deprecated"/>
           <java:annotate element="INSTANCE" with="@Singleton"/>
           <gxp:param name="n" type="int"><java:annotate with="@Nonnull"/></gxp:param>
           <gxp:constructor><java:annotate with="@Inject"/></gxp:constructor>"#,
    );
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    let template = template_of(&tree);
    let class: Vec<&str> = template.annotations_for(AnnotationTarget::Class).collect();
    assert_eq!(class, vec!["@Deprecated", "@Generated"]);
    let instance: Vec<&str> = template.annotations_for(AnnotationTarget::Instance).collect();
    assert_eq!(instance, vec!["@Singleton"]);
    assert_eq!(template.parameters[0].annotations[0].target, Some(AnnotationTarget::Param));
    let constructor = template.constructor.as_ref().map(|c| c.annotations.len());
    assert_eq!(constructor, Some(1));
}

#[test]
fn test_java_annotation_errors() {
    let tree = java_template("", r#"<java:annotate element="method" with="@X"/>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::InvalidAttributeValue]);
    assert!(template_of(&tree).annotations.is_empty());

    let tree = java_template("", r#"<java:annotate element="param" with="@X"/>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::MisplacedJavaAnnotation]);

    let tree = java_template("", "<div><java:annotate with=\"@X\"/></div>");
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::BadNodePlacement]);
}

#[test]
fn test_implements_and_throws() {
    let tree = java_template(
        "",
        r#"<gxp:implements interface="com.example.Widget"/>
           <gxp:implements java:interface="java.io.Serializable"/>
           <gxp:throws exception="com.example.RenderException"/>"#,
    );
    assert!(tree.alerts().is_empty(), "{:?}", tree.alerts());
    let template = template_of(&tree);
    let implemented: Vec<String> = template.implements.iter().map(Implements::java_type).collect();
    assert_eq!(implemented, vec!["com.example.Widget", "java.io.Serializable"]);
    assert_eq!(template.throws[0].exception, "com.example.RenderException");
}

#[test]
fn test_implements_and_throws_errors() {
    let tree = java_template("", "<gxp:implements/>");
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::MissingAttributes]);
    let tree = java_template(
        "",
        r#"<gxp:implements interface="a.B" java:interface="a.C"/>"#,
    );
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::ConflictingAttributes]);
    let tree = java_template("", r#"<gxp:throws exception="not a name"/>"#);
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::IllegalName]);
    assert!(template_of(&tree).throws.is_empty());

    let tree = reparented(&format!(
        r#"<gxp:interface name="com.example.T" {GXP_NS}><gxp:implements interface="a.B"/></gxp:interface>"#
    ));
    assert_eq!(kinds(tree.alerts()), vec![AlertKind::BadNodePlacement]);
}
