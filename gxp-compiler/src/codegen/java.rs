//! Java output: one class per template with a static `write` method.

use super::body::{write_parameters, BodyWriter, Dialect};
use super::writer::CodeWriter;
use super::{banner, capitalize, CodeGenerator, GenerateOptions};
use crate::alert::AlertSink;
use crate::ast::{
    annotations_for, AnnotationTarget, FormalTypeParameter, Implements, Import, Message, Parameter,
    Root, Template, TemplateName, Throws,
};
use crate::error::Result;
use crate::lang::{NativeLanguage, OutputLanguage};
use crate::phases::MessageExtractedTree;
use crate::schema::Schema;
use std::collections::BTreeSet;
use std::sync::Arc;

const CONTEXT_CLASS: &str = "com.google.gxp.base.GxpContext";
const GENERIC_CLOSURE: &str = "com.google.gxp.base.GxpClosure";

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaDialect;

/// Generic type arguments cannot be primitive.
fn boxed(ty: &str) -> &str {
    match ty {
        "int" => "Integer",
        "long" => "Long",
        "short" => "Short",
        "byte" => "Byte",
        "char" => "Character",
        "float" => "Float",
        "double" => "Double",
        "boolean" => "Boolean",
        other => other,
    }
}

impl Dialect for JavaDialect {
    fn language(&self) -> NativeLanguage {
        NativeLanguage::Java
    }

    fn base_names(&self) -> (&'static str, &'static str) {
        ("out", "gxpContext")
    }

    fn null(&self) -> &'static str {
        "null"
    }

    fn unknown_type(&self) -> &'static str {
        "Object"
    }

    fn append_text(&self, out: &str, literal: &str) -> String {
        format!("{out}.append({literal});")
    }

    fn append_value(&self, out: &str, ctx: &str, schema: &Schema, value: &str) -> String {
        match schema
            .native_type(NativeLanguage::Java)
            .and_then(|t| t.appender.as_deref())
        {
            Some(appender) => format!("{appender}.INSTANCE.append({out}, {ctx}, {value});"),
            None => format!(
                "com.google.gxp.base.GxpClosures.append({out}, {ctx}, {}, {value});",
                self.quote(&schema.content_type)
            ),
        }
    }

    fn is_xml(&self, ctx: &str) -> String {
        format!("{ctx}.isUsingXmlSyntax()")
    }

    fn local(&self, ty: &str, name: &str, value: &str) -> String {
        format!("final {ty} {name} = {value};")
    }

    fn flag(&self, name: &str) -> String {
        format!("boolean {name} = true;")
    }

    fn loop_open(
        &self,
        ty: &str,
        var: &str,
        source: &str,
        iterator: bool,
        scratch: &str,
    ) -> Vec<String> {
        if iterator {
            vec![
                format!(
                    "for (java.util.Iterator<{}> {scratch} = {source}; {scratch}.hasNext(); ) {{",
                    boxed(ty)
                ),
                format!("final {ty} {var} = {scratch}.next();"),
            ]
        } else {
            vec![format!("for (final {ty} {var} : {source}) {{")]
        }
    }

    fn closure_open(&self, schema: Option<&Arc<Schema>>, out: &str, ctx: &str) -> String {
        let ty = schema
            .and_then(|s| s.native_type(NativeLanguage::Java))
            .map_or(GENERIC_CLOSURE, |t| t.type_name.as_str());
        format!("({ty}) ({out}, {ctx}) -> {{")
    }

    fn call(&self, callee: &TemplateName, out: &str, ctx: &str, args: &[String]) -> String {
        let mut all = vec![out.to_string(), ctx.to_string()];
        all.extend(args.iter().cloned());
        format!("{callee}.write({});", all.join(", "))
    }

    fn default_of(&self, callee: &TemplateName, param: &Parameter) -> String {
        format!("{callee}.getDefault{}()", capitalize(&param.name))
    }

    fn construct(&self, callee: &TemplateName, param: &str, literal: &str) -> String {
        format!("{callee}.construct{}({literal})", capitalize(param))
    }

    fn message(
        &self,
        out: &str,
        ctx: &str,
        _schema: Option<&Arc<Schema>>,
        message: &Message,
        params: &[String],
    ) -> String {
        let mut all = vec![
            out.to_string(),
            ctx.to_string(),
            format!("{}L", message.id),
            self.quote(&message.presentation),
        ];
        all.extend(params.iter().cloned());
        format!("com.google.gxp.base.GxpMessages.append({});", all.join(", "))
    }
}

fn type_parameters(params: &[FormalTypeParameter]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let list: Vec<String> = params
        .iter()
        .map(|p| match &p.extends {
            Some(bound) => format!("{} extends {bound}", p.name),
            None => p.name.clone(),
        })
        .collect();
    format!("<{}> ", list.join(", "))
}

/// `throws` clause of a `write` method. `java.io.IOException` is always first.
fn throws_clause(throws: &[Throws]) -> String {
    let mut exceptions = vec!["java.io.IOException"];
    for declared in throws {
        if !exceptions.contains(&declared.exception.as_str()) {
            exceptions.push(&declared.exception);
        }
    }
    format!("throws {}", exceptions.join(", "))
}

/// A parameter declaration with its annotations in front.
fn declare(annotated: &Parameter, ty: String) -> String {
    let mut declaration = String::new();
    for annotation in annotations_for(&annotated.annotations, AnnotationTarget::Param) {
        declaration.push_str(annotation);
        declaration.push(' ');
    }
    format!("{declaration}{ty} {}", annotated.name)
}

/// The nested `Instance` class that adapts the static `write` to an object, so a template can
/// implement interfaces and take its constructor parameters up front.
fn instance_class(
    template: &Template,
    body: &mut BodyWriter<'_>,
    mut w: CodeWriter,
) -> Result<Option<String>> {
    if template.implements.is_empty() && template.constructor.is_none() {
        return Ok(None);
    }
    let constructor_params = template
        .constructor
        .as_ref()
        .map_or(&[][..], |c| c.parameters.as_slice());
    let (out, ctx) = body.names();
    let mut arguments = vec![out.clone(), ctx.clone()];
    let mut fields = Vec::new();
    for param in constructor_params {
        let ty = body.type_name(&param.ty, &param.position);
        fields.push((param.name.as_str(), declare(param, ty.clone()), ty));
        arguments.push(format!("this.{}", param.name));
    }
    let mut head = vec![format!("Appendable {out}"), format!("GxpContext {ctx}")];
    for param in &template.parameters {
        let ty = body.type_name(&param.ty, &param.position);
        head.push(declare(param, ty));
        arguments.push(param.name.clone());
    }
    let implements: Vec<String> = template.implements.iter().map(Implements::java_type).collect();
    let implements = if implements.is_empty() {
        String::new()
    } else {
        format!(" implements {}", implements.join(", "))
    };

    for annotation in template.annotations_for(AnnotationTarget::Instance) {
        w.line(annotation);
    }
    w.block(format!("public static class Instance{implements} {{"), "}", |w| {
        for (name, _, ty) in &fields {
            w.line(format!("private final {ty} {name};"));
        }
        if let Some(constructor) = &template.constructor {
            if !fields.is_empty() {
                w.blank();
            }
            let annotations =
                annotations_for(&constructor.annotations, AnnotationTarget::Constructor);
            for annotation in annotations {
                w.line(annotation);
            }
            let declared: Vec<&str> = fields
                .iter()
                .map(|(_, declared, _)| declared.as_str())
                .collect();
            w.block(format!("public Instance({}) {{", declared.join(", ")), "}", |w| {
                for (name, _, _) in &fields {
                    w.line(format!("this.{name} = {name};"));
                }
                Ok::<(), crate::error::Error>(())
            })?;
            w.blank();
        }
        w.block(
            format!(
                "public {}void write({}) {} {{",
                type_parameters(&template.type_parameters),
                head.join(", "),
                throws_clause(&template.throws)
            ),
            "}",
            |w| {
                w.line(format!(
                    "{}.write({});",
                    template.name.base_name(),
                    arguments.join(", ")
                ));
                Ok::<(), crate::error::Error>(())
            },
        )?;
        Ok::<(), crate::error::Error>(())
    })?;
    Ok(Some(w.finish_trimmed()))
}

fn imports(root: &Root) -> BTreeSet<String> {
    let mut imports = BTreeSet::from([CONTEXT_CLASS.to_string()]);
    let schemas = match root {
        Root::Template(t) => Some(&t.schema),
        Root::Interface(i) => Some(&i.schema),
        Root::Null(_) => None,
    };
    let content_schemas = write_parameters(root)
        .into_iter()
        .filter_map(|p| p.ty.content_schema());
    for schema in schemas.into_iter().chain(content_schemas) {
        if let Some(info) = schema.native_type(NativeLanguage::Java) {
            imports.extend(info.imports.iter().cloned());
        }
    }
    for import in root.imports() {
        match import {
            Import::Class { name, .. } => {
                imports.insert(name.to_string());
            }
            Import::Package { name, .. } => {
                imports.insert(format!("{name}.*"));
            }
            Import::CppLibrary { .. } | Import::CppFile { .. } => {}
        }
    }
    imports
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaGenerator;

impl CodeGenerator for JavaGenerator {
    fn language(&self) -> OutputLanguage {
        OutputLanguage::Java
    }

    fn description(&self) -> &str {
        "Java class with a static write method"
    }

    fn generate(
        &self,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String> {
        let dialect = JavaDialect;
        let mut w = CodeWriter::new(dialect.indent_unit());
        w.line(dialect.comment(&banner(tree.tree.position().source())));
        let Some(root) = tree.tree.root() else {
            return Ok(w.finish());
        };
        let name = root.name();
        if let Some(package) = name.package() {
            w.line(format!("package {package};"));
        }
        w.blank();
        for import in imports(root) {
            w.line(format!("import {import};"));
        }
        w.blank();

        let mut body = BodyWriter::new(&dialect, *options, sink);
        let (out, ctx) = body.names();
        let mut head = vec![format!("Appendable {out}"), format!("GxpContext {ctx}")];
        let params = write_parameters(root);
        for param in &params {
            let ty = body.type_name(&param.ty, &param.position);
            head.push(declare(param, ty));
        }
        let head = head.join(", ");

        match root {
            Root::Template(template) => {
                let generics = type_parameters(&template.type_parameters);
                let throws = throws_clause(&template.throws);
                let instance = instance_class(template, &mut body, w.nested())?;
                for annotation in template.annotations_for(AnnotationTarget::Class) {
                    w.line(annotation);
                }
                w.block(format!("public class {} {{", name.base_name()), "}", |w| {
                    w.block(
                        format!("public static {generics}void write({head}) {throws} {{"),
                        "}",
                        |w| body.statements(w, &template.content),
                    )?;
                    for param in &params {
                        let Some(default) = &param.default else {
                            continue;
                        };
                        let ty = body.type_name(&param.ty, &param.position);
                        let value = body.value(default, &param.ty)?;
                        w.blank();
                        w.block(
                            format!(
                                "public static {ty} getDefault{}() {{",
                                capitalize(&param.name)
                            ),
                            "}",
                            |w| {
                                w.line(format!("return {value};"));
                                Ok::<(), crate::error::Error>(())
                            },
                        )?;
                    }
                    for param in &params {
                        let Some(constructor) = &param.constructor else {
                            continue;
                        };
                        let ty = body.type_name(&param.ty, &param.position);
                        let value = body.value(constructor, &param.ty)?;
                        w.blank();
                        w.block(
                            format!(
                                "public static {ty} construct{}(String {}) {{",
                                capitalize(&param.name),
                                param.name
                            ),
                            "}",
                            |w| {
                                w.line(format!("return {value};"));
                                Ok::<(), crate::error::Error>(())
                            },
                        )?;
                    }
                    if let Some(instance) = &instance {
                        w.blank();
                        w.line(instance);
                    }
                    Ok::<(), crate::error::Error>(())
                })?;
            }
            Root::Interface(interface) => {
                let generics = type_parameters(&interface.type_parameters);
                let constructed: Vec<String> = params
                    .iter()
                    .filter(|param| param.has_constructor_flag)
                    .map(|param| {
                        format!(
                            "{} construct{}(String {});",
                            body.type_name(&param.ty, &param.position),
                            capitalize(&param.name),
                            param.name
                        )
                    })
                    .collect();
                let throws = throws_clause(&interface.throws);
                let annotations =
                    annotations_for(&interface.annotations, AnnotationTarget::Interface);
                for annotation in annotations {
                    w.line(annotation);
                }
                w.block(format!("public interface {} {{", name.base_name()), "}", |w| {
                    w.line(format!("{generics}void write({head}) {throws};"));
                    for line in constructed {
                        w.line(line);
                    }
                    Ok::<(), crate::error::Error>(())
                })?;
            }
            Root::Null(_) => {}
        }
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{extracted, generate, hello, priced, NAMESPACES};

    #[test]
    fn test_hello_class() {
        let (code, alerts) = generate(&JavaGenerator, &hello());
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(code.starts_with("// Generated from com/example/Hello.gxp. Do not edit.\n"));
        assert!(code.contains("package com.example;\n"));
        assert!(code.contains("import com.example.Card;\n"));
        assert!(code.contains("import com.google.gxp.base.GxpContext;\n"));
        assert!(code.contains("public class Hello {\n"));
        assert!(code.contains(
            "public static void write(Appendable out, GxpContext gxpContext, String user, int count, boolean visible) throws java.io.IOException {"
        ));
        assert!(code.contains("if (visible) {"), "{code}");
        assert!(code.contains("com.google.gxp.base.GxpMessages.append(out, gxpContext, "));
        assert!(code.contains("for (final int i : java.util.Arrays.asList(1, 2)) {"));
        assert!(code.contains("com.example.Card.write(out, gxpContext, \"Welcome\", (com.google.gxp.html.HtmlClosure) (out1, gxpContext1) -> {"));
        assert!(code.contains("public static int getDefaultCount() {\n    return 1;\n  }"));
    }

    #[test]
    fn test_constructed_argument() {
        let (shop, price) = priced();
        let (code, alerts) = generate(&JavaGenerator, &shop);
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(
            code.contains("com.example.Price.write(out, gxpContext, com.example.Price.constructAmount(\"12.50\"));"),
            "{code}"
        );
        let (code, _) = generate(&JavaGenerator, &price);
        assert!(
            code.contains("public static Money constructAmount(String amount) {\n    return Money.parse(amount);\n  }"),
            "{code}"
        );
    }

    #[test]
    fn test_missing_java_code() {
        let source = format!(
            r#"<gxp:template name="com.example.Cpp" {NAMESPACES} xmlns:cpp="http://google.com/2001/gxp/code/cpp"><b><gxp:eval cpp:expr="x"/></b></gxp:template>"#
        );
        let tree = extracted(&[("com/example/Cpp.gxp", &source)]);
        let (code, alerts) = generate(&JavaGenerator, &tree);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind(), crate::alert::AlertKind::MissingNativeCode);
        assert!(code.contains("INSTANCE.append(out, gxpContext, null);"), "{code}");
    }

    #[test]
    fn test_interface() {
        let source = format!(
            r#"<gxp:interface name="com.example.Widget" {NAMESPACES}><gxp:param name="size" type="int"/><gxp:param name="tag" type="Tag" has-constructor="true"/></gxp:interface>"#
        );
        let tree = extracted(&[("com/example/Widget.gxp", &source)]);
        let (code, _) = generate(&JavaGenerator, &tree);
        assert!(code.contains("public interface Widget {"));
        assert!(code.contains(
            "void write(Appendable out, GxpContext gxpContext, int size, Tag tag) throws java.io.IOException;"
        ));
        assert!(code.contains("Tag constructTag(String tag);"), "{code}");
    }

    const WIDGET: &str = r#"<gxp:interface name="com.example.Widget" NS>
  <gxp:param name="size" type="int"/>
</gxp:interface>"#;

    const PANEL: &str = r#"<gxp:template name="com.example.Panel" NS java:annotate="@Generated">
  <gxp:implements interface="Widget"/>
  <gxp:throws exception="com.example.RenderException"/>
  <java:annotate element="instance" with="@Singleton"/>
  <gxp:constructor>
    <java:annotate with="@Inject"/>
    <gxp:param name="theme" type="String"/>
  </gxp:constructor>
  <gxp:param name="size" type="int"><java:annotate with="@Positive"/></gxp:param>
  <b><gxp:eval expr="size"/></b>
</gxp:template>"#;

    fn with_java(source: &str) -> String {
        source.replace(
            "NS",
            &format!(r#"{NAMESPACES} xmlns:java="http://google.com/2001/gxp/code/java""#),
        )
    }

    #[test]
    fn test_annotations_throws_and_instance_class() {
        let tree = extracted(&[
            ("com/example/Panel.gxp", &with_java(PANEL)),
            ("com/example/Widget.gxp", &with_java(WIDGET)),
        ]);
        assert!(tree.tree.alerts().is_empty(), "{:?}", tree.tree.alerts());
        let (code, alerts) = generate(&JavaGenerator, &tree);
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(code.contains("@Generated\npublic class Panel {\n"), "{code}");
        assert!(code.contains(
            "public static void write(Appendable out, GxpContext gxpContext, String theme, @Positive int size) throws java.io.IOException, com.example.RenderException {"
        ));
        let instance = "  @Singleton
  public static class Instance implements com.example.Widget {
    private final String theme;

    @Inject
    public Instance(String theme) {
      this.theme = theme;
    }

    public void write(Appendable out, GxpContext gxpContext, @Positive int size) throws java.io.IOException, com.example.RenderException {
      Panel.write(out, gxpContext, this.theme, size);
    }
  }
";
        assert!(code.contains(instance), "{code}");
    }

    #[test]
    fn test_interface_annotations_and_throws() {
        let source = r#"<gxp:interface name="com.example.Widget" NS java:annotate="@Api">
  <gxp:throws exception="com.example.RenderException"/>
  <gxp:throws exception="java.io.IOException"/>
</gxp:interface>"#;
        let tree = extracted(&[("com/example/Widget.gxp", &with_java(source))]);
        let (code, _) = generate(&JavaGenerator, &tree);
        assert!(code.contains("@Api\npublic interface Widget {\n"), "{code}");
        assert!(code.contains(
            "void write(Appendable out, GxpContext gxpContext) throws java.io.IOException, com.example.RenderException;"
        ));
        assert!(!code.contains("Instance"));
    }

    #[test]
    fn test_boxed_iterator_type() {
        let lines = JavaDialect.loop_open("int", "i", "xs.iterator()", true, "it");
        assert_eq!(
            lines[0],
            "for (java.util.Iterator<Integer> it = xs.iterator(); it.hasNext(); ) {"
        );
    }
}
