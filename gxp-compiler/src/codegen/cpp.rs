//! C++ output: a class declaration in the header and its definitions in the source file.

use super::body::{write_parameters, BodyWriter, Dialect};
use super::writer::CodeWriter;
use super::{banner, capitalize, CodeGenerator, GenerateOptions};
use crate::alert::AlertSink;
use crate::ast::{Import, Message, Parameter, Root, TemplateName};
use crate::error::{Error, Result};
use crate::lang::{NativeLanguage, OutputLanguage};
use crate::phases::MessageExtractedTree;
use crate::schema::Schema;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct CppDialect;

/// `::com::example::Hello`
fn qualified(name: &TemplateName) -> String {
    name.segments()
        .iter()
        .map(|segment| format!("::{segment}"))
        .collect()
}

fn header_path(name: &TemplateName) -> String {
    format!("{}.h", name.segments().join("/"))
}

fn include_guard(name: &TemplateName) -> String {
    format!("{}_H__", name.segments().join("_").to_uppercase())
}

impl Dialect for CppDialect {
    fn language(&self) -> NativeLanguage {
        NativeLanguage::Cpp
    }

    fn base_names(&self) -> (&'static str, &'static str) {
        ("out", "gxp_context")
    }

    fn null(&self) -> &'static str {
        "nullptr"
    }

    fn unknown_type(&self) -> &'static str {
        "void*"
    }

    fn append_text(&self, out: &str, literal: &str) -> String {
        format!("{out}->Append({literal});")
    }

    fn append_value(&self, out: &str, ctx: &str, schema: &Schema, value: &str) -> String {
        match schema
            .native_type(NativeLanguage::Cpp)
            .and_then(|t| t.appender.as_deref())
        {
            Some(appender) => format!("{appender}::Append({out}, {ctx}, {value});"),
            None => format!(
                "gxp::AppendEscaped({out}, {ctx}, {}, {value});",
                self.quote(&schema.content_type)
            ),
        }
    }

    fn is_xml(&self, ctx: &str) -> String {
        format!("{ctx}->IsUsingXmlSyntax()")
    }

    fn local(&self, ty: &str, name: &str, value: &str) -> String {
        format!("const {ty} {name} = {value};")
    }

    fn flag(&self, name: &str) -> String {
        format!("bool {name} = true;")
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
                format!("for (auto {scratch} = {source}; !{scratch}.AtEnd(); {scratch}.Next()) {{"),
                format!("const {ty}& {var} = {scratch}.Get();"),
            ]
        } else {
            vec![format!("for (const {ty}& {var} : {source}) {{")]
        }
    }

    fn closure_open(&self, schema: Option<&Arc<Schema>>, out: &str, ctx: &str) -> String {
        let ty = schema
            .and_then(|s| s.native_type(NativeLanguage::Cpp))
            .map_or("GxpClosure", |t| t.type_name.as_str());
        format!("{ty}([&](Appendable* {out}, GxpContext* {ctx}) {{")
    }

    fn closure_close(&self) -> &'static str {
        "})"
    }

    fn call(&self, callee: &TemplateName, out: &str, ctx: &str, args: &[String]) -> String {
        let mut all = vec![out.to_string(), ctx.to_string()];
        all.extend(args.iter().cloned());
        format!("{}::Write({});", qualified(callee), all.join(", "))
    }

    fn default_of(&self, callee: &TemplateName, param: &Parameter) -> String {
        format!("{}::GetDefault{}()", qualified(callee), capitalize(&param.name))
    }

    fn construct(&self, callee: &TemplateName, param: &str, literal: &str) -> String {
        format!("{}::Construct{}({literal})", qualified(callee), capitalize(param))
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
            format!("{}ULL", message.id),
            self.quote(&message.presentation),
        ];
        all.extend(params.iter().cloned());
        format!("gxp::AppendMessage({});", all.join(", "))
    }
}

/// The pieces of a class both files need.
struct Declarations<'t> {
    write_params: String,
    /// (type, parameter) for every parameter with a default.
    defaults: Vec<(String, &'t Parameter)>,
    /// (type, parameter) for every parameter built from a string.
    constructed: Vec<(String, &'t Parameter)>,
}

fn constructor_signature(ty: &str, class: Option<&str>, param: &Parameter) -> String {
    let scope = class.map(|class| format!("{class}::")).unwrap_or_default();
    format!(
        "{ty} {scope}Construct{}(const std::string& {})",
        capitalize(&param.name),
        param.name
    )
}

fn declarations<'t>(root: &'t Root, body: &mut BodyWriter<'_>) -> Declarations<'t> {
    let (out, ctx) = body.names();
    let mut head = vec![format!("Appendable* {out}"), format!("GxpContext* {ctx}")];
    let mut defaults = Vec::new();
    let mut constructed = Vec::new();
    for param in write_parameters(root) {
        let ty = body.type_name(&param.ty, &param.position);
        head.push(format!("{ty} {}", param.name));
        if param.has_constructor() {
            constructed.push((ty.clone(), param));
        }
        if param.default.is_some() {
            defaults.push((ty, param));
        }
    }
    Declarations {
        write_params: head.join(", "),
        defaults,
        constructed,
    }
}

/// Opens one namespace per package segment, runs `body`, closes them again.
fn in_namespaces(
    w: &mut CodeWriter,
    name: &TemplateName,
    body: impl FnOnce(&mut CodeWriter) -> Result<()>,
) -> Result<()> {
    let segments = name.segments();
    let package = &segments[..segments.len().saturating_sub(1)];
    for segment in package {
        w.line(format!("namespace {segment} {{"));
    }
    if !package.is_empty() {
        w.blank();
    }
    body(w)?;
    if !package.is_empty() {
        w.blank();
    }
    for segment in package.iter().rev() {
        w.line(format!("}}  // namespace {segment}"));
    }
    Ok(())
}

fn includes(root: &Root) -> BTreeSet<String> {
    let mut includes = BTreeSet::from(["\"gxp/base/base.h\"".to_string()]);
    let schemas = match root {
        Root::Template(t) => Some(&t.schema),
        Root::Interface(i) => Some(&i.schema),
        Root::Null(_) => None,
    };
    let content_schemas = write_parameters(root)
        .into_iter()
        .filter_map(|p| p.ty.content_schema());
    for schema in schemas.into_iter().chain(content_schemas) {
        if let Some(info) = schema.native_type(NativeLanguage::Cpp) {
            includes.extend(info.imports.iter().map(|file| format!("\"{file}\"")));
        }
    }
    for import in root.imports() {
        match import {
            Import::Class { name, .. } => {
                includes.insert(format!("\"{}\"", header_path(name)));
            }
            Import::CppLibrary { library, .. } => {
                includes.insert(format!("<{library}>"));
            }
            Import::CppFile { file, .. } => {
                includes.insert(format!("\"{file}\""));
            }
            Import::Package { .. } => {}
        }
    }
    includes
}

/// The `.h` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CppHeaderGenerator;

impl CodeGenerator for CppHeaderGenerator {
    fn language(&self) -> OutputLanguage {
        OutputLanguage::CppHeader
    }

    fn description(&self) -> &str {
        "C++ class declaration"
    }

    fn generate(
        &self,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String> {
        let dialect = CppDialect;
        let mut w = CodeWriter::new(dialect.indent_unit());
        w.line(dialect.comment(&banner(tree.tree.position().source())));
        let Some(root) = tree.tree.root() else {
            return Ok(w.finish());
        };
        let name = root.name();
        let guard = include_guard(name);
        w.line(format!("#ifndef {guard}")).line(format!("#define {guard}")).blank();
        for include in includes(root) {
            w.line(format!("#include {include}"));
        }
        w.blank();

        let mut body = BodyWriter::new(&dialect, *options, sink);
        let decls = declarations(root, &mut body);
        in_namespaces(&mut w, name, |w| {
            let type_params = match root {
                Root::Template(t) => &t.type_parameters,
                Root::Interface(i) => &i.type_parameters,
                Root::Null(_) => return Ok(()),
            };
            if !type_params.is_empty() {
                let list: Vec<String> = type_params
                    .iter()
                    .map(|p| format!("typename {}", p.name))
                    .collect();
                w.line(format!("template <{}>", list.join(", ")));
            }
            w.block(format!("class {} {{", name.base_name()), "};", |w| {
                w.line(" public:");
                match root {
                    Root::Interface(_) => {
                        w.line(format!("virtual ~{}() {{}}", name.base_name()));
                        w.line(format!("virtual void Write({}) = 0;", decls.write_params));
                        for (ty, param) in &decls.constructed {
                            w.line(format!(
                                "virtual {} = 0;",
                                constructor_signature(ty, None, param)
                            ));
                        }
                    }
                    _ => {
                        w.line(format!("static void Write({});", decls.write_params));
                        for (ty, param) in &decls.defaults {
                            w.line(format!("static {ty} GetDefault{}();", capitalize(&param.name)));
                        }
                        for (ty, param) in &decls.constructed {
                            w.line(format!("static {};", constructor_signature(ty, None, param)));
                        }
                    }
                }
                Ok::<(), Error>(())
            })?;
            Ok(())
        })?;
        w.blank().line(format!("#endif  // {guard}"));
        Ok(w.finish())
    }
}

/// The `.cc` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CppGenerator;

impl CodeGenerator for CppGenerator {
    fn language(&self) -> OutputLanguage {
        OutputLanguage::Cpp
    }

    fn description(&self) -> &str {
        "C++ class definition"
    }

    fn generate(
        &self,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String> {
        let dialect = CppDialect;
        let mut w = CodeWriter::new(dialect.indent_unit());
        w.line(dialect.comment(&banner(tree.tree.position().source())));
        let Some(root) = tree.tree.root() else {
            return Ok(w.finish());
        };
        let name = root.name();
        w.line(format!("#include \"{}\"", header_path(name))).blank();

        let Root::Template(template) = root else {
            return Ok(w.finish());
        };
        let mut body = BodyWriter::new(&dialect, *options, sink);
        let decls = declarations(root, &mut body);
        let class = name.base_name();
        in_namespaces(&mut w, name, |w| {
            w.block(
                format!("void {class}::Write({}) {{", decls.write_params),
                "}",
                |w| body.statements(w, &template.content),
            )?;
            for (ty, param) in &decls.defaults {
                let Some(default) = &param.default else {
                    continue;
                };
                let value = body.value(default, &param.ty)?;
                w.blank();
                w.block(
                    format!("{ty} {class}::GetDefault{}() {{", capitalize(&param.name)),
                    "}",
                    |w| {
                        w.line(format!("return {value};"));
                        Ok::<(), Error>(())
                    },
                )?;
            }
            for (ty, param) in &decls.constructed {
                let Some(constructor) = &param.constructor else {
                    continue;
                };
                let value = body.value(constructor, &param.ty)?;
                w.blank();
                w.block(
                    format!("{} {{", constructor_signature(ty, Some(class), param)),
                    "}",
                    |w| {
                        w.line(format!("return {value};"));
                        Ok::<(), Error>(())
                    },
                )?;
            }
            Ok(())
        })?;
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{generate, hello, priced};

    #[test]
    fn test_names() {
        let name = TemplateName::parse("com.example.Hello").unwrap();
        assert_eq!(qualified(&name), "::com::example::Hello");
        assert_eq!(header_path(&name), "com/example/Hello.h");
        assert_eq!(include_guard(&name), "COM_EXAMPLE_HELLO_H__");
    }

    #[test]
    fn test_header() {
        let (code, alerts) = generate(&CppHeaderGenerator, &hello());
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(code.contains("#ifndef COM_EXAMPLE_HELLO_H__\n#define COM_EXAMPLE_HELLO_H__\n"));
        assert!(code.contains("#include \"com/example/Card.h\"\n"));
        assert!(code.contains("#include \"gxp/html/html.h\"\n"));
        assert!(code.contains("namespace com {\nnamespace example {\n"));
        assert!(code.contains(
            "  static void Write(Appendable* out, GxpContext* gxp_context, String user, int count, boolean visible);\n"
        ));
        assert!(code.contains("  static int GetDefaultCount();\n"));
        assert!(code.ends_with("}  // namespace com\n\n#endif  // COM_EXAMPLE_HELLO_H__\n"));
    }

    #[test]
    fn test_source() {
        let (code, alerts) = generate(&CppGenerator, &hello());
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(code.contains("#include \"com/example/Hello.h\"\n"));
        assert!(code.contains(
            "void Hello::Write(Appendable* out, GxpContext* gxp_context, String user, int count, boolean visible) {\n"
        ));
        assert!(code.contains("::com::example::Card::Write(out, gxp_context, \"Welcome\", HtmlClosure([&](Appendable* out1, GxpContext* gxp_context1) {"));
        assert!(code.contains("for (const int& i : java.util.Arrays.asList(1, 2)) {"));
        assert!(code.contains("int Hello::GetDefaultCount() {\n  return 1;\n}"));
    }

    #[test]
    fn test_constructed_argument() {
        let (shop, price) = priced();
        let (code, alerts) = generate(&CppGenerator, &shop);
        assert!(alerts.is_empty(), "{alerts:?}");
        assert!(
            code.contains("::com::example::Price::Write(out, gxp_context, ::com::example::Price::ConstructAmount(\"12.50\"));"),
            "{code}"
        );
        let (header, _) = generate(&CppHeaderGenerator, &price);
        assert!(
            header.contains("  static Money ConstructAmount(const std::string& amount);\n"),
            "{header}"
        );
        let (source, _) = generate(&CppGenerator, &price);
        assert!(
            source.contains(
                "Money Price::ConstructAmount(const std::string& amount) {\n  return Money.parse(amount);\n}"
            ),
            "{source}"
        );
    }
}
