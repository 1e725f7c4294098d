//! JavaScript output in the Closure Library module style.

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
pub struct JavaScriptDialect;

impl Dialect for JavaScriptDialect {
    fn language(&self) -> NativeLanguage {
        NativeLanguage::JavaScript
    }

    fn base_names(&self) -> (&'static str, &'static str) {
        ("out", "gxpContext")
    }

    fn null(&self) -> &'static str {
        "null"
    }

    fn unknown_type(&self) -> &'static str {
        "*"
    }

    fn append_text(&self, out: &str, literal: &str) -> String {
        format!("{out}.append({literal});")
    }

    fn append_value(&self, out: &str, ctx: &str, schema: &Schema, value: &str) -> String {
        format!(
            "goog.gxp.append({out}, {ctx}, {}, {value});",
            self.quote(&schema.content_type)
        )
    }

    fn is_xml(&self, ctx: &str) -> String {
        format!("{ctx}.isUsingXmlSyntax()")
    }

    /// Types only appear in the JSDoc of a local.
    fn local(&self, ty: &str, name: &str, value: &str) -> String {
        format!("/** @type {{{ty}}} */\nconst {name} = {value};")
    }

    fn flag(&self, name: &str) -> String {
        format!("let {name} = true;")
    }

    fn loop_open(
        &self,
        _ty: &str,
        var: &str,
        source: &str,
        iterator: bool,
        scratch: &str,
    ) -> Vec<String> {
        if iterator {
            vec![
                format!("for (let {scratch} = {source}.next(); !{scratch}.done; {scratch} = {source}.next()) {{"),
                format!("const {var} = {scratch}.value;"),
            ]
        } else {
            vec![format!("for (const {var} of {source}) {{")]
        }
    }

    fn closure_open(&self, _schema: Option<&Arc<Schema>>, out: &str, ctx: &str) -> String {
        format!("function({out}, {ctx}) {{")
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
            self.quote(&message.id),
            self.quote(&message.presentation),
        ];
        all.extend(params.iter().cloned());
        format!("goog.gxp.appendMessage({});", all.join(", "))
    }
}

fn requires(root: &Root) -> BTreeSet<String> {
    let mut requires = BTreeSet::from(["goog.gxp".to_string()]);
    for import in root.imports() {
        if let Import::Class { name, .. } = import {
            requires.insert(name.to_string());
        }
    }
    requires
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptGenerator;

impl CodeGenerator for JavaScriptGenerator {
    fn language(&self) -> OutputLanguage {
        OutputLanguage::JavaScript
    }

    fn description(&self) -> &str {
        "Closure Library module with a write function"
    }

    fn generate(
        &self,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String> {
        let dialect = JavaScriptDialect;
        let mut w = CodeWriter::new(dialect.indent_unit());
        w.line(dialect.comment(&banner(tree.tree.position().source())));
        let Some(root) = tree.tree.root() else {
            return Ok(w.finish());
        };
        let name = root.name();
        w.blank().line(format!("goog.provide('{name}');")).blank();
        for require in requires(root) {
            w.line(format!("goog.require('{require}');"));
        }
        w.blank();

        let Root::Template(template) = root else {
            // interfaces only exist for type checking
            return Ok(w.finish());
        };
        let mut body = BodyWriter::new(&dialect, *options, sink);
        let (out, ctx) = body.names();
        let params = write_parameters(root);
        let mut doc = vec!["/**".to_string()];
        let mut head = vec![out.clone(), ctx.clone()];
        for param in &params {
            let ty = body.type_name(&param.ty, &param.position);
            doc.push(format!(" * @param {{{ty}}} {}", param.name));
            head.push(param.name.clone());
        }
        doc.push(" */".to_string());
        for line in doc {
            w.line(line);
        }
        w.block(
            format!("{name}.write = function({}) {{", head.join(", ")),
            "};",
            |w| body.statements(w, &template.content),
        )?;
        for param in &params {
            let Some(default) = &param.default else {
                continue;
            };
            let value = body.value(default, &param.ty)?;
            w.blank();
            w.block(
                format!("{name}.getDefault{} = function() {{", capitalize(&param.name)),
                "};",
                |w| {
                    w.line(format!("return {value};"));
                    Ok::<(), Error>(())
                },
            )?;
        }
        for param in &params {
            let Some(constructor) = &param.constructor else {
                continue;
            };
            let value = body.value(constructor, &param.ty)?;
            w.blank();
            w.block(
                format!(
                    "{name}.construct{} = function({}) {{",
                    capitalize(&param.name),
                    param.name
                ),
                "};",
                |w| {
                    w.line(format!("return {value};"));
                    Ok::<(), Error>(())
                },
            )?;
        }
        Ok(w.finish())
    }
}
