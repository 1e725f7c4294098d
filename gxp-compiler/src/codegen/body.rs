//! Statement emission shared by the curly-brace target languages.
//!
//! [`BodyWriter`] walks a template body and writes one statement per piece of output: static
//! text is appended as a string literal, dynamic values go through the appender of their
//! schema, conditionals and loops become the language's own control flow. Content passed as a
//! value (call arguments, content typed abbreviations, message parameters) becomes a closure
//! literal whose body is written the same way.
//!
//! What differs between languages is confined to [`Dialect`].

use super::writer::CodeWriter;
use super::GenerateOptions;
use crate::alert::{Alert, AlertKind, AlertSink, SourcePosition};
use crate::ast::{
    Callee, Expression, LoopSource, Message, NativeExpression, Parameter, Root, TemplateName,
    Type,
};
use crate::error::{Error, Result};
use crate::lang::NativeLanguage;
use crate::schema::Schema;
use crate::tree::Node;
use std::sync::Arc;

/// The language specific spelling of each construct the body writer emits.
pub trait Dialect {
    fn language(&self) -> NativeLanguage;

    fn indent_unit(&self) -> &'static str {
        "  "
    }

    /// Names of the output and context variables of a write function.
    fn base_names(&self) -> (&'static str, &'static str);

    fn quote(&self, text: &str) -> String {
        serde_json::to_string(text).unwrap_or_default()
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}")
    }

    fn null(&self) -> &'static str;

    /// Stands in for a type with no name in this language.
    fn unknown_type(&self) -> &'static str;

    fn append_text(&self, out: &str, literal: &str) -> String;

    /// Appends a dynamic `value`, escaped for `schema`.
    fn append_value(&self, out: &str, ctx: &str, schema: &Schema, value: &str) -> String;

    fn is_xml(&self, ctx: &str) -> String;

    fn local(&self, ty: &str, name: &str, value: &str) -> String;

    fn flag(&self, name: &str) -> String;

    /// The opening line of a loop over `source` and any statements that must start its
    /// body. `scratch` is a fresh name the loop may use for an iterator.
    fn loop_open(
        &self,
        ty: &str,
        var: &str,
        source: &str,
        iterator: bool,
        scratch: &str,
    ) -> Vec<String>;

    fn closure_open(&self, schema: Option<&Arc<Schema>>, out: &str, ctx: &str) -> String;

    fn closure_close(&self) -> &'static str {
        "}"
    }

    fn call(&self, callee: &TemplateName, out: &str, ctx: &str, args: &[String]) -> String;

    /// The default value of `param` of `callee`.
    fn default_of(&self, callee: &TemplateName, param: &Parameter) -> String;

    /// Builds a value of `param` of `callee` from the string `literal` through the
    /// callee's constructor.
    fn construct(&self, callee: &TemplateName, param: &str, literal: &str) -> String;

    fn message(
        &self,
        out: &str,
        ctx: &str,
        schema: Option<&Arc<Schema>>,
        message: &Message,
        params: &[String],
    ) -> String;
}

/// Parameters of a template's write function: constructor parameters first.
pub fn write_parameters(root: &Root) -> Vec<&Parameter> {
    match root {
        Root::Template(template) => template
            .constructor
            .iter()
            .flat_map(|c| c.parameters.iter())
            .chain(template.parameters.iter())
            .collect(),
        Root::Interface(interface) => interface.parameters.iter().collect(),
        Root::Null(_) => Vec::new(),
    }
}

pub struct BodyWriter<'a> {
    dialect: &'a dyn Dialect,
    sink: &'a mut dyn AlertSink,
    options: GenerateOptions,
    depth: usize,
    scratch: usize,
}

impl<'a> BodyWriter<'a> {
    pub fn new(
        dialect: &'a dyn Dialect,
        options: GenerateOptions,
        sink: &'a mut dyn AlertSink,
    ) -> Self {
        BodyWriter {
            dialect,
            sink,
            options,
            depth: 0,
            scratch: 0,
        }
    }

    /// Output and context variable names at the current closure depth.
    pub fn names(&self) -> (String, String) {
        let (out, ctx) = self.dialect.base_names();
        if self.depth == 0 {
            (out.to_string(), ctx.to_string())
        } else {
            (format!("{out}{}", self.depth), format!("{ctx}{}", self.depth))
        }
    }

    fn fresh(&mut self, stem: &str) -> String {
        self.scratch += 1;
        format!("gxp_{stem}{}", self.scratch)
    }

    fn missing_native_code(&mut self, position: &SourcePosition, what: &str) {
        self.sink.add(Alert::new(
            AlertKind::MissingNativeCode,
            position.clone(),
            format!("{what} has no {} code", self.dialect.language()),
        ));
    }

    pub fn type_name(&mut self, ty: &Type, position: &SourcePosition) -> String {
        match ty.native_name(self.dialect.language()) {
            Some(name) => name,
            None => {
                self.missing_native_code(position, &format!("type '{ty}'"));
                self.dialect.unknown_type().to_string()
            }
        }
    }

    pub fn native(&mut self, native: &NativeExpression) -> String {
        match native.code.get(self.dialect.language()) {
            Some(code) => code.to_string(),
            None => {
                self.missing_native_code(&native.position, &format!("expression '{}'", native.code));
                self.dialect.null().to_string()
            }
        }
    }

    /// A value of type `ty`: closures for content, target language code for anything else.
    pub fn value(&mut self, expr: &Expression, ty: &Type) -> Result<String> {
        match ty {
            Type::Content(schema) => self.closure(expr, Some(schema)),
            Type::Native(_) | Type::Boolean => self.scalar(expr),
        }
    }

    fn scalar(&mut self, expr: &Expression) -> Result<String> {
        match expr {
            Expression::Native(native) => Ok(self.native(native)),
            Expression::Constructed(constant) => Ok(self.dialect.construct(
                &constant.callee,
                &constant.param,
                &self.dialect.quote(&constant.value),
            )),
            Expression::BooleanConstant(b) => Ok(b.value.to_string()),
            Expression::IsXml(_) => Ok(self.dialect.is_xml(&self.names().1)),
            Expression::StringConstant(text) => Ok(self.dialect.quote(&text.value)),
            Expression::Escape(escape) => self.scalar(&escape.inner),
            other => Err(Error::unexpected("code generation", other.display_name())),
        }
    }

    fn closure(&mut self, expr: &Expression, schema: Option<&Arc<Schema>>) -> Result<String> {
        let dialect = self.dialect;
        self.depth += 1;
        let (out, ctx) = self.names();
        let mut w = CodeWriter::new(dialect.indent_unit());
        let written = w
            .block(
                dialect.closure_open(schema, &out, &ctx),
                dialect.closure_close(),
                |w| self.statements(w, expr),
            )
            .map(|_| ());
        self.depth -= 1;
        written?;
        Ok(w.finish_trimmed())
    }

    /// Writes the statements that produce `expr`.
    pub fn statements(&mut self, w: &mut CodeWriter, expr: &Expression) -> Result<()> {
        let dialect = self.dialect;
        let (out, ctx) = self.names();
        if self.options.debug_comments
            && !matches!(expr, Expression::Concatenation(_) | Expression::NoMessage(_))
            && !expr.position().is_whole_file()
        {
            w.line(dialect.comment(&expr.position().to_string()));
        }
        match expr {
            Expression::StringConstant(text) => {
                if !text.value.is_empty() {
                    w.line(dialect.append_text(&out, &dialect.quote(&text.value)));
                }
            }
            Expression::Concatenation(concat) => {
                for value in &concat.values {
                    self.statements(w, value)?;
                }
            }
            Expression::Conditional(cond) => {
                if cond.clauses.is_empty() {
                    return self.statements(w, &cond.otherwise);
                }
                for (i, clause) in cond.clauses.iter().enumerate() {
                    let predicate = self.scalar(&clause.predicate)?;
                    if i == 0 {
                        w.line(format!("if ({predicate}) {{"));
                    } else {
                        w.dedent().line(format!("}} else if ({predicate}) {{"));
                    }
                    w.indent();
                    self.statements(w, &clause.body)?;
                }
                if cond.otherwise.static_string() != Some("") {
                    w.dedent().line("} else {").indent();
                    self.statements(w, &cond.otherwise)?;
                }
                w.dedent().line("}");
            }
            Expression::Loop(l) => {
                let (source, iterator) = match &l.source {
                    LoopSource::Iterable(e) => (self.scalar(e)?, false),
                    LoopSource::Iterator(e) => (self.scalar(e)?, true),
                };
                let ty = self.type_name(&l.ty, &l.position);
                let delimited = l.delimiter.static_string() != Some("");
                let first = self.fresh("first");
                let scratch = self.fresh("it");
                if delimited {
                    w.line(dialect.flag(&first));
                }
                let mut open = dialect
                    .loop_open(&ty, &l.var, &source, iterator, &scratch)
                    .into_iter();
                w.line(open.next().unwrap_or_default()).indent();
                for line in open {
                    w.line(line);
                }
                if delimited {
                    w.line(format!("if (!{first}) {{")).indent();
                    self.statements(w, &l.delimiter)?;
                    w.dedent().line("}");
                    w.line(format!("{first} = false;"));
                }
                self.statements(w, &l.body)?;
                w.dedent().line("}");
            }
            Expression::Abbr(abbr) => {
                let ty = self.type_name(&abbr.ty, &abbr.position);
                let value = self.value(&abbr.value, &abbr.ty)?;
                w.line("{").indent();
                w.line(dialect.local(&ty, &abbr.name, &value));
                self.statements(w, &abbr.body)?;
                w.dedent().line("}");
            }
            Expression::Call(call) => {
                let callable = match &call.callee {
                    Callee::Bound(callable) => callable,
                    Callee::Unbound(_) => {
                        return Err(Error::unexpected("code generation", "unbound call"))
                    }
                };
                let mut args = Vec::with_capacity(callable.parameters.len());
                for param in &callable.parameters {
                    let arg = match call.arguments.get(&param.name) {
                        Some(argument) => {
                            let value = self.value(&argument.value, &param.ty)?;
                            match &argument.condition {
                                Some(condition) => format!(
                                    "({}) ? {value} : {}",
                                    self.scalar(condition)?,
                                    dialect.default_of(&callable.name, param)
                                ),
                                None => value,
                            }
                        }
                        None if param.has_default() => dialect.default_of(&callable.name, param),
                        None => dialect.null().to_string(),
                    };
                    args.push(arg);
                }
                w.line(dialect.call(&callable.name, &out, &ctx, &args));
            }
            Expression::Escape(escape) => {
                let value = match escape.inner.as_ref() {
                    inner @ (Expression::Native(_)
                    | Expression::Constructed(_)
                    | Expression::BooleanConstant(_)
                    | Expression::IsXml(_)) => self.scalar(inner)?,
                    inner => {
                        let schema = inner.schema();
                        self.closure(inner, Some(schema.as_ref().unwrap_or(&escape.schema)))?
                    }
                };
                w.line(dialect.append_value(&out, &ctx, &escape.schema, &value));
            }
            Expression::ExtractedMessage(message) => {
                let mut params = Vec::with_capacity(message.parameters.len());
                for param in &message.parameters {
                    let schema = param.schema().or_else(|| message.schema.clone());
                    params.push(self.closure(param, schema.as_ref())?);
                }
                w.line(dialect.message(
                    &out,
                    &ctx,
                    message.schema.as_ref(),
                    &message.message,
                    &params,
                ));
            }
            Expression::NoMessage(nomsg) => self.statements(w, &nomsg.content)?,
            Expression::Placeholder(ph) => self.statements(w, &ph.content)?,
            other @ (Expression::BooleanConstant(_)
            | Expression::Native(_)
            | Expression::Constructed(_)
            | Expression::IsXml(_)
            | Expression::Collapse(_)
            | Expression::OutputElement(_)
            | Expression::Message(_)
            | Expression::PlaceholderStart(_)
            | Expression::PlaceholderEnd(_)) => {
                return Err(Error::unexpected("code generation", other.display_name()))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MultiLanguageValue;
    use crate::codegen::java::JavaDialect;

    fn pos() -> SourcePosition {
        SourcePosition::new("T.gxp", 3, 5)
    }

    #[test]
    fn test_missing_native_code_alerts_and_substitutes() {
        let mut alerts = Vec::new();
        let mut body = BodyWriter::new(&JavaDialect, GenerateOptions::default(), &mut alerts);
        let mut code = MultiLanguageValue::default();
        code.per_language.insert(NativeLanguage::Cpp, "x.size()".to_string());
        let native = NativeExpression {
            position: pos(),
            code,
            example: None,
            ph_name: None,
        };
        assert_eq!(body.native(&native), "null");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind(), AlertKind::MissingNativeCode);
    }

    #[test]
    fn test_closure_names_are_numbered_by_depth() {
        let mut alerts = Vec::new();
        let mut body = BodyWriter::new(&JavaDialect, GenerateOptions::default(), &mut alerts);
        assert_eq!(body.names(), ("out".to_string(), "gxpContext".to_string()));
        let text = Expression::string(pos(), None, "hi");
        let closure = body.closure(&text, None).unwrap();
        assert!(closure.contains("out1.append(\"hi\");"), "{closure}");
        assert_eq!(body.names().0, "out");
    }

    #[test]
    fn test_debug_comments() {
        let mut alerts = Vec::new();
        let options = GenerateOptions {
            debug_comments: true,
        };
        let mut body = BodyWriter::new(&JavaDialect, options, &mut alerts);
        let mut w = CodeWriter::new("  ");
        body.statements(&mut w, &Expression::string(pos(), None, "hi"))
            .unwrap();
        assert_eq!(w.finish(), "// T.gxp:3:5\nout.append(\"hi\");\n");
    }

    #[test]
    fn test_unexpected_node() {
        let mut alerts = Vec::new();
        let mut body = BodyWriter::new(&JavaDialect, GenerateOptions::default(), &mut alerts);
        let mut w = CodeWriter::new("  ");
        let err = body
            .statements(&mut w, &Expression::boolean(pos(), true))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedNode { .. }));
    }
}
