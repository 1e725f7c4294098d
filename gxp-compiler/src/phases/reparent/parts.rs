//! Per-element buckets of already built children.
//!
//! Children are built before their parent. Each built child lands in the bucket matching its
//! kind in a [`PartsBuilder`]; once all children are in, the builder freezes into [`Parts`],
//! from which the parent's builder takes the buckets it understands. Anything left over was
//! placed somewhere it does not belong and is reported by [`Parts::report_unused`].

use super::attributes::AttributeMap;
use crate::alert::{Alert, AlertKind, AlertSink, SourcePosition};
use crate::ast::{
    Clause, Concatenation, Constructor, Expression, FormalTypeParameter, Implements, Import,
    JavaAnnotation, Parameter, Root, Throws,
};
use crate::tree::Node;
use std::collections::HashSet;

pub struct PartsBuilder {
    position: SourcePosition,
    element: String,
    pub attributes: AttributeMap,
    roots: Vec<Root>,
    constructors: Vec<Constructor>,
    values: Vec<Expression>,
    imports: Vec<Import>,
    import_keys: HashSet<String>,
    parameters: Vec<Parameter>,
    type_parameters: Vec<FormalTypeParameter>,
    clauses: Vec<Clause>,
    annotations: Vec<JavaAnnotation>,
    implements: Vec<Implements>,
    throws: Vec<Throws>,
}

impl PartsBuilder {
    pub fn new(position: SourcePosition, element: impl Into<String>) -> Self {
        let element = element.into();
        PartsBuilder {
            attributes: AttributeMap::new(position.clone(), element.clone()),
            position,
            element,
            roots: Vec::new(),
            constructors: Vec::new(),
            values: Vec::new(),
            imports: Vec::new(),
            import_keys: HashSet::new(),
            parameters: Vec::new(),
            type_parameters: Vec::new(),
            clauses: Vec::new(),
            annotations: Vec::new(),
            implements: Vec::new(),
            throws: Vec::new(),
        }
    }

    pub fn add_root(&mut self, root: Root) {
        self.roots.push(root);
    }

    pub fn add_constructor(&mut self, constructor: Constructor) {
        self.constructors.push(constructor);
    }

    pub fn add_value(&mut self, value: Expression) {
        self.values.push(value);
    }

    pub fn add_import(&mut self, import: Import, sink: &mut dyn AlertSink) {
        if !self.import_keys.insert(import.key()) {
            sink.add(Alert::new(
                AlertKind::BadNodePlacement,
                import.position().clone(),
                format!("duplicate import of {}", import.key()),
            ));
            return;
        }
        self.imports.push(import);
    }

    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn add_type_parameter(&mut self, type_parameter: FormalTypeParameter) {
        self.type_parameters.push(type_parameter);
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn add_annotation(&mut self, annotation: JavaAnnotation) {
        self.annotations.push(annotation);
    }

    pub fn add_implements(&mut self, implements: Implements) {
        self.implements.push(implements);
    }

    pub fn add_throws(&mut self, throws: Throws) {
        self.throws.push(throws);
    }

    pub fn finish(self) -> Parts {
        Parts {
            position: self.position,
            element: self.element,
            attributes: self.attributes,
            roots: self.roots,
            constructors: self.constructors,
            values: self.values,
            imports: self.imports,
            parameters: self.parameters,
            type_parameters: self.type_parameters,
            clauses: self.clauses,
            annotations: self.annotations,
            implements: self.implements,
            throws: self.throws,
        }
    }
}

/// Frozen children of one element. Every `take_*` empties its bucket.
pub struct Parts {
    position: SourcePosition,
    element: String,
    pub attributes: AttributeMap,
    roots: Vec<Root>,
    constructors: Vec<Constructor>,
    values: Vec<Expression>,
    imports: Vec<Import>,
    parameters: Vec<Parameter>,
    type_parameters: Vec<FormalTypeParameter>,
    clauses: Vec<Clause>,
    annotations: Vec<JavaAnnotation>,
    implements: Vec<Implements>,
    throws: Vec<Throws>,
}

impl Parts {
    pub fn position(&self) -> &SourcePosition {
        &self.position
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn take_roots(&mut self) -> Vec<Root> {
        std::mem::take(&mut self.roots)
    }

    pub fn take_constructors(&mut self) -> Vec<Constructor> {
        std::mem::take(&mut self.constructors)
    }

    pub fn take_values(&mut self) -> Vec<Expression> {
        std::mem::take(&mut self.values)
    }

    /// The element's content as one expression.
    pub fn take_content(&mut self) -> Expression {
        let values = self.take_values();
        Concatenation::create(self.position.clone(), None, values)
    }

    pub fn take_imports(&mut self) -> Vec<Import> {
        std::mem::take(&mut self.imports)
    }

    pub fn take_parameters(&mut self) -> Vec<Parameter> {
        std::mem::take(&mut self.parameters)
    }

    pub fn take_type_parameters(&mut self) -> Vec<FormalTypeParameter> {
        std::mem::take(&mut self.type_parameters)
    }

    pub fn take_clauses(&mut self) -> Vec<Clause> {
        std::mem::take(&mut self.clauses)
    }

    pub fn take_annotations(&mut self) -> Vec<JavaAnnotation> {
        std::mem::take(&mut self.annotations)
    }

    pub fn take_implements(&mut self) -> Vec<Implements> {
        std::mem::take(&mut self.implements)
    }

    pub fn take_throws(&mut self) -> Vec<Throws> {
        std::mem::take(&mut self.throws)
    }

    /// Reports unknown attributes and every child nobody took. Whitespace text is ignored.
    pub fn report_unused(self, sink: &mut dyn AlertSink) {
        self.attributes.report_unused(sink);
        let element = &self.element;
        let mut misplaced = |node: &dyn Node| {
            sink.add(Alert::new(
                AlertKind::BadNodePlacement,
                node.position().clone(),
                format!("{} is not allowed inside {element}", node.display_name()),
            ));
        };
        for root in &self.roots {
            misplaced(root);
        }
        for constructor in &self.constructors {
            misplaced(constructor);
        }
        for value in self.values.iter().filter(|v| !v.is_whitespace_only()) {
            misplaced(value);
        }
        for import in &self.imports {
            misplaced(import);
        }
        for parameter in &self.parameters {
            misplaced(parameter);
        }
        for type_parameter in &self.type_parameters {
            misplaced(type_parameter);
        }
        for clause in &self.clauses {
            misplaced(&ClauseNode(clause));
        }
        for annotation in &self.annotations {
            misplaced(annotation);
        }
        for implements in &self.implements {
            misplaced(implements);
        }
        for throws in &self.throws {
            misplaced(throws);
        }
    }
}

struct ClauseNode<'a>(&'a Clause);

impl Node for ClauseNode<'_> {
    fn position(&self) -> &SourcePosition {
        &self.0.position
    }

    fn display_name(&self) -> String {
        "<gxp:clause>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSetBuilder;
    use crate::ast::TemplateName;

    fn pos(line: u32) -> SourcePosition {
        SourcePosition::new("t.gxp", line, 1)
    }

    #[test]
    fn test_leftovers_are_misplaced() {
        let mut sink = AlertSetBuilder::new();
        let mut builder = PartsBuilder::new(pos(1), "<gxp:param>");
        builder.add_value(Expression::string(pos(2), None, "  \n"));
        builder.add_value(Expression::string(pos(3), None, "text"));
        builder.add_import(
            Import::Class {
                position: pos(4),
                name: TemplateName::parse("a.B").unwrap(),
            },
            &mut sink,
        );
        builder.finish().report_unused(&mut sink);
        let alerts = sink.build();
        let lines: Vec<u32> = alerts
            .of_kind(AlertKind::BadNodePlacement)
            .map(|a| a.position().line())
            .collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_taken_buckets_are_not_reported() {
        let mut sink = AlertSetBuilder::new();
        let mut builder = PartsBuilder::new(pos(1), "<gxp:template>");
        builder.add_value(Expression::string(pos(2), None, "a"));
        builder.add_value(Expression::string(pos(2), None, "b"));
        let mut parts = builder.finish();
        assert_eq!(parts.take_content().static_string(), Some("ab"));
        parts.report_unused(&mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_duplicate_import() {
        let mut sink = AlertSetBuilder::new();
        let mut builder = PartsBuilder::new(pos(1), "<gxp:template>");
        for line in [2, 3] {
            builder.add_import(
                Import::Package {
                    position: pos(line),
                    name: "com.example".into(),
                },
                &mut sink,
            );
        }
        assert_eq!(builder.finish().take_imports().len(), 1);
        assert_eq!(sink.len(), 1);
    }
}
