//! Compilation units and the phase sequence.
//!
//! A [`CompilationUnit`] owns one source file and the result of every [`Phase`] computed for
//! it so far. Each result is computed on first request from the result of the phase before
//! it and kept for the lifetime of the unit; asking again never recomputes it.
//!
//! Units reach each other only through [`CallableResolver`]: binding a unit asks its callees
//! for their reparented interface, nothing later.

use crate::alert::{Alert, AlertKind, AlertSet, SourcePosition};
use crate::ast::{Callable, SemanticTree, TemplateName};
use crate::error::{Error, Result};
use crate::parse::{ParseTree, Parser};
use crate::phases::{
    bind, collapse, escape, flatten, i18ncheck, ifexpand, msgextract, phinsert, pivot, validate,
    BoundTree, CallableResolver, MessageExtractedTree, Reparenter,
};
use crate::schema::SchemaFactory;
use crate::tree::Forest;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// The pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Parse,
    IfExpand,
    Reparent,
    Bind,
    Collapse,
    InsertPlaceholders,
    Escape,
    Validate,
    Flatten,
    Pivot,
    I18nCheck,
    ExtractMessages,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Phase::Parse,
        Phase::IfExpand,
        Phase::Reparent,
        Phase::Bind,
        Phase::Collapse,
        Phase::InsertPlaceholders,
        Phase::Escape,
        Phase::Validate,
        Phase::Flatten,
        Phase::Pivot,
        Phase::I18nCheck,
        Phase::ExtractMessages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::IfExpand => "if-expand",
            Phase::Reparent => "reparent",
            Phase::Bind => "bind",
            Phase::Collapse => "collapse",
            Phase::InsertPlaceholders => "insert-placeholders",
            Phase::Escape => "escape",
            Phase::Validate => "validate",
            Phase::Flatten => "flatten",
            Phase::Pivot => "pivot",
            Phase::I18nCheck => "i18n-check",
            Phase::ExtractMessages => "extract-messages",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Phase::ALL.iter().map(|p| p.name()).collect();
                format!("unknown phase '{s}', expected one of: {}", names.join(", "))
            })
    }
}

enum Slot<T> {
    Pending,
    Ready(Result<Arc<T>>),
}

/// One memoized phase result.
struct Memo<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Memo<T> {
    fn new() -> Self {
        Memo {
            slot: Mutex::new(Slot::Pending),
        }
    }

    fn peek(&self) -> Option<Result<Arc<T>>> {
        match &*self.slot.lock().unwrap_or_else(|e| e.into_inner()) {
            Slot::Pending => None,
            Slot::Ready(result) => Some(result.clone()),
        }
    }

    /// The stored result, computing it first if needed. The lock is not held while
    /// computing, so computing one phase may request other units' results; if two threads
    /// race, the first stored result wins.
    fn get_or_compute(&self, compute: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        if let Some(result) = self.peek() {
            return result;
        }
        let computed = compute().map(Arc::new);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match &*slot {
            Slot::Ready(existing) => existing.clone(),
            Slot::Pending => {
                *slot = Slot::Ready(computed.clone());
                computed
            }
        }
    }
}

/// One template source file and its phase results.
pub struct CompilationUnit {
    source_name: String,
    name: TemplateName,
    text: std::result::Result<String, String>,
    schemas: Arc<dyn SchemaFactory>,
    parsed: Memo<ParseTree>,
    if_expanded: Memo<ParseTree>,
    reparented: Memo<SemanticTree>,
    callable: Memo<Option<Arc<Callable>>>,
    bound: Memo<BoundTree>,
    collapsed: Memo<SemanticTree>,
    placeholders_inserted: Memo<SemanticTree>,
    escaped: Memo<SemanticTree>,
    validated: Memo<SemanticTree>,
    flattened: Memo<SemanticTree>,
    pivoted: Memo<SemanticTree>,
    i18n_checked: Memo<SemanticTree>,
    extracted: Memo<MessageExtractedTree>,
}

impl fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("source_name", &self.source_name)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CompilationUnit {
    /// `text` is the source, or why it could not be read.
    pub fn new(
        source_name: impl Into<String>,
        name: TemplateName,
        text: std::result::Result<String, String>,
        schemas: Arc<dyn SchemaFactory>,
    ) -> Self {
        CompilationUnit {
            source_name: source_name.into(),
            name,
            text,
            schemas,
            parsed: Memo::new(),
            if_expanded: Memo::new(),
            reparented: Memo::new(),
            callable: Memo::new(),
            bound: Memo::new(),
            collapsed: Memo::new(),
            placeholders_inserted: Memo::new(),
            escaped: Memo::new(),
            validated: Memo::new(),
            flattened: Memo::new(),
            pivoted: Memo::new(),
            i18n_checked: Memo::new(),
            extracted: Memo::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The template name the source path implies.
    pub fn name(&self) -> &TemplateName {
        &self.name
    }

    fn computing(&self, phase: Phase) {
        tracing::debug!(unit = %self.name, phase = %phase, "computing phase");
    }

    pub fn parse_tree(&self) -> Result<Arc<ParseTree>> {
        self.parsed.get_or_compute(|| {
            self.computing(Phase::Parse);
            Ok(match &self.text {
                Ok(text) => Parser::new(self.schemas.as_ref()).parse(&self.source_name, text),
                Err(problem) => {
                    let position = SourcePosition::whole_file(self.source_name.as_str());
                    let alert = Alert::new(
                        AlertKind::Io,
                        position.clone(),
                        format!("cannot read {}: {problem}", self.source_name),
                    );
                    Forest::empty(position, std::iter::once(alert).collect())
                }
            })
        })
    }

    pub fn if_expanded_tree(&self) -> Result<Arc<ParseTree>> {
        self.if_expanded.get_or_compute(|| {
            let parsed = self.parse_tree()?;
            self.computing(Phase::IfExpand);
            Ok(ifexpand::expand(ParseTree::clone(&parsed)))
        })
    }

    pub fn reparented_tree(&self) -> Result<Arc<SemanticTree>> {
        self.reparented.get_or_compute(|| {
            let expanded = self.if_expanded_tree()?;
            self.computing(Phase::Reparent);
            Reparenter::new(self.schemas.as_ref(), self.name.clone())
                .reparent(ParseTree::clone(&expanded))
        })
    }

    /// What callers of this unit see: its template or interface, if it has one.
    pub fn callable(&self) -> Option<Arc<Callable>> {
        let callable = self.callable.get_or_compute(|| {
            let tree = self.reparented_tree()?;
            Ok(tree.root().and_then(|root| root.callable()).map(Arc::new))
        });
        callable.ok().and_then(|c| (*c).clone())
    }

    pub fn bound_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<BoundTree>> {
        self.bound.get_or_compute(|| {
            let reparented = self.reparented_tree()?;
            self.computing(Phase::Bind);
            bind::bind(SemanticTree::clone(&reparented), resolver)
        })
    }

    pub fn collapsed_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.collapsed.get_or_compute(|| {
            let bound = self.bound_tree(resolver)?;
            self.computing(Phase::Collapse);
            collapse::collapse(bound.tree.clone())
        })
    }

    pub fn placeholders_inserted_tree(
        &self,
        resolver: &dyn CallableResolver,
    ) -> Result<Arc<SemanticTree>> {
        self.placeholders_inserted.get_or_compute(|| {
            let collapsed = self.collapsed_tree(resolver)?;
            self.computing(Phase::InsertPlaceholders);
            phinsert::insert_placeholders(SemanticTree::clone(&collapsed))
        })
    }

    pub fn escaped_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.escaped.get_or_compute(|| {
            let inserted = self.placeholders_inserted_tree(resolver)?;
            self.computing(Phase::Escape);
            escape::escape(SemanticTree::clone(&inserted))
        })
    }

    pub fn validated_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.validated.get_or_compute(|| {
            let escaped = self.escaped_tree(resolver)?;
            self.computing(Phase::Validate);
            validate::validate(SemanticTree::clone(&escaped))
        })
    }

    pub fn flattened_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.flattened.get_or_compute(|| {
            let validated = self.validated_tree(resolver)?;
            self.computing(Phase::Flatten);
            flatten::flatten(SemanticTree::clone(&validated))
        })
    }

    pub fn pivoted_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.pivoted.get_or_compute(|| {
            let flattened = self.flattened_tree(resolver)?;
            self.computing(Phase::Pivot);
            pivot::pivot(SemanticTree::clone(&flattened))
        })
    }

    /// Checked against the collapsed tree, reported on the pivoted one.
    pub fn i18n_checked_tree(&self, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        self.i18n_checked.get_or_compute(|| {
            let collapsed = self.collapsed_tree(resolver)?;
            let pivoted = self.pivoted_tree(resolver)?;
            self.computing(Phase::I18nCheck);
            Ok(i18ncheck::check(&collapsed, SemanticTree::clone(&pivoted)))
        })
    }

    pub fn extracted_tree(
        &self,
        resolver: &dyn CallableResolver,
    ) -> Result<Arc<MessageExtractedTree>> {
        self.extracted.get_or_compute(|| {
            let checked = self.i18n_checked_tree(resolver)?;
            self.computing(Phase::ExtractMessages);
            msgextract::extract(SemanticTree::clone(&checked))
        })
    }

    /// Every alert up to and including `phase`.
    pub fn alerts(&self, phase: Phase, resolver: &dyn CallableResolver) -> Result<AlertSet> {
        Ok(match phase {
            Phase::Parse => self.parse_tree()?.alerts().clone(),
            Phase::IfExpand => self.if_expanded_tree()?.alerts().clone(),
            Phase::Reparent => self.reparented_tree()?.alerts().clone(),
            Phase::Bind => self.bound_tree(resolver)?.tree.alerts().clone(),
            Phase::ExtractMessages => self.extracted_tree(resolver)?.tree.alerts().clone(),
            semantic => self.semantic_tree(semantic, resolver)?.alerts().clone(),
        })
    }

    fn semantic_tree(&self, phase: Phase, resolver: &dyn CallableResolver) -> Result<Arc<SemanticTree>> {
        match phase {
            Phase::Reparent => self.reparented_tree(),
            Phase::Collapse => self.collapsed_tree(resolver),
            Phase::InsertPlaceholders => self.placeholders_inserted_tree(resolver),
            Phase::Escape => self.escaped_tree(resolver),
            Phase::Validate => self.validated_tree(resolver),
            Phase::Flatten => self.flattened_tree(resolver),
            Phase::Pivot => self.pivoted_tree(resolver),
            Phase::I18nCheck => self.i18n_checked_tree(resolver),
            other => Err(Error::unexpected("dump", format!("{other} tree"))),
        }
    }

    /// Debug rendering of the tree produced by `phase`.
    pub fn dump(&self, phase: Phase, resolver: &dyn CallableResolver) -> Result<String> {
        Ok(match phase {
            Phase::Parse => format!("{:#?}", self.parse_tree()?),
            Phase::IfExpand => format!("{:#?}", self.if_expanded_tree()?),
            Phase::Bind => format!("{:#?}", self.bound_tree(resolver)?),
            Phase::ExtractMessages => format!("{:#?}", self.extracted_tree(resolver)?),
            semantic => format!("{:#?}", self.semantic_tree(semantic, resolver)?),
        })
    }
}

/// The template name a source path relative to the source root implies:
/// `com/example/Hello.gxp` is `com.example.Hello`.
pub fn template_name_for(relative_path: &str) -> Option<TemplateName> {
    let stem = relative_path
        .strip_suffix(".gxp")
        .unwrap_or(relative_path)
        .replace('\\', "/");
    TemplateName::parse(&stem.split('/').collect::<Vec<_>>().join("."))
}
