//! The parse tree.
//!
//! Every element is classified by namespace into one variant of [`ParsedElement`]. Phases match
//! on it exhaustively, so adding an element kind means touching every phase that consumes
//! parse trees.

use super::namespace::Namespace;
use crate::alert::SourcePosition;
use crate::lang::NativeLanguage;
use crate::schema::{ElementValidator, Schema};
use crate::tree::Node;
use std::fmt;
use std::sync::Arc;

/// An attribute as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAttribute {
    pub position: SourcePosition,
    /// `None` for unprefixed attributes.
    pub namespace: Option<Namespace>,
    pub name: String,
    pub value: String,
}

impl ParsedAttribute {
    pub fn display_name(&self) -> String {
        match &self.namespace {
            None => format!("'{}'", self.name),
            Some(ns) => format!("'{}' ({})", self.name, ns),
        }
    }
}

/// Fields shared by every element variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub position: SourcePosition,
    /// The qualified name as written, e.g. `gxp:param`.
    pub qualified_name: String,
    pub attributes: Vec<ParsedAttribute>,
    pub children: Vec<ParsedElement>,
}

/// Elements of the gxp namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GxpKind {
    Abbr,
    Attr,
    Clause,
    Cond,
    Constructor,
    Elif,
    Else,
    Eph,
    Eval,
    If,
    Implements,
    Import,
    Interface,
    Loop,
    Msg,
    NoMsg,
    Param,
    Ph,
    Template,
    Throws,
    TypeParam,
}

impl GxpKind {
    const ALL: [GxpKind; 21] = [
        GxpKind::Abbr,
        GxpKind::Attr,
        GxpKind::Clause,
        GxpKind::Cond,
        GxpKind::Constructor,
        GxpKind::Elif,
        GxpKind::Else,
        GxpKind::Eph,
        GxpKind::Eval,
        GxpKind::If,
        GxpKind::Implements,
        GxpKind::Import,
        GxpKind::Interface,
        GxpKind::Loop,
        GxpKind::Msg,
        GxpKind::NoMsg,
        GxpKind::Param,
        GxpKind::Ph,
        GxpKind::Template,
        GxpKind::Throws,
        GxpKind::TypeParam,
    ];

    pub fn local_name(self) -> &'static str {
        match self {
            GxpKind::Abbr => "abbr",
            GxpKind::Attr => "attr",
            GxpKind::Clause => "clause",
            GxpKind::Cond => "cond",
            GxpKind::Constructor => "constructor",
            GxpKind::Elif => "elif",
            GxpKind::Else => "else",
            GxpKind::Eph => "eph",
            GxpKind::Eval => "eval",
            GxpKind::If => "if",
            GxpKind::Implements => "implements",
            GxpKind::Import => "import",
            GxpKind::Interface => "interface",
            GxpKind::Loop => "loop",
            GxpKind::Msg => "msg",
            GxpKind::NoMsg => "nomsg",
            GxpKind::Param => "param",
            GxpKind::Ph => "ph",
            GxpKind::Template => "template",
            GxpKind::Throws => "throws",
            GxpKind::TypeParam => "typeparam",
        }
    }

    pub fn from_local_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.local_name() == name)
    }

    /// Only these may be the root of a source file.
    pub fn is_root(self) -> bool {
        matches!(self, GxpKind::Template | GxpKind::Interface)
    }
}

impl fmt::Display for GxpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gxp:{}", self.local_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GxpElement {
    pub kind: GxpKind,
    pub data: ElementData,
}

/// `<call:Name>` or a package-qualified variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CallElement {
    /// Callee as written, possibly dotted.
    pub callee: String,
    /// Package from a qualified call namespace.
    pub package: Option<String>,
    pub data: ElementData,
}

/// Language specific escape hatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    /// `<cpp:include library="..."/>` or `<cpp:include file="..."/>`.
    Include,
    /// `<java:annotate with="@..."/>`.
    Annotate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeElement {
    pub language: NativeLanguage,
    pub kind: NativeKind,
    pub data: ElementData,
}

/// An element of some output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputElementNode {
    pub schema: Arc<Schema>,
    pub validator: Arc<ElementValidator>,
    pub local_name: String,
    pub data: ElementData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub position: SourcePosition,
    pub text: String,
}

impl TextElement {
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

/// Stand-in for an element that could not be classified. Already reported.
#[derive(Debug, Clone, PartialEq)]
pub struct NullElement {
    pub position: SourcePosition,
    pub qualified_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedElement {
    Gxp(GxpElement),
    Call(CallElement),
    Native(NativeElement),
    Output(OutputElementNode),
    Text(TextElement),
    Null(NullElement),
}

impl ParsedElement {
    pub fn data(&self) -> Option<&ElementData> {
        match self {
            ParsedElement::Gxp(el) => Some(&el.data),
            ParsedElement::Call(el) => Some(&el.data),
            ParsedElement::Native(el) => Some(&el.data),
            ParsedElement::Output(el) => Some(&el.data),
            ParsedElement::Text(_) | ParsedElement::Null(_) => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            ParsedElement::Gxp(el) => Some(&mut el.data),
            ParsedElement::Call(el) => Some(&mut el.data),
            ParsedElement::Native(el) => Some(&mut el.data),
            ParsedElement::Output(el) => Some(&mut el.data),
            ParsedElement::Text(_) | ParsedElement::Null(_) => None,
        }
    }

    pub fn children(&self) -> &[ParsedElement] {
        self.data().map_or(&[], |data| &data.children)
    }

    /// Rebuilds this element with different children. Leaves are returned unchanged.
    pub fn with_children(self, children: Vec<ParsedElement>) -> ParsedElement {
        match self {
            ParsedElement::Gxp(mut el) => {
                el.data.children = children;
                ParsedElement::Gxp(el)
            }
            ParsedElement::Call(mut el) => {
                el.data.children = children;
                ParsedElement::Call(el)
            }
            ParsedElement::Native(mut el) => {
                el.data.children = children;
                ParsedElement::Native(el)
            }
            ParsedElement::Output(mut el) => {
                el.data.children = children;
                ParsedElement::Output(el)
            }
            leaf @ (ParsedElement::Text(_) | ParsedElement::Null(_)) => leaf,
        }
    }

    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, ParsedElement::Text(text) if text.is_whitespace())
    }

    pub fn gxp_kind(&self) -> Option<GxpKind> {
        match self {
            ParsedElement::Gxp(el) => Some(el.kind),
            _ => None,
        }
    }
}

impl Node for ParsedElement {
    fn position(&self) -> &SourcePosition {
        match self {
            ParsedElement::Text(text) => &text.position,
            ParsedElement::Null(null) => &null.position,
            other => match other.data() {
                Some(data) => &data.position,
                None => unreachable!("only leaves lack element data"),
            },
        }
    }

    fn display_name(&self) -> String {
        match self {
            ParsedElement::Text(_) => "text".to_string(),
            ParsedElement::Null(null) => format!("<{}>", null.qualified_name),
            other => match other.data() {
                Some(data) => format!("<{}>", data.qualified_name),
                None => unreachable!("only leaves lack element data"),
            },
        }
    }
}
