//! The semantic tree
//!
//!     Reparenting turns a parse tree into a [`Root`] whose body is an [`Expression`]. Every
//!     later phase consumes and produces this model; which variants may still appear shrinks
//!     as the pipeline advances:
//!
//!         reparent     everything except Escape, Placeholder and ExtractedMessage
//!         bind         calls are bound
//!         collapse     no Collapse regions remain
//!         escape       strings carry a schema; dynamic values sit under Escape
//!         flatten      no OutputElement remains
//!         pivot        no PlaceholderStart/PlaceholderEnd remain
//!         extract      no Message, NoMessage or Placeholder remains
//!
//!     Phases that meet a variant an earlier phase guarantees is gone return
//!     [`Error::UnexpectedNode`](crate::error::Error::UnexpectedNode).

pub mod attribute;
pub mod decl;
pub mod expr;
pub mod message;
pub mod name;
pub mod space;

pub use attribute::{AttrNamespace, Attribute, MultiLanguageValue};
pub use decl::{
    annotations_for, AnnotationTarget, Callable, CallableKind, CallableSignature, Constructor,
    FormalTypeParameter, Implements, Import, Interface, JavaAnnotation, NullRoot, Parameter,
    ParameterSignature, Root, Template, Throws, Type,
};
pub use expr::{
    Abbr, BooleanConstant, Call, Callee, Clause, Collapse, Concatenation, Conditional,
    ConstructedConstant, Escape, Expression, ExtractedMessage, Loop, LoopSource,
    NativeExpression, NoMessage, OutputElement, Placeholder, PlaceholderEnd, PlaceholderStart,
    StringConstant, UnextractedMessage,
};
pub use message::{Message, MessagePart};
pub use name::{is_valid_variable_name, TemplateName};
pub use space::{SpaceOperator, SpaceOperators};

use crate::tree::Forest;

/// Output of reparenting and of every later phase up to extraction.
pub type SemanticTree = Forest<Root>;
