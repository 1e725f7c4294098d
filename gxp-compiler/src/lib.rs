//! Compiler for gxp templates
//!
//!     gxp templates are XML documents that mix the markup they produce with control flow
//!     (`gxp:if`, `gxp:loop`, `gxp:abbr`), calls to other templates, and translatable messages.
//!     This crate compiles them into Java, C++ (header and source) and JavaScript functions
//!     that write the markup, and into XMB bundles of the messages for translators.
//!
//!     This is a pure lib: it powers gxp-cli but never prints, reads the environment, or exits.
//!     All file access goes through [`build::FileStore`].
//!
//! Architecture
//!
//!     .
//!     ├── alert                   # Positions, alerts and severity policies
//!     ├── parse                   # XML to a tree of namespaced elements
//!     ├── schema                  # Element and attribute rules per output content type
//!     ├── ast                     # Templates, expressions and messages
//!     ├── phases                  # Tree to tree transformations
//!     ├── unit.rs                 # One source and its memoized phase results
//!     ├── codegen                 # One generator per output language
//!     └── build                   # Compilation sets, up-to-date checks, dependency cache
//!
//! Pipeline
//!
//!     parse, if-expand, reparent, bind, collapse, insert-placeholders, escape, validate,
//!     flatten, pivot, i18n-check, extract-messages. Each phase takes the previous forest by
//!     value and returns a new one carrying every alert so far. A phase returns `Err` only for
//!     trees it was never meant to see; everything a template author can get wrong is an
//!     alert.
//!
//!     Units see each other only through [`phases::CallableResolver`], and only the reparented
//!     interface of a callee, so a set of units can be compiled in any order.
//!
//! Testing
//!
//!     Unit tests sit next to the code. tests/ drives whole builds against an in-memory
//!     [`build::MemoryFileStore`] and checks generated output with insta snapshots.

pub mod alert;
pub mod ast;
pub mod build;
pub mod codegen;
pub mod error;
pub mod lang;
pub mod parse;
pub mod phases;
pub mod schema;
pub mod tree;
pub mod unit;

pub use error::{Error, Result};
