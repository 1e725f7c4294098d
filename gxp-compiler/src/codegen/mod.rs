//! Code generation
//!
//! A [`CodeGenerator`] turns the final tree of one compilation unit into the source text of
//! one output language. Generators are looked up by language through the
//! [`GeneratorRegistry`].
//!
//! By the time a tree reaches a generator every user error has been reported. The only alert
//! a generator still raises is `missing-native-code`, for a `gxp:eval`, type or argument that
//! gives no code for the target language and no default.
//!
//! The Java, C++ and JavaScript generators share one statement emitter ([`body`]) and differ
//! only in the [`body::Dialect`] they plug into it and in the file skeleton around it.

pub mod body;
pub mod cpp;
pub mod java;
pub mod javascript;
pub mod registry;
pub mod writer;
pub mod xmb;

pub use registry::GeneratorRegistry;

use crate::alert::AlertSink;
use crate::error::Result;
use crate::lang::OutputLanguage;
use crate::phases::MessageExtractedTree;

/// Settings shared by every generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Emit a comment with the source position before each statement.
    pub debug_comments: bool,
}

/// Produces the source text of one output language.
pub trait CodeGenerator: Send + Sync {
    fn language(&self) -> OutputLanguage;

    fn description(&self) -> &str {
        ""
    }

    /// Generates the file for `tree`.
    ///
    /// Fails only if the tree holds a node no earlier phase should have left behind.
    fn generate(
        &self,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String>;
}

/// First line of every generated file.
pub(crate) fn banner(source: &str) -> String {
    format!("Generated from {source}. Do not edit.")
}

/// `name` with its first character uppercased.
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
