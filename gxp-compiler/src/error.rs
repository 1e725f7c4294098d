//! Error types for compiler operations
//!
//! Problems with a user's template are never reported through these types: they become
//! [`Alert`](crate::alert::Alert)s attached to the tree of the phase that found them. The
//! errors here cover the two remaining cases, broken process inputs (a schema definition
//! that does not parse, a dependency cache that cannot be read) and violated pipeline
//! invariants, which abort the affected compilation unit only.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the compiler library.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A phase received a node variant an earlier phase guarantees it never sees.
    #[error("unexpected {node} reaching the {phase} phase")]
    UnexpectedNode { phase: &'static str, node: String },

    /// A schema definition could not be loaded.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Reading or writing a file failed.
    #[error("I/O error on '{}': {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The dependency cache exists but is not in the expected format.
    #[error("dependency cache '{}' is unreadable: {message}", path.display())]
    DependencyCache { path: PathBuf, message: String },

    /// No code generator is registered for the requested output language.
    #[error("no code generator registered for '{0}'")]
    GeneratorNotFound(String),
}

impl Error {
    pub(crate) fn unexpected(phase: &'static str, node: impl Into<String>) -> Self {
        Error::UnexpectedNode {
            phase,
            node: node.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Errors raised while reading schema definition files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{source_name}: malformed schema definition: {message}")]
    Syntax {
        source_name: String,
        message: String,
    },

    #[error("{source_name}:{line}: <{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        source_name: String,
        line: u32,
        element: String,
        attribute: String,
    },

    #[error("{source_name}:{line}: {message}")]
    Invalid {
        source_name: String,
        line: u32,
        message: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_node_message() {
        let err = Error::unexpected("escape", "<gxp:if>");
        assert_eq!(err.to_string(), "unexpected <gxp:if> reaching the escape phase");
    }

    #[test]
    fn test_schema_error_is_wrapped_transparently() {
        let err: Error = SchemaError::Invalid {
            source_name: "xhtml.xml".into(),
            line: 3,
            message: "unknown flag 'bogus'".into(),
        }
        .into();
        assert_eq!(err.to_string(), "xhtml.xml:3: unknown flag 'bogus'");
    }
}
