//! Namespace URIs understood by the compiler.

use crate::lang::NativeLanguage;
use crate::schema::{Schema, SchemaFactory};
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const GXP_NAMESPACE: &str = "http://google.com/2001/gxp";
pub const EXPR_NAMESPACE: &str = "http://google.com/2001/gxp/expressions";
pub const CALL_NAMESPACE: &str = "http://google.com/2001/gxp/call";
pub const MSG_NAMESPACE: &str = "http://google.com/2001/gxp/msg";
pub const NOMSG_NAMESPACE: &str = "http://google.com/2001/gxp/nomsg";
pub const CPP_NAMESPACE: &str = "http://google.com/2001/gxp/code/cpp";
pub const JAVA_NAMESPACE: &str = "http://google.com/2001/gxp/code/java";
pub const JAVASCRIPT_NAMESPACE: &str = "http://google.com/2001/gxp/code/javascript";

/// A recognised namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Namespace {
    /// Template control elements and attributes.
    Gxp,
    /// Attribute values evaluated as native code.
    Expr,
    /// Template calls; `package` is set for `…/gxp/call/<path>` namespaces.
    Call { package: Option<String> },
    /// Attribute values that are translatable messages.
    Msg,
    /// Attribute values explicitly excluded from translation.
    NoMsg,
    /// Code for exactly one target language.
    Native(NativeLanguage),
    /// Output elements validated by a schema.
    Output(Arc<Schema>),
}

impl Namespace {
    /// Classifies `uri`. Returns `None` for namespaces nobody knows about.
    pub fn resolve(uri: &str, schemas: &dyn SchemaFactory) -> Option<Namespace> {
        let namespace = match uri {
            GXP_NAMESPACE => Namespace::Gxp,
            EXPR_NAMESPACE => Namespace::Expr,
            CALL_NAMESPACE => Namespace::Call { package: None },
            MSG_NAMESPACE => Namespace::Msg,
            NOMSG_NAMESPACE => Namespace::NoMsg,
            CPP_NAMESPACE => Namespace::Native(NativeLanguage::Cpp),
            JAVA_NAMESPACE => Namespace::Native(NativeLanguage::Java),
            JAVASCRIPT_NAMESPACE => Namespace::Native(NativeLanguage::JavaScript),
            other => {
                if let Some(package) = qualified_call_package(other) {
                    return Some(Namespace::Call {
                        package: Some(package),
                    });
                }
                return schemas.from_namespace(other).map(Namespace::Output);
            }
        };
        Some(namespace)
    }

    pub fn uri(&self) -> String {
        match self {
            Namespace::Gxp => GXP_NAMESPACE.to_string(),
            Namespace::Expr => EXPR_NAMESPACE.to_string(),
            Namespace::Call { package: None } => CALL_NAMESPACE.to_string(),
            Namespace::Call {
                package: Some(package),
            } => format!("{CALL_NAMESPACE}/{}", package.replace('.', "/")),
            Namespace::Msg => MSG_NAMESPACE.to_string(),
            Namespace::NoMsg => NOMSG_NAMESPACE.to_string(),
            Namespace::Native(NativeLanguage::Cpp) => CPP_NAMESPACE.to_string(),
            Namespace::Native(NativeLanguage::Java) => JAVA_NAMESPACE.to_string(),
            Namespace::Native(NativeLanguage::JavaScript) => JAVASCRIPT_NAMESPACE.to_string(),
            Namespace::Output(schema) => schema.namespace_uri.clone(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// `http://google.com/2001/gxp/call/com/example` names package `com.example`.
fn qualified_call_package(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    if url.host_str() != Some("google.com") {
        return None;
    }
    let mut segments = url.path_segments()?;
    for expected in ["2001", "gxp", "call"] {
        if segments.next()? != expected {
            return None;
        }
    }
    let package: Vec<&str> = segments.filter(|segment| !segment.is_empty()).collect();
    if package.is_empty() {
        None
    } else {
        Some(package.join("."))
    }
}
