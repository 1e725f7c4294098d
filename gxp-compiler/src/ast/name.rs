//! Template and variable names.

use crate::alert::{Alert, AlertKind, AlertSink, SourcePosition};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("identifier regex: {e}"))
});

// Underscores may only appear between two non-underscores.
static VARIABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z](_?[a-zA-Z0-9])*$").unwrap_or_else(|e| panic!("variable regex: {e}"))
});

const MAX_VARIABLE_NAME_LEN: usize = 64;

/// A dotted template name such as `com.example.Hello`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TemplateName {
    segments: Vec<String>,
}

impl TemplateName {
    /// Parses a dotted name. Every segment must be an identifier.
    pub fn parse(dotted: &str) -> Option<TemplateName> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if segments.iter().all(|s| IDENTIFIER.is_match(s)) {
            Some(TemplateName { segments })
        } else {
            None
        }
    }

    /// Like [`TemplateName::parse`] but reports an `illegal-name` alert on failure.
    pub fn parse_or_alert(
        dotted: &str,
        position: &SourcePosition,
        sink: &mut dyn AlertSink,
    ) -> Option<TemplateName> {
        let name = Self::parse(dotted);
        if name.is_none() {
            sink.add(Alert::new(
                AlertKind::IllegalName,
                position.clone(),
                format!("'{dotted}' is not a valid dotted name"),
            ));
        }
        name
    }

    /// `package.base`, where `base` may itself be dotted.
    pub fn qualified(package: &str, base: &TemplateName) -> Option<TemplateName> {
        Self::parse(&format!("{package}.{base}"))
    }

    pub fn base_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Everything before the last segment, if anything.
    pub fn package(&self) -> Option<String> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(self.segments[..n - 1].join(".")),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<TemplateName> for String {
    fn from(name: TemplateName) -> String {
        name.to_string()
    }
}

impl TryFrom<String> for TemplateName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TemplateName::parse(&value).ok_or_else(|| format!("invalid template name '{value}'"))
    }
}

/// Whether `name` may be used for a parameter, loop variable or abbreviation.
///
/// `this` is reserved for interfaces and the `gxp` prefix for generated code.
pub fn is_valid_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
        && name.len() <= MAX_VARIABLE_NAME_LEN
        && name != "this"
        && !name.starts_with("gxp")
}
