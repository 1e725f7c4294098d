//! Positions and diagnostics
//!
//!     Every phase reports recoverable problems as [`Alert`]s. An alert is attributed to the
//!     [`SourcePosition`] of the node that caused it and carries an [`AlertKind`], which is what
//!     an [`AlertPolicy`] keys on when promoting or demoting classes of alerts.
//!
//!     Alerts travel with the tree: a phase seeds an [`AlertSetBuilder`] from its input
//!     forest's [`AlertSet`], appends what it finds, and freezes the result into the forest it
//!     returns. Phases only ever see the write side, [`AlertSink`].

mod policy;

pub use policy::{
    AlertCounter, AlertPolicy, ConfigurableAlertPolicy, DefaultAlertPolicy, PrintingAlertSink,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A location in a source file. Line and column are 1-based; zero means "the whole file".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePosition {
    source: Arc<str>,
    line: u32,
    column: u32,
}

impl SourcePosition {
    pub fn new(source: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        SourcePosition {
            source: source.into(),
            line,
            column,
        }
    }

    /// A position covering an entire source.
    pub fn whole_file(source: impl Into<Arc<str>>) -> Self {
        Self::new(source, 0, 0)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn is_whole_file(&self) -> bool {
        self.line == 0 || self.column == 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_file() {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

/// How bad an alert is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

macro_rules! alert_kinds {
    ($($variant:ident => ($name:literal, $severity:ident)),+ $(,)?) => {
        /// Every class of alert the compiler can raise.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum AlertKind {
            $(#[serde(rename = $name)] $variant),+
        }

        impl AlertKind {
            pub const ALL: &'static [AlertKind] = &[$(AlertKind::$variant),+];

            /// The kebab-case name used in configuration files.
            pub fn name(self) -> &'static str {
                match self {
                    $(AlertKind::$variant => $name),+
                }
            }

            pub fn default_severity(self) -> Severity {
                match self {
                    $(AlertKind::$variant => Severity::$severity),+
                }
            }
        }
    };
}

alert_kinds! {
    UnknownNamespace => ("unknown-namespace", Error),
    NoNamespace => ("no-namespace", Error),
    UnknownElement => ("unknown-element", Error),
    UnknownAttribute => ("unknown-attribute", Error),
    MultiValueAttribute => ("multi-value-attribute", Error),
    MissingAttribute => ("missing-attribute", Error),
    MissingAttributes => ("missing-attributes", Error),
    ConflictingAttributes => ("conflicting-attributes", Error),
    BadNodePlacement => ("bad-node-placement", Error),
    InvalidRoot => ("invalid-root", Error),
    MultipleRoots => ("multiple-roots", Error),
    XmlSyntax => ("xml-syntax", Error),
    InvalidAttributeValue => ("invalid-attribute-value", Error),
    InvalidDoctype => ("invalid-doctype", Error),
    RequiresStaticContent => ("requires-static-content", Error),
    UnknownContentType => ("unknown-content-type", Error),
    IllegalVariableName => ("illegal-variable-name", Error),
    ConflictingVarName => ("conflicting-var-name", Error),
    IllegalName => ("illegal-name", Error),
    MismatchedTemplateName => ("mismatched-template-name", Error),
    MoreThanOneConstructor => ("more-than-one-constructor", Error),
    MisplacedJavaAnnotation => ("misplaced-java-annotation", Error),
    NoClausesInCond => ("no-clauses-in-cond", Error),
    ElifAfterElse => ("elif-after-else", Error),
    DoubleElse => ("double-else", Error),
    CalleeNotFound => ("callee-not-found", Error),
    ImplementableNotFound => ("implementable-not-found", Error),
    ImplementsMismatch => ("implements-mismatch", Error),
    BadParameter => ("bad-parameter", Error),
    DuplicateParameter => ("duplicate-parameter", Error),
    TooManyContentParameters => ("too-many-content-parameters", Error),
    RequiredAttributeHasCond => ("required-attribute-has-cond", Error),
    TypeError => ("type-error", Error),
    PhMissingEph => ("ph-missing-eph", Error),
    EphMissingPh => ("eph-missing-ph", Error),
    EmptyPlaceholder => ("empty-placeholder", Error),
    TooManyDynamicPlaceholders => ("too-many-dynamic-placeholders", Error),
    InvalidMessage => ("invalid-message", Error),
    MissingNativeCode => ("missing-native-code", Error),
    Io => ("io", Error),
    Internal => ("internal", Error),
    UnextractableContent => ("unextractable-content", Warning),
    DeprecatedElement => ("deprecated-element", Warning),
    DeprecatedAttribute => ("deprecated-attribute", Warning),
    Progress => ("progress", Info),
    Reconsidered => ("reconsidered", Info),
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown alert kind '{s}'"))
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alert {
    position: SourcePosition,
    kind: AlertKind,
    severity: Severity,
    message: String,
}

impl Alert {
    /// Creates an alert with the kind's default severity.
    pub fn new(kind: AlertKind, position: SourcePosition, message: impl Into<String>) -> Self {
        Alert {
            position,
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn position(&self) -> &SourcePosition {
        &self.position
    }

    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.position, self.severity, self.message)
    }
}

/// An immutable, ordered collection of alerts. Cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSet {
    alerts: Arc<[Alert]>,
}

impl AlertSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alert> {
        self.alerts.iter()
    }

    pub fn of_kind(&self, kind: AlertKind) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(move |alert| alert.kind == kind)
    }

    pub fn has_kind(&self, kind: AlertKind) -> bool {
        self.of_kind(kind).next().is_some()
    }
}

impl<'a> IntoIterator for &'a AlertSet {
    type Item = &'a Alert;
    type IntoIter = std::slice::Iter<'a, Alert>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Alert> for AlertSet {
    fn from_iter<I: IntoIterator<Item = Alert>>(iter: I) -> Self {
        AlertSet {
            alerts: iter.into_iter().collect(),
        }
    }
}

/// Write-only destination for alerts.
pub trait AlertSink {
    fn add(&mut self, alert: Alert);

    /// Adds every alert of `alerts`, preserving their order.
    fn add_all(&mut self, alerts: &AlertSet) {
        for alert in alerts {
            self.add(alert.clone());
        }
    }
}

/// Append-only accumulator that freezes into an [`AlertSet`].
#[derive(Debug, Default)]
pub struct AlertSetBuilder {
    alerts: Vec<Alert>,
}

impl AlertSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder that starts out holding `alerts`.
    pub fn seeded(alerts: &AlertSet) -> Self {
        AlertSetBuilder {
            alerts: alerts.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Freezes what was accumulated so far and leaves the builder empty.
    pub fn build_and_clear(&mut self) -> AlertSet {
        std::mem::take(&mut self.alerts).into_iter().collect()
    }

    pub fn build(mut self) -> AlertSet {
        self.build_and_clear()
    }
}

impl AlertSink for AlertSetBuilder {
    fn add(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }
}

impl AlertSink for Vec<Alert> {
    fn add(&mut self, alert: Alert) {
        self.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32) -> SourcePosition {
        SourcePosition::new("a.gxp", line, 1)
    }

    #[test]
    fn test_position_display() {
        assert_eq!(pos(3).to_string(), "a.gxp:3:1");
        assert_eq!(SourcePosition::whole_file("a.gxp").to_string(), "a.gxp");
    }

    #[test]
    fn test_position_equality_uses_all_fields() {
        assert_eq!(pos(3), SourcePosition::new("a.gxp", 3, 1));
        assert_ne!(pos(3), SourcePosition::new("b.gxp", 3, 1));
        assert_ne!(pos(3), SourcePosition::new("a.gxp", 3, 2));
    }

    #[test]
    fn test_builder_preserves_order_and_duplicates() {
        let mut builder = AlertSetBuilder::new();
        let first = Alert::new(AlertKind::UnknownElement, pos(1), "first");
        let second = Alert::new(AlertKind::UnknownAttribute, pos(2), "second");
        builder.add(first.clone());
        builder.add(second.clone());
        builder.add(first.clone());

        let set = builder.build_and_clear();
        assert!(builder.is_empty());
        let alerts: Vec<_> = set.iter().cloned().collect();
        assert_eq!(alerts, vec![first.clone(), second, first]);
    }

    #[test]
    fn test_add_all_preserves_order() {
        let set: AlertSet = (1..=4)
            .map(|line| Alert::new(AlertKind::Progress, pos(line), "x"))
            .collect();
        let mut builder = AlertSetBuilder::seeded(&AlertSet::empty());
        builder.add_all(&set);
        assert_eq!(builder.build(), set);
    }

    #[test]
    fn test_alert_kind_names_round_trip() {
        for kind in AlertKind::ALL {
            assert_eq!(kind.name().parse::<AlertKind>(), Ok(*kind));
        }
        assert!("not-a-kind".parse::<AlertKind>().is_err());
    }

    #[test]
    fn test_alert_display() {
        let alert = Alert::new(AlertKind::UnknownElement, pos(7), "unknown element <gxp:foo>");
        assert_eq!(alert.to_string(), "a.gxp:7:1: error: unknown element <gxp:foo>");
    }
}
