//! Alert policies and the sinks that consult them

use super::{Alert, AlertKind, AlertSink, Severity};
use std::collections::HashMap;
use std::io::Write;

/// Maps an alert to its effective severity.
pub trait AlertPolicy: Send + Sync {
    fn severity(&self, alert: &Alert) -> Severity;
}

/// Uses each alert's own severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAlertPolicy;

impl AlertPolicy for DefaultAlertPolicy {
    fn severity(&self, alert: &Alert) -> Severity {
        alert.severity()
    }
}

/// Per-kind severity overrides, with optional promotion of warnings.
#[derive(Debug, Clone, Default)]
pub struct ConfigurableAlertPolicy {
    overrides: HashMap<AlertKind, Severity>,
    warnings_as_errors: bool,
}

impl ConfigurableAlertPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_severity(&mut self, kind: AlertKind, severity: Severity) -> &mut Self {
        self.overrides.insert(kind, severity);
        self
    }

    pub fn set_warnings_as_errors(&mut self, enabled: bool) -> &mut Self {
        self.warnings_as_errors = enabled;
        self
    }
}

impl AlertPolicy for ConfigurableAlertPolicy {
    fn severity(&self, alert: &Alert) -> Severity {
        let severity = self
            .overrides
            .get(&alert.kind())
            .copied()
            .unwrap_or_else(|| alert.severity());
        if self.warnings_as_errors && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        }
    }
}

/// Counts alerts by effective severity, optionally forwarding them.
pub struct AlertCounter<'a> {
    policy: &'a dyn AlertPolicy,
    forward: Option<&'a mut dyn AlertSink>,
    errors: usize,
    warnings: usize,
}

impl<'a> AlertCounter<'a> {
    pub fn new(policy: &'a dyn AlertPolicy) -> Self {
        AlertCounter {
            policy,
            forward: None,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn forwarding(policy: &'a dyn AlertPolicy, sink: &'a mut dyn AlertSink) -> Self {
        AlertCounter {
            forward: Some(sink),
            ..Self::new(policy)
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

impl AlertSink for AlertCounter<'_> {
    fn add(&mut self, alert: Alert) {
        match self.policy.severity(&alert) {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        if let Some(sink) = self.forward.as_mut() {
            sink.add(alert);
        }
    }
}

/// Prints alerts with their effective severity, one per line.
pub struct PrintingAlertSink<'a, W: Write> {
    out: W,
    policy: &'a dyn AlertPolicy,
    show_info: bool,
}

impl<'a, W: Write> PrintingAlertSink<'a, W> {
    pub fn new(out: W, policy: &'a dyn AlertPolicy) -> Self {
        PrintingAlertSink {
            out,
            policy,
            show_info: false,
        }
    }

    /// Also print INFO alerts (progress and reconsideration notes).
    pub fn show_info(mut self, show: bool) -> Self {
        self.show_info = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AlertSink for PrintingAlertSink<'_, W> {
    fn add(&mut self, alert: Alert) {
        let severity = self.policy.severity(&alert);
        if severity == Severity::Info && !self.show_info {
            return;
        }
        let alert = alert.with_severity(severity);
        if let Err(err) = writeln!(self.out, "{alert}") {
            tracing::warn!(error = %err, "failed to print alert");
        }
    }
}
