//! Node and forest abstractions shared by every phase.

use crate::alert::{Alert, AlertKind, AlertSet, AlertSink, SourcePosition};

/// Anything that can be attributed a position in diagnostics.
pub trait Node {
    fn position(&self) -> &SourcePosition;

    /// Human readable label used in alert messages, e.g. `<gxp:param>`.
    fn display_name(&self) -> String;
}

/// The output of a phase: its roots plus every alert produced so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest<T> {
    position: SourcePosition,
    alerts: AlertSet,
    roots: Vec<T>,
}

impl<T> Forest<T> {
    pub fn new(position: SourcePosition, alerts: AlertSet, roots: Vec<T>) -> Self {
        Forest {
            position,
            alerts,
            roots,
        }
    }

    /// A forest with no roots; used when the input could not be read at all.
    pub fn empty(position: SourcePosition, alerts: AlertSet) -> Self {
        Self::new(position, alerts, Vec::new())
    }

    pub fn position(&self) -> &SourcePosition {
        &self.position
    }

    pub fn alerts(&self) -> &AlertSet {
        &self.alerts
    }

    pub fn roots(&self) -> &[T] {
        &self.roots
    }

    pub fn root(&self) -> Option<&T> {
        self.roots.first()
    }

    pub fn into_parts(self) -> (SourcePosition, AlertSet, Vec<T>) {
        (self.position, self.alerts, self.roots)
    }
}

/// Keeps the first root and reports every other one.
pub fn first_root<T: Node>(roots: Vec<T>, sink: &mut dyn AlertSink) -> Option<T> {
    let mut roots = roots.into_iter();
    let first = roots.next()?;
    for extra in roots {
        sink.add(Alert::new(
            AlertKind::MultipleRoots,
            extra.position().clone(),
            format!(
                "{} is an additional root; only {} is compiled",
                extra.display_name(),
                first.display_name()
            ),
        ));
    }
    Some(first)
}
