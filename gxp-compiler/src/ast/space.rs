//! Whitespace operators for `gxp:ispace` and `gxp:espace`.

use std::fmt;
use std::str::FromStr;

/// What to do with a run of whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceOperator {
    Preserve,
    Remove,
    Normalize,
    Collapse,
}

impl SpaceOperator {
    /// Applies this operator to a whitespace-only run.
    pub fn apply(self, run: &str) -> String {
        match self {
            SpaceOperator::Preserve => run.to_string(),
            SpaceOperator::Remove => String::new(),
            SpaceOperator::Normalize => normalize(run),
            SpaceOperator::Collapse => {
                if run.contains(['\n', '\x0c']) {
                    "\n".to_string()
                } else {
                    normalize(run)
                }
            }
        }
    }
}

fn normalize(run: &str) -> String {
    if run.is_empty() {
        String::new()
    } else {
        " ".to_string()
    }
}

impl FromStr for SpaceOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(SpaceOperator::Preserve),
            "remove" => Ok(SpaceOperator::Remove),
            "normalize" => Ok(SpaceOperator::Normalize),
            "collapse" => Ok(SpaceOperator::Collapse),
            _ => Err(format!("'{s}' is not a space operator")),
        }
    }
}

impl fmt::Display for SpaceOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpaceOperator::Preserve => "preserve",
            SpaceOperator::Remove => "remove",
            SpaceOperator::Normalize => "normalize",
            SpaceOperator::Collapse => "collapse",
        })
    }
}

/// Interior and exterior operators of a region. `None` inherits from the enclosing region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpaceOperators {
    pub interior: Option<SpaceOperator>,
    pub exterior: Option<SpaceOperator>,
}

impl SpaceOperators {
    pub const TEMPLATE: SpaceOperators =
        SpaceOperators::both(SpaceOperator::Collapse, SpaceOperator::Remove);
    pub const PRESERVING: SpaceOperators =
        SpaceOperators::both(SpaceOperator::Preserve, SpaceOperator::Preserve);
    pub const ATTRIBUTE: SpaceOperators =
        SpaceOperators::both(SpaceOperator::Normalize, SpaceOperator::Remove);
    pub const MESSAGE: SpaceOperators =
        SpaceOperators::both(SpaceOperator::Normalize, SpaceOperator::Remove);

    pub const fn both(interior: SpaceOperator, exterior: SpaceOperator) -> Self {
        SpaceOperators {
            interior: Some(interior),
            exterior: Some(exterior),
        }
    }

    /// Fills unset operators from `outer`.
    pub fn inherit_from(self, outer: &SpaceOperators) -> SpaceOperators {
        SpaceOperators {
            interior: self.interior.or(outer.interior),
            exterior: self.exterior.or(outer.exterior),
        }
    }

    pub fn interior_or_preserve(&self) -> SpaceOperator {
        self.interior.unwrap_or(SpaceOperator::Preserve)
    }

    pub fn exterior_or_preserve(&self) -> SpaceOperator {
        self.exterior.unwrap_or(SpaceOperator::Preserve)
    }
}

/// ASCII whitespace as template sources understand it. A non-breaking space is text.
pub fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_space)
}
