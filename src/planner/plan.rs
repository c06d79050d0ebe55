use serde::Serialize;

use crate::core::Direction;

/// Where a run should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The newest version in the catalog.
    Head,
    /// The oldest tracked version.
    Root,
    /// An explicit version label.
    Version(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Head => write!(f, "head"),
            Target::Root => write!(f, "root"),
            Target::Version(v) => write!(f, "{v}"),
        }
    }
}

/// The application of exactly one migration in one direction.
///
/// The final command is always the version-bookkeeping statement, so a step
/// either moves both the schema and the marker or neither.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub from: String,
    pub to: String,
    pub direction: Direction,
    /// Ordered statements, bookkeeping statement last.
    pub commands: Vec<String>,
    /// False for hops whose statements cannot share one transaction block.
    pub transactional: bool,
    /// True when this reverses an irreversible hop: the marker moves, the
    /// schema stays as installed.
    pub leaky: bool,
}

/// An ordered hop sequence bridging a starting version to a target version.
/// Private to the run that planned it.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub from: String,
    pub to: String,
    pub steps: Vec<Step>,
}

impl Plan {
    /// A plan for a caller already at the target.
    pub fn already_at(version: &str) -> Self {
        Self {
            from: version.to_string(),
            to: version.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Direction of travel; `None` for an empty plan.
    pub fn direction(&self) -> Option<Direction> {
        self.steps.first().map(|s| s.direction)
    }

    /// The version the plan lands on if fully executed.
    pub fn final_version(&self) -> &str {
        self.steps.last().map(|s| s.to.as_str()).unwrap_or(&self.from)
    }

    pub fn statement_count(&self) -> usize {
        self.steps.iter().map(|s| s.commands.len()).sum()
    }
}
