use serde::{Deserialize, Serialize};

/// Which way a hop moves through the version chain.
///
/// `Install` applies a migration's forward statements and lands on its
/// `version`; `Uninstall` applies the backward statements and lands on its
/// `previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Install,
    Uninstall,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Install => write!(f, "install"),
            Direction::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// One versioned, reversible unit of schema change.
///
/// Migrations are plain data: a pair of version labels linking this record
/// into the chain, and a statement list per direction. They are defined at
/// build time and never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    /// The version this migration installs to.
    pub version: String,
    /// The version this migration uninstalls to.
    pub previous: String,
    /// Forward statements, in execution order.
    pub install: Vec<String>,
    /// Backward statements, in execution order. May be intentionally empty
    /// for an irreversible hop.
    pub uninstall: Vec<String>,
    /// When false, the hop's statements cannot share one transaction block
    /// (e.g. enum value addition) and run as a sequential best-effort unit.
    pub transactional: bool,
}

impl Migration {
    pub fn new(
        version: impl Into<String>,
        previous: impl Into<String>,
        install: Vec<String>,
        uninstall: Vec<String>,
    ) -> Self {
        Self {
            version: version.into(),
            previous: previous.into(),
            install,
            uninstall,
            transactional: true,
        }
    }

    /// Mark this hop as unable to run inside a single transaction block.
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    /// The statement list for the given direction.
    pub fn commands(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Install => &self.install,
            Direction::Uninstall => &self.uninstall,
        }
    }

    /// An irreversible hop: installing it cannot be undone at the schema
    /// level, so traversing it in reverse only moves the version marker.
    pub fn is_leaky(&self) -> bool {
        self.uninstall.is_empty()
    }
}
