use std::time::Duration;

use thiserror::Error;

/// Failure reported by the datastore-facing collaborators: the statement
/// runner, the version store, and advisory-lock implementations backed by
/// real statements. Carries the failing statement and the underlying
/// datastore error as an opaque source.
#[derive(Debug, Error)]
#[error("statement failed: {statement}")]
pub struct StatementError {
    pub statement: String,
    #[source]
    pub source: anyhow::Error,
}

impl StatementError {
    pub fn new(statement: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            statement: statement.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    /// A requested or persisted version is absent from the catalog.
    /// Signals a catalog/deployment mismatch or datastore corruption.
    #[error("version '{0}' is not present in the migration catalog")]
    UnknownVersion(String),

    /// No resolvable hop sequence connects the two versions in the inferred
    /// direction, or the requested target is invalid for the operation.
    #[error("no migration path from '{from}' to '{to}'")]
    PathNotFound { from: String, to: String },

    /// The migration lock was not acquired within the bound. Recoverable:
    /// the caller decides between retry-with-backoff and aborting startup.
    #[error("migration lock on '{namespace}' not acquired within {waited:?}")]
    LockTimeout { namespace: String, waited: Duration },

    /// A statement within a hop failed. The persisted version remains at
    /// the target of the last committed hop.
    #[error("migration to version '{version}' failed on statement: {statement}")]
    StepFailed {
        version: String,
        statement: String,
        #[source]
        source: anyhow::Error,
    },

    /// The planner exceeded the catalog's length in hop count. Always a
    /// malformed catalog, never a transient runtime condition.
    #[error("planner took {hops} hops on a catalog of {catalog_len} migrations; the chain is not linear")]
    CycleGuard { hops: usize, catalog_len: usize },

    /// The run was cancelled at a hop boundary. The persisted version
    /// equals the target of the last committed hop.
    #[error("migration run aborted at version '{0}'")]
    Aborted(String),

    #[error("invalid migration catalog: {0}")]
    Catalog(String),

    #[error("invalid migrator configuration: {0}")]
    Config(String),

    #[error("datastore error: {0}")]
    Store(#[from] StatementError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
