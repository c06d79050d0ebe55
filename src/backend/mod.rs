// ============================================================================
// Datastore Collaborators
// ============================================================================
//
// The engine never talks to a database directly. It consumes two narrow
// capabilities, supplied by the surrounding runtime:
//
// - StatementRunner: runs an ordered batch of textual statements and
//   reports success or the failing statement. Retry and pooling policy are
//   its own concern.
// - VersionStore: reads the persisted version marker. The write side is
//   performed only as the trailing bookkeeping statement of each step,
//   never as an independent call.
//
// ============================================================================

pub mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;

pub use crate::core::error::StatementError;

#[async_trait]
pub trait StatementRunner: Send + Sync {
    /// Run the batch inside a single transaction. All-or-nothing: on
    /// failure, none of the batch's effects persist.
    async fn run_transaction(&self, statements: &[String]) -> Result<(), StatementError>;

    /// Run the batch sequentially with no wrapping transaction, for hops
    /// whose statements cannot share one. Statements that ran before a
    /// failure stay applied.
    async fn run_sequence(&self, statements: &[String]) -> Result<(), StatementError>;
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    /// The schema's currently-applied version. Errors when the marker is
    /// unreadable or absent (a schema that was never bootstrapped).
    async fn read_version(&self, schema: &str) -> Result<String, StatementError>;
}
