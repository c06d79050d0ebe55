use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;

use super::{StatementError, StatementRunner, VersionStore};

lazy_static! {
    /// Matches the version-bookkeeping statement and captures the schema
    /// namespace and the assigned version.
    static ref VERSION_UPDATE: Regex =
        Regex::new(r"^UPDATE\s+(\S+)\.version\s+SET\s+version\s*=\s*'([^']+)'").unwrap();
}

#[derive(Default)]
struct MemoryState {
    /// schema namespace -> persisted version marker
    versions: HashMap<String, String>,
    /// every applied statement, in application order
    applied: Vec<String>,
    /// failure injection: statements containing this fragment fail
    fail_on: Option<String>,
}

/// In-memory stand-in for the datastore.
///
/// Implements both collaborator traits: statements are appended to an
/// ordered log, and the version marker is tracked by recognizing the
/// bookkeeping statement. Useful for embedded testing of migration flows
/// without a live database.
///
/// # Examples
///
/// ```
/// use schemachain::MemoryBackend;
///
/// # tokio_test::block_on(async {
/// let backend = MemoryBackend::new();
/// backend.seed("jobq", "0.0.1").await;
/// assert_eq!(backend.version("jobq").await.as_deref(), Some("0.0.1"));
/// # });
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persisted marker directly, standing in for bootstrap.
    pub async fn seed(&self, schema: &str, version: &str) {
        let mut state = self.state.lock().await;
        state.versions.insert(schema.to_string(), version.to_string());
    }

    /// Make any statement containing `fragment` fail from now on.
    pub async fn fail_matching(&self, fragment: &str) {
        self.state.lock().await.fail_on = Some(fragment.to_string());
    }

    pub async fn clear_failure(&self) {
        self.state.lock().await.fail_on = None;
    }

    /// The current marker for a schema, if bootstrapped.
    pub async fn version(&self, schema: &str) -> Option<String> {
        self.state.lock().await.versions.get(schema).cloned()
    }

    /// All applied statements, in order.
    pub async fn applied(&self) -> Vec<String> {
        self.state.lock().await.applied.clone()
    }

    pub async fn statement_count(&self) -> usize {
        self.state.lock().await.applied.len()
    }

    fn apply(state: &mut MemoryState, statement: &str) {
        if let Some(caps) = VERSION_UPDATE.captures(statement) {
            state
                .versions
                .insert(caps[1].to_string(), caps[2].to_string());
        }
        state.applied.push(statement.to_string());
    }

    fn injected_failure(state: &MemoryState, statement: &str) -> Option<StatementError> {
        let fragment = state.fail_on.as_deref()?;
        if statement.contains(fragment) {
            Some(StatementError::new(
                statement,
                anyhow!("injected failure on '{fragment}'"),
            ))
        } else {
            None
        }
    }
}

#[async_trait]
impl StatementRunner for MemoryBackend {
    async fn run_transaction(&self, statements: &[String]) -> Result<(), StatementError> {
        let mut state = self.state.lock().await;

        // all-or-nothing: reject the batch before applying anything
        for statement in statements {
            if let Some(err) = Self::injected_failure(&state, statement) {
                return Err(err);
            }
        }
        for statement in statements {
            Self::apply(&mut state, statement);
        }
        Ok(())
    }

    async fn run_sequence(&self, statements: &[String]) -> Result<(), StatementError> {
        let mut state = self.state.lock().await;

        for statement in statements {
            if let Some(err) = Self::injected_failure(&state, statement) {
                return Err(err);
            }
            Self::apply(&mut state, statement);
        }
        Ok(())
    }
}

#[async_trait]
impl VersionStore for MemoryBackend {
    async fn read_version(&self, schema: &str) -> Result<String, StatementError> {
        self.state
            .lock()
            .await
            .versions
            .get(schema)
            .cloned()
            .ok_or_else(|| {
                StatementError::new(
                    format!("SELECT version FROM {schema}.version"),
                    anyhow!("version marker not found; schema was never bootstrapped"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_marker_tracks_bookkeeping_statement() {
        let backend = MemoryBackend::new();
        backend.seed("jobq", "1").await;

        backend
            .run_transaction(&[
                "CREATE TABLE jobq.job (id INTEGER)".to_string(),
                "UPDATE jobq.version SET version = '2';".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(backend.version("jobq").await.as_deref(), Some("2"));
        assert_eq!(backend.statement_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_transaction_applies_nothing() {
        let backend = MemoryBackend::new();
        backend.seed("jobq", "1").await;
        backend.fail_matching("BOOM").await;

        let err = backend
            .run_transaction(&[
                "CREATE TABLE jobq.a (id INTEGER)".to_string(),
                "BOOM".to_string(),
                "UPDATE jobq.version SET version = '2';".to_string(),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.statement, "BOOM");
        assert_eq!(backend.statement_count().await, 0);
        assert_eq!(backend.version("jobq").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_failed_sequence_keeps_earlier_statements() {
        let backend = MemoryBackend::new();
        backend.fail_matching("BOOM").await;

        let err = backend
            .run_sequence(&[
                "ALTER TYPE jobq.job_state ADD VALUE 'failed'".to_string(),
                "BOOM".to_string(),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.statement, "BOOM");
        assert_eq!(backend.statement_count().await, 1);
    }

    #[tokio::test]
    async fn test_read_version_requires_bootstrap() {
        let backend = MemoryBackend::new();
        assert!(backend.read_version("jobq").await.is_err());

        backend.seed("jobq", "0.0.1").await;
        assert_eq!(backend.read_version("jobq").await.unwrap(), "0.0.1");
    }
}
