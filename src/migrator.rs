// ============================================================================
// Schema Migrator Facade
// ============================================================================
//
// The entry point the queue runtime calls at startup. An arbitrary number
// of processes may call ensure_schema concurrently against the same
// namespace; the fast-path read, the advisory lock, and the post-acquisition
// re-check together guarantee the chain's statements are applied exactly
// once, with every other caller observing the finished result.
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::backend::{StatementRunner, VersionStore};
use crate::catalog::VersionCatalog;
use crate::core::{Direction, MigrationError, Result};
use crate::executor::{AbortFlag, ExecutionOutcome, MigrationExecutor, RunState};
use crate::lock::AdvisoryLock;
use crate::planner::{ChainPlanner, Target};

/// Migrator configuration
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use schemachain::MigratorConfig;
///
/// let config = MigratorConfig::new("jobq")
///     .lock_timeout(Duration::from_secs(60));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Schema namespace all statements and the lock are scoped to.
    pub schema: String,

    /// Bound on waiting for the migration lock. A timed-out acquisition is
    /// recoverable; the caller decides between backoff-retry and aborting
    /// startup.
    pub lock_timeout: Duration,
}

impl MigratorConfig {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
            lock_timeout: Duration::from_secs(30),
        }
    }

    /// Set the lock acquisition timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.schema.is_empty() {
            return Err("schema namespace cannot be empty".to_string());
        }

        if !self
            .schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "schema namespace '{}' must be alphanumeric/underscore",
                self.schema
            ));
        }

        if self.lock_timeout.is_zero() {
            return Err("lock_timeout must be greater than zero".to_string());
        }

        Ok(())
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self::new("jobq")
    }
}

/// What one migration run did, for diagnostics and logging.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub schema: String,
    pub from_version: String,
    pub final_version: String,
    /// `None` when the run was a no-op.
    pub direction: Option<Direction>,
    pub steps_applied: usize,
    /// Every statement issued by this run, in execution order.
    pub executed: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    /// True when the schema was already at the target and no statements ran.
    pub fn is_noop(&self) -> bool {
        self.steps_applied == 0
    }
}

/// Reversible schema migration engine.
///
/// Moves the persisted schema forward or backward through the catalog's
/// version chain, one hop per transaction, under a cluster-wide advisory
/// lock. Safe to call repeatedly and concurrently; repeated calls when
/// already at the target perform zero statements.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use schemachain::{
///     MemoryAdvisoryLock, MemoryBackend, MigratorConfig, SchemaMigrator, job_queue_catalog,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> schemachain::Result<()> {
/// let backend = Arc::new(MemoryBackend::new());
/// backend.seed("jobq", "0.0.1").await;
///
/// let migrator = SchemaMigrator::new(
///     Arc::new(job_queue_catalog("jobq")),
///     backend.clone(),
///     backend,
///     Arc::new(MemoryAdvisoryLock::new()),
///     MigratorConfig::default(),
/// )?;
///
/// let report = migrator.ensure_schema(None).await?;
/// assert_eq!(report.final_version, "11");
/// # Ok(())
/// # }
/// ```
pub struct SchemaMigrator {
    catalog: Arc<VersionCatalog>,
    runner: Arc<dyn StatementRunner>,
    store: Arc<dyn VersionStore>,
    lock: Arc<dyn AdvisoryLock>,
    config: MigratorConfig,
    abort: AbortFlag,
}

impl SchemaMigrator {
    pub fn new(
        catalog: Arc<VersionCatalog>,
        runner: Arc<dyn StatementRunner>,
        store: Arc<dyn VersionStore>,
        lock: Arc<dyn AdvisoryLock>,
        config: MigratorConfig,
    ) -> Result<Self> {
        config.validate().map_err(MigrationError::Config)?;

        Ok(Self {
            catalog,
            runner,
            store,
            lock,
            config,
            abort: AbortFlag::new(),
        })
    }

    /// Handle for cancelling an in-flight run. Cancellation is honored only
    /// at hop boundaries; call `clear` before reusing the migrator.
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Bring the schema to `target` (default: the catalog head), applying
    /// forward migrations as needed. Idempotent: when the schema is already
    /// at the target, returns without executing any statements. A target
    /// older than the current version is an invalid request here; use
    /// [`rollback_schema`](Self::rollback_schema).
    pub async fn ensure_schema(&self, target: Option<&str>) -> Result<MigrationReport> {
        let target = match target {
            Some(version) => Target::Version(version.to_string()),
            None => Target::Head,
        };
        self.run(target, Direction::Install).await
    }

    /// Move the schema backward to an explicitly named older version.
    pub async fn rollback_schema(&self, target: &str) -> Result<MigrationReport> {
        self.run(Target::Version(target.to_string()), Direction::Uninstall)
            .await
    }

    async fn run(&self, target: Target, allowed: Direction) -> Result<MigrationReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let schema = &self.config.schema;
        debug!(state = %RunState::Idle, %run_id, schema = %schema, %target, "migration run requested");

        let planner = ChainPlanner::new(&self.catalog, schema);
        let desired = planner.resolve_target(&target)?;

        // fast path: no lock contention when the work is already done
        let current = self.store.read_version(schema).await?;
        if current == desired {
            debug!(version = %current, "schema already at target; fast path");
            return Ok(self.report(run_id, started_at, current, None, noop_outcome(&desired)));
        }

        if !self.lock.try_acquire(schema, self.config.lock_timeout).await? {
            return Err(MigrationError::LockTimeout {
                namespace: schema.clone(),
                waited: self.config.lock_timeout,
            });
        }
        debug!(state = %RunState::LockAcquired, %run_id, "migration lock held");

        let result = self.run_locked(&planner, &target, allowed).await;

        // the lock is released on every path; a release failure is logged
        // rather than masking the run's own result
        if let Err(release_err) = self.lock.release(schema).await {
            error!(error = %release_err, schema = %schema, "failed to release migration lock");
        }

        match result {
            Ok((from_version, direction, outcome)) => {
                debug!(state = %RunState::Committed, %run_id, "migration run finished");
                Ok(self.report(run_id, started_at, from_version, direction, outcome))
            }
            Err(err) => {
                debug!(state = %RunState::Failed, %run_id, "migration run failed");
                Err(err)
            }
        }
    }

    /// The critical section: re-check, plan, execute.
    async fn run_locked(
        &self,
        planner: &ChainPlanner<'_>,
        target: &Target,
        allowed: Direction,
    ) -> Result<(String, Option<Direction>, ExecutionOutcome)> {
        let schema = &self.config.schema;

        // re-check: another participant may have finished while we waited
        let current = self.store.read_version(schema).await?;

        debug!(state = %RunState::Planning, from_version = %current, %target, "planning");
        let plan = planner.plan(&current, target)?;

        if plan.is_empty() {
            info!(version = %current, "another process already migrated this schema");
            return Ok((current.clone(), None, noop_outcome(&current)));
        }

        let direction = plan.direction();
        if direction != Some(allowed) {
            return Err(MigrationError::PathNotFound {
                from: plan.from.clone(),
                to: plan.to.clone(),
            });
        }

        info!(
            from_version = %plan.from,
            to_version = %plan.to,
            hops = plan.len(),
            schema = %schema,
            "migrating schema"
        );

        let executor = MigrationExecutor::new(self.runner.clone());
        let outcome = executor.execute_with_abort(&plan, Some(&self.abort)).await?;

        Ok((current, direction, outcome))
    }

    fn report(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        from_version: String,
        direction: Option<Direction>,
        outcome: ExecutionOutcome,
    ) -> MigrationReport {
        let report = MigrationReport {
            run_id,
            schema: self.config.schema.clone(),
            from_version,
            final_version: outcome.final_version,
            direction,
            steps_applied: outcome.hops,
            executed: outcome.executed,
            warnings: outcome.warnings,
            started_at,
            finished_at: Utc::now(),
        };

        if let Ok(json) = serde_json::to_string(&report) {
            debug!(report = %json, "migration report");
        }

        report
    }
}

fn noop_outcome(version: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        final_version: version.to_string(),
        hops: 0,
        executed: Vec::new(),
        warnings: Vec::new(),
    }
}
