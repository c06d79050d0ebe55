// ============================================================================
// Migration Executor
// ============================================================================
//
// Applies a plan one hop at a time. Each hop runs in its own scoped
// transaction (or as a sequential best-effort unit when flagged), so a
// failure contains itself: the hop that failed rolls back, everything
// committed before it stays committed, and the persisted version equals the
// target of the last committed hop. Already-committed hops are never
// compensated; some hops perform one-time destructive data transforms and
// unwinding them would be unsafe.
//
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info};

use crate::backend::StatementRunner;
use crate::core::{MigrationError, Result};
use crate::planner::Plan;

/// Cooperative cancellation for a run. Checked only at hop boundaries: a
/// statement batch always runs to completion or explicit failure, never
/// stopping mid-hop with partial column or constraint state.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Phases of one migration run, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LockAcquired,
    Planning,
    Executing(usize),
    Committed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::LockAcquired => write!(f, "lock_acquired"),
            RunState::Planning => write!(f, "planning"),
            RunState::Executing(hop) => write!(f, "executing({hop})"),
            RunState::Committed => write!(f, "committed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Target of the last committed hop.
    pub final_version: String,
    /// Number of hops committed.
    pub hops: usize,
    /// Every statement issued, in execution order.
    pub executed: Vec<String>,
    /// Advisories, e.g. leaky hops traversed in reverse.
    pub warnings: Vec<String>,
}

pub struct MigrationExecutor {
    runner: Arc<dyn StatementRunner>,
}

impl MigrationExecutor {
    pub fn new(runner: Arc<dyn StatementRunner>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, plan: &Plan) -> Result<ExecutionOutcome> {
        self.execute_with_abort(plan, None).await
    }

    /// Run the plan's hops strictly in order, stopping at the first failed
    /// statement or at an abort request seen at a hop boundary.
    pub async fn execute_with_abort(
        &self,
        plan: &Plan,
        abort: Option<&AbortFlag>,
    ) -> Result<ExecutionOutcome> {
        let mut executed: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut committed = plan.from.clone();

        for (idx, step) in plan.steps.iter().enumerate() {
            if let Some(flag) = abort {
                if flag.is_aborted() {
                    info!(at_version = %committed, "abort requested; stopping before next hop");
                    return Err(MigrationError::Aborted(committed));
                }
            }

            let state = RunState::Executing(idx + 1);
            debug!(state = %state, from_version = %step.from, to_version = %step.to, "run state");
            info!(
                hop = idx + 1,
                hops = plan.len(),
                from_version = %step.from,
                to_version = %step.to,
                direction = %step.direction,
                statements = step.commands.len(),
                "applying migration hop"
            );

            let run = if step.transactional {
                self.runner.run_transaction(&step.commands).await
            } else {
                self.runner.run_sequence(&step.commands).await
            };

            if let Err(failure) = run {
                error!(
                    to_version = %step.to,
                    statement = %failure.statement,
                    "migration hop failed; keeping versions committed so far"
                );
                return Err(MigrationError::StepFailed {
                    version: step.to.clone(),
                    statement: failure.statement,
                    source: failure.source,
                });
            }

            if step.leaky {
                warnings.push(format!(
                    "hop {} -> {} has no uninstall commands; the schema stays as installed",
                    step.from, step.to
                ));
            }

            executed.extend(step.commands.iter().cloned());
            committed = step.to.clone();
        }

        Ok(ExecutionOutcome {
            final_version: committed,
            hops: plan.len(),
            executed,
            warnings,
        })
    }
}
