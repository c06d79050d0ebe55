// ============================================================================
// Chain Planner
// ============================================================================
//
// Builds the full ordered hop sequence between two versions by repeatedly
// resolving single steps against the catalog. Direction is inferred from the
// relative positions of the current and target versions in the chain's
// total order.
//
// ============================================================================

pub mod plan;
mod resolver;

pub use plan::{Plan, Step, Target};
pub use resolver::StepResolver;

use tracing::debug;

use crate::catalog::VersionCatalog;
use crate::core::{Direction, MigrationError, Result};

pub struct ChainPlanner<'a> {
    catalog: &'a VersionCatalog,
    resolver: StepResolver<'a>,
}

impl<'a> ChainPlanner<'a> {
    pub fn new(catalog: &'a VersionCatalog, schema: &str) -> Self {
        Self {
            catalog,
            resolver: StepResolver::new(catalog, schema),
        }
    }

    /// Resolve a symbolic target to a concrete version label.
    pub fn resolve_target(&self, target: &Target) -> Result<String> {
        match target {
            Target::Head => Ok(self.catalog.head().to_string()),
            Target::Root => Ok(self.catalog.root().to_string()),
            Target::Version(v) => {
                if self.catalog.contains(v) {
                    Ok(v.clone())
                } else {
                    Err(MigrationError::UnknownVersion(v.clone()))
                }
            }
        }
    }

    /// Build the hop sequence from `current` to `target`.
    ///
    /// Returns an empty plan when already at the target. Dead-ends before
    /// the target are `PathNotFound`; more hops than the catalog has
    /// migrations is `CycleGuard` (a malformed catalog, not a runtime
    /// condition).
    pub fn plan(&self, current: &str, target: &Target) -> Result<Plan> {
        let current_pos = self
            .catalog
            .position(current)
            .ok_or_else(|| MigrationError::UnknownVersion(current.to_string()))?;

        let target_version = self.resolve_target(target)?;
        if current == target_version {
            return Ok(Plan::already_at(current));
        }

        // target is known, so position always resolves
        let target_pos = self
            .catalog
            .position(&target_version)
            .ok_or_else(|| MigrationError::UnknownVersion(target_version.clone()))?;

        let direction = if current_pos < target_pos {
            Direction::Install
        } else {
            Direction::Uninstall
        };

        let mut steps: Vec<Step> = Vec::new();
        let mut cursor = current.to_string();

        while cursor != target_version {
            if steps.len() > self.catalog.len() {
                return Err(MigrationError::CycleGuard {
                    hops: steps.len(),
                    catalog_len: self.catalog.len(),
                });
            }

            match self.resolver.resolve(&cursor, direction)? {
                Some(step) => {
                    cursor = step.to.clone();
                    steps.push(step);
                }
                None => {
                    return Err(MigrationError::PathNotFound {
                        from: current.to_string(),
                        to: target_version,
                    });
                }
            }
        }

        debug!(
            from_version = current,
            to_version = %target_version,
            hops = steps.len(),
            %direction,
            "planned migration"
        );

        Ok(Plan {
            from: current.to_string(),
            to: target_version,
            steps,
        })
    }
}
