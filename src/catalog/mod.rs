// ============================================================================
// Version Catalog
// ============================================================================
//
// The build-time-defined, immutable chain of schema migrations, ordered
// oldest to newest. The catalog answers two questions:
//
// - resolve_step: given a version and a direction, which single adjacent
//   migration applies next, if any?
// - position: where does a version sit in the chain's total order?
//
// Lookups go through index maps so multi-hop planning never rescans the
// migration list.
//
// ============================================================================

pub mod builtin;

pub use builtin::{job_queue_catalog, job_queue_migrations};

use std::collections::HashMap;

use crate::core::{Direction, Migration, MigrationError, Result};

pub struct VersionCatalog {
    migrations: Vec<Migration>,
    /// version label -> index of the migration that installs it
    by_version: HashMap<String, usize>,
    /// version label -> index of the migration that installs FROM it
    by_previous: HashMap<String, usize>,
}

impl VersionCatalog {
    /// Build a catalog from migrations ordered oldest to newest.
    ///
    /// Rejects an empty list, duplicate `version` labels, duplicate
    /// `previous` labels, and self-referencing records. Chain connectivity
    /// is not verified here; a dead-ended or cyclic chain surfaces at plan
    /// time as `PathNotFound` or `CycleGuard`.
    pub fn new(migrations: Vec<Migration>) -> Result<Self> {
        if migrations.is_empty() {
            return Err(MigrationError::Catalog(
                "catalog must contain at least one migration".to_string(),
            ));
        }

        let mut by_version = HashMap::with_capacity(migrations.len());
        let mut by_previous = HashMap::with_capacity(migrations.len());

        for (idx, migration) in migrations.iter().enumerate() {
            if migration.version == migration.previous {
                return Err(MigrationError::Catalog(format!(
                    "migration '{}' lists itself as previous",
                    migration.version
                )));
            }
            if by_version.insert(migration.version.clone(), idx).is_some() {
                return Err(MigrationError::Catalog(format!(
                    "duplicate version '{}'",
                    migration.version
                )));
            }
            if by_previous.insert(migration.previous.clone(), idx).is_some() {
                return Err(MigrationError::Catalog(format!(
                    "duplicate previous version '{}'",
                    migration.previous
                )));
            }
        }

        Ok(Self {
            migrations,
            by_version,
            by_previous,
        })
    }

    /// The oldest tracked version: the `previous` of the first migration.
    pub fn root(&self) -> &str {
        &self.migrations[0].previous
    }

    /// The newest version: the `version` of the last migration.
    pub fn head(&self) -> &str {
        &self.migrations[self.migrations.len() - 1].version
    }

    /// Number of migrations in the chain (equals the maximum hop count of
    /// any valid plan).
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// All migrations, oldest to newest.
    pub fn all(&self) -> &[Migration] {
        &self.migrations
    }

    /// Whether the version appears anywhere in the chain, in either role.
    pub fn contains(&self, version: &str) -> bool {
        self.by_version.contains_key(version) || self.by_previous.contains_key(version)
    }

    /// Position of a version in the chain's total order. The root is 0,
    /// the head is `len()`. `None` for versions the catalog has never seen.
    pub fn position(&self, version: &str) -> Option<usize> {
        if let Some(idx) = self.by_version.get(version) {
            Some(idx + 1)
        } else {
            self.by_previous.get(version).copied()
        }
    }

    /// The single adjacent migration for `version` in `direction`.
    ///
    /// Install looks for the migration whose `previous` matches; uninstall
    /// for the one whose `version` matches. `Ok(None)` means the version is
    /// known but sits at the head (no forward hop) or the root (no backward
    /// hop). An unrecognized version is an error, never silently "at head".
    pub fn resolve_step(&self, version: &str, direction: Direction) -> Result<Option<&Migration>> {
        let hit = match direction {
            Direction::Install => self.by_previous.get(version),
            Direction::Uninstall => self.by_version.get(version),
        };

        match hit {
            Some(&idx) => Ok(Some(&self.migrations[idx])),
            None if self.contains(version) => Ok(None),
            None => Err(MigrationError::UnknownVersion(version.to_string())),
        }
    }
}
