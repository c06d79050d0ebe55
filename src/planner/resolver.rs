use tracing::warn;

use super::plan::Step;
use crate::catalog::VersionCatalog;
use crate::core::{Direction, Result};

/// Resolves the single adjacent hop for a version and direction.
///
/// Every resolved step ends with a statement assigning the persisted
/// version marker to the hop's target, so the schema change and the marker
/// commit are issued as one unit: a crash between them cannot leave the
/// schema changed without the marker reflecting it, or vice versa.
pub struct StepResolver<'a> {
    catalog: &'a VersionCatalog,
    schema: String,
}

impl<'a> StepResolver<'a> {
    pub fn new(catalog: &'a VersionCatalog, schema: &str) -> Self {
        Self {
            catalog,
            schema: schema.to_string(),
        }
    }

    /// The next step from `version` in `direction`, or `None` at the chain
    /// boundary. Unknown versions surface as `UnknownVersion`.
    pub fn resolve(&self, version: &str, direction: Direction) -> Result<Option<Step>> {
        let Some(migration) = self.catalog.resolve_step(version, direction)? else {
            return Ok(None);
        };

        let target = match direction {
            Direction::Install => migration.version.clone(),
            Direction::Uninstall => migration.previous.clone(),
        };

        let leaky = direction == Direction::Uninstall && migration.is_leaky();
        if leaky {
            warn!(
                from_version = version,
                to_version = %target,
                "reversing an irreversible hop: no uninstall commands, only the version marker moves"
            );
        }

        let mut commands = migration.commands(direction).to_vec();
        commands.push(version_update(&self.schema, &target));

        Ok(Some(Step {
            from: version.to_string(),
            to: target,
            direction,
            commands,
            transactional: migration.transactional,
            leaky,
        }))
    }
}

/// The version-bookkeeping statement: the only writer of the marker.
pub(crate) fn version_update(schema: &str, version: &str) -> String {
    format!("UPDATE {schema}.version SET version = '{version}';")
}
