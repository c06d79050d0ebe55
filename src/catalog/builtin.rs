//! The job queue's shipped schema chain.
//!
//! Every statement is qualified by the schema namespace so several queues
//! can share one database. The chain is data, not behavior: deploying a new
//! release appends one migration here and bumps the head.

use crate::catalog::VersionCatalog;
use crate::core::Migration;

/// The built-in chain as a catalog. Infallible: the chain below is a known
/// linear sequence and is covered by tests.
pub fn job_queue_catalog(schema: &str) -> VersionCatalog {
    VersionCatalog::new(job_queue_migrations(schema))
        .expect("built-in migration chain is a valid linear catalog")
}

/// The raw migration records, oldest to newest.
pub fn job_queue_migrations(schema: &str) -> Vec<Migration> {
    vec![
        Migration::new(
            "0.1.0",
            "0.0.1",
            vec![
                format!("ALTER TABLE {schema}.job ADD singletonOn timestamp without time zone"),
                format!("ALTER TABLE {schema}.job ADD CONSTRAINT job_singleton UNIQUE(name, singletonOn)"),
                // earlier releases appended a row per version; collapse to a single marker row
                format!("TRUNCATE TABLE {schema}.version"),
                format!("INSERT INTO {schema}.version(version) values('0.0.1')"),
            ],
            vec![
                format!("ALTER TABLE {schema}.job DROP CONSTRAINT job_singleton"),
                format!("ALTER TABLE {schema}.job DROP COLUMN singletonOn"),
            ],
        ),
        Migration::new(
            "2",
            "0.1.0",
            vec![
                format!("CREATE TYPE {schema}.job_state AS ENUM ('created','retry','active','complete','expired','cancelled')"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE {schema}.job_state USING state::{schema}.job_state"),
                format!("ALTER TABLE {schema}.job DROP CONSTRAINT job_singleton"),
                format!("ALTER TABLE {schema}.job ADD singletonKey text"),
                format!("CREATE UNIQUE INDEX job_singletonKey ON {schema}.job (name, singletonKey) WHERE state < 'complete' AND singletonOn IS NULL"),
                format!("CREATE UNIQUE INDEX job_singletonOn ON {schema}.job (name, singletonOn) WHERE state < 'expired' AND singletonKey IS NULL"),
                format!("CREATE UNIQUE INDEX job_singletonKeyOn ON {schema}.job (name, singletonOn, singletonKey) WHERE state < 'expired'"),
                format!("UPDATE {schema}.job SET state = 'retry' WHERE state = 'expired' AND retryCount < retryLimit"),
                format!("UPDATE {schema}.job SET completedOn = now() WHERE state = 'expired' and retryLimit = retryCount"),
                format!("ALTER TABLE {schema}.job DROP COLUMN expiredOn"),
            ],
            vec![
                format!("ALTER TABLE {schema}.job ADD expiredOn timestamp without time zone"),
                format!("DROP INDEX {schema}.job_singletonKey"),
                format!("DROP INDEX {schema}.job_singletonOn"),
                format!("DROP INDEX {schema}.job_singletonKeyOn"),
                format!("ALTER TABLE {schema}.job DROP COLUMN singletonKey"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE text"),
                format!("DROP TYPE {schema}.job_state"),
                format!("ALTER TABLE {schema}.job ADD CONSTRAINT job_singleton UNIQUE(name, singletonOn)"),
                format!("UPDATE {schema}.job SET state = 'expired' where state = 'retry'"),
            ],
        ),
        // ALTER TYPE ... ADD VALUE cannot run inside a transaction block, and
        // enum values cannot be removed: the reverse hop is a deliberate
        // schema no-op. Re-applying forward is safe via IF NOT EXISTS.
        Migration::new(
            "3",
            "2",
            vec![
                format!("ALTER TYPE {schema}.job_state ADD VALUE IF NOT EXISTS 'failed' AFTER 'cancelled'"),
            ],
            vec![],
        )
        .non_transactional(),
        Migration::new(
            "4",
            "3",
            vec![
                format!("ALTER TABLE {schema}.job ADD COLUMN priority integer not null default(0)"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN createdOn SET DATA TYPE timestamptz"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN startedOn SET DATA TYPE timestamptz"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN completedOn SET DATA TYPE timestamptz"),
            ],
            vec![
                format!("ALTER TABLE {schema}.job DROP COLUMN priority"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN createdOn SET DATA TYPE timestamp"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN startedOn SET DATA TYPE timestamp"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN completedOn SET DATA TYPE timestamp"),
            ],
        ),
        Migration::new(
            "5",
            "4",
            vec![
                format!("ALTER TABLE {schema}.job ALTER COLUMN startIn SET DEFAULT (interval '0')"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DEFAULT ('created')"),
                format!("UPDATE {schema}.job SET name = left(name, -9) || '__state__expired' WHERE name LIKE '%__expired'"),
            ],
            vec![
                format!("ALTER TABLE {schema}.job ALTER COLUMN startIn DROP DEFAULT"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state DROP DEFAULT"),
                format!("UPDATE {schema}.job SET name = left(name, -16) || '__expired' WHERE name LIKE '%__state__expired'"),
            ],
        ),
        Migration::new(
            "6",
            "5",
            vec![
                format!("CREATE INDEX job_fetch ON {schema}.job (priority desc, createdOn, id) WHERE state < 'active'"),
            ],
            vec![format!("DROP INDEX {schema}.job_fetch")],
        ),
        Migration::new(
            "7",
            "6",
            vec![
                format!("CREATE TABLE IF NOT EXISTS {schema}.archive (LIKE {schema}.job)"),
                format!("ALTER TABLE {schema}.archive ADD archivedOn timestamptz NOT NULL DEFAULT now()"),
            ],
            vec![format!("DROP TABLE {schema}.archive")],
        ),
        Migration::new(
            "8",
            "7",
            vec![
                "CREATE EXTENSION IF NOT EXISTS pgcrypto".to_string(),
                format!("ALTER TABLE {schema}.job ALTER COLUMN id SET DEFAULT gen_random_uuid()"),
                format!("ALTER TABLE {schema}.job ADD retryDelay integer not null DEFAULT (0)"),
                format!("ALTER TABLE {schema}.job ADD retryBackoff boolean not null DEFAULT false"),
                format!("ALTER TABLE {schema}.job ADD startAfter timestamp with time zone not null default now()"),
                format!("UPDATE {schema}.job SET startAfter = createdOn + startIn"),
                format!("ALTER TABLE {schema}.job DROP COLUMN startIn"),
                format!("UPDATE {schema}.job SET expireIn = interval '15 minutes' WHERE expireIn IS NULL"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN expireIn SET NOT NULL"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN expireIn SET DEFAULT interval '15 minutes'"),
                format!("ALTER TABLE {schema}.archive ADD retryDelay integer not null DEFAULT (0)"),
                format!("ALTER TABLE {schema}.archive ADD retryBackoff boolean not null DEFAULT false"),
                format!("ALTER TABLE {schema}.archive ADD startAfter timestamp with time zone"),
                format!("UPDATE {schema}.archive SET startAfter = createdOn + startIn"),
                format!("ALTER TABLE {schema}.archive DROP COLUMN startIn"),
                // the enum has no ALTER for renaming a value; rebuild it
                format!("DROP INDEX {schema}.job_fetch"),
                format!("DROP INDEX {schema}.job_singletonOn"),
                format!("DROP INDEX {schema}.job_singletonKeyOn"),
                format!("DROP INDEX {schema}.job_singletonKey"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state DROP DEFAULT"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE text USING state::text"),
                format!("ALTER TABLE {schema}.archive ALTER COLUMN state SET DATA TYPE text USING state::text"),
                format!("DROP TYPE {schema}.job_state"),
                format!("CREATE TYPE {schema}.job_state AS ENUM ('created', 'retry', 'active', 'completed', 'expired', 'cancelled', 'failed')"),
                format!("UPDATE {schema}.job SET state = 'completed' WHERE state = 'complete'"),
                format!("UPDATE {schema}.archive SET state = 'completed' WHERE state = 'complete'"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE {schema}.job_state USING state::{schema}.job_state"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DEFAULT 'created'"),
                format!("ALTER TABLE {schema}.archive ALTER COLUMN state SET DATA TYPE {schema}.job_state USING state::{schema}.job_state"),
                format!("CREATE INDEX job_fetch ON {schema}.job (name, priority desc, createdOn, id) WHERE state < 'active'"),
                format!("CREATE UNIQUE INDEX job_singletonOn ON {schema}.job (name, singletonOn) WHERE state < 'expired' AND singletonKey IS NULL"),
                format!("CREATE UNIQUE INDEX job_singletonKeyOn ON {schema}.job (name, singletonOn, singletonKey) WHERE state < 'expired'"),
                format!("CREATE UNIQUE INDEX job_singletonKey ON {schema}.job (name, singletonKey) WHERE state < 'completed' AND singletonOn IS NULL"),
                format!("CREATE INDEX job_name ON {schema}.job (name) WHERE state < 'active'"),
            ],
            vec![
                format!("ALTER TABLE {schema}.job ALTER COLUMN id DROP DEFAULT"),
                // pgcrypto may predate this chain, so the extension stays
                format!("ALTER TABLE {schema}.job DROP COLUMN retryDelay"),
                format!("ALTER TABLE {schema}.job DROP COLUMN retryBackoff"),
                format!("ALTER TABLE {schema}.job DROP COLUMN startAfter"),
                format!("ALTER TABLE {schema}.job ADD COLUMN startIn interval not null default(interval '0')"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN expireIn DROP NOT NULL"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN expireIn DROP DEFAULT"),
                format!("ALTER TABLE {schema}.archive DROP COLUMN retryDelay"),
                format!("ALTER TABLE {schema}.archive DROP COLUMN retryBackoff"),
                format!("ALTER TABLE {schema}.archive DROP COLUMN startAfter"),
                format!("ALTER TABLE {schema}.archive ADD COLUMN startIn interval"),
                format!("DROP INDEX {schema}.job_name"),
                format!("DROP INDEX {schema}.job_fetch"),
                format!("DROP INDEX {schema}.job_singletonOn"),
                format!("DROP INDEX {schema}.job_singletonKeyOn"),
                format!("DROP INDEX {schema}.job_singletonKey"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state DROP DEFAULT"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE text USING state::text"),
                format!("ALTER TABLE {schema}.archive ALTER COLUMN state SET DATA TYPE text USING state::text"),
                format!("DROP TYPE {schema}.job_state"),
                format!("CREATE TYPE {schema}.job_state AS ENUM ('created', 'retry', 'active', 'complete', 'expired', 'cancelled', 'failed')"),
                format!("UPDATE {schema}.job SET state = 'completed' WHERE state = 'complete'"),
                format!("UPDATE {schema}.archive SET state = 'complete' WHERE state = 'completed'"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DATA TYPE {schema}.job_state USING state::{schema}.job_state"),
                format!("ALTER TABLE {schema}.job ALTER COLUMN state SET DEFAULT 'created'"),
                format!("ALTER TABLE {schema}.archive ALTER COLUMN state SET DATA TYPE {schema}.job_state USING state::{schema}.job_state"),
                format!("CREATE INDEX job_fetch ON {schema}.job (name, priority desc, createdOn, id) WHERE state < 'active'"),
                format!("CREATE UNIQUE INDEX job_singletonOn ON {schema}.job (name, singletonOn) WHERE state < 'expired' AND singletonKey IS NULL"),
                format!("CREATE UNIQUE INDEX job_singletonKeyOn ON {schema}.job (name, singletonOn, singletonKey) WHERE state < 'expired'"),
                format!("CREATE UNIQUE INDEX job_singletonKey ON {schema}.job (name, singletonKey) WHERE state < 'complete' AND singletonOn IS NULL"),
            ],
        ),
        Migration::new(
            "9",
            "8",
            vec![
                format!("DROP INDEX {schema}.job_fetch"),
                format!("DROP INDEX {schema}.job_name"),
                format!("CREATE INDEX job_name ON {schema}.job (name text_pattern_ops)"),
                format!("UPDATE {schema}.job set name = '__state__completed__' || substr(name, 1, position('__state__completed' in name) - 1) WHERE name LIKE '%__state__completed'"),
            ],
            vec![
                format!("UPDATE {schema}.job set name = substr(name, 21) || '__state__completed' WHERE name LIKE '__state__completed__%'"),
                format!("CREATE INDEX job_fetch ON {schema}.job (name, priority desc, createdOn, id) WHERE state < 'active'"),
                format!("DROP INDEX {schema}.job_name"),
                format!("CREATE INDEX job_name ON {schema}.job (name) WHERE state < 'active'"),
            ],
        ),
        Migration::new(
            "10",
            "9",
            vec![format!("CREATE INDEX archive_id_idx ON {schema}.archive(id)")],
            vec![format!("DROP INDEX {schema}.archive_id_idx")],
        ),
        Migration::new(
            "11",
            "10",
            vec![format!("CREATE INDEX archive_archivedon_idx ON {schema}.archive(archivedon)")],
            vec![format!("DROP INDEX {schema}.archive_archivedon_idx")],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Direction;

    #[test]
    fn test_builtin_chain_is_linear() {
        let migrations = job_queue_migrations("jobq");
        for pair in migrations.windows(2) {
            assert_eq!(pair[1].previous, pair[0].version);
        }
    }

    #[test]
    fn test_builtin_bounds() {
        let catalog = job_queue_catalog("jobq");
        assert_eq!(catalog.root(), "0.0.1");
        assert_eq!(catalog.head(), "11");
        assert_eq!(catalog.len(), 11);
    }

    #[test]
    fn test_statements_are_schema_qualified() {
        for migration in job_queue_migrations("myqueue") {
            for command in migration.install.iter().chain(migration.uninstall.iter()) {
                if command.contains(".job") || command.contains(".version") {
                    assert!(command.contains("myqueue."), "unqualified statement: {command}");
                }
            }
        }
    }

    #[test]
    fn test_enum_value_hop_is_leaky_and_non_transactional() {
        let catalog = job_queue_catalog("jobq");
        let hop = catalog.resolve_step("2", Direction::Install).unwrap().unwrap();
        assert_eq!(hop.version, "3");
        assert!(hop.is_leaky());
        assert!(!hop.transactional);
    }
}
