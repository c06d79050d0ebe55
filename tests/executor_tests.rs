use std::sync::Arc;

use schemachain::{
    Direction, MemoryAdvisoryLock, MemoryBackend, Migration, MigrationError, MigratorConfig,
    SchemaMigrator, VersionCatalog,
};

/// Five reversible hops: versions "1" through "5" above the root "0".
fn five_hop_catalog() -> VersionCatalog {
    let migrations = (1..=5)
        .map(|v| {
            Migration::new(
                v.to_string(),
                (v - 1).to_string(),
                vec![format!("CREATE TABLE jobq.t{v} (id INTEGER)")],
                vec![format!("DROP TABLE jobq.t{v}")],
            )
        })
        .collect();
    VersionCatalog::new(migrations).unwrap()
}

fn migrator(catalog: VersionCatalog, backend: Arc<MemoryBackend>) -> SchemaMigrator {
    SchemaMigrator::new(
        Arc::new(catalog),
        backend.clone(),
        backend,
        Arc::new(MemoryAdvisoryLock::new()),
        MigratorConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_run_reports_every_statement_in_order() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0").await;
    let migrator = migrator(five_hop_catalog(), backend.clone());

    let report = migrator.ensure_schema(None).await.unwrap();

    assert_eq!(report.from_version, "0");
    assert_eq!(report.final_version, "5");
    assert_eq!(report.direction, Some(Direction::Install));
    assert_eq!(report.steps_applied, 5);
    // one domain statement plus one bookkeeping statement per hop
    assert_eq!(report.executed.len(), 10);
    assert_eq!(backend.applied().await, report.executed);
    assert_eq!(report.executed[0], "CREATE TABLE jobq.t1 (id INTEGER)");
    assert_eq!(report.executed[1], "UPDATE jobq.version SET version = '1';");
}

#[tokio::test]
async fn test_failure_at_hop_three_keeps_hop_two() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0").await;
    backend.fail_matching("t3").await;
    let migrator = migrator(five_hop_catalog(), backend.clone());

    let err = migrator.ensure_schema(None).await.unwrap_err();

    // the surfaced error names the failed hop's target version
    match err {
        MigrationError::StepFailed { version, statement, .. } => {
            assert_eq!(version, "3");
            assert!(statement.contains("t3"));
        }
        other => panic!("expected StepFailed, got {other:?}"),
    }

    // the persisted version equals the target of the last committed hop
    assert_eq!(backend.version("jobq").await.as_deref(), Some("2"));

    // hops 1 and 2 are fully applied, hop 3 not at all
    let applied = backend.applied().await;
    assert_eq!(applied.len(), 4);
    assert!(!applied.iter().any(|s| s.contains("t3")));
}

#[tokio::test]
async fn test_failed_run_is_resumable_after_the_cause_clears() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0").await;
    backend.fail_matching("t3").await;
    let migrator = migrator(five_hop_catalog(), backend.clone());

    migrator.ensure_schema(None).await.unwrap_err();
    backend.clear_failure().await;

    // the next run picks up from the last committed hop
    let report = migrator.ensure_schema(None).await.unwrap();
    assert_eq!(report.from_version, "2");
    assert_eq!(report.final_version, "5");
    assert_eq!(report.steps_applied, 3);
}

#[tokio::test]
async fn test_non_transactional_hop_keeps_partial_statements() {
    let catalog = VersionCatalog::new(vec![
        Migration::new(
            "2",
            "1",
            vec![
                "ALTER TYPE jobq.job_state ADD VALUE 'failed'".to_string(),
                "CREATE INDEX jobq_state_idx ON jobq.job (state)".to_string(),
            ],
            vec![],
        )
        .non_transactional(),
    ])
    .unwrap();

    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "1").await;
    backend.fail_matching("jobq_state_idx").await;
    let migrator = migrator(catalog, backend.clone());

    let err = migrator.ensure_schema(None).await.unwrap_err();
    assert!(matches!(err, MigrationError::StepFailed { version, .. } if version == "2"));

    // best-effort unit: the first statement stays applied, but the
    // bookkeeping statement never ran so the marker did not move
    assert_eq!(backend.statement_count().await, 1);
    assert_eq!(backend.version("jobq").await.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_abort_is_honored_at_the_first_hop_boundary() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0").await;
    let migrator = migrator(five_hop_catalog(), backend.clone());

    migrator.abort_flag().abort();
    let err = migrator.ensure_schema(None).await.unwrap_err();

    assert!(matches!(err, MigrationError::Aborted(v) if v == "0"));
    assert_eq!(backend.statement_count().await, 0);
    assert_eq!(backend.version("jobq").await.as_deref(), Some("0"));

    // a cleared flag lets the next run proceed
    migrator.abort_flag().clear();
    let report = migrator.ensure_schema(None).await.unwrap();
    assert_eq!(report.final_version, "5");
}

#[tokio::test]
async fn test_unseeded_schema_surfaces_a_store_error() {
    let backend = Arc::new(MemoryBackend::new());
    let migrator = migrator(five_hop_catalog(), backend);

    let err = migrator.ensure_schema(None).await.unwrap_err();
    assert!(matches!(err, MigrationError::Store(_)));
}
