use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use schemachain::{
    AdvisoryLock, ChainPlanner, MemoryAdvisoryLock, MemoryBackend, MigrationError, MigratorConfig,
    SchemaMigrator, Target, job_queue_catalog,
};

/// A migrator standing in for one queue process. All processes share the
/// datastore and the cluster-wide lock.
fn process(
    backend: &Arc<MemoryBackend>,
    lock: &Arc<MemoryAdvisoryLock>,
) -> Arc<SchemaMigrator> {
    Arc::new(
        SchemaMigrator::new(
            Arc::new(job_queue_catalog("jobq")),
            backend.clone(),
            backend.clone(),
            lock.clone(),
            MigratorConfig::default(),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_five_concurrent_ensures_apply_the_chain_exactly_once() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0.0.1").await;
    let lock = Arc::new(MemoryAdvisoryLock::new());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let migrator = process(&backend, &lock);
            tokio::spawn(async move { migrator.ensure_schema(None).await })
        })
        .collect();

    let reports: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // every caller observes the identical final version
    for report in &reports {
        assert_eq!(report.final_version, "11");
    }

    // exactly one caller did the work
    assert_eq!(reports.iter().filter(|r| !r.is_noop()).count(), 1);

    // the datastore saw one full plan's statements, no more
    let catalog = job_queue_catalog("jobq");
    let expected = ChainPlanner::new(&catalog, "jobq")
        .plan("0.0.1", &Target::Head)
        .unwrap()
        .statement_count();
    assert_eq!(backend.statement_count().await, expected);
    assert_eq!(backend.version("jobq").await.as_deref(), Some("11"));
}

#[tokio::test]
async fn test_second_ensure_is_a_fast_path_noop() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0.0.1").await;
    let lock = Arc::new(MemoryAdvisoryLock::new());
    let migrator = process(&backend, &lock);

    let first = migrator.ensure_schema(None).await.unwrap();
    assert!(!first.is_noop());
    let count_after_first = backend.statement_count().await;

    let second = migrator.ensure_schema(None).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(second.final_version, "11");
    assert_eq!(backend.statement_count().await, count_after_first);

    // the fast path does not even touch the lock
    assert!(lock.try_acquire("jobq", Duration::from_millis(1)).await.unwrap());
}

#[tokio::test]
async fn test_lock_timeout_is_recoverable() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0.0.1").await;
    let lock = Arc::new(MemoryAdvisoryLock::new());

    // someone else holds the namespace
    assert!(lock.try_acquire("jobq", Duration::from_millis(1)).await.unwrap());

    let migrator = Arc::new(
        SchemaMigrator::new(
            Arc::new(job_queue_catalog("jobq")),
            backend.clone(),
            backend.clone(),
            lock.clone(),
            MigratorConfig::new("jobq").lock_timeout(Duration::from_millis(30)),
        )
        .unwrap(),
    );

    let err = migrator.ensure_schema(None).await.unwrap_err();
    assert!(matches!(err, MigrationError::LockTimeout { ref namespace, .. } if namespace == "jobq"));
    assert_eq!(backend.statement_count().await, 0);

    // retry succeeds once the holder releases
    lock.release("jobq").await.unwrap();
    let report = migrator.ensure_schema(None).await.unwrap();
    assert_eq!(report.final_version, "11");
}

#[tokio::test]
async fn test_waiters_observe_the_winners_result_without_executing() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("jobq", "0.0.1").await;
    let lock = Arc::new(MemoryAdvisoryLock::new());

    // the lock holder migrates while the waiter polls the namespace
    assert!(lock.try_acquire("jobq", Duration::from_millis(1)).await.unwrap());

    let waiter = {
        let migrator = process(&backend, &lock);
        tokio::spawn(async move { migrator.ensure_schema(None).await })
    };

    let catalog = job_queue_catalog("jobq");
    let plan = ChainPlanner::new(&catalog, "jobq")
        .plan("0.0.1", &Target::Head)
        .unwrap();
    schemachain::MigrationExecutor::new(backend.clone())
        .execute(&plan)
        .await
        .unwrap();
    lock.release("jobq").await.unwrap();

    let report = waiter.await.unwrap().unwrap();
    assert!(report.is_noop());
    assert_eq!(report.final_version, "11");
}
