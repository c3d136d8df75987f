//! Coherence tests for the reconciliation filter algebra: every filter is
//! evaluated both as a persistent query and element-wise over materialized
//! instances, and the two result multisets must agree.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;

use cluster_inventory::reconciliation::filters::{
    CurrentlyReconciling, CurrentlyReconcilingWithRuntimeId, Filter, FilterMixer, Limit,
    WithClusterConfigStatus, WithCreationDateAfter, WithCreationDateBefore, WithRuntimeId,
    WithRuntimeIds, WithSchedulingId, WithStatuses,
};
use cluster_inventory::reconciliation::ReconciliationRepository;
use cluster_inventory::{
    Cluster, ClusterInventory, ClusterStatus, DatabaseConnection, Inventory, InventoryError,
    KymaConfig, NoopMetrics, ReconciliationEntity,
};

fn test_cluster(runtime_id: &str) -> Cluster {
    Cluster {
        runtime_id: runtime_id.to_string(),
        metadata: json!({"instanceID": format!("instance-{runtime_id}")}),
        runtime_input: json!({"name": format!("cluster-{runtime_id}")}),
        kyma_config: KymaConfig {
            profile: None,
            version: "2.4.0".to_string(),
            components: vec![],
            administrators: vec![],
        },
    }
}

/// Seed one ledger row per runtime; runtimes listed in `finished` are
/// completed afterwards so the ledger holds a mix of open and closed runs.
async fn seed_ledger(
    pool: PgPool,
    runtimes: &[&str],
    finished: &[&str],
) -> (ReconciliationRepository, Vec<ReconciliationEntity>) {
    let conn = DatabaseConnection::from_pool(pool);
    let inventory = ClusterInventory::new(&conn, Arc::new(NoopMetrics));
    let repository = ReconciliationRepository::new(&conn);

    for runtime_id in runtimes {
        let state = inventory
            .create_or_update(1, &test_cluster(runtime_id))
            .await
            .unwrap();
        let entity = repository.create_reconciliation(&state).await.unwrap();
        if finished.contains(runtime_id) {
            repository
                .finish_reconciliation(&entity.scheduling_id)
                .await
                .unwrap();
        }
    }

    let all = repository.get_reconciliations(None).await.unwrap();
    assert_eq!(all.len(), runtimes.len());
    (repository, all)
}

fn apply_instance_side(
    filter: &mut dyn Filter,
    rows: &[ReconciliationEntity],
) -> Vec<ReconciliationEntity> {
    rows.iter()
        .cloned()
        .filter_map(|row| filter.filter_by_instance(row))
        .collect()
}

fn scheduling_ids(rows: &[ReconciliationEntity]) -> Vec<String> {
    let mut ids: Vec<_> = rows.iter().map(|r| r.scheduling_id.clone()).collect();
    ids.sort();
    ids
}

/// Both evaluation modes must select the same multiset.
async fn assert_coherent(
    repository: &ReconciliationRepository,
    all: &[ReconciliationEntity],
    query_side: &dyn Filter,
    instance_side: &mut dyn Filter,
) {
    let persistent = repository
        .get_reconciliations(Some(query_side))
        .await
        .unwrap();
    let in_memory = apply_instance_side(instance_side, all);
    assert_eq!(scheduling_ids(&persistent), scheduling_ids(&in_memory));
}

#[sqlx::test]
async fn runtime_id_filters_are_coherent(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b", "c"], &["b"]).await;

    assert_coherent(
        &repository,
        &all,
        &WithRuntimeId::new("b"),
        &mut WithRuntimeId::new("b"),
    )
    .await;

    assert_coherent(
        &repository,
        &all,
        &WithRuntimeIds::new(vec!["a".into(), "c".into()]),
        &mut WithRuntimeIds::new(vec!["a".into(), "c".into()]),
    )
    .await;

    // Empty runtime-ID list is a no-op: everything passes in both modes.
    let persistent = repository
        .get_reconciliations(Some(&WithRuntimeIds::new(vec![])))
        .await
        .unwrap();
    assert_eq!(persistent.len(), all.len());
    assert_eq!(
        apply_instance_side(&mut WithRuntimeIds::new(vec![]), &all).len(),
        all.len()
    );
}

#[sqlx::test]
async fn finished_flag_filters_are_coherent(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b", "c"], &["b", "c"]).await;

    assert_coherent(
        &repository,
        &all,
        &CurrentlyReconciling,
        &mut CurrentlyReconciling,
    )
    .await;

    assert_coherent(
        &repository,
        &all,
        &CurrentlyReconcilingWithRuntimeId::new("a"),
        &mut CurrentlyReconcilingWithRuntimeId::new("a"),
    )
    .await;

    // The finished run of runtime "b" matches neither.
    let open = repository
        .get_reconciliations(Some(&CurrentlyReconcilingWithRuntimeId::new("b")))
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[sqlx::test]
async fn status_and_config_status_filters_are_coherent(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b"], &[]).await;

    assert_coherent(
        &repository,
        &all,
        &WithStatuses::new(vec![ClusterStatus::ReconcilePending]).unwrap(),
        &mut WithStatuses::new(vec![ClusterStatus::ReconcilePending]).unwrap(),
    )
    .await;

    assert_coherent(
        &repository,
        &all,
        &WithStatuses::new(vec![ClusterStatus::Ready, ClusterStatus::Deleted]).unwrap(),
        &mut WithStatuses::new(vec![ClusterStatus::Ready, ClusterStatus::Deleted]).unwrap(),
    )
    .await;

    let target = all[0].cluster_config_status;
    assert_coherent(
        &repository,
        &all,
        &WithClusterConfigStatus::new(target),
        &mut WithClusterConfigStatus::new(target),
    )
    .await;
}

#[sqlx::test]
async fn scheduling_id_filter_is_coherent(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b"], &[]).await;
    let target = all[0].scheduling_id.clone();

    assert_coherent(
        &repository,
        &all,
        &WithSchedulingId::new(target.clone()),
        &mut WithSchedulingId::new(target),
    )
    .await;
}

#[sqlx::test]
async fn creation_date_filters_are_coherent(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b", "c"], &[]).await;

    let mut times: Vec<_> = all.iter().map(|r| r.created).collect();
    times.sort();
    let midpoint = times[1];

    assert_coherent(
        &repository,
        &all,
        &WithCreationDateAfter::new(midpoint),
        &mut WithCreationDateAfter::new(midpoint),
    )
    .await;

    assert_coherent(
        &repository,
        &all,
        &WithCreationDateBefore::new(midpoint),
        &mut WithCreationDateBefore::new(midpoint),
    )
    .await;
}

#[sqlx::test]
async fn limit_keeps_the_newest_rows(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b", "c", "d"], &[]).await;

    let persistent = repository
        .get_reconciliations(Some(&Limit::new(2).unwrap()))
        .await
        .unwrap();
    assert_eq!(persistent.len(), 2);

    // The instance form only reproduces the query result once the rows are
    // sorted newest first.
    let mut newest_first = all.clone();
    newest_first.sort_by(|a, b| b.created.cmp(&a.created).then(b.scheduling_id.cmp(&a.scheduling_id)));
    let mut limit = Limit::new(2).unwrap();
    let in_memory = apply_instance_side(&mut limit, &newest_first);
    assert_eq!(scheduling_ids(&persistent), scheduling_ids(&in_memory));
}

#[sqlx::test]
async fn mixer_composes_coherently(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b", "c"], &["c"]).await;

    let build = || {
        FilterMixer::new()
            .with(WithStatuses::new(vec![ClusterStatus::ReconcilePending]).unwrap())
            .with(CurrentlyReconciling)
            .with(Limit::new(10).unwrap())
    };

    let persistent = repository
        .get_reconciliations(Some(&build()))
        .await
        .unwrap();
    let mut mixer = build();
    let in_memory = apply_instance_side(&mut mixer, &all);

    assert_eq!(persistent.len(), 2);
    assert_eq!(scheduling_ids(&persistent), scheduling_ids(&in_memory));
}

#[sqlx::test]
async fn second_unfinished_reconciliation_is_rejected(pool: PgPool) {
    let conn = DatabaseConnection::from_pool(pool);
    let inventory = ClusterInventory::new(&conn, Arc::new(NoopMetrics));
    let repository = ReconciliationRepository::new(&conn);

    let state = inventory
        .create_or_update(1, &test_cluster("a"))
        .await
        .unwrap();
    let first = repository.create_reconciliation(&state).await.unwrap();

    let err = repository.create_reconciliation(&state).await.unwrap_err();
    assert!(matches!(err, InventoryError::TransactionAborted(_)));

    // Finishing the open run unblocks the next one.
    repository
        .finish_reconciliation(&first.scheduling_id)
        .await
        .unwrap();
    repository.create_reconciliation(&state).await.unwrap();

    // A second finish of the same run is a NotFound.
    let err = repository
        .finish_reconciliation(&first.scheduling_id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[sqlx::test]
async fn remove_reconciliations_clears_the_runtime(pool: PgPool) {
    let (repository, all) = seed_ledger(pool, &["a", "b"], &["a"]).await;
    assert_eq!(all.len(), 2);

    let removed = repository.remove_reconciliations("a").await.unwrap();
    assert_eq!(removed, 1);

    let remaining = repository.get_reconciliations(None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].runtime_id, "b");
}
