mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use genesis_sync::common::DOMAIN_TYPE_KUBERNETES;
use genesis_sync::domain::kubernetes::KubernetesInfo;
use genesis_sync::storage::KubernetesStorage;

use support::*;

const CONTROLLER_STATE_NORMAL: i32 = 2;

fn cluster_info(org_id: i32, cluster_id: &str, version: u64, entries: &[&str]) -> KubernetesInfo {
    KubernetesInfo {
        org_id,
        cluster_id: cluster_id.to_string(),
        version,
        epoch: chrono::Utc::now().naive_utc(),
        error_msg: String::new(),
        entries: entries.iter().map(|e| e.to_string()).collect(),
    }
}

fn engine(
    db: &TestDatabase,
    aging: u64,
    interval: u64,
    listen_port: u16,
) -> (
    Arc<KubernetesStorage>,
    mpsc::Receiver<KubernetesInfo>,
    watch::Sender<bool>,
) {
    let (tx, rx) = mpsc::channel(64);
    let (parent_tx, parent_rx) = watch::channel(false);
    let mut cfg = test_config(aging, interval);
    cfg.listen_port = listen_port;
    let storage = Arc::new(KubernetesStorage::new(
        cfg,
        Arc::clone(&db.database),
        tx,
        parent_rx,
    ));
    (storage, rx, parent_tx)
}

/// Domain + controller rows routing refreshes for `cluster_id` to the stub.
fn seed_refresh_target(db: &TestDatabase, cluster_id: &str) {
    insert_domain(
        &db.database,
        1,
        "domain-1",
        DOMAIN_TYPE_KUBERNETES,
        cluster_id,
        "10.2.2.2",
    );
    insert_controller(
        &db.database,
        1,
        "10.2.2.2",
        "127.0.0.1",
        CONTROLLER_STATE_NORMAL,
    );
}

#[tokio::test]
async fn version_advance_replaces_record_and_triggers_refresh() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    seed_refresh_target(&db, "c1");
    let (storage, rx, _parent) = engine(&db, 60, 30, stub.port);
    let records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 5, &["e1"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.request_count(), 1, "first version triggers a refresh");

    storage.add(1, cluster_info(1, "c1", 6, &["e2"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.request_count(), 2, "new version triggers again");

    let request = stub.requests.lock().last().unwrap().clone();
    assert!(request.starts_with("GET /v1/kubernetes-refresh/"));
    assert!(request.contains("domain_lcuuid=domain-1"));
    assert!(request.contains("sub_domain_lcuuid=domain-1"));
    assert!(request.contains("version=6"));

    let collected = records.lock();
    let last = collected.last().unwrap();
    assert_eq!(last.version, 6);
    assert_eq!(last.entries, vec!["e2".to_string()]);
}

#[tokio::test]
async fn unchanged_version_updates_epoch_only_and_skips_refresh() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    seed_refresh_target(&db, "c1");
    let (storage, rx, _parent) = engine(&db, 60, 30, stub.port);
    let records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 5, &["e1"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.request_count(), 1);

    let mut second = cluster_info(1, "c1", 5, &["e2"]);
    second.error_msg = "x".to_string();
    let second_epoch = second.epoch;
    storage.add(1, second).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        stub.request_count(),
        1,
        "unchanged version must not trigger a refresh"
    );
    let collected = records.lock();
    let last = collected.last().unwrap();
    assert_eq!(last.entries, vec!["e1".to_string()], "entries preserved");
    assert_eq!(last.epoch, second_epoch, "epoch taken from the new report");
    assert_eq!(last.error_msg, "x");
}

#[tokio::test]
async fn sub_domain_cluster_resolves_through_parent_domain() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    insert_domain(
        &db.database,
        1,
        "domain-1",
        DOMAIN_TYPE_KUBERNETES,
        "other-cluster",
        "10.2.2.2",
    );
    insert_sub_domain(&db.database, 1, "sub-1", "domain-1", "c1");
    insert_controller(
        &db.database,
        1,
        "10.2.2.2",
        "127.0.0.1",
        CONTROLLER_STATE_NORMAL,
    );
    let (storage, rx, _parent) = engine(&db, 60, 30, stub.port);
    let _records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 3, &["e1"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(stub.request_count(), 1);
    let request = stub.requests.lock().last().unwrap().clone();
    assert!(request.contains("domain_lcuuid=domain-1"));
    assert!(request.contains("sub_domain_lcuuid=sub-1"));
    assert!(request.contains("version=3"));
}

#[tokio::test]
async fn duplicate_sub_domain_cluster_id_skips_refresh() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    seed_refresh_target(&db, "c1");
    insert_sub_domain(&db.database, 1, "sub-1", "domain-1", "c1");
    insert_sub_domain(&db.database, 1, "sub-2", "domain-1", "c1");
    let (storage, rx, _parent) = engine(&db, 60, 30, stub.port);
    let records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 5, &["e1"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        stub.request_count(),
        0,
        "an ambiguous cluster must not be refreshed"
    );
    // the record is still stored and published
    assert_eq!(records.lock().len(), 1);
}

#[tokio::test]
async fn refresh_targets_node_port_when_controller_has_no_pod_ip() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    // controller reachable only via its node address, which is the stub
    insert_domain(
        &db.database,
        1,
        "domain-1",
        DOMAIN_TYPE_KUBERNETES,
        "c1",
        "127.0.0.1",
    );
    insert_controller(&db.database, 1, "127.0.0.1", "", CONTROLLER_STATE_NORMAL);

    let (tx, rx) = mpsc::channel(64);
    let (_parent_tx, parent_rx) = watch::channel(false);
    let mut cfg = test_config(60, 30);
    cfg.listen_node_port = stub.port;
    let storage = Arc::new(KubernetesStorage::new(
        cfg,
        Arc::clone(&db.database),
        tx,
        parent_rx,
    ));
    let _records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 1, &["e1"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn aging_loop_drops_stale_clusters() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    seed_refresh_target(&db, "c1");
    let (storage, rx, _parent) = engine(&db, 1, 1, stub.port);
    let records = drain(rx);

    let mut stale = cluster_info(1, "c1", 5, &["old"]);
    stale.epoch = chrono::Utc::now().naive_utc() - chrono::Duration::seconds(5);
    storage.add(1, stale).await;

    storage.start();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    storage.stop();

    // the aged-out record is gone, so re-adding the same version stores the
    // new report wholesale instead of preserving the old entries
    storage.add(1, cluster_info(1, "c1", 5, &["new"])).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let collected = records.lock();
    let last = collected.last().unwrap();
    assert_eq!(last.entries, vec!["new".to_string()]);
}

#[tokio::test]
async fn clear_empties_all_organizations() {
    let db = TestDatabase::create();
    let stub = spawn_http_stub().await;
    seed_refresh_target(&db, "c1");
    let (storage, rx, _parent) = engine(&db, 60, 30, stub.port);
    let records = drain(rx);

    storage.add(1, cluster_info(1, "c1", 5, &["e1"])).await;
    storage.clear().await;
    storage.add(1, cluster_info(1, "c1", 5, &["e2"])).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let collected = records.lock();
    let last = collected.last().unwrap();
    assert_eq!(
        last.entries,
        vec!["e2".to_string()],
        "after clear the same version stores the new report"
    );
}
