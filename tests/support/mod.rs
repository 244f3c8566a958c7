#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use genesis_sync::config::GenesisConfig;
use genesis_sync::db::model::{ControllerRow, DomainRow, GenesisStorageRow, SubDomainRow, VtapRow};
use genesis_sync::db::schema::{controller, domain, genesis_storage, genesis_vm, sub_domain, vtap};
use genesis_sync::db::Database;
use genesis_sync::domain::resource::GenesisVm;

/// Node IP every test claims; all tests share the process environment.
pub const TEST_NODE_IP: &str = "10.1.1.1";

pub fn set_node_ip() {
    std::env::set_var("NODE_IP", TEST_NODE_IP);
}

/// Temporary per-organization database tree, removed on drop.
pub struct TestDatabase {
    _dir: tempfile::TempDir,
    pub database: Arc<Database>,
}

impl TestDatabase {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create temp data dir");
        let database = Arc::new(Database::new(dir.path()));
        Self {
            _dir: dir,
            database,
        }
    }
}

pub fn test_config(aging_time: u64, data_persistence_interval: u64) -> GenesisConfig {
    GenesisConfig {
        aging_time,
        vinterface_aging_time: aging_time,
        data_persistence_interval,
        ..GenesisConfig::default()
    }
}

pub fn ts(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(i64::from(secs))
}

pub fn vm(vtap_id: i32, lcuuid: &str) -> GenesisVm {
    GenesisVm {
        vtap_id,
        lcuuid: lcuuid.to_string(),
        name: format!("vm-{lcuuid}"),
        label: String::new(),
        vpc_lcuuid: "vpc-1".to_string(),
        launch_server: "10.0.0.10".to_string(),
        state: 4,
        node_ip: TEST_NODE_IP.to_string(),
        last_seen: ts(0),
    }
}

/// Collect everything a receiver produces into a shared vec so engine sends
/// never block on a full channel.
pub fn drain<T: Send + 'static>(mut rx: mpsc::Receiver<T>) -> Arc<Mutex<Vec<T>>> {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            sink.lock().push(item);
        }
    });
    collected
}

pub fn insert_vtap(database: &Database, org_id: i32, id: i32) {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    diesel::insert_into(vtap::table)
        .values(&VtapRow {
            id,
            name: format!("agent-{id}"),
        })
        .execute(&mut conn)
        .unwrap();
}

pub fn insert_ownership(database: &Database, org_id: i32, vtap_id: i32, node_ip: &str) {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    diesel::insert_into(genesis_storage::table)
        .values(&GenesisStorageRow {
            vtap_id,
            node_ip: node_ip.to_string(),
        })
        .execute(&mut conn)
        .unwrap();
}

pub fn ownership_rows(database: &Database, org_id: i32) -> Vec<GenesisStorageRow> {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    genesis_storage::table
        .order(genesis_storage::vtap_id)
        .load(&mut conn)
        .unwrap()
}

pub fn vm_rows(database: &Database, org_id: i32) -> Vec<GenesisVm> {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    genesis_vm::table.load(&mut conn).unwrap()
}

pub fn insert_domain(
    database: &Database,
    org_id: i32,
    lcuuid: &str,
    domain_type: i32,
    cluster_id: &str,
    controller_ip: &str,
) {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    diesel::insert_into(domain::table)
        .values(&DomainRow {
            lcuuid: lcuuid.to_string(),
            name: format!("domain-{lcuuid}"),
            domain_type,
            cluster_id: cluster_id.to_string(),
            controller_ip: controller_ip.to_string(),
        })
        .execute(&mut conn)
        .unwrap();
}

pub fn insert_sub_domain(
    database: &Database,
    org_id: i32,
    lcuuid: &str,
    parent: &str,
    cluster_id: &str,
) {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    diesel::insert_into(sub_domain::table)
        .values(&SubDomainRow {
            lcuuid: lcuuid.to_string(),
            domain: parent.to_string(),
            cluster_id: cluster_id.to_string(),
        })
        .execute(&mut conn)
        .unwrap();
}

pub fn insert_controller(database: &Database, org_id: i32, ip: &str, pod_ip: &str, state: i32) {
    let pool = database.get(org_id).unwrap();
    let mut conn = pool.get().unwrap();
    diesel::insert_into(controller::table)
        .values(&ControllerRow {
            ip: ip.to_string(),
            pod_ip: pod_ip.to_string(),
            state,
        })
        .execute(&mut conn)
        .unwrap();
}

/// Minimal HTTP listener recording request lines for the refresh trigger.
pub struct HttpStub {
    pub port: u16,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl HttpStub {
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

pub async fn spawn_http_stub() -> HttpStub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http stub");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                sink.lock().push(String::from_utf8_lossy(&buf).to_string());
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            });
        }
    });

    HttpStub { port, requests }
}
