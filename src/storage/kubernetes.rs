//! Kubernetes snapshot engine.
//!
//! Tracks the latest report per (organization, cluster) and, when a
//! cluster's version advances, asks the controller owning the matching
//! domain to refresh it over HTTP. The refresh runs after the engine lock
//! is released so a slow peer never blocks report ingestion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use diesel::prelude::*;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::common::{CONTROLLER_STATE_EXCEPTION, DOMAIN_TYPE_KUBERNETES};
use crate::config::GenesisConfig;
use crate::db::model::{ControllerRow, DomainRow, SubDomainRow};
use crate::db::schema::{controller, domain, sub_domain};
use crate::db::Database;
use crate::domain::kubernetes::KubernetesInfo;
use crate::error::{Error, Result};

const REFRESH_PATH: &str = "/v1/kubernetes-refresh/";
const REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(30);

type ClusterMap = HashMap<i32, HashMap<String, KubernetesInfo>>;

/// Per-node storage for kubernetes cluster snapshots.
pub struct KubernetesStorage {
    cfg: GenesisConfig,
    database: Arc<Database>,
    channel: mpsc::Sender<KubernetesInfo>,
    client: reqwest::Client,
    inner: Mutex<ClusterMap>,
    shutdown: watch::Sender<bool>,
    parent_shutdown: watch::Receiver<bool>,
    started: AtomicBool,
}

impl KubernetesStorage {
    pub fn new(
        cfg: GenesisConfig,
        database: Arc<Database>,
        channel: mpsc::Sender<KubernetesInfo>,
        parent_shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let client = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to build refresh HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            cfg,
            database,
            channel,
            client,
            inner: Mutex::new(HashMap::new()),
            shutdown,
            parent_shutdown,
            started: AtomicBool::new(false),
        }
    }

    /// Merge one cluster report and publish the current records.
    ///
    /// An unchanged version only refreshes `epoch` and `error_msg`,
    /// preserving the stored entries. A changed version replaces the record
    /// wholesale and triggers a refresh on the owning controller.
    pub async fn add(&self, org_id: i32, new_info: KubernetesInfo) {
        let version_changed;
        {
            let mut data = self.inner.lock().await;
            let clusters = data.entry(org_id).or_default();
            version_changed = match clusters.get_mut(&new_info.cluster_id) {
                Some(old) if old.version == new_info.version => {
                    old.epoch = new_info.epoch;
                    old.error_msg = new_info.error_msg.clone();
                    false
                }
                _ => true,
            };
            if version_changed {
                clusters.insert(new_info.cluster_id.clone(), new_info.clone());
            }
            self.push_all(&data).await;
        }

        if version_changed {
            if let Err(e) = self
                .trigger_cloud_refresh(org_id, &new_info.cluster_id, new_info.version)
                .await
            {
                warn!(
                    org_id,
                    cluster_id = %new_info.cluster_id,
                    error = %e,
                    "trigger cloud kubernetes refresh failed"
                );
            }
        }
    }

    /// Drop every stored cluster record.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("kubernetes storage already started");
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await });
    }

    /// Stop the aging loop. It exits at its next wake.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    async fn push_all(&self, data: &ClusterMap) {
        for clusters in data.values() {
            for record in clusters.values() {
                if self.channel.send(record.clone()).await.is_err() {
                    warn!("kubernetes data channel closed, record dropped");
                    return;
                }
            }
        }
    }

    /// Resolve the controller owning the cluster's domain and ask it to
    /// refresh.
    async fn trigger_cloud_refresh(
        &self,
        org_id: i32,
        cluster_id: &str,
        version: u64,
    ) -> Result<()> {
        let (domain_lcuuid, sub_domain_lcuuid, host, port) = {
            let pool = self.database.get(org_id)?;
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;

            let subs: Vec<SubDomainRow> = sub_domain::table
                .filter(sub_domain::cluster_id.eq(cluster_id))
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?;

            let (matched, sub_domain_lcuuid) = match subs.as_slice() {
                [] => {
                    let matched: DomainRow = domain::table
                        .filter(domain::cluster_id.eq(cluster_id))
                        .filter(domain::domain_type.eq(DOMAIN_TYPE_KUBERNETES))
                        .first(&mut conn)
                        .optional()
                        .map_err(|e| Error::Database(e.to_string()))?
                        .ok_or_else(|| {
                            Error::NotFound(format!("kubernetes domain for cluster {cluster_id}"))
                        })?;
                    let lcuuid = matched.lcuuid.clone();
                    (matched, lcuuid)
                }
                [sub] => {
                    let matched: DomainRow = domain::table
                        .filter(domain::lcuuid.eq(&sub.domain))
                        .filter(domain::domain_type.eq(DOMAIN_TYPE_KUBERNETES))
                        .first(&mut conn)
                        .optional()
                        .map_err(|e| Error::Database(e.to_string()))?
                        .ok_or_else(|| {
                            Error::NotFound(format!("kubernetes domain for cluster {cluster_id}"))
                        })?;
                    (matched, sub.lcuuid.clone())
                }
                _ => return Err(Error::AmbiguousCluster(cluster_id.to_string())),
            };

            let peer: ControllerRow = controller::table
                .filter(controller::ip.eq(&matched.controller_ip))
                .filter(controller::state.ne(CONTROLLER_STATE_EXCEPTION))
                .first(&mut conn)
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?
                .ok_or_else(|| Error::NotFound(format!("controller {}", matched.controller_ip)))?;

            let (host, port) = if peer.pod_ip.is_empty() {
                (matched.controller_ip.clone(), self.cfg.listen_node_port)
            } else {
                (peer.pod_ip, self.cfg.listen_port)
            };
            (matched.lcuuid, sub_domain_lcuuid, host, port)
        };

        let url = format!("http://{host}:{port}{REFRESH_PATH}");
        debug!(org_id, cluster_id, version, url = %url, "triggering cloud kubernetes refresh");

        let version_param = version.to_string();
        self.client
            .get(&url)
            .query(&[
                ("domain_lcuuid", domain_lcuuid.as_str()),
                ("sub_domain_lcuuid", sub_domain_lcuuid.as_str()),
                ("version", version_param.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Aging loop: drop records whose epoch fell behind the TTL, then
    /// publish what remains.
    async fn run(self: Arc<Self>) {
        let aging = Duration::seconds(self.cfg.aging_time as i64);
        let interval = StdDuration::from_secs(self.cfg.data_persistence_interval);

        let mut shutdown = self.shutdown.subscribe();
        let mut parent = self.parent_shutdown.clone();
        loop {
            if *shutdown.borrow() || *parent.borrow() {
                break;
            }
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                res = parent.changed() => {
                    if res.is_err() || *parent.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    let now = super::now();
                    let mut data = self.inner.lock().await;
                    for clusters in data.values_mut() {
                        clusters.retain(|_, record| {
                            now.signed_duration_since(record.epoch) <= aging
                        });
                    }
                    self.push_all(&data).await;
                }
            }
        }
        info!("kubernetes storage aging loop exited");
    }
}
