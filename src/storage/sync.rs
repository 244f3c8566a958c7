//! General-resource sync engine.
//!
//! One instance runs per controller node. Agents reporting to this node
//! land in the ten in-memory family operations; a persistence loop ages and
//! writes them back, and an ownership reconciler prunes `genesis_storage`
//! rows for agents that disappeared from the `vtap` registry.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use diesel::prelude::*;
use tokio::sync::{mpsc, watch, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::common::{node_ip, DEFAULT_ORG_ID};
use crate::config::GenesisConfig;
use crate::db::model::GenesisStorageRow;
use crate::db::schema::{genesis_storage, vtap};
use crate::db::Database;
use crate::domain::resource::{
    GenesisHost, GenesisIp, GenesisLldp, GenesisNetwork, GenesisPort, GenesisProcess,
    GenesisVinterface, GenesisVip, GenesisVm, GenesisVpc,
};
use crate::domain::snapshot::{AgentInfo, GenesisSyncData, GenesisSyncReport};
use crate::error::{Error, Result};
use crate::storage::operation::DataOperation;

/// The ten family operations, all scoped to one organization.
struct SyncInfo {
    vips: DataOperation<GenesisVip>,
    vms: DataOperation<GenesisVm>,
    vpcs: DataOperation<GenesisVpc>,
    hosts: DataOperation<GenesisHost>,
    ports: DataOperation<GenesisPort>,
    lldps: DataOperation<GenesisLldp>,
    ip_last_seens: DataOperation<GenesisIp>,
    networks: DataOperation<GenesisNetwork>,
    vinterfaces: DataOperation<GenesisVinterface>,
    processes: DataOperation<GenesisProcess>,
}

impl SyncInfo {
    fn new(org_id: i32) -> Self {
        Self {
            vips: DataOperation::new(org_id),
            vms: DataOperation::new(org_id),
            vpcs: DataOperation::new(org_id),
            hosts: DataOperation::new(org_id),
            ports: DataOperation::new(org_id),
            lldps: DataOperation::new(org_id),
            ip_last_seens: DataOperation::new(org_id),
            networks: DataOperation::new(org_id),
            vinterfaces: DataOperation::new(org_id),
            processes: DataOperation::new(org_id),
        }
    }

    fn snapshot(&self) -> GenesisSyncData {
        GenesisSyncData {
            vips: self.vips.fetch(),
            vms: self.vms.fetch(),
            vpcs: self.vpcs.fetch(),
            hosts: self.hosts.fetch(),
            ports: self.ports.fetch(),
            lldps: self.lldps.fetch(),
            ip_last_seens: self.ip_last_seens.fetch(),
            networks: self.networks.fetch(),
            vinterfaces: self.vinterfaces.fetch(),
            processes: self.processes.fetch(),
        }
    }
}

struct SyncInner {
    info: SyncInfo,
    dirty: bool,
}

/// Per-node storage for the ten general resource families.
pub struct SyncStorage {
    cfg: GenesisConfig,
    database: Arc<Database>,
    channel: mpsc::Sender<GenesisSyncData>,
    inner: Mutex<SyncInner>,
    shutdown: watch::Sender<bool>,
    parent_shutdown: watch::Receiver<bool>,
    started: AtomicBool,
}

impl SyncStorage {
    pub fn new(
        cfg: GenesisConfig,
        database: Arc<Database>,
        channel: mpsc::Sender<GenesisSyncData>,
        parent_shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            cfg,
            database,
            channel,
            inner: Mutex::new(SyncInner {
                info: SyncInfo::new(DEFAULT_ORG_ID),
                dirty: false,
            }),
            shutdown,
            parent_shutdown,
            started: AtomicBool::new(false),
        }
    }

    /// Heartbeat existing records without creating new ones. Never marks
    /// the engine dirty and never publishes a snapshot.
    pub async fn renew(&self, data: GenesisSyncReport) {
        let now = super::now();
        let inner = self.inner.lock().await;
        if let Some(vips) = data.vips {
            inner.info.vips.renew(vips, now);
        }
        if let Some(vms) = data.vms {
            inner.info.vms.renew(vms, now);
        }
        if let Some(vpcs) = data.vpcs {
            inner.info.vpcs.renew(vpcs, now);
        }
        if let Some(hosts) = data.hosts {
            inner.info.hosts.renew(hosts, now);
        }
        if let Some(ports) = data.ports {
            inner.info.ports.renew(ports, now);
        }
        if let Some(lldps) = data.lldps {
            inner.info.lldps.renew(lldps, now);
        }
        if let Some(ip_last_seens) = data.ip_last_seens {
            inner.info.ip_last_seens.renew(ip_last_seens, now);
        }
        if let Some(networks) = data.networks {
            inner.info.networks.renew(networks, now);
        }
        if let Some(vinterfaces) = data.vinterfaces {
            inner.info.vinterfaces.renew(vinterfaces, now);
        }
        if let Some(processes) = data.processes {
            inner.info.processes.renew(processes, now);
        }
    }

    /// Merge a full state report. When anything changed and the agent is
    /// registered, publish a snapshot and claim ownership of the agent in
    /// `genesis_storage`.
    pub async fn update(&self, data: GenesisSyncReport, info: AgentInfo) {
        let now = super::now();
        let mut inner = self.inner.lock().await;

        let mut updated = false;
        if let Some(vips) = data.vips {
            updated = true;
            inner.info.vips.update(vips, now);
        }
        if let Some(vms) = data.vms {
            updated = true;
            inner.info.vms.update(vms, now);
        }
        if let Some(vpcs) = data.vpcs {
            updated = true;
            inner.info.vpcs.update(vpcs, now);
        }
        if let Some(hosts) = data.hosts {
            updated = true;
            inner.info.hosts.update(hosts, now);
        }
        if let Some(ports) = data.ports {
            updated = true;
            inner.info.ports.update(ports, now);
        }
        if let Some(lldps) = data.lldps {
            updated = true;
            inner.info.lldps.update(lldps, now);
        }
        if let Some(ip_last_seens) = data.ip_last_seens {
            updated = true;
            inner.info.ip_last_seens.update(ip_last_seens, now);
        }
        if let Some(networks) = data.networks {
            updated = true;
            inner.info.networks.update(networks, now);
        }
        if let Some(vinterfaces) = data.vinterfaces {
            updated = true;
            inner.info.vinterfaces.update(vinterfaces, now);
        }
        if let Some(processes) = data.processes {
            updated = true;
            inner.info.processes.update(processes, now);
        }

        if updated && info.vtap_id != 0 {
            // push immediately after update
            self.push_snapshot(&inner).await;

            if let Err(e) = self.record_ownership(info) {
                error!(
                    org_id = info.org_id,
                    vtap_id = info.vtap_id,
                    error = %e,
                    "record agent ownership failed"
                );
            }
        }
        if updated {
            inner.dirty = true;
        }
    }

    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("sync storage already started");
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await });
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.refresh_database().await });
    }

    /// Stop the background tasks. In-flight mutations complete; the loops
    /// exit at their next wake.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Upsert `(vtap_id, node_ip)` so peers know this node owns the agent.
    fn record_ownership(&self, info: AgentInfo) -> Result<()> {
        let pool = self.database.get(info.org_id)?;
        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        let ip = node_ip();
        diesel::insert_into(genesis_storage::table)
            .values(&GenesisStorageRow {
                vtap_id: info.vtap_id,
                node_ip: ip.clone(),
            })
            .on_conflict(genesis_storage::vtap_id)
            .do_update()
            .set(genesis_storage::node_ip.eq(ip))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Send the current snapshot while the engine lock is held so consumers
    /// observe states in mutation order.
    async fn push_snapshot(&self, inner: &MutexGuard<'_, SyncInner>) {
        if self.channel.send(inner.info.snapshot()).await.is_err() {
            warn!("sync data channel closed, snapshot dropped");
        }
    }

    async fn load_from_database(&self, ttl: Duration) {
        let now = super::now();
        let mut inner = self.inner.lock().await;
        inner.info = SyncInfo::new(DEFAULT_ORG_ID);

        log_load(inner.info.vips.load(&self.database, now, ttl), "genesis_vip");
        log_load(inner.info.vms.load(&self.database, now, ttl), "genesis_vm");
        log_load(inner.info.vpcs.load(&self.database, now, ttl), "genesis_vpc");
        log_load(
            inner.info.hosts.load(&self.database, now, ttl),
            "genesis_host",
        );
        log_load(
            inner.info.ports.load(&self.database, now, ttl),
            "genesis_port",
        );
        log_load(
            inner.info.lldps.load(&self.database, now, ttl),
            "genesis_lldp",
        );
        log_load(
            inner.info.ip_last_seens.load(&self.database, now, ttl),
            "genesis_ip",
        );
        log_load(
            inner.info.networks.load(&self.database, now, ttl),
            "genesis_network",
        );
        log_load(
            inner.info.vinterfaces.load(&self.database, now, ttl),
            "genesis_vinterface",
        );
        log_load(
            inner.info.processes.load(&self.database, now, ttl),
            "genesis_process",
        );

        self.push_snapshot(&inner).await;
    }

    /// Save every family. Each save is independent; one failure does not
    /// stop the rest.
    async fn store_to_database(&self) {
        let inner = self.inner.lock().await;
        log_save(inner.info.vips.save(&self.database), "genesis_vip");
        log_save(inner.info.vms.save(&self.database), "genesis_vm");
        log_save(inner.info.vpcs.save(&self.database), "genesis_vpc");
        log_save(inner.info.hosts.save(&self.database), "genesis_host");
        log_save(inner.info.ports.save(&self.database), "genesis_port");
        log_save(inner.info.lldps.save(&self.database), "genesis_lldp");
        log_save(inner.info.ip_last_seens.save(&self.database), "genesis_ip");
        log_save(inner.info.networks.save(&self.database), "genesis_network");
        log_save(
            inner.info.vinterfaces.save(&self.database),
            "genesis_vinterface",
        );
        log_save(inner.info.processes.save(&self.database), "genesis_process");
    }

    /// Persistence loop: load once, then age and conditionally write back
    /// every `data_persistence_interval` seconds.
    async fn run(self: Arc<Self>) {
        let aging = Duration::seconds(self.cfg.aging_time as i64);
        let vinterface_aging = Duration::seconds(self.cfg.vinterface_aging_time as i64);
        let interval = StdDuration::from_secs(self.cfg.data_persistence_interval);

        self.load_from_database(aging).await;

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
                    self.persist_tick(aging, vinterface_aging).await;
                }
            }
        }
        info!("sync storage persistence loop exited");
    }

    async fn persist_tick(&self, aging: Duration, vinterface_aging: Duration) {
        let now = super::now();
        let has_change;
        {
            let mut inner = self.inner.lock().await;
            // hosts are only refreshed by save/load cycles, not aged here
            let mut changed = inner.info.vips.age(now, aging);
            changed |= inner.info.vms.age(now, aging);
            changed |= inner.info.vpcs.age(now, aging);
            changed |= inner.info.lldps.age(now, aging);
            changed |= inner.info.ports.age(now, aging);
            changed |= inner.info.networks.age(now, aging);
            changed |= inner.info.ip_last_seens.age(now, aging);
            changed |= inner.info.processes.age(now, aging);
            changed |= inner.info.vinterfaces.age(now, vinterface_aging);
            has_change = changed || inner.dirty;
            inner.dirty = false;
        }
        if has_change {
            self.store_to_database().await;
            let inner = self.inner.lock().await;
            self.push_snapshot(&inner).await;
        }
    }

    /// Ownership reconciler: every `aging_time` seconds, drop
    /// `genesis_storage` rows owned by this node whose agent is gone from
    /// the `vtap` registry.
    async fn refresh_database(self: Arc<Self>) {
        let interval = StdDuration::from_secs(self.cfg.aging_time);
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
                    self.prune_stale_ownership().await;
                    let mut inner = self.inner.lock().await;
                    inner.dirty = true;
                }
            }
        }
        info!("sync storage ownership reconciler exited");
    }

    async fn prune_stale_ownership(&self) {
        let org_ids = match self.database.org_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "enumerate organizations failed");
                return;
            }
        };
        let ip = node_ip();
        for org_id in org_ids {
            if let Err(e) = self.prune_org_ownership(org_id, &ip) {
                error!(org_id, node_ip = %ip, error = %e, "clean stale agent ownership failed");
            }
        }
    }

    fn prune_org_ownership(&self, org_id: i32, ip: &str) -> Result<()> {
        let pool = self.database.get(org_id)?;
        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;

        let valid: HashSet<i32> = vtap::table
            .select(vtap::id)
            .load::<i32>(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?
            .into_iter()
            .collect();
        let owned: Vec<GenesisStorageRow> = genesis_storage::table
            .filter(genesis_storage::node_ip.eq(ip))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let stale: Vec<i32> = owned
            .iter()
            .filter(|row| !valid.contains(&row.vtap_id))
            .map(|row| row.vtap_id)
            .collect();
        if stale.is_empty() {
            return Ok(());
        }

        diesel::delete(
            genesis_storage::table
                .filter(genesis_storage::node_ip.eq(ip))
                .filter(genesis_storage::vtap_id.eq_any(&stale)),
        )
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        info!(org_id, node_ip = %ip, removed = stale.len(), "cleaned stale agent ownership");
        Ok(())
    }
}

fn log_load(result: Result<()>, table: &str) {
    if let Err(e) = result {
        error!(org_id = DEFAULT_ORG_ID, table, error = %e, "load resources failed");
    }
}

fn log_save(result: Result<()>, table: &str) {
    if let Err(e) = result {
        error!(org_id = DEFAULT_ORG_ID, table, error = %e, "save resources failed");
    }
}
