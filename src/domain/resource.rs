//! Agent-reported resource records, one family per table.
//!
//! All families share a minimum common shape: the reporting agent
//! (`vtap_id`), the controller node that received the report (`node_ip`),
//! and the time of the last report (`last_seen`, UTC). The two traits below
//! let [`crate::storage::operation::DataOperation`] treat every family
//! uniformly.

use std::hash::Hash;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::db::schema::{
    genesis_host, genesis_ip, genesis_lldp, genesis_network, genesis_port, genesis_process,
    genesis_vinterface, genesis_vip, genesis_vm, genesis_vpc,
};

/// Capability shared by every resource record held in memory.
pub trait ResourceRecord: Clone + Send + Sync + 'static {
    /// Natural key identifying the record within its family.
    type Key: Eq + Hash + Clone + Send + Sync;

    fn key(&self) -> Self::Key;
    fn last_seen(&self) -> NaiveDateTime;
    fn set_last_seen(&mut self, now: NaiveDateTime);
}

/// Round trip between a family and its table in an organization database.
pub trait ResourceTable: ResourceRecord {
    /// Table name, used as log context.
    const TABLE: &'static str;

    fn load_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Self>>;

    /// Replace the table contents with `records` in one transaction.
    fn replace_all(conn: &mut SqliteConnection, records: &[Self]) -> QueryResult<()>;
}

macro_rules! resource_table {
    ($record:ty, $table:ident) => {
        impl ResourceTable for $record {
            const TABLE: &'static str = stringify!($table);

            fn load_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Self>> {
                $table::table.load(conn)
            }

            fn replace_all(conn: &mut SqliteConnection, records: &[Self]) -> QueryResult<()> {
                conn.transaction(|conn| {
                    diesel::delete($table::table).execute(conn)?;
                    if !records.is_empty() {
                        diesel::insert_into($table::table)
                            .values(records)
                            .execute(conn)?;
                    }
                    Ok(())
                })
            }
        }
    };
}

/// Virtual IP claimed by an agent's host.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_vip)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisVip {
    pub vtap_id: i32,
    pub ip: String,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisVip {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.ip.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisVip, genesis_vip);

/// Virtual machine observed on a compute node.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_vm)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisVm {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub vpc_lcuuid: String,
    pub launch_server: String,
    pub state: i32,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisVm {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisVm, genesis_vm);

/// Virtual private cloud.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_vpc)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisVpc {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub name: String,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisVpc {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisVpc, genesis_vpc);

/// Compute node running an agent.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_host)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisHost {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub hostname: String,
    pub ip: String,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisHost {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisHost, genesis_host);

/// Port attaching a device to a network.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_port)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisPort {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub mac: String,
    pub device_lcuuid: String,
    pub network_lcuuid: String,
    pub vpc_lcuuid: String,
    pub device_type: i32,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisPort {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisPort, genesis_port);

/// LLDP neighbor seen on a host interface.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_lldp)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisLldp {
    pub vtap_id: i32,
    pub host_ip: String,
    pub host_interface: String,
    pub system_name: String,
    pub management_address: String,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisLldp {
    type Key = (i32, String, String);

    fn key(&self) -> Self::Key {
        (
            self.vtap_id,
            self.host_ip.clone(),
            self.host_interface.clone(),
        )
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisLldp, genesis_lldp);

/// IP address most recently seen behind a MAC.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_ip)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisIp {
    pub vtap_id: i32,
    pub mac: String,
    pub ip: String,
    pub vinterface_lcuuid: String,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisIp {
    type Key = (i32, String, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.mac.clone(), self.ip.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisIp, genesis_ip);

/// Virtual network segment.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_network)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisNetwork {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub name: String,
    pub segmentation_id: i32,
    pub vpc_lcuuid: String,
    pub external: bool,
    pub net_type: i32,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisNetwork {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisNetwork, genesis_network);

/// Virtual interface, the family with its own aging TTL.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_vinterface)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisVinterface {
    pub vtap_id: i32,
    pub lcuuid: String,
    pub name: String,
    pub mac: String,
    pub ips: String,
    pub tap_name: String,
    pub tap_mac: String,
    pub device_lcuuid: String,
    pub device_type: String,
    pub host_ip: String,
    pub kubernetes_cluster_id: String,
    pub netns_id: i32,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisVinterface {
    type Key = (i32, String);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.lcuuid.clone())
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisVinterface, genesis_vinterface);

/// Process observed on a compute node.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_process)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisProcess {
    pub vtap_id: i32,
    pub pid: i32,
    pub lcuuid: String,
    pub name: String,
    pub process_name: String,
    pub cmd_line: String,
    pub user: String,
    pub start_time: NaiveDateTime,
    pub netns_id: i32,
    pub node_ip: String,
    pub last_seen: NaiveDateTime,
}

impl ResourceRecord for GenesisProcess {
    type Key = (i32, i32);

    fn key(&self) -> Self::Key {
        (self.vtap_id, self.pid)
    }

    fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    fn set_last_seen(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
    }
}

resource_table!(GenesisProcess, genesis_process);
