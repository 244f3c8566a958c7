//! Aggregate shapes exchanged with the sync engine.

use serde::Serialize;

use super::resource::{
    GenesisHost, GenesisIp, GenesisLldp, GenesisNetwork, GenesisPort, GenesisProcess,
    GenesisVinterface, GenesisVip, GenesisVm, GenesisVpc,
};

/// Point-in-time copy of every family, pushed to the fan-out channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenesisSyncData {
    pub vips: Vec<GenesisVip>,
    pub vms: Vec<GenesisVm>,
    pub vpcs: Vec<GenesisVpc>,
    pub hosts: Vec<GenesisHost>,
    pub ports: Vec<GenesisPort>,
    pub lldps: Vec<GenesisLldp>,
    pub ip_last_seens: Vec<GenesisIp>,
    pub networks: Vec<GenesisNetwork>,
    pub vinterfaces: Vec<GenesisVinterface>,
    pub processes: Vec<GenesisProcess>,
}

/// One agent report. A family left as `None` was not part of this report
/// and is skipped by the engine.
#[derive(Debug, Clone, Default)]
pub struct GenesisSyncReport {
    pub vips: Option<Vec<GenesisVip>>,
    pub vms: Option<Vec<GenesisVm>>,
    pub vpcs: Option<Vec<GenesisVpc>>,
    pub hosts: Option<Vec<GenesisHost>>,
    pub ports: Option<Vec<GenesisPort>>,
    pub lldps: Option<Vec<GenesisLldp>>,
    pub ip_last_seens: Option<Vec<GenesisIp>>,
    pub networks: Option<Vec<GenesisNetwork>>,
    pub vinterfaces: Option<Vec<GenesisVinterface>>,
    pub processes: Option<Vec<GenesisProcess>>,
}

/// Identity of the agent behind a report.
///
/// A `vtap_id` of 0 marks a report from an agent that has not completed
/// registration; such reports update memory but never claim ownership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentInfo {
    pub org_id: i32,
    pub vtap_id: i32,
}
