//! Kubernetes cluster snapshots reported by agents.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Latest report for one cluster, keyed by organization and cluster ID.
///
/// `epoch` is the agent-side report time and drives aging; `version`
/// advances whenever the cluster content changed on the agent side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KubernetesInfo {
    pub org_id: i32,
    pub cluster_id: String,
    pub version: u64,
    pub epoch: NaiveDateTime,
    pub error_msg: String,
    pub entries: Vec<String>,
}
