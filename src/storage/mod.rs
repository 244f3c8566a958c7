//! The two sync storage engines.
//!
//! [`SyncStorage`] manages the ten general resource families;
//! [`KubernetesStorage`] tracks per-organization cluster snapshots and
//! triggers out-of-band refreshes on version changes. Both publish to a
//! bounded fan-out channel supplied by the caller; a slow consumer
//! backpressures the reporting path by design.

pub mod kubernetes;
pub mod operation;
pub mod sync;

pub use kubernetes::KubernetesStorage;
pub use sync::SyncStorage;

use chrono::NaiveDateTime;

/// Wall clock used for `last_seen` stamping and aging (UTC).
pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
