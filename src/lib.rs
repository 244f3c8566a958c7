//! Genesis sync storage - per-controller-node aggregation of agent-reported
//! inventory.
//!
//! Agents on compute nodes periodically report the virtual resources they
//! observe. This crate holds those reports in memory keyed by reporting
//! agent, ages out stale entries, persists consistent snapshots to the
//! organization databases, fans the live snapshot out to downstream
//! consumers, and coordinates agent ownership across controller nodes.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/     # resource records, kubernetes snapshots, channel payloads
//! ├── db/         # per-organization database access (Diesel + r2d2)
//! ├── storage/    # SyncStorage and KubernetesStorage engines
//! ├── config.rs   # TOML configuration with validation
//! └── error.rs    # crate error types
//! ```
//!
//! The two engines share a design: a coarse engine mutex, a generic
//! per-family [`storage::operation::DataOperation`], timed background aging,
//! and a bounded fan-out channel supplied by the caller.

pub mod common;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod storage;
