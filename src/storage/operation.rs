//! Generic per-family data operation.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;

use crate::db::Database;
use crate::domain::resource::ResourceTable;
use crate::error::{Error, Result};

/// In-memory keyed table of one resource family, scoped to an organization.
///
/// The engine serializes mutations behind its own mutex; the lock here only
/// protects direct helper access against the engine's background tasks.
pub struct DataOperation<T: ResourceTable> {
    org_id: i32,
    records: Mutex<HashMap<T::Key, T>>,
}

impl<T: ResourceTable> DataOperation<T> {
    pub fn new(org_id: i32) -> Self {
        Self {
            org_id,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh `last_seen` on records already present, in report order.
    /// Unknown keys are ignored; a heartbeat never creates records.
    pub fn renew(&self, incoming: Vec<T>, now: NaiveDateTime) {
        let mut records = self.records.lock();
        for rec in incoming {
            if let Some(existing) = records.get_mut(&rec.key()) {
                existing.set_last_seen(now);
            }
        }
    }

    /// Upsert records in report order, stamping each with `now`. Existing
    /// records with the same key are replaced in full; last write wins.
    pub fn update(&self, incoming: Vec<T>, now: NaiveDateTime) {
        let mut records = self.records.lock();
        for mut rec in incoming {
            rec.set_last_seen(now);
            records.insert(rec.key(), rec);
        }
    }

    /// Drop every record older than `ttl` in a single pass. Returns true
    /// when at least one record was dropped.
    pub fn age(&self, now: NaiveDateTime, ttl: Duration) -> bool {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, rec| now.signed_duration_since(rec.last_seen()) <= ttl);
        records.len() != before
    }

    /// Read the family's rows from the organization database and install
    /// the ones still within `ttl` as the in-memory set.
    ///
    /// # Errors
    /// Returns an error when the organization database cannot be opened or
    /// queried; the in-memory set is left empty in that case.
    pub fn load(&self, database: &Database, now: NaiveDateTime, ttl: Duration) -> Result<()> {
        let pool = database.get(self.org_id)?;
        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        let rows = T::load_all(&mut conn).map_err(|e| Error::Database(e.to_string()))?;

        let mut records = self.records.lock();
        records.clear();
        for rec in rows {
            if now.signed_duration_since(rec.last_seen()) > ttl {
                continue;
            }
            records.insert(rec.key(), rec);
        }
        Ok(())
    }

    /// Replace the family's rows with the live set, in one transaction.
    /// On failure the table and the in-memory set are both unchanged.
    ///
    /// # Errors
    /// Returns an error when the organization database cannot be opened or
    /// the transaction fails.
    pub fn save(&self, database: &Database) -> Result<()> {
        let current: Vec<T> = self.fetch();
        let pool = database.get(self.org_id)?;
        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        T::replace_all(&mut conn, &current).map_err(|e| Error::Database(e.to_string()))
    }

    /// Copy of the current records. Callers own the copy.
    pub fn fetch(&self) -> Vec<T> {
        self.records.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
