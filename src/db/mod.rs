//! Per-organization database access.
//!
//! Every organization owns a separate database file under the configured
//! data directory. Pools are created lazily, run the embedded migrations on
//! first open, and are cached for the life of the registry.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use parking_lot::Mutex;

use crate::common::DEFAULT_ORG_ID;
use crate::error::{Error, Result};

pub mod model;
pub mod schema;

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA busy_timeout=5000")
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Create a connection pool for the given database URL.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Connection(e.to_string()))?;
    Ok(())
}

/// Registry of per-organization connection pools.
pub struct Database {
    data_dir: PathBuf,
    pools: Mutex<HashMap<i32, DbPool>>,
}

impl Database {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Pool for the given organization, opening its database on first use.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created or the pool
    /// cannot be opened and migrated.
    pub fn get(&self, org_id: i32) -> Result<DbPool> {
        if let Some(pool) = self.pools.lock().get(&org_id) {
            return Ok(pool.clone());
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.path_for(org_id);
        let pool = create_pool(&path.display().to_string())?;
        run_migrations(&pool)?;

        Ok(self
            .pools
            .lock()
            .entry(org_id)
            .or_insert(pool)
            .clone())
    }

    /// All known organization IDs, sorted. The default organization is
    /// always included even before its database exists on disk.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be scanned.
    pub fn org_ids(&self) -> Result<Vec<i32>> {
        let mut ids = BTreeSet::from([DEFAULT_ORG_ID]);
        if self.data_dir.is_dir() {
            for entry in std::fs::read_dir(&self.data_dir)? {
                let entry = entry?;
                if let Some(org_id) = org_id_from_path(&entry.path()) {
                    ids.insert(org_id);
                }
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn path_for(&self, org_id: i32) -> PathBuf {
        self.data_dir.join(format!("org_{org_id}.db"))
    }
}

fn org_id_from_path(path: &Path) -> Option<i32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("org_")?
        .strip_suffix(".db")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_creates_database_and_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path());

        let pool = database.get(1).unwrap();
        let mut conn = pool.get().unwrap();

        #[derive(diesel::QueryableByName)]
        struct TableName {
            #[diesel(sql_type = diesel::sql_types::Text)]
            name: String,
        }

        let tables: Vec<String> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name LIKE 'genesis_%' ORDER BY name",
        )
        .load::<TableName>(&mut conn)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();

        assert!(tables.contains(&"genesis_vm".to_string()));
        assert!(tables.contains(&"genesis_storage".to_string()));
        assert!(tables.contains(&"genesis_vinterface".to_string()));
    }

    #[test]
    fn get_reuses_cached_pool() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path());

        database.get(1).unwrap();
        database.get(1).unwrap();

        assert_eq!(database.pools.lock().len(), 1);
    }

    #[test]
    fn org_ids_always_include_default() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path().join("missing"));

        assert_eq!(database.org_ids().unwrap(), vec![DEFAULT_ORG_ID]);
    }

    #[test]
    fn org_ids_enumerate_database_files() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path());

        database.get(3).unwrap();
        database.get(2).unwrap();

        assert_eq!(database.org_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn org_id_parsing_ignores_unrelated_files() {
        assert_eq!(org_id_from_path(Path::new("/tmp/org_7.db")), Some(7));
        assert_eq!(org_id_from_path(Path::new("/tmp/org_x.db")), None);
        assert_eq!(org_id_from_path(Path::new("/tmp/other.db")), None);
        assert_eq!(org_id_from_path(Path::new("/tmp/org_7.bak")), None);
    }
}
