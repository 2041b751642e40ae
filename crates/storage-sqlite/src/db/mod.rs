//! Connection pool, embedded migrations and the serialized writer.

pub mod write_actor;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use survey_sync_core::errors::Result;

use crate::errors::StorageError;
use crate::schema::schema_state;

pub use write_actor::{spawn_writer, WriteHandle};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const POOL_SIZE: u32 = 4;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Create the directory holding `db_path` and return the path for diesel.
pub fn init(db_path: impl AsRef<Path>) -> Result<String> {
    let db_path = db_path.as_ref();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageError::Open(format!("{}: {}", parent.display(), e)))?;
    }
    let path = db_path
        .to_str()
        .ok_or_else(|| StorageError::Open(format!("Path is not UTF-8: {}", db_path.display())))?;
    Ok(path.to_string())
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    for version in &applied {
        debug!("Applied migration {}", version);
    }
    info!("Database {} is up to date ({} applied)", db_path, applied.len());
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(StorageError::from)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get().map_err(|e| StorageError::from(e).into())
}

/// Read a value from the `_schema_state` key/value table.
pub(crate) fn read_state(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>> {
    schema_state::table
        .find(key)
        .select(schema_state::value)
        .first::<String>(conn)
        .optional()
        .map_err(|e| StorageError::from(e).into())
}

pub(crate) fn write_state(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    diesel::insert_into(schema_state::table)
        .values((
            schema_state::key.eq(key),
            schema_state::value.eq(value),
            schema_state::updated_at.eq(&now),
        ))
        .on_conflict(schema_state::key)
        .do_update()
        .set((
            schema_state::value.eq(value),
            schema_state::updated_at.eq(&now),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

#[derive(diesel::QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

pub(crate) fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let row = diesel::sql_query(
        "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind::<Text, _>(table)
    .get_result::<CountRow>(conn)
    .map_err(StorageError::from)?;
    Ok(row.count > 0)
}

/// Migrated database in a temporary directory, with its pool and writer.
#[cfg(test)]
pub(crate) fn test_database() -> (tempfile::TempDir, Arc<DbPool>, WriteHandle) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = init(dir.path().join("surveys.db")).expect("init db");
    run_migrations(&db_path).expect("migrate db");
    let pool = create_pool(&db_path).expect("create pool");
    let writer = spawn_writer(pool.as_ref().clone());
    (dir, pool, writer)
}
