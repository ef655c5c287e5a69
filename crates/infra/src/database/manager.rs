//! Database connection manager backed by the SQLCipher pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use conduit_domain::{ConduitError, Result};
use rusqlite::params;
use tokio::task;
use tracing::info;

use super::sqlcipher_pool::{create_sqlcipher_pool, SqlCipherConnection, SqlCipherPool};
use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlCipherPool`].
pub struct DbManager {
    pool: Arc<SqlCipherPool>,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size and SQLCipher key.
    ///
    /// A missing key is rejected; credentials and payloads are never stored
    /// in plain SQLite.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32, encryption_key: Option<&str>) -> Result<Self> {
        let key = encryption_key
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConduitError::Config("database encryption key not provided".into()))?;

        let path = db_path.as_ref().to_path_buf();
        let pool = create_sqlcipher_pool(&path, key, pool_size)?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlcipher pool initialised");

        Ok(Self { pool, path })
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlCipherPool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqlCipherConnection> {
        self.pool.get().map_err(|e| ConduitError::from(InfraError::from(e)))
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection and run a simple query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }

    /// Run `work` with a pooled connection on the blocking thread pool.
    pub(crate) async fn with_connection<T, F>(self: &Arc<Self>, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqlCipherConnection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(self);
        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            work(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn create_schema(conn: &SqlCipherConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> ConduitError {
    ConduitError::from(InfraError::from(err))
}

pub(crate) fn map_json_error(err: serde_json::Error) -> ConduitError {
    ConduitError::from(InfraError::from(err))
}

/// Map JoinError from spawn_blocking to ConduitError.
fn map_join_error(err: task::JoinError) -> ConduitError {
    if err.is_cancelled() {
        ConduitError::Internal("blocking task cancelled".into())
    } else {
        ConduitError::Internal(format!("blocking task failed: {err}"))
    }
}
