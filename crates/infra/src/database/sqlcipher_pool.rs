//! SQLCipher pool helpers
//!
//! Builds the r2d2 pool used by every repository. Each new connection is
//! keyed (when a key is configured) and receives the connection pragmas
//! before it is handed out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use conduit_domain::{ConduitError, Result as DomainResult};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::warn;

use crate::errors::InfraError;

/// Pool of SQLCipher connections.
pub type SqlCipherPool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`SqlCipherPool`].
pub type SqlCipherConnection = PooledConnection<SqliteConnectionManager>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;";

/// Create an `Arc<SqlCipherPool>` with domain error semantics.
///
/// Every connection is keyed with `encryption_key` before use.
pub fn create_sqlcipher_pool<P: AsRef<Path>>(
    path: P,
    encryption_key: String,
    max_size: u32,
) -> DomainResult<Arc<SqlCipherPool>> {
    let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
        conn.pragma_update(None, "key", &encryption_key)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(CONNECTION_PRAGMAS)
    });

    Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map(Arc::new)
        .map_err(|e| {
            warn!(error = %e, "failed to create connection pool");
            ConduitError::from(InfraError::from(e))
        })
}
