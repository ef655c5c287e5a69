//! SQLCipher-backed integration update repository.
//!
//! A `NULL` data column is a tombstone.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::UpdateRepository;
use conduit_domain::{IntegrationUpdate, Result};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::{Map, Value};

use super::manager::{map_json_error, map_sql_error, DbManager};

const SELECT_COLUMNS: &str = "SELECT id, user_id, integration_id, identifier, timestamp, data FROM integration_updates";

/// SQLCipher implementation of [`UpdateRepository`].
pub struct SqlCipherUpdateRepository {
    db: Arc<DbManager>,
}

impl SqlCipherUpdateRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn delete_where(&self, filter: &'static str, arg: String) -> Result<u64> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn
                    .execute(&format!("DELETE FROM integration_updates WHERE {filter}"), params![arg])
                    .map_err(map_sql_error)?;
                Ok(deleted as u64)
            })
            .await
    }
}

#[async_trait]
impl UpdateRepository for SqlCipherUpdateRepository {
    async fn find_by_integration_and_identifier(
        &self,
        integration_id: &str,
        identifier: &str,
    ) -> Result<Option<IntegrationUpdate>> {
        let (integration_id, identifier) = (integration_id.to_string(), identifier.to_string());
        self.db
            .with_connection(move |conn| {
                conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE integration_id = ?1 AND identifier = ?2"),
                    params![integration_id, identifier],
                    read_row,
                )
                .optional()
                .map_err(map_sql_error)?
                .map(StoredUpdate::into_domain)
                .transpose()
            })
            .await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<IntegrationUpdate>> {
        let user_id = user_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY timestamp, rowid"))
                    .map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(params![user_id], read_row)
                    .map_err(map_sql_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sql_error)?;
                rows.into_iter().map(StoredUpdate::into_domain).collect()
            })
            .await
    }

    async fn insert(&self, update: IntegrationUpdate) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                let data = encode_data(update.data.as_ref())?;
                conn.execute(
                    "INSERT INTO integration_updates (id, user_id, integration_id, identifier, timestamp, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![update.id, update.user_id, update.integration_id, update.identifier, update.timestamp, data],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, update: IntegrationUpdate) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let data = encode_data(update.data.as_ref())?;
                let changed = conn
                    .execute(
                        "UPDATE integration_updates SET timestamp = ?2, data = ?3 WHERE id = ?1",
                        params![update.id, update.timestamp, data],
                    )
                    .map_err(map_sql_error)?;
                Ok(changed > 0)
            })
            .await
    }

    async fn upsert(&self, update: IntegrationUpdate) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                let data = encode_data(update.data.as_ref())?;
                conn.execute(
                    "INSERT INTO integration_updates (id, user_id, integration_id, identifier, timestamp, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(integration_id, identifier)
                     DO UPDATE SET data = excluded.data, timestamp = excluded.timestamp",
                    params![update.id, update.user_id, update.integration_id, update.identifier, update.timestamp, data],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn tombstone(&self, update: IntegrationUpdate) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO integration_updates (id, user_id, integration_id, identifier, timestamp, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, NULL)
                     ON CONFLICT(integration_id, identifier) DO UPDATE SET data = NULL",
                    params![update.id, update.user_id, update.integration_id, update.identifier, update.timestamp],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn delete_by_ids_and_user(&self, ids: &[String], user_id: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let (ids, user_id) = (ids.to_vec(), user_id.to_string());
        self.db
            .with_connection(move |conn| {
                let tx = conn.unchecked_transaction().map_err(map_sql_error)?;
                let mut deleted = 0;
                for id in &ids {
                    deleted += tx
                        .execute("DELETE FROM integration_updates WHERE id = ?1 AND user_id = ?2", params![id, user_id])
                        .map_err(map_sql_error)?;
                }
                tx.commit().map_err(map_sql_error)?;
                Ok(deleted as u64)
            })
            .await
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        self.delete_where("user_id = ?1", user_id.to_string()).await
    }

    async fn delete_by_integration(&self, integration_id: &str) -> Result<u64> {
        self.delete_where("integration_id = ?1", integration_id.to_string()).await
    }
}

fn encode_data(data: Option<&Map<String, Value>>) -> Result<Option<String>> {
    data.map(|data| serde_json::to_string(data).map_err(map_json_error)).transpose()
}

struct StoredUpdate {
    id: String,
    user_id: String,
    integration_id: String,
    identifier: String,
    timestamp: i64,
    data: Option<String>,
}

impl StoredUpdate {
    fn into_domain(self) -> Result<IntegrationUpdate> {
        let data = self.data.map(|raw| serde_json::from_str(&raw).map_err(map_json_error)).transpose()?;
        Ok(IntegrationUpdate {
            id: self.id,
            user_id: self.user_id,
            integration_id: self.integration_id,
            identifier: self.identifier,
            timestamp: self.timestamp,
            data,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredUpdate> {
    Ok(StoredUpdate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        integration_id: row.get(2)?,
        identifier: row.get(3)?,
        timestamp: row.get(4)?,
        data: row.get(5)?,
    })
}
