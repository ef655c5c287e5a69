//! SQLCipher-backed fetched entity log repository.
//!
//! The id set of a log is a JSON array column. Additions and removals run
//! as read-modify-write inside a transaction so concurrent writers cannot
//! lose each other's ids.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::EntityLogRepository;
use conduit_domain::{FetchedEntityLog, Result};
use rusqlite::{params, OptionalExtension};

use super::manager::{map_json_error, map_sql_error, DbManager};

/// SQLCipher implementation of [`EntityLogRepository`].
pub struct SqlCipherEntityLogRepository {
    db: Arc<DbManager>,
}

impl SqlCipherEntityLogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn modify<F>(&self, integration_id: &str, identifier: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<String>) + Send + 'static,
    {
        let (integration_id, identifier) = (integration_id.to_string(), identifier.to_string());
        self.db
            .with_connection(move |conn| {
                let tx = conn.unchecked_transaction().map_err(map_sql_error)?;
                let mut ids = read_ids(&tx, &integration_id, &identifier)?.unwrap_or_default();
                change(&mut ids);
                write_ids(&tx, &integration_id, &identifier, &ids)?;
                tx.commit().map_err(map_sql_error)
            })
            .await
    }
}

#[async_trait]
impl EntityLogRepository for SqlCipherEntityLogRepository {
    async fn find(&self, integration_id: &str, identifier: &str) -> Result<Option<FetchedEntityLog>> {
        let (integration_id, identifier) = (integration_id.to_string(), identifier.to_string());
        self.db
            .with_connection(move |conn| {
                Ok(read_ids(conn, &integration_id, &identifier)?
                    .map(|entity_ids| FetchedEntityLog { integration_id, identifier, entity_ids }))
            })
            .await
    }

    async fn insert(&self, log: FetchedEntityLog) -> Result<()> {
        self.db
            .with_connection(move |conn| write_ids(conn, &log.integration_id, &log.identifier, &log.entity_ids))
            .await
    }

    async fn add_entities(&self, integration_id: &str, identifier: &str, entity_ids: &[String]) -> Result<()> {
        let added = entity_ids.to_vec();
        self.modify(integration_id, identifier, move |ids| {
            for id in added {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        })
        .await
    }

    async fn remove_entities(&self, integration_id: &str, identifier: &str, entity_ids: &[String]) -> Result<()> {
        let removed = entity_ids.to_vec();
        self.modify(integration_id, identifier, move |ids| ids.retain(|id| !removed.contains(id))).await
    }

    async fn delete_by_integration_ids(&self, integration_ids: &[String]) -> Result<u64> {
        let integration_ids = integration_ids.to_vec();
        self.db
            .with_connection(move |conn| {
                let tx = conn.unchecked_transaction().map_err(map_sql_error)?;
                let mut deleted = 0;
                for integration_id in &integration_ids {
                    deleted += tx
                        .execute("DELETE FROM fetched_entity_logs WHERE integration_id = ?1", params![integration_id])
                        .map_err(map_sql_error)?;
                }
                tx.commit().map_err(map_sql_error)?;
                Ok(deleted as u64)
            })
            .await
    }
}

fn read_ids(conn: &rusqlite::Connection, integration_id: &str, identifier: &str) -> Result<Option<Vec<String>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT entity_ids FROM fetched_entity_logs WHERE integration_id = ?1 AND identifier = ?2",
            params![integration_id, identifier],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sql_error)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(map_json_error)).transpose()
}

fn write_ids(conn: &rusqlite::Connection, integration_id: &str, identifier: &str, ids: &[String]) -> Result<()> {
    let json = serde_json::to_string(ids).map_err(map_json_error)?;
    conn.execute(
        "INSERT INTO fetched_entity_logs (integration_id, identifier, entity_ids) VALUES (?1, ?2, ?3)
         ON CONFLICT(integration_id, identifier) DO UPDATE SET entity_ids = excluded.entity_ids",
        params![integration_id, identifier, json],
    )
    .map_err(map_sql_error)?;
    Ok(())
}
