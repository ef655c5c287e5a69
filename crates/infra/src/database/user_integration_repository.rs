//! SQLCipher-backed user integration repository.
//!
//! Field mappings and options are stored as JSON text columns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::UserIntegrationRepository;
use conduit_domain::{Result, UserIntegration};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use super::manager::{map_json_error, map_sql_error, DbManager};

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, integration_type, entity_type, form_id, webhook_token, fields, options FROM user_integrations";

/// SQLCipher implementation of [`UserIntegrationRepository`].
pub struct SqlCipherUserIntegrationRepository {
    db: Arc<DbManager>,
}

impl SqlCipherUserIntegrationRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn query_many(&self, filter: &'static str, args: Vec<String>) -> Result<Vec<UserIntegration>> {
        self.db
            .with_connection(move |conn| {
                let sql = format!("{SELECT_COLUMNS} {filter} ORDER BY rowid");
                let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), read_row)
                    .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
                rows.into_iter().map(StoredIntegration::into_domain).collect()
            })
            .await
    }

    async fn query_one(&self, filter: &'static str, args: Vec<String>) -> Result<Option<UserIntegration>> {
        self.db
            .with_connection(move |conn| {
                let sql = format!("{SELECT_COLUMNS} {filter}");
                conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), read_row)
                    .optional()
                    .map_err(map_sql_error)?
                    .map(StoredIntegration::into_domain)
                    .transpose()
            })
            .await
    }
}

#[async_trait]
impl UserIntegrationRepository for SqlCipherUserIntegrationRepository {
    async fn find_all(&self) -> Result<Vec<UserIntegration>> {
        self.query_many("", Vec::new()).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserIntegration>> {
        self.query_one("WHERE id = ?1", vec![id.to_string()]).await
    }

    async fn find_by_id_and_user(&self, id: &str, user_id: &str) -> Result<Option<UserIntegration>> {
        self.query_one("WHERE id = ?1 AND user_id = ?2", vec![id.to_string(), user_id.to_string()]).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserIntegration>> {
        self.query_many("WHERE user_id = ?1", vec![user_id.to_string()]).await
    }

    async fn find_by_webhook_token(&self, token: &str) -> Result<Option<UserIntegration>> {
        self.query_one("WHERE webhook_token = ?1", vec![token.to_string()]).await
    }

    async fn insert(&self, integration: UserIntegration) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                let fields = serde_json::to_string(&integration.fields).map_err(map_json_error)?;
                let options = serde_json::to_string(&integration.options).map_err(map_json_error)?;
                conn.execute(
                    "INSERT INTO user_integrations
                        (id, user_id, integration_type, entity_type, form_id, webhook_token, fields, options)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        integration.id,
                        integration.user_id,
                        integration.integration_type,
                        integration.entity_type,
                        integration.form_id,
                        integration.webhook_token,
                        fields,
                        options
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, integration: UserIntegration) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let fields = serde_json::to_string(&integration.fields).map_err(map_json_error)?;
                let options = serde_json::to_string(&integration.options).map_err(map_json_error)?;
                let changed = conn
                    .execute(
                        "UPDATE user_integrations SET fields = ?2, options = ?3 WHERE id = ?1",
                        params![integration.id, fields, options],
                    )
                    .map_err(map_sql_error)?;
                Ok(changed > 0)
            })
            .await
    }

    async fn delete_by_id_and_user(&self, id: &str, user_id: &str) -> Result<bool> {
        let (id, user_id) = (id.to_string(), user_id.to_string());
        self.db
            .with_connection(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM user_integrations WHERE id = ?1 AND user_id = ?2", params![id, user_id])
                    .map_err(map_sql_error)?;
                Ok(deleted > 0)
            })
            .await
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        let user_id = user_id.to_string();
        self.db
            .with_connection(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM user_integrations WHERE user_id = ?1", params![user_id])
                    .map_err(map_sql_error)?;
                Ok(deleted as u64)
            })
            .await
    }
}

/// Raw row before the JSON columns are decoded.
struct StoredIntegration {
    id: String,
    user_id: String,
    integration_type: String,
    entity_type: String,
    form_id: String,
    webhook_token: Option<String>,
    fields: String,
    options: String,
}

impl StoredIntegration {
    fn into_domain(self) -> Result<UserIntegration> {
        let fields: HashMap<String, String> = serde_json::from_str(&self.fields).map_err(map_json_error)?;
        let options: HashMap<String, Value> = serde_json::from_str(&self.options).map_err(map_json_error)?;
        Ok(UserIntegration {
            id: self.id,
            user_id: self.user_id,
            integration_type: self.integration_type,
            entity_type: self.entity_type,
            form_id: self.form_id,
            webhook_token: self.webhook_token,
            fields,
            options,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredIntegration> {
    Ok(StoredIntegration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        integration_type: row.get(2)?,
        entity_type: row.get(3)?,
        form_id: row.get(4)?,
        webhook_token: row.get(5)?,
        fields: row.get(6)?,
        options: row.get(7)?,
    })
}
