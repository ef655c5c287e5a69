//! SQLCipher-backed OAuth credentials repository.
//!
//! One row per `(user_id, integration_type)`; the unique constraint makes a
//! second insert for the same pair fail rather than silently duplicate.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::CredentialsRepository;
use conduit_domain::{IntegrationCredentials, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::manager::{map_sql_error, DbManager};

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, integration_type, access_token, refresh_token, expiry FROM integration_credentials";

/// SQLCipher implementation of [`CredentialsRepository`].
pub struct SqlCipherCredentialsRepository {
    db: Arc<DbManager>,
}

impl SqlCipherCredentialsRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn query_one(&self, filter: &'static str, args: Vec<String>) -> Result<Option<IntegrationCredentials>> {
        self.db
            .with_connection(move |conn| {
                conn.query_row(&format!("{SELECT_COLUMNS} {filter}"), rusqlite::params_from_iter(args.iter()), read_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }
}

#[async_trait]
impl CredentialsRepository for SqlCipherCredentialsRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<IntegrationCredentials>> {
        let user_id = user_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY integration_type"))
                    .map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(params![user_id], read_row)
                    .map_err(map_sql_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sql_error)?;
                Ok(rows)
            })
            .await
    }

    async fn find_by_user_and_type(
        &self,
        user_id: &str,
        integration_type: &str,
    ) -> Result<Option<IntegrationCredentials>> {
        self.query_one(
            "WHERE user_id = ?1 AND integration_type = ?2",
            vec![user_id.to_string(), integration_type.to_string()],
        )
        .await
    }

    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<IntegrationCredentials>> {
        self.query_one("WHERE access_token = ?1", vec![access_token.to_string()]).await
    }

    async fn insert(&self, credentials: IntegrationCredentials) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO integration_credentials
                        (id, user_id, integration_type, access_token, refresh_token, expiry)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        credentials.id,
                        credentials.user_id,
                        credentials.integration_type,
                        credentials.access_token,
                        credentials.refresh_token,
                        credentials.expiry
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, credentials: IntegrationCredentials) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE integration_credentials
                         SET access_token = ?2, refresh_token = ?3, expiry = ?4
                         WHERE id = ?1",
                        params![credentials.id, credentials.access_token, credentials.refresh_token, credentials.expiry],
                    )
                    .map_err(map_sql_error)?;
                Ok(changed > 0)
            })
            .await
    }

    async fn delete_by_user_and_type(&self, user_id: &str, integration_type: &str) -> Result<bool> {
        let (user_id, integration_type) = (user_id.to_string(), integration_type.to_string());
        self.db
            .with_connection(move |conn| {
                let deleted = conn
                    .execute(
                        "DELETE FROM integration_credentials WHERE user_id = ?1 AND integration_type = ?2",
                        params![user_id, integration_type],
                    )
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
                    .execute("DELETE FROM integration_credentials WHERE user_id = ?1", params![user_id])
                    .map_err(map_sql_error)?;
                Ok(deleted as u64)
            })
            .await
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<IntegrationCredentials> {
    Ok(IntegrationCredentials {
        id: row.get(0)?,
        user_id: row.get(1)?,
        integration_type: row.get(2)?,
        access_token: row.get(3)?,
        refresh_token: row.get(4)?,
        expiry: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use conduit_domain::ConduitError;
    use tempfile::TempDir;

    use super::*;

    const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn credentials(id: &str, user_id: &str, integration_type: &str, access_token: &str) -> IntegrationCredentials {
        IntegrationCredentials {
            id: id.into(),
            user_id: user_id.into(),
            integration_type: integration_type.into(),
            access_token: access_token.into(),
            refresh_token: format!("refresh-{id}"),
            expiry: 1_700_000_000_000,
        }
    }

    async fn setup() -> (SqlCipherCredentialsRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let mgr = Arc::new(
            DbManager::new(temp_dir.path().join("credentials.db"), 2, Some(TEST_KEY)).expect("db manager created"),
        );
        mgr.run_migrations().expect("migrations run");
        (SqlCipherCredentialsRepository::new(mgr), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookups_by_pair_and_access_token() {
        let (repo, _dir) = setup().await;
        repo.insert(credentials("c-1", "u-1", "oura", "access-1")).await.expect("inserted");
        repo.insert(credentials("c-2", "u-1", "strava", "access-2")).await.expect("inserted");

        let by_pair = repo.find_by_user_and_type("u-1", "strava").await.expect("queried");
        assert_eq!(by_pair.map(|c| c.id), Some("c-2".to_string()));

        let by_token = repo.find_by_access_token("access-1").await.expect("queried");
        assert_eq!(by_token.map(|c| c.integration_type), Some("oura".to_string()));

        assert_eq!(repo.find_by_user("u-1").await.expect("listed").len(), 2);
        assert!(repo.find_by_access_token("unknown").await.expect("queried").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pair_is_unique() {
        let (repo, _dir) = setup().await;
        repo.insert(credentials("c-1", "u-1", "oura", "access-1")).await.expect("inserted");

        let err = repo.insert(credentials("c-2", "u-1", "oura", "access-2")).await.expect_err("duplicate pair");

        assert_eq!(err, ConduitError::Database("unique constraint violation".into()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_rewrites_tokens() {
        let (repo, _dir) = setup().await;
        repo.insert(credentials("c-1", "u-1", "oura", "access-1")).await.expect("inserted");

        let mut refreshed = credentials("c-1", "u-1", "oura", "access-2");
        refreshed.expiry = 42;
        assert!(repo.update(refreshed.clone()).await.expect("updated"));
        assert!(!repo.update(credentials("c-9", "u-1", "oura", "x")).await.expect("no row"));

        assert_eq!(repo.find_by_user_and_type("u-1", "oura").await.expect("queried"), Some(refreshed));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deletes_by_pair_and_user() {
        let (repo, _dir) = setup().await;
        repo.insert(credentials("c-1", "u-1", "oura", "a1")).await.expect("inserted");
        repo.insert(credentials("c-2", "u-1", "strava", "a2")).await.expect("inserted");
        repo.insert(credentials("c-3", "u-2", "oura", "a3")).await.expect("inserted");

        assert!(repo.delete_by_user_and_type("u-1", "oura").await.expect("deleted"));
        assert!(!repo.delete_by_user_and_type("u-1", "oura").await.expect("already gone"));
        assert_eq!(repo.delete_by_user("u-1").await.expect("deleted"), 1);
        assert_eq!(repo.find_by_user("u-2").await.expect("listed").len(), 1);
    }
}
