//! End-to-end database integration coverage for the SQLCipher repositories.
//!
//! Each test operates on an isolated encrypted database with migrations
//! applied and drives the repositories through their core port traits.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::{CredentialsRepository, EntityLogRepository, UpdateRepository, UserIntegrationRepository};
use conduit_domain::{FetchedEntityLog, IntegrationCredentials, IntegrationUpdate, UserIntegration};
use conduit_infra::database::{
    DbManager, SqlCipherCredentialsRepository, SqlCipherEntityLogRepository, SqlCipherUpdateRepository,
    SqlCipherUserIntegrationRepository,
};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

struct DbHarness {
    temp_dir: TempDir,
    manager: Arc<DbManager>,
}

impl DbHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let manager = open(&temp_dir, TEST_DB_KEY);
        Self { temp_dir, manager }
    }

    fn integrations(&self) -> SqlCipherUserIntegrationRepository {
        SqlCipherUserIntegrationRepository::new(Arc::clone(&self.manager))
    }

    fn credentials(&self) -> SqlCipherCredentialsRepository {
        SqlCipherCredentialsRepository::new(Arc::clone(&self.manager))
    }

    fn updates(&self) -> SqlCipherUpdateRepository {
        SqlCipherUpdateRepository::new(Arc::clone(&self.manager))
    }

    fn entity_logs(&self) -> SqlCipherEntityLogRepository {
        SqlCipherEntityLogRepository::new(Arc::clone(&self.manager))
    }
}

fn open(dir: &TempDir, key: &str) -> Arc<DbManager> {
    let manager = Arc::new(
        DbManager::new(dir.path().join("conduit.db"), 4, Some(key)).expect("database manager should initialise"),
    );
    manager.run_migrations().expect("schema migrations should apply");
    manager
}

fn make_integration(id: &str, user_id: &str) -> UserIntegration {
    UserIntegration {
        id: id.to_string(),
        user_id: user_id.to_string(),
        integration_type: "oura".to_string(),
        entity_type: "sleep".to_string(),
        form_id: "form-1".to_string(),
        webhook_token: None,
        fields: [("score".to_string(), "q-score".to_string())].into_iter().collect(),
        options: HashMap::from([("city".to_string(), json!("Utrecht"))]),
    }
}

fn make_credentials(user_id: &str) -> IntegrationCredentials {
    IntegrationCredentials {
        id: Uuid::now_v7().to_string(),
        user_id: user_id.to_string(),
        integration_type: "oura".to_string(),
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        expiry: 1_700_000_000_000,
    }
}

fn make_update(integration_id: &str, user_id: &str, identifier: &str) -> IntegrationUpdate {
    IntegrationUpdate {
        id: Uuid::now_v7().to_string(),
        user_id: user_id.to_string(),
        integration_id: integration_id.to_string(),
        identifier: identifier.to_string(),
        timestamp: 1_700_000_000_000,
        data: json!({"q-score": 81}).as_object().cloned(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn data_survives_reopening_with_the_same_key() {
    let harness = DbHarness::new();
    harness.integrations().insert(make_integration("sleep-1", "user-1")).await.expect("integration should persist");
    harness.credentials().insert(make_credentials("user-1")).await.expect("credentials should persist");

    let reopened = open(&harness.temp_dir, TEST_DB_KEY);
    let integrations = SqlCipherUserIntegrationRepository::new(Arc::clone(&reopened));
    let credentials = SqlCipherCredentialsRepository::new(reopened);

    let stored = integrations.find_by_id("sleep-1").await.expect("lookup should succeed").expect("integration kept");
    assert_eq!(stored, make_integration("sleep-1", "user-1"));
    let token = credentials.find_by_access_token("access-user-1").await.expect("lookup should succeed");
    assert_eq!(token.map(|c| c.refresh_token), Some("refresh-user-1".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_key_cannot_read_the_database() {
    let harness = DbHarness::new();
    harness.integrations().insert(make_integration("sleep-1", "user-1")).await.expect("integration should persist");

    let result = DbManager::new(harness.temp_dir.path().join("conduit.db"), 1, Some("some-other-key"))
        .and_then(|manager| manager.health_check());

    assert!(result.is_err(), "a different key must not open the database");
}

#[tokio::test(flavor = "multi_thread")]
async fn user_purge_only_touches_that_user() {
    let harness = DbHarness::new();
    let (integrations, credentials, updates) = (harness.integrations(), harness.credentials(), harness.updates());

    for user in ["user-1", "user-2"] {
        integrations.insert(make_integration(&format!("sleep-{user}"), user)).await.expect("integration");
        credentials.insert(make_credentials(user)).await.expect("credentials");
        updates.insert(make_update(&format!("sleep-{user}"), user, "night-1")).await.expect("update");
        updates.insert(make_update(&format!("sleep-{user}"), user, "night-2")).await.expect("update");
    }

    assert_eq!(integrations.delete_by_user("user-1").await.expect("purge integrations"), 1);
    assert_eq!(credentials.delete_by_user("user-1").await.expect("purge credentials"), 1);
    assert_eq!(updates.delete_by_user("user-1").await.expect("purge updates"), 2);

    assert!(integrations.find_by_user("user-1").await.expect("listed").is_empty());
    assert_eq!(integrations.find_by_user("user-2").await.expect("listed").len(), 1);
    assert_eq!(credentials.find_by_user("user-2").await.expect("listed").len(), 1);
    assert_eq!(updates.find_by_user("user-2").await.expect("listed").len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn entity_log_and_tombstone_workflow() {
    let harness = DbHarness::new();
    let (logs, updates) = (harness.entity_logs(), harness.updates());
    let ids = |values: &[&str]| values.iter().map(|v| (*v).to_string()).collect::<Vec<_>>();

    logs.insert(FetchedEntityLog {
        integration_id: "sleep-1".into(),
        identifier: "2024-03-01".into(),
        entity_ids: ids(&["a", "b"]),
    })
    .await
    .expect("log inserted");
    logs.add_entities("sleep-1", "2024-03-01", &ids(&["b", "c"])).await.expect("added");
    logs.remove_entities("sleep-1", "2024-03-01", &ids(&["a", "zz"])).await.expect("removed");

    let log = logs.find("sleep-1", "2024-03-01").await.expect("lookup").expect("log kept");
    assert_eq!(log.entity_ids, ids(&["b", "c"]));

    let mut update = make_update("sleep-1", "user-1", "a");
    updates.insert(update.clone()).await.expect("update stored");
    update.data = None;
    assert!(updates.update(update.clone()).await.expect("tombstoned"));

    let stored = updates.find_by_integration_and_identifier("sleep-1", "a").await.expect("lookup").expect("kept");
    assert_eq!(stored.data, None);

    assert_eq!(logs.delete_by_integration_ids(&ids(&["sleep-1"])).await.expect("logs purged"), 1);
    assert_eq!(updates.delete_by_integration("sleep-1").await.expect("updates purged"), 1);
    assert!(logs.find("sleep-1", "2024-03-01").await.expect("lookup").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_upserts_of_one_identifier_leave_a_single_row() {
    let harness = DbHarness::new();
    let updates = Arc::new(harness.updates());

    for round in 0..10 {
        let identifier = format!("night-{round}");
        let writers = (0..8).map(|writer| {
            let updates = Arc::clone(&updates);
            let mut update = make_update("sleep-1", "user-1", &identifier);
            update.timestamp = writer;
            async move { updates.upsert(update).await }
        });

        for outcome in futures::future::join_all(writers).await {
            outcome.expect("concurrent upsert should not conflict");
        }
    }

    let stored = updates.find_by_user("user-1").await.expect("listed");
    assert_eq!(stored.len(), 10);

    let mut tombstone = make_update("sleep-1", "user-1", "night-0");
    tombstone.data = None;
    let tombstones = (0..4).map(|_| {
        let updates = Arc::clone(&updates);
        let tombstone = IntegrationUpdate { id: Uuid::now_v7().to_string(), ..tombstone.clone() };
        async move { updates.tombstone(tombstone).await }
    });
    for outcome in futures::future::join_all(tombstones).await {
        outcome.expect("concurrent tombstones should not conflict");
    }
    let night = updates.find_by_integration_and_identifier("sleep-1", "night-0").await.expect("lookup");
    assert_eq!(night.expect("row kept").data, None);
}
