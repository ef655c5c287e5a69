//! In-memory repository mocks
//!
//! Each mock keeps its rows behind a `parking_lot::Mutex` and exposes a few
//! inspection helpers for assertions.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{CredentialsRepository, EntityLogRepository, UpdateRepository, UserIntegrationRepository};
use conduit_domain::{
    FetchedEntityLog, IntegrationCredentials, IntegrationUpdate, Result as DomainResult, UserIntegration,
};
use parking_lot::Mutex;

/// In-memory mock for `UserIntegrationRepository`.
#[derive(Default, Clone)]
pub struct MockUserIntegrationRepository {
    rows: Arc<Mutex<Vec<UserIntegration>>>,
}

impl MockUserIntegrationRepository {
    pub fn new(rows: Vec<UserIntegration>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)) }
    }

    pub fn all(&self) -> Vec<UserIntegration> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl UserIntegrationRepository for MockUserIntegrationRepository {
    async fn find_all(&self) -> DomainResult<Vec<UserIntegration>> {
        Ok(self.all())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<UserIntegration>> {
        Ok(self.rows.lock().iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_id_and_user(&self, id: &str, user_id: &str) -> DomainResult<Option<UserIntegration>> {
        Ok(self.rows.lock().iter().find(|i| i.id == id && i.user_id == user_id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<UserIntegration>> {
        Ok(self.rows.lock().iter().filter(|i| i.user_id == user_id).cloned().collect())
    }

    async fn find_by_webhook_token(&self, token: &str) -> DomainResult<Option<UserIntegration>> {
        Ok(self.rows.lock().iter().find(|i| i.webhook_token.as_deref() == Some(token)).cloned())
    }

    async fn insert(&self, integration: UserIntegration) -> DomainResult<()> {
        self.rows.lock().push(integration);
        Ok(())
    }

    async fn update(&self, integration: UserIntegration) -> DomainResult<bool> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|i| i.id == integration.id) {
            Some(row) => {
                *row = integration;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id_and_user(&self, id: &str, user_id: &str) -> DomainResult<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|i| !(i.id == id && i.user_id == user_id));
        Ok(rows.len() != before)
    }

    async fn delete_by_user(&self, user_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|i| i.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory mock for `CredentialsRepository`.
#[derive(Default, Clone)]
pub struct MockCredentialsRepository {
    rows: Arc<Mutex<Vec<IntegrationCredentials>>>,
}

impl MockCredentialsRepository {
    pub fn new(rows: Vec<IntegrationCredentials>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)) }
    }

    pub fn all(&self) -> Vec<IntegrationCredentials> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl CredentialsRepository for MockCredentialsRepository {
    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<IntegrationCredentials>> {
        Ok(self.rows.lock().iter().filter(|c| c.user_id == user_id).cloned().collect())
    }

    async fn find_by_user_and_type(
        &self,
        user_id: &str,
        integration_type: &str,
    ) -> DomainResult<Option<IntegrationCredentials>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|c| c.user_id == user_id && c.integration_type == integration_type)
            .cloned())
    }

    async fn find_by_access_token(&self, access_token: &str) -> DomainResult<Option<IntegrationCredentials>> {
        Ok(self.rows.lock().iter().find(|c| c.access_token == access_token).cloned())
    }

    async fn insert(&self, credentials: IntegrationCredentials) -> DomainResult<()> {
        self.rows.lock().push(credentials);
        Ok(())
    }

    async fn update(&self, credentials: IntegrationCredentials) -> DomainResult<bool> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|c| c.id == credentials.id) {
            Some(row) => {
                *row = credentials;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_user_and_type(&self, user_id: &str, integration_type: &str) -> DomainResult<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|c| !(c.user_id == user_id && c.integration_type == integration_type));
        Ok(rows.len() != before)
    }

    async fn delete_by_user(&self, user_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|c| c.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory mock for `UpdateRepository`.
#[derive(Default, Clone)]
pub struct MockUpdateRepository {
    rows: Arc<Mutex<Vec<IntegrationUpdate>>>,
}

impl MockUpdateRepository {
    pub fn new(rows: Vec<IntegrationUpdate>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)) }
    }

    pub fn all(&self) -> Vec<IntegrationUpdate> {
        self.rows.lock().clone()
    }

    pub fn get(&self, integration_id: &str, identifier: &str) -> Option<IntegrationUpdate> {
        self.rows.lock().iter().find(|u| u.integration_id == integration_id && u.identifier == identifier).cloned()
    }
}

#[async_trait]
impl UpdateRepository for MockUpdateRepository {
    async fn find_by_integration_and_identifier(
        &self,
        integration_id: &str,
        identifier: &str,
    ) -> DomainResult<Option<IntegrationUpdate>> {
        Ok(self.get(integration_id, identifier))
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<IntegrationUpdate>> {
        Ok(self.rows.lock().iter().filter(|u| u.user_id == user_id).cloned().collect())
    }

    async fn insert(&self, update: IntegrationUpdate) -> DomainResult<()> {
        self.rows.lock().push(update);
        Ok(())
    }

    async fn update(&self, update: IntegrationUpdate) -> DomainResult<bool> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|u| u.id == update.id) {
            Some(row) => {
                *row = update;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert(&self, update: IntegrationUpdate) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|u| u.integration_id == update.integration_id && u.identifier == update.identifier) {
            Some(row) => {
                row.data = update.data;
                row.timestamp = update.timestamp;
            }
            None => rows.push(update),
        }
        Ok(())
    }

    async fn tombstone(&self, update: IntegrationUpdate) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|u| u.integration_id == update.integration_id && u.identifier == update.identifier) {
            Some(row) => row.data = None,
            None => rows.push(IntegrationUpdate { data: None, ..update }),
        }
        Ok(())
    }

    async fn delete_by_ids_and_user(&self, ids: &[String], user_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|u| !(u.user_id == user_id && ids.contains(&u.id)));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_user(&self, user_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|u| u.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_integration(&self, integration_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|u| u.integration_id != integration_id);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory mock for `EntityLogRepository`.
#[derive(Default, Clone)]
pub struct MockEntityLogRepository {
    rows: Arc<Mutex<Vec<FetchedEntityLog>>>,
}

impl MockEntityLogRepository {
    pub fn new(rows: Vec<FetchedEntityLog>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)) }
    }

    pub fn get(&self, integration_id: &str, identifier: &str) -> Option<FetchedEntityLog> {
        self.rows.lock().iter().find(|l| l.integration_id == integration_id && l.identifier == identifier).cloned()
    }

    pub fn all(&self) -> Vec<FetchedEntityLog> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl EntityLogRepository for MockEntityLogRepository {
    async fn find(&self, integration_id: &str, identifier: &str) -> DomainResult<Option<FetchedEntityLog>> {
        Ok(self.get(integration_id, identifier))
    }

    async fn insert(&self, log: FetchedEntityLog) -> DomainResult<()> {
        self.rows.lock().push(log);
        Ok(())
    }

    async fn add_entities(&self, integration_id: &str, identifier: &str, entity_ids: &[String]) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        if let Some(log) = rows.iter_mut().find(|l| l.integration_id == integration_id && l.identifier == identifier)
        {
            for id in entity_ids {
                if !log.entity_ids.contains(id) {
                    log.entity_ids.push(id.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_entities(
        &self,
        integration_id: &str,
        identifier: &str,
        entity_ids: &[String],
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        if let Some(log) = rows.iter_mut().find(|l| l.integration_id == integration_id && l.identifier == identifier)
        {
            log.entity_ids.retain(|id| !entity_ids.contains(id));
        }
        Ok(())
    }

    async fn delete_by_integration_ids(&self, integration_ids: &[String]) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|l| !integration_ids.contains(&l.integration_id));
        Ok((before - rows.len()) as u64)
    }
}
