//! Update service

use std::sync::Arc;

use async_trait::async_trait;
use conduit_domain::{IntegrationUpdate, Result, UserIntegration};
use tracing::debug;

use crate::integrations::IntegrationLifecycleListener;
use crate::process::UpdateRepository;

/// Read side of integration updates, plus acknowledgement.
pub struct UpdateService {
    updates: Arc<dyn UpdateRepository>,
}

impl UpdateService {
    pub fn new(updates: Arc<dyn UpdateRepository>) -> Self {
        Self { updates }
    }

    pub async fn get_updates_by_user_id(&self, user_id: &str) -> Result<Vec<IntegrationUpdate>> {
        self.updates.find_by_user(user_id).await
    }

    /// Delete delivered updates; ids not owned by `user_id` are ignored.
    pub async fn acknowledge_updates(&self, ids: &[String], user_id: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.updates.delete_by_ids_and_user(ids, user_id).await?;
        debug!(user_id, requested = ids.len(), removed, "Acknowledged updates");
        Ok(removed)
    }

    pub async fn on_user_deleted(&self, user_id: &str) -> Result<()> {
        self.updates.delete_by_user(user_id).await?;
        Ok(())
    }

    pub async fn on_integration_deleted(&self, integration_id: &str) -> Result<()> {
        self.updates.delete_by_integration(integration_id).await?;
        Ok(())
    }
}

#[async_trait]
impl IntegrationLifecycleListener for UpdateService {
    async fn on_integration_deleted(&self, integration: &UserIntegration) -> Result<()> {
        UpdateService::on_integration_deleted(self, &integration.id).await
    }
}
