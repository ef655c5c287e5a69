//! User integration lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use conduit_domain::{ConduitError, Result, UserIntegration};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{IntegrationLifecycleListener, UserIntegrationRepository};
use crate::definitions::TypeRegistry;
use crate::fetch::FetchService;
use crate::process::EntityLogRepository;

/// Request to subscribe a user to an integration entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserIntegration {
    pub user_id: String,
    pub integration_type: String,
    pub entity_type: String,
    pub form_id: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

/// Owns user integrations and fans lifecycle changes out to listeners.
pub struct UserIntegrationService {
    registry: Arc<TypeRegistry>,
    integrations: Arc<dyn UserIntegrationRepository>,
    entity_logs: Arc<dyn EntityLogRepository>,
    fetch: Arc<FetchService>,
    listeners: Vec<Arc<dyn IntegrationLifecycleListener>>,
}

impl UserIntegrationService {
    pub fn new(
        registry: Arc<TypeRegistry>,
        integrations: Arc<dyn UserIntegrationRepository>,
        entity_logs: Arc<dyn EntityLogRepository>,
        fetch: Arc<FetchService>,
    ) -> Self {
        Self { registry, integrations, entity_logs, fetch, listeners: Vec::new() }
    }

    /// Add a listener; listeners are notified in the order they were added.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn IntegrationLifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn get_all(&self) -> Result<Vec<UserIntegration>> {
        self.integrations.find_all().await
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<UserIntegration>> {
        self.integrations.find_by_user(user_id).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserIntegration>> {
        self.integrations.find_by_id(id).await
    }

    pub async fn get_by_webhook_token(&self, token: &str) -> Result<Option<UserIntegration>> {
        self.integrations.find_by_webhook_token(token).await
    }

    /// Create a subscription. Entities with a push source get a webhook token.
    pub async fn create(&self, request: NewUserIntegration) -> Result<UserIntegration> {
        if self.registry.get_integration_entity(&request.integration_type, &request.entity_type).is_none() {
            return Err(ConduitError::NotFound(format!(
                "integration entity `{}:{}`",
                request.integration_type, request.entity_type
            )));
        }

        let webhook_token = self
            .registry
            .extract_push_source(&request.integration_type, &request.entity_type)
            .map(|_| Uuid::new_v4().simple().to_string());

        let integration = UserIntegration {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            integration_type: request.integration_type,
            entity_type: request.entity_type,
            form_id: request.form_id,
            webhook_token,
            fields: request.fields,
            options: request.options,
        };
        self.integrations.insert(integration.clone()).await?;

        info!(
            integration_id = %integration.id,
            integration_type = %integration.integration_type,
            entity_type = %integration.entity_type,
            "Integration created"
        );
        for listener in &self.listeners {
            if let Err(err) = listener.on_integration_created(&integration).await {
                warn!(integration_id = %integration.id, error = %err, "Create listener failed");
            }
        }
        Ok(integration)
    }

    /// Replace fields and options of a user's integration.
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        fields: HashMap<String, String>,
        options: HashMap<String, Value>,
    ) -> Result<Option<UserIntegration>> {
        let Some(mut integration) = self.integrations.find_by_id_and_user(id, user_id).await? else {
            return Ok(None);
        };

        integration.fields = fields;
        integration.options = options;
        self.integrations.update(integration.clone()).await?;
        Ok(Some(integration))
    }

    /// Delete a user's integration; returns whether it existed.
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let Some(integration) = self.integrations.find_by_id_and_user(id, user_id).await? else {
            return Ok(false);
        };
        if !self.integrations.delete_by_id_and_user(id, user_id).await? {
            return Ok(false);
        }

        self.notify_deleted(&integration).await;
        self.entity_logs.delete_by_integration_ids(&[integration.id.clone()]).await?;
        info!(integration_id = %integration.id, "Integration deleted");
        Ok(true)
    }

    /// Backfill one of the user's integrations.
    pub async fn fetch_historical(&self, id: &str, user_id: &str) -> Result<()> {
        let integration = self
            .integrations
            .find_by_id_and_user(id, user_id)
            .await?
            .ok_or_else(|| ConduitError::NotFound(format!("integration `{id}`")))?;

        self.fetch.fetch_historical(&integration).await
    }

    /// Remove every integration of a deleted user.
    pub async fn on_user_deleted(&self, user_id: &str) -> Result<()> {
        let integrations = self.integrations.find_by_user(user_id).await?;
        self.integrations.delete_by_user(user_id).await?;

        for integration in &integrations {
            self.notify_deleted(integration).await;
        }

        let ids: Vec<String> = integrations.into_iter().map(|i| i.id).collect();
        if !ids.is_empty() {
            self.entity_logs.delete_by_integration_ids(&ids).await?;
        }
        info!(user_id, count = ids.len(), "Deleted integrations of removed user");
        Ok(())
    }

    async fn notify_deleted(&self, integration: &UserIntegration) {
        for listener in &self.listeners {
            if let Err(err) = listener.on_integration_deleted(integration).await {
                warn!(integration_id = %integration.id, error = %err, "Delete listener failed");
            }
        }
    }
}
