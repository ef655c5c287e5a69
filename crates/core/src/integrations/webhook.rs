//! Inbound webhook deliveries

use std::sync::Arc;

use conduit_domain::{ConduitError, Result};
use tracing::{debug, instrument};

use super::ports::UserIntegrationRepository;
use crate::definitions::TypeRegistry;
use crate::fetch::FetchService;
use crate::process::ProcessService;

/// Feeds pushed payloads straight into [`ProcessService`].
pub struct WebhookService {
    registry: Arc<TypeRegistry>,
    integrations: Arc<dyn UserIntegrationRepository>,
    fetch: Arc<FetchService>,
    process: Arc<ProcessService>,
}

impl WebhookService {
    pub fn new(
        registry: Arc<TypeRegistry>,
        integrations: Arc<dyn UserIntegrationRepository>,
        fetch: Arc<FetchService>,
        process: Arc<ProcessService>,
    ) -> Self {
        Self { registry, integrations, fetch, process }
    }

    /// Process `body` for the integration owning `token`.
    #[instrument(skip(self, token, body), fields(bytes = body.len()))]
    pub async fn handle_webhook(&self, token: &str, body: &[u8]) -> Result<()> {
        let integration = self
            .integrations
            .find_by_webhook_token(token)
            .await?
            .ok_or_else(|| ConduitError::NotFound("integration for webhook token".to_string()))?;

        let now = self.fetch.user_now(&integration.user_id).await?;

        let Some(definition) =
            self.registry.get_integration_entity(&integration.integration_type, &integration.entity_type)
        else {
            debug!(integration_id = %integration.id, "No definition for webhook integration");
            return Ok(());
        };

        self.process.handle_integration_response(&definition, &integration, body, &now).await
    }
}
