//! Pulling integration data from remote APIs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use conduit_common::IngestionMetrics;
use conduit_domain::constants::SUCCESS_STATUS_CODE;
use conduit_domain::{ConduitError, FetchConfig, IntegrationEntityDefinition, PullSourceSettings, Result, UserIntegration};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::ports::{FetchFailure, HttpFetcher, UserDirectory};
use crate::auth::AuthService;
use crate::definitions::{declared_options, TypeRegistry};
use crate::extraction::{VariableContext, VariableEvaluator};
use crate::process::ProcessService;

/// Fetch service
///
/// Resolves the user's zone, templates the source URL, performs the request
/// with the right client and hands successful bodies to [`ProcessService`].
pub struct FetchService {
    registry: Arc<TypeRegistry>,
    auth: Arc<AuthService>,
    process: Arc<ProcessService>,
    directory: Arc<dyn UserDirectory>,
    default_client: Arc<dyn HttpFetcher>,
    variables: VariableEvaluator,
    config: FetchConfig,
    metrics: Arc<IngestionMetrics>,
    /// Consecutive token-retrieval failures per `user:type`.
    token_refresh_tries: Mutex<HashMap<String, u32>>,
}

impl FetchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<TypeRegistry>,
        auth: Arc<AuthService>,
        process: Arc<ProcessService>,
        directory: Arc<dyn UserDirectory>,
        default_client: Arc<dyn HttpFetcher>,
        config: FetchConfig,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            registry,
            auth,
            process,
            directory,
            default_client,
            variables: VariableEvaluator::with_defaults(),
            config,
            metrics,
            token_refresh_tries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_variables(mut self, variables: VariableEvaluator) -> Self {
        self.variables = variables;
        self
    }

    /// Current instant in the user's time zone.
    pub async fn user_now(&self, user_id: &str) -> Result<DateTime<Tz>> {
        let name = self.directory.get_user_time_zone(user_id).await?;
        let zone: Tz = name
            .parse()
            .map_err(|_| ConduitError::InvalidInput(format!("user {user_id} has unknown time zone `{name}`")))?;
        Ok(Utc::now().with_timezone(&zone))
    }

    /// Fetch the latest data of a pull source.
    #[instrument(skip(self, integration, source), fields(integration_id = %integration.id))]
    pub async fn pull_integration(&self, integration: &UserIntegration, source: &PullSourceSettings) -> Result<()> {
        let now = self.user_now(&integration.user_id).await?;
        let Some(definition) = self.definition_for(integration) else {
            return Ok(());
        };

        self.fetch(&definition, integration, &source.url, VariableContext::at(now)).await
    }

    /// Backfill the configured history window.
    #[instrument(skip(self, integration), fields(integration_id = %integration.id))]
    pub async fn fetch_historical(&self, integration: &UserIntegration) -> Result<()> {
        let now = self.user_now(&integration.user_id).await?;
        let start = now - Duration::days(self.config.historical_fetch_days);

        let Some(definition) = self.definition_for(integration) else {
            return Ok(());
        };
        let Some(history) = &definition.history else {
            return Err(ConduitError::InvalidInput(format!(
                "entity `{}` does not support historical fetches",
                definition.key()
            )));
        };

        self.fetch(&definition, integration, &history.url, VariableContext::with_range(now, start, now)).await
    }

    fn definition_for(&self, integration: &UserIntegration) -> Option<Arc<IntegrationEntityDefinition>> {
        let definition = self.registry.get_integration_entity(&integration.integration_type, &integration.entity_type);
        if definition.is_none() {
            debug!(
                integration_type = %integration.integration_type,
                entity_type = %integration.entity_type,
                "No definition for integration, skipping fetch"
            );
        }
        definition
    }

    async fn fetch(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        url_template: &str,
        context: VariableContext,
    ) -> Result<()> {
        let options = declared_options(definition, &integration.options);
        let url = self.variables.replace_variables(url_template, &options, &context)?;

        let Some(client) = self.client_for(integration).await? else {
            return Ok(());
        };
        let Some(body) = self.request(&client, integration, &url).await? else {
            return Ok(());
        };

        self.process.handle_integration_response(definition, integration, &body, &context.now).await
    }

    /// Client to use for `integration`; `None` when the user has not finished
    /// connecting their account.
    async fn client_for(&self, integration: &UserIntegration) -> Result<Option<Arc<dyn HttpFetcher>>> {
        let requires_auth = self
            .registry
            .get_integration_type(&integration.integration_type)
            .is_some_and(|definition| definition.authentication.is_some());
        if !requires_auth {
            return Ok(Some(Arc::clone(&self.default_client)));
        }

        let credentials = self
            .auth
            .get_credentials_by_user_id_and_type(&integration.user_id, &integration.integration_type)
            .await?;
        let Some(credentials) = credentials else {
            info!(
                user_id = %integration.user_id,
                integration_type = %integration.integration_type,
                "No credentials for integration, skipping fetch"
            );
            return Ok(None);
        };

        let client = self.auth.create_client(&credentials)?;
        if client.is_none() {
            warn!(integration_type = %integration.integration_type, "No authentication method registered");
        }
        Ok(client)
    }

    /// Body of a successful response, `None` after a token failure.
    async fn request(
        &self,
        client: &Arc<dyn HttpFetcher>,
        integration: &UserIntegration,
        url: &str,
    ) -> Result<Option<Vec<u8>>> {
        match client.get(url).await {
            Ok(response) => {
                self.reset_token_failures(integration);
                if response.status != SUCCESS_STATUS_CODE {
                    self.metrics.record_fetch_error();
                    return Err(ConduitError::Fetch(format!("unexpected status code: {}", response.status)));
                }
                Ok(Some(response.body))
            }
            Err(FetchFailure::TokenRetrieval(message)) => {
                warn!(
                    user_id = %integration.user_id,
                    integration_type = %integration.integration_type,
                    error = %message,
                    "Token expired and refresh failed"
                );
                self.register_token_failure(integration).await?;
                Ok(None)
            }
            Err(FetchFailure::Transport(message)) => {
                self.metrics.record_fetch_error();
                Err(ConduitError::Fetch(message))
            }
        }
    }

    fn reset_token_failures(&self, integration: &UserIntegration) {
        self.token_refresh_tries.lock().remove(&retry_key(integration));
    }

    /// Count a token failure; purge the credentials once the budget is spent.
    async fn register_token_failure(&self, integration: &UserIntegration) -> Result<()> {
        let exhausted = {
            let mut tries = self.token_refresh_tries.lock();
            let key = retry_key(integration);
            let count = tries.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count >= self.config.max_token_refresh_tries {
                tries.remove(&key);
                true
            } else {
                false
            }
        };

        if exhausted {
            warn!(
                user_id = %integration.user_id,
                integration_type = %integration.integration_type,
                "Max token refresh tries reached, deleting credentials"
            );
            self.metrics.record_auth_budget_exhausted();
            self.auth.delete_credentials(&integration.user_id, &integration.integration_type).await?;
        }
        Ok(())
    }

    /// Current failure count, for diagnostics.
    pub fn token_failures(&self, user_id: &str, integration_type: &str) -> u32 {
        self.token_refresh_tries.lock().get(&format!("{user_id}:{integration_type}")).copied().unwrap_or(0)
    }
}

fn retry_key(integration: &UserIntegration) -> String {
    format!("{}:{}", integration.user_id, integration.integration_type)
}
