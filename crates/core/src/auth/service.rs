//! Credential lifecycle for authenticated integration types

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_domain::constants::{CALLBACK_PATH_PREFIX, CALLBACK_PATH_SUFFIX};
use conduit_domain::{ConduitError, IntegrationCredentials, Result};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ports::{
    AuthenticationMethod, AuthenticationMethodRegistry, CredentialsRepository, TokenRefresh, TokenRefreshListener,
};
use crate::definitions::TypeRegistry;
use crate::fetch::ports::HttpFetcher;

/// Writes refreshed tokens back to the credential they replaced.
pub struct CredentialRefreshWriter {
    credentials: Arc<dyn CredentialsRepository>,
}

impl CredentialRefreshWriter {
    pub fn new(credentials: Arc<dyn CredentialsRepository>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl TokenRefreshListener for CredentialRefreshWriter {
    async fn on_token_refreshed(&self, refresh: TokenRefresh) -> Result<()> {
        let Some(mut stored) = self.credentials.find_by_access_token(&refresh.old_access_token).await? else {
            warn!("Refreshed token does not match any stored credentials");
            return Ok(());
        };

        stored.access_token = refresh.new_access_token;
        if !refresh.new_refresh_token.is_empty() {
            stored.refresh_token = refresh.new_refresh_token;
        }
        stored.expiry = refresh.new_expiry;

        debug!(user_id = %stored.user_id, integration_type = %stored.integration_type, "Persisting refreshed token");
        self.credentials.update(stored).await?;
        Ok(())
    }
}

/// Authentication service
///
/// Holds one [`AuthenticationMethod`] per integration type that declares
/// authentication, built on [`AuthService::load`].
pub struct AuthService {
    registry: Arc<TypeRegistry>,
    credentials: Arc<dyn CredentialsRepository>,
    factories: AuthenticationMethodRegistry,
    callback_url_base: String,
    methods: RwLock<HashMap<String, Arc<dyn AuthenticationMethod>>>,
}

impl AuthService {
    pub fn new(
        registry: Arc<TypeRegistry>,
        credentials: Arc<dyn CredentialsRepository>,
        factories: AuthenticationMethodRegistry,
        callback_url_base: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            credentials,
            factories,
            callback_url_base: callback_url_base.into().trim_end_matches('/').to_string(),
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Instantiate the authentication method of every type that declares one.
    ///
    /// An unknown method name or undecodable settings is a configuration error.
    pub async fn load(&self) -> Result<()> {
        let listener: Arc<dyn TokenRefreshListener> =
            Arc::new(CredentialRefreshWriter::new(Arc::clone(&self.credentials)));

        let mut methods = HashMap::new();
        for definition in self.registry.get_integration_types() {
            let Some(authentication) = &definition.authentication else {
                continue;
            };

            let factory = self.factories.get(&authentication.method).ok_or_else(|| {
                ConduitError::Config(format!(
                    "integration type `{}` uses unknown authentication method `{}`",
                    definition.integration_type, authentication.method
                ))
            })?;

            let redirect_url = self.callback_url(&definition.integration_type);
            let method = factory.create(&authentication.settings, &redirect_url, Arc::clone(&listener))?;
            methods.insert(definition.integration_type.clone(), method);
        }

        info!(count = methods.len(), "Authentication methods loaded");
        *self.methods.write() = methods;
        Ok(())
    }

    fn callback_url(&self, integration_type: &str) -> String {
        format!("{}{CALLBACK_PATH_PREFIX}/{integration_type}{CALLBACK_PATH_SUFFIX}", self.callback_url_base)
    }

    pub fn get_authentication_method(&self, integration_type: &str) -> Option<Arc<dyn AuthenticationMethod>> {
        self.methods.read().get(integration_type).cloned()
    }

    fn require_method(&self, integration_type: &str) -> Result<Arc<dyn AuthenticationMethod>> {
        self.get_authentication_method(integration_type).ok_or_else(|| {
            ConduitError::NotFound(format!("no authentication method for integration type `{integration_type}`"))
        })
    }

    /// Start an authorization flow for `user_id`.
    pub fn redirect_url(&self, integration_type: &str, user_id: &str) -> Result<String> {
        self.require_method(integration_type)?.generate_redirect_url(user_id)
    }

    /// Complete an authorization flow and upsert the user's credentials.
    pub async fn on_callback(&self, integration_type: &str, code: &str, state: &str) -> Result<()> {
        let method = self.require_method(integration_type)?;
        let grant = method.handle_callback(code, state).await?;

        let existing = self.credentials.find_by_user_and_type(&grant.user_id, integration_type).await?;
        match existing {
            Some(mut credentials) => {
                credentials.access_token = grant.access_token;
                credentials.refresh_token = grant.refresh_token;
                credentials.expiry = grant.expiry;
                self.credentials.update(credentials).await?;
            }
            None => {
                self.credentials
                    .insert(IntegrationCredentials {
                        id: Uuid::new_v4().to_string(),
                        user_id: grant.user_id.clone(),
                        integration_type: integration_type.to_string(),
                        access_token: grant.access_token,
                        refresh_token: grant.refresh_token,
                        expiry: grant.expiry,
                    })
                    .await?;
            }
        }

        info!(user_id = %grant.user_id, integration_type, "Integration authenticated");
        Ok(())
    }

    /// Authenticated client for `credentials`, or `None` if the type has no
    /// authentication method.
    pub fn create_client(&self, credentials: &IntegrationCredentials) -> Result<Option<Arc<dyn HttpFetcher>>> {
        self.get_authentication_method(&credentials.integration_type)
            .map(|method| method.create_client(credentials))
            .transpose()
    }

    /// Whether `user_id` can fetch data of `integration_type`.
    ///
    /// Types without authentication are always usable, unknown types never.
    pub async fn is_integration_type_authenticated(&self, user_id: &str, integration_type: &str) -> Result<bool> {
        let Some(definition) = self.registry.get_integration_type(integration_type) else {
            return Ok(false);
        };
        if definition.authentication.is_none() {
            return Ok(true);
        }

        Ok(self.credentials.find_by_user_and_type(user_id, integration_type).await?.is_some())
    }

    pub async fn get_credentials_by_user_id(&self, user_id: &str) -> Result<Vec<IntegrationCredentials>> {
        self.credentials.find_by_user(user_id).await
    }

    pub async fn get_credentials_by_user_id_and_type(
        &self,
        user_id: &str,
        integration_type: &str,
    ) -> Result<Option<IntegrationCredentials>> {
        self.credentials.find_by_user_and_type(user_id, integration_type).await
    }

    pub async fn delete_credentials(&self, user_id: &str, integration_type: &str) -> Result<bool> {
        self.credentials.delete_by_user_and_type(user_id, integration_type).await
    }

    pub async fn on_user_deleted(&self, user_id: &str) -> Result<()> {
        let removed = self.credentials.delete_by_user(user_id).await?;
        debug!(user_id, removed, "Deleted credentials of removed user");
        Ok(())
    }
}
