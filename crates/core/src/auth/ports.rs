//! Port interfaces for integration authentication

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_domain::{IntegrationCredentials, Result};
use serde_json::{Map, Value};

use crate::fetch::ports::HttpFetcher;

/// Storage of OAuth credentials, one record per `(user, integration type)`.
#[async_trait]
pub trait CredentialsRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<IntegrationCredentials>>;

    async fn find_by_user_and_type(
        &self,
        user_id: &str,
        integration_type: &str,
    ) -> Result<Option<IntegrationCredentials>>;

    /// Lookup used when persisting a refreshed token; the stale access token is
    /// the only correlation id available at that point.
    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<IntegrationCredentials>>;

    async fn insert(&self, credentials: IntegrationCredentials) -> Result<()>;

    /// Replace an existing record; returns `false` if `credentials.id` is unknown.
    async fn update(&self, credentials: IntegrationCredentials) -> Result<bool>;

    async fn delete_by_user_and_type(&self, user_id: &str, integration_type: &str) -> Result<bool>;

    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;
}

/// Tokens obtained by completing an authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds; `0` when the provider sent no expiry.
    pub expiry: i64,
}

/// A token refresh performed by an authenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRefresh {
    pub old_access_token: String,
    pub new_access_token: String,
    pub new_refresh_token: String,
    pub new_expiry: i64,
}

/// Notified once per upstream refresh so the new tokens can be stored.
#[async_trait]
pub trait TokenRefreshListener: Send + Sync {
    async fn on_token_refreshed(&self, refresh: TokenRefresh) -> Result<()>;
}

/// One configured authentication strategy for one integration type.
#[async_trait]
pub trait AuthenticationMethod: Send + Sync {
    /// Authorization URL for `user_id`; remembers the pending state.
    fn generate_redirect_url(&self, user_id: &str) -> Result<String>;

    /// Exchange an authorization code for tokens.
    async fn handle_callback(&self, code: &str, state: &str) -> Result<AuthorizationGrant>;

    /// HTTP client that authenticates with, and refreshes, `credentials`.
    fn create_client(&self, credentials: &IntegrationCredentials) -> Result<Arc<dyn HttpFetcher>>;
}

/// Builds an [`AuthenticationMethod`] from a type definition's settings.
pub trait AuthenticationMethodFactory: Send + Sync {
    fn create(
        &self,
        settings: &Map<String, Value>,
        redirect_url: &str,
        listener: Arc<dyn TokenRefreshListener>,
    ) -> Result<Arc<dyn AuthenticationMethod>>;
}

/// Strategy factories keyed by method name (`"oauth"`, ...).
#[derive(Clone, Default)]
pub struct AuthenticationMethodRegistry {
    factories: HashMap<String, Arc<dyn AuthenticationMethodFactory>>,
}

impl AuthenticationMethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: impl Into<String>, factory: impl AuthenticationMethodFactory + 'static) {
        self.factories.insert(method.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn get(&self, method: &str) -> Option<&Arc<dyn AuthenticationMethodFactory>> {
        self.factories.get(method)
    }
}
