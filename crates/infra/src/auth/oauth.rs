//! OAuth 2.0 authorization-code strategy.
//!
//! The redirect URL carries a random state that maps back to the user (and
//! PKCE verifier, when enabled) for a limited time. Clients created from
//! stored credentials refresh expired tokens on demand; concurrent refreshes
//! of the same access token collapse into one token-endpoint call, and only
//! the call that actually refreshed notifies the [`TokenRefreshListener`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conduit_common::auth::{generate_state, PKCEChallenge, TokenResponse, TokenSet};
use conduit_common::SingleFlight;
use conduit_core::{
    AuthenticationMethod, AuthenticationMethodFactory, AuthorizationGrant, FetchFailure, FetchResponse, HttpFetcher,
    TokenRefresh, TokenRefreshListener,
};
use conduit_domain::constants::PENDING_AUTHORIZATION_TTL_SECS;
use conduit_domain::{ConduitError, IntegrationCredentials, Result};
use moka::sync::Cache;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::fetcher::execute;
use crate::http::HttpClient;

/// Failures talking to an authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthClientError {
    #[error("token request failed: {0}")]
    Request(String),

    #[error("authorization server rejected the request: {error} {description}")]
    Provider { error: String, description: String },

    #[error("unreadable token response: {0}")]
    Parse(String),

    #[error("token expired and no refresh token is available")]
    NoRefreshToken,

    #[error("invalid state")]
    InvalidState,
}

impl From<OAuthClientError> for ConduitError {
    fn from(value: OAuthClientError) -> Self {
        ConduitError::Auth(value.to_string())
    }
}

/// Settings block of an `oauth` authentication descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSettings {
    #[serde(alias = "authorize_url")]
    pub authorize_url: String,
    #[serde(alias = "token_url")]
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(alias = "client_id")]
    pub client_id: String,
    #[serde(default, alias = "client_secret")]
    pub client_secret: String,
    #[serde(default)]
    pub pkce: bool,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token endpoint client shared by a method and the clients it creates.
struct TokenEndpoint {
    settings: OAuthSettings,
    redirect_url: String,
    http: HttpClient,
}

impl TokenEndpoint {
    async fn exchange_code(&self, code: &str, verifier: Option<&str>) -> std::result::Result<TokenSet, OAuthClientError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_url.clone()),
        ];
        if let Some(verifier) = verifier {
            form.push(("code_verifier", verifier.to_string()));
        }
        self.request_token(form).await
    }

    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenSet, OAuthClientError> {
        self.request_token(vec![("grant_type", "refresh_token".to_string()), ("refresh_token", refresh_token.to_string())])
            .await
    }

    async fn request_token(
        &self,
        mut form: Vec<(&'static str, String)>,
    ) -> std::result::Result<TokenSet, OAuthClientError> {
        form.push(("client_id", self.settings.client_id.clone()));
        if !self.settings.client_secret.is_empty() {
            form.push(("client_secret", self.settings.client_secret.clone()));
        }

        let request = self
            .http
            .request(Method::POST, &self.settings.token_url)
            .header(ACCEPT, "application/json")
            .form(&form);
        let response = self.http.send(request).await.map_err(|e| OAuthClientError::Request(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| OAuthClientError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ProviderErrorBody>(&body) {
                Ok(provider) => OAuthClientError::Provider {
                    error: provider.error,
                    description: provider.error_description.unwrap_or_default(),
                },
                Err(_) => OAuthClientError::Request(format!("token endpoint returned {status}")),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| OAuthClientError::Parse(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(OAuthClientError::Parse("server response missing access_token".into()));
        }
        Ok(token.into())
    }
}

#[derive(Clone)]
struct PendingAuthorization {
    user_id: String,
    verifier: Option<String>,
    issued_at: Instant,
}

/// Upper bound on states awaiting their callback.
const MAX_PENDING_AUTHORIZATIONS: u64 = 10_000;

type RefreshGroup = SingleFlight<String, std::result::Result<TokenSet, OAuthClientError>>;

/// OAuth 2.0 authorization-code flow for one integration type.
pub struct OAuthAuthenticationMethod {
    endpoint: Arc<TokenEndpoint>,
    pending: Cache<String, PendingAuthorization>,
    pending_ttl: Duration,
    refresh_group: Arc<RefreshGroup>,
    listener: Arc<dyn TokenRefreshListener>,
}

impl OAuthAuthenticationMethod {
    pub fn new(
        settings: OAuthSettings,
        redirect_url: impl Into<String>,
        http: HttpClient,
        listener: Arc<dyn TokenRefreshListener>,
    ) -> Self {
        Self {
            endpoint: Arc::new(TokenEndpoint { settings, redirect_url: redirect_url.into(), http }),
            pending: pending_cache(Duration::from_secs(PENDING_AUTHORIZATION_TTL_SECS)),
            pending_ttl: Duration::from_secs(PENDING_AUTHORIZATION_TTL_SECS),
            refresh_group: Arc::new(SingleFlight::new()),
            listener,
        }
    }

    /// Override how long an issued state stays redeemable.
    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending = pending_cache(ttl);
        self.pending_ttl = ttl;
        self
    }

    /// Number of issued states not yet redeemed or expired.
    pub fn pending_authorizations(&self) -> u64 {
        self.pending.run_pending_tasks();
        self.pending.entry_count()
    }

    /// Redeem a state. Removal makes it single-use.
    fn take_pending(&self, state: &str) -> std::result::Result<PendingAuthorization, OAuthClientError> {
        self.pending
            .remove(state)
            .filter(|authorization| authorization.issued_at.elapsed() < self.pending_ttl)
            .ok_or(OAuthClientError::InvalidState)
    }
}

fn pending_cache(ttl: Duration) -> Cache<String, PendingAuthorization> {
    Cache::builder().time_to_live(ttl).max_capacity(MAX_PENDING_AUTHORIZATIONS).build()
}

#[async_trait]
impl AuthenticationMethod for OAuthAuthenticationMethod {
    fn generate_redirect_url(&self, user_id: &str) -> Result<String> {
        let settings = &self.endpoint.settings;
        let state = generate_state();
        let challenge = settings.pkce.then(PKCEChallenge::generate);

        let mut params = vec![
            ("client_id", settings.client_id.clone()),
            ("redirect_uri", self.endpoint.redirect_url.clone()),
            ("response_type", "code".to_string()),
        ];
        if !settings.scopes.is_empty() {
            params.push(("scope", settings.scopes.join(" ")));
        }
        params.push(("state", state.clone()));
        params.push(("access_type", "offline".to_string()));
        if let Some(challenge) = &challenge {
            params.push(("code_challenge", challenge.code_challenge.clone()));
            params.push(("code_challenge_method", challenge.challenge_method().to_string()));
        }

        let url = Url::parse_with_params(&settings.authorize_url, &params)
            .map_err(|e| ConduitError::Config(format!("invalid authorize URL: {e}")))?;

        self.pending.insert(
            state,
            PendingAuthorization {
                user_id: user_id.to_string(),
                verifier: challenge.map(|c| c.code_verifier),
                issued_at: Instant::now(),
            },
        );

        Ok(url.into())
    }

    async fn handle_callback(&self, code: &str, state: &str) -> Result<AuthorizationGrant> {
        let pending = self.take_pending(state)?;
        let tokens = self.endpoint.exchange_code(code, pending.verifier.as_deref()).await?;

        debug!(user_id = %pending.user_id, "authorization code exchanged");
        Ok(AuthorizationGrant {
            user_id: pending.user_id,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
            expiry: tokens.expiry_millis(),
        })
    }

    fn create_client(&self, credentials: &IntegrationCredentials) -> Result<Arc<dyn HttpFetcher>> {
        let refresh_token = Some(credentials.refresh_token.clone()).filter(|token| !token.is_empty());
        let tokens = TokenSet::from_stored(credentials.access_token.clone(), refresh_token, credentials.expiry);

        Ok(Arc::new(OAuthHttpFetcher {
            endpoint: Arc::clone(&self.endpoint),
            current: tokio::sync::Mutex::new(tokens),
            refresh_group: Arc::clone(&self.refresh_group),
            listener: Arc::clone(&self.listener),
        }))
    }
}

/// HTTP client authenticated with one user's tokens.
pub struct OAuthHttpFetcher {
    endpoint: Arc<TokenEndpoint>,
    current: tokio::sync::Mutex<TokenSet>,
    refresh_group: Arc<RefreshGroup>,
    listener: Arc<dyn TokenRefreshListener>,
}

impl OAuthHttpFetcher {
    /// A valid token, refreshing it first if needed.
    async fn token(&self) -> std::result::Result<TokenSet, OAuthClientError> {
        let mut current = self.current.lock().await;
        if current.is_valid() {
            return Ok(current.clone());
        }

        let stale = current.clone();
        let endpoint = Arc::clone(&self.endpoint);
        let listener = Arc::clone(&self.listener);
        let refreshed = self
            .refresh_group
            .work(stale.access_token.clone(), move || refresh_tokens(endpoint, listener, stale))
            .await?;

        *current = refreshed.clone();
        Ok(refreshed)
    }
}

async fn refresh_tokens(
    endpoint: Arc<TokenEndpoint>,
    listener: Arc<dyn TokenRefreshListener>,
    stale: TokenSet,
) -> std::result::Result<TokenSet, OAuthClientError> {
    let refresh_token = stale.refresh_token.clone().ok_or(OAuthClientError::NoRefreshToken)?;
    let mut tokens = endpoint.refresh(&refresh_token).await?;
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh_token);
    }

    if tokens.access_token != stale.access_token {
        info!("access token refreshed");
        let refresh = TokenRefresh {
            old_access_token: stale.access_token,
            new_access_token: tokens.access_token.clone(),
            new_refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
            new_expiry: tokens.expiry_millis(),
        };
        if let Err(err) = listener.on_token_refreshed(refresh).await {
            warn!(error = %err, "failed to persist refreshed token");
        }
    }

    Ok(tokens)
}

#[async_trait]
impl HttpFetcher for OAuthHttpFetcher {
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchFailure> {
        let tokens = self.token().await.map_err(|e| FetchFailure::TokenRetrieval(e.to_string()))?;
        let http = &self.endpoint.http;
        execute(http, http.request(Method::GET, url).header(AUTHORIZATION, tokens.authorization_header())).await
    }
}

/// Builds [`OAuthAuthenticationMethod`]s from definition settings.
pub struct OAuthAuthenticationFactory {
    http: HttpClient,
}

impl OAuthAuthenticationFactory {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl AuthenticationMethodFactory for OAuthAuthenticationFactory {
    fn create(
        &self,
        settings: &Map<String, Value>,
        redirect_url: &str,
        listener: Arc<dyn TokenRefreshListener>,
    ) -> Result<Arc<dyn AuthenticationMethod>> {
        let settings: OAuthSettings = serde_json::from_value(Value::Object(settings.clone()))
            .map_err(|e| ConduitError::Config(format!("invalid oauth settings: {e}")))?;
        for (name, url) in [("authorizeUrl", &settings.authorize_url), ("tokenUrl", &settings.token_url)] {
            Url::parse(url).map_err(|e| ConduitError::Config(format!("invalid oauth {name} `{url}`: {e}")))?;
        }

        Ok(Arc::new(OAuthAuthenticationMethod::new(settings, redirect_url, self.http.clone(), listener)))
    }
}
