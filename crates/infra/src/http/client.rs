//! Outbound HTTP client shared by the fetcher, the OAuth token endpoint and
//! the user directory.
//!
//! Every request is a single attempt bounded by the configured timeout.
//! Failed pulls are retried by the scheduler, not here.

use std::time::Duration;

use conduit_domain::{ConduitError, HttpConfig};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over a pooled reqwest client.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Build a client from the `http` configuration section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, ConduitError> {
        Self::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send a request. Any HTTP status is returned as a response; only
    /// transport failures become errors.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ConduitError> {
        let request = builder.build().map_err(to_domain)?;
        let (method, url) = (request.method().clone(), request.url().clone());
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(to_domain(err))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, user_agent: None }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, ConduitError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(to_domain)?;
        Ok(HttpClient { client })
    }
}

fn to_domain(err: reqwest::Error) -> ConduitError {
    InfraError::from(err).into()
}
