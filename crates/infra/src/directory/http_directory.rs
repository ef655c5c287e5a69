//! [`UserDirectory`] backed by the user service's JSON endpoints.
//!
//! - `GET {base}/users/{id}/timezone` returns `{"timezone": "Europe/Amsterdam"}`
//! - `POST {base}/users/timezones` with `{"userIds": [...]}` returns
//!   `{"timezones": {"<id>": "<zone>"}}`; unknown users are left out

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::UserDirectory;
use conduit_domain::{ConduitError, Result, UserDirectoryConfig};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::InfraError;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct TimeZoneResponse {
    timezone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeZonesRequest<'a> {
    user_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TimeZonesResponse {
    #[serde(default)]
    timezones: HashMap<String, String>,
}

pub struct HttpUserDirectory {
    http: HttpClient,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn from_config(config: &UserDirectoryConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_seconds))
    }

    pub fn with_client(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = response.error_for_status().map_err(|e| ConduitError::from(InfraError::from(e)))?;
        response.json::<T>().await.map_err(|e| ConduitError::from(InfraError::from(e)))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user_time_zone(&self, user_id: &str) -> Result<String> {
        let url = format!("{}/users/{}/timezone", self.base_url, urlencode(user_id));
        let response = self.http.send(self.http.request(Method::GET, url)).await?;
        let body: TimeZoneResponse = Self::decode(response).await?;
        Ok(body.timezone)
    }

    async fn get_users_time_zones(&self, user_ids: &[String]) -> Result<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/users/timezones", self.base_url);
        let request = self.http.request(Method::POST, url).json(&TimeZonesRequest { user_ids });
        let response = self.http.send(request).await?;
        let body: TimeZonesResponse = Self::decode(response).await?;

        debug!(requested = user_ids.len(), resolved = body.timezones.len(), "resolved user time zones");
        Ok(body.timezones)
    }
}

fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}
