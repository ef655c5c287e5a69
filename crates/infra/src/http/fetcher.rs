//! [`HttpFetcher`] over the shared [`HttpClient`].

use async_trait::async_trait;
use conduit_core::{FetchFailure, FetchResponse, HttpFetcher};
use reqwest::{Method, RequestBuilder};
use tracing::debug;

use super::client::HttpClient;

/// Unauthenticated fetcher used for public integration types.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: HttpClient,
}

impl ReqwestFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchFailure> {
        execute(&self.client, self.client.request(Method::GET, url)).await
    }
}

/// Send `request` and buffer the whole body.
///
/// Any status is a response; only failures to get one are errors.
pub(crate) async fn execute(client: &HttpClient, request: RequestBuilder) -> Result<FetchResponse, FetchFailure> {
    let response = client.send(request).await.map_err(|e| FetchFailure::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| FetchFailure::Transport(e.to_string()))?.to_vec();
    debug!(status, bytes = body.len(), "fetched");
    Ok(FetchResponse { status, body })
}
