//! Authentication method adapters

pub mod oauth;

pub use oauth::{OAuthAuthenticationFactory, OAuthAuthenticationMethod, OAuthClientError, OAuthHttpFetcher, OAuthSettings};
