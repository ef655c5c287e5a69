//! Integration authentication
//!
//! Strategies are looked up by method name; the service owns the credential
//! lifecycle around them.

pub mod ports;
pub mod service;

pub use ports::{
    AuthenticationMethod, AuthenticationMethodFactory, AuthenticationMethodRegistry, AuthorizationGrant,
    CredentialsRepository, TokenRefresh, TokenRefreshListener,
};
pub use service::{AuthService, CredentialRefreshWriter};
