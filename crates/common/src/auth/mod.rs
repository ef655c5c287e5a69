//! OAuth 2.0 building blocks
//!
//! - `pkce`: RFC 7636 verifier/challenge/state generation
//! - `types`: token set and token endpoint response

pub mod pkce;
pub mod types;

pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state, PKCEChallenge};
pub use types::{TokenResponse, TokenSet};
