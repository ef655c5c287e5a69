//! PKCE (Proof Key for Code Exchange) helpers for OAuth 2.0
//!
//! Implements the S256 flavour of RFC 7636.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;

/// Random URL-safe verifier (32 bytes, 43 characters once encoded).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token()
}

/// `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random URL-safe CSRF token.
#[must_use]
pub fn generate_state() -> String {
    random_token()
}

fn random_token() -> String {
    let mut bytes = [0_u8; VERIFIER_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verifier/challenge pair for one authorization request.
///
/// The challenge goes out with the authorization URL; the verifier stays
/// server-side until the code is exchanged.
#[derive(Clone)]
pub struct PKCEChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PKCEChallenge {
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Always `"S256"`.
    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

impl std::fmt::Debug for PKCEChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PKCEChallenge")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}
