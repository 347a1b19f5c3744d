use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// PKCE challenge method sent with every authorization request.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// A PKCE verifier and its derived S256 challenge (RFC 7636).
///
/// The verifier stays in the session; only the challenge goes to the
/// provider.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier (64 URL-safe chars) and its challenge.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_token::<48>();
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Anti-forgery `state` value (16 random bytes, base64url).
#[must_use]
pub fn generate_state() -> String {
    random_token::<16>()
}

/// ID-token `nonce` value (32 random bytes, base64url).
#[must_use]
pub fn generate_nonce() -> String {
    random_token::<32>()
}

fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
