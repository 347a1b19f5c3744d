//! ID-token decoding and claim checks.
//!
//! The token is received straight from the token endpoint over TLS, so the
//! signature is not re-verified here (OIDC Core §3.1.3.7). What is checked
//! is that the token answers the request this session actually made.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};
use time::OffsetDateTime;

use crate::error::TokenValidationError;
use crate::types::Subject;

const EXP_LEEWAY_SECS: i64 = 60;

/// Claims carried by the provider's ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: Subject,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub acr: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub at_hash: Option<String>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// A decoded (not signature-verified) ID token.
#[derive(Debug, Clone)]
pub struct IdToken {
    raw: String,
    alg: Option<String>,
    claims: IdTokenClaims,
}

#[derive(Deserialize)]
struct JoseHeader {
    #[serde(default)]
    alg: Option<String>,
}

impl IdToken {
    /// Decode the compact JWS serialization `header.payload.signature`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenValidationError::Malformed`] if the token does not have
    /// three segments or the header/payload are not base64url JSON.
    pub fn decode(raw: &str) -> Result<Self, TokenValidationError> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenValidationError::Malformed(
                "expected three dot-separated segments".into(),
            ));
        }

        let header: JoseHeader = decode_segment(parts[0], "header")?;
        let claims: IdTokenClaims = decode_segment(parts[1], "payload")?;

        Ok(Self {
            raw: raw.to_owned(),
            alg: header.alg,
            claims,
        })
    }

    #[must_use]
    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `at_hash` check: left half of the access-token digest, base64url.
    /// The digest width follows the token's `alg` (RS256 -> SHA-256, ...).
    fn at_hash_matches(&self, access_token: &str, expected: &str) -> bool {
        let bits = self
            .alg
            .as_deref()
            .filter(|alg| *alg != "none" && alg.is_ascii() && alg.len() >= 5)
            .map_or("256", |alg| &alg[2..5]);
        let digest: Vec<u8> = match bits {
            "384" => Sha384::digest(access_token.as_bytes()).to_vec(),
            "512" => Sha512::digest(access_token.as_bytes()).to_vec(),
            _ => Sha256::digest(access_token.as_bytes()).to_vec(),
        };
        URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]) == expected
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
    what: &str,
) -> Result<T, TokenValidationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenValidationError::Malformed(format!("{what}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenValidationError::Malformed(format!("{what}: {e}")))
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}

/// Values recorded when the authorization request was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorParams {
    pub nonce: Option<String>,
    /// Space-separated ACR values that were requested.
    pub acr_values: Option<String>,
    pub context: Option<String>,
}

/// Check `nonce`, `context` and `acr` against the request.
///
/// Only one failure is reported per call; the nonce is checked first, then
/// the context, then the ACR.
///
/// # Errors
///
/// [`TokenValidationError::NonceMismatch`], [`TokenValidationError::ContextMismatch`]
/// or [`TokenValidationError::AcrMismatch`].
pub fn validate_id_token(
    claims: &IdTokenClaims,
    params: &ValidatorParams,
) -> Result<(), TokenValidationError> {
    if let Some(nonce) = params.nonce.as_deref().filter(|n| !n.is_empty())
        && claims.nonce.as_deref() != Some(nonce)
    {
        return Err(TokenValidationError::NonceMismatch);
    }

    if let (Some(expected), Some(actual)) = (params.context.as_deref(), claims.context.as_deref())
        && !expected.is_empty()
        && actual != expected
    {
        return Err(TokenValidationError::ContextMismatch);
    }

    if let (Some(requested), Some(acr)) = (params.acr_values.as_deref(), claims.acr.as_deref())
        && !requested.is_empty()
        && !requested.split_whitespace().any(|v| v == acr)
    {
        return Err(TokenValidationError::AcrMismatch);
    }

    Ok(())
}

/// Full ID-token check for one token response.
#[derive(Debug, Clone)]
pub struct IdTokenValidator<'a> {
    issuer: &'a str,
    client_id: &'a str,
    params: ValidatorParams,
    now: OffsetDateTime,
}

impl<'a> IdTokenValidator<'a> {
    #[must_use]
    pub fn new(issuer: &'a str, client_id: &'a str, params: ValidatorParams) -> Self {
        Self {
            issuer,
            client_id,
            params,
            now: OffsetDateTime::now_utc(),
        }
    }

    /// Evaluate expiry against a fixed instant instead of the current time.
    #[must_use]
    pub fn at(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }

    /// Request-bound checks first, then issuer, audience, expiry and
    /// `at_hash` (when both the claim and an access token are present).
    ///
    /// # Errors
    ///
    /// The first failing [`TokenValidationError`].
    pub fn validate(
        &self,
        token: &IdToken,
        access_token: Option<&str>,
    ) -> Result<(), TokenValidationError> {
        let claims = token.claims();
        validate_id_token(claims, &self.params)?;

        if claims.iss != self.issuer {
            return Err(TokenValidationError::IssuerMismatch);
        }
        if !claims.aud.iter().any(|aud| aud == self.client_id) {
            return Err(TokenValidationError::AudienceMismatch);
        }
        if claims.exp.saturating_add(EXP_LEEWAY_SECS) < self.now.unix_timestamp() {
            return Err(TokenValidationError::Expired);
        }
        if let (Some(expected), Some(access_token)) = (claims.at_hash.as_deref(), access_token)
            && !token.at_hash_matches(access_token, expected)
        {
            return Err(TokenValidationError::AtHashMismatch);
        }

        Ok(())
    }
}
