//! Sign-in completed by a native or single-page client.
//!
//! The client runs carrier discovery and the authorization request itself
//! and posts the resulting code to the backend. No session is involved: the
//! caller hands over everything the token request and the ID-token checks
//! need, and the backend only adds the client secret from its
//! [`AllowedClients`] list.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::claims::{IdTokenValidator, ValidatorParams};
use crate::client::RelyingParty;
use crate::error::{ConfigurationError, Error};
use crate::token::TokenSet;
use crate::types::Mccmnc;
use crate::userinfo::UserClaims;

/// Client ids this backend may exchange codes for, with their secrets.
#[derive(Clone, Default)]
pub struct AllowedClients {
    clients: HashMap<String, String>,
}

impl AllowedClients {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.clients.insert(client_id.into(), secret.into());
        self
    }

    /// Read `ALLOWED_CLIENTS` (`id:secret,other_id:other_secret`). An unset
    /// variable yields an empty list.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Invalid`] if an entry is not `id:secret`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        std::env::var("ALLOWED_CLIENTS")
            .map_or_else(|_| Ok(Self::new()), |list| list.parse())
    }

    /// Secret registered for `client_id`.
    ///
    /// # Errors
    ///
    /// [`Error::ClientNotAllowed`] for an unknown client id.
    pub fn secret_for(&self, client_id: &str) -> Result<&str, Error> {
        self.clients
            .get(client_id)
            .map(String::as_str)
            .ok_or_else(|| Error::ClientNotAllowed(client_id.to_owned()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl FromStr for AllowedClients {
    type Err = ConfigurationError;

    fn from_str(list: &str) -> Result<Self, Self::Err> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .try_fold(Self::new(), |clients, entry| match entry.split_once(':') {
                Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
                    Ok(clients.with_client(id, secret))
                }
                _ => Err(ConfigurationError::Invalid(format!(
                    "ALLOWED_CLIENTS entry `{}` is not id:secret",
                    entry.split(':').next().unwrap_or_default()
                ))),
            })
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AllowedClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("AllowedClients").field("client_ids", &ids).finish()
    }
}

/// Everything a client-initiated sign-in needs from the caller.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CodeExchange {
    pub client_id: String,
    pub code: String,
    pub redirect_uri: Url,
    pub mccmnc: Mccmnc,
    /// Sent to the token endpoint when present.
    pub code_verifier: Option<String>,
    pub correlation_id: Option<String>,
    pub sdk_version: Option<String>,
    /// Values the client used in its authorization request.
    pub validator: ValidatorParams,
}

impl CodeExchange {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        code: impl Into<String>,
        redirect_uri: Url,
        mccmnc: Mccmnc,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            code: code.into(),
            redirect_uri,
            mccmnc,
            code_verifier: None,
            correlation_id: None,
            sdk_version: None,
            validator: ValidatorParams::default(),
        }
    }

    #[must_use]
    pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_validator_params(mut self, params: ValidatorParams) -> Self {
        self.validator = params;
        self
    }

    fn token_form(&self) -> Vec<(&str, &str)> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", self.code.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let optional = [
            ("code_verifier", &self.code_verifier),
            ("correlation_id", &self.correlation_id),
            ("sdk_version", &self.sdk_version),
        ];
        form.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.as_deref().map(|v| (key, v))),
        );
        form
    }
}

/// Result of a client-initiated sign-in.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientSignIn {
    pub tokens: TokenSet,
    pub user: UserClaims,
}

impl RelyingParty {
    /// Exchange a code obtained by a client application and fetch the
    /// user's claims.
    ///
    /// Runs provider discovery for `request.mccmnc`, the token request with
    /// the allowed client's credentials, the ID-token checks against
    /// `request.validator`, and finally the user-info request.
    ///
    /// # Errors
    ///
    /// - [`Error::ClientNotAllowed`] before any request if the client id is
    ///   not in `allowed`
    /// - [`Error::Discovery`], [`Error::TokenEndpoint`],
    ///   [`Error::TokenValidation`] or [`Error::UserInfo`] from the
    ///   corresponding leg
    pub async fn exchange_code(
        &self,
        allowed: &AllowedClients,
        request: CodeExchange,
    ) -> Result<ClientSignIn, Error> {
        let client_secret = allowed.secret_for(&request.client_id)?;
        let provider = self
            .discover_for_client(&request.client_id, &request.mccmnc)
            .await?;

        let response = self
            .post_token_request(
                &provider,
                &request.client_id,
                client_secret,
                &request.token_form(),
            )
            .await?;
        let tokens = TokenSet::from_response(response)?;

        IdTokenValidator::new(&provider.issuer, &request.client_id, request.validator.clone())
            .validate(&tokens.id_token, Some(&tokens.access_token))
            .inspect_err(|e| {
                tracing::warn!(client_id = %request.client_id, error = %e, "ID token rejected");
            })?;

        let user = self.get_userinfo(&provider, &tokens.access_token).await?;

        tracing::info!(
            client_id = %request.client_id,
            mccmnc = %request.mccmnc,
            correlation_id = request.correlation_id.as_deref().unwrap_or("-"),
            sub = %user.sub,
            "client-initiated sign-in complete"
        );

        Ok(ClientSignIn { tokens, user })
    }
}
