use serde::Deserialize;

use crate::claims::{IdToken, IdTokenValidator, ValidatorParams};
use crate::client::RelyingParty;
use crate::discovery::ProviderMetadata;
use crate::error::{Error, OAuthErrorResponse};
use crate::session::{SessionService, SessionStore};

/// Tokens issued for one authorization code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub id_token: IdToken,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    id_token: String,
}

/// Parameters the provider appended to the redirect URI.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct AuthorizationResponse {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

impl AuthorizationResponse {
    pub(crate) fn parse(query_string: &str) -> Self {
        let query = query_string.strip_prefix('?').unwrap_or(query_string);
        let mut response = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut response.code,
                "state" => &mut response.state,
                "error" => &mut response.error,
                "error_description" => &mut response.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        response
    }
}

impl TokenSet {
    /// Decode the ID token of a successful token response. Nothing is
    /// validated yet.
    pub(crate) fn from_response(tokens: TokenResponse) -> Result<Self, Error> {
        let id_token = IdToken::decode(&tokens.id_token)?;
        Ok(Self {
            access_token: tokens.access_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            refresh_token: tokens.refresh_token,
            scope: tokens.scope,
            id_token,
        })
    }
}

/// Token endpoint body: either a token set or an OAuth2 error object.
fn parse_token_response(body: &str) -> Result<TokenResponse, Error> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("error").is_some() {
        return Err(Error::TokenEndpoint(serde_json::from_value(value)?));
    }
    Ok(serde_json::from_value(value)?)
}

impl RelyingParty {
    /// Exchange the authorization code in the callback query for tokens.
    ///
    /// The callback `state` is checked against the session and the stored
    /// correlation values are consumed before the token endpoint is
    /// contacted. The client authenticates with HTTP Basic; `client_id` is
    /// not repeated in the form body.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::StateMismatch`](crate::error::AuthorizationError::StateMismatch)
    ///   if the state is missing, expired or not the stored one
    /// - [`Error::TokenEndpoint`] if the provider redirected with an error
    ///   or the token endpoint answered with an OAuth2 error object; the
    ///   session is cleared (for a redirected error only when it carries the
    ///   stored state)
    /// - [`Error::TokenValidation`] if the ID token fails validation
    /// - [`Error::Http`] on network failure
    pub async fn request_token<S: SessionStore>(
        &self,
        session: &SessionService<'_, S>,
        provider: &ProviderMetadata,
        query_string: &str,
    ) -> Result<TokenSet, Error> {
        let callback = AuthorizationResponse::parse(query_string);

        if let Some(error) = callback.error {
            tracing::warn!(session_id = %session.id(), %error, "authorization denied by provider");
            if callback
                .state
                .as_deref()
                .is_some_and(|incoming| session.state_matches(incoming))
            {
                session.clear();
            }
            return Err(Error::TokenEndpoint(OAuthErrorResponse {
                error,
                error_description: callback.error_description,
                error_uri: None,
            }));
        }

        let incoming_state = callback.state.as_deref().unwrap_or_default();
        let correlation = session.consume_state(incoming_state, self.config.state_ttl)?;
        let code = callback.code.ok_or(Error::MissingParameter("code"))?;
        let code_verifier = correlation
            .code_verifier
            .ok_or(Error::MissingParameter("code_verifier"))?;

        let credentials = &self.config.credentials;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("code_verifier", code_verifier.as_str()),
        ];

        let response = self
            .post_token_request(
                provider,
                &credentials.client_id,
                &credentials.client_secret,
                &form,
            )
            .await;
        let tokens = match response {
            Ok(tokens) => TokenSet::from_response(tokens)?,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), "session cleared after token endpoint failure");
                session.clear();
                return Err(e);
            }
        };

        let params = ValidatorParams {
            nonce: correlation.nonce,
            acr_values: correlation.acr_values,
            context: correlation.context,
        };
        IdTokenValidator::new(&provider.issuer, &credentials.client_id, params)
            .validate(&tokens.id_token, Some(&tokens.access_token))
            .inspect_err(|e| {
                tracing::warn!(session_id = %session.id(), error = %e, "ID token rejected");
            })?;

        tracing::info!(
            session_id = %session.id(),
            mccmnc = correlation.mccmnc.as_ref().map_or("-", |m| m.as_str()),
            sub = %tokens.id_token.claims().sub,
            acr = tokens.id_token.claims().acr.as_deref().unwrap_or("-"),
            "token exchange complete"
        );

        Ok(tokens)
    }

    /// POST an authorization-code grant with HTTP Basic client
    /// authentication. `form` must not carry `client_id`.
    pub(crate) async fn post_token_request(
        &self,
        provider: &ProviderMetadata,
        client_id: &str,
        client_secret: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(provider.token_endpoint.clone())
            .basic_auth(client_id, Some(client_secret))
            .timeout(self.config.http_timeout)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        parse_token_response(&body).inspect_err(|e| {
            tracing::warn!(status = status.as_u16(), error = %e, "token exchange failed");
        })
    }
}
