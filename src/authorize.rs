use url::Url;

use crate::client::RelyingParty;
use crate::discovery::ProviderMetadata;
use crate::error::Error;
use crate::pkce::{self, CODE_CHALLENGE_METHOD, PkcePair};
use crate::session::{AuthorizationRecord, SessionService, SessionStore};
use crate::types::Mccmnc;

/// What the provider authorization request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequestOptions {
    /// Sign-in with the full profile scope set.
    Login,
    /// Step-up approval of one action: `openid` only, strong ACR, and a
    /// human-readable context shown to the user by the carrier.
    StepUp { context: String },
}

impl RelyingParty {
    /// Send the user to carrier discovery to learn their MCCMNC.
    ///
    /// A fresh state is stored in the session; carrier discovery echoes it
    /// back to the redirect URI together with the `mccmnc`.
    pub fn carrier_discovery_redirect<S: SessionStore>(&self, session: &SessionService<'_, S>) -> Url {
        let state = pkce::generate_state();
        session.set_state(state.clone());

        let mut url = self.config.carrier_discovery_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.credentials.client_id)
            .append_pair("redirect_uri", self.config.credentials.redirect_uri.as_str())
            .append_pair("state", &state);

        tracing::debug!(session_id = %session.id(), "redirecting to carrier discovery");
        url
    }

    /// Build the provider authorization URL after carrier discovery returned.
    ///
    /// `incoming_state` must match the state stored by
    /// [`carrier_discovery_redirect`](Self::carrier_discovery_redirect).
    /// A new state, nonce and PKCE verifier replace the consumed values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::StateMismatch`](crate::error::AuthorizationError::StateMismatch)
    /// if the incoming state is not the stored one.
    pub fn get_auth_code_request_url<S: SessionStore>(
        &self,
        session: &SessionService<'_, S>,
        provider: &ProviderMetadata,
        login_hint_token: Option<&str>,
        incoming_state: &str,
        mccmnc: &Mccmnc,
        options: &AuthRequestOptions,
    ) -> Result<Url, Error> {
        session.consume_state(incoming_state, self.config.state_ttl)?;

        let pkce = PkcePair::generate();
        let state = pkce::generate_state();
        let nonce = pkce::generate_nonce();

        let (scope, acr_values, context) = match options {
            AuthRequestOptions::Login => (self.config.login_scopes.join(" "), None, None),
            AuthRequestOptions::StepUp { context } => (
                "openid".to_string(),
                Some(self.config.step_up_acr.clone()),
                Some(context.clone()),
            ),
        };

        let mut url = provider.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.credentials.client_id)
                .append_pair("response_type", "code")
                .append_pair("scope", &scope)
                .append_pair("redirect_uri", self.config.credentials.redirect_uri.as_str())
                .append_pair("state", &state)
                .append_pair("nonce", &nonce)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
            if let Some(hint) = login_hint_token {
                query.append_pair("login_hint_token", hint);
            }
            if let Some(context) = &context {
                query.append_pair("context", context);
            }
            if let Some(acr) = &acr_values {
                query.append_pair("acr_values", acr);
            }
        }

        session.record_authorization(AuthorizationRecord {
            state,
            nonce,
            mccmnc: mccmnc.clone(),
            code_verifier: pkce.verifier,
            acr_values,
            context,
        });

        tracing::debug!(
            session_id = %session.id(),
            %mccmnc,
            step_up = matches!(options, AuthRequestOptions::StepUp { .. }),
            "redirecting to provider authorization"
        );
        Ok(url)
    }
}
