use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::RelyingParty;
use crate::error::{DiscoveryError, Error};
use crate::types::Mccmnc;

/// Issuer configuration of the carrier's OpenID provider.
///
/// Fetched fresh for every flow; nothing is cached across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    #[serde(default)]
    pub jwks_uri: Option<Url>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub acr_values_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Parse a discovery document.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::EmptyResponse`] for an empty body or `{}`,
    /// [`DiscoveryError::MissingIssuer`] when `issuer` is absent or null,
    /// [`DiscoveryError::Malformed`] for anything else that does not fit.
    pub fn from_json(body: &str) -> Result<Self, DiscoveryError> {
        if body.trim().is_empty() {
            return Err(DiscoveryError::EmptyResponse);
        }
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| DiscoveryError::Malformed("expected a JSON object".into()))?;
        if object.is_empty() {
            return Err(DiscoveryError::EmptyResponse);
        }
        match object.get("issuer") {
            None | Some(serde_json::Value::Null) => return Err(DiscoveryError::MissingIssuer),
            Some(_) => {}
        }

        serde_json::from_value(value).map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }
}

impl RelyingParty {
    /// Resolve the provider configuration for a carrier.
    ///
    /// Sends `GET <provider_config_url>?client_id=..&mccmnc=..`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the document is empty or lacks an
    /// issuer, or [`Error::Http`] on network failure.
    pub async fn discover_oidc_provider_metadata(
        &self,
        mccmnc: &Mccmnc,
    ) -> Result<ProviderMetadata, Error> {
        self.discover_for_client(&self.config.credentials.client_id, mccmnc)
            .await
    }

    /// Provider discovery on behalf of `client_id`, which need not be the
    /// configured client.
    pub(crate) async fn discover_for_client(
        &self,
        client_id: &str,
        mccmnc: &Mccmnc,
    ) -> Result<ProviderMetadata, Error> {
        let mut url = self.config.provider_config_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("mccmnc", mccmnc.as_str());

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let metadata = ProviderMetadata::from_json(&body).inspect_err(|e| {
            tracing::warn!(%mccmnc, status = status.as_u16(), error = %e, "provider discovery failed");
        })?;

        tracing::debug!(%mccmnc, issuer = %metadata.issuer, "provider discovered");
        Ok(metadata)
    }
}
