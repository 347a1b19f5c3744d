use crate::config::ClientConfig;
use crate::error::Error;

/// Relying-party client for carrier-discovered OpenID providers.
///
/// Holds the static configuration and one pooled HTTP client. The flow
/// operations live next to the component they belong to:
///
/// - [`carrier_discovery_redirect`](Self::carrier_discovery_redirect) and
///   [`get_auth_code_request_url`](Self::get_auth_code_request_url) in `authorize`
/// - [`discover_oidc_provider_metadata`](Self::discover_oidc_provider_metadata) in `discovery`
/// - [`request_token`](Self::request_token) in `token`
/// - [`exchange_code`](Self::exchange_code) in `exchange`
/// - [`get_userinfo`](Self::get_userinfo) in `userinfo`
pub struct RelyingParty {
    pub(crate) config: ClientConfig,
    pub(crate) http: reqwest::Client,
}

impl RelyingParty {
    /// Create a client whose outbound requests are bounded by the configured
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built (TLS
    /// backend initialisation).
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
