use std::time::Duration;

use url::Url;

use crate::error::ConfigurationError;

const DEFAULT_LOGIN_SCOPES: [&str; 5] = ["openid", "name", "email", "phone", "postal_code"];
const DEFAULT_STEP_UP_ACR: &str = "a3";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Static client registration, read-only for the process lifetime.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientCredentials {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: Url,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

/// Relying-party configuration.
///
/// Required fields are constructor parameters; everything else has a default
/// that can be overridden by chaining `with_*` calls.
///
/// ```rust,ignore
/// use carrier_connect::{ClientConfig, ClientCredentials};
///
/// let credentials = ClientCredentials::new("id", "secret", "https://app.example/auth/cb".parse()?);
/// let config = ClientConfig::new(
///     credentials,
///     "https://discovery.example/v1/auth".parse()?,
///     "https://discovery.example/.well-known/openid_configuration".parse()?,
/// )
/// .with_http_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) credentials: ClientCredentials,
    pub(crate) carrier_discovery_url: Url,
    pub(crate) provider_config_url: Url,
    pub(crate) login_scopes: Vec<String>,
    pub(crate) step_up_acr: String,
    pub(crate) http_timeout: Duration,
    pub(crate) state_ttl: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(
        credentials: ClientCredentials,
        carrier_discovery_url: Url,
        provider_config_url: Url,
    ) -> Self {
        Self {
            credentials,
            carrier_discovery_url,
            provider_config_url,
            login_scopes: DEFAULT_LOGIN_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            step_up_acr: DEFAULT_STEP_UP_ACR.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            state_ttl: DEFAULT_STATE_TTL,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CLIENT_ID`, `CLIENT_SECRET`
    /// - `REDIRECT_URI`: callback URI (must be a valid URL)
    /// - `CARRIER_DISCOVERY_URL`: carrier discovery endpoint
    /// - `OIDC_PROVIDER_CONFIG_URL`: provider discovery endpoint
    ///
    /// # Optional env vars
    /// - `OIDC_SCOPES`: space-separated login scopes
    /// - `OIDC_HTTP_TIMEOUT_SECS`: timeout for every outbound request
    /// - `OIDC_STATE_TTL_SECS`: lifetime of stored state/nonce/verifier
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] if a required variable is
    /// missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from any key lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigurationError::Invalid(format!("{key} is required")))
        };
        let url = |key: &str| -> Result<Url, ConfigurationError> {
            required(key)?
                .parse()
                .map_err(|e| ConfigurationError::Invalid(format!("{key}: {e}")))
        };
        let seconds = |key: &str| -> Result<Option<Duration>, ConfigurationError> {
            lookup(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|e| ConfigurationError::Invalid(format!("{key}: {e}")))
                })
                .transpose()
        };

        let credentials = ClientCredentials::new(
            required("CLIENT_ID")?,
            required("CLIENT_SECRET")?,
            url("REDIRECT_URI")?,
        );
        let mut config = Self::new(
            credentials,
            url("CARRIER_DISCOVERY_URL")?,
            url("OIDC_PROVIDER_CONFIG_URL")?,
        );

        if let Some(scopes) = lookup("OIDC_SCOPES") {
            config = config.with_login_scopes(scopes.split_whitespace().map(String::from).collect());
        }
        if let Some(timeout) = seconds("OIDC_HTTP_TIMEOUT_SECS")? {
            config = config.with_http_timeout(timeout);
        }
        if let Some(ttl) = seconds("OIDC_STATE_TTL_SECS")? {
            config = config.with_state_ttl(ttl);
        }

        Ok(config)
    }

    /// Scopes requested for a regular login (default: `openid name email phone postal_code`).
    #[must_use]
    pub fn with_login_scopes(mut self, scopes: Vec<String>) -> Self {
        self.login_scopes = scopes;
        self
    }

    /// ACR requested for step-up authorization (default: `a3`).
    #[must_use]
    pub fn with_step_up_acr(mut self, acr: impl Into<String>) -> Self {
        self.step_up_acr = acr.into();
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    #[must_use]
    pub fn carrier_discovery_url(&self) -> &Url {
        &self.carrier_discovery_url
    }

    #[must_use]
    pub fn provider_config_url(&self) -> &Url {
        &self.provider_config_url
    }

    #[must_use]
    pub fn login_scopes(&self) -> &[String] {
        &self.login_scopes
    }

    #[must_use]
    pub fn step_up_acr(&self) -> &str {
        &self.step_up_acr
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    #[must_use]
    pub fn state_ttl(&self) -> Duration {
        self.state_ttl
    }
}
