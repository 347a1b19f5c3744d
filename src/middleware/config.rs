use axum_extra::extract::cookie::Key;

use super::error::AuthError;
use crate::client::RelyingParty;
use crate::config::ClientConfig;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) step_up_path: String,
    pub(crate) logout_path: String,
    pub(crate) home_redirect: String,
    pub(crate) transaction_recipient: String,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__carrier_session".into(),
            secure_cookies: true,
            auth_path: "/auth".into(),
            step_up_path: "/authorize-transaction".into(),
            logout_path: "/logout".into(),
            home_redirect: "/".into(),
            transaction_recipient: "John Doe".into(),
        }
    }
}

/// Carrier sign-in configuration for the axum routes.
///
/// Use [`from_env()`](CarrierAuthConfig::from_env) for convention-based setup,
/// or [`new()`](CarrierAuthConfig::new) with `with_*` methods for full control.
pub struct CarrierAuthConfig {
    pub(super) client: RelyingParty,
    pub(super) settings: AuthSettings,
}

impl CarrierAuthConfig {
    #[must_use]
    pub fn new(client: RelyingParty) -> Self {
        Self {
            client,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// Client settings are read by [`ClientConfig::from_env`]. In addition:
    /// - `DEV_AUTH`: `"1"` or `"true"` disables secure cookies (plain-HTTP local runs)
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64); ephemeral if unset
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a variable is missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_config =
            ClientConfig::from_lookup(&lookup).map_err(|e| AuthError::Config(e.to_string()))?;
        let client =
            RelyingParty::new(client_config).map_err(|e| AuthError::Config(e.to_string()))?;

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1" | "true"));

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };

        Ok(Self::new(client)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Discovery start path; the callback is mounted at `{path}/cb`.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_step_up_path(mut self, path: impl Into<String>) -> Self {
        self.settings.step_up_path = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.home_redirect = path.into();
        self
    }

    /// Payee named in transactions started from the step-up form.
    #[must_use]
    pub fn with_transaction_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.settings.transaction_recipient = recipient.into();
        self
    }
}
