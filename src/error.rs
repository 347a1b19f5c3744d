/// Crate-level error for every leg of the carrier sign-in flow.
///
/// Protocol failures (forged state, bad ID token, unknown step-up purpose)
/// are kept apart from transport failures so callers can tell which ones
/// may be retried. See [`Error::is_retryable`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    TokenValidation(#[from] TokenValidationError),
    #[error(transparent)]
    UserInfo(#[from] UserInfoError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("{0} is not a valid mccmnc")]
    InvalidMccmnc(String),
    #[error("{0} param is missing")]
    MissingParameter(&'static str),
    /// Client id absent from the [`AllowedClients`](crate::exchange::AllowedClients) list.
    #[error("{0} is not an allowed client_id")]
    ClientNotAllowed(String),
    /// OAuth2 error object returned by the token endpoint.
    #[error("token endpoint error: {}", .0.describe())]
    TokenEndpoint(OAuthErrorResponse),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Only transport failures may be retried. A failed handshake leg must be
    /// restarted from carrier discovery instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Provider metadata could not be resolved for the carrier.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("unable to fetch provider metadata: empty discovery response")]
    EmptyResponse,
    #[error("unable to fetch provider metadata: missing issuer")]
    MissingIssuer,
    #[error("invalid provider metadata: {0}")]
    Malformed(String),
}

/// Forged or replayed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthorizationError {
    #[error("state mismatch")]
    StateMismatch,
    #[error("token does not match the signed-in subject")]
    SubjectMismatch,
}

/// The ID token does not satisfy the security contract of the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenValidationError {
    #[error("nonce value in ID token does not match")]
    NonceMismatch,
    #[error("ACR value in ID token does not match")]
    AcrMismatch,
    #[error("context value in ID token does not match")]
    ContextMismatch,
    #[error("issuer in ID token does not match")]
    IssuerMismatch,
    #[error("audience in ID token does not include this client")]
    AudienceMismatch,
    #[error("ID token has expired")]
    Expired,
    #[error("at_hash value in ID token does not match")]
    AtHashMismatch,
    #[error("malformed ID token: {0}")]
    Malformed(String),
}

/// The user-info endpoint rejected the access token or returned bad claims.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UserInfoError {
    #[error("{error}: {}", description.as_deref().unwrap_or("no description"))]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("userinfo endpoint returned status {0}")]
    Status(u16),
    #[error("userinfo response does not match schema: {0}")]
    Schema(String),
}

/// Deployment or programming defect. Never user-recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("unknown authorization type: {0}")]
    UnknownAuthorizationType(String),
    #[error("authorization option `{0}` is missing")]
    MissingAuthorizationOption(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Standard OAuth2 error object (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

impl OAuthErrorResponse {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{}: {desc}", self.error),
            None => self.error.clone(),
        }
    }
}
