#![doc = include_str!("../README.md")]

pub mod authorize;
pub mod claims;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod flow;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod pkce;
pub mod session;
pub mod token;
pub mod types;
pub mod userinfo;

// Re-exports for convenient access
pub use authorize::AuthRequestOptions;
pub use claims::{IdToken, IdTokenClaims, IdTokenValidator, ValidatorParams, validate_id_token};
pub use client::RelyingParty;
pub use config::{ClientConfig, ClientCredentials};
pub use discovery::ProviderMetadata;
pub use error::{
    AuthorizationError, ConfigurationError, DiscoveryError, Error, OAuthErrorResponse,
    TokenValidationError, UserInfoError,
};
pub use exchange::{AllowedClients, ClientSignIn, CodeExchange};
pub use flow::{AuthorizationFlow, AuthorizationPurpose, FlowOutcome, PendingAuthorization};
pub use pkce::{PkcePair, generate_nonce, generate_state};
pub use session::{MemorySessionStore, SessionService, SessionState, SessionStore};
pub use token::TokenSet;
pub use types::{Mccmnc, SessionId, Subject};
pub use userinfo::{NameClaim, UserClaims, decode_userinfo};
