//! Carrier sign-in routes for Axum.
//!
//! Mounts the discovery start, the shared callback, a step-up initiation
//! endpoint and logout on top of [`RelyingParty`](crate::RelyingParty).
//! The browser carries only an encrypted session-id cookie; everything else
//! lives in the [`SessionStore`](crate::session::SessionStore).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use carrier_connect::MemorySessionStore;
//! use carrier_connect::middleware::{CarrierAuthConfig, auth_routes, resolve_user};
//!
//! // 1. Configure from environment
//! let config = CarrierAuthConfig::from_env()?;
//!
//! // 2. Mount auth routes
//! let store = Arc::new(MemorySessionStore::new());
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, store.clone()));
//!
//! // 3. Use resolve_user() in your own handlers
//! let user = resolve_user(store.as_ref(), &jar, "__carrier_session");
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::CarrierAuthConfig;
pub use error::AuthError;
pub use extractor::resolve_user;
pub use routes::auth_routes;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
