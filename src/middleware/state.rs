use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use crate::client::RelyingParty;
use crate::session::SessionStore;

/// Shared state for auth route handlers.
pub(super) struct AuthState<S> {
    pub(super) client: Arc<RelyingParty>,
    pub(super) session_store: Arc<S>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AuthState<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            session_store: self.session_store.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<AuthState<S>> for Key {
    fn from_ref(state: &AuthState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
