//! Per-session storage for the values that correlate one authorization
//! attempt across its redirects.
//!
//! Every flow component receives a [`SessionService`] bound to one
//! [`SessionId`] instead of reaching for an ambient web session, so the
//! store can be swapped (memory, Redis, ...) and mocked in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AuthorizationError;
use crate::flow::PendingAuthorization;
use crate::types::{Mccmnc, SessionId};
use crate::userinfo::UserClaims;

/// Everything the relying party keeps for one browser session.
///
/// The correlation values (`state`, `nonce`, `mccmnc`, `code_verifier` and
/// the requested `acr_values`/`context`) live for one authorization attempt.
/// `user` is the signed-in user and survives [`SessionService::clear`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionState {
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub mccmnc: Option<Mccmnc>,
    pub code_verifier: Option<String>,
    pub acr_values: Option<String>,
    pub context: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub issued_at: Option<OffsetDateTime>,
    pub pending_authorization: Option<PendingAuthorization>,
    pub user: Option<UserClaims>,
}

impl SessionState {
    fn clear_correlation(&mut self) {
        self.state = None;
        self.nonce = None;
        self.mccmnc = None;
        self.code_verifier = None;
        self.acr_values = None;
        self.context = None;
        self.issued_at = None;
    }

    /// Nothing worth keeping: no correlation values, no pending step-up and
    /// nobody signed in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.nonce.is_none()
            && self.mccmnc.is_none()
            && self.code_verifier.is_none()
            && self.acr_values.is_none()
            && self.context.is_none()
            && self.pending_authorization.is_none()
            && self.user.is_none()
    }

    fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        match self.issued_at {
            Some(issued_at) => now - issued_at > ttl,
            None => false,
        }
    }
}

/// Session persistence keyed by [`SessionId`].
///
/// Implementations must serialize calls for the same session id: the
/// state/nonce/verifier triple is compared and consumed inside a single
/// [`update`](SessionStore::update) call, and two concurrent callbacks must
/// not both observe the same values.
///
/// Reads go through [`read`](SessionStore::read) and never create a record,
/// so unauthenticated traffic does not grow the store.
pub trait SessionStore: Send + Sync + 'static {
    /// Run `f` against the session record, creating an empty one if absent.
    /// A record that `f` leaves [empty](SessionState::is_empty) is dropped.
    fn update<R, F>(&self, id: &SessionId, f: F) -> R
    where
        F: FnOnce(&mut SessionState) -> R;

    /// Run `f` against the session record if there is one.
    fn read<R, F>(&self, id: &SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&SessionState) -> R;

    /// Drop the whole session (logout).
    fn remove(&self, id: &SessionId);

    /// Discard correlation values older than `ttl` and any session left
    /// empty by that. Stores with their own expiry can keep the default.
    fn evict_expired(&self, _ttl: Duration) {}
}

/// In-process [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn update<R, F>(&self, id: &SessionId, f: F) -> R
    where
        F: FnOnce(&mut SessionState) -> R,
    {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(sessions.entry(id.clone()).or_default());
        if sessions.get(id).is_some_and(SessionState::is_empty) {
            sessions.remove(id);
        }
        result
    }

    fn read<R, F>(&self, id: &SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&SessionState) -> R,
    {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(f)
    }

    fn remove(&self, id: &SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn evict_expired(&self, ttl: Duration) {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| {
            if s.is_expired(ttl, now) {
                s.clear_correlation();
            }
            !s.is_empty()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired sessions evicted");
        }
    }
}

/// Values recorded when the provider authorization redirect is issued.
#[derive(Debug, Clone)]
pub(crate) struct AuthorizationRecord {
    pub(crate) state: String,
    pub(crate) nonce: String,
    pub(crate) mccmnc: Mccmnc,
    pub(crate) code_verifier: String,
    pub(crate) acr_values: Option<String>,
    pub(crate) context: Option<String>,
}

/// Correlation values taken out of the session by a matching callback.
#[derive(Debug, Clone)]
pub(crate) struct Correlation {
    pub(crate) nonce: Option<String>,
    pub(crate) mccmnc: Option<Mccmnc>,
    pub(crate) code_verifier: Option<String>,
    pub(crate) acr_values: Option<String>,
    pub(crate) context: Option<String>,
}

/// Handle on one user's session.
pub struct SessionService<'a, S> {
    store: &'a S,
    id: SessionId,
}

impl<'a, S: SessionStore> SessionService<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, id: SessionId) -> Self {
        Self { store, id }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Overwrites the stored state and restarts its lifetime.
    pub fn set_state(&self, state: impl Into<String>) {
        let state = state.into();
        self.store.update(&self.id, |s| {
            s.state = Some(state);
            s.issued_at = Some(OffsetDateTime::now_utc());
        });
    }

    #[must_use]
    pub fn get_state(&self) -> Option<String> {
        self.store.read(&self.id, |s| s.state.clone()).flatten()
    }

    pub fn set_nonce(&self, nonce: impl Into<String>) {
        let nonce = nonce.into();
        self.store.update(&self.id, |s| s.nonce = Some(nonce));
    }

    #[must_use]
    pub fn get_nonce(&self) -> Option<String> {
        self.store.read(&self.id, |s| s.nonce.clone()).flatten()
    }

    pub fn set_mccmnc(&self, mccmnc: Mccmnc) {
        self.store.update(&self.id, |s| s.mccmnc = Some(mccmnc));
    }

    #[must_use]
    pub fn get_mccmnc(&self) -> Option<Mccmnc> {
        self.store.read(&self.id, |s| s.mccmnc.clone()).flatten()
    }

    pub fn set_code_verifier(&self, verifier: impl Into<String>) {
        let verifier = verifier.into();
        self.store.update(&self.id, |s| s.code_verifier = Some(verifier));
    }

    #[must_use]
    pub fn get_code_verifier(&self) -> Option<String> {
        self.store.read(&self.id, |s| s.code_verifier.clone()).flatten()
    }

    /// Remove every correlation value and any pending step-up record.
    /// Idempotent.
    pub fn clear(&self) {
        self.store.update(&self.id, |s| {
            s.clear_correlation();
            s.pending_authorization = None;
        });
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserClaims> {
        self.store.read(&self.id, |s| s.user.clone()).flatten()
    }

    pub fn set_user(&self, user: UserClaims) {
        self.store.update(&self.id, |s| s.user = Some(user));
    }

    /// Whether `incoming` is the state currently stored. Consumes nothing.
    #[must_use]
    pub fn state_matches(&self, incoming: &str) -> bool {
        self.store
            .read(&self.id, |s| s.state.as_deref() == Some(incoming))
            .unwrap_or(false)
    }

    /// Forget the whole session, signed-in user included.
    pub fn destroy(&self) {
        self.store.remove(&self.id);
    }

    pub(crate) fn pending_authorization(&self) -> Option<PendingAuthorization> {
        self.store
            .read(&self.id, |s| s.pending_authorization.clone())
            .flatten()
    }

    pub(crate) fn set_pending_authorization(&self, pending: Option<PendingAuthorization>) {
        self.store
            .update(&self.id, |s| s.pending_authorization = pending);
    }

    /// Overwrite all correlation values at once for a new authorization
    /// redirect.
    pub(crate) fn record_authorization(&self, record: AuthorizationRecord) {
        self.store.update(&self.id, |s| {
            s.state = Some(record.state);
            s.nonce = Some(record.nonce);
            s.mccmnc = Some(record.mccmnc);
            s.code_verifier = Some(record.code_verifier);
            s.acr_values = record.acr_values;
            s.context = record.context;
            s.issued_at = Some(OffsetDateTime::now_utc());
        });
    }

    /// Compare `incoming` with the stored state and, in the same step, take
    /// every correlation value out of the session.
    ///
    /// Correlation values are single-use: on success and on mismatch alike
    /// the session no longer holds them afterwards.
    pub(crate) fn consume_state(
        &self,
        incoming: &str,
        ttl: Duration,
    ) -> Result<Correlation, AuthorizationError> {
        let now = OffsetDateTime::now_utc();
        self.store.update(&self.id, |s| {
            let matches = s.state.as_deref() == Some(incoming);
            let expired = s.is_expired(ttl, now);
            let correlation = Correlation {
                nonce: s.nonce.take(),
                mccmnc: s.mccmnc.take(),
                code_verifier: s.code_verifier.take(),
                acr_values: s.acr_values.take(),
                context: s.context.take(),
            };
            s.clear_correlation();

            if !matches {
                tracing::warn!(session_id = %self.id, "state mismatch");
                return Err(AuthorizationError::StateMismatch);
            }
            if expired {
                tracing::warn!(session_id = %self.id, "stored state expired");
                return Err(AuthorizationError::StateMismatch);
            }
            Ok(correlation)
        })
    }
}
