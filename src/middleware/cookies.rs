use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::types::SessionId;

/// Create the session-id cookie. Lives as long as the browser session.
pub(super) fn session_cookie(name: &str, session_id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .build()
}

/// Create removal cookie for session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Session id from the private cookie, if the browser sent one.
pub(super) fn session_id(jar: &PrivateCookieJar, name: &str) -> Option<SessionId> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionId)
}

/// Session id from the cookie, or a fresh one with its cookie added to the jar.
pub(super) fn ensure_session(
    jar: PrivateCookieJar,
    name: &str,
    secure: bool,
) -> (PrivateCookieJar, SessionId) {
    if let Some(id) = session_id(&jar, name) {
        return (jar, id);
    }
    let id = SessionId::generate();
    let jar = jar.add(session_cookie(name, &id, secure));
    (jar, id)
}
