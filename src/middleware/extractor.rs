use axum_extra::extract::PrivateCookieJar;

use super::cookies;
use crate::session::{SessionService, SessionStore};
use crate::userinfo::UserClaims;

/// Look up the signed-in user for the session cookie in `jar`.
///
/// For use in the application's own handlers (home page, protected routes).
/// Returns `None` for anonymous visitors and for sessions that have not
/// completed a carrier login.
///
/// # Example
///
/// ```rust,ignore
/// async fn home(State(app): State<App>, jar: PrivateCookieJar) -> impl IntoResponse {
///     match resolve_user(app.sessions.as_ref(), &jar, "__carrier_session") {
///         Some(user) => format!("Hello, {}", user.display_name().unwrap_or_default()),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
pub fn resolve_user<S: SessionStore>(
    store: &S,
    jar: &PrivateCookieJar,
    cookie_name: &str,
) -> Option<UserClaims> {
    let session_id = cookies::session_id(jar, cookie_name)?;
    SessionService::new(store, session_id).current_user()
}
