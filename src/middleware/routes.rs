use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, Query, RawQuery, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::config::CarrierAuthConfig;
use super::cookies;
use super::error::AuthError;
use super::state::AuthState;
use crate::error::Error;
use crate::flow::{AuthorizationFlow, FlowOutcome};
use crate::session::{SessionService, SessionStore};
use crate::types::Mccmnc;

/// Create the carrier sign-in router.
///
/// Routes (paths configurable on [`CarrierAuthConfig`]):
/// - `GET /auth`: start carrier discovery
/// - `GET /auth/cb`: callback for both the discovery and the authorization leg
/// - `POST /authorize-transaction`: start a step-up approval (form field `amount`)
/// - `GET /logout`: drop the session
///
/// Keep a clone of `session_store` to call
/// [`resolve_user`](super::resolve_user) from the application's handlers.
pub fn auth_routes<S: SessionStore>(config: CarrierAuthConfig, session_store: Arc<S>) -> Router {
    let settings = config.settings;
    let auth_path = settings.auth_path.clone();
    let step_up_path = settings.step_up_path.clone();
    let logout_path = settings.logout_path.clone();

    let state = AuthState {
        client: Arc::new(config.client),
        session_store,
        settings,
    };

    Router::new()
        .route(&auth_path, get(begin::<S>))
        .route(&format!("{auth_path}/cb"), get(callback::<S>))
        .route(&step_up_path, post(authorize_transaction::<S>))
        .route(&logout_path, get(logout::<S>).post(logout::<S>))
        .with_state(state)
}

// ── Discovery ──────────────────────────────────────────────────────

async fn begin<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let settings = &state.settings;
    let (jar, session_id) =
        cookies::ensure_session(jar, &settings.session_cookie_name, settings.secure_cookies);
    state
        .session_store
        .evict_expired(state.client.config().state_ttl());
    let session = SessionService::new(state.session_store.as_ref(), session_id);

    let url = state.client.carrier_discovery_redirect(&session);
    (jar, Redirect::to(url.as_str()))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    mccmnc: Option<String>,
    login_hint_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let settings = &state.settings;
    let (jar, session_id) =
        cookies::ensure_session(jar, &settings.session_cookie_name, settings.secure_cookies);
    let session = SessionService::new(state.session_store.as_ref(), session_id);
    let flow = AuthorizationFlow::new(&session);

    if let Some(error) = params.error {
        let description = params.error_description.as_deref().unwrap_or("no description");
        tracing::warn!(%error, %description, "carrier returned an error");
        // Only the carrier that received our state may cancel the attempt.
        if params
            .state
            .as_deref()
            .is_some_and(|incoming| session.state_matches(incoming))
        {
            flow.delete_authorization_details();
            session.clear();
        }
        return Err(AuthError::Unauthorized(format!("{error}: {description}")));
    }

    if session.current_user().is_some() && !flow.authorization_in_progress() {
        return Ok((jar, Redirect::to(&settings.home_redirect)));
    }

    // The provider leg does not echo mccmnc; fall back to the one cached
    // when the authorization request was built.
    let mccmnc = match params.mccmnc {
        Some(raw) => raw.parse::<Mccmnc>()?,
        None => match session.get_mccmnc() {
            Some(cached) => cached,
            None => return Ok((jar, Redirect::to(&settings.auth_path))),
        },
    };

    let Some(incoming_state) = params.state else {
        flow.delete_authorization_details();
        return Err(Error::MissingParameter("state").into());
    };

    let provider = state.client.discover_oidc_provider_metadata(&mccmnc).await?;

    if params.code.is_none() {
        let url = state.client.get_auth_code_request_url(
            &session,
            &provider,
            params.login_hint_token.as_deref(),
            &incoming_state,
            &mccmnc,
            &flow.request_options(),
        )?;
        return Ok((jar, Redirect::to(url.as_str())));
    }

    let tokens = match state
        .client
        .request_token(&session, &provider, raw_query.as_deref().unwrap_or_default())
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            flow.delete_authorization_details();
            return Err(e.into());
        }
    };

    if flow.authorization_in_progress() {
        let outcome = flow.success_router(&tokens).inspect_err(|_| {
            flow.delete_authorization_details();
        })?;
        return match outcome {
            FlowOutcome::TransactionApproved { message, .. } => {
                let target = format!(
                    "{}?message={}",
                    settings.home_redirect,
                    urlencoding::encode(&message)
                );
                Ok((jar, Redirect::to(&target)))
            }
            _ => Ok((jar, Redirect::to(&settings.home_redirect))),
        };
    }

    let user = state
        .client
        .get_userinfo(&provider, &tokens.access_token)
        .await?;
    tracing::info!(session_id = %session.id(), sub = %user.sub, "carrier login successful");
    session.set_user(user);

    Ok((jar, Redirect::to(&settings.home_redirect)))
}

// ── Step-up ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TransactionForm {
    amount: String,
}

async fn authorize_transaction<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
    Form(form): Form<TransactionForm>,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let amount = form.amount.trim();
    if amount.is_empty() {
        return Err(AuthError::BadRequest("amount is required".into()));
    }

    let settings = &state.settings;
    let (jar, session_id) =
        cookies::ensure_session(jar, &settings.session_cookie_name, settings.secure_cookies);
    let session = SessionService::new(state.session_store.as_ref(), session_id);

    let recipient = settings.transaction_recipient.as_str();
    let options = [("amount", amount), ("recipient", recipient)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AuthorizationFlow::new(&session).set_authorization_details(
        "transaction",
        format!("Send ${amount} to {recipient}"),
        options,
    )?;

    Ok((jar, Redirect::to(&settings.auth_path)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let settings = &state.settings;
    if let Some(session_id) = cookies::session_id(&jar, &settings.session_cookie_name) {
        SessionService::new(state.session_store.as_ref(), session_id).destroy();
        tracing::info!("session destroyed on logout");
    }

    let clear_cookie = cookies::clear_session_cookie(&settings.session_cookie_name);
    (jar.remove(clear_cookie), Redirect::to(&settings.home_redirect))
}
