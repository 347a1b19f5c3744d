//! Axum route integration tests
//!
//! Drives `auth_routes` with `tower::ServiceExt::oneshot` through carrier
//! discovery, login, step-up approval and logout while wiremock plays the
//! carrier. The encrypted session cookie is carried between requests like a
//! browser would.

#![cfg(feature = "middleware")]

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{FromRef, State};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use tower::ServiceExt;
use wiremock::matchers::{bearer_token, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use carrier_connect::MemorySessionStore;
use carrier_connect::middleware::{CarrierAuthConfig, CookieKey, auth_routes, resolve_user};

use common::{
    DISCOVERY_PATH, MCCMNC, id_token_claims, mount_provider_discovery, query, relying_party,
    token_response,
};

const COOKIE_NAME: &str = "__carrier_session";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct App {
    store: Arc<MemorySessionStore>,
    key: CookieKey,
}

impl FromRef<App> for CookieKey {
    fn from_ref(app: &App) -> Self {
        app.key.clone()
    }
}

/// Application page that shows who is signed in.
async fn me(State(app): State<App>, jar: PrivateCookieJar) -> String {
    resolve_user(app.store.as_ref(), &jar, COOKIE_NAME)
        .map(|user| user.sub.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn app(server: &MockServer) -> Router {
    let key = CookieKey::generate();
    let store = Arc::new(MemorySessionStore::new());
    let config = CarrierAuthConfig::new(relying_party(server))
        .with_cookie_key(key.clone())
        .with_secure_cookies(false);

    auth_routes(config, store.clone()).merge(
        Router::new()
            .route("/me", get(me))
            .with_state(App { store, key }),
    )
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("infallible router")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("valid request")
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect has a location")
        .to_str()
        .expect("ASCII location")
        .to_string()
}

/// `name=value` of the session cookie set by `response`.
fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(COOKIE_NAME))
        .and_then(|v| v.split(';').next())
        .expect("session cookie set")
        .to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Runs `/auth` and the discovery callback; returns the session cookie and
/// the provider authorization URL parameters.
async fn start_login(
    app: &Router,
    cookie: Option<&str>,
) -> (String, std::collections::HashMap<String, String>) {
    let response = send(app, get_request("/auth", cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = match cookie {
        Some(c) => c.to_string(),
        None => session_cookie(&response),
    };
    let discovery_state = query(&location(&response))["state"].clone();

    let response = send(
        app,
        get_request(
            &format!("/auth/cb?mccmnc={MCCMNC}&state={discovery_state}"),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    (cookie, query(&location(&response)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_auth_redirects_to_carrier_discovery() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(&app, get_request("/auth", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/discovery/auth?", server.uri())));
    let params = query(&target);
    assert_eq!(params["client_id"], common::CLIENT_ID);
    assert_eq!(params["redirect_uri"], "https://app.example.com/auth/cb");
    assert!(!params["state"].is_empty());
    assert!(session_cookie(&response).starts_with(COOKIE_NAME));
}

#[tokio::test]
async fn test_login_round_trip() {
    let server = MockServer::start().await;
    mount_provider_discovery(&server).await;
    let app = app(&server);

    let (cookie, params) = start_login(&app, None).await;
    assert_eq!(params["scope"], "openid name email phone postal_code");
    assert_eq!(params["code_challenge_method"], "S256");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=login-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "access-1",
            &id_token_claims(&server, "subject-1", &params["nonce"]),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(bearer_token("access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "subject-1",
            "name": {"value": "Jane Doe"}
        })))
        .mount(&server)
        .await;

    let response = send(
        &app,
        get_request(
            &format!("/auth/cb?code=login-code&state={}", params["state"]),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = send(&app, get_request("/me", Some(&cookie))).await;
    assert_eq!(body_text(response).await, "subject-1");

    // already signed in and nothing pending: straight home
    let response = send(&app, get_request("/auth/cb", Some(&cookie))).await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_step_up_transaction_round_trip() {
    let server = MockServer::start().await;
    mount_provider_discovery(&server).await;
    let app = app(&server);

    // sign in first
    let (cookie, params) = start_login(&app, None).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=login-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "access-1",
            &id_token_claims(&server, "subject-1", &params["nonce"]),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sub": "subject-1"})))
        .mount(&server)
        .await;
    send(
        &app,
        get_request(
            &format!("/auth/cb?code=login-code&state={}", params["state"]),
            Some(&cookie),
        ),
    )
    .await;

    // request approval of a transfer
    let request = Request::post("/authorize-transaction")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("amount=50"))
        .expect("valid request");
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");

    let (cookie, params) = start_login(&app, Some(&cookie)).await;
    assert_eq!(params["scope"], "openid");
    assert_eq!(params["acr_values"], "a3");
    assert_eq!(params["context"], "Send $50 to John Doe");

    let mut claims = id_token_claims(&server, "subject-1", &params["nonce"]);
    claims["acr"] = "a3".into();
    claims["context"] = "Send $50 to John Doe".into();
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=step-up-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("access-2", &claims)))
        .mount(&server)
        .await;

    let response = send(
        &app,
        get_request(
            &format!("/auth/cb?code=step-up-code&state={}", params["state"]),
            Some(&cookie),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("/?message="));
    assert!(target.contains("50"));
    assert!(target.contains("John%20Doe"));
}

#[tokio::test]
async fn test_invalid_mccmnc_is_a_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let app = app(&server);

    let response = send(&app, get_request("/auth/cb?mccmnc=abc123&state=s", None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forged_state_is_forbidden() {
    let server = MockServer::start().await;
    mount_provider_discovery(&server).await;
    let app = app(&server);

    let response = send(&app, get_request("/auth", None)).await;
    let cookie = session_cookie(&response);

    let response = send(
        &app,
        get_request(&format!("/auth/cb?mccmnc={MCCMNC}&state=forged"), Some(&cookie)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_without_mccmnc_restarts_discovery() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(&app, get_request("/auth/cb?state=s", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
}

#[tokio::test]
async fn test_carrier_error_is_unauthorized() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(
        &app,
        get_request("/auth/cb?error=access_denied&error_description=cancelled", None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("access_denied"));
}

#[tokio::test]
async fn test_carrier_error_needs_stored_state_to_cancel_step_up() {
    let server = MockServer::start().await;
    mount_provider_discovery(&server).await;
    let app = app(&server);

    let request = Request::post("/authorize-transaction")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("amount=50"))
        .expect("valid request");
    let response = send(&app, request).await;
    let cookie = session_cookie(&response);

    let response = send(&app, get_request("/auth", Some(&cookie))).await;
    let discovery_state = query(&location(&response))["state"].clone();

    // a cross-site error redirect without our state changes nothing
    let response = send(
        &app,
        get_request("/auth/cb?error=access_denied&state=forged", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        get_request(
            &format!("/auth/cb?mccmnc={MCCMNC}&state={discovery_state}"),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let params = query(&location(&response));
    assert_eq!(params["acr_values"], "a3");

    // the carrier's own error cancels the approval
    let response = send(
        &app,
        get_request(
            &format!("/auth/cb?error=access_denied&state={}", params["state"]),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (_, params) = start_login(&app, Some(&cookie)).await;
    assert_eq!(params["scope"], "openid name email phone postal_code");
    assert!(!params.contains_key("acr_values"));
}

#[tokio::test]
async fn test_logout_forgets_user() {
    let server = MockServer::start().await;
    mount_provider_discovery(&server).await;
    let app = app(&server);

    let (cookie, params) = start_login(&app, None).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "access-1",
            &id_token_claims(&server, "subject-1", &params["nonce"]),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sub": "subject-1"})))
        .mount(&server)
        .await;
    send(
        &app,
        get_request(
            &format!("/auth/cb?code=c&state={}", params["state"]),
            Some(&cookie),
        ),
    )
    .await;

    let response = send(&app, get_request("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = send(&app, get_request("/me", Some(&cookie))).await;
    assert_eq!(body_text(response).await, "anonymous");
}
