//! Client-initiated sign-in against wiremock carrier endpoints
//!
//! A client application brings its own code and correlation values; the
//! backend only supplies the secret of an allowed client id.

mod common;

use wiremock::matchers::{basic_auth, bearer_token, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use carrier_connect::{
    AllowedClients, CodeExchange, Error, Mccmnc, TokenValidationError, ValidatorParams,
};

use common::{DISCOVERY_PATH, MCCMNC, id_token_claims, provider_document, relying_party, token_response};

const APP_ID: &str = "mobile-app";
const APP_SECRET: &str = "mobile-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn allowed() -> AllowedClients {
    AllowedClients::new().with_client(APP_ID, APP_SECRET)
}

fn exchange(code: &str) -> CodeExchange {
    CodeExchange::new(
        APP_ID,
        code,
        "https://mobile.example.com/cb".parse().expect("valid redirect URI"),
        MCCMNC.parse::<Mccmnc>().expect("valid mccmnc"),
    )
}

/// ID-token claims issued to the mobile application.
fn app_claims(server: &MockServer, nonce: &str) -> serde_json::Value {
    let mut claims = id_token_claims(server, "subject-9", nonce);
    claims["aud"] = APP_ID.into();
    claims
}

async fn mount_app_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .and(query_param("client_id", APP_ID))
        .and(query_param("mccmnc", MCCMNC))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_document(server)))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_exchange_returns_tokens_and_user() {
    let server = MockServer::start().await;
    mount_app_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(basic_auth(APP_ID, APP_SECRET))
        .and(body_string_contains("code=app-code"))
        .and(body_string_contains("code_verifier=app-verifier"))
        .and(body_string_contains("correlation_id=corr-7"))
        .and(body_string_contains("sdk_version=2.0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("app-access", &app_claims(&server, "app-nonce"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(bearer_token("app-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "subject-9",
            "email": {"value": "nine@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = relying_party(&server);

    let request = exchange("app-code")
        .with_code_verifier("app-verifier")
        .with_correlation_id("corr-7")
        .with_sdk_version("2.0.1")
        .with_validator_params(ValidatorParams {
            nonce: Some("app-nonce".into()),
            ..ValidatorParams::default()
        });
    let sign_in = client
        .exchange_code(&allowed(), request)
        .await
        .expect("sign-in succeeds");

    assert_eq!(sign_in.tokens.access_token, "app-access");
    assert_eq!(sign_in.user.sub.as_str(), "subject-9");
    assert_eq!(sign_in.user.email.as_deref(), Some("nine@example.com"));

    let requests = server.received_requests().await.expect("recording enabled");
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == "/token")
        .expect("token endpoint called");
    assert!(!String::from_utf8_lossy(&token_request.body).contains("client_id"));
}

#[tokio::test]
async fn test_unknown_client_is_rejected_before_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_document(&server)))
        .expect(0)
        .mount(&server)
        .await;
    let client = relying_party(&server);

    let err = client
        .exchange_code(&AllowedClients::new().with_client("someone-else", "s"), exchange("c"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ClientNotAllowed(ref id) if id == APP_ID));
}

#[tokio::test]
async fn test_weaker_acr_skips_userinfo() {
    let server = MockServer::start().await;
    mount_app_discovery(&server).await;
    let mut claims = app_claims(&server, "app-nonce");
    claims["acr"] = "a1".into();
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("app-access", &claims)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sub": "subject-9"})))
        .expect(0)
        .mount(&server)
        .await;
    let client = relying_party(&server);

    let request = exchange("app-code").with_validator_params(ValidatorParams {
        nonce: Some("app-nonce".into()),
        acr_values: Some("a3".into()),
        context: None,
    });
    let err = client.exchange_code(&allowed(), request).await.unwrap_err();

    assert!(matches!(
        err,
        Error::TokenValidation(TokenValidationError::AcrMismatch)
    ));
}

#[tokio::test]
async fn test_token_endpoint_error_is_reported() {
    let server = MockServer::start().await;
    mount_app_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "code already used"
        })))
        .mount(&server)
        .await;
    let client = relying_party(&server);

    let err = client
        .exchange_code(&allowed(), exchange("used-code"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TokenEndpoint(ref e) if e.error == "invalid_grant"));
}
