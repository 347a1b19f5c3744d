#![allow(dead_code)]

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use carrier_connect::{ClientConfig, ClientCredentials, RelyingParty};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const MCCMNC: &str = "311480";
pub const DISCOVERY_PATH: &str = "/.well-known/openid_configuration";

/// Client whose carrier and provider endpoints all point at `server`.
pub fn client_config(server: &MockServer) -> ClientConfig {
    let credentials = ClientCredentials::new(
        CLIENT_ID,
        CLIENT_SECRET,
        "https://app.example.com/auth/cb".parse().expect("valid redirect URI"),
    );
    ClientConfig::new(
        credentials,
        format!("{}/discovery/auth", server.uri())
            .parse()
            .expect("valid discovery URL"),
        format!("{}{DISCOVERY_PATH}", server.uri())
            .parse()
            .expect("valid provider config URL"),
    )
}

pub fn relying_party(server: &MockServer) -> RelyingParty {
    RelyingParty::new(client_config(server)).expect("HTTP client builds")
}

/// Provider configuration document for an issuer served by `server`.
pub fn provider_document(server: &MockServer) -> serde_json::Value {
    let base = server.uri();
    serde_json::json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "userinfo_endpoint": format!("{base}/userinfo"),
        "scopes_supported": ["openid", "name", "email", "phone", "postal_code"],
        "acr_values_supported": ["a1", "a3"],
        "code_challenge_methods_supported": ["S256"]
    })
}

/// Serve the provider configuration for [`MCCMNC`].
pub async fn mount_provider_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .and(query_param("client_id", CLIENT_ID))
        .and(query_param("mccmnc", MCCMNC))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_document(server)))
        .mount(server)
        .await;
}

/// Unsigned compact JWT with the given payload.
pub fn encode_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// ID-token claims the provider at `server` would issue for `sub`.
pub fn id_token_claims(server: &MockServer, sub: &str, nonce: &str) -> serde_json::Value {
    serde_json::json!({
        "iss": server.uri(),
        "sub": sub,
        "aud": CLIENT_ID,
        "iat": time::OffsetDateTime::now_utc().unix_timestamp(),
        "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 300,
        "nonce": nonce,
    })
}

pub fn token_response(access_token: &str, id_token_claims: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "id_token": encode_jwt(id_token_claims),
    })
}

/// Query parameters of a redirect target.
pub fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .expect("absolute URL")
        .query_pairs()
        .into_owned()
        .collect()
}
