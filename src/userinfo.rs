use serde::{Deserialize, Deserializer, Serialize};

use crate::client::RelyingParty;
use crate::discovery::ProviderMetadata;
use crate::error::{Error, UserInfoError};
use crate::types::Subject;

/// Subject claims from the provider's user-info endpoint.
///
/// Carriers group attributes in nested objects
/// (`"email": {"value": "jane@example.com"}`); plain strings are accepted
/// too. Boolean flags may arrive as JSON booleans or as `"true"`/`"false"`.
/// Every attribute is optional and depends on the granted scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUserInfo")]
#[non_exhaustive]
pub struct UserClaims {
    pub sub: Subject,
    pub name: Option<NameClaim>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub phone: Option<String>,
    pub phone_number_verified: Option<bool>,
    pub postal_code: Option<String>,
}

/// The carrier's grouped `name` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameClaim {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl UserClaims {
    /// Claims with only the required `sub`.
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: Subject(sub.into()),
            name: None,
            email: None,
            email_verified: None,
            phone: None,
            phone_number_verified: None,
            postal_code: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: NameClaim) -> Self {
        self.name = Some(name);
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    /// Full name, falling back to `given_name family_name`.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        if let Some(value) = &name.value {
            return Some(value.clone());
        }
        let parts: Vec<&str> = [name.given_name.as_deref(), name.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawUserInfo {
    sub: Subject,
    #[serde(default)]
    name: Option<NameField>,
    #[serde(default)]
    email: Option<ValueField>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: Option<bool>,
    #[serde(default)]
    phone: Option<ValueField>,
    #[serde(default)]
    phone_number: Option<ValueField>,
    #[serde(default, deserialize_with = "lenient_bool")]
    phone_number_verified: Option<bool>,
    #[serde(default)]
    postal_code: Option<ValueField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NameField {
    Plain(String),
    Grouped(NameClaim),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueField {
    Plain(String),
    Grouped {
        #[serde(default)]
        value: Option<String>,
        #[serde(default, deserialize_with = "lenient_bool")]
        verified: Option<bool>,
    },
}

impl ValueField {
    fn split(field: Option<Self>) -> (Option<String>, Option<bool>) {
        match field {
            None => (None, None),
            Some(Self::Plain(value)) => (Some(value), None),
            Some(Self::Grouped { value, verified }) => (value, verified),
        }
    }
}

impl From<RawUserInfo> for UserClaims {
    fn from(raw: RawUserInfo) -> Self {
        let (email, email_flag) = ValueField::split(raw.email);
        let (phone, phone_flag) = ValueField::split(raw.phone.or(raw.phone_number));
        let (postal_code, _) = ValueField::split(raw.postal_code);

        Self {
            sub: raw.sub,
            name: raw.name.map(|name| match name {
                NameField::Plain(value) => NameClaim {
                    value: Some(value),
                    ..NameClaim::default()
                },
                NameField::Grouped(claim) => claim,
            }),
            email,
            email_verified: raw.email_verified.or(email_flag),
            phone,
            phone_number_verified: raw.phone_number_verified.or(phone_flag),
            postal_code,
        }
    }
}

/// Accepts `true`, `"true"`, `"TRUE"`, `false`, `"false"`, `null`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Text(String),
    }

    match Option::<BoolLike>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolLike::Bool(b)) => Ok(Some(b)),
        Some(BoolLike::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {other:?}"
            ))),
        },
    }
}

/// Decode a user-info response body.
///
/// # Errors
///
/// [`UserInfoError::Provider`] when the body is an OAuth error object,
/// [`UserInfoError::Schema`] when it does not fit [`UserClaims`].
pub fn decode_userinfo(body: &str) -> Result<UserClaims, UserInfoError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| UserInfoError::Schema(e.to_string()))?;

    if let Some(error) = value.get("error").and_then(serde_json::Value::as_str) {
        return Err(UserInfoError::Provider {
            error: error.to_owned(),
            description: value
                .get("error_description")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
        });
    }

    serde_json::from_value(value).map_err(|e| UserInfoError::Schema(e.to_string()))
}

impl RelyingParty {
    /// Fetch the signed-in user's claims with the access token as bearer
    /// credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserInfo`] if the provider rejects the token or the
    /// claims do not decode, or [`Error::Http`] on network failure.
    pub async fn get_userinfo(
        &self,
        provider: &ProviderMetadata,
        access_token: &str,
    ) -> Result<UserClaims, Error> {
        let response = self
            .http
            .get(provider.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let result = match decode_userinfo(&body) {
            Err(UserInfoError::Schema(_)) if !status.is_success() => {
                Err(UserInfoError::Status(status.as_u16()))
            }
            Ok(_) if !status.is_success() => Err(UserInfoError::Status(status.as_u16())),
            other => other,
        };

        result
            .inspect(|claims| tracing::debug!(sub = %claims.sub, "userinfo fetched"))
            .inspect_err(|e| tracing::warn!(error = %e, "userinfo request failed"))
            .map_err(Into::into)
    }
}
