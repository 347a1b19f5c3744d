use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Error;

/// Validated carrier code: mobile country code + mobile network code.
///
/// Always exactly six ASCII digits. Holding an `Mccmnc` proves the value was
/// checked before it reached any discovery request.
/// Use `"311480".parse::<Mccmnc>()` or `Mccmnc::try_from(string)` to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mccmnc(String);

impl Mccmnc {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mccmnc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Mccmnc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Mccmnc {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s))
        } else {
            Err(Error::InvalidMccmnc(s))
        }
    }
}

impl From<Mccmnc> for String {
    fn from(m: Mccmnc) -> Self {
        m.0
    }
}

/// Opaque identifier of one browser session.
///
/// Keys the [`SessionStore`](crate::session::SessionStore); never shared
/// between users.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Fresh, unguessable session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }
}

/// Stable end-user identifier issued by the provider (`sub` claim).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct Subject(pub String);

impl Subject {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
