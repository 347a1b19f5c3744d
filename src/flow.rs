//! Step-up authorization coordinator.
//!
//! A business action records what it wants approved with
//! [`AuthorizationFlow::set_authorization_details`] and then sends the user
//! through carrier discovery. When the callback returns with tokens,
//! [`AuthorizationFlow::success_router`] finishes whatever was pending.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::authorize::AuthRequestOptions;
use crate::error::{AuthorizationError, ConfigurationError, Error};
use crate::session::{SessionService, SessionStore};
use crate::token::TokenSet;

/// What a step-up authorization approves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[non_exhaustive]
pub enum AuthorizationPurpose {
    /// Sending money; options `amount` and `recipient`.
    Transaction,
}

impl AuthorizationPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for AuthorizationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationPurpose {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction" => Ok(Self::Transaction),
            other => Err(ConfigurationError::UnknownAuthorizationType(other.to_owned())),
        }
    }
}

impl TryFrom<String> for AuthorizationPurpose {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AuthorizationPurpose> for String {
    fn from(purpose: AuthorizationPurpose) -> Self {
        purpose.as_str().to_owned()
    }
}

/// A step-up authorization waiting for the carrier round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub purpose: AuthorizationPurpose,
    /// Text the carrier shows the user while approving.
    pub context: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Result of a completed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlowOutcome {
    /// No step-up was pending; the tokens are a plain sign-in.
    Login,
    TransactionApproved {
        amount: String,
        recipient: String,
        message: String,
    },
}

/// Coordinator over one session's pending step-up record.
pub struct AuthorizationFlow<'s, 'a, S> {
    session: &'s SessionService<'a, S>,
}

impl<'s, 'a, S: SessionStore> AuthorizationFlow<'s, 'a, S> {
    #[must_use]
    pub fn new(session: &'s SessionService<'a, S>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn authorization_in_progress(&self) -> bool {
        self.session.pending_authorization().is_some()
    }

    /// Record a step-up request, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownAuthorizationType`] if `purpose` names
    /// no known purpose. Nothing is stored in that case.
    pub fn set_authorization_details(
        &self,
        purpose: &str,
        context: impl Into<String>,
        options: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let purpose: AuthorizationPurpose = purpose.parse()?;
        let pending = PendingAuthorization {
            purpose,
            context: context.into(),
            options,
        };
        tracing::info!(session_id = %self.session.id(), %purpose, "step-up authorization requested");
        self.session.set_pending_authorization(Some(pending));
        Ok(())
    }

    #[must_use]
    pub fn get_authorization_details(&self) -> Option<PendingAuthorization> {
        self.session.pending_authorization()
    }

    /// Cancel the pending step-up, if any.
    pub fn delete_authorization_details(&self) {
        self.session.set_pending_authorization(None);
    }

    /// Authorization request options for the next provider redirect:
    /// step-up with the pending context, or a plain login.
    #[must_use]
    pub fn request_options(&self) -> AuthRequestOptions {
        match self.get_authorization_details() {
            Some(pending) => AuthRequestOptions::StepUp {
                context: pending.context,
            },
            None => AuthRequestOptions::Login,
        }
    }

    /// Complete the pending step-up with freshly issued tokens.
    ///
    /// The token subject must be the signed-in user. The pending record is
    /// removed only after the purpose-specific completion succeeded.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::SubjectMismatch`] if nobody is signed in or
    ///   the token belongs to someone else
    /// - [`ConfigurationError::MissingAuthorizationOption`] if the record
    ///   lacks an option its purpose needs
    pub fn success_router(&self, tokens: &TokenSet) -> Result<FlowOutcome, Error> {
        let Some(pending) = self.get_authorization_details() else {
            return Ok(FlowOutcome::Login);
        };

        let outcome = match pending.purpose {
            AuthorizationPurpose::Transaction => self.transaction_success(&pending, tokens)?,
        };

        self.delete_authorization_details();
        Ok(outcome)
    }

    fn transaction_success(
        &self,
        pending: &PendingAuthorization,
        tokens: &TokenSet,
    ) -> Result<FlowOutcome, Error> {
        let token_sub = &tokens.id_token.claims().sub;
        let signed_in = self.session.current_user();
        if signed_in.as_ref().map(|user| &user.sub) != Some(token_sub) {
            tracing::warn!(
                session_id = %self.session.id(),
                %token_sub,
                "step-up token subject does not match signed-in user"
            );
            return Err(AuthorizationError::SubjectMismatch.into());
        }

        let option = |name: &'static str| {
            pending
                .options
                .get(name)
                .cloned()
                .ok_or(ConfigurationError::MissingAuthorizationOption(name))
        };
        let amount = option("amount")?;
        let recipient = option("recipient")?;

        tracing::info!(session_id = %self.session.id(), %amount, %recipient, "transaction approved");
        Ok(FlowOutcome::TransactionApproved {
            message: format!("Success: ${amount} was sent to {recipient}"),
            amount,
            recipient,
        })
    }
}
