//! Collaborator seams: the recovery backend and the auth token source.
//!
//! The engine never speaks HTTP itself. It drives whatever implements
//! [`ResetBackend`] and classifies failures through [`BackendError`].

use std::future::Future;
use std::pin::Pin;

use recover_types::{Email, NewPassword, SecretString, VerificationCode};
use thiserror::Error;

/// Backend call future type alias.
pub type BackendFut<'a> = Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + 'a>>;

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The server understood the request and refused it (wrong code,
    /// unknown email, rate limit).
    #[error("rejected: {message}")]
    Rejected { message: String },
    /// The code or verified reset session is no longer valid.
    #[error("expired: {message}")]
    Expired { message: String },
    /// The request never produced a usable answer (connectivity, timeout,
    /// server unavailable).
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl BackendError {
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Text shown to the user in the flow's error slot.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message } if !message.trim().is_empty() => message.clone(),
            Self::Rejected { .. } => {
                "The request was rejected. Check your input and try again.".to_string()
            }
            Self::Expired { message } if !message.trim().is_empty() => message.clone(),
            Self::Expired { .. } => "The code has expired. Request a new one.".to_string(),
            Self::Transport { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
        }
    }
}

/// Remote operations the recovery flow consumes.
///
/// Implementations must be safe to call from any task; the controller
/// guarantees at most one call per flow is outstanding.
pub trait ResetBackend: Send + Sync {
    /// Ask the server to send a verification code to `email`.
    fn request_code<'a>(&'a self, email: &'a Email) -> BackendFut<'a>;

    /// Check `code` against the last code sent to `email`.
    fn verify_code<'a>(&'a self, email: &'a Email, code: &'a VerificationCode) -> BackendFut<'a>;

    /// Finalize the reset using a previously verified code.
    fn set_new_password<'a>(
        &'a self,
        email: &'a Email,
        code: &'a VerificationCode,
        password: &'a NewPassword,
    ) -> BackendFut<'a>;
}

/// Read-only access to the current session token, if any.
pub trait TokenSource: Send + Sync {
    fn current_auth_token(&self) -> Option<SecretString>;
}

/// Token source for the logged-out state a password reset usually runs in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoToken;

impl TokenSource for NoToken {
    fn current_auth_token(&self) -> Option<SecretString> {
        None
    }
}

/// Token source over a fixed value.
#[derive(Debug, Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

impl TokenSource for StaticToken {
    fn current_auth_token(&self) -> Option<SecretString> {
        Some(self.0.clone())
    }
}
