//! Domain values for the password recovery flow.
//!
//! This crate contains pure value types with no IO, no async, and minimal
//! dependencies. Every constructor validates, so holding one of these types
//! is proof the value passed local validation.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod secret;
mod text;

pub use secret::{NewPassword, SecretString};
pub use text::{clean_server_message, truncate_with_ellipsis};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Minimum password length when none is configured.
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Validation errors
// ============================================================================

/// Input rejected locally, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter your email address.")]
    EmptyEmail,
    #[error("\"{0}\" is not a valid email address.")]
    MalformedEmail(String),
    #[error("This reset is already in progress for another email address.")]
    EmailLocked,
    #[error("Enter all {len} digits of the code.", len = CODE_LENGTH)]
    IncompleteCode,
    #[error("The code must be {len} digits.", len = CODE_LENGTH)]
    MalformedCode,
    #[error("Enter a new password.")]
    EmptyPassword,
    #[error("The password must be at least {min} characters.")]
    PasswordTooShort { min: usize },
}

// ============================================================================
// Email
// ============================================================================

/// A syntactically plausible email address.
///
/// Surrounding whitespace is trimmed and the domain is lowercased; the local
/// part is kept as typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        let malformed = || ValidationError::MalformedEmail(trimmed.to_string());

        let (local, domain) = trimmed.split_once('@').ok_or_else(malformed)?;
        if local.is_empty()
            || domain.contains('@')
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(malformed());
        }
        let valid_domain = domain
            .split('.')
            .all(|label| !label.is_empty())
            && domain.contains('.');
        if !valid_domain {
            return Err(malformed());
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

// ============================================================================
// Verification code
// ============================================================================

/// Exactly [`CODE_LENGTH`] ASCII decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let digits = trimmed.chars().filter(char::is_ascii_digit).count();
        if digits != trimmed.chars().count() {
            return Err(ValidationError::MalformedCode);
        }
        if digits < CODE_LENGTH {
            return Err(ValidationError::IncompleteCode);
        }
        if digits > CODE_LENGTH {
            return Err(ValidationError::MalformedCode);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
