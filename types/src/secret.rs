//! Secret-bearing values whose `Debug` output never reveals the content.

use crate::ValidationError;

/// A string that must not reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

// Manual Debug impl to prevent leaking secrets in logs.
impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

/// A new account password that satisfied the local policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPassword(SecretString);

impl NewPassword {
    /// Validate `raw` against a minimum character count.
    ///
    /// The password is stored as typed; only the blank check trims.
    pub fn new(raw: impl Into<String>, min_len: usize) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if raw.chars().count() < min_len {
            return Err(ValidationError::PasswordTooShort { min: min_len });
        }
        Ok(Self(SecretString::new(raw)))
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}
