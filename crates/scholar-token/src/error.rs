//! Error types for the token crate.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing keys or issuing and verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Key material could not be created, read or validated.
    #[error("key store error at {}: {message}", path.display())]
    KeyIo { path: PathBuf, message: String },

    /// A required input was empty or a configuration value was out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The claim set could not be turned into a signed token.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The token is not a valid token signed by our key.
    #[error("invalid token signature: {0}")]
    SignatureInvalid(String),

    /// Token has expired.
    #[error("token expired at {expired_at}")]
    TokenExpired { expired_at: DateTime<Utc> },

    /// Token is not valid before a future instant.
    #[error("token not valid before {not_before}")]
    TokenNotYetValid { not_before: DateTime<Utc> },

    /// The token was issued by someone else.
    #[error("invalid issuer: expected {expected:?}, found {found:?}")]
    InvalidIssuer { expected: String, found: String },

    /// The token was issued for another audience.
    #[error("invalid audience: expected {expected:?}, found {found:?}")]
    InvalidAudience { expected: String, found: String },

    /// The signature is valid but a mandatory claim is missing or unreadable.
    #[error("malformed token: {0}")]
    MalformedToken(String),
}

impl TokenError {
    pub(crate) fn key_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::KeyIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error should surface as "unauthorized" at a request boundary.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            TokenError::InvalidInput(_)
                | TokenError::SignatureInvalid(_)
                | TokenError::TokenExpired { .. }
                | TokenError::TokenNotYetValid { .. }
                | TokenError::InvalidIssuer { .. }
                | TokenError::InvalidAudience { .. }
                | TokenError::MalformedToken(_)
        )
    }

    /// Short, stable name of the failure, for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::KeyIo { .. } => "key_io",
            TokenError::InvalidInput(_) => "invalid_input",
            TokenError::Signing(_) => "signing",
            TokenError::SignatureInvalid(_) => "signature_invalid",
            TokenError::TokenExpired { .. } => "token_expired",
            TokenError::TokenNotYetValid { .. } => "token_not_yet_valid",
            TokenError::InvalidIssuer { .. } => "invalid_issuer",
            TokenError::InvalidAudience { .. } => "invalid_audience",
            TokenError::MalformedToken(_) => "malformed_token",
        }
    }
}
