//! Token issuance and end-to-end verification.

use crate::claims::{Payload, TokenOptions};
use crate::codec;
use crate::error::TokenError;
use crate::keys::KeyStore;
use chrono::{DateTime, Duration, Utc};
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::path::PathBuf;

/// Default lifetime of an issued token.
pub const DEFAULT_TOKEN_LIFETIME: std::time::Duration = std::time::Duration::from_secs(15 * 60);
/// Default key directory.
pub const DEFAULT_KEY_DIRECTORY: &str = "keys";
/// Default issuer claim.
pub const DEFAULT_ISSUER: &str = "scholar_api";
/// Default audience claim.
pub const DEFAULT_AUDIENCE: &str = "scholar";

const TOKEN_ID_BYTES: usize = 16;

/// Settings for a [`TokenMaker`], fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMakerConfig {
    /// How long an issued token stays valid.
    pub token_lifetime: std::time::Duration,
    /// Directory holding `private.key` and `public.key`.
    pub key_directory: PathBuf,
    /// Issuer written into tokens and expected on verification.
    pub issuer: String,
    /// Audience written into tokens and expected on verification.
    pub audience: String,
}

impl Default for TokenMakerConfig {
    fn default() -> Self {
        Self {
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            key_directory: PathBuf::from(DEFAULT_KEY_DIRECTORY),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }
}

impl TokenMakerConfig {
    pub fn with_token_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    pub fn with_key_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.key_directory = dir.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Check the settings once, before any key is touched.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.token_lifetime.is_zero() {
            return Err(TokenError::InvalidInput(
                "token lifetime must be greater than zero".into(),
            ));
        }
        if Duration::from_std(self.token_lifetime).is_err() {
            return Err(TokenError::InvalidInput("token lifetime is too large".into()));
        }
        if self.key_directory.as_os_str().is_empty() {
            return Err(TokenError::InvalidInput("key directory cannot be empty".into()));
        }
        Ok(())
    }

    fn lifetime(&self) -> Duration {
        // validate() has already rejected out-of-range values
        Duration::from_std(self.token_lifetime).unwrap_or(Duration::zero())
    }
}

/// Issues and verifies tokens with one immutable keypair.
///
/// Cheap to share behind an `Arc`; nothing inside changes after construction.
#[derive(Debug)]
pub struct TokenMaker {
    keys: KeyStore,
    config: TokenMakerConfig,
}

impl TokenMaker {
    /// Build a maker, generating keys in `config.key_directory` on first run.
    pub fn new(config: TokenMakerConfig) -> Result<Self, TokenError> {
        config.validate()?;
        let keys = KeyStore::open(&config.key_directory)?;
        Ok(Self { keys, config })
    }

    /// Build a maker around an already loaded key store.
    pub fn with_key_store(config: TokenMakerConfig, keys: KeyStore) -> Result<Self, TokenError> {
        config.validate()?;
        Ok(Self { keys, config })
    }

    pub fn config(&self) -> &TokenMakerConfig {
        &self.config
    }

    /// Raw verification key bytes. The private key is never exposed.
    pub fn public_key(&self) -> &[u8] {
        self.keys.public_key_bytes()
    }

    /// Issue a token for `user_id` / `email`.
    pub fn create_token(
        &self,
        user_id: &str,
        email: &str,
        options: Option<&TokenOptions>,
    ) -> Result<String, TokenError> {
        self.create_token_at(user_id, email, options, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn create_token_at(
        &self,
        user_id: &str,
        email: &str,
        options: Option<&TokenOptions>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if user_id.is_empty() {
            return Err(TokenError::InvalidInput("user ID cannot be empty".into()));
        }
        if email.is_empty() {
            return Err(TokenError::InvalidInput("email cannot be empty".into()));
        }

        let explicit_id = options
            .and_then(|o| o.token_id.as_deref())
            .filter(|id| !id.is_empty());
        let token_id = match explicit_id {
            Some(id) => id.to_string(),
            None => generate_token_id()?,
        };

        let mut payload = Payload {
            issuer: self.config.issuer.clone(),
            subject: user_id.to_string(),
            audience: self.config.audience.clone(),
            expiration: now + self.config.lifetime(),
            not_before: None,
            issued_at: now,
            token_id,
            user_id: user_id.to_string(),
            email: email.to_string(),
            roles: Vec::new(),
        };

        if let Some(opts) = options {
            if let Some(subject) = opts.subject.as_ref().filter(|s| !s.is_empty()) {
                payload.subject = subject.clone();
            }
            if let Some(not_before) = opts.not_before {
                payload.not_before = Some(not_before);
            }
            if let Some(roles) = &opts.roles {
                payload.roles = roles.clone();
            }
            if let Some(expiration) = opts.expiration {
                payload.expiration = expiration;
            }
        }

        let token = codec::sign(&payload, self.keys.keypair())?;
        tracing::debug!(
            user_id = %payload.user_id,
            token_id = %payload.token_id,
            expires_at = %payload.expiration,
            "issued token"
        );
        Ok(token)
    }

    /// Verify `token` against the current time.
    pub fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        self.verify_token_at(token, Utc::now())
    }

    /// Verify `token` as if the current time were `now`.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// signature, expiration, not-before, issuer, audience, user ID.
    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Payload, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidInput("token cannot be empty".into()));
        }

        let payload = codec::verify(token, self.keys.public_key())?;

        if payload.is_expired_at(now) {
            return Err(TokenError::TokenExpired {
                expired_at: payload.expiration,
            });
        }

        if let Some(not_before) = payload.not_before {
            if now < not_before {
                return Err(TokenError::TokenNotYetValid { not_before });
            }
        }

        // An empty value on either side means "no constraint".
        if !payload.issuer.is_empty()
            && !self.config.issuer.is_empty()
            && payload.issuer != self.config.issuer
        {
            return Err(TokenError::InvalidIssuer {
                expected: self.config.issuer.clone(),
                found: payload.issuer,
            });
        }

        if !payload.audience.is_empty()
            && !self.config.audience.is_empty()
            && payload.audience != self.config.audience
        {
            return Err(TokenError::InvalidAudience {
                expected: self.config.audience.clone(),
                found: payload.audience,
            });
        }

        if payload.user_id.is_empty() {
            return Err(TokenError::MalformedToken("missing user ID".into()));
        }

        Ok(payload)
    }
}

fn generate_token_id() -> Result<String, TokenError> {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!(error = %e, "failed to generate token identifier");
        TokenError::Signing(format!("failed to generate token identifier: {e}"))
    })?;
    Ok(hex::encode(bytes))
}
