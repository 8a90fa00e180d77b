//! # scholar-token
//!
//! Signed identity tokens for the Scholar API.
//!
//! This crate provides functionality for:
//! - Loading or generating the Ed25519 keypair that signs tokens
//! - Encoding a claim set into a signed token and back
//! - Issuing tokens for an authenticated user and verifying them end to end
//!
//! ## Verification order
//!
//! [`TokenMaker::verify_token`] runs its checks in a fixed order and reports
//! the first failure:
//!
//! | Step | Failure |
//! |------|---------|
//! | Signature | [`TokenError::SignatureInvalid`] |
//! | Expiration | [`TokenError::TokenExpired`] |
//! | Not-before | [`TokenError::TokenNotYetValid`] |
//! | Issuer | [`TokenError::InvalidIssuer`] |
//! | Audience | [`TokenError::InvalidAudience`] |
//! | User ID | [`TokenError::MalformedToken`] |
//!
//! No claim is read before the signature has been checked.

pub mod claims;
pub mod codec;
pub mod error;
pub mod keys;
pub mod maker;

pub use biscuit_auth::PublicKey;
pub use claims::{Payload, TokenOptions};
pub use error::TokenError;
pub use keys::KeyStore;
pub use maker::{TokenMaker, TokenMakerConfig};
