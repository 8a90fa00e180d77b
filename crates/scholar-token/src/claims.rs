//! Token claims and per-call issuance options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed content of a token.
///
/// Registered claims use their short names when serialized (`iss`, `sub`,
/// `aud`, `exp`, `nbf`, `iat`, `jti`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Who issued the token.
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    /// Principal the token is about; the user ID unless overridden.
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    /// Intended recipient of the token.
    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,

    /// When the token stops being valid.
    #[serde(rename = "exp")]
    pub expiration: DateTime<Utc>,

    /// When the token starts being valid, if later than issuance.
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// When the token was issued.
    #[serde(rename = "iat")]
    pub issued_at: DateTime<Utc>,

    /// Unique token identifier.
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub token_id: String,

    /// Authenticated user ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,

    /// Authenticated user email.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    /// Role names. Order carries no meaning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Payload {
    /// Check if the payload carries `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the payload carries at least one of `required`.
    ///
    /// An empty requirement always passes.
    pub fn has_any_role<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.is_empty() || required.iter().any(|r| self.has_role(r.as_ref()))
    }

    /// Check if the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration
    }

    /// Check if the not-before bound has passed at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|nbf| now >= nbf)
    }
}

/// Optional overrides for a single `create_token` call.
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    /// Subject to use instead of the user ID.
    pub subject: Option<String>,
    /// Not-before bound.
    pub not_before: Option<DateTime<Utc>>,
    /// Explicit token identifier instead of a random one.
    pub token_id: Option<String>,
    /// Roles to embed.
    pub roles: Option<Vec<String>>,
    /// Explicit expiration instead of now + lifetime.
    pub expiration: Option<DateTime<Utc>>,
}

impl TokenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payload(roles: &[&str]) -> Payload {
        let now = Utc::now();
        Payload {
            issuer: "scholar_api".into(),
            subject: "u1".into(),
            audience: String::new(),
            expiration: now + Duration::minutes(15),
            not_before: None,
            issued_at: now,
            token_id: String::new(),
            user_id: "u1".into(),
            email: "a@example.com".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_role_membership() {
        let p = payload(&["admin", "user"]);
        assert!(p.has_role("admin"));
        assert!(!p.has_role("owner"));
        assert!(p.has_any_role(&["owner", "user"]));
        assert!(!p.has_any_role(&["owner"]));
        assert!(p.has_any_role::<&str>(&[]));
        assert!(payload(&[]).has_any_role::<&str>(&[]));
    }

    #[test]
    fn test_temporal_bounds() {
        let mut p = payload(&[]);
        assert!(!p.is_expired_at(p.expiration));
        assert!(p.is_expired_at(p.expiration + Duration::milliseconds(1)));

        assert!(p.is_active_at(p.issued_at));
        p.not_before = Some(p.issued_at + Duration::seconds(30));
        assert!(!p.is_active_at(p.issued_at));
        assert!(p.is_active_at(p.issued_at + Duration::seconds(30)));
    }

    #[test]
    fn test_serializes_registered_claim_names() {
        let p = payload(&["user"]);
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["iss"], "scholar_api");
        assert_eq!(value["sub"], "u1");
        assert_eq!(value["roles"][0], "user");
        assert!(value.get("aud").is_none());
        assert!(value.get("nbf").is_none());
        assert!(value.get("jti").is_none());

        let back: Payload = serde_json::from_value(value).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_token_options_builder() {
        let opts = TokenOptions::new()
            .with_subject("svc")
            .with_roles(["admin"])
            .with_token_id("abc");
        assert_eq!(opts.subject.as_deref(), Some("svc"));
        assert_eq!(opts.roles, Some(vec!["admin".to_string()]));
        assert_eq!(opts.token_id.as_deref(), Some("abc"));
        assert!(opts.not_before.is_none());
    }
}
