//! Token signing and signature verification.
//!
//! A token is a single-block Biscuit. Every claim becomes one authority fact:
//! `issuer`, `subject`, `audience`, `user_id`, `email`, `token_id` (strings),
//! `issued_at`, `expiration`, `not_before` (unix milliseconds) and one
//! `role` fact per role. Empty optional claims are left out.

use crate::claims::Payload;
use crate::error::TokenError;
use biscuit_auth::builder::{AuthorizerBuilder, Rule};
use biscuit_auth::datalog::RunLimits;
use biscuit_auth::macros::fact;
use biscuit_auth::{Authorizer, Biscuit, KeyPair, PublicKey};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Sign `payload` into a token string.
pub fn sign(payload: &Payload, keypair: &KeyPair) -> Result<String, TokenError> {
    let signing = |e: biscuit_auth::error::Token| TokenError::Signing(e.to_string());
    let mut builder = Biscuit::builder();

    if !payload.issuer.is_empty() {
        builder = builder
            .fact(fact!("issuer({issuer})", issuer = payload.issuer.clone()))
            .map_err(signing)?;
    }
    if !payload.subject.is_empty() {
        builder = builder
            .fact(fact!("subject({subject})", subject = payload.subject.clone()))
            .map_err(signing)?;
    }
    if !payload.audience.is_empty() {
        builder = builder
            .fact(fact!("audience({audience})", audience = payload.audience.clone()))
            .map_err(signing)?;
    }
    if !payload.token_id.is_empty() {
        builder = builder
            .fact(fact!("token_id({token_id})", token_id = payload.token_id.clone()))
            .map_err(signing)?;
    }
    if !payload.user_id.is_empty() {
        builder = builder
            .fact(fact!("user_id({user_id})", user_id = payload.user_id.clone()))
            .map_err(signing)?;
    }
    if !payload.email.is_empty() {
        builder = builder
            .fact(fact!("email({email})", email = payload.email.clone()))
            .map_err(signing)?;
    }
    for role in &payload.roles {
        builder = builder
            .fact(fact!("role({role})", role = role.clone()))
            .map_err(signing)?;
    }

    builder = builder
        .fact(fact!(
            "issued_at({timestamp})",
            timestamp = payload.issued_at.timestamp_millis()
        ))
        .map_err(signing)?;
    builder = builder
        .fact(fact!(
            "expiration({timestamp})",
            timestamp = payload.expiration.timestamp_millis()
        ))
        .map_err(signing)?;
    if let Some(not_before) = payload.not_before {
        builder = builder
            .fact(fact!(
                "not_before({timestamp})",
                timestamp = not_before.timestamp_millis()
            ))
            .map_err(signing)?;
    }

    let biscuit = builder.build(keypair).map_err(signing)?;
    biscuit.to_base64().map_err(signing)
}

/// Check the signature of `token` against `public_key` and read its claims.
///
/// Nothing inside the token is looked at until the signature chain checks out.
pub fn verify(token: &str, public_key: PublicKey) -> Result<Payload, TokenError> {
    let token = token.trim();
    let biscuit = Biscuit::from_base64(token, public_key)
        .map_err(|e| TokenError::SignatureInvalid(e.to_string()))?;

    // The parser tolerates some encodings that differ from what was signed;
    // only the exact issued string is accepted.
    let canonical = biscuit
        .to_base64()
        .map_err(|e| TokenError::SignatureInvalid(e.to_string()))?;
    if canonical != token {
        return Err(TokenError::SignatureInvalid(
            "token encoding does not match its signed content".into(),
        ));
    }

    // Issued tokens have exactly one block; anything appended is a modification.
    if biscuit.block_count() != 1 {
        return Err(TokenError::SignatureInvalid(format!(
            "expected 1 block, found {}",
            biscuit.block_count()
        )));
    }

    let mut authorizer = AuthorizerBuilder::new()
        .set_limits(claim_query_limits())
        .build(&biscuit)
        .map_err(|e| TokenError::MalformedToken(e.to_string()))?;

    let issued_at = required_timestamp(&mut authorizer, "issued_at")?;
    let expiration = required_timestamp(&mut authorizer, "expiration")?;
    let not_before = optional_timestamp(&mut authorizer, "not_before")?;

    let mut roles = query_strings(&mut authorizer, "data($x) <- role($x)")?;
    roles.sort();
    roles.dedup();

    Ok(Payload {
        issuer: first_string(&mut authorizer, "data($x) <- issuer($x)")?,
        subject: first_string(&mut authorizer, "data($x) <- subject($x)")?,
        audience: first_string(&mut authorizer, "data($x) <- audience($x)")?,
        expiration,
        not_before,
        issued_at,
        token_id: first_string(&mut authorizer, "data($x) <- token_id($x)")?,
        user_id: first_string(&mut authorizer, "data($x) <- user_id($x)")?,
        email: first_string(&mut authorizer, "data($x) <- email($x)")?,
        roles,
    })
}

/// Datalog budget for reading claims; must hold up under concurrent load.
fn claim_query_limits() -> RunLimits {
    RunLimits {
        max_time: Duration::from_secs(1),
        ..RunLimits::default()
    }
}

fn parse_rule(rule: &str) -> Result<Rule, TokenError> {
    rule.parse()
        .map_err(|e: biscuit_auth::error::Token| TokenError::MalformedToken(e.to_string()))
}

fn query_strings(authorizer: &mut Authorizer, rule: &str) -> Result<Vec<String>, TokenError> {
    let res: Vec<(String,)> = authorizer
        .query(parse_rule(rule)?)
        .map_err(|e| TokenError::MalformedToken(e.to_string()))?;
    Ok(res.into_iter().map(|(s,)| s).collect())
}

fn first_string(authorizer: &mut Authorizer, rule: &str) -> Result<String, TokenError> {
    Ok(query_strings(authorizer, rule)?
        .into_iter()
        .next()
        .unwrap_or_default())
}

fn optional_timestamp(
    authorizer: &mut Authorizer,
    name: &str,
) -> Result<Option<DateTime<Utc>>, TokenError> {
    let rule = format!("data($t) <- {name}($t)");
    let res: Vec<(i64,)> = authorizer
        .query(parse_rule(&rule)?)
        .map_err(|e| TokenError::MalformedToken(e.to_string()))?;

    match res.into_iter().next() {
        None => Ok(None),
        Some((millis,)) => DateTime::<Utc>::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| {
                TokenError::MalformedToken(format!("{name} out of range: {millis}"))
            }),
    }
}

fn required_timestamp(
    authorizer: &mut Authorizer,
    name: &str,
) -> Result<DateTime<Utc>, TokenError> {
    optional_timestamp(authorizer, name)?
        .ok_or_else(|| TokenError::MalformedToken(format!("missing {name} claim")))
}
