//! Token management commands.
//!
//! `scholar token mint` - Mint an access token.
//! `scholar token verify` - Verify a token and show its claims.

use crate::MakerArgs;
use anyhow::Context;
use scholar_token::{KeyStore, Payload, TokenMaker, TokenMakerConfig, TokenOptions};
use std::fs;
use std::path::Path;

fn maker_config(args: &MakerArgs) -> TokenMakerConfig {
    TokenMakerConfig::default()
        .with_key_directory(&args.key_dir)
        .with_issuer(&args.issuer)
        .with_audience(&args.audience)
}

/// Mint a token, creating the keypair first if needed.
pub fn mint(
    args: &MakerArgs,
    user_id: &str,
    email: &str,
    roles: Vec<String>,
    lifetime: &str,
) -> anyhow::Result<String> {
    let lifetime = humantime::parse_duration(lifetime)
        .with_context(|| format!("invalid lifetime {lifetime:?}"))?;
    let maker = TokenMaker::new(maker_config(args).with_token_lifetime(lifetime))
        .with_context(|| format!("failed to open keys in {}", args.key_dir.display()))?;

    let opts = (!roles.is_empty()).then(|| TokenOptions::new().with_roles(roles));
    let token = maker.create_token(user_id, email, opts.as_ref())?;

    tracing::debug!(%user_id, "minted token");
    Ok(token)
}

/// Verify a token given inline or as a path to a file holding it.
pub fn verify(args: &MakerArgs, token: &str) -> anyhow::Result<Payload> {
    let token = if Path::new(token).exists() {
        fs::read_to_string(token)
            .with_context(|| format!("failed to read token file {token}"))?
            .trim()
            .to_string()
    } else {
        token.trim().to_string()
    };

    // Only read existing keys: a mistyped directory must not get a new keypair.
    let keys = KeyStore::load(&args.key_dir)
        .with_context(|| format!("failed to load keys from {}", args.key_dir.display()))?;
    let maker = TokenMaker::with_key_store(maker_config(args), keys)?;
    Ok(maker.verify_token(&token)?)
}
