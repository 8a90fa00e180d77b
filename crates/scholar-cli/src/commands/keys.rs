//! Key management commands.
//!
//! `scholar keys generate` - Create the signing keypair on disk.
//! `scholar keys show` - Print the public key.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use scholar_token::KeyStore;
use scholar_token::keys::{PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use std::path::Path;

/// Create the keypair in `dir` if it is not there yet.
pub fn generate(dir: &Path) -> anyhow::Result<()> {
    KeyStore::ensure(dir).with_context(|| format!("failed to prepare keys in {}", dir.display()))?;

    println!("✔ Signing keys ready:");
    println!("  Private key: {}", dir.join(PRIVATE_KEY_FILE).display());
    println!("  Public key:  {}", dir.join(PUBLIC_KEY_FILE).display());
    println!();
    println!("⚠️  Keep your private key secure! Never commit it to version control.");

    Ok(())
}

/// Base64 of the raw public key in `dir`.
pub fn show(dir: &Path) -> anyhow::Result<String> {
    let keys =
        KeyStore::load(dir).with_context(|| format!("failed to load keys from {}", dir.display()))?;
    Ok(STANDARD.encode(keys.public_key_bytes()))
}
