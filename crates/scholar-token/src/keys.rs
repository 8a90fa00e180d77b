//! Keypair management for token signing.
//!
//! Keys live on disk as two raw files inside a key directory:
//! `private.key` (32-byte Ed25519 seed, mode 0600) and `public.key`
//! (32-byte Ed25519 verification key, mode 0644). Both exist or neither.

use crate::error::TokenError;
use biscuit_auth::{Algorithm, KeyPair, PrivateKey, PublicKey};
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// File name of the signing key inside the key directory.
pub const PRIVATE_KEY_FILE: &str = "private.key";
/// File name of the verification key inside the key directory.
pub const PUBLIC_KEY_FILE: &str = "public.key";
/// Ed25519 private key (seed) length in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

const PRIVATE_KEY_MODE: u32 = 0o600;
const PUBLIC_KEY_MODE: u32 = 0o644;

/// An immutable Ed25519 keypair used to sign and verify tokens.
pub struct KeyStore {
    keypair: KeyPair,
    public_key: PublicKey,
    public_key_bytes: Vec<u8>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("public_key", &hex::encode(&self.public_key_bytes))
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Make sure a keypair exists in `dir`, generating one if the directory has none.
    ///
    /// Existing keys are never overwritten. A directory holding only one of the
    /// two key files is a misconfiguration and fails.
    pub fn ensure(dir: &Path) -> Result<(), TokenError> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        match (private_path.exists(), public_path.exists()) {
            (true, true) => return Ok(()),
            (false, false) => {}
            (true, false) => {
                return Err(TokenError::key_io(
                    &public_path,
                    "public key is missing but private key exists",
                ));
            }
            (false, true) => {
                return Err(TokenError::key_io(
                    &private_path,
                    "private key is missing but public key exists",
                ));
            }
        }

        fs::create_dir_all(dir).map_err(|e| {
            TokenError::key_io(dir, format!("failed to create key directory: {e}"))
        })?;

        let private_bytes = random_seed(dir)?;
        let keypair = keypair_from_seed(dir, &private_bytes)?;
        let public_bytes = keypair.public().to_bytes().to_vec();

        // Both temp files are fully written before either becomes visible.
        let private_tmp = write_temp(dir, &private_bytes, PRIVATE_KEY_MODE)?;
        let public_tmp = write_temp(dir, &public_bytes, PUBLIC_KEY_MODE)?;
        persist(private_tmp, &private_path)?;
        persist(public_tmp, &public_path)?;

        tracing::info!(dir = %dir.display(), "generated new signing keypair");
        Ok(())
    }

    /// Load a keypair from `dir`, checking sizes and that the two keys belong together.
    pub fn load(dir: &Path) -> Result<Self, TokenError> {
        let private_bytes = read_key(&dir.join(PRIVATE_KEY_FILE), PRIVATE_KEY_SIZE, "private")?;
        let public_bytes = read_key(&dir.join(PUBLIC_KEY_FILE), PUBLIC_KEY_SIZE, "public")?;

        let keypair = keypair_from_seed(dir, &private_bytes)?;
        let public_key = keypair.public();
        if public_key.to_bytes().to_vec() != public_bytes {
            return Err(TokenError::key_io(
                dir.join(PUBLIC_KEY_FILE),
                "public key does not match private key",
            ));
        }

        tracing::debug!(dir = %dir.display(), "loaded signing keypair");
        Ok(Self {
            keypair,
            public_key,
            public_key_bytes: public_bytes,
        })
    }

    /// Ensure then load: the usual way to get keys at startup.
    pub fn open(dir: &Path) -> Result<Self, TokenError> {
        Self::ensure(dir)?;
        Self::load(dir)
    }

    /// Generate a keypair that only lives in memory.
    pub fn generate() -> Result<Self, TokenError> {
        let origin = Path::new("<memory>");
        let seed = random_seed(origin)?;
        let keypair = keypair_from_seed(origin, &seed)?;
        let public_key = keypair.public();
        let public_key_bytes = public_key.to_bytes().to_vec();

        Ok(Self {
            keypair,
            public_key,
            public_key_bytes,
        })
    }

    /// The verification key.
    pub fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    /// Raw verification key bytes, as stored in `public.key`.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    pub(crate) fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

fn random_seed(origin: &Path) -> Result<[u8; PRIVATE_KEY_SIZE], TokenError> {
    let mut bytes = [0u8; PRIVATE_KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::key_io(origin, format!("failed to generate keys: {e}")))?;
    Ok(bytes)
}

fn keypair_from_seed(origin: &Path, seed: &[u8]) -> Result<KeyPair, TokenError> {
    let private_key = PrivateKey::from_bytes(seed, Algorithm::Ed25519)
        .map_err(|e| TokenError::key_io(origin, format!("invalid private key: {e}")))?;
    Ok(KeyPair::from(&private_key))
}

fn read_key(path: &Path, expected: usize, label: &str) -> Result<Vec<u8>, TokenError> {
    let bytes = fs::read(path)
        .map_err(|e| TokenError::key_io(path, format!("failed to read {label} key: {e}")))?;

    if bytes.len() != expected {
        return Err(TokenError::key_io(
            path,
            format!(
                "invalid {label} key size: expected {expected}, got {}",
                bytes.len()
            ),
        ));
    }

    Ok(bytes)
}

fn write_temp(dir: &Path, bytes: &[u8], mode: u32) -> Result<NamedTempFile, TokenError> {
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| TokenError::key_io(dir, format!("failed to create key file: {e}")))?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| TokenError::key_io(tmp.path(), format!("failed to write key: {e}")))?;

    set_mode(&tmp, mode)?;
    Ok(tmp)
}

#[cfg(unix)]
fn set_mode(tmp: &NamedTempFile, mode: u32) -> Result<(), TokenError> {
    use std::os::unix::fs::PermissionsExt;

    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|e| TokenError::key_io(tmp.path(), format!("failed to set key permissions: {e}")))
}

#[cfg(not(unix))]
fn set_mode(_tmp: &NamedTempFile, _mode: u32) -> Result<(), TokenError> {
    Ok(())
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<(), TokenError> {
    tmp.persist_noclobber(path)
        .map_err(|e| TokenError::key_io(path, format!("failed to write key: {}", e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_creates_two_fixed_size_files() {
        let dir = tempdir().unwrap();
        let key_dir = dir.path().join("keys");

        KeyStore::ensure(&key_dir).unwrap();

        let mut names: Vec<_> = fs::read_dir(&key_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec![PRIVATE_KEY_FILE, PUBLIC_KEY_FILE]);

        let private = fs::read(key_dir.join(PRIVATE_KEY_FILE)).unwrap();
        let public = fs::read(key_dir.join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(private.len(), PRIVATE_KEY_SIZE);
        assert_eq!(public.len(), PUBLIC_KEY_SIZE);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        KeyStore::ensure(dir.path()).unwrap();
        let private = fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap();
        let public = fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap();

        KeyStore::ensure(dir.path()).unwrap();

        assert_eq!(fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap(), private);
        assert_eq!(fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap(), public);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_open_loads_generated_keys() {
        let dir = tempdir().unwrap();
        let store = KeyStore::open(dir.path()).unwrap();
        let public = fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(store.public_key_bytes(), public.as_slice());

        let reloaded = KeyStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.public_key_bytes(), store.public_key_bytes());
    }

    #[test]
    fn test_partial_key_directory_is_rejected() {
        let dir = tempdir().unwrap();
        KeyStore::ensure(dir.path()).unwrap();
        fs::remove_file(dir.path().join(PUBLIC_KEY_FILE)).unwrap();

        let err = KeyStore::ensure(dir.path()).unwrap_err();
        assert!(matches!(err, TokenError::KeyIo { .. }));
        assert!(!dir.path().join(PUBLIC_KEY_FILE).exists());
    }

    #[test]
    fn test_load_rejects_wrong_key_size() {
        let dir = tempdir().unwrap();
        KeyStore::ensure(dir.path()).unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), [7u8; 64]).unwrap();

        let err = KeyStore::load(dir.path()).unwrap_err();
        match err {
            TokenError::KeyIo { message, .. } => {
                assert!(message.contains("expected 32, got 64"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_mismatched_pair() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        KeyStore::ensure(first.path()).unwrap();
        KeyStore::ensure(second.path()).unwrap();
        fs::copy(
            second.path().join(PUBLIC_KEY_FILE),
            first.path().join(PUBLIC_KEY_FILE),
        )
        .unwrap();

        let err = KeyStore::load(first.path()).unwrap_err();
        assert!(matches!(err, TokenError::KeyIo { .. }));
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempdir().unwrap();
        let err = KeyStore::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, TokenError::KeyIo { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        KeyStore::ensure(dir.path()).unwrap();

        let mode = |name: &str| {
            fs::metadata(dir.path().join(name))
                .unwrap()
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode(PRIVATE_KEY_FILE), 0o600);
        assert_eq!(mode(PUBLIC_KEY_FILE), 0o644);
    }

    #[test]
    fn test_generate_in_memory() {
        let a = KeyStore::generate().unwrap();
        let b = KeyStore::generate().unwrap();
        assert_eq!(a.public_key_bytes().len(), PUBLIC_KEY_SIZE);
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }
}
