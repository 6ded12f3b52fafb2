//! Ed25519 signing keys: generation, on-disk storage, and sign/verify helpers used by
//! [`crate::envelope`].
//!
//! Key files hold a raw 32-byte seed with owner-only permissions (§6). This module does not
//! know about keyrings, roles, or multi-signature; the system verifies exactly one signature
//! per parcel (§4.3).

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Errors raised while generating, loading, or using signing keys.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("key file already exists; pass force to overwrite")]
    AlreadyExists,
    #[error("error reading or writing key file")]
    Io(#[from] std::io::Error),
    #[error("key file has the wrong length: expected {expected} bytes, found {found}")]
    WrongLength { expected: usize, found: usize },
    #[error("signature verification failed")]
    Unverified,
}

/// Generates a fresh Ed25519 signing key using the OS random source.
pub fn generate_key() -> SigningKey {
    let mut rng = rand::rngs::OsRng;
    SigningKey::generate(&mut rng)
}

/// Loads a signing key from its raw 32-byte seed at `path`.
pub fn load_key(path: impl AsRef<Path>) -> Result<SigningKey, SignatureError> {
    let mut file = fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SignatureError::WrongLength {
            expected: 32,
            found: bytes.len(),
        })?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Persists `key`'s raw 32-byte seed to `path` with owner-only permissions. Refuses to
/// overwrite an existing file unless `force` is set (§6).
pub fn save_key(key: &SigningKey, path: impl AsRef<Path>, force: bool) -> Result<(), SignatureError> {
    let path = path.as_ref();
    let mut options = OpenOptions::new();
    options.write(true).truncate(true);
    if force {
        options.create(true);
    } else {
        options.create_new(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(SignatureError::AlreadyExists)
        }
        Err(err) => return Err(err.into()),
    };

    file.write_all(&key.to_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Generates a key and persists it to `path` in one step, returning the key so the caller can
/// use it immediately without a round trip through disk (mirrors the build flow's "generate,
/// sign, then persist" order, §4.3).
pub fn keygen(path: impl AsRef<Path>, force: bool) -> Result<SigningKey, SignatureError> {
    let key = generate_key();
    save_key(&key, path, force)?;
    Ok(key)
}

/// Signs `message` with `key`, returning the 64-byte detached signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> Signature {
    key.sign(message)
}

/// Verifies `signature` over `message` against `verifying_key`.
pub fn verify(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| SignatureError::Unverified)
}

/// Parses a raw 32-byte verification key.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, SignatureError> {
    let raw: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::WrongLength {
        expected: 32,
        found: bytes.len(),
    })?;
    VerifyingKey::from_bytes(&raw).map_err(|_| SignatureError::WrongLength {
        expected: 32,
        found: bytes.len(),
    })
}

/// Parses a 64-byte detached signature.
pub fn signature_from_bytes(bytes: &[u8]) -> Result<Signature, SignatureError> {
    let raw: [u8; 64] = bytes.try_into().map_err(|_| SignatureError::WrongLength {
        expected: 64,
        found: bytes.len(),
    })?;
    Ok(Signature::from_bytes(&raw))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = generate_key();
        let sig = sign(&key, b"hello parcel");
        verify(&key.verifying_key(), b"hello parcel", &sig).expect("signature should verify");
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = generate_key();
        let sig = sign(&key, b"hello parcel");
        assert!(verify(&key.verifying_key(), b"goodbye parcel", &sig).is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        let key = generate_key();
        save_key(&key, &path, false).unwrap();
        let loaded = load_key(&path).unwrap();
        assert_eq!(key.to_bytes(), loaded.to_bytes());
    }

    #[test]
    fn save_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        save_key(&generate_key(), &path, false).unwrap();
        assert!(matches!(
            save_key(&generate_key(), &path, false),
            Err(SignatureError::AlreadyExists)
        ));
        assert!(save_key(&generate_key(), &path, true).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        save_key(&generate_key(), &path, false).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
