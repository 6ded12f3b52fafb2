//! [`Parcel`]: a signed [`Manifest`] wrapped in the nested-archive envelope format (§4.3).
//!
//! The outer container is a gzipped TAR with three members -- `message` (the inner TAR's raw
//! bytes), `signature` (a 64-byte Ed25519 detached signature over `message`), and `pubkey` (the
//! 32-byte verification key). The inner TAR holds `manifest.json` plus every file the manifest
//! names. Reading enforces verify-before-parse: nothing inside `message` is touched until the
//! outer signature has checked out.
//!
//! Tamper-evidence is a property of `message`, not of every byte of the `.pcl` file: a gzip
//! stream's 10-byte header carries an MTIME, XFL, and OS field (offsets 4-9) that
//! `flate2::read::GzDecoder` parses but never checks against anything, since they don't affect
//! how the DEFLATE payload decompresses and aren't covered by the trailing CRC32/ISIZE. Flipping
//! one of those bytes changes the file without changing `message`, so it decompresses
//! identically and verifies. Every other byte -- the gzip magic/flags, the DEFLATE payload, the
//! CRC32/ISIZE trailer, and the inner and outer TAR headers (checksummed) and member bytes -- is
//! covered, either by gzip's own integrity check or by the Ed25519 signature over `message`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use ed25519_dalek::SigningKey;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::attrs::File;
use crate::manifest::{Manifest, ManifestError};
use crate::signature::{self, SignatureError};
use crate::utils::{append_tar_entry, read_tar_entries};

const MESSAGE_MEMBER: &str = "message";
const SIGNATURE_MEMBER: &str = "signature";
const PUBKEY_MEMBER: &str = "pubkey";
const MANIFEST_MEMBER: &str = "manifest.json";

/// Errors raised while building or reading a parcel envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("error reading or writing the envelope")]
    Io(#[from] std::io::Error),
    #[error("destination already exists; pass force to overwrite")]
    AlreadyExists,
    #[error("outer archive is missing member `{0}`")]
    MissingMember(&'static str),
    #[error("signature verification failed")]
    Signature(#[from] SignatureError),
    #[error("inner manifest is malformed")]
    Manifest(#[from] ManifestError),
    #[error("inner manifest.json is not valid JSON")]
    Json(#[from] serde_json::Error),
}

/// A signed parcel: a [`Manifest`] plus the signature and public key that sealed it, populated
/// only after a build or a successful load (§3's "Parcel" definition).
#[derive(Debug, Clone)]
pub struct Parcel {
    manifest: Manifest,
    pubkey: Option<Vec<u8>>,
    signature: Option<Vec<u8>>,
}

impl Parcel {
    /// Wraps an unsigned manifest. `pubkey`/`signature` are populated by [`save_parcel`] or
    /// [`load_parcel`].
    pub fn new(manifest: Manifest) -> Self {
        Parcel {
            manifest,
            pubkey: None,
            signature: None,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    pub fn pubkey(&self) -> Option<&[u8]> {
        self.pubkey.as_deref()
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }
}

/// Builds the inner TAR (`manifest.json` plus every embedded file) and returns its raw bytes --
/// this is the `message` that gets signed.
fn build_inner_archive(manifest: &Manifest) -> Result<Vec<u8>, EnvelopeError> {
    let mut builder = tar::Builder::new(Vec::new());
    let document = serde_json::to_vec(&manifest.document())?;
    append_tar_entry(&mut builder, MANIFEST_MEMBER, &document)?;
    for file in manifest.files() {
        append_tar_entry(&mut builder, file.name(), file.bytes())?;
    }
    Ok(builder.into_inner()?)
}

/// Builds a signed envelope from `manifest` and writes it to `path`.
///
/// If `key` is `None`, a fresh Ed25519 key is generated. The key used (caller-supplied or
/// freshly generated) is returned so callers can persist it with [`crate::signature::save_key`].
#[instrument(skip(manifest, key), fields(name = manifest.name(), version = %manifest.version()))]
pub fn save_parcel(
    manifest: &Manifest,
    path: impl AsRef<Path>,
    key: Option<SigningKey>,
    force: bool,
) -> Result<(Parcel, SigningKey), EnvelopeError> {
    let path = path.as_ref();
    let message = build_inner_archive(manifest)?;

    let key = key.unwrap_or_else(signature::generate_key);
    let signature = signature::sign(&key, &message);
    let pubkey = key.verifying_key().to_bytes().to_vec();

    trace!(bytes = message.len(), "inner archive built");

    let mut outer = tar::Builder::new(Vec::new());
    append_tar_entry(&mut outer, MESSAGE_MEMBER, &message)?;
    append_tar_entry(&mut outer, SIGNATURE_MEMBER, &signature.to_bytes())?;
    append_tar_entry(&mut outer, PUBKEY_MEMBER, &pubkey)?;
    let outer_tar = outer.into_inner()?;

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&outer_tar)?;
    let gz_bytes = gz.finish()?;

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(EnvelopeError::AlreadyExists)
        }
        Err(err) => return Err(err.into()),
    };
    file.write_all(&gz_bytes)?;

    debug!(bytes = gz_bytes.len(), "parcel written");

    let parcel = Parcel {
        manifest: manifest.clone(),
        pubkey: Some(pubkey),
        signature: Some(signature.to_bytes().to_vec()),
    };
    Ok((parcel, key))
}

/// Reads and, unless `verify` is `false`, cryptographically verifies a parcel envelope.
///
/// No byte of `message` is interpreted until verification (when requested) has passed -- see
/// the module docs' verify-before-parse invariant.
#[instrument(skip(path))]
pub fn load_parcel(path: impl AsRef<Path>, verify: bool) -> Result<Parcel, EnvelopeError> {
    let path = path.as_ref();
    let raw = std::fs::read(path)?;
    let gz = flate2::read::GzDecoder::new(raw.as_slice());
    let mut outer_members = read_tar_entries(gz)?;

    let message = outer_members
        .remove(MESSAGE_MEMBER)
        .ok_or(EnvelopeError::MissingMember(MESSAGE_MEMBER))?;
    let signature_bytes = outer_members
        .remove(SIGNATURE_MEMBER)
        .ok_or(EnvelopeError::MissingMember(SIGNATURE_MEMBER))?;
    let pubkey_bytes = outer_members
        .remove(PUBKEY_MEMBER)
        .ok_or(EnvelopeError::MissingMember(PUBKEY_MEMBER))?;

    if verify {
        let verifying_key = signature::verifying_key_from_bytes(&pubkey_bytes)?;
        let sig = signature::signature_from_bytes(&signature_bytes)?;
        match signature::verify(&verifying_key, &message, &sig) {
            Ok(()) => trace!("signature verified"),
            Err(err) => {
                warn!("envelope signature verification failed");
                return Err(err.into());
            }
        }
    } else {
        warn!("loading parcel without signature verification");
    }

    let mut inner_members = read_tar_entries(message.as_slice())?;
    let manifest_bytes = inner_members
        .remove(MANIFEST_MEMBER)
        .ok_or(EnvelopeError::MissingMember(MANIFEST_MEMBER))?;
    let document: serde_json::Value = serde_json::from_slice(&manifest_bytes)?;

    let files: Vec<File> = inner_members
        .into_iter()
        .map(|(name, bytes)| File::from_bytes(name, bytes))
        .collect();
    let manifest = Manifest::from_document(document, files)?;

    Ok(Parcel {
        manifest,
        pubkey: Some(pubkey_bytes),
        signature: Some(signature_bytes),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::version::Version;

    fn example_manifest() -> Manifest {
        let mut m = Manifest::new("example", Version::parse("1.0.0").unwrap());
        m.add_file(File::from_bytes("example.cfg", b"key=value\n".to_vec()));
        m
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.pcl");
        let manifest = example_manifest();

        let (built, key) = save_parcel(&manifest, &path, None, false).unwrap();
        assert!(built.pubkey().is_some());
        assert_eq!(built.pubkey().unwrap(), key.verifying_key().to_bytes());

        let loaded = load_parcel(&path, true).unwrap();
        assert_eq!(loaded.manifest().name(), "example");
        assert_eq!(loaded.manifest().version().to_string(), "1.0.0");
        assert_eq!(loaded.manifest().get_file("example.cfg").unwrap().bytes(), b"key=value\n");
        assert_eq!(loaded.pubkey(), built.pubkey());
    }

    #[test]
    fn save_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.pcl");
        let manifest = example_manifest();
        save_parcel(&manifest, &path, None, false).unwrap();
        assert!(matches!(
            save_parcel(&manifest, &path, None, false),
            Err(EnvelopeError::AlreadyExists)
        ));
        assert!(save_parcel(&manifest, &path, None, true).is_ok());
    }

    #[test]
    fn tampering_with_signed_bytes_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.pcl");
        let manifest = example_manifest();
        save_parcel(&manifest, &path, None, false).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        // A single flipped trailing byte may land in the gzip trailer (corrupting the stream)
        // or in the tar payload (corrupting `message`); either way, it must not produce a
        // successfully verified parcel.
        let result = load_parcel(&path, true);
        assert!(result.is_err());
    }

    #[test]
    fn load_without_verify_skips_signature_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.pcl");
        let manifest = example_manifest();
        save_parcel(&manifest, &path, None, false).unwrap();
        assert!(load_parcel(&path, false).is_ok());
    }
}
