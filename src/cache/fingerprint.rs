//! Content fingerprints used as cache keys
//!
//! Hashes the ordered `(path, length, content)` tuples of a normalized
//! source set, then the lock state, then an optional salt. Every field is
//! length-prefixed, so no two distinct inputs share a byte stream.

use crate::cache::lockfile::LockState;
use crate::source::SourceSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Bumped whenever the hashed layout changes
const FORMAT_TAG: &[u8] = b"preflight-fingerprint-v1";

/// Opaque SHA-256 digest of a source set and lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Full lowercase hex (64 chars)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for display
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse a full hex fingerprint
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid fingerprint hex"))
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Fingerprint a normalized source set together with its lock state
pub fn fingerprint(sources: &SourceSet, lock: &LockState) -> Fingerprint {
    fingerprint_salted(sources, lock, None)
}

/// Fingerprint with an extra salt (e.g. toolchain identity)
pub fn fingerprint_salted(sources: &SourceSet, lock: &LockState, salt: Option<&str>) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(FORMAT_TAG);

    hasher.update((sources.len() as u64).to_be_bytes());
    for (path, contents) in sources.iter() {
        update_field(&mut hasher, path.as_bytes());
        update_field(&mut hasher, contents);
    }

    hasher.update((lock.lockfiles.len() as u64).to_be_bytes());
    for lockfile in &lock.lockfiles {
        update_field(&mut hasher, lockfile.ecosystem.to_string().as_bytes());
        update_field(&mut hasher, &lockfile.contents);
    }

    match salt {
        Some(salt) => {
            hasher.update([1u8]);
            update_field(&mut hasher, salt.as_bytes());
        }
        None => hasher.update([0u8]),
    }

    Fingerprint(hasher.finalize().into())
}
