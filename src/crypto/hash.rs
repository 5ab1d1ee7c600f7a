//! SHA-256 hashing of identity assertions and seeds.

use sha2::{Digest, Sha256};

use super::{DIGEST_LEN, PUBLIC_ID_LABEL};

/// Hashes a raw identity assertion into a fixed 32-byte digest.
///
/// Unkeyed and deterministic. Empty input is accepted; rejecting empty
/// assertions is the caller's policy.
pub fn digest(assertion: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(assertion).into()
}

/// One-way map from a wallet seed to its public identifier.
pub(crate) fn public_identifier(seed: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(PUBLIC_ID_LABEL);
    hasher.update(seed);
    hasher.finalize().into()
}
