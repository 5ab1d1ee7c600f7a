//! Deterministic wallet key material derived from identity assertions.
//!
//! ```text
//! assertion ──SHA-256──▶ digest ──Argon2id("wallet-seed-v1")──▶ seed ──SHA-256──▶ public id
//! ```
//!
//! Anyone who can reproduce the assertion can reproduce the seed. The
//! derivation gives recoverability, not proof of possession of the
//! identity behind the assertion.

use std::fmt;

use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    crypto::{self, DIGEST_LEN, KEY_LEN, KdfParams, WALLET_SEED_LABEL},
    error::{Error, Result},
};

/// Length of a wallet seed.
pub const SEED_LEN: usize = KEY_LEN;
/// Length of a public identifier.
pub const PUBLIC_ID_LEN: usize = DIGEST_LEN;

/// Wallet seed plus its public identifier.
///
/// The identifier is always computed from the seed, never supplied, so two
/// equal seeds always carry equal identifiers. The seed is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WalletKeyMaterial {
    seed: [u8; SEED_LEN],
    public_identifier: [u8; PUBLIC_ID_LEN],
}

impl WalletKeyMaterial {
    /// Rebuilds key material from a raw seed.
    pub fn from_seed(seed: [u8; SEED_LEN]) -> Self {
        let public_identifier = crypto::hash::public_identifier(&seed);
        Self {
            seed,
            public_identifier,
        }
    }

    /// Rebuilds key material from a seed slice, e.g. a decrypted backup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless `seed` is exactly [`SEED_LEN`] bytes.
    pub fn from_seed_slice(seed: &[u8]) -> Result<Self> {
        let mut buf: [u8; SEED_LEN] = seed
            .try_into()
            .map_err(|_| Error::invalid_input(format!("seed must be {SEED_LEN} bytes")))?;
        let material = Self::from_seed(buf);
        buf.zeroize();
        Ok(material)
    }

    pub fn seed(&self) -> &[u8; SEED_LEN] {
        &self.seed
    }

    pub fn public_identifier(&self) -> &[u8; PUBLIC_ID_LEN] {
        &self.public_identifier
    }

    /// Short hex prefix of the public identifier, for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.public_identifier[..4])
    }
}

// the seed never appears in debug output
impl fmt::Debug for WalletKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKeyMaterial")
            .field("public_identifier", &hex::encode(self.public_identifier))
            .finish_non_exhaustive()
    }
}

/// Turns identity assertions into [`WalletKeyMaterial`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver {
    kdf: KdfParams,
}

impl KeyDeriver {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Derives the wallet for `assertion`.
    ///
    /// Same assertion and same KDF cost always give the same material.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `assertion` is empty
    /// - `Internal` if Argon2 fails
    pub fn derive_wallet(&self, assertion: &[u8]) -> Result<WalletKeyMaterial> {
        if assertion.is_empty() {
            return Err(Error::invalid_input("identity assertion must not be empty"));
        }

        debug!(assertion_len = assertion.len(), "deriving wallet seed");

        let mut digest = crypto::digest(assertion);
        let seed = crypto::stretch(&digest, WALLET_SEED_LABEL, &[], self.kdf);
        digest.zeroize();

        let material = WalletKeyMaterial::from_seed(*seed?);
        info!(wallet = %material.fingerprint(), "wallet derived");

        Ok(material)
    }
}
