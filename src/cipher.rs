//! Passphrase-based authenticated encryption of backup payloads.

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{
    crypto::{self, BACKUP_KEY_LABEL, KdfParams},
    envelope::{BackupEnvelope, CURRENT_VERSION},
    error::{Error, Result},
};

/// Encrypts and decrypts [`BackupEnvelope`]s under a passphrase.
///
/// Every call to [`encrypt`](Self::encrypt) draws a fresh salt, so every
/// envelope is sealed under its own key and a nonce is never used twice
/// with the same key. The cipher holds no state besides its KDF cost, so
/// one value can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupCipher {
    kdf: KdfParams,
}

impl BackupCipher {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Encrypts `plaintext` under a key stretched from `passphrase`.
    ///
    /// `associated_data` is authenticated but not stored; the same bytes
    /// must be supplied to [`decrypt`](Self::decrypt).
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `plaintext` is empty
    /// - `Internal` if the OS random source or Argon2 fails
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        passphrase: &[u8],
        associated_data: &[u8],
    ) -> Result<BackupEnvelope> {
        if plaintext.is_empty() {
            return Err(Error::invalid_input("backup payload must not be empty"));
        }

        let salt = crypto::generate_salt()?;
        let key = crypto::stretch(passphrase, BACKUP_KEY_LABEL, &salt, self.kdf)?;
        let sealed = crypto::seal(&key, plaintext, associated_data)?;

        debug!(
            payload_len = plaintext.len(),
            version = CURRENT_VERSION,
            "backup envelope sealed"
        );

        Ok(BackupEnvelope::new(
            salt.to_vec(),
            sealed.nonce.to_vec(),
            sealed.tag.to_vec(),
            sealed.ciphertext,
        ))
    }

    /// Authenticates and decrypts an envelope.
    ///
    /// Fails closed: on any verification failure no plaintext bytes are
    /// returned. The caller owns the returned buffer, which is wiped on drop.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` before any key derivation if the version is unknown
    /// - `AuthenticationFailed` for a wrong passphrase, wrong associated data
    ///   or any tampering with salt, nonce, tag or ciphertext
    pub fn decrypt(
        &self,
        envelope: &BackupEnvelope,
        passphrase: &[u8],
        associated_data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.version() != CURRENT_VERSION {
            warn!(version = envelope.version(), "rejecting backup envelope");
            return Err(Error::unsupported_version(envelope.version()));
        }

        let key = crypto::stretch(passphrase, BACKUP_KEY_LABEL, envelope.salt(), self.kdf)?;

        crypto::open(
            &key,
            envelope.nonce(),
            envelope.auth_tag(),
            envelope.ciphertext(),
            associated_data,
        )
    }
}
