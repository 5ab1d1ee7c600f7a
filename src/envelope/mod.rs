//! Backup envelope and its byte layout.
//!
//! Provides version-aware parsing and serialization of encrypted backups.

use crate::error::{Error, Result};

pub mod v1;

/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest envelope version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

/// A self-contained encrypted backup.
///
/// Holds everything needed to decrypt the payload given the right
/// passphrase: version, KDF salt, AEAD nonce, detached tag and ciphertext.
/// Fields are private so an envelope cannot change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEnvelope {
    version: u8,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    auth_tag: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl BackupEnvelope {
    /// Creates a current-version envelope from its components.
    pub(crate) fn new(salt: Vec<u8>, nonce: Vec<u8>, auth_tag: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self::with_version(CURRENT_VERSION, salt, nonce, auth_tag, ciphertext)
    }

    pub(crate) fn with_version(
        version: u8,
        salt: Vec<u8>,
        nonce: Vec<u8>,
        auth_tag: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            version,
            salt,
            nonce,
            auth_tag,
            ciphertext,
        }
    }

    /// Returns the envelope format version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the salt used for passphrase stretching.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the AEAD nonce.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Returns the detached authentication tag.
    pub fn auth_tag(&self) -> &[u8] {
        &self.auth_tag
    }

    /// Returns the encrypted payload.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serializes the envelope for the host store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Parses an envelope read back from the host store.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        parse(data)
    }
}

/// Parses serialized envelope bytes.
///
/// Dispatches on the leading version byte.
///
/// # Errors
///
/// - `UnsupportedVersion` if the version byte is unknown
/// - `InvalidInput` if the data is empty, truncated or inconsistent
pub fn parse(data: &[u8]) -> Result<BackupEnvelope> {
    let Some(&version) = data.first() else {
        return Err(Error::invalid_input("backup envelope is empty"));
    };

    match version {
        v1::VERSION_V1 => v1::parse(data),
        other => Err(Error::unsupported_version(other)),
    }
}

/// Serializes an envelope to bytes.
///
/// # Errors
///
/// Returns an error if the version is unsupported or a field does not fit
/// the version's layout.
pub fn serialize(envelope: &BackupEnvelope) -> Result<Vec<u8>> {
    match envelope.version() {
        v1::VERSION_V1 => v1::serialize(envelope),
        other => Err(Error::unsupported_version(other)),
    }
}
