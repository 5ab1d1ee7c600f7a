use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fixed message for every AEAD verification failure. A wrong passphrase
/// and a corrupted envelope must look identical to the caller.
const AUTH_FAILED_MESSAGE: &str = "invalid passphrase or corrupted backup";

/// Category of a failure. Callers dispatch on this, not on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or malformed assertion, plaintext or envelope.
    InvalidInput,
    /// Passphrase shorter than the configured minimum.
    WeakPassphrase,
    /// Envelope version byte is not one this build can read.
    UnsupportedVersion,
    /// Wrong passphrase or tampered envelope.
    AuthenticationFailed,
    /// Envelope decrypted to key material for a different wallet.
    IdentifierMismatch,
    /// Host blob store failed to read or write.
    Storage,
    /// OS random source or KDF engine failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::WeakPassphrase => "weak passphrase",
            ErrorKind::UnsupportedVersion => "unsupported version",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::IdentifierMismatch => "identifier mismatch",
            ErrorKind::Storage => "storage error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub(crate) fn weak_passphrase(min_len: usize) -> Self {
        Self::new(
            ErrorKind::WeakPassphrase,
            format!("passphrase must be at least {min_len} bytes"),
        )
    }

    pub(crate) fn unsupported_version(version: u8) -> Self {
        Self::new(
            ErrorKind::UnsupportedVersion,
            format!("unsupported envelope version: {version}"),
        )
    }

    pub(crate) fn authentication_failed() -> Self {
        Self::new(ErrorKind::AuthenticationFailed, AUTH_FAILED_MESSAGE)
    }

    pub(crate) fn identifier_mismatch() -> Self {
        Self::new(
            ErrorKind::IdentifierMismatch,
            "backup belongs to a different wallet",
        )
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
