//! Cryptographic primitives for wallet derivation and backups.
//!
//! Provides assertion hashing, Argon2id stretching, and the AEAD layer.

pub mod aead;
pub mod hash;
pub mod kdf;

pub use aead::{Sealed, generate_nonce, generate_salt, open, seal};
pub use hash::digest;
pub use kdf::{KdfParams, stretch};

/// Length of the backup salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of the Poly1305 authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of derived keys and wallet seeds (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of an assertion digest (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Domain label for wallet seed stretching.
pub const WALLET_SEED_LABEL: &[u8] = b"wallet-seed-v1";
/// Domain label for passphrase key stretching.
pub const BACKUP_KEY_LABEL: &[u8] = b"backup-key-v1";
/// Domain label for the seed to public identifier hash.
pub const PUBLIC_ID_LABEL: &[u8] = b"wallet-public-id-v1";
