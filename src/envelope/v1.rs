//! Envelope format v1.
//!
//! V1 Layout:
//! ```text
//! VERSION (1) | SALT_LEN (1) | SALT | NONCE_LEN (1) | NONCE | TAG_LEN (1) | TAG | CIPHERTEXT
//! ```
//!
//! Length prefixes are written for forward compatibility, but v1 only
//! accepts the lengths of its own primitives: a 16-byte salt, a 24-byte
//! XChaCha20 nonce and a 16-byte Poly1305 tag.

use super::{BackupEnvelope, VER_LEN};
use crate::{
    crypto::{NONCE_LEN, SALT_LEN, TAG_LEN},
    error::{Error, Result},
};

/// Version tag of this layout.
pub const VERSION_V1: u8 = 1;

const LEN_PREFIX: usize = 1;

/// Smallest valid v1 envelope: all headers plus a one-byte ciphertext.
pub const MIN_LEN: usize = VER_LEN + 3 * LEN_PREFIX + SALT_LEN + NONCE_LEN + TAG_LEN + 1;

/// Reads one length-prefixed field and advances `offset`.
fn read_field<'a>(data: &'a [u8], offset: &mut usize, expected: usize, name: &str) -> Result<&'a [u8]> {
    let len = *data
        .get(*offset)
        .ok_or_else(|| Error::invalid_input(format!("envelope truncated before {name} length")))?
        as usize;
    *offset += LEN_PREFIX;

    if len != expected {
        return Err(Error::invalid_input(format!(
            "invalid {name} length for v1: {len}"
        )));
    }

    let field = data
        .get(*offset..*offset + len)
        .ok_or_else(|| Error::invalid_input(format!("envelope truncated inside {name}")))?;
    *offset += len;

    Ok(field)
}

/// Parses a v1 envelope.
///
/// # Errors
///
/// Returns `InvalidInput` if the envelope is truncated, a length prefix
/// does not match v1, or the ciphertext is empty.
pub fn parse(data: &[u8]) -> Result<BackupEnvelope> {
    if data.first() != Some(&VERSION_V1) {
        return Err(Error::invalid_input("not a v1 envelope"));
    }

    let mut offset = VER_LEN;

    let salt = read_field(data, &mut offset, SALT_LEN, "salt")?.to_vec();
    let nonce = read_field(data, &mut offset, NONCE_LEN, "nonce")?.to_vec();
    let auth_tag = read_field(data, &mut offset, TAG_LEN, "tag")?.to_vec();

    let ciphertext = data[offset..].to_vec();
    if ciphertext.is_empty() {
        return Err(Error::invalid_input("envelope has no ciphertext"));
    }

    Ok(BackupEnvelope::new(salt, nonce, auth_tag, ciphertext))
}

/// Serializes an envelope to v1 bytes.
///
/// # Errors
///
/// Returns `InvalidInput` if the version is not v1 or if salt, nonce or
/// tag have the wrong length.
pub fn serialize(envelope: &BackupEnvelope) -> Result<Vec<u8>> {
    if envelope.version() != VERSION_V1 {
        return Err(Error::invalid_input("wrong version for v1 serializer"));
    }

    if envelope.salt().len() != SALT_LEN {
        return Err(Error::invalid_input("invalid salt length for v1"));
    }

    if envelope.nonce().len() != NONCE_LEN {
        return Err(Error::invalid_input("invalid nonce length for v1"));
    }

    if envelope.auth_tag().len() != TAG_LEN {
        return Err(Error::invalid_input("invalid tag length for v1"));
    }

    let mut buf = Vec::with_capacity(MIN_LEN - 1 + envelope.ciphertext().len());

    buf.push(VERSION_V1);

    buf.push(SALT_LEN as u8);
    buf.extend_from_slice(envelope.salt());
    buf.push(NONCE_LEN as u8);
    buf.extend_from_slice(envelope.nonce());
    buf.push(TAG_LEN as u8);
    buf.extend_from_slice(envelope.auth_tag());

    buf.extend_from_slice(envelope.ciphertext());

    Ok(buf)
}
