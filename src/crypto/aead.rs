use super::{KEY_LEN, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::{Error, Result};
use chacha20poly1305::{
    Key, Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit},
};
use getrandom::fill;
use zeroize::Zeroizing;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| Error::internal("OS random generator unavailable"))
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate nonce
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

/// Output of [`seal`]: ciphertext (same length as the plaintext) plus the
/// nonce and detached tag needed to open it.
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Encrypt plaintext under a fresh random nonce
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8], associated_data: &[u8]) -> Result<Sealed> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = generate_nonce()?;

    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let tag = cipher
        .encrypt_in_place_detached(
            XNonce::from_slice(&nonce),
            associated_data,
            buffer.as_mut_slice(),
        )
        .map_err(|_| Error::internal("encryption failed"))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(Sealed {
        ciphertext: std::mem::take(&mut *buffer),
        nonce,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate ciphertext.
///
/// Any length mismatch or tag failure yields the same
/// `AuthenticationFailed` error and no plaintext.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    tag: &[u8],
    ciphertext: &[u8],
    associated_data: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(Error::authentication_failed());
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            XNonce::from_slice(nonce),
            associated_data,
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| Error::authentication_failed())?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn seal_open_roundtrip() {
        let key = [3u8; KEY_LEN];
        let sealed = seal(&key, b"secret data", b"ad").unwrap();

        assert_eq!(sealed.ciphertext.len(), b"secret data".len());

        let plaintext = open(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"ad").unwrap();
        assert_eq!(plaintext.as_slice(), b"secret data");
    }

    #[test]
    fn wrong_associated_data_fails() {
        let key = [3u8; KEY_LEN];
        let sealed = seal(&key, b"secret data", b"ad").unwrap();

        let err = open(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn short_tag_is_rejected_without_panicking() {
        let key = [3u8; KEY_LEN];
        let sealed = seal(&key, b"secret data", b"").unwrap();

        let err = open(&key, &sealed.nonce, &sealed.tag[..8], &sealed.ciphertext, b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn nonces_are_fresh() {
        let key = [3u8; KEY_LEN];
        let a = seal(&key, b"x", b"").unwrap();
        let b = seal(&key, b"x", b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }
}
