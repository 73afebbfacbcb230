//! AES-256-GCM sealing, used for every frame field once a connection
//! is secured.
//!
//! Sealed format: `iv(12) || ciphertext(n) || tag(16)`. The IV is
//! generated fresh, from the OS RNG, for every call to [`aes_seal`].

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use rsa::rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

use crate::config::{AES_IV_LEN, AES_KEY_LEN, AES_SEALED_MIN_LEN};
use crate::error::*;

/// A 32-byte AES-256 key, scrubbed from memory on drop.
pub struct AesKey {
    bytes: [u8; AES_KEY_LEN],
}

impl AesKey {
    /// Wraps exactly `AES_KEY_LEN` bytes of key material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AES_KEY_LEN {
            return Err(Error::simple(ErrorKind::Crypto));
        }
        let mut owned = [0u8; AES_KEY_LEN];
        owned.copy_from_slice(bytes);
        Ok(Self { bytes: owned })
    }

    /// Generates a random AES-256 key, e.g. the client's per-connection key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Borrows the raw key bytes, e.g. to RSA-encrypt them for transport.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new_from_slice(&self.bytes).expect("AesKey always holds AES_KEY_LEN bytes")
    }
}

impl Drop for AesKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Seals `plain` under `key`, returning `iv || ciphertext || tag`.
pub fn aes_seal(plain: &[u8], key: &AesKey) -> Result<Vec<u8>> {
    let mut iv = [0u8; AES_IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = key.cipher();
    let ciphertext = cipher
        .encrypt((&iv).into(), plain)
        .simple(ErrorKind::Crypto)?;

    let mut sealed = Vec::with_capacity(AES_IV_LEN + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Opens a field previously produced by [`aes_seal`] under the same
/// `key`. Fails if `sealed` is shorter than `AES_SEALED_MIN_LEN` or the
/// authentication tag doesn't match.
pub fn aes_open(sealed: &[u8], key: &AesKey) -> Result<Vec<u8>> {
    if sealed.len() < AES_SEALED_MIN_LEN {
        return Err(Error::simple(ErrorKind::Crypto));
    }
    let (iv, rest) = sealed.split_at(AES_IV_LEN);

    let cipher = key.cipher();
    cipher
        .decrypt(iv.into(), rest)
        .simple(ErrorKind::Crypto)
}
