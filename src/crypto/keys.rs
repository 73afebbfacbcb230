//! RSA-2048/PKCS#1 v1.5 key management: the half of the handshake used
//! to transport the per-connection AES key.
//!
//! The server is the only party that ever holds a [`KeyPair`]; the
//! client only ever sees a [`PublicKey`] imported from the wire.

use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::config::RSA_MODULUS_BITS;
use crate::error::*;

/// An RSA-2048 key pair, generated fresh for every accepted connection.
///
/// `generate` is infallible in the logical model of the handshake;
/// underlying OS RNG failures are treated as handshake aborts by the
/// caller, so we still surface a `Result` here rather than panicking.
pub struct KeyPair {
    private: RsaPrivateKey,
}

/// An imported RSA public key, used by the client to wrap the AES key
/// it generates.
pub struct PublicKey {
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generates a new RSA-2048 key pair with public exponent 65537
    /// (the `rsa` crate's default).
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .wrapped(ErrorKind::Crypto)?;
        Ok(Self { private })
    }

    /// Exports the public half as bare `RSAPublicKey` DER (PKCS#1, not
    /// `SubjectPublicKeyInfo`), ready to be sent as a single datagram.
    pub fn export_public_der(&self) -> Result<Vec<u8>> {
        let public = RsaPublicKey::from(&self.private);
        let der = public.to_pkcs1_der().wrapped(ErrorKind::Crypto)?;
        Ok(der.as_bytes().to_vec())
    }

    /// Decrypts a PKCS#1 v1.5 padded ciphertext, e.g. the client's
    /// RSA-wrapped AES key.
    pub fn rsa_decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
        if cipher.len() > self.private.size() {
            return Err(Error::simple(ErrorKind::Crypto));
        }
        self.private
            .decrypt(Pkcs1v15Encrypt, cipher)
            .simple(ErrorKind::Crypto)
    }
}

impl PublicKey {
    /// Imports a bare `RSAPublicKey` DER blob as received from the
    /// server. Fails on empty input or a malformed DER structure.
    pub fn import_public_der(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::simple(ErrorKind::Crypto));
        }
        let public = RsaPublicKey::from_pkcs1_der(bytes).simple(ErrorKind::Crypto)?;
        Ok(Self { public })
    }

    /// Encrypts `plain` with PKCS#1 v1.5 padding under this public key.
    /// Requires `plain.len() + 11 <= key_size_bytes`.
    pub fn rsa_encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
        if plain.len() + 11 > self.public.size() {
            return Err(Error::simple(ErrorKind::Crypto));
        }
        self.public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plain)
            .simple(ErrorKind::Crypto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_round_trip_and_rsa_round_trip() {
        let keypair = KeyPair::generate().expect("keygen");
        let der = keypair.export_public_der().expect("export der");

        let public = PublicKey::import_public_der(&der).expect("import der");
        let plain = b"0123456789abcdef0123456789abcdef";
        let cipher = public.rsa_encrypt(plain).expect("rsa encrypt");
        let decrypted = keypair.rsa_decrypt(&cipher).expect("rsa decrypt");

        assert_eq!(&decrypted[..], &plain[..]);
    }

    #[test]
    fn import_public_der_rejects_empty_input() {
        assert!(PublicKey::import_public_der(&[]).is_err());
    }

    #[test]
    fn rsa_encrypt_rejects_oversized_plaintext() {
        let keypair = KeyPair::generate().expect("keygen");
        let der = keypair.export_public_der().expect("export der");
        let public = PublicKey::import_public_der(&der).expect("import der");

        let too_big = vec![0u8; 2048];
        assert!(public.rsa_encrypt(&too_big).is_err());
    }
}
