//! Cryptographic primitives backing the handshake and the framing
//! protocol: RSA-2048/PKCS#1 v1.5 for the one-shot key exchange, and
//! AES-256-GCM for sealing every frame field thereafter.
//!
//! Algorithms and modes are fixed by the wire protocol, not
//! configurable. Callers never reach for a cipher suite directly, only
//! the operations below.

pub mod aead;
pub mod keys;

pub use aead::{aes_open, aes_seal, AesKey};
pub use keys::{KeyPair, PublicKey};
