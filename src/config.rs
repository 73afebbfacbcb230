//! Named tunables for `cryptorelay`.
//!
//! The original C++ implementation spread these across `#define`s in
//! each translation unit; collecting them here keeps the magic numbers
//! in one place and documented.

/// Size of the reactor's thread-local read scratch buffer, in bytes.
///
/// A single `read` never pulls more than this many bytes off the wire
/// at once; the per-connection receive buffer accumulates across reads
/// until whole frames can be extracted.
pub const READ_SCRATCH: usize = 1024;

/// Length in bytes of an AES-GCM IV (96 bits).
pub const AES_IV_LEN: usize = 12;

/// Length in bytes of an AES-GCM authentication tag (128 bits).
pub const AES_TAG_LEN: usize = 16;

/// Length in bytes of an AES-256 key.
pub const AES_KEY_LEN: usize = 32;

/// Minimum length of a sealed AES-GCM field: IV + tag, with zero-length
/// plaintext.
pub const AES_SEALED_MIN_LEN: usize = AES_IV_LEN + AES_TAG_LEN;

/// Modulus size, in bits, of the server's RSA key pair.
pub const RSA_MODULUS_BITS: usize = 2048;

/// Maximum number of retries the send serializer performs when a write
/// would block.
pub const SEND_MAX_RETRIES: u32 = 100;

/// Backoff between send retries.
pub const SEND_RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(1);

/// Display name used for server-originated notices (duplicate username,
/// unknown recipient).
pub const SERVER_NAME: &str = "Server";
