//! Directory of secured connections: the name [`Registry`] plus, for
//! every registered token, the pieces a worker needs to route to or
//! reply to it — its write path and its AES key.
//!
//! AES keys are installed once, at handshake completion, and never
//! mutated afterwards, so sharing them with worker threads as
//! `Arc<AesKey>` needs no further synchronization beyond the map
//! lookup itself. Lock order is registry first, then this peer map,
//! then (inside `WriteHandle`) the per-socket write lock.

use std::collections::HashMap;
use std::sync::Arc;

use mio::Token;
use parking_lot::Mutex;

use crate::crypto::AesKey;
use crate::registry::Registry;
use crate::send::WriteHandle;

/// The shared state a worker needs to send to a registered peer.
#[derive(Clone)]
pub struct Peer {
    pub write: Arc<WriteHandle>,
    pub aes_key: Arc<AesKey>,
}

/// Name registry, extended with the per-peer handles workers need.
#[derive(Default)]
pub struct Directory {
    registry: Registry,
    peers: Mutex<HashMap<Token, Peer>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for `token` and records its write path and AES
    /// key. Returns `false`, touching nothing, if `name` is already
    /// live.
    pub fn register_secured(
        &self,
        name: &str,
        token: Token,
        write: Arc<WriteHandle>,
        aes_key: Arc<AesKey>,
    ) -> bool {
        if !self.registry.try_register(name, token) {
            return false;
        }
        self.peers.lock().insert(token, Peer { write, aes_key });
        true
    }

    /// Looks up a peer's token together with its write path and AES
    /// key, by username.
    pub fn peer_by_name(&self, name: &str) -> Option<(Token, Peer)> {
        let token = self.registry.lookup_by_name(name)?;
        let peer = self.peers.lock().get(&token)?.clone();
        Some((token, peer))
    }

    /// Looks up the username registered for `token`.
    pub fn name_by_token(&self, token: Token) -> Option<String> {
        self.registry.lookup_by_token(token)
    }

    /// Returns whether `name` is already claimed by a live connection.
    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.lookup_by_name(name).is_some()
    }

    /// Removes every trace of `token`: its registry entry and its
    /// peer record. Idempotent, like [`Registry::evict`].
    pub fn evict(&self, token: Token) -> Option<String> {
        let name = self.registry.evict(token);
        self.peers.lock().remove(&token);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_handle() -> Arc<WriteHandle> {
        use std::net::{TcpListener, TcpStream};
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        Arc::new(WriteHandle::new(server_side))
    }

    #[test]
    fn register_then_lookup_both_ways() {
        let dir = Directory::new();
        let key = Arc::new(AesKey::generate());
        assert!(dir.register_secured("alice", Token(1), write_handle(), key));

        let (token, peer) = dir.peer_by_name("alice").unwrap();
        assert_eq!(token, Token(1));
        assert_eq!(dir.name_by_token(Token(1)).as_deref(), Some("alice"));
        let _ = peer;
    }

    #[test]
    fn eviction_removes_peer_and_frees_name() {
        let dir = Directory::new();
        let key = Arc::new(AesKey::generate());
        dir.register_secured("alice", Token(1), write_handle(), key);

        assert_eq!(dir.evict(Token(1)).as_deref(), Some("alice"));
        assert!(dir.peer_by_name("alice").is_none());
        assert!(!dir.is_registered("alice"));
    }
}
