//! The name registry: username ↔ connection token, kept in lock-step
//! under a single mutex.
//!
//! `Token` stands in for the C original's raw file descriptor — it's
//! the `mio::Token` the reactor uses to identify a registered
//! connection. Lock order throughout the crate is registry → per-fd
//! buffers → per-fd write lock; nothing in here ever calls back into
//! another locked subsystem while holding the registry lock.

use std::collections::HashMap;

use mio::Token;
use parking_lot::Mutex;

/// Bidirectional username ↔ token map with mutual exclusion.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, Token>,
    by_token: HashMap<Token, String>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim `name` for `token`. Returns `false`, leaving
    /// the registry unchanged, if the name is already live.
    pub fn try_register(&self, name: &str, token: Token) -> bool {
        let mut inner = self.inner.lock();
        if inner.by_name.contains_key(name) {
            return false;
        }
        inner.by_name.insert(name.to_owned(), token);
        inner.by_token.insert(token, name.to_owned());
        true
    }

    /// Looks up the token currently owning `name`, if any.
    pub fn lookup_by_name(&self, name: &str) -> Option<Token> {
        self.inner.lock().by_name.get(name).copied()
    }

    /// Looks up the username currently registered for `token`, if any.
    pub fn lookup_by_token(&self, token: Token) -> Option<String> {
        self.inner.lock().by_token.get(&token).cloned()
    }

    /// Removes both directions of the mapping for `token`. Returns the
    /// name that was removed, or `None` if `token` was never
    /// registered or has already been evicted — eviction is
    /// idempotent.
    pub fn evict(&self, token: Token) -> Option<String> {
        let mut inner = self.inner.lock();
        let name = inner.by_token.remove(&token)?;
        inner.by_name.remove(&name);
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_both_directions() {
        let registry = Registry::new();
        assert!(registry.try_register("alice", Token(1)));

        assert_eq!(registry.lookup_by_name("alice"), Some(Token(1)));
        assert_eq!(registry.lookup_by_token(Token(1)), Some("alice".to_owned()));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = Registry::new();
        assert!(registry.try_register("alice", Token(1)));
        assert!(!registry.try_register("alice", Token(2)));

        assert_eq!(registry.lookup_by_name("alice"), Some(Token(1)));
    }

    #[test]
    fn eviction_frees_the_name_for_reuse() {
        let registry = Registry::new();
        registry.try_register("alice", Token(1));
        assert_eq!(registry.evict(Token(1)), Some("alice".to_owned()));

        assert_eq!(registry.lookup_by_name("alice"), None);
        assert_eq!(registry.lookup_by_token(Token(1)), None);
        assert!(registry.try_register("alice", Token(2)));
    }

    #[test]
    fn eviction_is_idempotent() {
        let registry = Registry::new();
        registry.try_register("alice", Token(1));

        assert_eq!(registry.evict(Token(1)), Some("alice".to_owned()));
        assert_eq!(registry.evict(Token(1)), None);
    }
}
