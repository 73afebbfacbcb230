//! `cryptorelay`: an encrypted point-to-point messaging relay.
//!
//! A central server relays unicast text messages between named
//! clients over TCP, secured end-to-end by a per-connection RSA-2048 +
//! AES-256-GCM handshake. See `client` and `server` for the two
//! binaries' shared logic.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod reassembly;
pub mod registry;
pub mod send;
pub mod server;
pub mod threadpool;
pub mod wire;
