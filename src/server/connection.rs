//! The reactor-owned per-connection state.
//!
//! `stream` and `reassembler` are touched only by the reactor thread.
//! `write` and `aes_key` are `Arc`s so routing tasks can carry their
//! own clone onto a worker thread without borrowing the `Connection`
//! itself.

use std::sync::Arc;

use mio::net::TcpStream;

use crate::crypto::AesKey;
use crate::reassembly::Reassembler;
use crate::send::WriteHandle;

pub struct Connection {
    pub stream: TcpStream,
    pub reassembler: Reassembler,
    pub username: String,
    pub write: Arc<WriteHandle>,
    pub aes_key: Arc<AesKey>,
}
