//! The routing task body, run on a worker thread.
//!
//! Re-sealing on forward is mandatory: each connection has its own AES
//! key, so a sender-sealed ciphertext is meaningless to the recipient.
//! Forwarding therefore opens both fields under the sender's key and
//! reseals both under the recipient's.

use log::{debug, info, warn};

use crate::config::SERVER_NAME;
use crate::crypto::{aes_open, aes_seal};
use crate::wire::Frame;

use super::directory::{Directory, Peer};

/// Parses, opens, looks up, and forwards or bounces one frame. Never
/// panics; every failure path logs and returns.
pub fn route(frame: Frame, sender_name: String, sender: Peer, directory: &Directory) {
    let (name_ciphertext, message_ciphertext) = frame.into_parts();

    let recipient_plain = match aes_open(&name_ciphertext, &sender.aes_key) {
        Ok(plain) => plain,
        Err(_) => {
            debug!("{}: dropping frame, could not open recipient field", sender_name);
            return;
        }
    };
    let recipient_name = match String::from_utf8(recipient_plain) {
        Ok(name) => name,
        Err(_) => {
            debug!("{}: dropping frame, recipient field is not valid UTF-8", sender_name);
            return;
        }
    };

    match directory.peer_by_name(&recipient_name) {
        Some((_, recipient)) => {
            let message_plain = match aes_open(&message_ciphertext, &sender.aes_key) {
                Ok(plain) => plain,
                Err(_) => {
                    debug!("{}: dropping frame, could not open message field", sender_name);
                    return;
                }
            };
            forward(&sender_name, &message_plain, &recipient);
        }
        None => {
            info!("{} -> {}: no such user", sender_name, recipient_name);
            bounce_no_such_user(&sender);
        }
    }
}

fn forward(sender_name: &str, message_plain: &[u8], recipient: &Peer) {
    let sealed_sender = match aes_seal(sender_name.as_bytes(), &recipient.aes_key) {
        Ok(sealed) => sealed,
        Err(e) => {
            warn!("failed to seal sender name for forwarding: {}", e);
            return;
        }
    };
    let sealed_message = match aes_seal(message_plain, &recipient.aes_key) {
        Ok(sealed) => sealed,
        Err(e) => {
            warn!("failed to seal message for forwarding: {}", e);
            return;
        }
    };
    let frame = match Frame::new(sealed_sender, sealed_message) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("failed to build forwarded frame: {}", e);
            return;
        }
    };
    if let Err(e) = recipient.write.send(&frame.encode()) {
        warn!("failed to deliver frame: {}", e);
    }
}

fn bounce_no_such_user(sender: &Peer) {
    let sealed_name = match aes_seal(SERVER_NAME.as_bytes(), &sender.aes_key) {
        Ok(sealed) => sealed,
        Err(_) => return,
    };
    let sealed_message = match aes_seal(b"No such user.", &sender.aes_key) {
        Ok(sealed) => sealed,
        Err(_) => return,
    };
    let frame = match Frame::new(sealed_name, sealed_message) {
        Ok(frame) => frame,
        Err(_) => return,
    };
    let _ = sender.write.send(&frame.encode());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesKey;
    use crate::send::WriteHandle;
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;

    fn peer() -> (Peer, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        let key = Arc::new(AesKey::generate());
        (
            Peer {
                write: Arc::new(WriteHandle::new(server_side)),
                aes_key: key,
            },
            client,
        )
    }

    #[test]
    fn unknown_recipient_bounces_no_such_user() {
        let directory = Directory::new();
        let (sender, mut sender_sock) = peer();

        let frame = Frame::new(
            aes_seal(b"carol", &sender.aes_key).unwrap(),
            aes_seal(b"hello", &sender.aes_key).unwrap(),
        )
        .unwrap();

        route(frame, "alice".to_owned(), sender.clone(), &directory);

        let mut buf = [0u8; 1024];
        let n = std::io::Read::read(&mut sender_sock, &mut buf).unwrap();
        let reply = Frame::decode(&buf[..n]).unwrap();
        assert_eq!(aes_open(reply.name_field(), &sender.aes_key).unwrap(), b"Server");
        assert_eq!(
            aes_open(reply.message_field(), &sender.aes_key).unwrap(),
            b"No such user."
        );
    }

    #[test]
    fn known_recipient_receives_resealed_frame() {
        let directory = Directory::new();
        let (sender, _sender_sock) = peer();
        let (recipient, mut recipient_sock) = peer();
        directory.register_secured("bob", mio::Token(2), recipient.write.clone(), recipient.aes_key.clone());

        let frame = Frame::new(
            aes_seal(b"bob", &sender.aes_key).unwrap(),
            aes_seal(b"hello", &sender.aes_key).unwrap(),
        )
        .unwrap();

        route(frame, "alice".to_owned(), sender, &directory);

        let mut buf = [0u8; 1024];
        let n = std::io::Read::read(&mut recipient_sock, &mut buf).unwrap();
        let delivered = Frame::decode(&buf[..n]).unwrap();
        assert_eq!(
            aes_open(delivered.name_field(), &recipient.aes_key).unwrap(),
            b"alice"
        );
        assert_eq!(
            aes_open(delivered.message_field(), &recipient.aes_key).unwrap(),
            b"hello"
        );
    }
}
