//! The handshake driver: username exchange, duplicate rejection, and
//! RSA/AES key establishment, run synchronously on a blocking socket
//! before the connection ever touches the reactor's readiness loop.

use std::io::{Read, Write};
use std::net::TcpStream;

use log::{debug, warn};

use crate::config::{READ_SCRATCH, SERVER_NAME};
use crate::crypto::{AesKey, KeyPair};
use crate::wire::Frame;

use super::directory::Directory;

/// Runs the three-step handshake to completion and returns the now
/// AES-secured socket, username, and key — or `None` if the connection
/// was rejected (duplicate name) or failed outright. In both `None`
/// cases the socket has already been written to (if applicable) and
/// the caller should simply drop it; no registry mutation has
/// occurred.
pub fn perform(mut stream: TcpStream, directory: &Directory) -> Option<(TcpStream, String, AesKey)> {
    let username = match read_datagram(&mut stream) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(name) if !name.is_empty() => name,
            _ => {
                debug!("handshake: username is not valid non-empty UTF-8");
                return None;
            }
        },
        Err(e) => {
            debug!("handshake: failed to read username: {}", e);
            return None;
        }
    };

    if directory.is_registered(&username) {
        reject_duplicate(&mut stream, &username);
        return None;
    }

    let keypair = match KeyPair::generate() {
        Ok(k) => k,
        Err(e) => {
            warn!("handshake: failed to generate RSA key pair: {}", e);
            return None;
        }
    };

    let der = match keypair.export_public_der() {
        Ok(der) => der,
        Err(e) => {
            warn!("handshake: failed to export public key: {}", e);
            return None;
        }
    };

    if let Err(e) = stream.write_all(&der) {
        debug!("handshake: failed to send public key to {}: {}", username, e);
        return None;
    }

    let encrypted_key = match read_datagram(&mut stream) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("handshake: failed to read AES key from {}: {}", username, e);
            return None;
        }
    };

    let key_bytes = match keypair.rsa_decrypt(&encrypted_key) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("handshake: failed to RSA-decrypt AES key from {}: {}", username, e);
            return None;
        }
    };

    let aes_key = match AesKey::from_bytes(&key_bytes) {
        Ok(key) => key,
        Err(e) => {
            debug!("handshake: malformed AES key from {}: {}", username, e);
            return None;
        }
    };

    Some((stream, username, aes_key))
}

fn reject_duplicate(stream: &mut TcpStream, username: &str) {
    debug!("handshake: rejecting duplicate username {}", username);
    let message = format!("Username {} already in use.", username);
    let frame = match Frame::new(SERVER_NAME.as_bytes().to_vec(), message.into_bytes()) {
        Ok(frame) => frame,
        Err(_) => return,
    };
    // No AES key exists yet on this path, so the rejection is sent
    // plaintext-framed.
    let _ = stream.write_all(&frame.encode());
    let _ = stream.flush();
}

fn read_datagram(stream: &mut TcpStream) -> crate::error::Result<Vec<u8>> {
    use crate::error::*;

    let mut buf = [0u8; READ_SCRATCH];
    let n = stream.read(&mut buf).wrapped(ErrorKind::Handshake)?;
    if n == 0 {
        return Err(Error::simple(ErrorKind::Handshake));
    }
    Ok(buf[..n].to_vec())
}
