//! Whole-handshake round trip over a loopback socket pair: server side
//! runs the real handshake driver, the test plays the client's three
//! steps by hand against the public crypto API.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use cryptorelay::crypto::{aes_open, aes_seal, AesKey, PublicKey};
use cryptorelay::server::directory::Directory;
use cryptorelay::server::handshake;

#[test]
fn handshake_establishes_a_shared_aes_key() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let directory = Directory::new();
        handshake::perform(stream, &directory)
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"alice").unwrap();

    let mut scratch = [0u8; 1024];
    let n = client.read(&mut scratch).unwrap();
    let server_public_key = PublicKey::import_public_der(&scratch[..n]).unwrap();

    let client_aes_key = AesKey::generate();
    let encrypted = server_public_key.rsa_encrypt(client_aes_key.as_bytes()).unwrap();
    client.write_all(&encrypted).unwrap();

    let (_stream, username, server_aes_key) = server_thread.join().unwrap().expect("handshake should succeed");
    assert_eq!(username, "alice");

    // A field sealed under the client's key opens cleanly under the
    // key the server derived from the same exchange.
    let sealed = aes_seal(b"hello", &client_aes_key).unwrap();
    assert_eq!(aes_open(&sealed, &server_aes_key).unwrap(), b"hello");
}

#[test]
fn handshake_rejects_a_duplicate_username() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let directory = Directory::new();
    directory.register_secured(
        "alice",
        mio::Token(1),
        std::sync::Arc::new(cryptorelay::send::WriteHandle::new(
            TcpStream::connect(addr).unwrap(),
        )),
        std::sync::Arc::new(AesKey::generate()),
    );
    let _ = listener.accept().unwrap(); // drain the connection used to build the write handle above

    let server_thread = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handshake::perform(stream, &directory)
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"alice").unwrap();

    let mut scratch = [0u8; 1024];
    let n = client.read(&mut scratch).unwrap();
    assert!(n > 0);

    let outcome = server_thread.join().unwrap();
    assert!(outcome.is_none());
}
