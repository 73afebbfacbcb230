//! Frame-forwarding round trip through the real routing logic and
//! reassembler, without a live reactor.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use cryptorelay::crypto::{aes_open, aes_seal, AesKey};
use cryptorelay::reassembly::Reassembler;
use cryptorelay::send::WriteHandle;
use cryptorelay::server::directory::{Directory, Peer};
use cryptorelay::server::routing::route;
use cryptorelay::wire::Frame;

fn peer_and_reader() -> (Peer, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server_side, _) = listener.accept().unwrap();
    let peer = Peer {
        write: Arc::new(WriteHandle::new(server_side)),
        aes_key: Arc::new(AesKey::generate()),
    };
    (peer, client)
}

#[test]
fn alice_sends_bob_a_message_and_bob_decodes_it() {
    let directory = Directory::new();
    let (alice, _alice_sock) = peer_and_reader();
    let (bob, mut bob_sock) = peer_and_reader();
    directory.register_secured("bob", mio::Token(2), bob.write.clone(), bob.aes_key.clone());

    let frame = Frame::new(
        aes_seal(b"bob", &alice.aes_key).unwrap(),
        aes_seal(b"hello", &alice.aes_key).unwrap(),
    )
    .unwrap();
    route(frame, "alice".to_owned(), alice, &directory);

    let mut scratch = [0u8; 1024];
    let n = bob_sock.read(&mut scratch).unwrap();
    let mut reassembler = Reassembler::new();
    reassembler.feed(&scratch[..n]);
    let frames = reassembler.extract_frames();
    assert_eq!(frames.len(), 1);

    let (from, message) = frames[0].clone().into_parts();
    assert_eq!(aes_open(&from, &bob.aes_key).unwrap(), b"alice");
    assert_eq!(aes_open(&message, &bob.aes_key).unwrap(), b"hello");
}

#[test]
fn two_back_to_back_messages_arrive_as_two_distinct_frames() {
    let directory = Directory::new();
    let (alice, _alice_sock) = peer_and_reader();
    let (bob, mut bob_sock) = peer_and_reader();
    directory.register_secured("bob", mio::Token(2), bob.write.clone(), bob.aes_key.clone());

    let first_payload = vec![0x41u8; 700];
    let second_payload = vec![0x42u8; 700];

    for payload in [&first_payload, &second_payload] {
        let frame = Frame::new(
            aes_seal(b"bob", &alice.aes_key).unwrap(),
            aes_seal(payload, &alice.aes_key).unwrap(),
        )
        .unwrap();
        route(frame, "alice".to_owned(), alice.clone(), &directory);
    }

    // The kernel may coalesce or split the two writes across reads;
    // keep reading until the reassembler has yielded both frames.
    let mut reassembler = Reassembler::new();
    let mut scratch = [0u8; 4096];
    let mut frames = Vec::new();
    while frames.len() < 2 {
        let n = bob_sock.read(&mut scratch).unwrap();
        reassembler.feed(&scratch[..n]);
        frames.extend(reassembler.extract_frames());
    }

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].message_field().len(), 28 + 700);
    assert_eq!(frames[1].message_field().len(), 28 + 700);
}
