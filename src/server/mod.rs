//! The relay server: a single reactor thread plus a worker pool.
//!
//! The reactor owns the listening socket and every client socket and
//! is the only thread that ever calls `read`. Workers only parse,
//! route, and write, via the `Arc<WriteHandle>`/`Arc<AesKey>` handed
//! to them when a connection is registered.

pub mod connection;
pub mod directory;
pub mod handshake;
pub mod routing;

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use mio::net::TcpListener as MioTcpListener;
use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Interest, Poll, Token};

use crate::config::READ_SCRATCH;
use crate::error::*;
use crate::reassembly::Reassembler;
use crate::threadpool::{Builder, ThreadPool};

use connection::Connection;
use directory::{Directory, Peer};

const LISTENER: Token = Token(0);

/// Binds `port` and runs the reactor loop until it hits a fatal
/// startup-class error. Never returns `Ok` in normal operation; the
/// server only stops on process signal or fatal I/O failure.
pub fn run(port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .wrapped(ErrorKind::Startup)?;

    let mut listener = MioTcpListener::bind(addr).wrapped(ErrorKind::Startup)?;
    let mut poll = Poll::new().wrapped(ErrorKind::Startup)?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .wrapped(ErrorKind::Startup)?;

    let directory = Arc::new(Directory::new());
    let pool = Builder::new().build();
    let mut connections: HashMap<Token, Connection> = HashMap::new();
    let mut next_token: usize = 1;
    let mut events = Events::with_capacity(128);

    info!("cryptorelay server listening on {}", addr);

    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::wrapped(ErrorKind::Startup, e));
        }

        // Collect before dispatching: handlers below mutate `connections`,
        // which `events` borrows from via the poll call above.
        let ready: Vec<(Token, bool)> = events
            .iter()
            .map(|e| (e.token(), e.is_read_closed() || e.is_error()))
            .collect();

        for (token, read_closed) in ready {
            if token == LISTENER {
                accept_loop(&listener, &mut poll, &mut connections, &mut next_token, &directory);
                continue;
            }

            let evict = read_closed || !drain_readable(token, &mut connections, &directory, &pool);
            if evict {
                evict_connection(token, &mut poll, &mut connections, &directory);
            }
        }
    }
}

fn accept_loop(
    listener: &MioTcpListener,
    poll: &mut Poll,
    connections: &mut HashMap<Token, Connection>,
    next_token: &mut usize,
    directory: &Arc<Directory>,
) {
    loop {
        match listener.accept() {
            Ok((mio_stream, peer_addr)) => {
                info!("accepted connection from {}", peer_addr);
                handshake_and_register(mio_stream, poll, connections, next_token, directory);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!("accept failed: {}", e);
                break;
            }
        }
    }
}

fn handshake_and_register(
    mio_stream: MioTcpStream,
    poll: &mut Poll,
    connections: &mut HashMap<Token, Connection>,
    next_token: &mut usize,
    directory: &Arc<Directory>,
) {
    let secured = match accept_handshake(mio_stream, directory) {
        Some(secured) => secured,
        None => return, // handshake module already handled rejection/failure and closed the socket
    };
    let (mut mio_stream, write, aes_key, username) = secured;

    let token = Token(*next_token);
    *next_token += 1;

    if let Err(e) = poll
        .registry()
        .register(&mut mio_stream, token, Interest::READABLE)
    {
        warn!("failed to register {} with the reactor: {}", username, e);
        return;
    }

    if !directory.register_secured(&username, token, write.clone(), aes_key.clone()) {
        // Lost a race with another connection claiming the same name
        // between the pre-handshake duplicate check and now.
        let _ = poll.registry().deregister(&mut mio_stream);
        debug!("{} was claimed by a concurrent connection; dropping", username);
        return;
    }

    info!("{} registered", username);
    connections.insert(
        token,
        Connection {
            stream: mio_stream,
            reassembler: Reassembler::new(),
            username,
            write,
            aes_key,
        },
    );
}

#[cfg(unix)]
fn accept_handshake(
    mio_stream: MioTcpStream,
    directory: &Directory,
) -> Option<(MioTcpStream, Arc<crate::send::WriteHandle>, Arc<crate::crypto::AesKey>, String)> {
    use std::net::TcpStream as StdTcpStream;
    use std::os::unix::io::{FromRawFd, IntoRawFd};

    // The handshake needs blocking reads/writes; the reactor's sockets
    // are always non-blocking. Hand the fd to a std::net::TcpStream for
    // the duration of the handshake, then hand it back.
    let std_stream = unsafe { StdTcpStream::from_raw_fd(mio_stream.into_raw_fd()) };
    if std_stream.set_nonblocking(false).is_err() {
        return None;
    }

    let (stream, username, aes_key) = handshake::perform(std_stream, directory)?;

    let write_stream = stream.try_clone().ok()?;
    if stream.set_nonblocking(true).is_err() {
        return None;
    }

    let mio_stream = unsafe { MioTcpStream::from_raw_fd(stream.into_raw_fd()) };

    Some((
        mio_stream,
        Arc::new(crate::send::WriteHandle::new(write_stream)),
        Arc::new(aes_key),
        username,
    ))
}

#[cfg(not(unix))]
fn accept_handshake(
    _mio_stream: MioTcpStream,
    _directory: &Directory,
) -> Option<(MioTcpStream, Arc<crate::send::WriteHandle>, Arc<crate::crypto::AesKey>, String)> {
    warn!("handshake blocking/non-blocking handoff is only implemented for unix targets");
    None
}

/// Reads everything currently available on `token`'s socket, feeding
/// whole frames to the worker pool. Returns `false` if the connection
/// should be evicted (EOF or fatal read error).
fn drain_readable(
    token: Token,
    connections: &mut HashMap<Token, Connection>,
    directory: &Arc<Directory>,
    pool: &ThreadPool,
) -> bool {
    let conn = match connections.get_mut(&token) {
        Some(conn) => conn,
        None => return false,
    };

    let mut scratch = [0u8; READ_SCRATCH];
    loop {
        match conn.stream.read(&mut scratch) {
            Ok(0) => return false,
            Ok(n) => conn.reassembler.feed(&scratch[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("read error on {}: {}", conn.username, e);
                return false;
            }
        }
    }

    for frame in conn.reassembler.extract_frames() {
        let sender_name = conn.username.clone();
        let sender_peer = Peer {
            write: conn.write.clone(),
            aes_key: conn.aes_key.clone(),
        };
        let directory = directory.clone();

        let submitted = pool.execute(move || {
            routing::route(frame, sender_name, sender_peer, &directory);
        });
        if let Err(e) = submitted {
            warn!("worker pool unavailable, dropping frame from {}: {}", conn.username, e);
        }
    }

    true
}

fn evict_connection(
    token: Token,
    poll: &mut Poll,
    connections: &mut HashMap<Token, Connection>,
    directory: &Arc<Directory>,
) {
    if let Some(mut conn) = connections.remove(&token) {
        let _ = poll.registry().deregister(&mut conn.stream);
        match directory.evict(token) {
            Some(name) => info!("{} disconnected", name),
            None => debug!("connection evicted before it finished its handshake"),
        }
    }
}
