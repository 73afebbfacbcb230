//! The client: a single thread multiplexing its socket and standard
//! input over one readiness primitive.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream};

use log::{info, warn};
use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Interest, Poll, Token};

use crate::config::READ_SCRATCH;
use crate::crypto::{aes_open, aes_seal, AesKey, PublicKey};
use crate::error::*;
use crate::reassembly::Reassembler;
use crate::wire::Frame;

const SOCKET: Token = Token(0);
const STDIN: Token = Token(1);

/// Runs the client to completion: handshake, then the interactive
/// loop. Returns `Ok(())` on a user-initiated `.exit`/EOF or an
/// orderly server close; an `Err` signals connect or handshake
/// failure, which the binary maps to a non-zero exit code.
pub fn run(server_addr: SocketAddr, username: &str) -> Result<()> {
    let mut std_stream = StdTcpStream::connect(server_addr).wrapped(ErrorKind::Startup)?;
    let aes_key = handshake(&mut std_stream, username)?;

    std_stream.set_nonblocking(true).wrapped(ErrorKind::Startup)?;
    let mut mio_stream = to_mio_stream(std_stream);

    let mut poll = Poll::new().wrapped(ErrorKind::Startup)?;
    poll.registry()
        .register(&mut mio_stream, SOCKET, Interest::READABLE)
        .wrapped(ErrorKind::Startup)?;
    register_stdin(&mut poll)?;

    let mut session = Session {
        stream: mio_stream,
        reassembler: Reassembler::new(),
        aes_key,
        stdin_buf: Vec::new(),
        pending_recipient: None,
    };

    let mut events = Events::with_capacity(32);
    info!("connected as {}", username);
    println!("Connected. Type a recipient's name, then a message. Type .exit to quit.");

    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::wrapped(ErrorKind::Io, e));
        }

        for event in events.iter() {
            match event.token() {
                SOCKET => {
                    if !session.drain_socket() {
                        println!("Server closed the connection.");
                        return Ok(());
                    }
                }
                STDIN => {
                    if !session.drain_stdin() {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}

/// Performs the three-step handshake on a blocking socket: send the
/// username, receive the server's RSA public key, send our AES key
/// RSA-encrypted under it.
fn handshake(stream: &mut StdTcpStream, username: &str) -> Result<AesKey> {
    stream
        .write_all(username.as_bytes())
        .wrapped(ErrorKind::Handshake)?;

    let mut scratch = [0u8; READ_SCRATCH];
    let n = stream.read(&mut scratch).wrapped(ErrorKind::Handshake)?;
    if n == 0 {
        return Err(Error::simple(ErrorKind::Handshake));
    }
    let public_key = PublicKey::import_public_der(&scratch[..n])?;

    let aes_key = AesKey::generate();
    let encrypted_key = public_key.rsa_encrypt(aes_key.as_bytes())?;
    stream
        .write_all(&encrypted_key)
        .wrapped(ErrorKind::Handshake)?;

    Ok(aes_key)
}

#[cfg(unix)]
fn to_mio_stream(stream: StdTcpStream) -> MioTcpStream {
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    unsafe { MioTcpStream::from_raw_fd(stream.into_raw_fd()) }
}

#[cfg(unix)]
fn register_stdin(poll: &mut Poll) -> Result<()> {
    use mio::unix::SourceFd;
    use std::os::unix::io::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    set_nonblocking(fd)?;
    poll.registry()
        .register(&mut SourceFd(&fd), STDIN, Interest::READABLE)
        .wrapped(ErrorKind::Startup)
}

#[cfg(unix)]
fn set_nonblocking(fd: std::os::unix::io::RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(Error::wrapped(ErrorKind::Startup, io::Error::last_os_error()));
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(Error::wrapped(ErrorKind::Startup, io::Error::last_os_error()));
        }
    }
    Ok(())
}

struct Session {
    stream: MioTcpStream,
    reassembler: Reassembler,
    aes_key: AesKey,
    stdin_buf: Vec<u8>,
    /// The recipient named by a prior stdin line, awaiting the message
    /// line that completes it. Empty means the next line names a
    /// recipient, not a message.
    pending_recipient: Option<String>,
}

impl Session {
    /// Reads everything currently available on the socket and prints
    /// every delivered message. Returns `false` if the server has
    /// closed the connection.
    fn drain_socket(&mut self) -> bool {
        let mut scratch = [0u8; READ_SCRATCH];
        loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => return false,
                Ok(n) => self.reassembler.feed(&scratch[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("read error: {}", e);
                    return false;
                }
            }
        }

        for frame in self.reassembler.extract_frames() {
            self.print_frame(frame);
        }
        true
    }

    fn print_frame(&self, frame: Frame) {
        let (from_sealed, message_sealed) = frame.into_parts();
        let from = match aes_open(&from_sealed, &self.aes_key).ok().and_then(|b| String::from_utf8(b).ok()) {
            Some(name) => name,
            None => {
                warn!("dropping frame: could not open sender field");
                return;
            }
        };
        let message = match aes_open(&message_sealed, &self.aes_key).ok().and_then(|b| String::from_utf8(b).ok()) {
            Some(msg) => msg,
            None => {
                warn!("dropping frame: could not open message field");
                return;
            }
        };
        println!("> {}:\n> {}", from, message);
    }

    /// Reads everything currently available on stdin, acting on each
    /// complete line. Returns `false` if the user typed `.exit` or
    /// stdin hit EOF.
    fn drain_stdin(&mut self) -> bool {
        let mut scratch = [0u8; READ_SCRATCH];
        loop {
            match io::stdin().read(&mut scratch) {
                Ok(0) => return false,
                Ok(n) => self.stdin_buf.extend_from_slice(&scratch[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }

        while let Some(pos) = self.stdin_buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.stdin_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim_end_matches('\r').to_owned();
            if !self.handle_line(&line) {
                return false;
            }
        }
        true
    }

    /// Returns `false` to terminate the session.
    fn handle_line(&mut self, line: &str) -> bool {
        if line == ".exit" {
            return false;
        }

        match self.pending_recipient.take() {
            None => {
                if !line.is_empty() {
                    self.pending_recipient = Some(line.to_owned());
                }
            }
            Some(recipient) => self.send_message(&recipient, line),
        }
        true
    }

    fn send_message(&mut self, recipient: &str, message: &str) {
        let result = (|| -> Result<()> {
            let sealed_recipient = aes_seal(recipient.as_bytes(), &self.aes_key)?;
            let sealed_message = aes_seal(message.as_bytes(), &self.aes_key)?;
            let frame = Frame::new(sealed_recipient, sealed_message)?;
            write_all_blocking(&mut self.stream, &frame.encode())
        })();

        match result {
            Ok(()) => println!("(sent to {})", recipient),
            Err(e) => warn!("failed to send to {}: {}", recipient, e),
        }
    }
}

/// A minimal retrying write loop for the client's own non-blocking
/// socket, in the spirit of [`crate::send`] but single-threaded: no
/// lock is needed since only this thread ever writes here.
fn write_all_blocking(stream: &mut MioTcpStream, bytes: &[u8]) -> Result<()> {
    use crate::config::{SEND_MAX_RETRIES, SEND_RETRY_BACKOFF};
    use std::thread;

    let mut sent = 0;
    let mut retries = 0u32;
    while sent < bytes.len() {
        match stream.write(&bytes[sent..]) {
            Ok(0) => return Err(Error::simple(ErrorKind::Io)),
            Ok(n) => {
                sent += n;
                retries = 0;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                retries += 1;
                if retries > SEND_MAX_RETRIES {
                    return Err(Error::wrapped(ErrorKind::Io, e));
                }
                thread::sleep(SEND_RETRY_BACKOFF);
            }
            Err(e) => return Err(Error::wrapped(ErrorKind::Io, e)),
        }
    }
    Ok(())
}
