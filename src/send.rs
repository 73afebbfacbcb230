//! The send serializer: one mutex per socket, ensuring concurrent
//! worker tasks never interleave bytes on the same connection.
//!
//! Writes go through an independent clone of the connection's socket
//! (`TcpStream::try_clone`), so worker threads writing never contend
//! with the reactor thread, which only ever reads. `SIGPIPE` is
//! suppressed once at process start so a write to a peer that has
//! already closed its read side surfaces as an `io::Error` instead of
//! killing the process.

use std::io::{self, Write};
use std::net::TcpStream;
use std::thread;

use parking_lot::Mutex;

use crate::config::{SEND_MAX_RETRIES, SEND_RETRY_BACKOFF};
use crate::error::*;

/// A serialized write path to one socket.
pub struct WriteHandle {
    stream: Mutex<TcpStream>,
}

impl WriteHandle {
    /// Takes ownership of an independent clone of the connection's
    /// socket, dedicated to outgoing writes.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }

    /// Writes `bytes` in full, retrying on transient backpressure and
    /// returning quietly (not as an error) if the peer has gone away.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock();
        write_all_retrying(&mut stream, bytes)
    }
}

fn write_all_retrying(stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
    let mut sent = 0;
    let mut retries = 0u32;

    while sent < bytes.len() {
        match stream.write(&bytes[sent..]) {
            Ok(0) => return Ok(()), // peer closed its read side mid-write; reactor will evict
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
            Err(e) if is_broken_pipe(&e) => return Ok(()),
            Err(e) => return Err(Error::wrapped(ErrorKind::Io, e)),
        }
    }

    Ok(())
}

fn is_broken_pipe(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::BrokenPipe {
        return true;
    }
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(libc::EBADF)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Suppresses `SIGPIPE`, so that writing to a socket whose peer has
/// closed its read side returns `EPIPE` instead of terminating the
/// process. Must be called once, early in `main`.
#[cfg(unix)]
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
pub fn ignore_sigpipe() {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn writes_a_complete_buffer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let handle = WriteHandle::new(server_side);
        handle.send(b"hello, world!").unwrap();

        drop(handle);
        drop(client);
    }

    #[test]
    fn writes_larger_than_one_syscall_still_complete() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let reader = thread::spawn(move || {
            let mut scratch = [0u8; 4096];
            let mut total = 0usize;
            loop {
                match io::Read::read(&mut client, &mut scratch) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(_) => break,
                }
            }
            total
        });

        let handle = WriteHandle::new(server_side);
        let payload = vec![0x42u8; 256 * 1024];
        handle.send(&payload).unwrap();
        drop(handle);

        assert_eq!(reader.join().unwrap(), payload.len());
    }
}
