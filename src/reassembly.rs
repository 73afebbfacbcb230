//! Per-connection frame reassembly: an append-only receive buffer plus
//! an expected-length cursor, turning a stream of raw reads into a
//! sequence of whole [`Frame`]s.
//!
//! The reactor owns one [`Reassembler`] per connection. It is not
//! `Sync` and is never touched by anything but the reactor thread,
//! which is the sole caller of `read` on client sockets.

use crate::wire::Frame;

/// Accumulates bytes from successive reads and extracts whole frames
/// as they become available.
#[derive(Default)]
pub struct Reassembler {
    buf: Vec<u8>,
    expected_len: Option<usize>,
}

impl Reassembler {
    /// Creates an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly-read bytes to the buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes currently buffered, for diagnostics and tests.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Extracts every whole frame currently present in the buffer.
    ///
    /// If the header declares a length larger than will ever arrive,
    /// this simply returns no frames and keeps waiting; it is the
    /// reactor's job to evict on connection close, not the
    /// reassembler's job to time out.
    pub fn extract_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();

        loop {
            if self.expected_len.is_none() {
                if self.buf.len() < Frame::HEADER_LEN {
                    break;
                }
                let (name_len, message_len) = match Frame::peek_header(&self.buf) {
                    Ok(lens) => lens,
                    Err(_) => break,
                };
                self.expected_len = Some(Frame::HEADER_LEN + name_len + message_len);
            }

            let expected = self.expected_len.expect("just set above");
            if self.buf.len() < expected {
                break;
            }

            let frame_bytes: Vec<u8> = self.buf.drain(..expected).collect();
            self.expected_len = None;

            if let Ok(frame) = Frame::decode(&frame_bytes) {
                frames.push(frame);
            }
        }

        frames
    }
}
