//! Wire framing: the 6-byte header shape shared by every frame that
//! crosses a secured connection, in either direction.
//!
//! ```text
//! +----------+----------+------------------------+----------------------+
//! | tolen    | msglen   | recipient (ciphertext)  | message (ciphertext) |
//! | u16 BE   | u32 BE   | tolen bytes             | msglen bytes         |
//! +----------+----------+------------------------+----------------------+
//! ```
//!
//! In client→server frames the first body run is the sealed recipient
//! name; in server→client frames it is the sealed sender name. This
//! module only knows about the two opaque byte runs, not which one
//! means what — that's a matter for the caller.

use crate::error::*;

/// One length-prefixed frame: a pair of opaque (usually AES-sealed)
/// byte runs, preceded by their lengths.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    /// The recipient field in client→server frames; the sender field
    /// in server→client frames.
    name_field: Vec<u8>,
    /// The message body field.
    message_field: Vec<u8>,
}

impl Frame {
    /// Size, in bytes, of the fixed header: `u16` length + `u32` length.
    pub const HEADER_LEN: usize = 6;

    /// Builds a frame from its two body fields.
    pub fn new(name_field: Vec<u8>, message_field: Vec<u8>) -> Result<Self> {
        if name_field.len() > u16::MAX as usize {
            return Err(Error::simple(ErrorKind::Protocol));
        }
        Ok(Self {
            name_field,
            message_field,
        })
    }

    /// The recipient (client→server) or sender (server→client) field.
    pub fn name_field(&self) -> &[u8] {
        &self.name_field
    }

    /// The message field.
    pub fn message_field(&self) -> &[u8] {
        &self.message_field
    }

    /// Consumes the frame, returning its two fields.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.name_field, self.message_field)
    }

    /// Serializes the frame as it appears on the wire: header, then
    /// the name field, then the message field.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + self.name_field.len() + self.message_field.len());
        buf.extend_from_slice(&(self.name_field.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.message_field.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.name_field);
        buf.extend_from_slice(&self.message_field);
        buf
    }

    /// Decodes a complete frame from `buf`, which must contain exactly
    /// `HEADER_LEN + tolen + msglen` bytes, no more and no fewer.
    /// Returns a `Protocol` error if the header's lengths don't match
    /// what's actually present, i.e. on a malformed or truncated frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (name_len, message_len) = Self::peek_header(buf)?;
        let total = Self::HEADER_LEN + name_len + message_len;
        if buf.len() != total {
            return Err(Error::simple(ErrorKind::Protocol));
        }
        let name_field = buf[Self::HEADER_LEN..Self::HEADER_LEN + name_len].to_vec();
        let message_field = buf[Self::HEADER_LEN + name_len..].to_vec();
        Ok(Self {
            name_field,
            message_field,
        })
    }

    /// Reads the two length fields out of a header, without requiring
    /// the body to be present yet. Used by the reassembler to compute
    /// how many more bytes it needs before a frame is complete.
    ///
    /// Returns `(name_len, message_len)` as native `usize`s.
    pub fn peek_header(buf: &[u8]) -> Result<(usize, usize)> {
        if buf.len() < Self::HEADER_LEN {
            return Err(Error::simple(ErrorKind::Protocol));
        }
        let name_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let message_len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        Ok((name_len, message_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frame = Frame::new(b"alice".to_vec(), b"hello, world!".to_vec()).unwrap();
        let encoded = frame.encode();

        let (name_len, message_len) = Frame::peek_header(&encoded).unwrap();
        assert_eq!(name_len, 5);
        assert_eq!(message_len, 13);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn frame_round_trip_empty_fields() {
        let frame = Frame::new(Vec::new(), Vec::new()).unwrap();
        let encoded = frame.encode();
        assert_eq!(encoded.len(), Frame::HEADER_LEN);
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn peek_header_rejects_short_buffer() {
        assert!(Frame::peek_header(&[0u8; 5]).is_err());
    }

    #[test]
    fn decode_rejects_truncated_body() {
        // tolen claims far more than is actually present.
        let mut buf = vec![0u8; Frame::HEADER_LEN];
        buf[0..2].copy_from_slice(&1_048_576u16.to_be_bytes());
        buf.extend_from_slice(b"only a little data");
        assert!(Frame::decode(&buf).is_err());
    }

    #[test]
    fn decode_rejects_oversized_buffer() {
        let frame = Frame::new(b"a".to_vec(), b"b".to_vec()).unwrap();
        let mut encoded = frame.encode();
        encoded.push(0xff);
        assert!(Frame::decode(&encoded).is_err());
    }
}
