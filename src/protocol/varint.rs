//! Variable-length integers as used by the SLP framing.
//!
//! Values are split into 7-bit groups, least significant first, and every
//! byte except the last carries the `0x80` continuation bit. A 32-bit value
//! never needs more than [`MAX_LEN`] bytes, so a decoder that sees the
//! continuation bit on the fifth byte is looking at a corrupt or hostile
//! stream and stops there.
use crate::error::ProbeError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest encoding of a `u32`.
pub const MAX_LEN: usize = 5;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarIntError {
    #[error("varint is longer than {MAX_LEN} bytes")]
    Overflow,
    #[error("input ended in the middle of a varint")]
    Truncated,
}

impl From<VarIntError> for ProbeError {
    fn from(err: VarIntError) -> Self {
        match err {
            VarIntError::Overflow => Self::Overflow,
            VarIntError::Truncated => Self::MalformedResponse(err.to_string()),
        }
    }
}

/// Appends the encoding of `value` to `buf`.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        // Only the low seven bits survive the mask.
        #[allow(clippy::cast_possible_truncation)]
        let segment = (value as u8) & SEGMENT_BITS;
        value >>= 7;
        if value == 0 {
            buf.push(segment);
            return;
        }
        buf.push(segment | CONTINUE_BIT);
    }
}

pub fn encode(value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_LEN);
    write_varint(&mut buf, value);
    buf
}

/// Accumulates one varint a byte at a time.
///
/// Shared by the slice decoder and the async stream reader so both enforce
/// the same length guard.
#[derive(Debug, Default)]
struct Decoder {
    value: u32,
    read: usize,
}

impl Decoder {
    /// Feeds one byte; returns the value once the last group has been seen.
    fn push(&mut self, byte: u8) -> Result<Option<u32>, VarIntError> {
        self.value |= u32::from(byte & SEGMENT_BITS) << (7 * self.read);
        self.read += 1;

        if byte & CONTINUE_BIT == 0 {
            return Ok(Some(self.value));
        }
        if self.read == MAX_LEN {
            return Err(VarIntError::Overflow);
        }
        Ok(None)
    }
}

/// Decodes a single varint from the front of `bytes`.
///
/// Bytes after the terminating group are left untouched in the iterator.
pub fn decode<I>(bytes: I) -> Result<u32, VarIntError>
where
    I: IntoIterator<Item = u8>,
{
    let mut decoder = Decoder::default();
    for byte in bytes {
        if let Some(value) = decoder.push(byte)? {
            return Ok(value);
        }
    }
    Err(VarIntError::Truncated)
}

/// Reads a single varint from an async stream.
///
/// An EOF before the value completes is reported as [`ProbeError::Read`].
pub async fn read_varint<R>(reader: &mut R) -> Result<u32, ProbeError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Decoder::default();
    loop {
        let byte = reader.read_u8().await.map_err(ProbeError::Read)?;
        if let Some(value) = decoder.push(byte)? {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parameterized::parameterized;

    #[parameterized(value = {
        0, 1, 127, 128, 255, 25565, 2_097_151, 2_097_152, u32::MAX
    }, expected = {
        vec![0x00],
        vec![0x01],
        vec![0x7F],
        vec![0x80, 0x01],
        vec![0xFF, 0x01],
        vec![0xDD, 0xC7, 0x01],
        vec![0xFF, 0xFF, 0x7F],
        vec![0x80, 0x80, 0x80, 0x01],
        vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
    })]
    fn encodes_known_values(value: u32, expected: Vec<u8>) {
        let encoded = encode(value);
        assert_eq!(expected, encoded);
        assert_eq!(Ok(value), decode(encoded));
    }

    #[test]
    fn round_trips_across_the_domain() {
        let mut value: u64 = 0;
        while value <= u64::from(u32::MAX) {
            let v = u32::try_from(value).unwrap();
            let encoded = encode(v);
            assert!(encoded.len() <= MAX_LEN);
            assert_eq!(Ok(v), decode(encoded));
            value = value * 3 + 1;
        }
    }

    #[test]
    fn rejects_a_sixth_byte() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(Err(VarIntError::Overflow), decode(bytes));
    }

    #[test]
    fn does_not_consume_past_the_fifth_byte() {
        let mut bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02].into_iter();
        assert_eq!(Err(VarIntError::Overflow), decode(bytes.by_ref()));
        assert_eq!(Some(0x01), bytes.next());
    }

    #[test]
    fn reports_truncated_input() {
        assert_eq!(Err(VarIntError::Truncated), decode([0x80, 0x80]));
        assert_eq!(Err(VarIntError::Truncated), decode(Vec::new()));
    }

    #[tokio::test]
    async fn reads_from_a_stream() {
        let mut stream: &[u8] = &[0xDD, 0xC7, 0x01, 0x2A];
        assert_eq!(25565, read_varint(&mut stream).await.unwrap());
        assert_eq!(42, read_varint(&mut stream).await.unwrap());
        assert!(matches!(
            read_varint(&mut stream).await,
            Err(ProbeError::Read(_))
        ));
    }

    #[tokio::test]
    async fn stream_reader_enforces_the_length_guard() {
        let mut stream: &[u8] = &[0x80; 8];
        assert!(matches!(
            read_varint(&mut stream).await,
            Err(ProbeError::Overflow)
        ));
    }
}
