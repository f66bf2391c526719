//! Growable byte buffer for reassembling AMI blocks from socket reads.

use crate::constants::{BUF_CHUNK, MAX_BUFFER_SIZE};
use crate::error::{AmiError, AmiResult};

/// Byte buffer with a consumed-prefix cursor.
///
/// `extract_until_pattern` hands out complete delimited chunks without
/// copying the remainder; `compact` reclaims the consumed prefix once a
/// chunk has been taken. The total size is capped so a peer that never
/// sends a block terminator cannot grow the buffer unboundedly.
#[derive(Debug)]
pub struct AmiBuffer {
    data: Vec<u8>,
    /// Start of unconsumed data within `data`.
    read_pos: usize,
}

impl AmiBuffer {
    /// Create an empty buffer with the standard initial capacity.
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(BUF_CHUNK),
            read_pos: 0,
        }
    }

    /// Append raw socket bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Fail if the unconsumed region has outgrown the safety limit.
    pub fn check_size_limits(&self) -> AmiResult<()> {
        if self.len() > MAX_BUFFER_SIZE {
            return Err(AmiError::protocol_error(format!(
                "receive buffer exceeded {} bytes without a block terminator",
                MAX_BUFFER_SIZE
            )));
        }
        Ok(())
    }

    /// Extract bytes up to (but not including) the first occurrence of
    /// `pattern`, consuming both. Returns `None` if the pattern is not
    /// present yet.
    pub fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        let haystack = &self.data[self.read_pos..];
        let pos = haystack
            .windows(pattern.len())
            .position(|window| window == pattern)?;

        let chunk = haystack[..pos].to_vec();
        self.read_pos += pos + pattern.len();
        Some(chunk)
    }

    /// Drop the consumed prefix, shifting the remainder to the front.
    pub fn compact(&mut self) {
        if self.read_pos > 0 {
            self.data.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// `true` if no unconsumed bytes remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AmiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_until_pattern() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"Event: Hangup\r\n\r\nEvent: Newstate");

        let chunk = buf.extract_until_pattern(b"\r\n\r\n").unwrap();
        assert_eq!(chunk, b"Event: Hangup");
        assert_eq!(buf.len(), b"Event: Newstate".len());
    }

    #[test]
    fn test_extract_pattern_absent() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"Event: Hangup\r\n");
        assert!(buf.extract_until_pattern(b"\r\n\r\n").is_none());
        // Nothing consumed on a miss
        assert_eq!(buf.len(), b"Event: Hangup\r\n".len());
    }

    #[test]
    fn test_pattern_split_across_appends() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"Event: Hangup\r\n");
        assert!(buf.extract_until_pattern(b"\r\n\r\n").is_none());

        buf.extend_from_slice(b"\r\n");
        let chunk = buf.extract_until_pattern(b"\r\n\r\n").unwrap();
        assert_eq!(chunk, b"Event: Hangup");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_compact_preserves_remainder() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"first\r\n\r\nsecond\r\n\r\n");

        assert_eq!(buf.extract_until_pattern(b"\r\n\r\n").unwrap(), b"first");
        buf.compact();
        assert_eq!(buf.extract_until_pattern(b"\r\n\r\n").unwrap(), b"second");
        buf.compact();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_size_limit() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(&vec![b'x'; MAX_BUFFER_SIZE + 1]);
        assert!(buf.check_size_limits().is_err());
    }
}
