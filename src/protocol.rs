//! AMI protocol parsing: block framing and field extraction.

use crate::buffer::AmiBuffer;
use crate::constants::{BLOCK_TERMINATOR, FIELD_SEPARATOR};
use crate::error::{AmiError, AmiResult};
use crate::event::AmiEvent;
use std::collections::HashMap;

/// Incremental AMI block parser.
///
/// Feed raw socket bytes with [`add_data`](Self::add_data) and drain parsed
/// blocks with [`parse_block`](Self::parse_block). Unlike FreeSWITCH-style
/// event sockets, AMI has no `Content-Length` bodies: a block is complete
/// exactly when its terminating blank line arrives, so the parser needs no
/// state beyond the byte buffer.
pub struct AmiParser {
    buffer: AmiBuffer,
}

impl AmiParser {
    /// Create new parser
    pub fn new() -> Self {
        Self {
            buffer: AmiBuffer::new(),
        }
    }

    /// Add data to the parser buffer
    pub fn add_data(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer.extend_from_slice(data);
        self.buffer.check_size_limits()?;
        Ok(())
    }

    /// Try to parse the next complete block from the buffer.
    ///
    /// Blocks that parse to zero fields (stray blank lines, separator-less
    /// noise such as a misplaced banner) are skipped, not errors. Returns
    /// `Ok(None)` when no complete block remains buffered.
    pub fn parse_block(&mut self) -> AmiResult<Option<AmiEvent>> {
        while let Some(block_data) = self.buffer.extract_until_pattern(BLOCK_TERMINATOR.as_bytes())
        {
            self.buffer.compact();

            let block = String::from_utf8(block_data)
                .map_err(|_| AmiError::protocol_error("invalid UTF-8 in AMI block"))?;

            let fields = parse_fields(&block);
            if fields.is_empty() {
                continue;
            }

            return Ok(Some(AmiEvent::from_fields(fields)));
        }

        Ok(None)
    }
}

impl Default for AmiParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one block's text into a field mapping.
///
/// Each line splits on the first `": "`; both sides are trimmed. Lines
/// without the separator carry no field and are ignored.
pub fn parse_fields(block: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for line in block.lines() {
        if let Some(pos) = line.find(FIELD_SEPARATOR) {
            let key = line[..pos].trim().to_string();
            let value = line[pos + FIELD_SEPARATOR.len()..].trim().to_string();
            fields.insert(key, value);
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AmiEventType;

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields("Response: Success\r\nMessage: Authentication accepted");
        assert_eq!(fields.get("Response").map(|s| s.as_str()), Some("Success"));
        assert_eq!(
            fields.get("Message").map(|s| s.as_str()),
            Some("Authentication accepted")
        );
    }

    #[test]
    fn test_parse_fields_is_deterministic() {
        let block = "Event: Newstate\r\nChannelState: 6\r\nChannelStateDesc: Up";
        assert_eq!(parse_fields(block), parse_fields(block));
    }

    #[test]
    fn test_parse_fields_splits_on_first_separator_only() {
        let fields = parse_fields("Message: Originate: failed");
        assert_eq!(
            fields.get("Message").map(|s| s.as_str()),
            Some("Originate: failed")
        );
    }

    #[test]
    fn test_parse_fields_ignores_separatorless_lines() {
        let fields = parse_fields("Asterisk Call Manager/5.0.4\r\nEvent: Hangup");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("Event").map(|s| s.as_str()), Some("Hangup"));
    }

    #[test]
    fn test_parse_complete_block() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Event: Hangup\r\nChannel: SIP/20-0001\r\n\r\n")
            .unwrap();

        let event = parser.parse_block().unwrap().unwrap();
        assert_eq!(event.event_type(), Some(AmiEventType::Hangup));
        assert_eq!(event.channel(), Some("SIP/20-0001"));

        assert!(parser.parse_block().unwrap().is_none());
    }

    #[test]
    fn test_incomplete_block() {
        let mut parser = AmiParser::new();
        parser.add_data(b"Event: Hangup\r\n").unwrap();
        assert!(parser.parse_block().unwrap().is_none());
    }

    #[test]
    fn test_block_split_across_feeds() {
        // A block split across feeds must parse identically to a one-shot
        // feed, and must yield exactly one event.
        let mut parser = AmiParser::new();
        parser.add_data(b"Event: Hangup\r\n").unwrap();
        assert!(parser.parse_block().unwrap().is_none());

        parser.add_data(b"\r\n").unwrap();
        let split_event = parser.parse_block().unwrap().unwrap();
        assert!(parser.parse_block().unwrap().is_none());

        let mut oneshot = AmiParser::new();
        oneshot.add_data(b"Event: Hangup\r\n\r\n").unwrap();
        let oneshot_event = oneshot.parse_block().unwrap().unwrap();

        assert_eq!(split_event, oneshot_event);
    }

    #[test]
    fn test_multiple_blocks_in_one_feed() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Response: Success\r\nActionID: a1\r\n\r\nEvent: Newstate\r\nChannelState: 6\r\n\r\n")
            .unwrap();

        let first = parser.parse_block().unwrap().unwrap();
        assert!(first.is_success());

        let second = parser.parse_block().unwrap().unwrap();
        assert_eq!(second.event_type(), Some(AmiEventType::Newstate));

        assert!(parser.parse_block().unwrap().is_none());
    }

    #[test]
    fn test_empty_block_skipped() {
        // A stray extra blank line forms a zero-field block; it is skipped
        // and the following real block is returned.
        let mut parser = AmiParser::new();
        parser
            .add_data(b"\r\n\r\nEvent: Hangup\r\n\r\n")
            .unwrap();

        let event = parser.parse_block().unwrap().unwrap();
        assert_eq!(event.event_type(), Some(AmiEventType::Hangup));
    }

    #[test]
    fn test_separatorless_block_skipped() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Asterisk Call Manager/5.0.4\r\n\r\nEvent: Hangup\r\n\r\n")
            .unwrap();

        let event = parser.parse_block().unwrap().unwrap();
        assert_eq!(event.event_type(), Some(AmiEventType::Hangup));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut parser = AmiParser::new();
        parser.add_data(b"Event: \xff\xfe\r\n\r\n").unwrap();
        assert!(parser.parse_block().is_err());
    }
}
