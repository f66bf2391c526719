//! AMI event types and structures

use crate::channel::ChannelState;
use crate::constants::{DIAL_STATUS_ANSWER, RESPONSE_SUCCESS};
use crate::headers::AmiHeader;
use std::collections::HashMap;
use std::fmt;

/// Error returned when parsing an unknown event type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventTypeError(pub String);

impl fmt::Display for ParseEventTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for ParseEventTypeError {}

define_wire_enum! {
    error_type: ParseEventTypeError,
    /// AMI event names this crate consumes, plus the neighbors Asterisk
    /// interleaves on the same stream during an originate (so they parse
    /// cleanly and log legibly). Names not listed here stay accessible as
    /// the raw `Event` field.
    pub enum AmiEventType {
        Newchannel => "Newchannel",
        Newstate => "Newstate",
        NewCallerid => "NewCallerid",
        NewConnectedLine => "NewConnectedLine",
        DialBegin => "DialBegin",
        DialEnd => "DialEnd",
        BridgeCreate => "BridgeCreate",
        BridgeEnter => "BridgeEnter",
        BridgeLeave => "BridgeLeave",
        BridgeDestroy => "BridgeDestroy",
        ConfbridgeJoin => "ConfbridgeJoin",
        ConfbridgeLeave => "ConfbridgeLeave",
        OriginateResponse => "OriginateResponse",
        Hangup => "Hangup",
        HangupRequest => "HangupRequest",
        SoftHangupRequest => "SoftHangupRequest",
        FullyBooted => "FullyBooted",
    }
}

/// One parsed AMI block: an immutable field-name → value mapping.
///
/// Every block the PBX emits carries either an `Event` field (unsolicited
/// event) or a `Response` field (reply to an action); `ActionID` is present
/// only when the block correlates to a client action. Accessors are typed
/// where the field has structure (`channel_state`, `as_int`) and raw `&str`
/// elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiEvent {
    event_type: Option<AmiEventType>,
    fields: HashMap<String, String>,
}

impl AmiEvent {
    /// Build an event from parsed fields. The `Event` field, when present
    /// and recognized, is cached as the typed event name.
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        let event_type = fields
            .get(AmiHeader::Event.as_str())
            .and_then(|name| name.parse().ok());
        Self { event_type, fields }
    }

    /// Parsed event type, if the `Event` field names one we recognize.
    pub fn event_type(&self) -> Option<AmiEventType> {
        self.event_type
    }

    /// Look up a field by name.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.fields.get(name.as_ref()).map(|s| s.as_str())
    }

    /// All fields as a map.
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// Number of fields in the block.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the block parsed to zero fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw `Event` field value (also covers names not in [`AmiEventType`]).
    pub fn event_name(&self) -> Option<&str> {
        self.header(AmiHeader::Event)
    }

    /// `ActionID` correlation token, if the block carries one.
    pub fn action_id(&self) -> Option<&str> {
        self.header(AmiHeader::ActionId)
    }

    /// `Response` field value (`Success`, `Error`, ...).
    pub fn response(&self) -> Option<&str> {
        self.header(AmiHeader::Response)
    }

    /// `true` if this block is an action reply rather than an event.
    pub fn is_response(&self) -> bool {
        self.response().is_some()
    }

    /// `true` if this is an action reply with `Response: Success`.
    pub fn is_success(&self) -> bool {
        self.response() == Some(RESPONSE_SUCCESS)
    }

    /// `Message` field accompanying error responses.
    pub fn message(&self) -> Option<&str> {
        self.header(AmiHeader::Message)
    }

    /// `Channel` field (e.g. `SIP/6981234567-00000af3`).
    pub fn channel(&self) -> Option<&str> {
        self.header(AmiHeader::Channel)
    }

    /// `Uniqueid` field.
    pub fn unique_id(&self) -> Option<&str> {
        self.header(AmiHeader::Uniqueid)
    }

    /// Check whether this event matches the given type.
    pub fn is_event_type(&self, event_type: AmiEventType) -> bool {
        self.event_type == Some(event_type)
    }

    /// Parse a field as an integer.
    pub fn as_int(&self, name: impl AsRef<str>) -> Option<i64> {
        self.header(name)?.trim().parse().ok()
    }

    /// Parse the `ChannelState` field into a [`ChannelState`], falling back
    /// to the `ChannelStateDesc` name if the number is absent or malformed.
    pub fn channel_state(&self) -> Option<ChannelState> {
        if let Some(n) = self.as_int(AmiHeader::ChannelState) {
            if let Ok(n) = u8::try_from(n) {
                if let Some(state) = ChannelState::from_number(n) {
                    return Some(state);
                }
            }
        }
        self.header(AmiHeader::ChannelStateDesc)?.parse().ok()
    }

    /// `true` if the channel state field matches the given state.
    pub fn channel_state_is(&self, state: ChannelState) -> bool {
        self.channel_state() == Some(state)
    }

    /// `DialStatus` field from `DialEnd` events.
    pub fn dial_status(&self) -> Option<&str> {
        self.header(AmiHeader::DialStatus)
    }

    /// `true` if this is a `DialEnd` with `DialStatus: ANSWER`.
    pub fn is_dial_answer(&self) -> bool {
        self.is_event_type(AmiEventType::DialEnd)
            && self.dial_status() == Some(DIAL_STATUS_ANSWER)
    }

    /// `Cause-txt` field from `Hangup` events.
    pub fn hangup_cause(&self) -> Option<&str> {
        self.header(AmiHeader::CauseTxt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_of(pairs: &[(&str, &str)]) -> AmiEvent {
        AmiEvent::from_fields(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(
            "BridgeEnter".parse::<AmiEventType>(),
            Ok(AmiEventType::BridgeEnter)
        );
        assert_eq!(
            "confbridgejoin".parse::<AmiEventType>(),
            Ok(AmiEventType::ConfbridgeJoin)
        );
        assert!("NotARealEvent".parse::<AmiEventType>().is_err());
    }

    #[test]
    fn test_from_fields_caches_event_type() {
        let event = event_of(&[("Event", "Hangup"), ("Channel", "SIP/20-0001")]);
        assert_eq!(event.event_type(), Some(AmiEventType::Hangup));
        assert_eq!(event.event_name(), Some("Hangup"));
        assert!(event.is_event_type(AmiEventType::Hangup));
    }

    #[test]
    fn test_unrecognized_event_name_stays_raw() {
        let event = event_of(&[("Event", "CoreShowChannel")]);
        assert_eq!(event.event_type(), None);
        assert_eq!(event.event_name(), Some("CoreShowChannel"));
    }

    #[test]
    fn test_response_accessors() {
        let event = event_of(&[
            ("Response", "Error"),
            ("ActionID", "abc123"),
            ("Message", "Extension does not exist."),
        ]);
        assert!(event.is_response());
        assert!(!event.is_success());
        assert_eq!(event.action_id(), Some("abc123"));
        assert_eq!(event.message(), Some("Extension does not exist."));

        let ok = event_of(&[("Response", "Success"), ("ActionID", "abc123")]);
        assert!(ok.is_success());
    }

    #[test]
    fn test_channel_state_from_number() {
        let event = event_of(&[
            ("Event", "Newstate"),
            ("ChannelState", "6"),
            ("ChannelStateDesc", "Up"),
        ]);
        assert_eq!(event.channel_state(), Some(ChannelState::Up));
        assert!(event.channel_state_is(ChannelState::Up));
        assert!(!event.channel_state_is(ChannelState::Ringing));
    }

    #[test]
    fn test_channel_state_desc_fallback() {
        let event = event_of(&[("Event", "Newstate"), ("ChannelStateDesc", "Ringing")]);
        assert_eq!(event.channel_state(), Some(ChannelState::Ringing));
    }

    #[test]
    fn test_as_int() {
        let event = event_of(&[("ChannelState", "5"), ("ChannelStateDesc", "Ringing")]);
        assert_eq!(event.as_int("ChannelState"), Some(5));
        assert_eq!(event.as_int("ChannelStateDesc"), None);
        assert_eq!(event.as_int("Missing"), None);
    }

    #[test]
    fn test_dial_answer() {
        let event = event_of(&[("Event", "DialEnd"), ("DialStatus", "ANSWER")]);
        assert!(event.is_dial_answer());

        let busy = event_of(&[("Event", "DialEnd"), ("DialStatus", "BUSY")]);
        assert!(!busy.is_dial_answer());
    }
}
