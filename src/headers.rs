//! Typed field names for AMI actions and events.

/// Error returned when parsing an unrecognized field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHeaderError(pub String);

impl std::fmt::Display for ParseHeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown AMI field: {}", self.0)
    }
}

impl std::error::Error for ParseHeaderError {}

define_wire_enum! {
    error_type: ParseHeaderError,
    /// Field names this crate reads from events or writes into actions.
    ///
    /// AMI spells its correlation token `ActionID` (capital D) and some
    /// channel fields without hyphenation (`Uniqueid`); the wire strings
    /// here are the exact spellings Asterisk emits. Use with
    /// [`AmiEvent::header()`](crate::AmiEvent::header) for type-safe lookups.
    pub enum AmiHeader {
        Action => "Action",
        ActionId => "ActionID",
        Response => "Response",
        Message => "Message",
        Event => "Event",
        Username => "Username",
        Secret => "Secret",
        Events => "Events",
        Channel => "Channel",
        ChannelState => "ChannelState",
        ChannelStateDesc => "ChannelStateDesc",
        Context => "Context",
        Exten => "Exten",
        Priority => "Priority",
        CallerId => "CallerID",
        Timeout => "Timeout",
        Variable => "Variable",
        Uniqueid => "Uniqueid",
        DialStatus => "DialStatus",
        DestChannel => "DestChannel",
        Cause => "Cause",
        CauseTxt => "Cause-txt",
        BridgeId => "BridgeUniqueid",
        Conference => "Conference",
    }
}
