//! Channel state typing and channel-string construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel state from `ast_channel_state`, carried in the `ChannelState`
/// field as an integer string and in `ChannelStateDesc` as a name.
///
/// State 6 (`Up`) is the answered state the monitor heuristics key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ChannelState {
    Down = 0,
    Reserved = 1,
    OffHook = 2,
    Dialing = 3,
    Ring = 4,
    Ringing = 5,
    Up = 6,
    Busy = 7,
    DialingOffhook = 8,
    Prering = 9,
    Unknown = 10,
}

impl ChannelState {
    /// Parse from the `ChannelState` integer field value.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Down),
            1 => Some(Self::Reserved),
            2 => Some(Self::OffHook),
            3 => Some(Self::Dialing),
            4 => Some(Self::Ring),
            5 => Some(Self::Ringing),
            6 => Some(Self::Up),
            7 => Some(Self::Busy),
            8 => Some(Self::DialingOffhook),
            9 => Some(Self::Prering),
            10 => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Integer discriminant matching `ast_channel_state`.
    pub fn as_number(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Down => "Down",
            Self::Reserved => "Rsrvd",
            Self::OffHook => "OffHook",
            Self::Dialing => "Dialing",
            Self::Ring => "Ring",
            Self::Ringing => "Ringing",
            Self::Up => "Up",
            Self::Busy => "Busy",
            Self::DialingOffhook => "Dialing Offhook",
            Self::Prering => "Pre-ring",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an invalid channel state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChannelStateError(pub String);

impl fmt::Display for ParseChannelStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel state: {}", self.0)
    }
}

impl std::error::Error for ParseChannelStateError {}

impl FromStr for ChannelState {
    type Err = ParseChannelStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DOWN" => Ok(Self::Down),
            "RSRVD" => Ok(Self::Reserved),
            "OFFHOOK" => Ok(Self::OffHook),
            "DIALING" => Ok(Self::Dialing),
            "RING" => Ok(Self::Ring),
            "RINGING" => Ok(Self::Ringing),
            "UP" => Ok(Self::Up),
            "BUSY" => Ok(Self::Busy),
            "DIALING OFFHOOK" => Ok(Self::DialingOffhook),
            "PRE-RING" => Ok(Self::Prering),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(ParseChannelStateError(s.to_string())),
        }
    }
}

/// Build the dial string for an outbound leg from the configured trunk spec
/// and a phone number.
///
/// A trunk spec containing `/` is already qualified (`PJSIP/trunkA`); a bare
/// spec is a technology name (`SIP`). Both forms currently concatenate the
/// same way. The branches are kept separate: the config format documents a
/// third trunk shape (`IAX2/provider`) and it is unclear whether it was meant
/// to render differently, so the split point stays.
pub fn build_channel(trunk: &str, number: &str) -> String {
    if trunk.contains('/') {
        // Already qualified, e.g. "SIP/provider" or "PJSIP/trunk-name"
        format!("{}/{}", trunk, number)
    } else {
        // Bare technology name, e.g. "SIP" or "PJSIP"
        format!("{}/{}", trunk, number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_number_round_trip() {
        for n in 0..=10u8 {
            let state = ChannelState::from_number(n).unwrap();
            assert_eq!(state.as_number(), n);
        }
        assert_eq!(ChannelState::from_number(11), None);
    }

    #[test]
    fn test_up_is_six() {
        assert_eq!(ChannelState::Up.as_number(), 6);
        assert_eq!(ChannelState::from_number(6), Some(ChannelState::Up));
    }

    #[test]
    fn test_state_desc_parse() {
        assert_eq!("Up".parse::<ChannelState>(), Ok(ChannelState::Up));
        assert_eq!("ringing".parse::<ChannelState>(), Ok(ChannelState::Ringing));
        assert_eq!(
            "Dialing Offhook".parse::<ChannelState>(),
            Ok(ChannelState::DialingOffhook)
        );
        assert!("Sideways".parse::<ChannelState>().is_err());
    }

    #[test]
    fn test_build_channel_bare_technology() {
        assert_eq!(build_channel("SIP", "6981234567"), "SIP/6981234567");
    }

    #[test]
    fn test_build_channel_qualified_trunk() {
        assert_eq!(
            build_channel("PJSIP/trunkA", "6981234567"),
            "PJSIP/trunkA/6981234567"
        );
    }
}
