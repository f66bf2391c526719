//! Answer detection for a monitored originate.
//!
//! AMI does not reliably stamp state-change events with the ActionID of the
//! Originate that caused them, so no single event proves the call was
//! answered. The monitor ORs four independent heuristics and resolves on the
//! first match, the first failure signal, or the deadline, whichever comes
//! first.

use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::channel::ChannelState;
use crate::connection::AmiEventStream;
use crate::event::{AmiEvent, AmiEventType};

/// Which heuristic concluded the call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerSignal {
    /// `BridgeEnter` whose `Channel` carries the action id.
    BridgeEnter,
    /// `ConfbridgeJoin` (unconditional; the wait context is a conference).
    ConfbridgeJoin,
    /// `Newstate` reaching channel state 6 (Up).
    ChannelUp,
    /// `DialEnd` with `DialStatus: ANSWER`.
    DialAnswer,
}

impl std::fmt::Display for AnswerSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerSignal::BridgeEnter => write!(f, "bridge enter"),
            AnswerSignal::ConfbridgeJoin => write!(f, "conference join"),
            AnswerSignal::ChannelUp => write!(f, "channel up"),
            AnswerSignal::DialAnswer => write!(f, "dial answered"),
        }
    }
}

/// Why a monitored call failed before answering.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FailureReason {
    /// The PBX rejected the Originate (`Response != Success`).
    Rejected {
        response: String,
        message: Option<String>,
    },
    /// A `Hangup` arrived before any answer heuristic matched.
    Hangup { cause: Option<String> },
    /// The event stream ended while monitoring.
    Disconnected,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Rejected { response, message } => match message {
                Some(m) => write!(f, "originate rejected: {} ({})", response, m),
                None => write!(f, "originate rejected: {}", response),
            },
            FailureReason::Hangup { cause } => match cause {
                Some(c) => write!(f, "hung up before answer ({})", c),
                None => write!(f, "hung up before answer"),
            },
            FailureReason::Disconnected => write!(f, "connection lost while monitoring"),
        }
    }
}

/// Resolution of one monitored originate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerOutcome {
    /// An answer heuristic matched within the deadline.
    Answered(AnswerSignal),
    /// The originate was rejected, the call hung up, or the stream ended.
    Failed(FailureReason),
    /// The deadline passed with no resolving event.
    TimedOut,
}

impl AnswerOutcome {
    /// `true` only for [`AnswerOutcome::Answered`].
    pub fn is_answered(&self) -> bool {
        matches!(self, AnswerOutcome::Answered(_))
    }
}

/// One in-flight monitored action. Exists only for the duration of a single
/// [`wait_for_answer`] call and resolves exactly once.
struct PendingAction {
    action_id: String,
    issued_at: Instant,
    deadline: Instant,
}

impl PendingAction {
    fn new(action_id: &str, timeout: Duration) -> Self {
        let issued_at = Instant::now();
        Self {
            action_id: action_id.to_string(),
            issued_at,
            deadline: issued_at + timeout,
        }
    }
}

/// How a single event advances the monitor.
#[derive(Debug, PartialEq, Eq)]
enum Classification {
    /// Not relevant, or origination merely accepted; keep monitoring.
    Continue,
    Resolved(AnswerOutcome),
}

/// Classify one event against the monitored action id.
///
/// Evaluation order is fixed: the correlated `Response` first, then the
/// answer heuristics in priority order (first match wins), then the
/// unconditional `Hangup` failure.
fn classify(event: &AmiEvent, action_id: &str) -> Classification {
    // Correlated reply to our Originate
    if event.action_id() == Some(action_id) {
        if let Some(response) = event.response() {
            if event.is_success() {
                debug!("Originate accepted for ActionID {}", action_id);
                return Classification::Continue;
            }
            return Classification::Resolved(AnswerOutcome::Failed(FailureReason::Rejected {
                response: response.to_string(),
                message: event.message().map(|s| s.to_string()),
            }));
        }
    }

    // Answer heuristics, first match wins
    if event.is_event_type(AmiEventType::BridgeEnter)
        && event.channel().is_some_and(|c| c.contains(action_id))
    {
        return Classification::Resolved(AnswerOutcome::Answered(AnswerSignal::BridgeEnter));
    }
    if event.is_event_type(AmiEventType::ConfbridgeJoin) {
        return Classification::Resolved(AnswerOutcome::Answered(AnswerSignal::ConfbridgeJoin));
    }
    if event.is_event_type(AmiEventType::Newstate) {
        trace!(
            "Channel state change: {:?} on {:?}",
            event.channel_state(),
            event.channel()
        );
        if event.channel_state_is(ChannelState::Up) {
            return Classification::Resolved(AnswerOutcome::Answered(AnswerSignal::ChannelUp));
        }
        return Classification::Continue;
    }
    if event.is_dial_answer() {
        return Classification::Resolved(AnswerOutcome::Answered(AnswerSignal::DialAnswer));
    }

    // Hangup fails the monitored call regardless of ActionID: the state
    // events above are not stamped either, so a hangup on the stream during
    // the window is taken as the monitored leg ending.
    if event.is_event_type(AmiEventType::Hangup) {
        return Classification::Resolved(AnswerOutcome::Failed(FailureReason::Hangup {
            cause: event.hangup_cause().map(|s| s.to_string()),
        }));
    }

    Classification::Continue
}

/// Consume the event stream until the originate identified by `action_id`
/// resolves, or until `timeout` elapses.
///
/// Resolution is final: once this returns, later events for the action are
/// simply never read on its behalf. A dropped-event notification
/// (`QueueFull`) does not abort the monitor; the heuristics are redundant
/// enough that a later event can still resolve the call.
pub async fn wait_for_answer(
    events: &mut AmiEventStream,
    action_id: &str,
    timeout: Duration,
) -> AnswerOutcome {
    let pending = PendingAction::new(action_id, timeout);
    debug!(
        "Monitoring events for ActionID {} (timeout {:?})",
        action_id, timeout
    );

    loop {
        let received = match timeout_at(pending.deadline, events.recv()).await {
            Err(_) => {
                warn!(
                    "Timed out waiting for answer on ActionID {} after {:?}",
                    pending.action_id,
                    pending.issued_at.elapsed()
                );
                return AnswerOutcome::TimedOut;
            }
            Ok(None) => {
                warn!("Event stream closed while monitoring ActionID {}", action_id);
                return AnswerOutcome::Failed(FailureReason::Disconnected);
            }
            Ok(Some(Err(e))) => {
                warn!("Event stream error while monitoring: {}", e);
                continue;
            }
            Ok(Some(Ok(event))) => event,
        };

        match classify(&received, action_id) {
            Classification::Continue => {}
            Classification::Resolved(outcome) => {
                debug!(
                    "ActionID {} resolved after {:?}: {:?}",
                    action_id,
                    pending.issued_at.elapsed(),
                    outcome
                );
                return outcome;
            }
        }
    }
}
