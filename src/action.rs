//! AMI action assembly and wire formatting.

use crate::constants::LINE_TERMINATOR;
use crate::error::{AmiError, AmiResult};
use std::fmt;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Validate that a user-provided string contains no newline characters.
///
/// AMI actions are line-delimited; embedded newlines would allow injection
/// of arbitrary protocol actions.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::ProtocolError {
            message: format!("{} must not contain newlines", context),
        });
    }
    Ok(())
}

static ACTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generate a correlation token unique within this process run.
///
/// Pid prefix plus a monotonic counter; nothing time-derived, so ids stay
/// unique even when calls start within the same millisecond.
pub fn next_action_id() -> String {
    let seq = ACTION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:08x}", std::process::id(), seq)
}

/// AMI actions this crate sends.
#[derive(Clone)]
pub enum AmiAction {
    /// Authenticate the session. Subscribes to the `call` event class, which
    /// carries everything the answer heuristics need.
    Login { username: String, secret: String },
    /// Ring a channel and, on answer, drop it into a dialplan context.
    Originate {
        channel: String,
        context: String,
        exten: String,
        priority: u32,
        caller_id: String,
        timeout_ms: u64,
        action_id: String,
        /// `Variable: KEY=value` lines, set on the created channel.
        variables: Vec<(String, String)>,
    },
    /// End the session.
    Logoff,
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmiAction::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("secret", &"[REDACTED]")
                .finish(),
            AmiAction::Originate {
                channel,
                context,
                exten,
                action_id,
                ..
            } => f
                .debug_struct("Originate")
                .field("channel", channel)
                .field("context", context)
                .field("exten", exten)
                .field("action_id", action_id)
                .finish(),
            AmiAction::Logoff => write!(f, "Logoff"),
        }
    }
}

impl AmiAction {
    /// Name carried in the `Action` field.
    pub fn name(&self) -> &'static str {
        match self {
            AmiAction::Login { .. } => "Login",
            AmiAction::Originate { .. } => "Originate",
            AmiAction::Logoff => "Logoff",
        }
    }

    /// Validate all user-supplied fields, then convert to wire format.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        let mut out = String::new();
        let mut field = |key: &str, value: &str| {
            let _ = write!(out, "{}: {}{}", key, value, LINE_TERMINATOR);
        };

        match self {
            AmiAction::Login { username, secret } => {
                validate_no_newlines(username, "username")?;
                validate_no_newlines(secret, "secret")?;
                field("Action", "Login");
                field("Username", username);
                field("Secret", secret);
                field("Events", "call");
            }
            AmiAction::Originate {
                channel,
                context,
                exten,
                priority,
                caller_id,
                timeout_ms,
                action_id,
                variables,
            } => {
                validate_no_newlines(channel, "channel")?;
                validate_no_newlines(context, "context")?;
                validate_no_newlines(exten, "extension")?;
                validate_no_newlines(caller_id, "caller id")?;
                validate_no_newlines(action_id, "action id")?;
                field("Action", "Originate");
                field("Channel", channel);
                field("Context", context);
                field("Exten", exten);
                field("Priority", &priority.to_string());
                field("CallerID", caller_id);
                field("Timeout", &timeout_ms.to_string());
                field("ActionID", action_id);
                for (key, value) in variables {
                    validate_no_newlines(key, "variable name")?;
                    validate_no_newlines(value, "variable value")?;
                    field("Variable", &format!("{}={}", key, value));
                }
            }
            AmiAction::Logoff => {
                field("Action", "Logoff");
            }
        }

        out.push_str(LINE_TERMINATOR);
        Ok(out)
    }
}
