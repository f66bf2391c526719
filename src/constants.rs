//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from TCP stream (64KB) - standard TCP receive window
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
/// Handles AMI event bursts without reallocation
pub const BUF_CHUNK: usize = 64 * 1024;

/// Maximum total buffer size (8MB) - safety limit to prevent runaway memory.
/// AMI blocks are small (a few KB at most); hitting this means the peer is not
/// speaking AMI or the stream desynced.
pub const MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Protocol block terminators. AMI is strictly CRLF-delimited: lines end with
/// `\r\n` and a block ends with an empty line.
pub const BLOCK_TERMINATOR: &str = "\r\n\r\n";
pub const LINE_TERMINATOR: &str = "\r\n";

/// Separator between a field name and its value within a line.
pub const FIELD_SEPARATOR: &str = ": ";

/// Prefix of the single-line banner the PBX sends on connect
/// (`Asterisk Call Manager/<version>`). The banner is not a block - it has no
/// terminating blank line and must be consumed before the login exchange.
pub const BANNER_PREFIX: &str = "Asterisk Call Manager";

/// `Response` field value for an accepted action.
pub const RESPONSE_SUCCESS: &str = "Success";

/// `DialStatus` field value for an answered dial.
pub const DIAL_STATUS_ANSWER: &str = "ANSWER";

/// TCP connect timeout in milliseconds
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Deadline for the banner and login-response reads during the handshake.
pub const LOGIN_TIMEOUT_MS: u64 = 5_000;

/// `Timeout` header value on Originate actions (how long the PBX rings the
/// far end before giving up), in milliseconds.
pub const ORIGINATE_RING_TIMEOUT_MS: u64 = 30_000;

/// Pause between leg 1 resolving as answered and leg 2 being originated, so
/// the wait-context dialplan finishes parking the first call.
pub const LEG2_SETTLE_MS: u64 = 2_000;

/// Maximum number of queued events before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;

/// Directory the PBX polls for outgoing call files.
pub const DEFAULT_SPOOL_DIR: &str = "/var/spool/asterisk/outgoing";

/// Scratch directory call files are staged in before the atomic rename.
pub const DEFAULT_STAGING_DIR: &str = "/tmp";
