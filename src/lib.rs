//! Asterisk Manager Interface (AMI) client for Rust, with a sequential
//! two-leg call-bridging orchestrator.
//!
//! This crate connects to an Asterisk PBX over the manager TCP port,
//! authenticates, originates calls, and classifies the asynchronous event
//! stream to decide whether a call was answered, the groundwork for
//! bridging two outbound calls through a pair of dialplan contexts.
//!
//! It is deliberately not a general-purpose AMI client: the action surface
//! is exactly what the orchestrator needs (`Login`, `Originate`, `Logoff`),
//! and the event vocabulary is the set the answer heuristics consume.
//!
//! # Architecture
//!
//! The library uses a split reader/writer design:
//! - [`AmiClient`] (Clone + Send) — send actions from any task
//! - [`AmiEventStream`] — parsed blocks (replies and events alike) from a
//!   background reader task, correlated by `ActionID`
//!
//! # Examples
//!
//! ## Bridging two calls
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiConfig, BridgeContexts, BridgeRequest, CallBridger};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AmiConfig::default();
//!     let bridger = CallBridger::new(config, BridgeContexts::conference());
//!
//!     let outcome = bridger.run(BridgeRequest::new("6981234567", "6974888710")).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
//! }
//! ```
//!
//! ## Monitoring an originate by hand
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use asterisk_ami_tokio::{wait_for_answer, AmiAction, AmiClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), asterisk_ami_tokio::AmiError> {
//!     let (client, mut events) = AmiClient::connect("localhost", 5038, "admin", "amp111").await?;
//!
//!     let action_id = asterisk_ami_tokio::next_action_id();
//!     client.send_action(&AmiAction::Originate {
//!         channel: "SIP/6981234567".into(),
//!         context: "call-merge-wait".into(),
//!         exten: "4242".into(),
//!         priority: 1,
//!         caller_id: "Conference Call".into(),
//!         timeout_ms: 30_000,
//!         action_id: action_id.clone(),
//!         variables: vec![],
//!     }).await?;
//!
//!     let outcome = wait_for_answer(&mut events, &action_id, Duration::from_secs(30)).await;
//!     println!("{:?}", outcome);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod headers;
pub mod monitor;
pub mod spool;

pub(crate) mod buffer;
pub mod constants;
pub(crate) mod protocol;

pub use action::{next_action_id, AmiAction};
pub use bridge::{
    BridgeContexts, BridgeMethod, BridgeOutcome, BridgeRequest, CallBridger, CallLeg,
    ParseBridgeMethodError,
};
pub use channel::{build_channel, ChannelState, ParseChannelStateError};
pub use config::AmiConfig;
pub use connection::{
    AmiClient, AmiConnectOptions, AmiEventStream, ConnectionStatus, DisconnectReason,
};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, AmiEventType, ParseEventTypeError};
pub use headers::{AmiHeader, ParseHeaderError};
pub use monitor::{wait_for_answer, AnswerOutcome, AnswerSignal, FailureReason};
pub use spool::CallFileSpooler;
