//! Sequential two-leg call bridging.
//!
//! One orchestration run connects to the manager interface, originates a
//! first call into a "wait" dialplan context keyed by a bridge id, and,
//! depending on the policy, verifies or assumes it was answered before
//! originating the second call into the "bridge" context on the same id.
//! The dialplan does the actual joining; this module only sequences the legs.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::action::{next_action_id, AmiAction};
use crate::channel::build_channel;
use crate::config::AmiConfig;
use crate::connection::{AmiClient, AmiEventStream};
use crate::constants::{LEG2_SETTLE_MS, ORIGINATE_RING_TIMEOUT_MS};
use crate::error::{AmiError, AmiResult};
use crate::monitor::{wait_for_answer, AnswerOutcome, FailureReason};
use crate::spool::CallFileSpooler;

/// Channel variable carrying the correlation token onto the created channel,
/// for dialplans that embed it in derived channel names.
const CORRELATION_VARIABLE: &str = "CALL_ACTIONID";

/// How leg 2 gets sequenced after leg 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMethod {
    /// Verify leg 1 answered via the event stream before originating leg 2.
    Event,
    /// Sleep a fixed interval between the legs and originate both
    /// fire-and-forget. Always reports success, even if leg 1 never
    /// answered: the trade is verifiability for robustness against PBXes
    /// with incomplete event visibility, and the behavior is preserved
    /// as-is from the system this replaces.
    Simple,
    /// Like [`Simple`](Self::Simple), but leg 2 goes through the call-file
    /// spool instead of a live Originate, avoiding manager-socket races on
    /// the second leg.
    CallFile,
}

impl Default for BridgeMethod {
    fn default() -> Self {
        BridgeMethod::Event
    }
}

impl fmt::Display for BridgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeMethod::Event => "event",
            BridgeMethod::Simple => "simple",
            BridgeMethod::CallFile => "callfile",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an unknown bridge method string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBridgeMethodError(pub String);

impl fmt::Display for ParseBridgeMethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown bridge method: {}", self.0)
    }
}

impl std::error::Error for ParseBridgeMethodError {}

impl FromStr for BridgeMethod {
    type Err = ParseBridgeMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "event" => Ok(BridgeMethod::Event),
            "simple" => Ok(BridgeMethod::Simple),
            "callfile" => Ok(BridgeMethod::CallFile),
            _ => Err(ParseBridgeMethodError(s.to_string())),
        }
    }
}

/// The pair of dialplan contexts an orchestration run targets, and the
/// caller id presented on both legs.
///
/// The wait context parks leg 1 on the bridge-id extension; the bridge
/// context joins leg 2 to whatever is parked there.
#[derive(Debug, Clone)]
pub struct BridgeContexts {
    pub wait_context: String,
    pub bridge_context: String,
    pub caller_id: String,
}

impl BridgeContexts {
    /// Conference-room joining (`ConfBridge` dialplan).
    pub fn conference() -> Self {
        Self {
            wait_context: "call-merge-wait".to_string(),
            bridge_context: "call-merge".to_string(),
            caller_id: "Conference Call".to_string(),
        }
    }

    /// Direct two-party bridging, no conference room.
    pub fn transfer() -> Self {
        Self {
            wait_context: "call-transfer-wait".to_string(),
            bridge_context: "call-transfer-bridge".to_string(),
            caller_id: "Call Transfer".to_string(),
        }
    }
}

/// One side of the bridged call.
#[derive(Debug, Clone)]
pub struct CallLeg {
    pub phone_number: String,
    pub channel: String,
    pub context: String,
    pub extension: String,
    pub action_id: String,
    /// Set only for legs that were monitored.
    pub outcome: Option<AnswerOutcome>,
}

impl CallLeg {
    fn new(trunk: &str, phone_number: &str, context: &str, extension: &str) -> Self {
        Self {
            phone_number: phone_number.to_string(),
            channel: build_channel(trunk, phone_number),
            context: context.to_string(),
            extension: extension.to_string(),
            action_id: next_action_id(),
            outcome: None,
        }
    }

    /// The Originate action for this leg. `correlate` additionally stamps
    /// the action id onto the channel as a variable (monitored legs only).
    fn originate(&self, caller_id: &str, correlate: bool) -> AmiAction {
        let variables = if correlate {
            vec![(CORRELATION_VARIABLE.to_string(), self.action_id.clone())]
        } else {
            Vec::new()
        };
        AmiAction::Originate {
            channel: self.channel.clone(),
            context: self.context.clone(),
            exten: self.extension.clone(),
            priority: 1,
            caller_id: caller_id.to_string(),
            timeout_ms: ORIGINATE_RING_TIMEOUT_MS,
            action_id: self.action_id.clone(),
            variables,
        }
    }
}

/// One bridging request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub phone1: String,
    pub phone2: String,
    /// Extension both legs meet on; generated when absent.
    #[serde(default)]
    pub bridge_id: Option<String>,
    #[serde(default)]
    pub method: BridgeMethod,
    /// Inter-leg sleep for the fixed-delay policies; config default when
    /// absent.
    #[serde(default)]
    pub wait_secs: Option<u64>,
}

impl BridgeRequest {
    /// Request with the default method and generated bridge id.
    pub fn new(phone1: impl Into<String>, phone2: impl Into<String>) -> Self {
        Self {
            phone1: phone1.into(),
            phone2: phone2.into(),
            bridge_id: None,
            method: BridgeMethod::default(),
            wait_secs: None,
        }
    }

    /// Same request with an explicit method.
    pub fn with_method(mut self, method: BridgeMethod) -> Self {
        self.method = method;
        self
    }
}

/// Structured result of one orchestration run. Nothing about a run escapes
/// as an error: every failure is folded into this object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeOutcome {
    pub success: bool,
    pub bridge_id: String,
    pub phone1: String,
    pub phone2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id2: Option<String>,
    pub method: BridgeMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generate a short numeric bridge id, 1000–9999 inclusive.
///
/// Ids are independent per run with no reservation; two concurrent runs can
/// in principle collide, which the dialplan tolerates the same way the
/// predecessor system did.
fn generate_bridge_id() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Drives the full workflow: connect, originate leg 1, wait-or-sleep,
/// originate or spool leg 2, disconnect.
///
/// One `CallBridger` serves many runs; each [`run`](Self::run) opens its own
/// connection and shares nothing with concurrent runs.
#[derive(Debug, Clone)]
pub struct CallBridger {
    config: AmiConfig,
    contexts: BridgeContexts,
    spooler: CallFileSpooler,
}

impl CallBridger {
    /// Bridger over the standard spool directories.
    pub fn new(config: AmiConfig, contexts: BridgeContexts) -> Self {
        Self {
            config,
            contexts,
            spooler: CallFileSpooler::new(),
        }
    }

    /// Bridger with an explicit spooler (non-standard spool paths, tests).
    pub fn with_spooler(config: AmiConfig, contexts: BridgeContexts, spooler: CallFileSpooler) -> Self {
        Self {
            config,
            contexts,
            spooler,
        }
    }

    /// Execute one bridging run. Infallible by contract: every error is
    /// converted into the returned outcome.
    pub async fn run(&self, request: BridgeRequest) -> BridgeOutcome {
        let bridge_id = request
            .bridge_id
            .clone()
            .unwrap_or_else(generate_bridge_id);

        info!(
            "Starting {} call bridge: {} -> {} on extension {}",
            request.method, request.phone1, request.phone2, bridge_id
        );

        let mut outcome = BridgeOutcome {
            success: false,
            bridge_id,
            phone1: request.phone1.clone(),
            phone2: request.phone2.clone(),
            action_id1: None,
            action_id2: None,
            method: request.method,
            error: None,
        };

        let result = match request.method {
            BridgeMethod::Event => self.run_event_verified(&request, &mut outcome).await,
            BridgeMethod::Simple => self.run_fixed_delay(&request, &mut outcome, false).await,
            BridgeMethod::CallFile => self.run_fixed_delay(&request, &mut outcome, true).await,
        };

        match result {
            Ok(()) => {
                outcome.success = true;
                info!(
                    "Bridge run complete: {} -> {} on extension {}",
                    outcome.phone1, outcome.phone2, outcome.bridge_id
                );
            }
            Err(e) => {
                warn!("Bridge run failed: {}", e);
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }

    /// Event-verified policy: leg 2 is never originated unless leg 1
    /// resolved as answered.
    async fn run_event_verified(
        &self,
        request: &BridgeRequest,
        outcome: &mut BridgeOutcome,
    ) -> AmiResult<()> {
        let (client, mut events) = self.connect().await?;
        let result = self
            .event_verified_legs(&client, &mut events, request, outcome)
            .await;
        client.close().await;
        result
    }

    async fn event_verified_legs(
        &self,
        client: &AmiClient,
        events: &mut AmiEventStream,
        request: &BridgeRequest,
        outcome: &mut BridgeOutcome,
    ) -> AmiResult<()> {
        let mut leg1 = CallLeg::new(
            &self.config.outgoing_trunk,
            &request.phone1,
            &self.contexts.wait_context,
            &outcome.bridge_id,
        );

        info!(
            "Step 1: calling {} via {} and waiting for answer (ActionID {})",
            leg1.phone_number, leg1.channel, leg1.action_id
        );
        client
            .send_action(&leg1.originate(&self.contexts.caller_id, true))
            .await?;
        outcome.action_id1 = Some(leg1.action_id.clone());

        let answer =
            wait_for_answer(events, &leg1.action_id, self.config.default_timeout()).await;
        leg1.outcome = Some(answer.clone());
        debug!("Leg 1 resolved: {:?}", leg1);

        match answer {
            AnswerOutcome::Answered(signal) => {
                info!("Step 1 complete: {} answered ({})", leg1.phone_number, signal);
            }
            AnswerOutcome::Failed(FailureReason::Rejected { response, message }) => {
                return Err(AmiError::OriginateRejected { response, message });
            }
            AnswerOutcome::Failed(reason) => {
                return Err(AmiError::NotAnswered {
                    reason: format!(
                        "first call to {} was not answered or failed: {}",
                        request.phone1, reason
                    ),
                });
            }
            AnswerOutcome::TimedOut => {
                return Err(AmiError::NotAnswered {
                    reason: format!(
                        "first call to {} was not answered within {}s",
                        request.phone1, self.config.default_timeout_secs
                    ),
                });
            }
        }

        // Give the wait-context dialplan time to park leg 1 before the
        // bridge context goes looking for it.
        tokio::time::sleep(Duration::from_millis(LEG2_SETTLE_MS)).await;

        let leg2 = CallLeg::new(
            &self.config.outgoing_trunk,
            &request.phone2,
            &self.contexts.bridge_context,
            &outcome.bridge_id,
        );
        info!(
            "Step 2: calling {} via {} (ActionID {})",
            leg2.phone_number, leg2.channel, leg2.action_id
        );
        client
            .send_action(&leg2.originate(&self.contexts.caller_id, false))
            .await?;
        outcome.action_id2 = Some(leg2.action_id.clone());

        debug!("Step 2 complete: second call initiated, dialplan will bridge");
        Ok(())
    }

    /// Fixed-delay policies: a flat sleep substitutes for verified
    /// sequencing. `spool_leg2` selects the call-file path.
    async fn run_fixed_delay(
        &self,
        request: &BridgeRequest,
        outcome: &mut BridgeOutcome,
        spool_leg2: bool,
    ) -> AmiResult<()> {
        let wait = request
            .wait_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.default_wait());

        let (client, _events) = self.connect().await?;
        let result = self
            .fixed_delay_legs(&client, request, outcome, wait, spool_leg2)
            .await;
        client.close().await;
        result
    }

    async fn fixed_delay_legs(
        &self,
        client: &AmiClient,
        request: &BridgeRequest,
        outcome: &mut BridgeOutcome,
        wait: Duration,
        spool_leg2: bool,
    ) -> AmiResult<()> {
        let leg1 = CallLeg::new(
            &self.config.outgoing_trunk,
            &request.phone1,
            &self.contexts.wait_context,
            &outcome.bridge_id,
        );
        info!(
            "Step 1: calling {} via {} (ActionID {})",
            leg1.phone_number, leg1.channel, leg1.action_id
        );
        client
            .send_action(&leg1.originate(&self.contexts.caller_id, false))
            .await?;
        outcome.action_id1 = Some(leg1.action_id.clone());

        info!(
            "Step 2: waiting {:?} for the first call to be answered",
            wait
        );
        tokio::time::sleep(wait).await;

        if spool_leg2 {
            info!("Step 3: spooling call file for {}", request.phone2);
            let channel2 = build_channel(&self.config.outgoing_trunk, &request.phone2);
            self.spooler
                .write(&channel2, &self.contexts.bridge_context, &outcome.bridge_id)
                .await?;
            outcome.action_id2 = Some("callfile".to_string());
        } else {
            let leg2 = CallLeg::new(
                &self.config.outgoing_trunk,
                &request.phone2,
                &self.contexts.bridge_context,
                &outcome.bridge_id,
            );
            info!(
                "Step 3: calling {} via {} (ActionID {})",
                leg2.phone_number, leg2.channel, leg2.action_id
            );
            client
                .send_action(&leg2.originate(&self.contexts.caller_id, false))
                .await?;
            outcome.action_id2 = Some(leg2.action_id.clone());
        }

        debug!("Step 3 complete: second leg issued, dialplan will bridge");
        Ok(())
    }

    async fn connect(&self) -> AmiResult<(AmiClient, AmiEventStream)> {
        AmiClient::connect(
            &self.config.host,
            self.config.port,
            &self.config.username,
            &self.config.password,
        )
        .await
    }
}
