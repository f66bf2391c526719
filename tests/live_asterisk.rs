//! Integration tests against a live Asterisk instance.
//!
//! These tests require an Asterisk manager interface on 127.0.0.1:5038 with
//! user admin/amp111 and the call-merge/call-transfer dialplan contexts.
//! Run with: cargo test --test live_asterisk -- --ignored

use std::time::Duration;

use asterisk_ami_tokio::{
    next_action_id, wait_for_answer, AmiClient, AmiConfig, AnswerOutcome, BridgeContexts,
    BridgeMethod, BridgeRequest, CallBridger,
};

const AMI_HOST: &str = "127.0.0.1";
const AMI_PORT: u16 = 5038;
const AMI_USER: &str = "admin";
const AMI_SECRET: &str = "amp111";

/// Extension expected to answer immediately (e.g. an echo test peer).
const ANSWERING_EXTENSION: &str = "20";

async fn connect() -> (AmiClient, asterisk_ami_tokio::AmiEventStream) {
    AmiClient::connect(AMI_HOST, AMI_PORT, AMI_USER, AMI_SECRET)
        .await
        .expect("failed to connect to Asterisk")
}

#[tokio::test]
#[ignore]
async fn live_connect_and_logoff() {
    let (client, _events) = connect().await;
    assert!(client.is_connected());
    client.close().await;
}

#[tokio::test]
#[ignore]
async fn live_bad_credentials_rejected() {
    let err = AmiClient::connect(AMI_HOST, AMI_PORT, AMI_USER, "definitely-wrong")
        .await
        .expect_err("login must fail");
    assert!(err.to_string().contains("authentication failed"));
}

#[tokio::test]
#[ignore]
async fn live_monitor_times_out_without_matching_events() {
    let (client, mut events) = connect().await;

    let action_id = next_action_id();
    let outcome = wait_for_answer(&mut events, &action_id, Duration::from_secs(2)).await;
    // No originate was issued, so nothing can resolve it. A Hangup from
    // unrelated PBX traffic is the only other acceptable resolution.
    assert!(
        matches!(outcome, AnswerOutcome::TimedOut | AnswerOutcome::Failed(_)),
        "unexpected outcome: {:?}",
        outcome
    );

    client.close().await;
}

#[tokio::test]
#[ignore]
async fn live_event_bridge_to_answering_extension() {
    let config = AmiConfig {
        host: AMI_HOST.to_string(),
        port: AMI_PORT,
        username: AMI_USER.to_string(),
        password: AMI_SECRET.to_string(),
        ..AmiConfig::default()
    };
    let bridger = CallBridger::new(config, BridgeContexts::transfer());

    let outcome = bridger
        .run(
            BridgeRequest::new(ANSWERING_EXTENSION, ANSWERING_EXTENSION)
                .with_method(BridgeMethod::Event),
        )
        .await;

    assert!(outcome.success, "bridge failed: {:?}", outcome.error);
    assert!(outcome.action_id1.is_some());
    assert!(outcome.action_id2.is_some());
}
