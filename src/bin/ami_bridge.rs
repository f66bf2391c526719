//! Command-line front end for the call-bridging orchestrator.
//!
//! Connects to the PBX named in the config file (TOML; stock FreePBX
//! defaults when absent), bridges the two phone numbers with the selected
//! policy, and prints the structured outcome as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use asterisk_ami_tokio::{
    AmiConfig, BridgeContexts, BridgeMethod, BridgeRequest, CallBridger,
};

#[derive(Debug, Parser)]
#[command(name = "ami-bridge", version, about = "Bridge two phone calls through an Asterisk PBX")]
struct Cli {
    /// First number to call (parked in the wait context until leg 2 joins)
    phone1: String,

    /// Second number to call (sent into the bridge context)
    phone2: String,

    /// Extension both legs meet on; random 1000-9999 when omitted
    bridge_id: Option<String>,

    /// Sequencing policy: event (verify leg 1 answered), simple (fixed
    /// delay), or callfile (fixed delay, leg 2 via spool file)
    #[arg(short, long, default_value = "event")]
    method: BridgeMethod,

    /// Seconds to sleep between legs for simple/callfile; config default
    /// when omitted
    #[arg(short, long)]
    wait_secs: Option<u64>,

    /// TOML config file with AMI host/credentials and trunk
    #[arg(short, long, env = "AMI_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Bridge the calls directly instead of joining a conference room
    #[arg(long)]
    transfer: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AmiConfig::load(path).await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(2);
            }
        },
        None => AmiConfig::default(),
    };

    let contexts = if cli.transfer {
        BridgeContexts::transfer()
    } else {
        BridgeContexts::conference()
    };

    let request = BridgeRequest {
        phone1: cli.phone1,
        phone2: cli.phone2,
        bridge_id: cli.bridge_id,
        method: cli.method,
        wait_secs: cli.wait_secs,
    };

    let bridger = CallBridger::new(config, contexts);
    let outcome = bridger.run(request).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).expect("bridge outcome is serializable")
    );

    if !outcome.success {
        std::process::exit(1);
    }
}
