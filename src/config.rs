//! Connection and orchestration configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::constants::DEFAULT_AMI_PORT;
use crate::error::{AmiError, AmiResult};

/// Everything an orchestration run needs to know about its PBX: manager
/// credentials, the outgoing trunk, and the default pacing values.
///
/// Every field has a default, so a TOML config file only needs the values
/// that differ from a stock FreePBX install.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    /// Manager interface host.
    pub host: String,
    /// Manager interface port.
    pub port: u16,
    /// Manager username.
    pub username: String,
    /// Manager secret.
    pub password: String,
    /// Trunk spec outbound legs dial through: a bare technology (`SIP`) or
    /// a qualified trunk (`PJSIP/trunkA`). See
    /// [`build_channel`](crate::channel::build_channel).
    pub outgoing_trunk: String,
    /// How long the event-verified policy waits for leg 1 to answer.
    pub default_timeout_secs: u64,
    /// How long the fixed-delay policies sleep between the legs.
    pub default_wait_secs: u64,
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_AMI_PORT,
            username: "admin".to_string(),
            password: "amp111".to_string(),
            outgoing_trunk: "SIP".to_string(),
            default_timeout_secs: 30,
            default_wait_secs: 8,
        }
    }
}

impl std::fmt::Debug for AmiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("outgoing_trunk", &self.outgoing_trunk)
            .field("default_timeout_secs", &self.default_timeout_secs)
            .field("default_wait_secs", &self.default_wait_secs)
            .finish()
    }
}

impl AmiConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(s: &str) -> AmiResult<Self> {
        toml::from_str(s).map_err(|e| AmiError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> AmiResult<Self> {
        let text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| AmiError::InvalidConfig {
                message: format!("{}: {}", path.as_ref().display(), e),
            })?;
        Self::from_toml_str(&text)
    }

    /// Answer-monitoring deadline for the event-verified policy.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Inter-leg sleep for the fixed-delay policies.
    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_wait_secs)
    }
}
