//! Call-file emission: the filesystem path for originating a leg.
//!
//! Asterisk polls a spool directory and places a call for every file that
//! appears there. The file must never be observed half-written, so it is
//! staged under a scratch directory and moved into the spool directory with
//! a rename, which is atomic within a filesystem.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::action::next_action_id;
use crate::constants::{DEFAULT_SPOOL_DIR, DEFAULT_STAGING_DIR};
use crate::error::{AmiError, AmiResult};

/// Writes Asterisk call files into the outgoing spool directory.
#[derive(Debug, Clone)]
pub struct CallFileSpooler {
    spool_dir: PathBuf,
    staging_dir: PathBuf,
}

impl CallFileSpooler {
    /// Spooler over the standard Asterisk directories.
    pub fn new() -> Self {
        Self::with_dirs(DEFAULT_SPOOL_DIR, DEFAULT_STAGING_DIR)
    }

    /// Spooler over explicit directories. The staging directory should live
    /// on the same filesystem as the spool directory, or the rename will
    /// fail with `EXDEV`.
    pub fn with_dirs(spool_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Directory the PBX polls.
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Render and atomically place a call file for one outbound leg.
    ///
    /// Returns the final path in the spool directory. The moment the rename
    /// lands, the PBX owns the call.
    pub async fn write(&self, channel: &str, context: &str, extension: &str) -> AmiResult<PathBuf> {
        let content = render_call_file(channel, context, extension);

        let filename = format!("call_{}.call", next_action_id());
        let staging_path = self.staging_dir.join(&filename);
        let spool_path = self.spool_dir.join(&filename);

        debug!("Staging call file at {}", staging_path.display());
        tokio::fs::write(&staging_path, &content)
            .await
            .map_err(|source| AmiError::Spool {
                path: staging_path.display().to_string(),
                source,
            })?;

        tokio::fs::rename(&staging_path, &spool_path)
            .await
            .map_err(|source| AmiError::Spool {
                path: spool_path.display().to_string(),
                source,
            })?;

        info!(
            "Call file spooled: {} (Channel: {})",
            spool_path.display(),
            channel
        );
        Ok(spool_path)
    }
}

impl Default for CallFileSpooler {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the call-file body. Call files are plain `key: value` lines with
/// `\n` endings (unlike the CRLF manager protocol).
fn render_call_file(channel: &str, context: &str, extension: &str) -> String {
    format!(
        "Channel: {channel}\n\
         Context: {context}\n\
         Extension: {extension}\n\
         Priority: 1\n\
         CallerID: Conference Call\n\
         MaxRetries: 2\n\
         RetryTime: 60\n\
         WaitTime: 30\n"
    )
}
