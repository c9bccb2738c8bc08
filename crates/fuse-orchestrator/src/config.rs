use fuse_core::{FuseError, FuseResult};
use serde::{Deserialize, Serialize};

/// How already-accepted submissions are retracted after a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationMode {
    /// One `cancel` call per accepted task, each logged on its own.
    #[default]
    Targeted,
    /// A single `cancel_all` for the workflow id.
    Bulk,
}

/// Tunables of the orchestrator, usually read from the `[orchestrator]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Re-check that every assigned agent is still active right before its
    /// level is submitted.
    #[serde(default)]
    pub recheck_agent_liveness: bool,
    #[serde(default)]
    pub cancellation: CancellationMode,
    /// Record a `workflow_started` event once the state record exists.
    #[serde(default = "default_record_start")]
    pub record_start_event: bool,
}

fn default_record_start() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recheck_agent_liveness: false,
            cancellation: CancellationMode::default(),
            record_start_event: default_record_start(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML document holding the fields at top level.
    pub fn from_toml(input: &str) -> FuseResult<Self> {
        toml::from_str(input).map_err(|e| FuseError::Config(format!("Invalid orchestrator config: {e}")))
    }
}
