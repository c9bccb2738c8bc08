//! `fuse.toml` loading.
//!
//! The file holds orchestrator tunables under `[orchestrator]` and the agent
//! roster under `[[agents]]`. The roster seeds the in-memory capability
//! catalog and agent directory used for local runs.

use chrono::Utc;
use fuse_core::{FuseError, FuseResult, Resource, ResourceStatus, Workflow};
use fuse_orchestrator::{
    CapabilityCatalog, CatalogEntry, OrchestratorConfig, PerformanceMetrics, StaticAgentDirectory,
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuseConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    /// Display name; falls back to the id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_status")]
    pub status: ResourceStatus,
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

/// One capability an agent offers, with its observed performance.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityConfig {
    pub name: String,
    #[serde(default = "default_score")]
    pub reliability: f64,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default = "default_score")]
    pub success_rate: f64,
}

fn default_status() -> ResourceStatus {
    ResourceStatus::Active
}
fn default_score() -> f64 {
    1.0
}

impl AgentConfig {
    /// Catalog id of one of this agent's capabilities.
    pub fn capability_id(&self, capability: &str) -> String {
        format!("{}/{}", self.id, capability)
    }
}

impl FuseConfig {
    /// Build the catalog and directory described by the roster.
    ///
    /// Each capability becomes its own catalog entry with id
    /// `<agent id>/<capability name>`, provided only by that agent.
    pub fn seed(&self) -> (CapabilityCatalog, StaticAgentDirectory) {
        let catalog = CapabilityCatalog::new();
        let mut resources = Vec::with_capacity(self.agents.len());

        for agent in &self.agents {
            let mut provided = Vec::with_capacity(agent.capabilities.len());
            for cap in &agent.capabilities {
                let id = agent.capability_id(&cap.name);
                catalog.register(
                    CatalogEntry::new(id.clone(), cap.name.clone(), cap.reliability)
                        .with_metrics(PerformanceMetrics {
                            average_latency_ms: cap.latency_ms,
                            success_rate: cap.success_rate,
                            last_used: Utc::now(),
                        })
                        .offered_by(agent.id.clone()),
                );
                provided.push(id);
            }
            resources.push(Resource {
                id: agent.id.clone(),
                name: agent.name.clone().unwrap_or_else(|| agent.id.clone()),
                status: agent.status,
                capabilities: provided,
            });
        }

        (catalog, StaticAgentDirectory::new(resources))
    }
}

/// Read and parse a TOML config file.
pub fn parse_config(path: &Path) -> FuseResult<FuseConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        FuseError::Config(format!(
            "Failed to read config '{}': {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content).map_err(|e| {
        FuseError::Config(format!(
            "Failed to parse config '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Read a workflow definition from a JSON file.
pub fn load_workflow(path: &Path) -> FuseResult<Workflow> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use fuse_core::CapabilityRequirement;
    use fuse_orchestrator::{AgentDirectory, CancellationMode, CapabilityMatcher};
    use std::io::Write;

    const ROSTER: &str = r#"
[orchestrator]
recheck_agent_liveness = true
cancellation = "bulk"

[[agents]]
id = "writer"
name = "Writer"

[[agents.capabilities]]
name = "summarize"
reliability = 0.9
latency_ms = 800.0

[[agents]]
id = "night-shift"
status = "inactive"

[[agents.capabilities]]
name = "summarize"
reliability = 0.99
"#;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp.as_file_mut(), "{content}").unwrap();
        tmp
    }

    #[test]
    fn test_parse_full_config() {
        let tmp = write_tmp(ROSTER);
        let config = parse_config(tmp.path()).unwrap();
        assert!(config.orchestrator.recheck_agent_liveness);
        assert_eq!(config.orchestrator.cancellation, CancellationMode::Bulk);
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[1].status, ResourceStatus::Inactive);
        assert_eq!(config.agents[1].capabilities[0].success_rate, 1.0);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let tmp = write_tmp("\n");
        let config = parse_config(tmp.path()).unwrap();
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        assert!(config.agents.is_empty());
    }

    #[test]
    fn test_parse_invalid_toml_returns_error() {
        let tmp = write_tmp("{{{{invalid toml!!!!");
        let err_msg = parse_config(tmp.path()).unwrap_err().to_string();
        assert!(
            err_msg.contains("Failed to parse config"),
            "unexpected error: {err_msg}"
        );
    }

    #[test]
    fn test_parse_nonexistent_file_returns_error() {
        let err_msg = parse_config(Path::new("/nonexistent/path/fuse.toml"))
            .unwrap_err()
            .to_string();
        assert!(
            err_msg.contains("Failed to read config"),
            "unexpected error: {err_msg}"
        );
    }

    #[tokio::test]
    async fn test_seed_builds_catalog_and_directory() {
        let tmp = write_tmp(ROSTER);
        let (catalog, directory) = parse_config(tmp.path()).unwrap().seed();
        assert_eq!(catalog.len(), 2);

        let matches = catalog
            .discover(&CapabilityRequirement::new("summarize"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);

        // The inactive agent offers summarize but is never handed out.
        let found = directory
            .find_active_resource("night-shift/summarize")
            .await
            .unwrap();
        assert!(found.is_none());
        let writer = directory
            .find_active_resource("writer/summarize")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(writer.name, "Writer");
    }

    #[test]
    fn test_load_workflow() {
        let tmp = write_tmp(
            r#"{"id":"wf","name":"W","tasks":[{"id":"t1","name":"T1","type":"prompt","requirement":{"capability":"summarize"}}]}"#,
        );
        let wf = load_workflow(tmp.path()).unwrap();
        assert_eq!(wf.tasks.len(), 1);
        assert_eq!(wf.version, 1);

        let bad = write_tmp("not json");
        assert!(matches!(load_workflow(bad.path()), Err(FuseError::Json(_))));
    }
}
