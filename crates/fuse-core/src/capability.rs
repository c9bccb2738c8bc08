use serde::{Deserialize, Serialize};

/// One eligible capability returned by a matcher, ranked highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMatch {
    pub capability_id: String,
    pub name: String,
    /// Reliability score in `[0, 1]`.
    pub reliability: f64,
}

impl CapabilityMatch {
    pub fn new(capability_id: impl Into<String>, name: impl Into<String>, reliability: f64) -> Self {
        Self {
            capability_id: capability_id.into(),
            name: name.into(),
            reliability: reliability.clamp(0.0, 1.0),
        }
    }
}

/// Aggregate verdict over a set of capability requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub missing_capabilities: Vec<String>,
    pub unreliable_capabilities: Vec<String>,
}

impl ValidationResult {
    /// Build a verdict; `valid` is derived from the two lists.
    pub fn from_findings(missing: Vec<String>, unreliable: Vec<String>) -> Self {
        Self {
            valid: missing.is_empty() && unreliable.is_empty(),
            missing_capabilities: missing,
            unreliable_capabilities: unreliable,
        }
    }

    /// One human-readable message per finding.
    pub fn messages(&self) -> Vec<String> {
        self.missing_capabilities
            .iter()
            .map(|c| format!("Missing capability: {c}"))
            .chain(
                self.unreliable_capabilities
                    .iter()
                    .map(|c| format!("Capability does not meet reliability threshold: {c}")),
            )
            .collect()
    }
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Active,
    Busy,
    Inactive,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::Busy => write!(f, "busy"),
            ResourceStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A concrete worker ("agent") that can run tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub status: ResourceStatus,
    /// Ids of the capabilities this agent provides.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Resource {
    pub fn is_active(&self) -> bool {
        self.status == ResourceStatus::Active
    }

    pub fn provides(&self, capability_id: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability_id)
    }
}
