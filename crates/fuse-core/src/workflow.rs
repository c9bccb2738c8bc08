use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a task needs from the agent that runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequirement {
    /// Capability name, e.g. `code-generation`.
    pub capability: String,
    /// Minimum reliability score in `[0, 1]`; `0.0` accepts anything.
    #[serde(default)]
    pub min_reliability: f64,
    /// Agents the matcher should rank first when they qualify.
    #[serde(default)]
    pub preferred_agents: Vec<String>,
    /// How the matcher should weigh its ranking signals for this requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<RankingPreferences>,
}

/// Per-requirement adjustments to capability ranking.
///
/// `custom_weights` replace the matcher's base weights first; the
/// `prioritize_*` presets are applied on top, in field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingPreferences {
    #[serde(default)]
    pub prioritize_speed: bool,
    #[serde(default)]
    pub prioritize_accuracy: bool,
    #[serde(default)]
    pub prioritize_recently_used: bool,
    #[serde(default)]
    pub custom_weights: Option<WeightOverrides>,
}

/// Individual ranking weights to override. Unset fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverrides {
    pub reliability: Option<f64>,
    pub success_rate: Option<f64>,
    pub latency: Option<f64>,
    pub recent_activity: Option<f64>,
}

impl CapabilityRequirement {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            min_reliability: 0.0,
            preferred_agents: Vec::new(),
            preferences: None,
        }
    }

    pub fn with_min_reliability(mut self, min_reliability: f64) -> Self {
        self.min_reliability = min_reliability;
        self
    }

    pub fn with_preferred_agents(mut self, agents: Vec<String>) -> Self {
        self.preferred_agents = agents;
        self
    }

    pub fn with_preferences(mut self, preferences: RankingPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }
}

/// Type tag of a task.
///
/// Known tags get their own variant; anything else is carried verbatim so
/// consumers of custom task types can still dispatch on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    Prompt,
    ApiCall,
    Transform,
    Review,
    Other(String),
}

impl From<String> for TaskKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "prompt" => TaskKind::Prompt,
            "api_call" => TaskKind::ApiCall,
            "transform" => TaskKind::Transform,
            "review" => TaskKind::Review,
            _ => TaskKind::Other(tag),
        }
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Prompt => write!(f, "prompt"),
            TaskKind::ApiCall => write!(f, "api_call"),
            TaskKind::Transform => write!(f, "transform"),
            TaskKind::Review => write!(f, "review"),
            TaskKind::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// A single node of a workflow's dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub requirement: CapabilityRequirement,
    /// Type-specific fields. Decoded lazily by whoever consumes `kind`.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Ids of tasks in the same workflow that must be scheduled first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl WorkflowTask {
    pub fn new(id: impl Into<String>, kind: TaskKind, capability: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            requirement: CapabilityRequirement::new(capability),
            parameters: serde_json::Map::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_requirement(mut self, requirement: CapabilityRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Decode one parameter. `Ok(None)` when the key is absent.
    pub fn parameter<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.parameters
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
    }
}

/// An external API a workflow declares so its tasks can call it as a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Raw description (OpenAPI fragment or similar); opaque to the core.
    #[serde(default)]
    pub spec: serde_json::Value,
}

fn default_version() -> u32 {
    1
}

/// A declarative workflow: an ordered set of tasks forming a dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    pub tasks: Vec<WorkflowTask>,
    #[serde(default)]
    pub apis: Vec<ApiSpec>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            version: default_version(),
            tasks: Vec::new(),
            apis: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_task(mut self, task: WorkflowTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_api(mut self, api: ApiSpec) -> Self {
        self.apis.push(api);
        self
    }

    pub fn task(&self, id: &str) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// One requirement per task, in task order.
    pub fn requirements(&self) -> Vec<CapabilityRequirement> {
        self.tasks.iter().map(|t| t.requirement.clone()).collect()
    }
}
