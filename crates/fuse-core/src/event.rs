use crate::error::FuseError;
use crate::state::InitiationPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of lifecycle event reported to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WorkflowStarted,
    TaskScheduled,
    TaskCancelled,
    WorkflowFailed,
    /// Carries the cleanup report of a failed initiation.
    CleanupFinished,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::WorkflowStarted => write!(f, "workflow_started"),
            EventKind::TaskScheduled => write!(f, "task_scheduled"),
            EventKind::TaskCancelled => write!(f, "task_cancelled"),
            EventKind::WorkflowFailed => write!(f, "workflow_failed"),
            EventKind::CleanupFinished => write!(f, "cleanup_finished"),
        }
    }
}

/// Serializable description of a failure: class name, message and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    pub context: serde_json::Value,
}

impl ErrorReport {
    /// Capture an error together with the phase it was raised in.
    pub fn capture(err: &FuseError, phase: InitiationPhase) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            context: serde_json::json!({
                "phase": phase,
                "preflight": err.is_preflight(),
                "violations": err.violations(),
                "debug": format!("{err:?}"),
            }),
        }
    }
}

/// A single event recorded against a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorReport>,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            task_id: None,
            metadata: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_task(kind: EventKind, task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Self::new(kind)
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_error(mut self, error: ErrorReport) -> Self {
        self.error = Some(error);
        self
    }
}
