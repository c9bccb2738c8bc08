use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of one initiation attempt, as tracked by the state manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Created,
    Running,
    Failed,
}

impl WorkflowStatus {
    /// Status only moves forward: created → running → failed, or created → failed.
    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        matches!(
            (self, next),
            (WorkflowStatus::Created, WorkflowStatus::Running)
                | (WorkflowStatus::Created, WorkflowStatus::Failed)
                | (WorkflowStatus::Running, WorkflowStatus::Failed)
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Created => write!(f, "created"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Handle to the state record of one initiation attempt.
///
/// The record itself is owned by the state manager; this is the copy threaded
/// through scheduling so downstream collaborators can correlate tasks with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Created,
            created_at: Utc::now(),
        }
    }
}

/// Where a single initiation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiationPhase {
    Created,
    Validating,
    Assigning,
    Planning,
    Scheduling,
    Returned,
    Failed,
}

impl InitiationPhase {
    /// Next phase on the success path. Terminal phases have none.
    pub fn next(self) -> Option<InitiationPhase> {
        match self {
            InitiationPhase::Created => Some(InitiationPhase::Validating),
            InitiationPhase::Validating => Some(InitiationPhase::Assigning),
            InitiationPhase::Assigning => Some(InitiationPhase::Planning),
            InitiationPhase::Planning => Some(InitiationPhase::Scheduling),
            InitiationPhase::Scheduling => Some(InitiationPhase::Returned),
            InitiationPhase::Returned | InitiationPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InitiationPhase::Returned | InitiationPhase::Failed)
    }
}

impl std::fmt::Display for InitiationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InitiationPhase::Created => "created",
            InitiationPhase::Validating => "validating",
            InitiationPhase::Assigning => "assigning",
            InitiationPhase::Planning => "planning",
            InitiationPhase::Scheduling => "scheduling",
            InitiationPhase::Returned => "returned",
            InitiationPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
