use crate::state::WorkflowState;
use crate::workflow::{TaskKind, WorkflowTask};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the task queue needs to take ownership of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub workflow_id: String,
    /// Id of the [`WorkflowState`] this submission belongs to.
    pub state_id: Uuid,
    pub task_id: String,
    pub task_name: String,
    pub kind: TaskKind,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub agent_id: String,
    /// Index of the execution level the task was submitted in.
    pub level: usize,
    pub submitted_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(
        state: &WorkflowState,
        task: &WorkflowTask,
        agent_id: impl Into<String>,
        level: usize,
    ) -> Self {
        Self {
            workflow_id: state.workflow_id.clone(),
            state_id: state.id,
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            kind: task.kind.clone(),
            parameters: task.parameters.clone(),
            agent_id: agent_id.into(),
            level,
            submitted_at: Utc::now(),
        }
    }
}

/// Answer of the task queue to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SubmissionOutcome {
    /// The queue took ownership. Says nothing about completion.
    Accepted,
    Rejected { reason: String },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_state_reference() {
        let state = WorkflowState::new("wf-7");
        let task = WorkflowTask::new("t1", TaskKind::Transform, "csv")
            .with_parameter("delimiter", serde_json::json!(";"));
        let env = TaskEnvelope::new(&state, &task, "agent-1", 2);
        assert_eq!(env.workflow_id, "wf-7");
        assert_eq!(env.state_id, state.id);
        assert_eq!(env.level, 2);
        assert_eq!(env.parameters["delimiter"], ";");
    }

    #[test]
    fn test_outcome() {
        assert!(SubmissionOutcome::Accepted.is_accepted());
        assert!(!SubmissionOutcome::Rejected {
            reason: "full".into()
        }
        .is_accepted());
    }
}
