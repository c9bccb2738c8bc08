use chrono::{DateTime, Utc};
use fuse_core::WorkflowTask;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Task id → agent id for every task of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    agents: HashMap<String, String>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task_id: impl Into<String>, agent_id: impl Into<String>) {
        self.agents.insert(task_id.into(), agent_id.into());
    }

    pub fn agent_for(&self, task_id: &str) -> Option<&str> {
        self.agents.get(task_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.agents.iter().map(|(t, a)| (t.as_str(), a.as_str()))
    }
}

/// A task paired with the agent chosen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task: WorkflowTask,
    pub agent_id: String,
}

/// Tasks with no dependency edges among them, safe to submit together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLevel {
    pub tasks: Vec<PlannedTask>,
}

impl ExecutionLevel {
    pub fn width(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|p| p.task.id.as_str()).collect()
    }
}

/// Ordered levels; every task's dependencies sit in strictly earlier levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub levels: Vec<ExecutionLevel>,
}

impl ExecutionPlan {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn task_count(&self) -> usize {
        self.levels.iter().map(ExecutionLevel::width).sum()
    }

    /// Level index of a task, if it is in the plan.
    pub fn level_of(&self, task_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.tasks.iter().any(|p| p.task.id == task_id))
    }

    /// Task ids per level, for logging and assertions.
    pub fn level_ids(&self) -> Vec<Vec<String>> {
        self.levels
            .iter()
            .map(|l| l.tasks.iter().map(|p| p.task.id.clone()).collect())
            .collect()
    }
}

/// A submission the task queue has taken ownership of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedSubmission {
    pub task_id: String,
    pub agent_id: String,
    pub level: usize,
    pub accepted_at: DateTime<Utc>,
}

/// Append-only record of accepted submissions for one initiation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionLedger {
    entries: Vec<AcceptedSubmission>,
}

impl SubmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task_id: impl Into<String>, agent_id: impl Into<String>, level: usize) {
        self.entries.push(AcceptedSubmission {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            level,
            accepted_at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[AcceptedSubmission] {
        &self.entries
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.task_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of the best-effort cleanup after a failed initiation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cancelled: Vec<String>,
    /// Task ids whose cancellation failed, with the error text.
    pub failed: Vec<(String, String)>,
    /// Set when a single bulk cancel was issued instead of targeted ones.
    pub bulk: bool,
    pub state_marked_failed: bool,
    pub failure_recorded: bool,
}

/// What a successful initiation hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiationReport {
    pub workflow_id: String,
    pub state_id: Uuid,
    pub assignment: Assignment,
    /// Width of each submitted level, in order.
    pub level_widths: Vec<usize>,
    pub submitted: usize,
}
