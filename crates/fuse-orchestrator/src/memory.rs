//! In-process collaborators for tests, local dry runs and the CLI.

use crate::collaborators::{AgentDirectory, StateManager, TaskQueue, ToolRegistrar};
use async_trait::async_trait;
use fuse_core::{
    ApiSpec, ErrorReport, FuseError, FuseResult, Resource, ResourceStatus, SubmissionOutcome,
    TaskEnvelope, Workflow, WorkflowState, WorkflowStatus,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

/// Agent directory over a fixed roster whose statuses can change at runtime.
pub struct StaticAgentDirectory {
    agents: RwLock<Vec<Resource>>,
}

impl StaticAgentDirectory {
    pub fn new(agents: Vec<Resource>) -> Self {
        Self {
            agents: RwLock::new(agents),
        }
    }

    /// Change an agent's status. Returns false for unknown ids.
    pub fn set_status(&self, agent_id: &str, status: ResourceStatus) -> bool {
        let mut agents = self.agents.write();
        match agents.iter_mut().find(|a| a.id == agent_id) {
            Some(agent) => {
                agent.status = status;
                true
            }
            None => false,
        }
    }

    pub fn agents(&self) -> Vec<Resource> {
        self.agents.read().clone()
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn find_active_resource(&self, capability_id: &str) -> FuseResult<Option<Resource>> {
        Ok(self
            .agents
            .read()
            .iter()
            .find(|a| a.is_active() && a.provides(capability_id))
            .cloned())
    }

    async fn is_active(&self, resource_id: &str) -> FuseResult<bool> {
        Ok(self
            .agents
            .read()
            .iter()
            .any(|a| a.id == resource_id && a.is_active()))
    }
}

/// Task queue that keeps accepted envelopes in memory.
///
/// Individual task ids can be set up to be rejected, and cancellation can be
/// switched off to exercise best-effort cleanup.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    accepted: Mutex<Vec<TaskEnvelope>>,
    /// `(workflow id, state id, task id)` of each targeted cancel.
    cancelled: Mutex<Vec<(String, Uuid, String)>>,
    bulk_cancelled: Mutex<Vec<String>>,
    rejections: RwLock<HashMap<String, String>>,
    cancel_unavailable: AtomicBool,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future submission of `task_id` with `reason`.
    pub fn reject_task(&self, task_id: impl Into<String>, reason: impl Into<String>) {
        self.rejections.write().insert(task_id.into(), reason.into());
    }

    pub fn set_cancel_unavailable(&self, unavailable: bool) {
        self.cancel_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every envelope ever accepted, in acceptance order.
    pub fn accepted(&self) -> Vec<TaskEnvelope> {
        self.accepted.lock().clone()
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().len()
    }

    /// Accepted envelopes of a workflow that have not been cancelled.
    pub fn pending(&self, workflow_id: &str) -> Vec<TaskEnvelope> {
        let cancelled = self.cancelled.lock();
        let bulk = self.bulk_cancelled.lock();
        self.accepted
            .lock()
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .filter(|e| !bulk.contains(&e.workflow_id))
            .filter(|e| {
                !cancelled
                    .iter()
                    .any(|(_, state, task)| *state == e.state_id && *task == e.task_id)
            })
            .cloned()
            .collect()
    }

    /// Task ids cancelled one by one for a workflow.
    pub fn cancelled(&self, workflow_id: &str) -> Vec<String> {
        self.cancelled
            .lock()
            .iter()
            .filter(|(wf, _, _)| wf == workflow_id)
            .map(|(_, _, task)| task.clone())
            .collect()
    }

    /// Workflow ids that received a bulk cancel.
    pub fn bulk_cancelled(&self) -> Vec<String> {
        self.bulk_cancelled.lock().clone()
    }

    fn ensure_cancel_available(&self) -> FuseResult<()> {
        if self.cancel_unavailable.load(Ordering::SeqCst) {
            return Err(FuseError::Queue("cancellation endpoint unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> FuseResult<SubmissionOutcome> {
        if let Some(reason) = self.rejections.read().get(&envelope.task_id) {
            debug!(task_id = %envelope.task_id, reason = %reason, "Submission rejected");
            return Ok(SubmissionOutcome::Rejected {
                reason: reason.clone(),
            });
        }
        debug!(task_id = %envelope.task_id, agent_id = %envelope.agent_id, "Submission accepted");
        self.accepted.lock().push(envelope);
        Ok(SubmissionOutcome::Accepted)
    }

    async fn cancel(&self, state_id: Uuid, task_id: &str) -> FuseResult<()> {
        self.ensure_cancel_available()?;
        let workflow_id = self
            .accepted
            .lock()
            .iter()
            .find(|e| e.state_id == state_id && e.task_id == task_id)
            .map(|e| e.workflow_id.clone())
            .ok_or_else(|| {
                FuseError::Queue(format!(
                    "Task '{task_id}' is not queued for workflow state '{state_id}'"
                ))
            })?;
        self.cancelled
            .lock()
            .push((workflow_id, state_id, task_id.to_string()));
        Ok(())
    }

    async fn cancel_all(&self, workflow_id: &str) -> FuseResult<()> {
        self.ensure_cancel_available()?;
        self.bulk_cancelled.lock().push(workflow_id.to_string());
        Ok(())
    }
}

/// State manager keeping records in a map, enforcing forward-only transitions.
#[derive(Default)]
pub struct InMemoryStateManager {
    states: RwLock<HashMap<Uuid, WorkflowState>>,
    failures: RwLock<HashMap<Uuid, ErrorReport>>,
    unavailable: AtomicBool,
}

impl InMemoryStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a state error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get(&self, state_id: Uuid) -> Option<WorkflowState> {
        self.states.read().get(&state_id).cloned()
    }

    /// The report stored when the state was marked failed.
    pub fn failure(&self, state_id: Uuid) -> Option<ErrorReport> {
        self.failures.read().get(&state_id).cloned()
    }

    /// All state records created for a workflow id.
    pub fn states_for(&self, workflow_id: &str) -> Vec<WorkflowState> {
        self.states
            .read()
            .values()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    fn ensure_available(&self) -> FuseResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FuseError::State("state store unavailable".to_string()));
        }
        Ok(())
    }

    fn transition(&self, state_id: Uuid, next: WorkflowStatus) -> FuseResult<()> {
        let mut states = self.states.write();
        let state = states
            .get_mut(&state_id)
            .ok_or_else(|| FuseError::State(format!("Unknown workflow state: {state_id}")))?;
        if !state.status.can_transition_to(next) {
            return Err(FuseError::State(format!(
                "Invalid transition from {} to {next}",
                state.status
            )));
        }
        state.status = next;
        Ok(())
    }
}

#[async_trait]
impl StateManager for InMemoryStateManager {
    async fn create_state(&self, workflow: &Workflow) -> FuseResult<WorkflowState> {
        self.ensure_available()?;
        let state = WorkflowState::new(&workflow.id);
        self.states.write().insert(state.id, state.clone());
        info!(workflow_id = %workflow.id, state_id = %state.id, "Workflow state created");
        Ok(state)
    }

    async fn mark_running(&self, state_id: Uuid) -> FuseResult<()> {
        self.ensure_available()?;
        self.transition(state_id, WorkflowStatus::Running)
    }

    async fn mark_failed(&self, state_id: Uuid, error: &ErrorReport) -> FuseResult<()> {
        self.ensure_available()?;
        self.transition(state_id, WorkflowStatus::Failed)?;
        self.failures.write().insert(state_id, error.clone());
        Ok(())
    }
}

/// Tool registrar remembering which APIs were registered for which resource.
#[derive(Default)]
pub struct InMemoryToolRegistrar {
    registered: Mutex<Vec<(String, String)>>,
}

impl InMemoryToolRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(resource id, api name)` pairs in registration order.
    pub fn registered(&self) -> Vec<(String, String)> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl ToolRegistrar for InMemoryToolRegistrar {
    async fn register(&self, resource_id: &str, api: &ApiSpec) -> FuseResult<()> {
        info!(resource_id = %resource_id, api = %api.name, "Tool registered");
        self.registered
            .lock()
            .push((resource_id.to_string(), api.name.clone()));
        Ok(())
    }
}
