//! Traits for the systems the orchestrator drives but does not own.
//!
//! Every collaborator is injected as an `Arc<dyn Trait>`, so tests and the CLI
//! can swap in the in-memory implementations from [`crate::memory`] and
//! [`crate::catalog`].

use async_trait::async_trait;
use fuse_core::{
    ApiSpec, CapabilityMatch, CapabilityRequirement, ErrorReport, FuseResult, LifecycleEvent,
    Resource, SubmissionOutcome, TaskEnvelope, ValidationResult, Workflow, WorkflowState,
};
use uuid::Uuid;

/// Turns capability requirements into ranked matches.
#[async_trait]
pub trait CapabilityMatcher: Send + Sync {
    /// Eligible capabilities for `requirement`, highest ranked first.
    async fn discover(&self, requirement: &CapabilityRequirement)
        -> FuseResult<Vec<CapabilityMatch>>;

    /// Aggregate satisfiability check over a set of requirements.
    async fn validate_requirements(
        &self,
        requirements: &[CapabilityRequirement],
    ) -> FuseResult<ValidationResult>;
}

/// Resolves capabilities to concrete agents.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// An agent currently `active` that provides `capability_id`, if any.
    async fn find_active_resource(&self, capability_id: &str) -> FuseResult<Option<Resource>>;

    /// Whether the agent with `resource_id` is still active.
    async fn is_active(&self, resource_id: &str) -> FuseResult<bool>;
}

/// The execution substrate tasks are handed to.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Offer a task. `Accepted` means the queue now owns it.
    async fn enqueue(&self, envelope: TaskEnvelope) -> FuseResult<SubmissionOutcome>;

    /// Retract one task accepted under the initiation `state_id`.
    ///
    /// Envelopes with the same task id from other initiations of the same
    /// workflow are left alone.
    async fn cancel(&self, state_id: Uuid, task_id: &str) -> FuseResult<()>;

    /// Retract everything queued for a workflow, across all its initiations.
    async fn cancel_all(&self, workflow_id: &str) -> FuseResult<()>;
}

/// Owns the persistent state record of each initiation.
#[async_trait]
pub trait StateManager: Send + Sync {
    async fn create_state(&self, workflow: &Workflow) -> FuseResult<WorkflowState>;
    async fn mark_running(&self, state_id: Uuid) -> FuseResult<()>;
    async fn mark_failed(&self, state_id: Uuid, error: &ErrorReport) -> FuseResult<()>;
}

/// Receives lifecycle events.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn record(&self, workflow_id: &str, event: LifecycleEvent) -> FuseResult<()>;
}

/// Exposes a workflow's declared external APIs as tools.
#[async_trait]
pub trait ToolRegistrar: Send + Sync {
    async fn register(&self, resource_id: &str, api: &ApiSpec) -> FuseResult<()>;
}
