//! Core types and error definitions for the Fuse workflow scheduler.
//!
//! This crate provides the data model shared by the orchestrator and its
//! collaborators: workflows and their tasks, capability matches, agent
//! records, workflow state, lifecycle events and the unified error type.
//!
//! # Main types
//!
//! - [`FuseError`] — Unified error enum, split into pre-flight and in-flight failures.
//! - [`FuseResult`] — Convenience alias for `Result<T, FuseError>`.
//! - [`Workflow`] / [`WorkflowTask`] — Declarative task graph.
//! - [`CapabilityMatch`] / [`ValidationResult`] — Matcher output contract.
//! - [`Resource`] — An agent that can run tasks.
//! - [`WorkflowState`] — Handle to the state record of one initiation.
//! - [`TaskEnvelope`] — What gets submitted to the task queue.
//! - [`LifecycleEvent`] — What gets reported to the monitor.

/// Capability matches, validation verdicts and agent records.
pub mod capability;
/// Task envelopes and queue submission outcomes.
pub mod dispatch;
/// Error type and result alias.
pub mod error;
/// Lifecycle events and error reports.
pub mod event;
/// Workflow state and initiation phases.
pub mod state;
/// Workflow and task definitions.
pub mod workflow;

pub use capability::{CapabilityMatch, Resource, ResourceStatus, ValidationResult};
pub use dispatch::{SubmissionOutcome, TaskEnvelope};
pub use error::{FuseError, FuseResult};
pub use event::{ErrorReport, EventKind, LifecycleEvent};
pub use state::{InitiationPhase, WorkflowState, WorkflowStatus};
pub use workflow::{
    ApiSpec, CapabilityRequirement, RankingPreferences, TaskKind, WeightOverrides, Workflow,
    WorkflowTask,
};
