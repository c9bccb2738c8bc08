//! Workflow initiation: validation, agent assignment, dependency leveling and
//! level-by-level dispatch to a task queue, with best-effort rollback.
//!
//! The orchestrator owns no storage or transport of its own. Everything it
//! drives is injected through the traits in [`collaborators`]; in-process
//! implementations for tests and local runs live in [`memory`], [`catalog`]
//! and [`monitor`].
//!
//! # Main types
//!
//! - [`Orchestrator`] — Entry point; `initiate` runs the whole pipeline.
//! - [`WorkflowValidator`] — Structural and capability checks before any side effect.
//! - [`AgentAssignmentPlanner`] — All-or-nothing task → agent mapping.
//! - [`ExecutionPlanBuilder`] — Kahn leveling into concurrency-safe batches.
//! - [`WorkflowScheduler`] — Concurrent submission per level, fan-in before the next.
//! - [`FailureHandler`] — Failure recording, state update and task cancellation.
//! - [`CapabilityCatalog`] — In-memory ranked capability matcher.

/// Agent assignment planning.
pub mod assignment;
/// In-memory capability catalog with weighted ranking.
pub mod catalog;
/// Traits for injected collaborators.
pub mod collaborators;
/// Orchestrator configuration.
pub mod config;
/// The orchestrator entry point.
pub mod engine;
/// Failure recording and rollback.
pub mod failure;
/// In-memory agent directory, task queue, state manager and tool registrar.
pub mod memory;
/// Lifecycle event log.
pub mod monitor;
/// Dependency leveling and execution plans.
pub mod plan;
/// Level-by-level task submission.
pub mod scheduler;
/// Assignment, plan, ledger and report types.
pub mod types;
/// Workflow validation.
pub mod validator;

pub use assignment::AgentAssignmentPlanner;
pub use catalog::{CapabilityCatalog, CatalogEntry, PerformanceMetrics, RankingWeights};
pub use collaborators::{
    AgentDirectory, CapabilityMatcher, Monitor, StateManager, TaskQueue, ToolRegistrar,
};
pub use config::{CancellationMode, OrchestratorConfig};
pub use engine::{Collaborators, Orchestrator};
pub use failure::{FailureContext, FailureHandler};
pub use memory::{
    InMemoryStateManager, InMemoryTaskQueue, InMemoryToolRegistrar, StaticAgentDirectory,
};
pub use monitor::EventLog;
pub use plan::{level_task_ids, ExecutionPlanBuilder, Leveling};
pub use scheduler::WorkflowScheduler;
pub use types::{
    AcceptedSubmission, Assignment, CleanupReport, ExecutionLevel, ExecutionPlan,
    InitiationReport, PlannedTask, SubmissionLedger,
};
pub use validator::{structural_violations, WorkflowValidator};
