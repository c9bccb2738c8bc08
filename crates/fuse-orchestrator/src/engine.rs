use crate::assignment::AgentAssignmentPlanner;
use crate::collaborators::{
    AgentDirectory, CapabilityMatcher, Monitor, StateManager, TaskQueue, ToolRegistrar,
};
use crate::config::OrchestratorConfig;
use crate::failure::{FailureContext, FailureHandler};
use crate::plan::ExecutionPlanBuilder;
use crate::scheduler::WorkflowScheduler;
use crate::types::{ExecutionLevel, ExecutionPlan, InitiationReport, SubmissionLedger};
use crate::validator::WorkflowValidator;
use fuse_core::{
    EventKind, FuseError, FuseResult, InitiationPhase, LifecycleEvent, Workflow, WorkflowState,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub matcher: Arc<dyn CapabilityMatcher>,
    pub directory: Arc<dyn AgentDirectory>,
    pub queue: Arc<dyn TaskQueue>,
    pub state_manager: Arc<dyn StateManager>,
    pub monitor: Arc<dyn Monitor>,
    /// Only needed for workflows that declare external APIs.
    pub registrar: Option<Arc<dyn ToolRegistrar>>,
}

/// Entry point of the scheduling core.
///
/// `initiate` runs validate → register tools → assign → plan → schedule and
/// hands any failure to the [`FailureHandler`] before returning it.
pub struct Orchestrator {
    validator: WorkflowValidator,
    planner: AgentAssignmentPlanner,
    scheduler: WorkflowScheduler,
    failure: FailureHandler,
    state_manager: Arc<dyn StateManager>,
    monitor: Arc<dyn Monitor>,
    registrar: Option<Arc<dyn ToolRegistrar>>,
    config: OrchestratorConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        let Collaborators {
            matcher,
            directory,
            queue,
            state_manager,
            monitor,
            registrar,
        } = collaborators;

        Self {
            validator: WorkflowValidator::new(matcher.clone()),
            planner: AgentAssignmentPlanner::new(matcher, directory.clone()),
            scheduler: WorkflowScheduler::new(queue.clone(), monitor.clone(), directory)
                .with_liveness_check(config.recheck_agent_liveness),
            failure: FailureHandler::new(queue, state_manager.clone(), monitor.clone())
                .with_cancellation(config.cancellation),
            state_manager,
            monitor,
            registrar,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Whether an initiation for `workflow_id` is currently running.
    pub fn is_initiating(&self, workflow_id: &str) -> bool {
        self.in_flight.lock().contains(workflow_id)
    }

    /// Validate, assign and schedule every task of `workflow`.
    ///
    /// On failure the state record is marked failed, already accepted tasks
    /// are cancelled best-effort, and the error that caused the failure is
    /// returned unchanged.
    pub async fn initiate(&self, workflow: &Workflow) -> FuseResult<InitiationReport> {
        let _claim = self.claim(&workflow.id)?;
        let start = Instant::now();
        let mut ledger = SubmissionLedger::new();

        info!(
            workflow_id = %workflow.id,
            tasks = workflow.tasks.len(),
            apis = workflow.apis.len(),
            "Initiating workflow"
        );

        let state = match self.state_manager.create_state(workflow).await {
            Ok(state) => state,
            Err(e) => {
                let ctx = FailureContext {
                    workflow_id: &workflow.id,
                    state: None,
                    phase: InitiationPhase::Created,
                    ledger: &ledger,
                };
                return Err(self.failure.handle(e, ctx).await);
            }
        };

        let mut phase = InitiationPhase::Created;
        match self.run(workflow, &state, &mut phase, &mut ledger).await {
            Ok(report) => {
                advance(&workflow.id, &mut phase);
                info!(
                    workflow_id = %workflow.id,
                    state_id = %state.id,
                    levels = report.level_widths.len(),
                    submitted = report.submitted,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Workflow initiated"
                );
                Ok(report)
            }
            Err(e) => {
                let ctx = FailureContext {
                    workflow_id: &workflow.id,
                    state: Some(&state),
                    phase,
                    ledger: &ledger,
                };
                let err = self.failure.handle(e, ctx).await;
                fail(&workflow.id, &mut phase);
                Err(err)
            }
        }
    }

    /// Validation, assignment and leveling without any side effect.
    pub async fn preview(&self, workflow: &Workflow) -> FuseResult<ExecutionPlan> {
        self.validator.validate(workflow).await?;
        let assignment = self.planner.assign(&workflow.tasks).await?;
        ExecutionPlanBuilder::build(&workflow.tasks, &assignment)
    }

    /// Structural and capability checks only.
    pub async fn validate(&self, workflow: &Workflow) -> FuseResult<()> {
        self.validator.validate(workflow).await
    }

    async fn run(
        &self,
        workflow: &Workflow,
        state: &WorkflowState,
        phase: &mut InitiationPhase,
        ledger: &mut SubmissionLedger,
    ) -> FuseResult<InitiationReport> {
        advance(&workflow.id, phase);
        self.validator.validate(workflow).await?;
        self.register_tools(workflow).await?;

        advance(&workflow.id, phase);
        let assignment = self.planner.assign(&workflow.tasks).await?;

        advance(&workflow.id, phase);
        let plan = ExecutionPlanBuilder::build(&workflow.tasks, &assignment)?;
        debug!(workflow_id = %workflow.id, levels = ?plan.level_ids(), "Levels");

        advance(&workflow.id, phase);
        self.record_started(workflow, state).await;
        self.state_manager.mark_running(state.id).await?;
        self.scheduler.schedule(&plan, state, ledger).await?;

        Ok(InitiationReport {
            workflow_id: workflow.id.clone(),
            state_id: state.id,
            assignment,
            level_widths: plan.levels.iter().map(ExecutionLevel::width).collect(),
            submitted: ledger.len(),
        })
    }

    /// Emitted only once pre-flight has passed.
    async fn record_started(&self, workflow: &Workflow, state: &WorkflowState) {
        if !self.config.record_start_event {
            return;
        }
        let event = LifecycleEvent::new(EventKind::WorkflowStarted).with_metadata(
            serde_json::json!({
                "state_id": state.id,
                "version": workflow.version,
                "tasks": workflow.tasks.len(),
            }),
        );
        if let Err(e) = self.monitor.record(&workflow.id, event).await {
            warn!(workflow_id = %workflow.id, error = %e, "Failed to record workflow_started event");
        }
    }

    async fn register_tools(&self, workflow: &Workflow) -> FuseResult<()> {
        if workflow.apis.is_empty() {
            return Ok(());
        }
        let Some(registrar) = &self.registrar else {
            return Err(FuseError::Registrar(format!(
                "Workflow '{}' declares {} API(s) but no tool registrar is configured",
                workflow.id,
                workflow.apis.len()
            )));
        };
        for api in &workflow.apis {
            registrar.register(&workflow.id, api).await?;
            debug!(workflow_id = %workflow.id, api = %api.name, "API registered as tool");
        }
        Ok(())
    }

    fn claim(&self, workflow_id: &str) -> FuseResult<InFlight<'_>> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(workflow_id.to_string()) {
            warn!(workflow_id = %workflow_id, "Initiation already in progress");
            return Err(FuseError::AlreadyInitiating(workflow_id.to_string()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            workflow_id: workflow_id.to_string(),
        })
    }
}

/// Step along the success path; terminal phases stay put.
fn advance(workflow_id: &str, phase: &mut InitiationPhase) {
    if let Some(next) = phase.next() {
        debug!(workflow_id = %workflow_id, from = %phase, to = %next, "Initiation phase");
        *phase = next;
    }
}

fn fail(workflow_id: &str, phase: &mut InitiationPhase) {
    if !phase.is_terminal() {
        debug!(workflow_id = %workflow_id, from = %phase, to = "failed", "Initiation phase");
        *phase = InitiationPhase::Failed;
    }
}

/// Releases the in-flight claim when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    workflow_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.workflow_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{CapabilityCatalog, CatalogEntry};
    use crate::memory::{InMemoryStateManager, InMemoryTaskQueue, StaticAgentDirectory};
    use crate::monitor::EventLog;
    use fuse_core::{ApiSpec, Resource, ResourceStatus, TaskKind, WorkflowStatus, WorkflowTask};

    struct Harness {
        orchestrator: Orchestrator,
        queue: Arc<InMemoryTaskQueue>,
        states: Arc<InMemoryStateManager>,
        log: Arc<EventLog>,
    }

    fn harness(config: OrchestratorConfig) -> Harness {
        let catalog = Arc::new(CapabilityCatalog::new());
        catalog.register(CatalogEntry::new("writer/summarize", "summarize", 0.9).offered_by("writer"));
        let directory = Arc::new(StaticAgentDirectory::new(vec![Resource {
            id: "writer".into(),
            name: "Writer".into(),
            status: ResourceStatus::Active,
            capabilities: vec!["writer/summarize".into()],
        }]));
        let queue = Arc::new(InMemoryTaskQueue::new());
        let states = Arc::new(InMemoryStateManager::new());
        let log = Arc::new(EventLog::new());
        let orchestrator = Orchestrator::new(
            Collaborators {
                matcher: catalog,
                directory,
                queue: queue.clone(),
                state_manager: states.clone(),
                monitor: log.clone(),
                registrar: None,
            },
            config,
        );
        Harness {
            orchestrator,
            queue,
            states,
            log,
        }
    }

    fn workflow() -> Workflow {
        Workflow::new("wf", "Digest")
            .with_task(WorkflowTask::new("a", TaskKind::Prompt, "summarize"))
            .with_task(WorkflowTask::new("b", TaskKind::Prompt, "summarize").with_dependencies(["a"]))
    }

    #[tokio::test]
    async fn test_initiate_returns_report() {
        let h = harness(OrchestratorConfig::default());
        let report = h.orchestrator.initiate(&workflow()).await.unwrap();

        assert_eq!(report.level_widths, vec![1, 1]);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.assignment.agent_for("b"), Some("writer"));
        assert_eq!(
            h.states.get(report.state_id).unwrap().status,
            WorkflowStatus::Running
        );
        assert_eq!(h.log.count("wf", EventKind::WorkflowStarted).await, 1);
        assert!(!h.orchestrator.is_initiating("wf"));
    }

    #[tokio::test]
    async fn test_start_event_can_be_disabled() {
        let h = harness(OrchestratorConfig {
            record_start_event: false,
            ..OrchestratorConfig::default()
        });
        h.orchestrator.initiate(&workflow()).await.unwrap();
        assert_eq!(h.log.count("wf", EventKind::WorkflowStarted).await, 0);
        assert_eq!(h.log.count("wf", EventKind::TaskScheduled).await, 2);
    }

    #[tokio::test]
    async fn test_claim_released_after_failure() {
        let h = harness(OrchestratorConfig::default());
        h.queue.reject_task("a", "full");
        let err = h.orchestrator.initiate(&workflow()).await.unwrap_err();
        assert!(matches!(err, FuseError::TaskRejected { .. }));
        assert!(!h.orchestrator.is_initiating("wf"));
        let failed = h.states.states_for("wf").remove(0);
        assert_eq!(h.states.failure(failed.id).unwrap().context["phase"], "scheduling");

        // A later attempt is a fresh initiation with its own state record.
        let _ = h.orchestrator.initiate(&workflow()).await;
        assert_eq!(h.states.states_for("wf").len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_workflow_never_reports_start() {
        let h = harness(OrchestratorConfig::default());
        let wf = workflow().with_task(WorkflowTask::new("c", TaskKind::Prompt, "vision"));
        let err = h.orchestrator.initiate(&wf).await.unwrap_err();
        assert!(err.is_preflight());
        assert_eq!(h.log.count("wf", EventKind::WorkflowStarted).await, 0);
        assert_eq!(h.log.count("wf", EventKind::WorkflowFailed).await, 1);
    }

    #[tokio::test]
    async fn test_apis_without_registrar_fail() {
        let h = harness(OrchestratorConfig::default());
        let wf = workflow().with_api(ApiSpec {
            name: "weather".into(),
            base_url: None,
            spec: serde_json::Value::Null,
        });
        let err = h.orchestrator.initiate(&wf).await.unwrap_err();
        assert!(matches!(err, FuseError::Registrar(_)));
        assert_eq!(h.queue.accepted_count(), 0);
    }

    #[tokio::test]
    async fn test_state_creation_failure_is_reported() {
        let h = harness(OrchestratorConfig::default());
        h.states.set_unavailable(true);
        let err = h.orchestrator.initiate(&workflow()).await.unwrap_err();
        assert!(matches!(err, FuseError::State(_)));
        assert_eq!(h.log.count("wf", EventKind::WorkflowFailed).await, 1);
        assert_eq!(h.queue.accepted_count(), 0);
    }

    #[tokio::test]
    async fn test_preview_has_no_side_effects() {
        let h = harness(OrchestratorConfig::default());
        let plan = h.orchestrator.preview(&workflow()).await.unwrap();
        assert_eq!(plan.level_ids(), vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert!(h.states.states_for("wf").is_empty());
        assert_eq!(h.queue.accepted_count(), 0);
        assert!(h.log.events_for("wf").await.is_empty());
    }
}
