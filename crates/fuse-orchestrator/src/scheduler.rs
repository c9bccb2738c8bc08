use crate::collaborators::{AgentDirectory, Monitor, TaskQueue};
use crate::types::{ExecutionLevel, ExecutionPlan, PlannedTask, SubmissionLedger};
use fuse_core::{
    EventKind, FuseError, FuseResult, LifecycleEvent, SubmissionOutcome, TaskEnvelope,
    WorkflowState,
};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Submits an [`ExecutionPlan`] to the task queue one level at a time.
///
/// All tasks of a level are offered concurrently. The next level starts only
/// after every submission of the current one has settled, and only if all of
/// them were accepted.
pub struct WorkflowScheduler {
    queue: Arc<dyn TaskQueue>,
    monitor: Arc<dyn Monitor>,
    directory: Arc<dyn AgentDirectory>,
    recheck_agent_liveness: bool,
}

impl WorkflowScheduler {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        monitor: Arc<dyn Monitor>,
        directory: Arc<dyn AgentDirectory>,
    ) -> Self {
        Self {
            queue,
            monitor,
            directory,
            recheck_agent_liveness: false,
        }
    }

    /// Verify assigned agents are still active before each level goes out.
    pub fn with_liveness_check(mut self, enabled: bool) -> Self {
        self.recheck_agent_liveness = enabled;
        self
    }

    /// Submit every level in order.
    ///
    /// Each accepted submission is appended to `ledger`, including those of a
    /// level that fails part-way, so the caller can retract them.
    pub async fn schedule(
        &self,
        plan: &ExecutionPlan,
        state: &WorkflowState,
        ledger: &mut SubmissionLedger,
    ) -> FuseResult<()> {
        for (index, level) in plan.levels.iter().enumerate() {
            if self.recheck_agent_liveness {
                self.ensure_agents_active(level).await?;
            }

            info!(
                workflow_id = %state.workflow_id,
                level = index,
                width = level.width(),
                "Submitting execution level"
            );

            let results = join_all(
                level
                    .tasks
                    .iter()
                    .map(|planned| self.submit(state, planned, index)),
            )
            .await;

            let mut first_error = None;
            for (planned, result) in level.tasks.iter().zip(results) {
                match result {
                    Ok(()) => {
                        ledger.record(planned.task.id.clone(), planned.agent_id.clone(), index);
                    }
                    Err(e) => {
                        error!(
                            workflow_id = %state.workflow_id,
                            task_id = %planned.task.id,
                            level = index,
                            error = %e,
                            "Task submission failed"
                        );
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        info!(
            workflow_id = %state.workflow_id,
            levels = plan.level_count(),
            submitted = ledger.len(),
            "All execution levels accepted"
        );
        Ok(())
    }

    async fn submit(
        &self,
        state: &WorkflowState,
        planned: &PlannedTask,
        level: usize,
    ) -> FuseResult<()> {
        let envelope = TaskEnvelope::new(state, &planned.task, planned.agent_id.clone(), level);
        let submitted_at = envelope.submitted_at;

        match self.queue.enqueue(envelope).await? {
            SubmissionOutcome::Accepted => {
                let event = LifecycleEvent::for_task(EventKind::TaskScheduled, planned.task.id.clone())
                    .with_metadata(serde_json::json!({
                        "agent_id": planned.agent_id,
                        "level": level,
                        "state_id": state.id,
                        "submitted_at": submitted_at,
                    }));
                if let Err(e) = self.monitor.record(&state.workflow_id, event).await {
                    warn!(
                        task_id = %planned.task.id,
                        error = %e,
                        "Failed to record task_scheduled event"
                    );
                }
                Ok(())
            }
            SubmissionOutcome::Rejected { reason } => Err(FuseError::TaskRejected {
                task_id: planned.task.id.clone(),
                reason,
            }),
        }
    }

    async fn ensure_agents_active(&self, level: &ExecutionLevel) -> FuseResult<()> {
        for planned in &level.tasks {
            if !self.directory.is_active(&planned.agent_id).await? {
                warn!(
                    task_id = %planned.task.id,
                    agent_id = %planned.agent_id,
                    "Assigned agent no longer active"
                );
                return Err(FuseError::AgentUnavailable {
                    task_id: planned.task.id.clone(),
                    agent_id: planned.agent_id.clone(),
                });
            }
        }
        Ok(())
    }
}
