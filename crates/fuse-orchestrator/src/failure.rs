use crate::collaborators::{Monitor, StateManager, TaskQueue};
use crate::config::CancellationMode;
use crate::types::{CleanupReport, SubmissionLedger};
use fuse_core::{ErrorReport, EventKind, FuseError, InitiationPhase, LifecycleEvent, WorkflowState};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where an initiation stood when it failed.
pub struct FailureContext<'a> {
    pub workflow_id: &'a str,
    /// Absent when the state record could not be created at all.
    pub state: Option<&'a WorkflowState>,
    pub phase: InitiationPhase,
    pub ledger: &'a SubmissionLedger,
}

/// Best-effort cleanup after a failed initiation.
///
/// Nothing done here can replace the error that triggered it: every cleanup
/// step logs its own failure and carries on.
pub struct FailureHandler {
    queue: Arc<dyn TaskQueue>,
    state_manager: Arc<dyn StateManager>,
    monitor: Arc<dyn Monitor>,
    cancellation: CancellationMode,
}

impl FailureHandler {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        state_manager: Arc<dyn StateManager>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self {
            queue,
            state_manager,
            monitor,
            cancellation: CancellationMode::default(),
        }
    }

    pub fn with_cancellation(mut self, mode: CancellationMode) -> Self {
        self.cancellation = mode;
        self
    }

    /// Run cleanup and hand back the original error untouched.
    ///
    /// The cleanup report is published as a `cleanup_finished` event.
    pub async fn handle(&self, err: FuseError, ctx: FailureContext<'_>) -> FuseError {
        let report = self.cleanup(&err, &ctx).await;
        self.publish(ctx.workflow_id, &report).await;
        err
    }

    /// Record the failure, mark the state failed and retract accepted tasks.
    pub async fn cleanup(&self, err: &FuseError, ctx: &FailureContext<'_>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let error_report = ErrorReport::capture(err, ctx.phase);

        error!(
            workflow_id = %ctx.workflow_id,
            phase = %ctx.phase,
            kind = err.kind(),
            preflight = err.is_preflight(),
            error = %err,
            "Workflow initiation failed"
        );

        let event =
            LifecycleEvent::new(EventKind::WorkflowFailed).with_error(error_report.clone());
        match self.monitor.record(ctx.workflow_id, event).await {
            Ok(()) => report.failure_recorded = true,
            Err(e) => warn!(
                workflow_id = %ctx.workflow_id,
                error = %e,
                "Failed to record workflow_failed event"
            ),
        }

        if let Some(state) = ctx.state {
            match self.state_manager.mark_failed(state.id, &error_report).await {
                Ok(()) => report.state_marked_failed = true,
                Err(e) => warn!(
                    state_id = %state.id,
                    error = %e,
                    "Failed to mark workflow state failed"
                ),
            }
        }

        match self.cancellation {
            CancellationMode::Targeted => self.cancel_each(ctx, &mut report).await,
            CancellationMode::Bulk => self.cancel_bulk(ctx, &mut report).await,
        }

        info!(
            workflow_id = %ctx.workflow_id,
            cancelled = report.cancelled.len(),
            cancel_failures = report.failed.len(),
            bulk = report.bulk,
            state_marked_failed = report.state_marked_failed,
            failure_recorded = report.failure_recorded,
            "Cleanup finished"
        );
        report
    }

    async fn publish(&self, workflow_id: &str, report: &CleanupReport) {
        let metadata = match serde_json::to_value(report) {
            Ok(value) => value,
            Err(e) => {
                warn!(workflow_id = %workflow_id, error = %e, "Failed to serialize cleanup report");
                return;
            }
        };
        let event = LifecycleEvent::new(EventKind::CleanupFinished).with_metadata(metadata);
        if let Err(e) = self.monitor.record(workflow_id, event).await {
            warn!(
                workflow_id = %workflow_id,
                error = %e,
                "Failed to record cleanup_finished event"
            );
        }
    }

    async fn cancel_each(&self, ctx: &FailureContext<'_>, report: &mut CleanupReport) {
        // Nothing can have been accepted without a state record.
        let Some(state) = ctx.state else {
            return;
        };
        for entry in ctx.ledger.entries() {
            match self.queue.cancel(state.id, &entry.task_id).await {
                Ok(()) => {
                    info!(workflow_id = %ctx.workflow_id, task_id = %entry.task_id, "Task cancelled");
                    let event =
                        LifecycleEvent::for_task(EventKind::TaskCancelled, entry.task_id.clone())
                            .with_metadata(serde_json::json!({
                                "agent_id": entry.agent_id,
                                "level": entry.level,
                            }));
                    if let Err(e) = self.monitor.record(ctx.workflow_id, event).await {
                        warn!(
                            task_id = %entry.task_id,
                            error = %e,
                            "Failed to record task_cancelled event"
                        );
                    }
                    report.cancelled.push(entry.task_id.clone());
                }
                Err(e) => {
                    warn!(
                        workflow_id = %ctx.workflow_id,
                        task_id = %entry.task_id,
                        error = %e,
                        "Task cancellation failed"
                    );
                    report.failed.push((entry.task_id.clone(), e.to_string()));
                }
            }
        }
    }

    async fn cancel_bulk(&self, ctx: &FailureContext<'_>, report: &mut CleanupReport) {
        report.bulk = true;
        match self.queue.cancel_all(ctx.workflow_id).await {
            Ok(()) => {
                info!(workflow_id = %ctx.workflow_id, "All queued tasks cancelled");
                report
                    .cancelled
                    .extend(ctx.ledger.task_ids().into_iter().map(String::from));
            }
            Err(e) => {
                warn!(workflow_id = %ctx.workflow_id, error = %e, "Bulk cancellation failed");
                let reason = e.to_string();
                report.failed.extend(
                    ctx.ledger
                        .task_ids()
                        .into_iter()
                        .map(|id| (id.to_string(), reason.clone())),
                );
            }
        }
    }
}
