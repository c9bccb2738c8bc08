use crate::collaborators::Monitor;
use async_trait::async_trait;
use fuse_core::{EventKind, FuseError, FuseResult, LifecycleEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Keeps every lifecycle event per workflow and mirrors it to the log.
pub struct EventLog {
    events: Arc<RwLock<HashMap<String, Vec<LifecycleEvent>>>>,
    unavailable: AtomicBool,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            unavailable: AtomicBool::new(false),
        }
    }

    /// While set, `record` fails as a remote monitor would when unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Events recorded for one workflow, oldest first.
    pub async fn events_for(&self, workflow_id: &str) -> Vec<LifecycleEvent> {
        let events = self.events.read().await;
        events.get(workflow_id).cloned().unwrap_or_default()
    }

    /// How many events of `kind` were recorded for a workflow.
    pub async fn count(&self, workflow_id: &str, kind: EventKind) -> usize {
        let events = self.events.read().await;
        events
            .get(workflow_id)
            .map(|list| list.iter().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }

    /// Serialize all recorded events as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let events = self.events.read().await;
        let total: usize = events.values().map(Vec::len).sum();
        serde_json::json!({
            "workflows": &*events,
            "total": total,
        })
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Monitor for EventLog {
    async fn record(&self, workflow_id: &str, event: LifecycleEvent) -> FuseResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FuseError::Monitor("event log unavailable".to_string()));
        }
        info!(
            workflow_id = %workflow_id,
            kind = %event.kind,
            task_id = ?event.task_id,
            error = ?event.error.as_ref().map(|e| e.kind.as_str()),
            "lifecycle"
        );
        let mut events = self.events.write().await;
        events.entry(workflow_id.to_string()).or_default().push(event);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_grouped_by_workflow() {
        let log = EventLog::new();
        log.record("wf-1", LifecycleEvent::for_task(EventKind::TaskScheduled, "t1"))
            .await
            .unwrap();
        log.record("wf-1", LifecycleEvent::for_task(EventKind::TaskScheduled, "t2"))
            .await
            .unwrap();
        log.record("wf-2", LifecycleEvent::new(EventKind::WorkflowFailed))
            .await
            .unwrap();

        assert_eq!(log.count("wf-1", EventKind::TaskScheduled).await, 2);
        assert_eq!(log.count("wf-2", EventKind::TaskScheduled).await, 0);
        let events = log.events_for("wf-1").await;
        assert_eq!(events[1].task_id.as_deref(), Some("t2"));
        assert!(log.events_for("wf-3").await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_log_rejects() {
        let log = EventLog::new();
        log.set_unavailable(true);
        let err = log
            .record("wf", LifecycleEvent::new(EventKind::WorkflowStarted))
            .await
            .unwrap_err();
        assert!(matches!(err, FuseError::Monitor(_)));
        log.set_unavailable(false);
        assert!(log.events_for("wf").await.is_empty());
    }

    #[tokio::test]
    async fn test_to_json() {
        let log = EventLog::new();
        log.record("wf", LifecycleEvent::new(EventKind::WorkflowStarted))
            .await
            .unwrap();
        let json = log.to_json().await;
        assert_eq!(json["total"], 1);
        assert!(json["workflows"]["wf"].is_array());
    }
}
