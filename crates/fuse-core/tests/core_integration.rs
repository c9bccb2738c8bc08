#![allow(clippy::unwrap_used, clippy::expect_used)]

use fuse_core::*;

// ---------------------------------------------------------------------------
// 1. Workflow definitions survive a JSON roundtrip with open parameters
// ---------------------------------------------------------------------------

#[test]
fn workflow_json_roundtrip_keeps_parameters_and_apis() {
    let wf = Workflow::new("wf-42", "Lead enrichment")
        .with_api(ApiSpec {
            name: "crm".into(),
            base_url: Some("https://crm.example.com".into()),
            spec: serde_json::json!({"openapi": "3.0.0"}),
        })
        .with_task(
            WorkflowTask::new("fetch", TaskKind::ApiCall, "http")
                .with_parameter("endpoint", serde_json::json!("/leads")),
        )
        .with_task(
            WorkflowTask::new("score", TaskKind::Other("scoring".into()), "ml-scoring")
                .with_requirement(
                    CapabilityRequirement::new("ml-scoring")
                        .with_min_reliability(0.9)
                        .with_preferred_agents(vec!["agent-ml".into()]),
                )
                .with_dependencies(["fetch"]),
        );

    let json = serde_json::to_string(&wf).unwrap();
    assert!(json.contains("\"type\":\"scoring\""));
    let parsed: Workflow = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, wf);
    assert_eq!(
        parsed.task("fetch").unwrap().parameter::<String>("endpoint").unwrap(),
        Some("/leads".to_string())
    );
    assert_eq!(
        parsed.task("score").unwrap().requirement.preferred_agents,
        vec!["agent-ml".to_string()]
    );
}

// ---------------------------------------------------------------------------
// 2. Error display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let err = FuseError::AgentAssignment {
        capability: "code-generation".into(),
    };
    assert_eq!(
        err.to_string(),
        "No active agent available for capability 'code-generation'"
    );

    let err = FuseError::TaskRejected {
        task_id: "t3".into(),
        reason: "queue full".into(),
    };
    assert_eq!(err.to_string(), "Task 't3' rejected by queue: queue full");

    let bad_json = serde_json::from_str::<serde_json::Value>("not json");
    let err: FuseError = bad_json.unwrap_err().into();
    assert!(err.to_string().starts_with("JSON error:"));
    assert!(!err.is_preflight());

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err: FuseError = io_err.into();
    assert!(err.to_string().starts_with("IO error:"));
}

// ---------------------------------------------------------------------------
// 3. Failure events carry the error class and phase
// ---------------------------------------------------------------------------

#[test]
fn failure_event_carries_report() {
    let err = FuseError::Queue("connection reset".into());
    let event = LifecycleEvent::new(EventKind::WorkflowFailed)
        .with_error(ErrorReport::capture(&err, InitiationPhase::Scheduling));

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "workflow_failed");
    assert_eq!(json["error"]["kind"], "QueueError");
    assert_eq!(json["error"]["message"], "Queue error: connection reset");
    assert_eq!(json["error"]["context"]["phase"], "scheduling");
    assert_eq!(json["error"]["context"]["preflight"], false);
}

// ---------------------------------------------------------------------------
// 4. Agent records deserialize from roster-style JSON
// ---------------------------------------------------------------------------

#[test]
fn resource_from_json() {
    let agent: Resource = serde_json::from_value(serde_json::json!({
        "id": "agent-1",
        "name": "Writer",
        "status": "active",
        "capabilities": ["cap-writing"]
    }))
    .unwrap();
    assert!(agent.is_active());
    assert!(agent.provides("cap-writing"));
    assert!(!agent.provides("cap-code"));
}
