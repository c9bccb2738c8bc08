use crate::collaborators::CapabilityMatcher;
use crate::plan::level_task_ids;
use fuse_core::{FuseError, FuseResult, Workflow};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Structural problems of a workflow, without consulting any collaborator.
///
/// Checks run in order: empty task list, duplicate ids, unknown dependency
/// ids, then dependency cycles. Cycle detection is skipped while unknown
/// dependencies exist, since those tasks would also show up as unplaceable.
pub fn structural_violations(workflow: &Workflow) -> Vec<String> {
    if workflow.tasks.is_empty() {
        return vec!["Workflow must contain at least one task".to_string()];
    }

    let mut violations = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();
    for task in &workflow.tasks {
        if !seen.insert(task.id.as_str()) && duplicates.insert(task.id.as_str()) {
            violations.push(format!("Duplicate task id: {}", task.id));
        }
    }

    for task in &workflow.tasks {
        for dep in &task.dependencies {
            if !seen.contains(dep.as_str()) {
                violations.push(format!(
                    "Task '{}' depends on unknown task '{dep}'",
                    task.id
                ));
            }
        }
    }

    if violations.is_empty() {
        let leveling = level_task_ids(&workflow.tasks);
        if !leveling.is_complete() {
            violations.push(format!("cycle detected: {}", leveling.unplaced.join(", ")));
        }
    }

    violations
}

/// Rejects malformed or unsatisfiable workflows before any side effect.
pub struct WorkflowValidator {
    matcher: Arc<dyn CapabilityMatcher>,
}

impl WorkflowValidator {
    pub fn new(matcher: Arc<dyn CapabilityMatcher>) -> Self {
        Self { matcher }
    }

    /// Validate structure first, then capability satisfiability.
    ///
    /// The matcher is only consulted for structurally sound workflows.
    pub async fn validate(&self, workflow: &Workflow) -> FuseResult<()> {
        let violations = structural_violations(workflow);
        if !violations.is_empty() {
            warn!(
                workflow_id = %workflow.id,
                count = violations.len(),
                "Workflow failed structural validation"
            );
            return Err(FuseError::Validation(violations));
        }

        let verdict = self
            .matcher
            .validate_requirements(&workflow.requirements())
            .await?;
        if !verdict.valid {
            warn!(
                workflow_id = %workflow.id,
                missing = ?verdict.missing_capabilities,
                unreliable = ?verdict.unreliable_capabilities,
                "Workflow capability requirements not satisfiable"
            );
            return Err(FuseError::Validation(verdict.messages()));
        }

        debug!(workflow_id = %workflow.id, tasks = workflow.tasks.len(), "Workflow validated");
        Ok(())
    }
}
