use crate::collaborators::{AgentDirectory, CapabilityMatcher};
use crate::types::Assignment;
use fuse_core::{FuseError, FuseResult, WorkflowTask};
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks one active agent per task from the matcher's top-ranked capability.
///
/// Planning is all-or-nothing: the first task without an eligible active
/// agent aborts the whole pass and no partial [`Assignment`] is returned.
pub struct AgentAssignmentPlanner {
    matcher: Arc<dyn CapabilityMatcher>,
    directory: Arc<dyn AgentDirectory>,
}

impl AgentAssignmentPlanner {
    pub fn new(matcher: Arc<dyn CapabilityMatcher>, directory: Arc<dyn AgentDirectory>) -> Self {
        Self { matcher, directory }
    }

    pub async fn assign(&self, tasks: &[WorkflowTask]) -> FuseResult<Assignment> {
        let mut assignment = Assignment::new();

        for task in tasks {
            let matches = self.matcher.discover(&task.requirement).await?;
            let Some(top) = matches.first() else {
                warn!(
                    task_id = %task.id,
                    capability = %task.requirement.capability,
                    "No capability match for task"
                );
                return Err(FuseError::AgentAssignment {
                    capability: task.requirement.capability.clone(),
                });
            };

            let agent = self
                .directory
                .find_active_resource(&top.capability_id)
                .await?
                .filter(|agent| agent.is_active());
            let Some(agent) = agent else {
                warn!(
                    task_id = %task.id,
                    capability = %top.name,
                    capability_id = %top.capability_id,
                    "No active agent for top-ranked capability"
                );
                return Err(FuseError::AgentAssignment {
                    capability: top.name.clone(),
                });
            };

            debug!(
                task_id = %task.id,
                agent_id = %agent.id,
                capability_id = %top.capability_id,
                reliability = top.reliability,
                "Task assigned"
            );
            assignment.insert(task.id.clone(), agent.id);
        }

        Ok(assignment)
    }
}
