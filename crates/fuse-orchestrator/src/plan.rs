use crate::types::{Assignment, ExecutionLevel, ExecutionPlan, PlannedTask};
use fuse_core::{FuseError, FuseResult, WorkflowTask};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Raw result of topological leveling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leveling {
    /// Task ids per level, in discovery order.
    pub levels: Vec<Vec<String>>,
    /// Tasks that never became ready: cycle members, tasks downstream of a
    /// cycle, and tasks with a dependency that names no task.
    pub unplaced: Vec<String>,
}

impl Leveling {
    pub fn placed_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Group tasks into dependency levels with Kahn's algorithm.
///
/// The ready queue is seeded in task order. Each pass takes exactly as many
/// tasks as were ready when it started; dependents that become ready during
/// the pass wait for the next one, which is what draws the level boundaries.
pub fn level_task_ids(tasks: &[WorkflowTask]) -> Leveling {
    let n = tasks.len();
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    for (i, task) in tasks.iter().enumerate() {
        in_degree[i] = task.dependencies.len();
        for dep in &task.dependencies {
            if let Some(&d) = index.get(dep.as_str()) {
                dependents[d].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut placed = vec![false; n];
    let mut levels = Vec::new();

    while !ready.is_empty() {
        let width = ready.len();
        let mut level = Vec::with_capacity(width);
        for _ in 0..width {
            let Some(i) = ready.pop_front() else {
                break;
            };
            placed[i] = true;
            level.push(tasks[i].id.clone());
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.push_back(d);
                }
            }
        }
        levels.push(level);
    }

    let unplaced = tasks
        .iter()
        .zip(&placed)
        .filter(|(_, p)| !**p)
        .map(|(t, _)| t.id.clone())
        .collect();

    Leveling { levels, unplaced }
}

/// Turns a task graph plus an assignment into an [`ExecutionPlan`].
pub struct ExecutionPlanBuilder;

impl ExecutionPlanBuilder {
    /// Build the level-ordered plan.
    ///
    /// Refuses to return a plan that would leave tasks out or submit a task
    /// without an agent.
    pub fn build(tasks: &[WorkflowTask], assignment: &Assignment) -> FuseResult<ExecutionPlan> {
        let leveling = level_task_ids(tasks);
        if !leveling.is_complete() {
            return Err(FuseError::Plan(format!(
                "{} task(s) could not be placed in any level: {}",
                leveling.unplaced.len(),
                leveling.unplaced.join(", ")
            )));
        }

        let by_id: HashMap<&str, &WorkflowTask> =
            tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        let mut levels = Vec::with_capacity(leveling.levels.len());
        for ids in &leveling.levels {
            let mut level = ExecutionLevel::default();
            for id in ids {
                let task = by_id
                    .get(id.as_str())
                    .ok_or_else(|| FuseError::Plan(format!("Unknown task in level: {id}")))?;
                let agent_id = assignment
                    .agent_for(id)
                    .ok_or_else(|| FuseError::Plan(format!("Task '{id}' has no assigned agent")))?;
                level.tasks.push(PlannedTask {
                    task: (*task).clone(),
                    agent_id: agent_id.to_string(),
                });
            }
            levels.push(level);
        }

        let plan = ExecutionPlan { levels };
        debug!(
            levels = plan.level_count(),
            tasks = plan.task_count(),
            "Execution plan built"
        );
        Ok(plan)
    }
}
