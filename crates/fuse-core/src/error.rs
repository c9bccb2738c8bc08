use thiserror::Error;

/// A convenience `Result` alias using [`FuseError`].
pub type FuseResult<T> = Result<T, FuseError>;

/// Top-level error type for workflow initiation.
///
/// Variants split into pre-flight failures (raised before any task is
/// submitted) and in-flight failures (raised while talking to collaborators
/// during registration or scheduling). See [`FuseError::is_preflight`].
#[derive(Error, Debug)]
pub enum FuseError {
    /// Structural or capability-satisfiability violations, one message each.
    #[error("Workflow validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// No eligible active agent exists for a task's capability.
    #[error("No active agent available for capability '{capability}'")]
    AgentAssignment {
        /// Name of the unmet capability.
        capability: String,
    },

    /// Another initiation of the same workflow id is still in flight.
    #[error("Workflow '{0}' is already being initiated")]
    AlreadyInitiating(String),

    /// An assigned agent went inactive between planning and submission.
    #[error("Agent '{agent_id}' assigned to task '{task_id}' is no longer active")]
    AgentUnavailable {
        /// Task that was about to be submitted.
        task_id: String,
        /// Agent chosen for it during planning.
        agent_id: String,
    },

    /// The task queue refused a submission.
    #[error("Task '{task_id}' rejected by queue: {reason}")]
    TaskRejected {
        /// Rejected task.
        task_id: String,
        /// Reason reported by the queue.
        reason: String,
    },

    /// The task queue itself failed.
    #[error("Queue error: {0}")]
    Queue(String),

    /// The execution plan could not be built from the given graph.
    #[error("Plan error: {0}")]
    Plan(String),

    /// The state manager failed.
    #[error("State error: {0}")]
    State(String),

    /// The monitoring collaborator failed.
    #[error("Monitor error: {0}")]
    Monitor(String),

    /// Registering a declared external API failed.
    #[error("Registrar error: {0}")]
    Registrar(String),

    /// The capability matcher failed.
    #[error("Matcher error: {0}")]
    Matcher(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FuseError {
    /// Stable class name recorded in failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            FuseError::Validation(_) => "WorkflowValidationError",
            FuseError::AgentAssignment { .. } => "AgentAssignmentError",
            FuseError::AlreadyInitiating(_) => "AlreadyInitiatingError",
            FuseError::AgentUnavailable { .. } => "AgentUnavailableError",
            FuseError::TaskRejected { .. } => "TaskRejectedError",
            FuseError::Queue(_) => "QueueError",
            FuseError::Plan(_) => "PlanError",
            FuseError::State(_) => "StateError",
            FuseError::Monitor(_) => "MonitorError",
            FuseError::Registrar(_) => "RegistrarError",
            FuseError::Matcher(_) => "MatcherError",
            FuseError::Config(_) => "ConfigError",
            FuseError::Json(_) => "JsonError",
            FuseError::Io(_) => "IoError",
        }
    }

    /// True when the failure happened before any task could have been
    /// submitted. Callers map these to client-error style responses.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            FuseError::Validation(_)
                | FuseError::AgentAssignment { .. }
                | FuseError::AlreadyInitiating(_)
        )
    }

    /// Individual violation messages for a validation failure, empty otherwise.
    pub fn violations(&self) -> &[String] {
        match self {
            FuseError::Validation(messages) => messages,
            _ => &[],
        }
    }
}
