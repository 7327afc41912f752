//! The planning data model: objectives, plans, steps, tasks, and results.
//!
//! Two layers live here. The `Planned*` types are what the planner model is
//! asked to emit (their schemas are derived and embedded in the planning
//! prompt); the unprefixed types are the validated engine-side forms with
//! assigned identities and step numbering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use baton_core::error::Error;
use baton_core::provider::Usage;

/// What a run is asked to accomplish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Unique run ID
    pub id: String,

    /// The goal in plain language
    pub description: String,

    /// Supporting context handed to the planner alongside the description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Objective {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// How much planning happens before execution starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// The whole plan is produced in one call, then executed step by step
    Full,
    /// One step is planned at a time, informed by prior results
    Iterative,
}

impl std::str::FromStr for PlanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "iterative" => Ok(Self::Iterative),
            other => Err(Error::Config {
                message: format!(
                    "unknown plan mode \"{other}\" (expected \"full\" or \"iterative\")"
                ),
            }),
        }
    }
}

// --- Planner output shapes ---

/// One task as the planner emits it. Identity is assigned after validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedTask {
    #[schemars(description = "What this task should accomplish")]
    pub description: String,

    #[schemars(description = "Input text handed to the worker verbatim")]
    pub input: String,

    #[serde(default)]
    #[schemars(description = "Capability category the task requires, e.g. \"filesystem\"")]
    pub capability: Option<String>,

    #[serde(default)]
    #[schemars(description = "Name of a specific worker from the roster, instead of a capability")]
    pub worker: Option<String>,
}

/// One step as the planner emits it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedStep {
    #[schemars(description = "What this step accomplishes")]
    pub description: String,

    #[schemars(description = "Tasks to run concurrently within this step")]
    pub tasks: Vec<PlannedTask>,
}

/// Full-mode planner reply: the whole ordered step sequence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanOutline {
    #[schemars(description = "Ordered steps; later steps may build on earlier results")]
    pub steps: Vec<PlannedStep>,
}

/// Iterative-mode planner reply: the next step, or a completion signal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NextStepDecision {
    #[schemars(description = "True when the objective is accomplished and no further step is needed")]
    pub done: bool,

    #[serde(default)]
    #[schemars(description = "The next step to execute; required unless done is true")]
    pub step: Option<PlannedStep>,
}

// --- Validated engine types ---

/// A validated unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,

    /// Input text handed to the worker
    pub input: String,

    /// Capability the task requires; used for resolution when no worker is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,

    /// Explicitly assigned worker; wins over the capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

/// A barrier-delimited group of tasks that run concurrently.
///
/// A step starts only after every task of the previous step is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub description: String,
    pub tasks: Vec<Task>,
}

/// A complete validated plan (full mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub objective_id: String,
    pub steps: Vec<Step>,
}

/// What the planner decided on one call.
#[derive(Debug)]
pub enum PlanOutcome {
    /// Full mode: the entire plan
    Plan(Plan),
    /// Iterative mode: the next step to execute
    Step(Step),
    /// Iterative mode: the objective is accomplished
    Complete,
}

/// One task's terminal outcome with its scheduling metadata attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub description: String,

    /// Which worker executed the task
    pub worker: String,

    /// Final text. Empty when the task failed.
    pub output: String,

    /// Present when the task failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// True when the worker's loop hit its iteration bound
    pub truncated: bool,

    pub usage: Usage,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// All task results of one step, plus the step synthesis when one ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub description: String,
    pub results: Vec<TaskResult>,

    /// Step synthesis (iterative runs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StepResult {
    /// Tasks that ended in captured failure.
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }

    /// Render the task results as prompt text, one line per task.
    pub(crate) fn format_results(&self) -> String {
        self.results
            .iter()
            .map(|r| match &r.error {
                None => {
                    let marker = if r.truncated { " (truncated)" } else { "" };
                    format!("- [{}] {}{}: {}", r.worker, r.description, marker, r.output)
                }
                Some(e) => format!("- [{}] {} FAILED: {e}", r.worker, r.description),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The run's final product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub objective_id: String,

    /// The synthesized answer to the objective
    pub answer: String,

    /// Everything that happened, step by step
    pub steps: Vec<StepResult>,

    /// Token usage summed over planner, workers, and synthesizer
    pub usage: Usage,

    pub duration_ms: u64,
}
