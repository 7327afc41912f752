//! The planner: turns an objective into validated steps.
//!
//! One structured call per decision. Full mode asks for the whole plan at
//! once; iterative mode asks for the next step given everything completed so
//! far, until the planner sets `done`. Replies that fail validation are fed
//! back with a corrective prompt up to `plan_retries` times before the run
//! fails with the matching `PlanError`.

use std::sync::Arc;

use baton_agent::ReasoningLoop;
use baton_config::EngineConfig;
use baton_core::error::{Error, PlanError, Result, StructuredError};
use baton_core::params::RequestParams;
use baton_core::provider::{CompletionProvider, Usage};
use baton_core::tool::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::plan::{
    NextStepDecision, Objective, Plan, PlanMode, PlanOutcome, PlanOutline, PlannedStep,
    PlannedTask, Step, StepResult, Task,
};

const PLANNER_INSTRUCTIONS: &str = "\
You are the planning component of a multi-agent engine. You break an \
objective into steps. Each step is a group of tasks that run concurrently; \
steps run strictly in order, so place a task after everything it depends \
on. Every task must name either a required capability or a specific worker \
from the roster. Keep plans as short as the objective allows.";

/// Produces validated steps from an objective through structured calls.
///
/// Owns its own reasoning loop, so in iterative mode the planning
/// conversation accumulates across calls within one run.
pub struct Planner {
    reasoning: ReasoningLoop,
    params: RequestParams,
    mode: PlanMode,
    plan_retries: u32,
    max_steps: usize,
}

impl Planner {
    /// Build a planner for one run. `roster` describes the configured
    /// workers (name, capabilities, description), one per line.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        config: &EngineConfig,
        roster: &str,
        mode: PlanMode,
    ) -> Self {
        let instructions = format!("{PLANNER_INSTRUCTIONS}\n\nWorker roster:\n{roster}");
        let reasoning = ReasoningLoop::new(
            provider,
            Arc::new(ToolRegistry::new()),
            &config.model.default_model,
        )
        .with_instructions(instructions)
        .with_config(&config.reasoning);

        // Planning wants determinism more than creativity
        let params = config.request_params().with_temperature(0.3);

        Self {
            reasoning,
            params,
            mode,
            plan_retries: config.engine.plan_retries,
            max_steps: config.engine.max_steps,
        }
    }

    /// One planning decision: the whole plan (full mode), or the next step
    /// or a completion signal (iterative mode).
    pub async fn plan(
        &mut self,
        objective: &Objective,
        completed: &[StepResult],
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome> {
        match self.mode {
            PlanMode::Full => Ok(PlanOutcome::Plan(self.plan_full(objective, cancel).await?)),
            PlanMode::Iterative => self.plan_next(objective, completed, cancel).await,
        }
    }

    /// Token usage consumed by planning so far.
    pub fn usage(&self) -> Usage {
        self.reasoning.usage()
    }

    async fn plan_full(
        &mut self,
        objective: &Objective,
        cancel: &CancellationToken,
    ) -> Result<Plan> {
        let mut prompt = format!(
            "Objective: {}{}\n\nProduce the complete plan.",
            objective.description,
            context_block(objective),
        );

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let outline = self.request::<PlanOutline>(&prompt, attempts, cancel).await?;

            match validate_outline(&outline, self.max_steps) {
                Ok(()) => {
                    let plan = Plan {
                        objective_id: objective.id.clone(),
                        steps: outline
                            .steps
                            .into_iter()
                            .enumerate()
                            .map(|(index, step)| into_step(index, step))
                            .collect(),
                    };
                    info!(steps = plan.steps.len(), attempts, "Plan produced");
                    return Ok(plan);
                }
                Err(issue) => {
                    if attempts > self.plan_retries {
                        return Err(issue.into_error(attempts));
                    }
                    warn!(attempts, issue = %issue, "Plan rejected, re-prompting");
                    prompt = format!("That plan is invalid: {issue}. Produce a corrected plan.");
                }
            }
        }
    }

    async fn plan_next(
        &mut self,
        objective: &Objective,
        completed: &[StepResult],
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome> {
        let next_index = completed.len();
        let mut prompt = match completed.last() {
            Some(last) => format!(
                "Results of step {}:\n{}\n\nDecide the next step, or set done to true \
                 if the objective is accomplished.",
                last.index,
                format_for_planner(last),
            ),
            None => format!(
                "Objective: {}{}\n\nDecide the first step, or set done to true if \
                 nothing needs to be done.",
                objective.description,
                context_block(objective),
            ),
        };

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let decision = self
                .request::<NextStepDecision>(&prompt, attempts, cancel)
                .await?;

            if decision.done {
                info!(steps = next_index, "Planner signalled completion");
                return Ok(PlanOutcome::Complete);
            }

            // The bound rejects planning past it; a completion signal at the
            // boundary is still honored above.
            if next_index >= self.max_steps {
                return Err(PlanError::StepLimitExceeded {
                    limit: self.max_steps,
                }
                .into());
            }

            let issue = match decision.step {
                None => PlanIssue::MissingStep,
                Some(step) => match validate_step(next_index, &step) {
                    Ok(()) => {
                        debug!(
                            step_index = next_index,
                            tasks = step.tasks.len(),
                            "Next step planned"
                        );
                        return Ok(PlanOutcome::Step(into_step(next_index, step)));
                    }
                    Err(issue) => issue,
                },
            };

            if attempts > self.plan_retries {
                return Err(issue.into_error(attempts));
            }
            warn!(attempts, issue = %issue, "Step rejected, re-prompting");
            prompt = format!("That reply is invalid: {issue}. Produce a corrected reply.");
        }
    }

    /// One structured call. Exhausting the schema retry budget counts as a
    /// malformed plan.
    async fn request<T>(
        &mut self,
        prompt: &str,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned + schemars::JsonSchema,
    {
        match self
            .reasoning
            .generate_structured_cancellable::<T>(prompt, &self.params, cancel)
            .await
        {
            Ok(value) => Ok(value),
            Err(Error::Structured(StructuredError::SchemaUnmet { reason, .. })) => {
                Err(PlanError::Malformed { attempts, reason }.into())
            }
            Err(e) => Err(e),
        }
    }
}

/// Why a planner reply was rejected.
enum PlanIssue {
    Empty,
    StepWithoutTasks(usize),
    TooManySteps { got: usize, limit: usize },
    Unschedulable(String),
    MissingStep,
}

impl std::fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "the step list is empty"),
            Self::StepWithoutTasks(index) => write!(f, "step {index} has no tasks"),
            Self::TooManySteps { got, limit } => {
                write!(f, "{got} steps exceeds the limit of {limit}")
            }
            Self::Unschedulable(description) => {
                write!(f, "task \"{description}\" names neither a capability nor a worker")
            }
            Self::MissingStep => write!(f, "done is false but no step was given"),
        }
    }
}

impl PlanIssue {
    fn into_error(self, attempts: u32) -> Error {
        match self {
            Self::Empty => PlanError::Empty.into(),
            Self::Unschedulable(description) => {
                PlanError::UnschedulableTask { description }.into()
            }
            other => PlanError::Malformed {
                attempts,
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

fn validate_outline(outline: &PlanOutline, max_steps: usize) -> std::result::Result<(), PlanIssue> {
    if outline.steps.is_empty() {
        return Err(PlanIssue::Empty);
    }
    if outline.steps.len() > max_steps {
        return Err(PlanIssue::TooManySteps {
            got: outline.steps.len(),
            limit: max_steps,
        });
    }
    for (index, step) in outline.steps.iter().enumerate() {
        validate_step(index, step)?;
    }
    Ok(())
}

fn validate_step(index: usize, step: &PlannedStep) -> std::result::Result<(), PlanIssue> {
    if step.tasks.is_empty() {
        return Err(PlanIssue::StepWithoutTasks(index));
    }
    for task in &step.tasks {
        if normalize(&task.capability).is_none() && normalize(&task.worker).is_none() {
            return Err(PlanIssue::Unschedulable(task.description.clone()));
        }
    }
    Ok(())
}

/// Empty and whitespace-only fields count as absent.
fn normalize(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn into_step(index: usize, planned: PlannedStep) -> Step {
    Step {
        index,
        description: planned.description,
        tasks: planned.tasks.into_iter().map(into_task).collect(),
    }
}

fn into_task(planned: PlannedTask) -> Task {
    Task {
        id: Uuid::new_v4().to_string(),
        description: planned.description,
        input: planned.input,
        capability: normalize(&planned.capability).map(String::from),
        worker: normalize(&planned.worker).map(String::from),
    }
}

fn format_for_planner(step: &StepResult) -> String {
    match &step.summary {
        Some(summary) => format!("{}\nSummary: {summary}", step.format_results()),
        None => step.format_results(),
    }
}

fn context_block(objective: &Objective) -> String {
    match &objective.context {
        Some(context) => format!("\nContext: {context}"),
        None => String::new(),
    }
}
