//! The orchestrator: drives a run from objective to final answer.
//!
//! A run is a loop over planning decisions. In full mode the planner hands
//! back the whole plan and the orchestrator executes its steps in order. In
//! iterative mode each completed step is summarized and fed back into the
//! next planning call until the planner signals completion. Either way the
//! synthesizer produces the final answer from every step result.
//!
//! Planner and synthesizer are built fresh for each run, so no planning
//! conversation leaks between runs. Workers persist across runs.

use std::sync::Arc;
use std::time::Instant;

use baton_agent::{Worker, WorkerDefinition};
use baton_config::EngineConfig;
use baton_core::error::{Error, Result};
use baton_core::event::{EngineEvent, EventBus};
use baton_core::params::RequestParams;
use baton_core::provider::{CompletionProvider, Usage};
use baton_core::tool::ToolRegistry;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::dispatcher::Dispatcher;
use crate::plan::{FinalResult, Objective, PlanMode, PlanOutcome, Step, StepResult};
use crate::planner::Planner;
use crate::synthesizer::Synthesizer;

pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    config: EngineConfig,
    mode: PlanMode,
    dispatcher: Dispatcher,
    events: Arc<EventBus>,
    task_params: RequestParams,
}

impl Orchestrator {
    /// Build an engine from a validated configuration. Workers are added
    /// afterwards with [`add_worker`](Self::add_worker).
    pub fn new(provider: Arc<dyn CompletionProvider>, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let mode: PlanMode = config.engine.plan_mode.parse()?;
        let events = Arc::new(EventBus::default());
        let task_params = config.request_params();

        Ok(Self {
            provider,
            config,
            mode,
            dispatcher: Dispatcher::new(events.clone()),
            events,
            task_params,
        })
    }

    /// Spawn a worker on the engine's provider.
    pub fn add_worker(self, definition: WorkerDefinition, tools: Arc<ToolRegistry>) -> Self {
        let provider = self.provider.clone();
        self.add_worker_with_provider(definition, provider, tools)
    }

    /// Spawn a worker on its own provider, for mixed-backend rosters.
    pub fn add_worker_with_provider(
        mut self,
        definition: WorkerDefinition,
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let worker = Worker::spawn(
            definition,
            provider,
            tools,
            &self.config.model.default_model,
            &self.config.reasoning,
        );
        self.dispatcher.add_worker(worker);
        self
    }

    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    pub fn workers(&self) -> &[Worker] {
        self.dispatcher.workers()
    }

    /// The bus carrying this engine's lifecycle events.
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Run an objective to completion.
    pub async fn run(&self, objective: &Objective) -> Result<FinalResult> {
        self.run_cancellable(objective, &CancellationToken::new())
            .await
    }

    /// Run with per-run task parameters (model pin, temperature, iteration
    /// bound) overriding the configured defaults. Planning and synthesis
    /// keep their own parameters.
    pub async fn run_with_params(
        &self,
        objective: &Objective,
        params: &RequestParams,
    ) -> Result<FinalResult> {
        self.run_inner(objective, params, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), aborting with `Error::Cancelled` when the
    /// token fires. A cancelled run publishes `RunCancelled` and produces no
    /// final result.
    pub async fn run_cancellable(
        &self,
        objective: &Objective,
        cancel: &CancellationToken,
    ) -> Result<FinalResult> {
        self.run_inner(objective, &self.task_params, cancel).await
    }

    async fn run_inner(
        &self,
        objective: &Objective,
        task_params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<FinalResult> {
        let started = Instant::now();
        let run_id = objective.id.clone();
        info!(
            run_id = %run_id,
            objective = %objective.description,
            mode = ?self.mode,
            "Run started"
        );
        self.events.publish(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            objective: objective.description.clone(),
            timestamp: Utc::now(),
        });

        match self.drive(objective, &run_id, task_params, cancel).await {
            Ok((answer, steps, mut usage)) => {
                for step in &steps {
                    for result in &step.results {
                        usage.add(&result.usage);
                    }
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                self.events.publish(EngineEvent::RunCompleted {
                    run_id: run_id.clone(),
                    steps: steps.len(),
                    total_tokens: usage.total_tokens,
                    timestamp: Utc::now(),
                });
                info!(
                    run_id = %run_id,
                    steps = steps.len(),
                    total_tokens = usage.total_tokens,
                    duration_ms,
                    "Run completed"
                );
                Ok(FinalResult {
                    objective_id: run_id,
                    answer,
                    steps,
                    usage,
                    duration_ms,
                })
            }
            Err(Error::Cancelled) => {
                self.events.publish(EngineEvent::RunCancelled {
                    run_id: run_id.clone(),
                    timestamp: Utc::now(),
                });
                info!(run_id = %run_id, "Run cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Run failed");
                Err(e)
            }
        }
    }

    /// The planning/execution loop shared by both modes.
    async fn drive(
        &self,
        objective: &Objective,
        run_id: &str,
        task_params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<StepResult>, Usage)> {
        let roster = self.dispatcher.roster();
        let mut planner = Planner::new(self.provider.clone(), &self.config, &roster, self.mode);
        let mut synthesizer = Synthesizer::new(self.provider.clone(), &self.config);

        let mut completed: Vec<StepResult> = Vec::new();
        loop {
            match planner.plan(objective, &completed, cancel).await? {
                PlanOutcome::Complete => break,
                PlanOutcome::Plan(plan) => {
                    self.events.publish(EngineEvent::PlanProduced {
                        run_id: run_id.to_string(),
                        steps: plan.steps.len(),
                        timestamp: Utc::now(),
                    });
                    for step in &plan.steps {
                        let result = self.execute_step(run_id, step, task_params, cancel).await?;
                        completed.push(result);
                    }
                    break;
                }
                PlanOutcome::Step(step) => {
                    let mut result = self.execute_step(run_id, &step, task_params, cancel).await?;
                    result.summary = Some(
                        synthesizer
                            .synthesize_step(objective, &result, cancel)
                            .await?,
                    );
                    completed.push(result);
                }
            }
        }

        let answer = synthesizer
            .synthesize_final(objective, &completed, cancel)
            .await?;

        let mut usage = planner.usage();
        usage.add(&synthesizer.usage());
        Ok((answer, completed, usage))
    }

    /// Dispatch one step, bracketed by its lifecycle events. Steps are
    /// awaited to completion here, which is what keeps step N+1 from
    /// starting before all of step N is terminal.
    async fn execute_step(
        &self,
        run_id: &str,
        step: &Step,
        task_params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<StepResult> {
        self.events.publish(EngineEvent::StepStarted {
            run_id: run_id.to_string(),
            step_index: step.index,
            tasks: step.tasks.len(),
            timestamp: Utc::now(),
        });
        info!(
            step_index = step.index,
            tasks = step.tasks.len(),
            description = %step.description,
            "Step started"
        );

        let result = self
            .dispatcher
            .execute_step(run_id, step, task_params, cancel)
            .await?;

        self.events.publish(EngineEvent::StepCompleted {
            run_id: run_id.to_string(),
            step_index: step.index,
            failures: result.failures(),
            timestamp: Utc::now(),
        });
        info!(
            step_index = step.index,
            failures = result.failures(),
            "Step completed"
        );
        Ok(result)
    }

    /// Wind down every worker. Queued assignments finish first.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}
