//! The dispatcher: matches tasks to workers and runs a step's tasks
//! concurrently.
//!
//! Resolution is all-or-nothing per step. Every task is matched to a worker
//! before anything is submitted, so a step either dispatches whole or fails
//! with a `ResolutionError` before any side effect. Submission is likewise
//! complete before the first await on results; tasks sharing a worker still
//! serialize on that worker's queue.

use std::sync::Arc;

use baton_agent::{TaskAssignment, TaskOutcome, Worker};
use baton_core::error::{Error, PlanError, ResolutionError, Result};
use baton_core::event::{EngineEvent, EventBus};
use baton_core::params::RequestParams;
use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::plan::{Step, StepResult, Task, TaskResult};

pub struct Dispatcher {
    workers: Vec<Worker>,
    events: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            workers: Vec::new(),
            events,
        }
    }

    pub fn add_worker(&mut self, worker: Worker) {
        self.workers.push(worker);
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// One line per worker, for the planner's system prompt.
    pub fn roster(&self) -> String {
        self.workers
            .iter()
            .map(|w| {
                let capabilities = w
                    .capabilities()
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "- {} (capabilities: {}): {}",
                    w.name(),
                    capabilities,
                    w.description()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Execute every task of a step on its resolved worker.
    ///
    /// Worker failures are captured in the task's result; only resolution
    /// failures, cancellation, and engine faults abort the step.
    pub async fn execute_step(
        &self,
        run_id: &str,
        step: &Step,
        params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<StepResult> {
        let resolved = step
            .tasks
            .iter()
            .map(|task| self.resolve_task(task))
            .collect::<Result<Vec<_>>>()?;

        let mut pending = Vec::with_capacity(step.tasks.len());
        for (task, worker) in step.tasks.iter().zip(resolved) {
            self.events.publish(EngineEvent::TaskDispatched {
                run_id: run_id.to_string(),
                step_index: step.index,
                task_id: task.id.clone(),
                worker: worker.name().to_string(),
                timestamp: Utc::now(),
            });
            debug!(
                step_index = step.index,
                task_id = %task.id,
                worker = worker.name(),
                "Task dispatched"
            );

            let assignment = TaskAssignment {
                task_id: task.id.clone(),
                input: task.input.clone(),
                params: params.clone(),
            };
            let receiver = worker.submit(assignment, cancel.clone()).await?;
            pending.push(receiver);
        }

        let outcomes = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcomes = join_all(pending) => outcomes,
        };

        let mut results = Vec::with_capacity(step.tasks.len());
        for (task, outcome) in step.tasks.iter().zip(outcomes) {
            let outcome: TaskOutcome = outcome
                .map_err(|_| Error::Internal("worker dropped an assignment reply".into()))?;

            self.events.publish(EngineEvent::TaskCompleted {
                run_id: run_id.to_string(),
                step_index: step.index,
                task_id: outcome.task_id.clone(),
                worker: outcome.worker.clone(),
                success: outcome.error.is_none(),
                duration_ms: outcome.duration_ms,
                timestamp: Utc::now(),
            });

            results.push(TaskResult {
                task_id: outcome.task_id,
                description: task.description.clone(),
                worker: outcome.worker,
                output: outcome.output,
                error: outcome.error,
                truncated: outcome.truncated,
                usage: outcome.usage,
                duration_ms: outcome.duration_ms,
            });
        }

        Ok(StepResult {
            index: step.index,
            description: step.description.clone(),
            results,
            summary: None,
        })
    }

    /// Explicit worker assignment wins; otherwise the first worker declaring
    /// the required capability.
    fn resolve_task(&self, task: &Task) -> Result<&Worker> {
        if let Some(name) = &task.worker {
            return self
                .workers
                .iter()
                .find(|w| w.name() == name)
                .ok_or_else(|| {
                    ResolutionError::UnknownWorker {
                        worker: name.clone(),
                        task: task.description.clone(),
                    }
                    .into()
                });
        }

        if let Some(capability) = &task.capability {
            return self
                .workers
                .iter()
                .find(|w| w.can_serve(capability))
                .ok_or_else(|| {
                    ResolutionError::NoCapableWorker {
                        capability: capability.clone(),
                        task: task.description.clone(),
                    }
                    .into()
                });
        }

        // Tasks are validated at planning time; reaching here is a planner bug
        Err(PlanError::UnschedulableTask {
            description: task.description.clone(),
        }
        .into())
    }

    /// Drain every worker's queue and wait for its consumer to finish.
    pub async fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown().await;
        }
    }
}
