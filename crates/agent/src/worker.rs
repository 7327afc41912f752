//! Workers: named actors that execute tasks through their own loop.
//!
//! Each worker owns one reasoning loop and one assignment queue, drained by
//! a single consumer task. Two tasks assigned to the same worker therefore
//! run strictly one after the other, with no locks around the loop or its
//! history. Submission is decoupled from completion: `submit` returns a
//! receiver as soon as the assignment is queued, so a caller can enqueue a
//! whole batch before awaiting any outcome.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use baton_config::ReasoningConfig;
use baton_core::error::{Error, Result};
use baton_core::params::RequestParams;
use baton_core::provider::{CompletionProvider, Usage};
use baton_core::tool::ToolRegistry;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reasoning::ReasoningLoop;

/// Assignments that may wait in a worker's queue before submitters block.
const ASSIGNMENT_QUEUE_DEPTH: usize = 64;

/// A worker's identity: name, role description, instructions, and any
/// capabilities it declares beyond those implied by its tools.
#[derive(Debug, Clone)]
pub struct WorkerDefinition {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub extra_capabilities: Vec<String>,
}

impl WorkerDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            extra_capabilities: Vec::new(),
        }
    }

    /// Declare a capability not implied by any registered tool.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.extra_capabilities.push(capability.into());
        self
    }
}

/// One unit of work handed to a worker.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    pub task_id: String,
    pub input: String,
    pub params: RequestParams,
}

/// What came back from a worker for one assignment.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub worker: String,

    /// Final text. Empty when the assignment failed.
    pub output: String,

    /// Present when the assignment failed
    pub error: Option<String>,

    /// True when the iteration bound cut the underlying loop short
    pub truncated: bool,

    pub usage: Usage,
    pub duration_ms: u64,
}

impl TaskOutcome {
    fn failed(task_id: &str, worker: &str, error: String, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            worker: worker.to_string(),
            output: String::new(),
            error: Some(error),
            truncated: false,
            usage: Usage::default(),
            duration_ms,
        }
    }
}

struct Assignment {
    task: TaskAssignment,
    cancel: CancellationToken,
    reply: oneshot::Sender<TaskOutcome>,
}

/// A running worker: queue handle plus the consumer task driving its loop.
pub struct Worker {
    name: String,
    description: String,
    capabilities: BTreeSet<String>,
    assignments: mpsc::Sender<Assignment>,
    consumer: JoinHandle<()>,
}

impl Worker {
    /// Spawn a worker from its definition.
    ///
    /// The capability set is the union of the tool registry's categories and
    /// the definition's extra capabilities.
    pub fn spawn(
        definition: WorkerDefinition,
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
        default_model: impl Into<String>,
        reasoning_config: &ReasoningConfig,
    ) -> Self {
        let WorkerDefinition {
            name,
            description,
            instructions,
            extra_capabilities,
        } = definition;

        let mut capabilities = tools.capabilities();
        capabilities.extend(extra_capabilities);

        let mut reasoning = ReasoningLoop::new(provider, tools, default_model)
            .with_instructions(instructions)
            .with_config(reasoning_config);

        let (tx, mut rx) = mpsc::channel::<Assignment>(ASSIGNMENT_QUEUE_DEPTH);
        let worker_name = name.clone();

        let consumer = tokio::spawn(async move {
            // Single consumer: assignments run strictly in queue order.
            while let Some(Assignment { task, cancel, reply }) = rx.recv().await {
                let outcome = run_assignment(&mut reasoning, &worker_name, task, &cancel).await;
                // Submitter may have dropped its receiver
                let _ = reply.send(outcome);
            }
            debug!(worker = %worker_name, "Worker consumer stopped");
        });

        Self {
            name,
            description,
            capabilities,
            assignments: tx,
            consumer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Whether this worker declares the given capability.
    pub fn can_serve(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Queue an assignment.
    ///
    /// Returns as soon as the assignment is enqueued; the receiver resolves
    /// when the worker gets to it and finishes.
    pub async fn submit(
        &self,
        task: TaskAssignment,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<TaskOutcome>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.assignments
            .send(Assignment {
                task,
                cancel,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Internal("worker assignment queue is closed".into()))?;
        Ok(reply_rx)
    }

    /// Close the queue and wait for in-flight assignments to drain.
    pub async fn shutdown(self) {
        drop(self.assignments);
        if let Err(e) = self.consumer.await {
            warn!(worker = %self.name, error = %e, "Worker consumer task panicked");
        }
    }
}

async fn run_assignment(
    reasoning: &mut ReasoningLoop,
    worker: &str,
    task: TaskAssignment,
    cancel: &CancellationToken,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        debug!(worker, task_id = %task.task_id, "Assignment cancelled before start");
        return TaskOutcome::failed(&task.task_id, worker, Error::Cancelled.to_string(), 0);
    }

    info!(worker, task_id = %task.task_id, "Worker task started");
    let started = Instant::now();
    let result = reasoning
        .generate_cancellable(&task.input, &task.params, cancel)
        .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            info!(
                worker,
                task_id = %task.task_id,
                duration_ms,
                truncated = outcome.truncated,
                "Worker task finished"
            );
            TaskOutcome {
                task_id: task.task_id,
                worker: worker.to_string(),
                output: outcome.text,
                error: None,
                truncated: outcome.truncated,
                usage: outcome.usage,
                duration_ms,
            }
        }
        Err(e) => {
            warn!(worker, task_id = %task.task_id, error = %e, "Worker task failed");
            TaskOutcome::failed(&task.task_id, worker, e.to_string(), duration_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        make_text_response, CountingTool, DelayedProvider, FailingProvider,
        SequentialMockProvider,
    };
    use baton_core::error::ProviderError;

    fn definition(name: &str) -> WorkerDefinition {
        WorkerDefinition::new(name, "a test worker", "You are a test worker")
    }

    fn assignment(id: &str) -> TaskAssignment {
        TaskAssignment {
            task_id: id.into(),
            input: format!("task {id}"),
            params: RequestParams::default(),
        }
    }

    #[tokio::test]
    async fn worker_runs_assignment_and_replies() {
        let provider = Arc::new(SequentialMockProvider::single_text("done"));
        let worker = Worker::spawn(
            definition("alpha"),
            provider,
            Arc::new(ToolRegistry::new()),
            "mock-model",
            &ReasoningConfig::default(),
        );

        let receiver = worker
            .submit(assignment("t1"), CancellationToken::new())
            .await
            .unwrap();
        let outcome = receiver.await.unwrap();

        assert_eq!(outcome.task_id, "t1");
        assert_eq!(outcome.worker, "alpha");
        assert_eq!(outcome.output, "done");
        assert!(outcome.error.is_none());
        assert!(!outcome.truncated);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn same_worker_runs_assignments_sequentially() {
        let (provider, spans) = DelayedProvider::new(50, "ok");
        let worker = Worker::spawn(
            definition("solo"),
            Arc::new(provider),
            Arc::new(ToolRegistry::new()),
            "mock-model",
            &ReasoningConfig::default(),
        );

        let first = worker
            .submit(assignment("t1"), CancellationToken::new())
            .await
            .unwrap();
        let second = worker
            .submit(assignment("t2"), CancellationToken::new())
            .await
            .unwrap();

        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 2);
        // The second provider call began only after the first one ended
        assert!(spans[1].0 >= spans[0].1);
    }

    #[tokio::test]
    async fn capabilities_union_tools_and_extras() {
        let (tool, _) = CountingTool::new("probe", "diagnostics");
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));

        let worker = Worker::spawn(
            definition("caps").with_capability("summarize"),
            Arc::new(SequentialMockProvider::new(vec![])),
            Arc::new(registry),
            "mock-model",
            &ReasoningConfig::default(),
        );

        assert!(worker.can_serve("diagnostics"));
        assert!(worker.can_serve("summarize"));
        assert!(!worker.can_serve("network-fetch"));

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn pre_cancelled_assignment_not_executed() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("unused")]));
        let worker = Worker::spawn(
            definition("idle"),
            provider.clone(),
            Arc::new(ToolRegistry::new()),
            "mock-model",
            &ReasoningConfig::default(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = worker
            .submit(assignment("t1"), cancel)
            .await
            .unwrap()
            .await
            .unwrap();

        assert!(outcome.error.as_deref().unwrap().contains("cancelled"));
        assert_eq!(provider.call_count(), 0);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn failure_captured_in_outcome() {
        let provider = Arc::new(FailingProvider::new(ProviderError::AuthenticationFailed(
            "bad key".into(),
        )));
        let worker = Worker::spawn(
            definition("broken"),
            provider,
            Arc::new(ToolRegistry::new()),
            "mock-model",
            &ReasoningConfig {
                provider_retries: 0,
                retry_backoff_ms: 1,
                ..ReasoningConfig::default()
            },
        );

        let outcome = worker
            .submit(assignment("t1"), CancellationToken::new())
            .await
            .unwrap()
            .await
            .unwrap();

        assert!(outcome.output.is_empty());
        assert!(outcome.error.as_deref().unwrap().contains("Authentication"));

        worker.shutdown().await;
    }
}
