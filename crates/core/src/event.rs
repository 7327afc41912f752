//! Engine event system: observable run/step/task lifecycle.
//!
//! Events are published as the orchestrator moves through a run. Subscribers
//! (progress UIs, log sinks, tests asserting dispatch order) receive them
//! without coupling to the engine internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All lifecycle events in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A run began
    RunStarted {
        run_id: String,
        objective: String,
        timestamp: DateTime<Utc>,
    },

    /// The planner produced a full plan
    PlanProduced {
        run_id: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// A step's tasks are about to be dispatched
    StepStarted {
        run_id: String,
        step_index: usize,
        tasks: usize,
        timestamp: DateTime<Utc>,
    },

    /// A task was handed to its worker. Published before the dispatch
    /// future is awaited, so overlap within a step is observable.
    TaskDispatched {
        run_id: String,
        step_index: usize,
        task_id: String,
        worker: String,
        timestamp: DateTime<Utc>,
    },

    /// A task reached a terminal state
    TaskCompleted {
        run_id: String,
        step_index: usize,
        task_id: String,
        worker: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// All tasks of a step are terminal
    StepCompleted {
        run_id: String,
        step_index: usize,
        failures: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run produced its final result
    RunCompleted {
        run_id: String,
        steps: usize,
        total_tokens: u32,
        timestamp: DateTime<Utc>,
    },

    /// The run was cancelled before producing a final result
    RunCancelled {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for engine events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<EngineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EngineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
