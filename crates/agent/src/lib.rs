//! The reasoning layer of the baton engine.
//!
//! Two building blocks live here:
//!
//! - [`ReasoningLoop`]: one actor's bounded request/tool-call cycle.
//!   Compose a request, send it to the provider, execute any requested
//!   tools, feed results back, and repeat until the model answers in text
//!   or the iteration bound truncates the run.
//! - [`Worker`]: a named actor wrapping its own loop behind an assignment
//!   queue. The queue has a single consumer, so tasks given to the same
//!   worker never interleave.
//!
//! The planner and synthesizer in `baton-orchestrator` drive bare
//! [`ReasoningLoop`]s; dispatched tasks go through [`Worker`]s.

pub mod reasoning;
pub mod worker;

mod structured;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use reasoning::{LoopOutcome, ReasoningLoop};
pub use worker::{TaskAssignment, TaskOutcome, Worker, WorkerDefinition};
