//! Multi-agent orchestration for the baton engine.
//!
//! An [`Orchestrator`] drives an [`Objective`] through three actors: a
//! planner that breaks it into steps, a dispatcher that runs each step's
//! tasks concurrently on capability-matched [`baton_agent::Worker`]s, and a
//! synthesizer that folds the results into the final answer. Lifecycle
//! events stream on the engine's [`baton_core::event::EventBus`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use baton_agent::WorkerDefinition;
//! use baton_config::EngineConfig;
//! use baton_core::tool::ToolRegistry;
//! use baton_orchestrator::{Objective, Orchestrator};
//!
//! # async fn example(provider: Arc<dyn baton_core::provider::CompletionProvider>) -> baton_core::error::Result<()> {
//! let orchestrator = Orchestrator::new(provider, EngineConfig::default())?
//!     .add_worker(
//!         WorkerDefinition::new("researcher", "finds information", "You research."),
//!         Arc::new(ToolRegistry::new()),
//!     );
//!
//! let result = orchestrator.run(&Objective::new("Explain the project layout")).await?;
//! println!("{}", result.answer);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::Dispatcher;
pub use orchestrator::Orchestrator;
pub use plan::{
    FinalResult, Objective, Plan, PlanMode, PlanOutcome, Step, StepResult, Task, TaskResult,
};
pub use planner::Planner;
pub use synthesizer::Synthesizer;
