//! The synthesizer: turns raw task results into prose.
//!
//! Two jobs. After each iterative step it writes a short summary that feeds
//! the next planning call. At the end of every run it combines all step
//! results into the final answer.

use std::sync::Arc;

use baton_agent::ReasoningLoop;
use baton_config::EngineConfig;
use baton_core::error::Result;
use baton_core::params::RequestParams;
use baton_core::provider::{CompletionProvider, Usage};
use baton_core::tool::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::plan::{Objective, StepResult};

const SYNTHESIZER_INSTRUCTIONS: &str = "\
You combine results from specialist workers into clear text. Be faithful to \
what the workers produced; do not invent facts they did not report. When a \
task failed, say so instead of papering over it.";

pub struct Synthesizer {
    reasoning: ReasoningLoop,
    params: RequestParams,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &EngineConfig) -> Self {
        let reasoning = ReasoningLoop::new(
            provider,
            Arc::new(ToolRegistry::new()),
            &config.model.default_model,
        )
        .with_instructions(SYNTHESIZER_INSTRUCTIONS)
        .with_config(&config.reasoning);

        // Each synthesis stands alone
        let params = config.request_params().with_use_history(false);

        Self { reasoning, params }
    }

    /// Summarize one completed step for the next planning call.
    pub async fn synthesize_step(
        &mut self,
        objective: &Objective,
        step: &StepResult,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let prompt = format!(
            "Objective: {}\n\nResults of step {} ({}):\n{}\n\nSummarize what was \
             accomplished and what is still missing, in a few sentences.",
            objective.description,
            step.index,
            step.description,
            step.format_results(),
        );
        let outcome = self
            .reasoning
            .generate_cancellable(&prompt, &self.params, cancel)
            .await?;
        Ok(outcome.text)
    }

    /// Combine every step's results into the answer to the objective.
    pub async fn synthesize_final(
        &mut self,
        objective: &Objective,
        steps: &[StepResult],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let sections = if steps.is_empty() {
            "(no steps were executed)".to_string()
        } else {
            steps
                .iter()
                .map(format_section)
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = format!(
            "Objective: {}\n\nAll step results:\n{}\n\nProvide the final answer to \
             the objective, combining the results above.",
            objective.description, sections,
        );
        let outcome = self
            .reasoning
            .generate_cancellable(&prompt, &self.params, cancel)
            .await?;
        Ok(outcome.text)
    }

    /// Token usage consumed by synthesis so far.
    pub fn usage(&self) -> Usage {
        self.reasoning.usage()
    }
}

fn format_section(step: &StepResult) -> String {
    format!(
        "## Step {} ({})\n{}\n",
        step.index,
        step.description,
        step.format_results(),
    )
}
