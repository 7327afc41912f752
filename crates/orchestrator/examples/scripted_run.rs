//! Runs the engine end to end against a canned provider, so it works offline.
//!
//! ```text
//! RUST_LOG=debug cargo run -p baton-orchestrator --example scripted_run
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use baton_agent::WorkerDefinition;
use baton_config::EngineConfig;
use baton_core::error::ProviderError;
use baton_core::message::Message;
use baton_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse, Usage};
use baton_core::tool::ToolRegistry;
use baton_orchestrator::{Objective, Orchestrator};
use tracing::info;

/// Replies with a fixed script, one entry per call.
struct CannedProvider {
    replies: Mutex<Vec<&'static str>>,
}

impl CannedProvider {
    fn new(replies: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.to_vec()),
        })
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: "script exhausted".into(),
            });
        }
        Ok(CompletionResponse {
            message: Message::assistant(replies.remove(0)),
            usage: Some(Usage {
                prompt_tokens: 40,
                completion_tokens: 20,
                total_tokens: 60,
            }),
            model: "canned-model".into(),
        })
    }
}

#[tokio::main]
async fn main() -> baton_core::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // The engine provider drives planning and synthesis. In iterative mode
    // its calls interleave: plan, step summary, completion signal, answer.
    let engine = CannedProvider::new(&[
        r#"{"done": false, "step": {"description": "gather both halves", "tasks": [
            {"description": "research the history", "input": "Find the project history", "capability": "research"},
            {"description": "survey the layout", "input": "Describe the module layout", "capability": "survey"}
        ]}}"#,
        "Both halves were gathered: the history and the layout.",
        r#"{"done": true}"#,
        "The project began as a weekend prototype and now spans four crates.",
    ]);

    let historian = CannedProvider::new(&["It began as a weekend prototype."]);
    let surveyor = CannedProvider::new(&["Four crates: core, config, agent, orchestrator."]);

    let mut config = EngineConfig::default();
    config.engine.plan_mode = "iterative".into();

    let orchestrator = Orchestrator::new(engine, config)?
        .add_worker_with_provider(
            WorkerDefinition::new("historian", "knows the past", "You recount project history.")
                .with_capability("research"),
            historian,
            Arc::new(ToolRegistry::new()),
        )
        .add_worker_with_provider(
            WorkerDefinition::new("surveyor", "maps the code", "You describe code structure.")
                .with_capability("survey"),
            surveyor,
            Arc::new(ToolRegistry::new()),
        );

    let mut events = orchestrator.events().subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(event = ?event, "engine event");
        }
    });

    let result = orchestrator
        .run(&Objective::new("Summarize this project"))
        .await?;

    println!("\nanswer: {}", result.answer);
    println!(
        "steps: {}, tokens: {}, duration: {}ms",
        result.steps.len(),
        result.usage.total_tokens,
        result.duration_ms
    );

    orchestrator.shutdown().await;
    let _ = listener.await;
    Ok(())
}
