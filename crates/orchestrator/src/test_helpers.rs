//! Mock providers and worker builders for planner, dispatcher, and
//! orchestrator tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use baton_agent::{Worker, WorkerDefinition};
use baton_config::ReasoningConfig;
use baton_core::error::ProviderError;
use baton_core::message::Message;
use baton_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, Usage,
};
use baton_core::tool::ToolRegistry;

pub(crate) fn make_text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Returns scripted responses in order, panicking when the script runs dry.
/// Records every request it sees so tests can assert on composition.
pub(crate) struct ScriptedProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    pub(crate) fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
        }
    }

    pub(crate) fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider ran out of responses");
        }
        Ok(responses.remove(0))
    }
}

/// Never responds. For cancellation tests.
pub(crate) struct HangingProvider;

#[async_trait]
impl CompletionProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        futures::future::pending().await
    }
}

/// Always fails with a non-retryable error.
pub(crate) struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        Err(ProviderError::AuthenticationFailed("synthetic failure".into()))
    }
}

/// Call spans labelled by provider, shared across providers so tests can
/// compare timing between workers.
pub(crate) type SharedSpans = Arc<Mutex<Vec<(String, Instant, Instant)>>>;

pub(crate) fn shared_spans() -> SharedSpans {
    Arc::new(Mutex::new(Vec::new()))
}

/// Sleeps before answering and logs each call's span under its label.
pub(crate) struct DelayedProvider {
    label: String,
    delay: Duration,
    answer: String,
    spans: SharedSpans,
}

impl DelayedProvider {
    pub(crate) fn new(label: &str, delay_ms: u64, answer: &str, spans: SharedSpans) -> Self {
        Self {
            label: label.to_string(),
            delay: Duration::from_millis(delay_ms),
            answer: answer.to_string(),
            spans,
        }
    }
}

#[async_trait]
impl CompletionProvider for DelayedProvider {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        tokio::time::sleep(self.delay).await;
        self.spans
            .lock()
            .unwrap()
            .push((self.label.clone(), start, Instant::now()));
        Ok(make_text_response(&self.answer))
    }
}

/// A worker with one declared capability, no tools, and a fast retry clock.
pub(crate) fn test_worker(
    name: &str,
    capability: &str,
    provider: Arc<dyn CompletionProvider>,
) -> Worker {
    let definition = WorkerDefinition::new(
        name,
        format!("handles {capability}"),
        "You are a specialist. Do the task you are given.",
    )
    .with_capability(capability);
    let config = ReasoningConfig {
        retry_backoff_ms: 1,
        ..Default::default()
    };
    Worker::spawn(
        definition,
        provider,
        Arc::new(ToolRegistry::new()),
        "mock-model",
        &config,
    )
}
