//! Shared mock providers and tools for loop and worker tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use baton_core::error::{ProviderError, ToolError};
use baton_core::message::{Message, ToolCallRequest};
use baton_core::params::ModelProfile;
use baton_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, Usage,
};
use baton_core::tool::{ToolOutcome, ToolProvider};

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

pub(crate) fn make_tool_call_response(
    tool_calls: Vec<ToolCallRequest>,
    text: &str,
) -> CompletionResponse {
    let mut message = Message::assistant(text);
    message.tool_calls = tool_calls;
    CompletionResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub(crate) fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

/// Returns scripted responses in order, panicking when the script runs dry.
/// Records every request it sees so tests can assert on composition.
pub(crate) struct SequentialMockProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_count: Mutex<usize>,
    models: Vec<ModelProfile>,
}

impl SequentialMockProvider {
    pub(crate) fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
            models: Vec::new(),
        }
    }

    pub(crate) fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// First response requests the given tool calls, second gives the answer.
    pub(crate) fn tool_then_answer(
        tool_calls: Vec<ToolCallRequest>,
        thinking: &str,
        answer: &str,
    ) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thinking),
            make_text_response(answer),
        ])
    }

    pub(crate) fn with_models(mut self, models: Vec<ModelProfile>) -> Self {
        self.models = models;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("SequentialMockProvider ran out of responses");
        }
        Ok(responses.remove(0))
    }

    async fn models(&self) -> Vec<ModelProfile> {
        self.models.clone()
    }
}

/// Always fails with the given error.
pub(crate) struct FailingProvider {
    error: ProviderError,
    call_count: Mutex<usize>,
}

impl FailingProvider {
    pub(crate) fn new(error: ProviderError) -> Self {
        Self {
            error,
            call_count: Mutex::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// Fails the first `failures` calls with the given error, then answers.
pub(crate) struct FlakyProvider {
    failures: usize,
    error: ProviderError,
    answer: String,
    call_count: Mutex<usize>,
}

impl FlakyProvider {
    pub(crate) fn new(failures: usize, error: ProviderError, answer: &str) -> Self {
        Self {
            failures,
            error,
            answer: answer.to_string(),
            call_count: Mutex::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        if *count <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(make_text_response(&self.answer))
        }
    }
}

/// Never responds. For timeout and cancellation tests.
pub(crate) struct HangingProvider;

impl HangingProvider {
    pub(crate) fn new() -> Self {
        Self
    }
}

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

/// Sleeps before answering and logs the span of every call, so tests can
/// assert whether calls overlapped.
pub(crate) struct DelayedProvider {
    delay: Duration,
    answer: String,
    spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

impl DelayedProvider {
    pub(crate) fn new(
        delay_ms: u64,
        answer: &str,
    ) -> (Self, Arc<Mutex<Vec<(Instant, Instant)>>>) {
        let spans = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                delay: Duration::from_millis(delay_ms),
                answer: answer.to_string(),
                spans: spans.clone(),
            },
            spans,
        )
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
        self.spans.lock().unwrap().push((start, Instant::now()));
        Ok(make_text_response(&self.answer))
    }
}

/// Records every invocation's arguments. Succeeds with a fixed output.
pub(crate) struct CountingTool {
    name: String,
    capability: String,
    invocations: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl CountingTool {
    pub(crate) fn new(
        name: &str,
        capability: &str,
    ) -> (Self, Arc<Mutex<Vec<serde_json::Value>>>) {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.to_string(),
                capability: capability.to_string(),
                invocations: invocations.clone(),
            },
            invocations,
        )
    }
}

#[async_trait]
impl ToolProvider for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counts invocations"
    }

    fn capability(&self) -> &str {
        &self.capability
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            }
        })
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutcome, ToolError> {
        self.invocations.lock().unwrap().push(arguments.clone());
        let text = arguments["text"].as_str().unwrap_or("").to_string();
        Ok(ToolOutcome {
            call_id: String::new(),
            success: true,
            output: text,
            data: None,
        })
    }
}
