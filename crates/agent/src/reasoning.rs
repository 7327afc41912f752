//! The reasoning loop: one bounded request/tool-call cycle per invocation.
//!
//! Every actor in the engine (the planner and each worker) turns its input
//! into provider calls and tool invocations through this loop:
//!
//! 1. Compose the request (instructions + optional history + new input)
//! 2. Send to the completion provider
//! 3. If tool calls are requested: invoke tools, append results, loop to 2
//! 4. Return the final text once a response carries no tool calls
//!
//! `max_iterations` bounds the round-trips; hitting it marks the outcome as
//! truncated instead of failing. Transient provider failures are retried
//! with doubling backoff before they surface.

use std::sync::Arc;
use std::time::Duration;

use baton_config::ReasoningConfig;
use baton_core::error::{Error, Result, ToolError};
use baton_core::message::{ConversationHistory, Message, Role, ToolCallRequest};
use baton_core::params::RequestParams;
use baton_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ToolDefinition, Usage,
};
use baton_core::tool::{ToolCall, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The phases of one loop invocation.
///
/// `Idle` is the entry phase, `Done` is terminal. The two suspension points
/// are the provider call (leaving `AwaitingCompletion`) and tool execution
/// (leaving `ToolExecuting`).
#[derive(Debug)]
enum LoopState {
    Idle,
    AwaitingCompletion,
    ToolCallRequested(Vec<ToolCallRequest>),
    ToolExecuting(Vec<ToolCall>),
    Done,
}

/// The result of one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Messages produced during this invocation, in order
    pub messages: Vec<Message>,

    /// Final assistant text (may be empty on a truncated invocation)
    pub text: String,

    /// True when the iteration bound cut the loop short,
    /// false on natural completion
    pub truncated: bool,

    /// Provider round-trips consumed
    pub iterations: usize,

    /// Token usage summed over this invocation
    pub usage: Usage,
}

/// The reasoning loop for one actor.
///
/// Owns the actor's `ConversationHistory` exclusively; nothing else may
/// mutate it. Standing instructions are loop configuration, not history,
/// so clearing history never loses the actor's identity.
pub struct ReasoningLoop {
    /// The completion provider
    provider: Arc<dyn CompletionProvider>,

    /// Tools this actor may call
    tools: Arc<ToolRegistry>,

    /// Standing instructions, composed as the system message of every request
    instructions: Option<String>,

    /// Fallback model when nothing is pinned and no candidates are declared
    default_model: String,

    /// Message log owned by this loop
    history: ConversationHistory,

    /// Retries for transient provider failures
    provider_retries: u32,

    /// Initial backoff between provider retries, doubled per attempt
    retry_backoff: Duration,

    /// Per provider/tool call timeout
    call_timeout: Option<Duration>,

    /// Corrective re-prompts for structured output
    pub(crate) structured_retries: u32,

    /// Token usage summed across invocations
    total_usage: Usage,
}

impl ReasoningLoop {
    /// Create a new reasoning loop.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            instructions: None,
            default_model: default_model.into(),
            history: ConversationHistory::new(),
            provider_retries: 2,
            retry_backoff: Duration::from_millis(250),
            call_timeout: None,
            structured_retries: 2,
            total_usage: Usage::default(),
        }
    }

    /// Set standing instructions (the system message).
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the provider retry budget and initial backoff.
    pub fn with_retry_policy(mut self, retries: u32, backoff_ms: u64) -> Self {
        self.provider_retries = retries;
        self.retry_backoff = Duration::from_millis(backoff_ms);
        self
    }

    /// Set a per provider/tool call timeout.
    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Set the corrective re-prompt budget for structured output.
    pub fn with_structured_retries(mut self, retries: u32) -> Self {
        self.structured_retries = retries;
        self
    }

    /// Apply retry, timeout, and structured-output settings from config.
    pub fn with_config(mut self, config: &ReasoningConfig) -> Self {
        self.provider_retries = config.provider_retries;
        self.retry_backoff = Duration::from_millis(config.retry_backoff_ms);
        self.call_timeout = config.call_timeout_secs.map(Duration::from_secs);
        self.structured_retries = config.structured_retries;
        self
    }

    /// The message log owned by this loop.
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Discard all history. Instructions and configuration are untouched.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Token usage summed across all invocations of this loop.
    pub fn usage(&self) -> Usage {
        self.total_usage.clone()
    }

    /// Run one invocation: input in, final text (or truncated partial) out.
    pub async fn generate(&mut self, input: &str, params: &RequestParams) -> Result<LoopOutcome> {
        self.generate_cancellable(input, params, &CancellationToken::new())
            .await
    }

    /// Like [`generate`](Self::generate), aborting with `Error::Cancelled`
    /// when the token fires. Partial results are discarded.
    pub async fn generate_cancellable(
        &mut self,
        input: &str,
        params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome> {
        let model = self.select_model(params).await;
        let tool_definitions = self.tools.definitions();

        // Messages produced by this invocation. Requests are composed from
        // history + these; history itself is only extended at the end.
        let mut invocation: Vec<Message> = vec![Message::user(input)];
        let mut usage = Usage::default();
        let mut iterations = 0usize;
        let mut truncated = false;
        let mut state = LoopState::Idle;

        debug!(
            model = %model,
            max_iterations = params.max_iterations,
            use_history = params.use_history,
            "Reasoning loop starting"
        );

        loop {
            state = match state {
                LoopState::Idle => LoopState::AwaitingCompletion,

                LoopState::AwaitingCompletion => {
                    if iterations >= params.max_iterations {
                        warn!(iterations, "Max iterations reached, truncating");
                        truncated = true;
                        LoopState::Done
                    } else {
                        iterations += 1;
                        let request =
                            self.build_request(&model, &invocation, &tool_definitions, params);
                        let response = tokio::select! {
                            _ = cancel.cancelled() => return Err(Error::Cancelled),
                            result = self.call_provider(request) => result?,
                        };

                        if let Some(u) = &response.usage {
                            usage.add(u);
                        }

                        let tool_calls = response.message.tool_calls.clone();
                        invocation.push(response.message);

                        if tool_calls.is_empty() {
                            LoopState::Done
                        } else {
                            LoopState::ToolCallRequested(tool_calls)
                        }
                    }
                }

                LoopState::ToolCallRequested(requests) => {
                    debug!(tool_count = requests.len(), "Executing tool calls");
                    let calls = requests
                        .iter()
                        .map(|tc| ToolCall {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                        })
                        .collect();
                    LoopState::ToolExecuting(calls)
                }

                LoopState::ToolExecuting(calls) => {
                    let results = tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        results = self.execute_tools(&calls, params.parallel_tool_calls) => results,
                    };
                    invocation.extend(results);
                    LoopState::AwaitingCompletion
                }

                LoopState::Done => break,
            };
        }

        let text = invocation
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        self.total_usage.add(&usage);

        if params.use_history {
            for message in &invocation {
                self.history.push(message.clone());
            }
        }

        debug!(iterations, truncated, "Reasoning loop finished");

        Ok(LoopOutcome {
            messages: invocation,
            text,
            truncated,
            iterations,
            usage,
        })
    }

    /// Convenience wrapper returning only the final text.
    pub async fn generate_str(&mut self, input: &str, params: &RequestParams) -> Result<String> {
        Ok(self.generate(input, params).await?.text)
    }

    /// Pinned model wins; otherwise rank the provider's candidates by the
    /// caller's preference weights, falling back to the default model.
    async fn select_model(&self, params: &RequestParams) -> String {
        if let Some(model) = &params.model {
            return model.clone();
        }

        let candidates = self.provider.models().await;
        match params.preferences.select(&candidates) {
            Some(profile) => {
                debug!(model = %profile.name, "Selected model by preference score");
                profile.name.clone()
            }
            None => self.default_model.clone(),
        }
    }

    fn build_request(
        &self,
        model: &str,
        invocation: &[Message],
        tool_definitions: &[ToolDefinition],
        params: &RequestParams,
    ) -> CompletionRequest {
        let mut messages = Vec::new();
        if let Some(instructions) = &self.instructions {
            messages.push(Message::system(instructions));
        }
        if params.use_history {
            messages.extend_from_slice(self.history.messages());
        }
        messages.extend_from_slice(invocation);

        CompletionRequest {
            model: model.to_string(),
            messages,
            temperature: params.temperature,
            max_tokens: Some(params.max_tokens),
            tools: tool_definitions.to_vec(),
            stop: params.stop.clone(),
        }
    }

    /// Call the provider, retrying transient failures with doubling backoff.
    async fn call_provider(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut attempt: u32 = 0;
        let mut backoff = self.retry_backoff;

        loop {
            let result = match self.call_timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, self.provider.complete(request.clone()))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(baton_core::ProviderError::Timeout(format!(
                            "no response after {}s",
                            timeout.as_secs()
                        ))),
                    }
                }
                None => self.provider.complete(request.clone()).await,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.provider_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Provider call failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Invoke the requested tools, concurrently when allowed.
    async fn execute_tools(&self, calls: &[ToolCall], parallel: bool) -> Vec<Message> {
        if parallel && calls.len() > 1 {
            let futures = calls.iter().map(|call| self.invoke_one(call));
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoke_one(call).await);
            }
            results
        }
    }

    /// Invoke one tool. Failures are reported back to the model as error
    /// messages, never surfaced as loop errors.
    async fn invoke_one(&self, call: &ToolCall) -> Message {
        let start = std::time::Instant::now();

        let result = match self.call_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.tools.invoke(call)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: timeout.as_secs(),
                }),
            },
            None => self.tools.invoke(call).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                debug!(tool = %call.name, success = outcome.success, duration_ms, "Tool invoked");
                Message::tool_result(&call.id, &outcome.output)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, duration_ms, "Tool invocation failed");
                Message::tool_result(&call.id, format!("Error: {e}"))
            }
        }
    }
}
