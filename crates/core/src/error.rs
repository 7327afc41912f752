//! Error types for the baton domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all baton operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Planning errors ---
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    // --- Worker resolution errors ---
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Structured output errors ---
    #[error("Structured output error: {0}")]
    Structured(#[from] StructuredError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Run cancellation ---
    #[error("Run cancelled")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures while producing or validating a plan. Always fatal to the run.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("Malformed plan after {attempts} attempts: {reason}")]
    Malformed { attempts: u32, reason: String },

    #[error("Unschedulable task (no capability tag or worker assignment): {description}")]
    UnschedulableTask { description: String },

    #[error("Step limit of {limit} exceeded without a completion signal")]
    StepLimitExceeded { limit: usize },

    #[error("Planner produced an empty plan")]
    Empty,
}

/// Failures while matching tasks to workers. Raised before any dispatch.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("No worker declares capability '{capability}' required by task: {task}")]
    NoCapableWorker { capability: String, task: String },

    #[error("Unknown worker '{worker}' assigned to task: {task}")]
    UnknownWorker { worker: String, task: String },
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool invocation failed: {tool_name}: {reason}")]
    InvocationFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Schema validation exhausted its retry budget.
#[derive(Debug, Clone, Error)]
pub enum StructuredError {
    #[error("Response did not match the schema after {attempts} attempts: {reason}")]
    SchemaUnmet { attempts: u32, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a retry with backoff has a chance of succeeding.
    ///
    /// Auth, unknown-model, and client-side API errors are permanent;
    /// everything transient (rate limits, timeouts, network, 5xx) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::NotConfigured(_) => false,
        }
    }
}
