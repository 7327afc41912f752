//! # Baton Core
//!
//! Domain types, traits, and error definitions for the baton orchestration
//! engine. This crate defines the contracts that all other crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators (completion providers and tools) are
//! defined as traits here. Implementations live outside the engine. This
//! enables:
//! - Swapping provider bindings via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod params;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{
    Error, PlanError, ProviderError, ResolutionError, Result, StructuredError, ToolError,
};
pub use message::{ConversationHistory, Message, Role, ToolCallRequest};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ToolDefinition, Usage,
};
pub use tool::{ToolCall, ToolOutcome, ToolProvider, ToolRegistry};
pub use params::{ModelPreferences, ModelProfile, RequestParams};
pub use event::{EngineEvent, EventBus};
