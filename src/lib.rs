//! A conversational front-end that routes natural-language questions to
//! two backend query tools through a hosted chat model.
//!
//! The crate provides:
//! - A tool registry wrapping platform tools behind a uniform
//!   string-in/string-out contract (`ToolRegistry`, `DomainTool`).
//! - Model binding that attaches the registry to a chat handle
//!   (`BoundModel`).
//! - An `Agent` loop that alternates between the model and the routed
//!   tools until a plain-text answer emerges.
//! - The `InsightApp` boundary the UI collaborator calls, plus an
//!   optional axum transport behind the `server` feature.

mod agent;
mod app;
mod config;
mod error;
mod llm;
mod memory;
mod message;
mod platform;
#[cfg(feature = "server")]
mod server;
mod telemetry;
mod tool;

pub use agent::{Agent, DEFAULT_MAX_ITERATIONS, SYSTEM_INSTRUCTION};
pub use app::{AgentContext, Answer, InsightApp, NOT_INITIALIZED};
pub use config::{AgentConfig, AppConfig, PlatformConfig, ServerConfig};
pub use error::{AgentError, Result};
pub use llm::{BoundModel, ChatModel, ModelCompletion, RestChatClient, StubChatModel};
pub use memory::{ConversationMemory, DEFAULT_MAX_MESSAGES};
pub use message::{Message, Role, ToolCall};
pub use platform::{ModelInfo, Platform, RestPlatform, StubPlatform, ToolInfo, MANAGED_LLM_KIND};
#[cfg(feature = "server")]
pub use server::{AgentServer, AskRequest, AskResponse};
pub use telemetry::init_tracing;
pub use tool::{
    DomainTool, StubDomainTool, ToolDescription, ToolDescriptor, ToolKind, ToolRegistry,
    ANALYST_TOOL_DESCRIPTION, SEARCH_TOOL_DESCRIPTION,
};
