//! # Agent Orchestra
//!
//! An agent orchestration engine: registries of agents and tools, routing by
//! classification, and a bounded ReAct loop, over any mix of LLM providers.
//!
//! ## Features
//!
//! - **Registries**: concurrency-safe agent and tool directories with upsert semantics
//! - **Multi-provider tool calls**: one tool registration serves OpenAI, Azure OpenAI,
//!   Anthropic, Bedrock and Ollama envelopes; per-call failures never abort a batch
//! - **Routing**: explicit/default selection or classifier-driven selection with fallback
//! - **ReAct**: thought/action/observation loop with a hard step bound and a
//!   versioned action grammar
//! - **Memory**: per-thread conversation history, also exposed as tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_orchestra::prelude::*;
//! use agent_orchestra::testing::StaticAgent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = Arc::new(AgentRegistry::new());
//!     registry.register(Arc::new(StaticAgent::new("router", "routes", "food_agent")));
//!     registry.register(Arc::new(StaticAgent::new(
//!         "food_agent",
//!         "restaurant recommendations",
//!         "Try Luigi's",
//!     )));
//!
//!     let router = registry
//!         .get("router")
//!         .ok_or_else(|| Error::config("router missing"))?;
//!     let classifier = LlmClassifier::new(router);
//!     let orchestrator = MultiAgentOrchestrator::new(registry, Arc::new(classifier))
//!         .with_memory(Arc::new(EphemeralMemory::new()));
//!
//!     let reply = orchestrator
//!         .orchestrate("thread-1", "Any good pasta places?", None, &Context::new())
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod chat_agent;
pub mod classifier;
pub mod error;
pub mod llm_client;
pub mod memory;
pub mod memory_tools;
pub mod orchestrator;
pub mod providers;
pub mod react;
pub mod registry;
pub mod testing;
pub mod tool_registry;
pub mod tools;
pub mod tracing_ext;
pub mod types;

// Re-exports for convenience
pub use agent::{collect_stream, Agent, AgentInfo, AgentStream};
pub use chat_agent::{ChatAgentConfig, ToolCallingAgent};
pub use classifier::{Classifier, LlmClassifier};
pub use error::{Error, Result};
pub use llm_client::{ChatModel, ChatRequest};
pub use memory::{EphemeralMemory, MemoryRepository, Message, ThreadLocks, ThreadTurn};
pub use memory_tools::register_memory_tools;
pub use orchestrator::{
    MultiAgentOrchestrator, Orchestrator, OrchestratorConfig, ReActOrchestrator, ReActOutcome,
    SimpleOrchestrator, StopReason, StreamCallback,
};
pub use providers::{ProviderFormat, tags as provider_tags};
pub use react::{Scratchpad, Step, REACT_PROTOCOL_VERSION};
pub use registry::AgentRegistry;
pub use tool_registry::{
    ToolCallError, ToolCallRequest, ToolCallResult, ToolCallResults, ToolErrorKind, ToolOutcome,
    ToolRegistry,
};
pub use tools::{BaseTool, ParamType, Tool, ToolArgs, ToolSchema};
pub use tracing_ext::{init_tracing, LogFormat};
pub use types::{Context, MessageId, UserId};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentInfo};
    pub use crate::classifier::{Classifier, LlmClassifier};
    pub use crate::error::{Error, Result};
    pub use crate::memory::{EphemeralMemory, MemoryRepository};
    pub use crate::orchestrator::{
        MultiAgentOrchestrator, Orchestrator, ReActOrchestrator, SimpleOrchestrator,
    };
    pub use crate::registry::AgentRegistry;
    pub use crate::tool_registry::ToolRegistry;
    pub use crate::tools::{BaseTool, Tool};
    pub use crate::types::Context;
}
