//! Orchestrators coordinate agent selection, invocation and memory updates
//! for one user turn.
//!
//! # Patterns
//!
//! - **Simple**: explicit `agent_name` from the context, else the default agent
//! - **MultiAgent**: classifier-driven routing with default fallback
//! - **ReAct**: bounded thought/action/observation loop over a reasoning agent
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_orchestra::orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! let config = OrchestratorConfig::from_file("orchestrator.yaml")?;
//! let orchestrator = config.build(registry, Some(memory))?;
//! let reply = orchestrator
//!     .orchestrate("thread-1", "Any pasta places?", None, &Context::new())
//!     .await?;
//! ```

pub mod config;
pub mod multi_agent;
pub mod react;
pub mod simple;

pub use config::{OrchestratorConfig, PatternType, ReActSettings};
pub use multi_agent::MultiAgentOrchestrator;
pub use react::{ReActOrchestrator, ReActOrchestratorBuilder, ReActOutcome, StopReason};
pub use simple::SimpleOrchestrator;

use crate::agent::{collect_stream, Agent};
use crate::error::{Error, Result};
use crate::memory::MemoryRepository;
use crate::registry::AgentRegistry;
use crate::types::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Receives reply fragments as they are produced
pub type StreamCallback<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Coordinates one user turn
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Pattern name, for logging
    fn name(&self) -> &str;

    /// Handle one user message on `thread_id` and return the full reply.
    ///
    /// When `stream_callback` is given it also receives the reply in
    /// fragments; the returned string stays authoritative.
    async fn orchestrate(
        &self,
        thread_id: &str,
        user_message: &str,
        stream_callback: Option<&StreamCallback<'_>>,
        context: &Context,
    ) -> Result<String>;

    /// Like [`orchestrate`](Self::orchestrate), but errors are rendered as
    /// an end-user-safe message instead of being returned
    async fn respond(
        &self,
        thread_id: &str,
        user_message: &str,
        stream_callback: Option<&StreamCallback<'_>>,
        context: &Context,
    ) -> String {
        match self
            .orchestrate(thread_id, user_message, stream_callback, context)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(orchestrator = self.name(), thread_id, error = %err, "turn failed");
                err.user_message()
            }
        }
    }
}

/// Resolve `candidate` if registered, else `default_agent` if registered.
///
/// Never picks an arbitrary agent: with neither available this is
/// `NoAgentAvailable`.
pub(crate) fn resolve_with_fallback(
    registry: &AgentRegistry,
    candidate: Option<&str>,
    default_agent: Option<&str>,
) -> Result<Arc<dyn Agent>> {
    if let Some(name) = candidate {
        if let Some(agent) = registry.get(name) {
            return Ok(agent);
        }
        warn!(
            agent = name,
            default = ?default_agent,
            "agent not registered, falling back to default"
        );
    }

    if let Some(name) = default_agent {
        if let Some(agent) = registry.get(name) {
            return Ok(agent);
        }
        warn!(agent = name, "default agent not registered");
    }

    Err(Error::no_agent(match (candidate, default_agent) {
        (Some(c), Some(d)) => format!("neither '{c}' nor default '{d}' is registered"),
        (Some(c), None) => format!("'{c}' is not registered and no default is configured"),
        (None, Some(d)) => format!("default agent '{d}' is not registered"),
        (None, None) => "no agent selected and no default is configured".to_string(),
    }))
}

/// Call an agent, streaming through `stream_callback` when one is given
pub(crate) async fn invoke_agent(
    agent: &dyn Agent,
    message: &str,
    thread_id: &str,
    stream_callback: Option<&StreamCallback<'_>>,
    context: &Context,
) -> Result<String> {
    match stream_callback {
        Some(on_chunk) => {
            let chunks = agent
                .handle_message_stream(message, thread_id, context)
                .await?;
            collect_stream(chunks, on_chunk).await
        }
        None => agent.handle_message(message, thread_id, context).await,
    }
}

/// Store a message if a memory is configured. Failures are logged only.
pub(crate) async fn remember(
    memory: Option<&Arc<dyn MemoryRepository>>,
    thread_id: &str,
    sender: &str,
    content: &str,
    metadata: Option<HashMap<String, Value>>,
) {
    let Some(memory) = memory else {
        return;
    };
    if let Err(err) = memory.store_message(thread_id, sender, content, metadata).await {
        warn!(thread_id, sender, error = %err, "failed to store message");
    }
}
