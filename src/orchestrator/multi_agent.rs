//! Multi-agent orchestrator pattern
//!
//! A classifier picks the agent for each message from everything currently
//! registered. Unusable picks fall back to the default agent.

use crate::agent::Agent;
use crate::classifier::Classifier;
use crate::error::Result;
use crate::memory::{MemoryRepository, ThreadLocks, ASSISTANT_SENDER, USER_SENDER};
use crate::orchestrator::{
    invoke_agent, remember, resolve_with_fallback, Orchestrator, StreamCallback,
};
use crate::registry::AgentRegistry;
use crate::types::Context;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Classifier-driven routing with default fallback
pub struct MultiAgentOrchestrator {
    registry: Arc<AgentRegistry>,
    classifier: Arc<dyn Classifier>,
    default_agent: Option<String>,
    memory: Option<Arc<dyn MemoryRepository>>,
    locks: ThreadLocks,
}

impl MultiAgentOrchestrator {
    /// Create an orchestrator with no default agent and no memory
    pub fn new(registry: Arc<AgentRegistry>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            registry,
            classifier,
            default_agent: None,
            memory: None,
            locks: ThreadLocks::new(),
        }
    }

    /// Set the agent used when classification gives no usable match
    pub fn with_default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    /// Record every turn in `memory`
    pub fn with_memory(mut self, memory: Arc<dyn MemoryRepository>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Pick the agent for `message`
    pub async fn select_agent(
        &self,
        message: &str,
        thread_id: &str,
        context: &Context,
    ) -> Result<Arc<dyn Agent>> {
        let candidates = self.registry.list();
        let choice = match self
            .classifier
            .classify(message, Some(thread_id), &candidates, context)
            .await
        {
            Ok(choice) => choice,
            Err(err) => {
                warn!(error = %err, "classification failed");
                None
            }
        };
        resolve_with_fallback(&self.registry, choice.as_deref(), self.default_agent.as_deref())
    }
}

#[async_trait]
impl Orchestrator for MultiAgentOrchestrator {
    fn name(&self) -> &str {
        "multi_agent"
    }

    #[instrument(
        skip(self, user_message, stream_callback, context),
        fields(orchestrator = "multi_agent")
    )]
    async fn orchestrate(
        &self,
        thread_id: &str,
        user_message: &str,
        stream_callback: Option<&StreamCallback<'_>>,
        context: &Context,
    ) -> Result<String> {
        let _turn = self.locks.acquire(thread_id).await;
        remember(self.memory.as_ref(), thread_id, USER_SENDER, user_message, None).await;

        let agent = self.select_agent(user_message, thread_id, context).await?;
        let agent_name = agent.name();
        debug!(agent = %agent_name, "routing message");

        let reply =
            invoke_agent(agent.as_ref(), user_message, thread_id, stream_callback, context).await?;
        let metadata = HashMap::from([("agent".to_string(), json!(agent_name))]);
        remember(self.memory.as_ref(), thread_id, ASSISTANT_SENDER, &reply, Some(metadata)).await;
        Ok(reply)
    }
}
