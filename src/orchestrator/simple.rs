//! Simple orchestrator pattern
//!
//! Routes to the agent named in the context, else to the configured default.

use crate::error::Result;
use crate::orchestrator::{invoke_agent, resolve_with_fallback, Orchestrator, StreamCallback};
use crate::registry::AgentRegistry;
use crate::types::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Explicit or default agent selection
pub struct SimpleOrchestrator {
    registry: Arc<AgentRegistry>,
    default_agent: Option<String>,
}

impl SimpleOrchestrator {
    /// Create an orchestrator with no default agent
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            default_agent: None,
        }
    }

    /// Set the agent used when the context names none
    pub fn with_default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    /// Configured default agent
    pub fn default_agent(&self) -> Option<&str> {
        self.default_agent.as_deref()
    }
}

#[async_trait]
impl Orchestrator for SimpleOrchestrator {
    fn name(&self) -> &str {
        "simple"
    }

    #[instrument(
        skip(self, user_message, stream_callback, context),
        fields(orchestrator = "simple")
    )]
    async fn orchestrate(
        &self,
        thread_id: &str,
        user_message: &str,
        stream_callback: Option<&StreamCallback<'_>>,
        context: &Context,
    ) -> Result<String> {
        let agent = resolve_with_fallback(
            &self.registry,
            context.agent_name.as_deref(),
            self.default_agent.as_deref(),
        )?;
        debug!(agent = %agent.name(), "selected agent");
        invoke_agent(agent.as_ref(), user_message, thread_id, stream_callback, context).await
    }
}
