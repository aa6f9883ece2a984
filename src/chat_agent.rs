//! Agent driving a chat model with tool calling

use crate::agent::{Agent, AgentInfo};
use crate::error::{Error, Result};
use crate::llm_client::{ChatModel, ChatRequest};
use crate::memory::{MemoryRepository, USER_SENDER};
use crate::providers::ProviderFormat;
use crate::tool_registry::ToolRegistry;
use crate::types::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Type tag reported by [`ToolCallingAgent`]
pub const CHAT_AGENT_TYPE: &str = "ChatAgent";

/// Default tool-calling round trips per message
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

fn default_agent_type() -> String {
    CHAT_AGENT_TYPE.to_string()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

/// Configuration for a [`ToolCallingAgent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAgentConfig {
    /// Registry key
    pub name: String,
    /// Description used for classification
    #[serde(default)]
    pub description: String,
    /// Type tag
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    /// System instructions
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum model round trips while the model keeps requesting tools
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Number of earlier thread messages sent as context (0 disables)
    #[serde(default)]
    pub history_window: usize,
}

impl ChatAgentConfig {
    /// Create a config with defaults
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent_type: default_agent_type(),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_window: 0,
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the history window
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }
}

/// Agent that answers through a [`ChatModel`], running requested tools
/// through a [`ToolRegistry`] until the model replies with text
pub struct ToolCallingAgent {
    config: ChatAgentConfig,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn MemoryRepository>>,
}

impl ToolCallingAgent {
    /// Create an agent with no tools and no memory
    pub fn new(config: ChatAgentConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            model,
            tools: Arc::new(ToolRegistry::new()),
            memory: None,
        }
    }

    /// Use a shared tool registry
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Read thread history from `memory`
    pub fn with_memory(mut self, memory: Arc<dyn MemoryRepository>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Agent configuration
    pub fn config(&self) -> &ChatAgentConfig {
        &self.config
    }

    async fn opening_messages(
        &self,
        format: &dyn ProviderFormat,
        message: &str,
        thread_id: &str,
    ) -> Result<Vec<Value>> {
        let mut messages = Vec::new();
        if let (Some(memory), window) = (&self.memory, self.config.history_window) {
            if window > 0 {
                let mut history = memory.get_last_n_messages(thread_id, window + 1).await?;
                // orchestrators store the inbound message before calling the agent
                if history
                    .last()
                    .is_some_and(|m| m.sender == USER_SENDER && m.content == message)
                {
                    history.pop();
                }
                let skip = history.len().saturating_sub(window);
                for entry in history.into_iter().skip(skip) {
                    let role = if entry.sender == USER_SENDER { "user" } else { "assistant" };
                    messages.push(format.text_message(role, &entry.content));
                }
            }
        }
        messages.push(format.user_message(message));
        Ok(messages)
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new(
            &self.config.name,
            &self.config.description,
            &self.config.agent_type,
        )
    }

    #[instrument(skip(self, message, context), fields(agent = %self.config.name))]
    async fn handle_message(
        &self,
        message: &str,
        thread_id: &str,
        context: &Context,
    ) -> Result<String> {
        let provider = self.model.provider().to_string();
        let format = self.tools.format(&provider)?;
        let tools = self.tools.tool_schemas(&provider)?;
        let mut messages = self.opening_messages(format.as_ref(), message, thread_id).await?;

        for iteration in 1..=self.config.max_iterations {
            if context.is_cancelled() {
                return Err(Error::Cancelled(format!(
                    "agent '{}' cancelled",
                    self.config.name
                )));
            }

            let response = self
                .model
                .complete(ChatRequest {
                    system_prompt: self.config.system_prompt.clone(),
                    messages: messages.clone(),
                    tools: tools.clone(),
                })
                .await?;

            let calls = format.extract_tool_calls(&response);
            if calls.is_empty() {
                return Ok(format.extract_text(&response).unwrap_or_default());
            }

            debug!(iteration, calls = calls.len(), "model requested tools");
            let results = self.tools.execute_tool_calls(calls).await;
            if let Some(echo) = format.assistant_message(&response) {
                messages.push(echo);
            }
            messages.extend(format.tool_result_messages(results.as_slice()));
        }

        Err(Error::agent(format!(
            "agent '{}' still requesting tools after {} iterations",
            self.config.name, self.config.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::EphemeralMemory;
    use crate::providers::tags;
    use crate::testing::ScriptedChatModel;
    use crate::tools::calculator_tool;
    use serde_json::json;

    fn tool_call_response() -> Value {
        json!({ "choices": [{ "message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{ "id": "call_1", "type": "function", "function": {
                "name": "calculator",
                "arguments": "{\"operation\":\"add\",\"a\":2,\"b\":3}"
            }}]
        }}]})
    }

    fn text_response(text: &str) -> Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
    }

    fn tools() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        registry.register_tool(calculator_tool().unwrap()).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_runs_tools_until_text_reply() {
        let model = Arc::new(ScriptedChatModel::new(
            tags::OPENAI,
            vec![tool_call_response(), text_response("2 + 3 = 5")],
        ));
        let agent = ToolCallingAgent::new(
            ChatAgentConfig::new("math", "does math").with_system_prompt("be precise"),
            model.clone(),
        )
        .with_tools(tools());

        let reply = agent
            .handle_message("what is 2+3?", "t-1", &Context::new())
            .await
            .unwrap();
        assert_eq!(reply, "2 + 3 = 5");

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system_prompt.as_deref(), Some("be precise"));
        assert_eq!(requests[0].tools.len(), 1);
        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 3);
        assert_eq!(follow_up[2]["role"], "tool");
        assert_eq!(follow_up[2]["tool_call_id"], "call_1");
        assert_eq!(follow_up[2]["content"], "{\"result\":5.0}");
    }

    #[tokio::test]
    async fn test_iteration_budget_is_enforced() {
        let model = Arc::new(ScriptedChatModel::repeating(tags::OPENAI, tool_call_response()));
        let agent = ToolCallingAgent::new(
            ChatAgentConfig::new("math", "does math").with_max_iterations(2),
            model.clone(),
        )
        .with_tools(tools());

        let result = agent.handle_message("loop", "t-1", &Context::new()).await;
        assert!(matches!(result, Err(Error::Agent(_))));
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_history_window_from_memory() {
        let memory = Arc::new(EphemeralMemory::new());
        for (sender, content) in [
            ("user", "old question"),
            ("assistant", "old answer"),
            ("user", "recent question"),
            ("assistant", "recent answer"),
            ("user", "current"),
        ] {
            memory.store_message("t-1", sender, content, None).await.unwrap();
        }

        let model = Arc::new(ScriptedChatModel::new(tags::OPENAI, vec![text_response("ok")]));
        let agent = ToolCallingAgent::new(
            ChatAgentConfig::new("chat", "chats").with_history_window(2),
            model.clone(),
        )
        .with_memory(memory);

        agent.handle_message("current", "t-1", &Context::new()).await.unwrap();
        let messages = &model.requests()[0].messages;
        let contents: Vec<_> = messages.iter().map(|m| m["content"].clone()).collect();
        assert_eq!(
            contents,
            vec![json!("recent question"), json!("recent answer"), json!("current")]
        );
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_config_failure() {
        let model = Arc::new(ScriptedChatModel::new("mystery", vec![text_response("ok")]));
        let agent = ToolCallingAgent::new(ChatAgentConfig::new("chat", "chats"), model);
        let result = agent.handle_message("hi", "t-1", &Context::new()).await;
        assert!(matches!(result, Err(Error::UnsupportedProvider(_))));
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let config: ChatAgentConfig = serde_yaml::from_str("name: helper\n").unwrap();
        assert_eq!(config.agent_type, CHAT_AGENT_TYPE);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.history_window, 0);
    }
}
