//! Scripted collaborators for tests and demos
//!
//! Deterministic agents and chat models whose replies are fixed up front, so
//! orchestration runs can be replayed exactly.

use crate::agent::{Agent, AgentInfo, AgentStream};
use crate::chat_agent::CHAT_AGENT_TYPE;
use crate::error::{Error, Result};
use crate::llm_client::{ChatModel, ChatRequest};
use crate::types::Context;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

/// Agent that always gives the same reply
#[derive(Debug, Clone)]
pub struct StaticAgent {
    info: AgentInfo,
    reply: String,
}

impl StaticAgent {
    /// Create a `ChatAgent`-typed agent
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            info: AgentInfo::new(name, description, CHAT_AGENT_TYPE),
            reply: reply.into(),
        }
    }

    /// Override the type tag
    pub fn with_type(mut self, agent_type: impl Into<String>) -> Self {
        self.info.agent_type = agent_type.into();
        self
    }
}

#[async_trait]
impl Agent for StaticAgent {
    fn info(&self) -> AgentInfo {
        self.info.clone()
    }

    async fn handle_message(
        &self,
        _message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Agent replaying a fixed list of replies and recording what it was sent.
///
/// Fails with an agent error once the script runs out, unless built with
/// [`ScriptedAgent::repeating`].
#[derive(Debug)]
pub struct ScriptedAgent {
    info: AgentInfo,
    replies: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    received: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    /// Reply with `replies` in order
    pub fn new(name: impl Into<String>, replies: Vec<String>) -> Self {
        Self {
            info: AgentInfo::new(name, "scripted agent", CHAT_AGENT_TYPE),
            replies: Mutex::new(replies.into()),
            repeat: None,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` forever
    pub fn repeating(name: impl Into<String>, reply: impl Into<String>) -> Self {
        let mut agent = Self::new(name, Vec::new());
        agent.repeat = Some(reply.into());
        agent
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Messages received so far
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn info(&self) -> AgentInfo {
        self.info.clone()
    }

    async fn handle_message(
        &self,
        message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<String> {
        self.received.lock().push(message.to_string());
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        self.repeat
            .clone()
            .ok_or_else(|| {
                Error::agent(format!(
                    "agent '{}' ran out of scripted replies",
                    self.info.name
                ))
            })
    }
}

/// Agent whose every call fails with an agent error
#[derive(Debug, Clone)]
pub struct FailingAgent {
    info: AgentInfo,
    message: String,
}

impl FailingAgent {
    /// Fail with `message`
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            info: AgentInfo::new(name, "always fails", CHAT_AGENT_TYPE),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn info(&self) -> AgentInfo {
        self.info.clone()
    }

    async fn handle_message(
        &self,
        _message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<String> {
        Err(Error::agent(self.message.clone()))
    }
}

/// Agent that streams its reply in fixed fragments
#[derive(Debug, Clone)]
pub struct ChunkedAgent {
    info: AgentInfo,
    chunks: Vec<String>,
}

impl ChunkedAgent {
    /// Stream `chunks` in order
    pub fn new(name: impl Into<String>, chunks: Vec<&str>) -> Self {
        Self {
            info: AgentInfo::new(name, "streams fragments", CHAT_AGENT_TYPE),
            chunks: chunks.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl Agent for ChunkedAgent {
    fn info(&self) -> AgentInfo {
        self.info.clone()
    }

    async fn handle_message(
        &self,
        _message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<String> {
        Ok(self.chunks.concat())
    }

    async fn handle_message_stream(
        &self,
        _message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<AgentStream> {
        let chunks = self.chunks.clone();
        let stream = async_stream::stream! {
            for chunk in chunks {
                yield Ok::<String, Error>(chunk);
            }
        };
        Ok(stream.boxed())
    }
}

/// Chat model replaying raw response envelopes and recording requests
#[derive(Debug)]
pub struct ScriptedChatModel {
    provider: String,
    responses: Mutex<VecDeque<Value>>,
    repeat: Option<Value>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    /// Return `responses` in order
    pub fn new(provider: impl Into<String>, responses: Vec<Value>) -> Self {
        Self {
            provider: provider.into(),
            responses: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `response` forever
    pub fn repeating(provider: impl Into<String>, response: Value) -> Self {
        let mut model = Self::new(provider, Vec::new());
        model.repeat = Some(response);
        model
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: ChatRequest) -> Result<Value> {
        self.requests.lock().push(request);
        if let Some(response) = self.responses.lock().pop_front() {
            return Ok(response);
        }
        self.repeat
            .clone()
            .ok_or_else(|| Error::agent("chat model ran out of scripted responses"))
    }
}
