//! Chat model client seam
//!
//! Inference happens behind this trait. Requests and responses are the
//! provider's own JSON envelopes; the provider tag tells the tool registry
//! which wire format to apply.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat completion request in provider wire format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System instructions, placed however the provider expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Conversation turns
    pub messages: Vec<Value>,
    /// Advertised tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

/// Client for a chat completion endpoint
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider tag of the response envelopes (e.g. "openai")
    fn provider(&self) -> &str;

    /// Send a request and return the raw response envelope
    async fn complete(&self, request: ChatRequest) -> Result<Value>;
}
