//! Provider wire formats for tool calling
//!
//! Each LLM provider wraps "call function X with arguments Y" differently.
//! A [`ProviderFormat`] knows one provider's envelope shapes: where tool-call
//! requests live in a raw response, how tool schemas are advertised, and how
//! tool results are sent back. Formats are looked up by provider tag in a
//! registration table owned by the tool registry, so adding a provider means
//! registering one more format.

use crate::tool_registry::{ToolCallRequest, ToolCallResult};
use crate::tools::ToolSchema;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Built-in provider tags
pub mod tags {
    /// OpenAI chat completions
    pub const OPENAI: &str = "openai";
    /// Azure OpenAI chat completions (OpenAI envelope)
    pub const AZURE_OPENAI: &str = "azure_openai";
    /// Anthropic messages API
    pub const ANTHROPIC: &str = "anthropic";
    /// AWS Bedrock Converse API
    pub const BEDROCK: &str = "bedrock";
    /// Ollama chat API
    pub const OLLAMA: &str = "ollama";
}

/// One provider's tool-calling envelope shapes
pub trait ProviderFormat: Send + Sync {
    /// Provider tag this format is registered under
    fn tag(&self) -> &str;

    /// Locate tool-call requests inside a raw response
    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest>;

    /// Render a canonical schema in this provider's tool format
    fn tool_schema(&self, schema: &ToolSchema) -> Value;

    /// Assistant text carried by a raw response, if any
    fn extract_text(&self, response: &Value) -> Option<String>;

    /// The assistant turn to echo back before tool results
    fn assistant_message(&self, response: &Value) -> Option<Value>;

    /// A plain text turn for `role` ("user" or "assistant")
    fn text_message(&self, role: &str, text: &str) -> Value {
        json!({ "role": role, "content": text })
    }

    /// A user turn carrying `text`
    fn user_message(&self, text: &str) -> Value {
        self.text_message("user", text)
    }

    /// Messages carrying tool results back to the model
    fn tool_result_messages(&self, results: &[ToolCallResult]) -> Vec<Value>;
}

/// Every built-in format
pub fn builtin_formats() -> Vec<Arc<dyn ProviderFormat>> {
    vec![
        Arc::new(OpenAiFormat::openai()),
        Arc::new(OpenAiFormat::azure()),
        Arc::new(AnthropicFormat),
        Arc::new(BedrockFormat),
        Arc::new(OllamaFormat),
    ]
}

/// Build requests from `(id, name, arguments)` triples. A missing id becomes
/// `call_<n>`, with `n` starting at the call's position and skipping ids
/// already taken in the batch.
fn requests<'a>(
    calls: impl Iterator<Item = (Option<&'a str>, &'a str, String)>,
) -> Vec<ToolCallRequest> {
    let calls: Vec<_> = calls.collect();
    let mut taken: HashSet<String> = calls
        .iter()
        .filter_map(|(id, _, _)| id.map(str::to_string))
        .collect();

    calls
        .into_iter()
        .enumerate()
        .map(|(index, (id, name, arguments))| {
            let call_id = match id {
                Some(id) => id.to_string(),
                None => {
                    let mut n = index;
                    while taken.contains(&format!("call_{n}")) {
                        n += 1;
                    }
                    let id = format!("call_{n}");
                    taken.insert(id.clone());
                    id
                }
            };
            ToolCallRequest {
                call_id,
                tool_name: name.to_string(),
                arguments,
            }
        })
        .collect()
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Serialized arguments, whether the provider sent a JSON string or an object
fn serialized_arguments(arguments: Option<&Value>) -> String {
    match arguments {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    }
}

fn joined_text_blocks<'a>(
    blocks: impl Iterator<Item = &'a Value>,
    pointer: &str,
) -> Option<String> {
    let parts: Vec<&str> = blocks.filter_map(|b| str_at(b, pointer)).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}

fn function_tool(schema: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": schema.name,
            "description": schema.description,
            "parameters": schema.to_json_schema(),
        }
    })
}

/// OpenAI chat completions envelope, shared by Azure OpenAI
#[derive(Debug, Clone)]
pub struct OpenAiFormat {
    tag: &'static str,
}

impl OpenAiFormat {
    /// Format registered under `openai`
    pub fn openai() -> Self {
        Self { tag: tags::OPENAI }
    }

    /// Format registered under `azure_openai`
    pub fn azure() -> Self {
        Self {
            tag: tags::AZURE_OPENAI,
        }
    }

    /// The message object; accepts a full completion or a bare message
    fn message<'a>(response: &'a Value) -> &'a Value {
        response.pointer("/choices/0/message").unwrap_or(response)
    }
}

impl ProviderFormat for OpenAiFormat {
    fn tag(&self) -> &str {
        self.tag
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        Self::message(response)
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        (
                            str_at(call, "/id"),
                            str_at(call, "/function/name").unwrap_or_default(),
                            serialized_arguments(call.pointer("/function/arguments")),
                        )
                    })
            })
            .map(requests)
            .unwrap_or_default()
    }

    fn tool_schema(&self, schema: &ToolSchema) -> Value {
        function_tool(schema)
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        str_at(Self::message(response), "/content").map(str::to_string)
    }

    fn assistant_message(&self, response: &Value) -> Option<Value> {
        let message = Self::message(response);
        message.get("role").map(|_| message.clone())
    }

    fn tool_result_messages(&self, results: &[ToolCallResult]) -> Vec<Value> {
        results
            .iter()
            .map(|r| {
                json!({
                    "role": "tool",
                    "tool_call_id": r.call_id,
                    "content": r.outcome.content_string(),
                })
            })
            .collect()
    }
}

/// Anthropic messages API envelope
#[derive(Debug, Clone, Default)]
pub struct AnthropicFormat;

impl ProviderFormat for AnthropicFormat {
    fn tag(&self) -> &str {
        tags::ANTHROPIC
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        response
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| str_at(b, "/type") == Some("tool_use"))
                    .map(|block| {
                        (
                            str_at(block, "/id"),
                            str_at(block, "/name").unwrap_or_default(),
                            serialized_arguments(block.get("input")),
                        )
                    })
            })
            .map(requests)
            .unwrap_or_default()
    }

    fn tool_schema(&self, schema: &ToolSchema) -> Value {
        json!({
            "name": schema.name,
            "description": schema.description,
            "input_schema": schema.to_json_schema(),
        })
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        let blocks = response.get("content")?.as_array()?;
        joined_text_blocks(
            blocks.iter().filter(|b| str_at(b, "/type") == Some("text")),
            "/text",
        )
    }

    fn assistant_message(&self, response: &Value) -> Option<Value> {
        response
            .get("content")
            .map(|content| json!({ "role": "assistant", "content": content }))
    }

    fn tool_result_messages(&self, results: &[ToolCallResult]) -> Vec<Value> {
        let blocks: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": r.call_id,
                    "content": r.outcome.content_string(),
                    "is_error": r.outcome.is_error(),
                })
            })
            .collect();
        vec![json!({ "role": "user", "content": blocks })]
    }
}

/// AWS Bedrock Converse API envelope
#[derive(Debug, Clone, Default)]
pub struct BedrockFormat;

impl ProviderFormat for BedrockFormat {
    fn tag(&self) -> &str {
        tags::BEDROCK
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        response
            .pointer("/output/message/content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("toolUse"))
                    .map(|call| {
                        (
                            str_at(call, "/toolUseId"),
                            str_at(call, "/name").unwrap_or_default(),
                            serialized_arguments(call.get("input")),
                        )
                    })
            })
            .map(requests)
            .unwrap_or_default()
    }

    fn tool_schema(&self, schema: &ToolSchema) -> Value {
        json!({
            "toolSpec": {
                "name": schema.name,
                "description": schema.description,
                "inputSchema": { "json": schema.to_json_schema() },
            }
        })
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        let blocks = response.pointer("/output/message/content")?.as_array()?;
        joined_text_blocks(blocks.iter(), "/text")
    }

    fn assistant_message(&self, response: &Value) -> Option<Value> {
        response.pointer("/output/message").cloned()
    }

    fn text_message(&self, role: &str, text: &str) -> Value {
        json!({ "role": role, "content": [{ "text": text }] })
    }

    fn tool_result_messages(&self, results: &[ToolCallResult]) -> Vec<Value> {
        let blocks: Vec<Value> = results
            .iter()
            .map(|r| {
                let content = match r.outcome.value() {
                    Some(value) if value.is_object() => json!([{ "json": value }]),
                    _ => json!([{ "text": r.outcome.content_string() }]),
                };
                json!({
                    "toolResult": {
                        "toolUseId": r.call_id,
                        "content": content,
                        "status": if r.outcome.is_error() { "error" } else { "success" },
                    }
                })
            })
            .collect();
        vec![json!({ "role": "user", "content": blocks })]
    }
}

/// Ollama chat API envelope
#[derive(Debug, Clone, Default)]
pub struct OllamaFormat;

impl OllamaFormat {
    fn message(response: &Value) -> &Value {
        response.get("message").unwrap_or(response)
    }
}

impl ProviderFormat for OllamaFormat {
    fn tag(&self) -> &str {
        tags::OLLAMA
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        Self::message(response)
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        (
                            str_at(call, "/id"),
                            str_at(call, "/function/name").unwrap_or_default(),
                            serialized_arguments(call.pointer("/function/arguments")),
                        )
                    })
            })
            .map(requests)
            .unwrap_or_default()
    }

    fn tool_schema(&self, schema: &ToolSchema) -> Value {
        function_tool(schema)
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        str_at(Self::message(response), "/content").map(str::to_string)
    }

    fn assistant_message(&self, response: &Value) -> Option<Value> {
        response.get("message").cloned()
    }

    fn tool_result_messages(&self, results: &[ToolCallResult]) -> Vec<Value> {
        results
            .iter()
            .map(|r| {
                json!({
                    "role": "tool",
                    "tool_name": r.tool_name,
                    "content": r.outcome.content_string(),
                })
            })
            .collect()
    }
}
