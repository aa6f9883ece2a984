//! Memory operations exposed as tools
//!
//! Lets tool-calling agents read and write conversation history through the
//! same registry as every other tool.

use crate::error::{Error, Result};
use crate::memory::MemoryRepository;
use crate::tool_registry::ToolRegistry;
use crate::tools::{BaseTool, ToolArgs};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of messages returned by `get_last_n_messages`
pub const DEFAULT_LAST_N: usize = 5;

fn str_arg(tool: &str, args: &ToolArgs, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::tool_invocation(tool, format!("missing '{key}'")))
}

fn store_message_tool(memory: Arc<dyn MemoryRepository>) -> Result<BaseTool> {
    BaseTool::builder("store_message")
        .description("Store a message in a conversation thread")
        .parameter("thread_id", "string", "The conversation thread to append to")
        .parameter("sender", "string", "Who wrote the message")
        .parameter("content", "string", "The message text")
        .parameter("metadata", "object", "Optional extra data stored with the message")
        .required(["thread_id", "sender", "content"])
        .function(move |args: ToolArgs| {
            let memory = Arc::clone(&memory);
            async move {
                let thread_id = str_arg("store_message", &args, "thread_id")?;
                let sender = str_arg("store_message", &args, "sender")?;
                let content = str_arg("store_message", &args, "content")?;
                let metadata = args.get("metadata").and_then(Value::as_object).map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<HashMap<_, _>>()
                });
                memory
                    .store_message(&thread_id, &sender, &content, metadata)
                    .await?;
                Ok(json!({ "stored": true }))
            }
        })
        .build()
}

fn last_messages_tool(memory: Arc<dyn MemoryRepository>) -> Result<BaseTool> {
    BaseTool::builder("get_last_n_messages")
        .description("Get the most recent messages of a conversation thread, oldest first")
        .parameter("thread_id", "string", "The conversation thread to read")
        .parameter("n", "integer", "How many messages to return")
        .required(["thread_id"])
        .function(move |args: ToolArgs| {
            let memory = Arc::clone(&memory);
            async move {
                let thread_id = str_arg("get_last_n_messages", &args, "thread_id")?;
                let n = args
                    .get("n")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_LAST_N);
                let messages = memory.get_last_n_messages(&thread_id, n).await?;
                Ok(json!(messages
                    .iter()
                    .map(|m| json!({
                        "sender": m.sender,
                        "content": m.content,
                        "timestamp": m.timestamp.to_rfc3339(),
                    }))
                    .collect::<Vec<_>>()))
            }
        })
        .build()
}

fn thread_summary_tool(memory: Arc<dyn MemoryRepository>) -> Result<BaseTool> {
    BaseTool::builder("get_thread_summary")
        .description("Get a text summary of a conversation thread")
        .parameter("thread_id", "string", "The conversation thread to summarize")
        .required(["thread_id"])
        .function(move |args: ToolArgs| {
            let memory = Arc::clone(&memory);
            async move {
                let thread_id = str_arg("get_thread_summary", &args, "thread_id")?;
                Ok(Value::String(memory.get_thread_summary(&thread_id).await?))
            }
        })
        .build()
}

/// Register `store_message`, `get_last_n_messages` and `get_thread_summary`
/// backed by `memory`
pub fn register_memory_tools(
    registry: &ToolRegistry,
    memory: Arc<dyn MemoryRepository>,
) -> Result<()> {
    registry.register_tool(store_message_tool(Arc::clone(&memory))?)?;
    registry.register_tool(last_messages_tool(Arc::clone(&memory))?)?;
    registry.register_tool(thread_summary_tool(memory)?)?;
    Ok(())
}
