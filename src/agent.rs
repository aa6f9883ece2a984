//! Agent capability interface

use crate::error::Result;
use crate::types::Context;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Lazy, finite, non-restartable sequence of reply fragments
pub type AgentStream = BoxStream<'static, Result<String>>;

/// Immutable snapshot describing a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique registry key
    pub name: String,
    /// Free text used for classification
    pub description: String,
    /// Type tag (e.g. "ChatAgent", "RemoteAgent")
    pub agent_type: String,
}

impl AgentInfo {
    /// Create a new agent info snapshot
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent_type: agent_type.into(),
        }
    }
}

/// Capability turning a message (plus context) into a reply.
///
/// Implementations own their model clients, prompts and tools; the
/// orchestration engine only ever talks to them through this trait.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name, description and type tag of this agent
    fn info(&self) -> AgentInfo;

    /// Registry key, shorthand for `info().name`
    fn name(&self) -> String {
        self.info().name
    }

    /// Produce a complete reply
    async fn handle_message(&self, message: &str, thread_id: &str, context: &Context)
        -> Result<String>;

    /// Produce a reply as a stream of fragments.
    ///
    /// The default yields the `handle_message` reply as a single chunk.
    async fn handle_message_stream(
        &self,
        message: &str,
        thread_id: &str,
        context: &Context,
    ) -> Result<AgentStream> {
        let reply = self.handle_message(message, thread_id, context).await?;
        Ok(stream::once(async move { Ok(reply) }).boxed())
    }
}

/// Drive an agent's stream to completion, forwarding each fragment to
/// `on_chunk` and returning the concatenated reply.
pub async fn collect_stream(
    mut chunks: AgentStream,
    on_chunk: &(dyn Fn(&str) + Send + Sync),
) -> Result<String> {
    let mut reply = String::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        on_chunk(&chunk);
        reply.push_str(&chunk);
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{ChunkedAgent, StaticAgent};
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_default_stream_yields_single_chunk() {
        let agent = StaticAgent::new("echo", "echoes", "hello world");
        let seen = Mutex::new(Vec::new());
        let stream = agent
            .handle_message_stream("hi", "t-1", &Context::new())
            .await
            .unwrap();
        let reply = collect_stream(stream, &|c| seen.lock().push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(reply, "hello world");
        assert_eq!(seen.lock().as_slice(), ["hello world"]);
    }

    #[tokio::test]
    async fn test_collect_stream_concatenates_chunks() {
        let agent = ChunkedAgent::new("chunky", vec!["Hel", "lo", "!"]);
        let seen = Mutex::new(Vec::new());
        let stream = agent
            .handle_message_stream("hi", "t-1", &Context::new())
            .await
            .unwrap();
        let reply = collect_stream(stream, &|c| seen.lock().push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(reply, "Hello!");
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_mid_stream_error() {
        let chunks: AgentStream = stream::iter(vec![
            Ok("partial".to_string()),
            Err(Error::agent("connection reset")),
        ])
        .boxed();
        let result = collect_stream(chunks, &|_| {}).await;
        assert!(matches!(result, Err(Error::Agent(_))));
    }
}
