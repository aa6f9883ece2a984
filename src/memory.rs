//! Conversation memory collaborator
//!
//! Threads are ordered, append-only message logs keyed by an opaque
//! thread id. Orchestrators write the inbound message and the reply of every
//! turn; agents may read recent history for context.

use crate::error::Result;
use crate::types::MessageId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Sender label for inbound user messages
pub const USER_SENDER: &str = "user";

/// Sender label for orchestrator replies
pub const ASSISTANT_SENDER: &str = "assistant";

/// One entry in a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: MessageId,
    /// Who wrote the message (e.g. "user", "assistant")
    pub sender: String,
    /// Message text
    pub content: String,
    /// When the message was stored
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata (e.g. the agent that produced a reply)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Per-thread message store.
///
/// Writes to one thread are applied in call order. `get_last_n_messages`
/// returns the newest `n` messages oldest-first.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Append a message to a thread, creating the thread if needed
    async fn store_message(
        &self,
        thread_id: &str,
        sender: &str,
        content: &str,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<()>;

    /// The newest `n` messages of a thread in chronological order
    async fn get_last_n_messages(&self, thread_id: &str, n: usize) -> Result<Vec<Message>>;

    /// Text summary of a thread
    async fn get_thread_summary(&self, thread_id: &str) -> Result<String>;
}

type Thread = Arc<Mutex<Vec<Message>>>;

/// In-process memory that lives as long as the value does
#[derive(Debug, Default)]
pub struct EphemeralMemory {
    threads: DashMap<String, Thread>,
}

impl EphemeralMemory {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn thread(&self, thread_id: &str) -> Thread {
        Arc::clone(
            self.threads
                .entry(thread_id.to_string())
                .or_default()
                .value(),
        )
    }

    fn existing(&self, thread_id: &str) -> Option<Thread> {
        self.threads.get(thread_id).map(|t| Arc::clone(t.value()))
    }

    /// Every message of a thread, oldest first
    pub async fn messages(&self, thread_id: &str) -> Vec<Message> {
        match self.existing(thread_id) {
            Some(thread) => thread.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Ids of threads that have been written to
    pub fn thread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop a thread. Returns true if it existed.
    pub fn clear_thread(&self, thread_id: &str) -> bool {
        self.threads.remove(thread_id).is_some()
    }
}

#[async_trait]
impl MemoryRepository for EphemeralMemory {
    async fn store_message(
        &self,
        thread_id: &str,
        sender: &str,
        content: &str,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<()> {
        let message = Message::new(sender, content).with_metadata(metadata.unwrap_or_default());
        self.thread(thread_id).lock().await.push(message);
        Ok(())
    }

    async fn get_last_n_messages(&self, thread_id: &str, n: usize) -> Result<Vec<Message>> {
        let Some(thread) = self.existing(thread_id) else {
            return Ok(Vec::new());
        };
        let messages = thread.lock().await;
        let start = messages.len().saturating_sub(n);
        Ok(messages[start..].to_vec())
    }

    async fn get_thread_summary(&self, thread_id: &str) -> Result<String> {
        let messages = self.messages(thread_id).await;
        Ok(summarize(&messages))
    }
}

/// One `sender: content` line per message
pub fn summarize(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-thread turn locks.
///
/// Holding the guard for a thread id keeps other turns on that thread out
/// until it is dropped; different threads never contend. An entry lives only
/// while some turn holds or waits for it.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ThreadLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`
    pub async fn acquire(&self, thread_id: &str) -> ThreadTurn<'_> {
        let lock = Arc::clone(self.locks.entry(thread_id.to_string()).or_default().value());
        let guard = lock.lock_owned().await;
        ThreadTurn {
            locks: &self.locks,
            thread_id: thread_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of threads with a held or awaited lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no thread is locked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one thread, released on drop
#[derive(Debug)]
pub struct ThreadTurn<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the table's own reference is the last one once nobody holds or waits
        self.locks
            .remove_if(&self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_last_n_is_newest_oldest_first() {
        let memory = EphemeralMemory::new();
        for i in 1..=5 {
            memory
                .store_message("t-1", "user", &format!("m{i}"), None)
                .await
                .unwrap();
        }

        let last: Vec<_> = memory
            .get_last_n_messages("t-1", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(last, vec!["m3", "m4", "m5"]);

        assert_eq!(memory.get_last_n_messages("t-1", 50).await.unwrap().len(), 5);
        assert!(memory.get_last_n_messages("t-1", 0).await.unwrap().is_empty());
        assert!(memory.get_last_n_messages("missing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let memory = EphemeralMemory::new();
        memory.store_message("a", "user", "hello a", None).await.unwrap();
        memory.store_message("b", "user", "hello b", None).await.unwrap();

        assert_eq!(memory.messages("a").await.len(), 1);
        assert_eq!(memory.thread_ids(), vec!["a", "b"]);
        assert!(memory.clear_thread("a"));
        assert!(memory.messages("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_metadata() {
        let memory = EphemeralMemory::new();
        memory.store_message("t", "user", "pasta?", None).await.unwrap();
        let metadata = HashMap::from([("agent".to_string(), json!("food_agent"))]);
        memory
            .store_message("t", "assistant", "try Luigi's", Some(metadata))
            .await
            .unwrap();

        let summary = memory.get_thread_summary("t").await.unwrap();
        assert_eq!(summary, "user: pasta?\nassistant: try Luigi's");
        let messages = memory.messages("t").await;
        assert_eq!(messages[1].metadata["agent"], "food_agent");
        assert!(messages[0].timestamp <= messages[1].timestamp);
        assert_eq!(memory.get_thread_summary("empty").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_thread_lock_serializes_same_thread() {
        let locks = Arc::new(ThreadLocks::new());
        let memory = Arc::new(EphemeralMemory::new());

        let guard = locks.acquire("t").await;
        let task = {
            let locks = Arc::clone(&locks);
            let memory = Arc::clone(&memory);
            tokio::spawn(async move {
                let _guard = locks.acquire("t").await;
                memory.store_message("t", "user", "second", None).await.unwrap();
            })
        };

        // a different thread id is not blocked
        let _other = locks.acquire("other").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        memory.store_message("t", "user", "first", None).await.unwrap();
        drop(guard);
        task.await.unwrap();

        let order: Vec<_> = memory.messages("t").await.into_iter().map(|m| m.content).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_finished_turns_release_their_entry() {
        let locks = ThreadLocks::new();
        for i in 0..1_000 {
            let _turn = locks.acquire(&format!("t-{i}")).await;
        }
        assert!(locks.is_empty());

        let held = locks.acquire("busy").await;
        let _other = locks.acquire("idle").await;
        assert_eq!(locks.len(), 2);
        drop(held);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(ThreadLocks::new());
        let held = locks.acquire("t").await;
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _turn = locks.acquire("t").await;
                locks.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(locks.is_empty());
    }
}
