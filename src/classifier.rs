//! Message classification strategies
//!
//! A classifier picks one agent name from a candidate set. It never applies
//! a default: an empty candidate set or an unusable judgment is reported as
//! `None` and the orchestrator decides what to do.

use crate::agent::{Agent, AgentInfo};
use crate::error::Result;
use crate::types::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Strategy selecting one agent for a message
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Pick an agent name from `available_agents`, or `None` when there is
    /// no usable match
    async fn classify(
        &self,
        message: &str,
        thread_id: Option<&str>,
        available_agents: &[AgentInfo],
        context: &Context,
    ) -> Result<Option<String>>;
}

/// Thread id used for the judgment call when the caller has none
const CLASSIFICATION_THREAD: &str = "classification";

/// Classifier that delegates the judgment to a reasoning agent
pub struct LlmClassifier {
    agent: Arc<dyn Agent>,
}

impl LlmClassifier {
    /// Create a classifier backed by `agent`
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    /// Name of the backing agent
    pub fn agent_name(&self) -> String {
        self.agent.name()
    }

    fn prompt(message: &str, candidates: &[&AgentInfo]) -> String {
        let listing = candidates
            .iter()
            .map(|a| format!("- {}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Select the agent best suited to handle the user message.\n\n\
             Available agents:\n{listing}\n\n\
             User message: {message}\n\n\
             Reply with the agent name only."
        )
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    #[instrument(
        skip(self, message, available_agents, context),
        fields(classifier = %self.agent_name())
    )]
    async fn classify(
        &self,
        message: &str,
        thread_id: Option<&str>,
        available_agents: &[AgentInfo],
        context: &Context,
    ) -> Result<Option<String>> {
        let own_name = self.agent.name();
        let candidates: Vec<&AgentInfo> = available_agents
            .iter()
            .filter(|a| a.name != own_name)
            .collect();
        if candidates.is_empty() {
            debug!("no candidate agents");
            return Ok(None);
        }

        let reply = self
            .agent
            .handle_message(
                &Self::prompt(message, &candidates),
                thread_id.unwrap_or(CLASSIFICATION_THREAD),
                context,
            )
            .await?;

        let selected = match_agent_name(&reply, &candidates);
        debug!(reply = %reply.trim(), selected = ?selected, "classified message");
        Ok(selected)
    }
}

/// Map a free-text judgment onto one candidate name.
///
/// Tries an exact (case-insensitive) match of the trimmed reply first, then a
/// single candidate whose name appears in the reply. Ambiguous or empty
/// replies give `None`.
pub fn match_agent_name(reply: &str, candidates: &[&AgentInfo]) -> Option<String> {
    let cleaned = reply
        .trim()
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(exact) = candidates
        .iter()
        .find(|a| a.name.to_lowercase() == cleaned)
    {
        return Some(exact.name.clone());
    }

    let lowered = reply.to_lowercase();
    let mut mentioned: Vec<&AgentInfo> = candidates
        .iter()
        .copied()
        .filter(|a| lowered.contains(&a.name.to_lowercase()))
        .collect();
    // "food_agent" also contains "agent"; keep the longest mention
    mentioned.sort_by_key(|a| std::cmp::Reverse(a.name.len()));
    match mentioned.as_slice() {
        [only] => Some(only.name.clone()),
        [first, second, ..] if first.name.len() > second.name.len() => {
            let longest = first.name.to_lowercase();
            mentioned
                .iter()
                .skip(1)
                .all(|a| longest.contains(&a.name.to_lowercase()))
                .then(|| first.name.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{FailingAgent, StaticAgent};

    fn agents() -> Vec<AgentInfo> {
        vec![
            AgentInfo::new("food_agent", "restaurant recommendations", "ChatAgent"),
            AgentInfo::new("weather_agent", "weather info", "ChatAgent"),
        ]
    }

    fn refs(agents: &[AgentInfo]) -> Vec<&AgentInfo> {
        agents.iter().collect()
    }

    #[tokio::test]
    async fn test_classify_returns_matching_agent() {
        let judge = Arc::new(StaticAgent::new("router", "routes", "food_agent"));
        let classifier = LlmClassifier::new(judge);
        let selected = classifier
            .classify("What's a good pasta place?", None, &agents(), &Context::new())
            .await
            .unwrap();
        assert_eq!(selected.as_deref(), Some("food_agent"));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_none() {
        let judge = Arc::new(StaticAgent::new("router", "routes", "food_agent"));
        let classifier = LlmClassifier::new(judge);
        let selected = classifier
            .classify("anything", Some("t-1"), &[], &Context::new())
            .await
            .unwrap();
        assert_eq!(selected, None);
    }

    #[tokio::test]
    async fn test_classifier_excludes_itself() {
        let judge = Arc::new(StaticAgent::new("router", "routes", "router"));
        let classifier = LlmClassifier::new(judge);
        let mut candidates = agents();
        candidates.push(AgentInfo::new("router", "routes", "ChatAgent"));
        let selected = classifier
            .classify("hi", None, &candidates, &Context::new())
            .await
            .unwrap();
        assert_eq!(selected, None);
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let classifier = LlmClassifier::new(Arc::new(FailingAgent::new("router", "model offline")));
        let result = classifier
            .classify("hi", None, &agents(), &Context::new())
            .await;
        assert!(matches!(result, Err(Error::Agent(_))));
    }

    #[test]
    fn test_match_tolerates_quotes_and_case() {
        let agents = agents();
        assert_eq!(
            match_agent_name("  'Weather_Agent'. ", &refs(&agents)).as_deref(),
            Some("weather_agent")
        );
        assert_eq!(
            match_agent_name("I would pick food_agent for this.", &refs(&agents)).as_deref(),
            Some("food_agent")
        );
    }

    #[test]
    fn test_match_rejects_unknown_and_ambiguous() {
        let agents = agents();
        assert_eq!(match_agent_name("travel_agent", &refs(&agents)), None);
        assert_eq!(match_agent_name("", &refs(&agents)), None);
        assert_eq!(
            match_agent_name("either food_agent or weather_agent", &refs(&agents)),
            None
        );
    }

    #[test]
    fn test_match_prefers_longest_nested_name() {
        let agents = vec![
            AgentInfo::new("agent", "generic", "ChatAgent"),
            AgentInfo::new("food_agent", "food", "ChatAgent"),
        ];
        assert_eq!(
            match_agent_name("use the food_agent please", &refs(&agents)).as_deref(),
            Some("food_agent")
        );
    }
}
