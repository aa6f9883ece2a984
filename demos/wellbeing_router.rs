//! Classifier routing across specialist agents with shared thread memory
//!
//! Runs offline: the specialists reply with canned text and the router picks
//! an agent by keyword, standing in for LLM-backed agents.
//!
//! ```text
//! RUST_LOG=debug cargo run --example wellbeing_router
//! ```

use agent_orchestra::prelude::*;
use agent_orchestra::testing::StaticAgent;
use agent_orchestra::{init_tracing, LogFormat};
use async_trait::async_trait;
use std::sync::Arc;

const ROUTES: &[(&[&str], &str)] = &[
    (&["anxious", "stress", "panic", "breathe"], "coping_agent"),
    (&["private", "confidential", "data"], "privacy_agent"),
    (&["career", "job", "burnout"], "advisory_agent"),
    (&["helpline", "near me", "local"], "local_support_agent"),
];

/// Routes by keywords found in the user message of a classification prompt
struct KeywordRouter;

#[async_trait]
impl Agent for KeywordRouter {
    fn info(&self) -> AgentInfo {
        AgentInfo::new("classifier", "routes messages to a specialist", "ClassifierAgent")
    }

    async fn handle_message(
        &self,
        message: &str,
        _thread_id: &str,
        _context: &Context,
    ) -> Result<String> {
        let user_message = message
            .lines()
            .find_map(|line| line.strip_prefix("User message: "))
            .unwrap_or(message)
            .to_lowercase();
        let choice = ROUTES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| user_message.contains(k)))
            .map(|(_, agent)| *agent)
            .unwrap_or("none");
        Ok(choice.to_string())
    }
}

fn specialists() -> Vec<StaticAgent> {
    vec![
        StaticAgent::new(
            "active_listening_agent",
            "Engages in active listening and emotional reflection",
            "That sounds like a lot to carry. What has been weighing on you most?",
        ),
        StaticAgent::new(
            "coping_agent",
            "Evidence-based coping strategies and resilience exercises",
            "Let's try box breathing: in for 4, hold for 4, out for 4, hold for 4.",
        ),
        StaticAgent::new(
            "advisory_agent",
            "Multidisciplinary advice from psychology, wellness and career coaching",
            "Burnout often signals a mismatch between load and recovery. Let's map both.",
        ),
        StaticAgent::new(
            "privacy_agent",
            "Confidentiality and privacy guidance",
            "Nothing you share here is stored beyond this conversation.",
        ),
        StaticAgent::new(
            "local_support_agent",
            "Local mental health resources and crisis helplines",
            "Here are helplines and support groups in your area.",
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(LogFormat::Pretty)?;

    let registry = Arc::new(AgentRegistry::new());
    for agent in specialists() {
        registry.register(Arc::new(agent));
    }
    let classifier = LlmClassifier::new(Arc::new(KeywordRouter));
    let memory = Arc::new(EphemeralMemory::new());
    let orchestrator = MultiAgentOrchestrator::new(Arc::clone(&registry), Arc::new(classifier))
        .with_default_agent("active_listening_agent")
        .with_memory(memory.clone());

    println!("=== Wellbeing router ===");
    println!("{} specialists registered\n", registry.len());

    let thread_id = "session-1";
    let turns = [
        "I feel anxious before every meeting",
        "Is what I tell you kept confidential?",
        "I think my job is burning me out",
        "I just had a rough week",
    ];
    for message in turns {
        let reply = orchestrator
            .respond(thread_id, message, None, &Context::new())
            .await;
        println!("user:      {message}");
        println!("assistant: {reply}\n");
    }

    println!("=== Thread summary ===");
    println!("{}", memory.get_thread_summary(thread_id).await?);
    Ok(())
}
