//! End-to-end orchestration scenarios with scripted collaborators

use agent_orchestra::prelude::*;
use agent_orchestra::provider_tags;
use agent_orchestra::react::Observation;
use agent_orchestra::testing::{ChunkedAgent, ScriptedAgent, ScriptedChatModel, StaticAgent};
use agent_orchestra::{
    register_memory_tools, ChatAgentConfig, OrchestratorConfig, StopReason, ToolCallingAgent,
    ToolErrorKind, ToolOutcome,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn food_and_weather() -> Arc<AgentRegistry> {
    let registry = AgentRegistry::new();
    registry.register(Arc::new(StaticAgent::new(
        "food_agent",
        "restaurant recommendations",
        "Try Trattoria Luigi.",
    )));
    registry.register(Arc::new(StaticAgent::new(
        "weather_agent",
        "weather info",
        "Sunny and 24C.",
    )));
    Arc::new(registry)
}

fn router() -> Arc<ScriptedAgent> {
    Arc::new(ScriptedAgent::repeating("router", "food_agent"))
}

fn travel_router() -> Arc<ScriptedAgent> {
    Arc::new(ScriptedAgent::repeating("router", "travel_agent"))
}

#[tokio::test]
async fn simple_and_multi_agent_route_by_different_policies() {
    let registry = food_and_weather();
    let classifier = LlmClassifier::new(router());

    let picked = assert_ok!(
        classifier
            .classify("What's a good pasta place?", None, &registry.list(), &Context::new())
            .await
    );
    assert_eq!(picked.as_deref(), Some("food_agent"));

    let simple = SimpleOrchestrator::new(Arc::clone(&registry)).with_default_agent("weather_agent");
    let reply = assert_ok!(
        simple
            .orchestrate("t-1", "What's a good pasta place?", None, &Context::new())
            .await
    );
    assert_eq!(reply, "Sunny and 24C.");

    let multi = MultiAgentOrchestrator::new(registry, Arc::new(classifier))
        .with_default_agent("weather_agent");
    let reply = assert_ok!(
        multi
            .orchestrate("t-1", "What's a good pasta place?", None, &Context::new())
            .await
    );
    assert_eq!(reply, "Try Trattoria Luigi.");
}

#[tokio::test]
async fn multi_agent_never_picks_an_arbitrary_agent() {
    let registry = food_and_weather();
    let classifier = LlmClassifier::new(travel_router());
    let memory = Arc::new(EphemeralMemory::new());

    let with_default = MultiAgentOrchestrator::new(Arc::clone(&registry), Arc::new(classifier))
        .with_default_agent("weather_agent")
        .with_memory(memory.clone());
    let reply = assert_ok!(
        with_default
            .orchestrate("t-1", "Book me a flight", None, &Context::new())
            .await
    );
    assert_eq!(reply, "Sunny and 24C.");

    let summary = assert_ok!(memory.get_thread_summary("t-1").await);
    assert_eq!(summary, "user: Book me a flight\nassistant: Sunny and 24C.");

    let classifier = LlmClassifier::new(travel_router());
    let without_default = MultiAgentOrchestrator::new(registry, Arc::new(classifier));
    let result = without_default
        .orchestrate("t-2", "Book me a flight", None, &Context::new())
        .await;
    assert!(matches!(assert_err!(result), Error::NoAgentAvailable(_)));

    let degraded = without_default.respond("t-2", "Book me a flight", None, &Context::new()).await;
    assert_eq!(degraded, Error::no_agent("x").user_message());
}

#[tokio::test]
async fn stream_callback_may_borrow_caller_state() {
    let registry = food_and_weather();
    registry.register(Arc::new(ChunkedAgent::new(
        "storyteller",
        vec!["Once ", "upon ", "a time"],
    )));
    let config = assert_ok!(OrchestratorConfig::from_yaml("default_agent: storyteller"));
    let orchestrator: Arc<dyn Orchestrator> = assert_ok!(config.build(registry, None));

    let fragments = Mutex::new(Vec::new());
    let on_chunk = |chunk: &str| fragments.lock().push(chunk.to_string());
    let reply = orchestrator
        .respond("t-1", "Tell me a story", Some(&on_chunk), &Context::new())
        .await;

    assert_eq!(reply, "Once upon a time");
    assert_eq!(fragments.lock().as_slice(), ["Once ", "upon ", "a time"]);
}

#[tokio::test]
async fn react_terminates_without_final_answer() {
    let registry = food_and_weather();
    registry.register(Arc::new(ScriptedAgent::repeating(
        "planner",
        "Thought: ask again\nAction: weather_agent\nAction Input: Weather in Rome?",
    )));

    for max_steps in [1, 4, 10] {
        let orchestrator = assert_ok!(ReActOrchestrator::builder(Arc::clone(&registry), "planner")
            .max_steps(max_steps)
            .build());
        let outcome =
            assert_ok!(orchestrator.run("t-1", "Weather in Rome?", &Context::new()).await);
        assert_eq!(outcome.stop, StopReason::MaxStepsExceeded);
        assert_eq!(outcome.steps.len(), max_steps);
        assert_eq!(outcome.answer, "Sunny and 24C.");
    }
}

fn planner_script() -> Vec<String> {
    vec![
        "Thought: need a restaurant\nAction: food_agent\nAction Input: Pasta near the Pantheon"
            .to_string(),
        "Thought: hmm".to_string(),
        "Thought: and the weather\nAction: weather_agent\nAction Input: Rome tonight".to_string(),
        "Final Answer: Trattoria Luigi, and it will be sunny.".to_string(),
    ]
}

#[tokio::test]
async fn react_scratchpad_is_chronological_and_replayable() {
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let registry = food_and_weather();
        registry.register(Arc::new(ScriptedAgent::new("planner", planner_script())));
        let orchestrator =
            assert_ok!(ReActOrchestrator::builder(registry, "planner").max_steps(6).build());
        let outcome = orchestrator.run("t-1", "Dinner plans in Rome?", &Context::new()).await;
        outcomes.push(assert_ok!(outcome));
    }

    let first = &outcomes[0];
    assert_eq!(first.stop, StopReason::FinalAnswer);
    assert_eq!(first.answer, "Trattoria Luigi, and it will be sunny.");

    let steps = first.steps.steps();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps.iter().map(|s| s.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(steps[0].observation, Observation::new("Try Trattoria Luigi."));
    assert!(steps[1].action.is_none() && steps[1].observation.is_error);
    assert_eq!(steps[2].resolved_agent.as_deref(), Some("weather_agent"));

    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn tool_batch_failures_are_per_call() {
    let tools = ToolRegistry::new();
    assert_ok!(tools.register_tool(assert_ok!(agent_orchestra::tools::echo_tool())));

    let response = json!({
        "output": { "message": { "role": "assistant", "content": [
            { "toolUse": { "toolUseId": "a", "name": "echo", "input": { "message": "hi" } } },
            { "toolUse": { "toolUseId": "b", "name": "summon_dragon", "input": {} } }
        ]}}
    });
    let results = assert_ok!(tools.handle_tool_call(provider_tags::BEDROCK, &response).await);

    assert_eq!(results.len(), 2);
    assert_eq!(results.get("a"), Some(&ToolOutcome::Result(json!("Echo: hi"))));
    assert_eq!(
        results.get("b").and_then(ToolOutcome::error).map(|e| e.kind),
        Some(ToolErrorKind::NotFound)
    );

    assert!(matches!(
        assert_err!(tools.handle_tool_call("smoke_signals", &response).await),
        Error::UnsupportedProvider(_)
    ));
}

#[tokio::test]
async fn tool_calling_agent_reads_memory_through_tools() {
    let memory: Arc<dyn MemoryRepository> = Arc::new(EphemeralMemory::new());
    let tools = Arc::new(ToolRegistry::new());
    assert_ok!(register_memory_tools(&tools, Arc::clone(&memory)));

    let model = Arc::new(ScriptedChatModel::new(
        provider_tags::ANTHROPIC,
        vec![
            json!({ "content": [
                { "type": "text", "text": "Let me check." },
                {
                    "type": "tool_use",
                    "id": "tu_1",
                    "name": "get_thread_summary",
                    "input": { "thread_id": "t-1" }
                }
            ]}),
            json!({ "content": [{ "type": "text", "text": "You asked about pasta." }] }),
        ],
    ));
    let assistant = ToolCallingAgent::new(
        ChatAgentConfig::new("assistant", "general help").with_system_prompt("Be brief."),
        model.clone(),
    )
    .with_tools(tools)
    .with_memory(Arc::clone(&memory));

    let registry = Arc::new(AgentRegistry::new());
    registry.register(Arc::new(assistant));
    let orchestrator = SimpleOrchestrator::new(registry).with_default_agent("assistant");

    let reply = assert_ok!(
        orchestrator
            .orchestrate("t-1", "What did I ask?", None, &Context::new())
            .await
    );
    assert_eq!(reply, "You asked about pasta.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 3);
    let tool_turn = requests[1].messages.last().cloned().unwrap_or_default();
    assert_eq!(tool_turn["role"], "user");
    assert_eq!(tool_turn["content"][0]["type"], "tool_result");
    assert_eq!(tool_turn["content"][0]["tool_use_id"], "tu_1");
}
