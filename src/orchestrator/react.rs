//! ReAct orchestrator pattern
//!
//! A reasoning agent is asked, step by step, what to do next. Each step
//! either finishes with a final answer or delegates a task to another agent
//! whose reply becomes the observation for the next step. The loop is bounded
//! by `max_steps`; failures inside a step become observations.

use crate::agent::Agent;
use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::memory::{MemoryRepository, ThreadLocks, ASSISTANT_SENDER, USER_SENDER};
use crate::orchestrator::{remember, resolve_with_fallback, Orchestrator, StreamCallback};
use crate::react::{
    reasoning_prompt, ActionRequest, Observation, ParsedThought, Scratchpad, ThoughtParser,
    UNPARSEABLE_ACTION,
};
use crate::registry::AgentRegistry;
use crate::types::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default step bound
pub const DEFAULT_MAX_STEPS: usize = 5;

/// Answer when the step bound is hit before any agent replied
pub const NO_ANSWER_MESSAGE: &str =
    "I could not reach a final answer within the allowed number of steps.";

/// Answer when cancelled before any agent replied
pub const CANCELLED_MESSAGE: &str = "The request was cancelled before an answer was reached.";

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The reasoning agent gave a final answer
    FinalAnswer,
    /// The step bound was reached
    MaxStepsExceeded,
    /// The context's cancellation token fired between steps
    Cancelled,
}

impl StopReason {
    /// snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinalAnswer => "final_answer",
            Self::MaxStepsExceeded => "max_steps_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of one ReAct call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReActOutcome {
    /// Final or best-effort answer
    pub answer: String,
    /// Every completed step
    pub steps: Scratchpad,
    /// How the loop ended
    pub stop: StopReason,
}

/// Bounded thought/action/observation loop
pub struct ReActOrchestrator {
    registry: Arc<AgentRegistry>,
    reasoning_agent: String,
    classifier: Option<Arc<dyn Classifier>>,
    default_agent: Option<String>,
    max_steps: usize,
    verbose: bool,
    memory: Option<Arc<dyn MemoryRepository>>,
    parser: ThoughtParser,
    locks: ThreadLocks,
}

/// Builder for [`ReActOrchestrator`]
pub struct ReActOrchestratorBuilder {
    registry: Arc<AgentRegistry>,
    reasoning_agent: String,
    classifier: Option<Arc<dyn Classifier>>,
    default_agent: Option<String>,
    max_steps: usize,
    verbose: bool,
    memory: Option<Arc<dyn MemoryRepository>>,
}

impl ReActOrchestratorBuilder {
    /// Resolve unknown action targets through a classifier before the default
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Agent used when an action names an unknown agent
    pub fn default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    /// Step bound (must be positive)
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Log every step at info level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Record the user message and final answer of each turn
    pub fn memory(mut self, memory: Arc<dyn MemoryRepository>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<ReActOrchestrator> {
        if self.max_steps == 0 {
            return Err(Error::config("ReAct max_steps must be positive"));
        }
        if self.reasoning_agent.trim().is_empty() {
            return Err(Error::config("ReAct reasoning agent name is empty"));
        }
        Ok(ReActOrchestrator {
            registry: self.registry,
            reasoning_agent: self.reasoning_agent,
            classifier: self.classifier,
            default_agent: self.default_agent,
            max_steps: self.max_steps,
            verbose: self.verbose,
            memory: self.memory,
            parser: ThoughtParser::new()?,
            locks: ThreadLocks::new(),
        })
    }
}

impl ReActOrchestrator {
    /// Start building an orchestrator driven by `reasoning_agent`
    pub fn builder(
        registry: Arc<AgentRegistry>,
        reasoning_agent: impl Into<String>,
    ) -> ReActOrchestratorBuilder {
        ReActOrchestratorBuilder {
            registry,
            reasoning_agent: reasoning_agent.into(),
            classifier: None,
            default_agent: None,
            max_steps: DEFAULT_MAX_STEPS,
            verbose: false,
            memory: None,
        }
    }

    /// Configured step bound
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run the loop and return the answer together with the scratchpad.
    ///
    /// Fails only when the reasoning agent is missing or reports a
    /// configuration defect; everything else ends as a step observation.
    #[instrument(
        skip(self, user_message, context),
        fields(reasoning_agent = %self.reasoning_agent)
    )]
    pub async fn run(
        &self,
        thread_id: &str,
        user_message: &str,
        context: &Context,
    ) -> Result<ReActOutcome> {
        let reasoner = self.registry.get(&self.reasoning_agent).ok_or_else(|| {
            Error::config(format!(
                "reasoning agent '{}' is not registered",
                self.reasoning_agent
            ))
        })?;

        let mut scratchpad = Scratchpad::new();
        while scratchpad.len() < self.max_steps {
            if context.is_cancelled() {
                debug!(steps = scratchpad.len(), "cancelled between steps");
                return Ok(self.conclude(scratchpad, StopReason::Cancelled));
            }

            let agents: Vec<_> = self
                .registry
                .list()
                .into_iter()
                .filter(|a| a.name != self.reasoning_agent)
                .collect();
            let prompt = reasoning_prompt(user_message, &agents, &scratchpad);

            let thought = match reasoner.handle_message(&prompt, thread_id, context).await {
                Ok(thought) => thought,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(error = %err, "reasoning step failed");
                    scratchpad.record(
                        String::new(),
                        None,
                        None,
                        Observation::error(format!("Reasoning failed: {err}")),
                    );
                    self.log_step(&scratchpad);
                    continue;
                }
            };

            match self.parser.parse(&thought) {
                ParsedThought::FinalAnswer(answer) => {
                    if self.verbose {
                        info!(steps = scratchpad.len(), "final answer reached");
                    }
                    return Ok(ReActOutcome {
                        answer,
                        steps: scratchpad,
                        stop: StopReason::FinalAnswer,
                    });
                }
                ParsedThought::Malformed(reason) => {
                    scratchpad.record(
                        thought,
                        None,
                        None,
                        Observation::error(format!("{UNPARSEABLE_ACTION}: {reason}")),
                    );
                }
                ParsedThought::Action(action) => {
                    let (resolved, observation) = self.act(&action, thread_id, context).await;
                    scratchpad.record(thought, Some(action), resolved, observation);
                }
            }
            self.log_step(&scratchpad);
        }

        warn!(max_steps = self.max_steps, "step bound reached without a final answer");
        Ok(self.conclude(scratchpad, StopReason::MaxStepsExceeded))
    }

    async fn act(
        &self,
        action: &ActionRequest,
        thread_id: &str,
        context: &Context,
    ) -> (Option<String>, Observation) {
        let agent = match self.resolve(action, thread_id, context).await {
            Ok(agent) => agent,
            Err(err) => {
                return (
                    None,
                    Observation::error(format!("No agent available for '{}': {err}", action.agent)),
                )
            }
        };

        let name = agent.name();
        match agent.handle_message(&action.task, thread_id, context).await {
            Ok(reply) => (Some(name), Observation::new(reply)),
            Err(err) => {
                warn!(agent = %name, error = %err, "acting agent failed");
                let observation = Observation::error(format!("Agent '{name}' failed: {err}"));
                (Some(name), observation)
            }
        }
    }

    async fn resolve(
        &self,
        action: &ActionRequest,
        thread_id: &str,
        context: &Context,
    ) -> Result<Arc<dyn Agent>> {
        // the reasoning agent never acts on its own actions
        let acting = |name: &str| name != self.reasoning_agent;

        let mut candidate = None;
        if acting(action.agent.as_str()) {
            if let Some(agent) = self.registry.get(&action.agent) {
                return Ok(agent);
            }
            candidate = Some(action.agent.clone());
        }

        if let Some(classifier) = &self.classifier {
            let agents: Vec<_> = self
                .registry
                .list()
                .into_iter()
                .filter(|a| acting(a.name.as_str()))
                .collect();
            match classifier
                .classify(&action.task, Some(thread_id), &agents, context)
                .await
            {
                Ok(Some(name)) if acting(name.as_str()) => candidate = Some(name),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "classification failed"),
            }
        }
        let default_agent = self.default_agent.as_deref().filter(|&d| acting(d));
        resolve_with_fallback(&self.registry, candidate.as_deref(), default_agent)
    }

    fn log_step(&self, scratchpad: &Scratchpad) {
        let Some(step) = scratchpad.steps().last() else {
            return;
        };
        if self.verbose {
            info!(
                step = step.index,
                thought = %step.thought.trim(),
                agent = ?step.resolved_agent,
                error = step.observation.is_error,
                observation = %step.observation.content,
                "ReAct step"
            );
        } else {
            debug!(step = step.index, error = step.observation.is_error, "ReAct step");
        }
    }

    fn conclude(&self, scratchpad: Scratchpad, stop: StopReason) -> ReActOutcome {
        let answer = match scratchpad.last_successful_observation() {
            Some(observation) => observation.content.clone(),
            None if stop == StopReason::Cancelled => CANCELLED_MESSAGE.to_string(),
            None => NO_ANSWER_MESSAGE.to_string(),
        };
        ReActOutcome {
            answer,
            steps: scratchpad,
            stop,
        }
    }
}

#[async_trait]
impl Orchestrator for ReActOrchestrator {
    fn name(&self) -> &str {
        "react"
    }

    #[instrument(
        skip(self, user_message, stream_callback, context),
        fields(orchestrator = "react")
    )]
    async fn orchestrate(
        &self,
        thread_id: &str,
        user_message: &str,
        stream_callback: Option<&StreamCallback<'_>>,
        context: &Context,
    ) -> Result<String> {
        let _turn = self.locks.acquire(thread_id).await;
        remember(self.memory.as_ref(), thread_id, USER_SENDER, user_message, None).await;

        let outcome = self.run(thread_id, user_message, context).await?;
        if let Some(on_chunk) = stream_callback {
            on_chunk(&outcome.answer);
        }

        let metadata = HashMap::from([
            ("agent".to_string(), json!(self.reasoning_agent)),
            ("steps".to_string(), json!(outcome.steps.len())),
            ("stop".to_string(), json!(outcome.stop.as_str())),
        ]);
        remember(
            self.memory.as_ref(),
            thread_id,
            ASSISTANT_SENDER,
            &outcome.answer,
            Some(metadata),
        )
        .await;
        Ok(outcome.answer)
    }
}
