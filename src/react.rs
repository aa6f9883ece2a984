//! ReAct (Reasoning and Acting) scratchpad and thought grammar
//!
//! Grammar version 1, matched case-insensitively at the start of a line:
//!
//! ```text
//! Final Answer: <answer, to the end of the thought>
//! ```
//!
//! or
//!
//! ```text
//! Action: <agent name>
//! Action Input: <task, to the end of the thought>
//! ```
//!
//! A final answer takes precedence over an action in the same thought.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Version of the thought grammar understood by [`ThoughtParser`]
pub const REACT_PROTOCOL_VERSION: u32 = 1;

/// Marker that ends the loop
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Observation recorded when a thought has no usable action
pub const UNPARSEABLE_ACTION: &str = "Could not parse action";

/// Delegation extracted from a thought
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Agent the reasoning agent asked for
    pub agent: String,
    /// Task text handed to that agent
    pub task: String,
}

/// What a thought asks the loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedThought {
    /// Stop with this answer
    FinalAnswer(String),
    /// Delegate a task to an agent
    Action(ActionRequest),
    /// Neither form was usable; carries the reason
    Malformed(String),
}

/// Parser for the v1 thought grammar
#[derive(Debug, Clone)]
pub struct ThoughtParser {
    final_answer: Regex,
    action: Regex,
    action_input: Regex,
}

impl ThoughtParser {
    /// Compile the grammar
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::config(format!("invalid ReAct grammar: {e}")))
        };
        Ok(Self {
            final_answer: compile(r"(?im)^[ \t]*final[ \t]+answer[ \t]*:")?,
            action: compile(r"(?im)^[ \t]*action[ \t]*:[ \t]*(.*)$")?,
            action_input: compile(r"(?ims)^[ \t]*action[ \t]+input[ \t]*:(.*)\z")?,
        })
    }

    /// Classify a thought
    pub fn parse(&self, thought: &str) -> ParsedThought {
        if let Some(marker) = self.final_answer.find(thought) {
            let answer = thought[marker.end()..].trim();
            if answer.is_empty() {
                return ParsedThought::Malformed("empty final answer".to_string());
            }
            return ParsedThought::FinalAnswer(answer.to_string());
        }

        let agent = self
            .action
            .captures(thought)
            .and_then(|c| c.get(1))
            .map(|m| clean_agent_name(m.as_str()))
            .unwrap_or_default();
        if agent.is_empty() {
            return ParsedThought::Malformed("missing 'Action:' line".to_string());
        }

        let task = self
            .action_input
            .captures(thought)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if task.is_empty() {
            return ParsedThought::Malformed("missing 'Action Input:' line".to_string());
        }

        ParsedThought::Action(ActionRequest { agent, task })
    }
}

fn clean_agent_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '[' | ']' | '.' | ','))
        .trim()
        .to_string()
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Reply text, or a description of what went wrong
    pub content: String,
    /// Whether this observation describes a failure
    pub is_error: bool,
}

impl Observation {
    /// Create an observation from an agent reply
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error observation
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// One thought/action/observation triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based step number
    pub index: usize,
    /// Raw reasoning agent output
    pub thought: String,
    /// Parsed action, if the thought had one
    pub action: Option<ActionRequest>,
    /// Agent that actually ran the task after fallback
    pub resolved_agent: Option<String>,
    /// What came back
    pub observation: Observation,
}

/// Append-only log of the steps taken in one ReAct call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scratchpad {
    steps: Vec<Step>,
}

impl Scratchpad {
    /// Create an empty scratchpad
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; its index is assigned here
    pub fn record(
        &mut self,
        thought: impl Into<String>,
        action: Option<ActionRequest>,
        resolved_agent: Option<String>,
        observation: Observation,
    ) -> &Step {
        let index = self.steps.len() + 1;
        self.steps.push(Step {
            index,
            thought: thought.into(),
            action,
            resolved_agent,
            observation,
        });
        &self.steps[index - 1]
    }

    /// Steps in chronological order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Latest observation that is not an error
    pub fn last_successful_observation(&self) -> Option<&Observation> {
        self.steps
            .iter()
            .rev()
            .map(|s| &s.observation)
            .find(|o| !o.is_error)
    }

    /// Render the scratchpad for the reasoning prompt
    pub fn render(&self) -> String {
        let mut output = String::new();
        for step in &self.steps {
            output.push_str(&format!("=== Step {} ===\n", step.index));
            output.push_str(&format!("Thought: {}\n", step.thought.trim()));
            if let Some(action) = &step.action {
                output.push_str(&format!("Action: {}\n", action.agent));
                output.push_str(&format!("Action Input: {}\n", action.task));
            }
            output.push_str(&format!("Observation: {}\n\n", step.observation.content));
        }
        output
    }
}

/// Prompt for one reasoning step: the agents on offer, the grammar, the
/// user's request and everything observed so far
pub fn reasoning_prompt(
    user_message: &str,
    agents: &[crate::agent::AgentInfo],
    scratchpad: &Scratchpad,
) -> String {
    let listing = agents
        .iter()
        .map(|a| format!("- {}: {}", a.name, a.description))
        .collect::<Vec<_>>()
        .join("\n");
    let history = if scratchpad.is_empty() {
        "(no steps yet)".to_string()
    } else {
        scratchpad.render()
    };

    format!(
        "You solve the user's request by delegating tasks to agents.\n\n\
         Available agents:\n{listing}\n\n\
         To delegate, reply with:\n\
         Thought: <your reasoning>\n\
         Action: <agent name>\n\
         Action Input: <task for the agent>\n\n\
         When you can answer, reply with:\n\
         {FINAL_ANSWER_MARKER} <answer>\n\n\
         User request: {user_message}\n\n\
         Previous steps:\n{history}"
    )
}
