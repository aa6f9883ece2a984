//! Orchestrator configuration
//!
//! Selects and parameterizes an orchestrator from YAML, optionally layered
//! with `AGENT_ORCHESTRA__*` environment variables (`__` separates nested
//! keys, e.g. `AGENT_ORCHESTRA__REACT__MAX_STEPS=8`).

use crate::classifier::{Classifier, LlmClassifier};
use crate::error::{Error, Result};
use crate::memory::MemoryRepository;
use crate::orchestrator::react::DEFAULT_MAX_STEPS;
use crate::orchestrator::{
    MultiAgentOrchestrator, Orchestrator, ReActOrchestrator, SimpleOrchestrator,
};
use crate::registry::AgentRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Environment variable prefix for [`OrchestratorConfig::load`]
pub const ENV_PREFIX: &str = "AGENT_ORCHESTRA";

/// Top-level orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pattern type (simple, multi_agent, react)
    #[serde(default)]
    pub pattern: PatternType,
    /// Fallback agent
    #[serde(default)]
    pub default_agent: Option<String>,
    /// Registered agent backing the LLM classifier
    #[serde(default)]
    pub classifier_agent: Option<String>,
    /// ReAct loop settings
    #[serde(default)]
    pub react: ReActSettings,
    /// Whether turns are recorded in the memory passed to `build`
    #[serde(default = "default_true")]
    pub record_turns: bool,
}

/// Supported pattern types
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// [`SimpleOrchestrator`]
    #[default]
    Simple,
    /// [`MultiAgentOrchestrator`]
    MultiAgent,
    /// [`ReActOrchestrator`]
    React,
}

/// ReAct loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReActSettings {
    /// Registered agent producing thoughts
    #[serde(default)]
    pub reasoning_agent: Option<String>,
    /// Step bound
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Log every step at info level
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ReActSettings {
    fn default() -> Self {
        Self {
            reasoning_agent: None,
            max_steps: DEFAULT_MAX_STEPS,
            verbose: false,
        }
    }
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pattern: PatternType::default(),
            default_agent: None,
            classifier_agent: None,
            react: ReActSettings::default(),
            record_turns: true,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Layer defaults, an optional YAML file and `AGENT_ORCHESTRA__*`
    /// environment variables (a `.env` file is read first if present)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that do not need a registry
    pub fn validate(&self) -> Result<()> {
        if self.react.max_steps == 0 {
            return Err(Error::config("react.max_steps must be positive"));
        }
        match self.pattern {
            PatternType::MultiAgent if self.classifier_agent.is_none() => Err(Error::config(
                "multi_agent pattern requires classifier_agent",
            )),
            PatternType::React if self.react.reasoning_agent.is_none() => Err(Error::config(
                "react pattern requires react.reasoning_agent",
            )),
            _ => Ok(()),
        }
    }

    /// Get the pattern type
    pub fn pattern_type(&self) -> PatternType {
        self.pattern
    }

    /// Construct the configured orchestrator over `registry`
    pub fn build(
        &self,
        registry: Arc<AgentRegistry>,
        memory: Option<Arc<dyn MemoryRepository>>,
    ) -> Result<Arc<dyn Orchestrator>> {
        self.validate()?;
        let memory = memory.filter(|_| self.record_turns);

        match self.pattern {
            PatternType::Simple => {
                let mut orchestrator = SimpleOrchestrator::new(registry);
                if let Some(default) = &self.default_agent {
                    orchestrator = orchestrator.with_default_agent(default);
                }
                Ok(Arc::new(orchestrator))
            }
            PatternType::MultiAgent => {
                let classifier = self.classifier(&registry)?.ok_or_else(|| {
                    Error::config("multi_agent pattern requires classifier_agent")
                })?;
                let mut orchestrator = MultiAgentOrchestrator::new(registry, classifier);
                if let Some(default) = &self.default_agent {
                    orchestrator = orchestrator.with_default_agent(default);
                }
                if let Some(memory) = memory {
                    orchestrator = orchestrator.with_memory(memory);
                }
                Ok(Arc::new(orchestrator))
            }
            PatternType::React => {
                let reasoning_agent = self.react.reasoning_agent.as_deref().ok_or_else(|| {
                    Error::config("react pattern requires react.reasoning_agent")
                })?;
                if !registry.contains(reasoning_agent) {
                    return Err(Error::config(format!(
                        "reasoning agent '{reasoning_agent}' is not registered"
                    )));
                }

                let classifier = self.classifier(&registry)?;
                let mut builder = ReActOrchestrator::builder(Arc::clone(&registry), reasoning_agent)
                    .max_steps(self.react.max_steps)
                    .verbose(self.react.verbose);
                if let Some(classifier) = classifier {
                    builder = builder.classifier(classifier);
                }
                if let Some(default) = &self.default_agent {
                    builder = builder.default_agent(default);
                }
                if let Some(memory) = memory {
                    builder = builder.memory(memory);
                }
                Ok(Arc::new(builder.build()?))
            }
        }
    }

    fn classifier(&self, registry: &AgentRegistry) -> Result<Option<Arc<dyn Classifier>>> {
        let Some(name) = &self.classifier_agent else {
            return Ok(None);
        };
        let agent = registry
            .get(name)
            .ok_or_else(|| Error::config(format!("classifier agent '{name}' is not registered")))?;
        Ok(Some(Arc::new(LlmClassifier::new(agent))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::EphemeralMemory;
    use crate::testing::StaticAgent;
    use crate::types::Context;
    use std::io::Write;

    fn registry() -> Arc<AgentRegistry> {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(StaticAgent::new("router", "routes messages", "food_agent")));
        registry.register(Arc::new(StaticAgent::new(
            "food_agent",
            "restaurant recommendations",
            "try Luigi's",
        )));
        registry.register(Arc::new(StaticAgent::new("weather_agent", "weather info", "sunny")));
        registry.register(Arc::new(StaticAgent::new("planner", "plans", "Final Answer: planned")));
        Arc::new(registry)
    }

    #[test]
    fn test_parse_react_config() {
        let yaml = r#"
pattern: react
default_agent: weather_agent
react:
  reasoning_agent: planner
  max_steps: 8
  verbose: true
"#;
        let config = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.pattern_type(), PatternType::React);
        assert_eq!(config.react.max_steps, 8);
        assert!(config.react.verbose);
        assert!(config.record_turns);
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::from_yaml("default_agent: weather_agent").unwrap();
        assert_eq!(config.pattern, PatternType::Simple);
        assert_eq!(config.react.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_validation_errors() {
        for yaml in [
            "pattern: multi_agent",
            "pattern: react",
            "react:\n  max_steps: 0",
            "pattern: round_robin",
        ] {
            assert!(
                matches!(OrchestratorConfig::from_yaml(yaml), Err(Error::Config(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn test_load_layers_file_and_env() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "pattern: react\nreact:\n  reasoning_agent: planner\n  max_steps: 4"
        )
        .unwrap();

        std::env::set_var("AGENT_ORCHESTRA__REACT__MAX_STEPS", "9");
        let config = OrchestratorConfig::load(Some(file.path()));
        std::env::remove_var("AGENT_ORCHESTRA__REACT__MAX_STEPS");

        let config = config.unwrap();
        assert_eq!(config.pattern, PatternType::React);
        assert_eq!(config.react.reasoning_agent.as_deref(), Some("planner"));
        assert_eq!(config.react.max_steps, 9);
    }

    #[tokio::test]
    async fn test_build_each_pattern() {
        let registry = registry();
        let memory: Arc<dyn MemoryRepository> = Arc::new(EphemeralMemory::new());

        let simple = OrchestratorConfig::from_yaml("default_agent: weather_agent").unwrap();
        let orchestrator = simple.build(registry.clone(), None).unwrap();
        assert_eq!(orchestrator.name(), "simple");
        let reply = orchestrator.orchestrate("t", "pasta?", None, &Context::new()).await.unwrap();
        assert_eq!(reply, "sunny");

        let yaml = "pattern: multi_agent\nclassifier_agent: router";
        let multi = OrchestratorConfig::from_yaml(yaml).unwrap();
        let orchestrator = multi.build(registry.clone(), Some(memory.clone())).unwrap();
        let reply = orchestrator.orchestrate("t", "pasta?", None, &Context::new()).await.unwrap();
        assert_eq!(reply, "try Luigi's");
        assert_eq!(memory.get_last_n_messages("t", 10).await.unwrap().len(), 2);

        let yaml = "pattern: react\nreact:\n  reasoning_agent: planner";
        let react = OrchestratorConfig::from_yaml(yaml).unwrap();
        let orchestrator = react.build(registry, None).unwrap();
        let reply = orchestrator.orchestrate("t", "plan", None, &Context::new()).await.unwrap();
        assert_eq!(reply, "planned");
    }

    #[test]
    fn test_build_rejects_unregistered_agents() {
        let registry = registry();
        let yaml = "pattern: multi_agent\nclassifier_agent: ghost";
        let multi = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert!(matches!(multi.build(registry.clone(), None), Err(Error::Config(_))));

        let yaml = "pattern: react\nreact:\n  reasoning_agent: ghost";
        let react = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert!(matches!(react.build(registry, None), Err(Error::Config(_))));
    }
}
