//! Agent registry

use crate::agent::{Agent, AgentInfo};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Directory of available agents keyed by name.
///
/// Uses interior mutability so agents can be registered and removed through a
/// shared `Arc<AgentRegistry>` while orchestrators keep reading from it.
/// Lookups take the read lock only.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, replacing any agent already registered under the
    /// same name
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.name();
        if self.agents.write().insert(name.clone(), agent).is_some() {
            debug!(agent = %name, "replaced registered agent");
        } else {
            debug!(agent = %name, "registered agent");
        }
    }

    /// Remove an agent by name. A no-op when absent.
    pub fn remove(&self, name: &str) {
        self.agents.write().remove(name);
    }

    /// Get an agent by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(name).cloned()
    }

    /// Whether an agent is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.agents.read().contains_key(name)
    }

    /// Snapshots of every registered agent, ordered by name
    pub fn list(&self) -> Vec<AgentInfo> {
        self.agents.read().values().map(|a| a.info()).collect()
    }

    /// Registered agent names, ordered
    pub fn names(&self) -> Vec<String> {
        self.agents.read().keys().cloned().collect()
    }

    /// Agents whose type tag equals `agent_type` (linear scan)
    pub fn find_by_type(&self, agent_type: &str) -> Vec<AgentInfo> {
        self.agents
            .read()
            .values()
            .map(|a| a.info())
            .filter(|info| info.agent_type == agent_type)
            .collect()
    }

    /// Agents whose description contains `needle`, compared case-insensitively
    /// (linear scan)
    pub fn find_by_description(&self, needle: &str) -> Vec<AgentInfo> {
        let needle = needle.to_lowercase();
        self.agents
            .read()
            .values()
            .map(|a| a.info())
            .filter(|info| info.description.to_lowercase().contains(&needle))
            .collect()
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    /// Whether no agents are registered
    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticAgent;
    use crate::types::Context;

    fn registry() -> AgentRegistry {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(StaticAgent::new(
            "food_agent",
            "Restaurant recommendations",
            "try the trattoria",
        )));
        registry.register(Arc::new(
            StaticAgent::new("weather_agent", "Weather info", "sunny").with_type("RemoteAgent"),
        ));
        registry
    }

    #[tokio::test]
    async fn test_register_overwrites_existing_name() {
        let registry = registry();
        registry.register(Arc::new(StaticAgent::new(
            "food_agent",
            "Restaurant recommendations v2",
            "newer reply",
        )));

        assert_eq!(registry.len(), 2);
        let agent = registry.get("food_agent").unwrap();
        let reply = agent
            .handle_message("pasta?", "t-1", &Context::new())
            .await
            .unwrap();
        assert_eq!(reply, "newer reply");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = registry();
        registry.remove("nobody");
        assert_eq!(registry.len(), 2);
        registry.remove("food_agent");
        assert!(registry.get("food_agent").is_none());
        assert!(!registry.contains("food_agent"));
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let names: Vec<_> = registry().list().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["food_agent", "weather_agent"]);
    }

    #[test]
    fn test_find_by_type() {
        let registry = registry();
        let remote = registry.find_by_type("RemoteAgent");
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].name, "weather_agent");
        assert!(registry.find_by_type("Nope").is_empty());
    }

    #[test]
    fn test_find_by_description_ignores_case() {
        let registry = registry();
        let found = registry.find_by_description("RESTAURANT");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "food_agent");
        assert_eq!(registry.find_by_description("info").len(), 1);
    }

    #[test]
    fn test_concurrent_registration_and_lookup() {
        let registry = Arc::new(AgentRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(Arc::new(StaticAgent::new(
                        format!("agent_{i}"),
                        "worker",
                        "ok",
                    )));
                    registry.get(&format!("agent_{i}")).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.len(), 8);
    }
}
