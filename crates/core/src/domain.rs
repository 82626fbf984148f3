//! Domain policies and the agent catalog.
//!
//! A domain groups agents and selects how they collaborate. Strategy
//! configuration lives in the loosely-typed `metadata` map under one section
//! per strategy:
//!
//! ```text
//! orchestration.pipeline        = ["planner", "coder"]
//! few_shot.max_handoffs         = 3
//! few_shot.routing_examples     = [{ situation = "...", decision = "..." }]
//! hybrid.orchestrator_decides   = ["design"]
//! hybrid.llm_decides            = ["implementation"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::agent::Agent;
use crate::error::{Error, Result};

/// A keyword routing rule for the supervisor path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Lower values are evaluated first
    #[serde(default)]
    pub priority: i64,

    /// Trigger keywords (matched case-insensitively against message tokens)
    pub keywords: Vec<String>,

    /// Agent selected when the rule matches
    pub agent: String,
}

/// A domain policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPolicy {
    /// Unique domain id
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Ordered member agent ids
    pub agents: Vec<String>,

    /// Agent used when nothing else applies (must be a member)
    pub default_agent: String,

    /// Strategy tag: `supervisor` | `orchestrator` | `few_shot` | `hybrid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,

    /// Keyword routing rules for the supervisor path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_rules: Vec<RoutingRule>,

    /// Strategy-specific configuration sections
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl DomainPolicy {
    /// Create a domain with the given members; the first member is the default.
    pub fn new<I, S>(id: impl Into<String>, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agents: Vec<String> = agents.into_iter().map(Into::into).collect();
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            default_agent: agents.first().cloned().unwrap_or_default(),
            agents,
            workflow_type: None,
            routing_rules: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Self {
        self.default_agent = agent.into();
        self
    }

    pub fn with_workflow_type(mut self, tag: impl Into<String>) -> Self {
        self.workflow_type = Some(tag.into());
        self
    }

    pub fn with_rule(mut self, rule: RoutingRule) -> Self {
        self.routing_rules.push(rule);
        self
    }

    /// Set one metadata section (e.g. `"orchestration"`).
    pub fn with_section(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Look up a strategy section, if it is an object.
    pub fn section(&self, key: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.metadata.get(key).and_then(|v| v.as_object())
    }

    /// Read `metadata.<section>.<key>` as a list of strings.
    ///
    /// Returns `None` when the entry is missing or malformed (not a list, or a
    /// list containing non-strings).
    pub fn string_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        let items = self.section(section)?.get(key)?.as_array()?;
        items
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect()
    }

    /// Read `metadata.<section>.<key>` as an unsigned integer.
    pub fn unsigned(&self, section: &str, key: &str) -> Option<u64> {
        self.section(section)?.get(key)?.as_u64()
    }

    pub fn is_member(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|a| a == agent_id)
    }

    /// Structural checks that do not need the catalog.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(Error::InvalidDomain(format!(
                "domain '{}' has no member agents",
                self.id
            )));
        }
        if !self.is_member(&self.default_agent) {
            return Err(Error::InvalidDomain(format!(
                "default agent '{}' is not a member of domain '{}'",
                self.default_agent, self.id
            )));
        }
        Ok(())
    }
}

/// Read-only mapping from agent id to [`Agent`].
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: HashMap<String, Agent>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, replacing any previous agent with the same id.
    pub fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Get an agent or fail with an unknown-agent error naming `context`.
    pub fn require(&self, id: &str, context: &str) -> Result<&Agent> {
        self.agents
            .get(id)
            .ok_or_else(|| Error::unknown_agent(id, context))
    }

    /// A catalog holding only the given ids (unknown ids are skipped).
    pub fn restricted_to(&self, ids: &[String]) -> AgentCatalog {
        ids.iter()
            .filter_map(|id| {
                let agent = self.agents.get(id).cloned();
                if agent.is_none() {
                    debug!(agent_id = %id, "Skipping id missing from catalog");
                }
                agent
            })
            .collect()
    }

    /// Agent ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }
}

impl FromIterator<Agent> for AgentCatalog {
    fn from_iter<T: IntoIterator<Item = Agent>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for agent in iter {
            catalog.insert(agent);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dev_domain() -> DomainPolicy {
        DomainPolicy::new("dev", ["planner", "coder"])
            .with_workflow_type("orchestrator")
            .with_section("orchestration", json!({ "pipeline": ["planner", "coder"] }))
    }

    #[test]
    fn first_member_is_default() {
        let domain = dev_domain();
        assert_eq!(domain.default_agent, "planner");
        assert!(domain.validate().is_ok());
    }

    #[test]
    fn default_agent_must_be_member() {
        let domain = dev_domain().with_default_agent("stranger");
        let err = domain.validate().unwrap_err();
        assert!(err.to_string().contains("stranger"));
    }

    #[test]
    fn string_list_reads_sections() {
        let domain = dev_domain();
        assert_eq!(
            domain.string_list("orchestration", "pipeline"),
            Some(vec!["planner".to_string(), "coder".to_string()])
        );
        assert!(domain.string_list("few_shot", "routing_examples").is_none());
    }

    #[test]
    fn malformed_list_is_none() {
        let domain = DomainPolicy::new("d", ["a"])
            .with_section("orchestration", json!({ "pipeline": "a,b" }));
        assert!(domain.string_list("orchestration", "pipeline").is_none());

        let domain = DomainPolicy::new("d", ["a"])
            .with_section("orchestration", json!({ "pipeline": ["a", 7] }));
        assert!(domain.string_list("orchestration", "pipeline").is_none());
    }

    #[test]
    fn catalog_require_and_restrict() {
        let catalog: AgentCatalog = [
            Agent::new("planner", "m", "plan"),
            Agent::new("coder", "m", "code"),
        ]
        .into_iter()
        .collect();

        assert!(catalog.require("coder", "test").is_ok());
        let err = catalog.require("ghost", "pipeline").unwrap_err();
        assert!(matches!(err, Error::UnknownAgent { ref agent_id, .. } if agent_id == "ghost"));

        let restricted = catalog.restricted_to(&["coder".into(), "ghost".into()]);
        assert_eq!(restricted.ids(), vec!["coder"]);
    }
}
