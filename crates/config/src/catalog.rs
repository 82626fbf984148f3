//! Agent and domain catalog file.
//!
//! ```toml
//! [[agents]]
//! id = "planner"
//! system_prompt = "You break work into steps."
//! capabilities = ["planning"]
//!
//! [[agents]]
//! id = "coder"
//! model = "openai/gpt-4o"
//! keywords = ["code", "bug"]
//!
//! [[domains]]
//! id = "dev"
//! agents = ["planner", "coder"]
//! default_agent = "planner"
//! workflow_type = "orchestrator"
//!
//! [domains.metadata.orchestration]
//! pipeline = ["planner", "coder"]
//! ```
//!
//! Agent `model`, `temperature` and `max_tokens` fall back to the
//! [`AppConfig`](crate::AppConfig) defaults when omitted.

use std::collections::HashSet;
use std::path::Path;

use agentflow_core::{Agent, AgentCatalog, DomainPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppConfig, ConfigError};

/// An `[[agents]]` entry as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub system_prompt: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub agents: Vec<AgentEntry>,

    #[serde(default)]
    pub domains: Vec<DomainPolicy>,
}

/// A validated catalog: every domain references known agents.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub agents: AgentCatalog,
    pub domains: Vec<DomainPolicy>,
}

impl Catalog {
    pub fn domain(&self, id: &str) -> Option<&DomainPolicy> {
        self.domains.iter().find(|d| d.id == id)
    }

    pub fn domain_ids(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.id.as_str()).collect()
    }
}

impl CatalogFile {
    /// Read a catalog file. Unlike the config file, a missing catalog is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply defaults and validate cross references.
    pub fn resolve(self, defaults: &AppConfig) -> Result<Catalog, ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.agents {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::ValidationError("agent with empty id".into()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent id '{}'",
                    entry.id
                )));
            }
            if let Some(t) = entry.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "agent '{}': temperature must be between 0.0 and 2.0",
                        entry.id
                    )));
                }
            }
        }

        let mut domain_ids = HashSet::new();
        for domain in &self.domains {
            if !domain_ids.insert(domain.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate domain id '{}'",
                    domain.id
                )));
            }
            domain
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            if let Some(missing) = domain.agents.iter().find(|id| !seen.contains(id.as_str())) {
                return Err(ConfigError::ValidationError(format!(
                    "domain '{}' references unknown agent '{missing}'",
                    domain.id
                )));
            }
            if let Some(rule) = domain.routing_rules.iter().find(|r| !domain.is_member(&r.agent)) {
                return Err(ConfigError::ValidationError(format!(
                    "domain '{}': routing rule targets non-member agent '{}'",
                    domain.id, rule.agent
                )));
            }
        }

        let agents: AgentCatalog = self
            .agents
            .into_iter()
            .map(|entry| {
                let member_of = self
                    .domains
                    .iter()
                    .filter(|d| d.is_member(&entry.id))
                    .map(|d| d.id.clone())
                    .collect();
                entry.into_agent(defaults, member_of)
            })
            .collect();

        debug!(
            agents = agents.len(),
            domains = self.domains.len(),
            "Catalog loaded"
        );

        Ok(Catalog {
            agents,
            domains: self.domains,
        })
    }

    /// Starter catalog written by `config --init`.
    pub fn example_toml() -> &'static str {
        include_str!("catalog.example.toml")
    }
}

impl AgentEntry {
    fn into_agent(self, defaults: &AppConfig, domains: Vec<String>) -> Agent {
        Agent {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            domains,
            system_prompt: self.system_prompt,
            capabilities: self.capabilities,
            keywords: self.keywords,
            model: self.model.unwrap_or_else(|| defaults.default_model.clone()),
            temperature: self.temperature.unwrap_or(defaults.default_temperature),
            max_tokens: Some(self.max_tokens.unwrap_or(defaults.default_max_tokens)),
            metadata: self.metadata,
        }
    }
}
