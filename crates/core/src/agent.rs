//! Agent definitions.
//!
//! An agent is a configured persona: a system prompt, a model binding,
//! generation parameters, and the capability/keyword metadata used for
//! routing. Agents are read-only for the duration of one workflow run.

use serde::{Deserialize, Serialize};

/// A configured agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent id (e.g., "planner", "coder")
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Domains this agent belongs to
    #[serde(default)]
    pub domains: Vec<String>,

    /// Base system prompt
    #[serde(default)]
    pub system_prompt: String,

    /// Declared capabilities (free text, shown to routers)
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Topic keywords, listed by `agentflow catalog`
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Backing model name
    #[serde(default)]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Free-form metadata (may carry a display `handle`)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Agent {
    /// Create an agent with the given id, model and system prompt.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            domains: Vec::new(),
            system_prompt: system_prompt.into(),
            capabilities: Vec::new(),
            keywords: Vec::new(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Display handle from metadata, falling back to `@<id>`.
    pub fn handle(&self) -> String {
        self.metadata
            .get("handle")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("@{}", self.id))
    }

    /// One-line description used when listing agents to a router.
    pub fn describe(&self) -> String {
        let name = if self.name.is_empty() { &self.id } else { &self.name };
        if self.capabilities.is_empty() {
            format!("{} ({})", self.id, name)
        } else {
            format!("{} ({}): {}", self.id, name, self.capabilities.join(", "))
        }
    }
}
