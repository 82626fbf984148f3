//! Shared step/result model.
//!
//! A [`WorkflowStep`] is one recorded unit of work: an agent's output or a
//! router's decision. A [`WorkflowResult`] is the append-only audit trail of a
//! run plus the text a caller should surface to the user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Agent id used for router decision steps.
pub const ROUTER_AGENT_ID: &str = "router";

/// Metadata key that every step carries.
pub const RESULT_KEY: &str = "result";

/// One recorded agent turn or router decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Agent that produced this step (or [`ROUTER_AGENT_ID`])
    pub agent_id: String,

    /// Task text given to the agent
    pub task: String,

    /// Always contains `result`; strategies add their own extras
    pub metadata: Map<String, Value>,
}

impl WorkflowStep {
    pub fn new(
        agent_id: impl Into<String>,
        task: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(RESULT_KEY.into(), Value::String(result.into()));
        Self {
            agent_id: agent_id.into(),
            task: task.into(),
            metadata,
        }
    }

    /// Attach a metadata entry. `result` cannot be overwritten.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != RESULT_KEY {
            self.metadata.insert(key.into(), value.into());
        }
        self
    }

    /// The agent's textual output.
    pub fn result(&self) -> &str {
        self.metadata
            .get(RESULT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn is_router(&self) -> bool {
        self.agent_id == ROUTER_AGENT_ID
    }
}

/// The aggregate outcome of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Every step, in execution order
    pub steps: Vec<WorkflowStep>,

    /// Text to surface to the user
    pub final_response: String,

    /// Always contains `strategy`
    pub metadata: Map<String, Value>,
}

impl WorkflowResult {
    /// A run that executed nothing.
    pub fn empty(strategy: &str) -> Self {
        Self::from_steps(strategy, Vec::new())
    }

    /// Build a result whose response is the last agent step's output.
    pub fn from_steps(strategy: &str, steps: Vec<WorkflowStep>) -> Self {
        let final_response = last_agent_result(&steps).to_string();
        let mut metadata = Map::new();
        metadata.insert("strategy".into(), Value::String(strategy.into()));
        Self {
            steps,
            final_response,
            metadata,
        }
    }

    /// Attach a metadata entry. `strategy` cannot be overwritten.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "strategy" {
            self.metadata.insert(key.into(), value.into());
        }
        self
    }

    /// Name of the strategy that produced this result.
    pub fn strategy(&self) -> &str {
        self.metadata
            .get("strategy")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Agent ids of every step, router steps included.
    pub fn agent_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.agent_id.as_str()).collect()
    }

    /// Steps produced by agents (router decisions excluded).
    pub fn agent_steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.iter().filter(|s| !s.is_router())
    }

    /// Whether the run ended in a degraded state (exhaustion, fallback, cancellation).
    pub fn is_degraded(&self) -> bool {
        self.metadata
            .get("degraded")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Output of the most recent non-router step, or `""`.
pub fn last_agent_result(steps: &[WorkflowStep]) -> &str {
    steps
        .iter()
        .rev()
        .find(|s| !s.is_router())
        .map(WorkflowStep::result)
        .unwrap_or_default()
}

/// Short single-line preview for logs and events.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut cut: String = flat.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_always_has_result() {
        let step = WorkflowStep::new("coder", "write it", "fn main() {}")
            .with("retries", 0)
            .with("result", "overwritten?");
        assert_eq!(step.result(), "fn main() {}");
        assert_eq!(step.metadata["retries"], 0);
        assert!(!step.is_router());
    }

    #[test]
    fn final_response_skips_router_steps() {
        let steps = vec![
            WorkflowStep::new("planner", "t", "the plan"),
            WorkflowStep::new(ROUTER_AGENT_ID, "t", r#"{"action":"finish"}"#),
        ];
        let result = WorkflowResult::from_steps("few_shot", steps);
        assert_eq!(result.final_response, "the plan");
        assert_eq!(result.strategy(), "few_shot");
        assert_eq!(result.agent_ids(), vec!["planner", "router"]);
        assert_eq!(result.agent_steps().count(), 1);
    }

    #[test]
    fn empty_result_has_strategy_and_no_response() {
        let result = WorkflowResult::empty("hybrid").with("strategy", "other");
        assert!(result.steps.is_empty());
        assert!(result.final_response.is_empty());
        assert_eq!(result.strategy(), "hybrid");
        assert!(!result.is_degraded());
    }

    #[test]
    fn preview_truncates_and_flattens() {
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc…");
    }
}
