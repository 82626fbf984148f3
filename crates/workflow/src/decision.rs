//! Structured routing decisions.
//!
//! The few-shot router answers with a JSON object:
//!
//! ```json
//! {"action": "handoff", "target_agent": "coder", "reason": "needs code"}
//! {"action": "finish", "reason": "the answer is complete"}
//! ```
//!
//! Parsing is strict: the whole response (optionally wrapped in one Markdown
//! code fence) must be that object. Nothing is guessed from free text; a
//! response that does not parse is a [`DecisionError`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// What the router wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingAction {
    Finish,
    Handoff,
}

/// A typed router decision. Created once per router call and consumed immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub action: RoutingAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,

    #[serde(default)]
    pub reason: String,
}

/// Why a router response could not become a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("router returned an empty response")]
    Empty,

    #[error("router response is not a valid decision: {0}")]
    Unparseable(String),

    #[error("handoff decision is missing target_agent")]
    MissingTarget,
}

impl RoutingDecision {
    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            action: RoutingAction::Finish,
            target_agent: None,
            reason: reason.into(),
        }
    }

    pub fn handoff(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: RoutingAction::Handoff,
            target_agent: Some(target.into()),
            reason: reason.into(),
        }
    }

    /// Handoff target, if this is a handoff.
    pub fn target(&self) -> Option<&str> {
        match self.action {
            RoutingAction::Handoff => self.target_agent.as_deref(),
            RoutingAction::Finish => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl FromStr for RoutingDecision {
    type Err = DecisionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let body = strip_code_fence(raw.trim());
        if body.is_empty() {
            return Err(DecisionError::Empty);
        }

        let mut decision: RoutingDecision =
            serde_json::from_str(body).map_err(|e| DecisionError::Unparseable(e.to_string()))?;

        if decision.action == RoutingAction::Handoff {
            let target = decision
                .target_agent
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(DecisionError::MissingTarget)?;
            decision.target_agent = Some(target.to_string());
        }

        Ok(decision)
    }
}

/// Parse raw router output into a decision.
pub fn parse_decision(raw: &str) -> Result<RoutingDecision, DecisionError> {
    raw.parse()
}

/// Remove a single surrounding ```/```json fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line.
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    }
}
