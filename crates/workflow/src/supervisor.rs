//! Keyword-based supervisor router.
//!
//! Single-shot agent selection for domains without strategy metadata. The
//! latest user message is tokenised (lowercase alphanumeric runs of at least
//! three characters), rules are evaluated in ascending priority, and the first
//! rule whose keywords intersect the tokens wins. No match, or a rule naming
//! an agent the catalog does not know, selects the domain's default agent.
//!
//! The router itself never calls the LLM; only the chosen agent is asked to
//! answer.

use std::collections::BTreeSet;

use agentflow_core::message::{Message, latest_user_message};
use agentflow_core::{AgentCatalog, DomainPolicy, Result, RoutingRule};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::invoker::AgentInvoker;
use crate::step::{WorkflowResult, WorkflowStep};

pub const STRATEGY_NAME: &str = "supervisor";

/// Minimum token length considered for keyword matching.
const MIN_TOKEN_LEN: usize = 3;

/// The outcome of one routing decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Agent chosen to answer
    pub agent_id: String,
    /// Priority of the matched rule, `None` when the default agent was used
    pub matched_priority: Option<i64>,
    /// Keywords of the matched rule that appeared in the message
    pub matched_keywords: Vec<String>,
}

impl Selection {
    fn fallback(domain: &DomainPolicy) -> Self {
        Self {
            agent_id: domain.default_agent.clone(),
            matched_priority: None,
            matched_keywords: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.matched_priority.is_none()
    }
}

/// Lowercase alphanumeric tokens of length ≥ 3.
pub fn extract_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Routes a message to one agent, then lets that agent answer.
#[derive(Clone)]
pub struct SupervisorRouter {
    invoker: AgentInvoker,
}

impl SupervisorRouter {
    pub fn new(invoker: AgentInvoker) -> Self {
        Self { invoker }
    }

    pub(crate) fn invoker(&self) -> &AgentInvoker {
        &self.invoker
    }

    /// Pick the agent for `message`. Never calls the LLM.
    pub fn select(domain: &DomainPolicy, agents: &AgentCatalog, message: &str) -> Selection {
        let tokens = extract_tokens(message);

        let mut rules: Vec<&RoutingRule> = domain.routing_rules.iter().collect();
        // Stable: equal priorities keep their declared order.
        rules.sort_by_key(|r| r.priority);

        let matched = rules.into_iter().find_map(|rule| {
            let hits: Vec<String> = rule
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| tokens.contains(k))
                .collect();
            (!hits.is_empty()).then_some((rule, hits))
        });

        let Some((rule, hits)) = matched else {
            debug!(domain = %domain.id, "No routing rule matched, using default agent");
            return Selection::fallback(domain);
        };

        if !domain.is_member(&rule.agent) || !agents.contains(&rule.agent) {
            warn!(
                domain = %domain.id,
                agent = %rule.agent,
                "Routing rule names an agent outside the domain, using default agent"
            );
            return Selection::fallback(domain);
        }

        Selection {
            agent_id: rule.agent.clone(),
            matched_priority: Some(rule.priority),
            matched_keywords: hits,
        }
    }

    /// Pick the agent for the latest user message in a conversation.
    pub fn select_for_messages(
        domain: &DomainPolicy,
        agents: &AgentCatalog,
        messages: &[Message],
    ) -> Selection {
        let text = latest_user_message(messages)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Self::select(domain, agents, text)
    }

    /// Select an agent and ask it to answer once.
    pub async fn execute(
        &self,
        domain: &DomainPolicy,
        agents: &AgentCatalog,
        user_request: &str,
    ) -> Result<WorkflowResult> {
        agents.require(
            &domain.default_agent,
            &format!("default agent of domain '{}'", domain.id),
        )?;

        let selection = Self::select(domain, agents, user_request);
        let agent = agents.require(&selection.agent_id, "routing rule")?;

        info!(
            domain = %domain.id,
            agent = %agent.id,
            fallback = selection.is_fallback(),
            "Supervisor selected agent"
        );

        let selection_meta = |result: WorkflowResult| {
            result
                .with("selected_agent", selection.agent_id.clone())
                .with(
                    "matched_rule_priority",
                    selection.matched_priority.map_or(Value::Null, Value::from),
                )
        };

        let reply = match self
            .invoker
            .invoke(agent, &agent.system_prompt, vec![Message::user(user_request)])
            .await
        {
            Ok(reply) => reply,
            Err(e) if e.is_cancelled() => {
                return Ok(selection_meta(WorkflowResult::empty(STRATEGY_NAME))
                    .with("cancelled", true)
                    .with("degraded", true));
            }
            Err(e) => return Err(e),
        };

        let mut steps = Vec::new();
        self.invoker.record(
            &domain.id,
            &mut steps,
            WorkflowStep::new(&agent.id, user_request, reply)
                .with("matched_keywords", selection.matched_keywords.clone()),
        );

        Ok(selection_meta(WorkflowResult::from_steps(STRATEGY_NAME, steps)).with("degraded", false))
    }
}
