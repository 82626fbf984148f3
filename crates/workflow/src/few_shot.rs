//! Few-shot strategy — an LLM-driven handoff loop.
//!
//! Each iteration runs the current agent, then asks a router for a JSON
//! [`RoutingDecision`]. `finish` ends the loop; `handoff` moves control to
//! another agent. The loop is bounded by `max_handoffs` iterations, so agents
//! that keep deferring to each other cannot cycle forever:
//!
//! ```text
//! for iteration in 0..max_handoffs:
//!     agent step   (agent_id = current)
//!     router step  (agent_id = "router")
//!     finish            → stop
//!     handoff → known   → current = target (last iteration: stop, not counted)
//!     handoff → unknown → stop, keep last agent output
//!     unparseable       → stop, keep last agent output
//! ```
//!
//! A run therefore never records more than `2 * max_handoffs` steps.

use agentflow_core::event::WorkflowEvent;
use agentflow_core::message::{Message, latest_user_message};
use agentflow_core::{Agent, AgentCatalog, DomainPolicy, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::decision::{RoutingAction, parse_decision};
use crate::invoker::AgentInvoker;
use crate::step::{ROUTER_AGENT_ID, WorkflowResult, WorkflowStep, last_agent_result};

pub const STRATEGY_NAME: &str = "few_shot";

/// Iteration bound when `few_shot.max_handoffs` is absent.
pub const DEFAULT_MAX_HANDOFFS: u32 = 5;

/// Marker that opens every router system prompt.
pub const ROUTER_MARKER: &str = "[ROUTER]";

const ROUTER_TEMPERATURE: f32 = 0.0;
const ROUTER_MAX_TOKENS: u32 = 256;

/// One situation/decision pair shown to agents and the router.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingExample {
    pub situation: String,
    pub decision: Value,
}

impl RoutingExample {
    fn render(&self) -> String {
        let decision = match self.decision {
            Value::String(ref s) => s.clone(),
            ref other => other.to_string(),
        };
        format!("Situation: {}\nDecision: {}", self.situation, decision)
    }
}

/// Loop configuration read from a domain's metadata.
#[derive(Debug, Clone)]
pub struct FewShotConfig {
    pub max_handoffs: u32,
    pub routing_examples: Vec<RoutingExample>,
}

impl Default for FewShotConfig {
    fn default() -> Self {
        Self {
            max_handoffs: DEFAULT_MAX_HANDOFFS,
            routing_examples: Vec::new(),
        }
    }
}

impl FewShotConfig {
    /// Read `metadata.few_shot`. Malformed examples are skipped; a bound of
    /// zero is raised to one so the default agent always answers.
    pub fn from_domain(domain: &DomainPolicy) -> Self {
        let max_handoffs = domain
            .unsigned("few_shot", "max_handoffs")
            .map(|n| n.clamp(1, u64::from(u32::MAX)) as u32)
            .unwrap_or(DEFAULT_MAX_HANDOFFS);

        let routing_examples = domain
            .section("few_shot")
            .and_then(|s| s.get("routing_examples"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            max_handoffs,
            routing_examples,
        }
    }

    pub fn with_max_handoffs(mut self, max: u32) -> Self {
        self.max_handoffs = max.max(1);
        self
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    MaxHandoffs,
    UnknownTarget(String),
    UnparseableDecision,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finish",
            Self::MaxHandoffs => "max_handoffs",
            Self::UnknownTarget(_) => "unknown_target",
            Self::UnparseableDecision => "unparseable_decision",
            Self::Cancelled => "cancelled",
        }
    }

    /// Anything other than an explicit finish.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Finished)
    }
}

#[derive(Debug)]
pub(crate) struct LoopOutcome {
    pub steps: Vec<WorkflowStep>,
    pub handoffs: u32,
    pub iterations: u32,
    pub stop_reason: StopReason,
}

impl LoopOutcome {
    pub fn final_response(&self) -> String {
        last_agent_result(&self.steps).to_string()
    }
}

/// Runs the handoff loop starting at a domain's default agent.
#[derive(Clone)]
pub struct FewShotStrategy {
    invoker: AgentInvoker,
}

impl FewShotStrategy {
    pub fn new(invoker: AgentInvoker) -> Self {
        Self { invoker }
    }

    pub(crate) fn invoker(&self) -> &AgentInvoker {
        &self.invoker
    }

    pub async fn execute(
        &self,
        domain: &DomainPolicy,
        agents: &AgentCatalog,
        user_request: &str,
    ) -> Result<WorkflowResult> {
        let participants = agents.restricted_to(&domain.agents);
        participants.require(
            &domain.default_agent,
            &format!("default agent of domain '{}'", domain.id),
        )?;

        let config = FewShotConfig::from_domain(domain);
        info!(
            domain = %domain.id,
            start = %domain.default_agent,
            max_handoffs = config.max_handoffs,
            "Few-shot: starting handoff loop"
        );

        let outcome = self
            .run_loop(
                &domain.id,
                &participants,
                &domain.agents,
                &domain.default_agent,
                user_request,
                &config,
            )
            .await?;

        info!(
            domain = %domain.id,
            steps = outcome.steps.len(),
            handoffs = outcome.handoffs,
            stop = outcome.stop_reason.as_str(),
            "Few-shot: complete"
        );

        let mut result = WorkflowResult::from_steps(STRATEGY_NAME, outcome.steps)
            .with("handoffs", outcome.handoffs)
            .with("iterations", outcome.iterations)
            .with("max_handoffs", config.max_handoffs)
            .with("stop_reason", outcome.stop_reason.as_str())
            .with("cancelled", outcome.stop_reason == StopReason::Cancelled)
            .with("degraded", outcome.stop_reason.is_degraded());
        if let StopReason::UnknownTarget(ref target) = outcome.stop_reason {
            result = result.with("unknown_target", target.clone());
        }
        Ok(result)
    }

    /// The bounded loop. `order` fixes how agents are listed in prompts.
    pub(crate) async fn run_loop(
        &self,
        domain_id: &str,
        participants: &AgentCatalog,
        order: &[String],
        start: &str,
        user_request: &str,
        config: &FewShotConfig,
    ) -> Result<LoopOutcome> {
        let mut outcome = LoopOutcome {
            steps: Vec::new(),
            handoffs: 0,
            iterations: 0,
            stop_reason: StopReason::MaxHandoffs,
        };
        let roster = roster(participants, order);
        let mut conversation = vec![Message::user(user_request)];
        let mut current = participants.require(start, "handoff loop start")?;

        for iteration in 0..config.max_handoffs {
            // ── Agent execution ──
            let prompt = agent_prompt(current, &roster, &config.routing_examples);
            let task = latest_user_message(&conversation)
                .map(|m| m.content.clone())
                .unwrap_or_default();

            let output = match self
                .invoker
                .invoke(current, &prompt, conversation.clone())
                .await
            {
                Ok(output) => output,
                Err(e) if e.is_cancelled() => {
                    outcome.stop_reason = StopReason::Cancelled;
                    return Ok(outcome);
                }
                Err(e) => return Err(e),
            };
            outcome.iterations = iteration + 1;

            self.invoker.record(
                domain_id,
                &mut outcome.steps,
                WorkflowStep::new(&current.id, task, &output).with("iteration", iteration),
            );
            conversation.push(
                Message::assistant(format!("[{}] {}", current.id, output))
                    .with_metadata("agent", current.id.clone().into()),
            );

            // ── Router decision ──
            let brief = router_brief(user_request, &current.id, &output, outcome.handoffs);
            let raw = match self
                .invoker
                .invoke_with(
                    &current.model,
                    &router_prompt(&roster, &config.routing_examples),
                    vec![Message::user(&brief)],
                    ROUTER_TEMPERATURE,
                    Some(ROUTER_MAX_TOKENS),
                )
                .await
            {
                Ok(raw) => raw,
                Err(e) if e.is_cancelled() => {
                    outcome.stop_reason = StopReason::Cancelled;
                    return Ok(outcome);
                }
                Err(e) => return Err(e),
            };

            let parsed = parse_decision(&raw);
            let mut router_step = WorkflowStep::new(ROUTER_AGENT_ID, brief, &raw)
                .with("iteration", iteration)
                .with("raw_decision", raw.clone());
            match parsed {
                Ok(ref decision) => {
                    router_step = router_step
                        .with("decision", decision.to_json())
                        .with("reasoning", decision.reason.clone());
                    if let Some(target) = decision.target() {
                        router_step = router_step.with("handoff_target", target);
                    }
                }
                Err(ref e) => {
                    router_step = router_step.with("decision_error", e.to_string());
                }
            }
            self.invoker.record(domain_id, &mut outcome.steps, router_step);

            let decision = match parsed {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(domain = %domain_id, error = %e, "Router decision unparseable, stopping");
                    outcome.stop_reason = StopReason::UnparseableDecision;
                    return Ok(outcome);
                }
            };

            match (decision.action, decision.target()) {
                (RoutingAction::Finish, _) => {
                    debug!(domain = %domain_id, iteration, "Router finished");
                    outcome.stop_reason = StopReason::Finished;
                    return Ok(outcome);
                }
                (RoutingAction::Handoff, Some(target)) => {
                    let Some(next) = participants.get(target) else {
                        warn!(
                            domain = %domain_id,
                            target = %target,
                            "Handoff to unknown agent, stopping"
                        );
                        outcome.stop_reason = StopReason::UnknownTarget(target.to_string());
                        return Ok(outcome);
                    };

                    if iteration + 1 == config.max_handoffs {
                        // No turn left for the target.
                        break;
                    }

                    outcome.handoffs += 1;
                    self.invoker.publish(WorkflowEvent::HandoffAccepted {
                        domain: domain_id.to_string(),
                        from: current.id.clone(),
                        to: next.id.clone(),
                        timestamp: Utc::now(),
                    });
                    conversation.push(Message::user(handoff_note(&current.id, &next.id, &decision.reason)));
                    current = next;
                }
                // The parser never yields a handoff without a target.
                (RoutingAction::Handoff, None) => {
                    outcome.stop_reason = StopReason::UnparseableDecision;
                    return Ok(outcome);
                }
            }
        }

        warn!(
            domain = %domain_id,
            max_handoffs = config.max_handoffs,
            "Handoff bound reached"
        );
        Ok(outcome)
    }
}

/// Participants in listing order; agents missing from `order` come last, sorted.
fn roster<'a>(participants: &'a AgentCatalog, order: &[String]) -> Vec<&'a Agent> {
    let mut listed: Vec<&Agent> = order.iter().filter_map(|id| participants.get(id)).collect();
    for id in participants.ids() {
        if !order.iter().any(|o| o == id) {
            if let Some(agent) = participants.get(id) {
                listed.push(agent);
            }
        }
    }
    listed
}

fn render_roster(roster: &[&Agent]) -> String {
    roster
        .iter()
        .map(|a| format!("- {}", a.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_examples(examples: &[RoutingExample]) -> String {
    examples
        .iter()
        .map(RoutingExample::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Base prompt plus team roster and handoff examples.
pub(crate) fn agent_prompt(agent: &Agent, roster: &[&Agent], examples: &[RoutingExample]) -> String {
    let mut prompt = agent.system_prompt.clone();
    prompt.push_str(&format!(
        "\n\n## Team\nYou are `{}`. You work with other agents; after your reply a router \
         decides whether the task is finished or another agent continues.\n\
         Available agents:\n{}",
        agent.id,
        render_roster(roster)
    ));
    if !examples.is_empty() {
        prompt.push_str("\n\n## When work changes hands\n");
        prompt.push_str(&render_examples(examples));
    }
    prompt
}

pub(crate) fn router_prompt(roster: &[&Agent], examples: &[RoutingExample]) -> String {
    let mut prompt = format!(
        "{ROUTER_MARKER} You route work between agents. Read the user's request and the \
         latest agent output, then decide whether the request is fully answered (finish) \
         or another agent should continue (handoff).\n\n\
         Available agents:\n{}\n\n\
         Respond with ONLY a JSON object, no prose, no extra keys required:\n\
         {{\"action\": \"finish\" | \"handoff\", \"target_agent\": \"<agent id, required for handoff>\", \"reason\": \"<one sentence>\"}}",
        render_roster(roster)
    );
    if !examples.is_empty() {
        prompt.push_str("\n\nExamples:\n");
        prompt.push_str(&render_examples(examples));
    }
    prompt
}

fn router_brief(user_request: &str, agent_id: &str, output: &str, handoffs: u32) -> String {
    format!(
        "User request:\n{user_request}\n\n\
         Latest output from `{agent_id}`:\n{output}\n\n\
         Handoffs so far: {handoffs}"
    )
}

fn handoff_note(from: &str, to: &str, reason: &str) -> String {
    if reason.is_empty() {
        format!("Handoff from `{from}` to `{to}`. Continue the task.")
    } else {
        format!("Handoff from `{from}` to `{to}`: {reason}. Continue the task.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use agentflow_core::event::EventBus;
    use agentflow_core::{Error, ProviderError};
    use serde_json::json;
    use std::sync::Arc;

    const FINISH: &str = r#"{"action":"finish","reason":"complete"}"#;

    fn handoff(target: &str) -> String {
        format!(r#"{{"action":"handoff","target_agent":"{target}","reason":"needs {target}"}}"#)
    }

    fn team_domain(max_handoffs: u64) -> DomainPolicy {
        DomainPolicy::new("team", ["agent1", "agent2", "agent3"])
            .with_workflow_type("few_shot")
            .with_section(
                "few_shot",
                json!({
                    "max_handoffs": max_handoffs,
                    "routing_examples": [
                        { "situation": "Code is needed", "decision": { "action": "handoff", "target_agent": "agent2" } },
                        { "situation": "Answer is complete", "decision": "finish" }
                    ]
                }),
            )
    }

    fn strategy(provider: &Arc<ScriptedProvider>) -> FewShotStrategy {
        FewShotStrategy::new(AgentInvoker::new(provider.clone()))
    }

    #[test]
    fn config_reads_metadata() {
        let config = FewShotConfig::from_domain(&team_domain(3));
        assert_eq!(config.max_handoffs, 3);
        assert_eq!(config.routing_examples.len(), 2);
        assert!(config.routing_examples[0].render().contains("agent2"));
        assert_eq!(config.routing_examples[1].render(), "Situation: Answer is complete\nDecision: finish");
    }

    #[test]
    fn config_defaults() {
        let config = FewShotConfig::from_domain(&DomainPolicy::new("d", ["a"]));
        assert_eq!(config.max_handoffs, DEFAULT_MAX_HANDOFFS);
        assert!(config.routing_examples.is_empty());

        let zero = FewShotConfig::from_domain(&team_domain(0));
        assert_eq!(zero.max_handoffs, 1);
    }

    #[test]
    fn prompts_are_distinguishable() {
        let agents = catalog(&["agent1", "agent2"]);
        let order = vec!["agent1".to_string(), "agent2".to_string()];
        let roster = roster(&agents, &order);
        let agent = agents.get("agent1").unwrap();

        let agent_prompt = agent_prompt(agent, &roster, &[]);
        assert!(agent_prompt.starts_with("You are the agent1 agent."));
        assert!(agent_prompt.contains("- agent2"));
        assert!(!agent_prompt.contains(ROUTER_MARKER));

        let router_prompt = router_prompt(&roster, &[]);
        assert!(router_prompt.starts_with(ROUTER_MARKER));
        assert!(router_prompt.contains("target_agent"));
    }

    #[tokio::test]
    async fn handoff_then_finish() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "agent1 drafted a plan",
            &handoff("agent2"),
            "agent2 wrote the code",
            FINISH,
        ]));
        let agents = catalog(&["agent1", "agent2", "agent3"]);

        let result = strategy(&provider)
            .execute(&team_domain(3), &agents, "Build it")
            .await
            .unwrap();

        assert_eq!(result.agent_ids(), vec!["agent1", "router", "agent2", "router"]);
        assert_eq!(result.final_response, "agent2 wrote the code");
        assert_eq!(result.strategy(), "few_shot");
        assert_eq!(result.metadata["handoffs"], 1);
        assert_eq!(result.metadata["stop_reason"], "finish");
        assert!(!result.is_degraded());

        let router_step = &result.steps[1];
        assert_eq!(router_step.metadata["handoff_target"], "agent2");
        assert_eq!(router_step.metadata["reasoning"], "needs agent2");
        assert_eq!(router_step.result(), handoff("agent2"));

        // agent2 sees the earlier output and the handoff note
        let requests = provider.requests();
        assert!(requests[1].system_prompt.starts_with(ROUTER_MARKER));
        let agent2_messages = &requests[2].messages;
        assert!(agent2_messages.iter().any(|m| m.content.contains("agent1 drafted a plan")));
        assert!(agent2_messages.last().unwrap().content.contains("needs agent2"));
        assert_eq!(result.steps[2].task, agent2_messages.last().unwrap().content);
    }

    #[tokio::test]
    async fn always_handoff_is_bounded() {
        let provider = Arc::new(
            ScriptedProvider::repeating("working on it").with_router_repeating(&handoff("agent2")),
        );
        let agents = catalog(&["agent1", "agent2", "agent3"]);

        let result = strategy(&provider)
            .execute(&team_domain(4), &agents, "Loop forever")
            .await
            .unwrap();

        assert_eq!(result.steps.len(), 8);
        assert!(result.steps.len() <= 2 * 4);
        assert_eq!(result.metadata["stop_reason"], "max_handoffs");
        assert_eq!(result.metadata["handoffs"], 3);
        assert_eq!(provider.router_calls(), 4);
        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn handoff_on_last_iteration_is_not_announced() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let provider = Arc::new(
            ScriptedProvider::repeating("working on it").with_router_repeating(&handoff("agent2")),
        );
        let few_shot = FewShotStrategy::new(AgentInvoker::new(provider.clone()).with_events(bus));

        let result = few_shot
            .execute(&team_domain(2), &catalog(&["agent1", "agent2", "agent3"]), "go")
            .await
            .unwrap();

        assert_eq!(result.agent_ids(), vec!["agent1", "router", "agent2", "router"]);
        assert_eq!(result.metadata["handoffs"], 1);
        assert_eq!(result.metadata["stop_reason"], "max_handoffs");

        let mut announced = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let WorkflowEvent::HandoffAccepted { from, to, .. } = event.as_ref() {
                announced.push((from.clone(), to.clone()));
            }
        }
        assert_eq!(announced, vec![("agent1".to_string(), "agent2".to_string())]);
    }

    #[tokio::test]
    async fn first_agent_is_default_agent() {
        let provider = Arc::new(ScriptedProvider::texts(&["hello", FINISH]));
        let agents = catalog(&["agent1", "agent2", "agent3"]);
        let domain = team_domain(3).with_default_agent("agent3");

        let result = strategy(&provider).execute(&domain, &agents, "hi").await.unwrap();

        assert_eq!(result.steps[0].agent_id, "agent3");
        assert_eq!(provider.requests()[0].system_prompt.lines().next(), Some("You are the agent3 agent."));
    }

    #[tokio::test]
    async fn unknown_handoff_target_keeps_last_output() {
        let provider = Arc::new(ScriptedProvider::texts(&["partial answer", &handoff("nobody")]));
        let agents = catalog(&["agent1", "agent2", "agent3"]);

        let result = strategy(&provider)
            .execute(&team_domain(5), &agents, "hi")
            .await
            .unwrap();

        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.final_response, "partial answer");
        assert_eq!(result.metadata["stop_reason"], "unknown_target");
        assert_eq!(result.metadata["unknown_target"], "nobody");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn non_member_target_is_unknown() {
        // agent4 is in the catalog but not a member of the domain
        let provider = Arc::new(ScriptedProvider::texts(&["answer", &handoff("agent4")]));
        let agents = catalog(&["agent1", "agent2", "agent3", "agent4"]);

        let result = strategy(&provider)
            .execute(&team_domain(5), &agents, "hi")
            .await
            .unwrap();

        assert_eq!(result.metadata["stop_reason"], "unknown_target");
        assert!(!result.agent_ids().contains(&"agent4"));
    }

    #[tokio::test]
    async fn unparseable_decision_stops_gracefully() {
        let provider = Arc::new(ScriptedProvider::texts(&["answer", "let agent2 do it"]));
        let agents = catalog(&["agent1", "agent2", "agent3"]);

        let result = strategy(&provider)
            .execute(&team_domain(5), &agents, "hi")
            .await
            .unwrap();

        assert_eq!(result.final_response, "answer");
        assert_eq!(result.metadata["stop_reason"], "unparseable_decision");
        assert!(result.steps[1].metadata.contains_key("decision_error"));
    }

    #[tokio::test]
    async fn unknown_default_agent_fails_fast() {
        let provider = Arc::new(ScriptedProvider::repeating("unused"));
        let agents = catalog(&["agent2"]);

        let err = strategy(&provider)
            .execute(&team_domain(3), &agents, "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownAgent { ref agent_id, .. } if agent_id == "agent1"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn port_faults_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Fail(
            ProviderError::Network("unreachable".into()),
        )]));
        let agents = catalog(&["agent1", "agent2", "agent3"]);

        let err = strategy(&provider)
            .execute(&team_domain(3), &agents, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
