//! Hybrid strategy — orchestrated phases and LLM-decided phases in one run.
//!
//! `metadata.hybrid` lists phase names under `orchestrator_decides` and
//! `llm_decides`. Each phase resolves to a set of agents:
//!
//! 1. `hybrid.phase_agents.<phase>` when present
//! 2. the agent whose id equals the phase name
//! 3. every domain member, in declared order
//!
//! Orchestrated phases run their agents as a pipeline; LLM-decided phases run
//! the handoff loop restricted to their agents. Phases run in
//! `hybrid.phase_order` when given, otherwise all orchestrated phases followed
//! by all LLM-decided ones. The output of finished phases is summarized and
//! prepended to the next phase's request.

use agentflow_core::{AgentCatalog, DomainPolicy, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::few_shot::{FewShotConfig, FewShotStrategy, StopReason};
use crate::invoker::AgentInvoker;
use crate::orchestrator::OrchestratorStrategy;
use crate::step::{WorkflowResult, WorkflowStep, last_agent_result};
use crate::summarize::summarize_context;

pub const STRATEGY_NAME: &str = "hybrid";

/// Who decides the agent order inside a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    Orchestrated,
    LlmDecided,
}

/// A phase with its resolved agents.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub mode: PhaseMode,
    pub agents: Vec<String>,
}

/// Resolve the phases of a domain in execution order.
pub fn plan_phases(domain: &DomainPolicy) -> Vec<Phase> {
    let orchestrated = domain
        .string_list("hybrid", "orchestrator_decides")
        .unwrap_or_default();
    let llm_decided = domain.string_list("hybrid", "llm_decides").unwrap_or_default();

    let named: Vec<(String, PhaseMode)> = match domain.string_list("hybrid", "phase_order") {
        Some(order) => order
            .into_iter()
            .filter_map(|name| {
                let mode = if orchestrated.contains(&name) {
                    PhaseMode::Orchestrated
                } else if llm_decided.contains(&name) {
                    PhaseMode::LlmDecided
                } else {
                    debug!(domain = %domain.id, phase = %name, "Phase not declared, skipping");
                    return None;
                };
                Some((name, mode))
            })
            .collect(),
        None => orchestrated
            .into_iter()
            .map(|name| (name, PhaseMode::Orchestrated))
            .chain(llm_decided.into_iter().map(|name| (name, PhaseMode::LlmDecided)))
            .collect(),
    };

    named
        .into_iter()
        .map(|(name, mode)| Phase {
            agents: phase_agents(domain, &name),
            name,
            mode,
        })
        .collect()
}

fn phase_agents(domain: &DomainPolicy, phase: &str) -> Vec<String> {
    let mapped = domain
        .section("hybrid")
        .and_then(|s| s.get("phase_agents"))
        .and_then(|m| m.get(phase))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        });

    match mapped {
        Some(agents) => agents,
        None if domain.is_member(phase) => vec![phase.to_string()],
        None => domain.agents.clone(),
    }
}

/// Runs orchestrated and LLM-decided phases back to back.
#[derive(Clone)]
pub struct HybridStrategy {
    invoker: AgentInvoker,
    orchestrator: OrchestratorStrategy,
    few_shot: FewShotStrategy,
}

impl HybridStrategy {
    pub fn new(invoker: AgentInvoker) -> Self {
        Self {
            orchestrator: OrchestratorStrategy::new(invoker.clone()),
            few_shot: FewShotStrategy::new(invoker.clone()),
            invoker,
        }
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
        let phases = plan_phases(domain);
        if phases.is_empty() {
            info!(domain = %domain.id, "No hybrid phases configured, nothing to run");
            return Ok(WorkflowResult::empty(STRATEGY_NAME)
                .with("phases", Vec::<String>::new())
                .with("degraded", false));
        }

        // Every phase agent must be a known member before the first call.
        let members = agents.restricted_to(&domain.agents);
        for phase in &phases {
            let context = format!("phase '{}' of domain '{}'", phase.name, domain.id);
            for id in &phase.agents {
                members.require(id, &context)?;
            }
        }
        let summary_model = members
            .require(
                &domain.default_agent,
                &format!("default agent of domain '{}'", domain.id),
            )?
            .model
            .clone();

        let mut config = FewShotConfig::from_domain(domain);
        if let Some(max) = domain.unsigned("hybrid", "max_handoffs") {
            config = config.with_max_handoffs(max.min(u64::from(u32::MAX)) as u32);
        }

        info!(
            domain = %domain.id,
            phases = phases.len(),
            "Hybrid: starting"
        );

        let mut steps: Vec<WorkflowStep> = Vec::new();
        let mut ran: Vec<String> = Vec::new();
        let mut carried = String::new();
        let mut handoffs = 0u32;
        let mut loop_degraded = false;
        let mut cancelled = false;
        let mut fatal: Option<(String, String, String)> = None; // phase, agent, response

        for (index, phase) in phases.iter().enumerate() {
            if self.invoker.is_cancelled() {
                cancelled = true;
                break;
            }
            if phase.agents.is_empty() {
                warn!(domain = %domain.id, phase = %phase.name, "Phase has no agents, skipping");
                continue;
            }

            let request = if carried.is_empty() {
                user_request.to_string()
            } else {
                format!("Context from earlier phases:\n{carried}\n\nRequest: {user_request}")
            };
            debug!(domain = %domain.id, phase = %phase.name, mode = ?phase.mode, "Hybrid: phase");

            let phase_steps = match phase.mode {
                PhaseMode::Orchestrated => {
                    let outcome = self
                        .orchestrator
                        .run_pipeline(&domain.id, &phase.agents, &members, &request)
                        .await?;
                    cancelled = outcome.cancelled;
                    if let Some(ref agent) = outcome.halted_at {
                        fatal = Some((phase.name.clone(), agent.clone(), outcome.final_response()));
                    }
                    outcome.steps
                }
                PhaseMode::LlmDecided => {
                    let participants = members.restricted_to(&phase.agents);
                    let start = if phase.agents.contains(&domain.default_agent) {
                        domain.default_agent.as_str()
                    } else {
                        phase.agents[0].as_str()
                    };
                    let outcome = self
                        .few_shot
                        .run_loop(&domain.id, &participants, &phase.agents, start, &request, &config)
                        .await?;
                    handoffs += outcome.handoffs;
                    cancelled = outcome.stop_reason == StopReason::Cancelled;
                    loop_degraded |= outcome.stop_reason.is_degraded();
                    outcome.steps
                }
            };

            ran.push(phase.name.clone());
            let phase_text = phase_steps
                .iter()
                .filter(|s| !s.is_router())
                .map(|s| format!("[{}] {}", s.agent_id, s.result()))
                .collect::<Vec<_>>()
                .join("\n");
            steps.extend(
                phase_steps
                    .into_iter()
                    .map(|s| s.with("phase", phase.name.as_str())),
            );

            if cancelled || fatal.is_some() {
                break;
            }

            let is_last = index + 1 == phases.len();
            if !is_last && !phase_text.is_empty() {
                if !carried.is_empty() {
                    carried.push_str("\n\n");
                }
                carried.push_str(&phase_text);
                carried =
                    summarize_context(Some(&self.invoker), &summary_model, &carried, &phase.name)
                        .await;
            }
        }

        info!(
            domain = %domain.id,
            steps = steps.len(),
            phases = ran.len(),
            halted = fatal.is_some(),
            cancelled,
            "Hybrid: complete"
        );

        let degraded = fatal.is_some() || cancelled || loop_degraded;
        let final_response = match fatal {
            Some((_, _, ref response)) => response.clone(),
            None => last_agent_result(&steps).to_string(),
        };
        let mut result = WorkflowResult::from_steps(STRATEGY_NAME, steps)
            .with("phases", ran)
            .with("handoffs", handoffs)
            .with("halted", fatal.is_some())
            .with("cancelled", cancelled)
            .with("degraded", degraded);
        if let Some((phase, agent, _)) = fatal {
            result = result.with("failed_phase", phase).with("failed_agent", agent);
        }
        result.final_response = final_response;
        Ok(result)
    }
}
