//! Orchestrator strategy — a fixed pipeline with output validation and
//! bounded retry.
//!
//! Agents run in exactly the order of `metadata.orchestration.pipeline`. The
//! first agent receives the user request; every later agent receives the
//! immediately preceding output plus the original request (see
//! [`build_task`]).
//!
//! # Validation / retry
//!
//! ```text
//!   attempt 1 ──valid──▶ step recorded, next agent
//!      │ invalid (empty / "[ERROR]…" / port fault)
//!      ▼
//!   attempt 2 ──valid──▶ step recorded (retries = 1)
//!      │ invalid
//!      ▼
//!   attempt 3 ──valid──▶ step recorded (retries = 2)
//!      │ invalid
//!      ▼
//!   step recorded (exhausted), pipeline halts,
//!   final_response = "[FATAL] " + attempt 3 text
//! ```
//!
//! Only the kept attempt becomes a step; failed attempts show up as the
//! `retries` count in its metadata.

use agentflow_core::event::WorkflowEvent;
use agentflow_core::message::Message;
use agentflow_core::{AgentCatalog, DomainPolicy, Error, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::invoker::AgentInvoker;
use crate::step::{WorkflowResult, WorkflowStep, last_agent_result};

pub const STRATEGY_NAME: &str = "orchestrator";

/// Total attempts per pipeline position (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Prefix marking an agent reply as an error.
pub const ERROR_MARKER: &str = "[ERROR]";

/// Prefix marking a pipeline that exhausted its retries.
pub const FATAL_MARKER: &str = "[FATAL]";

/// Whether an agent reply can be passed down the pipeline.
pub fn is_valid_response(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && !trimmed.starts_with(ERROR_MARKER)
}

/// Task text for a pipeline position.
///
/// The first agent gets the request verbatim. Later agents get the previous
/// output in full, followed by the original request:
///
/// ```text
/// Previous output: <previous result>
///
/// Original request: <user request>
/// ```
pub fn build_task(user_request: &str, previous: Option<&str>) -> String {
    match previous {
        None => user_request.to_string(),
        Some(previous) => {
            format!("Previous output: {previous}\n\nOriginal request: {user_request}")
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Default)]
pub(crate) struct PipelineOutcome {
    pub steps: Vec<WorkflowStep>,
    /// Agent whose attempts were exhausted, if any
    pub halted_at: Option<String>,
    /// `[FATAL]`-prefixed text when halted
    pub fatal_response: Option<String>,
    pub cancelled: bool,
}

impl PipelineOutcome {
    pub fn final_response(&self) -> String {
        match self.fatal_response {
            Some(ref fatal) => fatal.clone(),
            None => last_agent_result(&self.steps).to_string(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.halted_at.is_some() || self.cancelled
    }
}

/// Runs a domain's configured pipeline.
#[derive(Clone)]
pub struct OrchestratorStrategy {
    invoker: AgentInvoker,
}

impl OrchestratorStrategy {
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
        let pipeline = match domain.string_list("orchestration", "pipeline") {
            Some(pipeline) if !pipeline.is_empty() => pipeline,
            _ => {
                info!(domain = %domain.id, "No pipeline configured, nothing to run");
                return Ok(WorkflowResult::empty(STRATEGY_NAME).with("degraded", false));
            }
        };

        info!(
            domain = %domain.id,
            agents = pipeline.len(),
            "Orchestrator: starting pipeline"
        );

        let members = agents.restricted_to(&domain.agents);
        let outcome = self
            .run_pipeline(&domain.id, &pipeline, &members, user_request)
            .await?;

        info!(
            domain = %domain.id,
            steps = outcome.steps.len(),
            halted = outcome.halted_at.is_some(),
            cancelled = outcome.cancelled,
            "Orchestrator: complete"
        );

        let final_response = outcome.final_response();
        let degraded = outcome.is_degraded();
        let mut result = WorkflowResult::from_steps(STRATEGY_NAME, outcome.steps)
            .with("pipeline", pipeline)
            .with("halted", outcome.halted_at.is_some())
            .with("cancelled", outcome.cancelled)
            .with("degraded", degraded);
        if let Some(agent) = outcome.halted_at {
            result = result.with("failed_agent", agent);
        }
        result.final_response = final_response;
        Ok(result)
    }

    /// Execute `pipeline` in order. Unknown agent ids fail before any LLM call.
    pub(crate) async fn run_pipeline(
        &self,
        domain_id: &str,
        pipeline: &[String],
        agents: &AgentCatalog,
        user_request: &str,
    ) -> Result<PipelineOutcome> {
        let context = format!("pipeline of domain '{domain_id}'");
        let resolved = pipeline
            .iter()
            .map(|id| agents.require(id, &context))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = PipelineOutcome::default();
        let mut previous: Option<String> = None;

        for (position, agent) in resolved.into_iter().enumerate() {
            let task = build_task(user_request, previous.as_deref());
            let mut attempt = 0;
            let mut reply = String::new();
            let mut valid = false;

            while attempt < MAX_ATTEMPTS {
                attempt += 1;
                reply = match self
                    .invoker
                    .invoke(agent, &agent.system_prompt, vec![Message::user(&task)])
                    .await
                {
                    Ok(reply) => reply,
                    Err(Error::Cancelled) => {
                        outcome.cancelled = true;
                        return Ok(outcome);
                    }
                    Err(Error::Provider(e)) => {
                        warn!(agent = %agent.id, attempt, error = %e, "LLM port fault");
                        format!("{ERROR_MARKER} {e}")
                    }
                    Err(e) => return Err(e),
                };

                valid = is_valid_response(&reply);
                if valid {
                    break;
                }

                if attempt < MAX_ATTEMPTS {
                    warn!(
                        agent = %agent.id,
                        attempt,
                        max = MAX_ATTEMPTS,
                        "Invalid agent output, retrying"
                    );
                    self.invoker.publish(WorkflowEvent::RetryScheduled {
                        domain: domain_id.to_string(),
                        agent_id: agent.id.clone(),
                        attempt: attempt + 1,
                        timestamp: Utc::now(),
                    });
                }
            }

            debug!(agent = %agent.id, position, attempts = attempt, valid, "Pipeline position settled");

            self.invoker.record(
                domain_id,
                &mut outcome.steps,
                WorkflowStep::new(&agent.id, &task, &reply)
                    .with("position", position)
                    .with("retries", attempt - 1)
                    .with("valid", valid),
            );

            if !valid {
                warn!(agent = %agent.id, "Retries exhausted, halting pipeline");
                outcome.halted_at = Some(agent.id.clone());
                outcome.fatal_response = Some(format!("{FATAL_MARKER} {reply}"));
                break;
            }

            previous = Some(reply);
        }

        Ok(outcome)
    }
}
