//! Workflow engine — decides which agents answer a request, in what order,
//! and how their output flows from one turn to the next.
//!
//! A caller resolves a [`Strategy`] from the domain's `workflow_type` and calls
//! [`Strategy::execute`]:
//!
//! - [`SupervisorRouter`] picks one agent by keyword rules (the default)
//! - [`OrchestratorStrategy`] runs a fixed pipeline with validation and retry
//! - [`FewShotStrategy`] lets a router hand work between agents
//! - [`HybridStrategy`] mixes orchestrated and LLM-decided phases
//!
//! Every strategy returns a [`WorkflowResult`] whose steps are the full audit
//! trail of the run.

pub mod decision;
pub mod few_shot;
pub mod hybrid;
pub mod invoker;
pub mod orchestrator;
pub mod step;
pub mod strategy;
pub mod summarize;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decision::{DecisionError, RoutingAction, RoutingDecision, parse_decision};
pub use few_shot::{FewShotConfig, FewShotStrategy, RoutingExample, StopReason};
pub use hybrid::{HybridStrategy, Phase, PhaseMode};
pub use invoker::AgentInvoker;
pub use orchestrator::OrchestratorStrategy;
pub use step::{ROUTER_AGENT_ID, WorkflowResult, WorkflowStep};
pub use strategy::{Strategy, WorkflowType};
pub use summarize::{SUMMARY_THRESHOLD, summarize_context};
pub use supervisor::{Selection, SupervisorRouter};
