//! Strategy selection — one variant per coordination protocol, chosen once
//! from a domain's `workflow_type` tag.

use agentflow_core::event::WorkflowEvent;
use agentflow_core::{AgentCatalog, DomainPolicy, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::few_shot::FewShotStrategy;
use crate::hybrid::HybridStrategy;
use crate::invoker::AgentInvoker;
use crate::orchestrator::OrchestratorStrategy;
use crate::step::WorkflowResult;
use crate::supervisor::SupervisorRouter;

/// The `workflow_type` tags a domain may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    #[default]
    Supervisor,
    Orchestrator,
    FewShot,
    Hybrid,
}

/// Tag → type lookup table.
const WORKFLOW_TYPES: &[(&str, WorkflowType)] = &[
    ("supervisor", WorkflowType::Supervisor),
    ("orchestrator", WorkflowType::Orchestrator),
    ("few_shot", WorkflowType::FewShot),
    ("hybrid", WorkflowType::Hybrid),
];

impl WorkflowType {
    /// Exact-match lookup. `None` for tags not in the table.
    pub fn from_tag(tag: &str) -> Option<Self> {
        WORKFLOW_TYPES
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, ty)| *ty)
    }

    /// The type a domain runs under. Unset or unknown tags fall back to
    /// [`WorkflowType::Supervisor`].
    pub fn for_domain(domain: &DomainPolicy) -> Self {
        match domain.workflow_type.as_deref() {
            None => Self::Supervisor,
            Some(tag) => Self::from_tag(tag).unwrap_or_else(|| {
                warn!(
                    domain = %domain.id,
                    workflow_type = %tag,
                    "Unknown workflow type, using supervisor"
                );
                Self::Supervisor
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        WORKFLOW_TYPES
            .iter()
            .find(|(_, ty)| ty == self)
            .map(|(name, _)| *name)
            .unwrap_or("supervisor")
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved strategy, ready to execute.
#[derive(Clone)]
pub enum Strategy {
    Supervisor(SupervisorRouter),
    Orchestrator(OrchestratorStrategy),
    FewShot(FewShotStrategy),
    Hybrid(HybridStrategy),
}

impl Strategy {
    pub fn new(workflow_type: WorkflowType, invoker: AgentInvoker) -> Self {
        match workflow_type {
            WorkflowType::Supervisor => Self::Supervisor(SupervisorRouter::new(invoker)),
            WorkflowType::Orchestrator => Self::Orchestrator(OrchestratorStrategy::new(invoker)),
            WorkflowType::FewShot => Self::FewShot(FewShotStrategy::new(invoker)),
            WorkflowType::Hybrid => Self::Hybrid(HybridStrategy::new(invoker)),
        }
    }

    /// Select the strategy for a domain.
    pub fn for_domain(domain: &DomainPolicy, invoker: AgentInvoker) -> Self {
        Self::new(WorkflowType::for_domain(domain), invoker)
    }

    pub fn workflow_type(&self) -> WorkflowType {
        match self {
            Self::Supervisor(_) => WorkflowType::Supervisor,
            Self::Orchestrator(_) => WorkflowType::Orchestrator,
            Self::FewShot(_) => WorkflowType::FewShot,
            Self::Hybrid(_) => WorkflowType::Hybrid,
        }
    }

    /// Name reported in `metadata.strategy`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supervisor(_) => crate::supervisor::STRATEGY_NAME,
            Self::Orchestrator(_) => crate::orchestrator::STRATEGY_NAME,
            Self::FewShot(_) => crate::few_shot::STRATEGY_NAME,
            Self::Hybrid(_) => crate::hybrid::STRATEGY_NAME,
        }
    }

    fn invoker(&self) -> &AgentInvoker {
        match self {
            Self::Supervisor(s) => s.invoker(),
            Self::Orchestrator(s) => s.invoker(),
            Self::FewShot(s) => s.invoker(),
            Self::Hybrid(s) => s.invoker(),
        }
    }

    /// Run the strategy for one user request.
    pub async fn execute(
        &self,
        domain: &DomainPolicy,
        agents: &AgentCatalog,
        user_request: &str,
    ) -> Result<WorkflowResult> {
        let invoker = self.invoker();
        invoker.publish(WorkflowEvent::WorkflowStarted {
            domain: domain.id.clone(),
            strategy: self.name().to_string(),
            timestamp: Utc::now(),
        });

        let result = match self {
            Self::Supervisor(s) => s.execute(domain, agents, user_request).await,
            Self::Orchestrator(s) => s.execute(domain, agents, user_request).await,
            Self::FewShot(s) => s.execute(domain, agents, user_request).await,
            Self::Hybrid(s) => s.execute(domain, agents, user_request).await,
        }?;

        invoker.publish(WorkflowEvent::WorkflowCompleted {
            domain: domain.id.clone(),
            strategy: self.name().to_string(),
            steps: result.steps.len(),
            degraded: result.is_degraded(),
            timestamp: Utc::now(),
        });
        Ok(result)
    }
}
