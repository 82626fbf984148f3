//! `agentflow route` — dry run: which strategy and agents would handle a
//! request. Never calls an LLM.

use std::path::PathBuf;

use agentflow_config::Catalog;
use agentflow_core::DomainPolicy;
use agentflow_workflow::hybrid::{PhaseMode, plan_phases};
use agentflow_workflow::{FewShotConfig, SupervisorRouter, WorkflowType};
use anyhow::Context;

pub fn run(domain_id: &str, message: &str, catalog: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, catalog) = super::load(catalog)?;
    let domain = catalog
        .domain(domain_id)
        .with_context(|| format!("Unknown domain '{domain_id}'"))?;

    println!("{}", describe_route(domain, &catalog, message));
    Ok(())
}

fn describe_route(domain: &DomainPolicy, catalog: &Catalog, message: &str) -> String {
    let workflow_type = WorkflowType::for_domain(domain);
    let mut lines = vec![
        format!("Domain:    {}", domain.id),
        format!("Strategy:  {workflow_type}"),
    ];

    match workflow_type {
        WorkflowType::Supervisor => {
            let selection = SupervisorRouter::select(domain, &catalog.agents, message);
            lines.push(format!("Agent:     {}", selection.agent_id));
            match selection.matched_priority {
                Some(priority) => lines.push(format!(
                    "Matched:   rule priority {priority} on [{}]",
                    selection.matched_keywords.join(", ")
                )),
                None => lines.push("Matched:   no rule (default agent)".into()),
            }
        }
        WorkflowType::Orchestrator => {
            let pipeline = domain
                .string_list("orchestration", "pipeline")
                .unwrap_or_default();
            if pipeline.is_empty() {
                lines.push("Pipeline:  (empty, nothing runs)".into());
            } else {
                lines.push(format!("Pipeline:  {}", pipeline.join(" → ")));
            }
        }
        WorkflowType::FewShot => {
            let config = FewShotConfig::from_domain(domain);
            lines.push(format!("Start:     {}", domain.default_agent));
            lines.push(format!("Agents:    {}", domain.agents.join(", ")));
            lines.push(format!("Bound:     {} handoffs", config.max_handoffs));
        }
        WorkflowType::Hybrid => {
            let phases = plan_phases(domain);
            if phases.is_empty() {
                lines.push("Phases:    (none, nothing runs)".into());
            }
            for phase in phases {
                let mode = match phase.mode {
                    PhaseMode::Orchestrated => "pipeline",
                    PhaseMode::LlmDecided => "handoffs",
                };
                lines.push(format!(
                    "Phase:     {} [{mode}] {}",
                    phase.name,
                    phase.agents.join(", ")
                ));
            }
        }
    }

    lines.join("\n")
}
