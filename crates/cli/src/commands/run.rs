//! `agentflow run` — execute a domain's workflow for one request.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use agentflow_core::{EventBus, Provider, WorkflowEvent};
use agentflow_workflow::{AgentInvoker, Strategy, WorkflowResult};
use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(
    domain_id: &str,
    message: Option<String>,
    catalog: Option<PathBuf>,
    show_steps: bool,
) -> anyhow::Result<()> {
    let (config, catalog) = super::load(catalog)?;
    let domain = catalog
        .domain(domain_id)
        .with_context(|| {
            format!(
                "Unknown domain '{domain_id}' (known: {})",
                catalog.domain_ids().join(", ")
            )
        })?;

    let request = match message {
        Some(message) => message,
        None => read_stdin()?,
    };
    if request.trim().is_empty() {
        bail!("Empty request: pass --message or pipe text on stdin");
    }

    if config.api_key.is_none() {
        warn!(
            "No API key configured; set AGENTFLOW_API_KEY or OPENROUTER_API_KEY, or add api_key to {}",
            agentflow_config::AppConfig::config_dir().join("config.toml").display()
        );
    }

    let router = agentflow_providers::build_from_config(&config);
    let provider = router.select(None)?;
    let provider_name = provider.name().to_string();

    // Ctrl-C stops the run after the current LLM call is interrupted
    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            ctrl_c_token.cancel();
        }
    });

    let bus = Arc::new(EventBus::default());
    let log_task = tokio::spawn(log_events(bus.subscribe()));

    let invoker = AgentInvoker::new(provider)
        .with_cancellation(token)
        .with_events(bus);
    let strategy = Strategy::for_domain(domain, invoker);
    info!(
        domain = %domain.id,
        strategy = strategy.name(),
        provider = %provider_name,
        "Running workflow"
    );

    let result = strategy.execute(domain, &catalog.agents, &request).await;
    // Dropping the strategy drops the last sender, ending the log task
    drop(strategy);
    let _ = log_task.await;
    let result = result?;

    println!("{}", result.final_response);
    if show_steps {
        eprintln!("{}", format_steps(&result));
    }
    if result.is_degraded() {
        warn!(metadata = %serde_json::Value::Object(result.metadata.clone()), "Workflow finished degraded");
    }
    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read request from stdin")?;
    Ok(buf)
}

async fn log_events(mut rx: tokio::sync::broadcast::Receiver<Arc<WorkflowEvent>>) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.recv().await {
            Ok(event) => match &*event {
                WorkflowEvent::RetryScheduled { agent_id, attempt, .. } => {
                    info!(agent = %agent_id, attempt, "Retrying agent");
                }
                WorkflowEvent::HandoffAccepted { from, to, .. } => {
                    info!(from = %from, to = %to, "Handoff");
                }
                WorkflowEvent::StepRecorded { index, agent_id, preview, .. } => {
                    info!(index, agent = %agent_id, preview = %preview, "Step");
                }
                _ => {}
            },
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Render the audit trail, one block per step.
fn format_steps(result: &WorkflowResult) -> String {
    let mut out = format!("── {} steps ({}) ──", result.steps.len(), result.strategy());
    for (i, step) in result.steps.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}\n{}", i + 1, step.agent_id, step.result()));
        let extras: Vec<String> = step
            .metadata
            .iter()
            .filter(|(k, _)| k.as_str() != "result")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if !extras.is_empty() {
            out.push_str(&format!("\n  ({})", extras.join(", ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_workflow::WorkflowStep;

    #[test]
    fn steps_render_in_order_with_metadata() {
        let result = WorkflowResult::from_steps(
            "orchestrator",
            vec![
                WorkflowStep::new("planner", "task", "the plan").with("retries", 0),
                WorkflowStep::new("coder", "task", "the code"),
            ],
        );

        let text = format_steps(&result);
        assert!(text.starts_with("── 2 steps (orchestrator) ──"));
        let planner = text.find("[1] planner").unwrap();
        let coder = text.find("[2] coder").unwrap();
        assert!(planner < coder);
        assert!(text.contains("(retries=0)"));
        assert!(!text.contains("result="));
    }
}
