//! Context summarization between hybrid phases.

use agentflow_core::message::Message;
use tracing::{debug, warn};

use crate::invoker::AgentInvoker;

/// Contexts shorter than this many characters pass through untouched.
pub const SUMMARY_THRESHOLD: usize = 1000;

const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 512;

const SUMMARY_PROMPT: &str = "You condense the output of a finished work phase for the agents \
that continue the task. Keep every decision, result, file name, number and open question. \
Drop greetings and repetition. Reply with the summary only.";

/// Shrink `context` before it is carried into the next phase.
///
/// Never loses information: with no invoker, a failed call, or an empty
/// summary, the original context is returned unchanged.
pub async fn summarize_context(
    invoker: Option<&AgentInvoker>,
    model: &str,
    context: &str,
    phase: &str,
) -> String {
    if context.chars().count() < SUMMARY_THRESHOLD {
        return context.to_string();
    }
    let Some(invoker) = invoker else {
        return context.to_string();
    };

    let request = format!("Phase: {phase}\n\n{context}");
    match invoker
        .invoke_with(
            model,
            SUMMARY_PROMPT,
            vec![Message::user(request)],
            SUMMARY_TEMPERATURE,
            Some(SUMMARY_MAX_TOKENS),
        )
        .await
    {
        Ok(summary) if !summary.trim().is_empty() => {
            debug!(
                phase = %phase,
                before = context.len(),
                after = summary.len(),
                "Context summarized"
            );
            format!("--- {phase} Phase Summary ---\n{}", summary.trim())
        }
        Ok(_) => {
            warn!(phase = %phase, "Summarizer returned nothing, keeping full context");
            context.to_string()
        }
        Err(e) => {
            warn!(phase = %phase, error = %e, "Summarization failed, keeping full context");
            context.to_string()
        }
    }
}
