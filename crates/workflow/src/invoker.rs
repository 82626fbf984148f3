//! Agent invocation against the LLM port.
//!
//! Every strategy goes through [`AgentInvoker`]: it builds the provider
//! request from an agent's model binding, drains the fragment stream into one
//! string, and honours the cancellation token while draining.

use std::sync::Arc;

use agentflow_core::event::{EventBus, WorkflowEvent};
use agentflow_core::message::Message;
use agentflow_core::provider::{Provider, ProviderRequest};
use agentflow_core::{Agent, Error, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::step::{WorkflowStep, preview};

/// Shared handle used by strategies to talk to the LLM port.
#[derive(Clone)]
pub struct AgentInvoker {
    provider: Arc<dyn Provider>,
    cancellation_token: Option<CancellationToken>,
    events: Option<Arc<EventBus>>,
}

impl AgentInvoker {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            cancellation_token: None,
            events: None,
        }
    }

    /// Set a cancellation token for graceful interruption.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Publish workflow events to this bus.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Ask an agent to respond with the given system prompt and messages.
    pub async fn invoke(
        &self,
        agent: &Agent,
        system_prompt: &str,
        messages: Vec<Message>,
    ) -> Result<String> {
        self.invoke_with(
            &agent.model,
            system_prompt,
            messages,
            agent.temperature,
            agent.max_tokens,
        )
        .await
    }

    /// Call the LLM port with explicit generation parameters.
    pub async fn invoke_with(
        &self,
        model: &str,
        system_prompt: &str,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.check_cancelled()?;

        let request = ProviderRequest {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            messages,
            temperature,
            max_tokens,
        };

        debug!(
            provider = %self.provider.name(),
            model = %model,
            messages = request.messages.len(),
            "Invoking LLM port"
        );

        let mut receiver = self.provider.stream(request).await?;
        let mut text = String::new();

        loop {
            let item = if let Some(ref token) = self.cancellation_token {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    item = receiver.recv() => item,
                }
            } else {
                receiver.recv().await
            };

            match item {
                Some(Ok(chunk)) => {
                    if let Some(content) = chunk.content {
                        trace!(len = content.len(), "Fragment received");
                        text.push_str(&content);
                    }
                    if chunk.done {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break, // channel closed
            }
        }

        Ok(text)
    }

    /// Append a step to `steps` and announce it.
    pub(crate) fn record(&self, domain: &str, steps: &mut Vec<WorkflowStep>, step: WorkflowStep) {
        debug!(
            domain = %domain,
            index = steps.len(),
            agent = %step.agent_id,
            "Step recorded"
        );
        self.publish(WorkflowEvent::StepRecorded {
            domain: domain.to_string(),
            index: steps.len(),
            agent_id: step.agent_id.clone(),
            preview: preview(step.result(), 120),
            timestamp: Utc::now(),
        });
        steps.push(step);
    }

    pub(crate) fn publish(&self, event: WorkflowEvent) {
        if let Some(ref bus) = self.events {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use agentflow_core::ProviderError;

    #[tokio::test]
    async fn drains_all_fragments() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::fragments(&[
            "Hel", "lo ", "world",
        ])]));
        let invoker = AgentInvoker::new(provider.clone());
        let agent = agent("greeter");

        let text = invoker
            .invoke(&agent, "Be nice.", vec![Message::user("hi")])
            .await
            .unwrap();

        assert_eq!(text, "Hello world");
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "Be nice.");
        assert_eq!(requests[0].model, agent.model);
    }

    #[tokio::test]
    async fn provider_fault_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Fail(
            ProviderError::Network("down".into()),
        )]));
        let invoker = AgentInvoker::new(provider);

        let err = invoker
            .invoke(&agent("a"), "p", vec![Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_calling() {
        let provider = Arc::new(ScriptedProvider::repeating("never used"));
        let token = CancellationToken::new();
        token.cancel();
        let invoker = AgentInvoker::new(provider.clone()).with_cancellation(token);

        let err = invoker
            .invoke(&agent("a"), "p", vec![Message::user("x")])
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn record_publishes_step_events() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let invoker = AgentInvoker::new(Arc::new(ScriptedProvider::repeating("x"))).with_events(bus);

        let mut steps = Vec::new();
        invoker.record("dev", &mut steps, WorkflowStep::new("coder", "t", "done"));

        assert_eq!(steps.len(), 1);
        match rx.recv().await.unwrap().as_ref() {
            WorkflowEvent::StepRecorded { agent_id, preview, .. } => {
                assert_eq!(agent_id, "coder");
                assert_eq!(preview, "done");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
