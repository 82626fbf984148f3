//! Shared test helpers for strategy tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use agentflow_core::error::ProviderError;
use agentflow_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use agentflow_core::{Agent, AgentCatalog};

use crate::few_shot::ROUTER_MARKER;

/// One scripted reply from the LLM port.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Stream these fragments, then finish
    Fragments(Vec<String>),
    /// Fail the call with a port fault
    Fail(ProviderError),
}

impl Scripted {
    pub fn text(text: &str) -> Self {
        Self::Fragments(vec![text.to_string()])
    }

    pub fn fragments(parts: &[&str]) -> Self {
        Self::Fragments(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// A provider that replays scripted replies and records every request.
///
/// Router calls (system prompt containing [`ROUTER_MARKER`]) draw from the
/// router script when one is configured; everything else draws from the main
/// script. Panics if a script runs dry with no repeating fallback.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    repeat: Option<Scripted>,
    router_script: Mutex<VecDeque<Scripted>>,
    router_repeat: Option<Scripted>,
    split_router: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            router_script: Mutex::new(VecDeque::new()),
            router_repeat: None,
            split_router: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the given texts, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Scripted::text(t)).collect())
    }

    /// Replies with the same text forever.
    pub fn repeating(text: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(Scripted::text(text));
        provider
    }

    /// Serve router calls from a separate script.
    pub fn with_router_script(mut self, script: Vec<Scripted>) -> Self {
        self.router_script = Mutex::new(script.into());
        self.split_router = true;
        self
    }

    /// Serve every router call with the same text.
    pub fn with_router_repeating(mut self, text: &str) -> Self {
        self.router_repeat = Some(Scripted::text(text));
        self.split_router = true;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests that were router calls.
    pub fn router_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.system_prompt.contains(ROUTER_MARKER))
            .count()
    }

    fn next(&self, request: &ProviderRequest) -> Scripted {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        let is_router = self.split_router && request.system_prompt.contains(ROUTER_MARKER);
        let (queue, repeat) = if is_router {
            (&self.router_script, &self.router_repeat)
        } else {
            (&self.script, &self.repeat)
        };

        if let Some(next) = queue.lock().unwrap().pop_front() {
            return next;
        }
        match repeat {
            Some(r) => r.clone(),
            None => panic!("ScriptedProvider: no more responses (call #{index}, router: {is_router})"),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(&request) {
            Scripted::Fragments(parts) => Ok(ProviderResponse {
                content: parts.concat(),
                usage: None,
                model: request.model,
            }),
            Scripted::Fail(e) => Err(e),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let parts = match self.next(&request) {
            Scripted::Fragments(parts) => parts,
            Scripted::Fail(e) => return Err(e),
        };
        let (tx, rx) = tokio::sync::mpsc::channel(parts.len() + 1);
        for part in parts {
            let _ = tx.send(Ok(StreamChunk::text(part))).await;
        }
        let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        Ok(rx)
    }
}

/// An agent with a recognisable system prompt.
pub fn agent(id: &str) -> Agent {
    Agent::new(id, "mock-model", format!("You are the {id} agent."))
}

/// A catalog with one agent per id.
pub fn catalog(ids: &[&str]) -> AgentCatalog {
    ids.iter().map(|id| agent(id)).collect()
}
