//! # agentflow Core
//!
//! Domain types, the LLM port, and error definitions for the agentflow
//! workflow orchestration engine. This crate has **no framework
//! dependencies** — it defines the model every other crate builds on.
//!
//! ## Design Philosophy
//!
//! The engine consumes two ports, both defined here:
//! - the **agent/domain catalog** ([`AgentCatalog`], [`DomainPolicy`]),
//!   read-only and resolved before a workflow runs
//! - the **LLM completion port** ([`Provider`]), which yields a stream of
//!   text fragments for one system prompt + message sequence
//!
//! Implementations live in their respective crates, so strategies can be
//! tested against scripted providers.

pub mod agent;
pub mod domain;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use agent::Agent;
pub use domain::{AgentCatalog, DomainPolicy, RoutingRule};
pub use error::{Error, ProviderError, Result};
pub use event::{EventBus, WorkflowEvent};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
