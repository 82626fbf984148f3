//! Error types for the agentflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Only *configuration* errors and port faults surface as `Err`. Content
//! problems (empty or `[ERROR]`-prefixed agent output) and exhaustion are
//! reported inside the workflow result instead.

use thiserror::Error;

/// The top-level error type for all agentflow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Unknown agent '{agent_id}' referenced by {context}")]
    UnknownAgent { agent_id: String, context: String },

    #[error("Invalid domain policy: {0}")]
    InvalidDomain(String),

    // --- Control flow ---
    #[error("Workflow cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for an unknown-agent configuration error.
    pub fn unknown_agent(agent_id: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownAgent {
            agent_id: agent_id.into(),
            context: context.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Faults raised by the LLM completion port.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
