//! Workflow event system — observe a run while it happens.
//!
//! Events are published as strategies make progress. Callers that stream
//! replies or persist audit logs subscribe instead of waiting for the final
//! result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All workflow events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
    /// A strategy started executing for a domain
    WorkflowStarted {
        domain: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },

    /// A step was appended to the audit trail
    StepRecorded {
        domain: String,
        index: usize,
        agent_id: String,
        preview: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent's output failed validation and will be retried
    RetryScheduled {
        domain: String,
        agent_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// Control moved from one agent to another
    HandoffAccepted {
        domain: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// A strategy finished (`degraded` is set for exhaustion, fallbacks and cancellation)
    WorkflowCompleted {
        domain: String,
        strategy: String,
        steps: usize,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for workflow events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<WorkflowEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: WorkflowEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<WorkflowEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
