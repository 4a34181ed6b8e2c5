//! Domain Events
//!
//! Immutable records of what a control-loop pass observed and did. They are
//! published through the [`EventPublisher`](super::ports::EventPublisher) port
//! for audit logging and are collected in memory by tests.
//!
//! # Example
//!
//! ```ignore
//! let event = DomainEvent::eviction_dispatched(pass_id, "lru", 7200, false);
//! event_publisher.publish(event).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::ports::Node;

/// Domain event representing a significant occurrence in a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    // =========================================================================
    // Pass Events
    // =========================================================================
    /// A pass started scanning with freshly computed limits.
    PassStarted {
        pass_id: Uuid,
        live_nodes: usize,
        soft_limit: u64,
        hard_limit: u64,
        timestamp: DateTime<Utc>,
    },

    /// A pass was abandoned before scanning (topology or config failure).
    PassSkipped {
        pass_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A pass finished scanning and dispatching.
    PassCompleted {
        pass_id: Uuid,
        nodes_scanned: usize,
        nodes_skipped: usize,
        sets_dispatched: usize,
        sets_failed: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Node Events
    // =========================================================================
    /// A node could not be scanned and was left out of this pass.
    NodeSkipped {
        pass_id: Uuid,
        node_id: String,
        address: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A set crossed its hard limit on one node.
    SetOverLimit {
        pass_id: Uuid,
        node_id: String,
        set_name: String,
        objects: u64,
        hard_limit: u64,
        cutoff_secs: u64,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Eviction Events
    // =========================================================================
    /// A remove-by-age call was issued (or logged, in dry-run).
    EvictionDispatched {
        pass_id: Uuid,
        set_name: String,
        cutoff_secs: u64,
        dry_run: bool,
        timestamp: DateTime<Utc>,
    },

    /// A remove-by-age call failed; the set is retried next pass.
    EvictionFailed {
        pass_id: Uuid,
        set_name: String,
        cutoff_secs: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::PassStarted { timestamp, .. } => *timestamp,
            DomainEvent::PassSkipped { timestamp, .. } => *timestamp,
            DomainEvent::PassCompleted { timestamp, .. } => *timestamp,
            DomainEvent::NodeSkipped { timestamp, .. } => *timestamp,
            DomainEvent::SetOverLimit { timestamp, .. } => *timestamp,
            DomainEvent::EvictionDispatched { timestamp, .. } => *timestamp,
            DomainEvent::EvictionFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PassStarted { .. } => "PassStarted",
            DomainEvent::PassSkipped { .. } => "PassSkipped",
            DomainEvent::PassCompleted { .. } => "PassCompleted",
            DomainEvent::NodeSkipped { .. } => "NodeSkipped",
            DomainEvent::SetOverLimit { .. } => "SetOverLimit",
            DomainEvent::EvictionDispatched { .. } => "EvictionDispatched",
            DomainEvent::EvictionFailed { .. } => "EvictionFailed",
        }
    }

    /// Get the pass this event belongs to.
    pub fn pass_id(&self) -> Uuid {
        match self {
            DomainEvent::PassStarted { pass_id, .. }
            | DomainEvent::PassSkipped { pass_id, .. }
            | DomainEvent::PassCompleted { pass_id, .. }
            | DomainEvent::NodeSkipped { pass_id, .. }
            | DomainEvent::SetOverLimit { pass_id, .. }
            | DomainEvent::EvictionDispatched { pass_id, .. }
            | DomainEvent::EvictionFailed { pass_id, .. } => *pass_id,
        }
    }

    /// Get the set name if applicable.
    pub fn set_name(&self) -> Option<&str> {
        match self {
            DomainEvent::SetOverLimit { set_name, .. } => Some(set_name),
            DomainEvent::EvictionDispatched { set_name, .. } => Some(set_name),
            DomainEvent::EvictionFailed { set_name, .. } => Some(set_name),
            _ => None,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl DomainEvent {
    /// Create a PassStarted event.
    pub fn pass_started(pass_id: Uuid, live_nodes: usize, soft_limit: u64, hard_limit: u64) -> Self {
        DomainEvent::PassStarted {
            pass_id,
            live_nodes,
            soft_limit,
            hard_limit,
            timestamp: Utc::now(),
        }
    }

    /// Create a PassSkipped event.
    pub fn pass_skipped(pass_id: Uuid, reason: impl Into<String>) -> Self {
        DomainEvent::PassSkipped {
            pass_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a PassCompleted event.
    pub fn pass_completed(
        pass_id: Uuid,
        nodes_scanned: usize,
        nodes_skipped: usize,
        sets_dispatched: usize,
        sets_failed: usize,
        duration: Duration,
    ) -> Self {
        DomainEvent::PassCompleted {
            pass_id,
            nodes_scanned,
            nodes_skipped,
            sets_dispatched,
            sets_failed,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Create a NodeSkipped event.
    pub fn node_skipped(pass_id: Uuid, node: &Node, reason: impl Into<String>) -> Self {
        DomainEvent::NodeSkipped {
            pass_id,
            node_id: node.id.to_string(),
            address: node.address.clone(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a SetOverLimit event.
    pub fn set_over_limit(
        pass_id: Uuid,
        node: &Node,
        set_name: impl Into<String>,
        objects: u64,
        hard_limit: u64,
        cutoff_secs: u64,
    ) -> Self {
        DomainEvent::SetOverLimit {
            pass_id,
            node_id: node.id.to_string(),
            set_name: set_name.into(),
            objects,
            hard_limit,
            cutoff_secs,
            timestamp: Utc::now(),
        }
    }

    /// Create an EvictionDispatched event.
    pub fn eviction_dispatched(
        pass_id: Uuid,
        set_name: impl Into<String>,
        cutoff_secs: u64,
        dry_run: bool,
    ) -> Self {
        DomainEvent::EvictionDispatched {
            pass_id,
            set_name: set_name.into(),
            cutoff_secs,
            dry_run,
            timestamp: Utc::now(),
        }
    }

    /// Create an EvictionFailed event.
    pub fn eviction_failed(
        pass_id: Uuid,
        set_name: impl Into<String>,
        cutoff_secs: u64,
        reason: impl Into<String>,
    ) -> Self {
        DomainEvent::EvictionFailed {
            pass_id,
            set_name: set_name.into(),
            cutoff_secs,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}
