//! Event Publisher Adapter
//!
//! Implements the `EventPublisher` port with a tracing backend and an
//! in-memory collector.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Publishes domain events as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher {
    /// Log at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    /// Publisher that logs at debug level.
    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let event_type = event.event_type();
        let pass_id = event.pass_id();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        if self.info_level {
            info!(event_type = %event_type, pass_id = %pass_id, event = %json, "Domain event");
        } else {
            debug!(event_type = %event_type, pass_id = %pass_id, event = %json, "Domain event");
        }

        Ok(())
    }
}

/// Collects events in memory for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<DomainEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events, oldest first.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events with the given type name.
    pub fn events_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Events emitted during one pass.
    pub fn events_for_pass(&self, pass_id: Uuid) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.pass_id() == pass_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_publisher() {
        let publisher = LoggingEventPublisher::info_level();
        let event = DomainEvent::pass_skipped(Uuid::new_v4(), "no live nodes");

        publisher.publish(event).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_collector() {
        let collector = InMemoryEventCollector::new();
        assert!(collector.is_empty());

        let pass_id = Uuid::new_v4();
        collector
            .publish(DomainEvent::pass_started(pass_id, 3, 13_333_333, 16_666_666))
            .await
            .unwrap();
        collector
            .publish(DomainEvent::eviction_dispatched(pass_id, "lru", 7200, false))
            .await
            .unwrap();
        collector
            .publish(DomainEvent::pass_skipped(Uuid::new_v4(), "topology unavailable"))
            .await
            .unwrap();

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.events_of_type("EvictionDispatched").len(), 1);
        assert_eq!(collector.events_for_pass(pass_id).len(), 2);

        collector.clear();
        assert!(collector.is_empty());
    }
}
