//! Event types for the FAM event system
//!
//! Provides shared event definitions and EventBus for all FAM services.
//! Events are broadcast via EventBus and can be serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline event types
///
/// All pipeline runs emit events through this central enum so consumers
/// (SSE clients, the UI service) get type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// An import job was created and queued
    JobCreated {
        job_id: Uuid,
        file_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A job transitioned from PENDING to RUNNING
    JobStarted {
        job_id: Uuid,
        total_rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline phase finished
    PhaseCompleted {
        job_id: Uuid,
        phase: String,
        rows_out: usize,
        errors: usize,
        warnings: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Row counters advanced during a phase
    JobProgress {
        job_id: Uuid,
        processed_rows: usize,
        error_rows: usize,
        total_rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// Job reached a terminal state
    JobFinished {
        job_id: Uuid,
        status: String,
        processed_rows: usize,
        error_rows: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get event type as string for SSE filtering
    pub fn event_type(&self) -> &str {
        match self {
            PipelineEvent::JobCreated { .. } => "JobCreated",
            PipelineEvent::JobStarted { .. } => "JobStarted",
            PipelineEvent::PhaseCompleted { .. } => "PhaseCompleted",
            PipelineEvent::JobProgress { .. } => "JobProgress",
            PipelineEvent::JobFinished { .. } => "JobFinished",
        }
    }
}

/// Broadcast bus for pipeline events
///
/// Wraps a tokio broadcast channel. Send failures (no subscribers) are
/// ignored; events are fire-and-forget.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    ///
    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: PipelineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let job_id = Uuid::new_v4();
        bus.emit(PipelineEvent::JobStarted {
            job_id,
            total_rows: 10,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.expect("event should be delivered");
        assert_eq!(event.event_type(), "JobStarted");
        match event {
            PipelineEvent::JobStarted { job_id: id, total_rows, .. } => {
                assert_eq!(id, job_id);
                assert_eq!(total_rows, 10);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_fire_and_forget() {
        let bus = EventBus::new(4);
        let delivered = bus.emit(PipelineEvent::JobFinished {
            job_id: Uuid::new_v4(),
            status: "COMPLETED".to_string(),
            processed_rows: 5,
            error_rows: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(delivered, 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = PipelineEvent::PhaseCompleted {
            job_id: Uuid::new_v4(),
            phase: "CLEAN".to_string(),
            rows_out: 42,
            errors: 1,
            warnings: 0,
            duration_ms: 7,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("event serialization should succeed");
        assert!(json.contains("\"type\":\"PhaseCompleted\""));
        assert!(json.contains("\"phase\":\"CLEAN\""));
    }
}
