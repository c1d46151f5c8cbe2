//! Event types for the training event system
//!
//! Provides the TrainingEvent enum and the EventBus used to fan job progress out to
//! SSE subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Training lifecycle events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrainingEvent {
    /// A job left the queue and began processing
    TrainingStarted {
        persona_id: String,
        /// Non-empty modalities in processing order
        modalities: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Progress update for a running job
    TrainingProgress {
        persona_id: String,
        current_step: String,
        /// Percentage complete (0.0 - 100.0), non-decreasing within a run
        progress_percentage: f64,
        details: String,
        timestamp: DateTime<Utc>,
    },

    /// Job finished and the persona model was written
    TrainingCompleted {
        persona_id: String,
        details: String,
        timestamp: DateTime<Utc>,
    },

    /// Job stopped on a stage failure
    TrainingFailed {
        persona_id: String,
        /// Underlying error message, verbatim
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Job observed a cancellation request at a stage boundary
    TrainingCancelled {
        persona_id: String,
        details: String,
        timestamp: DateTime<Utc>,
    },
}

impl TrainingEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            TrainingEvent::TrainingStarted { .. } => "TrainingStarted",
            TrainingEvent::TrainingProgress { .. } => "TrainingProgress",
            TrainingEvent::TrainingCompleted { .. } => "TrainingCompleted",
            TrainingEvent::TrainingFailed { .. } => "TrainingFailed",
            TrainingEvent::TrainingCancelled { .. } => "TrainingCancelled",
        }
    }

    /// Persona the event belongs to
    pub fn persona_id(&self) -> &str {
        match self {
            TrainingEvent::TrainingStarted { persona_id, .. }
            | TrainingEvent::TrainingProgress { persona_id, .. }
            | TrainingEvent::TrainingCompleted { persona_id, .. }
            | TrainingEvent::TrainingFailed { persona_id, .. }
            | TrainingEvent::TrainingCancelled { persona_id, .. } => persona_id,
        }
    }

    /// Whether this is the last event a job will emit
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingEvent::TrainingCompleted { .. }
                | TrainingEvent::TrainingFailed { .. }
                | TrainingEvent::TrainingCancelled { .. }
        )
    }
}

/// Central event distribution bus
///
/// Cloning is cheap; all clones share one broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrainingEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TrainingEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TrainingEvent,
    ) -> Result<usize, broadcast::error::SendError<TrainingEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TrainingEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
