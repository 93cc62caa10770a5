//! Scheduler change notification
//!
//! The manager publishes on a broadcast channel and never waits on observers.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::types::Trigger;

/// Events emitted by the schedule manager
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// The task collection or a task's history changed
    TasksChanged,
    /// A task was dispatched
    ExecutionStarted {
        task_id: Uuid,
        task_name: String,
        trigger: Trigger,
    },
    /// A task's execution was recorded
    ExecutionFinished {
        task_id: Uuid,
        success: bool,
        summary: String,
    },
}

/// Broadcast-based event bus for scheduler events.
///
/// Slow subscribers miss events (lagged) rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns how many subscribers received it
    pub fn publish(&self, event: SchedulerEvent) -> usize {
        // send() fails only when nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
