//! Side-channel for non-fatal deploy events
//!
//! Failures that do not stop a deploy (reading hydrated manifests, deriving
//! namespaces) are reported here instead of being returned.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Phase;

/// An informational event raised during a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEvent {
    /// Stage that raised the event
    pub phase: Phase,
    /// Human readable message
    pub message: String,
}

impl DeployEvent {
    pub fn info(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Receives deploy events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DeployEvent);
}

/// Logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&self, event: DeployEvent) {
        tracing::info!(phase = %event.phase, "{}", event.message);
    }
}

/// Keeps events in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<DeployEvent>>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: DeployEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_events_share_state() {
        let events = RecordingEvents::new();
        let handle = events.clone();
        handle.emit(DeployEvent::info(Phase::Collect, "no manifests"));

        assert_eq!(
            events.events(),
            vec![DeployEvent::info(Phase::Collect, "no manifests")]
        );
    }
}
