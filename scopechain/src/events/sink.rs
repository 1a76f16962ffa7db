//! Event sink trait and implementations.

use super::LifecycleEvent;
use crate::pipeline::RunPhase;
use parking_lot::RwLock;
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Trait for sinks that receive lifecycle events.
///
/// `emit` is called inline from scope open/dispose, so implementations
/// must be cheap and must never panic.
pub trait EventSink: Send + Sync {
    /// Receives one event.
    fn emit(&self, event: &LifecycleEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// A sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        let data = serde_json::to_value(event).unwrap_or_default();
        if self.level == Level::INFO {
            info!(event_type = event.event_type(), event_data = %data, "Event: {}", event.event_type());
        } else {
            debug!(event_type = event.event_type(), event_data = %data, "Event: {}", event.event_type());
        }
    }
}

/// A sink that keeps every event in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<LifecycleEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.read().clone()
    }

    /// Returns the events that belong to one request.
    #[must_use]
    pub fn events_for(&self, request_id: Uuid) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.request_id() == Some(request_id))
            .cloned()
            .collect()
    }

    /// Returns the tags of opened scopes, in order.
    #[must_use]
    pub fn opened_tags(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::ScopeOpened { tag, .. } => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the tags of disposed scopes, in order.
    #[must_use]
    pub fn disposed_tags(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::ScopeDisposed { tag, .. } => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the ids of opened and disposed scopes for one request.
    #[must_use]
    pub fn scope_ids_for(&self, request_id: Uuid) -> (Vec<Uuid>, Vec<Uuid>) {
        let mut opened = Vec::new();
        let mut disposed = Vec::new();
        for event in self.events_for(request_id) {
            match event {
                LifecycleEvent::ScopeOpened { scope_id, .. } => opened.push(scope_id),
                LifecycleEvent::ScopeDisposed { scope_id, .. } => disposed.push(scope_id),
                _ => {}
            }
        }
        (opened, disposed)
    }

    /// Returns the phases a request entered, in order.
    #[must_use]
    pub fn phases_for(&self, request_id: Uuid) -> Vec<RunPhase> {
        self.events_for(request_id)
            .into_iter()
            .filter_map(|e| match e {
                LifecycleEvent::PhaseChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of events of a given type.
    #[must_use]
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.write().push(event.clone());
    }
}
