//! Lifecycle events for observability.
//!
//! Scopes and the pipeline runner report what they do through an
//! [`EventSink`]. Sinks are synchronous because scope disposal is.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::pipeline::RunPhase;
use serde::Serialize;
use uuid::Uuid;

/// A structured lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A scope was opened.
    ScopeOpened {
        /// The new scope's id.
        scope_id: Uuid,
        /// The parent scope's id (`None` for the root).
        parent_id: Option<Uuid>,
        /// The request the scope belongs to, if any.
        request_id: Option<Uuid>,
        /// The scope tag.
        tag: String,
        /// Nesting depth (root = 0).
        depth: usize,
    },
    /// A scope was disposed through `dispose`.
    ScopeDisposed {
        /// The scope's id.
        scope_id: Uuid,
        /// The request the scope belongs to, if any.
        request_id: Option<Uuid>,
        /// The scope tag.
        tag: String,
        /// Nesting depth.
        depth: usize,
        /// Number of owned instances released.
        released: usize,
    },
    /// A scope was dropped without being disposed.
    ScopeLeaked {
        /// The scope's id.
        scope_id: Uuid,
        /// The request the scope belongs to, if any.
        request_id: Option<Uuid>,
        /// The scope tag.
        tag: String,
        /// Nesting depth.
        depth: usize,
    },
    /// A request moved to a new run phase.
    PhaseChanged {
        /// The request id.
        request_id: Uuid,
        /// The pipeline name.
        pipeline: String,
        /// The phase being left.
        from: RunPhase,
        /// The phase being entered.
        to: RunPhase,
    },
}

impl LifecycleEvent {
    /// Returns the dotted event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ScopeOpened { .. } => "scope.opened",
            Self::ScopeDisposed { .. } => "scope.disposed",
            Self::ScopeLeaked { .. } => "scope.leaked",
            Self::PhaseChanged { .. } => "pipeline.phase",
        }
    }

    /// Returns the request id the event belongs to, if any.
    #[must_use]
    pub const fn request_id(&self) -> Option<Uuid> {
        match self {
            Self::ScopeOpened { request_id, .. }
            | Self::ScopeDisposed { request_id, .. }
            | Self::ScopeLeaked { request_id, .. } => *request_id,
            Self::PhaseChanged { request_id, .. } => Some(*request_id),
        }
    }
}
