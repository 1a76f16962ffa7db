//! Per-request run phases.

use crate::events::{EventSink, LifecycleEvent};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The phase a request is in while the pipeline handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Not started.
    Idle,
    /// The Request Scope is open.
    ScopeOpened,
    /// The chain of stage links is built.
    ChainBuilt,
    /// The head stage is running.
    Dispatching,
    /// The chain returned and every scope was torn down.
    Completed,
    /// A stage, the teardown, or cancellation failed the request.
    Failed,
}

impl RunPhase {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a request may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::ScopeOpened)
                | (Self::ScopeOpened, Self::ChainBuilt)
                | (Self::ChainBuilt, Self::Dispatching)
                | (Self::Dispatching, Self::Completed)
        ) || (!self.is_terminal() && matches!(next, Self::Failed))
    }

    /// Returns the phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ScopeOpened => "scope_opened",
            Self::ChainBuilt => "chain_built",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one request's phase and reports every transition.
pub(crate) struct PhaseTracker<'a> {
    pipeline: &'a str,
    request_id: Uuid,
    current: RunPhase,
    sink: Arc<dyn EventSink>,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(pipeline: &'a str, request_id: Uuid, sink: Arc<dyn EventSink>) -> Self {
        Self {
            pipeline,
            request_id,
            current: RunPhase::Idle,
            sink,
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> RunPhase {
        self.current
    }

    pub(crate) fn advance(&mut self, to: RunPhase) {
        let from = self.current;
        if !from.can_transition_to(to) {
            warn!(from = %from, to = %to, "Ignoring invalid phase transition");
            return;
        }
        debug!(from = %from, to = %to, "Phase changed");
        self.current = to;
        self.sink.emit(&LifecycleEvent::PhaseChanged {
            request_id: self.request_id,
            pipeline: self.pipeline.to_string(),
            from,
            to,
        });
    }
}
