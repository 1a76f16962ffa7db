//! Stage trait, dispatch handle, and the scoped chaining protocol.
//!
//! A stage holds an immutable, non-optional handle to its successor and
//! decides whether to call it. Successor handles are [`ScopedStage`]
//! links: invoking one opens a Stage Scope, registers the link's own
//! successor as the `Next` binding, resolves the stage kind, and runs it.

mod chain;
mod greeting;
mod kind;

pub use chain::{build_chain, ScopedStage};
pub use greeting::{register_greeting_stages, EchoStage, GreetStage, Greeting, ECHO, GREET, GREETING};
pub use kind::StageKind;

use crate::context::RequestContext;
use crate::errors::PipelineError;
use crate::scope::Scope;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

/// The result of running a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A stage produced the response.
    Handled,
    /// The request fell through to the terminal sentinel.
    NotHandled,
}

/// Everything a stage needs to run: the scope it was resolved in and the
/// request being processed.
///
/// The active scope travels here as a typed field rather than through the
/// request's item store.
#[derive(Clone, Copy)]
pub struct Dispatch<'a> {
    scope: &'a Scope<'a>,
    request: &'a RequestContext,
}

impl<'a> Dispatch<'a> {
    /// Creates a dispatch rooted at `scope`.
    #[must_use]
    pub fn new(scope: &'a Scope<'a>, request: &'a RequestContext) -> Self {
        Self { scope, request }
    }

    /// Returns the active scope.
    #[must_use]
    pub fn scope(&self) -> &'a Scope<'a> {
        self.scope
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &'a RequestContext {
        self.request
    }

    /// Returns the same dispatch re-anchored on a nested scope.
    #[must_use]
    pub fn rescoped<'b>(&self, scope: &'b Scope<'b>) -> Dispatch<'b>
    where
        'a: 'b,
    {
        Dispatch {
            scope,
            request: self.request,
        }
    }

    /// Fails with [`PipelineError::Cancelled`] if the request was cancelled.
    ///
    /// Stages call this before delegating to their successor.
    ///
    /// # Errors
    ///
    /// Returns the cancellation error carrying the cancel reason.
    pub fn ensure_active(&self) -> Result<(), PipelineError> {
        self.request.cancellation().check()
    }
}

impl Debug for Dispatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("scope", &self.scope.tag())
            .field("request_id", &self.request.request_id())
            .finish()
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Middleware: Send + Sync + Debug {
    /// Returns the stage name, used in logs.
    fn name(&self) -> &str;

    /// Runs the stage.
    ///
    /// A stage continues the chain by invoking its successor with the same
    /// dispatch, or short-circuits by returning without doing so.
    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError>;
}

/// The no-op stage at the end of every chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminal;

#[async_trait]
impl Middleware for Terminal {
    fn name(&self) -> &str {
        "terminal"
    }

    async fn invoke(&self, _dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        Ok(Outcome::NotHandled)
    }
}
