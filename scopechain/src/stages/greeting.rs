//! Demonstration stages that share a per-request greeting.
//!
//! `GreetStage` stores `"hello"` in the request's [`Greeting`] and
//! delegates; `EchoStage` writes the greeting to the response and stops.

use super::{Dispatch, Middleware, Outcome, StageKind};
use crate::errors::{PipelineError, ScopeError};
use crate::scope::ContainerBuilder;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Kind of [`GreetStage`].
pub const GREET: StageKind = StageKind::new("greet");
/// Kind of [`EchoStage`].
pub const ECHO: StageKind = StageKind::new("echo");
/// Service name of the per-request [`Greeting`].
pub const GREETING: &str = "greeting";

/// Per-request shared state.
#[derive(Debug, Default)]
pub struct Greeting {
    hello: Mutex<Option<String>>,
}

impl Greeting {
    /// Stores the greeting.
    pub fn set(&self, hello: impl Into<String>) {
        *self.hello.lock() = Some(hello.into());
    }

    /// Returns the stored greeting.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.hello.lock().clone()
    }
}

/// Writes `"hello"` into the greeting, then delegates.
#[derive(Debug)]
pub struct GreetStage {
    greeting: Arc<Greeting>,
    next: Arc<dyn Middleware>,
}

impl GreetStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(greeting: Arc<Greeting>, next: Arc<dyn Middleware>) -> Self {
        Self { greeting, next }
    }
}

#[async_trait]
impl Middleware for GreetStage {
    fn name(&self) -> &str {
        GREET.name()
    }

    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        self.greeting.set("hello");
        dispatch.ensure_active()?;
        self.next.invoke(dispatch).await
    }
}

/// Writes the greeting to the response without delegating.
#[derive(Debug)]
pub struct EchoStage {
    greeting: Arc<Greeting>,
}

impl EchoStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(greeting: Arc<Greeting>) -> Self {
        Self { greeting }
    }
}

#[async_trait]
impl Middleware for EchoStage {
    fn name(&self) -> &str {
        ECHO.name()
    }

    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        let body = self.greeting.get().unwrap_or_default();
        dispatch.request().response().write(&body);
        Ok(Outcome::Handled)
    }
}

/// Registers the greeting service and both demonstration stages.
///
/// # Errors
///
/// Returns a duplicate binding error if any of them is already registered.
pub fn register_greeting_stages(builder: &mut ContainerBuilder) -> Result<(), ScopeError> {
    builder
        .register_per_request(GREETING, |_| Ok(Arc::new(Greeting::default())))?
        .register_stage(GREET, |scope| {
            let stage: Arc<dyn Middleware> = Arc::new(GreetStage::new(
                scope.resolve_service(GREETING)?,
                scope.next_stage()?,
            ));
            Ok(stage)
        })?
        .register_stage(ECHO, |scope| {
            let stage: Arc<dyn Middleware> = Arc::new(EchoStage::new(scope.resolve_service(GREETING)?));
            Ok(stage)
        })?;
    Ok(())
}
