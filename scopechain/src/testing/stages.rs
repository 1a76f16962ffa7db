//! Stages for exercising the chaining protocol.

use super::{DisposeProbe, Journal, ProbeAction};
use crate::errors::{PipelineError, ScopeError};
use crate::scope::{Component, ContainerBuilder, Dispose};
use crate::stages::{Dispatch, Middleware, Outcome, StageKind};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A disposable stage that journals construction, entry, exit and
/// disposal, and always delegates.
#[derive(Debug)]
pub struct RecordingStage {
    label: String,
    instance: Uuid,
    journal: Journal,
    next: Arc<dyn Middleware>,
}

impl RecordingStage {
    /// Creates the stage and records `Created`.
    #[must_use]
    pub fn new(label: impl Into<String>, journal: Journal, next: Arc<dyn Middleware>) -> Self {
        let label = label.into();
        let instance = Uuid::now_v7();
        journal.record(&label, instance, ProbeAction::Created);
        Self {
            label,
            instance,
            journal,
            next,
        }
    }

    /// Returns the instance id.
    #[must_use]
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Returns the successor handle.
    #[must_use]
    pub fn next(&self) -> &Arc<dyn Middleware> {
        &self.next
    }
}

#[async_trait]
impl Middleware for RecordingStage {
    fn name(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        self.journal.record(&self.label, self.instance, ProbeAction::Entered);
        dispatch.ensure_active()?;
        let outcome = self.next.invoke(dispatch).await;
        self.journal.record(&self.label, self.instance, ProbeAction::Exited);
        outcome
    }
}

impl Dispose for RecordingStage {
    fn dispose(&self) {
        self.journal.record(&self.label, self.instance, ProbeAction::Disposed);
    }
}

/// A stage that fails with a stage error without delegating.
#[derive(Debug, Clone)]
pub struct FailingStage {
    message: String,
}

impl FailingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Middleware for FailingStage {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, _dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        Err(PipelineError::stage(self.message.clone()))
    }
}

/// A stage that writes a fixed body and stops the chain.
#[derive(Debug, Clone)]
pub struct ShortCircuitStage {
    body: String,
}

impl ShortCircuitStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl Middleware for ShortCircuitStage {
    fn name(&self) -> &str {
        "short_circuit"
    }

    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        dispatch.request().response().write(&self.body);
        Ok(Outcome::Handled)
    }
}

/// Registers `kind` as a [`RecordingStage`] labelled with the kind name.
///
/// # Errors
///
/// Returns a duplicate binding error if the kind is already registered.
pub fn register_recording(
    builder: &mut ContainerBuilder,
    kind: StageKind,
    journal: &Journal,
) -> Result<(), ScopeError> {
    let journal = journal.clone();
    builder.register_stage_component(kind, move |scope| {
        let stage = RecordingStage::new(kind.name(), journal.clone(), scope.next_stage()?);
        Ok(Component::disposable_stage(Arc::new(stage)))
    })?;
    Ok(())
}

/// Registers `kind` as a [`FailingStage`].
///
/// # Errors
///
/// Returns a duplicate binding error if the kind is already registered.
pub fn register_failing(
    builder: &mut ContainerBuilder,
    kind: StageKind,
    message: &'static str,
) -> Result<(), ScopeError> {
    builder.register_stage(kind, move |_| {
        let stage: Arc<dyn Middleware> = Arc::new(FailingStage::new(message));
        Ok(stage)
    })?;
    Ok(())
}

/// Registers `kind` as a [`ShortCircuitStage`].
///
/// # Errors
///
/// Returns a duplicate binding error if the kind is already registered.
pub fn register_short_circuit(
    builder: &mut ContainerBuilder,
    kind: StageKind,
    body: &'static str,
) -> Result<(), ScopeError> {
    builder.register_stage(kind, move |_| {
        let stage: Arc<dyn Middleware> = Arc::new(ShortCircuitStage::new(body));
        Ok(stage)
    })?;
    Ok(())
}

/// Registers a per-request [`DisposeProbe`] service labelled `name`.
///
/// # Errors
///
/// Returns a duplicate binding error if the name is already registered.
pub fn register_per_request_probe(
    builder: &mut ContainerBuilder,
    name: &'static str,
    journal: &Journal,
) -> Result<(), ScopeError> {
    let journal = journal.clone();
    builder.register_per_request_component(name, move |_| {
        Ok(Component::disposable_service(Arc::new(DisposeProbe::new(
            name,
            journal.clone(),
        ))))
    })?;
    Ok(())
}
