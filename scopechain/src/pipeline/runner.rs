//! The per-request pipeline runner.

use super::phase::{PhaseTracker, RunPhase};
use super::{PipelineBuilder, PipelineConfig};
use crate::context::RequestContext;
use crate::errors::{PipelineError, UnresolvedBindingError};
use crate::scope::{RootContainer, ScopeTag};
use crate::stages::{build_chain, Dispatch, Middleware, Outcome, StageKind};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// An ordered list of stage kinds bound to a root container.
///
/// The pipeline is immutable and shared by every request. Each call to
/// [`handle`](Self::handle) opens a Request Scope, builds the chain, runs
/// it, and tears every scope down again, on success and on failure.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageKind>,
    container: Arc<RootContainer>,
}

impl Pipeline {
    pub(crate) fn new(name: String, stages: Vec<StageKind>, container: Arc<RootContainer>) -> Self {
        Self {
            name,
            stages,
            container,
        }
    }

    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Builds a pipeline from configuration, looking each stage name up
    /// among the kinds registered in `container`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails, or an unresolved
    /// binding error for an unknown stage name.
    pub fn from_config(
        config: &PipelineConfig,
        container: Arc<RootContainer>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let stages = config
            .stages
            .iter()
            .map(|name| {
                container.stage_kind(name).ok_or_else(|| {
                    UnresolvedBindingError::new(format!("stage:{name}"), vec![ScopeTag::Root.to_string()])
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        PipelineBuilder::new(config.name.clone())
            .container(container)
            .stages(stages)
            .build()
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage kinds in order.
    #[must_use]
    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    /// Returns the root container.
    #[must_use]
    pub fn container(&self) -> &Arc<RootContainer> {
        &self.container
    }

    /// Builds the head of the chain, last stage first.
    #[must_use]
    pub fn build_chain(&self) -> Arc<dyn Middleware> {
        build_chain(&self.stages)
    }

    /// Handles one request.
    ///
    /// Stage errors are returned unchanged. A teardown error is returned
    /// only when the chain itself succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first stage error, a cancellation error, or a scope
    /// lifecycle error raised during teardown.
    pub async fn handle(&self, request: Arc<RequestContext>) -> Result<Outcome, PipelineError> {
        let span = info_span!(
            "pipeline",
            pipeline = %self.name,
            request_id = %request.request_id(),
            method = request.method(),
            path = request.path(),
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: Arc<RequestContext>) -> Result<Outcome, PipelineError> {
        let mut phases = PhaseTracker::new(
            &self.name,
            request.request_id(),
            self.container.event_sink().clone(),
        );

        let scope = match self.container.begin_request(request.clone()) {
            Ok(scope) => scope,
            Err(err) => {
                phases.advance(RunPhase::Failed);
                error!(error = %err, "Could not open request scope");
                return Err(err.into());
            }
        };
        phases.advance(RunPhase::ScopeOpened);

        let head = self.build_chain();
        phases.advance(RunPhase::ChainBuilt);

        let result = match request.cancellation().check() {
            Ok(()) => {
                phases.advance(RunPhase::Dispatching);
                head.invoke(Dispatch::new(&scope, &request)).await
            }
            Err(err) => Err(err),
        };

        let result = match (result, scope.finish()) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(teardown)) => Err(teardown.into()),
            (Err(err), _) => Err(err),
        };

        match &result {
            Ok(outcome) => {
                phases.advance(RunPhase::Completed);
                info!(outcome = ?outcome, "Request completed");
            }
            Err(err) => {
                phases.advance(RunPhase::Failed);
                warn!(error = %err, "Request failed");
            }
        }
        result
    }
}
