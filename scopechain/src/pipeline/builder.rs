//! Pipeline builder with registration checks.

use super::Pipeline;
use crate::errors::{ConfigError, PipelineError, UnresolvedBindingError};
use crate::scope::{BindingKey, RootContainer, ScopeTag};
use crate::stages::StageKind;
use std::sync::Arc;

/// Builder for pipelines whose stages are all registered.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    container: Option<Arc<RootContainer>>,
    stages: Vec<StageKind>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: None,
            stages: Vec::new(),
        }
    }

    /// Sets the root container the stages are resolved from.
    #[must_use]
    pub fn container(mut self, container: Arc<RootContainer>) -> Self {
        self.container = Some(container);
        self
    }

    /// Appends a stage. The same kind may appear more than once.
    #[must_use]
    pub fn stage(mut self, kind: StageKind) -> Self {
        self.stages.push(kind);
        self
    }

    /// Appends several stages in order.
    #[must_use]
    pub fn stages(mut self, kinds: impl IntoIterator<Item = StageKind>) -> Self {
        self.stages.extend(kinds);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no container was set, or an
    /// unresolved binding error for the first stage kind the root
    /// container has no factory for.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let container = self.container.ok_or_else(|| {
            ConfigError::Invalid(format!("pipeline '{}' has no container", self.name))
        })?;

        if let Some(missing) = self.stages.iter().find(|kind| !container.has_stage(**kind)) {
            return Err(UnresolvedBindingError::new(
                BindingKey::Stage(*missing).to_string(),
                vec![ScopeTag::Root.to_string()],
            )
            .into());
        }

        Ok(Pipeline::new(self.name, self.stages, container))
    }
}
