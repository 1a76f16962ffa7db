//! Stage Scope chaining.

use super::{Dispatch, Middleware, Outcome, StageKind, Terminal};
use crate::errors::PipelineError;
use crate::scope::{Binding, BindingKey, ScopeTag};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, Instrument};

/// The successor handle for one position in the chain.
///
/// A link knows the stage kind at its position and holds the link for the
/// next position (or the terminal sentinel). Links are built from the last
/// position to the first, so `next` is always complete when a link is
/// created and never changes afterwards.
#[derive(Debug)]
pub struct ScopedStage {
    kind: StageKind,
    next: Arc<dyn Middleware>,
}

impl ScopedStage {
    /// Creates a link for `kind` whose successor is `next`.
    #[must_use]
    pub fn new(kind: StageKind, next: Arc<dyn Middleware>) -> Self {
        Self { kind, next }
    }

    /// Returns the stage kind at this position.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the successor handle.
    #[must_use]
    pub fn next(&self) -> &Arc<dyn Middleware> {
        &self.next
    }
}

#[async_trait]
impl Middleware for ScopedStage {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn invoke(&self, dispatch: Dispatch<'_>) -> Result<Outcome, PipelineError> {
        let next = self.next.clone();
        let scope = dispatch.scope().open_child(ScopeTag::Stage(self.kind), |scope| {
            scope.register(BindingKey::Next, Binding::stage(next))?;
            Ok(())
        })?;

        let span = tracing::debug_span!("stage", stage = %self.kind, depth = scope.depth());
        let result = async {
            let stage = scope.resolve_stage(self.kind)?;
            debug!(stage = stage.name(), "Stage resolved");
            stage.invoke(dispatch.rescoped(&scope)).await
        }
        .instrument(span)
        .await;

        match (result, scope.dispose()) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(teardown)) => Err(teardown.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(teardown)) => {
                error!(stage = %self.kind, error = %teardown, "Stage scope teardown failed during error propagation");
                Err(err)
            }
        }
    }
}

/// Builds the chain for `kinds` in reverse, ending at the terminal sentinel.
///
/// Returns the head link; for an empty list this is the sentinel itself.
#[must_use]
pub fn build_chain(kinds: &[StageKind]) -> Arc<dyn Middleware> {
    kinds
        .iter()
        .rev()
        .fold(Arc::new(Terminal) as Arc<dyn Middleware>, |next, kind| {
            Arc::new(ScopedStage::new(*kind, next))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::scope::RootContainer;

    const A: StageKind = StageKind::new("a");
    const B: StageKind = StageKind::new("b");

    #[test]
    fn test_empty_chain_is_terminal() {
        let head = build_chain(&[]);
        assert_eq!(head.name(), "terminal");
    }

    #[test]
    fn test_chain_links_in_declared_order() {
        let head = build_chain(&[A, B]);
        assert_eq!(
            format!("{head:?}"),
            "ScopedStage { kind: StageKind(\"a\"), next: ScopedStage { kind: StageKind(\"b\"), next: Terminal } }"
        );
    }

    #[test]
    fn test_link_holds_given_successor() {
        let last: Arc<dyn Middleware> = Arc::new(ScopedStage::new(B, Arc::new(Terminal)));
        let head = ScopedStage::new(A, last.clone());
        assert_eq!(head.kind(), A);
        assert!(Arc::ptr_eq(head.next(), &last));
    }

    #[tokio::test]
    async fn test_unregistered_kind_fails_and_tears_down() {
        let container = RootContainer::builder().build();
        let request = Arc::new(RequestContext::new("GET", "/"));
        let scope = container.begin_request(request.clone()).unwrap();

        let head = build_chain(&[A]);
        let err = head.invoke(Dispatch::new(&scope, &request)).await.unwrap_err();
        assert!(err.to_string().contains("stage:a"));
        assert_eq!(scope.open_children(), 0);
        scope.finish().unwrap();
    }
}
